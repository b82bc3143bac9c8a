//! Memory Workload Generator Driver
//!
//! Generates a C memory benchmark (`main.c`) and the Makefile that builds and
//! runs it from command-line options or a JSON configuration file.

mod output;
mod render;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{info, LevelFilter};
use mwg_codegen::{generate, BuildDescriptor, BuildOptions};
use mwg_common::{
    parse_size, AllocatorKind, Config, ConfigBuilder, DataType, InstrumentationKind, PatternId,
};
use output::Artifact;
use render::Renderer;
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mwg")]
#[command(about = "Memory Workload Generator - generate C benchmarks for memory access patterns")]
#[command(version, disable_version_flag = true)]
struct Cli {
    /// Print version
    #[arg(short = 'v', long = "version", action = ArgAction::Version)]
    _version: Option<bool>,

    /// Output folder the workload is generated into
    #[arg(short = 'o', long = "output-folder", default_value = "output")]
    output: PathBuf,

    /// Verbose logging
    #[arg(short = 'V', long)]
    verbose: bool,

    /// List patterns, allocators and instrumentation backends
    #[arg(long)]
    list: bool,

    /// Load the workload configuration from a JSON file; options given on
    /// the command line take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Instrumentation library
    #[arg(short = 'I', long)]
    instrumentation: Option<InstrumentationKind>,

    /// Disable informational output of the generated program
    #[arg(short = '0', long)]
    silent: bool,

    /// Do not measure the wall time of the kernel
    #[arg(short = 'W', long = "no-wtime", alias = "no-wtime-measurement")]
    no_wtime: bool,

    /// Environment variable added to the run target, as NAME=VALUE
    #[arg(short = 'E', long = "env", value_name = "NAME=VALUE")]
    env: Vec<String>,

    /// Idle phase before and after the kernel, in milliseconds
    #[arg(long = "idle-phase", value_name = "MS")]
    idle_phase: Option<u64>,

    /// Access pattern to generate
    #[arg(short = 'P', long, help_heading = "Memory access")]
    pattern: Option<PatternId>,

    /// Total size of the working set (e.g. 512MiB, 2GB)
    #[arg(short = 'S', long, value_parser = parse_size, help_heading = "Memory access")]
    size: Option<u64>,

    /// Elements accessed between two strides
    #[arg(short = 'c', long = "chunk-size", value_parser = parse_size, help_heading = "Memory access")]
    chunk_size: Option<u64>,

    /// Elements between the starts of consecutive chunks
    #[arg(short = 's', long, help_heading = "Memory access")]
    stride: Option<u64>,

    /// Extra dependent operations per memory access
    #[arg(short = 'X', long = "arithmetic-intensity", help_heading = "Memory access")]
    arithmetic_intensity: Option<u32>,

    /// Element type of all arrays
    #[arg(short = 'T', long = "type", help_heading = "Memory access")]
    data_type: Option<DataType>,

    /// Allocator of the buffers
    #[arg(short = 'A', long, help_heading = "Allocation")]
    allocator: Option<AllocatorKind>,

    /// Allocation location: a memory kind, pmem directory, NUMA node or OpenMP allocator
    #[arg(short = 'L', long = "allocation-location", value_name = "LOCATION", help_heading = "Allocation")]
    location: Option<String>,

    /// Buffer alignment in bytes, a multiple of 8
    #[arg(short = 'a', long, help_heading = "Allocation")]
    alignment: Option<u64>,

    /// Parallelize with OpenMP
    #[arg(short = 'p', long = "parallelize", help_heading = "Parallelization")]
    parallel: bool,

    /// Initialize buffers serially
    #[arg(short = 'F', long = "no-first-touch", alias = "disable-first-touch", help_heading = "Parallelization")]
    no_first_touch: bool,

    /// NUMA nodes the run target binds memory to
    #[arg(long, value_name = "NODES", help_heading = "Parallelization")]
    membind: Option<String>,

    /// NUMA nodes the run target binds CPUs to
    #[arg(long, value_name = "NODES", help_heading = "Parallelization")]
    cpunodebind: Option<String>,

    /// Do not generate a Makefile
    #[arg(short = 'M', long = "no-makefile", alias = "no-make-file", help_heading = "Compiler")]
    no_makefile: bool,

    /// Compiler optimization level
    #[arg(
        short = 'O',
        long = "optimization-level",
        default_value_t = 2,
        value_parser = clap::value_parser!(u8).range(0..=3),
        help_heading = "Compiler"
    )]
    optimization_level: u8,

    /// Compile with -march=native
    #[arg(long, help_heading = "Compiler")]
    native: bool,

    /// Compiler executable
    #[arg(long, default_value = "gcc", help_heading = "Compiler")]
    compiler: String,

    /// Header search location
    #[arg(long = "include-path", value_name = "DIR", help_heading = "Compiler")]
    include_paths: Vec<String>,

    /// Library search location, also added to LD_LIBRARY_PATH of the run target
    #[arg(long = "library-path", value_name = "DIR", help_heading = "Compiler")]
    library_paths: Vec<String>,
}

impl Cli {
    fn config(&self) -> Result<Config> {
        let mut builder = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read configuration '{}'", path.display()))?;
                serde_json::from_str::<ConfigBuilder>(&text)
                    .with_context(|| format!("Invalid configuration '{}'", path.display()))?
            }
            None => ConfigBuilder::new(),
        };

        if let Some(pattern) = self.pattern {
            builder = builder.pattern(pattern);
        }
        if let Some(size) = self.size {
            builder = builder.size(size);
        }
        if let Some(chunk_size) = self.chunk_size {
            builder = builder.chunk_size(chunk_size);
        }
        if let Some(stride) = self.stride {
            builder = builder.stride(stride);
        }
        if let Some(ops) = self.arithmetic_intensity {
            builder = builder.arithmetic_intensity(ops);
        }
        if let Some(data_type) = self.data_type {
            builder = builder.data_type(data_type);
        }
        if let Some(allocator) = self.allocator {
            builder = builder.allocator(allocator);
        }
        if let Some(location) = &self.location {
            builder = builder.location(location.as_str());
        }
        if let Some(alignment) = self.alignment {
            builder = builder.alignment(alignment);
        }
        if let Some(instrumentation) = self.instrumentation {
            builder = builder.instrumentation(instrumentation);
        }
        if let Some(ms) = self.idle_phase {
            builder = builder.idle_phase_ms(ms);
        }
        if self.parallel {
            builder = builder.parallel(true);
        }
        if self.no_first_touch {
            builder = builder.first_touch(false);
        }
        if self.silent {
            builder = builder.silent(true);
        }
        if self.no_wtime {
            builder = builder.wall_time(false);
        }

        Ok(builder.build()?)
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            compiler: self.compiler.clone(),
            optimization_level: self.optimization_level,
            native: self.native,
            include_paths: self.include_paths.clone(),
            library_paths: self.library_paths.clone(),
            env: self.env.clone(),
            membind: self.membind.clone(),
            cpunodebind: self.cpunodebind.clone(),
        }
    }
}

fn init_logging(verbose: bool) {
    let mut builder = if verbose {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(LevelFilter::Debug);
        builder
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
    };
    builder.init();
}

fn print_registry() {
    println!("Patterns:");
    for pattern in PatternId::ALL {
        println!("  {:<16} {}", pattern.as_str(), pattern.description());
    }
    println!("Allocators:");
    for allocator in AllocatorKind::ALL {
        println!("  {:<16} {}", allocator.as_str(), allocator.description());
    }
    println!("Instrumentation:");
    for instrumentation in InstrumentationKind::ALL {
        println!("  {:<16} {}", instrumentation.as_str(), instrumentation.description());
    }
}

/// Generate and render everything in memory, then write it out
fn run(cli: &Cli) -> Result<Vec<PathBuf>> {
    let config = cli.config()?;
    info!("Configuration: {}", serde_json::to_string(&config)?);

    let workload = generate(&config)?;
    let renderer = Renderer::new()?;
    let mut artifacts = vec![Artifact::new("main.c", renderer.main_source(&workload)?)];
    if !cli.no_makefile {
        let build = BuildDescriptor::new(&config, &workload, &cli.build_options())?;
        artifacts.push(Artifact::new("Makefile", renderer.makefile(&build)?));
    }

    output::write_all(&cli.output, &artifacts)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if cli.list {
        print_registry();
        return;
    }

    match run(&cli) {
        Ok(written) => {
            for path in written {
                println!("Generated {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    fn cli(dir: &TempDir, args: &[&str]) -> Cli {
        let out = dir.path().join("out");
        let mut argv = vec!["mwg", "-o", out.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_command_line_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generates_source_and_makefile() {
        let dir = TempDir::new().unwrap();
        let cli = cli(&dir, &["-P", "strided-triad", "-S", "64MiB", "-p", "-O", "3", "--native"]);
        let written = run(&cli).unwrap();
        assert_eq!(written.len(), 2);

        let source = fs::read_to_string(dir.path().join("out/main.c")).unwrap();
        assert!(source.contains("#include <omp.h>"));
        assert!(source.contains("C[i] = A[i] + 3.0 * B[i];"));
        assert!(source.contains("long N = ((long) 1 * 22369621L) / (long) sizeof(double);"));

        let makefile = fs::read_to_string(dir.path().join("out/Makefile")).unwrap();
        assert!(makefile.contains("CFLAGS = -m64 -fopenmp -O3 -march=native\n"));
    }

    #[test]
    fn test_no_makefile() {
        let dir = TempDir::new().unwrap();
        let cli = cli(&dir, &["--no-makefile", "-P", "gather", "-0"]);
        run(&cli).unwrap();
        assert!(dir.path().join("out/main.c").exists());
        assert!(!dir.path().join("out/Makefile").exists());
    }

    #[test]
    fn test_switch_short_forms() {
        let dir = TempDir::new().unwrap();
        let short = cli(&dir, &["-W", "-F", "-M"]);
        assert!(short.no_wtime && short.no_first_touch && short.no_makefile);

        let long = cli(&dir, &["--no-wtime-measurement", "--disable-first-touch", "--no-make-file"]);
        assert!(long.no_wtime && long.no_first_touch && long.no_makefile);

        let config = short.config().unwrap();
        assert!(!config.wall_time());
        assert!(!config.first_touch());
    }

    #[test]
    fn test_configuration_errors_write_nothing() {
        let dir = TempDir::new().unwrap();
        let missing_location = cli(&dir, &["-A", "libnuma"]);
        assert!(run(&missing_location).is_err());

        let serial_openmp = cli(&dir, &["-A", "openmp", "-L", "omp_default_mem_alloc"]);
        let message = format!("{:#}", run(&serial_openmp).unwrap_err());
        assert!(message.contains("openmp"), "{}", message);

        let bad_env = cli(&dir, &["-E", "NOT AN ASSIGNMENT"]);
        assert!(run(&bad_env).is_err());

        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_rejects_unknown_identifiers_while_parsing() {
        assert!(Cli::try_parse_from(["mwg", "-P", "strided-divide"]).is_err());
        assert!(Cli::try_parse_from(["mwg", "-T", "complex"]).is_err());
        assert!(Cli::try_parse_from(["mwg", "-O", "4"]).is_err());
        assert!(Cli::try_parse_from(["mwg", "-S", "12 parsecs"]).is_err());
    }

    #[test]
    fn test_json_configuration_with_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("workload.json");
        fs::write(
            &path,
            r#"{ "pattern": "random-sum", "size": "16MiB", "chunk_size": 4, "parallel": true }"#,
        )
        .unwrap();
        let cli = cli(&dir, &["--config", path.to_str().unwrap(), "-T", "float"]);
        let config = cli.config().unwrap();
        assert_eq!(config.pattern(), PatternId::RandomSum);
        assert_eq!(config.size(), 16 << 20);
        assert_eq!(config.chunk_size(), 4);
        assert!(config.parallel());
        assert_eq!(config.data_type(), DataType::Float);
    }

    #[test]
    fn test_json_configuration_rejects_unknown_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("workload.json");
        fs::write(&path, r#"{ "patern": "gather" }"#).unwrap();
        let cli = cli(&dir, &["--config", path.to_str().unwrap()]);
        let message = format!("{:#}", cli.config().unwrap_err());
        assert!(message.contains("patern"), "{}", message);
    }
}
