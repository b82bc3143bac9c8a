//! Build descriptor of a generated workload
//!
//! Collects what the Makefile needs: the compiler, compile and link flags,
//! search paths and the prefix placed in front of the program when it runs.

use crate::workload::{merge_flags, GeneratedWorkload};
use log::debug;
use mwg_common::{Config, GeneratorError, Result};
use serde::{Deserialize, Serialize};

/// Compiler and launch options that do not change the generated source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildOptions {
    pub compiler: String,
    pub optimization_level: u8,
    /// Add `-march=native`
    pub native: bool,
    pub include_paths: Vec<String>,
    pub library_paths: Vec<String>,
    /// `NAME=VALUE` assignments prepended to the run command
    pub env: Vec<String>,
    /// NUMA nodes for `numactl -m`
    pub membind: Option<String>,
    /// NUMA nodes for `numactl -N`
    pub cpunodebind: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            compiler: "gcc".to_string(),
            optimization_level: 2,
            native: false,
            include_paths: Vec::new(),
            library_paths: Vec::new(),
            env: Vec::new(),
            membind: None,
            cpunodebind: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildDescriptor {
    pub compiler: String,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
    pub include_paths: Vec<String>,
    pub library_paths: Vec<String>,
    /// Empty, or the run prefix followed by a single space
    pub exec_prefix: String,
}

impl BuildDescriptor {
    pub fn new(config: &Config, workload: &GeneratedWorkload, options: &BuildOptions) -> Result<Self> {
        if options.optimization_level > 3 {
            return Err(GeneratorError::invalid_parameter(
                "optimization-level",
                format!("{} is not one of 0, 1, 2, 3", options.optimization_level),
            ));
        }
        if options.compiler.trim().is_empty() {
            return Err(GeneratorError::invalid_parameter("compiler", "must not be empty"));
        }
        for assignment in &options.env {
            validate_env(assignment)?;
        }

        let openmp: Vec<String> = if config.parallel() {
            vec!["-fopenmp".to_string()]
        } else {
            Vec::new()
        };

        let mut compile_flags = merge_flags([vec!["-m64".to_string()], openmp.clone(), workload.compile_flags.clone()]);
        compile_flags.push(format!("-O{}", options.optimization_level));
        if options.native {
            compile_flags.push("-march=native".to_string());
        }
        let link_flags = merge_flags([vec!["-lm".to_string()], openmp, workload.link_flags.clone()]);

        let descriptor = Self {
            compiler: options.compiler.trim().to_string(),
            compile_flags,
            link_flags,
            include_paths: options.include_paths.clone(),
            library_paths: options.library_paths.clone(),
            exec_prefix: exec_prefix(options),
        };
        debug!("Build descriptor: {:?}", descriptor);
        Ok(descriptor)
    }

    pub fn flags(&self) -> String {
        self.compile_flags.join(" ")
    }

    pub fn linker_flags(&self) -> String {
        self.link_flags.join(" ")
    }

    pub fn include_path(&self) -> String {
        search_path("-I", &self.include_paths)
    }

    pub fn library_path(&self) -> String {
        search_path("-L", &self.library_paths)
    }
}

fn search_path(flag: &str, paths: &[String]) -> String {
    paths
        .iter()
        .map(|p| format!("{}{}", flag, p))
        .collect::<Vec<_>>()
        .join(" ")
}

fn validate_env(assignment: &str) -> Result<()> {
    let invalid = || GeneratorError::invalid_parameter("env", format!("'{}' is not of the form NAME=VALUE", assignment));
    let (name, _) = assignment.split_once('=').ok_or_else(invalid)?;
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if starts_well && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(invalid())
    }
}

fn exec_prefix(options: &BuildOptions) -> String {
    let mut parts: Vec<String> = options
        .library_paths
        .iter()
        .map(|path| format!("LD_LIBRARY_PATH={}:${{LD_LIBRARY_PATH}}", path))
        .collect();
    parts.extend(options.env.iter().cloned());

    let membind = options.membind.as_deref().filter(|n| !n.is_empty());
    let cpunodebind = options.cpunodebind.as_deref().filter(|n| !n.is_empty());
    if membind.is_some() || cpunodebind.is_some() {
        parts.push("numactl".to_string());
        if let Some(nodes) = membind {
            parts.push(format!("-m {}", nodes));
        }
        if let Some(nodes) = cpunodebind {
            parts.push(format!("-N {}", nodes));
        }
    }

    if parts.is_empty() {
        String::new()
    } else {
        format!("{} ", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::generate;
    use mwg_common::{AllocatorKind, InstrumentationKind};
    use pretty_assertions::assert_eq;

    fn descriptor(config: &Config, options: &BuildOptions) -> Result<BuildDescriptor> {
        let workload = generate(config).unwrap();
        BuildDescriptor::new(config, &workload, options)
    }

    #[test]
    fn test_serial_defaults() {
        let config = Config::builder().build().unwrap();
        let desc = descriptor(&config, &BuildOptions::default()).unwrap();
        assert_eq!(desc.compiler, "gcc");
        assert_eq!(desc.flags(), "-m64 -O2");
        assert_eq!(desc.linker_flags(), "-lm");
        assert_eq!(desc.exec_prefix, "");
        assert_eq!(desc.include_path(), "");
    }

    #[test]
    fn test_parallel_backend_flags() {
        let config = Config::builder()
            .allocator(AllocatorKind::Memkind)
            .location("MEMKIND_DAX_KMEM")
            .instrumentation(InstrumentationKind::Likwid)
            .parallel(true)
            .build()
            .unwrap();
        let options = BuildOptions {
            optimization_level: 3,
            native: true,
            ..BuildOptions::default()
        };
        let desc = descriptor(&config, &options).unwrap();
        assert_eq!(desc.flags(), "-m64 -fopenmp -DLIKWID_PERFMON -O3 -march=native");
        assert_eq!(desc.linker_flags(), "-lm -fopenmp -lmemkind -llikwid");
    }

    #[test]
    fn test_exec_prefix() {
        let options = BuildOptions {
            library_paths: vec!["/opt/papi/lib".to_string()],
            include_paths: vec!["/opt/papi/include".to_string()],
            env: vec!["OMP_NUM_THREADS=8".to_string()],
            membind: Some("1".to_string()),
            cpunodebind: Some("0,1".to_string()),
            ..BuildOptions::default()
        };
        let config = Config::builder().build().unwrap();
        let desc = descriptor(&config, &options).unwrap();
        assert_eq!(
            desc.exec_prefix,
            "LD_LIBRARY_PATH=/opt/papi/lib:${LD_LIBRARY_PATH} OMP_NUM_THREADS=8 numactl -m 1 -N 0,1 "
        );
        assert_eq!(desc.library_path(), "-L/opt/papi/lib");
        assert_eq!(desc.include_path(), "-I/opt/papi/include");
    }

    #[test]
    fn test_membind_alone() {
        let options = BuildOptions {
            membind: Some("2".to_string()),
            cpunodebind: Some(String::new()),
            ..BuildOptions::default()
        };
        assert_eq!(exec_prefix(&options), "numactl -m 2 ");
    }

    #[test]
    fn test_rejects_malformed_options() {
        let config = Config::builder().build().unwrap();
        let bad_level = BuildOptions {
            optimization_level: 4,
            ..BuildOptions::default()
        };
        assert!(descriptor(&config, &bad_level).is_err());

        for env in ["OMP_NUM_THREADS", "=8", "1X=2", "A-B=3"] {
            let options = BuildOptions {
                env: vec![env.to_string()],
                ..BuildOptions::default()
            };
            assert!(descriptor(&config, &options).is_err(), "{}", env);
        }
        let options = BuildOptions {
            env: vec!["KMP_AFFINITY=compact,1".to_string()],
            ..BuildOptions::default()
        };
        assert!(descriptor(&config, &options).is_ok());
    }
}
