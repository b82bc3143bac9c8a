//! Workload orchestration
//!
//! Runs the fixed generation protocol: definitions, initialization (header),
//! kernel (body) and finalization (footer). The kernel is bracketed by the
//! `main` instrumentation region and the wall-clock measurement; nothing is
//! emitted before the pattern, allocator and instrumentation are resolved.

use crate::alloc::{self, Allocator};
use crate::emit::CodeSection;
use crate::instrument::{self, Instrumentation};
use crate::patterns::{EmitContext, Pattern};
use log::{debug, info};
use mwg_common::{prng, Config, Include, Result};
use serde::Serialize;

/// Headers every generated program includes
pub const BASELINE_INCLUDES: [&str; 6] = ["time.h", "errno.h", "stdio.h", "unistd.h", "stdlib.h", "stdint.h"];

const MSLEEP: &str = "\
static void msleep(long msec) {
    struct timespec duration;
    duration.tv_sec = msec / 1000;
    duration.tv_nsec = (msec % 1000) * 1000000L;
    while (nanosleep(&duration, &duration) == -1 && errno == EINTR) {
    }
}";

/// The four code sections of a generated program and what they require
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedWorkload {
    pub definitions: String,
    pub initialization: String,
    pub kernel: String,
    pub finalization: String,
    /// Baseline headers followed by every section's headers, without duplicates
    pub includes: Vec<Include>,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
}

/// Resolve every component from `config` and generate the workload
pub fn generate(config: &Config) -> Result<GeneratedWorkload> {
    let pattern = Pattern::from_config(config)?;
    let allocator = alloc::resolve(config)?;
    let instrumentation = instrument::resolve(config.instrumentation());
    Ok(generate_with(config, &pattern, allocator.as_ref(), instrumentation.as_ref()))
}

/// Generate with explicitly provided components
pub fn generate_with(
    config: &Config,
    pattern: &Pattern,
    allocator: &dyn Allocator,
    instrumentation: &dyn Instrumentation,
) -> GeneratedWorkload {
    info!(
        "Generating {} workload (allocator: {}, instrumentation: {}, parallel: {})",
        pattern.id(),
        allocator.kind(),
        instrumentation.kind(),
        config.parallel()
    );
    let cx = EmitContext::new(config, allocator);

    let mut definitions = CodeSection::new();
    write_definitions(&cx, pattern, &mut definitions);

    let mut initialization = CodeSection::with_indent(1);
    write_initialization(&cx, pattern, instrumentation, &mut initialization);

    let mut kernel = CodeSection::with_indent(1);
    write_kernel(&cx, pattern, instrumentation, &mut kernel);

    let mut finalization = CodeSection::with_indent(1);
    write_finalization(&cx, pattern, instrumentation, &mut finalization);

    let mut includes: Vec<Include> = BASELINE_INCLUDES.iter().map(|h| Include::system(h)).collect();
    let sections = [definitions, initialization, kernel, finalization];
    let [definitions, initialization, kernel, finalization] = sections.map(|section| {
        let (code, section_includes) = section.into_parts();
        for include in section_includes {
            if !includes.contains(&include) {
                includes.push(include);
            }
        }
        code
    });

    let compile_flags = merge_flags([allocator.compile_flags(), instrumentation.compile_flags()]);
    let link_flags = merge_flags([allocator.link_flags(), instrumentation.link_flags()]);
    debug!("Includes: {:?}", includes);
    debug!("Compile flags: {:?}, link flags: {:?}", compile_flags, link_flags);

    GeneratedWorkload {
        definitions,
        initialization,
        kernel,
        finalization,
        includes,
        compile_flags,
        link_flags,
    }
}

/// Concatenate flag lists, keeping the first occurrence of each flag
pub(crate) fn merge_flags<I>(lists: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut merged: Vec<String> = Vec::new();
    for flag in lists.into_iter().flatten() {
        if !merged.contains(&flag) {
            merged.push(flag);
        }
    }
    merged
}

fn write_definitions(cx: &EmitContext, pattern: &Pattern, out: &mut CodeSection) {
    if cx.config.idle_phase_ms().is_some() {
        out.include(Include::system("time.h"));
        out.include(Include::system("errno.h"));
        out.add_block(MSLEEP);
        out.add_line("");
    }
    if pattern.uses_randomness() {
        out.include(Include::system("stdint.h"));
        out.add_block(prng::MIX_DEFINITIONS);
        out.add_line("");
    }
    pattern.write_definitions(cx, out);
}

fn write_idle_phase(cx: &EmitContext, instrumentation: &dyn Instrumentation, region: &str, out: &mut CodeSection) {
    if let Some(ms) = cx.config.idle_phase_ms() {
        instrumentation.start_region(out, region);
        out.add_line(format!("msleep({});", ms));
        instrumentation.end_region(out, region);
    }
}

fn write_initialization(
    cx: &EmitContext,
    pattern: &Pattern,
    instrumentation: &dyn Instrumentation,
    out: &mut CodeSection,
) {
    if cx.parallel() {
        out.include(Include::system("omp.h"));
        if !cx.config.silent() {
            out.add_print(
                "Using OpenMP parallel implementation with %d threads",
                &["omp_get_max_threads()"],
            );
        }
    }
    cx.allocator.initialize(out);
    instrumentation.initialize(out);
    pattern.write_header(cx, out);
    write_idle_phase(cx, instrumentation, "idle_start", out);
}

fn write_kernel(cx: &EmitContext, pattern: &Pattern, instrumentation: &dyn Instrumentation, out: &mut CodeSection) {
    // The clock only runs when its reading is printed
    let timed = cx.config.wall_time() && !cx.config.silent();
    instrumentation.start_region(out, "main");
    out.add_line("double result = 0.0;");
    if timed {
        if cx.parallel() {
            out.add_line("double begin = omp_get_wtime();");
        } else {
            out.include(Include::system("time.h"));
            out.add_line("struct timespec begin, end;");
            out.add_line("clock_gettime(CLOCK_MONOTONIC, &begin);");
        }
    }

    pattern.write_body(cx, out);

    if timed {
        if cx.parallel() {
            out.add_line("double time_spent = omp_get_wtime() - begin;");
        } else {
            out.add_line("clock_gettime(CLOCK_MONOTONIC, &end);");
            out.add_line(
                "double time_spent = (double) (end.tv_sec - begin.tv_sec) + (double) (end.tv_nsec - begin.tv_nsec) / 1e9;",
            );
        }
    }
    instrumentation.read_region(out, "main");
    instrumentation.end_region(out, "main");

    if timed {
        out.add_print("Computation took: %.3fs", &["time_spent"]);
    }
    out.add_print("Result: %f", &["result"]);
    if !cx.config.silent() {
        out.add_print("Workload has been completed. Cleaning up...", &[]);
    }
}

fn write_finalization(
    cx: &EmitContext,
    pattern: &Pattern,
    instrumentation: &dyn Instrumentation,
    out: &mut CodeSection,
) {
    pattern.write_footer(cx, out);
    cx.allocator.finalize(out);
    write_idle_phase(cx, instrumentation, "idle_end", out);
    instrumentation.finalize(out);
}
