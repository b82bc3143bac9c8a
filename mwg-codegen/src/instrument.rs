//! Instrumentation strategies
//!
//! Region markers bracket measured code. [`NoInstrumentation`] implements the
//! full interface as no-ops so the orchestrator emits markers unconditionally.

use crate::emit::CodeSection;
use mwg_common::{Include, InstrumentationKind};

/// Region marker emission for one profiling backend
pub trait Instrumentation {
    fn kind(&self) -> InstrumentationKind;
    fn initialize(&self, out: &mut CodeSection);
    fn start_region(&self, out: &mut CodeSection, region: &str);
    fn read_region(&self, out: &mut CodeSection, region: &str);
    fn end_region(&self, out: &mut CodeSection, region: &str);
    fn finalize(&self, out: &mut CodeSection);

    fn compile_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn link_flags(&self) -> Vec<String> {
        Vec::new()
    }
}

pub fn resolve(kind: InstrumentationKind) -> Box<dyn Instrumentation> {
    match kind {
        InstrumentationKind::None => Box::new(NoInstrumentation),
        InstrumentationKind::Papi => Box::new(PapiInstrumentation),
        InstrumentationKind::Likwid => Box::new(LikwidInstrumentation),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoInstrumentation;

impl Instrumentation for NoInstrumentation {
    fn kind(&self) -> InstrumentationKind {
        InstrumentationKind::None
    }

    fn initialize(&self, _out: &mut CodeSection) {}
    fn start_region(&self, _out: &mut CodeSection, _region: &str) {}
    fn read_region(&self, _out: &mut CodeSection, _region: &str) {}
    fn end_region(&self, _out: &mut CodeSection, _region: &str) {}
    fn finalize(&self, _out: &mut CodeSection) {}
}

/// PAPI high-level API
#[derive(Debug, Clone, Copy, Default)]
pub struct PapiInstrumentation;

impl PapiInstrumentation {
    fn checked(out: &mut CodeSection, call: &str, failure: &str) {
        out.open(format!("if ({} != PAPI_OK) {{", call));
        out.add_error_print(failure, &[]);
        out.close();
    }
}

impl Instrumentation for PapiInstrumentation {
    fn kind(&self) -> InstrumentationKind {
        InstrumentationKind::Papi
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(Include::local("papi.h"));
        out.include(Include::system("stdio.h"));
    }

    fn start_region(&self, out: &mut CodeSection, region: &str) {
        Self::checked(
            out,
            &format!("PAPI_hl_region_begin(\"{}\")", region),
            &format!("err: failed to begin PAPI region {}", region),
        );
    }

    fn read_region(&self, out: &mut CodeSection, region: &str) {
        Self::checked(
            out,
            &format!("PAPI_hl_read(\"{}\")", region),
            &format!("err: failed to read PAPI region {}", region),
        );
    }

    fn end_region(&self, out: &mut CodeSection, region: &str) {
        Self::checked(
            out,
            &format!("PAPI_hl_region_end(\"{}\")", region),
            &format!("err: failed to end PAPI region {}", region),
        );
    }

    fn finalize(&self, out: &mut CodeSection) {
        Self::checked(out, "PAPI_hl_stop()", "err: failed to stop the PAPI high-level API");
    }

    fn link_flags(&self) -> Vec<String> {
        vec!["-lpapi".to_string()]
    }
}

/// LIKWID marker API
#[derive(Debug, Clone, Copy, Default)]
pub struct LikwidInstrumentation;

impl Instrumentation for LikwidInstrumentation {
    fn kind(&self) -> InstrumentationKind {
        InstrumentationKind::Likwid
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(Include::system("likwid-marker.h"));
        out.add_line("likwid_markerInit();");
    }

    fn start_region(&self, out: &mut CodeSection, region: &str) {
        out.add_line(format!("likwid_markerStartRegion(\"{}\");", region));
    }

    // The marker API accumulates counters at region end; there is no separate read.
    fn read_region(&self, _out: &mut CodeSection, _region: &str) {}

    fn end_region(&self, out: &mut CodeSection, region: &str) {
        out.add_line(format!("likwid_markerStopRegion(\"{}\");", region));
    }

    fn finalize(&self, out: &mut CodeSection) {
        out.add_line("likwid_markerClose();");
    }

    fn compile_flags(&self) -> Vec<String> {
        vec!["-DLIKWID_PERFMON".to_string()]
    }

    fn link_flags(&self) -> Vec<String> {
        vec!["-llikwid".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn regions(instrumentation: &dyn Instrumentation) -> CodeSection {
        let mut out = CodeSection::new();
        instrumentation.initialize(&mut out);
        instrumentation.start_region(&mut out, "main");
        instrumentation.read_region(&mut out, "main");
        instrumentation.end_region(&mut out, "main");
        instrumentation.finalize(&mut out);
        out
    }

    #[test]
    fn test_none_emits_nothing() {
        let out = regions(&NoInstrumentation);
        assert!(out.is_empty());
        assert!(out.includes().is_empty());
        assert!(NoInstrumentation.link_flags().is_empty());
    }

    #[test]
    fn test_papi_regions() {
        let out = regions(&PapiInstrumentation);
        assert_eq!(
            out.code(),
            indoc! {r#"
                if (PAPI_hl_region_begin("main") != PAPI_OK) {
                    fprintf(stderr, "err: failed to begin PAPI region main\n");
                }
                if (PAPI_hl_read("main") != PAPI_OK) {
                    fprintf(stderr, "err: failed to read PAPI region main\n");
                }
                if (PAPI_hl_region_end("main") != PAPI_OK) {
                    fprintf(stderr, "err: failed to end PAPI region main\n");
                }
                if (PAPI_hl_stop() != PAPI_OK) {
                    fprintf(stderr, "err: failed to stop the PAPI high-level API\n");
                }
            "#}
        );
        assert_eq!(out.includes()[0], Include::local("papi.h"));
        assert_eq!(PapiInstrumentation.link_flags(), vec!["-lpapi".to_string()]);
    }

    #[test]
    fn test_likwid_regions() {
        let out = regions(&LikwidInstrumentation);
        assert_eq!(
            out.code(),
            indoc! {r#"
                likwid_markerInit();
                likwid_markerStartRegion("main");
                likwid_markerStopRegion("main");
                likwid_markerClose();
            "#}
        );
        assert_eq!(LikwidInstrumentation.compile_flags(), vec!["-DLIKWID_PERFMON".to_string()]);
    }

    #[test]
    fn test_resolve() {
        for kind in InstrumentationKind::ALL {
            assert_eq!(resolve(kind).kind(), kind);
        }
    }
}
