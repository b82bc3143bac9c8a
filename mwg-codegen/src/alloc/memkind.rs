//! memkind backends
//!
//! [`MemkindAllocator`] allocates from a memkind kind, either one of the
//! library's predefined kinds or a file-backed kind created on a persistent
//! memory mount. [`HbwAllocator`] uses the high-bandwidth `hbw_*` interface.

use super::{byte_count, emit_availability_guard, emit_null_guard, emit_status_guarded, Allocator};
use crate::emit::CodeSection;
use mwg_common::{AllocatorKind, CType, Include};

/// Origin of the memkind kind used for every allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindSource {
    /// A predefined kind such as `MEMKIND_DAX_KMEM`
    Predefined(String),
    /// A kind created on the given directory and destroyed at teardown
    Pmem(String),
}

#[derive(Debug, Clone)]
pub struct MemkindAllocator {
    source: KindSource,
    alignment: Option<u64>,
}

impl MemkindAllocator {
    pub fn new(source: KindSource, alignment: Option<u64>) -> Self {
        Self { source, alignment }
    }
}

impl Allocator for MemkindAllocator {
    fn kind(&self) -> AllocatorKind {
        match self.source {
            KindSource::Predefined(_) => AllocatorKind::Memkind,
            KindSource::Pmem(_) => AllocatorKind::MemkindPmem,
        }
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(Include::system("memkind.h"));
        match &self.source {
            KindSource::Predefined(kind) => {
                out.add_line(format!("memkind_t kind = {};", kind));
                emit_availability_guard(
                    out,
                    "memkind_check_available(kind) != MEMKIND_SUCCESS",
                    &format!("err: memory kind {} is not available", kind),
                    &[],
                );
            }
            KindSource::Pmem(path) => {
                out.add_line("memkind_t kind = NULL;");
                out.open("{");
                out.add_line(format!("int rc = memkind_create_pmem(\"{}\", 0, &kind);", path));
                emit_availability_guard(
                    out,
                    "rc != MEMKIND_SUCCESS",
                    &format!("err: failed to create a pmem kind on '{}' (error %d)", path.replace('%', "%%")),
                    &["rc"],
                );
                out.close();
            }
        }
    }

    fn allocate(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str) {
        let bytes = byte_count(ty, count);
        match self.alignment {
            Some(alignment) => {
                let call = format!(
                    "memkind_posix_memalign(kind, (void**) &{}, {}, {})",
                    name, alignment, bytes
                );
                emit_status_guarded(out, &call, name, "memkind_posix_memalign");
            }
            None => {
                out.add_line(format!("{} = ({}*) memkind_malloc(kind, {});", name, ty, bytes));
                emit_null_guard(out, name, "memkind_malloc");
            }
        }
    }

    fn free(&self, out: &mut CodeSection, name: &str, _ty: CType, _count: &str) {
        out.add_line(format!("memkind_free(kind, {});", name));
    }

    fn finalize(&self, out: &mut CodeSection) {
        if let KindSource::Pmem(_) = self.source {
            out.add_line("memkind_destroy_kind(kind);");
        }
        out.add_line("memkind_finalize();");
    }

    fn link_flags(&self) -> Vec<String> {
        vec!["-lmemkind".to_string()]
    }
}

/// High-bandwidth memory through `hbwmalloc.h`
#[derive(Debug, Clone)]
pub struct HbwAllocator {
    alignment: Option<u64>,
}

impl HbwAllocator {
    pub fn new(alignment: Option<u64>) -> Self {
        Self { alignment }
    }
}

impl Allocator for HbwAllocator {
    fn kind(&self) -> AllocatorKind {
        AllocatorKind::MemkindHbw
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(Include::system("hbwmalloc.h"));
        emit_availability_guard(
            out,
            "hbw_check_available() != 0",
            "err: high-bandwidth memory is not available",
            &[],
        );
        out.add_line("hbw_set_policy(HBW_POLICY_BIND_ALL);");
    }

    fn allocate(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str) {
        let bytes = byte_count(ty, count);
        match self.alignment {
            Some(alignment) => {
                let call = format!("hbw_posix_memalign((void**) &{}, {}, {})", name, alignment, bytes);
                emit_status_guarded(out, &call, name, "hbw_posix_memalign");
            }
            None => {
                out.add_line(format!("{} = ({}*) hbw_malloc({});", name, ty, bytes));
                emit_null_guard(out, name, "hbw_malloc");
            }
        }
    }

    fn free(&self, out: &mut CodeSection, name: &str, _ty: CType, _count: &str) {
        out.add_line(format!("hbw_free({});", name));
    }

    fn link_flags(&self) -> Vec<String> {
        vec!["-lmemkind".to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predefined_kind() {
        let memkind = MemkindAllocator::new(KindSource::Predefined("MEMKIND_DAX_KMEM".to_string()), None);
        let mut init = CodeSection::new();
        memkind.initialize(&mut init);
        assert!(init.code().starts_with("memkind_t kind = MEMKIND_DAX_KMEM;\n"));
        assert!(init.code().contains("memkind_check_available(kind)"));

        let mut fin = CodeSection::new();
        memkind.finalize(&mut fin);
        assert_eq!(fin.code(), "memkind_finalize();\n", "predefined kinds are not destroyed");
    }

    #[test]
    fn test_pmem_kind_is_created_and_destroyed() {
        let pmem = MemkindAllocator::new(KindSource::Pmem("/mnt/pmem0".to_string()), None);
        assert_eq!(pmem.kind(), AllocatorKind::MemkindPmem);

        let mut init = CodeSection::new();
        pmem.initialize(&mut init);
        assert!(init.code().contains("memkind_create_pmem(\"/mnt/pmem0\", 0, &kind);"));
        assert!(init
            .code()
            .contains("fprintf(stderr, \"err: failed to create a pmem kind on '/mnt/pmem0' (error %d)\\n\", rc);"));

        let mut fin = CodeSection::new();
        pmem.finalize(&mut fin);
        assert_eq!(fin.code(), "memkind_destroy_kind(kind);\nmemkind_finalize();\n");
    }

    #[test]
    fn test_aligned_memkind_argument_order() {
        let memkind = MemkindAllocator::new(KindSource::Predefined("MEMKIND_DEFAULT".to_string()), Some(64));
        let mut out = CodeSection::new();
        memkind.allocate(&mut out, "A", CType::Double, "N");
        assert!(out
            .code()
            .contains("memkind_posix_memalign(kind, (void**) &A, 64, sizeof(double) * (size_t) (N))"));
    }

    #[test]
    fn test_hbw() {
        let hbw = HbwAllocator::new(None);
        let mut init = CodeSection::new();
        hbw.initialize(&mut init);
        assert!(init.code().contains("hbw_check_available()"));
        assert!(init.code().contains("return 1;"));

        let mut out = CodeSection::new();
        hbw.allocate(&mut out, "A", CType::Double, "N");
        hbw.free(&mut out, "A", CType::Double, "N");
        assert!(out.code().contains("A = (double*) hbw_malloc("));
        assert!(out.code().ends_with("hbw_free(A);\n"));
        assert_eq!(hbw.link_flags(), vec!["-lmemkind".to_string()]);
    }
}
