//! OpenMP memory allocators

use super::{byte_count, emit_null_guard, Allocator};
use crate::emit::CodeSection;
use mwg_common::{AllocatorKind, CType, Include};

#[derive(Debug, Clone)]
pub struct OpenMpAllocator {
    handle: String,
    alignment: Option<u64>,
}

impl OpenMpAllocator {
    /// `handle` is one of the predefined `omp_*_mem_alloc` allocators
    pub fn new(handle: impl Into<String>, alignment: Option<u64>) -> Self {
        Self {
            handle: handle.into(),
            alignment,
        }
    }
}

impl Allocator for OpenMpAllocator {
    fn kind(&self) -> AllocatorKind {
        AllocatorKind::OpenMp
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(Include::system("omp.h"));
    }

    fn allocate(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str) {
        let bytes = byte_count(ty, count);
        let call = match self.alignment {
            Some(alignment) => format!("omp_aligned_alloc({}, {}, {})", alignment, bytes, self.handle),
            None => format!("omp_alloc({}, {})", bytes, self.handle),
        };
        out.add_line(format!("{} = ({}*) {};", name, ty, call));
        emit_null_guard(out, name, &self.handle);
    }

    fn free(&self, out: &mut CodeSection, name: &str, _ty: CType, _count: &str) {
        out.add_line(format!("omp_free({}, {});", name, self.handle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_calls() {
        let mut out = CodeSection::new();
        OpenMpAllocator::new("omp_high_bw_mem_alloc", None).allocate(&mut out, "x", CType::Float, "NF");
        assert!(out
            .code()
            .starts_with("x = (float*) omp_alloc(sizeof(float) * (size_t) (NF), omp_high_bw_mem_alloc);"));

        let mut out = CodeSection::new();
        OpenMpAllocator::new("omp_default_mem_alloc", Some(64)).allocate(&mut out, "x", CType::Float, "NF");
        assert!(out.code().contains("omp_aligned_alloc(64, sizeof(float) * (size_t) (NF), omp_default_mem_alloc)"));
    }

    #[test]
    fn test_free_uses_the_same_handle() {
        let mut out = CodeSection::new();
        OpenMpAllocator::new("omp_large_cap_mem_alloc", None).free(&mut out, "x", CType::Float, "NF");
        assert_eq!(out.code(), "omp_free(x, omp_large_cap_mem_alloc);\n");
    }
}
