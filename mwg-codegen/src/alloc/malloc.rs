//! C library style allocators
//!
//! The C library and jemalloc share one calling convention, so both are
//! instances of [`MallocFamily`] that differ only in their override table.

use super::{byte_count, emit_null_guard, emit_status_guarded, Allocator};
use crate::emit::CodeSection;
use mwg_common::{AllocatorKind, CType, Include};

/// Per-backend differences within the malloc family
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MallocOverrides {
    pub header: Include,
    pub link_flags: &'static [&'static str],
}

/// `malloc`, `posix_memalign` and `free`
#[derive(Debug, Clone)]
pub struct MallocFamily {
    kind: AllocatorKind,
    overrides: MallocOverrides,
    alignment: Option<u64>,
}

impl MallocFamily {
    pub fn new(kind: AllocatorKind, overrides: MallocOverrides, alignment: Option<u64>) -> Self {
        Self {
            kind,
            overrides,
            alignment,
        }
    }

    pub fn stdlib(alignment: Option<u64>) -> Self {
        Self::new(
            AllocatorKind::Stdlib,
            MallocOverrides {
                header: Include::system("stdlib.h"),
                link_flags: &[],
            },
            alignment,
        )
    }

    pub fn jemalloc(alignment: Option<u64>) -> Self {
        Self::new(
            AllocatorKind::Jemalloc,
            MallocOverrides {
                header: Include::local("jemalloc/jemalloc.h"),
                link_flags: &["-ljemalloc"],
            },
            alignment,
        )
    }
}

impl Allocator for MallocFamily {
    fn kind(&self) -> AllocatorKind {
        self.kind
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(self.overrides.header.clone());
    }

    fn allocate(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str) {
        let bytes = byte_count(ty, count);
        match self.alignment {
            Some(alignment) => {
                let call = format!("posix_memalign((void**) &{}, {}, {})", name, alignment, bytes);
                emit_status_guarded(out, &call, name, "posix_memalign");
            }
            None => {
                out.add_line(format!("{} = ({}*) malloc({});", name, ty, bytes));
                emit_null_guard(out, name, "malloc");
            }
        }
    }

    fn free(&self, out: &mut CodeSection, name: &str, _ty: CType, _count: &str) {
        out.add_line(format!("free({});", name));
    }

    fn link_flags(&self) -> Vec<String> {
        self.overrides.link_flags.iter().map(|f| f.to_string()).collect()
    }
}
