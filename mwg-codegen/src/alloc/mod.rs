//! Allocation strategies
//!
//! Every buffer of a generated workload is allocated and released through an
//! [`Allocator`]. Backends are resolved once from the validated [`Config`]
//! and never change during a run. Each `allocate` emits a declaration-free
//! assignment followed by a failure guard that terminates the generated
//! program with a diagnostic and a non-zero status.

mod malloc;
mod memkind;
mod numa;
mod openmp;

pub use malloc::{MallocFamily, MallocOverrides};
pub use memkind::{HbwAllocator, KindSource, MemkindAllocator};
pub use numa::NumaAllocator;
pub use openmp::OpenMpAllocator;

use crate::emit::CodeSection;
use log::debug;
use mwg_common::{AllocatorKind, CType, Config, GeneratorError, Include, Placement, Result};

/// Memory lifecycle emission for one backend
pub trait Allocator {
    fn kind(&self) -> AllocatorKind;

    /// One-time setup, emitted before the first allocation
    fn initialize(&self, out: &mut CodeSection);

    /// Assign `name` a fresh buffer of `count` elements of `ty`, followed by a failure guard
    fn allocate(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str);

    /// Release a buffer obtained from [`allocate`](Self::allocate)
    fn free(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str);

    /// Backend teardown, emitted after the last free
    fn finalize(&self, _out: &mut CodeSection) {}

    fn compile_flags(&self) -> Vec<String> {
        Vec::new()
    }

    fn link_flags(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Build the allocator selected by `config`
pub fn resolve(config: &Config) -> Result<Box<dyn Allocator>> {
    let kind = config.allocator();
    let alignment = config.alignment();
    debug!("Resolving allocator {} (alignment: {:?}, placement: {:?})", kind, alignment, config.placement());

    let mismatch = || GeneratorError::InvalidLocation {
        allocator: kind.to_string(),
        location: format!("{:?}", config.placement()),
        hint: "placement does not belong to this allocator".to_string(),
    };

    let allocator: Box<dyn Allocator> = match (kind, config.placement()) {
        (AllocatorKind::Stdlib, None) => Box::new(MallocFamily::stdlib(alignment)),
        (AllocatorKind::Jemalloc, None) => Box::new(MallocFamily::jemalloc(alignment)),
        (AllocatorKind::MemkindHbw, None) => Box::new(HbwAllocator::new(alignment)),
        (AllocatorKind::Memkind, Some(Placement::MemoryKind(name))) => Box::new(MemkindAllocator::new(
            KindSource::Predefined(name.clone()),
            alignment,
        )),
        (AllocatorKind::MemkindPmem, Some(Placement::PmemPath(path))) => {
            Box::new(MemkindAllocator::new(KindSource::Pmem(path.clone()), alignment))
        }
        (AllocatorKind::Libnuma, Some(placement)) => Box::new(NumaAllocator::new(placement.clone())?),
        (AllocatorKind::OpenMp, Some(Placement::OmpAllocator(handle))) => {
            if !config.parallel() {
                return Err(GeneratorError::RequiresParallel {
                    allocator: kind.to_string(),
                });
            }
            Box::new(OpenMpAllocator::new(handle.clone(), alignment))
        }
        (_, None) => {
            return Err(GeneratorError::MissingLocation {
                allocator: kind.to_string(),
                hint: "resolve the configuration through ConfigBuilder::build".to_string(),
            })
        }
        (_, Some(_)) => return Err(mismatch()),
    };
    Ok(allocator)
}

/// `sizeof(T) * (size_t) (count)`
pub(crate) fn byte_count(ty: CType, count: &str) -> String {
    format!("sizeof({}) * (size_t) ({})", ty, count)
}

/// Guard a pointer-returning allocation call
pub(crate) fn emit_null_guard(out: &mut CodeSection, name: &str, backend: &str) {
    out.include(Include::system("stdio.h"));
    out.include(Include::system("stdlib.h"));
    out.open(format!("if ({} == NULL) {{", name));
    out.add_error_print(&format!("err: failed to allocate '{}' using {}", name, backend), &[]);
    out.add_line("exit(EXIT_FAILURE);");
    out.close();
}

/// Emit a status-returning allocation call in its own scope, then guard its result
pub(crate) fn emit_status_guarded(out: &mut CodeSection, call: &str, name: &str, backend: &str) {
    out.include(Include::system("stdio.h"));
    out.include(Include::system("stdlib.h"));
    out.open("{");
    out.add_line(format!("int rc = {};", call));
    out.open("if (rc != 0) {");
    out.add_error_print(
        &format!("err: failed to allocate '{}' using {} (error %d)", name, backend),
        &["rc"],
    );
    out.add_line("exit(EXIT_FAILURE);");
    out.close();
    out.close();
}

/// Emit an early return from `main` when a backend is unavailable at runtime
pub(crate) fn emit_availability_guard(out: &mut CodeSection, condition: &str, message: &str, args: &[&str]) {
    out.include(Include::system("stdio.h"));
    out.open(format!("if ({}) {{", condition));
    out.add_error_print(message, args);
    out.add_line("return 1;");
    out.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwg_common::ConfigBuilder;

    fn resolved(builder: ConfigBuilder) -> Box<dyn Allocator> {
        let config = builder.build().unwrap();
        resolve(&config).unwrap()
    }

    #[test]
    fn test_resolve_every_backend() {
        let cases = vec![
            (Config::builder(), AllocatorKind::Stdlib),
            (Config::builder().allocator(AllocatorKind::Jemalloc), AllocatorKind::Jemalloc),
            (Config::builder().allocator(AllocatorKind::MemkindHbw), AllocatorKind::MemkindHbw),
            (
                Config::builder().allocator(AllocatorKind::Memkind).location("MEMKIND_DEFAULT"),
                AllocatorKind::Memkind,
            ),
            (
                Config::builder().allocator(AllocatorKind::MemkindPmem).location("/mnt/pmem"),
                AllocatorKind::MemkindPmem,
            ),
            (
                Config::builder().allocator(AllocatorKind::Libnuma).location("local"),
                AllocatorKind::Libnuma,
            ),
            (
                Config::builder()
                    .allocator(AllocatorKind::OpenMp)
                    .location("omp_high_bw_mem_alloc")
                    .parallel(true),
                AllocatorKind::OpenMp,
            ),
        ];
        for (builder, kind) in cases {
            assert_eq!(resolved(builder).kind(), kind);
        }
    }

    #[test]
    fn test_every_allocation_is_guarded() {
        let cases = vec![
            Config::builder(),
            Config::builder().alignment(64),
            Config::builder().allocator(AllocatorKind::Jemalloc).alignment(32),
            Config::builder().allocator(AllocatorKind::MemkindHbw),
            Config::builder().allocator(AllocatorKind::MemkindHbw).alignment(64),
            Config::builder().allocator(AllocatorKind::Memkind).location("MEMKIND_DAX_KMEM"),
            Config::builder()
                .allocator(AllocatorKind::MemkindPmem)
                .location("/mnt/pmem")
                .alignment(8),
            Config::builder().allocator(AllocatorKind::Libnuma).location("2"),
            Config::builder()
                .allocator(AllocatorKind::OpenMp)
                .location("omp_default_mem_alloc")
                .parallel(true)
                .alignment(128),
        ];
        for builder in cases {
            let allocator = resolved(builder);
            let mut out = CodeSection::new();
            allocator.allocate(&mut out, "A", CType::Double, "N");
            let code = out.code();
            assert!(code.contains("exit(EXIT_FAILURE);"), "{}: {}", allocator.kind(), code);
            assert!(code.contains("err: failed to allocate 'A'"), "{}", allocator.kind());
            assert!(out.includes().contains(&Include::system("stdlib.h")));
        }
    }

    #[test]
    fn test_byte_count() {
        assert_eq!(byte_count(CType::SizeT, "size"), "sizeof(size_t) * (size_t) (size)");
    }
}
