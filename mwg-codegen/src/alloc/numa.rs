//! libnuma placement

use super::{byte_count, emit_availability_guard, emit_null_guard, Allocator};
use crate::emit::CodeSection;
use mwg_common::{AllocatorKind, CType, GeneratorError, Include, Placement, Result};

/// Where libnuma places pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumaPolicy {
    Node(u32),
    Local,
    Interleaved,
}

#[derive(Debug, Clone)]
pub struct NumaAllocator {
    policy: NumaPolicy,
}

impl NumaAllocator {
    pub fn new(placement: Placement) -> Result<Self> {
        let policy = match placement {
            Placement::NumaNode(node) => NumaPolicy::Node(node),
            Placement::NumaLocal => NumaPolicy::Local,
            Placement::NumaInterleaved => NumaPolicy::Interleaved,
            other => {
                return Err(GeneratorError::InvalidLocation {
                    allocator: AllocatorKind::Libnuma.to_string(),
                    location: format!("{:?}", other),
                    hint: "expected a node index, 'local' or 'interleaved'".to_string(),
                })
            }
        };
        Ok(Self { policy })
    }
}

impl Allocator for NumaAllocator {
    fn kind(&self) -> AllocatorKind {
        AllocatorKind::Libnuma
    }

    fn initialize(&self, out: &mut CodeSection) {
        out.include(Include::system("numa.h"));
        emit_availability_guard(out, "numa_available() == -1", "err: libnuma is not available on this system", &[]);
    }

    fn allocate(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str) {
        let bytes = byte_count(ty, count);
        let call = match self.policy {
            NumaPolicy::Node(node) => format!("numa_alloc_onnode({}, {})", bytes, node),
            NumaPolicy::Local => format!("numa_alloc_local({})", bytes),
            NumaPolicy::Interleaved => format!("numa_alloc_interleaved({})", bytes),
        };
        out.add_line(format!("{} = ({}*) {};", name, ty, call));
        emit_null_guard(out, name, "libnuma");
    }

    fn free(&self, out: &mut CodeSection, name: &str, ty: CType, count: &str) {
        out.add_line(format!("numa_free({}, {});", name, byte_count(ty, count)));
    }

    fn link_flags(&self) -> Vec<String> {
        vec!["-lnuma".to_string()]
    }
}
