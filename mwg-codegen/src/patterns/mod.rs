//! Access-pattern family
//!
//! Every pattern follows the same four-phase contract: definitions (helpers
//! outside `main`), header (allocation and setup), body (the timed kernel)
//! and footer (teardown). Patterns declare their buffers up front as
//! [`ArraySpec`]s; the shared [`EmitContext`] allocates, initializes and
//! frees each declared buffer exactly once through the configured allocator.

mod gather;
mod random;
mod sparse;
mod strided;

pub use gather::{IndirectKernel, IndirectPattern, GATHER_FACTOR};
pub use random::{partition, successor_table, ChaseKernel, PointerChasePattern};
pub use sparse::{SparseLayout, SparseRowSum, ROW_COUNT, ROW_FACTOR};
pub use strided::{StridedKernel, StridedLayout, StridedPattern};

use crate::alloc::Allocator;
use crate::emit::CodeSection;
use log::{info, warn};
use mwg_common::{CType, Config, Include, Literal, PatternFamily, PatternId, Result};

/// How a pattern uses one of its buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayRole {
    /// Read by the kernel; filled with a literal before use
    Input(Literal),
    /// Written by the kernel; left uninitialized
    Output,
    /// Index structure filled by the pattern's own setup code
    Index,
}

/// A buffer a pattern allocates in its header and frees in its footer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySpec {
    pub name: &'static str,
    pub ty: CType,
    /// C expression of the element count, valid after the header's declarations
    pub count: String,
    pub role: ArrayRole,
}

impl ArraySpec {
    pub fn new(name: &'static str, ty: CType, count: impl Into<String>, role: ArrayRole) -> Self {
        Self {
            name,
            ty,
            count: count.into(),
            role,
        }
    }

    pub fn is_output(&self) -> bool {
        self.role == ArrayRole::Output
    }
}

/// Read-only inputs shared by every emission step of a run
pub struct EmitContext<'a> {
    pub config: &'a Config,
    pub allocator: &'a dyn Allocator,
}

impl<'a> EmitContext<'a> {
    pub fn new(config: &'a Config, allocator: &'a dyn Allocator) -> Self {
        Self { config, allocator }
    }

    pub fn parallel(&self) -> bool {
        self.config.parallel()
    }

    /// Declare and allocate `array`, then fill it if it is an input
    pub fn allocate(&self, out: &mut CodeSection, array: &ArraySpec) {
        out.add_line(format!("{}* {};", array.ty, array.name));
        self.allocator.allocate(out, array.name, array.ty, &array.count);
        if !self.config.silent() {
            out.add_print(
                &format!("Allocated {} with %ld elements", array.name),
                &[&format!("(long) ({})", array.count)],
            );
        }
        if let ArrayRole::Input(value) = array.role {
            self.fill(out, array, value);
        }
    }

    /// Write `value` to every element, from the workers when first touch is enabled
    pub fn fill(&self, out: &mut CodeSection, array: &ArraySpec, value: Literal) {
        if self.config.first_touch() {
            out.add_line("#pragma omp parallel for");
        }
        out.open(format!("for (long i = 0; i < (long) ({}); i++) {{", array.count));
        out.add_line(format!("{}[i] = {};", array.name, value));
        out.close();
        if !self.config.silent() {
            out.add_print(&format!("Initialization of {} completed", array.name), &[]);
        }
    }

    pub fn free(&self, out: &mut CodeSection, array: &ArraySpec) {
        self.allocator.free(out, array.name, array.ty, &array.count);
    }

    /// Emit a work-sharing directive with `clauses` when running in parallel
    pub fn parallel_for(&self, out: &mut CodeSection, clauses: &[String]) {
        if self.parallel() {
            out.add_line(omp_directive("#pragma omp parallel for", clauses));
        }
    }
}

/// `directive` followed by the non-empty `clauses`
pub(crate) fn omp_directive(directive: &str, clauses: &[String]) -> String {
    clauses
        .iter()
        .filter(|c| !c.is_empty())
        .fold(directive.to_string(), |line, clause| format!("{} {}", line, clause))
}

/// `firstprivate(...)` over the given buffers, empty when there are none
pub(crate) fn firstprivate(names: &[&str]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("firstprivate({})", names.join(", "))
    }
}

/// Declare the unsigned accumulator of the load kernels
///
/// Loaded values are raw bit patterns; unsigned addition wraps instead of
/// overflowing.
pub(crate) fn declare_scratch(out: &mut CodeSection) {
    out.include(Include::system("stdint.h"));
    out.add_line("uint64_t scratch = 0;");
}

/// The inline-assembly load of `array[index]` into the `uint64_t` variable `target`
///
/// The load is followed by `intensity` dependent additions on the loaded
/// register, so the compiler can neither drop nor hoist it.
pub(crate) fn emit_register_load(
    out: &mut CodeSection,
    element: CType,
    array: &str,
    index: &str,
    target: &str,
    intensity: u32,
) {
    let (load, add) = match element {
        CType::Int | CType::Float => (r#""movl (%[array], %[index], 4), %k[out]\n""#, r#""addl $3, %k[out]\n""#),
        CType::Long | CType::Double | CType::SizeT => {
            (r#""movq (%[array], %[index], 8), %[out]\n""#, r#""addq $3, %[out]\n""#)
        }
    };
    out.include(Include::system("stdint.h"));
    out.add_line(format!("uint64_t {};", target));
    out.add_line(format!("size_t index = {};", index));
    out.open("__asm__ volatile (");
    out.add_line(load);
    for _ in 0..intensity {
        out.add_line(add);
    }
    out.add_line(format!(": [out] \"=r\" ({})", target));
    out.add_line(format!(": [array] \"r\" ({}), [index] \"r\" (index)", array));
    out.add_line(": \"cc\"");
    out.dedent();
    out.add_line(");");
}

/// A resolved access pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    Strided(StridedPattern),
    PointerChase(PointerChasePattern),
    Indirect(IndirectPattern),
    SparseRowSum(SparseRowSum),
}

impl Pattern {
    /// Resolve the configured pattern and check that its working set fits its layout
    pub fn from_config(config: &Config) -> Result<Self> {
        let id = config.pattern();
        info!("Resolving access pattern {}", id);

        if id.family() != PatternFamily::Strided && config.stride() != 1 {
            warn!("The stride parameter is ignored by the {} pattern", id);
        }

        let pattern = match id.family() {
            PatternFamily::Strided => Pattern::Strided(StridedPattern::new(config)?),
            PatternFamily::PointerChase => Pattern::PointerChase(PointerChasePattern::new(config)?),
            PatternFamily::Indirect => Pattern::Indirect(IndirectPattern::new(config)?),
            PatternFamily::Sparse => Pattern::SparseRowSum(SparseRowSum::new(config)?),
        };
        Ok(pattern)
    }

    pub fn id(&self) -> PatternId {
        match self {
            Pattern::Strided(p) => p.id(),
            Pattern::PointerChase(p) => p.id(),
            Pattern::Indirect(p) => p.id(),
            Pattern::SparseRowSum(_) => PatternId::SparseRowSum,
        }
    }

    /// Buffers in allocation order
    pub fn arrays(&self) -> &[ArraySpec] {
        match self {
            Pattern::Strided(p) => p.arrays(),
            Pattern::PointerChase(p) => p.arrays(),
            Pattern::Indirect(p) => p.arrays(),
            Pattern::SparseRowSum(p) => p.arrays(),
        }
    }

    /// Whether the generated program needs the `mwg_mix` helpers
    pub fn uses_randomness(&self) -> bool {
        !matches!(self, Pattern::Strided(_))
    }

    pub fn write_definitions(&self, cx: &EmitContext, out: &mut CodeSection) {
        if let Pattern::PointerChase(p) = self {
            p.write_definitions(cx, out);
        }
    }

    pub fn write_header(&self, cx: &EmitContext, out: &mut CodeSection) {
        match self {
            Pattern::Strided(p) => p.write_header(cx, out),
            Pattern::PointerChase(p) => p.write_header(cx, out),
            Pattern::Indirect(p) => p.write_header(cx, out),
            Pattern::SparseRowSum(p) => p.write_header(cx, out),
        }
    }

    /// The timed kernel; assigns the observable `result`
    pub fn write_body(&self, cx: &EmitContext, out: &mut CodeSection) {
        match self {
            Pattern::Strided(p) => p.write_body(cx, out),
            Pattern::PointerChase(p) => p.write_body(cx, out),
            Pattern::Indirect(p) => p.write_body(cx, out),
            Pattern::SparseRowSum(p) => p.write_body(cx, out),
        }
    }

    pub fn write_footer(&self, cx: &EmitContext, out: &mut CodeSection) {
        for array in self.arrays() {
            cx.free(out, array);
        }
    }
}
