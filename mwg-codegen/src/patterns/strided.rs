//! Strided kernels: copy, scale, add, triad, load and store
//!
//! Each array holds `N = stride * (size / arrays) / sizeof(T)` elements. The
//! kernel loop starts a chunk every `stride + chunk - 1` elements and stops
//! `stride + chunk` elements before the end, so no offset can leave the array.

use super::{declare_scratch, emit_register_load, firstprivate, ArrayRole, ArraySpec, EmitContext};
use crate::emit::CodeSection;
use log::debug;
use mwg_common::{Config, DataType, GeneratorError, PatternId, Result};

/// Chunks up to this size are unrolled; larger chunks get an inner loop
const UNROLL_LIMIT: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StridedKernel {
    Copy,
    Scale,
    Add,
    Triad,
    Load,
    Store,
}

impl StridedKernel {
    pub fn from_id(id: PatternId) -> Option<Self> {
        match id {
            PatternId::StridedCopy => Some(StridedKernel::Copy),
            PatternId::StridedScale => Some(StridedKernel::Scale),
            PatternId::StridedAdd => Some(StridedKernel::Add),
            PatternId::StridedTriad => Some(StridedKernel::Triad),
            PatternId::StridedLoad => Some(StridedKernel::Load),
            PatternId::StridedStore => Some(StridedKernel::Store),
            _ => None,
        }
    }

    pub fn id(&self) -> PatternId {
        match self {
            StridedKernel::Copy => PatternId::StridedCopy,
            StridedKernel::Scale => PatternId::StridedScale,
            StridedKernel::Add => PatternId::StridedAdd,
            StridedKernel::Triad => PatternId::StridedTriad,
            StridedKernel::Load => PatternId::StridedLoad,
            StridedKernel::Store => PatternId::StridedStore,
        }
    }

    /// Number of logical arrays the kernel works on
    pub fn array_count(&self) -> u64 {
        match self {
            StridedKernel::Load | StridedKernel::Store => 1,
            StridedKernel::Copy | StridedKernel::Scale => 2,
            StridedKernel::Add | StridedKernel::Triad => 3,
        }
    }

    /// The array the kernel writes, if any
    pub fn output(&self) -> Option<&'static str> {
        match self {
            StridedKernel::Copy | StridedKernel::Scale => Some("B"),
            StridedKernel::Add | StridedKernel::Triad => Some("C"),
            StridedKernel::Store => Some("A"),
            StridedKernel::Load => None,
        }
    }
}

/// Index arithmetic of the strided loop over `elements` per array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StridedLayout {
    pub elements: u64,
    pub stride: u64,
    pub chunk: u64,
}

impl StridedLayout {
    /// Distance between the starts of consecutive chunks
    pub fn step(&self) -> u64 {
        self.stride + self.chunk - 1
    }

    /// Exclusive upper bound of the loop variable, `None` if the loop would not run
    pub fn limit(&self) -> Option<u64> {
        self.elements
            .checked_sub(self.stride + self.chunk)
            .filter(|&limit| limit > 0)
    }

    pub fn iterations(&self) -> u64 {
        self.limit().map_or(0, |limit| (limit - 1) / self.step() + 1)
    }

    /// Largest element index the loop visits
    pub fn max_index(&self) -> Option<u64> {
        self.limit()
            .map(|limit| (limit - 1) / self.step() * self.step() + self.chunk - 1)
    }
}

#[derive(Debug, Clone)]
pub struct StridedPattern {
    kernel: StridedKernel,
    layout: StridedLayout,
    per_array_bytes: u64,
    data_type: DataType,
    arithmetic_intensity: u32,
    arrays: Vec<ArraySpec>,
}

impl StridedPattern {
    pub fn new(config: &Config) -> Result<Self> {
        let kernel = StridedKernel::from_id(config.pattern()).ok_or_else(|| GeneratorError::UnknownPattern {
            name: config.pattern().to_string(),
            known: "strided-copy, strided-scale, strided-add, strided-triad, strided-load, strided-store"
                .to_string(),
        })?;
        let data_type = config.data_type();
        let per_array_bytes = config.size() / kernel.array_count();
        let elements = config
            .stride()
            .checked_mul(per_array_bytes)
            .map(|bytes| bytes / data_type.size_in_bytes())
            .filter(|&n| n <= i64::MAX as u64)
            .ok_or_else(|| GeneratorError::invalid_parameter("stride", "stride * size overflows the element count"))?;

        let layout = StridedLayout {
            elements,
            stride: config.stride(),
            chunk: config.chunk_size(),
        };
        if layout.limit().is_none() {
            return Err(GeneratorError::invalid_parameter(
                "size",
                format!(
                    "{} elements per array leave no room for stride {} and chunk {}",
                    elements, layout.stride, layout.chunk
                ),
            ));
        }
        debug!(
            "{}: {} arrays of {} elements, {} iterations of step {}",
            kernel.id(),
            kernel.array_count(),
            elements,
            layout.iterations(),
            layout.step()
        );

        let arrays = ["A", "B", "C"]
            .iter()
            .take(kernel.array_count() as usize)
            .map(|&name| {
                let role = if kernel.output() == Some(name) {
                    ArrayRole::Output
                } else {
                    ArrayRole::Input(data_type.literal(1))
                };
                ArraySpec::new(name, data_type.c_type(), "N", role)
            })
            .collect();

        Ok(Self {
            kernel,
            layout,
            per_array_bytes,
            data_type,
            arithmetic_intensity: config.arithmetic_intensity(),
            arrays,
        })
    }

    pub fn id(&self) -> PatternId {
        self.kernel.id()
    }

    pub fn kernel(&self) -> StridedKernel {
        self.kernel
    }

    pub fn layout(&self) -> StridedLayout {
        self.layout
    }

    pub fn arrays(&self) -> &[ArraySpec] {
        &self.arrays
    }

    pub fn write_header(&self, cx: &EmitContext, out: &mut CodeSection) {
        out.add_line(format!(
            "long N = ((long) {} * {}L) / (long) sizeof({});",
            self.layout.stride, self.per_array_bytes, self.data_type
        ));
        for array in &self.arrays {
            cx.allocate(out, array);
        }
    }

    pub fn write_body(&self, cx: &EmitContext, out: &mut CodeSection) {
        let loads = self.kernel == StridedKernel::Load;
        if loads {
            declare_scratch(out);
        }

        let inputs: Vec<&str> = self
            .arrays
            .iter()
            .filter(|a| !a.is_output())
            .map(|a| a.name)
            .collect();
        let mut clauses = vec![firstprivate(&inputs)];
        if loads {
            clauses.push("reduction(+:scratch)".to_string());
        }
        cx.parallel_for(out, &clauses);

        out.open(format!(
            "for (long i = 0; i < N - {}; i += {}) {{",
            self.layout.stride + self.layout.chunk,
            self.layout.step()
        ));
        if self.layout.chunk < UNROLL_LIMIT {
            for offset in 0..self.layout.chunk {
                let index = match offset {
                    0 => "i".to_string(),
                    _ => format!("i + {}", offset),
                };
                self.write_element(out, &index);
            }
        } else {
            out.open(format!("for (long j = 0; j < {}; j++) {{", self.layout.chunk));
            self.write_element(out, "i + j");
            out.close();
        }
        out.close();

        match self.kernel.output() {
            Some(output) => out.add_line(format!("result = {}[0];", output)),
            None => out.add_line("result = A[0] + (double) scratch;"),
        }
    }

    fn write_element(&self, out: &mut CodeSection, index: &str) {
        let three = self.data_type.literal(3);
        match self.kernel {
            StridedKernel::Copy => out.add_line(format!("B[{0}] = A[{0}];", index)),
            StridedKernel::Scale => out.add_line(format!("B[{0}] = {1} * A[{0}];", index, three)),
            StridedKernel::Add => out.add_line(format!("C[{0}] = A[{0}] + B[{0}];", index)),
            StridedKernel::Triad => out.add_line(format!("C[{0}] = A[{0}] + {1} * B[{0}];", index, three)),
            StridedKernel::Store => out.add_line(format!("A[{}] = {};", index, three)),
            StridedKernel::Load => {
                out.open("{");
                emit_register_load(
                    out,
                    self.data_type.c_type(),
                    "A",
                    index,
                    "value",
                    self.arithmetic_intensity,
                );
                out.add_line("scratch += value;");
                out.close();
            }
        }
    }
}
