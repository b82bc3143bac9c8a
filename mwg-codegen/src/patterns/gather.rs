//! Gather and scatter through a random index array
//!
//! The backing array `y` spans the working set (`NF` elements); the primary
//! array `x` and the index array `idx` are `GATHER_FACTOR` times smaller.
//! Indices are drawn in the header, outside the timed kernel.

use super::{firstprivate, ArrayRole, ArraySpec, EmitContext};
use crate::emit::CodeSection;
use log::debug;
use mwg_common::{CType, Config, DataType, GeneratorError, PatternId, Result};

/// Size ratio between the backing array and the primary array
pub const GATHER_FACTOR: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectKernel {
    /// `x[i] = y[idx[i]]`
    Gather,
    /// `y[idx[i]] = x[i]`
    Scatter,
}

impl IndirectKernel {
    pub fn from_id(id: PatternId) -> Option<Self> {
        match id {
            PatternId::Gather => Some(IndirectKernel::Gather),
            PatternId::Scatter => Some(IndirectKernel::Scatter),
            _ => None,
        }
    }

    pub fn id(&self) -> PatternId {
        match self {
            IndirectKernel::Gather => PatternId::Gather,
            IndirectKernel::Scatter => PatternId::Scatter,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndirectPattern {
    kernel: IndirectKernel,
    size: u64,
    data_type: DataType,
    primary_elements: u64,
    arrays: Vec<ArraySpec>,
}

impl IndirectPattern {
    pub fn new(config: &Config) -> Result<Self> {
        let kernel = IndirectKernel::from_id(config.pattern()).ok_or_else(|| GeneratorError::UnknownPattern {
            name: config.pattern().to_string(),
            known: "gather, scatter".to_string(),
        })?;
        let data_type = config.data_type();
        let backing_elements = config.size() / data_type.size_in_bytes();
        let primary_elements = backing_elements / GATHER_FACTOR;
        if primary_elements == 0 {
            return Err(GeneratorError::invalid_parameter(
                "size",
                format!(
                    "{} needs at least {} elements of {}, got {}",
                    kernel.id(),
                    GATHER_FACTOR,
                    data_type,
                    backing_elements
                ),
            ));
        }
        debug!(
            "{}: {} backing elements, {} indexed accesses",
            kernel.id(),
            backing_elements,
            primary_elements
        );

        let value = ArrayRole::Input(data_type.literal(3));
        let (y_role, x_role) = match kernel {
            IndirectKernel::Gather => (value, ArrayRole::Output),
            IndirectKernel::Scatter => (ArrayRole::Output, value),
        };
        let arrays = vec![
            ArraySpec::new("y", data_type.c_type(), "NF", y_role),
            ArraySpec::new("x", data_type.c_type(), "N", x_role),
            ArraySpec::new("idx", CType::SizeT, "N", ArrayRole::Index),
        ];

        Ok(Self {
            kernel,
            size: config.size(),
            data_type,
            primary_elements,
            arrays,
        })
    }

    pub fn id(&self) -> PatternId {
        self.kernel.id()
    }

    /// Number of indexed accesses of the kernel
    pub fn primary_elements(&self) -> u64 {
        self.primary_elements
    }

    pub fn arrays(&self) -> &[ArraySpec] {
        &self.arrays
    }

    pub fn write_header(&self, cx: &EmitContext, out: &mut CodeSection) {
        out.add_line(format!(
            "long NF = (long) {}L / (long) sizeof({});",
            self.size, self.data_type
        ));
        out.add_line(format!("long F = {};", GATHER_FACTOR));
        out.add_line("long N = NF / F;");
        for array in &self.arrays {
            cx.allocate(out, array);
        }

        cx.parallel_for(out, &[]);
        out.open("for (long i = 0; i < N; i++) {");
        out.add_line("idx[i] = (size_t) (mwg_mix(MWG_SEED + (uint64_t) i) % (uint64_t) NF);");
        out.close();
    }

    pub fn write_body(&self, cx: &EmitContext, out: &mut CodeSection) {
        match self.kernel {
            IndirectKernel::Gather => {
                cx.parallel_for(out, &[firstprivate(&["y", "idx"])]);
                out.open("for (long i = 0; i < N; i++) {");
                out.add_line("x[i] = y[idx[i]];");
                out.close();
                out.add_line("result = x[N - 1];");
            }
            IndirectKernel::Scatter => {
                // Colliding indices store the same value, so unordered writes are benign
                cx.parallel_for(out, &[firstprivate(&["x", "idx"])]);
                out.open("for (long i = 0; i < N; i++) {");
                out.add_line("y[idx[i]] = x[i];");
                out.close();
                out.add_line("result = y[idx[N - 1]];");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::MallocFamily;
    use indoc::indoc;
    use mwg_common::prng;
    use pretty_assertions::assert_eq;

    fn emitted(config: &Config) -> (String, String) {
        let pattern = IndirectPattern::new(config).unwrap();
        let allocator = MallocFamily::stdlib(None);
        let cx = EmitContext::new(config, &allocator);
        let mut header = CodeSection::new();
        let mut body = CodeSection::new();
        pattern.write_header(&cx, &mut header);
        pattern.write_body(&cx, &mut body);
        (header.code().to_string(), body.code().to_string())
    }

    #[test]
    fn test_serial_gather() {
        let config = Config::builder().pattern(PatternId::Gather).build().unwrap();
        let (header, body) = emitted(&config);
        assert!(header.starts_with("long NF = (long) 536870912L / (long) sizeof(double);\nlong F = 1024;\nlong N = NF / F;\n"));
        assert!(header.contains("y[i] = 3.0;"), "the gathered array is an input");
        assert!(!header.contains("x[i] ="));
        assert_eq!(
            body,
            indoc! {"
                for (long i = 0; i < N; i++) {
                    x[i] = y[idx[i]];
                }
                result = x[N - 1];
            "}
        );
    }

    #[test]
    fn test_parallel_scatter() {
        let config = Config::builder()
            .pattern(PatternId::Scatter)
            .data_type(DataType::Int)
            .parallel(true)
            .build()
            .unwrap();
        let (header, body) = emitted(&config);
        assert!(header.contains("x[i] = 3;"));
        assert!(header.contains("#pragma omp parallel for\nfor (long i = 0; i < N; i++) {\n    idx[i] ="));
        assert_eq!(
            body,
            indoc! {"
                #pragma omp parallel for firstprivate(x, idx)
                for (long i = 0; i < N; i++) {
                    y[idx[i]] = x[i];
                }
                result = y[idx[N - 1]];
            "}
        );
    }

    #[test]
    fn test_indices_span_the_backing_array() {
        let config = Config::builder()
            .pattern(PatternId::Gather)
            .size(8 << 20)
            .build()
            .unwrap();
        let pattern = IndirectPattern::new(&config).unwrap();
        let backing = (8u64 << 20) / 8;
        assert_eq!(pattern.primary_elements(), backing / GATHER_FACTOR);
        let max = (0..pattern.primary_elements())
            .map(|i| prng::mix(prng::SEED + i) % backing)
            .max()
            .unwrap();
        assert!(max < backing);
        assert!(max > backing / 2, "draws cover the backing array");
    }

    #[test]
    fn test_rejects_sizes_below_one_indexed_access() {
        let config = Config::builder()
            .pattern(PatternId::Scatter)
            .size(4096)
            .build()
            .unwrap();
        assert!(matches!(
            IndirectPattern::new(&config),
            Err(GeneratorError::InvalidParameter { .. })
        ));
    }
}
