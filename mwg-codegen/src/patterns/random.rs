//! Pointer-chasing kernels over a shuffled successor table
//!
//! The index domain holds `size / (chunk * sizeof(T))` offsets and offset `o`
//! owns `data[o * chunk .. (o + 1) * chunk)`. Element `j` of offset `o` lives
//! at `offset * chunkSize + j`, so distinct offsets never share an element and
//! `data` holds `size * chunkSize` elements, `size` being the offset count of
//! the generated program. The domain is split into one partition per worker
//! (the last worker also takes the remainder). Each partition is shuffled into
//! a visit order and linked into a single cycle, so a worker chasing its
//! partition touches every one of its chunks once and never leaves the
//! partition.

use super::{declare_scratch, emit_register_load, firstprivate, omp_directive, ArrayRole, ArraySpec, EmitContext};
use crate::emit::CodeSection;
use log::debug;
use mwg_common::{prng, CType, Config, DataType, GeneratorError, Include, PatternId, Result};
use std::ops::Range;

const PARTITION_HELPERS: &str = "\
static size_t mwg_partition_start(size_t domain, size_t workers, size_t k) {
    return (domain / workers) * k;
}

static size_t mwg_partition_len(size_t domain, size_t workers, size_t k) {
    size_t per = domain / workers;
    return k + 1 == workers ? domain - per * k : per;
}";

/// Offsets owned by worker `k` of `workers`
pub fn partition(domain: u64, workers: u64, k: u64) -> Range<u64> {
    let per = domain / workers;
    let start = per * k;
    let end = if k + 1 == workers { domain } else { start + per };
    start..end
}

/// The successor table the generated program builds for `workers` partitions
pub fn successor_table(domain: u64, workers: u64) -> Vec<u64> {
    let mut order: Vec<u64> = (0..domain).collect();
    let mut next = vec![0; domain as usize];
    for k in 0..workers {
        let range = partition(domain, workers, k);
        let start = range.start as usize;
        let len = (range.end - range.start) as usize;
        prng::shuffle_range(&mut order, start, len, prng::SEED);
        for s in 0..len {
            next[order[start + s] as usize] = order[start + (s + 1) % len];
        }
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseKernel {
    Load,
    Store,
    Sum,
}

impl ChaseKernel {
    pub fn from_id(id: PatternId) -> Option<Self> {
        match id {
            PatternId::RandomLoad => Some(ChaseKernel::Load),
            PatternId::RandomStore => Some(ChaseKernel::Store),
            PatternId::RandomSum => Some(ChaseKernel::Sum),
            _ => None,
        }
    }

    pub fn id(&self) -> PatternId {
        match self {
            ChaseKernel::Load => PatternId::RandomLoad,
            ChaseKernel::Store => PatternId::RandomStore,
            ChaseKernel::Sum => PatternId::RandomSum,
        }
    }

    fn accumulator(&self) -> Option<&'static str> {
        match self {
            ChaseKernel::Load => Some("scratch"),
            ChaseKernel::Sum => Some("sum"),
            ChaseKernel::Store => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PointerChasePattern {
    kernel: ChaseKernel,
    size: u64,
    chunk: u64,
    domain: u64,
    data_type: DataType,
    arithmetic_intensity: u32,
    arrays: Vec<ArraySpec>,
}

impl PointerChasePattern {
    pub fn new(config: &Config) -> Result<Self> {
        let kernel = ChaseKernel::from_id(config.pattern()).ok_or_else(|| GeneratorError::UnknownPattern {
            name: config.pattern().to_string(),
            known: "random-load, random-store, random-sum".to_string(),
        })?;
        let data_type = config.data_type();
        let chunk = config.chunk_size();
        let domain = chunk
            .checked_mul(data_type.size_in_bytes())
            .map(|chunk_bytes| config.size() / chunk_bytes)
            .unwrap_or(0);
        if domain == 0 {
            return Err(GeneratorError::invalid_parameter(
                "size",
                format!("{} bytes do not hold a single chunk of {} elements", config.size(), chunk),
            ));
        }
        debug!("{}: domain of {} offsets, chunks of {} elements", kernel.id(), domain, chunk);

        let arrays = vec![
            ArraySpec::new("order", CType::SizeT, "size", ArrayRole::Index),
            ArraySpec::new("next_indices", CType::SizeT, "size", ArrayRole::Index),
            ArraySpec::new(
                "data",
                data_type.c_type(),
                "size * chunkSize",
                ArrayRole::Input(data_type.literal(1)),
            ),
        ];

        Ok(Self {
            kernel,
            size: config.size(),
            chunk,
            domain,
            data_type,
            arithmetic_intensity: config.arithmetic_intensity(),
            arrays,
        })
    }

    pub fn id(&self) -> PatternId {
        self.kernel.id()
    }

    /// Number of offsets in the chased domain
    pub fn domain(&self) -> u64 {
        self.domain
    }

    pub fn arrays(&self) -> &[ArraySpec] {
        &self.arrays
    }

    pub fn write_definitions(&self, _cx: &EmitContext, out: &mut CodeSection) {
        out.add_block(prng::SHUFFLE_DEFINITION);
        out.add_line("");
        out.add_block(PARTITION_HELPERS);
        out.add_line("");
    }

    pub fn write_header(&self, cx: &EmitContext, out: &mut CodeSection) {
        out.add_line(format!(
            "size_t size = (size_t) {}ULL / ((size_t) {} * sizeof({}));",
            self.size, self.chunk, self.data_type
        ));
        out.add_line(format!("size_t chunkSize = {};", self.chunk));
        if cx.parallel() {
            out.include(Include::system("omp.h"));
            out.add_line("omp_set_dynamic(0);");
            out.add_line("size_t workers = (size_t) omp_get_max_threads();");
        } else {
            out.add_line("size_t workers = 1;");
        }

        let (order, next, data) = (&self.arrays[0], &self.arrays[1], &self.arrays[2]);
        cx.allocate(out, order);
        cx.allocate(out, next);

        cx.parallel_for(out, &[]);
        out.open("for (size_t i = 0; i < size; i++) {");
        out.add_line("order[i] = i;");
        out.close();

        cx.parallel_for(out, &[]);
        out.open("for (size_t k = 0; k < workers; k++) {");
        out.add_line("size_t start = mwg_partition_start(size, workers, k);");
        out.add_line("size_t len = mwg_partition_len(size, workers, k);");
        out.add_line("mwg_shuffle(order, start, len, MWG_SEED);");
        out.open("for (size_t s = 0; s < len; s++) {");
        out.add_line("next_indices[order[start + s]] = order[start + (s + 1) % len];");
        out.close();
        out.close();

        cx.allocate(out, data);
    }

    pub fn write_body(&self, cx: &EmitContext, out: &mut CodeSection) {
        match self.kernel {
            ChaseKernel::Load => declare_scratch(out),
            ChaseKernel::Sum => out.add_line("double sum = 0.0;"),
            ChaseKernel::Store => {}
        }

        if cx.parallel() {
            let mut clauses = vec!["num_threads(workers)".to_string(), firstprivate(&["data", "next_indices"])];
            if let Some(accumulator) = self.kernel.accumulator() {
                clauses.push(format!("reduction(+:{})", accumulator));
            }
            out.add_line(omp_directive("#pragma omp parallel", &clauses));
            out.open("{");
            out.add_line("size_t k = (size_t) omp_get_thread_num();");
            out.add_line("size_t offset = mwg_partition_start(size, workers, k);");
            out.add_line("size_t len = mwg_partition_len(size, workers, k);");
            self.write_chase(out, "len");
            out.close();
        } else {
            out.add_line("size_t offset = 0;");
            self.write_chase(out, "size");
        }

        match self.kernel {
            ChaseKernel::Load => out.add_line("result = data[0] + (double) scratch;"),
            ChaseKernel::Store => out.add_line("result = data[0];"),
            ChaseKernel::Sum => out.add_line("result = sum;"),
        }
    }

    fn write_chase(&self, out: &mut CodeSection, steps: &str) {
        out.open(format!("for (size_t i = 0; i < {}; i++) {{", steps));
        out.open("for (size_t j = 0; j < chunkSize; j++) {");
        let element = "offset * chunkSize + j";
        match self.kernel {
            ChaseKernel::Load => {
                emit_register_load(
                    out,
                    self.data_type.c_type(),
                    "data",
                    element,
                    "value",
                    self.arithmetic_intensity,
                );
                out.add_line("scratch += value;");
            }
            ChaseKernel::Store => out.add_line(format!("data[{}] = {};", element, self.data_type.literal(3))),
            ChaseKernel::Sum => out.add_line(format!("sum += data[{}];", element)),
        }
        out.close();
        out.add_line("offset = next_indices[offset];");
        out.close();
    }
}
