//! Compressed-row sparse sum
//!
//! A fixed number of rows share the working set's non-zeros evenly. Column
//! indices of a row start at a random column and grow by random gaps below
//! `ROW_FACTOR`, so each row stays strictly increasing and inside the
//! `ROW_FACTOR * nnz_per_row` columns of the value array.

use super::{ArrayRole, ArraySpec, EmitContext};
use crate::emit::CodeSection;
use log::debug;
use mwg_common::{prng, CType, Config, DataType, GeneratorError, Result};

pub const ROW_COUNT: u64 = 64;
pub const ROW_FACTOR: u64 = 64;

/// Generator-side model of the row offsets and column indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SparseLayout {
    pub nnz_per_row: u64,
}

impl SparseLayout {
    /// The layout for a value type with `elements` elements in the working set
    pub fn from_elements(elements: u64) -> Self {
        Self {
            nnz_per_row: elements / ROW_COUNT,
        }
    }

    pub fn nnz(&self) -> u64 {
        ROW_COUNT * self.nnz_per_row
    }

    pub fn col_count(&self) -> u64 {
        ROW_FACTOR * self.nnz_per_row
    }

    /// `row_index`, `ROW_COUNT + 1` entries ending with the non-zero count
    pub fn row_offsets(&self) -> Vec<u64> {
        (0..=ROW_COUNT).map(|r| r * self.nnz_per_row).collect()
    }

    /// `col_index`, drawn exactly like the generated initialization loop
    pub fn column_indices(&self) -> Vec<u64> {
        let nnz = self.nnz();
        let gap = |counter: u64| 1 + prng::mix(prng::SEED.wrapping_add(counter)) % (ROW_FACTOR - 1);
        let mut columns = Vec::with_capacity(nnz as usize);
        for r in 0..ROW_COUNT {
            let mut column = gap(nnz + r);
            for j in 0..self.nnz_per_row {
                let slot = r * self.nnz_per_row + j;
                if j > 0 {
                    column += gap(slot);
                }
                columns.push(column);
            }
        }
        columns
    }
}

#[derive(Debug, Clone)]
pub struct SparseRowSum {
    size: u64,
    data_type: DataType,
    layout: SparseLayout,
    arrays: Vec<ArraySpec>,
}

impl SparseRowSum {
    pub fn new(config: &Config) -> Result<Self> {
        let data_type = config.data_type();
        let layout = SparseLayout::from_elements(config.size() / data_type.size_in_bytes());
        if layout.nnz_per_row == 0 {
            return Err(GeneratorError::invalid_parameter(
                "size",
                format!("crs-sum needs at least {} elements of {}", ROW_COUNT, data_type),
            ));
        }
        if layout.col_count() > i32::MAX as u64 {
            return Err(GeneratorError::invalid_parameter(
                "size",
                format!("{} columns overflow the int column index", layout.col_count()),
            ));
        }
        debug!(
            "crs-sum: {} rows of {} non-zeros over {} columns",
            ROW_COUNT,
            layout.nnz_per_row,
            layout.col_count()
        );

        let arrays = vec![
            ArraySpec::new(
                "vals",
                data_type.c_type(),
                "col_count",
                ArrayRole::Input(data_type.literal(1)),
            ),
            ArraySpec::new("col_index", CType::Int, "nnz", ArrayRole::Index),
            ArraySpec::new("row_index", CType::Int, "row_count + 1", ArrayRole::Index),
        ];

        Ok(Self {
            size: config.size(),
            data_type,
            layout,
            arrays,
        })
    }

    pub fn layout(&self) -> SparseLayout {
        self.layout
    }

    pub fn arrays(&self) -> &[ArraySpec] {
        &self.arrays
    }

    pub fn write_header(&self, cx: &EmitContext, out: &mut CodeSection) {
        out.add_line(format!("int row_count = {};", ROW_COUNT));
        out.add_line(format!("int row_factor = {};", ROW_FACTOR));
        out.add_line(format!(
            "int nnz_per_row = (int) (((long) {}L / (long) sizeof({})) / row_count);",
            self.size, self.data_type
        ));
        out.add_line("int nnz = row_count * nnz_per_row;");
        out.add_line("int col_count = row_factor * nnz_per_row;");
        if !cx.config.silent() {
            out.add_print(
                "Sparse layout: %d rows, %d non-zeros per row, %d columns",
                &["row_count", "nnz_per_row", "col_count"],
            );
        }
        for array in &self.arrays {
            cx.allocate(out, array);
        }

        cx.parallel_for(out, &[]);
        out.add_block(
            "\
for (int r = 0; r < row_count; r++) {
    row_index[r] = r * nnz_per_row;
    int column = 1 + (int) (mwg_mix(MWG_SEED + (uint64_t) (nnz + r)) % (uint64_t) (row_factor - 1));
    for (int j = 0; j < nnz_per_row; j++) {
        int slot = r * nnz_per_row + j;
        if (j > 0) {
            column += 1 + (int) (mwg_mix(MWG_SEED + (uint64_t) slot) % (uint64_t) (row_factor - 1));
        }
        col_index[slot] = column;
    }
}",
        );
        out.add_line("row_index[row_count] = nnz;");
    }

    pub fn write_body(&self, cx: &EmitContext, out: &mut CodeSection) {
        out.add_line("double sum = 0.0;");
        cx.parallel_for(out, &["reduction(+:sum)".to_string()]);
        out.add_block(
            "\
for (int r = 0; r < row_count; r++) {
    for (int j = row_index[r]; j < row_index[r + 1]; j++) {
        sum += vals[col_index[j]];
    }
}",
        );
        out.add_line("result = sum;");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::MallocFamily;
    use mwg_common::PatternId;
    use proptest::prelude::*;

    #[test]
    fn test_layout_of_the_default_working_set() {
        let config = Config::builder().pattern(PatternId::SparseRowSum).build().unwrap();
        let pattern = SparseRowSum::new(&config).unwrap();
        let layout = pattern.layout();
        assert_eq!(layout.nnz_per_row, (512 << 20) / 8 / 64);
        assert_eq!(layout.nnz(), 64 * layout.nnz_per_row);
        assert_eq!(layout.col_count(), 64 * layout.nnz_per_row);
        assert_eq!(pattern.arrays()[0].count, "col_count");
    }

    #[test]
    fn test_parallel_rows_reduce_into_the_sum() {
        let config = Config::builder()
            .pattern(PatternId::SparseRowSum)
            .parallel(true)
            .build()
            .unwrap();
        let pattern = SparseRowSum::new(&config).unwrap();
        let allocator = MallocFamily::stdlib(None);
        let cx = EmitContext::new(&config, &allocator);
        let mut out = CodeSection::new();
        pattern.write_body(&cx, &mut out);
        assert!(out
            .code()
            .starts_with("double sum = 0.0;\n#pragma omp parallel for reduction(+:sum)\nfor (int r = 0; r < row_count; r++) {\n"));
        assert!(out.code().contains("        sum += vals[col_index[j]];\n"));
        assert!(out.code().ends_with("result = sum;\n"));
    }

    #[test]
    fn test_header_closes_the_row_offsets() {
        let config = Config::builder()
            .pattern(PatternId::SparseRowSum)
            .size(1 << 20)
            .data_type(DataType::Float)
            .build()
            .unwrap();
        let pattern = SparseRowSum::new(&config).unwrap();
        let allocator = MallocFamily::stdlib(None);
        let cx = EmitContext::new(&config, &allocator);
        let mut out = CodeSection::new();
        pattern.write_header(&cx, &mut out);
        assert!(out
            .code()
            .contains("int nnz_per_row = (int) (((long) 1048576L / (long) sizeof(float)) / row_count);"));
        assert!(out.code().contains("vals[i] = 1.0f;"));
        assert!(out.code().ends_with("row_index[row_count] = nnz;\n"));
    }

    #[test]
    fn test_rejects_fewer_elements_than_rows() {
        let config = Config::builder()
            .pattern(PatternId::SparseRowSum)
            .size(63 * 8)
            .build()
            .unwrap();
        assert!(SparseRowSum::new(&config).is_err());
    }

    proptest! {
        #[test]
        fn row_offsets_are_monotonic_and_end_at_nnz(nnz_per_row in 1u64..512) {
            let layout = SparseLayout { nnz_per_row };
            let offsets = layout.row_offsets();
            prop_assert_eq!(offsets.len() as u64, ROW_COUNT + 1);
            prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(*offsets.last().unwrap(), layout.nnz());
        }

        #[test]
        fn columns_stay_inside_the_value_array(nnz_per_row in 1u64..256) {
            let layout = SparseLayout { nnz_per_row };
            let columns = layout.column_indices();
            prop_assert_eq!(columns.len() as u64, layout.nnz());
            for row in columns.chunks(nnz_per_row as usize) {
                prop_assert!(row.windows(2).all(|w| w[0] < w[1]));
            }
            prop_assert!(columns.iter().all(|&c| c < layout.col_count()));
        }
    }
}
