//! Access pattern identifiers
//!
//! The set of patterns is closed. Parsing an unknown identifier, including an
//! unknown sub-identifier of a pattern family, fails instead of falling back
//! to some default kernel.

use crate::error::GeneratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies the kernel semantics of a workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PatternId {
    #[default]
    #[serde(rename = "strided-copy")]
    StridedCopy,
    #[serde(rename = "strided-scale")]
    StridedScale,
    #[serde(rename = "strided-add")]
    StridedAdd,
    #[serde(rename = "strided-triad")]
    StridedTriad,
    #[serde(rename = "strided-load")]
    StridedLoad,
    #[serde(rename = "strided-store")]
    StridedStore,
    #[serde(rename = "random-load")]
    RandomLoad,
    #[serde(rename = "random-store")]
    RandomStore,
    #[serde(rename = "random-sum")]
    RandomSum,
    #[serde(rename = "gather")]
    Gather,
    #[serde(rename = "scatter")]
    Scatter,
    #[serde(rename = "crs-sum")]
    SparseRowSum,
}

/// Broad pattern families sharing one generator implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternFamily {
    Strided,
    PointerChase,
    Indirect,
    Sparse,
}

impl PatternId {
    pub const ALL: [PatternId; 12] = [
        PatternId::StridedCopy,
        PatternId::StridedScale,
        PatternId::StridedAdd,
        PatternId::StridedTriad,
        PatternId::StridedLoad,
        PatternId::StridedStore,
        PatternId::RandomLoad,
        PatternId::RandomStore,
        PatternId::RandomSum,
        PatternId::Gather,
        PatternId::Scatter,
        PatternId::SparseRowSum,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternId::StridedCopy => "strided-copy",
            PatternId::StridedScale => "strided-scale",
            PatternId::StridedAdd => "strided-add",
            PatternId::StridedTriad => "strided-triad",
            PatternId::StridedLoad => "strided-load",
            PatternId::StridedStore => "strided-store",
            PatternId::RandomLoad => "random-load",
            PatternId::RandomStore => "random-store",
            PatternId::RandomSum => "random-sum",
            PatternId::Gather => "gather",
            PatternId::Scatter => "scatter",
            PatternId::SparseRowSum => "crs-sum",
        }
    }

    pub fn family(&self) -> PatternFamily {
        match self {
            PatternId::StridedCopy
            | PatternId::StridedScale
            | PatternId::StridedAdd
            | PatternId::StridedTriad
            | PatternId::StridedLoad
            | PatternId::StridedStore => PatternFamily::Strided,
            PatternId::RandomLoad | PatternId::RandomStore | PatternId::RandomSum => {
                PatternFamily::PointerChase
            }
            PatternId::Gather | PatternId::Scatter => PatternFamily::Indirect,
            PatternId::SparseRowSum => PatternFamily::Sparse,
        }
    }

    /// One-line description for `--list`
    pub fn description(&self) -> &'static str {
        match self {
            PatternId::StridedCopy => "B[i] = A[i]",
            PatternId::StridedScale => "B[i] = 3 * A[i]",
            PatternId::StridedAdd => "C[i] = A[i] + B[i]",
            PatternId::StridedTriad => "C[i] = A[i] + 3 * B[i]",
            PatternId::StridedLoad => "dependent register loads of A[i]",
            PatternId::StridedStore => "A[i] = constant",
            PatternId::RandomLoad => "pointer-chasing loads over a shuffled permutation",
            PatternId::RandomStore => "pointer-chasing stores over a shuffled permutation",
            PatternId::RandomSum => "pointer-chasing sum over a shuffled permutation",
            PatternId::Gather => "x[i] = y[idx[i]] with random indices",
            PatternId::Scatter => "y[idx[i]] = x[i] with random indices",
            PatternId::SparseRowSum => "compressed-row sparse sum",
        }
    }

    fn known() -> String {
        PatternId::ALL
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PatternId {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let alias = match name.as_str() {
            "sparse-row-sum" | "crs" => "crs-sum",
            other => other,
        };
        PatternId::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == alias)
            .ok_or_else(|| GeneratorError::UnknownPattern {
                name: s.to_string(),
                known: PatternId::known(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for pattern in PatternId::ALL {
            assert_eq!(pattern.as_str().parse::<PatternId>().unwrap(), pattern);
        }
        assert_eq!("Strided-Triad".parse::<PatternId>().unwrap(), PatternId::StridedTriad);
        assert_eq!("sparse-row-sum".parse::<PatternId>().unwrap(), PatternId::SparseRowSum);
    }

    #[test]
    fn test_unknown_sub_identifier_fails_closed() {
        for name in ["random-prefetch", "strided", "gather-2", ""] {
            let err = name.parse::<PatternId>().unwrap_err();
            assert!(matches!(err, GeneratorError::UnknownPattern { .. }), "{}", name);
        }
    }

    #[test]
    fn test_families() {
        assert_eq!(PatternId::StridedLoad.family(), PatternFamily::Strided);
        assert_eq!(PatternId::RandomSum.family(), PatternFamily::PointerChase);
        assert_eq!(PatternId::Scatter.family(), PatternFamily::Indirect);
        assert_eq!(PatternId::SparseRowSum.family(), PatternFamily::Sparse);
    }

    #[test]
    fn test_serde_uses_cli_names() {
        let json = serde_json::to_string(&PatternId::RandomSum).unwrap();
        assert_eq!(json, "\"random-sum\"");
        let parsed: PatternId = serde_json::from_str("\"crs-sum\"").unwrap();
        assert_eq!(parsed, PatternId::SparseRowSum);
    }
}
