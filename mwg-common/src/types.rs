//! Typed C values used by the code generator
//!
//! Type names, numeric literals and include directives are never assembled
//! from raw strings by the generators. They go through the small value types
//! in this module so that a `float` buffer is always initialized with a
//! `float` literal and an include is always spelled the same way.

use crate::error::GeneratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric element kinds a workload can operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 32-bit signed integer (`int`)
    Int,
    /// 64-bit signed integer (`long`)
    Long,
    /// 32-bit IEEE float (`float`)
    Float,
    /// 64-bit IEEE float (`double`)
    #[default]
    Double,
}

impl DataType {
    pub const ALL: [DataType; 4] = [DataType::Int, DataType::Long, DataType::Float, DataType::Double];

    /// Size of one element in bytes on the LP64 targets the workloads run on
    pub fn size_in_bytes(&self) -> u64 {
        match self {
            DataType::Int | DataType::Float => 4,
            DataType::Long | DataType::Double => 8,
        }
    }

    pub fn is_floating(&self) -> bool {
        matches!(self, DataType::Float | DataType::Double)
    }

    /// The C type used for buffers of this kind
    pub fn c_type(&self) -> CType {
        match self {
            DataType::Int => CType::Int,
            DataType::Long => CType::Long,
            DataType::Float => CType::Float,
            DataType::Double => CType::Double,
        }
    }

    /// A literal of this kind
    pub fn literal(&self, value: i64) -> Literal {
        Literal::new(*self, value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.c_type())
    }
}

impl FromStr for DataType {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "int32" | "i32" => Ok(DataType::Int),
            "long" | "int64" | "i64" => Ok(DataType::Long),
            "float" | "f32" => Ok(DataType::Float),
            "double" | "f64" => Ok(DataType::Double),
            _ => Err(GeneratorError::UnknownDataType { name: s.to_string() }),
        }
    }
}

/// C types that appear in generated declarations and `sizeof` expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CType {
    Int,
    Long,
    Float,
    Double,
    /// `size_t`, used for index and permutation buffers
    SizeT,
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Int => write!(f, "int"),
            CType::Long => write!(f, "long"),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::SizeT => write!(f, "size_t"),
        }
    }
}

/// A numeric literal bound to the element kind it initializes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Literal {
    pub data_type: DataType,
    pub value: i64,
}

impl Literal {
    pub fn new(data_type: DataType, value: i64) -> Self {
        Self { data_type, value }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data_type {
            DataType::Int => write!(f, "{}", self.value),
            DataType::Long => write!(f, "{}L", self.value),
            DataType::Float => write!(f, "{}.0f", self.value),
            DataType::Double => write!(f, "{}.0", self.value),
        }
    }
}

/// An `#include` directive target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Include {
    /// `#include <header>`
    System(String),
    /// `#include "header"`
    Local(String),
}

impl Include {
    pub fn system(header: &str) -> Self {
        Include::System(header.to_string())
    }

    pub fn local(header: &str) -> Self {
        Include::Local(header.to_string())
    }
}

impl fmt::Display for Include {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Include::System(header) => write!(f, "<{}>", header),
            Include::Local(header) => write!(f, "\"{}\"", header),
        }
    }
}
