//! Memory Workload Generator - Common Types and Utilities
//!
//! This crate contains the configuration model, error definitions, typed C
//! values and the deterministic randomness shared by the code generator and
//! the driver.

pub mod backend;
pub mod config;
pub mod error;
pub mod pattern;
pub mod prng;
pub mod size;
pub mod types;

pub use backend::{AllocatorKind, Capabilities, InstrumentationKind, LocationRule, Placement};
pub use config::{Config, ConfigBuilder};
pub use error::{GeneratorError, Result};
pub use pattern::{PatternFamily, PatternId};
pub use size::parse_size;
pub use types::{CType, DataType, Include, Literal};
