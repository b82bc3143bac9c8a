//! Memory Workload Generator - Code Generation
//!
//! This crate emits the C source of a memory benchmark from a validated
//! [`mwg_common::Config`]. Access patterns write through [`emit::CodeSection`]
//! and allocate through an [`alloc::Allocator`]; [`workload::generate`] runs
//! the four-phase protocol and [`build_desc::BuildDescriptor`] describes how
//! the result is compiled and launched.

pub mod alloc;
pub mod build_desc;
pub mod emit;
pub mod instrument;
pub mod patterns;
pub mod workload;

pub use alloc::Allocator;
pub use build_desc::{BuildDescriptor, BuildOptions};
pub use emit::CodeSection;
pub use instrument::Instrumentation;
pub use patterns::{ArrayRole, ArraySpec, EmitContext, Pattern};
pub use workload::{generate, generate_with, GeneratedWorkload};
