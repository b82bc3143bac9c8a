//! Workload configuration
//!
//! A [`Config`] is built exactly once through [`ConfigBuilder::build`], which
//! performs every resolution-time check. After that the value is immutable
//! and is passed by reference into every generator call.

use crate::backend::{AllocatorKind, InstrumentationKind, Placement};
use crate::error::{GeneratorError, Result};
use crate::pattern::PatternId;
use crate::size::parse_size;
use crate::types::DataType;
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};

/// Default working-set size (512 MiB)
pub const DEFAULT_SIZE: u64 = 512 << 20;

/// Resolved, validated configuration of one generation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pattern: PatternId,
    size: u64,
    stride: u64,
    chunk_size: u64,
    data_type: DataType,
    arithmetic_intensity: u32,
    parallel: bool,
    first_touch: bool,
    allocator: AllocatorKind,
    placement: Option<Placement>,
    alignment: Option<u64>,
    instrumentation: InstrumentationKind,
    idle_phase_ms: Option<u64>,
    silent: bool,
    wall_time: bool,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn pattern(&self) -> PatternId {
        self.pattern
    }

    /// Total working-set size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Elements between the starts of consecutive chunks
    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Contiguous elements touched per chunk
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Extra dependent operations injected per load
    pub fn arithmetic_intensity(&self) -> u32 {
        self.arithmetic_intensity
    }

    pub fn parallel(&self) -> bool {
        self.parallel
    }

    /// Initialize buffers from the workers that later access them
    pub fn first_touch(&self) -> bool {
        self.parallel && self.first_touch
    }

    pub fn allocator(&self) -> AllocatorKind {
        self.allocator
    }

    pub fn placement(&self) -> Option<&Placement> {
        self.placement.as_ref()
    }

    pub fn alignment(&self) -> Option<u64> {
        self.alignment
    }

    pub fn instrumentation(&self) -> InstrumentationKind {
        self.instrumentation
    }

    pub fn idle_phase_ms(&self) -> Option<u64> {
        self.idle_phase_ms
    }

    /// Suppress informational prints in the generated program
    pub fn silent(&self) -> bool {
        self.silent
    }

    pub fn wall_time(&self) -> bool {
        self.wall_time
    }
}

/// Unvalidated configuration, filled from the command line or a JSON file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigBuilder {
    pattern: PatternId,
    #[serde(deserialize_with = "deserialize_size")]
    size: u64,
    stride: u64,
    #[serde(deserialize_with = "deserialize_size")]
    chunk_size: u64,
    data_type: DataType,
    arithmetic_intensity: u32,
    parallel: bool,
    first_touch: bool,
    allocator: AllocatorKind,
    location: Option<String>,
    alignment: Option<u64>,
    instrumentation: InstrumentationKind,
    idle_phase_ms: Option<u64>,
    silent: bool,
    wall_time: bool,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            pattern: PatternId::default(),
            size: DEFAULT_SIZE,
            stride: 1,
            chunk_size: 1,
            data_type: DataType::default(),
            arithmetic_intensity: 0,
            parallel: false,
            first_touch: true,
            allocator: AllocatorKind::default(),
            location: None,
            alignment: None,
            instrumentation: InstrumentationKind::default(),
            idle_phase_ms: None,
            silent: false,
            wall_time: true,
        }
    }

    pub fn pattern(mut self, pattern: PatternId) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = size;
        self
    }

    pub fn stride(mut self, stride: u64) -> Self {
        self.stride = stride;
        self
    }

    pub fn chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn arithmetic_intensity(mut self, ops: u32) -> Self {
        self.arithmetic_intensity = ops;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn first_touch(mut self, first_touch: bool) -> Self {
        self.first_touch = first_touch;
        self
    }

    pub fn allocator(mut self, allocator: AllocatorKind) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn alignment(mut self, alignment: u64) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn instrumentation(mut self, instrumentation: InstrumentationKind) -> Self {
        self.instrumentation = instrumentation;
        self
    }

    pub fn idle_phase_ms(mut self, ms: u64) -> Self {
        self.idle_phase_ms = Some(ms);
        self
    }

    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn wall_time(mut self, wall_time: bool) -> Self {
        self.wall_time = wall_time;
        self
    }

    /// Validate every parameter and resolve the allocator's placement
    pub fn build(self) -> Result<Config> {
        if self.size == 0 {
            return Err(GeneratorError::invalid_parameter("size", "must be greater than 0"));
        }
        if self.stride == 0 {
            return Err(GeneratorError::invalid_parameter("stride", "must be at least 1"));
        }
        if self.chunk_size == 0 {
            return Err(GeneratorError::invalid_parameter("chunk-size", "must be at least 1"));
        }
        if let Some(alignment) = self.alignment {
            if alignment == 0 || alignment % 8 != 0 {
                return Err(GeneratorError::InvalidAlignment { value: alignment });
            }
        }

        let placement = self.allocator.resolve_placement(
            self.location.as_deref(),
            self.alignment,
            self.parallel,
        )?;

        let config = Config {
            pattern: self.pattern,
            size: self.size,
            stride: self.stride,
            chunk_size: self.chunk_size,
            data_type: self.data_type,
            arithmetic_intensity: self.arithmetic_intensity,
            parallel: self.parallel,
            first_touch: self.first_touch,
            allocator: self.allocator,
            placement,
            alignment: self.alignment,
            instrumentation: self.instrumentation,
            idle_phase_ms: self.idle_phase_ms.filter(|&ms| ms > 0),
            silent: self.silent,
            wall_time: self.wall_time,
        };
        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeField {
        Bytes(u64),
        Text(String),
    }

    match SizeField::deserialize(deserializer)? {
        SizeField::Bytes(bytes) => Ok(bytes),
        SizeField::Text(text) => parse_size(&text).map_err(serde::de::Error::custom),
    }
}
