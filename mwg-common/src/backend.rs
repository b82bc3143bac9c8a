//! Allocation and instrumentation backend identifiers
//!
//! An allocation backend is described by a fixed capability set. Resolving a
//! backend against the requested location, alignment and parallel flag is
//! the only place where those parameters are checked, so the emitting code
//! downstream never sees a combination it cannot express.

use crate::error::{GeneratorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Allocation backends known to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AllocatorKind {
    #[default]
    Stdlib,
    Jemalloc,
    Memkind,
    #[serde(rename = "memkind-nvm")]
    MemkindPmem,
    MemkindHbw,
    Libnuma,
    #[serde(rename = "openmp")]
    OpenMp,
}

/// Whether a backend needs a placement location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationRule {
    /// The backend has a single placement; a location is rejected
    Forbidden,
    /// The backend selects a node or kind; a location must be given
    Required,
}

/// Capability set of an allocation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub alignment: bool,
    pub location: LocationRule,
    pub requires_parallel: bool,
}

/// A validated placement location
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum Placement {
    /// libnuma: allocate on a specific node
    NumaNode(u32),
    /// libnuma: allocate on the node of the calling thread
    NumaLocal,
    /// libnuma: interleave pages across all nodes
    NumaInterleaved,
    /// memkind: a predefined memory kind such as `MEMKIND_DAX_KMEM`
    MemoryKind(String),
    /// memkind-nvm: directory of the persistent memory file system
    PmemPath(String),
    /// OpenMP: a predefined allocator handle such as `omp_large_cap_mem_alloc`
    OmpAllocator(String),
}

const OMP_ALLOCATORS: [&str; 8] = [
    "omp_default_mem_alloc",
    "omp_large_cap_mem_alloc",
    "omp_const_mem_alloc",
    "omp_high_bw_mem_alloc",
    "omp_low_lat_mem_alloc",
    "omp_cgroup_mem_alloc",
    "omp_pteam_mem_alloc",
    "omp_thread_mem_alloc",
];

impl AllocatorKind {
    pub const ALL: [AllocatorKind; 7] = [
        AllocatorKind::Stdlib,
        AllocatorKind::Jemalloc,
        AllocatorKind::Memkind,
        AllocatorKind::MemkindPmem,
        AllocatorKind::MemkindHbw,
        AllocatorKind::Libnuma,
        AllocatorKind::OpenMp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AllocatorKind::Stdlib => "stdlib",
            AllocatorKind::Jemalloc => "jemalloc",
            AllocatorKind::Memkind => "memkind",
            AllocatorKind::MemkindPmem => "memkind-nvm",
            AllocatorKind::MemkindHbw => "memkind-hbw",
            AllocatorKind::Libnuma => "libnuma",
            AllocatorKind::OpenMp => "openmp",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AllocatorKind::Stdlib => "malloc / posix_memalign from the C library",
            AllocatorKind::Jemalloc => "jemalloc's malloc / posix_memalign",
            AllocatorKind::Memkind => "memkind with a predefined kind (-L MEMKIND_...)",
            AllocatorKind::MemkindPmem => "memkind on a persistent memory directory (-L <path>)",
            AllocatorKind::MemkindHbw => "memkind high-bandwidth memory (hbw_malloc)",
            AllocatorKind::Libnuma => "libnuma on a node (-L <node>|local|interleaved)",
            AllocatorKind::OpenMp => "OpenMP memory allocators (-L omp_..._mem_alloc), needs --parallelize",
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        match self {
            AllocatorKind::Stdlib | AllocatorKind::Jemalloc | AllocatorKind::MemkindHbw => Capabilities {
                alignment: true,
                location: LocationRule::Forbidden,
                requires_parallel: false,
            },
            AllocatorKind::Memkind | AllocatorKind::MemkindPmem => Capabilities {
                alignment: true,
                location: LocationRule::Required,
                requires_parallel: false,
            },
            AllocatorKind::Libnuma => Capabilities {
                alignment: false,
                location: LocationRule::Required,
                requires_parallel: false,
            },
            AllocatorKind::OpenMp => Capabilities {
                alignment: true,
                location: LocationRule::Required,
                requires_parallel: true,
            },
        }
    }

    fn location_hint(&self) -> &'static str {
        match self {
            AllocatorKind::Libnuma => {
                "use the numeric index of a NUMA node (e.g. '0'), 'local' or 'interleaved'"
            }
            AllocatorKind::Memkind => "use a predefined memory kind such as 'MEMKIND_DEFAULT' or 'MEMKIND_DAX_KMEM'",
            AllocatorKind::MemkindPmem => "use the directory of a mounted persistent memory file system",
            AllocatorKind::OpenMp => {
                "use a predefined allocator such as 'omp_default_mem_alloc' or a memory space such as 'omp_large_cap_mem_space'"
            }
            _ => "this backend has a single placement",
        }
    }

    /// Check the backend's requirements and turn the raw location into a [`Placement`]
    pub fn resolve_placement(
        &self,
        location: Option<&str>,
        alignment: Option<u64>,
        parallel: bool,
    ) -> Result<Option<Placement>> {
        let caps = self.capabilities();

        if caps.requires_parallel && !parallel {
            return Err(GeneratorError::RequiresParallel {
                allocator: self.to_string(),
            });
        }
        if alignment.is_some() && !caps.alignment {
            return Err(GeneratorError::UnsupportedAlignment {
                allocator: self.to_string(),
            });
        }

        let location = location.map(str::trim).filter(|l| !l.is_empty());
        match (caps.location, location) {
            (LocationRule::Forbidden, None) => Ok(None),
            (LocationRule::Forbidden, Some(location)) => Err(GeneratorError::UnexpectedLocation {
                allocator: self.to_string(),
                location: location.to_string(),
            }),
            (LocationRule::Required, None) => Err(GeneratorError::MissingLocation {
                allocator: self.to_string(),
                hint: self.location_hint().to_string(),
            }),
            (LocationRule::Required, Some(location)) => self.parse_location(location).map(Some),
        }
    }

    fn parse_location(&self, location: &str) -> Result<Placement> {
        let invalid = || GeneratorError::InvalidLocation {
            allocator: self.to_string(),
            location: location.to_string(),
            hint: self.location_hint().to_string(),
        };

        match self {
            AllocatorKind::Libnuma => match location {
                "local" => Ok(Placement::NumaLocal),
                "interleaved" => Ok(Placement::NumaInterleaved),
                node if node.chars().all(|c| c.is_ascii_digit()) => {
                    node.parse().map(Placement::NumaNode).map_err(|_| invalid())
                }
                _ => Err(invalid()),
            },
            AllocatorKind::Memkind => {
                let well_formed = location.starts_with("MEMKIND_")
                    && location.len() > "MEMKIND_".len()
                    && location
                        .chars()
                        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
                if well_formed {
                    Ok(Placement::MemoryKind(location.to_string()))
                } else {
                    Err(invalid())
                }
            }
            AllocatorKind::MemkindPmem => {
                if location.chars().any(|c| c == '"' || c == '\\' || c.is_control()) {
                    Err(invalid())
                } else {
                    Ok(Placement::PmemPath(location.to_string()))
                }
            }
            AllocatorKind::OpenMp => {
                let handle = match location.strip_suffix("_mem_space") {
                    Some(space) => format!("{}_mem_alloc", space),
                    None => location.to_string(),
                };
                if OMP_ALLOCATORS.contains(&handle.as_str()) {
                    Ok(Placement::OmpAllocator(handle))
                } else {
                    Err(invalid())
                }
            }
            AllocatorKind::Stdlib | AllocatorKind::Jemalloc | AllocatorKind::MemkindHbw => Err(invalid()),
        }
    }
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AllocatorKind {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        AllocatorKind::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| GeneratorError::UnknownAllocator {
                name: s.to_string(),
                known: AllocatorKind::ALL
                    .iter()
                    .map(|a| a.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

/// Instrumentation backends known to the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InstrumentationKind {
    #[default]
    None,
    Papi,
    Likwid,
}

impl InstrumentationKind {
    pub const ALL: [InstrumentationKind; 3] = [
        InstrumentationKind::None,
        InstrumentationKind::Papi,
        InstrumentationKind::Likwid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentationKind::None => "none",
            InstrumentationKind::Papi => "papi",
            InstrumentationKind::Likwid => "likwid",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            InstrumentationKind::None => "no region markers",
            InstrumentationKind::Papi => "PAPI high-level API regions",
            InstrumentationKind::Likwid => "LIKWID marker API regions",
        }
    }
}

impl fmt::Display for InstrumentationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for InstrumentationKind {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_ascii_lowercase();
        InstrumentationKind::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == name)
            .ok_or_else(|| GeneratorError::UnknownInstrumentation {
                name: s.to_string(),
                known: "none, papi, likwid".to_string(),
            })
    }
}
