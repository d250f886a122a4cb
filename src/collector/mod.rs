//! Host metric sources for Linux.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Monitor                            │
//! │        probe / fill per resource type (Query<T>)            │
//! └────────────────────────────┬────────────────────────────────┘
//!                              │
//!                    ┌─────────▼─────────┐
//!                    │   ProcfsSource    │
//!                    │  - /proc/stat     │
//!                    │  - /proc/[pid]/*  │
//!                    │  - /sys/class/*   │
//!                    └─────────┬─────────┘
//!                              │
//!                       ┌──────▼──────┐
//!                       │  FileSystem │ (trait)
//!                       └──────┬──────┘
//!              ┌───────────────┼───────────────┐
//!       ┌──────▼──────┐ ┌──────▼──────┐ ┌──────▼──────┐
//!       │   RealFs    │ │   MockFs    │ │  Scenarios  │
//!       │ (Linux)     │ │ (Testing)   │ │ (Fixtures)  │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use jsonperfmon::collector::{MockFs, ProcfsSource, fetch_one};
//! use jsonperfmon::model::CpuTotal;
//!
//! let mut source = ProcfsSource::new(MockFs::typical_system(), "/proc", "/sys");
//! let mut total = CpuTotal::default();
//! fetch_one(&mut source, None, &mut total).unwrap();
//! assert_eq!(total.ncpus, 2);
//! ```

pub mod mock;
pub mod procfs;
mod source;
mod traits;

pub use mock::MockFs;
pub use procfs::ProcfsSource;
pub use source::{MetricSource, Query, SourceError, fetch_all, fetch_one};
pub use traits::{FileSystem, FsUsage, RealFs};
