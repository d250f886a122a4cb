//! In-memory filesystem and fixture scenarios for tests.

mod filesystem;
pub mod scenarios;

pub use filesystem::MockFs;
