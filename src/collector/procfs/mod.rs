//! Source for the Linux `/proc` and `/sys` filesystems.
//!
//! [`parser`] turns the text files into plain structs; [`ProcfsSource`]
//! answers the engine's queries from them.

pub mod parser;
mod source;

pub use source::{DEFAULT_CLK_TCK, ProcfsSource, clock_ticks};
