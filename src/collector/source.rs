//! Two-phase query contract between the engine and a metric source.
//!
//! A source answers, per resource type, two questions: how many items are
//! available right now ([`Query::probe`]), and "fill this slice with up to
//! that many items" ([`Query::fill`]). The engine sizes its buffers from the
//! probe and then fills them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::collector::procfs::parser::ParseError;
use crate::model::{
    CpuTicks, CpuTotal, DiskSample, FcSample, Filesystem, MemoryTotal, NetSample, NfsCounters,
    PagingSpace, ProcessSample,
};

/// Failure of a source query.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The backing file or directory cannot be read.
    #[error("cannot read {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// `fill` was handed a slice too short for even one item.
    #[error("destination holds {given} items, at least {needed} required")]
    BufferTooSmall { given: usize, needed: usize },

    #[error("unknown protocol filter {0:?}")]
    UnknownProtocol(String),

    /// Protocol counters are zero on both readings: nothing to report.
    #[error("{0} counters are idle")]
    Idle(&'static str),
}

impl SourceError {
    pub fn unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        SourceError::Unavailable {
            path: path.into(),
            source,
        }
    }
}

/// Query for one resource type.
///
/// `filter` is an optional identity; sources that keep several totals of the
/// same type (NFS protocol versions) use it to select one.
pub trait Query<T> {
    /// Number of items currently available. Has no side effects on results.
    fn probe(&mut self, filter: Option<&str>) -> Result<usize, SourceError>;

    /// Writes up to `out.len()` items and returns how many were written.
    fn fill(&mut self, filter: Option<&str>, out: &mut [T]) -> Result<usize, SourceError>;
}

/// Probes, sizes `out` to the probed count and fills it.
///
/// A probe of zero is not an error: `out` is left empty. On any failure `out`
/// is cleared.
pub fn fetch_all<T, Q>(source: &mut Q, filter: Option<&str>, out: &mut Vec<T>) -> Result<usize, SourceError>
where
    T: Clone + Default,
    Q: Query<T> + ?Sized,
{
    out.clear();
    let wanted = source.probe(filter)?;
    if wanted == 0 {
        return Ok(0);
    }
    out.resize(wanted, T::default());
    match source.fill(filter, out) {
        Ok(filled) => {
            out.truncate(filled);
            Ok(filled)
        }
        Err(e) => {
            out.clear();
            Err(e)
        }
    }
}

/// Fills a single total-type item in place.
pub fn fetch_one<T, Q>(source: &mut Q, filter: Option<&str>, slot: &mut T) -> Result<(), SourceError>
where
    Q: Query<T> + ?Sized,
{
    source.fill(filter, std::slice::from_mut(slot)).map(|_| ())
}

/// Returns an error when `out` cannot hold a single total.
pub(crate) fn require_slot<T>(out: &mut [T]) -> Result<&mut T, SourceError> {
    let given = out.len();
    out.first_mut()
        .ok_or(SourceError::BufferTooSmall { given, needed: 1 })
}

/// Everything the collection engine reads from the host.
pub trait MetricSource:
    Query<CpuTotal>
    + Query<CpuTicks>
    + Query<MemoryTotal>
    + Query<PagingSpace>
    + Query<DiskSample>
    + Query<Filesystem>
    + Query<NfsCounters>
    + Query<NetSample>
    + Query<FcSample>
    + Query<ProcessSample>
{
    /// Short host name reported in every document.
    fn hostname(&mut self) -> Result<String, SourceError>;
}
