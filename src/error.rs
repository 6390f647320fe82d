//! Error types shared by the engines, the signal buffer and the process group

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::group::Phase;

/// Result type for every fallible operation in this crate
pub type Result<T> = std::result::Result<T, FftError>;

/// Errors that can occur while loading, transforming or storing a signal
#[derive(Error, Debug)]
pub enum FftError {
    /// Signal length is not a power of two
    #[error("input size must be a power of 2, got {0}")]
    InvalidSize(usize),

    /// Signal length cannot be split evenly across the process group
    #[error("signal of length {len} cannot be split evenly across {ranks} ranks")]
    UnevenPartition { len: usize, ranks: usize },

    /// Process group size is zero or not a power of two
    #[error("process group size must be a non-zero power of 2, got {0}")]
    InvalidGroupSize(usize),

    /// Reading or writing a signal file failed
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Engine selection code outside `1..=4`
    #[error("unknown method {0:?}, expected 1-4 or iterative/recursive/distributed/all")]
    UnknownMethod(String),

    /// Output was requested before anything was computed
    #[error("output data is empty")]
    EmptyOutput,

    /// A peer rank hung up before the collective completed
    #[error("rank {peer} disconnected from the process group")]
    Disconnected { peer: usize },

    /// A peer rank did not reach the matching collective in time
    #[error("timed out waiting for rank {peer}")]
    Timeout { peer: usize },

    /// A peer rank is executing a different protocol phase
    #[error("protocol phase mismatch: expected {expected:?}, received {found:?}")]
    PhaseMismatch { expected: Phase, found: Phase },
}

impl FftError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FftError::Io {
            path: path.into(),
            source,
        }
    }
}
