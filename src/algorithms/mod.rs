//! FFT Engine Implementations
//!
//! This module contains the three interchangeable transform engines. Every engine implements
//! [`Transform`], so a caller can pick one at startup and drive it through the same calls.
//!
//! ## Available Engines
//!
//! - **Iterative**: explicit bit reversal followed by `log2(N)` butterfly stages, parallel
//!   within each stage.
//!
//! - **Recursive**: divide and conquer on even/odd subsequences.
//!
//! - **Distributed**: the iterative schedule split across a process group. Stages that fit in
//!   one rank's partition run locally; wider stages swap partitions with a hypercube partner.
//!
//! ## Engine Selection
//!
//! [`Method`] maps the numeric codes of the command line (`1` to `4`) onto engines.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use num_complex::Complex64;
use tracing::info;

use crate::error::{FftError, Result};

pub mod distributed;
pub mod iterative;
pub mod recursive;

/// Buffers and statistics owned by an engine for one compute cycle
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub(crate) input: Vec<Complex64>,
    pub(crate) output: Vec<Complex64>,
    pub(crate) duration: Duration,
}

/// Duration of the most recent transform, tagged with a caller label
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub engine: &'static str,
    pub label: String,
    pub duration: Duration,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} microseconds",
            self.engine,
            self.label,
            self.duration.as_micros()
        )
    }
}

/// The contract shared by every engine.
///
/// `compute` and `reverse_compute` both read the currently loaded input. To invert a forward
/// result, load the output back in first.
pub trait Transform {
    /// Human readable engine name
    fn name(&self) -> &'static str;

    fn state(&self) -> &EngineState;

    fn state_mut(&mut self) -> &mut EngineState;

    /// Forward DFT of the loaded input into the output buffer
    fn compute(&mut self) -> Result<()>;

    /// Inverse DFT of the loaded input, scaled by `1/N`
    fn reverse_compute(&mut self) -> Result<()>;

    /// Replaces the input buffer
    fn load(&mut self, input: Vec<Complex64>) {
        self.state_mut().input = input;
    }

    fn input(&self) -> &[Complex64] {
        &self.state().input
    }

    fn output(&self) -> &[Complex64] {
        &self.state().output
    }

    /// Moves the output buffer out of the engine, leaving it empty
    fn take_output(&mut self) -> Vec<Complex64> {
        std::mem::take(&mut self.state_mut().output)
    }

    /// Duration of the most recent `compute`/`reverse_compute`
    fn duration(&self) -> Duration {
        self.state().duration
    }

    /// Logs and returns the duration of the most recent call
    fn report_stats(&self, label: &str) -> Stats {
        let stats = Stats {
            engine: self.name(),
            label: label.to_owned(),
            duration: self.duration(),
        };
        info!(
            engine = stats.engine,
            label,
            duration_us = stats.duration.as_micros() as u64,
            "transform finished"
        );
        stats
    }
}

/// Checks the length precondition of the single-process engines
pub(crate) fn check_power_of_two(n: usize) -> Result<()> {
    if n.is_power_of_two() {
        Ok(())
    } else {
        Err(FftError::InvalidSize(n))
    }
}

/// Engine selection, numbered the way the command line numbers it
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    Iterative = 1,
    Recursive = 2,
    Distributed = 3,
    All = 4,
}

impl Method {
    /// The single-engine methods this selection runs, in execution order
    pub fn expand(self) -> Vec<Method> {
        match self {
            Method::All => vec![Method::Iterative, Method::Recursive, Method::Distributed],
            single => vec![single],
        }
    }
}

impl TryFrom<u8> for Method {
    type Error = FftError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Method::Iterative),
            2 => Ok(Method::Recursive),
            3 => Ok(Method::Distributed),
            4 => Ok(Method::All),
            _ => Err(FftError::UnknownMethod(code.to_string())),
        }
    }
}

impl FromStr for Method {
    type Err = FftError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iterative" => Ok(Method::Iterative),
            "recursive" => Ok(Method::Recursive),
            "distributed" | "parallel" => Ok(Method::Distributed),
            "all" => Ok(Method::All),
            other => other
                .parse::<u8>()
                .map_err(|_| FftError::UnknownMethod(s.to_owned()))
                .and_then(Method::try_from),
        }
    }
}
