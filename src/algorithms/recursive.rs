//! Recursive radix-2 FFT
//!
//! Splits the signal into even and odd samples, transforms both halves and merges them with
//! `Y[k] = E[k] + w^k O[k]`, `Y[k + N/2] = E[k] - w^k O[k]`.
use num_complex::Complex64;
use tracing::debug;

use crate::algorithms::{check_power_of_two, EngineState, Transform};
use crate::error::Result;
use crate::kernels::normalize;
use crate::options::Options;
use crate::timer::Timer;
use crate::twiddles::{Direction, Twiddles};

/// Single-process divide and conquer engine
#[derive(Debug, Clone, Default)]
pub struct RecursiveEngine {
    state: EngineState,
    options: Options,
}

/// Transforms `x`, whose length is a power of 2.
///
/// Halves at least `cutoff` long are transformed on two rayon tasks.
fn recursive_fft(x: &[Complex64], direction: Direction, cutoff: Option<usize>) -> Vec<Complex64> {
    let n = x.len();
    if n == 1 {
        return x.to_vec();
    }

    let (evens, odds): (Vec<_>, Vec<_>) = x.chunks_exact(2).map(|c| (c[0], c[1])).unzip();

    let (evens, odds) = match cutoff {
        Some(cutoff) if n >= cutoff => rayon::join(
            || recursive_fft(&evens, direction, Some(cutoff)),
            || recursive_fft(&odds, direction, Some(cutoff)),
        ),
        _ => (
            recursive_fft(&evens, direction, cutoff),
            recursive_fft(&odds, direction, cutoff),
        ),
    };

    let mut y = vec![Complex64::default(); n];
    let (y_s0, y_s1) = y.split_at_mut(n >> 1);

    y_s0.iter_mut()
        .zip(y_s1.iter_mut())
        .zip(evens.iter().zip(odds.iter()))
        .zip(Twiddles::<f64>::new(n, direction))
        .for_each(|(((lo, hi), (even, odd)), w_k)| {
            let t = w_k * *odd;
            *lo = *even + t;
            *hi = *even - t;
        });

    y
}

impl RecursiveEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self {
            state: EngineState::default(),
            options,
        }
    }

    fn run(&mut self, direction: Direction) -> Result<()> {
        let timer = Timer::start();
        let n = self.state.input.len();
        if n == 0 {
            self.state.output.clear();
            self.state.duration = timer.elapsed();
            return Ok(());
        }
        check_power_of_two(n)?;

        let cutoff = self
            .options
            .multithreaded
            .then_some(self.options.parallel_cutoff.max(2));
        let mut output = recursive_fft(&self.state.input, direction, cutoff);

        if direction == Direction::Reverse {
            normalize(&mut output, n, self.options.parallel_for(n));
        }

        self.state.output = output;
        self.state.duration = timer.elapsed();
        debug!(n, ?direction, elapsed = ?self.state.duration, "recursive transform");
        Ok(())
    }
}

impl Transform for RecursiveEngine {
    fn name(&self) -> &'static str {
        "Recursive"
    }

    fn state(&self) -> &EngineState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    fn compute(&mut self) -> Result<()> {
        self.run(Direction::Forward)
    }

    fn reverse_compute(&mut self) -> Result<()> {
        self.run(Direction::Reverse)
    }
}
