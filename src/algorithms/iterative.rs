//! Iterative Cooley-Tukey FFT
//!
//! 1. Bit reverse the input into the output buffer
//! 2. Start with butterflies of width 2
//! 3. Double the width up to `N`; every stage sees the complete result of the previous one
//!
//! Blocks inside a stage never alias, so the work of a stage is spread over the rayon pool.
use num_complex::Complex64;
use tracing::debug;

use crate::algorithms::{check_power_of_two, EngineState, Transform};
use crate::bit_reversal::bit_reverse_permute;
use crate::error::Result;
use crate::kernels::{butterfly_stage, normalize};
use crate::options::Options;
use crate::timer::Timer;
use crate::twiddles::Direction;

/// Single-process engine with explicit bit reversal and a stage loop
#[derive(Debug, Clone, Default)]
pub struct IterativeEngine {
    state: EngineState,
    options: Options,
}

impl IterativeEngine {
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

        let parallel = self.options.parallel_for(n);
        let output = &mut self.state.output;
        output.resize(n, Complex64::default());
        bit_reverse_permute(&self.state.input, output, parallel);

        for stage in 1..=n.ilog2() {
            let len = 1 << stage;
            butterfly_stage(output, len, direction, self.options.schedule(n, len));
        }

        if direction == Direction::Reverse {
            normalize(output, n, parallel);
        }

        self.state.duration = timer.elapsed();
        debug!(n, ?direction, elapsed = ?self.state.duration, "iterative transform");
        Ok(())
    }
}

impl Transform for IterativeEngine {
    fn name(&self) -> &'static str {
        "Iterative"
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
