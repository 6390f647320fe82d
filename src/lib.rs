//! Radix-2 FFT engines sharing one contract.
//!
//! Three interchangeable engines compute the forward and inverse DFT of power of 2 length
//! complex signals:
//!
//! - [`IterativeEngine`]: bit reversal followed by a parallel stage loop
//! - [`RecursiveEngine`]: divide and conquer on even/odd subsequences
//! - [`DistributedEngine`]: the stage loop split across a process group, exchanging partitions
//!   with hypercube partners once a stage outgrows a rank
//!
//! All of them implement [`Transform`].
//!
//! ```
//! use hyperfft::{IterativeEngine, LocalCluster, Transform};
//! use num_complex::Complex64;
//!
//! let mut impulse = vec![Complex64::default(); 8];
//! impulse[0] = Complex64::new(1.0, 0.0);
//!
//! let mut iterative = IterativeEngine::new();
//! iterative.load(impulse.clone());
//! iterative.compute().unwrap();
//!
//! let mut distributed = LocalCluster::new(4).unwrap();
//! distributed.load(impulse);
//! distributed.compute().unwrap();
//!
//! for (a, b) in iterative.output().iter().zip(distributed.output()) {
//!     assert!((a - b).norm() < 1e-12);
//! }
//! ```
pub mod algorithms;
pub mod bit_reversal;
pub mod error;
pub mod group;
mod kernels;
pub mod options;
pub mod signal;
pub mod timer;
pub mod twiddles;

pub use crate::algorithms::distributed::{DistributedEngine, LocalCluster};
pub use crate::algorithms::iterative::IterativeEngine;
pub use crate::algorithms::recursive::RecursiveEngine;
pub use crate::algorithms::{Method, Stats, Transform};
pub use crate::error::{FftError, Result};
pub use crate::options::Options;
pub use crate::twiddles::Direction;

#[cfg(test)]
mod tests {
    use num_complex::Complex64;
    use utilities::{assert_complex_closeness, assert_float_closeness, gen_random_signal};

    use super::*;
    use crate::group::GroupConfig;

    fn engines() -> Vec<Box<dyn Transform>> {
        let mut engines: Vec<Box<dyn Transform>> = vec![
            Box::new(IterativeEngine::new()),
            Box::new(RecursiveEngine::new()),
        ];
        for ranks in [1, 2, 4] {
            engines.push(Box::new(
                LocalCluster::with_options(ranks, GroupConfig::default(), Options::default())
                    .unwrap(),
            ));
        }
        engines
    }

    fn forward(engine: &mut dyn Transform, signal: &[Complex64]) -> Vec<Complex64> {
        engine.load(signal.to_vec());
        engine.compute().unwrap();
        engine.take_output()
    }

    #[test]
    fn engines_agree() {
        for k in 2..13 {
            let signal = gen_random_signal(1 << k);
            let mut engines = engines();
            let expected = forward(engines[0].as_mut(), &signal);
            for engine in engines.iter_mut().skip(1) {
                let actual = forward(engine.as_mut(), &signal);
                assert_complex_closeness(&actual, &expected, 1e-9);
            }
        }
    }

    #[test]
    fn round_trip_every_engine() {
        let signal = gen_random_signal(1 << 10);
        for mut engine in engines() {
            let spectrum = forward(engine.as_mut(), &signal);
            engine.load(spectrum);
            engine.reverse_compute().unwrap();
            assert_complex_closeness(engine.output(), &signal, 1e-9);
        }
    }

    #[test]
    fn inverse_divides_by_n_exactly_once() {
        let signal = gen_random_signal(64);
        for mut engine in engines() {
            let spectrum = forward(engine.as_mut(), &signal);
            engine.load(spectrum);
            engine.reverse_compute().unwrap();
            for (actual, expected) in engine.output().iter().zip(signal.iter()) {
                assert_float_closeness(actual.norm(), expected.norm(), 1e-9);
            }
        }
    }

    #[test]
    fn impulse_and_constant() {
        let mut impulse = vec![Complex64::default(); 4];
        impulse[0] = Complex64::new(1.0, 0.0);
        let n = 16;
        let constant = vec![Complex64::new(1.0, 0.0); n];
        let mut spike = vec![Complex64::default(); n];
        spike[0] = Complex64::new(n as f64, 0.0);

        for mut engine in engines() {
            let flat = forward(engine.as_mut(), &impulse);
            assert_complex_closeness(&flat, &[Complex64::new(1.0, 0.0); 4], 1e-12);

            let peak = forward(engine.as_mut(), &constant);
            assert_complex_closeness(&peak, &spike, 1e-9);
        }
    }

    #[test]
    fn reverse_compute_reads_the_loaded_input() {
        // Without reloading, the inverse runs on the original signal, not on the spectrum
        let signal = gen_random_signal(32);
        let mut engine = IterativeEngine::new();
        engine.load(signal.clone());
        engine.compute().unwrap();
        engine.reverse_compute().unwrap();
        assert_eq!(engine.input(), signal.as_slice());

        let mut reference = IterativeEngine::new();
        reference.load(signal);
        reference.reverse_compute().unwrap();
        assert_complex_closeness(engine.output(), reference.output(), 1e-15);
    }
}
