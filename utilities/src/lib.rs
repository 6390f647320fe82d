pub extern crate rustfft;

// export rustfft to hyperfft
use rand::{distributions::Uniform, prelude::*};
use rustfft::num_complex::Complex64;
use rustfft::num_traits::Float;
use rustfft::FftPlanner;

/// Asserts that two fp numbers are approximately equal.
///
/// # Panics
///
/// Panics if `actual` and `expected` are too far from each other
#[allow(dead_code)]
#[track_caller]
pub fn assert_float_closeness<T: Float + std::fmt::Display>(actual: T, expected: T, epsilon: T) {
    if (actual - expected).abs() >= epsilon {
        panic!(
            "Assertion failed: {actual} too far from expected value {expected} (with epsilon {epsilon})",
        );
    }
}

/// Asserts that two complex signals have the same length and are elementwise close.
///
/// # Panics
///
/// Panics on a length mismatch or if any pair of samples is `epsilon` or more apart
#[track_caller]
pub fn assert_complex_closeness(actual: &[Complex64], expected: &[Complex64], epsilon: f64) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Signals must be of equal length"
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        if (a - e).norm() >= epsilon {
            panic!("Assertion failed at index {i}: {a} too far from expected value {e} (with epsilon {epsilon})");
        }
    }
}

/// Generate a random, complex signal of `len` samples with both parts in `[-1, 1)`
pub fn gen_random_signal(len: usize) -> Vec<Complex64> {
    let mut rng = thread_rng();
    let uniform_dist = Uniform::new(-1.0, 1.0);
    (0..len)
        .map(|_| Complex64::new(uniform_dist.sample(&mut rng), uniform_dist.sample(&mut rng)))
        .collect()
}

/// Forward DFT of `signal` computed by rustfft, for use as a reference result
pub fn reference_fft(signal: &[Complex64]) -> Vec<Complex64> {
    let mut buffer = signal.to_vec();
    if buffer.is_empty() {
        return buffer;
    }
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(buffer.len());
    fft.process(&mut buffer);
    buffer
}
