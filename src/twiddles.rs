//! Twiddle factors (complex roots of unity) for radix-2 butterflies
use num_complex::Complex;
use num_traits::{Float, FloatConst};

/// Reverse is for running the Inverse Fast Fourier Transform (IFFT)
/// Forward is for running the regular FFT
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Negative twiddle angle, no normalization
    Forward,
    /// Positive twiddle angle, output scaled by `1/N`
    Reverse,
}

impl Direction {
    /// `-2π` for [`Direction::Forward`], `+2π` for [`Direction::Reverse`]
    fn full_turn<T: Float + FloatConst>(self) -> T {
        match self {
            Direction::Forward => -T::TAU(),
            Direction::Reverse => T::TAU(),
        }
    }
}

/// Computes `w^k` for a butterfly of width `len` directly from its angle.
///
/// Every call is independent, which is what the parallel per-pair schedules need.
#[inline]
pub fn twiddle<T: Float + FloatConst>(k: usize, len: usize, direction: Direction) -> Complex<T> {
    let angle = direction.full_turn::<T>() * T::from(k).unwrap_or_else(T::zero)
        / T::from(len).unwrap_or_else(T::one);
    Complex::from_polar(T::one(), angle)
}

/// Incremental generator of `w^0, w^1, w^2, ...` where `w = exp(∓i·2π/len)`.
///
/// Only the base root is evaluated with sin/cos; every following power is one complex multiply.
pub(crate) struct Twiddles<T> {
    w: Complex<T>,
    w_k: Complex<T>,
}

impl<T: Float + FloatConst> Twiddles<T> {
    pub fn new(len: usize, direction: Direction) -> Self {
        Self {
            w: twiddle(1, len, direction),
            w_k: Complex::new(T::one(), T::zero()),
        }
    }
}

impl<T: Float> Iterator for Twiddles<T> {
    type Item = Complex<T>;

    fn next(&mut self) -> Option<Complex<T>> {
        let current = self.w_k;
        self.w_k = self.w_k * self.w;
        Some(current)
    }
}

/// Twiddle table `[w^0, ..., w^(dist - 1)]` for a stage of width `2 * dist`
pub(crate) fn generate_twiddles<T: Float + FloatConst>(
    dist: usize,
    direction: Direction,
) -> Vec<Complex<T>> {
    Twiddles::new(dist << 1, direction).take(dist).collect()
}
