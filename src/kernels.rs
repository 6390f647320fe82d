//! Radix-2 decimation-in-time butterfly kernels
//!
//! - [`butterfly_stage`]: one stage of width `len` over a buffer that holds whole blocks
//! - [`combine_partitions`]: one stage whose pairs live in two different buffers
//! - [`normalize`]: the `1/N` scaling of the inverse transform
use num_complex::Complex;
use num_traits::{Float, FloatConst};
use rayon::prelude::*;

use crate::options::StageSchedule;
use crate::twiddles::{generate_twiddles, twiddle, Direction};

/// Butterflies of a single block of `2 * twiddles.len()` points
#[multiversion::multiversion(targets(
    "x86_64+avx512f+avx512bw+avx512cd+avx512dq+avx512vl",
    "x86_64+avx2+fma",
    "x86_64+sse4.2",
    "x86+avx2+fma",
    "x86+sse4.2",
    "x86+sse2",
    "aarch64+neon",
))]
#[inline]
pub(crate) fn butterfly_block<T: Float>(block: &mut [Complex<T>], twiddles: &[Complex<T>]) {
    let dist = block.len() >> 1;
    let (block_s0, block_s1) = block.split_at_mut(dist);

    block_s0
        .iter_mut()
        .zip(block_s1.iter_mut())
        .zip(twiddles.iter())
        .for_each(|((u, v), w)| {
            let in0 = *u;
            let in1 = *v * *w;
            *u = in0 + in1;
            *v = in0 - in1;
        });
}

/// Runs the stage of width `len` on every block of `data`.
///
/// # Panics
///
/// Panics if `len` is not a power of 2 of at least 2, or if it does not divide `data.len()`
pub(crate) fn butterfly_stage<T>(
    data: &mut [Complex<T>],
    len: usize,
    direction: Direction,
    schedule: StageSchedule,
) where
    T: Float + FloatConst + Send + Sync,
{
    assert!(len >= 2 && len.is_power_of_two());
    assert_eq!(data.len() % len, 0);
    let dist = len >> 1;

    match schedule {
        StageSchedule::Sequential => {
            let twiddles = generate_twiddles(dist, direction);
            data.chunks_exact_mut(len)
                .for_each(|block| butterfly_block(block, &twiddles));
        }
        StageSchedule::PerBlock => {
            let twiddles = generate_twiddles(dist, direction);
            data.par_chunks_exact_mut(len)
                .for_each(|block| butterfly_block(block, &twiddles));
        }
        StageSchedule::PerPair => {
            // (block, offset) pairs form one flat parallel iterator
            data.par_chunks_exact_mut(len)
                .flat_map(|block| {
                    let (block_s0, block_s1) = block.split_at_mut(dist);
                    block_s0
                        .par_iter_mut()
                        .zip(block_s1.par_iter_mut())
                        .enumerate()
                })
                .for_each(|(j, (u, v))| {
                    let in0 = *u;
                    let in1 = *v * twiddle(j, len, direction);
                    *u = in0 + in1;
                    *v = in0 - in1;
                });
        }
    }
}

/// Which half of a butterfly the local buffer holds in a stage spanning two buffers
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Role {
    /// `own + received * w`
    Lower,
    /// `received - own * w`
    Upper,
}

#[inline]
fn combine_pair<T: Float>(own: Complex<T>, received: Complex<T>, w: Complex<T>, role: Role) -> Complex<T> {
    match role {
        Role::Lower => own + received * w,
        Role::Upper => received - own * w,
    }
}

/// Finishes a stage of width `len` whose butterfly partners are in `received`.
///
/// Local index `i` pairs with `received[i]` and uses `w^(start_j + i)`.
///
/// # Panics
///
/// Panics if `own.len() != received.len()` or if the twiddle indices leave `[0, len / 2)`
pub(crate) fn combine_partitions<T>(
    own: &mut [Complex<T>],
    received: &[Complex<T>],
    start_j: usize,
    len: usize,
    direction: Direction,
    role: Role,
    multithreaded: bool,
) where
    T: Float + FloatConst + Send + Sync,
{
    assert_eq!(own.len(), received.len());
    assert!(start_j + own.len() <= len >> 1);

    if multithreaded {
        own.par_iter_mut()
            .zip(received.par_iter())
            .enumerate()
            .for_each(|(i, (x, r))| {
                *x = combine_pair(*x, *r, twiddle(start_j + i, len, direction), role);
            });
    } else {
        own.iter_mut()
            .zip(received.iter())
            .enumerate()
            .for_each(|(i, (x, r))| {
                *x = combine_pair(*x, *r, twiddle(start_j + i, len, direction), role);
            });
    }
}

/// Divides every sample by `n`
pub(crate) fn normalize<T>(data: &mut [Complex<T>], n: usize, multithreaded: bool)
where
    T: Float + Send + Sync,
{
    let scaling_factor = T::one() / T::from(n).unwrap_or_else(T::one);
    if multithreaded {
        data.par_iter_mut().for_each(|z| *z = z.scale(scaling_factor));
    } else {
        data.iter_mut().for_each(|z| *z = z.scale(scaling_factor));
    }
}
