//! Out-of-place bit reverse permutation, the reordering needed before an iterative
//! decimation-in-time butterfly schedule.
//!
//! Output slot `j` receives input element `rev(j)`. Bit reversal is an involution, so this is
//! the same as writing input `i` to slot `rev(i)`, but it lets every worker own exactly the
//! output slots it writes.
use rayon::prelude::*;

/// Reverses the lowest `log_n` bits of `index`
#[inline]
pub fn reverse_index(index: usize, log_n: u32) -> usize {
    if log_n == 0 {
        return 0;
    }
    index.reverse_bits() >> (usize::BITS - log_n)
}

/// Writes the bit reverse permutation of `input` into `output`.
///
/// # Panics
///
/// Panics if `input.len() != output.len()` or if the length is not a power of 2
pub fn bit_reverse_permute<T: Copy + Send + Sync>(
    input: &[T],
    output: &mut [T],
    multithreaded: bool,
) {
    assert_eq!(input.len(), output.len());
    if input.is_empty() {
        return;
    }
    assert!(input.len().is_power_of_two());
    let log_n = input.len().ilog2();

    if multithreaded {
        output
            .par_iter_mut()
            .enumerate()
            .for_each(|(j, slot)| *slot = input[reverse_index(j, log_n)]);
    } else {
        output
            .iter_mut()
            .enumerate()
            .for_each(|(j, slot)| *slot = input[reverse_index(j, log_n)]);
    }
}
