/// Options to tune to improve performance depending on the hardware and input size.
///
/// Engines constructed without explicit options use [`Options::default`]; use
/// [`Options::guess_options`] to pick thread usage from the signal length.
///
/// You only need to tune these options if you are trying to squeeze maximum performance
/// out of a known hardware platform that you can benchmark at varying input sizes.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct Options {
    /// Run bit reversal, butterflies and normalization on the rayon thread pool
    pub multithreaded: bool,
    /// Buffers shorter than this are always processed on the calling thread
    pub parallel_cutoff: usize,
    /// A stage is split per block only when it has at least this many blocks per worker thread.
    /// Below that, the butterfly pairs of every block are spread over the pool instead.
    pub min_blocks_per_thread: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            multithreaded: true,
            parallel_cutoff: 1 << 12,
            min_blocks_per_thread: 4,
        }
    }
}

impl Options {
    /// Reasonable defaults for a transform of `input_size` points
    pub fn guess_options(input_size: usize) -> Options {
        let mut options = Options::default();
        options.multithreaded = input_size >= options.parallel_cutoff;
        options
    }

    /// Everything runs on the calling thread
    pub fn sequential() -> Options {
        Options {
            multithreaded: false,
            ..Options::default()
        }
    }

    /// Whether a buffer of `len` points should be processed on the thread pool
    pub(crate) fn parallel_for(&self, len: usize) -> bool {
        self.multithreaded && len >= self.parallel_cutoff
    }

    /// Picks how the butterflies of the stage of width `len` over a buffer of `buffer_len`
    /// points are distributed over threads.
    pub(crate) fn schedule(&self, buffer_len: usize, len: usize) -> StageSchedule {
        if !self.parallel_for(buffer_len) {
            return StageSchedule::Sequential;
        }
        let blocks = buffer_len / len;
        if blocks >= rayon::current_num_threads() * self.min_blocks_per_thread {
            StageSchedule::PerBlock
        } else {
            StageSchedule::PerPair
        }
    }
}

/// How one butterfly stage is spread over threads
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StageSchedule {
    /// Single thread, incremental twiddle table
    Sequential,
    /// One task per block of `len` points, sharing an incremental twiddle table
    PerBlock,
    /// One task per butterfly pair, twiddle evaluated from its angle
    PerPair,
}
