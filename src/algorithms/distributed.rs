//! Distributed FFT over a process group
//!
//! The iterative schedule, split across `P` ranks that each own `N/P` consecutive points of
//! the bit reversed signal.
//!
//! ## Protocol
//!
//! 1. The root broadcasts `N`
//! 2. The root bit reverses the whole signal and scatters it in chunks of `N/P`
//! 3. Stages of width `len <= N/P` run on the local partition, spread over threads
//! 4. Wider stages pair every rank with `rank ^ group_size` along a hypercube, where
//!    `group_size = (len/2) / (N/P)`. The two ranks swap partitions once and each finishes its
//!    own half of the butterflies
//! 5. The root gathers the partitions back in rank order and, for the inverse, scales by `1/N`
//!
//! Every step is a collective on the [`Communicator`], so all ranks move through the stages
//! in lockstep.
use num_complex::Complex64;
use tracing::{debug, trace};

use crate::algorithms::{EngineState, Transform};
use crate::bit_reversal::bit_reverse_permute;
use crate::error::{FftError, Result};
use crate::group::{launch, Communicator, GroupConfig, ROOT};
use crate::kernels::{butterfly_stage, combine_partitions, normalize, Role};
use crate::options::Options;
use crate::timer::Timer;
use crate::twiddles::Direction;

/// Where a rank stands in a stage wider than its partition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CrossStage {
    pub partner: usize,
    pub role: Role,
    /// Twiddle exponent of the first local point
    pub start_j: usize,
}

impl CrossStage {
    /// # Panics
    ///
    /// Panics if the stage of width `len` fits inside a partition of `local_len` points
    pub(crate) fn new(rank: usize, len: usize, local_len: usize) -> Self {
        let dist = len >> 1;
        assert!(dist >= local_len && dist % local_len == 0);
        let group_size = dist / local_len;

        let role = if rank & group_size == 0 {
            Role::Lower
        } else {
            Role::Upper
        };

        Self {
            partner: rank ^ group_size,
            role,
            start_j: (rank % group_size) * local_len,
        }
    }
}

/// Rejects lengths the partitioning cannot handle.
///
/// Every rank knows `n` and `ranks`, so every rank reaches the same verdict without talking
/// to its peers.
fn check_partition(n: usize, ranks: usize) -> Result<()> {
    if !n.is_power_of_two() {
        return Err(FftError::InvalidSize(n));
    }
    if n % ranks != 0 {
        return Err(FftError::UnevenPartition { len: n, ranks });
    }
    Ok(())
}

/// One rank of a distributed transform.
///
/// Only the root's input is read and only the root ends up with an output; the other ranks
/// hold empty buffers once a call returns.
#[derive(Debug)]
pub struct DistributedEngine<C: Communicator> {
    comm: C,
    state: EngineState,
    options: Options,
}

impl<C: Communicator> DistributedEngine<C> {
    pub fn new(comm: C) -> Result<Self> {
        Self::with_options(comm, Options::default())
    }

    pub fn with_options(comm: C, options: Options) -> Result<Self> {
        let size = comm.size();
        if size == 0 || !size.is_power_of_two() {
            return Err(FftError::InvalidGroupSize(size));
        }
        Ok(Self {
            comm,
            state: EngineState::default(),
            options,
        })
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn ranks(&self) -> usize {
        self.comm.size()
    }

    pub fn is_root(&self) -> bool {
        self.comm.is_root()
    }

    fn run(&mut self, direction: Direction) -> Result<()> {
        let timer = Timer::start();
        let rank = self.rank();
        let ranks = self.ranks();

        let n = self.comm.broadcast_len(self.state.input.len())?;
        self.state.output.clear();
        if n == 0 {
            self.state.duration = timer.elapsed();
            return Ok(());
        }
        check_partition(n, ranks)?;
        let local_len = n / ranks;

        let mut permuted = Vec::new();
        if self.comm.is_root() {
            permuted.resize(n, Complex64::default());
            bit_reverse_permute(&self.state.input, &mut permuted, self.options.parallel_for(n));
        }
        let mut local = self.comm.scatter(&permuted)?;
        drop(permuted);
        assert_eq!(local.len(), local_len);

        for stage in 1..=n.ilog2() {
            let len = 1 << stage;
            if len <= local_len {
                let schedule = self.options.schedule(local_len, len);
                butterfly_stage(&mut local, len, direction, schedule);
            } else {
                self.cross_stage(&mut local, len, direction)?;
            }
        }

        let mut output = self.comm.gather(local)?;
        if self.comm.is_root() && direction == Direction::Reverse {
            normalize(&mut output, n, self.options.parallel_for(n));
        }

        self.state.output = output;
        self.state.duration = timer.elapsed();
        debug!(rank, ranks, n, ?direction, elapsed = ?self.state.duration, "distributed transform");
        Ok(())
    }

    /// A stage whose butterflies pair this rank's partition with another rank's
    fn cross_stage(&self, local: &mut [Complex64], len: usize, direction: Direction) -> Result<()> {
        let rank = self.comm.rank();
        let step = CrossStage::new(rank, len, local.len());
        trace!(rank, len, partner = step.partner, role = ?step.role, "cross-rank stage");

        let received = self.comm.exchange(step.partner, len, local)?;
        combine_partitions(
            local,
            &received,
            step.start_j,
            len,
            direction,
            step.role,
            self.options.parallel_for(local.len()),
        );
        Ok(())
    }
}

impl<C: Communicator> Transform for DistributedEngine<C> {
    fn name(&self) -> &'static str {
        "Distributed"
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

/// Drives a whole in-process group through the [`Transform`] contract.
///
/// Every call launches `ranks` threads, each running a [`DistributedEngine`] over a
/// [`ChannelCommunicator`](crate::group::ChannelCommunicator); the root's output and duration
/// become this engine's.
#[derive(Debug, Clone)]
pub struct LocalCluster {
    ranks: usize,
    config: GroupConfig,
    options: Options,
    state: EngineState,
}

impl LocalCluster {
    pub fn new(ranks: usize) -> Result<Self> {
        Self::with_options(ranks, GroupConfig::default(), Options::default())
    }

    pub fn with_options(ranks: usize, config: GroupConfig, options: Options) -> Result<Self> {
        if ranks == 0 || !ranks.is_power_of_two() {
            return Err(FftError::InvalidGroupSize(ranks));
        }
        Ok(Self {
            ranks,
            config,
            options,
            state: EngineState::default(),
        })
    }

    pub fn ranks(&self) -> usize {
        self.ranks
    }

    fn run(&mut self, direction: Direction) -> Result<()> {
        let input = &self.state.input;
        let options = &self.options;

        let results = launch(self.ranks, &self.config, |comm| {
            let mut engine = DistributedEngine::with_options(comm, options.clone())?;
            if engine.rank() == ROOT {
                engine.load(input.clone());
            }
            engine.run(direction)?;
            Ok::<_, FftError>((engine.take_output(), engine.duration()))
        })?;

        let mut root = None;
        for (rank, result) in results.into_iter().enumerate() {
            let (output, duration) = result?;
            if rank == ROOT {
                root = Some((output, duration));
            }
        }
        if let Some((output, duration)) = root {
            self.state.output = output;
            self.state.duration = duration;
        }
        Ok(())
    }
}

impl Transform for LocalCluster {
    fn name(&self) -> &'static str {
        "Distributed"
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

#[cfg(test)]
mod tests {
    use utilities::{assert_complex_closeness, gen_random_signal, reference_fft};

    use super::*;
    use crate::algorithms::iterative::IterativeEngine;
    use crate::group::ChannelCommunicator;

    fn parallel_options() -> Options {
        Options {
            parallel_cutoff: 0,
            ..Options::default()
        }
    }

    fn cluster(ranks: usize, options: Options) -> LocalCluster {
        LocalCluster::with_options(ranks, GroupConfig::default(), options).unwrap()
    }

    fn iterative_fft(signal: &[Complex64]) -> Vec<Complex64> {
        let mut engine = IterativeEngine::with_options(Options::sequential());
        engine.load(signal.to_vec());
        engine.compute().unwrap();
        engine.take_output()
    }

    #[test]
    fn hypercube_partners() {
        // N = 16, P = 4, local_len = 4
        let stage_8: Vec<_> = (0..4).map(|rank| CrossStage::new(rank, 8, 4)).collect();
        assert_eq!(
            stage_8.iter().map(|s| s.partner).collect::<Vec<_>>(),
            vec![1, 0, 3, 2]
        );
        assert_eq!(
            stage_8.iter().map(|s| s.role).collect::<Vec<_>>(),
            vec![Role::Lower, Role::Upper, Role::Lower, Role::Upper]
        );
        assert!(stage_8.iter().all(|s| s.start_j == 0));

        let stage_16: Vec<_> = (0..4).map(|rank| CrossStage::new(rank, 16, 4)).collect();
        assert_eq!(
            stage_16.iter().map(|s| s.partner).collect::<Vec<_>>(),
            vec![2, 3, 0, 1]
        );
        assert_eq!(
            stage_16.iter().map(|s| s.role).collect::<Vec<_>>(),
            vec![Role::Lower, Role::Lower, Role::Upper, Role::Upper]
        );
        assert_eq!(
            stage_16.iter().map(|s| s.start_j).collect::<Vec<_>>(),
            vec![0, 4, 0, 4]
        );
    }

    #[test]
    fn matches_rustfft_for_every_group_size() {
        for ranks in [1, 2, 4, 8] {
            for options in [Options::sequential(), parallel_options()] {
                for k in 3..12 {
                    let n = 1 << k;
                    let signal = gen_random_signal(n);
                    let mut engine = cluster(ranks, options.clone());
                    engine.load(signal.clone());
                    engine.compute().unwrap();
                    assert_complex_closeness(engine.output(), &reference_fft(&signal), 1e-9);
                }
            }
        }
    }

    #[test]
    fn first_cross_stage_at_twice_the_partition() {
        // local_len = 2, so the stage of width 4 is already the first one spanning ranks
        for (n, ranks) in [(8, 4), (16, 8), (4, 2), (2, 2)] {
            let signal = gen_random_signal(n);
            let mut engine = cluster(ranks, Options::sequential());
            engine.load(signal.clone());
            engine.compute().unwrap();
            assert_complex_closeness(engine.output(), &iterative_fft(&signal), 1e-12);
        }
    }

    #[test]
    fn one_point_per_rank() {
        // local_len = 1, every stage crosses ranks
        let signal = gen_random_signal(4);
        let mut engine = cluster(4, parallel_options());
        engine.load(signal.clone());
        engine.compute().unwrap();
        assert_complex_closeness(engine.output(), &iterative_fft(&signal), 1e-12);
    }

    #[test]
    fn round_trip() {
        for ranks in [1, 2, 4] {
            let signal = gen_random_signal(1 << 9);
            let mut engine = cluster(ranks, parallel_options());
            engine.load(signal.clone());
            engine.compute().unwrap();

            let spectrum = engine.take_output();
            engine.load(spectrum);
            engine.reverse_compute().unwrap();
            assert_complex_closeness(engine.output(), &signal, 1e-9);
        }
    }

    #[test]
    fn known_transforms() {
        let mut engine = cluster(2, Options::default());
        let mut impulse = vec![Complex64::default(); 4];
        impulse[0] = Complex64::new(1.0, 0.0);
        engine.load(impulse);
        engine.compute().unwrap();
        assert_complex_closeness(engine.output(), &[Complex64::new(1.0, 0.0); 4], 1e-12);

        let n = 32;
        engine.load(vec![Complex64::new(1.0, 0.0); n]);
        engine.compute().unwrap();
        let mut expected = vec![Complex64::default(); n];
        expected[0] = Complex64::new(n as f64, 0.0);
        assert_complex_closeness(engine.output(), &expected, 1e-9);
    }

    #[test]
    fn rejects_uneven_partition() {
        let mut engine = cluster(4, Options::default());
        engine.load(vec![Complex64::new(1.0, 0.0); 2]);
        assert!(matches!(
            engine.compute(),
            Err(FftError::UnevenPartition { len: 2, ranks: 4 })
        ));
    }

    #[test]
    fn every_rank_rejects_a_bad_length() {
        let results = launch(2, &GroupConfig::default(), |comm| {
            let mut engine = DistributedEngine::new(comm)?;
            if engine.is_root() {
                engine.load(vec![Complex64::new(1.0, 0.0); 6]);
            }
            engine.compute()
        })
        .unwrap();
        assert!(results
            .iter()
            .all(|r| matches!(r, Err(FftError::InvalidSize(6)))));
    }

    #[test]
    fn empty_input_is_trivial() {
        let mut engine = cluster(4, Options::default());
        engine.compute().unwrap();
        assert!(engine.output().is_empty());
        engine.reverse_compute().unwrap();
        assert!(engine.output().is_empty());
    }

    #[test]
    fn only_root_holds_output() {
        let signal = gen_random_signal(64);
        let results = launch(4, &GroupConfig::default(), |comm| {
            let mut engine = DistributedEngine::new(comm)?;
            if engine.is_root() {
                engine.load(signal.clone());
            }
            engine.compute()?;
            Ok::<_, FftError>(engine.take_output())
        })
        .unwrap();

        let outputs: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_complex_closeness(&outputs[0], &reference_fft(&signal), 1e-9);
        assert!(outputs[1..].iter().all(Vec::is_empty));
    }

    #[test]
    fn single_rank_group_without_threads() {
        let comm = ChannelCommunicator::group(1, &GroupConfig::default())
            .unwrap()
            .pop()
            .unwrap();
        let mut engine = DistributedEngine::new(comm).unwrap();
        let signal = gen_random_signal(128);
        engine.load(signal.clone());
        engine.reverse_compute().unwrap();

        let mut expected = reference_fft(&signal.iter().map(|z| z.conj()).collect::<Vec<_>>());
        expected
            .iter_mut()
            .for_each(|z| *z = z.conj() / signal.len() as f64);
        assert_complex_closeness(engine.output(), &expected, 1e-9);
    }

    #[test]
    fn cluster_keeps_its_size() {
        assert_eq!(cluster(8, Options::default()).ranks(), 8);
        assert_eq!(LocalCluster::new(1).unwrap().ranks(), 1);
    }

    #[test]
    fn rejects_bad_cluster_size() {
        assert!(matches!(
            LocalCluster::new(3),
            Err(FftError::InvalidGroupSize(3))
        ));
    }
}
