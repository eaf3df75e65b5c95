//! The experiment loop: reset, arm, run, detect, report. See [`Experiment`].

use crate::barrier::RendezvousBarrier;
use crate::error::HarnessError;
use crate::litmus::Litmus;
use crate::schedule::{Concurrent, Schedule};
use crate::shared::SharedStateBlock;
use crate::stats::{RunResult, Statistics};
use crate::worker::{PARTICIPANTS, Workers};
use crate::yield_hint::{SpinLoop, YieldHint};
use core::fmt;
use std::thread;
use std::time::{Duration, Instant};

/// Progress is reported every this many iterations unless configured.
pub const DEFAULT_REPORT_EVERY: u64 = 1000;

/// When an experiment ends. Only checked between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCondition {
    /// After exactly this many iterations.
    Count(u64),
    /// After the first iteration that finishes past this much wall-clock time.
    Duration(Duration),
}

impl StopCondition {
    #[must_use]
    pub fn reached(self, completed: u64, elapsed: Duration) -> bool {
        match self {
            Self::Count(n) => completed >= n,
            Self::Duration(limit) => elapsed >= limit,
        }
    }
}

impl fmt::Display for StopCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n} iterations"),
            Self::Duration(d) => write!(f, "{} seconds", d.as_secs_f64()),
        }
    }
}

/// Where the coordinator is within one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Shared state holds its reset values.
    Reset,
    /// Barrier armed, start flag down.
    Armed,
    /// Start flag raised, payloads executing.
    Running,
    /// Every participant signalled completion.
    Completed,
    /// The iteration was recorded.
    Classified,
    /// Stop condition reached. Terminal.
    Report,
}

impl Phase {
    /// The phase after `self` while the experiment keeps going.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Reset => Self::Armed,
            Self::Armed => Self::Running,
            Self::Running => Self::Completed,
            Self::Completed => Self::Classified,
            Self::Classified => Self::Reset,
            Self::Report => Self::Report,
        }
    }

    fn advance(&mut self, to: Self, iteration: u64) {
        debug_assert!(self.next() == to, "illegal transition {self:?} -> {to:?}");
        log::trace!("iteration {iteration}: {self:?} -> {to:?}");
        *self = to;
    }
}

/// What a finished run leaves behind.
#[derive(Debug, Clone)]
pub struct Summary {
    pub statistics: Statistics,
    /// Reset cycles performed, one per iteration.
    pub resets: u64,
    pub elapsed: Duration,
}

/// Runs one litmus test over and over on two participant threads and
/// classifies every iteration.
#[derive(Debug)]
pub struct Experiment<'t, L: ?Sized, H = SpinLoop, S = Concurrent> {
    litmus: &'t L,
    hint: H,
    schedule: S,
    fenced: bool,
    report_every: u64,
}

impl<'t, L: Litmus + ?Sized> Experiment<'t, L> {
    #[must_use]
    pub const fn new(litmus: &'t L) -> Self {
        Self {
            litmus,
            hint: SpinLoop,
            schedule: Concurrent,
            fenced: false,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }
}

impl<'t, L, H, S> Experiment<'t, L, H, S>
where
    L: Litmus + ?Sized,
    H: YieldHint,
    S: Schedule,
{
    #[must_use]
    pub fn with_schedule<S2: Schedule>(self, schedule: S2) -> Experiment<'t, L, H, S2> {
        Experiment {
            litmus: self.litmus,
            hint: self.hint,
            schedule,
            fenced: self.fenced,
            report_every: self.report_every,
        }
    }

    #[must_use]
    pub fn with_hint<H2: YieldHint>(self, hint: H2) -> Experiment<'t, L, H2, S> {
        Experiment {
            litmus: self.litmus,
            hint,
            schedule: self.schedule,
            fenced: self.fenced,
            report_every: self.report_every,
        }
    }

    /// Put a full fence around every shared access.
    #[must_use]
    pub fn fenced(mut self, fenced: bool) -> Self {
        self.fenced = fenced;
        self
    }

    /// Call the progress callback every `every` iterations (at least 1).
    #[must_use]
    pub fn report_every(mut self, every: u64) -> Self {
        self.report_every = every.max(1);
        self
    }

    /// Runs iterations until `stop` is reached, calling `on_progress` every
    /// [`Self::report_every`] iterations.
    ///
    /// # Errors
    /// A [`HarnessError`] if the rendezvous protocol itself was violated.
    /// The participant threads are shut down in every case.
    pub fn run(
        &self,
        stop: StopCondition,
        mut on_progress: impl FnMut(&Statistics),
    ) -> Result<Summary, HarnessError> {
        let state = if self.fenced {
            self.litmus.state().fenced()
        } else {
            self.litmus.state()
        };
        for var in state.variables() {
            log::debug!("{}: {:?}, {:?} access", var.name(), var.role(), var.access());
        }
        log::debug!("running \"{}\" for {stop}", self.litmus.title());

        let barrier = RendezvousBarrier::new(PARTICIPANTS, &self.hint);
        let summary = thread::scope(|scope| {
            let _workers = Workers::spawn(scope, &barrier, &state, self.litmus, &self.schedule);
            self.drive(&barrier, &state, stop, &mut on_progress)
        })?;

        log::debug!(
            "{} resets in {:.3}s",
            summary.resets,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    fn drive<B: YieldHint>(
        &self,
        barrier: &RendezvousBarrier<B>,
        state: &SharedStateBlock,
        stop: StopCondition,
        on_progress: &mut dyn FnMut(&Statistics),
    ) -> Result<Summary, HarnessError> {
        let started = Instant::now();
        let mut statistics = Statistics::new();
        let mut resets = 0;
        // last completed step; the loop enters Reset first
        let mut phase = Phase::Classified;

        while !stop.reached(statistics.total(), started.elapsed()) {
            let index = statistics.total();

            state.reset();
            resets += 1;
            if let Some(var) = state.first_dirty() {
                return Err(HarnessError::DirtyReset {
                    iteration: index,
                    variable: var.name(),
                });
            }
            self.litmus.arm();
            phase.advance(Phase::Reset, index);

            barrier.arm();
            self.schedule.arm();
            debug_assert!(!barrier.is_released());
            phase.advance(Phase::Armed, index);

            barrier.release();
            phase.advance(Phase::Running, index);

            let completed = barrier.await_completion(PARTICIPANTS);
            if completed != PARTICIPANTS {
                return Err(HarnessError::CompletionMismatch {
                    iteration: index,
                    completed,
                    expected: PARTICIPANTS,
                });
            }
            phase.advance(Phase::Completed, index);

            let iteration = state.snapshot(index);
            let result = RunResult::from_anomaly(self.litmus.is_anomaly(&iteration));
            if result.is_anomaly() {
                log::info!(
                    "Anomaly detected in iteration {index}! {}",
                    self.litmus.explain(&iteration)
                );
            }
            statistics.record(result);
            phase.advance(Phase::Classified, index);

            if statistics.total() % self.report_every == 0 {
                on_progress(&statistics);
            }
        }

        log::trace!("{phase:?} -> {:?}", Phase::Report);
        Ok(Summary {
            statistics,
            resets,
            elapsed: started.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::litmus::{CasFailure, LoopBoundary};
    use crate::schedule::{FirstMover, Lockstep};
    use assert2::check;

    #[test]
    fn phases_cycle_until_report() {
        let mut phase = Phase::Reset;
        for expected in [
            Phase::Armed,
            Phase::Running,
            Phase::Completed,
            Phase::Classified,
            Phase::Reset,
        ] {
            phase = phase.next();
            check!(phase == expected);
        }
        check!(Phase::Report.next() == Phase::Report);
    }

    #[test]
    fn stop_conditions() {
        check!(!StopCondition::Count(3).reached(2, Duration::from_secs(100)));
        check!(StopCondition::Count(3).reached(3, Duration::ZERO));
        check!(!StopCondition::Duration(Duration::from_secs(1)).reached(99, Duration::ZERO));
        check!(StopCondition::Duration(Duration::ZERO).reached(0, Duration::ZERO));
        check!(StopCondition::Count(500).to_string() == "500 iterations");
        check!(StopCondition::Duration(Duration::from_secs(10)).to_string() == "10 seconds");
    }

    // Scenario C.
    #[test]
    fn count_bound_runs_exact_reset_cycles() {
        let summary = Experiment::new(&CasFailure)
            .run(StopCondition::Count(500), |_| {})
            .unwrap();
        check!(summary.resets == 500);
        check!(summary.statistics.total() == 500);
    }

    #[test]
    fn zero_count_runs_nothing() {
        let summary = Experiment::new(&CasFailure)
            .run(StopCondition::Count(0), |_| {})
            .unwrap();
        check!(summary.resets == 0);
        check!(summary.statistics.snapshot().percentage == 0.0);
    }

    #[test]
    fn duration_bound_terminates() {
        let limit = Duration::from_millis(200);
        let summary = Experiment::new(&LoopBoundary::relaxed())
            .run(StopCondition::Duration(limit), |_| {})
            .unwrap();
        check!(summary.elapsed >= limit);
        check!(summary.elapsed < limit + Duration::from_secs(5));
        check!(summary.statistics.total() > 0);
        check!(summary.resets == summary.statistics.total());
    }

    #[test]
    fn progress_reported_every_k_iterations() {
        let mut seen = Vec::new();
        Experiment::new(&CasFailure)
            .with_schedule(Lockstep::new(FirstMover::Alternate))
            .report_every(100)
            .run(StopCondition::Count(350), |stats| seen.push(stats.total()))
            .unwrap();
        check!(seen == [100, 200, 300]);
    }

    #[test]
    fn report_every_zero_is_clamped() {
        let mut calls = 0;
        Experiment::new(&CasFailure)
            .report_every(0)
            .run(StopCondition::Count(5), |_| calls += 1)
            .unwrap();
        check!(calls == 5);
    }
}
