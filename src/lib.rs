#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::perf
    // clippy::restriction,
    // clippy::pedantic
)]
// now allow a few rules which are denied by the above statement
// --> they are ridiculous and not necessary
#![allow(
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::fallible_impl_from
)]
#![deny(missing_debug_implementations)]

//! Litmus tests for instruction reordering.
//!
//! Two threads, the *mutator* and the *observer*, run a short instruction
//! sequence against shared memory, over and over. Each litmus test picks the
//! sequences so that a certain outcome is impossible under sequential
//! consistency; every time it shows up anyway, the CPU or the compiler
//! reordered something. A run that never sees it is evidence, not proof.

pub mod barrier;
pub mod error;
pub mod experiment;
pub mod litmus;
pub mod schedule;
pub mod shared;
pub mod stats;
pub mod worker;
pub mod yield_hint;

pub use error::HarnessError;
pub use experiment::{Experiment, StopCondition, Summary};
pub use litmus::{Litmus, Variant};
pub use stats::{RunResult, Snapshot, Statistics, Verdict};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::litmus::CasFailure;
    use crate::schedule::{FirstMover, Lockstep};
    use crate::shared::{Iteration, SharedStateBlock};
    use crate::worker::Spinner;
    use crate::yield_hint::tests::CountingHint;
    use assert2::check;
    use std::sync::atomic::{AtomicBool, Ordering};

    // Strictly sequential execution in program order: no predicate may fire.
    #[test]
    fn lockstep_never_reports_anomalies() {
        for variant in Variant::ALL {
            let litmus = variant.litmus();
            let summary = Experiment::new(&*litmus)
                .with_schedule(Lockstep::new(FirstMover::Alternate))
                .run(StopCondition::Count(1000), |_| {})
                .unwrap();
            check!(summary.statistics.total() == 1000, "{variant:?}");
            check!(summary.statistics.anomalies() == 0, "{variant:?}");
        }
    }

    // Scenario A.
    #[test]
    fn fenced_cas_failure_reports_no_anomalies() {
        let summary = Experiment::new(&CasFailure)
            .fenced(true)
            .run(StopCondition::Count(10_000), |_| {})
            .unwrap();
        check!(summary.statistics.total() == 10_000);
        check!(summary.statistics.anomalies() == 0);
        check!(summary.statistics.verdict() == Verdict::NoReorderingObserved);
    }

    #[test]
    fn fenced_variants_report_no_anomalies() {
        for variant in Variant::ALL {
            let litmus = variant.litmus();
            let summary = Experiment::new(&*litmus)
                .fenced(true)
                .run(StopCondition::Count(2000), |_| {})
                .unwrap();
            check!(summary.statistics.anomalies() == 0, "{variant:?}");
        }
    }

    /// The CAS failure test whose observer, with probability `p`, stores Y
    /// before waiting for Z instead of after.
    #[derive(Debug)]
    struct InjectedCas {
        p: f64,
        swap: AtomicBool,
    }

    impl Litmus for InjectedCas {
        fn title(&self) -> &'static str {
            "injected"
        }
        fn description(&self) -> &'static str {
            CasFailure.description()
        }
        fn subject(&self) -> &'static str {
            CasFailure.subject()
        }
        fn state(&self) -> SharedStateBlock {
            CasFailure.state()
        }
        fn mutator(&self, state: &SharedStateBlock, spin: &Spinner<'_>) {
            CasFailure.mutator(state, spin);
        }
        fn observer(&self, state: &SharedStateBlock, spin: &Spinner<'_>) {
            if self.swap.load(Ordering::Relaxed) {
                state.x.store(2);
                state.y.store(1);
                spin.until(|| state.z.load() == 42);
            } else {
                CasFailure.observer(state, spin);
            }
        }
        fn is_anomaly(&self, iteration: &Iteration) -> bool {
            CasFailure.is_anomaly(iteration)
        }
        fn arm(&self) {
            self.swap.store(fastrand::f64() < self.p, Ordering::Relaxed);
        }
    }

    // Scenario B.
    #[test]
    fn injected_reordering_rate_matches_probability() {
        const N: u64 = 10_000;
        // arm() runs on this thread
        fastrand::seed(0x5eed);
        let p = 0.25;
        let litmus = InjectedCas {
            p,
            swap: AtomicBool::new(false),
        };

        let summary = Experiment::new(&litmus)
            .with_schedule(Lockstep::new(FirstMover::Observer))
            .run(StopCondition::Count(N), |_| {})
            .unwrap();

        let rate = summary.statistics.snapshot().percentage / 100.0;
        check!((rate - p).abs() < 0.03, "rate {rate} too far from {p}");
        check!(summary.statistics.verdict() == Verdict::ReorderingObserved);
    }

    #[test]
    fn custom_hint_is_used_for_spinning() {
        let hint = CountingHint::default();
        let summary = Experiment::new(&CasFailure)
            .with_hint(&hint)
            .with_schedule(Lockstep::new(FirstMover::Observer))
            .run(StopCondition::Count(100), |_| {})
            .unwrap();
        check!(summary.statistics.anomalies() == 0);
        check!(hint.spins.load(Ordering::Relaxed) > 0);
    }
}
