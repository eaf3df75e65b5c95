//! The litmus tests: instruction sequences plugged into the harness.

mod cas_failure;
mod conditional_jump;
mod loop_boundary;

pub use cas_failure::CasFailure;
pub use conditional_jump::ConditionalJump;
pub use loop_boundary::LoopBoundary;

use crate::experiment::StopCondition;
use crate::shared::{Iteration, SharedStateBlock};
use crate::worker::Spinner;
use core::fmt::Debug;
use std::time::Duration;

/// One litmus test.
///
/// The harness calls [`Litmus::mutator`] and [`Litmus::observer`] once per
/// round on their own threads, then applies [`Litmus::is_anomaly`] to the
/// final values. The predicate must be unsatisfiable by every sequentially
/// consistent interleaving of the two bodies.
pub trait Litmus: Debug + Sync {
    fn title(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Completes "reordering of instructions across ...".
    fn subject(&self) -> &'static str;

    /// Declares the shared variables: access modes and reset values.
    fn state(&self) -> SharedStateBlock;

    /// The sequence whose reordering is under test.
    fn mutator(&self, state: &SharedStateBlock, spin: &Spinner<'_>);

    /// The sequence that makes the mutator's reordering observable.
    fn observer(&self, state: &SharedStateBlock, spin: &Spinner<'_>);

    fn is_anomaly(&self, iteration: &Iteration) -> bool;

    /// One-line account of an anomalous iteration.
    fn explain(&self, iteration: &Iteration) -> String {
        format!(
            "X={}, Y={}, Z={}, r1={}, r2={}",
            iteration.x, iteration.y, iteration.z, iteration.r1, iteration.r2
        )
    }

    /// Coordinator-side hook, called during every reset.
    fn arm(&self) {}
}

/// The litmus tests this crate ships.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Variant {
    /// Load reordered across the failing branch of a compare-and-swap.
    CasFailure,
    /// Loop boundary test; the observer publishes its read of X with release.
    LoopBoundary,
    /// Loop boundary test; the observer's read of X is published relaxed.
    LoopBoundaryRelaxed,
    /// Store reordered across a conditional jump.
    ConditionalJump,
}

impl Variant {
    pub const ALL: [Self; 4] = [
        Self::CasFailure,
        Self::LoopBoundary,
        Self::LoopBoundaryRelaxed,
        Self::ConditionalJump,
    ];

    #[must_use]
    pub fn litmus(self) -> Box<dyn Litmus> {
        match self {
            Self::CasFailure => Box::new(CasFailure),
            Self::LoopBoundary => Box::new(LoopBoundary::release()),
            Self::LoopBoundaryRelaxed => Box::new(LoopBoundary::relaxed()),
            Self::ConditionalJump => Box::new(ConditionalJump),
        }
    }

    /// Iteration-bounded for the CAS test, time-bounded for the others.
    #[must_use]
    pub const fn default_stop(self) -> StopCondition {
        match self {
            Self::CasFailure => StopCondition::Count(10_000),
            Self::LoopBoundary | Self::LoopBoundaryRelaxed | Self::ConditionalJump => {
                StopCondition::Duration(Duration::from_secs(10))
            }
        }
    }
}
