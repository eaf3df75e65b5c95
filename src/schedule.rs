//! How the two participants share the CPU during a round.
//!
//! [`Concurrent`] lets them race for real. [`Lockstep`] runs them strictly
//! one at a time, handing over the turn whenever the running one has to
//! wait for the other. Under lockstep every execution is sequentially
//! consistent, so no anomaly predicate may ever fire.

use crate::worker::Participant;
use crate::yield_hint::YieldHint;
use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread;

const SPINS_BEFORE_YIELD: u32 = 1 << 10;

/// Hooks the participant template calls around and inside a payload.
pub trait Schedule: Debug + Sync {
    /// Called by the coordinator while the round is armed, before release.
    fn arm(&self) {}

    /// Called by `participant` before its payload starts.
    fn enter(&self, _participant: Participant, _hint: &dyn YieldHint) {}

    /// Called by `participant` once per turn of a payload spin-wait.
    fn wait(&self, _participant: Participant, hint: &dyn YieldHint) {
        hint.relax();
    }

    /// Called by `participant` after its payload finished.
    fn leave(&self, _participant: Participant) {}
}

/// Both participants run truly in parallel.
#[derive(Debug, Default, Clone, Copy)]
pub struct Concurrent;

impl Schedule for Concurrent {}

/// Who starts a lockstep round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstMover {
    Mutator,
    Observer,
    /// Mutator on odd rounds, observer on even rounds.
    Alternate,
}

/// A simulated scheduler: exactly one participant runs at any time.
///
/// All handoffs are `SeqCst`, which makes every handoff a full barrier.
#[derive(Debug)]
pub struct Lockstep {
    first: FirstMover,
    rounds: AtomicU64,
    turn: AtomicU8,
    finished: [AtomicBool; 2],
}

impl Lockstep {
    #[must_use]
    pub const fn new(first: FirstMover) -> Self {
        Self {
            first,
            rounds: AtomicU64::new(0),
            turn: AtomicU8::new(Participant::Mutator.index() as u8),
            finished: [AtomicBool::new(false), AtomicBool::new(false)],
        }
    }

    fn hand_to(&self, participant: Participant) {
        self.turn.store(participant.index() as u8, Ordering::SeqCst);
    }

    fn wait_for_turn(&self, participant: Participant, hint: &dyn YieldHint) {
        let mut spins = 0;
        while self.turn.load(Ordering::SeqCst) != participant.index() as u8 {
            if spins < SPINS_BEFORE_YIELD {
                hint.relax();
                spins += 1;
            } else {
                // the turn holder may need this core
                thread::yield_now();
            }
        }
    }
}

impl Schedule for Lockstep {
    fn arm(&self) {
        let round = self.rounds.fetch_add(1, Ordering::Relaxed) + 1;
        let first = match self.first {
            FirstMover::Mutator => Participant::Mutator,
            FirstMover::Observer => Participant::Observer,
            FirstMover::Alternate if round % 2 == 1 => Participant::Mutator,
            FirstMover::Alternate => Participant::Observer,
        };
        for finished in &self.finished {
            finished.store(false, Ordering::Relaxed);
        }
        // published to the participants by the barrier release
        self.turn.store(first.index() as u8, Ordering::Relaxed);
    }

    fn enter(&self, participant: Participant, hint: &dyn YieldHint) {
        self.wait_for_turn(participant, hint);
    }

    fn wait(&self, participant: Participant, hint: &dyn YieldHint) {
        let other = participant.other();
        if self.finished[other.index()].load(Ordering::SeqCst) {
            // Nobody left to hand over to; the condition has to hold already.
            hint.relax();
        } else {
            self.hand_to(other);
            self.wait_for_turn(participant, hint);
        }
    }

    fn leave(&self, participant: Participant) {
        self.finished[participant.index()].store(true, Ordering::SeqCst);
        self.hand_to(participant.other());
    }
}
