//! The participant threads. See [`Workers`].

use crate::barrier::{RendezvousBarrier, Signal};
use crate::litmus::Litmus;
use crate::schedule::Schedule;
use crate::shared::SharedStateBlock;
use crate::yield_hint::YieldHint;
use std::thread::{self, Scope};

/// Number of threads racing in every litmus test.
pub const PARTICIPANTS: usize = 2;

/// The two roles of a litmus test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Participant {
    /// Runs the instruction sequence whose reordering is under test.
    Mutator,
    /// Runs the complementary sequence that makes a reordering visible.
    Observer,
}

impl Participant {
    pub const ALL: [Self; PARTICIPANTS] = [Self::Mutator, Self::Observer];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Mutator => 0,
            Self::Observer => 1,
        }
    }

    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Mutator => Self::Observer,
            Self::Observer => Self::Mutator,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mutator => "mutator",
            Self::Observer => "observer",
        }
    }
}

/// Handed to a payload for its spin-waits.
#[derive(Debug, Clone, Copy)]
pub struct Spinner<'a> {
    participant: Participant,
    hint: &'a dyn YieldHint,
    schedule: &'a dyn Schedule,
}

impl<'a> Spinner<'a> {
    #[must_use]
    pub const fn new(
        participant: Participant,
        hint: &'a dyn YieldHint,
        schedule: &'a dyn Schedule,
    ) -> Self {
        Self {
            participant,
            hint,
            schedule,
        }
    }

    #[must_use]
    pub const fn participant(&self) -> Participant {
        self.participant
    }

    /// One turn of a busy-wait loop.
    #[inline]
    pub fn spin(&self) {
        self.schedule.wait(self.participant, self.hint);
    }

    /// Busy-waits until `done` returns true.
    #[inline]
    pub fn until(&self, mut done: impl FnMut() -> bool) {
        while !done() {
            self.spin();
        }
    }
}

/// Guard over the participant threads of one experiment.
///
/// The threads live in a [`thread::scope`] and run one payload per barrier
/// round. Dropping the guard releases the shutdown round, so the scope can
/// join them even when the coordinator bails out early.
#[derive(Debug)]
pub struct Workers<'a, H: YieldHint> {
    barrier: &'a RendezvousBarrier<H>,
}

impl<'a, H: YieldHint> Workers<'a, H> {
    /// Spawns the mutator and the observer into `scope`.
    pub fn spawn<'scope, L, S>(
        scope: &'scope Scope<'scope, '_>,
        barrier: &'a RendezvousBarrier<H>,
        state: &'a SharedStateBlock,
        litmus: &'a L,
        schedule: &'a S,
    ) -> Self
    where
        'a: 'scope,
        L: Litmus + ?Sized,
        S: Schedule,
    {
        for participant in Participant::ALL {
            thread::Builder::new()
                .name(participant.name().to_owned())
                .spawn_scoped(
                    scope,
                    Self::thread_fn(participant, barrier, state, litmus, schedule),
                )
                .expect("should spawn participant thread");
        }

        Self { barrier }
    }

    fn thread_fn<L, S>(
        participant: Participant,
        barrier: &'a RendezvousBarrier<H>,
        state: &'a SharedStateBlock,
        litmus: &'a L,
        schedule: &'a S,
    ) -> impl FnOnce() + Send + 'a
    where
        L: Litmus + ?Sized,
        S: Schedule,
    {
        move || {
            let hint: &dyn YieldHint = barrier.hint();
            let spinner = Spinner::new(participant, hint, schedule);
            let mut round = 0;

            while barrier.await_start(&mut round) == Signal::Go {
                schedule.enter(participant, hint);
                match participant {
                    Participant::Mutator => litmus.mutator(state, &spinner),
                    Participant::Observer => litmus.observer(state, &spinner),
                }
                schedule.leave(participant);
                barrier.signal_complete();
            }
            log::trace!("{} thread exits after round {round}", participant.name());
        }
    }
}

impl<H: YieldHint> Drop for Workers<'_, H> {
    fn drop(&mut self) {
        // Tell the threads to exit on their next round.
        self.barrier.shutdown();
    }
}
