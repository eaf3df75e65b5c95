use crate::yield_hint::YieldHint;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// What a participant should do after [`RendezvousBarrier::await_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Run the payload for the released round.
    Go,
    /// The experiment is over; leave the thread.
    Stop,
}

/// A busy-wait start/finish barrier between one coordinator and a fixed
/// number of participants.
///
/// The start flag is an epoch: round `n` is *armed* when `armed == n` and
/// *released* once `released` catches up. A participant that finished a
/// round can therefore never mistake the still-set flag of that round for
/// the start of the next one.
#[derive(Debug)]
pub struct RendezvousBarrier<H> {
    // round number the next release() publishes; coordinator only
    armed: AtomicU64,
    // last round released to the participants
    released: AtomicU64,
    // participants done with the current round
    completed: AtomicUsize,
    shutdown: AtomicBool,
    participants: usize,
    hint: H,
}

impl<H: YieldHint> RendezvousBarrier<H> {
    #[must_use]
    pub const fn new(participants: usize, hint: H) -> Self {
        Self {
            armed: AtomicU64::new(0),
            released: AtomicU64::new(0),
            completed: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            participants,
            hint,
        }
    }

    #[must_use]
    pub const fn participants(&self) -> usize {
        self.participants
    }

    #[must_use]
    pub const fn hint(&self) -> &H {
        &self.hint
    }

    /// Prepares the next round: start flag down, completion counter zero.
    ///
    /// Must only be called once every participant of the previous round
    /// has completed.
    pub fn arm(&self) {
        self.completed.store(0, Ordering::Relaxed);
        let next = self.released.load(Ordering::Relaxed) + 1;
        self.armed.store(next, Ordering::Relaxed);
    }

    /// Raises the start flag. Everything written before this call is
    /// visible to a participant once its [`Self::await_start`] returns.
    pub fn release(&self) {
        let round = self.armed.load(Ordering::Relaxed);
        self.released.store(round, Ordering::Release);
    }

    /// Whether the armed round has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire) == self.armed.load(Ordering::Relaxed)
    }

    /// Spins until a round after `last_round` is released, then remembers
    /// it in `last_round`.
    pub fn await_start(&self, last_round: &mut u64) -> Signal {
        loop {
            let round = self.released.load(Ordering::Acquire);
            if round != *last_round {
                *last_round = round;
                break;
            }
            self.hint.relax();
        }

        if self.shutdown.load(Ordering::Relaxed) {
            Signal::Stop
        } else {
            Signal::Go
        }
    }

    /// Marks the calling participant done with the current round. Its
    /// writes are visible to the coordinator once
    /// [`Self::await_completion`] returns.
    pub fn signal_complete(&self) {
        self.completed.fetch_add(1, Ordering::Release);
    }

    /// Spins until at least `expected` participants have completed and
    /// returns how many did.
    pub fn await_completion(&self, expected: usize) -> usize {
        loop {
            let completed = self.completed.load(Ordering::Acquire);
            if completed >= expected {
                break completed;
            }
            self.hint.relax();
        }
    }

    /// Releases one last round that tells every participant to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.arm();
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yield_hint::SpinLoop;
    use crate::yield_hint::tests::CountingHint;
    use assert2::check;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn arm_lowers_flag_and_release_raises_it() {
        let barrier = RendezvousBarrier::new(2, SpinLoop);
        barrier.arm();
        check!(!barrier.is_released());
        barrier.release();
        check!(barrier.is_released());
        barrier.arm();
        check!(!barrier.is_released());
    }

    #[test]
    fn participants_meet_coordinator_many_rounds() {
        let barrier = RendezvousBarrier::new(2, SpinLoop);
        let work = AtomicU64::new(0);
        let rounds = 1_000;

        thread::scope(|s| {
            for _ in 0..barrier.participants() {
                s.spawn(|| {
                    let mut seen = 0;
                    while barrier.await_start(&mut seen) == Signal::Go {
                        work.fetch_add(1, Ordering::Relaxed);
                        barrier.signal_complete();
                    }
                });
            }

            for round in 1..=rounds {
                barrier.arm();
                barrier.release();
                let completed = barrier.await_completion(2);
                check!(completed == 2);
                // both participants ran exactly once per round
                check!(work.load(Ordering::Relaxed) == round * 2);
            }
            barrier.shutdown();
        });
    }

    #[test]
    fn release_publishes_prior_writes() {
        let barrier = RendezvousBarrier::new(1, SpinLoop);
        let payload = AtomicU64::new(0);

        thread::scope(|s| {
            s.spawn(|| {
                let mut seen = 0;
                while barrier.await_start(&mut seen) == Signal::Go {
                    check!(payload.load(Ordering::Relaxed) == seen);
                    barrier.signal_complete();
                }
            });

            for round in 1..=100 {
                barrier.arm();
                payload.store(round, Ordering::Relaxed);
                barrier.release();
                barrier.await_completion(1);
            }
            barrier.shutdown();
        });
    }

    #[test]
    fn shutdown_releases_spinning_participant() {
        let barrier = RendezvousBarrier::new(1, CountingHint::default());

        thread::scope(|s| {
            let participant = s.spawn(|| {
                let mut seen = 0;
                barrier.await_start(&mut seen)
            });

            // Give the participant a chance to spin.
            thread::sleep(Duration::from_millis(50));

            let start = Instant::now();
            barrier.shutdown();
            let signal = participant.join().unwrap();
            check!(signal == Signal::Stop);
            check!(
                start.elapsed() < Duration::from_millis(100),
                "participant was not released promptly"
            );
        });
        check!(barrier.hint.spins.load(Ordering::Relaxed) > 0);
    }
}
