use super::Litmus;
use crate::shared::{Iteration, SharedStateBlock};
use crate::worker::Spinner;
use core::sync::atomic::{Ordering, fence};

/// Can a store inside a loop be delayed past the conditional jump that
/// leaves the loop?
///
/// ```text
/// mutator                      observer
///   do X = 1 while Z == 0        Z = 1
///   r1 = Y                       fence
///   flag = 1                     wait flag == 1
///                                Y = 1
///                                fence
///                                r2 = X
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionalJump;

impl Litmus for ConditionalJump {
    fn title(&self) -> &'static str {
        "Litmus test for reordering of instructions across conditional jumps"
    }

    fn description(&self) -> &'static str {
        "This test checks if a store executed before a conditional jump can\n\
         become visible only after instructions that follow the jump."
    }

    fn subject(&self) -> &'static str {
        "conditional jumps"
    }

    fn state(&self) -> SharedStateBlock {
        SharedStateBlock::relaxed()
    }

    fn mutator(&self, state: &SharedStateBlock, spin: &Spinner<'_>) {
        loop {
            state.x.store(1);
            if state.z.load() != 0 {
                break;
            }
            spin.spin();
        }
        state.r1.store(state.y.load());
        state.flag.store(1);
    }

    fn observer(&self, state: &SharedStateBlock, spin: &Spinner<'_>) {
        // make the mutator's loop condition fail
        state.z.store(1);
        fence(Ordering::SeqCst);

        spin.until(|| state.flag.load() == 1);

        state.y.store(1);
        fence(Ordering::SeqCst);
        state.r2.store(state.x.load());
    }

    fn is_anomaly(&self, iteration: &Iteration) -> bool {
        iteration.r2 == 0 && iteration.r1 == 1
    }

    fn explain(&self, iteration: &Iteration) -> String {
        format!(
            "r2(X)={}, r1(Y)={} - instructions reordered across conditional jump",
            iteration.r2, iteration.r1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn consistent_outcomes_are_not_anomalies() {
        for (r1, r2) in [(0, 0), (0, 1), (1, 1)] {
            let iteration = Iteration {
                index: 0,
                x: 1,
                y: 1,
                z: 1,
                r1,
                r2,
            };
            check!(!ConditionalJump.is_anomaly(&iteration));
        }
    }
}
