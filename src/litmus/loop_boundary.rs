use super::Litmus;
use crate::shared::{Access, Iteration, Role, SharedStateBlock, SharedVariable};
use crate::worker::Spinner;
use std::hint::black_box;

/// Can a load from the second trip of a loop be performed before a store
/// from the first trip?
///
/// ```text
/// mutator                      observer
///   for i in 0..2:               wait flag == 1
///     i == 0: X = 1              Y = 1
///     i == 1: r1 = Y             r2 = X
///   flag = 1
/// ```
///
/// The observer stores Y only after the mutator finished its loop, so
/// `r1 == 1` together with `r2 == 0` means the mutator's trip-1 load and its
/// trip-0 store were swapped.
///
/// Two flavours exist, differing only in how `r2` is written: with release
/// ordering or relaxed.
#[derive(Debug, Clone, Copy)]
pub struct LoopBoundary {
    r2_access: Access,
}

impl LoopBoundary {
    #[must_use]
    pub const fn release() -> Self {
        Self {
            r2_access: Access::AcqRel,
        }
    }

    #[must_use]
    pub const fn relaxed() -> Self {
        Self {
            r2_access: Access::Relaxed,
        }
    }
}

impl Litmus for LoopBoundary {
    fn title(&self) -> &'static str {
        match self.r2_access {
            Access::Relaxed => "Litmus Test for Loop Iteration Boundary Reordering (relaxed read-back)",
            _ => "Litmus Test for Loop Iteration Boundary Reordering",
        }
    }

    fn description(&self) -> &'static str {
        "This test checks if instructions from different loop iterations\n\
         can be reordered by the processor or compiler."
    }

    fn subject(&self) -> &'static str {
        "loop iteration boundaries"
    }

    fn state(&self) -> SharedStateBlock {
        SharedStateBlock {
            r2: SharedVariable::new("r2", Role::Data, self.r2_access),
            ..SharedStateBlock::relaxed()
        }
    }

    fn mutator(&self, state: &SharedStateBlock, _spin: &Spinner<'_>) {
        // keep the loop a loop
        for trip in 0..black_box(2) {
            if trip == 0 {
                state.x.store(1);
            } else {
                state.r1.store(state.y.load());
            }
        }
        state.flag.store(1);
    }

    fn observer(&self, state: &SharedStateBlock, spin: &Spinner<'_>) {
        spin.until(|| state.flag.load() == 1);
        state.y.store(1);
        state.r2.store(state.x.load());
    }

    fn is_anomaly(&self, iteration: &Iteration) -> bool {
        iteration.r2 == 0 && iteration.r1 == 1
    }

    fn explain(&self, iteration: &Iteration) -> String {
        format!(
            "r2(X)={}, r1(Y)={} - instructions reordered across iterations",
            iteration.r2, iteration.r1
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;

    #[test]
    fn anomaly_is_stale_x_with_fresh_y() {
        let mut iteration = Iteration {
            index: 3,
            x: 1,
            y: 1,
            z: 0,
            r1: 1,
            r2: 0,
        };
        check!(LoopBoundary::release().is_anomaly(&iteration));
        iteration.r2 = 1;
        check!(!LoopBoundary::release().is_anomaly(&iteration));
        iteration.r1 = 0;
        iteration.r2 = 0;
        check!(!LoopBoundary::relaxed().is_anomaly(&iteration));
    }

    #[test]
    fn flavours_declare_r2_access() {
        check!(LoopBoundary::release().state().r2.access() == Access::AcqRel);
        check!(LoopBoundary::relaxed().state().r2.access() == Access::Relaxed);
        check!(LoopBoundary::relaxed().state().flag.role() == Role::Signal);
    }
}
