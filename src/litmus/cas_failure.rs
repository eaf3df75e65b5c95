use super::Litmus;
use crate::shared::{Access, Iteration, Role, SharedStateBlock, SharedVariable};
use crate::worker::Spinner;

/// Value the mutator stores to Z once its CAS is done.
const CAS_DONE: i32 = 42;

/// Can a load be satisfied after the failing branch of a CAS that follows
/// it in program order?
///
/// ```text
/// mutator                      observer
///   r1 = Y                       X = 2
///   r2 = CAS(X, 0 -> 1)          wait Z == 42
///   Z = 42                       Y = 1
/// ```
///
/// The observer only stores Y after it saw Z, which the mutator stores after
/// loading Y. So whenever the CAS failed, `r1 == 1` means the load of Y was
/// performed after the failed CAS and the store to Z.
#[derive(Debug, Clone, Copy, Default)]
pub struct CasFailure;

impl Litmus for CasFailure {
    fn title(&self) -> &'static str {
        "Litmus Test for Reordering of Instructions over the Failing Branch of a CAS"
    }

    fn description(&self) -> &'static str {
        "This test checks whether a processor/compiler reorders instructions across\n\
         the failing branch of a Compare-and-Swap operation, which can lead to\n\
         subtle concurrency bugs in lock-free algorithms."
    }

    fn subject(&self) -> &'static str {
        "the failing branch of a CAS"
    }

    fn state(&self) -> SharedStateBlock {
        SharedStateBlock {
            x: SharedVariable::new("X", Role::Data, Access::AcqRel),
            ..SharedStateBlock::relaxed()
        }
    }

    fn mutator(&self, state: &SharedStateBlock, _spin: &Spinner<'_>) {
        let y_observed = state.y.load();
        let swapped = state.x.compare_exchange(0, 1);
        state.z.store(CAS_DONE);

        state.r1.store(y_observed);
        state.r2.store(i32::from(swapped));
    }

    fn observer(&self, state: &SharedStateBlock, spin: &Spinner<'_>) {
        // make the mutator's CAS fail
        state.x.store(2);
        spin.until(|| state.z.load() == CAS_DONE);
        state.y.store(1);
    }

    fn is_anomaly(&self, iteration: &Iteration) -> bool {
        let cas_failed = iteration.r2 == 0;
        cas_failed && iteration.r1 == 1
    }

    fn explain(&self, iteration: &Iteration) -> String {
        format!(
            "CAS failed yet Y={} was observed before it, X={}, Z={}",
            iteration.r1, iteration.x, iteration.z
        )
    }
}
