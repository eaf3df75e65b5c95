//! The spin-wait hint used while busy-polling a flag.
//!
//! Only busy-polling is allowed anywhere in the harness. Parking a thread
//! would let the OS scheduler add its own synchronization, which can hide
//! (or fake) the reorderings under test.

use core::fmt::Debug;
use core::hint;

#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "arm",
    target_arch = "aarch64",
    target_arch = "riscv32",
    target_arch = "riscv64"
)))]
compile_error!("unsupported architecture for the spin-wait hint");

/// Invoked once per turn of every busy-wait loop.
pub trait YieldHint: Debug + Sync {
    /// Tells the CPU we are spinning.
    fn relax(&self);
}

impl<H: YieldHint + ?Sized> YieldHint for &H {
    fn relax(&self) {
        (**self).relax();
    }
}

/// [`hint::spin_loop`]: `pause` on x86, `yield` on ARM, `pause` on RISC-V
/// (Zihintpause).
#[derive(Debug, Default, Clone, Copy)]
pub struct SpinLoop;

impl YieldHint for SpinLoop {
    #[inline]
    fn relax(&self) {
        hint::spin_loop();
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often it was asked to relax.
    #[derive(Debug, Default)]
    pub struct CountingHint {
        pub spins: AtomicUsize,
    }

    impl YieldHint for CountingHint {
        fn relax(&self) {
            self.spins.fetch_add(1, Ordering::Relaxed);
            hint::spin_loop();
        }
    }

    #[test]
    fn reference_forwards_to_hint() {
        let hint = CountingHint::default();
        let by_ref = &hint;
        by_ref.relax();
        by_ref.relax();
        assert2::check!(hint.spins.load(Ordering::Relaxed) == 2);
    }
}
