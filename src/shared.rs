//! The memory both participants race on during one iteration. See
//! [`SharedStateBlock`].

use core::fmt;
use core::sync::atomic::{AtomicI32, Ordering, fence};

/// Memory ordering a [`SharedVariable`] is accessed with.
///
/// This is part of the experiment: every payload access uses exactly the
/// mode its variable was declared with, nothing stronger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No ordering. Stands in for unannotated shared variables, as Rust has
    /// no race-free access weaker than this.
    Relaxed,
    /// Acquire loads, release stores, acq-rel CAS (acquire on failure).
    AcqRel,
    /// Sequentially consistent access.
    SeqCst,
    /// Sequentially consistent access with a full fence on each side.
    Fenced,
}

impl Access {
    #[must_use]
    pub const fn load_ordering(self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcqRel => Ordering::Acquire,
            Self::SeqCst | Self::Fenced => Ordering::SeqCst,
        }
    }

    #[must_use]
    pub const fn store_ordering(self) -> Ordering {
        match self {
            Self::Relaxed => Ordering::Relaxed,
            Self::AcqRel => Ordering::Release,
            Self::SeqCst | Self::Fenced => Ordering::SeqCst,
        }
    }

    /// Success and failure ordering of a compare-and-swap.
    #[must_use]
    pub const fn cas_orderings(self) -> (Ordering, Ordering) {
        match self {
            Self::Relaxed => (Ordering::Relaxed, Ordering::Relaxed),
            Self::AcqRel => (Ordering::AcqRel, Ordering::Acquire),
            Self::SeqCst | Self::Fenced => (Ordering::SeqCst, Ordering::SeqCst),
        }
    }

    #[inline]
    fn bracket(self) {
        if self == Self::Fenced {
            fence(Ordering::SeqCst);
        }
    }
}

/// What a variable is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// A value whose ordering is the subject of the test, or a register
    /// recording what a participant observed.
    Data,
    /// Coordination between the participants only.
    Signal,
}

/// A named integer cell read and written by both participants without
/// mutual exclusion.
pub struct SharedVariable {
    name: &'static str,
    role: Role,
    access: Access,
    reset_value: i32,
    cell: AtomicI32,
}

impl SharedVariable {
    #[must_use]
    pub const fn new(name: &'static str, role: Role, access: Access) -> Self {
        Self::with_reset(name, role, access, 0)
    }

    #[must_use]
    pub const fn with_reset(
        name: &'static str,
        role: Role,
        access: Access,
        reset_value: i32,
    ) -> Self {
        Self {
            name,
            role,
            access,
            reset_value,
            cell: AtomicI32::new(reset_value),
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    #[must_use]
    pub const fn reset_value(&self) -> i32 {
        self.reset_value
    }

    /// Payload load, with the declared access mode.
    #[inline]
    pub fn load(&self) -> i32 {
        self.access.bracket();
        let value = self.cell.load(self.access.load_ordering());
        self.access.bracket();
        value
    }

    /// Payload store, with the declared access mode.
    #[inline]
    pub fn store(&self, value: i32) {
        self.access.bracket();
        self.cell.store(value, self.access.store_ordering());
        self.access.bracket();
    }

    /// Payload compare-and-swap. Returns whether it succeeded.
    #[inline]
    pub fn compare_exchange(&self, current: i32, new: i32) -> bool {
        let (success, failure) = self.access.cas_orderings();
        self.access.bracket();
        let swapped = self
            .cell
            .compare_exchange(current, new, success, failure)
            .is_ok();
        self.access.bracket();
        swapped
    }

    // Harness accesses. Only used while the participants are parked on the
    // barrier, which provides the ordering.

    fn reset(&self) {
        self.cell.store(self.reset_value, Ordering::Relaxed);
    }

    fn peek(&self) -> i32 {
        self.cell.load(Ordering::Relaxed)
    }

    #[must_use]
    fn fenced(self) -> Self {
        Self {
            access: Access::Fenced,
            ..self
        }
    }
}

impl fmt::Debug for SharedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedVariable")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("access", &self.access)
            .field("value", &self.peek())
            .finish()
    }
}

/// All shared memory of one experiment: the data under test (`x`, `y`,
/// `z`), the registers the participants record observations in (`r1`,
/// `r2`) and one mutator-set signal (`flag`).
///
/// Payloads declare the access mode of every variable when they build the
/// block, and receive it by reference.
#[derive(Debug)]
pub struct SharedStateBlock {
    pub x: SharedVariable,
    pub y: SharedVariable,
    pub z: SharedVariable,
    pub r1: SharedVariable,
    pub r2: SharedVariable,
    pub flag: SharedVariable,
}

impl SharedStateBlock {
    /// Every variable relaxed and reset to 0.
    #[must_use]
    pub const fn relaxed() -> Self {
        Self {
            x: SharedVariable::new("X", Role::Data, Access::Relaxed),
            y: SharedVariable::new("Y", Role::Data, Access::Relaxed),
            z: SharedVariable::new("Z", Role::Data, Access::Relaxed),
            r1: SharedVariable::new("r1", Role::Data, Access::Relaxed),
            r2: SharedVariable::new("r2", Role::Data, Access::Relaxed),
            flag: SharedVariable::new("flag", Role::Signal, Access::Relaxed),
        }
    }

    /// Rewrites every variable to [`Access::Fenced`].
    #[must_use]
    pub fn fenced(self) -> Self {
        Self {
            x: self.x.fenced(),
            y: self.y.fenced(),
            z: self.z.fenced(),
            r1: self.r1.fenced(),
            r2: self.r2.fenced(),
            flag: self.flag.fenced(),
        }
    }

    #[must_use]
    pub const fn variables(&self) -> [&SharedVariable; 6] {
        [&self.x, &self.y, &self.z, &self.r1, &self.r2, &self.flag]
    }

    /// Puts every variable back to its declared reset value.
    pub fn reset(&self) {
        for var in self.variables() {
            var.reset();
        }
    }

    /// The first variable not holding its reset value, if any.
    #[must_use]
    pub fn first_dirty(&self) -> Option<&SharedVariable> {
        self.variables()
            .into_iter()
            .find(|var| var.peek() != var.reset_value)
    }

    /// Records the final values once both participants have completed.
    #[must_use]
    pub fn snapshot(&self, index: u64) -> Iteration {
        Iteration {
            index,
            x: self.x.peek(),
            y: self.y.peek(),
            z: self.z.peek(),
            r1: self.r1.peek(),
            r2: self.r2.peek(),
        }
    }
}

/// The final values of one run, consumed once by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iteration {
    pub index: u64,
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub r1: i32,
    pub r2: i32,
}
