//! Running totals of classified iterations. See [`Statistics`].

use core::fmt;

/// Classification of one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// The final values admit no sequentially consistent explanation.
    Anomaly,
    Consistent,
}

impl RunResult {
    #[must_use]
    pub const fn from_anomaly(anomaly: bool) -> Self {
        if anomaly { Self::Anomaly } else { Self::Consistent }
    }

    #[must_use]
    pub const fn is_anomaly(self) -> bool {
        matches!(self, Self::Anomaly)
    }
}

/// Point-in-time view of [`Statistics`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub total: u64,
    pub anomalies: u64,
    /// `100 * anomalies / total`, or 0 before the first iteration.
    pub percentage: f64,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "completed {} tests, observed {} anomalies ({:.4}%)",
            self.total, self.anomalies, self.percentage
        )
    }
}

/// Accumulates [`RunResult`]s for the lifetime of one experiment.
///
/// Counts only ever grow.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statistics {
    total: u64,
    anomalies: u64,
}

impl Statistics {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            total: 0,
            anomalies: 0,
        }
    }

    pub const fn record(&mut self, result: RunResult) {
        self.total += 1;
        if result.is_anomaly() {
            self.anomalies += 1;
        }
    }

    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    #[must_use]
    pub const fn anomalies(&self) -> u64 {
        self.anomalies
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn snapshot(&self) -> Snapshot {
        let percentage = if self.total == 0 {
            0.0
        } else {
            100.0 * self.anomalies as f64 / self.total as f64
        };
        Snapshot {
            total: self.total,
            anomalies: self.anomalies,
            percentage,
        }
    }

    /// The progress line printed every few iterations.
    #[must_use]
    pub fn report(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            "Completed {} tests, observed {} anomalies ({:.4}%)",
            snapshot.total, snapshot.anomalies, snapshot.percentage
        )
    }

    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        if self.anomalies > 0 {
            Verdict::ReorderingObserved
        } else {
            Verdict::NoReorderingObserved
        }
    }
}

/// The conclusion drawn at the end of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    ReorderingObserved,
    /// Evidence, not proof.
    NoReorderingObserved,
}

impl Verdict {
    /// The closing lines for a test about reordering across `subject`.
    #[must_use]
    pub fn lines(self, subject: &str) -> Vec<String> {
        match self {
            Self::ReorderingObserved => vec![format!(
                "RESULT: The system allows reordering of instructions across {subject}."
            )],
            Self::NoReorderingObserved => vec![
                format!("RESULT: No reordering of instructions observed across {subject}."),
                "Note: Absence of evidence is not evidence of absence. \
                 More iterations might be needed."
                    .to_owned(),
            ],
        }
    }
}
