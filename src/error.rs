/// The harness itself broke. Never a finding about the hardware.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("iteration {iteration}: {completed} participants signalled completion, expected {expected}")]
    CompletionMismatch {
        iteration: u64,
        completed: usize,
        expected: usize,
    },
    #[error("iteration {iteration}: {variable} does not hold its reset value before release")]
    DirtyReset {
        iteration: u64,
        variable: &'static str,
    },
}
