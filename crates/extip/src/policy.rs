use {
    derive_more::Display,
    std::time::Duration,
    strum_macros::{EnumIs, EnumString, VariantNames},
};

/// Decides whether a majority of failed askers is an acceptable answer.
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug, Display)]
#[derive(EnumIs, EnumString, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum FailurePolicy {
    /// The empty string wins like any other value.
    #[default]
    #[display("accept")]
    Accept,
    /// A majority of empty results ends the aggregation as failed.
    #[display("reject")]
    Reject,
}

/// Per-call knobs of a quorum aggregation.
///
/// The default carries no deadlines at all: a hung asker can keep
/// the aggregation pending forever if the quorum cannot form without it.
#[derive(Clone, Copy, Default, Debug)]
pub struct Policy {
    failures: FailurePolicy,
    ask_timeout: Option<Duration>,
    deadline: Option<Duration>,
}

impl Policy {
    pub fn with_failures(mut self, failures: FailurePolicy) -> Self {
        self.failures = failures;
        self
    }

    /// Bounds every single asker. An asker that exceeds it is reported
    /// as failed, which still counts towards the tally.
    pub fn with_ask_timeout(mut self, timeout: Duration) -> Self {
        self.ask_timeout = Some(timeout);
        self
    }

    /// Bounds the whole aggregation.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn failures(&self) -> FailurePolicy {
        self.failures
    }

    pub fn ask_timeout(&self) -> Option<Duration> {
        self.ask_timeout
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline
    }
}
