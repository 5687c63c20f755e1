use {
    derive_more::Display,
    std::time::Duration,
    strum_macros::EnumIs,
};

/// What a single asker reported back.
///
/// Failures are kept apart from values so they can be logged and inspected,
/// but the quorum only ever sees the collapsed form: see [Answer::value].
#[derive(Debug, Display, EnumIs)]
pub enum Answer {
    #[display("{_0:?}")]
    Value(String),
    #[display("failure ({_0})")]
    Failure(Reason),
}

/// Why an asker could not provide a value.
#[derive(Debug, Display)]
pub enum Reason {
    #[display("transport error: {_0:#}")]
    Transport(anyhow::Error),
    #[display("unexpected HTTP status: {_0}")]
    Status(reqwest::StatusCode),
    #[display("malformed response: {_0}")]
    Malformed(String),
    #[display("no answer within {_0:?}")]
    Timeout(Duration),
    #[display("asker task panicked")]
    Panicked,
}

impl Answer {
    /// The string this answer is tallied under.
    /// Every failure collapses into the empty string.
    pub fn value(&self) -> &str {
        match self {
            Self::Value(value) => value,
            Self::Failure(_) => "",
        }
    }

    pub fn into_value(self) -> String {
        match self {
            Self::Value(value) => value,
            Self::Failure(_) => String::new(),
        }
    }

    pub fn reason(&self) -> Option<&Reason> {
        match self {
            Self::Value(_) => None,
            Self::Failure(reason) => Some(reason),
        }
    }
}

impl From<Result<String, Reason>> for Answer {
    fn from(result: Result<String, Reason>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(reason) => Self::Failure(reason),
        }
    }
}

impl Reason {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Transport(err.into())
    }

    pub fn malformed<S: ToString>(what: S) -> Self {
        Self::Malformed(what.to_string())
    }
}
