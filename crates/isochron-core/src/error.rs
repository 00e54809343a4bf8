use thiserror::Error;

/// A program that cannot be played. Raised at load time, never mid-schedule.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProgramError {
    #[error("start beat must be a positive number of Hz, got {0}")]
    StartBeat(f64),
    #[error("carrier must be a positive number of Hz, got {0}")]
    Carrier(f64),
    #[error("stage {index}: duration must be a non-negative number of seconds, got {value}")]
    StageDuration { index: usize, value: f64 },
    #[error("stage {index}: target beat must be a non-negative number of Hz, got {value}")]
    StageBeat { index: usize, value: f64 },
    #[error("stage {index}: a 0 Hz target is only allowed on the final stage")]
    ZeroBeatNotTerminal { index: usize },
    #[error("invalid stage `{0}`, expected <beat>:<seconds> or <beat>@<duration>")]
    StageSyntax(String),
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    #[error("program json: {0}")]
    Json(String),
}

/// Failure reported by a signal-generation graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("output device unavailable: {0}")]
    Unavailable(String),
    #[error("graph refused to schedule: {0}")]
    Schedule(String),
    #[error("graph already released")]
    Released,
}

/// Why `PlaybackController::start` could not bring up a session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StartError {
    #[error(transparent)]
    InvalidProgram(#[from] ProgramError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}
