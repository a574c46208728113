/// Why a scheduler command was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("a download is already running")]
    AlreadyRunning,
    #[error("invalid download task: {0}")]
    InvalidTask(String),
    #[error("no download is running")]
    NotRunning,
    #[error("chunk {0} is already part of this download")]
    DuplicateChunk(usize),
    #[error("failed to start dispatch thread: {0}")]
    ControlThread(String),
}
