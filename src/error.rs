use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Capacity exceeded: {requested} relations requested, at most {max} fit a relation mask")]
    CapacityExceeded { requested: usize, max: usize },

    #[error("No admissible plan for the full relation set in partition {part_id}")]
    NoAdmissiblePlan { part_id: usize },

    #[error("All {workers} workers failed to produce a plan")]
    AllWorkersFailed { workers: usize },

    #[error("Reconstruction left {fragments} unmerged fragments")]
    ReconstructionIncomplete { fragments: usize },

    #[error("Collaborator refused: {0}")]
    CollaboratorRefusal(String),

    #[error("Invalid join tree: {0}")]
    InvalidTree(String),

    #[error("Unknown relation index {0}")]
    UnknownRelation(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::CapacityExceeded { .. } => -1,
            Error::NoAdmissiblePlan { .. } => -2,
            Error::AllWorkersFailed { .. } => -3,
            Error::ReconstructionIncomplete { .. } => -4,
            Error::CollaboratorRefusal(_) => -5,
            Error::InvalidTree(_) => -6,
            Error::UnknownRelation(_) => -7,
            Error::Config(_) => -8,
            Error::WorkerPool(_) => -9,
            Error::Serialization(_) => -10,
        }
    }

    /// Whether the search as a whole failed, as opposed to a locally
    /// recoverable condition inside one worker.
    pub fn is_search_failure(&self) -> bool {
        matches!(
            self,
            Error::AllWorkersFailed { .. } | Error::ReconstructionIncomplete { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
