use photoid_kv::KVError;
use photoid_vecmath::VecError;
use thiserror::Error;

/// Errors returned by identity store and resolution operations.
#[derive(Debug, Error)]
pub enum FaceIdError {
    /// Rejected operator request. Raised before anything is written.
    #[error("faces: invalid input: {0}")]
    InvalidInput(String),

    #[error("faces: {kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error("faces: invalid config: {0}")]
    Config(String),

    /// A guarded commit lost a race. Retried internally; only surfaces from
    /// helpers that do not retry.
    #[error("faces: write conflict on {0}")]
    Conflict(String),

    #[error("faces: {op} gave up after {attempts} conflicting attempts")]
    Contention { op: String, attempts: usize },

    #[error("faces: storage error: {0}")]
    Storage(String),

    #[error("faces: serialization error: {0}")]
    Serialization(String),

    #[error("faces: vector error: {0}")]
    Vector(#[from] VecError),
}

impl FaceIdError {
    pub(crate) fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<KVError> for FaceIdError {
    fn from(e: KVError) -> Self {
        match e {
            KVError::Conflict(key) => Self::Conflict(key),
            KVError::Serialization(msg) => Self::Serialization(msg),
            other => Self::Storage(other.to_string()),
        }
    }
}
