use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VecError {
    #[error("vecmath: dimension mismatch: got {got}, want {want}")]
    DimensionMismatch { got: usize, want: usize },

    #[error("vecmath: invalid vector text: {0}")]
    InvalidFormat(String),

    #[error("vecmath: non-finite component at index {0}")]
    NonFinite(usize),
}
