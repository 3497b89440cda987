use std::io;

/// Errors raised by transducer inference.
///
/// An infeasible sequence (total cost `+inf`) is not an error: it is reported
/// through the cost of the lattice or path.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("index {index} out of range (len: {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("input sequence has {input} items but output sequence has {output}")]
    LengthMismatch { input: usize, output: usize },
    #[error("input sequence is empty")]
    EmptyInput,
    #[error("transducer cannot enumerate transitions without an input sequence")]
    NotGenerative,
    #[error("output symbol {0:?} is not in the label alphabet")]
    UnknownLabel(String),
    #[error("transducer is not trainable")]
    NotTrainable,
    #[error("no path is consistent with the input")]
    NoPath,
    #[error("no satisfying transition found at position {position}")]
    NoMatchingTransition { position: usize },
    #[error("{count} satisfying transitions found at position {position}")]
    AmbiguousTransition { position: usize, count: usize },
    #[error("viterbi node at position {position} has no back-pointer")]
    MissingBackPointer { position: usize },
    #[error("invalid transducer definition: {0}")]
    Definition(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
