use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("index unreachable: {0}")]
    Unreachable(String),

    #[error("index returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed index response: {0}")]
    Decode(String),

    #[error("collection '{0}' does not exist")]
    CollectionNotFound(String),

    #[error("collection '{name}' exists with {actual}, expected {expected}")]
    CollectionMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("vector has {actual} values, collection dimension is {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index unavailable after {attempts} attempts: {last}")]
    ServiceUnavailable { attempts: u32, last: String },
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IndexError::Decode(err.to_string())
        } else {
            IndexError::Unreachable(err.to_string())
        }
    }
}
