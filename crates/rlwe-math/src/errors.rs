use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Indicates an invalid modulus
    #[error("Invalid modulus: modulus {0} should be between 2 and (1 << 62) - 1.")]
    InvalidModulus(u64),

    /// Indicates an error in the serialization / deserialization.
    #[error("{0}")]
    Serialization(String),

    /// Indicates that there is no more contexts to switch to.
    #[error("Invalid context provided.")]
    InvalidContext,

    /// Indicates that the prime sets of two ring elements do not match.
    #[error("Prime sets mismatch: found {found:?}, expected {expected:?}")]
    PrimeSetMismatch {
        /// The prime set that was found.
        found: Vec<usize>,
        /// The prime set that was expected.
        expected: Vec<usize>,
    },

    /// Indicates an incorrect representation.
    #[error("Incorrect representation: got {0:?}, expected {1:?}.")]
    IncorrectRepresentation(String, String),

    /// Indicates that an element does not belong to the expected group.
    #[error("{0} is not invertible modulo {1}")]
    NotInvertible(u64, u64),

    /// Indicates a default error.
    #[error("{0}")]
    Default(String),
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rlwe_traits::ParseError> for Error {
    fn from(e: rlwe_traits::ParseError) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    #[test]
    fn error_strings() {
        assert_eq!(
            Error::InvalidModulus(0).to_string(),
            "Invalid modulus: modulus 0 should be between 2 and (1 << 62) - 1."
        );
        assert_eq!(Error::Serialization("test".to_string()).to_string(), "test");
        assert_eq!(Error::InvalidContext.to_string(), "Invalid context provided.");
        assert_eq!(
            Error::PrimeSetMismatch {
                found: vec![0, 1],
                expected: vec![0]
            }
            .to_string(),
            "Prime sets mismatch: found [0, 1], expected [0]"
        );
        assert_eq!(
            Error::IncorrectRepresentation("PowerBasis".to_string(), "Evaluation".to_string())
                .to_string(),
            "Incorrect representation: got \"PowerBasis\", expected \"Evaluation\"."
        );
        assert_eq!(
            Error::NotInvertible(4, 16).to_string(),
            "4 is not invertible modulo 16"
        );
        assert_eq!(Error::Default("test".to_string()).to_string(), "test");
    }
}
