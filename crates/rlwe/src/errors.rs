use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Indicates that an error from the underlying mathematical library was
    /// encountered.
    #[error("{0}")]
    MathError(rlwe_math::Error),

    /// Indicates a serialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Indicates that too many values were provided.
    #[error("Too many values provided: {0} exceeds limit {1}")]
    TooManyValues(usize, usize),

    /// Indicates that too few values were provided.
    #[error("Too few values provided: {0} is below limit {1}")]
    TooFewValues(usize, usize),

    /// Indicates that an input is invalid.
    #[error("{0}")]
    UnspecifiedInput(String),

    /// Indicates that two objects were created under different contexts.
    #[error("Context mismatch")]
    ContextMismatch,

    /// Indicates that a plaintext space is incompatible with the native one.
    #[error("Plaintext space mismatch: {requested} is incompatible with {native}")]
    PlaintextSpaceMismatch {
        /// The requested plaintext space.
        requested: u64,
        /// The plaintext space of the key or ciphertext.
        native: u64,
    },

    /// Indicates that an operation is not defined for the scheme.
    #[error("Operation {operation} is not supported by the {scheme} scheme")]
    UnsupportedOperation {
        /// The operation.
        operation: String,
        /// The scheme.
        scheme: String,
    },

    /// Indicates that no key-switching matrix is available.
    #[error("No key-switching matrix from {handle} to key {to}")]
    MissingKeySwitchPath {
        /// The source key handle.
        handle: String,
        /// The target key id.
        to: usize,
    },

    /// Indicates a parameter error.
    #[error("{0}")]
    ParametersError(ParametersError),

    /// Indicates a default error.
    #[error("{0}")]
    DefaultError(String),
}

impl From<rlwe_math::Error> for Error {
    fn from(e: rlwe_math::Error) -> Self {
        Error::MathError(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::SerializationError(e.to_string())
    }
}

impl From<rlwe_traits::ParseError> for Error {
    fn from(e: rlwe_traits::ParseError) -> Self {
        Error::SerializationError(e.to_string())
    }
}

/// Separate enum to indicate parameters-related errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParametersError {
    /// Indicates that the cyclotomic index is invalid.
    #[error("Invalid cyclotomic index: {0}")]
    InvalidCyclotomicIndex(u64),

    /// Indicates that the moduli sizes are invalid.
    #[error("Invalid modulus size: {0}, expected an integer between {1} and {2}")]
    InvalidModulusSize(usize, usize, usize),

    /// Indicates that there exists not enough primes of this size.
    #[error("Not enough primes of size {0} congruent to 1 modulo {1}")]
    NotEnoughPrimes(usize, u64),

    /// Indicates that the plaintext is invalid.
    #[error("{0}")]
    InvalidPlaintext(String),

    /// Indicates that too many parameters were specified.
    #[error("{0}")]
    TooManySpecified(String),

    /// Indicates that too few parameters were specified.
    #[error("{0}")]
    TooFewSpecified(String),

    /// Indicates that the context does not support bootstrapping.
    #[error("The context is not bootstrappable")]
    NotBootstrappable,
}

#[cfg(test)]
mod tests {
    use crate::{Error, ParametersError};

    #[test]
    fn error_strings() {
        assert_eq!(
            Error::MathError(rlwe_math::Error::InvalidContext).to_string(),
            rlwe_math::Error::InvalidContext.to_string()
        );
        assert_eq!(
            Error::SerializationError("missing marker".to_string()).to_string(),
            "Serialization error: missing marker"
        );
        assert_eq!(
            Error::TooManyValues(20, 17).to_string(),
            "Too many values provided: 20 exceeds limit 17"
        );
        assert_eq!(
            Error::TooFewValues(10, 17).to_string(),
            "Too few values provided: 10 is below limit 17"
        );
        assert_eq!(
            Error::UnspecifiedInput("test string".to_string()).to_string(),
            "test string"
        );
        assert_eq!(Error::ContextMismatch.to_string(), "Context mismatch");
        assert_eq!(
            Error::PlaintextSpaceMismatch {
                requested: 3,
                native: 4
            }
            .to_string(),
            "Plaintext space mismatch: 3 is incompatible with 4"
        );
        assert_eq!(
            Error::UnsupportedOperation {
                operation: "decode_complex".to_string(),
                scheme: "BGV".to_string()
            }
            .to_string(),
            "Operation decode_complex is not supported by the BGV scheme"
        );
        assert_eq!(
            Error::MissingKeySwitchPath {
                handle: "[1 3 0]".to_string(),
                to: 0
            }
            .to_string(),
            "No key-switching matrix from [1 3 0] to key 0"
        );
        assert_eq!(
            Error::ParametersError(ParametersError::InvalidCyclotomicIndex(1)).to_string(),
            ParametersError::InvalidCyclotomicIndex(1).to_string()
        );
        assert_eq!(
            Error::DefaultError("test string".to_string()).to_string(),
            "test string"
        );

        assert_eq!(
            ParametersError::InvalidCyclotomicIndex(1).to_string(),
            "Invalid cyclotomic index: 1"
        );
        assert_eq!(
            ParametersError::InvalidModulusSize(0, 1, 2).to_string(),
            "Invalid modulus size: 0, expected an integer between 1 and 2"
        );
        assert_eq!(
            ParametersError::NotEnoughPrimes(20, 16).to_string(),
            "Not enough primes of size 20 congruent to 1 modulo 16"
        );
        assert_eq!(
            ParametersError::InvalidPlaintext("test".to_string()).to_string(),
            "test"
        );
        assert_eq!(
            ParametersError::TooManySpecified("test".to_string()).to_string(),
            "test"
        );
        assert_eq!(
            ParametersError::TooFewSpecified("test".to_string()).to_string(),
            "test"
        );
        assert_eq!(
            ParametersError::NotBootstrappable.to_string(),
            "The context is not bootstrappable"
        );
    }
}
