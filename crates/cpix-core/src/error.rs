use thiserror::Error;

/// Failures surfaced by the CPIX core.
#[derive(Debug, Error)]
pub enum Error {
    /// A caller-supplied value is missing or has the wrong shape (empty kid,
    /// AES key that is not 32 bytes, malformed PEM/DER, ...).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A cross-element rule of the document model is violated (kid without a
    /// matching content key, filter with min > max, ...).
    #[error("structural violation: {0}")]
    StructuralViolation(String),

    /// The crypto provider failed to load a key or to encrypt/decrypt.
    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    /// No recipient of the document matches the supplied private key.
    #[error("private key does not match any recipient of the document")]
    NoMatchingRecipient,

    /// The input is not well-formed XML or its element structure does not
    /// match the CPIX schema subset.
    #[error("malformed XML: {0}")]
    XmlMalformed(String),
}

pub type Result<T> = std::result::Result<T, Error>;
