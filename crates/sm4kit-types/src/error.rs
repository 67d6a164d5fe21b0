/// Cryptographic operation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    // General errors
    #[error("invalid argument")]
    InvalidArg,
    #[error("operation not supported")]
    NotSupported,

    // Length errors
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid nonce length")]
    InvalidNonceLength,
    #[error("invalid tag length")]
    InvalidTagLength,
    #[error("input exceeds the maximum length for this mode")]
    LengthExceeded,

    // AEAD errors
    #[error("aead: authentication failed")]
    AuthenticationFailure,
}
