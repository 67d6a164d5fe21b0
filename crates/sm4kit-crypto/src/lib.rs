#![doc = "SM4 block cipher and SM4-GCM authenticated encryption."]

// Core traits
pub mod provider;

// Hash algorithms
#[cfg(feature = "sm3")]
pub mod sm3;

// Symmetric ciphers
#[cfg(feature = "sm4")]
pub mod sm4;

// Modes of operation
#[cfg(feature = "sm4")]
pub mod modes;

pub mod cipher {
    //! Unified symmetric cipher interface.
    pub use super::provider::{Aead, BlockCipher};
}

pub mod hash {
    //! Unified hash interface.
    pub use super::provider::{Digest, HashAlgorithm};
}

pub use sm4kit_types::CryptoError;
