/// Block cipher algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Sm4,
}

/// AEAD algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgId {
    Sm4Gcm,
}

/// Hash algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Sm3,
}

impl CipherAlgId {
    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            CipherAlgId::Sm4 => "sm4",
        }
    }
}

impl AeadAlgId {
    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            AeadAlgId::Sm4Gcm => "sm4-gcm",
        }
    }
}

impl HashAlgId {
    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            HashAlgId::Sm3 => "sm3",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CryptoError;

    #[test]
    fn test_alg_names() {
        assert_eq!(CipherAlgId::Sm4.name(), "sm4");
        assert_eq!(AeadAlgId::Sm4Gcm.name(), "sm4-gcm");
        assert_eq!(HashAlgId::Sm3.name(), "sm3");
    }

    #[test]
    fn test_error_display() {
        let e = CryptoError::InvalidKeyLength { expected: 16, got: 15 };
        assert_eq!(e.to_string(), "invalid key length: expected 16, got 15");
        assert_eq!(
            CryptoError::AuthenticationFailure.to_string(),
            "aead: authentication failed"
        );
    }
}
