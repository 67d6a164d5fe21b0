//! Block cipher modes of operation over SM4.
//!
//! [`ctr`] is the 32-bit counter keystream generator; [`gcm`] builds the
//! SM4-GCM authenticated encryption construction on top of it.

pub mod ctr;
#[cfg(feature = "gcm")]
pub mod gcm;
