//! Shared types and identifiers for quay.
//!
//! This crate defines the types every other quay crate agrees on:
//! identifiers ([`BlobKey`], [`Commitment`]), backend tags ([`BackendType`],
//! [`BackendTarget`]), the cert-verifier [`ContractAddress`], and the
//! versioned certificate wire format in [`cert`].

pub mod cert;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use cert::{CertError, CertV1, CertV2, CertVersion, Certificate};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Create an ID by hashing arbitrary data with BLAKE3.
            pub fn from_data(data: &[u8]) -> Self {
                Self(blake3::hash(data).into())
            }

            /// Return the raw 32-byte representation.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }
    };
}

define_id!(
    /// Lookup key in secondary stores: `blake3(certificate_bytes)`.
    ///
    /// Certificates are immutable, so the key is stable for the lifetime of
    /// the blob and can be derived by any proxy instance.
    BlobKey
);

define_id!(
    /// Content commitment binding a certificate to the dispersed blob.
    Commitment
);

// ---------------------------------------------------------------------------
// Backend tags
// ---------------------------------------------------------------------------

/// Tag identifying the kind of a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackendType {
    /// First-generation DA protocol (generated keys).
    DaV1,
    /// Second-generation DA protocol (generated keys).
    DaV2,
    /// In-memory cache (precomputed keys).
    Memory,
    /// Object storage on the local filesystem (precomputed keys).
    File,
}

impl BackendType {
    /// Canonical lowercase name, as used in configuration files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DaV1 => "da-v1",
            Self::DaV2 => "da-v2",
            Self::Memory => "memory",
            Self::File => "file",
        }
    }

    /// Whether this backend can serve as a cache or fallback target.
    pub fn is_secondary(self) -> bool {
        matches!(self, Self::Memory | Self::File)
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendType {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "da-v1" | "v1" => Ok(Self::DaV1),
            "da-v2" | "v2" => Ok(Self::DaV2),
            "memory" | "mem" => Ok(Self::Memory),
            "file" | "fs" => Ok(Self::File),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// A secondary store kind that cache and fallback lists may name.
///
/// Never persisted in certificates; only used to route secondary traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BackendTarget {
    /// In-memory cache.
    Memory,
    /// Filesystem object store.
    File,
}

impl BackendTarget {
    /// The backend type this target resolves to.
    pub fn backend_type(self) -> BackendType {
        match self {
            Self::Memory => BackendType::Memory,
            Self::File => BackendType::File,
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.backend_type().as_str())
    }
}

impl FromStr for BackendTarget {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<BackendType>()? {
            BackendType::Memory => Ok(Self::Memory),
            BackendType::File => Ok(Self::File),
            BackendType::DaV1 | BackendType::DaV2 => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// A backend name that does not match any known backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend: {0:?}")]
pub struct UnknownBackend(pub String);

// ---------------------------------------------------------------------------
// Contract address
// ---------------------------------------------------------------------------

/// A 20-byte on-chain contract address (the cert verifier).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ContractAddress([u8; 20]);

impl ContractAddress {
    /// Return the raw address bytes.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl From<[u8; 20]> for ContractAddress {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContractAddress({self})")
    }
}

impl FromStr for ContractAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 40 {
            return Err(AddressError::Length(digits.len()));
        }
        let mut bytes = [0u8; 20];
        hex::decode_to_slice(digits, &mut bytes).map_err(|_| AddressError::Hex)?;
        Ok(Self(bytes))
    }
}

/// Errors parsing a [`ContractAddress`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Wrong number of hex digits.
    #[error("address must be 40 hex digits, got {0}")]
    Length(usize),
    /// Non-hex characters.
    #[error("address contains non-hex characters")]
    Hex,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
