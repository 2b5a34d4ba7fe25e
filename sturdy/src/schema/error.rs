// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for metadata parsing and verification.

use crate::schema::RoleType;
use snafu::Snafu;
use std::num::NonZeroU64;
use std::path::PathBuf;

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for metadata parsing and verification.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// A delegated role named in a parent's delegations could not be found.
    #[snafu(display("Delegated role '{name}' not found in delegations"))]
    DelegatedRoleMissing {
        /// The name of the missing role.
        name: String,
    },

    /// The same key ID appeared twice in a key map.
    #[snafu(display("Duplicate key ID '{keyid}'"))]
    DuplicateKeyId {
        /// The duplicated key ID.
        keyid: String,
    },

    /// The same key ID was listed twice for one role.
    #[snafu(display("Key ID '{keyid}' listed more than once for role '{role}'"))]
    DuplicateRoleKeyId {
        /// The duplicated key ID.
        keyid: String,
        /// The role listing it.
        role: String,
    },

    /// Failed to open a file.
    #[snafu(display("Failed to open '{}': {}", path.display(), source))]
    FileOpen {
        /// The file that could not be opened.
        path: PathBuf,
        /// The source error.
        source: std::io::Error,
    },

    /// Failed to read a file.
    #[snafu(display("Failed to read '{}': {}", path.display(), source))]
    FileRead {
        /// The file that could not be read.
        path: PathBuf,
        /// The source error.
        source: std::io::Error,
    },

    /// A string that was expected to be hexadecimal was not.
    #[snafu(display("Invalid hex string '{value}': {source}"))]
    HexDecode {
        /// The offending string.
        value: String,
        /// The source error.
        source: hex::FromHexError,
    },

    /// A key ID in a key map did not match the contents of its key.
    #[snafu(display("Key ID '{keyid}' does not match calculated ID '{calculated}'"))]
    InvalidKeyId {
        /// The key ID from the wire.
        keyid: String,
        /// The ID calculated from the key itself.
        calculated: String,
    },

    /// Failed to serialize a value as canonical JSON.
    #[snafu(display("Failed to serialize {what} as canonical JSON: {source}"))]
    JsonSerialization {
        /// What was being serialized.
        what: String,
        /// The source error.
        source: serde_json::Error,
    },

    /// A key ID listed for a role was not present in the key map.
    #[snafu(display("Key ID '{keyid}' for role '{role}' not found in keys"))]
    KeyNotFound {
        /// The missing key ID.
        keyid: String,
        /// The role that listed it.
        role: String,
    },

    /// A public key was not valid PEM.
    #[snafu(display("Invalid PEM public key: {source}"))]
    PemDecode {
        /// The source error.
        source: pem::PemError,
    },

    /// A role required by the root metadata was not present.
    #[snafu(display("Role '{role}' missing from root metadata"))]
    RoleMissing {
        /// The missing role.
        role: RoleType,
    },

    /// A signed object did not carry enough valid signatures.
    #[snafu(display(
        "Signature threshold of {threshold} not met for role '{role}' ({valid} valid)"
    ))]
    SignatureThreshold {
        /// The role being verified.
        role: String,
        /// The number of valid signatures found.
        valid: u64,
        /// The required threshold.
        threshold: NonZeroU64,
    },

    /// A metadata spec version was not understood by this client.
    #[snafu(display("Unsupported metadata spec_version '{given}'"))]
    SpecVersion {
        /// The offending version string.
        given: String,
    },

    /// A SubjectPublicKeyInfo document could not be decoded.
    #[snafu(display("Invalid SPKI public key: {message}"))]
    SpkiDecode {
        /// Description of the decoding failure.
        message: String,
    },

    /// A target path did not name a regular file.
    #[snafu(display("Target not a file: '{}'", path.display()))]
    TargetNotAFile {
        /// The offending path.
        path: PathBuf,
    },
}
