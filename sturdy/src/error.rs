// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Contains the error type for this library.

#![allow(clippy::default_trait_access)]

use crate::schema::RoleType;
use crate::transport::TransportError;
use chrono::{DateTime, Utc};
use snafu::Snafu;
use std::num::NonZeroU64;
use std::path::PathBuf;
use url::Url;

/// Alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for this library.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
#[allow(missing_docs)]
pub enum Error {
    /// A metadata file could not be created in the datastore.
    #[snafu(display("Failed to create file at datastore path {}: {}", path.display(), source))]
    DatastoreCreate {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A metadata file could not be opened from the datastore.
    #[snafu(display("Failed to open file from datastore path {}: {}", path.display(), source))]
    DatastoreOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A datastore write could not be moved into place.
    #[snafu(display("Failed to move {} into the datastore: {}", path.display(), source))]
    DatastorePersist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    /// A metadata file could not be read from the datastore.
    #[snafu(display("Failed to read file from datastore path {}: {}", path.display(), source))]
    DatastoreRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A metadata file could not be removed from the datastore.
    #[snafu(display("Failed to remove file at datastore path {}: {}", path.display(), source))]
    DatastoreRemove {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A value could not be serialized into the datastore.
    #[snafu(display("Failed to serialize {} to JSON at {}: {}", what, path.display(), source))]
    DatastoreSerialize {
        what: String,
        path: PathBuf,
        source: serde_json::Error,
    },

    /// New metadata carried the same version as the currently trusted metadata. Non-fatal; the
    /// refresh workflow treats it as "already up to date".
    #[snafu(display("New {role} metadata is the already-trusted version {version}"))]
    EqualVersion {
        role: RoleType,
        version: NonZeroU64,
    },

    /// A metadata file was expired at the reference time.
    #[snafu(display("Found expired {role} metadata"))]
    ExpiredMetadata { role: RoleType },

    /// A downloaded or cached file did not match its declared hash.
    #[snafu(display(
        "Hash mismatch for {context}: calculated {calculated}, expected {expected}"
    ))]
    HashMismatch {
        context: String,
        calculated: String,
        expected: String,
    },

    /// Unable to append a path to a base URL.
    #[snafu(display("Failed to join '{path}' to URL '{url}': {source}"))]
    JoinUrl {
        path: String,
        url: Url,
        source: url::ParseError,
    },

    /// A downloaded or cached file did not match its declared length.
    #[snafu(display("Length mismatch for {context}: found {found}, expected {expected}"))]
    LengthMismatch {
        context: String,
        found: u64,
        expected: u64,
    },

    /// A download exceeded the limit that applied to it.
    #[snafu(display("Download exceeded max size of {max_size} bytes specified by {specifier}"))]
    MaxSizeExceeded {
        max_size: u64,
        specifier: &'static str,
    },

    /// A file listing was missing from trusted metadata.
    #[snafu(display("Metadata for '{file}' missing from {role} metadata"))]
    MetaMissing {
        file: String,
        role: RoleType,
    },

    /// No targets base URL was configured and none was given for the call.
    #[snafu(display("A targets base URL is required but none was configured"))]
    MissingTargetsBaseUrl,

    /// An update operation was attempted before its predecessor role was trusted.
    #[snafu(display("Cannot proceed: no trusted {role} metadata has been loaded"))]
    MissingTrustedRole { role: RoleType },

    /// New metadata carried an older version than the currently trusted metadata.
    #[snafu(display(
        "Found version {new_version} of {role} metadata when version {current_version} is \
         already trusted"
    ))]
    OlderMetadata {
        role: RoleType,
        current_version: NonZeroU64,
        new_version: NonZeroU64,
    },

    /// Unable to parse a downloaded metadata file.
    #[snafu(display("Failed to parse {role} metadata: {source}"))]
    ParseMetadata {
        role: RoleType,
        source: serde_json::Error,
    },

    /// Unable to parse the trusted root metadata file.
    #[snafu(display("Failed to parse trusted root metadata: {source}"))]
    ParseTrustedMetadata { source: serde_json::Error },

    /// Unable to parse a URL given in settings.
    #[snafu(display("Failed to parse URL '{url}': {source}"))]
    ParseUrl {
        url: String,
        source: url::ParseError,
    },

    /// The root metadata cannot be rotated once snapshot metadata has been loaded.
    #[snafu(display("Root metadata cannot be updated after snapshot metadata is loaded"))]
    RootUpdateAfterSnapshot,

    /// A key could not be used to sign.
    #[snafu(display("Failed to sign message"))]
    Sign {
        source: aws_lc_rs::error::Unspecified,
    },

    /// A private key was rejected while being parsed.
    #[snafu(display("Failed to parse private key"))]
    SignKeyRejected {
        source: aws_lc_rs::error::KeyRejected,
    },

    /// A private key was in no recognized format.
    #[snafu(display("Unrecognized private key format"))]
    SignKeyUnrecognized,

    /// The system clock went backward relative to the stored reference.
    #[snafu(display(
        "System time stepped backward: system time '{sys_time}', last known time \
         '{latest_known_time}'"
    ))]
    SystemTimeSteppedBackward {
        sys_time: DateTime<Utc>,
        latest_known_time: DateTime<Utc>,
    },

    /// A downloaded target could not be written to disk.
    #[snafu(display("Failed to write target to {}: {}", path.display(), source))]
    TargetFileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A downloaded target could not be moved into place.
    #[snafu(display("Failed to move target into place at {}: {}", path.display(), source))]
    TargetFilePersist {
        path: PathBuf,
        source: tempfile::PersistError,
    },

    /// A transport failed to fetch a URL.
    #[snafu(display("Failed to fetch {url}: {source}"))]
    Transport {
        url: Url,
        source: TransportError,
    },

    /// The trusted root metadata file was not present in the datastore; the client cannot
    /// bootstrap without it.
    #[snafu(display("No trusted root metadata found at {}", path.display()))]
    TrustedRootMissing { path: PathBuf },

    /// A target name resolved outside the repository, or was otherwise unusable.
    #[snafu(display("Target name '{name}' is unsafe to use"))]
    UnsafeTargetName { name: String },

    /// A metadata file failed signature verification.
    #[snafu(display("Failed to verify {role} metadata: {source}"))]
    VerifyMetadata {
        role: RoleType,
        source: crate::schema::Error,
    },

    /// The trusted root metadata file failed its own signature verification.
    #[snafu(display("Failed to verify trusted root metadata: {source}"))]
    VerifyTrustedMetadata { source: crate::schema::Error },

    /// A metadata file did not carry the exact version its authority declared for it.
    #[snafu(display(
        "Fetched {role} metadata with version {fetched} when the expected version is {expected}"
    ))]
    VersionMismatch {
        role: RoleType,
        fetched: NonZeroU64,
        expected: NonZeroU64,
    },
}
