// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sturdy is a client library for [TUF repositories].
//!
//! This client adheres to [TUF version 1.0.0][spec], with the following exceptions:
//!
//! * TAP 4 (multiple repository consensus) is not supported.
//! * Only a single metadata base URL and targets base URL are consulted; mirror lists are not
//!   supported.
//!
//! The client keeps a [`TrustedSet`] of verified metadata, bootstrapped from a root.json you
//! obtained out-of-band and placed in the datastore directory. [`Updater::refresh`] walks the
//! update workflow (root rotation, timestamp, snapshot, targets), and
//! [`Updater::target_info`] resolves a target name through the delegation graph.
//!
//! [TUF repositories]: https://theupdateframework.github.io/
//! [spec]: https://github.com/theupdateframework/specification/blob/v1.0.0/tuf-spec.md

#![forbid(missing_debug_implementations, missing_copy_implementations)]
#![deny(rust_2018_idioms)]
// missing_docs is on its own line to make it easy to comment out when making changes.
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc
)]

mod datastore;
pub mod error;
mod fetch;
#[cfg(feature = "http")]
pub mod http;
mod resolver;
pub mod schema;
pub mod sign;
mod target_name;
mod transport;
mod trusted;

use crate::datastore::Datastore;
use crate::error::Result;
use crate::fetch::{fetch_max_size, fetch_sha256};
use crate::schema::{Role, RoleType, Target};
#[cfg(feature = "http")]
pub use crate::http::{ClientSettings, HttpTransport};
pub use crate::target_name::TargetName;
pub use crate::transport::{
    DefaultTransport, FilesystemTransport, Transport, TransportError, TransportErrorKind,
};
pub use crate::trusted::TrustedSet;
use chrono::{DateTime, Utc};
use log::debug;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use snafu::{ensure, OptionExt, ResultExt};
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use url::Url;

/// Repository settings, provided to [`Updater::new`].
#[derive(Debug, Clone, Copy)]
pub struct Settings<'a> {
    /// A [`Path`] to a directory on a persistent filesystem. It must already contain the trusted
    /// `root.json` you obtained out-of-band; the updater stores the most recently verified
    /// metadata files here to detect rollback attacks across runs.
    pub datastore: &'a Path,

    /// The URL base for TUF metadata (such as timestamp.json).
    pub metadata_base_url: &'a str,

    /// The URL base for target files. May be omitted when only metadata operations are needed;
    /// [`Updater::download_target`] then requires a base URL per call.
    pub targets_base_url: Option<&'a str>,

    /// Limits used when fetching repository metadata.
    ///
    /// This parameter implements [`Default`]; see its documentation for details.
    pub limits: Limits,

    /// Whether target files are fetched under digest-prefixed filenames when the repository uses
    /// consistent snapshots. Repositories generated with consistent snapshots normally expect
    /// `true`.
    pub prefix_targets_with_hash: bool,

    /// The instant used for all expiration decisions during a refresh. When `None`, the system
    /// clock is sampled once per refresh (and checked against the last sample persisted in the
    /// datastore, so a clock stepping backward is detected).
    pub reference_time: Option<DateTime<Utc>>,
}

/// Limits used when fetching repository metadata.
///
/// These limits are implemented to prevent endless data attacks. Clients must ensure these values
/// are set higher than what would reasonably be expected by a repository, but not so high that
/// the amount of data could interfere with the system.
///
/// The [`Default`] implementation sets the following values:
/// * `max_root_size`: 1 MiB
/// * `max_timestamp_size`: 1 MiB
/// * `max_snapshot_size`: 10 MiB (only if the size is not listed in timestamp.json)
/// * `max_targets_size`: 10 MiB (only if the size is not listed in snapshot.json)
/// * `max_root_updates`: 256
/// * `max_delegations`: 32
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// The maximum allowable size in bytes for downloaded root.json files.
    pub max_root_size: u64,

    /// The maximum allowable size in bytes for the downloaded timestamp.json file.
    pub max_timestamp_size: u64,

    /// The maximum allowable size in bytes for the downloaded snapshot.json file **if** the size
    /// is not listed in the signed timestamp.json file.
    pub max_snapshot_size: u64,

    /// The maximum allowable size in bytes for downloaded targets metadata **if** the size is not
    /// listed in the signed snapshot.json file.
    pub max_targets_size: u64,

    /// The maximum number of updates to root.json to download during one refresh.
    pub max_root_updates: u64,

    /// The maximum number of targets roles visited while resolving one target name through the
    /// delegation graph.
    pub max_delegations: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_root_size: 1024 * 1024,          // 1 MiB
            max_timestamp_size: 1024 * 1024,     // 1 MiB
            max_snapshot_size: 1024 * 1024 * 10, // 10 MiB
            max_targets_size: 1024 * 1024 * 10,  // 10 MiB
            max_root_updates: 256,
            max_delegations: 32,
        }
    }
}

/// A TUF repository client.
///
/// An `Updater` drives the metadata refresh workflow against a single repository and answers
/// questions about targets once refreshed. One updater instance operates sequentially; it is not
/// re-entrant.
#[derive(Debug)]
pub struct Updater {
    transport: Box<dyn Transport>,
    datastore: Datastore,
    metadata_base_url: Url,
    targets_base_url: Option<Url>,
    limits: Limits,
    prefix_targets_with_hash: bool,
    reference_time: Option<DateTime<Utc>>,
    pub(crate) trusted: Option<TrustedSet>,
}

impl Updater {
    /// Creates a new `Updater`. No network traffic happens until [`refresh`](Self::refresh) or
    /// one of the target operations is called.
    pub fn new(transport: Box<dyn Transport>, settings: Settings<'_>) -> Result<Self> {
        let metadata_base_url = parse_url(settings.metadata_base_url)?;
        let targets_base_url = settings.targets_base_url.map(parse_url).transpose()?;
        Ok(Self {
            transport,
            datastore: Datastore::new(settings.datastore),
            metadata_base_url,
            targets_base_url,
            limits: settings.limits,
            prefix_targets_with_hash: settings.prefix_targets_with_hash,
            reference_time: settings.reference_time,
            trusted: None,
        })
    }

    /// Loads and verifies the repository metadata, in order: local root, the chain of rotated
    /// roots offered by the repository, timestamp, snapshot, and the top-level targets role.
    /// Verified metadata is persisted to the datastore as each commit succeeds; on error, the
    /// datastore reflects the last successful commit and the in-memory trusted set is unchanged.
    pub fn refresh(&mut self) -> Result<()> {
        let reference_time = match self.reference_time {
            Some(instant) => instant,
            None => self.datastore.system_time()?,
        };

        // 0. Load the trusted root metadata file. A good, trusted copy of this file must be
        //    shipped out-of-band; without it the client cannot bootstrap.
        let root_bytes =
            self.datastore
                .bytes("root.json")?
                .context(error::TrustedRootMissingSnafu {
                    path: self.datastore.path().join("root.json"),
                })?;
        let mut trusted = TrustedSet::new(&root_bytes, reference_time)?;

        // 1. Update the root metadata file, walking the chain of rotations the repository offers.
        load_root(
            self.transport.as_ref(),
            &self.datastore,
            &self.limits,
            &self.metadata_base_url,
            &mut trusted,
        )?;

        // The freeze-attack check happens after the rotation loop so that a client can rotate
        // through roots that expired while it was offline.
        ensure!(
            !trusted.root().signed.is_expired(reference_time),
            error::ExpiredMetadataSnafu {
                role: RoleType::Root
            }
        );

        // 2-4. Timestamp, snapshot, and top-level targets, each from the local cache when the
        // cache is still current, otherwise from the repository.
        load_timestamp(
            self.transport.as_ref(),
            &self.datastore,
            &self.limits,
            &self.metadata_base_url,
            &mut trusted,
        )?;
        load_snapshot(
            self.transport.as_ref(),
            &self.datastore,
            &self.limits,
            &self.metadata_base_url,
            &mut trusted,
        )?;
        load_targets(
            self.transport.as_ref(),
            &self.datastore,
            &self.limits,
            &self.metadata_base_url,
            &mut trusted,
            "targets",
            "root",
        )?;

        self.trusted = Some(trusted);
        Ok(())
    }

    /// The currently trusted metadata, if [`refresh`](Self::refresh) has succeeded.
    pub fn trusted(&self) -> Option<&TrustedSet> {
        self.trusted.as_ref()
    }

    /// Returns the authoritative description of the named target, or `None` if no trusted role
    /// describes it. Refreshes first if this updater has not yet loaded targets metadata.
    /// Delegated targets metadata is loaded (and verified) lazily as the delegation graph is
    /// searched.
    pub fn target_info(&mut self, name: &TargetName) -> Result<Option<Target>> {
        if self
            .trusted
            .as_ref()
            .and_then(TrustedSet::top_targets)
            .is_none()
        {
            self.refresh()?;
        }
        self.preorder_find(name)
    }

    /// Loads and verifies the targets metadata for `role`, delegated to by `parent`, making it
    /// available from the trusted set. Used by the delegation search.
    pub(crate) fn fetch_targets_role(&mut self, role: &str, parent: &str) -> Result<()> {
        let trusted = self
            .trusted
            .as_mut()
            .context(error::MissingTrustedRoleSnafu {
                role: RoleType::Snapshot,
            })?;
        load_targets(
            self.transport.as_ref(),
            &self.datastore,
            &self.limits,
            &self.metadata_base_url,
            trusted,
            role,
            parent,
        )
    }

    /// Downloads the target described by `target` into `outdir`, verifying its length and hashes.
    /// Returns the path of the written file.
    ///
    /// `targets_base_url` overrides the base URL from [`Settings`]; one of the two must be
    /// present. Under consistent snapshots (and unless disabled in settings), the file is fetched
    /// with its digest prefixed to the file name, per the repository layout.
    pub fn download_target(
        &mut self,
        name: &TargetName,
        target: &Target,
        outdir: &Path,
        targets_base_url: Option<&str>,
    ) -> Result<PathBuf> {
        let base = match targets_base_url {
            Some(url) => parse_url(url)?,
            None => self
                .targets_base_url
                .clone()
                .context(error::MissingTargetsBaseUrlSnafu)?,
        };

        if self.trusted.is_none() {
            self.refresh()?;
        }
        let trusted = self
            .trusted
            .as_ref()
            .context(error::MissingTrustedRoleSnafu {
                role: RoleType::Root,
            })?;

        let file_path = if trusted.root().signed.consistent_snapshot && self.prefix_targets_with_hash
        {
            let digest = target.hashes.sha256.to_string();
            match name.resolved().rsplit_once('/') {
                Some((dir, basename)) => format!("{dir}/{digest}.{basename}"),
                None => format!("{}.{}", digest, name.resolved()),
            }
        } else {
            name.resolved().to_owned()
        };
        let url = join_url(&base, &file_path)?;

        let data = fetch_sha256(
            self.transport.as_ref(),
            url,
            target.length,
            "targets metadata",
            target.hashes.sha256.bytes(),
        )?;
        ensure!(
            data.len() as u64 == target.length,
            error::LengthMismatchSnafu {
                context: name.resolved(),
                found: data.len() as u64,
                expected: target.length,
            }
        );

        let out_path = outdir.join(encode_filename(name.resolved()));
        let mut temp = NamedTempFile::new_in(outdir).context(error::TargetFileWriteSnafu {
            path: &out_path,
        })?;
        temp.write_all(&data).context(error::TargetFileWriteSnafu {
            path: &out_path,
        })?;
        temp.persist(&out_path)
            .context(error::TargetFilePersistSnafu { path: &out_path })?;
        Ok(out_path)
    }

    /// Checks whether a previously downloaded copy of the target exists in `dir` and still
    /// matches its described length and hashes. Returns the path on success, `None` on any
    /// mismatch or read failure.
    pub fn find_cached_target(
        &self,
        name: &TargetName,
        target: &Target,
        dir: &Path,
    ) -> Option<PathBuf> {
        let path = dir.join(encode_filename(name.resolved()));
        let data = std::fs::read(&path).ok()?;
        if data.len() as u64 != target.length {
            return None;
        }
        let calculated = aws_lc_rs::digest::digest(&aws_lc_rs::digest::SHA256, &data);
        (calculated.as_ref() == target.hashes.sha256.bytes()).then_some(path)
    }
}

/// Characters percent-encoded before a role or target name is used as a file name.
const CHARACTERS_TO_AVOID: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'/')
    .add(b'\\')
    .add(b'%')
    .add(b'?')
    .add(b'#');

/// Encodes a role or target name so it is safe to use as a single file name.
pub(crate) fn encode_filename(name: &str) -> String {
    utf8_percent_encode(name, CHARACTERS_TO_AVOID).to_string()
}

fn parse_url(url: &str) -> Result<Url> {
    let mut url = Cow::from(url);
    if !url.ends_with('/') {
        url.to_mut().push('/');
    }
    Url::parse(&url).context(error::ParseUrlSnafu { url })
}

fn join_url(base: &Url, path: &str) -> Result<Url> {
    base.join(path).context(error::JoinUrlSnafu {
        path,
        url: base.clone(),
    })
}

/// Step 1 of the client workflow: update the root metadata file. Since the newest root may be
/// signed with entirely different keys, the client downloads each intermediate root in turn,
/// verifying every hop against the chain so far.
fn load_root(
    transport: &dyn Transport,
    datastore: &Datastore,
    limits: &Limits,
    metadata_base_url: &Url,
    trusted: &mut TrustedSet,
) -> Result<()> {
    // Capture the key sets trusted before rotation; rotating them triggers local cache deletion
    // below (recovery from fast-forward attacks).
    let original_timestamp_keys = trusted
        .root()
        .signed
        .keys(RoleType::Timestamp)
        .cloned()
        .collect::<Vec<_>>();
    let original_snapshot_keys = trusted
        .root()
        .signed
        .keys(RoleType::Snapshot)
        .cloned()
        .collect::<Vec<_>>();

    for _ in 0..limits.max_root_updates {
        let version = trusted.root().signed.version.get().saturating_add(1);
        let path = format!("{version}.root.json");
        let url = join_url(metadata_base_url, &path)?;
        let root_bytes = match fetch_max_size(
            transport,
            url,
            limits.max_root_size,
            "max_root_size argument",
        ) {
            // If version N+1 is not available, the chain ends at version N.
            Err(_) => break,
            Ok(bytes) => bytes,
        };
        match trusted.update_root(&root_bytes) {
            Ok(()) => datastore.create("root.json", trusted.root())?,
            // A file that does not parse as root metadata also ends the chain.
            Err(error::Error::ParseMetadata { .. }) => break,
            // Signature and version failures are reported: someone is serving bad roots.
            Err(err) => return Err(err),
        }
    }

    // If the timestamp or snapshot keys were rotated away, delete the locally cached timestamp
    // and snapshot metadata. This recovers from fast-forward attacks after a repository
    // compromise: the rolled-back version numbers would otherwise look like rollback attacks.
    if original_timestamp_keys
        .iter()
        .ne(trusted.root().signed.keys(RoleType::Timestamp))
        || original_snapshot_keys
            .iter()
            .ne(trusted.root().signed.keys(RoleType::Snapshot))
    {
        let r1 = datastore.remove("timestamp.json");
        let r2 = datastore.remove("snapshot.json");
        r1.and(r2)?;
    }

    Ok(())
}

/// Step 2 of the client workflow: load the timestamp metadata file.
fn load_timestamp(
    transport: &dyn Transport,
    datastore: &Datastore,
    limits: &Limits,
    metadata_base_url: &Url,
    trusted: &mut TrustedSet,
) -> Result<()> {
    // Feed the locally cached timestamp into the trusted set first (ignoring failures), so the
    // rollback checks below cover versions this client has already accepted.
    if let Some(cached) = datastore.bytes("timestamp.json")? {
        if let Err(err) = trusted.update_timestamp(&cached) {
            debug!("cached timestamp.json not used: {err}");
        }
    }

    let url = join_url(metadata_base_url, "timestamp.json")?;
    let timestamp_bytes = fetch_max_size(
        transport,
        url,
        limits.max_timestamp_size,
        "max_timestamp_size argument",
    )?;
    match trusted.update_timestamp(&timestamp_bytes) {
        Ok(()) => {
            if let Some(timestamp) = trusted.timestamp() {
                datastore.create("timestamp.json", timestamp)?;
            }
        }
        // The repository is serving the version we already trust; nothing to persist.
        Err(error::Error::EqualVersion { .. }) => {
            debug!("timestamp.json is unchanged");
        }
        Err(err) => return Err(err),
    }
    Ok(())
}

/// Step 3 of the client workflow: load the snapshot metadata file.
fn load_snapshot(
    transport: &dyn Transport,
    datastore: &Datastore,
    limits: &Limits,
    metadata_base_url: &Url,
    trusted: &mut TrustedSet,
) -> Result<()> {
    // The locally cached snapshot was verified against timestamp metadata when it was stored, so
    // it skips the length and hash checks. If it still satisfies the current timestamp there is
    // nothing to fetch.
    if let Some(cached) = datastore.bytes("snapshot.json")? {
        match trusted.update_snapshot(&cached, true) {
            Ok(()) => return Ok(()),
            Err(err) => debug!("cached snapshot.json not used: {err}"),
        }
    }

    let (path, max_size, specifier) = {
        let timestamp = trusted
            .timestamp()
            .context(error::MissingTrustedRoleSnafu {
                role: RoleType::Timestamp,
            })?;
        let snapshot_meta = timestamp
            .signed
            .snapshot_meta()
            .context(error::MetaMissingSnafu {
                file: "snapshot.json",
                role: RoleType::Timestamp,
            })?;
        let path = if trusted.root().signed.consistent_snapshot {
            format!("{}.snapshot.json", snapshot_meta.version)
        } else {
            "snapshot.json".to_owned()
        };
        let (max_size, specifier) = match snapshot_meta.length {
            Some(length) => (length, "timestamp.json"),
            None => (limits.max_snapshot_size, "max_snapshot_size argument"),
        };
        (path, max_size, specifier)
    };

    let url = join_url(metadata_base_url, &path)?;
    let snapshot_bytes = fetch_max_size(transport, url, max_size, specifier)?;
    trusted.update_snapshot(&snapshot_bytes, false)?;
    if let Some(snapshot) = trusted.snapshot() {
        datastore.create("snapshot.json", snapshot)?;
    }
    Ok(())
}

/// Steps 4 and 5 of the client workflow: load targets metadata for a role. The top-level role is
/// loaded during refresh; delegated roles are loaded on demand while searching the delegation
/// graph.
fn load_targets(
    transport: &dyn Transport,
    datastore: &Datastore,
    limits: &Limits,
    metadata_base_url: &Url,
    trusted: &mut TrustedSet,
    role: &str,
    parent: &str,
) -> Result<()> {
    let filename = format!("{}.json", encode_filename(role));
    if let Some(cached) = datastore.bytes(&filename)? {
        match trusted.update_delegated_targets(&cached, role, parent) {
            Ok(()) => return Ok(()),
            Err(err) => debug!("cached {filename} not used: {err}"),
        }
    }

    let (path, max_size, specifier) = {
        let snapshot = trusted.snapshot().context(error::MissingTrustedRoleSnafu {
            role: RoleType::Snapshot,
        })?;
        let role_meta = snapshot
            .signed
            .role_meta(role)
            .context(error::MetaMissingSnafu {
                file: format!("{role}.json"),
                role: RoleType::Snapshot,
            })?;
        let path = if trusted.root().signed.consistent_snapshot {
            format!("{}.{}.json", role_meta.version, encode_filename(role))
        } else {
            format!("{}.json", encode_filename(role))
        };
        let (max_size, specifier) = match role_meta.length {
            Some(length) => (length, "snapshot.json"),
            None => (limits.max_targets_size, "max_targets_size argument"),
        };
        (path, max_size, specifier)
    };

    let url = join_url(metadata_base_url, &path)?;
    let targets_bytes = fetch_max_size(transport, url, max_size, specifier)?;
    trusted.update_delegated_targets(&targets_bytes, role, parent)?;
    if let Some(targets) = trusted.targets(role) {
        datastore.create(&filename, targets)?;
    }
    Ok(())
}
