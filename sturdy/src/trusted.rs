// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides [`TrustedSet`], the collection of metadata this client currently trusts.
//!
//! A `TrustedSet` starts from out-of-band trusted root metadata and only ever moves forward: each
//! update operation either verifies new metadata against the already-trusted metadata and commits
//! it, or fails and leaves the set unchanged. The operations must be called in the client
//! workflow order (root, timestamp, snapshot, targets, delegated targets); calling one before its
//! predecessor role is trusted is an error.

use crate::error::{self, Result};
use crate::schema::{Hashes, Role, RoleType, Root, Signed, Snapshot, Targets, Timestamp};
use aws_lc_rs::digest::{digest, SHA256};
use chrono::{DateTime, Utc};
use log::debug;
use snafu::{ensure, OptionExt, ResultExt};
use std::collections::HashMap;
use std::num::NonZeroU64;

/// The name under which the top-level targets role is tracked.
const TOP_LEVEL_TARGETS: &str = "targets";

/// The metadata currently trusted by this client, and the only way to grow that trust.
#[derive(Debug, Clone)]
pub struct TrustedSet {
    root: Signed<Root>,
    timestamp: Option<Signed<Timestamp>>,
    snapshot: Option<Signed<Snapshot>>,
    targets: HashMap<String, Signed<Targets>>,
    reference_time: DateTime<Utc>,
}

impl TrustedSet {
    /// Creates a new `TrustedSet` from root metadata obtained out-of-band.
    ///
    /// The root must be signed by itself at its own threshold. Expiration is not checked here;
    /// the update workflow rotates to the newest root before deciding whether trust has lapsed.
    /// `reference_time` is the instant used for every expiration decision made through this set,
    /// so a single refresh makes all of its checks against one clock reading.
    pub fn new(root_bytes: &[u8], reference_time: DateTime<Utc>) -> Result<Self> {
        let root: Signed<Root> =
            serde_json::from_slice(root_bytes).context(error::ParseTrustedMetadataSnafu)?;
        root.signed
            .verify_role(&root)
            .context(error::VerifyTrustedMetadataSnafu)?;
        Ok(Self {
            root,
            timestamp: None,
            snapshot: None,
            targets: HashMap::new(),
            reference_time,
        })
    }

    /// The trusted root metadata.
    pub fn root(&self) -> &Signed<Root> {
        &self.root
    }

    /// The trusted timestamp metadata, if any has been loaded.
    pub fn timestamp(&self) -> Option<&Signed<Timestamp>> {
        self.timestamp.as_ref()
    }

    /// The trusted snapshot metadata, if any has been loaded.
    pub fn snapshot(&self) -> Option<&Signed<Snapshot>> {
        self.snapshot.as_ref()
    }

    /// The trusted targets metadata for a role name ("targets" for the top-level role), if it has
    /// been loaded.
    pub fn targets(&self, role_name: &str) -> Option<&Signed<Targets>> {
        self.targets.get(role_name)
    }

    /// The trusted top-level targets metadata, if it has been loaded.
    pub fn top_targets(&self) -> Option<&Signed<Targets>> {
        self.targets(TOP_LEVEL_TARGETS)
    }

    /// The instant this set uses for expiration decisions.
    pub fn reference_time(&self) -> DateTime<Utc> {
        self.reference_time
    }

    /// Verifies and commits the next version of the root metadata.
    ///
    /// The new root must be signed at the `root` role's threshold by both the currently trusted
    /// root (so the existing chain of trust admits it) and by itself (so clients starting from
    /// the new root alone can also verify it), and must carry exactly the next version number.
    /// Expiration is deliberately not checked: a client catching up on a long chain of rotations
    /// passes through roots that have expired since they were superseded.
    pub fn update_root(&mut self, root_bytes: &[u8]) -> Result<()> {
        ensure!(self.snapshot.is_none(), error::RootUpdateAfterSnapshotSnafu);

        let new_root: Signed<Root> = serde_json::from_slice(root_bytes)
            .context(error::ParseMetadataSnafu { role: RoleType::Root })?;

        self.root
            .signed
            .verify_role(&new_root)
            .context(error::VerifyMetadataSnafu { role: RoleType::Root })?;
        new_root
            .signed
            .verify_role(&new_root)
            .context(error::VerifyMetadataSnafu { role: RoleType::Root })?;

        let expected = self
            .root
            .signed
            .version
            .checked_add(1)
            .unwrap_or(NonZeroU64::MAX);
        ensure!(
            new_root.signed.version == expected,
            error::VersionMismatchSnafu {
                role: RoleType::Root,
                fetched: new_root.signed.version,
                expected,
            }
        );

        debug!("root metadata updated to version {}", new_root.signed.version);
        self.root = new_root;
        Ok(())
    }

    /// Verifies and commits new timestamp metadata.
    ///
    /// Fails with [`Error::EqualVersion`](crate::error::Error::EqualVersion) when the new
    /// timestamp carries the version already trusted; callers treat that as "already up to
    /// date" and skip persisting.
    pub fn update_timestamp(&mut self, timestamp_bytes: &[u8]) -> Result<()> {
        ensure!(
            !self.root.signed.is_expired(self.reference_time),
            error::ExpiredMetadataSnafu { role: RoleType::Root }
        );

        let new_timestamp: Signed<Timestamp> = serde_json::from_slice(timestamp_bytes)
            .context(error::ParseMetadataSnafu {
                role: RoleType::Timestamp,
            })?;

        self.root
            .signed
            .verify_role(&new_timestamp)
            .context(error::VerifyMetadataSnafu {
                role: RoleType::Timestamp,
            })?;

        let new_meta = new_timestamp
            .signed
            .snapshot_meta()
            .context(error::MetaMissingSnafu {
                file: "snapshot.json",
                role: RoleType::Timestamp,
            })?;

        if let Some(current) = &self.timestamp {
            ensure!(
                new_timestamp.signed.version != current.signed.version,
                error::EqualVersionSnafu {
                    role: RoleType::Timestamp,
                    version: current.signed.version,
                }
            );
            ensure!(
                new_timestamp.signed.version > current.signed.version,
                error::OlderMetadataSnafu {
                    role: RoleType::Timestamp,
                    current_version: current.signed.version,
                    new_version: new_timestamp.signed.version,
                }
            );

            // A newer timestamp must not walk the snapshot version backward.
            let current_meta =
                current
                    .signed
                    .snapshot_meta()
                    .context(error::MetaMissingSnafu {
                        file: "snapshot.json",
                        role: RoleType::Timestamp,
                    })?;
            ensure!(
                new_meta.version >= current_meta.version,
                error::OlderMetadataSnafu {
                    role: RoleType::Snapshot,
                    current_version: current_meta.version,
                    new_version: new_meta.version,
                }
            );
        }

        ensure!(
            !new_timestamp.signed.is_expired(self.reference_time),
            error::ExpiredMetadataSnafu {
                role: RoleType::Timestamp,
            }
        );

        debug!(
            "timestamp metadata updated to version {}",
            new_timestamp.signed.version
        );
        self.timestamp = Some(new_timestamp);
        Ok(())
    }

    /// Verifies and commits new snapshot metadata.
    ///
    /// When `trusted_local` is true the bytes come from this client's own datastore, written
    /// after a prior successful verification, so the timestamp's declared length and hashes are
    /// not checked; everything else still is.
    pub fn update_snapshot(&mut self, snapshot_bytes: &[u8], trusted_local: bool) -> Result<()> {
        let expected_version = {
            let timestamp = self.timestamp.as_ref().context(error::MissingTrustedRoleSnafu {
                role: RoleType::Timestamp,
            })?;
            ensure!(
                !timestamp.signed.is_expired(self.reference_time),
                error::ExpiredMetadataSnafu {
                    role: RoleType::Timestamp,
                }
            );

            let snapshot_meta =
                timestamp
                    .signed
                    .snapshot_meta()
                    .context(error::MetaMissingSnafu {
                        file: "snapshot.json",
                        role: RoleType::Timestamp,
                    })?;

            if !trusted_local {
                if let Some(length) = snapshot_meta.length {
                    ensure!(
                        snapshot_bytes.len() as u64 == length,
                        error::LengthMismatchSnafu {
                            context: "snapshot.json",
                            found: snapshot_bytes.len() as u64,
                            expected: length,
                        }
                    );
                }
                if let Some(hashes) = &snapshot_meta.hashes {
                    check_hash(snapshot_bytes, hashes, "snapshot.json")?;
                }
            }

            snapshot_meta.version
        };

        let new_snapshot: Signed<Snapshot> = serde_json::from_slice(snapshot_bytes)
            .context(error::ParseMetadataSnafu {
                role: RoleType::Snapshot,
            })?;

        self.root
            .signed
            .verify_role(&new_snapshot)
            .context(error::VerifyMetadataSnafu {
                role: RoleType::Snapshot,
            })?;

        // The snapshot must be exactly the one the timestamp announced.
        ensure!(
            new_snapshot.signed.version == expected_version,
            error::VersionMismatchSnafu {
                role: RoleType::Snapshot,
                fetched: new_snapshot.signed.version,
                expected: expected_version,
            }
        );

        // Every role the old snapshot listed must still be listed, at the same or a newer
        // version. Disappearing or rolled-back roles are how a mix-and-match attack looks.
        if let Some(current) = &self.snapshot {
            for (file, current_meta) in &current.signed.meta {
                let new_meta =
                    new_snapshot
                        .signed
                        .meta
                        .get(file)
                        .context(error::MetaMissingSnafu {
                            file: file.clone(),
                            role: RoleType::Snapshot,
                        })?;
                ensure!(
                    new_meta.version >= current_meta.version,
                    error::OlderMetadataSnafu {
                        role: RoleType::Targets,
                        current_version: current_meta.version,
                        new_version: new_meta.version,
                    }
                );
            }
        }

        ensure!(
            !new_snapshot.signed.is_expired(self.reference_time),
            error::ExpiredMetadataSnafu {
                role: RoleType::Snapshot,
            }
        );

        debug!(
            "snapshot metadata updated to version {}",
            new_snapshot.signed.version
        );
        self.snapshot = Some(new_snapshot);
        // Targets metadata was validated against the old snapshot; it must all be re-validated
        // against this one.
        self.targets.clear();
        Ok(())
    }

    /// Verifies and commits new top-level targets metadata. Equivalent to
    /// `update_delegated_targets(targets_bytes, "targets", "root")`.
    pub fn update_targets(&mut self, targets_bytes: &[u8]) -> Result<()> {
        self.update_delegated_targets(targets_bytes, TOP_LEVEL_TARGETS, "root")
    }

    /// Verifies and commits new targets metadata for the role `role_name`, delegated to by
    /// `parent_name` ("root" for the top-level targets role).
    pub fn update_delegated_targets(
        &mut self,
        targets_bytes: &[u8],
        role_name: &str,
        parent_name: &str,
    ) -> Result<()> {
        let expected_version = {
            let snapshot = self.snapshot.as_ref().context(error::MissingTrustedRoleSnafu {
                role: RoleType::Snapshot,
            })?;
            ensure!(
                !snapshot.signed.is_expired(self.reference_time),
                error::ExpiredMetadataSnafu {
                    role: RoleType::Snapshot,
                }
            );

            let meta_info = snapshot
                .signed
                .role_meta(role_name)
                .context(error::MetaMissingSnafu {
                    file: format!("{role_name}.json"),
                    role: RoleType::Snapshot,
                })?;

            if let Some(length) = meta_info.length {
                ensure!(
                    targets_bytes.len() as u64 <= length,
                    error::LengthMismatchSnafu {
                        context: format!("{role_name}.json"),
                        found: targets_bytes.len() as u64,
                        expected: length,
                    }
                );
            }
            if let Some(hashes) = &meta_info.hashes {
                check_hash(targets_bytes, hashes, &format!("{role_name}.json"))?;
            }

            meta_info.version
        };

        let new_targets: Signed<Targets> = serde_json::from_slice(targets_bytes)
            .context(error::ParseMetadataSnafu {
                role: RoleType::Targets,
            })?;

        if role_name == TOP_LEVEL_TARGETS {
            self.root
                .signed
                .verify_role(&new_targets)
                .context(error::VerifyMetadataSnafu {
                    role: RoleType::Targets,
                })?;
        } else {
            let parent = self
                .targets
                .get(parent_name)
                .context(error::MissingTrustedRoleSnafu {
                    role: RoleType::Targets,
                })?;
            parent
                .signed
                .verify_delegated_role(&new_targets, role_name)
                .context(error::VerifyMetadataSnafu {
                    role: RoleType::Targets,
                })?;
        }

        ensure!(
            new_targets.signed.version == expected_version,
            error::VersionMismatchSnafu {
                role: RoleType::Targets,
                fetched: new_targets.signed.version,
                expected: expected_version,
            }
        );

        ensure!(
            !new_targets.signed.is_expired(self.reference_time),
            error::ExpiredMetadataSnafu {
                role: RoleType::Targets,
            }
        );

        debug!(
            "targets metadata for role '{}' updated to version {}",
            role_name, new_targets.signed.version
        );
        self.targets.insert(role_name.to_owned(), new_targets);
        Ok(())
    }
}

/// Requires the SHA-256 digest of `data` to match the declared hashes.
fn check_hash(data: &[u8], hashes: &Hashes, context: &str) -> Result<()> {
    let calculated = digest(&SHA256, data);
    ensure!(
        calculated.as_ref() == hashes.sha256.bytes(),
        error::HashMismatchSnafu {
            context,
            calculated: hex::encode(calculated.as_ref()),
            expected: hashes.sha256.to_string(),
        }
    );
    Ok(())
}
