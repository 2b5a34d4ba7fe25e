// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

// An integration test might want to use some, but not all of, the symbols herein. To do so would
// cause compiler warnings for unused code, so we suppress them.
#![allow(unused)]

//! Utilities for building signed test repositories on the fly.

use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::rand::SystemRandom;
use aws_lc_rs::signature::Ed25519KeyPair;
use chrono::{DateTime, TimeZone, Utc};
use maplit::hashmap;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::num::NonZeroU64;
use std::path::Path;
use sturdy::schema::decoded::{Decoded, Hex};
use sturdy::schema::key::Key;
use sturdy::schema::{
    DelegatedRole, Delegations, Hashes, PathSet, Role, RoleKeys, RoleType, Root, Signature,
    Signed, Snapshot, SnapshotMeta, Target, Targets, Timestamp, TimestampMeta,
};
use sturdy::sign::Sign;
use sturdy::{FilesystemTransport, Limits, Settings, Updater};
use tempfile::TempDir;
use url::Url;

/// The contents of the single target file in [`simple_repository`].
pub const FILE1_CONTENT: &[u8] = b"Contents of file1 for testing.";

/// Returns a date so far in the future that these tests will no longer exist.
pub fn later() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2999, 1, 1, 0, 0, 0).unwrap()
}

/// Returns a date in the past, for building metadata that is already expired.
pub fn earlier() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()
}

/// The reference time tests run "at".
pub fn reference_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
}

pub fn nz(n: u64) -> NonZeroU64 {
    NonZeroU64::new(n).unwrap()
}

/// A freshly generated ed25519 signing key.
pub struct TestKey {
    pair: Ed25519KeyPair,
}

impl TestKey {
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let document = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        Self {
            pair: Ed25519KeyPair::from_pkcs8(document.as_ref()).unwrap(),
        }
    }

    pub fn key(&self) -> Key {
        self.pair.tuf_key()
    }

    pub fn keyid(&self) -> Decoded<Hex> {
        self.key().key_id().unwrap()
    }

    pub fn sign_role<T: Role>(&self, role: &T) -> Signature {
        let data = role.canonical_form().unwrap();
        let rng = SystemRandom::new();
        let sig = Sign::sign(&self.pair, &data, &rng).unwrap();
        Signature {
            keyid: self.keyid(),
            sig: Decoded::from(sig),
        }
    }
}

/// Wraps a role in a signed envelope carrying one signature per given key.
pub fn signed<T: Role>(role: T, keys: &[&TestKey]) -> Signed<T> {
    let signatures = keys.iter().map(|key| key.sign_role(&role)).collect();
    Signed {
        signed: role,
        signatures,
    }
}

pub fn to_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec_pretty(value).unwrap()
}

pub fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) {
    serde_json::to_writer_pretty(File::create(dir.join(name)).unwrap(), value).unwrap();
}

/// Converts a filepath into a URI formatted string.
pub fn dir_url<P: AsRef<Path>>(path: P) -> Url {
    Url::from_directory_path(path).unwrap()
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest(&SHA256, data).as_ref().to_vec()
}

pub fn hashes_for(data: &[u8]) -> Hashes {
    Hashes {
        sha256: Decoded::from(sha256(data)),
        _extra: HashMap::new(),
    }
}

pub fn target_for(data: &[u8]) -> Target {
    Target {
        length: data.len() as u64,
        hashes: hashes_for(data),
        custom: HashMap::new(),
        _extra: HashMap::new(),
    }
}

pub fn role_keys(keys: &[&TestKey], threshold: u64) -> RoleKeys {
    RoleKeys {
        keyids: keys.iter().map(|key| key.keyid()).collect(),
        threshold: nz(threshold),
        _extra: HashMap::new(),
    }
}

pub fn key_map(keys: &[&TestKey]) -> HashMap<Decoded<Hex>, Key> {
    keys.iter().map(|key| (key.keyid(), key.key())).collect()
}

/// Root metadata with threshold 1 for every role.
pub fn root_md(
    version: u64,
    consistent_snapshot: bool,
    root: &[&TestKey],
    timestamp: &[&TestKey],
    snapshot: &[&TestKey],
    targets: &[&TestKey],
) -> Root {
    let mut keys = key_map(root);
    keys.extend(key_map(timestamp));
    keys.extend(key_map(snapshot));
    keys.extend(key_map(targets));
    Root {
        spec_version: "1.0.0".into(),
        consistent_snapshot,
        version: nz(version),
        expires: later(),
        keys,
        roles: hashmap! {
            RoleType::Root => role_keys(root, 1),
            RoleType::Timestamp => role_keys(timestamp, 1),
            RoleType::Snapshot => role_keys(snapshot, 1),
            RoleType::Targets => role_keys(targets, 1),
        },
        _extra: HashMap::new(),
    }
}

/// Root metadata where one key holds every role.
pub fn simple_root(version: u64, key: &TestKey, consistent_snapshot: bool) -> Root {
    root_md(
        version,
        consistent_snapshot,
        &[key],
        &[key],
        &[key],
        &[key],
    )
}

pub fn timestamp_md(version: u64, snapshot_version: u64) -> Timestamp {
    let mut timestamp = Timestamp::new("1.0.0".into(), nz(version), later());
    timestamp.meta.insert(
        "snapshot.json".into(),
        TimestampMeta {
            length: None,
            hashes: None,
            version: nz(snapshot_version),
            _extra: HashMap::new(),
        },
    );
    timestamp
}

pub fn snapshot_md(version: u64, roles: &[(&str, u64)]) -> Snapshot {
    let mut snapshot = Snapshot::new("1.0.0".into(), nz(version), later());
    for (name, role_version) in roles {
        snapshot.meta.insert(
            format!("{name}.json"),
            SnapshotMeta {
                length: None,
                hashes: None,
                version: nz(*role_version),
                _extra: HashMap::new(),
            },
        );
    }
    snapshot
}

pub fn targets_md(version: u64) -> Targets {
    Targets::new("1.0.0".into(), nz(version), later())
}

pub fn delegations(keys: &[&TestKey], roles: Vec<DelegatedRole>) -> Delegations {
    Delegations {
        keys: key_map(keys),
        roles,
    }
}

pub fn delegated_role(
    name: &str,
    keys: &[&TestKey],
    paths: &[&str],
    terminating: bool,
) -> DelegatedRole {
    DelegatedRole {
        name: name.into(),
        keyids: keys.iter().map(|key| key.keyid()).collect(),
        threshold: nz(1),
        paths: PathSet::Paths(paths.iter().map(|path| (*path).to_owned()).collect()),
        terminating,
    }
}

/// Builds an on-disk repository with a single target file (`file1.txt`), returning the datastore
/// directory (seeded with the trusted root) and the remote directory (metadata at the top,
/// target files under `targets/`).
pub fn simple_repository(key: &TestKey, consistent_snapshot: bool) -> (TempDir, TempDir) {
    let datastore = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();
    let targets_dir = remote.path().join("targets");
    std::fs::create_dir(&targets_dir).unwrap();

    let root = signed(simple_root(1, key, consistent_snapshot), &[key]);
    write_json(datastore.path(), "root.json", &root);

    let mut targets = targets_md(1);
    targets
        .targets
        .insert("file1.txt".to_owned(), target_for(FILE1_CONTENT));
    let targets_bytes = to_bytes(&signed(targets, &[key]));

    let mut snapshot = snapshot_md(1, &[]);
    snapshot.meta.insert(
        "targets.json".to_owned(),
        SnapshotMeta {
            length: Some(targets_bytes.len() as u64),
            hashes: Some(hashes_for(&targets_bytes)),
            version: nz(1),
            _extra: HashMap::new(),
        },
    );
    let snapshot_bytes = to_bytes(&signed(snapshot, &[key]));

    let mut timestamp = timestamp_md(1, 1);
    timestamp.meta.insert(
        "snapshot.json".to_owned(),
        TimestampMeta {
            length: Some(snapshot_bytes.len() as u64),
            hashes: Some(hashes_for(&snapshot_bytes)),
            version: nz(1),
            _extra: HashMap::new(),
        },
    );
    let timestamp_bytes = to_bytes(&signed(timestamp, &[key]));

    let (snapshot_name, targets_name) = if consistent_snapshot {
        ("1.snapshot.json", "1.targets.json")
    } else {
        ("snapshot.json", "targets.json")
    };
    std::fs::write(remote.path().join(snapshot_name), &snapshot_bytes).unwrap();
    std::fs::write(remote.path().join(targets_name), &targets_bytes).unwrap();
    std::fs::write(remote.path().join("timestamp.json"), &timestamp_bytes).unwrap();

    let target_file_name = if consistent_snapshot {
        format!("{}.file1.txt", hex::encode(sha256(FILE1_CONTENT)))
    } else {
        "file1.txt".to_owned()
    };
    std::fs::write(targets_dir.join(target_file_name), FILE1_CONTENT).unwrap();

    (datastore, remote)
}

/// An updater over a repository laid out by [`simple_repository`], pinned to the test reference
/// time.
pub fn repo_updater(datastore: &TempDir, remote: &TempDir, limits: Limits) -> Updater {
    let metadata_base_url = dir_url(remote.path()).to_string();
    let targets_base_url = dir_url(remote.path().join("targets")).to_string();
    Updater::new(
        Box::new(FilesystemTransport),
        Settings {
            datastore: datastore.path(),
            metadata_base_url: &metadata_base_url,
            targets_base_url: Some(&targets_base_url),
            limits,
            prefix_targets_with_hash: true,
            reference_time: Some(reference_time()),
        },
    )
    .unwrap()
}

pub fn delegated_role_hash_prefixes(
    name: &str,
    keys: &[&TestKey],
    prefixes: &[&str],
    terminating: bool,
) -> DelegatedRole {
    DelegatedRole {
        name: name.into(),
        keyids: keys.iter().map(|key| key.keyid()).collect(),
        threshold: nz(1),
        paths: PathSet::PathHashPrefixes(prefixes.iter().map(|p| (*p).to_owned()).collect()),
        terminating,
    }
}
