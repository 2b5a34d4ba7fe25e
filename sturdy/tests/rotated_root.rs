// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Root key rotation during refresh.

mod test_utils;

use std::fs;
use sturdy::{FilesystemTransport, Limits, Settings, Updater};
use tempfile::TempDir;
use test_utils::{
    dir_url, nz, reference_time, root_md, signed, simple_root, snapshot_md, targets_md,
    timestamp_md, to_bytes, write_json, TestKey,
};

/// The repository rotates the timestamp role from key A to key B in root version 2. The client
/// must walk the chain (2.root.json exists, 3.root.json does not) and then verify the timestamp
/// against the new key.
#[test]
fn rotation_chain_is_followed_to_its_end() {
    let key_a = TestKey::generate();
    let key_b = TestKey::generate();

    let datastore = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();

    write_json(
        datastore.path(),
        "root.json",
        &signed(simple_root(1, &key_a, false), &[&key_a]),
    );

    // Version 2 reassigns the timestamp role to key B. It must satisfy version 1's root
    // threshold (key A) as well as its own (key A again here).
    let root2 = root_md(2, false, &[&key_a], &[&key_b], &[&key_a], &[&key_a]);
    fs::write(
        remote.path().join("2.root.json"),
        to_bytes(&signed(root2, &[&key_a, &key_b])),
    )
    .unwrap();
    // 3.root.json is deliberately absent; the fetch failure ends the chain.

    let targets_bytes = to_bytes(&signed(targets_md(1), &[&key_a]));
    let snapshot_bytes = to_bytes(&signed(snapshot_md(1, &[("targets", 1)]), &[&key_a]));
    let timestamp_bytes = to_bytes(&signed(timestamp_md(1, 1), &[&key_b]));
    fs::write(remote.path().join("targets.json"), &targets_bytes).unwrap();
    fs::write(remote.path().join("snapshot.json"), &snapshot_bytes).unwrap();
    fs::write(remote.path().join("timestamp.json"), &timestamp_bytes).unwrap();

    let metadata_base_url = dir_url(remote.path()).to_string();
    let mut updater = Updater::new(
        Box::new(FilesystemTransport),
        Settings {
            datastore: datastore.path(),
            metadata_base_url: &metadata_base_url,
            targets_base_url: None,
            limits: Limits::default(),
            prefix_targets_with_hash: true,
            reference_time: Some(reference_time()),
        },
    )
    .unwrap();

    updater.refresh().unwrap();
    let trusted = updater.trusted().unwrap();
    assert_eq!(trusted.root().signed.version, nz(2));
    assert_eq!(trusted.timestamp().unwrap().signed.version, nz(1));

    // The rotated root was persisted, so the next run starts from version 2.
    let stored: sturdy::schema::Signed<sturdy::schema::Root> =
        serde_json::from_slice(&fs::read(datastore.path().join("root.json")).unwrap()).unwrap();
    assert_eq!(stored.signed.version, nz(2));
}

/// A repository serving a bad rotation (not signed by the old root's keys) fails the refresh
/// rather than being skipped.
#[test]
fn bad_rotation_is_an_error() {
    let key_a = TestKey::generate();
    let key_b = TestKey::generate();

    let datastore = TempDir::new().unwrap();
    let remote = TempDir::new().unwrap();

    write_json(
        datastore.path(),
        "root.json",
        &signed(simple_root(1, &key_a, false), &[&key_a]),
    );
    // Signed only by key B; version 1's root threshold is not satisfied.
    let root2 = root_md(2, false, &[&key_b], &[&key_b], &[&key_b], &[&key_b]);
    fs::write(
        remote.path().join("2.root.json"),
        to_bytes(&signed(root2, &[&key_b])),
    )
    .unwrap();

    let metadata_base_url = dir_url(remote.path()).to_string();
    let mut updater = Updater::new(
        Box::new(FilesystemTransport),
        Settings {
            datastore: datastore.path(),
            metadata_base_url: &metadata_base_url,
            targets_base_url: None,
            limits: Limits::default(),
            prefix_targets_with_hash: true,
            reference_time: Some(reference_time()),
        },
    )
    .unwrap();

    let err = updater.refresh().unwrap_err();
    assert!(matches!(
        err,
        sturdy::error::Error::VerifyMetadata {
            role: sturdy::schema::RoleType::Root,
            ..
        }
    ));
    assert!(updater.trusted().is_none());
}
