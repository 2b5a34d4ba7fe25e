// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Exercises the trusted set's update rules: signature thresholds, version monotonicity,
//! expiration, and the checks that tie each role to the one above it.

mod test_utils;

use sturdy::error::Error;
use sturdy::schema::{RoleType, TimestampMeta};
use sturdy::TrustedSet;
use test_utils::{
    delegated_role, delegations, earlier, hashes_for, nz, reference_time, role_keys, root_md,
    signed, simple_root, snapshot_md, targets_md, timestamp_md, to_bytes, TestKey,
};

fn new_set(key: &TestKey) -> TrustedSet {
    let root = signed(simple_root(1, key, false), &[key]);
    TrustedSet::new(&to_bytes(&root), reference_time()).unwrap()
}

#[test]
fn timestamp_rollback_is_rejected() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(5, 10), &[&key])))
        .unwrap();
    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(4, 10), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OlderMetadata {
            role: RoleType::Timestamp,
            ..
        }
    ));
    assert_eq!(set.timestamp().unwrap().signed.version, nz(5));
}

#[test]
fn equal_timestamp_version_is_signaled() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(5, 10), &[&key])))
        .unwrap();
    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(5, 10), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::EqualVersion {
            role: RoleType::Timestamp,
            ..
        }
    ));
    assert_eq!(set.timestamp().unwrap().signed.version, nz(5));
}

#[test]
fn snapshot_rollback_through_timestamp_is_rejected() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(5, 10), &[&key])))
        .unwrap();
    // Newer timestamp, but it walks the snapshot version backward.
    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(6, 9), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OlderMetadata {
            role: RoleType::Snapshot,
            ..
        }
    ));
}

#[test]
fn snapshot_version_must_match_timestamp() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(1, 2), &[&key])))
        .unwrap();
    let err = set
        .update_snapshot(
            &to_bytes(&signed(snapshot_md(1, &[("targets", 1)]), &[&key])),
            false,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VersionMismatch {
            role: RoleType::Snapshot,
            ..
        }
    ));

    set.update_snapshot(
        &to_bytes(&signed(snapshot_md(2, &[("targets", 1)]), &[&key])),
        false,
    )
    .unwrap();
}

#[test]
fn snapshot_must_keep_listing_known_roles() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key])))
        .unwrap();
    set.update_snapshot(
        &to_bytes(&signed(
            snapshot_md(1, &[("targets", 2), ("project", 1)]),
            &[&key],
        )),
        false,
    )
    .unwrap();
    set.update_timestamp(&to_bytes(&signed(timestamp_md(2, 2), &[&key])))
        .unwrap();

    // The role "project" disappeared.
    let err = set
        .update_snapshot(
            &to_bytes(&signed(snapshot_md(2, &[("targets", 2)]), &[&key])),
            false,
        )
        .unwrap_err();
    assert!(matches!(err, Error::MetaMissing { .. }));

    // "targets" rolled back from 2 to 1.
    let err = set
        .update_snapshot(
            &to_bytes(&signed(
                snapshot_md(2, &[("targets", 1), ("project", 1)]),
                &[&key],
            )),
            false,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::OlderMetadata {
            role: RoleType::Targets,
            ..
        }
    ));

    // Both still listed, versions did not move backward.
    set.update_snapshot(
        &to_bytes(&signed(
            snapshot_md(2, &[("targets", 2), ("project", 1)]),
            &[&key],
        )),
        false,
    )
    .unwrap();
}

#[test]
fn root_rotation_requires_both_thresholds() {
    let old_key = TestKey::generate();
    let new_key = TestKey::generate();
    let root2 = root_md(2, false, &[&new_key], &[&new_key], &[&new_key], &[&new_key]);

    // Signed only by the new key: the trusted chain does not admit it.
    let mut set = new_set(&old_key);
    let err = set
        .update_root(&to_bytes(&signed(root2.clone(), &[&new_key])))
        .unwrap_err();
    assert!(matches!(err, Error::VerifyMetadata { role: RoleType::Root, .. }));
    assert_eq!(set.root().signed.version, nz(1));

    // Signed only by the old key: the new root does not admit itself.
    let err = set
        .update_root(&to_bytes(&signed(root2.clone(), &[&old_key])))
        .unwrap_err();
    assert!(matches!(err, Error::VerifyMetadata { role: RoleType::Root, .. }));

    // Signed by both: accepted.
    set.update_root(&to_bytes(&signed(root2, &[&old_key, &new_key])))
        .unwrap();
    assert_eq!(set.root().signed.version, nz(2));
}

#[test]
fn root_version_must_be_the_next_one() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    let err = set
        .update_root(&to_bytes(&signed(simple_root(3, &key, false), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VersionMismatch {
            role: RoleType::Root,
            ..
        }
    ));

    let err = set
        .update_root(&to_bytes(&signed(simple_root(1, &key, false), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VersionMismatch {
            role: RoleType::Root,
            ..
        }
    ));

    set.update_root(&to_bytes(&signed(simple_root(2, &key, false), &[&key])))
        .unwrap();
    assert_eq!(set.root().signed.version, nz(2));
}

#[test]
fn root_cannot_rotate_after_snapshot_is_loaded() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key])))
        .unwrap();
    set.update_snapshot(
        &to_bytes(&signed(snapshot_md(1, &[("targets", 1)]), &[&key])),
        false,
    )
    .unwrap();

    let err = set
        .update_root(&to_bytes(&signed(simple_root(2, &key, false), &[&key])))
        .unwrap_err();
    assert!(matches!(err, Error::RootUpdateAfterSnapshot));
}

#[test]
fn expired_timestamp_is_rejected() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    let mut timestamp = timestamp_md(1, 1);
    timestamp.expires = earlier();
    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp, &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ExpiredMetadata {
            role: RoleType::Timestamp,
        }
    ));
    assert!(set.timestamp().is_none());
}

#[test]
fn expired_root_blocks_timestamp_updates() {
    let key = TestKey::generate();
    let mut root = simple_root(1, &key, false);
    root.expires = earlier();
    // An expired root can still be loaded; rotation is how a client recovers.
    let mut set = TrustedSet::new(&to_bytes(&signed(root, &[&key])), reference_time()).unwrap();

    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ExpiredMetadata {
            role: RoleType::Root,
        }
    ));
}

#[test]
fn threshold_counts_distinct_keys_only() {
    let key_a = TestKey::generate();
    let key_b = TestKey::generate();
    let mut root = root_md(1, false, &[&key_a], &[&key_a, &key_b], &[&key_a], &[&key_a]);
    root.roles
        .insert(RoleType::Timestamp, role_keys(&[&key_a, &key_b], 2));
    let root = signed(root, &[&key_a]);
    let mut set = TrustedSet::new(&to_bytes(&root), reference_time()).unwrap();

    // One signature cannot meet a threshold of two.
    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key_a])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VerifyMetadata {
            role: RoleType::Timestamp,
            ..
        }
    ));

    // Neither can the same key twice.
    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key_a, &key_a])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VerifyMetadata {
            role: RoleType::Timestamp,
            ..
        }
    ));

    set.update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key_a, &key_b])))
        .unwrap();
}

#[test]
fn role_key_missing_from_key_map_is_an_error() {
    let key = TestKey::generate();
    let stranger = TestKey::generate();
    let mut root = simple_root(1, &key, false);
    // The timestamp role lists a key ID that the key map does not carry.
    root.roles
        .insert(RoleType::Timestamp, role_keys(&[&stranger], 1));
    let root = signed(root, &[&key]);
    let mut set = TrustedSet::new(&to_bytes(&root), reference_time()).unwrap();

    let err = set
        .update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&stranger])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VerifyMetadata {
            role: RoleType::Timestamp,
            ..
        }
    ));
}

#[test]
fn snapshot_length_and_hashes_are_checked_for_remote_bytes() {
    let key = TestKey::generate();

    let snapshot_bytes = to_bytes(&signed(snapshot_md(1, &[("targets", 1)]), &[&key]));

    // Timestamp declares a wrong length.
    let mut set = new_set(&key);
    let mut timestamp = timestamp_md(1, 1);
    timestamp.meta.insert(
        "snapshot.json".into(),
        TimestampMeta {
            length: Some(snapshot_bytes.len() as u64 + 1),
            hashes: Some(hashes_for(&snapshot_bytes)),
            version: nz(1),
            _extra: Default::default(),
        },
    );
    set.update_timestamp(&to_bytes(&signed(timestamp, &[&key])))
        .unwrap();
    let err = set.update_snapshot(&snapshot_bytes, false).unwrap_err();
    assert!(matches!(err, Error::LengthMismatch { .. }));
    // Bytes from this client's own datastore skip the length and hash checks.
    set.update_snapshot(&snapshot_bytes, true).unwrap();

    // Timestamp declares a wrong hash.
    let mut set = new_set(&key);
    let mut timestamp = timestamp_md(1, 1);
    timestamp.meta.insert(
        "snapshot.json".into(),
        TimestampMeta {
            length: Some(snapshot_bytes.len() as u64),
            hashes: Some(hashes_for(b"something else entirely")),
            version: nz(1),
            _extra: Default::default(),
        },
    );
    set.update_timestamp(&to_bytes(&signed(timestamp, &[&key])))
        .unwrap();
    let err = set.update_snapshot(&snapshot_bytes, false).unwrap_err();
    assert!(matches!(err, Error::HashMismatch { .. }));
}

#[test]
fn update_operations_require_their_predecessors() {
    let key = TestKey::generate();

    let mut set = new_set(&key);
    let err = set
        .update_snapshot(
            &to_bytes(&signed(snapshot_md(1, &[("targets", 1)]), &[&key])),
            false,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingTrustedRole {
            role: RoleType::Timestamp,
        }
    ));

    let err = set
        .update_targets(&to_bytes(&signed(targets_md(1), &[&key])))
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingTrustedRole {
            role: RoleType::Snapshot,
        }
    ));
}

#[test]
fn delegated_targets_verify_against_their_parent() {
    let key = TestKey::generate();
    let delegate_key = TestKey::generate();
    let stranger = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key])))
        .unwrap();
    set.update_snapshot(
        &to_bytes(&signed(
            snapshot_md(1, &[("targets", 1), ("project", 1)]),
            &[&key],
        )),
        false,
    )
    .unwrap();

    // Delegated metadata cannot load before its parent.
    let project = signed(targets_md(1), &[&delegate_key]);
    let err = set
        .update_delegated_targets(&to_bytes(&project), "project", "targets")
        .unwrap_err();
    assert!(matches!(
        err,
        Error::MissingTrustedRole {
            role: RoleType::Targets,
        }
    ));

    let mut top = targets_md(1);
    top.delegations = Some(delegations(
        &[&delegate_key],
        vec![delegated_role("project", &[&delegate_key], &["proj/*"], false)],
    ));
    set.update_targets(&to_bytes(&signed(top, &[&key]))).unwrap();

    // Signed by a key the delegation does not list.
    let err = set
        .update_delegated_targets(
            &to_bytes(&signed(targets_md(1), &[&stranger])),
            "project",
            "targets",
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VerifyMetadata {
            role: RoleType::Targets,
            ..
        }
    ));

    // A role the snapshot does not list cannot be loaded at all.
    let err = set
        .update_delegated_targets(
            &to_bytes(&signed(targets_md(1), &[&delegate_key])),
            "other",
            "targets",
        )
        .unwrap_err();
    assert!(matches!(err, Error::MetaMissing { .. }));

    // The version must be exactly what the snapshot declares.
    let err = set
        .update_delegated_targets(
            &to_bytes(&signed(targets_md(2), &[&delegate_key])),
            "project",
            "targets",
        )
        .unwrap_err();
    assert!(matches!(
        err,
        Error::VersionMismatch {
            role: RoleType::Targets,
            ..
        }
    ));

    set.update_delegated_targets(&to_bytes(&project), "project", "targets")
        .unwrap();
    assert!(set.targets("project").is_some());
}

#[test]
fn new_snapshot_drops_cached_targets() {
    let key = TestKey::generate();
    let mut set = new_set(&key);

    set.update_timestamp(&to_bytes(&signed(timestamp_md(1, 1), &[&key])))
        .unwrap();
    set.update_snapshot(
        &to_bytes(&signed(snapshot_md(1, &[("targets", 1)]), &[&key])),
        false,
    )
    .unwrap();
    set.update_targets(&to_bytes(&signed(targets_md(1), &[&key])))
        .unwrap();
    assert!(set.top_targets().is_some());

    set.update_timestamp(&to_bytes(&signed(timestamp_md(2, 2), &[&key])))
        .unwrap();
    set.update_snapshot(
        &to_bytes(&signed(snapshot_md(2, &[("targets", 1)]), &[&key])),
        false,
    )
    .unwrap();
    // Targets metadata must be re-validated against the new snapshot.
    assert!(set.top_targets().is_none());
}

#[test]
fn unsupported_spec_version_fails_to_parse() {
    let key = TestKey::generate();
    let mut root = simple_root(1, &key, false);
    root.spec_version = "2.0.0".into();
    let err = TrustedSet::new(&to_bytes(&signed(root, &[&key])), reference_time()).unwrap_err();
    assert!(matches!(err, Error::ParseTrustedMetadata { .. }));
}
