// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Threshold signature verification for signed metadata.

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::error::{self, Result};
use crate::schema::key::Key;
use crate::schema::{Delegations, Role, Root, Signed, Targets};
use serde::Serialize;
use snafu::{ensure, OptionExt};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroU64;

impl Root {
    /// Verifies that a signed metadata object carries at least the threshold of valid signatures
    /// this root requires for the object's role.
    pub fn verify_role<T: Role + Serialize>(&self, role: &Signed<T>) -> Result<()> {
        let role_keys = self
            .roles
            .get(&T::TYPE)
            .context(error::RoleMissingSnafu { role: T::TYPE })?;
        verify_signatures(
            &T::TYPE.to_string(),
            &self.keys,
            &role_keys.keyids,
            role_keys.threshold,
            role,
        )
    }
}

impl Targets {
    /// Verifies that a signed targets object carries at least the threshold of valid signatures
    /// required by the role this object delegates to under `name`. Fails if this object does not
    /// delegate at all.
    pub fn verify_delegated_role(&self, role: &Signed<Targets>, name: &str) -> Result<()> {
        let delegations = self
            .delegations
            .as_ref()
            .context(error::DelegatedRoleMissingSnafu { name })?;
        delegations.verify_role(role, name)
    }
}

impl Delegations {
    /// Verifies that a signed targets object carries at least the threshold of valid signatures
    /// required by the named delegated role.
    pub fn verify_role(&self, role: &Signed<Targets>, name: &str) -> Result<()> {
        let delegated = self
            .role(name)
            .context(error::DelegatedRoleMissingSnafu { name })?;
        verify_signatures(name, &self.keys, &delegated.keyids, delegated.threshold, role)
    }
}

/// Counts the distinct role keys whose signature over the canonical form of `role.signed`
/// verifies, and requires at least `threshold` of them.
///
/// A key listed for the role but absent from the key map is an error; an individual signature
/// that fails to verify, or a listed key with no signature present, only fails to count.
fn verify_signatures<T: Role + Serialize>(
    role_name: &str,
    keys: &HashMap<Decoded<Hex>, Key>,
    keyids: &[Decoded<Hex>],
    threshold: NonZeroU64,
    role: &Signed<T>,
) -> Result<()> {
    let data = role.signed.canonical_form()?;
    let mut valid: HashSet<&Decoded<Hex>> = HashSet::new();
    let mut seen: HashSet<&Decoded<Hex>> = HashSet::new();
    for keyid in keyids {
        ensure!(
            seen.insert(keyid),
            error::DuplicateRoleKeyIdSnafu {
                keyid: hex::encode(keyid),
                role: role_name,
            }
        );
        let key = keys.get(keyid).context(error::KeyNotFoundSnafu {
            keyid: hex::encode(keyid),
            role: role_name,
        })?;
        if let Some(signature) = role.signatures.iter().find(|sig| &sig.keyid == keyid) {
            if key.verify(&data, &signature.sig) {
                valid.insert(keyid);
            }
        }
    }
    ensure!(
        valid.len() as u64 >= threshold.get(),
        error::SignatureThresholdSnafu {
            role: role_name,
            valid: valid.len() as u64,
            threshold,
        }
    );
    Ok(())
}
