// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolves which targets role is authoritative for a target name.
//!
//! Delegations form a directed graph that the wire format does not promise is a tree, or even
//! acyclic. The search below is a preorder depth-first walk over that graph: first match wins,
//! already-visited roles are skipped, and the total number of roles visited is capped by
//! [`crate::Limits::max_delegations`]. A terminating delegation that matches the sought name cuts
//! off every role that was still queued, so an answer can only come from the terminating role's
//! subtree.

use crate::error::{self, Result};
use crate::schema::{Delegations, RoleType, Signed, Target, Targets};
use crate::target_name::TargetName;
use crate::Updater;
use log::debug;
use snafu::OptionExt;
use std::collections::HashSet;

impl Updater {
    /// Searches the delegation graph for the most-trusted description of `name`, loading
    /// delegated targets metadata lazily as roles are visited.
    pub(crate) fn preorder_find(&mut self, name: &TargetName) -> Result<Option<Target>> {
        let mut to_visit: Vec<(String, String)> = vec![("targets".to_owned(), "root".to_owned())];
        let mut visited: HashSet<String> = HashSet::new();

        while let Some((role, parent)) = to_visit.pop() {
            if visited.len() as u64 >= self.limits.max_delegations {
                debug!(
                    "stopping target search for '{}': visited {} roles",
                    name,
                    visited.len()
                );
                break;
            }
            if visited.contains(&role) {
                continue;
            }

            let (found, children) = {
                let targets = self.load_targets_role(&role, &parent)?;
                let found = targets.signed.target(name.raw()).cloned();
                let children = targets
                    .signed
                    .delegations
                    .as_ref()
                    .map(|delegations| matching_children(delegations, name.raw()));
                (found, children)
            };

            if let Some(target) = found {
                return Ok(Some(target));
            }
            visited.insert(role.clone());

            if let Some((child_names, saw_terminating)) = children {
                if saw_terminating {
                    // Everything still queued is less trusted than the terminating role's
                    // subtree and must not be consulted.
                    to_visit.clear();
                }
                // Push in reverse so the next role popped is the first one declared.
                for child in child_names.iter().rev() {
                    to_visit.push((child.clone(), role.clone()));
                }
            }
        }

        Ok(None)
    }

    /// Returns the trusted targets metadata for `role`, loading and verifying it first if
    /// necessary (from the datastore when possible, otherwise from the repository).
    pub(crate) fn load_targets_role(&mut self, role: &str, parent: &str) -> Result<&Signed<Targets>> {
        let needs_load = match &self.trusted {
            Some(trusted) => trusted.targets(role).is_none(),
            None => true,
        };
        if needs_load {
            self.fetch_targets_role(role, parent)?;
        }
        self.trusted
            .as_ref()
            .and_then(|trusted| trusted.targets(role))
            .context(error::MissingTrustedRoleSnafu {
                role: RoleType::Targets,
            })
    }
}

/// The names of the delegated roles that match `target_path`, in the order the parent declared
/// them, cut off after (and including) the first terminating match. The boolean reports whether a
/// terminating match was seen.
fn matching_children(delegations: &Delegations, target_path: &str) -> (Vec<String>, bool) {
    let mut names = Vec::new();
    for role in &delegations.roles {
        if role.matches(target_path) {
            names.push(role.name.clone());
            if role.terminating {
                return (names, true);
            }
        }
    }
    (names, false)
}
