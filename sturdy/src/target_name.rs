// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides [`TargetName`], a checked wrapper for the path-like names that identify target files.

use crate::error::{self, Result};
use snafu::OptionExt;
use std::fmt;
use std::hash::{Hash, Hasher};

/// The name of a target in a repository.
///
/// Target names are POSIX-style paths chosen by the repository, so they can contain `.` and `..`
/// segments. Metadata lookups use the name exactly as written (`raw`), but anything that touches
/// a filesystem or URL uses the `resolved` form, with dot segments eliminated. Names whose `..`
/// segments would climb out of the repository root are rejected outright.
#[derive(Debug, Clone)]
pub struct TargetName {
    raw: String,
    resolved: String,
}

impl TargetName {
    /// Creates a new `TargetName`, rejecting unsafe names.
    pub fn new<S: Into<String>>(raw: S) -> Result<Self> {
        let raw = raw.into();
        let resolved = resolve(&raw).context(error::UnsafeTargetNameSnafu { name: &raw })?;
        Ok(Self { raw, resolved })
    }

    /// The name exactly as it appears in targets metadata.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The name with `.` and `..` segments resolved away.
    pub fn resolved(&self) -> &str {
        &self.resolved
    }
}

/// Eliminates dot segments. Returns `None` for names that escape the repository root or resolve
/// to nothing.
fn resolve(raw: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

// Two names that resolve to the same path refer to the same file.
impl PartialEq for TargetName {
    fn eq(&self, other: &Self) -> bool {
        self.resolved == other.resolved
    }
}

impl Eq for TargetName {}

impl Hash for TargetName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.resolved.hash(state);
    }
}
