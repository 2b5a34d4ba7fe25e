// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::error::{self, Result};
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use snafu::{ensure, ResultExt};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// `Datastore` persists trusted metadata files in a local directory.
///
/// Writes go through a temporary file in the same directory followed by a rename, so a reader
/// (including a later run of this client) never observes a partially written file.
#[derive(Debug, Clone)]
pub(crate) struct Datastore {
    path: PathBuf,
}

impl Datastore {
    pub(crate) fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    /// The directory this datastore lives in.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Get a reader to a file in the datastore, if the file exists.
    pub(crate) fn reader(&self, file: &str) -> Result<Option<impl Read>> {
        let path = self.path.join(file);
        match File::open(&path) {
            Ok(file) => Ok(Some(file)),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(None),
                _ => Err(err).context(error::DatastoreOpenSnafu { path: &path }),
            },
        }
    }

    /// Read an entire file from the datastore, if the file exists.
    pub(crate) fn bytes(&self, file: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path.join(file);
        match self.reader(file)? {
            None => Ok(None),
            Some(mut reader) => {
                let mut data = Vec::new();
                reader
                    .read_to_end(&mut data)
                    .context(error::DatastoreReadSnafu { path })?;
                Ok(Some(data))
            }
        }
    }

    /// Writes a JSON metadata file into the datastore atomically.
    pub(crate) fn create<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path.join(file);
        let mut temp = NamedTempFile::new_in(&self.path)
            .context(error::DatastoreCreateSnafu { path: &path })?;
        serde_json::to_writer_pretty(&mut temp, value).context(error::DatastoreSerializeSnafu {
            what: format!("{file} in datastore"),
            path: &path,
        })?;
        temp.flush()
            .context(error::DatastoreCreateSnafu { path: &path })?;
        temp.persist(&path)
            .context(error::DatastorePersistSnafu { path })?;
        Ok(())
    }

    /// Deletes a file from the datastore. Deleting a file that does not exist is not an error.
    pub(crate) fn remove(&self, file: &str) -> Result<()> {
        let path = self.path.join(file);
        debug!("removing '{}'", path.display());
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) => match err.kind() {
                ErrorKind::NotFound => Ok(()),
                _ => Err(err).context(error::DatastoreRemoveSnafu { path: &path }),
            },
        }
    }

    /// Samples the system clock, ensuring it has not stepped backward since the last sample this
    /// datastore has seen. A clock that moves backward would quietly revive expired metadata.
    pub(crate) fn system_time(&self) -> Result<DateTime<Utc>> {
        let file = "latest_known_time.json";
        // Load the latest known system time, if it exists
        let poss_latest_known_time = self
            .reader(file)?
            .map(serde_json::from_reader::<_, DateTime<Utc>>);

        // Get 'current' system time
        let sys_time = Utc::now();

        if let Some(Ok(latest_known_time)) = poss_latest_known_time {
            // Make sure the sampled system time did not go back in time
            ensure!(
                sys_time >= latest_known_time,
                error::SystemTimeSteppedBackwardSnafu {
                    sys_time,
                    latest_known_time
                }
            );
        }
        // Serializes RFC3339 time string and stores to datastore
        self.create(file, &sys_time)?;

        Ok(sys_time)
    }
}
