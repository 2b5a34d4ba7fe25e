// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Length-bounded fetching through a [`Transport`].
//!
//! Repositories are untrusted until their metadata is verified, so every download is capped: the
//! moment a transfer would exceed its limit it is abandoned. The limit for each file comes either
//! from already-trusted metadata or from [`crate::Limits`].

use crate::error::{self, Result};
use crate::transport::{Transport, TransportError, TransportErrorKind};
use aws_lc_rs::digest::{Context, SHA256};
use snafu::{ensure, ResultExt};
use std::io::Read;
use url::Url;

/// Fetches `url`, failing with [`crate::error::Error::MaxSizeExceeded`] the moment the transfer
/// exceeds `max_size` bytes. Receiving exactly `max_size` bytes is allowed. `specifier` names the
/// source of the limit for error messages.
pub(crate) fn fetch_max_size(
    transport: &dyn Transport,
    url: Url,
    max_size: u64,
    specifier: &'static str,
) -> Result<Vec<u8>> {
    let mut reader = transport
        .fetch(url.clone())
        .context(error::TransportSnafu { url: url.clone() })?;

    let mut data = Vec::new();
    let mut chunk = [0; 8 * 1024];
    loop {
        let n = reader
            .read(&mut chunk)
            .map_err(|e| TransportError::new(TransportErrorKind::Other, url.as_str(), e))
            .context(error::TransportSnafu { url: url.clone() })?;
        if n == 0 {
            break;
        }
        ensure!(
            data.len() as u64 + n as u64 <= max_size,
            error::MaxSizeExceededSnafu { max_size, specifier }
        );
        data.extend_from_slice(&chunk[..n]);
    }
    Ok(data)
}

/// Fetches `url` with the size limit `size`, then requires the SHA-256 digest of the received
/// bytes to equal `sha256`.
pub(crate) fn fetch_sha256(
    transport: &dyn Transport,
    url: Url,
    size: u64,
    specifier: &'static str,
    sha256: &[u8],
) -> Result<Vec<u8>> {
    let data = fetch_max_size(transport, url.clone(), size, specifier)?;
    let mut digest = Context::new(&SHA256);
    digest.update(&data);
    let calculated = digest.finish();
    ensure!(
        calculated.as_ref() == sha256,
        error::HashMismatchSnafu {
            context: url.to_string(),
            calculated: hex::encode(calculated.as_ref()),
            expected: hex::encode(sha256),
        }
    );
    Ok(data)
}
