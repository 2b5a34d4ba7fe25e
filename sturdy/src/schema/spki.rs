// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracts the raw public key from a PEM-encoded SubjectPublicKeyInfo
//! document. RSA and ECDSA keys are carried on the wire in this form; the
//! verifier wants the inner key material.

use crate::schema::error::{self, Error, Result};
use pkcs8::spki::SubjectPublicKeyInfoRef;
use snafu::ResultExt;

pub(super) fn public_key_bytes(pem_text: &str) -> Result<Vec<u8>> {
    let block = pem::parse(pem_text).context(error::PemDecodeSnafu)?;
    let spki = SubjectPublicKeyInfoRef::try_from(block.contents()).map_err(|e| {
        Error::SpkiDecode {
            message: e.to_string(),
        }
    })?;
    Ok(spki.subject_public_key.raw_bytes().to_vec())
}
