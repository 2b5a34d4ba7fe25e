// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides the TUF key types and signature verification over them.

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::error::{self, Result};
use crate::schema::spki;
use aws_lc_rs::digest::{digest, SHA256};
use aws_lc_rs::signature::{self, UnparsedPublicKey};
use olpc_cjson::CanonicalFormatter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::ResultExt;
use std::collections::HashMap;

/// A public key available to verify role signatures.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "keytype")]
pub enum Key {
    /// An Ed25519 key.
    #[serde(rename = "ed25519")]
    Ed25519 {
        /// The Ed25519 key.
        keyval: Ed25519Key,
        /// Denotes the key's signature scheme.
        scheme: Ed25519Scheme,
        /// Extra arguments found during deserialization.
        ///
        /// We must store these to correctly verify signatures for this object.
        ///
        /// If you're instantiating this struct, you should make this `HashMap::empty()`.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
    /// An RSA key.
    #[serde(rename = "rsa")]
    Rsa {
        /// The RSA key.
        keyval: RsaKey,
        /// Denotes the key's signature scheme.
        scheme: RsaScheme,
        /// Extra arguments found during deserialization.
        ///
        /// We must store these to correctly verify signatures for this object.
        ///
        /// If you're instantiating this struct, you should make this `HashMap::empty()`.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
    /// An ECDSA key.
    #[serde(rename = "ecdsa-sha2-nistp256")]
    Ecdsa {
        /// The ECDSA key.
        keyval: EcdsaKey,
        /// Denotes the key's signature scheme.
        scheme: EcdsaScheme,
        /// Extra arguments found during deserialization.
        ///
        /// We must store these to correctly verify signatures for this object.
        ///
        /// If you're instantiating this struct, you should make this `HashMap::empty()`.
        #[serde(flatten)]
        _extra: HashMap<String, Value>,
    },
}

/// An Ed25519 public key, hex-encoded on the wire.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Ed25519Key {
    /// The public key.
    pub public: Decoded<Hex>,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// The Ed25519 signature scheme.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum Ed25519Scheme {
    /// `ed25519`: Ed25519 per its reference definition.
    #[serde(rename = "ed25519")]
    Ed25519,
}

/// An RSA public key, as a PEM-encoded SubjectPublicKeyInfo document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RsaKey {
    /// The public key.
    pub public: String,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// The RSA signature scheme supported by this client.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum RsaScheme {
    /// `rsassa-pss-sha256`: RSASSA-PSS calculated over SHA-256.
    #[serde(rename = "rsassa-pss-sha256")]
    RsassaPssSha256,
}

/// An ECDSA public key, as a PEM-encoded SubjectPublicKeyInfo document.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EcdsaKey {
    /// The public key.
    pub public: String,

    /// Extra arguments found during deserialization.
    ///
    /// We must store these to correctly verify signatures for this object.
    ///
    /// If you're instantiating this struct, you should make this `HashMap::empty()`.
    #[serde(flatten)]
    pub _extra: HashMap<String, Value>,
}

/// The ECDSA signature scheme supported by this client.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub enum EcdsaScheme {
    /// `ecdsa-sha2-nistp256`: ECDSA on the NIST P-256 curve over SHA-256.
    #[serde(rename = "ecdsa-sha2-nistp256")]
    EcdsaSha2Nistp256,
}

impl Key {
    /// Calculate the key ID for this key: the SHA-256 digest of the key's
    /// canonical JSON form, hex-encoded.
    pub fn key_id(&self) -> Result<Decoded<Hex>> {
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter::new());
        self.serialize(&mut ser)
            .context(error::JsonSerializationSnafu { what: "key" })?;
        Ok(Decoded::from(digest(&SHA256, &buf).as_ref().to_vec()))
    }

    /// Verify a signature made by this key over `msg`. A key that cannot be
    /// decoded never verifies anything.
    pub fn verify(&self, msg: &[u8], signature: &[u8]) -> bool {
        match self {
            Key::Ed25519 {
                keyval,
                scheme: Ed25519Scheme::Ed25519,
                ..
            } => UnparsedPublicKey::new(&signature::ED25519, keyval.public.bytes())
                .verify(msg, signature)
                .is_ok(),
            Key::Rsa {
                keyval,
                scheme: RsaScheme::RsassaPssSha256,
                ..
            } => match spki::public_key_bytes(&keyval.public) {
                Ok(der) => {
                    UnparsedPublicKey::new(&signature::RSA_PSS_2048_8192_SHA256, &der)
                        .verify(msg, signature)
                        .is_ok()
                }
                Err(_) => false,
            },
            Key::Ecdsa {
                keyval,
                scheme: EcdsaScheme::EcdsaSha2Nistp256,
                ..
            } => match spki::public_key_bytes(&keyval.public) {
                Ok(point) => {
                    UnparsedPublicKey::new(&signature::ECDSA_P256_SHA256_ASN1, &point)
                        .verify(msg, signature)
                        .is_ok()
                }
                Err(_) => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Key;

    #[test]
    fn parse_ed25519_key() {
        let key: Key = serde_json::from_str(
            r#"{
                "keytype": "ed25519",
                "scheme": "ed25519",
                "keyval": {
                    "public": "edcd0a32a07dce33f7c7873aaffbff36d20ea30787574ead335eefd337e4dacd"
                }
            }"#,
        )
        .unwrap();
        assert!(matches!(key, Key::Ed25519 { .. }));
        // Key IDs are deterministic over the canonical form.
        assert_eq!(key.key_id().unwrap(), key.key_id().unwrap());
    }

    #[test]
    fn unknown_keytype_is_rejected() {
        assert!(serde_json::from_str::<Key>(
            r#"{"keytype": "dsa", "scheme": "dsa", "keyval": {"public": ""}}"#
        )
        .is_err());
    }
}
