// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides the `Sign` trait which abstracts over the method of signing with different key types.
//!
//! The client itself never signs anything; this exists for tooling and test suites that need to
//! produce signed metadata. Ed25519 is the only key type with a built-in signing implementation.

use crate::error::{self, Result};
use crate::schema::key::{Ed25519Key, Ed25519Scheme, Key};
use aws_lc_rs::rand::SecureRandom;
use aws_lc_rs::signature::{Ed25519KeyPair, KeyPair};
use std::collections::HashMap;

/// This trait must be implemented for each type of key with which you will sign things.
pub trait Sign: Send + Sync {
    /// Returns the decoded key along with its scheme and other metadata.
    fn tuf_key(&self) -> Key;

    /// Signs the supplied message.
    fn sign(&self, msg: &[u8], rng: &(dyn SecureRandom + Sync)) -> Result<Vec<u8>>;
}

impl<T: Sign> Sign for &'_ T {
    fn tuf_key(&self) -> Key {
        (*self).tuf_key()
    }

    fn sign(&self, msg: &[u8], rng: &(dyn SecureRandom + Sync)) -> Result<Vec<u8>> {
        (*self).sign(msg, rng)
    }
}

/// Implements the Sign trait for ED25519
impl Sign for Ed25519KeyPair {
    fn tuf_key(&self) -> Key {
        Key::Ed25519 {
            keyval: Ed25519Key {
                public: self.public_key().as_ref().to_vec().into(),
                _extra: HashMap::new(),
            },
            scheme: Ed25519Scheme::Ed25519,
            _extra: HashMap::new(),
        }
    }

    fn sign(&self, msg: &[u8], _rng: &(dyn SecureRandom + Sync)) -> Result<Vec<u8>> {
        let signature = self.sign(msg);
        Ok(signature.as_ref().to_vec())
    }
}

/// Keypair used for signing metadata.
#[derive(Debug)]
#[allow(clippy::upper_case_acronyms)]
pub enum SignKeyPair {
    /// ED25519 key pair
    ED25519(Ed25519KeyPair),
}

impl Sign for SignKeyPair {
    fn tuf_key(&self) -> Key {
        match self {
            SignKeyPair::ED25519(key) => key.tuf_key(),
        }
    }

    fn sign(&self, msg: &[u8], rng: &(dyn SecureRandom + Sync)) -> Result<Vec<u8>> {
        match self {
            SignKeyPair::ED25519(key) => (key as &dyn Sign).sign(msg, rng),
        }
    }
}

/// Parses a supplied keypair and if it is recognized, returns an object that implements the Sign
/// trait. Accepted keys: ED25519 pkcs8.
pub fn parse_keypair(key: &[u8]) -> Result<SignKeyPair> {
    if let Ok(ed25519_key_pair) = Ed25519KeyPair::from_pkcs8(key) {
        Ok(SignKeyPair::ED25519(ed25519_key_pair))
    } else {
        error::SignKeyUnrecognizedSnafu.fail()
    }
}
