// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides [`Decoded`], a wrapper around decoded bytes that remembers the
//! string it was decoded from. Keeping the original form means metadata
//! round-trips byte-for-byte, which signature verification requires.

use crate::schema::error::{self, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::ResultExt;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Deref;

/// A method of encoding bytes as a string.
pub trait Encode {
    /// Encode bytes as a string.
    fn encode(bytes: &[u8]) -> String;
}

/// A method of decoding a string into bytes.
pub trait Decode {
    /// Decode a string into bytes.
    fn decode(s: &str) -> Result<Vec<u8>>;
}

/// Lowercase hexadecimal encoding, used for key IDs, signatures, and digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hex;

impl Encode for Hex {
    fn encode(bytes: &[u8]) -> String {
        hex::encode(bytes)
    }
}

impl Decode for Hex {
    fn decode(s: &str) -> Result<Vec<u8>> {
        hex::decode(s).context(error::HexDecodeSnafu { value: s })
    }
}

/// Decoded bytes along with their original encoded form.
///
/// Equality, ordering, and hashing are all over the decoded bytes, so two
/// `Decoded<Hex>` values compare equal regardless of the case of the original
/// string.
pub struct Decoded<T> {
    bytes: Vec<u8>,
    original: String,
    spooky: PhantomData<T>,
}

impl<T> Decoded<T> {
    /// The decoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T: Encode> From<Vec<u8>> for Decoded<T> {
    fn from(bytes: Vec<u8>) -> Self {
        let original = T::encode(&bytes);
        Self {
            bytes,
            original,
            spooky: PhantomData,
        }
    }
}

impl<T: Decode> std::str::FromStr for Decoded<T> {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(Self {
            bytes: T::decode(s)?,
            original: s.to_owned(),
            spooky: PhantomData,
        })
    }
}

impl<T> Clone for Decoded<T> {
    fn clone(&self) -> Self {
        Self {
            bytes: self.bytes.clone(),
            original: self.original.clone(),
            spooky: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Decoded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.original, f)
    }
}

impl<T> fmt::Display for Decoded<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.original, f)
    }
}

impl<T> Deref for Decoded<T> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T> AsRef<[u8]> for Decoded<T> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<T> PartialEq for Decoded<T> {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl<T> PartialEq<[u8]> for Decoded<T> {
    fn eq(&self, other: &[u8]) -> bool {
        self.bytes == other
    }
}

impl<T> Eq for Decoded<T> {}

impl<T> Hash for Decoded<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl<T: Decode> TryFrom<&str> for Decoded<T> {
    type Error = error::Error;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl<'de, T: Decode> Deserialize<'de> for Decoded<T> {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error as _;
        let original = String::deserialize(deserializer)?;
        Ok(Self {
            bytes: T::decode(&original).map_err(D::Error::custom)?,
            original,
            spooky: PhantomData,
        })
    }
}

impl<T> Serialize for Decoded<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.original)
    }
}
