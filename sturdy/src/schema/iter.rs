// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::schema::decoded::{Decoded, Hex};
use crate::schema::key::Key;
use std::collections::HashMap;

/// An iterator over the keys listed for a role, resolved through a key map.
/// Key IDs without a matching key are skipped.
pub(super) struct KeysIter<'a> {
    pub(super) keyids_iter: std::slice::Iter<'a, Decoded<Hex>>,
    pub(super) keys: &'a HashMap<Decoded<Hex>, Key>,
}

impl<'a> Iterator for KeysIter<'a> {
    type Item = &'a Key;

    fn next(&mut self) -> Option<Self::Item> {
        self.keyids_iter
            .by_ref()
            .find_map(|keyid| self.keys.get(keyid))
    }
}
