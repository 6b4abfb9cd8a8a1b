/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tracing::trace;

use crate::message::{MessageAddress, NodeId};

/// Maps message addresses to the transport nodes they live on.
///
/// Every operation takes the single internal lock once, so bulk removals are atomic with
/// respect to concurrent lookups.
#[derive(Debug, Default)]
pub struct MessageAddressBook {
    entries: Mutex<HashMap<MessageAddress, NodeId>>,
}

impl MessageAddressBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `address` lives on `node`, replacing any previous node.
    pub fn add(&self, address: MessageAddress, node: NodeId) {
        trace!(%address, %node, "Address book entry added");
        self.entries.lock().insert(address, node);
    }

    #[must_use]
    pub fn contains(&self, address: MessageAddress) -> bool {
        self.entries.lock().contains_key(&address)
    }

    /// The node `address` lives on, if known.
    #[must_use]
    pub fn node_for(&self, address: MessageAddress) -> Option<NodeId> {
        self.entries.lock().get(&address).copied()
    }

    /// The distinct nodes hosting any of `addresses`. Unknown addresses are skipped.
    #[must_use]
    pub fn nodes_for(&self, addresses: &[MessageAddress]) -> HashSet<NodeId> {
        let entries = self.entries.lock();
        addresses
            .iter()
            .filter_map(|address| entries.get(address).copied())
            .collect()
    }

    /// Every node with at least one known address.
    #[must_use]
    pub fn known_nodes(&self) -> HashSet<NodeId> {
        self.entries.lock().values().copied().collect()
    }

    /// Removes every address living on `node` and returns them.
    pub fn remove_node(&self, node: NodeId) -> Vec<MessageAddress> {
        let mut removed = Vec::new();
        self.entries.lock().retain(|address, entry_node| {
            if *entry_node == node {
                removed.push(*address);
                false
            } else {
                true
            }
        });
        trace!(%node, removed = removed.len(), "Address book node removed");
        removed
    }

    /// Removes every entry and returns the addresses that were known.
    pub fn remove_all_nodes(&self) -> Vec<MessageAddress> {
        self.entries.lock().drain().map(|(address, _)| address).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
