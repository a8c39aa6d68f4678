// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview handles: temporary references a host uses to display a blob.
//
// A handle is not `Clone`, and `release` takes it by value, so a handle can
// only ever be released once. The store counts allocations and releases so
// leaks show up in tests.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

/// Owned reference to a previewable blob. Must be returned to the
/// [`PreviewStore`] it came from.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PreviewHandle {
    id: u64,
}

impl PreviewHandle {
    /// Stable key a host can use to look the blob up (e.g. in a URL).
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Default)]
pub struct PreviewStore {
    next_id: u64,
    live: HashMap<u64, Arc<[u8]>>,
    created: u64,
    released: u64,
}

impl PreviewStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, bytes: Arc<[u8]>) -> PreviewHandle {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, bytes);
        self.created += 1;
        debug!(preview = id, "preview allocated");
        PreviewHandle { id }
    }

    /// Returns false if the handle belonged to a different store.
    pub fn release(&mut self, handle: PreviewHandle) -> bool {
        let known = self.live.remove(&handle.id).is_some();
        if known {
            self.released += 1;
            debug!(preview = handle.id, "preview released");
        }
        known
    }

    pub fn get(&self, handle: &PreviewHandle) -> Option<Arc<[u8]>> {
        self.live.get(&handle.id).cloned()
    }

    /// Lookup by raw id, for hosts that only kept the key.
    pub fn get_by_id(&self, id: u64) -> Option<Arc<[u8]>> {
        self.live.get(&id).cloned()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn created_count(&self) -> u64 {
        self.created
    }

    pub fn released_count(&self) -> u64 {
        self.released
    }
}

/// Release an optional handle in place, leaving `None`.
pub(crate) fn release_slot(previews: &mut PreviewStore, slot: &mut Option<PreviewHandle>) -> bool {
    slot.take().is_some_and(|handle| previews.release(handle))
}
