// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Guest records, deduplicated by email at booking-creation time.

use crate::base::GuestId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Caller-supplied guest details on a booking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestInfo {
    pub name: String,
    /// Optional, but required for the downstream notifier to reach the guest.
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub vip: bool,
    pub notes: Option<String>,
}

/// A stored guest. Immutable once created; later bookings with the same
/// email reuse the record as-is rather than overwriting it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub id: GuestId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub vip: bool,
    pub notes: Option<String>,
}

/// Case-insensitive email normalization used as the dedup key.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Concurrent guest store with find-or-create semantics.
///
/// The email index uses the entry API for an atomic check-and-insert, so two
/// concurrent bookings for one new email produce exactly one guest. Guests
/// without an email are never deduplicated.
#[derive(Debug, Default)]
pub(crate) struct GuestDirectory {
    guests: DashMap<GuestId, Guest>,
    by_email: DashMap<String, GuestId>,
    next_id: AtomicU64,
}

impl GuestDirectory {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the existing guest for the email, or stores a new one.
    pub(crate) fn find_or_create(&self, info: GuestInfo) -> Guest {
        let Some(email) = info.email.as_deref().filter(|e| !e.trim().is_empty()) else {
            return self.store(info);
        };

        match self.by_email.entry(normalize_email(email)) {
            Entry::Occupied(entry) => {
                // The id was published only after the guest record landed,
                // so the lookup cannot miss.
                self.guests.get(entry.get()).map(|g| g.clone()).unwrap()
            }
            Entry::Vacant(entry) => {
                let guest = self.store(info);
                entry.insert(guest.id);
                guest
            }
        }
    }

    pub(crate) fn get(&self, id: GuestId) -> Option<Guest> {
        self.guests.get(&id).map(|g| g.clone())
    }

    pub(crate) fn len(&self) -> usize {
        self.guests.len()
    }

    fn store(&self, info: GuestInfo) -> Guest {
        let id = GuestId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let guest = Guest {
            id,
            name: info.name,
            email: info.email.map(|e| e.trim().to_string()),
            phone: info.phone,
            vip: info.vip,
            notes: info.notes,
        };
        self.guests.insert(id, guest.clone());
        guest
    }
}
