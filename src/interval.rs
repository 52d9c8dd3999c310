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

//! Per-room interval store.
//!
//! An [`IntervalSet`] holds the date ranges currently committed by active
//! bookings on one room. It is a pure data structure with no I/O and no
//! locking of its own; the owning room's mutex serializes every
//! read-then-write sequence on it.

use crate::base::{BookingId, DateRange};
use serde::Serialize;

/// One active booking's claim on a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Claim {
    pub booking: BookingId,
    pub range: DateRange,
}

/// The set of date-range claims on a single room.
///
/// # Invariant
///
/// Claims are pairwise disjoint under the half-open overlap test. The only
/// mutating entry point, [`IntervalSet::try_claim`], refuses any insert
/// that would violate this.
///
/// Per-room claim counts stay small (a season of bookings at most), so a
/// linear scan beats anything clever here.
#[derive(Debug, Default)]
pub struct IntervalSet {
    claims: Vec<Claim>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self { claims: Vec::new() }
    }

    /// Inserts a claim iff it overlaps no existing claim.
    ///
    /// # Errors
    ///
    /// Returns the conflicting claim on overlap; the set is unchanged.
    pub fn try_claim(&mut self, booking: BookingId, range: DateRange) -> Result<(), Claim> {
        if let Some(conflict) = self.conflict(&range) {
            return Err(*conflict);
        }
        self.claims.push(Claim { booking, range });
        Ok(())
    }

    /// First claim overlapping `range`, if any.
    pub fn conflict(&self, range: &DateRange) -> Option<&Claim> {
        self.claims.iter().find(|c| c.range.overlaps(range))
    }

    /// Whether any claim overlaps `range`.
    pub fn overlaps(&self, range: &DateRange) -> bool {
        self.conflict(range).is_some()
    }

    /// Removes the claim held by `booking`. Returns false if it held none.
    pub fn release(&mut self, booking: BookingId) -> bool {
        let before = self.claims.len();
        self.claims.retain(|c| c.booking != booking);
        before != self.claims.len()
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter()
    }
}
