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

//! Booking records and the lifecycle state machine.
//!
//! Implemented State Machine
//!
//  Confirmed ──check-in──► CheckedIn ──check-out──► CheckedOut (terminal)
//      │
//      └──cancel──► Cancelled (terminal)
//!
//! Bookings are created Confirmed, mutated only through these transitions,
//! and never deleted; cancellation is a status change that preserves history.

use crate::base::{BookingId, DateRange, GuestId, RoomId};
use crate::error::EngineError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
    CheckedIn,
    CheckedOut,
    Cancelled,
}

impl BookingStatus {
    /// Whether the defined machine draws an edge from `self` to `to`.
    pub fn can_transition(self, to: BookingStatus) -> bool {
        matches!(
            (self, to),
            (BookingStatus::Confirmed, BookingStatus::CheckedIn)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
                | (BookingStatus::CheckedIn, BookingStatus::CheckedOut)
        )
    }

    /// Active bookings claim a room interval.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Confirmed | BookingStatus::CheckedIn)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::CheckedOut | BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::CheckedIn => "CheckedIn",
            BookingStatus::CheckedOut => "CheckedOut",
            BookingStatus::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Channel the booking arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingSource {
    Direct,
    Phone,
    Online,
    Agent,
    WalkIn,
}

impl Default for BookingSource {
    fn default() -> Self {
        BookingSource::Direct
    }
}

/// Occupant counts, validated against the room's capacity at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupancy {
    pub adults: u32,
    pub children: u32,
}

impl Occupancy {
    pub fn total(&self) -> u32 {
        self.adults + self.children
    }
}

impl Default for Occupancy {
    fn default() -> Self {
        Occupancy {
            adults: 1,
            children: 0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct BookingData {
    id: BookingId,
    guest: GuestId,
    room: RoomId,
    room_number: String,
    range: DateRange,
    status: BookingStatus,
    /// Room charge before tax (nightly rate x nights).
    base_amount: Decimal,
    /// Grand total including tax; the folio's fixed total.
    total_amount: Decimal,
    occupancy: Occupancy,
    source: BookingSource,
    created_at: DateTime<Utc>,
    checked_in_at: Option<DateTime<Utc>>,
    checked_out_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
}

impl BookingData {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: BookingId,
        guest: GuestId,
        room: RoomId,
        room_number: String,
        range: DateRange,
        base_amount: Decimal,
        total_amount: Decimal,
        occupancy: Occupancy,
        source: BookingSource,
    ) -> Self {
        Self {
            id,
            guest,
            room,
            room_number,
            range,
            status: BookingStatus::Confirmed,
            base_amount,
            total_amount,
            occupancy,
            source,
            created_at: Utc::now(),
            checked_in_at: None,
            checked_out_at: None,
            cancelled_at: None,
        }
    }

    pub(crate) fn id(&self) -> BookingId {
        self.id
    }

    pub(crate) fn room(&self) -> RoomId {
        self.room
    }

    pub(crate) fn range(&self) -> DateRange {
        self.range
    }

    pub(crate) fn status(&self) -> BookingStatus {
        self.status
    }

    /// Moves the booking along a machine edge, stamping the actual
    /// transition time.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTransition`] for any edge the machine
    /// does not draw; state is never coerced.
    pub(crate) fn transition_to(
        &mut self,
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if !self.status.can_transition(to) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        match to {
            BookingStatus::CheckedIn => self.checked_in_at = Some(at),
            BookingStatus::CheckedOut => self.checked_out_at = Some(at),
            BookingStatus::Cancelled => self.cancelled_at = Some(at),
            BookingStatus::Confirmed => {}
        }
        Ok(())
    }

    pub(crate) fn snapshot(&self) -> BookingSnapshot {
        BookingSnapshot {
            id: self.id,
            guest: self.guest,
            room: self.room,
            room_number: self.room_number.clone(),
            check_in: self.range.check_in,
            check_out: self.range.check_out,
            nights: self.range.nights(),
            status: self.status,
            base_amount: self.base_amount,
            total_amount: self.total_amount,
            occupancy: self.occupancy,
            source: self.source,
            created_at: self.created_at,
            checked_in_at: self.checked_in_at,
            checked_out_at: self.checked_out_at,
            cancelled_at: self.cancelled_at,
        }
    }
}

/// A booking.
#[derive(Debug)]
pub struct Booking {
    /// Immutable identity, readable while the data mutex is held elsewhere.
    id: BookingId,
    inner: Mutex<BookingData>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: BookingId,
        guest: GuestId,
        room: RoomId,
        room_number: String,
        range: DateRange,
        base_amount: Decimal,
        total_amount: Decimal,
        occupancy: Occupancy,
        source: BookingSource,
    ) -> Self {
        Self {
            id,
            inner: Mutex::new(BookingData::new(
                id,
                guest,
                room,
                room_number,
                range,
                base_amount,
                total_amount,
                occupancy,
                source,
            )),
        }
    }

    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn status(&self) -> BookingStatus {
        self.inner.lock().status
    }

    pub fn range(&self) -> DateRange {
        self.inner.lock().range
    }

    pub fn total_amount(&self) -> Decimal {
        self.inner.lock().total_amount
    }

    pub fn snapshot(&self) -> BookingSnapshot {
        self.read().snapshot()
    }

    /// Acquires the booking lock within the bounded wait; transitions on one
    /// booking are serialized through this.
    ///
    /// # Errors
    ///
    /// Returns the retryable [`EngineError::Busy`] on timeout.
    pub(crate) fn lock_for(
        &self,
        wait: Duration,
    ) -> Result<MutexGuard<'_, BookingData>, EngineError> {
        self.inner.try_lock_for(wait).ok_or_else(|| EngineError::Busy {
            resource: format!("booking {}", self.id),
        })
    }

    pub(crate) fn read(&self) -> MutexGuard<'_, BookingData> {
        self.inner.lock()
    }
}

/// Owned copy of booking state returned by engine operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingSnapshot {
    pub id: BookingId,
    pub guest: GuestId,
    pub room: RoomId,
    pub room_number: String,
    pub check_in: chrono::NaiveDate,
    pub check_out: chrono::NaiveDate,
    pub nights: i64,
    pub status: BookingStatus,
    pub base_amount: Decimal,
    pub total_amount: Decimal,
    pub occupancy: Occupancy,
    pub source: BookingSource,
    pub created_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
