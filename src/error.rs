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

//! Error types for reservation and billing operations.
//!
//! Every engine operation returns a typed result; the calling layer decides
//! user-facing messaging. Nothing is recovered silently.

use crate::base::{BookingId, InvoiceId, RoomId};
use crate::booking::BookingStatus;
use crate::room::RoomStatus;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

/// Reservation and billing engine errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Check-out date is not strictly after check-in date
    #[error("invalid date range: check-out {check_out} must be after check-in {check_in}")]
    InvalidRange {
        check_in: NaiveDate,
        check_out: NaiveDate,
    },

    /// Overlapping active booking detected at commit time
    #[error("room {room_number} is not available for the requested dates")]
    RoomUnavailable { room_number: String },

    /// Booking state machine violation
    #[error("invalid booking transition: {from} -> {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Room state machine violation
    #[error("invalid room transition: {from} -> {to}")]
    InvalidRoomTransition { from: RoomStatus, to: RoomStatus },

    /// Room status change blocked by current occupancy or maintenance
    #[error("room {room_number} is busy ({status})")]
    RoomBusy {
        room_number: String,
        status: RoomStatus,
    },

    /// Check-in attempted outside the booking's stay window
    #[error("check-in window is {opens} to {closes}, attempted on {attempted}")]
    OutsideCheckInWindow {
        opens: NaiveDate,
        closes: NaiveDate,
        attempted: NaiveDate,
    },

    /// Checkout blocked by a due balance absent the explicit override
    #[error("outstanding balance of {due} must be settled before checkout")]
    OutstandingBalance { due: Decimal },

    /// A final invoice already exists for the booking
    #[error("final invoice already issued for booking {booking_id}")]
    DuplicateInvoice { booking_id: BookingId },

    /// A lock could not be acquired within the bounded wait; retryable
    #[error("resource busy: {resource}")]
    Busy { resource: String },

    /// Payment amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Payment would push the paid amount past the total
    #[error("payment of {attempted} exceeds remaining balance on total {total}")]
    Overpayment { attempted: Decimal, total: Decimal },

    /// Occupant count exceeds the room's capacity
    #[error("occupancy {requested} exceeds room capacity {max}")]
    ExceedsOccupancy { requested: u32, max: u32 },

    /// Room number already configured
    #[error("room number {room_number} already exists")]
    DuplicateRoom { room_number: String },

    /// Referenced room does not exist
    #[error("room {room_id} not found")]
    RoomNotFound { room_id: RoomId },

    /// Referenced booking does not exist
    #[error("booking {booking_id} not found")]
    BookingNotFound { booking_id: BookingId },

    /// Referenced invoice does not exist
    #[error("invoice {invoice_id} not found")]
    InvoiceNotFound { invoice_id: InvoiceId },
}

impl EngineError {
    /// Whether the caller may retry the operation as-is.
    ///
    /// Only lock-wait timeouts are retryable; every other error requires the
    /// caller to change something (re-run availability, settle a balance).
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Busy { .. })
    }
}
