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

//! # Frontdesk
//!
//! This library provides a hotel reservation and billing engine: room
//! availability over date ranges, the booking lifecycle in lock-step with
//! housekeeping state, and an auditable folio/invoice trail.
//!
//! ## Core Components
//!
//! - [`Engine`]: Central facade owning rooms, guests, bookings and billing
//! - [`IntervalSet`]: Per-room set of date-range claims held by active bookings
//! - [`BookingStatus`] / [`RoomStatus`]: The two coupled state machines
//! - [`DomainEvent`] / [`EventSink`]: Fire-and-forget boundary for notifiers
//! - [`EngineError`]: Typed errors for every failure mode
//!
//! ## Example
//!
//! ```
//! use frontdesk_rs::{
//!     BookingCommand, BookingRequest, BookingSource, Engine, GuestInfo, Occupancy,
//!     PaymentMode, PaymentTarget, RoomConfig, RoomType,
//! };
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! let room = engine
//!     .add_room(RoomConfig {
//!         number: "A1".into(),
//!         room_type: RoomType::Standard,
//!         rate: dec!(3000),
//!         max_occupancy: 2,
//!         amenities: vec![],
//!     })
//!     .unwrap();
//!
//! let check_in = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
//! let check_out = NaiveDate::from_ymd_opt(2026, 2, 12).unwrap();
//! let booking = engine
//!     .create_booking(BookingRequest {
//!         guest: GuestInfo {
//!             name: "Asha Rao".into(),
//!             email: Some("asha@example.com".into()),
//!             phone: None,
//!             vip: false,
//!             notes: None,
//!         },
//!         room_id: room.id,
//!         check_in,
//!         check_out,
//!         occupancy: Occupancy::default(),
//!         source: BookingSource::Direct,
//!     })
//!     .unwrap();
//! assert_eq!(booking.total_amount, dec!(6000));
//!
//! engine
//!     .transition_booking(booking.id, BookingCommand::CheckIn { today: check_in })
//!     .unwrap();
//! engine
//!     .record_payment(PaymentTarget::Booking(booking.id), dec!(6000), PaymentMode::Card)
//!     .unwrap();
//! engine
//!     .transition_booking(booking.id, BookingCommand::CheckOut { override_due: false })
//!     .unwrap();
//! let invoice = engine.issue_invoice(booking.id).unwrap();
//! assert_eq!(invoice.paid, dec!(6000));
//! ```
//!
//! ## Thread Safety
//!
//! The engine serves concurrent requests: entities live in concurrent maps
//! with per-entity mutexes, read-then-write sequences on a room's interval
//! set run under that room's lock, and invoice numbers come from atomic
//! per-year sequence allocators. Two racing bookings for overlapping dates
//! on one room cannot both succeed.

pub mod base;
pub mod billing;
pub mod booking;
mod engine;
pub mod error;
pub mod event;
mod guest;
pub mod interval;
pub mod invoice;
pub mod room;

pub use base::{BookingId, DateRange, GuestId, InvoiceId, PaymentId, RoomId};
pub use billing::{
    quote, FolioSnapshot, PaymentMode, PaymentRecord, PaymentTarget, Quote, TaxPolicy, TaxSplit,
};
pub use booking::{Booking, BookingSnapshot, BookingSource, BookingStatus, Occupancy};
pub use engine::{BookingCommand, BookingRequest, Engine, EngineConfig, PaymentReceipt};
pub use error::EngineError;
pub use event::{BufferSink, DomainEvent, EventSink, NullSink, SinkError};
pub use guest::{Guest, GuestInfo};
pub use interval::{Claim, IntervalSet};
pub use invoice::{Invoice, InvoiceKind, InvoiceNumber, InvoiceSnapshot, InvoiceStatus};
pub use room::{Room, RoomAction, RoomConfig, RoomSnapshot, RoomStatus, RoomType};
