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

//! Domain events and the dispatcher boundary.
//!
//! The engine emits one event per committed domain operation and performs no
//! notification I/O itself. Events carry denormalized data (guest contact,
//! room number, dates, amounts) so a downstream notifier can act without
//! re-querying the engine. Dispatch is fire-and-forget: a sink failure is
//! logged by the engine and never rolls back the triggering operation.

use crate::base::{BookingId, PaymentId};
use crate::billing::PaymentMode;
use crate::booking::{BookingSource, BookingStatus};
use crate::invoice::{InvoiceNumber, InvoiceStatus};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// A committed domain operation, denormalized for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    BookingCreated {
        booking_id: BookingId,
        guest_name: String,
        guest_email: Option<String>,
        room_number: String,
        check_in: NaiveDate,
        check_out: NaiveDate,
        nights: i64,
        total_amount: Decimal,
        source: BookingSource,
        at: DateTime<Utc>,
    },
    BookingCheckedIn {
        booking_id: BookingId,
        guest_name: String,
        guest_email: Option<String>,
        room_number: String,
        previous_status: BookingStatus,
        new_status: BookingStatus,
        at: DateTime<Utc>,
    },
    BookingCheckedOut {
        booking_id: BookingId,
        guest_name: String,
        guest_email: Option<String>,
        room_number: String,
        previous_status: BookingStatus,
        new_status: BookingStatus,
        total_amount: Decimal,
        paid_amount: Decimal,
        due_amount: Decimal,
        at: DateTime<Utc>,
    },
    BookingCancelled {
        booking_id: BookingId,
        guest_name: String,
        guest_email: Option<String>,
        room_number: String,
        previous_status: BookingStatus,
        new_status: BookingStatus,
        at: DateTime<Utc>,
    },
    InvoiceIssued {
        invoice_number: InvoiceNumber,
        booking_id: Option<BookingId>,
        guest_name: Option<String>,
        guest_email: Option<String>,
        room_number: Option<String>,
        base_amount: Decimal,
        tax_amount: Decimal,
        total_amount: Decimal,
        paid_amount: Decimal,
        status: InvoiceStatus,
        issued_on: NaiveDate,
        at: DateTime<Utc>,
    },
    PaymentRecorded {
        payment_id: PaymentId,
        booking_id: Option<BookingId>,
        invoice_number: Option<InvoiceNumber>,
        guest_name: Option<String>,
        guest_email: Option<String>,
        amount: Decimal,
        mode: PaymentMode,
        balance_after: Decimal,
        at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// The `type` discriminator external consumers key on.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::BookingCreated { .. } => "BookingCreated",
            DomainEvent::BookingCheckedIn { .. } => "BookingCheckedIn",
            DomainEvent::BookingCheckedOut { .. } => "BookingCheckedOut",
            DomainEvent::BookingCancelled { .. } => "BookingCancelled",
            DomainEvent::InvoiceIssued { .. } => "InvoiceIssued",
            DomainEvent::PaymentRecorded { .. } => "PaymentRecorded",
        }
    }

    /// The booking the event concerns, when it concerns one.
    pub fn booking_id(&self) -> Option<BookingId> {
        match self {
            DomainEvent::BookingCreated { booking_id, .. }
            | DomainEvent::BookingCheckedIn { booking_id, .. }
            | DomainEvent::BookingCheckedOut { booking_id, .. }
            | DomainEvent::BookingCancelled { booking_id, .. } => Some(*booking_id),
            DomainEvent::InvoiceIssued { booking_id, .. }
            | DomainEvent::PaymentRecorded { booking_id, .. } => *booking_id,
        }
    }

    /// Flattens the event into `(key, value)` string pairs, `type` first,
    /// for downstream `{{field}}` template substitution. Absent optional
    /// fields are omitted.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields: Vec<(&'static str, String)> = vec![("type", self.event_type().into())];
        let mut push = |key: &'static str, value: String| fields.push((key, value));

        match self {
            DomainEvent::BookingCreated {
                booking_id,
                guest_name,
                guest_email,
                room_number,
                check_in,
                check_out,
                nights,
                total_amount,
                source,
                at,
            } => {
                push("booking_id", booking_id.to_string());
                push("guest_name", guest_name.clone());
                if let Some(email) = guest_email {
                    push("guest_email", email.clone());
                }
                push("room_number", room_number.clone());
                push("check_in", check_in.to_string());
                push("check_out", check_out.to_string());
                push("nights", nights.to_string());
                push("total_amount", total_amount.to_string());
                push("source", format!("{source:?}"));
                push("at", at.to_rfc3339());
            }
            DomainEvent::BookingCheckedIn {
                booking_id,
                guest_name,
                guest_email,
                room_number,
                previous_status,
                new_status,
                at,
            }
            | DomainEvent::BookingCancelled {
                booking_id,
                guest_name,
                guest_email,
                room_number,
                previous_status,
                new_status,
                at,
            } => {
                push("booking_id", booking_id.to_string());
                push("guest_name", guest_name.clone());
                if let Some(email) = guest_email {
                    push("guest_email", email.clone());
                }
                push("room_number", room_number.clone());
                push("previous_status", previous_status.to_string());
                push("new_status", new_status.to_string());
                push("at", at.to_rfc3339());
            }
            DomainEvent::BookingCheckedOut {
                booking_id,
                guest_name,
                guest_email,
                room_number,
                previous_status,
                new_status,
                total_amount,
                paid_amount,
                due_amount,
                at,
            } => {
                push("booking_id", booking_id.to_string());
                push("guest_name", guest_name.clone());
                if let Some(email) = guest_email {
                    push("guest_email", email.clone());
                }
                push("room_number", room_number.clone());
                push("previous_status", previous_status.to_string());
                push("new_status", new_status.to_string());
                push("total_amount", total_amount.to_string());
                push("paid_amount", paid_amount.to_string());
                push("due_amount", due_amount.to_string());
                push("at", at.to_rfc3339());
            }
            DomainEvent::InvoiceIssued {
                invoice_number,
                booking_id,
                guest_name,
                guest_email,
                room_number,
                base_amount,
                tax_amount,
                total_amount,
                paid_amount,
                status,
                issued_on,
                at,
            } => {
                push("invoice_number", invoice_number.to_string());
                if let Some(id) = booking_id {
                    push("booking_id", id.to_string());
                }
                if let Some(name) = guest_name {
                    push("guest_name", name.clone());
                }
                if let Some(email) = guest_email {
                    push("guest_email", email.clone());
                }
                if let Some(room) = room_number {
                    push("room_number", room.clone());
                }
                push("base_amount", base_amount.to_string());
                push("tax_amount", tax_amount.to_string());
                push("total_amount", total_amount.to_string());
                push("paid_amount", paid_amount.to_string());
                push("status", status.to_string());
                push("issued_on", issued_on.to_string());
                push("at", at.to_rfc3339());
            }
            DomainEvent::PaymentRecorded {
                payment_id,
                booking_id,
                invoice_number,
                guest_name,
                guest_email,
                amount,
                mode,
                balance_after,
                at,
            } => {
                push("payment_id", payment_id.to_string());
                if let Some(id) = booking_id {
                    push("booking_id", id.to_string());
                }
                if let Some(number) = invoice_number {
                    push("invoice_number", number.to_string());
                }
                if let Some(name) = guest_name {
                    push("guest_name", name.clone());
                }
                if let Some(email) = guest_email {
                    push("guest_email", email.clone());
                }
                push("amount", amount.to_string());
                push("mode", format!("{mode:?}"));
                push("balance_after", balance_after.to_string());
                push("at", at.to_rfc3339());
            }
        }

        fields
    }
}

/// Failure reported by an event sink. Never escalated into a domain result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event sink failure: {0}")]
pub struct SinkError(pub String);

/// Abstract consumer of domain events.
///
/// Implementations must be cheap or hand off internally; `emit` is called
/// inline on the request path after the domain operation has committed.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent) -> Result<(), SinkError>;
}

/// Discards every event. The default sink.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: DomainEvent) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Records every event in order. Intended for tests and demos.
#[derive(Debug, Default)]
pub struct BufferSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for BufferSink {
    fn emit(&self, event: DomainEvent) -> Result<(), SinkError> {
        self.events.lock().push(event);
        Ok(())
    }
}
