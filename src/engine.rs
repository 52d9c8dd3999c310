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

//! Reservation and billing engine.
//!
//! The [`Engine`] is the single entry point for the UI/API layer: it owns
//! the rooms, guests, bookings and the billing ledger, and emits domain
//! events for external notifiers.
//!
//! # Concurrency
//!
//! Entities live in [`DashMap`]s and each wraps its state in a per-entity
//! mutex. Every read-then-write sequence on a room's interval set runs under
//! that room's mutex, and lifecycle transitions serialize on the booking's
//! mutex first, then the room's, so the lock graph is acyclic. Lock waits
//! are bounded; a timeout surfaces as the retryable
//! [`EngineError::Busy`] instead of queueing indefinitely.
//!
//! # Events
//!
//! Every committed operation emits one [`DomainEvent`]. Dispatch is
//! fire-and-forget: sink failures are logged and never affect the result.

use crate::base::{BookingId, DateRange, GuestId, InvoiceId, RoomId};
use crate::billing::{
    FolioSnapshot, Ledger, PaymentMode, PaymentRecord, PaymentTarget, Quote, TaxPolicy,
};
use crate::booking::{
    Booking, BookingSnapshot, BookingSource, BookingStatus, Occupancy,
};
use crate::error::EngineError;
use crate::event::{DomainEvent, EventSink, NullSink};
use crate::guest::{Guest, GuestDirectory, GuestInfo};
use crate::invoice::InvoiceSnapshot;
use crate::room::{Room, RoomAction, RoomConfig, RoomSnapshot};
use chrono::{NaiveDate, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Engine-wide configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tax: TaxPolicy,
    /// Bounded wait for per-entity locks before a retryable `Busy` error.
    pub lock_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tax: TaxPolicy::default(),
            lock_wait: Duration::from_millis(500),
        }
    }
}

/// Caller-supplied booking request.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub guest: GuestInfo,
    pub room_id: RoomId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub occupancy: Occupancy,
    pub source: BookingSource,
}

/// Lifecycle commands accepted by [`Engine::transition_booking`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingCommand {
    /// Confirmed -> CheckedIn; `today` is checked against the stay window.
    CheckIn { today: NaiveDate },
    /// CheckedIn -> CheckedOut; `override_due` permits (and logs) checkout
    /// with an unsettled balance.
    CheckOut { override_due: bool },
    /// Confirmed -> Cancelled; releases the interval claim immediately.
    Cancel,
}

/// Result of [`Engine::record_payment`]: the appended payment plus the
/// authoritative post-state of whichever billing views the payment touched.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentReceipt {
    pub payment: PaymentRecord,
    pub folio: Option<FolioSnapshot>,
    pub invoice: Option<InvoiceSnapshot>,
}

/// Reservation and billing engine.
///
/// # Invariants
///
/// - Active (Confirmed/CheckedIn) bookings on one room have pairwise
///   disjoint date ranges.
/// - A room under Maintenance is invisible to availability and rejects
///   check-in.
/// - Invoice numbers are strictly increasing per fiscal year and never
///   reused.
/// - A booking has at most one final invoice.
pub struct Engine {
    config: EngineConfig,
    rooms: DashMap<RoomId, Room>,
    /// Unique index: human-facing room number -> id.
    room_numbers: DashMap<String, RoomId>,
    bookings: DashMap<BookingId, Booking>,
    guests: GuestDirectory,
    ledger: Ledger,
    sink: Arc<dyn EventSink>,
    next_room_id: AtomicU32,
    next_booking_id: AtomicU64,
}

impl Engine {
    /// Creates an engine with default configuration and no event consumer.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_sink(config, Arc::new(NullSink))
    }

    pub fn with_sink(config: EngineConfig, sink: Arc<dyn EventSink>) -> Self {
        let ledger = Ledger::new(config.tax);
        Engine {
            config,
            rooms: DashMap::new(),
            room_numbers: DashMap::new(),
            bookings: DashMap::new(),
            guests: GuestDirectory::new(),
            ledger,
            sink,
            next_room_id: AtomicU32::new(0),
            next_booking_id: AtomicU64::new(0),
        }
    }

    // === Rooms ===

    /// Configures a new room. Room numbers are unique and human-facing.
    ///
    /// # Errors
    ///
    /// [`EngineError::DuplicateRoom`] if the number is already configured.
    pub fn add_room(&self, config: RoomConfig) -> Result<RoomSnapshot, EngineError> {
        match self.room_numbers.entry(config.number.clone()) {
            Entry::Occupied(_) => Err(EngineError::DuplicateRoom {
                room_number: config.number,
            }),
            Entry::Vacant(entry) => {
                let id = RoomId(self.next_room_id.fetch_add(1, Ordering::Relaxed) + 1);
                let room = Room::new(id, config);
                let snapshot = room.snapshot();
                self.rooms.insert(id, room);
                entry.insert(id);
                debug!(room = %snapshot.number, "room configured");
                Ok(snapshot)
            }
        }
    }

    /// Explicit staff action on a room's housekeeping status.
    pub fn set_room_status(
        &self,
        room_id: RoomId,
        action: RoomAction,
    ) -> Result<RoomSnapshot, EngineError> {
        let room = self
            .rooms
            .get(&room_id)
            .ok_or(EngineError::RoomNotFound { room_id })?;
        let mut data = room.lock_for(self.config.lock_wait)?;
        let status = data.apply(action)?;
        let snapshot = data.snapshot();
        drop(data);
        debug!(room = %snapshot.number, ?action, %status, "room status changed");
        Ok(snapshot)
    }

    // === Availability ===

    /// Rooms free for the whole candidate range.
    pub fn check_availability(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Vec<RoomSnapshot>, EngineError> {
        self.find_available(check_in, check_out, &[])
    }

    /// Availability with an exclusion list.
    ///
    /// A read-only query: each room's lock is taken briefly and results
    /// tolerate in-flight writes. The authoritative overlap re-check happens
    /// inside [`Engine::create_booking`] under the room lock.
    pub fn find_available(
        &self,
        check_in: NaiveDate,
        check_out: NaiveDate,
        exclude: &[RoomId],
    ) -> Result<Vec<RoomSnapshot>, EngineError> {
        let range = DateRange::new(check_in, check_out)?;
        let mut available: Vec<RoomSnapshot> = self
            .rooms
            .iter()
            .filter(|entry| !exclude.contains(entry.key()))
            .filter_map(|entry| {
                let data = entry.value().read();
                data.is_available_for(&range).then(|| data.snapshot())
            })
            .collect();
        available.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(available)
    }

    // === Bookings ===

    /// Creates a booking, find-or-creating the guest by email.
    ///
    /// Overlap is re-validated under the room lock, so a stale availability
    /// read can never double-book: of two concurrent requests for
    /// overlapping ranges, exactly one wins and the other gets
    /// [`EngineError::RoomUnavailable`].
    pub fn create_booking(&self, request: BookingRequest) -> Result<BookingSnapshot, EngineError> {
        let range = DateRange::new(request.check_in, request.check_out)?;
        let room = self
            .rooms
            .get(&request.room_id)
            .ok_or(EngineError::RoomNotFound {
                room_id: request.room_id,
            })?;

        let guest = self.guests.find_or_create(request.guest);
        let booking_id = BookingId(self.next_booking_id.fetch_add(1, Ordering::Relaxed) + 1);

        // Serialized section: occupancy gate and claim commit under the
        // room lock.
        let (room_number, base_amount) = {
            let mut data = room.lock_for(self.config.lock_wait)?;
            if request.occupancy.total() > data.max_occupancy() {
                return Err(EngineError::ExceedsOccupancy {
                    requested: request.occupancy.total(),
                    max: data.max_occupancy(),
                });
            }
            data.try_claim(booking_id, range)?;
            (
                data.number().to_string(),
                data.rate() * Decimal::from(range.nights()),
            )
        };

        let quote = self.ledger.quote(base_amount);
        let booking = Booking::new(
            booking_id,
            guest.id,
            request.room_id,
            room_number.clone(),
            range,
            base_amount,
            quote.total,
            request.occupancy,
            request.source,
        );
        let snapshot = booking.snapshot();
        self.bookings.insert(booking_id, booking);
        self.ledger.open_folio(booking_id, base_amount);

        debug!(
            booking = %booking_id,
            room = %room_number,
            range = %range,
            "booking created"
        );
        self.dispatch(DomainEvent::BookingCreated {
            booking_id,
            guest_name: guest.name.clone(),
            guest_email: guest.email.clone(),
            room_number,
            check_in: range.check_in,
            check_out: range.check_out,
            nights: range.nights(),
            total_amount: quote.total,
            source: request.source,
            at: snapshot.created_at,
        });
        Ok(snapshot)
    }

    /// Drives a booking along one lifecycle edge.
    ///
    /// Transitions on one booking serialize on its mutex; the room mutex is
    /// always taken second.
    pub fn transition_booking(
        &self,
        booking_id: BookingId,
        command: BookingCommand,
    ) -> Result<BookingSnapshot, EngineError> {
        let booking = self
            .bookings
            .get(&booking_id)
            .ok_or(EngineError::BookingNotFound { booking_id })?;
        match command {
            BookingCommand::CheckIn { today } => self.check_in(&booking, today),
            BookingCommand::CheckOut { override_due } => self.check_out(&booking, override_due),
            BookingCommand::Cancel => self.cancel(&booking),
        }
    }

    fn check_in(&self, booking: &Booking, today: NaiveDate) -> Result<BookingSnapshot, EngineError> {
        let mut data = booking.lock_for(self.config.lock_wait)?;
        if data.status() != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                from: data.status(),
                to: BookingStatus::CheckedIn,
            });
        }
        let range = data.range();
        if !range.contains(today) {
            return Err(EngineError::OutsideCheckInWindow {
                opens: range.check_in,
                closes: range.check_out,
                attempted: today,
            });
        }

        // Defensive re-check against the room machine: Maintenance rejects
        // even though the booking already references this room.
        let room = self
            .rooms
            .get(&data.room())
            .ok_or(EngineError::RoomNotFound { room_id: data.room() })?;
        {
            let mut room_data = room.lock_for(self.config.lock_wait)?;
            room_data.occupy()?;
        }

        data.transition_to(BookingStatus::CheckedIn, Utc::now())?;
        let snapshot = data.snapshot();
        drop(data);

        debug!(booking = %snapshot.id, room = %snapshot.room_number, "checked in");
        let (guest_name, guest_email) = self.guest_contact(snapshot.guest);
        self.dispatch(DomainEvent::BookingCheckedIn {
            booking_id: snapshot.id,
            guest_name,
            guest_email,
            room_number: snapshot.room_number.clone(),
            previous_status: BookingStatus::Confirmed,
            new_status: BookingStatus::CheckedIn,
            at: snapshot.checked_in_at.unwrap_or_else(Utc::now),
        });
        Ok(snapshot)
    }

    fn check_out(
        &self,
        booking: &Booking,
        override_due: bool,
    ) -> Result<BookingSnapshot, EngineError> {
        let mut data = booking.lock_for(self.config.lock_wait)?;
        if data.status() != BookingStatus::CheckedIn {
            return Err(EngineError::InvalidTransition {
                from: data.status(),
                to: BookingStatus::CheckedOut,
            });
        }

        let due = self.ledger.due(data.id())?;
        if due > Decimal::ZERO {
            if !override_due {
                return Err(EngineError::OutstandingBalance { due });
            }
            // Policy escape hatch; must leave an audit trace.
            warn!(
                booking = %data.id(),
                %due,
                "checkout with outstanding balance permitted by explicit override"
            );
        }

        let room = self
            .rooms
            .get(&data.room())
            .ok_or(EngineError::RoomNotFound { room_id: data.room() })?;
        {
            let mut room_data = room.lock_for(self.config.lock_wait)?;
            room_data.vacate()?;
            room_data.release_claim(data.id());
        }

        data.transition_to(BookingStatus::CheckedOut, Utc::now())?;
        let snapshot = data.snapshot();
        drop(data);

        debug!(booking = %snapshot.id, room = %snapshot.room_number, "checked out");
        let paid = snapshot.total_amount - due;
        let (guest_name, guest_email) = self.guest_contact(snapshot.guest);
        self.dispatch(DomainEvent::BookingCheckedOut {
            booking_id: snapshot.id,
            guest_name,
            guest_email,
            room_number: snapshot.room_number.clone(),
            previous_status: BookingStatus::CheckedIn,
            new_status: BookingStatus::CheckedOut,
            total_amount: snapshot.total_amount,
            paid_amount: paid,
            due_amount: due,
            at: snapshot.checked_out_at.unwrap_or_else(Utc::now),
        });
        Ok(snapshot)
    }

    fn cancel(&self, booking: &Booking) -> Result<BookingSnapshot, EngineError> {
        let mut data = booking.lock_for(self.config.lock_wait)?;
        if data.status() != BookingStatus::Confirmed {
            return Err(EngineError::InvalidTransition {
                from: data.status(),
                to: BookingStatus::Cancelled,
            });
        }

        let room = self
            .rooms
            .get(&data.room())
            .ok_or(EngineError::RoomNotFound { room_id: data.room() })?;
        {
            // Releases the claim immediately; housekeeping state untouched.
            let mut room_data = room.lock_for(self.config.lock_wait)?;
            room_data.release_claim(data.id());
        }

        data.transition_to(BookingStatus::Cancelled, Utc::now())?;
        let snapshot = data.snapshot();
        drop(data);

        debug!(booking = %snapshot.id, "cancelled");
        let (guest_name, guest_email) = self.guest_contact(snapshot.guest);
        self.dispatch(DomainEvent::BookingCancelled {
            booking_id: snapshot.id,
            guest_name,
            guest_email,
            room_number: snapshot.room_number.clone(),
            previous_status: BookingStatus::Confirmed,
            new_status: BookingStatus::Cancelled,
            at: snapshot.cancelled_at.unwrap_or_else(Utc::now),
        });
        Ok(snapshot)
    }

    // === Billing ===

    /// Quotes a base amount under the engine's tax policy.
    pub fn quote(&self, base: Decimal) -> Quote {
        self.ledger.quote(base)
    }

    /// Records a payment against a booking's folio or an invoice.
    pub fn record_payment(
        &self,
        target: PaymentTarget,
        amount: Decimal,
        mode: PaymentMode,
    ) -> Result<PaymentReceipt, EngineError> {
        let (record, folio, invoice) = match target {
            PaymentTarget::Booking(booking_id) => {
                if !self.bookings.contains_key(&booking_id) {
                    return Err(EngineError::BookingNotFound { booking_id });
                }
                let (record, folio, invoice) =
                    self.ledger.record_booking_payment(booking_id, amount, mode)?;
                (record, Some(folio), invoice)
            }
            PaymentTarget::Invoice(invoice_id) => {
                let (record, invoice, folio) =
                    self.ledger.record_invoice_payment(invoice_id, amount, mode)?;
                (record, folio, Some(invoice))
            }
        };

        debug!(payment = %record.id, %amount, "payment recorded");
        let (guest_name, guest_email) = match record.booking.and_then(|b| self.get_booking(b)) {
            Some(b) => {
                let (name, email) = self.guest_contact(b.guest);
                (Some(name), email)
            }
            None => (None, None),
        };
        self.dispatch(DomainEvent::PaymentRecorded {
            payment_id: record.id,
            booking_id: record.booking,
            invoice_number: invoice.as_ref().map(|i| i.number),
            guest_name,
            guest_email,
            amount: record.amount,
            mode: record.mode,
            balance_after: record.balance_after,
            at: record.recorded_at,
        });

        Ok(PaymentReceipt {
            payment: (*record).clone(),
            folio,
            invoice,
        })
    }

    /// Issues the booking's final settlement invoice.
    ///
    /// Idempotent: re-invoking returns the existing invoice, same number.
    pub fn issue_invoice(&self, booking_id: BookingId) -> Result<InvoiceSnapshot, EngineError> {
        if !self.bookings.contains_key(&booking_id) {
            return Err(EngineError::BookingNotFound { booking_id });
        }
        let issued_on = Utc::now().date_naive();
        let (snapshot, newly_issued) = self.ledger.issue_final(booking_id, issued_on)?;

        if newly_issued {
            debug!(invoice = %snapshot.number, booking = %booking_id, "invoice issued");
            let booking = self.get_booking(booking_id);
            let (guest_name, guest_email) = match &booking {
                Some(b) => {
                    let (name, email) = self.guest_contact(b.guest);
                    (Some(name), email)
                }
                None => (None, None),
            };
            self.dispatch(DomainEvent::InvoiceIssued {
                invoice_number: snapshot.number,
                booking_id: Some(booking_id),
                guest_name,
                guest_email,
                room_number: booking.map(|b| b.room_number),
                base_amount: snapshot.base,
                tax_amount: snapshot.tax,
                total_amount: snapshot.total,
                paid_amount: snapshot.paid,
                status: snapshot.status,
                issued_on: snapshot.issued_on,
                at: Utc::now(),
            });
        } else {
            debug!(
                invoice = %snapshot.number,
                booking = %booking_id,
                "final invoice already issued; returning existing"
            );
        }
        Ok(snapshot)
    }

    /// Staff-generated invoice with no booking reference.
    pub fn create_invoice(&self, base: Decimal) -> Result<InvoiceSnapshot, EngineError> {
        let issued_on = Utc::now().date_naive();
        let snapshot = self.ledger.create_manual(base, issued_on)?;
        debug!(invoice = %snapshot.number, "manual invoice issued");
        self.dispatch(DomainEvent::InvoiceIssued {
            invoice_number: snapshot.number,
            booking_id: None,
            guest_name: None,
            guest_email: None,
            room_number: None,
            base_amount: snapshot.base,
            tax_amount: snapshot.tax,
            total_amount: snapshot.total,
            paid_amount: snapshot.paid,
            status: snapshot.status,
            issued_on: snapshot.issued_on,
            at: Utc::now(),
        });
        Ok(snapshot)
    }

    // === Queries ===

    pub fn get_room(&self, room_id: RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(&room_id).map(|r| r.snapshot())
    }

    pub fn room_by_number(&self, number: &str) -> Option<RoomSnapshot> {
        let id = *self.room_numbers.get(number)?;
        self.get_room(id)
    }

    pub fn get_booking(&self, booking_id: BookingId) -> Option<BookingSnapshot> {
        self.bookings.get(&booking_id).map(|b| b.snapshot())
    }

    pub fn get_guest(&self, guest_id: GuestId) -> Option<Guest> {
        self.guests.get(guest_id)
    }

    pub fn get_invoice(&self, invoice_id: InvoiceId) -> Result<InvoiceSnapshot, EngineError> {
        self.ledger.invoice(invoice_id)
    }

    pub fn final_invoice(&self, booking_id: BookingId) -> Option<InvoiceSnapshot> {
        self.ledger.final_invoice(booking_id)
    }

    pub fn folio(&self, booking_id: BookingId) -> Option<FolioSnapshot> {
        self.ledger.folio(booking_id)
    }

    /// Payments applied to a booking, in application order.
    pub fn payment_history(&self, booking_id: BookingId) -> Vec<PaymentRecord> {
        self.ledger
            .payments_for(booking_id)
            .into_iter()
            .map(|r| (*r).clone())
            .collect()
    }

    /// All rooms, ordered by room number.
    pub fn rooms(&self) -> Vec<RoomSnapshot> {
        let mut rooms: Vec<RoomSnapshot> = self.rooms.iter().map(|r| r.snapshot()).collect();
        rooms.sort_by(|a, b| a.number.cmp(&b.number));
        rooms
    }

    /// All bookings, ordered by id.
    pub fn bookings(&self) -> Vec<BookingSnapshot> {
        let mut bookings: Vec<BookingSnapshot> =
            self.bookings.iter().map(|b| b.snapshot()).collect();
        bookings.sort_by_key(|b| b.id.0);
        bookings
    }

    pub fn guest_count(&self) -> usize {
        self.guests.len()
    }

    pub fn payment_count(&self) -> usize {
        self.ledger.payment_count()
    }

    fn guest_contact(&self, guest_id: GuestId) -> (String, Option<String>) {
        match self.guests.get(guest_id) {
            Some(guest) => (guest.name, guest.email),
            None => (String::new(), None),
        }
    }

    /// Fire-and-forget dispatch: a sink failure is logged, never escalated.
    fn dispatch(&self, event: DomainEvent) {
        if let Err(e) = self.sink.emit(event) {
            warn!(error = %e, "event dispatch failed; domain operation already committed");
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
