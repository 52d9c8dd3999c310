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

//! Invoices and the serialized invoice-number allocator.
//!
//! Invoice numbers are the audit key: strictly increasing per fiscal year,
//! never reused, and allocated by an atomic counter rather than any
//! count-of-rows or random scheme.

use crate::base::{BookingId, InvoiceId};
use crate::billing::{PaymentMode, TaxSplit};
use crate::error::EngineError;
use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Settlement status of an invoice or folio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
}

impl InvoiceStatus {
    /// Status rule: Pending if nothing paid, Partial below total, Paid at or
    /// above it.
    pub fn for_amounts(paid: Decimal, total: Decimal) -> Self {
        if paid == Decimal::ZERO {
            InvoiceStatus::Pending
        } else if paid < total {
            InvoiceStatus::Partial
        } else {
            InvoiceStatus::Paid
        }
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InvoiceStatus::Pending => "Pending",
            InvoiceStatus::Partial => "Partial",
            InvoiceStatus::Paid => "Paid",
        };
        f.write_str(name)
    }
}

/// What produced an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceKind {
    /// The per-booking settlement invoice; at most one per booking.
    Final,
    /// Staff-generated invoice with no booking reference.
    Manual,
}

/// Human-readable invoice number: `INV-<year>-<zero-padded sequence>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvoiceNumber {
    pub year: i32,
    pub seq: u64,
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INV-{}-{:04}", self.year, self.seq)
    }
}

impl Serialize for InvoiceNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Per-fiscal-year serialized number allocator.
///
/// `fetch_add` on the year's counter guarantees two concurrent checkouts
/// never receive the same number; numbers are never handed back, so a voided
/// invoice leaves a gap rather than a reuse.
#[derive(Debug, Default)]
pub(crate) struct SequenceAllocator {
    counters: DashMap<i32, AtomicU64>,
}

impl SequenceAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next(&self, year: i32) -> InvoiceNumber {
        let counter = self.counters.entry(year).or_insert_with(|| AtomicU64::new(0));
        let seq = counter.fetch_add(1, Ordering::Relaxed) + 1;
        InvoiceNumber { year, seq }
    }
}

#[derive(Debug)]
pub(crate) struct InvoiceData {
    id: InvoiceId,
    number: InvoiceNumber,
    booking: Option<BookingId>,
    kind: InvoiceKind,
    base: Decimal,
    tax_rate: Decimal,
    tax: Decimal,
    split: Option<TaxSplit>,
    total: Decimal,
    paid: Decimal,
    status: InvoiceStatus,
    issued_on: NaiveDate,
    /// Mode of the most recent payment, if any.
    payment_mode: Option<PaymentMode>,
}

impl InvoiceData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.paid <= self.total,
            "Invariant violated: paid {} exceeds total {}",
            self.paid,
            self.total
        );
        debug_assert_eq!(
            self.total,
            self.base + self.tax,
            "Invariant violated: total must equal base + tax exactly"
        );
    }

    pub(crate) fn booking(&self) -> Option<BookingId> {
        self.booking
    }

    pub(crate) fn kind(&self) -> InvoiceKind {
        self.kind
    }

    /// Applies a payment directly to this invoice's tally.
    ///
    /// # Errors
    ///
    /// [`EngineError::InvalidAmount`] for non-positive amounts,
    /// [`EngineError::Overpayment`] when the tally would pass the total
    /// (intentional overpayment flows are disallowed).
    pub(crate) fn apply_payment(
        &mut self,
        amount: Decimal,
        mode: PaymentMode,
    ) -> Result<(), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount);
        }
        if self.paid + amount > self.total {
            return Err(EngineError::Overpayment {
                attempted: amount,
                total: self.total,
            });
        }
        self.paid += amount;
        self.status = InvoiceStatus::for_amounts(self.paid, self.total);
        self.payment_mode = Some(mode);
        self.assert_invariants();
        Ok(())
    }

    /// Mirrors the owning folio's tally onto a final invoice.
    pub(crate) fn sync_paid(&mut self, paid: Decimal, mode: PaymentMode) {
        self.paid = paid;
        self.status = InvoiceStatus::for_amounts(self.paid, self.total);
        self.payment_mode = Some(mode);
        self.assert_invariants();
    }

    pub(crate) fn snapshot(&self) -> InvoiceSnapshot {
        InvoiceSnapshot {
            id: self.id,
            number: self.number,
            booking: self.booking,
            kind: self.kind,
            base: self.base,
            tax_rate: self.tax_rate,
            tax: self.tax,
            split: self.split,
            total: self.total,
            paid: self.paid,
            due: self.total - self.paid,
            status: self.status,
            issued_on: self.issued_on,
            payment_mode: self.payment_mode,
        }
    }
}

/// An issued invoice. Immutable once issued except for `paid` increments,
/// each of which is also recorded in the append-only payment log.
#[derive(Debug)]
pub struct Invoice {
    inner: Mutex<InvoiceData>,
}

impl Invoice {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn issue(
        id: InvoiceId,
        number: InvoiceNumber,
        booking: Option<BookingId>,
        kind: InvoiceKind,
        base: Decimal,
        tax_rate: Decimal,
        tax: Decimal,
        split: Option<TaxSplit>,
        paid: Decimal,
        issued_on: NaiveDate,
        payment_mode: Option<PaymentMode>,
    ) -> Self {
        let total = base + tax;
        let data = InvoiceData {
            id,
            number,
            booking,
            kind,
            base,
            tax_rate,
            tax,
            split,
            total,
            paid,
            status: InvoiceStatus::for_amounts(paid, total),
            issued_on,
            payment_mode,
        };
        data.assert_invariants();
        Self {
            inner: Mutex::new(data),
        }
    }

    pub fn number(&self) -> InvoiceNumber {
        self.inner.lock().number
    }

    pub fn status(&self) -> InvoiceStatus {
        self.inner.lock().status
    }

    pub fn snapshot(&self) -> InvoiceSnapshot {
        self.inner.lock().snapshot()
    }

    pub(crate) fn write(&self) -> MutexGuard<'_, InvoiceData> {
        self.inner.lock()
    }
}

/// Owned copy of invoice state returned by engine operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSnapshot {
    pub id: InvoiceId,
    pub number: InvoiceNumber,
    pub booking: Option<BookingId>,
    pub kind: InvoiceKind,
    pub base: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub split: Option<TaxSplit>,
    pub total: Decimal,
    pub paid: Decimal,
    pub due: Decimal,
    pub status: InvoiceStatus,
    pub issued_on: NaiveDate,
    pub payment_mode: Option<PaymentMode>,
}
