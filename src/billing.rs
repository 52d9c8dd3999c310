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

//! Billing ledger: tax quoting, per-booking folios, payments and final
//! invoicing.
//!
//! A folio is opened per booking at creation time and accumulates payments
//! against a fixed grand total; the due balance is always
//! `total - sum(payments)`. Every payment lands in an append-only,
//! insertion-ordered log. Final invoices are issued at most once per booking
//! through an atomic idempotency guard.

use crate::base::{BookingId, InvoiceId, PaymentId};
use crate::error::EngineError;
use crate::invoice::{
    Invoice, InvoiceKind, InvoiceSnapshot, InvoiceStatus, SequenceAllocator,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use crossbeam::queue::SegQueue;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tax applied to room charges at quoting time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxPolicy {
    /// Percentage rate, e.g. `12` for 12%.
    pub rate_percent: Decimal,
    /// Split-tax jurisdiction: report the tax as two even named components.
    pub split: bool,
}

impl Default for TaxPolicy {
    fn default() -> Self {
        Self {
            rate_percent: Decimal::ZERO,
            split: false,
        }
    }
}

impl TaxPolicy {
    pub fn quote(&self, base: Decimal) -> Quote {
        quote(base, self.rate_percent)
    }
}

/// Computes tax and total for a base amount.
///
/// `tax = round(base * rate / 100, 2)`; the total is exact:
/// `total = base + tax`.
pub fn quote(base: Decimal, rate_percent: Decimal) -> Quote {
    let tax = (base * rate_percent / dec!(100)).round_dp(2);
    Quote {
        base,
        tax,
        total: base + tax,
    }
}

/// Result of a tax quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub base: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl Quote {
    /// Splits the tax evenly into CGST/SGST.
    ///
    /// The second half is `round(tax / 2, 2)` and the first absorbs any
    /// one-cent remainder, so `cgst + sgst == tax` exactly.
    pub fn split(&self) -> TaxSplit {
        let sgst = (self.tax / dec!(2)).round_dp(2);
        TaxSplit {
            cgst: self.tax - sgst,
            sgst,
        }
    }
}

/// Even two-way tax split for split-tax jurisdictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSplit {
    pub cgst: Decimal,
    pub sgst: Decimal,
}

/// How a payment was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    BankTransfer,
    Online,
}

/// What a payment is applied against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentTarget {
    Booking(BookingId),
    Invoice(InvoiceId),
}

/// One entry in the append-only payment log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentRecord {
    pub id: PaymentId,
    pub booking: Option<BookingId>,
    pub invoice: Option<InvoiceId>,
    pub amount: Decimal,
    pub mode: PaymentMode,
    pub recorded_at: DateTime<Utc>,
    /// Due balance on the target immediately after this payment.
    pub balance_after: Decimal,
}

/// Append-only payment log with insertion order preserved.
///
/// A [`DashMap`] gives O(1) lookup by id while a [`SegQueue`] keeps FIFO
/// order for audit export; records are never removed or edited.
#[derive(Debug, Default)]
pub(crate) struct PaymentLog {
    records: DashMap<PaymentId, Arc<PaymentRecord>>,
    order: SegQueue<PaymentId>,
    next_id: AtomicU64,
}

impl PaymentLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Allocates an id and appends the record built from it.
    pub(crate) fn append(
        &self,
        build: impl FnOnce(PaymentId) -> PaymentRecord,
    ) -> Arc<PaymentRecord> {
        let id = PaymentId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let record = Arc::new(build(id));
        self.records.insert(id, Arc::clone(&record));
        self.order.push(id);
        record
    }

    pub(crate) fn get(&self, id: PaymentId) -> Option<Arc<PaymentRecord>> {
        self.records.get(&id).map(|r| Arc::clone(&r))
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug)]
struct FolioData {
    booking: BookingId,
    base: Decimal,
    tax: Decimal,
    total: Decimal,
    paid: Decimal,
    payments: Vec<PaymentId>,
}

impl FolioData {
    fn assert_invariants(&self) {
        debug_assert!(
            self.paid >= Decimal::ZERO,
            "Invariant violated: paid went negative: {}",
            self.paid
        );
        debug_assert!(
            self.paid <= self.total,
            "Invariant violated: paid {} exceeds total {}",
            self.paid,
            self.total
        );
    }

    fn due(&self) -> Decimal {
        self.total - self.paid
    }

    fn status(&self) -> InvoiceStatus {
        InvoiceStatus::for_amounts(self.paid, self.total)
    }

    fn snapshot(&self) -> FolioSnapshot {
        FolioSnapshot {
            booking: self.booking,
            base: self.base,
            tax: self.tax,
            total: self.total,
            paid: self.paid,
            due: self.due(),
            status: self.status(),
            payment_count: self.payments.len(),
        }
    }
}

/// Per-booking billing account between creation and final invoicing.
#[derive(Debug)]
pub(crate) struct Folio {
    inner: Mutex<FolioData>,
}

impl Folio {
    fn new(booking: BookingId, quote: Quote) -> Self {
        Self {
            inner: Mutex::new(FolioData {
                booking,
                base: quote.base,
                tax: quote.tax,
                total: quote.total,
                paid: Decimal::ZERO,
                payments: Vec::new(),
            }),
        }
    }
}

/// Owned copy of a folio's billing state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolioSnapshot {
    pub booking: BookingId,
    pub base: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub paid: Decimal,
    pub due: Decimal,
    pub status: InvoiceStatus,
    pub payment_count: usize,
}

/// The billing ledger.
pub(crate) struct Ledger {
    tax: TaxPolicy,
    folios: DashMap<BookingId, Folio>,
    invoices: DashMap<InvoiceId, Invoice>,
    /// Idempotency guard: at most one final invoice per booking.
    finals: DashMap<BookingId, InvoiceId>,
    log: PaymentLog,
    next_invoice_id: AtomicU64,
    numbers: SequenceAllocator,
}

impl Ledger {
    pub(crate) fn new(tax: TaxPolicy) -> Self {
        Self {
            tax,
            folios: DashMap::new(),
            invoices: DashMap::new(),
            finals: DashMap::new(),
            log: PaymentLog::new(),
            next_invoice_id: AtomicU64::new(0),
            numbers: SequenceAllocator::new(),
        }
    }

    pub(crate) fn quote(&self, base: Decimal) -> Quote {
        self.tax.quote(base)
    }

    /// Opens the booking's folio with a fixed grand total.
    pub(crate) fn open_folio(&self, booking: BookingId, base: Decimal) -> FolioSnapshot {
        let quote = self.quote(base);
        let folio = Folio::new(booking, quote);
        let snapshot = folio.inner.lock().snapshot();
        self.folios.insert(booking, folio);
        snapshot
    }

    pub(crate) fn folio(&self, booking: BookingId) -> Option<FolioSnapshot> {
        self.folios.get(&booking).map(|f| f.inner.lock().snapshot())
    }

    /// Due balance for a booking: `grand_total - sum(prior payments)`.
    pub(crate) fn due(&self, booking: BookingId) -> Result<Decimal, EngineError> {
        self.folios
            .get(&booking)
            .map(|f| f.inner.lock().due())
            .ok_or(EngineError::BookingNotFound {
                booking_id: booking,
            })
    }

    /// Applies a payment to a booking's folio, mirroring it onto the final
    /// invoice when one has been issued.
    pub(crate) fn record_booking_payment(
        &self,
        booking: BookingId,
        amount: Decimal,
        mode: PaymentMode,
    ) -> Result<(Arc<PaymentRecord>, FolioSnapshot, Option<InvoiceSnapshot>), EngineError> {
        if amount <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount);
        }
        let folio = self
            .folios
            .get(&booking)
            .ok_or(EngineError::BookingNotFound {
                booking_id: booking,
            })?;

        let (record, folio_snapshot) = {
            let mut data = folio.inner.lock();
            if data.paid + amount > data.total {
                return Err(EngineError::Overpayment {
                    attempted: amount,
                    total: data.total,
                });
            }
            data.paid += amount;
            let record = self.log.append(|id| PaymentRecord {
                id,
                booking: Some(booking),
                invoice: self.finals.get(&booking).map(|f| *f),
                amount,
                mode,
                recorded_at: Utc::now(),
                balance_after: data.due(),
            });
            data.payments.push(record.id);
            data.assert_invariants();
            (record, data.snapshot())
        };

        // Mirror onto the final invoice outside the folio lock.
        let invoice_snapshot = self.finals.get(&booking).and_then(|id| {
            self.invoices.get(&id).map(|invoice| {
                let mut data = invoice.write();
                data.sync_paid(folio_snapshot.paid, mode);
                data.snapshot()
            })
        });

        Ok((record, folio_snapshot, invoice_snapshot))
    }

    /// Applies a payment to an invoice. Final invoices delegate to their
    /// booking's folio so the folio stays the single tally.
    pub(crate) fn record_invoice_payment(
        &self,
        invoice_id: InvoiceId,
        amount: Decimal,
        mode: PaymentMode,
    ) -> Result<(Arc<PaymentRecord>, InvoiceSnapshot, Option<FolioSnapshot>), EngineError> {
        let booking = {
            let invoice = self
                .invoices
                .get(&invoice_id)
                .ok_or(EngineError::InvoiceNotFound { invoice_id })?;
            let data = invoice.write();
            match data.kind() {
                InvoiceKind::Final => data.booking(),
                InvoiceKind::Manual => None,
            }
        };

        if let Some(booking) = booking {
            let (record, folio_snapshot, invoice_snapshot) =
                self.record_booking_payment(booking, amount, mode)?;
            // The final invoice mirror always exists on this path.
            let invoice_snapshot = invoice_snapshot.ok_or(EngineError::InvoiceNotFound {
                invoice_id,
            })?;
            return Ok((record, invoice_snapshot, Some(folio_snapshot)));
        }

        let invoice = self
            .invoices
            .get(&invoice_id)
            .ok_or(EngineError::InvoiceNotFound { invoice_id })?;
        let mut data = invoice.write();
        data.apply_payment(amount, mode)?;
        let snapshot = data.snapshot();
        drop(data);

        let record = self.log.append(|id| PaymentRecord {
            id,
            booking: None,
            invoice: Some(invoice_id),
            amount,
            mode,
            recorded_at: Utc::now(),
            balance_after: snapshot.due,
        });

        Ok((record, snapshot, None))
    }

    /// Issues the booking's final settlement invoice.
    ///
    /// Idempotent: a second call trips the `(booking, Final)` guard and
    /// returns the existing invoice with `newly_issued == false` instead of
    /// minting a duplicate number.
    pub(crate) fn issue_final(
        &self,
        booking: BookingId,
        issued_on: NaiveDate,
    ) -> Result<(InvoiceSnapshot, bool), EngineError> {
        match self.allocate_final(booking, issued_on) {
            Ok(snapshot) => Ok((snapshot, true)),
            Err(EngineError::DuplicateInvoice { .. }) => {
                let existing = self
                    .finals
                    .get(&booking)
                    .map(|id| *id)
                    .ok_or(EngineError::BookingNotFound {
                        booking_id: booking,
                    })?;
                let snapshot = self.invoice(existing)?;
                Ok((snapshot, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Creates a staff-generated invoice with no booking reference.
    pub(crate) fn create_manual(
        &self,
        base: Decimal,
        issued_on: NaiveDate,
    ) -> Result<InvoiceSnapshot, EngineError> {
        if base <= Decimal::ZERO {
            return Err(EngineError::InvalidAmount);
        }
        let quote = self.quote(base);
        let snapshot = self.mint(None, InvoiceKind::Manual, quote, Decimal::ZERO, None, issued_on);
        Ok(snapshot)
    }

    pub(crate) fn invoice(&self, id: InvoiceId) -> Result<InvoiceSnapshot, EngineError> {
        self.invoices
            .get(&id)
            .map(|i| i.snapshot())
            .ok_or(EngineError::InvoiceNotFound { invoice_id: id })
    }

    pub(crate) fn final_invoice(&self, booking: BookingId) -> Option<InvoiceSnapshot> {
        let id = self.finals.get(&booking).map(|f| *f)?;
        self.invoices.get(&id).map(|i| i.snapshot())
    }

    /// Payment history for a booking, in application order.
    pub(crate) fn payments_for(&self, booking: BookingId) -> Vec<Arc<PaymentRecord>> {
        let Some(folio) = self.folios.get(&booking) else {
            return Vec::new();
        };
        let ids: Vec<PaymentId> = folio.inner.lock().payments.clone();
        ids.into_iter().filter_map(|id| self.log.get(id)).collect()
    }

    pub(crate) fn payment_count(&self) -> usize {
        self.log.len()
    }

    /// The guarded allocation path; trips [`EngineError::DuplicateInvoice`]
    /// when a final invoice already exists.
    fn allocate_final(
        &self,
        booking: BookingId,
        issued_on: NaiveDate,
    ) -> Result<InvoiceSnapshot, EngineError> {
        let folio_snapshot = self.folio(booking).ok_or(EngineError::BookingNotFound {
            booking_id: booking,
        })?;
        // Resolved before the entry below: the entry lock must never wait on
        // a folio lock (payments take them in the opposite order).
        let mode = if folio_snapshot.payment_count > 0 {
            self.last_mode_for(booking)
        } else {
            None
        };

        match self.finals.entry(booking) {
            Entry::Occupied(_) => Err(EngineError::DuplicateInvoice {
                booking_id: booking,
            }),
            Entry::Vacant(entry) => {
                // Holding the vacant entry serializes concurrent issuance
                // for this booking; the number is allocated exactly once.
                let quote = Quote {
                    base: folio_snapshot.base,
                    tax: folio_snapshot.tax,
                    total: folio_snapshot.total,
                };
                let snapshot = self.mint(
                    Some(booking),
                    InvoiceKind::Final,
                    quote,
                    folio_snapshot.paid,
                    mode,
                    issued_on,
                );
                entry.insert(snapshot.id);
                Ok(snapshot)
            }
        }
    }

    fn last_mode_for(&self, booking: BookingId) -> Option<PaymentMode> {
        let folio = self.folios.get(&booking)?;
        let last = *folio.inner.lock().payments.last()?;
        self.log.get(last).map(|r| r.mode)
    }

    fn mint(
        &self,
        booking: Option<BookingId>,
        kind: InvoiceKind,
        quote: Quote,
        paid: Decimal,
        mode: Option<PaymentMode>,
        issued_on: NaiveDate,
    ) -> InvoiceSnapshot {
        let id = InvoiceId(self.next_invoice_id.fetch_add(1, Ordering::Relaxed) + 1);
        let number = self.numbers.next(issued_on.year());
        let split = self.tax.split.then(|| quote.split());
        let invoice = Invoice::issue(
            id,
            number,
            booking,
            kind,
            quote.base,
            self.tax.rate_percent,
            quote.tax,
            split,
            paid,
            issued_on,
            mode,
        );
        let snapshot = invoice.snapshot();
        self.invoices.insert(id, invoice);
        snapshot
    }
}
