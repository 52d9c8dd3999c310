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

//! Engine public API integration tests.

use chrono::NaiveDate;
use frontdesk_rs::{
    BookingCommand, BookingRequest, BookingSource, BufferSink, DomainEvent, Engine, EngineConfig,
    EngineError, GuestInfo, InvoiceStatus, Occupancy, PaymentMode, PaymentTarget, RoomAction,
    RoomConfig, RoomId, RoomStatus, RoomType, SinkError, TaxPolicy,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;

// === Helper Functions ===

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn feb(d: u32) -> NaiveDate {
    date(2026, 2, d)
}

fn make_room(number: &str, rate: Decimal) -> RoomConfig {
    RoomConfig {
        number: number.into(),
        room_type: RoomType::Standard,
        rate,
        max_occupancy: 2,
        amenities: vec![],
    }
}

fn make_guest(name: &str, email: &str) -> GuestInfo {
    GuestInfo {
        name: name.into(),
        email: Some(email.into()),
        phone: None,
        vip: false,
        notes: None,
    }
}

fn make_request(room_id: RoomId, check_in: NaiveDate, check_out: NaiveDate) -> BookingRequest {
    BookingRequest {
        guest: make_guest("Asha Rao", "asha@example.com"),
        room_id,
        check_in,
        check_out,
        occupancy: Occupancy::default(),
        source: BookingSource::Direct,
    }
}

/// Engine with one Standard room "A1" at 3000/night, zero tax.
fn engine_with_room() -> (Engine, RoomId) {
    let engine = Engine::new();
    let room = engine.add_room(make_room("A1", dec!(3000))).unwrap();
    (engine, room.id)
}

// === Availability ===

#[test]
fn empty_hotel_has_no_availability() {
    let engine = Engine::new();
    assert!(engine.check_availability(feb(10), feb(12)).unwrap().is_empty());
}

#[test]
fn availability_rejects_inverted_range() {
    let (engine, _) = engine_with_room();
    let result = engine.check_availability(feb(12), feb(10));
    assert!(matches!(result, Err(EngineError::InvalidRange { .. })));
}

#[test]
fn booked_range_removes_room_from_availability() {
    let (engine, room_id) = engine_with_room();
    engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    assert!(engine.check_availability(feb(10), feb(12)).unwrap().is_empty());
    assert!(engine.check_availability(feb(11), feb(13)).unwrap().is_empty());
    // Back-to-back is fine: the room frees on the check-out date
    assert_eq!(engine.check_availability(feb(12), feb(14)).unwrap().len(), 1);
}

#[test]
fn maintenance_room_is_excluded_from_availability() {
    let (engine, room_id) = engine_with_room();
    engine.set_room_status(room_id, RoomAction::Block).unwrap();

    assert!(engine.check_availability(feb(10), feb(12)).unwrap().is_empty());
}

#[test]
fn find_available_honours_exclusions() {
    let engine = Engine::new();
    let a1 = engine.add_room(make_room("A1", dec!(3000))).unwrap();
    let a2 = engine.add_room(make_room("A2", dec!(3500))).unwrap();

    let rooms = engine.find_available(feb(10), feb(12), &[a1.id]).unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, a2.id);
}

#[test]
fn cancelled_booking_frees_the_range() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    engine.transition_booking(booking.id, BookingCommand::Cancel).unwrap();

    assert_eq!(engine.check_availability(feb(10), feb(12)).unwrap().len(), 1);
}

// === Booking creation ===

#[test]
fn booking_totals_rate_times_nights() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    assert_eq!(booking.nights, 2);
    assert_eq!(booking.base_amount, dec!(6000));
    assert_eq!(booking.total_amount, dec!(6000));
}

#[test]
fn booking_applies_engine_tax_policy() {
    let engine = Engine::with_config(EngineConfig {
        tax: TaxPolicy {
            rate_percent: dec!(12),
            split: false,
        },
        ..EngineConfig::default()
    });
    let room = engine.add_room(make_room("A1", dec!(500))).unwrap();

    let booking = engine.create_booking(make_request(room.id, feb(10), feb(12))).unwrap();
    assert_eq!(booking.base_amount, dec!(1000));
    assert_eq!(booking.total_amount, dec!(1120.00));
}

#[test]
fn covered_range_fails_with_room_unavailable() {
    let (engine, room_id) = engine_with_room();
    engine.create_booking(make_request(room_id, feb(10), feb(20))).unwrap();

    let result = engine.create_booking(make_request(room_id, feb(12), feb(14)));
    assert_eq!(
        result.unwrap_err(),
        EngineError::RoomUnavailable {
            room_number: "A1".into()
        }
    );
}

#[test]
fn duplicate_room_number_is_rejected() {
    let (engine, _) = engine_with_room();
    let result = engine.add_room(make_room("A1", dec!(9999)));
    assert_eq!(
        result.unwrap_err(),
        EngineError::DuplicateRoom {
            room_number: "A1".into()
        }
    );
}

#[test]
fn occupancy_above_capacity_is_rejected() {
    let (engine, room_id) = engine_with_room();
    let mut request = make_request(room_id, feb(10), feb(12));
    request.occupancy = Occupancy {
        adults: 2,
        children: 1,
    };

    let result = engine.create_booking(request);
    assert_eq!(
        result.unwrap_err(),
        EngineError::ExceedsOccupancy {
            requested: 3,
            max: 2
        }
    );
    // The failed request must not leave a claim behind
    assert_eq!(engine.check_availability(feb(10), feb(12)).unwrap().len(), 1);
}

#[test]
fn guests_dedup_by_email_across_bookings() {
    let (engine, room_id) = engine_with_room();
    let first = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    let mut second_request = make_request(room_id, feb(12), feb(14));
    second_request.guest.email = Some("ASHA@example.com".into());
    let second = engine.create_booking(second_request).unwrap();

    assert_eq!(first.guest, second.guest);
    assert_eq!(engine.guest_count(), 1);
}

#[test]
fn booking_on_maintenance_room_is_unavailable() {
    let (engine, room_id) = engine_with_room();
    engine.set_room_status(room_id, RoomAction::Block).unwrap();

    let result = engine.create_booking(make_request(room_id, feb(10), feb(12)));
    assert_eq!(
        result.unwrap_err(),
        EngineError::RoomUnavailable {
            room_number: "A1".into()
        }
    );
}

// === Lifecycle ===

#[test]
fn check_in_marks_room_occupied() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    let booking = engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();
    assert!(booking.checked_in_at.is_some());
    assert_eq!(engine.get_room(room_id).unwrap().status, RoomStatus::Occupied);
}

#[test]
fn early_check_in_is_rejected() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    let result = engine.transition_booking(booking.id, BookingCommand::CheckIn { today: feb(9) });
    assert_eq!(
        result.unwrap_err(),
        EngineError::OutsideCheckInWindow {
            opens: feb(10),
            closes: feb(12),
            attempted: feb(9),
        }
    );
}

#[test]
fn direct_confirmed_to_checked_out_is_rejected() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    let result =
        engine.transition_booking(booking.id, BookingCommand::CheckOut { override_due: false });
    assert!(matches!(
        result.unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
}

#[test]
fn check_in_on_maintenance_room_is_busy() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();

    // Block after booking: the booking still references the room
    engine.set_room_status(room_id, RoomAction::Block).unwrap();

    let result = engine.transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) });
    assert_eq!(
        result.unwrap_err(),
        EngineError::RoomBusy {
            room_number: "A1".into(),
            status: RoomStatus::Maintenance,
        }
    );
    // The booking state must be untouched
    assert_eq!(
        engine.get_booking(booking.id).unwrap().status,
        frontdesk_rs::BookingStatus::Confirmed
    );
}

#[test]
fn cancel_after_check_in_is_rejected() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();

    let result = engine.transition_booking(booking.id, BookingCommand::Cancel);
    assert!(matches!(
        result.unwrap_err(),
        EngineError::InvalidTransition { .. }
    ));
}

#[test]
fn terminal_states_reject_everything() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    engine.transition_booking(booking.id, BookingCommand::Cancel).unwrap();

    for command in [
        BookingCommand::CheckIn { today: feb(10) },
        BookingCommand::CheckOut {
            override_due: false,
        },
        BookingCommand::Cancel,
    ] {
        let result = engine.transition_booking(booking.id, command);
        assert!(matches!(
            result.unwrap_err(),
            EngineError::InvalidTransition { .. }
        ));
    }
}

#[test]
fn checkout_requires_settled_balance() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();

    let result =
        engine.transition_booking(booking.id, BookingCommand::CheckOut { override_due: false });
    assert_eq!(
        result.unwrap_err(),
        EngineError::OutstandingBalance { due: dec!(6000) }
    );
}

#[test]
fn checkout_with_override_is_permitted() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();

    let booking = engine
        .transition_booking(booking.id, BookingCommand::CheckOut { override_due: true })
        .unwrap();
    assert!(booking.checked_out_at.is_some());
    assert_eq!(engine.get_room(room_id).unwrap().status, RoomStatus::Dirty);
}

#[test]
fn second_stay_requires_housekeeping() {
    let (engine, room_id) = engine_with_room();
    let first = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    engine
        .transition_booking(first.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();
    engine
        .record_payment(PaymentTarget::Booking(first.id), dec!(6000), PaymentMode::Card)
        .unwrap();
    engine
        .transition_booking(first.id, BookingCommand::CheckOut { override_due: false })
        .unwrap();

    // The next booking can be created while the room is Dirty, but check-in
    // waits for housekeeping.
    let second = engine.create_booking(make_request(room_id, feb(12), feb(14))).unwrap();
    let result = engine.transition_booking(second.id, BookingCommand::CheckIn { today: feb(12) });
    assert!(matches!(
        result.unwrap_err(),
        EngineError::InvalidRoomTransition { .. }
    ));

    engine.set_room_status(room_id, RoomAction::Clean).unwrap();
    engine
        .transition_booking(second.id, BookingCommand::CheckIn { today: feb(12) })
        .unwrap();
}

// === End-to-end ===

/// Full walk: book A1 for 2026-02-10..2026-02-12 at 3000/night, check in,
/// pay in two halves, checkout blocked until settled, invoice totals 6000.
#[test]
fn end_to_end_stay_and_settlement() {
    let (engine, room_id) = engine_with_room();

    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    assert_eq!(booking.base_amount, dec!(6000));

    engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();

    let receipt = engine
        .record_payment(PaymentTarget::Booking(booking.id), dec!(3000), PaymentMode::Upi)
        .unwrap();
    let folio = receipt.folio.unwrap();
    assert_eq!(folio.status, InvoiceStatus::Partial);
    assert_eq!(folio.due, dec!(3000));

    let result =
        engine.transition_booking(booking.id, BookingCommand::CheckOut { override_due: false });
    assert_eq!(
        result.unwrap_err(),
        EngineError::OutstandingBalance { due: dec!(3000) }
    );

    let receipt = engine
        .record_payment(PaymentTarget::Booking(booking.id), dec!(3000), PaymentMode::Upi)
        .unwrap();
    assert_eq!(receipt.folio.unwrap().status, InvoiceStatus::Paid);

    engine
        .transition_booking(booking.id, BookingCommand::CheckOut { override_due: false })
        .unwrap();
    assert_eq!(engine.get_room(room_id).unwrap().status, RoomStatus::Dirty);

    let invoice = engine.issue_invoice(booking.id).unwrap();
    assert_eq!(invoice.total, dec!(6000));
    assert_eq!(invoice.paid, dec!(6000));
    assert_eq!(invoice.status, InvoiceStatus::Paid);
}

// === Concurrency ===

/// Two concurrent bookings for overlapping ranges on one room: exactly one
/// succeeds, the other fails with RoomUnavailable. Never both.
#[test]
fn concurrent_overlapping_bookings_one_winner() {
    for _ in 0..50 {
        let (engine, room_id) = engine_with_room();
        let engine = Arc::new(engine);

        let mut handles = Vec::new();
        for i in 0..2 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let mut request = make_request(room_id, feb(10), feb(13));
                request.guest = make_guest(&format!("Guest {i}"), &format!("g{i}@example.com"));
                // Shift one range so they overlap but differ
                if i == 1 {
                    request.check_in = feb(12);
                    request.check_out = feb(15);
                }
                engine.create_booking(request)
            }));
        }

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let unavailable = results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::RoomUnavailable { .. })))
            .count();

        assert_eq!(winners, 1, "exactly one booking must win");
        assert_eq!(unavailable, 1, "the loser must see RoomUnavailable");
    }
}

/// Many threads hammering disjoint ranges on one room all succeed, and the
/// resulting claims stay pairwise disjoint.
#[test]
fn concurrent_disjoint_bookings_all_win() {
    let (engine, room_id) = engine_with_room();
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for i in 0..10u32 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let start = feb(1) + chrono::Days::new(u64::from(i) * 2);
            let end = start + chrono::Days::new(2);
            let mut request = make_request(room_id, start, end);
            request.guest = make_guest(&format!("Guest {i}"), &format!("g{i}@example.com"));
            engine.create_booking(request)
        }));
    }

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let bookings = engine.bookings();
    assert_eq!(bookings.len(), 10);
    for a in &bookings {
        for b in &bookings {
            if a.id != b.id {
                assert!(
                    a.check_out <= b.check_in || b.check_out <= a.check_in,
                    "bookings {} and {} overlap",
                    a.id,
                    b.id
                );
            }
        }
    }
}

/// Concurrent transition attempts on one booking: exactly one check-in wins.
#[test]
fn concurrent_transitions_serialize_per_booking() {
    let (engine, room_id) = engine_with_room();
    let booking = engine.create_booking(make_request(room_id, feb(10), feb(12))).unwrap();
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        let id = booking.id;
        handles.push(thread::spawn(move || {
            engine.transition_booking(id, BookingCommand::CheckIn { today: feb(10) })
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(EngineError::InvalidTransition { .. })))
            .count(),
        7
    );
}

// === Events ===

#[test]
fn lifecycle_emits_one_event_per_transition() {
    let sink = Arc::new(BufferSink::new());
    let engine = Engine::with_sink(EngineConfig::default(), sink.clone());
    let room = engine.add_room(make_room("A1", dec!(3000))).unwrap();

    let booking = engine.create_booking(make_request(room.id, feb(10), feb(12))).unwrap();
    engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();
    engine
        .record_payment(PaymentTarget::Booking(booking.id), dec!(6000), PaymentMode::Card)
        .unwrap();
    engine
        .transition_booking(booking.id, BookingCommand::CheckOut { override_due: false })
        .unwrap();
    engine.issue_invoice(booking.id).unwrap();
    // Idempotent re-issue must not emit a second InvoiceIssued
    engine.issue_invoice(booking.id).unwrap();

    let types: Vec<&'static str> = sink.events().iter().map(DomainEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            "BookingCreated",
            "BookingCheckedIn",
            "PaymentRecorded",
            "BookingCheckedOut",
            "InvoiceIssued",
        ]
    );
}

#[test]
fn events_carry_denormalized_guest_and_room() {
    let sink = Arc::new(BufferSink::new());
    let engine = Engine::with_sink(EngineConfig::default(), sink.clone());
    let room = engine.add_room(make_room("A1", dec!(3000))).unwrap();
    engine.create_booking(make_request(room.id, feb(10), feb(12))).unwrap();

    let events = sink.events();
    match &events[0] {
        DomainEvent::BookingCreated {
            guest_name,
            guest_email,
            room_number,
            nights,
            total_amount,
            ..
        } => {
            assert_eq!(guest_name, "Asha Rao");
            assert_eq!(guest_email.as_deref(), Some("asha@example.com"));
            assert_eq!(room_number, "A1");
            assert_eq!(*nights, 2);
            assert_eq!(*total_amount, dec!(6000));
        }
        other => panic!("expected BookingCreated, got {other:?}"),
    }
}

/// A failing sink must never fail the domain operation.
#[test]
fn sink_failure_does_not_block_transitions() {
    struct FailingSink;
    impl frontdesk_rs::EventSink for FailingSink {
        fn emit(&self, _event: DomainEvent) -> Result<(), SinkError> {
            Err(SinkError("notifier down".into()))
        }
    }

    let engine = Engine::with_sink(EngineConfig::default(), Arc::new(FailingSink));
    let room = engine.add_room(make_room("A1", dec!(3000))).unwrap();

    let booking = engine.create_booking(make_request(room.id, feb(10), feb(12))).unwrap();
    let booking = engine
        .transition_booking(booking.id, BookingCommand::CheckIn { today: feb(10) })
        .unwrap();
    assert_eq!(booking.status, frontdesk_rs::BookingStatus::CheckedIn);
}
