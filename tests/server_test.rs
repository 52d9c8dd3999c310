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

//! Integration tests for a REST facade over the engine with concurrent
//! requests.
//!
//! These tests verify that the engine behind HTTP handlers keeps its
//! consistency guarantees when requests race: overlapping bookings get
//! exactly one winner and invoice numbers stay unique.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use frontdesk_rs::{
    BookingCommand, BookingId, BookingRequest, BookingSource, Engine, EngineError, GuestInfo,
    Occupancy, PaymentMode, PaymentTarget, RoomConfig, RoomId, RoomType,
};
use futures::future::join_all;
use reqwest::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;

// === DTOs (duplicated from the demo server for test isolation) ===

#[derive(Debug, Deserialize)]
struct CreateBookingDto {
    guest_name: String,
    guest_email: Option<String>,
    room_id: u32,
    check_in: NaiveDate,
    check_out: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
enum TransitionDto {
    Checkin { today: NaiveDate },
    Checkout {
        #[serde(default)]
        override_due: bool,
    },
    Cancel,
}

#[derive(Debug, Deserialize)]
struct PaymentDto {
    booking_id: u64,
    amount: Decimal,
}

struct ApiError(EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidRange { .. } | EngineError::InvalidAmount => {
                StatusCode::BAD_REQUEST
            }
            EngineError::RoomNotFound { .. } | EngineError::BookingNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            EngineError::Busy { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::CONFLICT,
        };
        (status, self.0.to_string()).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

async fn create_booking(
    State(engine): State<Arc<Engine>>,
    Json(dto): Json<CreateBookingDto>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = engine.create_booking(BookingRequest {
        guest: GuestInfo {
            name: dto.guest_name,
            email: dto.guest_email,
            phone: None,
            vip: false,
            notes: None,
        },
        room_id: RoomId(dto.room_id),
        check_in: dto.check_in,
        check_out: dto.check_out,
        occupancy: Occupancy::default(),
        source: BookingSource::Online,
    })?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn transition(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<u64>,
    Json(dto): Json<TransitionDto>,
) -> Result<impl IntoResponse, ApiError> {
    let command = match dto {
        TransitionDto::Checkin { today } => BookingCommand::CheckIn { today },
        TransitionDto::Checkout { override_due } => BookingCommand::CheckOut { override_due },
        TransitionDto::Cancel => BookingCommand::Cancel,
    };
    let booking = engine.transition_booking(BookingId(id), command)?;
    Ok(Json(booking))
}

async fn pay(
    State(engine): State<Arc<Engine>>,
    Json(dto): Json<PaymentDto>,
) -> Result<impl IntoResponse, ApiError> {
    let receipt = engine.record_payment(
        PaymentTarget::Booking(BookingId(dto.booking_id)),
        dto.amount,
        PaymentMode::Online,
    )?;
    Ok(Json(receipt.payment))
}

async fn issue_invoice(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = engine.issue_invoice(BookingId(id))?;
    Ok(Json(invoice))
}

async fn availability(State(engine): State<Arc<Engine>>) -> Result<impl IntoResponse, ApiError> {
    let rooms = engine.check_availability(
        NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
        NaiveDate::from_ymd_opt(2026, 2, 12).unwrap(),
    )?;
    Ok(Json(rooms))
}

/// Spawns the facade on an ephemeral port; returns its base URL.
async fn spawn_server(engine: Arc<Engine>) -> String {
    let app = Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}/transition", post(transition))
        .route("/bookings/{id}/invoice", post(issue_invoice))
        .route("/payments", post(pay))
        .route("/availability", get(availability))
        .with_state(engine);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn engine_with_rooms(count: u32) -> Arc<Engine> {
    let engine = Engine::new();
    for i in 0..count {
        engine
            .add_room(RoomConfig {
                number: format!("A{i}"),
                room_type: RoomType::Standard,
                rate: dec!(3000),
                max_occupancy: 2,
                amenities: vec![],
            })
            .unwrap();
    }
    Arc::new(engine)
}

fn booking_body(room_id: u32, tag: usize) -> serde_json::Value {
    serde_json::json!({
        "guest_name": format!("Guest {tag}"),
        "guest_email": format!("guest{tag}@example.com"),
        "room_id": room_id,
        "check_in": "2026-02-10",
        "check_out": "2026-02-12",
    })
}

// === Tests ===

/// The race the engine exists to win: concurrent overlapping bookings over
/// HTTP produce exactly one 201 and the rest 409.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_overlapping_bookings_exactly_one_wins() {
    let engine = engine_with_rooms(1);
    let base = spawn_server(engine.clone()).await;
    let client = Client::new();

    const ATTEMPTS: usize = 20;
    let requests = (0..ATTEMPTS).map(|i| {
        let client = client.clone();
        let url = format!("{base}/bookings");
        let body = booking_body(1, i);
        async move { client.post(&url).json(&body).send().await.unwrap().status() }
    });

    let statuses = join_all(requests).await;
    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();

    assert_eq!(created, 1, "exactly one booking must be created");
    assert_eq!(conflicts, ATTEMPTS - 1, "every other attempt must conflict");
    assert_eq!(engine.bookings().len(), 1);
}

/// Bookings across distinct rooms all succeed under concurrency.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_on_distinct_rooms_all_succeed() {
    const ROOMS: u32 = 16;
    let engine = engine_with_rooms(ROOMS);
    let base = spawn_server(engine.clone()).await;
    let client = Client::new();

    let requests = (0..ROOMS).map(|i| {
        let client = client.clone();
        let url = format!("{base}/bookings");
        let body = booking_body(i + 1, i as usize);
        async move { client.post(&url).json(&body).send().await.unwrap().status() }
    });

    let statuses = join_all(requests).await;
    assert!(statuses.iter().all(|s| *s == StatusCode::CREATED));
    assert_eq!(engine.bookings().len(), ROOMS as usize);

    // Everything is claimed for the range now
    let response = client
        .get(format!("{base}/availability"))
        .send()
        .await
        .unwrap();
    let rooms: Vec<serde_json::Value> = response.json().await.unwrap();
    assert!(rooms.is_empty());
}

/// Concurrent invoice requests for the same booking return one number.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_invoice_requests_return_one_number() {
    let engine = engine_with_rooms(1);
    let base = spawn_server(engine.clone()).await;
    let client = Client::new();

    let status = client
        .post(format!("{base}/bookings"))
        .json(&booking_body(1, 0))
        .send()
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::CREATED);

    let requests = (0..10).map(|_| {
        let client = client.clone();
        let url = format!("{base}/bookings/1/invoice");
        async move {
            let response = client.post(&url).send().await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body: serde_json::Value = response.json().await.unwrap();
            body["number"].as_str().unwrap().to_string()
        }
    });

    let numbers = join_all(requests).await;
    assert!(
        numbers.windows(2).all(|w| w[0] == w[1]),
        "all concurrent invoice requests must see the same number: {numbers:?}"
    );
}

/// A full stay driven over HTTP: check in, pay, blocked checkout, settle,
/// checkout.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn full_stay_over_http() {
    let engine = engine_with_rooms(1);
    let base = spawn_server(engine.clone()).await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/bookings"))
        .json(&booking_body(1, 0))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = client
        .post(format!("{base}/bookings/1/transition"))
        .json(&serde_json::json!({"action": "checkin", "today": "2026-02-10"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Checkout with a 6000 balance outstanding must conflict
    let response = client
        .post(format!("{base}/bookings/1/transition"))
        .json(&serde_json::json!({"action": "checkout"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{base}/payments"))
        .json(&serde_json::json!({"booking_id": 1, "amount": "6000"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{base}/bookings/1/transition"))
        .json(&serde_json::json!({"action": "checkout"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "CheckedOut");
}
