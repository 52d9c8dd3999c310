//! Simple REST API server example for the reservation engine.
//!
//! Run with: `cargo run --example server`
//!
//! ## Endpoints
//!
//! - `POST /rooms` - Configure a room
//! - `GET /rooms` - List rooms with housekeeping status
//! - `GET /availability?check_in=..&check_out=..` - Rooms free for a range
//! - `POST /bookings` - Create a booking (finds or creates the guest)
//! - `GET /bookings/{id}` - Get a booking
//! - `POST /bookings/{id}/transition` - Check in / check out / cancel
//! - `POST /bookings/{id}/invoice` - Issue the final invoice (idempotent)
//! - `POST /payments` - Record a payment against a booking or invoice
//!
//! ## Example Usage
//!
//! ```bash
//! # Configure a room
//! curl -X POST http://localhost:3000/rooms \
//!   -H "Content-Type: application/json" \
//!   -d '{"number": "A1", "room_type": "Standard", "rate": "3000", "max_occupancy": 2}'
//!
//! # Check availability
//! curl "http://localhost:3000/availability?check_in=2026-02-10&check_out=2026-02-12"
//!
//! # Create a booking
//! curl -X POST http://localhost:3000/bookings \
//!   -H "Content-Type: application/json" \
//!   -d '{"guest_name": "Asha Rao", "guest_email": "asha@example.com",
//!        "room_id": 1, "check_in": "2026-02-10", "check_out": "2026-02-12"}'
//!
//! # Check in
//! curl -X POST http://localhost:3000/bookings/1/transition \
//!   -H "Content-Type: application/json" \
//!   -d '{"action": "checkin", "today": "2026-02-10"}'
//! ```

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use frontdesk_rs::{
    BookingCommand, BookingId, BookingRequest, BookingSource, Engine, EngineError, GuestInfo,
    InvoiceId, Occupancy, PaymentMode, PaymentTarget, RoomAction, RoomConfig, RoomId, RoomType,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;

// === Request DTOs ===

/// Request body for creating a booking.
#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub room_id: u32,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub adults: Option<u32>,
    #[serde(default)]
    pub children: Option<u32>,
    #[serde(default)]
    pub source: Option<BookingSource>,
}

/// Request body for lifecycle transitions.
///
/// ```json
/// {"action": "checkin", "today": "2026-02-10"}
/// {"action": "checkout", "override_due": true}
/// {"action": "cancel"}
/// ```
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TransitionRequest {
    Checkin {
        today: NaiveDate,
    },
    Checkout {
        #[serde(default)]
        override_due: bool,
    },
    Cancel,
}

impl TransitionRequest {
    fn into_command(self) -> BookingCommand {
        match self {
            Self::Checkin { today } => BookingCommand::CheckIn { today },
            Self::Checkout { override_due } => BookingCommand::CheckOut { override_due },
            Self::Cancel => BookingCommand::Cancel,
        }
    }
}

/// Request body for recording a payment. Exactly one of `booking_id` /
/// `invoice_id` must be set.
#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub booking_id: Option<u64>,
    pub invoice_id: Option<u64>,
    pub amount: Decimal,
    pub mode: PaymentMode,
}

/// Request body for configuring a room.
#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub number: String,
    pub room_type: RoomType,
    pub rate: Decimal,
    pub max_occupancy: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
}

/// Request body for staff room-status actions.
#[derive(Debug, Deserialize)]
pub struct RoomStatusRequest {
    pub action: RoomAction,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

// === Error Mapping ===

/// Maps engine errors onto HTTP statuses; the body carries the display
/// message.
struct ApiError(EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::InvalidRange { .. }
            | EngineError::InvalidAmount
            | EngineError::ExceedsOccupancy { .. } => StatusCode::BAD_REQUEST,
            EngineError::RoomNotFound { .. }
            | EngineError::BookingNotFound { .. }
            | EngineError::InvoiceNotFound { .. } => StatusCode::NOT_FOUND,
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

// === Handlers ===

type AppState = Arc<Engine>;

async fn create_room(
    State(engine): State<AppState>,
    Json(request): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = engine.add_room(RoomConfig {
        number: request.number,
        room_type: request.room_type,
        rate: request.rate,
        max_occupancy: request.max_occupancy,
        amenities: request.amenities,
    })?;
    Ok((StatusCode::CREATED, Json(room)))
}

async fn list_rooms(State(engine): State<AppState>) -> impl IntoResponse {
    Json(engine.rooms())
}

async fn set_room_status(
    State(engine): State<AppState>,
    Path(room_id): Path<u32>,
    Json(request): Json<RoomStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let room = engine.set_room_status(RoomId(room_id), request.action)?;
    Ok(Json(room))
}

async fn availability(
    State(engine): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = engine.check_availability(query.check_in, query.check_out)?;
    Ok(Json(rooms))
}

async fn create_booking(
    State(engine): State<AppState>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = engine.create_booking(BookingRequest {
        guest: GuestInfo {
            name: request.guest_name,
            email: request.guest_email,
            phone: request.guest_phone,
            vip: false,
            notes: None,
        },
        room_id: RoomId(request.room_id),
        check_in: request.check_in,
        check_out: request.check_out,
        occupancy: Occupancy {
            adults: request.adults.unwrap_or(1),
            children: request.children.unwrap_or(0),
        },
        source: request.source.unwrap_or(BookingSource::Online),
    })?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn get_booking(
    State(engine): State<AppState>,
    Path(booking_id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let booking_id = BookingId(booking_id);
    let booking = engine
        .get_booking(booking_id)
        .ok_or(EngineError::BookingNotFound { booking_id })?;
    Ok(Json(booking))
}

async fn transition_booking(
    State(engine): State<AppState>,
    Path(booking_id): Path<u64>,
    Json(request): Json<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = engine.transition_booking(BookingId(booking_id), request.into_command())?;
    Ok(Json(booking))
}

async fn issue_invoice(
    State(engine): State<AppState>,
    Path(booking_id): Path<u64>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = engine.issue_invoice(BookingId(booking_id))?;
    Ok(Json(invoice))
}

async fn record_payment(
    State(engine): State<AppState>,
    Json(request): Json<PaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let target = match (request.booking_id, request.invoice_id) {
        (Some(booking), None) => PaymentTarget::Booking(BookingId(booking)),
        (None, Some(invoice)) => PaymentTarget::Invoice(InvoiceId(invoice)),
        _ => {
            return Ok((
                StatusCode::BAD_REQUEST,
                "exactly one of booking_id / invoice_id must be set".to_string(),
            )
                .into_response());
        }
    };
    let receipt = engine.record_payment(target, request.amount, request.mode)?;
    Ok(Json(serde_json::json!({
        "payment": receipt.payment,
        "folio": receipt.folio,
        "invoice": receipt.invoice,
    }))
    .into_response())
}

fn router(engine: AppState) -> Router {
    Router::new()
        .route("/rooms", post(create_room).get(list_rooms))
        .route("/rooms/{id}/status", post(set_room_status))
        .route("/availability", get(availability))
        .route("/bookings", post(create_booking))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/transition", post(transition_booking))
        .route("/bookings/{id}/invoice", post(issue_invoice))
        .route("/payments", post(record_payment))
        .with_state(engine)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let engine = Arc::new(Engine::new());
    let app = router(engine);

    let listener = TcpListener::bind("127.0.0.1:3000")
        .await
        .expect("failed to bind");
    println!("Front desk listening on http://{}", listener.local_addr().unwrap());

    axum::serve(listener, app).await.expect("server failed");
}
