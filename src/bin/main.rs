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

use chrono::{Local, NaiveDate};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use frontdesk_rs::{
    BookingCommand, BookingId, BookingRequest, BookingSource, Engine, EngineConfig, GuestInfo,
    Occupancy, PaymentMode, PaymentTarget, RoomAction, RoomConfig, RoomType, TaxPolicy,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::warn;

/// Front Desk - Process reservation command CSV files
///
/// Reads booking/housekeeping/payment commands from a CSV file, runs them
/// through the engine, and outputs booking states to stdout. Booking ids are
/// allocated sequentially from 1 in row order, so scripted flows can refer
/// to earlier bookings by number.
#[derive(Parser, Debug)]
#[command(name = "frontdesk-rs")]
#[command(about = "A reservation engine that processes booking command CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,room,room_type,rate,capacity,guest,email,check_in,check_out,booking,amount,mode
    /// Example: cargo run -- day.csv > bookings.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Tax rate percent applied to room charges
    #[arg(long, default_value = "0")]
    tax_rate: Decimal,

    /// Report tax as even CGST/SGST components
    #[arg(long)]
    split_tax: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let args = Args::parse();

    // Open input file
    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let config = EngineConfig {
        tax: TaxPolicy {
            rate_percent: args.tax_rate,
            split: args.split_tax,
        },
        ..EngineConfig::default()
    };

    // Process commands from CSV
    let engine = match process_commands(BufReader::new(file), config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error processing commands: {}", e);
            process::exit(1);
        }
    };

    // Write results to stdout
    if let Err(e) = write_bookings(&engine, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, room, room_type, rate, capacity, guest, email, check_in,
/// check_out, booking, amount, mode` - every field except `op` is optional
/// per operation.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    #[serde(default)]
    room: Option<String>,
    #[serde(default)]
    room_type: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rate: Option<Decimal>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    capacity: Option<u32>,
    #[serde(default)]
    guest: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    check_in: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    check_out: Option<NaiveDate>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    booking: Option<u64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    mode: Option<String>,
}

/// One engine operation decoded from a CSV row.
#[derive(Debug)]
enum Command {
    AddRoom {
        number: String,
        room_type: RoomType,
        rate: Decimal,
        capacity: u32,
    },
    Book {
        room: String,
        guest: GuestInfo,
        check_in: NaiveDate,
        check_out: NaiveDate,
    },
    CheckIn {
        booking: BookingId,
        on: Option<NaiveDate>,
    },
    CheckOut {
        booking: BookingId,
        override_due: bool,
    },
    Cancel {
        booking: BookingId,
    },
    Pay {
        booking: BookingId,
        amount: Decimal,
        mode: PaymentMode,
    },
    Invoice {
        booking: BookingId,
    },
    RoomStatus {
        room: String,
        action: RoomAction,
    },
}

impl CsvRecord {
    /// Converts the raw record into a command.
    ///
    /// Returns `None` for unknown operations or missing required fields.
    fn into_command(self) -> Option<Command> {
        let booking = self.booking.map(BookingId);

        match self.op.to_lowercase().as_str() {
            "add_room" => Some(Command::AddRoom {
                number: self.room?,
                room_type: parse_room_type(self.room_type.as_deref()),
                rate: self.rate?,
                capacity: self.capacity.unwrap_or(2),
            }),
            "book" => Some(Command::Book {
                room: self.room?,
                guest: GuestInfo {
                    name: self.guest?,
                    email: self.email,
                    phone: None,
                    vip: false,
                    notes: None,
                },
                check_in: self.check_in?,
                check_out: self.check_out?,
            }),
            "checkin" => Some(Command::CheckIn {
                booking: booking?,
                on: self.check_in,
            }),
            "checkout" => Some(Command::CheckOut {
                booking: booking?,
                override_due: false,
            }),
            "checkout_due" => Some(Command::CheckOut {
                booking: booking?,
                override_due: true,
            }),
            "cancel" => Some(Command::Cancel { booking: booking? }),
            "pay" => Some(Command::Pay {
                booking: booking?,
                amount: self.amount?,
                mode: parse_mode(self.mode.as_deref()),
            }),
            "invoice" => Some(Command::Invoice { booking: booking? }),
            "block" => Some(Command::RoomStatus {
                room: self.room?,
                action: RoomAction::Block,
            }),
            "restore" => Some(Command::RoomStatus {
                room: self.room?,
                action: RoomAction::Restore,
            }),
            "clean" => Some(Command::RoomStatus {
                room: self.room?,
                action: RoomAction::Clean,
            }),
            _ => None,
        }
    }
}

fn parse_room_type(raw: Option<&str>) -> RoomType {
    match raw.map(str::to_lowercase).as_deref() {
        Some("deluxe") => RoomType::Deluxe,
        Some("suite") => RoomType::Suite,
        Some("executive") => RoomType::Executive,
        _ => RoomType::Standard,
    }
}

fn parse_mode(raw: Option<&str>) -> PaymentMode {
    match raw.map(str::to_lowercase).as_deref() {
        Some("card") => PaymentMode::Card,
        Some("upi") => PaymentMode::Upi,
        Some("bank") => PaymentMode::BankTransfer,
        Some("online") => PaymentMode::Online,
        _ => PaymentMode::Cash,
    }
}

/// Runs one command against the engine.
fn apply(engine: &Engine, command: Command) -> Result<(), frontdesk_rs::EngineError> {
    match command {
        Command::AddRoom {
            number,
            room_type,
            rate,
            capacity,
        } => {
            engine.add_room(RoomConfig {
                number,
                room_type,
                rate,
                max_occupancy: capacity,
                amenities: Vec::new(),
            })?;
        }
        Command::Book {
            room,
            guest,
            check_in,
            check_out,
        } => {
            let Some(room) = engine.room_by_number(&room) else {
                warn!(%room, "skipping booking for unknown room number");
                return Ok(());
            };
            engine.create_booking(BookingRequest {
                guest,
                room_id: room.id,
                check_in,
                check_out,
                occupancy: Occupancy::default(),
                source: BookingSource::Direct,
            })?;
        }
        Command::CheckIn { booking, on } => {
            let today = on.unwrap_or_else(|| Local::now().date_naive());
            engine.transition_booking(booking, BookingCommand::CheckIn { today })?;
        }
        Command::CheckOut {
            booking,
            override_due,
        } => {
            engine.transition_booking(booking, BookingCommand::CheckOut { override_due })?;
        }
        Command::Cancel { booking } => {
            engine.transition_booking(booking, BookingCommand::Cancel)?;
        }
        Command::Pay {
            booking,
            amount,
            mode,
        } => {
            engine.record_payment(PaymentTarget::Booking(booking), amount, mode)?;
        }
        Command::Invoice { booking } => {
            engine.issue_invoice(booking)?;
        }
        Command::RoomStatus { room, action } => {
            let Some(room) = engine.room_by_number(&room) else {
                warn!(%room, "skipping status change for unknown room number");
                return Ok(());
            };
            engine.set_room_status(room.id, action)?;
        }
    }
    Ok(())
}

/// Process commands from a CSV reader.
///
/// Streaming parse: arbitrarily large files are handled without loading
/// everything into memory. Malformed rows and rejected commands are logged
/// and skipped; the batch keeps going.
///
/// # CSV Format
///
/// Columns: `op, room, room_type, rate, capacity, guest, email, check_in,
/// check_out, booking, amount, mode`
///
/// # Example
///
/// ```csv
/// op,room,room_type,rate,capacity,guest,email,check_in,check_out,booking,amount,mode
/// add_room,A1,standard,3000,2,,,,,,,
/// book,A1,,,,Asha Rao,asha@example.com,2026-02-10,2026-02-12,,,
/// checkin,,,,,,,2026-02-10,,1,,
/// pay,,,,,,,,,1,6000,card
/// checkout,,,,,,,,,1,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
pub fn process_commands<R: Read>(reader: R, config: EngineConfig) -> Result<Engine, csv::Error> {
    let engine = Engine::with_config(config);

    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All) // Handle whitespace in fields like " book "
        .flexible(true) // Allow trailing fields to be omitted
        .has_headers(true) // Skip first row as header
        .from_reader(reader);

    for result in rdr.deserialize::<CsvRecord>() {
        match result {
            Ok(record) => {
                let Some(command) = record.into_command() else {
                    warn!("skipping invalid command record");
                    continue;
                };

                // Rejected commands do not stop the batch
                if let Err(e) = apply(&engine, command) {
                    warn!(error = %e, "skipping rejected command");
                }
            }
            Err(e) => {
                warn!(error = %e, "skipping malformed row");
                continue;
            }
        }
    }

    Ok(engine)
}

/// Output row: one booking with its folio state.
#[derive(Debug, Serialize)]
struct BookingRow {
    booking: u64,
    room: String,
    guest: String,
    check_in: NaiveDate,
    check_out: NaiveDate,
    nights: i64,
    status: String,
    total: Decimal,
    paid: Decimal,
    due: Decimal,
}

/// Write booking states to a CSV writer.
///
/// # CSV Format
///
/// Columns: `booking, room, guest, check_in, check_out, nights, status,
/// total, paid, due`
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_bookings<W: Write>(engine: &Engine, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    for booking in engine.bookings() {
        let guest = engine
            .get_guest(booking.guest)
            .map(|g| g.name)
            .unwrap_or_default();
        let (paid, due) = engine
            .folio(booking.id)
            .map(|f| (f.paid, f.due))
            .unwrap_or((Decimal::ZERO, booking.total_amount));
        wtr.serialize(BookingRow {
            booking: booking.id.0,
            room: booking.room_number,
            guest,
            check_in: booking.check_in,
            check_out: booking.check_out,
            nights: booking.nights,
            status: booking.status.to_string(),
            total: booking.total_amount,
            paid,
            due,
        })?;
    }

    // Flush to ensure all data is written
    wtr.flush()?;
    Ok(())
}
