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

//! Room management and the housekeeping state machine.
//!
//! Implemented State Machine
//!
//  Clean ──check-in──► Occupied ──check-out──► Dirty ──clean──► Clean
//    │                     │                     │
//    └──block──► Maintenance ◄──block── Dirty/Clean (Occupied rejects)
//                     │
//                     └──restore──► Dirty
//!
//! The machine is consulted, never bypassed: the lifecycle manager drives
//! the occupy/vacate edges and staff actions drive the rest.

use crate::base::{BookingId, DateRange, RoomId};
use crate::error::EngineError;
use crate::interval::IntervalSet;
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Housekeeping/availability status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Clean,
    Dirty,
    Maintenance,
    Occupied,
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomStatus::Clean => "Clean",
            RoomStatus::Dirty => "Dirty",
            RoomStatus::Maintenance => "Maintenance",
            RoomStatus::Occupied => "Occupied",
        };
        f.write_str(name)
    }
}

/// Room category; drives nothing in the engine beyond configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomType {
    Standard,
    Deluxe,
    Suite,
    Executive,
}

/// Explicit staff actions on a room's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomAction {
    /// Take the room out of service (any state except Occupied).
    Block,
    /// Return a blocked room to service; lands on Dirty for housekeeping.
    Restore,
    /// Housekeeping marks a dirty room clean.
    Clean,
}

/// Staff-facing room configuration used at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    pub number: String,
    pub room_type: RoomType,
    /// Nightly rate before tax.
    pub rate: Decimal,
    pub max_occupancy: u32,
    #[serde(default)]
    pub amenities: Vec<String>,
}

#[derive(Debug)]
pub(crate) struct RoomData {
    id: RoomId,
    number: String,
    room_type: RoomType,
    rate: Decimal,
    max_occupancy: u32,
    amenities: Vec<String>,
    status: RoomStatus,
    /// Date ranges committed by active bookings.
    claims: IntervalSet,
}

impl RoomData {
    fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            id,
            number: config.number,
            room_type: config.room_type,
            rate: config.rate,
            max_occupancy: config.max_occupancy,
            amenities: config.amenities,
            status: RoomStatus::Clean,
            claims: IntervalSet::new(),
        }
    }

    pub(crate) fn number(&self) -> &str {
        &self.number
    }

    pub(crate) fn rate(&self) -> Decimal {
        self.rate
    }

    pub(crate) fn max_occupancy(&self) -> u32 {
        self.max_occupancy
    }

    pub(crate) fn status(&self) -> RoomStatus {
        self.status
    }

    /// Availability test for a candidate range: in service and no
    /// overlapping active claim.
    pub(crate) fn is_available_for(&self, range: &DateRange) -> bool {
        self.status != RoomStatus::Maintenance && !self.claims.overlaps(range)
    }

    /// Commits a claim, re-validating overlap under the room lock.
    pub(crate) fn try_claim(
        &mut self,
        booking: BookingId,
        range: DateRange,
    ) -> Result<(), EngineError> {
        if self.status == RoomStatus::Maintenance {
            return Err(EngineError::RoomUnavailable {
                room_number: self.number.clone(),
            });
        }
        self.claims
            .try_claim(booking, range)
            .map_err(|_conflict| EngineError::RoomUnavailable {
                room_number: self.number.clone(),
            })
    }

    pub(crate) fn release_claim(&mut self, booking: BookingId) -> bool {
        self.claims.release(booking)
    }

    pub(crate) fn claim_count(&self) -> usize {
        self.claims.len()
    }

    /// Applies an explicit staff action. Any edge not drawn in the machine
    /// is rejected.
    pub(crate) fn apply(&mut self, action: RoomAction) -> Result<RoomStatus, EngineError> {
        match action {
            RoomAction::Block => match self.status {
                RoomStatus::Occupied => Err(EngineError::RoomBusy {
                    room_number: self.number.clone(),
                    status: self.status,
                }),
                _ => {
                    self.status = RoomStatus::Maintenance;
                    Ok(self.status)
                }
            },
            RoomAction::Restore => match self.status {
                RoomStatus::Maintenance => {
                    self.status = RoomStatus::Dirty;
                    Ok(self.status)
                }
                from => Err(EngineError::InvalidRoomTransition {
                    from,
                    to: RoomStatus::Dirty,
                }),
            },
            RoomAction::Clean => match self.status {
                RoomStatus::Dirty => {
                    self.status = RoomStatus::Clean;
                    Ok(self.status)
                }
                from => Err(EngineError::InvalidRoomTransition {
                    from,
                    to: RoomStatus::Clean,
                }),
            },
        }
    }

    /// Check-in edge: Clean -> Occupied.
    ///
    /// Maintenance rejects with `RoomBusy` even when a booking nominally
    /// references this room; a Dirty room must be cleaned first.
    pub(crate) fn occupy(&mut self) -> Result<(), EngineError> {
        match self.status {
            RoomStatus::Clean => {
                self.status = RoomStatus::Occupied;
                Ok(())
            }
            RoomStatus::Maintenance => Err(EngineError::RoomBusy {
                room_number: self.number.clone(),
                status: self.status,
            }),
            from => Err(EngineError::InvalidRoomTransition {
                from,
                to: RoomStatus::Occupied,
            }),
        }
    }

    /// Check-out edge: Occupied -> Dirty (awaiting housekeeping).
    pub(crate) fn vacate(&mut self) -> Result<(), EngineError> {
        match self.status {
            RoomStatus::Occupied => {
                self.status = RoomStatus::Dirty;
                Ok(())
            }
            from => Err(EngineError::InvalidRoomTransition {
                from,
                to: RoomStatus::Dirty,
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            number: self.number.clone(),
            room_type: self.room_type,
            rate: self.rate,
            max_occupancy: self.max_occupancy,
            amenities: self.amenities.clone(),
            status: self.status(),
            active_claims: self.claim_count(),
        }
    }
}

/// A hotel room.
#[derive(Debug)]
pub struct Room {
    /// Human-facing room number; immutable for the life of the room, so it
    /// stays readable while the data mutex is held elsewhere.
    number: String,
    inner: Mutex<RoomData>,
}

impl Room {
    pub(crate) fn new(id: RoomId, config: RoomConfig) -> Self {
        Self {
            number: config.number.clone(),
            inner: Mutex::new(RoomData::new(id, config)),
        }
    }

    pub fn id(&self) -> RoomId {
        self.inner.lock().id
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn status(&self) -> RoomStatus {
        self.inner.lock().status
    }

    pub fn rate(&self) -> Decimal {
        self.inner.lock().rate
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.inner.lock().snapshot()
    }

    /// Acquires the room lock within the bounded wait.
    ///
    /// # Errors
    ///
    /// Returns the retryable [`EngineError::Busy`] on timeout.
    pub(crate) fn lock_for(&self, wait: Duration) -> Result<MutexGuard<'_, RoomData>, EngineError> {
        self.inner.try_lock_for(wait).ok_or_else(|| EngineError::Busy {
            resource: format!("room {}", self.number),
        })
    }

    /// Uncontended lock for read paths that tolerate in-flight writes.
    pub(crate) fn read(&self) -> MutexGuard<'_, RoomData> {
        self.inner.lock()
    }
}

/// Owned copy of room state returned by engine operations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub number: String,
    pub room_type: RoomType,
    pub rate: Decimal,
    pub max_occupancy: u32,
    pub amenities: Vec<String>,
    pub status: RoomStatus,
    pub active_claims: usize,
}
