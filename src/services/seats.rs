//! Seat accounting for events.
//!
//! An event sells at most `capacity` seats. Every booking holds between
//! [`MIN_SEATS_PER_BOOKING`] and [`MAX_SEATS_PER_BOOKING`] of them, and the
//! sum over all bookings of an event never goes past the capacity.
//! Nothing here touches the database; callers load the capacity and the
//! booked total and ask these functions whether a change is allowed.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub const MIN_SEATS_PER_BOOKING: i32 = 1;
pub const MAX_SEATS_PER_BOOKING: i32 = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SeatError {
    #[error("A booking must hold between 1 and 4 seats, got {requested}.")]
    InvalidSeatCount { requested: i32 },
    #[error("Not enough seats available. Only {available} seats left.")]
    NotEnoughSeats { available: i64 },
    #[error("Cannot book a past event.")]
    EventAlreadyPassed,
    #[error("You cannot cancel a booking for an event that has already passed.")]
    CancellationClosed,
    #[error("Capacity {capacity} is below the {booked} seats already booked.")]
    CapacityBelowBooked { capacity: i32, booked: i64 },
}

/// Capacity of an event together with the seats already sold for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatAvailability {
    pub capacity: i32,
    pub booked_seats: i64,
}

impl SeatAvailability {
    pub fn new(capacity: i32, booked_seats: i64) -> Self {
        Self { capacity, booked_seats }
    }

    /// Seats that can still be sold.
    pub fn spots_left(&self) -> i64 {
        (i64::from(self.capacity) - self.booked_seats).max(0)
    }

    pub fn is_sold_out(&self) -> bool {
        self.spots_left() == 0
    }

    /// Accepts `requested` seats iff `booked + requested <= capacity`.
    pub fn check_request(&self, requested: i32) -> Result<(), SeatError> {
        if !(MIN_SEATS_PER_BOOKING..=MAX_SEATS_PER_BOOKING).contains(&requested) {
            return Err(SeatError::InvalidSeatCount { requested });
        }
        if self.booked_seats + i64::from(requested) > i64::from(self.capacity) {
            return Err(SeatError::NotEnoughSeats {
                available: self.spots_left(),
            });
        }
        Ok(())
    }

    /// Same check as [`check_request`](Self::check_request), returning the
    /// availability after the seats are taken.
    pub fn reserve(self, requested: i32) -> Result<Self, SeatError> {
        self.check_request(requested)?;
        Ok(Self {
            booked_seats: self.booked_seats + i64::from(requested),
            ..self
        })
    }
}

pub fn ensure_bookable(event_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), SeatError> {
    if event_date < now {
        return Err(SeatError::EventAlreadyPassed);
    }
    Ok(())
}

pub fn ensure_cancellable(event_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), SeatError> {
    if event_date < now {
        return Err(SeatError::CancellationClosed);
    }
    Ok(())
}

/// An admin may shrink an event, but never below what is already sold.
pub fn ensure_capacity_covers(capacity: i32, booked: i64) -> Result<(), SeatError> {
    if i64::from(capacity) < booked {
        return Err(SeatError::CapacityBelowBooked { capacity, booked });
    }
    Ok(())
}
