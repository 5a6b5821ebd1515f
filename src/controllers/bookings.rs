use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::{Booking, BookingWithEvent, Event, Role};
use crate::services::seats::{
    ensure_bookable, ensure_cancellable, SeatAvailability, MAX_SEATS_PER_BOOKING,
    MIN_SEATS_PER_BOOKING,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/bookings", post(create_booking))
        .route("/bookings/my-bookings", get(find_my_bookings))
        .route("/bookings/cancel", delete(cancel_booking))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub event_id: Uuid,
    #[validate(custom(function = "validate_seat_count"))]
    pub number_of_seats: i32,
}

fn validate_seat_count(seats: i32) -> Result<(), ValidationError> {
    if seats < MIN_SEATS_PER_BOOKING {
        return Err(ValidationError::new("min_seats")
            .with_message(Cow::Borrowed("You must book at least 1 seat.")));
    }
    if seats > MAX_SEATS_PER_BOOKING {
        return Err(ValidationError::new("max_seats")
            .with_message(Cow::Borrowed("You cannot book more than 4 seats.")));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    pub booking_id: Uuid,
}

/* ---------- BOOKINGS ---------- */

// POST /api/bookings
async fn create_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    user.require_role(Role::User)?;

    // The event row stays locked until commit, so concurrent bookings for
    // the same event see each other's seats.
    let mut tx = state.db.pool.begin().await?;

    let event = Event::find_for_update(req.event_id, &mut tx)
        .await?
        .ok_or_else(|| {
            AppError::EntityNotFound(format!("Event with ID \"{}\" not found", req.event_id))
        })?;
    ensure_bookable(event.date, Utc::now())?;

    let booked = Booking::booked_seats(event.id, &mut tx).await?;
    let after = SeatAvailability::new(event.capacity, booked).reserve(req.number_of_seats)?;

    let booking = Booking::create(user.id, event.id, req.number_of_seats, &mut tx).await?;
    tx.commit().await?;

    tracing::info!(
        booking_id = %booking.id,
        event_id = %event.id,
        seats = booking.number_of_seats,
        spots_left = after.spots_left(),
        "Booking created"
    );
    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/my-bookings
async fn find_my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<Vec<BookingWithEvent>>> {
    user.require_role(Role::User)?;
    let bookings = Booking::list_for_user(user.id, &state.db.pool).await?;
    Ok(Json(bookings))
}

// DELETE /api/bookings/cancel
async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<CancelBookingRequest>,
) -> AppResult<StatusCode> {
    user.require_role(Role::User)?;

    let not_found =
        || AppError::EntityNotFound(format!("Booking with ID \"{}\" not found", req.booking_id));

    let booking = Booking::find_by_id(req.booking_id, &state.db.pool)
        .await?
        .ok_or_else(not_found)?;
    if booking.user_id != user.id {
        return Err(AppError::Forbidden(
            "You are not authorized to cancel this booking.".to_string(),
        ));
    }

    let event = Event::find_by_id(booking.event_id, &state.db.pool)
        .await?
        .ok_or_else(not_found)?;
    ensure_cancellable(event.date, Utc::now())?;

    if !Booking::delete(booking.id, &state.db.pool).await? {
        return Err(not_found());
    }

    tracing::info!(booking_id = %booking.id, event_id = %event.id, "Booking cancelled");
    Ok(StatusCode::NO_CONTENT)
}
