use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::Event;

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub number_of_seats: i32,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithEvent {
    #[serde(flatten)]
    pub booking: Booking,
    pub event: Event,
}

impl Booking {
    /// Sum of seats held for an event. Inside the booking transaction the
    /// event row is already locked, so the total cannot move underneath us.
    pub async fn booked_seats(
        event_id: Uuid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(number_of_seats), 0)::BIGINT FROM bookings WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn create(
        user_id: Uuid,
        event_id: Uuid,
        number_of_seats: i32,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Booking, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (number_of_seats, user_id, event_id)
            VALUES ($1, $2, $3)
            RETURNING id, number_of_seats, user_id, event_id, created_at
            "#,
        )
        .bind(number_of_seats)
        .bind(user_id)
        .bind(event_id)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Booking>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            "SELECT id, number_of_seats, user_id, event_id, created_at FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Bookings of one user with their events, soonest event first.
    pub async fn list_for_user(
        user_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<BookingWithEvent>, sqlx::Error> {
        let bookings = sqlx::query_as::<_, Booking>(
            "SELECT id, number_of_seats, user_id, event_id, created_at FROM bookings WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        if bookings.is_empty() {
            return Ok(vec![]);
        }

        let event_ids: Vec<Uuid> = bookings.iter().map(|b| b.event_id).collect();
        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT id, title, description, date, location, capacity, tags, image_url, created_at, updated_at
            FROM events
            WHERE id = ANY($1)
            "#,
        )
        .bind(&event_ids)
        .fetch_all(pool)
        .await?;

        Ok(attach_events(bookings, events))
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn attach_events(bookings: Vec<Booking>, events: Vec<Event>) -> Vec<BookingWithEvent> {
    let by_id: HashMap<Uuid, Event> = events.into_iter().map(|e| (e.id, e)).collect();
    let mut joined: Vec<BookingWithEvent> = bookings
        .into_iter()
        .filter_map(|booking| {
            let event = by_id.get(&booking.event_id)?.clone();
            Some(BookingWithEvent { booking, event })
        })
        .collect();
    joined.sort_by(|a, b| {
        a.event
            .date
            .cmp(&b.event.date)
            .then(a.booking.created_at.cmp(&b.booking.created_at))
    });
    joined
}
