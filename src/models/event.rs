use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::services::seats::SeatAvailability;

const EVENT_COLUMNS: &str =
    "e.id, e.title, e.description, e.date, e.location, e.capacity, e.tags, e.image_url, e.created_at, e.updated_at";

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Event row joined with the sum of its booked seats
#[derive(Debug, Clone, FromRow)]
struct EventRow {
    #[sqlx(flatten)]
    event: Event,
    booked_seats: i64,
}

/// Event as returned by the API, with its seat counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub booked_seats: i64,
    pub spots_left: i64,
}

impl EventView {
    pub fn new(event: Event, booked_seats: i64) -> Self {
        let seats = SeatAvailability::new(event.capacity, booked_seats);
        Self {
            spots_left: seats.spots_left(),
            booked_seats,
            event,
        }
    }
}

impl From<EventRow> for EventView {
    fn from(row: EventRow) -> Self {
        EventView::new(row.event, row.booked_seats)
    }
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub tags: Vec<String>,
    pub image_url: Option<String>,
}

/// Which slice of the calendar a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Upcoming,
    Past,
}

impl Timeframe {
    fn condition(self) -> &'static str {
        match self {
            Timeframe::Upcoming => "e.date > $1",
            Timeframe::Past => "e.date < $1",
        }
    }

    // upcoming soonest first, past most recent first
    fn ordering(self) -> &'static str {
        match self {
            Timeframe::Upcoming => "e.date ASC",
            Timeframe::Past => "e.date DESC",
        }
    }
}

impl Event {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Event>, sqlx::Error> {
        let q = format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1");
        sqlx::query_as::<_, Event>(&q)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Loads the event and locks its row until `tx` ends, so bookings and
    /// edits of the same event are applied one at a time.
    pub async fn find_for_update(
        id: Uuid,
        tx: &mut Transaction<'_, Postgres>,
    ) -> Result<Option<Event>, sqlx::Error> {
        let q = format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1 FOR UPDATE");
        sqlx::query_as::<_, Event>(&q)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
    }

    pub async fn find_view(id: Uuid, pool: &PgPool) -> Result<Option<EventView>, sqlx::Error> {
        let q = format!(
            "SELECT {EVENT_COLUMNS}, COALESCE(SUM(b.number_of_seats), 0)::BIGINT AS booked_seats
             FROM events e
             LEFT JOIN bookings b ON b.event_id = e.id
             WHERE e.id = $1
             GROUP BY e.id"
        );
        let row = sqlx::query_as::<_, EventRow>(&q)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(EventView::from))
    }

    pub async fn list_all(pool: &PgPool) -> Result<Vec<EventView>, sqlx::Error> {
        let q = format!(
            "SELECT {EVENT_COLUMNS}, COALESCE(SUM(b.number_of_seats), 0)::BIGINT AS booked_seats
             FROM events e
             LEFT JOIN bookings b ON b.event_id = e.id
             GROUP BY e.id
             ORDER BY e.date ASC"
        );
        let rows = sqlx::query_as::<_, EventRow>(&q).fetch_all(pool).await?;
        Ok(rows.into_iter().map(EventView::from).collect())
    }

    pub async fn list_page(
        timeframe: Timeframe,
        now: DateTime<Utc>,
        limit: i64,
        offset: i64,
        pool: &PgPool,
    ) -> Result<Vec<EventView>, sqlx::Error> {
        let q = format!(
            "SELECT {EVENT_COLUMNS}, COALESCE(SUM(b.number_of_seats), 0)::BIGINT AS booked_seats
             FROM events e
             LEFT JOIN bookings b ON b.event_id = e.id
             WHERE {}
             GROUP BY e.id
             ORDER BY {}
             LIMIT $2 OFFSET $3",
            timeframe.condition(),
            timeframe.ordering()
        );
        let rows = sqlx::query_as::<_, EventRow>(&q)
            .bind(now)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(EventView::from).collect())
    }

    pub async fn count(
        timeframe: Timeframe,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<i64, sqlx::Error> {
        let q = format!("SELECT COUNT(*) FROM events e WHERE {}", timeframe.condition());
        sqlx::query_scalar::<_, i64>(&q).bind(now).fetch_one(pool).await
    }

    pub async fn create(new: NewEvent, pool: &PgPool) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (title, description, date, location, capacity, tags, image_url)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, title, description, date, location, capacity, tags, image_url, created_at, updated_at
            "#,
        )
        .bind(new.title)
        .bind(new.description)
        .bind(new.date)
        .bind(new.location)
        .bind(new.capacity)
        .bind(new.tags)
        .bind(new.image_url)
        .fetch_one(pool)
        .await
    }

    /// Writes every editable column of `self` back to its row.
    pub async fn save(&self, tx: &mut Transaction<'_, Postgres>) -> Result<Event, sqlx::Error> {
        sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = $2, description = $3, date = $4, location = $5,
                capacity = $6, tags = $7, image_url = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING id, title, description, date, location, capacity, tags, image_url, created_at, updated_at
            "#,
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.date)
        .bind(&self.location)
        .bind(self.capacity)
        .bind(&self.tags)
        .bind(&self.image_url)
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_event(capacity: i32) -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "RustConf meetup".to_string(),
            description: "Talks and pizza".to_string(),
            date: now + Duration::days(7),
            location: "Dhaka".to_string(),
            capacity,
            tags: vec!["rust".to_string(), "meetup".to_string()],
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn view_carries_seat_counts_next_to_event_fields() {
        let view = EventView::new(sample_event(50), 12);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["capacity"], 50);
        assert_eq!(json["bookedSeats"], 12);
        assert_eq!(json["spotsLeft"], 38);
        assert_eq!(json["title"], "RustConf meetup");
        assert!(json["imageUrl"].is_null());
    }

    #[test]
    fn timeframes_split_on_now() {
        assert_eq!(Timeframe::Upcoming.condition(), "e.date > $1");
        assert_eq!(Timeframe::Past.condition(), "e.date < $1");
        assert_eq!(Timeframe::Past.ordering(), "e.date DESC");
    }
}
