//! Event listing and administration.
//!
//! Public callers can page through upcoming and past events and look one up
//! by id. Creating, editing and deleting events is reserved to admins; those
//! endpoints take a multipart form so an image can travel with the fields.

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, ValidatedJson};
use crate::models::{Booking, Event, EventView, NewEvent, Page, PaginationQuery, Role, Timeframe};
use crate::services::seats::ensure_capacity_covers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/upcoming", get(find_upcoming))
        .route("/events/past", get(find_past))
        .route("/events/public/find", post(public_find_one))
        .route("/events", get(find_all).post(create_event).delete(remove_event))
        .route("/events/find", post(find_one))
        .route("/events/{id}", patch(update_event))
}

#[derive(Debug, Deserialize, Validate)]
pub struct IdentifierRequest {
    pub id: Uuid,
}

/* ---------- form parsing ---------- */

#[derive(Debug)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Fields of the create/update multipart form, all optional at this stage.
#[derive(Debug, Default)]
pub struct EventForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub location: Option<String>,
    pub capacity: Option<String>,
    pub tags: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub image: Option<UploadedImage>,
}

impl EventForm {
    pub async fn from_multipart(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = EventForm::default();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().map(str::to_string);
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // browsers send an empty part when no file was picked
                    if !bytes.is_empty() {
                        form.image = Some(UploadedImage { file_name, content_type, bytes });
                    }
                }
                "tags" | "tags[]" => {
                    let raw = field.text().await?;
                    form.tags.get_or_insert_with(Vec::new).extend(parse_tags(&raw));
                }
                "title" => form.title = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                "date" => form.date = Some(field.text().await?),
                "time" => form.time = Some(field.text().await?),
                "location" => form.location = Some(field.text().await?),
                "capacity" => form.capacity = Some(field.text().await?),
                "imageUrl" => form.image_url = Some(field.text().await?),
                other => {
                    tracing::debug!("ignoring unknown form field '{}'", other);
                }
            }
        }
        Ok(form)
    }

    fn required(value: Option<String>, field: &str) -> AppResult<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::BadRequest(format!("{field} should not be empty")))
    }

    // absent is fine, present must still be non-empty
    fn present(value: Option<String>, field: &str) -> AppResult<Option<String>> {
        value.map(|v| Self::required(Some(v), field)).transpose()
    }

    /// Checks the fields of an update form with the same rules as creation.
    /// The image part is handed back untouched.
    pub fn into_changes(self) -> AppResult<(EventChanges, Option<UploadedImage>)> {
        let date = match (&self.date, &self.time) {
            (Some(date), Some(time)) => Some(combine_date_and_time(date, time)?),
            _ => None,
        };
        let capacity = Self::present(self.capacity, "capacity")?
            .map(|raw| parse_capacity(&raw))
            .transpose()?;

        let changes = EventChanges {
            title: Self::present(self.title, "title")?,
            description: Self::present(self.description, "description")?,
            location: Self::present(self.location, "location")?,
            tags: self.tags,
            date,
            capacity,
            image_url: self.image_url,
        };
        Ok((changes, self.image))
    }
}

/// Parsed fields of an update. `None` leaves the stored value alone.
#[derive(Debug, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub tags: Option<Vec<String>>,
    pub date: Option<DateTime<Utc>>,
    pub capacity: Option<i32>,
    pub image_url: Option<String>,
}

impl EventChanges {
    pub fn apply(self, event: &mut Event, booked: i64) -> AppResult<()> {
        if let Some(capacity) = self.capacity {
            ensure_capacity_covers(capacity, booked)?;
            event.capacity = capacity;
        }
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(tags) = self.tags {
            event.tags = tags;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(image_url) = self.image_url {
            event.image_url = Some(image_url);
        }
        Ok(())
    }
}

pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_capacity(raw: &str) -> AppResult<i32> {
    match raw.trim().parse::<i32>() {
        Ok(capacity) if capacity > 0 => Ok(capacity),
        _ => Err(AppError::BadRequest(
            "Capacity must be a valid positive number.".to_string(),
        )),
    }
}

fn parse_event_date(raw: &str) -> AppResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.date_naive()))
        .map_err(|_| AppError::BadRequest("Invalid date format. Please use YYYY-MM-DD.".to_string()))
}

fn invalid_time() -> AppError {
    AppError::BadRequest("Invalid time format. Please use \"10:00AM\" or \"02:30 PM\".".to_string())
}

/// Parses "10:00AM", "02:30 pm" or "14:30" into 24h hours and minutes.
pub fn parse_time_of_day(raw: &str) -> AppResult<(u32, u32)> {
    let raw = raw.trim();
    let (hours, rest) = raw.split_once(':').ok_or_else(invalid_time)?;
    if hours.is_empty() || hours.len() > 2 || !hours.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid_time());
    }
    if rest.len() < 2 || !rest.is_char_boundary(2) {
        return Err(invalid_time());
    }
    let (minutes, modifier) = rest.split_at(2);
    if !minutes.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid_time());
    }

    let mut hours: u32 = hours.parse().map_err(|_| invalid_time())?;
    let minutes: u32 = minutes.parse().map_err(|_| invalid_time())?;
    if minutes > 59 {
        return Err(invalid_time());
    }

    match modifier.trim().to_ascii_uppercase().as_str() {
        "" if hours <= 23 => {}
        "PM" if (1..=12).contains(&hours) => {
            if hours < 12 {
                hours += 12;
            }
        }
        "AM" if (1..=12).contains(&hours) => {
            if hours == 12 {
                hours = 0;
            }
        }
        _ => return Err(invalid_time()),
    }
    Ok((hours, minutes))
}

/// The event starts on `date` at `time`, read as UTC.
pub fn combine_date_and_time(date: &str, time: &str) -> AppResult<DateTime<Utc>> {
    let day = parse_event_date(date)?;
    let (hours, minutes) = parse_time_of_day(time)?;
    day.and_hms_opt(hours, minutes, 0)
        .map(|naive| naive.and_utc())
        .ok_or_else(invalid_time)
}

fn parse_event_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::BadRequest("Validation failed (uuid is expected)".to_string()))
}

fn not_found(id: Uuid) -> AppError {
    AppError::EntityNotFound(format!("Event with ID \"{id}\" not found"))
}

async fn store_image(state: &AppState, image: Option<UploadedImage>) -> AppResult<Option<String>> {
    match image {
        Some(image) => {
            let path = state
                .images
                .save(image.file_name.as_deref(), image.content_type.as_deref(), &image.bytes)
                .await?;
            Ok(Some(path))
        }
        None => Ok(None),
    }
}

// The database step that would reference a freshly stored image failed
async fn discard_image(state: &AppState, stored: Option<&str>) {
    if let Some(path) = stored {
        if let Err(e) = state.images.remove(path).await {
            tracing::warn!(image = %path, "Failed to remove orphaned image: {}", e);
        }
    }
}

/* ---------- public ---------- */

// GET /api/events/upcoming
async fn find_upcoming(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> AppResult<Json<Page<EventView>>> {
    list_timeframe(&state, Timeframe::Upcoming, query).await
}

// GET /api/events/past
async fn find_past(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PaginationQuery>,
) -> AppResult<Json<Page<EventView>>> {
    list_timeframe(&state, Timeframe::Past, query).await
}

async fn list_timeframe(
    state: &AppState,
    timeframe: Timeframe,
    query: PaginationQuery,
) -> AppResult<Json<Page<EventView>>> {
    query.validate()?;
    let now = Utc::now();
    let events = Event::list_page(timeframe, now, query.limit(), query.offset(), &state.db.pool).await?;
    let total = Event::count(timeframe, now, &state.db.pool).await?;
    Ok(Json(Page::new(events, total, &query)))
}

// POST /api/events/public/find
async fn public_find_one(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<IdentifierRequest>,
) -> AppResult<Json<EventView>> {
    let event = Event::find_view(req.id, &state.db.pool)
        .await?
        .ok_or_else(|| not_found(req.id))?;
    Ok(Json(event))
}

/* ---------- admin ---------- */

// GET /api/events
async fn find_all(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> AppResult<Json<Vec<EventView>>> {
    user.require_role(Role::Admin)?;
    Ok(Json(Event::list_all(&state.db.pool).await?))
}

// POST /api/events/find
async fn find_one(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<IdentifierRequest>,
) -> AppResult<Json<EventView>> {
    user.require_role(Role::Admin)?;
    let event = Event::find_view(req.id, &state.db.pool)
        .await?
        .ok_or_else(|| not_found(req.id))?;
    Ok(Json(event))
}

// POST /api/events (multipart)
async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<impl IntoResponse> {
    user.require_role(Role::Admin)?;
    let form = EventForm::from_multipart(multipart).await?;

    let title = EventForm::required(form.title, "title")?;
    let description = EventForm::required(form.description, "description")?;
    let location = EventForm::required(form.location, "location")?;
    let (Some(date), Some(time)) = (form.date, form.time) else {
        return Err(AppError::BadRequest("Date and time are required.".to_string()));
    };
    let date = combine_date_and_time(&date, &time)?;
    let capacity = parse_capacity(&EventForm::required(form.capacity, "capacity")?)?;

    let stored = store_image(&state, form.image).await?;
    let created = Event::create(
        NewEvent {
            title,
            description,
            date,
            location,
            capacity,
            tags: form.tags.unwrap_or_default(),
            image_url: stored.clone().or(form.image_url),
        },
        &state.db.pool,
    )
    .await;
    let event = match created {
        Ok(event) => event,
        Err(e) => {
            discard_image(&state, stored.as_deref()).await;
            return Err(e.into());
        }
    };

    tracing::info!(event_id = %event.id, admin = %user.email, "Event created");
    Ok((StatusCode::CREATED, Json(EventView::new(event, 0))))
}

// PATCH /api/events/{id} (multipart)
async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> AppResult<Json<EventView>> {
    user.require_role(Role::Admin)?;
    let id = parse_event_id(&id)?;
    let (mut changes, image) = EventForm::from_multipart(multipart).await?.into_changes()?;

    // Written before the row lock is taken
    let stored = store_image(&state, image).await?;
    if let Some(path) = &stored {
        changes.image_url = Some(path.clone());
    }

    match save_changes(&state, id, changes).await {
        Ok(view) => {
            tracing::info!(event_id = %view.event.id, admin = %user.email, "Event updated");
            Ok(Json(view))
        }
        Err(e) => {
            discard_image(&state, stored.as_deref()).await;
            Err(e)
        }
    }
}

async fn save_changes(state: &AppState, id: Uuid, changes: EventChanges) -> AppResult<EventView> {
    let mut tx = state.db.pool.begin().await?;
    let mut event = Event::find_for_update(id, &mut tx)
        .await?
        .ok_or_else(|| not_found(id))?;
    let booked = Booking::booked_seats(id, &mut tx).await?;

    changes.apply(&mut event, booked)?;
    let saved = event.save(&mut tx).await?;
    tx.commit().await?;
    Ok(EventView::new(saved, booked))
}

// DELETE /api/events
async fn remove_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<IdentifierRequest>,
) -> AppResult<StatusCode> {
    user.require_role(Role::Admin)?;
    if !Event::delete(req.id, &state.db.pool).await? {
        return Err(not_found(req.id));
    }
    tracing::info!(event_id = %req.id, admin = %user.email, "Event deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn twelve_hour_times_convert_to_24h() {
        assert_eq!(parse_time_of_day("10:00AM").unwrap(), (10, 0));
        assert_eq!(parse_time_of_day("02:30 PM").unwrap(), (14, 30));
        assert_eq!(parse_time_of_day("12:15 pm").unwrap(), (12, 15));
        assert_eq!(parse_time_of_day("12:45am").unwrap(), (0, 45));
        assert_eq!(parse_time_of_day("7:05 AM").unwrap(), (7, 5));
    }

    #[test]
    fn plain_24h_times_are_accepted() {
        assert_eq!(parse_time_of_day("18:20").unwrap(), (18, 20));
        assert_eq!(parse_time_of_day("0:00").unwrap(), (0, 0));
    }

    #[test]
    fn malformed_times_are_rejected() {
        for bad in ["", "10", "10:0", "25:00", "13:00 PM", "0:30 AM", "10:60", "10:00 XM", "ab:cd", "100:00"] {
            assert!(parse_time_of_day(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn date_and_time_combine_in_utc() {
        let at = combine_date_and_time("2026-12-24", "07:30 PM").unwrap();
        assert_eq!((at.year(), at.month(), at.day()), (2026, 12, 24));
        assert_eq!((at.hour(), at.minute(), at.second()), (19, 30, 0));

        let from_iso = combine_date_and_time("2026-12-24T00:00:00.000Z", "9:00AM").unwrap();
        assert_eq!(from_iso.hour(), 9);

        assert!(combine_date_and_time("24/12/2026", "9:00AM").is_err());
    }

    #[test]
    fn tags_are_split_and_trimmed() {
        assert_eq!(parse_tags(" rust, web ,, meetup "), vec!["rust", "web", "meetup"]);
        assert!(parse_tags("  ").is_empty());
    }

    #[test]
    fn capacity_must_be_positive() {
        assert_eq!(parse_capacity(" 120 ").unwrap(), 120);
        assert!(parse_capacity("0").is_err());
        assert!(parse_capacity("-4").is_err());
        assert!(parse_capacity("ten").is_err());
    }

    #[test]
    fn required_fields_are_trimmed() {
        assert_eq!(EventForm::required(Some("  Expo ".into()), "title").unwrap(), "Expo");
        let err = EventForm::required(Some("   ".into()), "title").unwrap_err();
        assert_eq!(err.to_string(), "title should not be empty");
        assert!(EventForm::required(None, "location").is_err());
    }

    fn sample_event() -> Event {
        let now = Utc::now();
        Event {
            id: Uuid::new_v4(),
            title: "Rust Dhaka".to_string(),
            description: "Monthly meetup".to_string(),
            date: now,
            location: "Banani".to_string(),
            capacity: 40,
            tags: vec!["rust".to_string()],
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn update_form_rejects_blank_fields_that_are_sent() {
        for field in ["title", "description", "location", "capacity"] {
            let mut form = EventForm::default();
            let blank = Some("   ".to_string());
            match field {
                "title" => form.title = blank,
                "description" => form.description = blank,
                "location" => form.location = blank,
                _ => form.capacity = blank,
            }
            let err = form.into_changes().unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)), "{field}");
        }

        let (changes, image) = EventForm::default().into_changes().unwrap();
        assert!(changes.title.is_none() && changes.capacity.is_none());
        assert!(image.is_none());
    }

    #[test]
    fn update_changes_apply_only_sent_fields() {
        let form = EventForm {
            title: Some("  Rust Dhaka #12 ".into()),
            capacity: Some("60".into()),
            date: Some("2026-12-24".into()),
            time: Some("06:00 PM".into()),
            ..EventForm::default()
        };
        let (changes, _) = form.into_changes().unwrap();

        let mut event = sample_event();
        changes.apply(&mut event, 10).unwrap();
        assert_eq!(event.title, "Rust Dhaka #12");
        assert_eq!(event.capacity, 60);
        assert_eq!((event.date.hour(), event.date.day()), (18, 24));
        assert_eq!(event.location, "Banani");
        assert_eq!(event.description, "Monthly meetup");
    }

    #[test]
    fn update_cannot_shrink_capacity_below_booked() {
        let changes = EventChanges { capacity: Some(5), ..EventChanges::default() };
        let mut event = sample_event();
        let err = changes.apply(&mut event, 8).unwrap_err();
        assert!(matches!(err, AppError::Seats(_)));
        assert_eq!(event.capacity, 40);
    }

    #[test]
    fn event_id_path_must_be_uuid() {
        assert!(parse_event_id("not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_event_id(&id.to_string()).unwrap(), id);
    }
}
