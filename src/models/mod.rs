pub mod user;
pub mod event;
pub mod booking;
pub mod pagination;

pub use user::{Role, User};
pub use event::{Event, EventView, NewEvent, Timeframe};
pub use booking::{Booking, BookingWithEvent};
pub use pagination::{Page, PaginationQuery};
