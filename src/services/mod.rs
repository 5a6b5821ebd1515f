pub mod auth;
pub mod seats;
pub mod seed;
pub mod uploads;
