pub mod api;
pub mod models;
pub mod time_of_day;
