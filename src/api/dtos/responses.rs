use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::models::{booking::Booking, group::GroupDetails};
use crate::domain::services::calendar::LocalInterval;

#[derive(Serialize)]
pub struct SlotsResponse {
    pub date: NaiveDate,
    pub slots: Vec<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct CalendarResponse {
    pub date: NaiveDate,
    pub windows: Vec<LocalInterval>,
}

#[derive(Serialize)]
pub struct GroupBookingResponse {
    pub booking: Booking,
    #[serde(flatten)]
    pub details: GroupDetails,
}

#[derive(Serialize)]
pub struct InProgressResponse {
    pub status: &'static str,
    pub message: &'static str,
}
