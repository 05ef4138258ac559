use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Business {
    pub id: String,
    pub name: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl Business {
    pub fn new(name: String, timezone: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            timezone,
            created_at: Utc::now(),
        }
    }

    pub fn tz(&self) -> Result<Tz, AppError> {
        self.timezone.parse::<Tz>()
            .map_err(|_| AppError::InternalWithMsg(format!("Business {} has invalid timezone {}", self.id, self.timezone)))
    }
}

/// Opening hours for one weekday. `weekday` is 0 for Monday through 6 for Sunday.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct BusinessHours {
    pub business_id: String,
    pub weekday: i32,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub is_closed: bool,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Holiday {
    pub id: String,
    pub business_id: String,
    pub date: NaiveDate,
    pub name: String,
}

impl Holiday {
    pub fn new(business_id: String, date: NaiveDate, name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            date,
            name,
        }
    }
}

/// Everything the calendar resolver needs to know about a business.
#[derive(Debug, Clone)]
pub struct BusinessCalendar {
    pub tz: Tz,
    pub hours: Vec<BusinessHours>,
    pub holidays: Vec<NaiveDate>,
}
