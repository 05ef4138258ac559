use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;
use std::fmt;

use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Staff,
    Room,
    Table,
    Trainer,
    Equipment,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Staff => "staff",
            ResourceType::Room => "room",
            ResourceType::Table => "table",
            ResourceType::Trainer => "trainer",
            ResourceType::Equipment => "equipment",
        }
    }
}

impl TryFrom<String> for ResourceType {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "staff" => Ok(ResourceType::Staff),
            "room" => Ok(ResourceType::Room),
            "table" => Ok(ResourceType::Table),
            "trainer" => Ok(ResourceType::Trainer),
            "equipment" => Ok(ResourceType::Equipment),
            other => Err(AppError::Validation(format!("Unknown resource type: {}", other))),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct Resource {
    pub id: String,
    pub business_id: String,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub resource_type: ResourceType,
    pub capacity: i32,
    pub is_active: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(business_id: String, name: String, resource_type: ResourceType, capacity: i32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            business_id,
            name,
            resource_type,
            capacity,
            is_active: true,
            deleted_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_bookable(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }
}

/// A working window for a resource on one weekday (0 = Monday).
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ResourceHours {
    pub id: String,
    pub resource_id: String,
    pub weekday: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ResourceHours {
    pub fn new(resource_id: String, weekday: i32, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            resource_id,
            weekday,
            start_time,
            end_time,
        }
    }
}

/// Time off for a resource.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
pub struct ResourceException {
    pub id: String,
    pub resource_id: String,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ResourceException {
    pub fn new(resource_id: String, start_at: DateTime<Utc>, end_at: DateTime<Utc>, reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            resource_id,
            start_at,
            end_at,
            reason,
            created_at: Utc::now(),
        }
    }
}

/// Working hours and time off of a resource, as loaded for calendar resolution.
#[derive(Debug, Clone)]
pub struct ResourceCalendar {
    pub resource_id: String,
    pub hours: Vec<ResourceHours>,
    pub exceptions: Vec<ResourceException>,
}
