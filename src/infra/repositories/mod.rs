pub mod sqlite_business_repo;
pub mod sqlite_resource_repo;
pub mod sqlite_service_repo;
pub mod sqlite_policy_repo;
pub mod sqlite_booking_repo;
pub mod sqlite_waitlist_repo;
pub mod sqlite_group_repo;
pub mod sqlite_idempotency_repo;
pub mod sqlite_notification_repo;

pub mod postgres_business_repo;
pub mod postgres_resource_repo;
pub mod postgres_service_repo;
pub mod postgres_policy_repo;
pub mod postgres_booking_repo;
pub mod postgres_waitlist_repo;
pub mod postgres_group_repo;
pub mod postgres_idempotency_repo;
pub mod postgres_notification_repo;
