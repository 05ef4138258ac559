pub mod availability;
pub mod booking_engine;
pub mod calendar;
pub mod cancellation;
pub mod conflict;
pub mod group;
pub mod idempotency;
pub mod pricing;
pub mod waitlist;
