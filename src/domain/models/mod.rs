pub mod booking;
pub mod business;
pub mod cancellation;
pub mod group;
pub mod idempotency;
pub mod notification;
pub mod pricing;
pub mod resource;
pub mod service;
pub mod waitlist;
