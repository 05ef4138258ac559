pub mod availability;
pub mod booking;
pub mod business;
pub mod group;
pub mod health;
pub mod policy;
pub mod resource;
pub mod service;
pub mod waitlist;
