use std::sync::Arc;
use crate::domain::ports::{
    BusinessRepository, CancellationPolicyRepository, NotificationRepository, ResourceRepository,
    ServiceRepository,
};
use crate::domain::services::{
    booking_engine::BookingEngine, group::GroupBookingAllocator, waitlist::WaitlistManager,
};
use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub business_repo: Arc<dyn BusinessRepository>,
    pub resource_repo: Arc<dyn ResourceRepository>,
    pub service_repo: Arc<dyn ServiceRepository>,
    pub policy_repo: Arc<dyn CancellationPolicyRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub engine: Arc<BookingEngine>,
    pub waitlist: Arc<WaitlistManager>,
    pub groups: Arc<GroupBookingAllocator>,
}
