use crate::domain::{
    models::{pricing::PricingRule, service::{Service, ServiceResource}},
    ports::ServiceRepository,
};
use crate::error::AppError;
use async_trait::async_trait;
use sqlx::SqlitePool;

pub struct SqliteServiceRepo {
    pool: SqlitePool,
}

impl SqliteServiceRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ServiceRepository for SqliteServiceRepo {
    async fn create(&self, service: &Service) -> Result<Service, AppError> {
        sqlx::query_as::<_, Service>(
            "INSERT INTO services (id, business_id, name, duration_min, buffer_before_min, buffer_after_min, base_price_cents, currency, cancellation_policy_id, is_active, deleted_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&service.id).bind(&service.business_id).bind(&service.name).bind(service.duration_min)
            .bind(service.buffer_before_min).bind(service.buffer_after_min).bind(service.base_price_cents)
            .bind(&service.currency).bind(&service.cancellation_policy_id).bind(service.is_active)
            .bind(service.deleted_at).bind(service.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn find_by_id(&self, business_id: &str, id: &str) -> Result<Option<Service>, AppError> {
        sqlx::query_as::<_, Service>(
            "SELECT * FROM services WHERE business_id = ? AND id = ? AND is_active = TRUE AND deleted_at IS NULL"
        )
            .bind(business_id)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list(&self, business_id: &str) -> Result<Vec<Service>, AppError> {
        sqlx::query_as::<_, Service>(
            "SELECT * FROM services WHERE business_id = ? AND is_active = TRUE AND deleted_at IS NULL ORDER BY name ASC"
        )
            .bind(business_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn assign_resource(&self, mapping: &ServiceResource) -> Result<ServiceResource, AppError> {
        sqlx::query_as::<_, ServiceResource>(
            "INSERT INTO service_resources (service_id, resource_id, is_required) VALUES (?, ?, ?)
             ON CONFLICT (service_id, resource_id) DO UPDATE SET is_required = excluded.is_required
             RETURNING *"
        )
            .bind(&mapping.service_id)
            .bind(&mapping.resource_id)
            .bind(mapping.is_required)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_resources(&self, service_id: &str) -> Result<Vec<ServiceResource>, AppError> {
        sqlx::query_as::<_, ServiceResource>("SELECT * FROM service_resources WHERE service_id = ? ORDER BY resource_id ASC")
            .bind(service_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn create_pricing_rule(&self, rule: &PricingRule) -> Result<PricingRule, AppError> {
        sqlx::query_as::<_, PricingRule>(
            "INSERT INTO pricing_rules (id, service_id, name, days_mask, start_time, end_time, start_date, end_date, modifier_type, modifier_value, priority, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING *"
        )
            .bind(&rule.id).bind(&rule.service_id).bind(&rule.name).bind(rule.days_mask)
            .bind(rule.start_time).bind(rule.end_time).bind(rule.start_date).bind(rule.end_date)
            .bind(rule.modifier_type.as_str()).bind(rule.modifier_value).bind(rule.priority)
            .bind(rule.is_active).bind(rule.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::Database)
    }

    async fn list_pricing_rules(&self, service_id: &str) -> Result<Vec<PricingRule>, AppError> {
        sqlx::query_as::<_, PricingRule>(
            "SELECT * FROM pricing_rules WHERE service_id = ? ORDER BY priority DESC, created_at DESC"
        )
            .bind(service_id)
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::Database)
    }
}
