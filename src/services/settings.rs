//! Typed access to named system settings.
//!
//! Settings live in the `app_settings` table as strings and are read
//! per-request through a short-TTL cache. Typed getters degrade to their
//! documented defaults when a row is absent or unreadable, so a settings
//! outage can relax policy but never abort a request.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::cache::Cache;
use crate::db::DbPool;
use crate::entities::app_setting;
use crate::errors::ServiceError;

pub const ALLOW_RESELLER_PRICE_OVERRIDE: &str = "allowResellerPriceOverride";
pub const MIN_INVOICE_AMOUNT: &str = "minInvoiceAmount";
pub const MAX_CONSUMERS_PER_RESELLER: &str = "maxConsumersPerReseller";
pub const REQUIRE_RESELLER_APPROVAL: &str = "requireResellerApproval";
pub const DEFAULT_RESELLER_COMMISSION: &str = "default_reseller_commission";

/// Commission applied when neither a personal rate nor the system default
/// setting exists.
pub const HARDCODED_DEFAULT_COMMISSION: Decimal = dec!(10.00);

#[derive(Clone)]
pub struct SettingsProvider {
    db: Arc<DbPool>,
    cache: Cache,
    ttl: Duration,
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl SettingsProvider {
    pub fn new(db: Arc<DbPool>, cache: Cache, ttl: Duration) -> Self {
        Self { db, cache, ttl }
    }

    fn cache_key(key: &str) -> String {
        format!("settings:{}", key)
    }

    /// Fetch the raw string value for a setting, via the cache.
    pub async fn get_raw(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let cache_key = Self::cache_key(key);
        match self.cache.get_json::<String>(&cache_key).await {
            Ok(Some(value)) => return Ok(Some(value)),
            Ok(None) => {}
            Err(e) => warn!(key, error = %e, "settings cache read failed; falling through"),
        }

        let row = app_setting::Entity::find_by_id(key.to_string())
            .one(&*self.db)
            .await?;

        if let Some(row) = &row {
            if let Err(e) = self
                .cache
                .set_json(&cache_key, &row.value, self.ttl)
                .await
            {
                warn!(key, error = %e, "settings cache write failed");
            }
        }

        Ok(row.map(|r| r.value))
    }

    /// Upsert a setting and purge its cache entry.
    pub async fn set(&self, key: &str, value: &str) -> Result<app_setting::Model, ServiceError> {
        let existing = app_setting::Entity::find_by_id(key.to_string())
            .one(&*self.db)
            .await?;

        let model = match existing {
            Some(row) => {
                let mut active: app_setting::ActiveModel = row.into();
                active.value = Set(value.to_string());
                active.updated_at = Set(Utc::now());
                active.update(&*self.db).await?
            }
            None => {
                app_setting::ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    updated_at: Set(Utc::now()),
                }
                .insert(&*self.db)
                .await?
            }
        };

        if let Err(e) = self.cache.delete(&Self::cache_key(key)).await {
            warn!(key, error = %e, "settings cache invalidation failed");
        }

        Ok(model)
    }

    /// List all settings rows (admin surface).
    pub async fn list(&self) -> Result<Vec<app_setting::Model>, ServiceError> {
        Ok(app_setting::Entity::find().all(&*self.db).await?)
    }

    async fn raw_or_default(&self, key: &str) -> Option<String> {
        match self.get_raw(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "settings lookup failed; using default");
                None
            }
        }
    }

    /// Whether resellers may override unit prices upward. Default: true.
    pub async fn allow_reseller_price_override(&self) -> bool {
        self.raw_or_default(ALLOW_RESELLER_PRICE_OVERRIDE)
            .await
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(true)
    }

    /// Minimum accepted invoice total. Unset or non-positive disables the check.
    pub async fn min_invoice_amount(&self) -> Option<Decimal> {
        self.raw_or_default(MIN_INVOICE_AMOUNT)
            .await
            .as_deref()
            .and_then(|raw| raw.trim().parse::<Decimal>().ok())
            .filter(|v| *v > Decimal::ZERO)
    }

    /// Per-reseller consumer cap. Unset means unlimited.
    pub async fn max_consumers_per_reseller(&self) -> Option<u64> {
        self.raw_or_default(MAX_CONSUMERS_PER_RESELLER)
            .await
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
    }

    /// Whether new resellers start deactivated pending approval. Default: false.
    pub async fn require_reseller_approval(&self) -> bool {
        self.raw_or_default(REQUIRE_RESELLER_APPROVAL)
            .await
            .as_deref()
            .and_then(parse_bool)
            .unwrap_or(false)
    }

    /// System-wide default commission; 10.00 when no setting row exists.
    pub async fn default_reseller_commission(&self) -> Decimal {
        self.raw_or_default(DEFAULT_RESELLER_COMMISSION)
            .await
            .as_deref()
            .and_then(|raw| raw.trim().parse::<Decimal>().ok())
            .unwrap_or(HARDCODED_DEFAULT_COMMISSION)
    }
}
