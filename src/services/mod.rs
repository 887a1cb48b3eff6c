//! Business logic layer. Handlers stay thin; everything that touches the
//! database, cache, or mail goes through one of these services.

pub mod activity;
pub mod commission;
pub mod consumers;
pub mod email;
pub mod invoices;
pub mod pricing;
pub mod resellers;
pub mod settings;
pub mod users;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::Cache;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;

use activity::ActivityLogger;
use commission::CommissionResolver;
use consumers::ConsumerService;
use email::EmailService;
use invoices::InvoiceService;
use resellers::ResellerService;
use settings::SettingsProvider;
use users::UserService;

/// Every service the handlers need, built once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub settings: SettingsProvider,
    pub email: Arc<EmailService>,
    pub activity: ActivityLogger,
    pub invoices: InvoiceService,
    pub consumers: ConsumerService,
    pub resellers: ResellerService,
    pub users: UserService,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, cache: Cache, config: &AppConfig) -> Result<Self, ServiceError> {
        let settings = SettingsProvider::new(
            Arc::clone(&db),
            cache.clone(),
            Duration::from_secs(config.settings_cache_ttl_secs),
        );
        let email = Arc::new(EmailService::new(&config.smtp)?);
        let activity = ActivityLogger::new(Arc::clone(&db));
        let commission = CommissionResolver::new(Arc::clone(&db), settings.clone());

        let invoices = InvoiceService::new(
            Arc::clone(&db),
            settings.clone(),
            commission,
            Arc::clone(&email),
            activity.clone(),
            cache.clone(),
            Duration::from_secs(config.list_cache_ttl_secs),
        );
        let consumers = ConsumerService::new(
            Arc::clone(&db),
            settings.clone(),
            Arc::clone(&email),
            activity.clone(),
        );
        let resellers = ResellerService::new(
            Arc::clone(&db),
            settings.clone(),
            Arc::clone(&email),
            activity.clone(),
        );
        let users = UserService::new(Arc::clone(&db), Arc::clone(&email), activity.clone());

        Ok(Self {
            settings,
            email,
            activity,
            invoices,
            consumers,
            resellers,
            users,
        })
    }
}
