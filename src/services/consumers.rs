//! Consumer account management.
//!
//! Admins act on every consumer; resellers only on consumers they referred.
//! Credentials are generated server-side and delivered by email only, never
//! in an HTTP response.

use chrono::{DateTime, Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{generate_password, AuthUser};
use crate::db::DbPool;
use crate::entities::profile::{self, AccountStatus, Role};
use crate::errors::ServiceError;
use crate::services::activity::ActivityLogger;
use crate::services::email::{EmailService, EmailTemplate};
use crate::services::settings::SettingsProvider;

const TRIAL_DAYS: i64 = 7;
const GENERATED_PASSWORD_LEN: usize = 14;

#[derive(Debug, Clone)]
pub struct CreateConsumerInput {
    pub email: Option<String>,
    pub display_name: String,
    pub phone: Option<String>,
    /// Admin-only: attribute the consumer to a reseller
    pub referred_by: Option<Uuid>,
    pub lifetime_access: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateConsumerInput {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub lifetime_access: Option<bool>,
}

/// Decide the trial expiry for a status change.
///
/// Expiring a subscription stamps the expiry at `now`. Reactivation honors
/// a caller-supplied date but clamps it to `created_at` plus seven days
/// unless the account has lifetime access; without a supplied date an
/// existing future expiry is preserved and otherwise a fresh seven-day
/// window starts. Deactivation leaves the expiry untouched.
pub fn resolve_trial_expiry(
    status: AccountStatus,
    requested: Option<DateTime<Utc>>,
    existing: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    lifetime_access: bool,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match status {
        AccountStatus::ExpiredSubscription => Some(now),
        AccountStatus::Deactive => existing,
        AccountStatus::Active => {
            let cap = created_at + Duration::days(TRIAL_DAYS);
            match requested {
                Some(date) if lifetime_access => Some(date),
                Some(date) => Some(date.min(cap)),
                None => match existing {
                    Some(current) if current > now => Some(current),
                    _ => Some(now + Duration::days(TRIAL_DAYS)),
                },
            }
        }
    }
}

#[derive(Clone)]
pub struct ConsumerService {
    db: Arc<DbPool>,
    settings: SettingsProvider,
    email: Arc<EmailService>,
    activity: ActivityLogger,
}

impl ConsumerService {
    pub fn new(
        db: Arc<DbPool>,
        settings: SettingsProvider,
        email: Arc<EmailService>,
        activity: ActivityLogger,
    ) -> Self {
        Self {
            db,
            settings,
            email,
            activity,
        }
    }

    async fn load_owned(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<profile::Model, ServiceError> {
        let consumer = profile::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_consumer())
            .ok_or_else(|| ServiceError::NotFound(format!("Consumer {} not found", id)))?;

        if actor.role == Role::Reseller && consumer.referred_by != Some(actor.id) {
            return Err(ServiceError::Forbidden(
                "Consumer belongs to another reseller".to_string(),
            ));
        }

        Ok(consumer)
    }

    async fn enforce_consumer_cap(&self, reseller_id: Uuid) -> Result<(), ServiceError> {
        let Some(cap) = self.settings.max_consumers_per_reseller().await else {
            return Ok(());
        };

        let count = profile::Entity::find()
            .filter(profile::Column::Role.eq(Role::Consumer.to_string()))
            .filter(profile::Column::ReferredBy.eq(reseller_id))
            .count(&*self.db)
            .await?;

        if count >= cap {
            return Err(ServiceError::BadRequest(format!(
                "Consumer limit of {} per reseller reached",
                cap
            )));
        }
        Ok(())
    }

    /// Create a consumer with a fresh trial window and a generated
    /// credential delivered by welcome email.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        input: CreateConsumerInput,
    ) -> Result<profile::Model, ServiceError> {
        let referred_by = match actor.role {
            Role::Reseller => {
                self.enforce_consumer_cap(actor.id).await?;
                Some(actor.id)
            }
            _ => input.referred_by,
        };

        let now = Utc::now();
        let trial_expiry = if input.lifetime_access {
            None
        } else {
            Some(now + Duration::days(TRIAL_DAYS))
        };

        let consumer = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(input.email.clone()),
            display_name: Set(input.display_name.clone()),
            phone: Set(input.phone.clone()),
            role: Set(Role::Consumer.to_string()),
            status: Set(AccountStatus::Active.to_string()),
            referred_by: Set(referred_by),
            commission_rate: Set(None),
            lifetime_access: Set(input.lifetime_access),
            trial_expiry: Set(trial_expiry),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        if let Some(email) = consumer.email.clone() {
            let password = generate_password(GENERATED_PASSWORD_LEN);
            self.email.send_detached(
                email.clone(),
                EmailTemplate::Welcome {
                    recipient_name: consumer.display_name.clone(),
                    login_email: email,
                    password,
                },
            );
        }

        self.activity.record(
            actor,
            "consumer.created",
            "profile",
            Some(consumer.id),
            Some(serde_json::json!({ "referred_by": referred_by })),
        );

        Ok(consumer)
    }

    /// Paginated listing; resellers see only their own referrals.
    pub async fn list(
        &self,
        actor: &AuthUser,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<profile::Model>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = profile::Entity::find()
            .filter(profile::Column::Role.eq(Role::Consumer.to_string()));
        if actor.role == Role::Reseller {
            query = query.filter(profile::Column::ReferredBy.eq(actor.id));
        }

        let paginator = query
            .order_by_desc(profile::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let consumers = paginator.fetch_page(page - 1).await?;

        Ok((consumers, total))
    }

    pub async fn get(&self, actor: &AuthUser, id: Uuid) -> Result<profile::Model, ServiceError> {
        self.load_owned(actor, id).await
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: UpdateConsumerInput,
    ) -> Result<profile::Model, ServiceError> {
        let consumer = self.load_owned(actor, id).await?;

        let mut active: profile::ActiveModel = consumer.into();
        if let Some(email) = input.email {
            active.email = Set(Some(email));
        }
        if let Some(display_name) = input.display_name {
            active.display_name = Set(display_name);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(lifetime_access) = input.lifetime_access {
            active.lifetime_access = Set(lifetime_access);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.activity
            .record(actor, "consumer.updated", "profile", Some(id), None);

        Ok(updated)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let consumer = self.load_owned(actor, id).await?;

        profile::Entity::delete_by_id(consumer.id)
            .exec(&*self.db)
            .await?;

        self.activity
            .record(actor, "consumer.deleted", "profile", Some(id), None);

        Ok(())
    }

    /// Replace the consumer's credential and mail it to them.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, consumer_id = %id))]
    pub async fn reset_password(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let consumer = self.load_owned(actor, id).await?;

        let email = consumer
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::BadRequest(
                    "Consumer has no email address to deliver the new password to".to_string(),
                )
            })?;

        let password = generate_password(GENERATED_PASSWORD_LEN);
        self.email
            .send(
                &email,
                &EmailTemplate::PasswordReset {
                    recipient_name: consumer.display_name.clone(),
                    password,
                },
            )
            .await?;

        self.activity
            .record(actor, "consumer.password_reset", "profile", Some(id), None);

        Ok(())
    }

    /// Change account status and adjust the trial window accordingly.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, consumer_id = %id, status = %status))]
    pub async fn set_status(
        &self,
        actor: &AuthUser,
        id: Uuid,
        status: AccountStatus,
        requested_trial_expiry: Option<DateTime<Utc>>,
    ) -> Result<profile::Model, ServiceError> {
        let consumer = self.load_owned(actor, id).await?;

        let now = Utc::now();
        let trial_expiry = resolve_trial_expiry(
            status,
            requested_trial_expiry,
            consumer.trial_expiry,
            consumer.created_at,
            consumer.lifetime_access,
            now,
        );

        let recipient_name = consumer.display_name.clone();
        let recipient_email = consumer.email.clone();

        let mut active: profile::ActiveModel = consumer.into();
        active.status = Set(status.to_string());
        active.trial_expiry = Set(trial_expiry);
        active.updated_at = Set(now);
        let updated = active.update(&*self.db).await?;

        let template = match (status, requested_trial_expiry) {
            (AccountStatus::Active, Some(_)) => EmailTemplate::TrialExtended {
                recipient_name,
                trial_expiry: trial_expiry
                    .map(|d| d.date_naive().to_string())
                    .unwrap_or_else(|| "unlimited".to_string()),
            },
            _ => EmailTemplate::AccountStatusChanged {
                recipient_name,
                status: status.to_string(),
            },
        };
        self.email.send_detached_opt(recipient_email, template);

        self.activity.record(
            actor,
            "consumer.status_changed",
            "profile",
            Some(id),
            Some(serde_json::json!({ "status": status, "trial_expiry": trial_expiry })),
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn expiring_a_subscription_stamps_now() {
        let now = at(2024, 6, 10);
        let expiry = resolve_trial_expiry(
            AccountStatus::ExpiredSubscription,
            Some(at(2024, 12, 31)),
            Some(at(2024, 7, 1)),
            at(2024, 6, 1),
            false,
            now,
        );
        assert_eq!(expiry, Some(now));
    }

    #[test]
    fn reactivation_clamps_supplied_date_to_creation_plus_seven_days() {
        let created = at(2024, 6, 1);
        let expiry = resolve_trial_expiry(
            AccountStatus::Active,
            Some(at(2024, 9, 1)),
            None,
            created,
            false,
            at(2024, 6, 2),
        );
        assert_eq!(expiry, Some(created + Duration::days(7)));
    }

    #[test]
    fn lifetime_access_escapes_the_clamp() {
        let requested = at(2024, 9, 1);
        let expiry = resolve_trial_expiry(
            AccountStatus::Active,
            Some(requested),
            None,
            at(2024, 6, 1),
            true,
            at(2024, 6, 2),
        );
        assert_eq!(expiry, Some(requested));
    }

    #[test]
    fn supplied_date_inside_the_window_is_honored() {
        let requested = at(2024, 6, 5);
        let expiry = resolve_trial_expiry(
            AccountStatus::Active,
            Some(requested),
            None,
            at(2024, 6, 1),
            false,
            at(2024, 6, 2),
        );
        assert_eq!(expiry, Some(requested));
    }

    #[test]
    fn reactivation_without_date_preserves_a_future_expiry() {
        let existing = at(2024, 6, 20);
        let expiry = resolve_trial_expiry(
            AccountStatus::Active,
            None,
            Some(existing),
            at(2024, 6, 1),
            false,
            at(2024, 6, 10),
        );
        assert_eq!(expiry, Some(existing));
    }

    #[test]
    fn reactivation_without_date_renews_an_elapsed_expiry() {
        let now = at(2024, 6, 10);
        let expiry = resolve_trial_expiry(
            AccountStatus::Active,
            None,
            Some(at(2024, 6, 5)),
            at(2024, 5, 1),
            false,
            now,
        );
        assert_eq!(expiry, Some(now + Duration::days(7)));
    }

    #[test]
    fn deactivation_leaves_the_expiry_untouched() {
        let existing = Some(at(2024, 6, 20));
        let expiry = resolve_trial_expiry(
            AccountStatus::Deactive,
            Some(at(2024, 12, 31)),
            existing,
            at(2024, 6, 1),
            false,
            at(2024, 6, 10),
        );
        assert_eq!(expiry, existing);
    }
}
