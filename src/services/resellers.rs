//! Reseller account management. Admin-only surface.

use chrono::Utc;
use rust_decimal::Decimal;
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

const GENERATED_PASSWORD_LEN: usize = 14;

#[derive(Debug, Clone)]
pub struct CreateResellerInput {
    pub email: String,
    pub display_name: String,
    pub phone: Option<String>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateResellerInput {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<AccountStatus>,
}

fn validate_commission(rate: Decimal) -> Result<(), ServiceError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ServiceError::BadRequest(
            "Commission rate must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ResellerService {
    db: Arc<DbPool>,
    settings: SettingsProvider,
    email: Arc<EmailService>,
    activity: ActivityLogger,
}

impl ResellerService {
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

    async fn load(&self, id: Uuid) -> Result<profile::Model, ServiceError> {
        profile::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .filter(|p| p.is_reseller())
            .ok_or_else(|| ServiceError::NotFound(format!("Reseller {} not found", id)))
    }

    /// Create a reseller. Starts deactivated when approval is required.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        input: CreateResellerInput,
    ) -> Result<profile::Model, ServiceError> {
        if let Some(rate) = input.commission_rate {
            validate_commission(rate)?;
        }

        let status = if self.settings.require_reseller_approval().await {
            AccountStatus::Deactive
        } else {
            AccountStatus::Active
        };

        let now = Utc::now();
        let reseller = profile::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(Some(input.email.clone())),
            display_name: Set(input.display_name.clone()),
            phone: Set(input.phone.clone()),
            role: Set(Role::Reseller.to_string()),
            status: Set(status.to_string()),
            referred_by: Set(None),
            commission_rate: Set(input.commission_rate),
            lifetime_access: Set(false),
            trial_expiry: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db)
        .await?;

        let password = generate_password(GENERATED_PASSWORD_LEN);
        self.email.send_detached(
            input.email,
            EmailTemplate::Welcome {
                recipient_name: reseller.display_name.clone(),
                login_email: reseller.email.clone().unwrap_or_default(),
                password,
            },
        );

        self.activity.record(
            actor,
            "reseller.created",
            "profile",
            Some(reseller.id),
            Some(serde_json::json!({ "status": status })),
        );

        Ok(reseller)
    }

    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<profile::Model>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let paginator = profile::Entity::find()
            .filter(profile::Column::Role.eq(Role::Reseller.to_string()))
            .order_by_desc(profile::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let resellers = paginator.fetch_page(page - 1).await?;

        Ok((resellers, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<profile::Model, ServiceError> {
        self.load(id).await
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: UpdateResellerInput,
    ) -> Result<profile::Model, ServiceError> {
        let reseller = self.load(id).await?;

        let mut active: profile::ActiveModel = reseller.into();
        if let Some(email) = input.email {
            active.email = Set(Some(email));
        }
        if let Some(display_name) = input.display_name {
            active.display_name = Set(display_name);
        }
        if let Some(phone) = input.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(status) = input.status {
            active.status = Set(status.to_string());
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.activity
            .record(actor, "reseller.updated", "profile", Some(id), None);

        Ok(updated)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let reseller = self.load(id).await?;

        profile::Entity::delete_by_id(reseller.id)
            .exec(&*self.db)
            .await?;

        self.activity
            .record(actor, "reseller.deleted", "profile", Some(id), None);

        Ok(())
    }

    /// Set or clear the per-reseller commission rate. A cleared rate falls
    /// back to the system default at invoice time.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, reseller_id = %id))]
    pub async fn set_commission(
        &self,
        actor: &AuthUser,
        id: Uuid,
        rate: Option<Decimal>,
    ) -> Result<profile::Model, ServiceError> {
        if let Some(rate) = rate {
            validate_commission(rate)?;
        }

        let reseller = self.load(id).await?;
        let mut active: profile::ActiveModel = reseller.into();
        active.commission_rate = Set(rate);
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.activity.record(
            actor,
            "reseller.commission_changed",
            "profile",
            Some(id),
            Some(serde_json::json!({ "commission_rate": rate })),
        );

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(0.00))]
    #[case(dec!(12.50))]
    #[case(dec!(100.00))]
    fn commission_bounds_accept_inclusive_range(#[case] rate: Decimal) {
        assert!(validate_commission(rate).is_ok());
    }

    #[rstest]
    #[case(dec!(-0.01))]
    #[case(dec!(100.01))]
    fn commission_bounds_reject_out_of_range(#[case] rate: Decimal) {
        assert!(matches!(
            validate_commission(rate),
            Err(ServiceError::BadRequest(_))
        ));
    }
}
