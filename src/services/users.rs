//! Cross-role profile administration. Admin-only surface over every
//! profile regardless of role.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::auth::{generate_password, AuthUser};
use crate::db::DbPool;
use crate::entities::profile::{self, AccountStatus};
use crate::errors::ServiceError;
use crate::services::activity::ActivityLogger;
use crate::services::email::{EmailService, EmailTemplate};

const GENERATED_PASSWORD_LEN: usize = 14;

#[derive(Debug, Clone, Default)]
pub struct UpdateUserInput {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<AccountStatus>,
}

#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
    email: Arc<EmailService>,
    activity: ActivityLogger,
}

impl UserService {
    pub fn new(db: Arc<DbPool>, email: Arc<EmailService>, activity: ActivityLogger) -> Self {
        Self {
            db,
            email,
            activity,
        }
    }

    async fn load(&self, id: Uuid) -> Result<profile::Model, ServiceError> {
        profile::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile {} not found", id)))
    }

    /// Paginated listing across all roles, optionally filtered to one.
    pub async fn list(
        &self,
        role: Option<String>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<profile::Model>, u64), ServiceError> {
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = profile::Entity::find();
        if let Some(role) = role {
            query = query.filter(profile::Column::Role.eq(role));
        }

        let paginator = query
            .order_by_desc(profile::Column::CreatedAt)
            .paginate(&*self.db, per_page);
        let total = paginator.num_items().await?;
        let profiles = paginator.fetch_page(page - 1).await?;

        Ok((profiles, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<profile::Model, ServiceError> {
        self.load(id).await
    }

    pub async fn update(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: UpdateUserInput,
    ) -> Result<profile::Model, ServiceError> {
        let user = self.load(id).await?;

        let mut active: profile::ActiveModel = user.into();
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
            .record(actor, "user.updated", "profile", Some(id), None);

        Ok(updated)
    }

    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        if actor.id == id {
            return Err(ServiceError::BadRequest(
                "Administrators cannot delete their own account".to_string(),
            ));
        }

        let user = self.load(id).await?;
        profile::Entity::delete_by_id(user.id)
            .exec(&*self.db)
            .await?;

        self.activity
            .record(actor, "user.deleted", "profile", Some(id), None);

        Ok(())
    }

    /// Replace a profile's credential and mail it to them.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id, profile_id = %id))]
    pub async fn reset_password(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let user = self.load(id).await?;

        let email = user
            .email
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| {
                ServiceError::BadRequest(
                    "Profile has no email address to deliver the new password to".to_string(),
                )
            })?;

        let password = generate_password(GENERATED_PASSWORD_LEN);
        self.email
            .send(
                &email,
                &EmailTemplate::PasswordReset {
                    recipient_name: user.display_name.clone(),
                    password,
                },
            )
            .await?;

        self.activity
            .record(actor, "user.password_reset", "profile", Some(id), None);

        Ok(())
    }
}
