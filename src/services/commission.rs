//! Reseller commission resolution.
//!
//! One ordered resolver replaces the duplicated per-role lookup chains of
//! earlier revisions: active offer, then personal rate, then the system
//! default, then the hardcoded constant. Lookup failures fall through to
//! the next source; commission resolution can weaken the result but never
//! abort invoice creation.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::profile::Role;
use crate::entities::{offer, profile};
use crate::services::settings::SettingsProvider;

/// Snapshot written onto the invoice row at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct CommissionDecision {
    pub percentage: Option<Decimal>,
    pub applied_offer_id: Option<Uuid>,
}

impl CommissionDecision {
    pub fn none() -> Self {
        Self {
            percentage: None,
            applied_offer_id: None,
        }
    }
}

/// Commission-relevant facts about the invoice issuer.
#[derive(Debug, Clone, PartialEq)]
pub enum CommissionActor {
    /// Reseller issuing for their own consumer; carries their personal rate.
    Reseller { own_rate: Option<Decimal> },
    /// Admin issuing on behalf of a consumer. `referrer_rate` is `None`
    /// when the consumer has no referring reseller, otherwise the
    /// referrer's personal rate (which may itself be unset).
    Admin {
        referrer_rate: Option<Option<Decimal>>,
    },
}

/// Ordered decision over already-fetched inputs. Pure so the fallback
/// chain can be tested without a database.
pub fn decide(
    active_offer: Option<&offer::Model>,
    actor: &CommissionActor,
    default_rate: Decimal,
) -> CommissionDecision {
    if let Some(offer) = active_offer {
        return CommissionDecision {
            percentage: Some(offer.commission_percentage),
            applied_offer_id: Some(offer.id),
        };
    }

    match actor {
        CommissionActor::Reseller { own_rate } => CommissionDecision {
            percentage: Some(own_rate.unwrap_or(default_rate)),
            applied_offer_id: None,
        },
        CommissionActor::Admin { referrer_rate } => match referrer_rate {
            Some(rate) => CommissionDecision {
                percentage: Some(rate.unwrap_or(default_rate)),
                applied_offer_id: None,
            },
            // No referring reseller: nobody earns commission
            None => CommissionDecision::none(),
        },
    }
}

#[derive(Clone)]
pub struct CommissionResolver {
    db: Arc<DbPool>,
    settings: SettingsProvider,
}

impl CommissionResolver {
    pub fn new(db: Arc<DbPool>, settings: SettingsProvider) -> Self {
        Self { db, settings }
    }

    /// The active offer covering `date`, newest first. Errors degrade to
    /// "no offer" so the chain can continue.
    async fn active_offer(&self, date: NaiveDate) -> Option<offer::Model> {
        let result = offer::Entity::find()
            .filter(offer::Column::IsActive.eq(true))
            .filter(offer::Column::StartDate.lte(date))
            .filter(offer::Column::EndDate.gte(date))
            .order_by_desc(offer::Column::CreatedAt)
            .one(&*self.db)
            .await;

        match result {
            Ok(offer) => offer,
            Err(e) => {
                warn!(error = %e, %date, "offer lookup failed; continuing without offer");
                None
            }
        }
    }

    async fn commission_rate_of(&self, profile_id: Uuid) -> Option<Decimal> {
        match profile::Entity::find_by_id(profile_id).one(&*self.db).await {
            Ok(Some(p)) => p.commission_rate,
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, %profile_id, "commission rate lookup failed");
                None
            }
        }
    }

    /// Resolve the commission snapshot for an invoice being created by
    /// `actor` for `consumer` on `issue_date`.
    #[instrument(skip(self, actor, consumer), fields(actor_id = %actor.id, consumer_id = %consumer.id))]
    pub async fn resolve(
        &self,
        actor: &AuthUser,
        issue_date: NaiveDate,
        consumer: &profile::Model,
    ) -> CommissionDecision {
        let offer = self.active_offer(issue_date).await;

        let commission_actor = match actor.role {
            Role::Reseller => CommissionActor::Reseller {
                own_rate: self.commission_rate_of(actor.id).await,
            },
            _ => CommissionActor::Admin {
                referrer_rate: match consumer.referred_by {
                    Some(referrer_id) => Some(self.commission_rate_of(referrer_id).await),
                    None => None,
                },
            },
        };

        let default_rate = self.settings.default_reseller_commission().await;

        decide(offer.as_ref(), &commission_actor, default_rate)
    }
}
