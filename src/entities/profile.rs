use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Account role. Stored as a lowercase string column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Reseller,
    Consumer,
}

/// Account status. `ExpiredSubscription` stamps the trial expiry when set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Deactive,
    ExpiredSubscription,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// May be absent for consumers provisioned without a mailbox
    pub email: Option<String>,
    pub display_name: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    /// Referring reseller, set on consumers
    pub referred_by: Option<Uuid>,
    /// Per-reseller commission override; falls back to the system default
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub commission_rate: Option<Decimal>,
    pub lifetime_access: bool,
    pub trial_expiry: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn parsed_role(&self) -> Option<Role> {
        self.role.parse().ok()
    }

    pub fn is_admin(&self) -> bool {
        self.parsed_role() == Some(Role::Admin)
    }

    pub fn is_reseller(&self) -> bool {
        self.parsed_role() == Some(Role::Reseller)
    }

    pub fn is_consumer(&self) -> bool {
        self.parsed_role() == Some(Role::Consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_through_strings() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("reseller".parse::<Role>().unwrap(), Role::Reseller);
        assert_eq!("consumer".parse::<Role>().unwrap(), Role::Consumer);
        assert_eq!(Role::Reseller.to_string(), "reseller");
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn status_uses_snake_case_strings() {
        assert_eq!(
            AccountStatus::ExpiredSubscription.to_string(),
            "expired_subscription"
        );
        assert_eq!(
            "expired_subscription".parse::<AccountStatus>().unwrap(),
            AccountStatus::ExpiredSubscription
        );
        assert_eq!("deactive".parse::<AccountStatus>().unwrap(), AccountStatus::Deactive);
    }
}
