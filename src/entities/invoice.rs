use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Invoice payment status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, Display, AsRefStr, ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Issuer: an admin or a reseller
    pub sender_id: Uuid,
    /// The consumer being billed
    pub receiver_id: Uuid,
    pub issue_date: Date,
    pub due_date: Date,
    /// Final tax-inclusive total. Computed once at creation, never recomputed.
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub tax_total: Decimal,
    pub status: String,
    pub notes: Option<String>,
    /// Commission percentage snapshotted at creation; not recomputed when
    /// settings or offers change later
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub reseller_commission_percentage: Option<Decimal>,
    pub applied_offer_id: Option<Uuid>,
    pub commission_calculated_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice_item::Entity")]
    InvoiceItems,
}

impl Related<super::invoice_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Human-facing invoice number: `INV-<YYYYMMDD>-<first 8 of id, uppercase>`
    pub fn invoice_number(&self) -> String {
        let id = self.id.simple().to_string();
        format!(
            "INV-{}-{}",
            self.created_at.format("%Y%m%d"),
            id[..8].to_uppercase()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn invoice_number_derivation() {
        let model = Model {
            id: Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000000").unwrap(),
            sender_id: Uuid::new_v4(),
            receiver_id: Uuid::new_v4(),
            issue_date: chrono::NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            due_date: chrono::NaiveDate::from_ymd_opt(2024, 4, 4).unwrap(),
            total_amount: dec!(140.00),
            tax_total: dec!(10.00),
            status: InvoiceStatus::Unpaid.to_string(),
            notes: None,
            reseller_commission_percentage: None,
            applied_offer_id: None,
            commission_calculated_at: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 9, 30, 0).unwrap(),
        };

        assert_eq!(model.invoice_number(), "INV-20240305-A1B2C3D4");
    }
}
