use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Promotional commission offer with an inclusive date window.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub start_date: Date,
    pub end_date: Date,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub commission_percentage: Decimal,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Whether this offer covers the given invoice date (inclusive window).
    pub fn covers(&self, date: Date) -> bool {
        self.is_active && self.start_date <= date && date <= self.end_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;

    fn offer(active: bool, start: (i32, u32, u32), end: (i32, u32, u32)) -> Model {
        Model {
            id: Uuid::new_v4(),
            name: "spring promo".into(),
            is_active: active,
            start_date: NaiveDate::from_ymd_opt(start.0, start.1, start.2).unwrap(),
            end_date: NaiveDate::from_ymd_opt(end.0, end.1, end.2).unwrap(),
            commission_percentage: dec!(15.00),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let o = offer(true, (2024, 3, 1), (2024, 3, 31));
        assert!(o.covers(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));
        assert!(o.covers(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
        assert!(!o.covers(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()));
        assert!(!o.covers(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));
    }

    #[test]
    fn inactive_offer_never_covers() {
        let o = offer(false, (2024, 3, 1), (2024, 3, 31));
        assert!(!o.covers(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()));
    }
}
