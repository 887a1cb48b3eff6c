//! End-to-end checks over the invoice pipeline's pure stages: pricing,
//! totals, commission resolution, and the derived invoice number.

use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone, Utc};
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use backoffice_api::auth::generate_password;
use backoffice_api::entities::invoice::{self, InvoiceStatus};
use backoffice_api::entities::offer;
use backoffice_api::entities::product;
use backoffice_api::entities::profile::Role;
use backoffice_api::errors::ServiceError;
use backoffice_api::services::commission::{decide, CommissionActor};
use backoffice_api::services::invoices::{stage_items, InvoiceItemInput};
use backoffice_api::services::settings::HARDCODED_DEFAULT_COMMISSION;

fn catalog(entries: &[(Uuid, &str, Decimal)]) -> HashMap<Uuid, product::Model> {
    entries
        .iter()
        .map(|(id, name, price)| {
            (
                *id,
                product::Model {
                    id: *id,
                    name: (*name).to_string(),
                    description: None,
                    price: *price,
                    created_at: Utc::now(),
                },
            )
        })
        .collect()
}

fn item(
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    tax_rate: Option<Decimal>,
) -> InvoiceItemInput {
    InvoiceItemInput {
        product_id,
        quantity,
        unit_price,
        tax_rate,
    }
}

/// Two line items, one taxed at 10%, system default commission of 12% and
/// no active offer: totals 140.00 / tax 10.00, commission 12.00.
#[test]
fn worked_invoice_scenario() {
    let widget = Uuid::new_v4();
    let addon = Uuid::new_v4();
    let products = catalog(&[(widget, "Widget", dec!(50.00)), (addon, "Addon", dec!(30.00))]);

    let staged = stage_items(
        Role::Reseller,
        true,
        None,
        &[
            item(widget, 2, dec!(50.00), Some(dec!(10.00))),
            item(addon, 1, dec!(30.00), Some(dec!(0.00))),
        ],
        &products,
    )
    .expect("staging should succeed");

    assert_eq!(staged.subtotal, dec!(130.00));
    assert_eq!(staged.tax_total, dec!(10.00));
    assert_eq!(staged.final_total, dec!(140.00));

    // Reseller has no personal rate; the system default of 12% applies
    let decision = decide(
        None,
        &CommissionActor::Reseller { own_rate: None },
        dec!(12.00),
    );
    assert_eq!(decision.percentage, Some(dec!(12.00)));
    assert_eq!(decision.applied_offer_id, None);
}

#[test]
fn under_catalog_price_depends_on_override_setting() {
    let widget = Uuid::new_v4();
    let products = catalog(&[(widget, "Widget", dec!(50.00))]);
    let items = [item(widget, 1, dec!(40.00), None)];

    // Override allowed: a discount below catalog is an error
    let rejected = stage_items(Role::Reseller, true, None, &items, &products);
    assert!(matches!(rejected, Err(ServiceError::BadRequest(_))));

    // Override disallowed: the catalog price silently wins
    let forced = stage_items(Role::Reseller, false, None, &items, &products)
        .expect("forced catalog price should stage");
    assert_eq!(forced.items[0].unit_price, dec!(50.00));

    // Admins are never constrained
    let admin = stage_items(Role::Admin, true, None, &items, &products)
        .expect("admin price should stage");
    assert_eq!(admin.items[0].unit_price, dec!(40.00));
}

#[test]
fn active_offer_beats_every_personal_rate() {
    let offer = offer::Model {
        id: Uuid::new_v4(),
        name: "spring promo".into(),
        is_active: true,
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        commission_percentage: dec!(17.50),
        created_at: Utc::now(),
    };
    assert!(offer.covers(NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()));
    assert!(!offer.covers(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()));

    let decision = decide(
        Some(&offer),
        &CommissionActor::Reseller {
            own_rate: Some(dec!(30.00)),
        },
        HARDCODED_DEFAULT_COMMISSION,
    );
    assert_eq!(decision.percentage, Some(dec!(17.50)));
    assert_eq!(decision.applied_offer_id, Some(offer.id));
}

#[test]
fn admin_invoice_without_referrer_leaves_commission_unset() {
    let decision = decide(
        None,
        &CommissionActor::Admin { referrer_rate: None },
        HARDCODED_DEFAULT_COMMISSION,
    );
    assert_eq!(decision.percentage, None);
    assert_eq!(decision.applied_offer_id, None);
}

#[test]
fn invoice_number_format_is_stable() {
    let model = invoice::Model {
        id: Uuid::new_v4(),
        sender_id: Uuid::new_v4(),
        receiver_id: Uuid::new_v4(),
        issue_date: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2024, 4, 4).unwrap(),
        total_amount: dec!(140.00),
        tax_total: dec!(10.00),
        status: InvoiceStatus::Unpaid.to_string(),
        notes: None,
        reseller_commission_percentage: Some(dec!(12.00)),
        applied_offer_id: None,
        commission_calculated_at: Some(Utc::now()),
        created_at: Utc.with_ymd_and_hms(2024, 3, 5, 8, 0, 0).unwrap(),
    };

    let pattern = Regex::new(r"^INV-\d{8}-[0-9A-F]{8}$").unwrap();
    let number = model.invoice_number();
    assert!(pattern.is_match(&number), "unexpected format: {}", number);
    assert!(number.starts_with("INV-20240305-"));
}

#[test]
fn generated_passwords_always_satisfy_the_class_policy() {
    for len in [10, 14, 32] {
        for _ in 0..50 {
            let password = generate_password(len);
            assert_eq!(password.chars().count(), len.max(10));
            assert!(password.chars().any(|c| c.is_ascii_lowercase()));
            assert!(password.chars().any(|c| c.is_ascii_uppercase()));
            assert!(password.chars().any(|c| c.is_ascii_digit()));
            assert!(password.chars().any(|c| !c.is_ascii_alphanumeric()));
        }
    }
}

/// Equality with the configured minimum passes; only strictly-below fails.
#[test]
fn minimum_amount_boundary_semantics() {
    let min = dec!(140.00);
    let widget = Uuid::new_v4();
    let products = catalog(&[(widget, "Widget", dec!(50.00))]);

    let staged = stage_items(
        Role::Admin,
        true,
        None,
        &[
            item(widget, 2, dec!(50.00), Some(dec!(10.00))),
            item(widget, 1, dec!(30.00), Some(dec!(0.00))),
        ],
        &products,
    )
    .expect("staging should succeed");

    // The service rejects only totals strictly below the minimum
    assert_eq!(staged.final_total, min);
    assert!(!(staged.final_total < min));
}
