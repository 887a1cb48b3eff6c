//! Price-override policy for invoice line items.

use rust_decimal::Decimal;

use crate::entities::profile::Role;
use crate::errors::ServiceError;

/// Decide the unit price to bill for an item.
///
/// Admins bill whatever they ask for. Resellers may only mark up: with the
/// override setting on, a price below catalog is rejected; with it off, the
/// requested price is silently replaced by the catalog price.
pub fn resolve_unit_price(
    actor_role: Role,
    override_allowed: bool,
    catalog_price: Decimal,
    requested_price: Decimal,
) -> Result<Decimal, ServiceError> {
    if actor_role == Role::Admin {
        return Ok(requested_price);
    }

    if !override_allowed {
        return Ok(catalog_price);
    }

    if requested_price < catalog_price {
        return Err(ServiceError::BadRequest(format!(
            "unit price {} is below the catalog price {}; resellers may not discount below catalog",
            requested_price, catalog_price
        )));
    }

    Ok(requested_price)
}
