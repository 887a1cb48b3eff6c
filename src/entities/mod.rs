//! Database entities, one module per table.

pub mod activity_log;
pub mod app_setting;
pub mod invoice;
pub mod invoice_item;
pub mod offer;
pub mod product;
pub mod profile;
pub mod user_product_access;
