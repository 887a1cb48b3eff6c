//! HTTP handlers. Thin adapters from axum extractors to the service layer;
//! request DTOs and their validation live here.

pub mod common;
pub mod consumers;
pub mod invoices;
pub mod resellers;
pub mod settings;
pub mod users;
