//! OpenAPI document and swagger-ui mount.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::invoice::InvoiceStatus;
use crate::entities::profile::{AccountStatus, Role};
use crate::errors::ErrorResponse;
use crate::handlers::invoices::{
    CreateInvoiceRequest, InvoiceItemRequest, UpdateInvoiceStatusRequest,
};
use crate::services::invoices::{InvoiceItemView, InvoiceView};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::update_invoice_status,
        crate::handlers::invoices::resend_invoice_notification,
    ),
    components(schemas(
        CreateInvoiceRequest,
        InvoiceItemRequest,
        UpdateInvoiceStatusRequest,
        InvoiceView,
        InvoiceItemView,
        InvoiceStatus,
        Role,
        AccountStatus,
        ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "invoices", description = "Invoice creation, listing and notifications")
    ),
    info(
        title = "Back Office API",
        description = "Role-gated admin back office: profiles, invoicing and commissions"
    )
)]
pub struct ApiDoc;

/// Swagger UI at `/docs`, serving the generated document.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}
