//! Invoice endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::invoice::InvoiceStatus;
use crate::entities::profile::Role;
use crate::errors::ServiceError;
use crate::handlers::common::{ApiResponse, ListQuery, PaginatedResponse};
use crate::services::invoices::{CreateInvoiceInput, InvoiceItemInput};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct InvoiceItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Overrides the invoice-level tax rate for this line; must be
    /// non-negative
    pub tax_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvoiceRequest {
    pub receiver_id: Uuid,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Default tax rate for items without their own
    pub tax_rate: Option<Decimal>,
    pub notes: Option<String>,
    #[validate(length(min = 1, message = "at least one item is required"))]
    pub items: Vec<InvoiceItemRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

/// Create an invoice for a consumer.
#[utoipa::path(
    post,
    path = "/api/v1/invoices",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created"),
        (status = 400, description = "Invalid request or policy violation"),
        (status = 403, description = "Consumer belongs to another reseller"),
        (status = 404, description = "Consumer or product not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let input = CreateInvoiceInput {
        receiver_id: payload.receiver_id,
        issue_date: payload.issue_date,
        due_date: payload.due_date,
        tax_rate: payload.tax_rate,
        notes: payload.notes,
        items: payload
            .items
            .into_iter()
            .map(|item| InvoiceItemInput {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: item.unit_price,
                tax_rate: item.tax_rate,
            })
            .collect(),
    };

    let view = state.services.invoices.create_invoice(&user, input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(view))))
}

/// Paginated invoice listing (admin).
#[utoipa::path(
    get,
    path = "/api/v1/invoices",
    params(ListQuery),
    responses((status = 200, description = "Invoice page")),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    // Shares its path with invoice creation, so the admin gate lives here
    // instead of on a dedicated router
    if !user.is_admin() {
        return Err(ServiceError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }
    let page = state
        .services
        .invoices
        .list(query.page, query.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        page.invoices,
        page.total,
        page.page,
        page.per_page,
    )))
}

/// Invoices issued by the calling actor.
async fn my_invoices(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let invoices = state.services.invoices.my_invoices(&user).await?;
    Ok(Json(ApiResponse::new(invoices)))
}

/// Invoices billed to one consumer.
async fn consumer_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Path(consumer_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoices = state
        .services
        .invoices
        .consumer_invoices(&user, consumer_id)
        .await?;
    Ok(Json(ApiResponse::new(invoices)))
}

/// One invoice with its line items.
#[utoipa::path(
    get,
    path = "/api/v1/invoices/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with items"),
        (status = 404, description = "Invoice not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let view = state.services.invoices.get_invoice(&user, id).await?;
    Ok(Json(ApiResponse::new(view)))
}

/// Mark an invoice paid or unpaid.
#[utoipa::path(
    put,
    path = "/api/v1/invoices/{id}/status",
    params(("id" = Uuid, Path, description = "Invoice id")),
    request_body = UpdateInvoiceStatusRequest,
    responses(
        (status = 200, description = "Status updated"),
        (status = 404, description = "Invoice not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn update_invoice_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let invoice = state
        .services
        .invoices
        .update_status(&user, id, payload.status)
        .await?;
    Ok(Json(ApiResponse::new(invoice)))
}

/// Re-send the creation notification (admin).
#[utoipa::path(
    post,
    path = "/api/v1/invoices/{id}/resend",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Notification re-sent"),
        (status = 400, description = "Receiver has no email address"),
        (status = 404, description = "Invoice not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn resend_invoice_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.invoices.resend_notification(&user, id).await?;
    Ok(Json(ApiResponse::new(
        serde_json::json!({ "resent": true }),
    )))
}

pub fn routes() -> Router<AppState> {
    let admin = Router::new()
        .route("/:id/resend", post(resend_invoice_notification))
        .with_role(Role::Admin);

    // Resellers and admins; the role gate lets admins through everywhere
    let shared = Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route("/my-invoices", get(my_invoices))
        .route("/consumer/:id", get(consumer_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/status", put(update_invoice_status))
        .with_role(Role::Reseller);

    admin.merge(shared)
}
