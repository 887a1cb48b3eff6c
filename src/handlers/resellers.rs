//! Reseller endpoints. Admin-only.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthRouterExt, AuthUser};
use crate::entities::profile::{AccountStatus, Role};
use crate::errors::ServiceError;
use crate::handlers::common::{ApiResponse, ListQuery, PaginatedResponse};
use crate::services::resellers::{CreateResellerInput, UpdateResellerInput};
use crate::AppState;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateResellerRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub display_name: String,
    pub phone: Option<String>,
    pub commission_rate: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateResellerRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<AccountStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetCommissionRequest {
    /// `null` clears the personal rate, falling back to the system default
    pub commission_rate: Option<Decimal>,
}

async fn create_reseller(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateResellerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let reseller = state
        .services
        .resellers
        .create(
            &user,
            CreateResellerInput {
                email: payload.email,
                display_name: payload.display_name,
                phone: payload.phone,
                commission_rate: payload.commission_rate,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::new(reseller))))
}

async fn list_resellers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (resellers, total) = state
        .services
        .resellers
        .list(query.page, query.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        resellers,
        total,
        query.page.max(1),
        query.per_page,
    )))
}

async fn get_reseller(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let reseller = state.services.resellers.get(id).await?;
    Ok(Json(ApiResponse::new(reseller)))
}

async fn update_reseller(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateResellerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;

    let reseller = state
        .services
        .resellers
        .update(
            &user,
            id,
            UpdateResellerInput {
                email: payload.email,
                display_name: payload.display_name,
                phone: payload.phone,
                status: payload.status,
            },
        )
        .await?;
    Ok(Json(ApiResponse::new(reseller)))
}

async fn delete_reseller(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.resellers.delete(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_reseller_commission(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetCommissionRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let reseller = state
        .services
        .resellers
        .set_commission(&user, id, payload.commission_rate)
        .await?;
    Ok(Json(ApiResponse::new(reseller)))
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reseller).get(list_resellers))
        .route(
            "/:id",
            get(get_reseller).put(update_reseller).delete(delete_reseller),
        )
        .route("/:id/commission", put(set_reseller_commission))
        .with_role(Role::Admin)
}
