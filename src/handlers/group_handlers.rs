//! HTTP handlers for supplier groups, the staff-curated address book used
//! when routing quotes to suppliers.

use crate::{errors::AppError, models::user::Actor, services::quote_service::QuoteService};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Deserialize)]
pub struct CreateGroupBody {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateGroupBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub members: Option<Vec<Uuid>>,
}

/// GET `/groups`
pub async fn list_groups(
    State(service): State<QuoteService>,
    _actor: Actor,
) -> Result<impl IntoResponse, AppError> {
    let groups = service.list_groups().await?;
    Ok(Json(groups))
}

/// POST `/groups`
pub async fn create_group(
    State(service): State<QuoteService>,
    actor: Actor,
    Json(body): Json<CreateGroupBody>,
) -> Result<impl IntoResponse, AppError> {
    let group = service
        .create_group(&actor, &body.name, &body.description, body.color.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// PUT `/groups/{id}`
pub async fn update_group(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateGroupBody>,
) -> Result<impl IntoResponse, AppError> {
    let group = service
        .update_group(
            &actor,
            id,
            body.name.as_deref(),
            body.description.as_deref(),
            body.color.as_deref(),
            body.members,
        )
        .await?;
    Ok(Json(group))
}

/// DELETE `/groups/{id}`
pub async fn delete_group(
    State(service): State<QuoteService>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    service.delete_group(&actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
