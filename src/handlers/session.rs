//! Request identity.
//!
//! The service sits behind a gateway that authenticates users and forwards
//! their identity as trusted headers. The extractor rejects requests with a
//! missing or malformed identity before any handler runs; an unknown role
//! string is a hard failure, never a fallback to some default role.

use crate::errors::AppError;
use crate::models::user::{Actor, Role};
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the authenticated user id (UUID).
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Header carrying the authenticated user's role.
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, ACTOR_ID_HEADER)?
            .parse::<Uuid>()
            .map_err(|_| AppError::bad_request(format!("{ACTOR_ID_HEADER} is not a UUID")))?;
        let role = header_value(parts, ACTOR_ROLE_HEADER)?
            .parse::<Role>()
            .map_err(|err| AppError::bad_request(err.to_string()))?;
        Ok(Actor::new(id, role))
    }
}

fn header_value<'a>(parts: &'a Parts, name: &str) -> Result<&'a str, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            AppError::new(
                axum::http::StatusCode::UNAUTHORIZED,
                format!("missing or invalid {name} header"),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(id: Option<&str>, role: Option<&str>) -> Result<Actor, AppError> {
        let mut builder = Request::builder().uri("/quotes");
        if let Some(id) = id {
            builder = builder.header(ACTOR_ID_HEADER, id);
        }
        if let Some(role) = role {
            builder = builder.header(ACTOR_ROLE_HEADER, role);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn extracts_a_well_formed_identity() {
        let id = Uuid::new_v4();
        let actor = extract(Some(&id.to_string()), Some("supplier")).await.unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.role, Role::Supplier);
    }

    #[tokio::test]
    async fn rejects_missing_or_unknown_identity() {
        let id = Uuid::new_v4().to_string();
        assert!(extract(None, Some("customer")).await.is_err());
        assert!(extract(Some(&id), None).await.is_err());
        assert!(extract(Some(&id), Some("superuser")).await.is_err());
        assert!(extract(Some("not-a-uuid"), Some("customer")).await.is_err());
    }
}
