//! Acting user extractor.
//!
//! Authentication happens upstream; the gateway forwards the acting user's id
//! in `X-Actor-Id`. Requests without it are treated as system actions.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use domain::models::AuditAction;
use domain::services::AuditLogBuilder;
use uuid::Uuid;

use crate::error::ApiError;

/// The header carrying the acting user's id.
pub const ACTOR_ID_HEADER: &str = "x-actor-id";

/// Who performed a request, plus the client details kept in the audit log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    pub id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl Actor {
    /// The actor id, required for per-user endpoints.
    pub fn require_id(&self) -> Result<Uuid, ApiError> {
        self.id.ok_or_else(|| {
            ApiError::Unauthorized(format!("Missing {} header", ACTOR_ID_HEADER))
        })
    }

    /// Audit entry for `action` by this actor, client details filled in.
    pub fn audit(&self, action: AuditAction) -> AuditLogBuilder {
        AuditLogBuilder::action(self.id, action)
            .with_ip(self.ip_address.clone())
            .with_user_agent(self.user_agent.clone())
    }
}

fn header_str<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header_str(parts, ACTOR_ID_HEADER)
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| {
                    ApiError::Validation(format!("{} must be a UUID", ACTOR_ID_HEADER))
                })
            })
            .transpose()?;

        let ip_address = header_str(parts, "x-forwarded-for")
            .and_then(|forwarded| forwarded.split(',').next())
            .map(|ip| ip.trim().to_string())
            .or_else(|| header_str(parts, "x-real-ip").map(str::to_string));

        let user_agent = header_str(parts, header::USER_AGENT.as_str()).map(str::to_string);

        Ok(Actor {
            id,
            ip_address,
            user_agent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<Actor, ApiError> {
        let (mut parts, _) = request.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_missing_header_is_system_action() {
        let actor = extract(Request::builder().body(()).unwrap()).await.unwrap();
        assert_eq!(actor, Actor::default());
        assert!(actor.require_id().is_err());
    }

    #[tokio::test]
    async fn test_actor_and_client_details() {
        let id = Uuid::new_v4();
        let request = Request::builder()
            .header(ACTOR_ID_HEADER, id.to_string())
            .header("x-forwarded-for", "203.0.113.7, 10.0.0.1")
            .header("user-agent", "back-office/2.1")
            .body(())
            .unwrap();

        let actor = extract(request).await.unwrap();
        assert_eq!(actor.id, Some(id));
        assert_eq!(actor.require_id().unwrap(), id);
        assert_eq!(actor.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(actor.user_agent.as_deref(), Some("back-office/2.1"));
    }

    #[tokio::test]
    async fn test_malformed_actor_is_rejected() {
        let request = Request::builder()
            .header(ACTOR_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(extract(request).await, Err(ApiError::Validation(_))));
    }
}
