//! Actor context for lifecycle operations.
//!
//! Identity and sessions are handled upstream; by the time a request reaches
//! this service the identity provider has stamped it with `x-actor-*`
//! headers. Every service call takes the resulting [`Actor`] explicitly.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::errors::ServiceError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";
pub const ACTOR_COMPANY_HEADER: &str = "x-actor-company";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Ordering company.
    Client,
    /// Internal order coordinator.
    OrderManager,
    /// Production and goods-receiving staff.
    Manufacturing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
    /// Company the actor belongs to. Clients are matched against
    /// `orders.customer_name` with it.
    pub company: Option<String>,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            company: None,
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Fails with `Forbidden` unless the actor holds one of `allowed`.
    pub fn require_role(&self, allowed: &[Role]) -> Result<(), ServiceError> {
        if allowed.contains(&self.role) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Role '{}' may not perform this operation",
                self.role
            )))
        }
    }

    /// Clients only see their own company's orders. Other roles see all.
    /// A client without a company sees nothing.
    pub fn can_access_customer(&self, customer_name: &str) -> bool {
        match (self.role, self.company.as_deref()) {
            (Role::Client, Some(company)) => company == customer_name,
            (Role::Client, None) => false,
            _ => true,
        }
    }

    /// The customer a client is confined to, `None` for staff roles.
    pub fn customer_scope(&self) -> Result<Option<&str>, ServiceError> {
        match (self.role, self.company.as_deref()) {
            (Role::Client, Some(company)) => Ok(Some(company)),
            (Role::Client, None) => Err(ServiceError::Forbidden(format!(
                "Client '{}' has no company; send {}",
                self.id, ACTOR_COMPANY_HEADER
            ))),
            _ => Ok(None),
        }
    }

    /// `Forbidden` unless the actor may see orders of `customer_name`.
    pub fn ensure_customer_access(
        &self,
        order_no: &str,
        customer_name: &str,
    ) -> Result<(), ServiceError> {
        self.customer_scope()?;
        if self.can_access_customer(customer_name) {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!(
                "Order {} belongs to another customer",
                order_no
            )))
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, ACTOR_ID_HEADER)
            .ok_or_else(|| ServiceError::Unauthorized(format!("Missing {} header", ACTOR_ID_HEADER)))?;
        let role = header(parts, ACTOR_ROLE_HEADER)
            .ok_or_else(|| {
                ServiceError::Unauthorized(format!("Missing {} header", ACTOR_ROLE_HEADER))
            })
            .and_then(|raw| {
                Role::from_str(raw)
                    .map_err(|_| ServiceError::Unauthorized(format!("Unknown role '{}'", raw)))
            })?;

        Ok(Actor {
            id: id.to_string(),
            role,
            company: header(parts, ACTOR_COMPANY_HEADER).map(str::to_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::http::Request;

    async fn extract(req: Request<()>) -> Result<Actor, ServiceError> {
        let (mut parts, _) = req.into_parts();
        Actor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn actor_is_read_from_headers() {
        let req = Request::builder()
            .header(ACTOR_ID_HEADER, "kim")
            .header(ACTOR_ROLE_HEADER, "order_manager")
            .body(())
            .unwrap();
        let actor = extract(req).await.unwrap();
        assert_eq!(actor, Actor::new("kim", Role::OrderManager));
    }

    #[tokio::test]
    async fn missing_or_unknown_role_is_unauthorized() {
        let req = Request::builder()
            .header(ACTOR_ID_HEADER, "kim")
            .body(())
            .unwrap();
        assert_matches!(extract(req).await, Err(ServiceError::Unauthorized(_)));

        let req = Request::builder()
            .header(ACTOR_ID_HEADER, "kim")
            .header(ACTOR_ROLE_HEADER, "admin")
            .body(())
            .unwrap();
        assert_matches!(extract(req).await, Err(ServiceError::Unauthorized(_)));
    }

    #[test]
    fn role_gate_and_company_scope() {
        let client = Actor::new("c1", Role::Client).with_company("Acme Cells");
        assert!(client.require_role(&[Role::Client]).is_ok());
        assert_matches!(
            client.require_role(&[Role::OrderManager, Role::Manufacturing]),
            Err(ServiceError::Forbidden(_))
        );
        assert!(client.can_access_customer("Acme Cells"));
        assert!(!client.can_access_customer("Other Co"));
        assert!(Actor::new("m1", Role::OrderManager).can_access_customer("Other Co"));
    }

    #[test]
    fn client_without_company_is_confined_to_nothing() {
        let client = Actor::new("c2", Role::Client);
        assert!(!client.can_access_customer("Acme Cells"));
        assert_matches!(client.customer_scope(), Err(ServiceError::Forbidden(_)));
        assert_matches!(
            client.ensure_customer_access("ORD-2024-001", "Acme Cells"),
            Err(ServiceError::Forbidden(_))
        );

        let manager = Actor::new("m1", Role::OrderManager);
        assert_matches!(manager.customer_scope(), Ok(None));
        assert!(manager.ensure_customer_access("ORD-2024-001", "Acme Cells").is_ok());
        let scoped = Actor::new("c1", Role::Client).with_company("Acme Cells");
        assert_matches!(scoped.customer_scope(), Ok(Some("Acme Cells")));
    }
}
