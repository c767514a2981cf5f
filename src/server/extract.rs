//! Request extractors: who is asking, which units they want, and whether
//! the request came from htmx.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use super::app::AppState;
use super::error::AppError;
use crate::database::entities::users;
use crate::services::TeamService;
use crate::units::{UnitSystem, UNIT_COOKIE};

/// The authenticated user, provisioned on first sight.
pub struct CurrentUser(pub users::Model);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let from_header = parts
            .headers
            .get(state.config.identity_header.as_str())
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let username = from_header
            .or_else(|| state.config.dev_user.clone())
            .ok_or(AppError::Unauthenticated)?;

        debug!("Request by {}", username);
        let user = TeamService::new(state.db.clone()).resolve_user(&username).await?;
        Ok(CurrentUser(user))
    }
}

/// Display units chosen by the `unit_system` cookie.
pub struct Units(pub UnitSystem);

pub fn cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Units {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Units(
            cookie_value(parts, UNIT_COOKIE)
                .map(UnitSystem::from_cookie)
                .unwrap_or_default(),
        ))
    }
}

/// True when the request carries `HX-Request`.
pub struct HxRequest(pub bool);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for HxRequest {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(HxRequest(parts.headers.contains_key("hx-request")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_cookie_value_finds_named_cookie() {
        let request = Request::builder()
            .header(header::COOKIE, "session=abc; unit_system=IP")
            .body(())
            .unwrap();
        let (parts, _) = request.into_parts();
        assert_eq!(cookie_value(&parts, "unit_system"), Some("IP"));
        assert_eq!(cookie_value(&parts, "missing"), None);
    }
}
