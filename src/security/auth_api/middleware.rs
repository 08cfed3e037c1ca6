use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::convert::Infallible;
use std::sync::Arc;

use super::types::Caller;
use crate::core::shared::state::AppState;

fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|auth| {
            let (scheme, token) = auth.split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        })
}

/// Caller identity if the request carries a valid bearer token.
///
/// Never rejects: the ticket operations decide whether an anonymous
/// request is acceptable and answer `Unauthorized` themselves.
#[derive(Debug, Clone)]
pub struct OptionalCaller(pub Option<Caller>);

impl OptionalCaller {
    pub fn caller(&self) -> Option<&Caller> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalCaller {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = extract_bearer_token(&parts.headers).and_then(|token| state.auth.resolve(token));
        Ok(OptionalCaller(caller))
    }
}
