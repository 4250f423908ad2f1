//! Operator identification
//!
//! Every mutating call is attributed to an operator taken from the
//! `X-Operator-Id` and `X-Operator-Name` request headers.

use axum::{extract::FromRequestParts, http::request::Parts};
use shared::OperatorContext;

use crate::error::AppError;
use crate::AppState;

pub const OPERATOR_ID_HEADER: &str = "x-operator-id";
pub const OPERATOR_NAME_HEADER: &str = "x-operator-name";

/// Extractor for the operator behind the current request
#[derive(Clone, Debug)]
pub struct Operator(pub OperatorContext);

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Operator {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let operator_id = header(parts, OPERATOR_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized("Missing X-Operator-Id header".into()))?
            .parse::<i64>()
            .map_err(|_| AppError::Unauthorized("X-Operator-Id must be an integer".into()))?;

        let operator_name = match header(parts, OPERATOR_NAME_HEADER) {
            Some(name) => name.to_string(),
            None => state
                .services
                .master
                .operator_name(operator_id)
                .await?
                .unwrap_or_else(|| OperatorContext::system().operator_name),
        };

        Ok(Operator(OperatorContext::new(operator_id, operator_name)))
    }
}
