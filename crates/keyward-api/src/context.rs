//! Extracts the [`CommandContext`] of a request from its headers.

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::request::Parts;
use keyward_core::command::CommandContext;
use keyward_core::error::DomainError;
use uuid::Uuid;

use crate::error::ApiError;

/// Caller identity.
pub const EDITOR_HEADER: &str = "x-keyward-editor";
/// Organization the command runs in.
pub const ORGANIZATION_HEADER: &str = "x-keyward-org";
/// Optional caller-supplied correlation ID.
pub const CORRELATION_HEADER: &str = "x-correlation-id";

/// Who is calling, for which organization.
#[derive(Debug, Clone)]
pub struct RequestContext(pub CommandContext);

impl RequestContext {
    fn from_headers(headers: &HeaderMap) -> Result<Self, DomainError> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };
        let editor = header(EDITOR_HEADER)
            .ok_or_else(|| DomainError::InvalidArgument(format!("missing {EDITOR_HEADER} header")))?;
        let organization = header(ORGANIZATION_HEADER).ok_or_else(|| {
            DomainError::InvalidArgument(format!("missing {ORGANIZATION_HEADER} header"))
        })?;

        let mut ctx = CommandContext::new(editor, organization);
        if let Some(raw) = header(CORRELATION_HEADER) {
            let correlation_id = Uuid::parse_str(raw).map_err(|e| {
                DomainError::InvalidArgument(format!("{CORRELATION_HEADER} is not a UUID: {e}"))
            })?;
            ctx = ctx.with_correlation_id(correlation_id);
        }
        Ok(Self(ctx))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers)?)
    }
}
