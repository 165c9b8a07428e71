// Route exports
pub mod matches;
pub mod skills;
pub mod swaps;

use actix_web::{web, HttpResponse};
use std::sync::Arc;
use crate::core::Matcher;
use crate::models::ErrorResponse;
use crate::services::{LedgerError, SkillLedger, SkillRegistry};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn SkillLedger>,
    pub registry: Arc<dyn SkillRegistry>,
    pub matcher: Matcher,
    pub default_limit: u16,
    pub max_limit: u16,
}

impl AppState {
    /// Build state around one backend serving both reads and writes
    pub fn from_backend<B>(backend: Arc<B>, matcher: Matcher, default_limit: u16, max_limit: u16) -> Self
    where
        B: SkillLedger + SkillRegistry + 'static,
    {
        Self {
            ledger: backend.clone(),
            registry: backend,
            matcher,
            default_limit,
            max_limit,
        }
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(matches::configure)
            .configure(skills::configure)
            .configure(swaps::configure),
    );
}

pub(crate) fn validation_failed(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "Validation failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
        retryable: false,
    })
}

/// Map a ledger failure onto an HTTP response
///
/// Refused requests map to 400/404/409, credential or format failures to
/// 502 and backend faults to 503.
pub(crate) fn ledger_error_response(context: &str, err: &LedgerError) -> HttpResponse {
    let (mut builder, error, status_code) = match err {
        LedgerError::InvalidInput(_) => (HttpResponse::BadRequest(), "invalid_input", 400),
        LedgerError::Api { status, .. } if refused_request(*status) => {
            (HttpResponse::BadRequest(), "invalid_input", 400)
        }
        LedgerError::NotFound(_) => (HttpResponse::NotFound(), "not_found", 404),
        LedgerError::Conflict(_) => (HttpResponse::Conflict(), "conflict", 409),
        LedgerError::InvalidResponse(_) | LedgerError::Api { status: 401 | 403, .. } => {
            tracing::error!("{}: {}", context, err);
            (HttpResponse::BadGateway(), "ledger_error", 502)
        }
        _ => {
            tracing::error!("{}: {}", context, err);
            (HttpResponse::ServiceUnavailable(), "ledger_unavailable", 503)
        }
    };

    builder.json(ErrorResponse {
        error: error.to_string(),
        message: format!("{}: {}", context, err),
        status_code,
        retryable: err.is_retryable(),
    })
}

/// 4xx answers that reject the request itself rather than our credentials or rate
#[inline]
fn refused_request(status: u16) -> bool {
    (400..500).contains(&status) && !matches!(status, 401 | 403 | 408 | 429)
}
