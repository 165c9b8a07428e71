use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::core::MatchError;
use crate::models::{ErrorResponse, FindMatchesRequest, FindMatchesResponse, HealthResponse, MatchStats};
use crate::routes::{ledger_error_response, validation_failed, AppState};

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/find", web::post().to(find_matches));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let ledger_healthy = state.registry.health_check().await.unwrap_or(false);

    let status = if ledger_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Find matches endpoint
///
/// POST /api/v1/matches/find
///
/// Request body:
/// ```json
/// {
///   "userId": "string",
///   "limit": 20
/// }
/// ```
async fn find_matches(
    state: web::Data<AppState>,
    req: web::Json<FindMatchesRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for find_matches request: {:?}", errors);
        return validation_failed(errors);
    }

    let user_id = &req.user_id;
    let limit = req
        .limit
        .unwrap_or(state.default_limit)
        .min(state.max_limit) as usize;

    tracing::info!("Finding matches for user: {}, limit: {}", user_id, limit);

    match state
        .matcher
        .find_matches(state.ledger.as_ref(), user_id, limit)
        .await
    {
        Ok(result) => {
            tracing::info!(
                "Returning {} matches for user {} (from {} candidates, {} skipped references)",
                result.matches.len(),
                user_id,
                result.total_candidates,
                result.skipped_references
            );

            HttpResponse::Ok().json(FindMatchesResponse {
                stats: MatchStats::from_matches(&result.matches),
                matches: result.matches,
                onboarding: false,
                total_candidates: result.total_candidates,
                skipped_references: result.skipped_references,
            })
        }
        Err(MatchError::NoDeclaredSkills { .. }) => {
            tracing::info!("User {} has no skills yet, sending onboarding", user_id);
            HttpResponse::Ok().json(FindMatchesResponse {
                matches: vec![],
                stats: MatchStats::default(),
                onboarding: true,
                total_candidates: 0,
                skipped_references: 0,
            })
        }
        Err(MatchError::LedgerUnavailable(e)) => {
            ledger_error_response(&format!("Failed to find matches for {}", user_id), &e)
        }
        Err(e) => {
            tracing::error!("Matching failed for {}: {}", user_id, e);
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "matching_failed".to_string(),
                message: e.to_string(),
                status_code: 500,
                retryable: false,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use std::sync::Arc;
    use crate::core::Matcher;
    use crate::models::Direction;
    use crate::services::{InMemoryLedger, RestLedger, RestTables};

    fn app_state(ledger: Arc<InMemoryLedger>) -> AppState {
        AppState::from_backend(ledger, Matcher::default(), 20, 100)
    }

    #[::std::prelude::v1::test]
    fn test_health_check_response() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            timestamp: chrono::Utc::now(),
        };

        assert_eq!(response.status, "healthy");
    }

    #[actix_web::test]
    async fn test_user_without_skills_gets_onboarding() {
        let ledger = Arc::new(InMemoryLedger::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(ledger)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/find")
            .set_json(serde_json::json!({ "userId": "newcomer" }))
            .to_request();
        let body: FindMatchesResponse = test::call_and_read_body_json(&app, req).await;

        assert!(body.onboarding);
        assert!(body.matches.is_empty());
    }

    #[actix_web::test]
    async fn test_unavailable_ledger_is_503() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.declare("u1", "s1", Direction::Want).await;
        ledger.set_unavailable(true);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(ledger)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/find")
            .set_json(serde_json::json!({ "userId": "u1" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 503);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.retryable);
    }

    #[actix_web::test]
    async fn test_limit_out_of_range_rejected() {
        let ledger = Arc::new(InMemoryLedger::new());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(app_state(ledger)))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/find")
            .set_json(serde_json::json!({ "userId": "u1", "limit": 0 }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn test_rejected_user_id_is_client_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/user_skills")
            .match_query(mockito::Matcher::Any)
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"code":"22P02","message":"invalid input syntax for type uuid: \"not-a-uuid\""}"#)
            .create_async()
            .await;

        let ledger = RestLedger::new(server.url(), "key".to_string(), 5, RestTables::default()).unwrap();
        let state = AppState::from_backend(Arc::new(ledger), Matcher::default(), 20, 100);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/matches/find")
            .set_json(serde_json::json!({ "userId": "not-a-uuid" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 400);

        let body: ErrorResponse = test::read_body_json(resp).await;
        assert_eq!(body.error, "invalid_input");
        assert!(!body.retryable);
    }
}
