use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::models::{CreateSwapRequestRequest, SwapRequestResponse};
use crate::routes::{ledger_error_response, validation_failed, AppState};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/swap-requests", web::post().to(create_swap_request));
}

/// Propose a swap to a match
///
/// POST /api/v1/swap-requests
///
/// Request body:
/// ```json
/// {
///   "requesterId": "string",
///   "receiverId": "string",
///   "offeredSkillId": "string",
///   "requestedSkillId": "string"
/// }
/// ```
async fn create_swap_request(
    state: web::Data<AppState>,
    req: web::Json<CreateSwapRequestRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state.registry.create_swap_request(req.into_inner().into()).await {
        Ok(request) => {
            tracing::info!(
                "Swap request {} created: {} -> {}",
                request.id,
                request.requester_id,
                request.receiver_id
            );
            HttpResponse::Created().json(SwapRequestResponse { request })
        }
        Err(e) => ledger_error_response("Failed to create swap request", &e),
    }
}
