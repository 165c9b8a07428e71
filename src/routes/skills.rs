use actix_web::{web, HttpResponse, Responder};
use validator::Validate;
use crate::models::{
    DeclareSkillRequest, DeclareSkillResponse, RemoveSkillRequest, RemoveSkillResponse,
    UserSkillsResponse,
};
use crate::routes::{ledger_error_response, validation_failed, AppState};
use crate::services::list_user_skills;

/// Configure skill declaration routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/skills", web::post().to(declare_skill))
        .route("/skills/remove", web::post().to(remove_skill))
        .route("/users/{user_id}/skills", web::get().to(user_skills));
}

/// List a user's offered and wanted skills
///
/// GET /api/v1/users/{user_id}/skills
async fn user_skills(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let user_id = path.into_inner();

    match list_user_skills(state.ledger.as_ref(), &user_id).await {
        Ok(skills) => {
            tracing::debug!(
                "User {} offers {} and wants {} skills",
                user_id,
                skills.offered.len(),
                skills.wanted.len()
            );
            HttpResponse::Ok().json(UserSkillsResponse {
                user_id,
                offered: skills.offered,
                wanted: skills.wanted,
            })
        }
        Err(e) => ledger_error_response(&format!("Failed to list skills for {}", user_id), &e),
    }
}

/// Declare an offered or wanted skill
///
/// POST /api/v1/skills
///
/// The skill is looked up by name (case-insensitive) and created when it
/// does not exist yet.
async fn declare_skill(
    state: web::Data<AppState>,
    req: web::Json<DeclareSkillRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    let req = req.into_inner();
    let user_id = req.user_id.clone();
    let direction = req.direction;

    match state.registry.declare_skill(req.into()).await {
        Ok(declaration) => {
            tracing::info!(
                "User {} declared skill {} as {}",
                user_id,
                declaration.skill_id,
                direction
            );
            HttpResponse::Created().json(DeclareSkillResponse { declaration })
        }
        Err(e) => ledger_error_response("Failed to declare skill", &e),
    }
}

/// Remove one declaration
///
/// POST /api/v1/skills/remove
async fn remove_skill(
    state: web::Data<AppState>,
    req: web::Json<RemoveSkillRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_failed(errors);
    }

    match state
        .registry
        .remove_declaration(&req.user_id, &req.skill_id, req.direction)
        .await
    {
        Ok(removed) => {
            tracing::debug!(
                "Remove {} {} for {}: removed={}",
                req.direction,
                req.skill_id,
                req.user_id,
                removed
            );
            HttpResponse::Ok().json(RemoveSkillResponse { removed })
        }
        Err(e) => ledger_error_response("Failed to remove skill", &e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use std::sync::Arc;
    use crate::core::Matcher;
    use crate::models::{Direction, Skill};
    use crate::services::InMemoryLedger;

    #[actix_web::test]
    async fn test_declared_skills_listed_for_removal() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger
            .insert_skill(Skill {
                id: "s1".to_string(),
                name: "Guitar".to_string(),
                category: "Music".to_string(),
                description: None,
            })
            .await;
        ledger.declare("u1", "s1", Direction::Offer).await;

        let state = AppState::from_backend(ledger, Matcher::default(), 20, 100);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/users/u1/skills").to_request();
        let body: UserSkillsResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.user_id, "u1");
        assert_eq!(body.offered.len(), 1);
        assert_eq!(body.offered[0].name, "Guitar");
        assert!(body.wanted.is_empty());

        // The listed id is what removal takes
        let req = test::TestRequest::post()
            .uri("/skills/remove")
            .set_json(serde_json::json!({
                "userId": "u1",
                "skillId": body.offered[0].id,
                "direction": "offer",
            }))
            .to_request();
        let removed: RemoveSkillResponse = test::call_and_read_body_json(&app, req).await;
        assert!(removed.removed);
    }

    #[actix_web::test]
    async fn test_listing_on_unavailable_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_unavailable(true);

        let state = AppState::from_backend(ledger, Matcher::default(), 20, 100);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/users/u1/skills").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status().as_u16(), 503);
    }
}
