use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::FunnelResult;
use crate::funnel::{AdvanceOutcome, PipelineFilter};
use crate::models::{ActionResult, Lead, NegotiationRules};
use crate::negotiation::CloseDealRequest;
use crate::AppState;

#[derive(Serialize)]
pub struct AdvanceResponse {
    pub success: bool,
    pub lead: Lead,
    pub action: ActionResult,
}

#[derive(Serialize)]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
    pub lead: Lead,
}

#[derive(Deserialize)]
pub struct ToggleAiRequest {
    pub enabled: bool,
}

/// Runs one funnel step for the lead.
pub async fn advance_lead(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let lead_id = path.into_inner();

    info!("advancing lead {lead_id}");
    let AdvanceOutcome { lead, action } = state.funnel.advance(lead_id).await?;
    Ok(HttpResponse::Ok().json(AdvanceResponse {
        success: true,
        lead,
        action,
    }))
}

/// Manual close-deal override for authorized operators.
pub async fn close_deal(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    data: web::Json<CloseDealRequest>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let lead_id = path.into_inner();

    info!("manually closing lead {lead_id}");
    let lead = state
        .negotiation
        .close_deal(lead_id, data.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(LeadResponse {
        success: true,
        message: "Deal closed".to_string(),
        lead,
    }))
}

/// Replaces the lead's negotiation bounds.
pub async fn set_negotiation_rules(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    data: web::Json<NegotiationRules>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let lead_id = path.into_inner();

    let lead = state.negotiation.set_rules(lead_id, data.into_inner())?;
    Ok(HttpResponse::Ok().json(LeadResponse {
        success: true,
        message: "Negotiation rules updated".to_string(),
        lead,
    }))
}

/// Turns automated offer evaluation on or off for the lead.
pub async fn toggle_ai_negotiation(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    data: web::Json<ToggleAiRequest>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let lead_id = path.into_inner();

    let lead = state.negotiation.toggle_ai(lead_id, data.enabled)?;
    Ok(HttpResponse::Ok().json(LeadResponse {
        success: true,
        message: format!(
            "AI negotiation {}",
            if data.enabled { "enabled" } else { "disabled" }
        ),
        lead,
    }))
}

/// Aggregates the caller's leads by funnel stage with computed metrics.
pub async fn get_pipeline(
    req: HttpRequest,
    state: web::Data<AppState>,
    filter: web::Query<PipelineFilter>,
) -> FunnelResult<HttpResponse> {
    let caller = auth::verify_token(&req, &state.config.jwt_secret)?;

    let report = state.funnel.pipeline(caller, &filter)?;
    Ok(HttpResponse::Ok().json(report))
}
