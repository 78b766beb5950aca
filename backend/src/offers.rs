use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::FunnelResult;
use crate::negotiation::OfferDecision;
use crate::AppState;

#[derive(Deserialize)]
pub struct HandleOfferRequest {
    pub amount: i64,
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct OfferResponse {
    pub success: bool,
    pub decision: OfferDecision,
}

/// Evaluates one buyer offer against the lead's negotiation rules.
pub async fn handle_offer(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    data: web::Json<HandleOfferRequest>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let lead_id = path.into_inner();

    info!("evaluating offer of {} on lead {lead_id}", data.amount);
    let decision = state
        .negotiation
        .handle_offer(lead_id, data.amount, data.message.as_deref().unwrap_or(""))
        .await?;
    Ok(HttpResponse::Ok().json(OfferResponse {
        success: true,
        decision,
    }))
}
