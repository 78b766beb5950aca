//! Batch entry points invoked by the external job scheduler. The scheduler
//! passes `now` explicitly (defaulting to the wall clock) so runs stay
//! reproducible.

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::auth;
use crate::error::FunnelResult;
use crate::AppState;

#[derive(Deserialize)]
pub struct BatchQuery {
    pub now: Option<DateTime<Utc>>,
}

/// Re-engages every lead whose follow-up date has come due.
pub async fn pursue_stalled(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<BatchQuery>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let now = query.now.unwrap_or_else(Utc::now);

    info!("running lead pursuit batch at {now}");
    let run = state.funnel.pursue_stalled(now).await?;
    Ok(HttpResponse::Ok().json(run))
}

/// Sends reminders for every viewing scheduled within the next calendar day.
pub async fn send_reminders(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<BatchQuery>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let now = query.now.unwrap_or_else(Utc::now);

    info!("running viewing reminder batch at {now}");
    let run = state.scheduler.send_due_reminders(now).await?;
    Ok(HttpResponse::Ok().json(run))
}
