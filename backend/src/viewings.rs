use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::auth;
use crate::error::{FunnelError, FunnelResult};
use crate::models::{AttendeeRole, Viewing, ViewingOutcome, ViewingType};
use crate::scheduler::ScheduleOptions;
use crate::AppState;

#[derive(Deserialize)]
pub struct FindSlotsQuery {
    pub property_id: Uuid,
    /// Comma-separated list of YYYY-MM-DD dates the client prefers.
    pub preferred_dates: Option<String>,
}

#[derive(Deserialize)]
pub struct ScheduleViewingRequest {
    pub lead_id: Uuid,
    pub property_id: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: Option<i64>,
    pub viewing_type: Option<ViewingType>,
    pub rescheduled_from: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ConfirmViewingRequest {
    pub role: AttendeeRole,
}

#[derive(Serialize)]
pub struct ViewingResponse {
    pub success: bool,
    pub message: String,
    pub viewing: Viewing,
}

fn parse_preferred_dates(raw: Option<&str>) -> FunnelResult<Vec<NaiveDate>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| FunnelError::validation(format!("invalid preferred date: {s}")))
        })
        .collect()
}

/// Proposes conflict-free viewing slots for the lead on a property.
pub async fn find_slots(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<FindSlotsQuery>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let lead_id = path.into_inner();
    let preferred = parse_preferred_dates(query.preferred_dates.as_deref())?;

    let proposal = state
        .scheduler
        .find_slots(lead_id, query.property_id, &preferred, Utc::now())
        .await?;
    Ok(HttpResponse::Ok().json(proposal))
}

/// Books a viewing manually on behalf of the calling agent.
pub async fn schedule_viewing(
    req: HttpRequest,
    state: web::Data<AppState>,
    data: web::Json<ScheduleViewingRequest>,
) -> FunnelResult<HttpResponse> {
    let caller = auth::verify_token(&req, &state.config.jwt_secret)?;
    let data = data.into_inner();

    info!(
        "scheduling viewing for lead {} at {}",
        data.lead_id, data.scheduled_date
    );
    let mut options = ScheduleOptions {
        scheduled_by: Some(caller),
        rescheduled_from: data.rescheduled_from,
        ..ScheduleOptions::default()
    };
    if let Some(duration) = data.duration_minutes {
        options.duration_minutes = duration;
    }
    if let Some(viewing_type) = data.viewing_type {
        options.viewing_type = viewing_type;
    }

    let viewing = state
        .scheduler
        .schedule(data.lead_id, data.property_id, data.scheduled_date, options)
        .await?;
    Ok(HttpResponse::Ok().json(ViewingResponse {
        success: true,
        message: "Viewing scheduled".to_string(),
        viewing,
    }))
}

/// Records one side's attendance confirmation.
pub async fn confirm_viewing(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    data: web::Json<ConfirmViewingRequest>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let viewing_id = path.into_inner();

    let viewing = state.scheduler.confirm(viewing_id, data.role)?;
    Ok(HttpResponse::Ok().json(ViewingResponse {
        success: true,
        message: "Confirmation recorded".to_string(),
        viewing,
    }))
}

/// Marks the viewing completed and routes the lead by the recorded outcome.
pub async fn complete_viewing(
    req: HttpRequest,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    data: web::Json<ViewingOutcome>,
) -> FunnelResult<HttpResponse> {
    auth::verify_token(&req, &state.config.jwt_secret)?;
    let viewing_id = path.into_inner();

    let viewing = state.scheduler.complete(viewing_id, data.into_inner())?;
    Ok(HttpResponse::Ok().json(ViewingResponse {
        success: true,
        message: "Viewing completed".to_string(),
        viewing,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preferred_dates_parse_and_reject_garbage() {
        let dates = parse_preferred_dates(Some("2025-06-03, 2025-06-05")).expect("dates");
        assert_eq!(dates.len(), 2);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2025, 6, 3).expect("date"));

        assert!(parse_preferred_dates(Some("next tuesday")).is_err());
        assert!(parse_preferred_dates(None).expect("empty").is_empty());
    }
}
