use std::sync::Arc;

use actix_web::{web, App, HttpResponse, HttpServer};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sales_funnel_backend::advisor::{DecisionAdvisor, GeminiAdvisor, NullAdvisor};
use sales_funnel_backend::auth;
use sales_funnel_backend::config::AppConfig;
use sales_funnel_backend::funnel::FunnelEngine;
use sales_funnel_backend::negotiation::NegotiationEngine;
use sales_funnel_backend::notify::{ChannelSender, NotificationDispatcher};
use sales_funnel_backend::scheduler::ViewingScheduler;
use sales_funnel_backend::store::MemoryStore;
use sales_funnel_backend::transports::{CelcomSmsSender, SmtpEmailSender, TwilioChatSender};
use sales_funnel_backend::{automation, leads, offers, viewings, AppState};

#[derive(Deserialize)]
struct LoginRequest {
    user_id: String,
}

async fn login(state: web::Data<AppState>, data: web::Json<LoginRequest>) -> HttpResponse {
    match auth::create_token(&data.user_id, &state.config.jwt_secret) {
        Ok(token) => HttpResponse::Ok().json(json!({ "token": token })),
        Err(e) => HttpResponse::InternalServerError().body(format!("Failed to issue token: {e}")),
    }
}

/// Builds the channel priority list from whatever transports are configured:
/// chat messaging first, then SMS, then email.
fn build_senders(config: &AppConfig) -> Vec<Arc<dyn ChannelSender>> {
    let mut senders: Vec<Arc<dyn ChannelSender>> = Vec::new();
    if !config.twilio_account_sid.is_empty() {
        senders.push(Arc::new(TwilioChatSender::new(
            config.twilio_api_url.clone(),
            config.twilio_account_sid.clone(),
            config.twilio_auth_token.clone(),
            config.twilio_whatsapp_number.clone(),
        )));
    } else {
        warn!("chat messaging transport not configured");
    }
    if !config.sms_api_key.is_empty() {
        senders.push(Arc::new(CelcomSmsSender::new(
            config.sms_api_url.clone(),
            config.sms_api_key.clone(),
            config.sms_partner_id.clone(),
            config.sms_shortcode.clone(),
        )));
    } else {
        warn!("SMS transport not configured");
    }
    if !config.smtp_relay.is_empty() {
        match SmtpEmailSender::new(
            &config.smtp_relay,
            config.smtp_username.clone(),
            config.smtp_password.clone(),
            &config.email_from,
        ) {
            Ok(sender) => senders.push(Arc::new(sender)),
            Err(e) => warn!("email transport not available: {e}"),
        }
    } else {
        warn!("email transport not configured");
    }
    senders
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load()?;
    info!("configuration loaded");

    let advisor: Arc<dyn DecisionAdvisor> = if config.advisor_api_key.is_empty() {
        warn!("GEMINI_API_KEY not configured, decisions will use deterministic fallbacks");
        Arc::new(NullAdvisor)
    } else {
        Arc::new(GeminiAdvisor::new(
            config.advisor_endpoint.clone(),
            config.advisor_api_key.clone(),
            config.advisor_timeout,
        )?)
    };

    let store = Arc::new(MemoryStore::new());
    let dispatcher = Arc::new(NotificationDispatcher::new(build_senders(&config)));
    let scheduler = Arc::new(ViewingScheduler::new(
        store.clone(),
        advisor.clone(),
        dispatcher.clone(),
    ));
    let negotiation = Arc::new(NegotiationEngine::new(
        store.clone(),
        advisor.clone(),
        dispatcher.clone(),
    ));
    let funnel = Arc::new(FunnelEngine::new(
        store.clone(),
        dispatcher.clone(),
        scheduler.clone(),
        negotiation.clone(),
    ));

    let port = config.port;
    let state = AppState {
        config,
        store,
        funnel,
        negotiation,
        scheduler,
    };

    info!("starting server on port {port}");
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/login", web::post().to(login))
            .route("/leads/{id}/advance", web::post().to(leads::advance_lead))
            .route("/leads/{id}/close", web::post().to(leads::close_deal))
            .route(
                "/leads/{id}/negotiation/rules",
                web::put().to(leads::set_negotiation_rules),
            )
            .route(
                "/leads/{id}/negotiation/ai",
                web::put().to(leads::toggle_ai_negotiation),
            )
            .route("/leads/{id}/offers", web::post().to(offers::handle_offer))
            .route(
                "/leads/{id}/viewing-slots",
                web::get().to(viewings::find_slots),
            )
            .route("/pipeline", web::get().to(leads::get_pipeline))
            .route("/viewings", web::post().to(viewings::schedule_viewing))
            .route(
                "/viewings/{id}/confirm",
                web::post().to(viewings::confirm_viewing),
            )
            .route(
                "/viewings/{id}/complete",
                web::post().to(viewings::complete_viewing),
            )
            .route(
                "/automation/pursue",
                web::post().to(automation::pursue_stalled),
            )
            .route(
                "/automation/reminders",
                web::post().to(automation::send_reminders),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
