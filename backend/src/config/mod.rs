use dotenv::dotenv;
use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub jwt_secret: String,
    // Decision advisor (Gemini-style endpoint). Empty key disables the
    // advisor and every decision runs on the deterministic fallbacks.
    pub advisor_endpoint: String,
    pub advisor_api_key: String,
    pub advisor_timeout: Duration,
    // Chat messaging (Twilio-style WhatsApp API)
    pub twilio_api_url: String,
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_number: String,
    // SMS gateway (Celcom-style bulk SMS API)
    pub sms_api_url: String,
    pub sms_api_key: String,
    pub sms_partner_id: String,
    pub sms_shortcode: String,
    // SMTP email
    pub smtp_relay: String,
    pub smtp_username: String,
    pub smtp_password: String,
    pub email_from: String,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present
        Ok(Self {
            port: env::var("PORT").unwrap_or_else(|_| "8080".to_string()).parse()?,
            jwt_secret: env::var("JWT_SECRET")?,
            advisor_endpoint: env::var("ADVISOR_ENDPOINT").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                    .to_string()
            }),
            advisor_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
            advisor_timeout: Duration::from_secs(
                env::var("ADVISOR_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            ),
            twilio_api_url: env::var("TWILIO_API_URL").unwrap_or_default(),
            twilio_account_sid: env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_whatsapp_number: env::var("TWILIO_WHATSAPP_NUMBER").unwrap_or_default(),
            sms_api_url: env::var("CELCOM_AFRICA_API_URL").unwrap_or_default(),
            sms_api_key: env::var("CELCOM_AFRICA_API_KEY").unwrap_or_default(),
            sms_partner_id: env::var("CELCOM_AFRICA_PARTNER_ID").unwrap_or_default(),
            sms_shortcode: env::var("CELCOM_AFRICA_SHORTCODE")
                .unwrap_or_else(|_| "GENESIS".to_string()),
            smtp_relay: env::var("SMTP_RELAY").unwrap_or_default(),
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM").unwrap_or_default(),
        })
    }
}
