//! Concrete channel senders wrapping the external transport providers.
//! Each returns success or failure plus the provider's message identifier;
//! retry policy stays with the provider.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

use crate::notify::{Channel, ChannelSender, OutboundMessage, Target, TransportError, TransportReceipt};

/// WhatsApp-style chat messaging via the Twilio REST API.
pub struct TwilioChatSender {
    client: reqwest::Client,
    api_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl TwilioChatSender {
    pub fn new(
        api_url: String,
        account_sid: String,
        auth_token: String,
        from_number: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            account_sid,
            auth_token,
            from_number,
        }
    }
}

#[async_trait]
impl ChannelSender for TwilioChatSender {
    fn channel(&self) -> Channel {
        Channel::Chat
    }

    fn can_reach(&self, target: &Target) -> bool {
        target.phone.is_some()
    }

    async fn send(
        &self,
        target: &Target,
        message: &OutboundMessage,
    ) -> Result<TransportReceipt, TransportError> {
        let phone = target
            .phone
            .as_deref()
            .ok_or_else(|| TransportError::new(Channel::Chat, "target has no phone number"))?;

        let params = [
            ("From", format!("whatsapp:{}", self.from_number)),
            ("To", format!("whatsapp:{}", phone.trim())),
            ("Body", message.body.clone()),
        ];
        let response = self
            .client
            .post(&self.api_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| TransportError::new(Channel::Chat, e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::new(
                Channel::Chat,
                format!("provider returned {}", response.status()),
            ));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::new(Channel::Chat, e.to_string()))?;
        let sid = body["sid"].as_str().unwrap_or("unknown").to_string();
        Ok(TransportReceipt {
            channel: Channel::Chat,
            provider_id: sid,
        })
    }
}

/// Bulk-SMS gateway in the Celcom Africa style: JSON POST carrying the api
/// key, partner id, shortcode and mobile number.
pub struct CelcomSmsSender {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    partner_id: String,
    shortcode: String,
}

impl CelcomSmsSender {
    pub fn new(api_url: String, api_key: String, partner_id: String, shortcode: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            partner_id,
            shortcode,
        }
    }
}

#[async_trait]
impl ChannelSender for CelcomSmsSender {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    fn can_reach(&self, target: &Target) -> bool {
        target.phone.is_some()
    }

    async fn send(
        &self,
        target: &Target,
        message: &OutboundMessage,
    ) -> Result<TransportReceipt, TransportError> {
        let phone = target
            .phone
            .as_deref()
            .ok_or_else(|| TransportError::new(Channel::Sms, "target has no phone number"))?;

        let payload = json!({
            "apikey": self.api_key,
            "partnerID": self.partner_id,
            "shortcode": self.shortcode,
            "mobile": phone.trim(),
            "message": message.body,
        });
        let response = self
            .client
            .post(&self.api_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TransportError::new(Channel::Sms, e.to_string()))?;

        if !response.status().is_success() {
            return Err(TransportError::new(
                Channel::Sms,
                format!("provider returned {}", response.status()),
            ));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TransportError::new(Channel::Sms, e.to_string()))?;

        // Celcom answers with an array of per-recipient responses.
        let first = &body["responses"][0];
        let code = first["response-code"].as_i64().unwrap_or(0);
        if code != 200 {
            return Err(TransportError::new(
                Channel::Sms,
                format!("gateway response code {code}"),
            ));
        }
        let message_id = first["messageid"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| first["messageid"].to_string());
        Ok(TransportReceipt {
            channel: Channel::Sms,
            provider_id: message_id,
        })
    }
}

/// SMTP email sender.
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(
        relay: &str,
        username: String,
        password: String,
        from: &str,
    ) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(relay)?
            .credentials(Credentials::new(username, password))
            .build();
        let from = from.parse::<Mailbox>()?;
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl ChannelSender for SmtpEmailSender {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn can_reach(&self, target: &Target) -> bool {
        target.email.is_some()
    }

    async fn send(
        &self,
        target: &Target,
        message: &OutboundMessage,
    ) -> Result<TransportReceipt, TransportError> {
        let to = target
            .email
            .as_deref()
            .ok_or_else(|| TransportError::new(Channel::Email, "target has no email address"))?
            .parse::<Mailbox>()
            .map_err(|e| TransportError::new(Channel::Email, e.to_string()))?;

        let subject = message
            .subject
            .clone()
            .unwrap_or_else(|| "Notification".to_string());
        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject);
        let email = match &message.html_body {
            Some(html) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone()),
            None => builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body.clone()),
        }
        .map_err(|e| TransportError::new(Channel::Email, e.to_string()))?;

        let response = self
            .transport
            .send(email)
            .await
            .map_err(|e| TransportError::new(Channel::Email, e.to_string()))?;
        Ok(TransportReceipt {
            channel: Channel::Email,
            provider_id: response.code().to_string(),
        })
    }
}
