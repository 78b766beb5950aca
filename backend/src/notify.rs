use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

/// Delivery channels, in fixed fallback priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Chat,
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

/// Who a notification goes to.
#[derive(Debug, Clone, Default)]
pub struct Target {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Target {
    pub fn reachable(&self) -> bool {
        self.phone.is_some() || self.email.is_some()
    }
}

/// One outbound message, channel-agnostic. Channels that cannot carry the
/// subject or HTML body simply drop them.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub body: String,
    pub subject: Option<String>,
    pub html_body: Option<String>,
}

impl OutboundMessage {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            subject: None,
            html_body: None,
        }
    }

    pub fn with_subject(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            subject: Some(subject.into()),
            html_body: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{channel:?} transport failed: {message}")]
pub struct TransportError {
    pub channel: Channel,
    pub message: String,
}

impl TransportError {
    pub fn new(channel: Channel, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
        }
    }
}

/// Transport-assigned identifier for a successful send.
#[derive(Debug, Clone)]
pub struct TransportReceipt {
    pub channel: Channel,
    pub provider_id: String,
}

/// One concrete delivery capability (chat-messaging, SMS, email).
/// Retry/backoff belongs to the transport provider, not to this seam.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> Channel;

    /// Whether the target carries the contact field this channel needs.
    fn can_reach(&self, target: &Target) -> bool;

    async fn send(
        &self,
        target: &Target,
        message: &OutboundMessage,
    ) -> Result<TransportReceipt, TransportError>;
}

/// What happened to a multi-channel send; callers log the delivery
/// provenance (e.g. viewing reminders record the channel that landed).
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeliveryReport {
    pub attempted: Vec<Channel>,
    pub succeeded: Option<Channel>,
    pub provider_id: Option<String>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> bool {
        self.succeeded.is_some()
    }
}

/// Walks a prioritized sender list, stopping at the first success. Pure
/// fallback: a channel is only tried when every higher-priority channel was
/// skipped (missing contact field) or failed.
pub struct NotificationDispatcher {
    senders: Vec<Arc<dyn ChannelSender>>,
}

impl NotificationDispatcher {
    /// Senders are tried in the order given; wiring supplies the
    /// chat -> sms -> email priority.
    pub fn new(senders: Vec<Arc<dyn ChannelSender>>) -> Self {
        Self { senders }
    }

    pub async fn send_multi_channel(
        &self,
        target: &Target,
        message: &OutboundMessage,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for sender in &self.senders {
            if !sender.can_reach(target) {
                continue;
            }
            report.attempted.push(sender.channel());
            match sender.send(target, message).await {
                Ok(receipt) => {
                    info!(
                        "notification to {} delivered via {} ({})",
                        target.name,
                        receipt.channel.as_str(),
                        receipt.provider_id
                    );
                    report.succeeded = Some(receipt.channel);
                    report.provider_id = Some(receipt.provider_id);
                    return report;
                }
                Err(e) => {
                    warn!(
                        "{} send to {} failed: {}",
                        e.channel.as_str(),
                        target.name,
                        e.message
                    );
                }
            }
        }
        if report.succeeded.is_none() {
            warn!("all channels exhausted for {}", target.name);
        }
        report
    }

    /// Last-resort direct email attempt, for callers that must reach an
    /// attendee even after the prioritized pass came up empty.
    pub async fn send_email_only(
        &self,
        target: &Target,
        message: &OutboundMessage,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let Some(sender) = self.senders.iter().find(|s| s.channel() == Channel::Email) else {
            return report;
        };
        if !sender.can_reach(target) {
            return report;
        }
        report.attempted.push(Channel::Email);
        match sender.send(target, message).await {
            Ok(receipt) => {
                report.succeeded = Some(receipt.channel);
                report.provider_id = Some(receipt.provider_id);
            }
            Err(e) => warn!("email fallback to {} failed: {}", target.name, e.message),
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSender {
        channel: Channel,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSender {
        fn new(channel: Channel, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                channel,
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ChannelSender for StubSender {
        fn channel(&self) -> Channel {
            self.channel
        }

        fn can_reach(&self, target: &Target) -> bool {
            match self.channel {
                Channel::Chat | Channel::Sms => target.phone.is_some(),
                Channel::Email => target.email.is_some(),
            }
        }

        async fn send(
            &self,
            _target: &Target,
            _message: &OutboundMessage,
        ) -> Result<TransportReceipt, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(TransportError::new(self.channel, "provider down"))
            } else {
                Ok(TransportReceipt {
                    channel: self.channel,
                    provider_id: format!("{}-1", self.channel.as_str()),
                })
            }
        }
    }

    fn full_target() -> Target {
        Target {
            name: "Jane".to_string(),
            phone: Some("+254700000001".to_string()),
            email: Some("jane@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn stops_at_first_successful_channel() {
        let chat = StubSender::new(Channel::Chat, false);
        let sms = StubSender::new(Channel::Sms, false);
        let dispatcher = NotificationDispatcher::new(vec![
            chat.clone() as Arc<dyn ChannelSender>,
            sms.clone() as Arc<dyn ChannelSender>,
        ]);

        let report = dispatcher
            .send_multi_channel(&full_target(), &OutboundMessage::text("hello"))
            .await;

        assert_eq!(report.succeeded, Some(Channel::Chat));
        assert_eq!(report.attempted, vec![Channel::Chat]);
        assert_eq!(sms.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_failures_in_priority_order() {
        let chat = StubSender::new(Channel::Chat, true);
        let sms = StubSender::new(Channel::Sms, true);
        let email = StubSender::new(Channel::Email, false);
        let dispatcher = NotificationDispatcher::new(vec![
            chat as Arc<dyn ChannelSender>,
            sms as Arc<dyn ChannelSender>,
            email as Arc<dyn ChannelSender>,
        ]);

        let report = dispatcher
            .send_multi_channel(&full_target(), &OutboundMessage::text("hello"))
            .await;

        assert_eq!(
            report.attempted,
            vec![Channel::Chat, Channel::Sms, Channel::Email]
        );
        assert_eq!(report.succeeded, Some(Channel::Email));
    }

    #[tokio::test]
    async fn skips_channels_missing_their_contact_field() {
        let chat = StubSender::new(Channel::Chat, false);
        let sms = StubSender::new(Channel::Sms, false);
        let email = StubSender::new(Channel::Email, false);
        let dispatcher = NotificationDispatcher::new(vec![
            chat as Arc<dyn ChannelSender>,
            sms as Arc<dyn ChannelSender>,
            email as Arc<dyn ChannelSender>,
        ]);

        let email_only = Target {
            name: "Jane".to_string(),
            phone: None,
            email: Some("jane@example.com".to_string()),
        };
        let report = dispatcher
            .send_multi_channel(&email_only, &OutboundMessage::text("hello"))
            .await;

        assert_eq!(report.attempted, vec![Channel::Email]);
        assert_eq!(report.succeeded, Some(Channel::Email));
    }

    #[tokio::test]
    async fn reports_none_when_every_channel_fails() {
        let chat = StubSender::new(Channel::Chat, true);
        let email = StubSender::new(Channel::Email, true);
        let dispatcher = NotificationDispatcher::new(vec![
            chat as Arc<dyn ChannelSender>,
            email as Arc<dyn ChannelSender>,
        ]);

        let report = dispatcher
            .send_multi_channel(&full_target(), &OutboundMessage::text("hello"))
            .await;

        assert!(!report.delivered());
        assert_eq!(report.attempted, vec![Channel::Chat, Channel::Email]);
    }
}
