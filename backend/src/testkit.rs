//! Shared fixtures and doubles for the engine unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::advisor::{
    AdvisorUnavailable, DecisionAdvisor, NegotiationAdvice, OfferContext, SlotAdvice, SlotContext,
};
use crate::models::{
    BuyingIntent, ClientContact, FunnelStage, Lead, Property, User,
};
use crate::notify::{
    Channel, ChannelSender, NotificationDispatcher, OutboundMessage, Target, TransportError,
    TransportReceipt,
};
use crate::store::{FunnelStore, MemoryStore};

/// Channel sender that records everything it is asked to deliver and can be
/// flipped into failure mode mid-test.
pub(crate) struct RecordingSender {
    channel: Channel,
    fail: AtomicBool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn new(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            fail: AtomicBool::new(false),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(channel: Channel) -> Arc<Self> {
        let sender = Self::new(channel);
        sender.fail.store(true, Ordering::SeqCst);
        sender
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("sent log").len()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
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
        target: &Target,
        message: &OutboundMessage,
    ) -> Result<TransportReceipt, TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TransportError::new(self.channel, "scripted failure"));
        }
        self.sent
            .lock()
            .expect("sent log")
            .push((target.name.clone(), message.body.clone()));
        Ok(TransportReceipt {
            channel: self.channel,
            provider_id: "test-receipt".to_string(),
        })
    }
}

/// Advisor double returning pre-scripted advice, or unavailable when none is
/// scripted for the call in question.
#[derive(Default)]
pub(crate) struct ScriptedAdvisor {
    pub negotiation: Option<NegotiationAdvice>,
    pub slot: Option<SlotAdvice>,
}

impl ScriptedAdvisor {
    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_negotiation(advice: NegotiationAdvice) -> Arc<Self> {
        Arc::new(Self {
            negotiation: Some(advice),
            slot: None,
        })
    }

    pub fn with_slot(advice: SlotAdvice) -> Arc<Self> {
        Arc::new(Self {
            negotiation: None,
            slot: Some(advice),
        })
    }
}

#[async_trait]
impl DecisionAdvisor for ScriptedAdvisor {
    async fn negotiation_strategy(
        &self,
        _ctx: &OfferContext,
    ) -> Result<NegotiationAdvice, AdvisorUnavailable> {
        self.negotiation
            .clone()
            .ok_or_else(|| AdvisorUnavailable("scripted outage".to_string()))
    }

    async fn recommend_slot(&self, _ctx: &SlotContext) -> Result<SlotAdvice, AdvisorUnavailable> {
        self.slot
            .clone()
            .ok_or_else(|| AdvisorUnavailable("scripted outage".to_string()))
    }
}

pub(crate) fn dispatcher_with(senders: Vec<Arc<RecordingSender>>) -> Arc<NotificationDispatcher> {
    let senders: Vec<Arc<dyn ChannelSender>> = senders
        .into_iter()
        .map(|s| s as Arc<dyn ChannelSender>)
        .collect();
    Arc::new(NotificationDispatcher::new(senders))
}

/// A fixed instant so funnel tests are reproducible: Monday 2025-06-02 12:00.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

/// Seeds a property, its owner and one lead; returns the store and the ids.
pub(crate) struct Seeded {
    pub store: Arc<MemoryStore>,
    pub lead_id: Uuid,
    pub property_id: Uuid,
    pub owner_id: Uuid,
}

pub(crate) fn seed(list_price: i64, stage: FunnelStage, score: i32, intent: BuyingIntent) -> Seeded {
    let store = Arc::new(MemoryStore::new());
    let owner = User {
        id: Uuid::new_v4(),
        name: "Owen Owner".to_string(),
        email: Some("owner@example.com".to_string()),
        phone: Some("+254711000001".to_string()),
    };
    let property = Property {
        id: Uuid::new_v4(),
        title: "Lakeview Villa".to_string(),
        owner_id: owner.id,
        price: list_price,
        currency: "KES".to_string(),
        location: "Nakuru".to_string(),
        property_type: Some("villa".to_string()),
        bedrooms: Some(4),
        bathrooms: Some(3),
        is_active: true,
    };
    let mut lead = Lead::new(
        property.id,
        owner.id,
        ClientContact {
            name: "Jane Buyer".to_string(),
            email: Some("jane@example.com".to_string()),
            phone: Some("+254700000001".to_string()),
        },
        fixed_now() - chrono::Duration::days(5),
    );
    lead.funnel_stage = stage;
    lead.score = score;
    lead.buying_intent = intent;

    let seeded = Seeded {
        lead_id: lead.id,
        property_id: property.id,
        owner_id: owner.id,
        store: store.clone(),
    };
    store.insert_user(owner).expect("seed owner");
    store.insert_property(property).expect("seed property");
    store.insert_lead(lead).expect("seed lead");
    seeded
}

pub(crate) fn as_store(store: &Arc<MemoryStore>) -> Arc<dyn FunnelStore> {
    store.clone()
}
