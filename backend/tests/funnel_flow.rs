//! End-to-end journey of one lead through the automated sales funnel, from
//! first contact to a closed deal, with recording transports and the
//! advisor offline (deterministic fallbacks throughout).

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use sales_funnel_backend::advisor::{
    AdvisorUnavailable, DecisionAdvisor, NegotiationAdvice, OfferContext, SlotAdvice, SlotContext,
};
use sales_funnel_backend::funnel::{FunnelEngine, PipelineFilter};
use sales_funnel_backend::models::{
    AttendeeRole, BuyingIntent, ClientContact, FunnelStage, Lead, OfferParty, Property, User,
    ViewingOutcome, ViewingStatus,
};
use sales_funnel_backend::negotiation::NegotiationEngine;
use sales_funnel_backend::notify::{
    Channel, ChannelSender, NotificationDispatcher, OutboundMessage, Target, TransportError,
    TransportReceipt,
};
use sales_funnel_backend::scheduler::ViewingScheduler;
use sales_funnel_backend::store::{FunnelStore, MemoryStore};

struct RecordingSender {
    channel: Channel,
    sent: Mutex<Vec<String>>,
}

impl RecordingSender {
    fn new(channel: Channel) -> Arc<Self> {
        Arc::new(Self {
            channel,
            sent: Mutex::new(Vec::new()),
        })
    }

    fn sent_count(&self) -> usize {
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
        _message: &OutboundMessage,
    ) -> Result<TransportReceipt, TransportError> {
        self.sent.lock().expect("sent log").push(target.name.clone());
        Ok(TransportReceipt {
            channel: self.channel,
            provider_id: "it-receipt".to_string(),
        })
    }
}

struct OfflineAdvisor;

#[async_trait]
impl DecisionAdvisor for OfflineAdvisor {
    async fn negotiation_strategy(
        &self,
        _ctx: &OfferContext,
    ) -> Result<NegotiationAdvice, AdvisorUnavailable> {
        Err(AdvisorUnavailable("offline".to_string()))
    }

    async fn recommend_slot(&self, _ctx: &SlotContext) -> Result<SlotAdvice, AdvisorUnavailable> {
        Err(AdvisorUnavailable("offline".to_string()))
    }
}

struct World {
    store: Arc<MemoryStore>,
    funnel: FunnelEngine,
    scheduler: Arc<ViewingScheduler>,
    negotiation: Arc<NegotiationEngine>,
    chat: Arc<RecordingSender>,
    lead_id: Uuid,
    owner_id: Uuid,
}

fn build_world() -> World {
    let store = Arc::new(MemoryStore::new());
    let chat = RecordingSender::new(Channel::Chat);
    let email = RecordingSender::new(Channel::Email);
    let dispatcher = Arc::new(NotificationDispatcher::new(vec![
        chat.clone() as Arc<dyn ChannelSender>,
        email.clone() as Arc<dyn ChannelSender>,
    ]));
    let advisor: Arc<dyn DecisionAdvisor> = Arc::new(OfflineAdvisor);

    let dyn_store: Arc<dyn FunnelStore> = store.clone();
    let scheduler = Arc::new(ViewingScheduler::new(
        dyn_store.clone(),
        advisor.clone(),
        dispatcher.clone(),
    ));
    let negotiation = Arc::new(NegotiationEngine::new(
        dyn_store.clone(),
        advisor,
        dispatcher.clone(),
    ));
    let funnel = FunnelEngine::new(
        dyn_store,
        dispatcher,
        scheduler.clone(),
        negotiation.clone(),
    );

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
        price: 10_000_000,
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
        Utc::now() - chrono::Duration::days(2),
    );
    lead.score = 75;
    lead.buying_intent = BuyingIntent::High;
    let lead_id = lead.id;
    let owner_id = owner.id;

    store.insert_user(owner).expect("seed owner");
    store.insert_property(property).expect("seed property");
    store.insert_lead(lead).expect("seed lead");

    World {
        store,
        funnel,
        scheduler,
        negotiation,
        chat,
        lead_id,
        owner_id,
    }
}

#[tokio::test]
async fn lead_journey_from_first_contact_to_won_deal() {
    let w = build_world();

    // New -> contacted: initial contact goes out.
    let outcome = w.funnel.advance(w.lead_id).await.expect("advance new");
    assert_eq!(outcome.action.action, "sent_initial_contact");
    assert_eq!(outcome.lead.funnel_stage, FunnelStage::Contacted);
    assert_eq!(outcome.lead.stage_history.len(), 1);
    assert!(w.chat.sent_count() >= 1);

    // Contacted -> qualified: score 75 clears the bar.
    let outcome = w.funnel.advance(w.lead_id).await.expect("advance contacted");
    assert_eq!(outcome.action.action, "qualified_lead");
    assert_eq!(outcome.lead.funnel_stage, FunnelStage::Qualified);
    assert_eq!(outcome.lead.stage_history.len(), 2);

    // Qualified + high intent -> viewing auto-booked at the earliest slot.
    let outcome = w.funnel.advance(w.lead_id).await.expect("advance qualified");
    assert_eq!(outcome.action.action, "scheduled_viewing");
    assert_eq!(outcome.lead.funnel_stage, FunnelStage::ViewingScheduled);
    assert_eq!(outcome.lead.stage_history.len(), 3);

    let viewings = w.store.viewings_for_lead(w.lead_id).expect("viewings");
    assert_eq!(viewings.len(), 1);
    let viewing = &viewings[0];
    assert!(viewing.is_ai_generated);
    assert_eq!(viewing.attendees.len(), 2);

    // Both sides confirm; status flips exactly on the second confirmation.
    let confirmed = w
        .scheduler
        .confirm(viewing.id, AttendeeRole::Lead)
        .expect("lead confirm");
    assert_eq!(confirmed.status, ViewingStatus::Scheduled);
    let confirmed = w
        .scheduler
        .confirm(viewing.id, AttendeeRole::Owner)
        .expect("owner confirm");
    assert_eq!(confirmed.status, ViewingStatus::Confirmed);

    // Reminder batch, probed the day before the booked slot, fires exactly
    // once per attendee.
    let probe = viewing.scheduled_date - chrono::Duration::days(1);
    let run = w
        .scheduler
        .send_due_reminders(probe)
        .await
        .expect("reminders");
    assert_eq!(run.reminders_sent, 2);
    let rerun = w
        .scheduler
        .send_due_reminders(probe)
        .await
        .expect("reminder rerun");
    assert_eq!(rerun.reminders_sent, 0);

    // Completion with interest but no negotiation push lands on viewed.
    w.scheduler
        .complete(
            viewing.id,
            ViewingOutcome {
                interested: true,
                feedback: Some("Bright rooms".to_string()),
                next_steps: None,
                ready_to_negotiate: false,
            },
        )
        .expect("complete");
    let lead = w.store.lead(w.lead_id).expect("lead").record;
    assert_eq!(lead.funnel_stage, FunnelStage::Viewed);

    // Viewed + interested viewing -> negotiation opens with derived rules.
    let outcome = w.funnel.advance(w.lead_id).await.expect("advance viewed");
    assert_eq!(outcome.action.action, "initiated_negotiation");
    assert_eq!(outcome.lead.funnel_stage, FunnelStage::Negotiating);
    let rules = outcome
        .lead
        .negotiation
        .rules
        .clone()
        .expect("derived rules");
    assert_eq!(rules.auto_accept_threshold, 9_500_000);
    assert_eq!(rules.min_acceptable_price, 9_000_000);

    // A band offer with the advisor offline draws the midpoint counter.
    let decision = w
        .negotiation
        .handle_offer(w.lead_id, 9_200_000, "our opening offer")
        .await
        .expect("band offer");
    assert_eq!(decision.counter_offer, Some(9_600_000));

    let lead = w.store.lead(w.lead_id).expect("lead").record;
    assert_eq!(lead.negotiation.counter_offers.len(), 2);
    assert_eq!(
        lead.negotiation.counter_offers[1].offered_by,
        OfferParty::Ai
    );

    // The fresh counter is left alone by the funnel.
    let outcome = w
        .funnel
        .advance(w.lead_id)
        .await
        .expect("advance negotiating");
    assert_eq!(outcome.action.action, "monitor_negotiation");

    // A strong follow-up offer clears the auto-accept threshold.
    let decision = w
        .negotiation
        .handle_offer(w.lead_id, 9_800_000, "we can stretch to this")
        .await
        .expect("closing offer");
    assert_eq!(decision.counter_offer, None);

    let lead = w.store.lead(w.lead_id).expect("lead").record;
    assert_eq!(lead.funnel_stage, FunnelStage::Won);
    let closure = lead.deal_closure.clone().expect("closure");
    assert_eq!(closure.final_price, Some(9_800_000));
    assert_eq!(closure.revenue, Some(9_800_000));
    assert_eq!(closure.commission, Some(294_000));

    // Terminal leads are inert under further automation.
    let before = serde_json::to_value(&lead).expect("serialize");
    let outcome = w.funnel.advance(w.lead_id).await.expect("advance won");
    assert_eq!(outcome.action.action, "no_automatic_action");
    let after =
        serde_json::to_value(&w.store.lead(w.lead_id).expect("lead").record).expect("serialize");
    assert_eq!(before, after);

    // Pipeline rollup sees one won deal at 100% conversion.
    let report = w
        .funnel
        .pipeline(w.owner_id, &PipelineFilter::default())
        .expect("pipeline");
    assert_eq!(report.metrics.total_leads, 1);
    assert_eq!(report.metrics.won_deals, 1);
    assert_eq!(report.metrics.active_leads, 0);
    assert_eq!(report.metrics.total_revenue, 9_800_000);
    assert_eq!(report.metrics.conversion_rate, 100.0);
}
