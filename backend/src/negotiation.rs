use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::advisor::{AdviceAction, DecisionAdvisor, OfferContext};
use crate::error::{FunnelError, FunnelResult};
use crate::models::{
    ActionResult, Actor, CounterOffer, DealClosure, DealOutcome, DisqualifiedReason, FunnelStage,
    Lead, LostReason, NegotiationRules, OfferParty, OfferStatus, Property,
};
use crate::notify::{DeliveryReport, NotificationDispatcher, OutboundMessage, Target};
use crate::store::{update_lead_with, FunnelStore, Versioned};

/// Commission rate applied to the final price on acceptance.
const COMMISSION_RATE_PERCENT: i64 = 3;

/// What the engine decided about one incoming offer.
#[derive(Debug, Clone, Serialize)]
pub struct OfferDecision {
    pub action: AdviceAction,
    pub counter_offer: Option<i64>,
    pub reasoning: String,
    /// Delivery provenance of the follow-up notification, when one was owed.
    pub notification: Option<DeliveryReport>,
}

/// Manual close-deal override carried by authorized operators.
#[derive(Debug, Clone, Deserialize)]
pub struct CloseDealRequest {
    pub outcome: DealOutcome,
    pub final_price: Option<i64>,
    pub reason_lost: Option<LostReason>,
    pub reason_disqualified: Option<DisqualifiedReason>,
    pub notes: Option<String>,
}

/// Evaluates buyer offers against per-lead rules, with the decision advisor
/// covering the discretionary band and a midpoint counter as the
/// deterministic fallback.
pub struct NegotiationEngine {
    store: Arc<dyn FunnelStore>,
    advisor: Arc<dyn DecisionAdvisor>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl NegotiationEngine {
    pub fn new(
        store: Arc<dyn FunnelStore>,
        advisor: Arc<dyn DecisionAdvisor>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            advisor,
            dispatcher,
        }
    }

    /// Evaluates one buyer offer. Rule order is fixed: auto-accept at or
    /// above the threshold, reject below the floor, otherwise consult the
    /// advisor. A concurrent write to the same lead surfaces as a retryable
    /// conflict; the decision is never applied over a stale snapshot.
    pub async fn handle_offer(
        &self,
        lead_id: Uuid,
        offer_amount: i64,
        message: &str,
    ) -> FunnelResult<OfferDecision> {
        if offer_amount <= 0 {
            return Err(FunnelError::validation("offer amount must be positive"));
        }

        let Versioned {
            record: mut lead,
            version,
        } = self.store.lead(lead_id)?;
        if lead.funnel_stage.is_terminal() {
            return Err(FunnelError::validation("lead is already closed"));
        }
        let property = self.store.property(lead.property_id)?;
        let list_price = property.price;
        let now = Utc::now();

        let rules = match &lead.negotiation.rules {
            Some(rules) => rules.clone(),
            None => {
                let derived = NegotiationRules::defaults_for(list_price);
                lead.negotiation.rules = Some(derived.clone());
                derived
            }
        };

        // Record the incoming offer before deciding on it.
        lead.negotiation.counter_offers.push(CounterOffer {
            amount: offer_amount,
            offered_by: OfferParty::Lead,
            offered_at: now,
            reasoning: message.to_string(),
            status: OfferStatus::Pending,
        });
        if lead.negotiation.initial_offer.is_none() {
            lead.negotiation.initial_offer = Some(offer_amount);
        }
        lead.negotiation.current_offer = Some(offer_amount);

        let offer_percent = offer_amount as f64 / list_price as f64 * 100.0;
        let (action, counter_offer, reasoning) = if offer_amount >= rules.auto_accept_threshold {
            (
                AdviceAction::Accepted,
                None,
                format!(
                    "Offer of {} {} is {:.1}% of list price, meeting the auto-accept threshold",
                    property.currency, offer_amount, offer_percent
                ),
            )
        } else if offer_amount < rules.min_acceptable_price {
            (
                AdviceAction::Rejected,
                None,
                format!(
                    "Offer of {} {} is below the minimum acceptable price of {} {}",
                    property.currency, offer_amount, property.currency, rules.min_acceptable_price
                ),
            )
        } else {
            let ctx = OfferContext {
                list_price,
                currency: property.currency.clone(),
                offer_amount,
                offer_percent_of_list: offer_percent,
                lead_score: lead.score,
                buying_intent: lead.buying_intent,
                days_as_lead: lead.days_as_lead(now),
                prior_offer_count: lead.negotiation.counter_offers.len() - 1,
                rules: rules.clone(),
            };
            match self.advisor.negotiation_strategy(&ctx).await {
                Ok(advice) => match advice.action {
                    AdviceAction::Countered => {
                        let amount = advice
                            .counter_offer
                            .unwrap_or_else(|| midpoint(offer_amount, list_price));
                        (AdviceAction::Countered, Some(amount), advice.reasoning)
                    }
                    other => (other, None, advice.reasoning),
                },
                Err(e) => {
                    warn!("offer evaluation fell back for lead {lead_id}: {e}");
                    (
                        AdviceAction::Countered,
                        Some(midpoint(offer_amount, list_price)),
                        "Countering at the midpoint between the offer and the list price"
                            .to_string(),
                    )
                }
            }
        };

        // The incoming entry's status tracks the decision.
        if let Some(last) = lead.negotiation.counter_offers.last_mut() {
            last.status = match action {
                AdviceAction::Accepted => OfferStatus::Accepted,
                AdviceAction::Countered => OfferStatus::Countered,
                AdviceAction::Rejected => OfferStatus::Rejected,
            };
        }

        match action {
            AdviceAction::Accepted => {
                lead.change_stage(
                    FunnelStage::Won,
                    Actor::Ai,
                    format!("Offer accepted at {} {}", property.currency, offer_amount),
                    now,
                );
                lead.deal_closure = Some(DealClosure {
                    outcome: DealOutcome::Won,
                    final_price: Some(offer_amount),
                    closed_at: now,
                    closed_by: Actor::Ai,
                    reason_lost: None,
                    reason_disqualified: None,
                    revenue: Some(offer_amount),
                    commission: Some(offer_amount * COMMISSION_RATE_PERCENT / 100),
                });
                lead.negotiation.discount_applied = Some(list_price - offer_amount);
                lead.negotiation.discount_percentage =
                    Some((list_price - offer_amount) as f64 / list_price as f64 * 100.0);
                lead.negotiation.is_active = false;
            }
            AdviceAction::Countered => {
                let amount = counter_offer.unwrap_or_else(|| midpoint(offer_amount, list_price));
                lead.negotiation.counter_offers.push(CounterOffer {
                    amount,
                    offered_by: OfferParty::Ai,
                    offered_at: now,
                    reasoning: reasoning.clone(),
                    status: OfferStatus::Pending,
                });
                lead.negotiation.current_offer = Some(amount);
            }
            AdviceAction::Rejected => {}
        }

        lead.ai_engagement.record(
            &format!("evaluated_offer_{}", action.as_str()),
            true,
            &reasoning,
            &format!("Offer {}: {}", action.as_str(), reasoning),
            now,
        );

        let client = lead.client.clone();
        self.store.update_lead(version, lead)?;

        // State is committed; notifications go out after and are logged,
        // never rolled back.
        let notification = match action {
            AdviceAction::Accepted => Some(self.notify_owner_closed(&property, offer_amount).await),
            AdviceAction::Countered => {
                let amount = counter_offer.unwrap_or_default();
                let message = OutboundMessage::with_subject(
                    format!("Counter Offer - {}", property.title),
                    format!(
                        "Thank you for your offer on {}. We would like to propose {} {}. {}",
                        property.title, property.currency, amount, reasoning
                    ),
                );
                Some(self.notify_client(&client.name, &client.phone, &client.email, message).await)
            }
            AdviceAction::Rejected => {
                let message = OutboundMessage::with_subject(
                    format!("Regarding Your Offer - {}", property.title),
                    format!("Thank you for your offer on {}. {}", property.title, reasoning),
                );
                Some(self.notify_client(&client.name, &client.phone, &client.email, message).await)
            }
        };

        info!(
            "offer of {} on lead {} {}",
            offer_amount,
            lead_id,
            action.as_str()
        );
        Ok(OfferDecision {
            action,
            counter_offer,
            reasoning,
            notification,
        })
    }

    async fn notify_owner_closed(&self, property: &Property, final_price: i64) -> DeliveryReport {
        let owner = match self.store.user(property.owner_id) {
            Ok(owner) => owner,
            Err(e) => {
                warn!("deal-closed notification skipped, owner lookup failed: {e}");
                return DeliveryReport::default();
            }
        };
        let message = OutboundMessage::with_subject(
            format!("Deal Closed - {}", property.title),
            format!(
                "Your property {} has been sold for {} {}. Our team will be in touch with \
                 next steps.",
                property.title, property.currency, final_price
            ),
        );
        let target = Target {
            name: owner.name.clone(),
            phone: owner.phone.clone(),
            email: owner.email.clone(),
        };
        self.dispatcher.send_multi_channel(&target, &message).await
    }

    async fn notify_client(
        &self,
        name: &str,
        phone: &Option<String>,
        email: &Option<String>,
        message: OutboundMessage,
    ) -> DeliveryReport {
        let target = Target {
            name: name.to_string(),
            phone: phone.clone(),
            email: email.clone(),
        };
        self.dispatcher.send_multi_channel(&target, &message).await
    }

    /// Flips a lead into active negotiation after a completed viewing with
    /// interest: rules are derived from the list price when unset, the stage
    /// moves to `negotiating`, and the client is invited to make an offer.
    pub async fn initiate(&self, lead_id: Uuid) -> FunnelResult<ActionResult> {
        let Versioned {
            record: mut lead,
            version,
        } = self.store.lead(lead_id)?;
        if lead.funnel_stage.is_terminal() {
            return Err(FunnelError::validation("lead is already closed"));
        }
        let property = self.store.property(lead.property_id)?;
        let now = Utc::now();

        lead.negotiation.is_active = true;
        lead.negotiation.ai_negotiation_enabled = true;
        if lead.negotiation.rules.is_none() {
            lead.negotiation.rules = Some(NegotiationRules::defaults_for(property.price));
        }
        lead.change_stage(
            FunnelStage::Negotiating,
            Actor::Ai,
            "Lead showed interest after viewing",
            now,
        );
        let client = lead.client.clone();
        self.store.update_lead(version, lead)?;

        let message = OutboundMessage::with_subject(
            format!("Ready to make an offer on {}?", property.title),
            format!(
                "We noticed your interest in {} after the viewing. The listing price is {} {}. \
                 Reply with an offer whenever you are ready.",
                property.title, property.currency, property.price
            ),
        );
        let report = self
            .notify_client(&client.name, &client.phone, &client.email, message)
            .await;

        let outcome = if report.delivered() {
            "Negotiation enabled, invitation sent"
        } else {
            "Negotiation enabled, invitation could not be delivered"
        };
        Ok(ActionResult::new(
            "initiated_negotiation",
            report.delivered(),
            "Lead showed interest after viewing",
            outcome,
        ))
    }

    /// Replaces the per-lead negotiation bounds.
    pub fn set_rules(&self, lead_id: Uuid, rules: NegotiationRules) -> FunnelResult<Lead> {
        if rules.min_acceptable_price <= 0 || rules.auto_accept_threshold <= 0 {
            return Err(FunnelError::validation("prices must be positive"));
        }
        if rules.auto_accept_threshold < rules.min_acceptable_price {
            return Err(FunnelError::validation(
                "auto-accept threshold cannot sit below the minimum acceptable price",
            ));
        }
        if !(0.0..=100.0).contains(&rules.max_discount_percent) {
            return Err(FunnelError::validation(
                "max discount percent must be between 0 and 100",
            ));
        }
        update_lead_with(self.store.as_ref(), lead_id, |lead| {
            lead.negotiation.rules = Some(rules.clone());
        })
    }

    /// Enables or disables automated offer evaluation for the lead.
    pub fn toggle_ai(&self, lead_id: Uuid, enabled: bool) -> FunnelResult<Lead> {
        update_lead_with(self.store.as_ref(), lead_id, |lead| {
            lead.negotiation.ai_negotiation_enabled = enabled;
        })
    }

    /// Manual override closing a deal outside the automated decisioning.
    /// Bypasses the threshold rules by design, but never reopens a lead
    /// that already reached a terminal stage.
    pub async fn close_deal(&self, lead_id: Uuid, request: CloseDealRequest) -> FunnelResult<Lead> {
        let Versioned {
            record: mut lead,
            version,
        } = self.store.lead(lead_id)?;
        if lead.funnel_stage.is_terminal() {
            return Err(FunnelError::validation(
                "lead is already in a terminal stage",
            ));
        }
        let property = self.store.property(lead.property_id)?;
        let now = Utc::now();

        let (stage, revenue, commission) = match request.outcome {
            DealOutcome::Won => {
                let final_price = request.final_price.ok_or_else(|| {
                    FunnelError::validation("a won deal requires a final price")
                })?;
                if final_price <= 0 {
                    return Err(FunnelError::validation("final price must be positive"));
                }
                (
                    FunnelStage::Won,
                    Some(final_price),
                    Some(final_price * COMMISSION_RATE_PERCENT / 100),
                )
            }
            DealOutcome::Lost => (FunnelStage::Lost, None, None),
            DealOutcome::Disqualified => (FunnelStage::Disqualified, None, None),
        };

        let notes = request
            .notes
            .clone()
            .unwrap_or_else(|| "Deal closed manually".to_string());
        lead.change_stage(stage, Actor::Manual, notes, now);
        lead.deal_closure = Some(DealClosure {
            outcome: request.outcome,
            final_price: request.final_price,
            closed_at: now,
            closed_by: Actor::Manual,
            reason_lost: request.reason_lost,
            reason_disqualified: request.reason_disqualified,
            revenue,
            commission,
        });
        lead.negotiation.is_active = false;

        self.store.update_lead(version, lead.clone())?;

        if request.outcome == DealOutcome::Won {
            if let Some(final_price) = request.final_price {
                let report = self.notify_owner_closed(&property, final_price).await;
                if !report.delivered() {
                    warn!("deal-closed notification for lead {lead_id} undeliverable");
                }
            }
        }
        Ok(lead)
    }
}

fn midpoint(offer: i64, list_price: i64) -> i64 {
    (offer + list_price) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::NegotiationAdvice;
    use crate::models::BuyingIntent;
    use crate::notify::Channel;
    use crate::testkit::{as_store, dispatcher_with, seed, RecordingSender, ScriptedAdvisor};

    fn engine_with(
        seeded: &crate::testkit::Seeded,
        advisor: Arc<dyn DecisionAdvisor>,
        chat: Arc<RecordingSender>,
        email: Arc<RecordingSender>,
    ) -> NegotiationEngine {
        NegotiationEngine::new(
            as_store(&seeded.store),
            advisor,
            dispatcher_with(vec![chat, email]),
        )
    }

    fn negotiating_seed() -> crate::testkit::Seeded {
        let seeded = seed(
            10_000_000,
            FunnelStage::Negotiating,
            75,
            BuyingIntent::High,
        );
        let snapshot = seeded.store.lead(seeded.lead_id).expect("lead");
        let mut lead = snapshot.record;
        lead.negotiation.is_active = true;
        lead.negotiation.rules = Some(NegotiationRules {
            min_acceptable_price: 9_000_000,
            max_discount_percent: 10.0,
            auto_accept_threshold: 9_500_000,
            require_approval_below: 9_000_000,
        });
        seeded
            .store
            .update_lead(snapshot.version, lead)
            .expect("seed rules");
        seeded
    }

    #[tokio::test]
    async fn offer_above_threshold_wins_the_deal() {
        let seeded = negotiating_seed();
        let chat = RecordingSender::new(Channel::Chat);
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            chat.clone(),
            RecordingSender::new(Channel::Email),
        );

        let decision = engine
            .handle_offer(seeded.lead_id, 9_800_000, "final offer")
            .await
            .expect("decision");

        assert_eq!(decision.action, AdviceAction::Accepted);
        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        assert_eq!(lead.funnel_stage, FunnelStage::Won);
        let closure = lead.deal_closure.expect("closure");
        assert_eq!(closure.revenue, Some(9_800_000));
        assert_eq!(closure.commission, Some(294_000));
        assert_eq!(closure.closed_by, Actor::Ai);
        assert_eq!(lead.negotiation.discount_applied, Some(200_000));
        // Owner heard about the closed deal.
        assert_eq!(chat.sent_count(), 1);
    }

    #[tokio::test]
    async fn offer_below_floor_is_rejected_without_stage_change() {
        let seeded = negotiating_seed();
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        let decision = engine
            .handle_offer(seeded.lead_id, 7_000_000, "")
            .await
            .expect("decision");

        assert_eq!(decision.action, AdviceAction::Rejected);
        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        assert_eq!(lead.funnel_stage, FunnelStage::Negotiating);
        assert!(lead.deal_closure.is_none());
        assert_eq!(lead.negotiation.counter_offers.len(), 1);
        assert_eq!(
            lead.negotiation.counter_offers[0].status,
            OfferStatus::Rejected
        );
    }

    #[tokio::test]
    async fn band_offer_with_advisor_down_counters_at_the_midpoint() {
        let seeded = negotiating_seed();
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        let decision = engine
            .handle_offer(seeded.lead_id, 9_200_000, "")
            .await
            .expect("decision");

        assert_eq!(decision.action, AdviceAction::Countered);
        assert_eq!(decision.counter_offer, Some(9_600_000));

        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        assert_eq!(lead.negotiation.counter_offers.len(), 2);
        let counter = &lead.negotiation.counter_offers[1];
        assert_eq!(counter.offered_by, OfferParty::Ai);
        assert_eq!(counter.status, OfferStatus::Pending);
        assert_eq!(lead.negotiation.current_offer, Some(9_600_000));
        assert_eq!(lead.negotiation.initial_offer, Some(9_200_000));
    }

    #[tokio::test]
    async fn band_offer_follows_advisor_accept() {
        let seeded = negotiating_seed();
        let advisor = ScriptedAdvisor::with_negotiation(NegotiationAdvice {
            action: AdviceAction::Accepted,
            counter_offer: None,
            reasoning: "Strong offer for current market".to_string(),
        });
        let engine = engine_with(
            &seeded,
            advisor,
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        let decision = engine
            .handle_offer(seeded.lead_id, 9_200_000, "")
            .await
            .expect("decision");
        assert_eq!(decision.action, AdviceAction::Accepted);

        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        assert_eq!(lead.funnel_stage, FunnelStage::Won);
        assert_eq!(
            lead.deal_closure.expect("closure").final_price,
            Some(9_200_000)
        );
    }

    #[tokio::test]
    async fn thresholds_ignore_the_advisor_entirely() {
        // Advisor scripted to reject everything; the auto-accept rule still
        // fires first.
        let seeded = negotiating_seed();
        let advisor = ScriptedAdvisor::with_negotiation(NegotiationAdvice {
            action: AdviceAction::Rejected,
            counter_offer: None,
            reasoning: "never".to_string(),
        });
        let engine = engine_with(
            &seeded,
            advisor,
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        let decision = engine
            .handle_offer(seeded.lead_id, 9_500_000, "")
            .await
            .expect("decision");
        assert_eq!(decision.action, AdviceAction::Accepted);
    }

    #[tokio::test]
    async fn missing_rules_are_derived_from_list_price() {
        let seeded = seed(
            10_000_000,
            FunnelStage::Negotiating,
            60,
            BuyingIntent::Medium,
        );
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        // 96% of list clears the derived 95% auto-accept threshold.
        let decision = engine
            .handle_offer(seeded.lead_id, 9_600_000, "")
            .await
            .expect("decision");
        assert_eq!(decision.action, AdviceAction::Accepted);

        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        let rules = lead.negotiation.rules.expect("derived rules");
        assert_eq!(rules.auto_accept_threshold, 9_500_000);
        assert_eq!(rules.min_acceptable_price, 9_000_000);
    }

    #[tokio::test]
    async fn invalid_offers_and_closed_leads_are_refused() {
        let seeded = negotiating_seed();
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        let err = engine.handle_offer(seeded.lead_id, 0, "").await.unwrap_err();
        assert!(matches!(err, FunnelError::Validation(_)));

        engine
            .handle_offer(seeded.lead_id, 9_800_000, "")
            .await
            .expect("win the deal");
        let err = engine
            .handle_offer(seeded.lead_id, 9_900_000, "")
            .await
            .unwrap_err();
        assert!(matches!(err, FunnelError::Validation(_)));
    }

    #[tokio::test]
    async fn initiate_enables_negotiation_and_derives_rules() {
        let seeded = seed(10_000_000, FunnelStage::Viewed, 70, BuyingIntent::High);
        let email = RecordingSender::new(Channel::Email);
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::failing(Channel::Chat),
            email.clone(),
        );

        let result = engine.initiate(seeded.lead_id).await.expect("initiate");
        assert!(result.success);
        assert_eq!(result.action, "initiated_negotiation");

        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        assert_eq!(lead.funnel_stage, FunnelStage::Negotiating);
        assert!(lead.negotiation.is_active);
        let rules = lead.negotiation.rules.expect("rules");
        assert_eq!(rules.min_acceptable_price, 9_000_000);
        assert_eq!(rules.auto_accept_threshold, 9_500_000);
        assert_eq!(rules.max_discount_percent, 10.0);
        // Chat failed, email fallback carried the invitation.
        assert_eq!(email.sent_count(), 1);
    }

    #[tokio::test]
    async fn close_deal_rejects_already_terminal_leads() {
        let seeded = negotiating_seed();
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        engine
            .close_deal(
                seeded.lead_id,
                CloseDealRequest {
                    outcome: DealOutcome::Lost,
                    final_price: None,
                    reason_lost: Some(LostReason::FoundAlternative),
                    reason_disqualified: None,
                    notes: None,
                },
            )
            .await
            .expect("close");

        let lead = seeded.store.lead(seeded.lead_id).expect("lead").record;
        assert_eq!(lead.funnel_stage, FunnelStage::Lost);
        assert_eq!(
            lead.deal_closure.as_ref().expect("closure").reason_lost,
            Some(LostReason::FoundAlternative)
        );

        let err = engine
            .close_deal(
                seeded.lead_id,
                CloseDealRequest {
                    outcome: DealOutcome::Won,
                    final_price: Some(9_999_999),
                    reason_lost: None,
                    reason_disqualified: None,
                    notes: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FunnelError::Validation(_)));
    }

    #[tokio::test]
    async fn set_rules_validates_bounds() {
        let seeded = negotiating_seed();
        let engine = engine_with(
            &seeded,
            ScriptedAdvisor::unavailable(),
            RecordingSender::new(Channel::Chat),
            RecordingSender::new(Channel::Email),
        );

        let err = engine
            .set_rules(
                seeded.lead_id,
                NegotiationRules {
                    min_acceptable_price: 9_000_000,
                    max_discount_percent: 10.0,
                    auto_accept_threshold: 8_000_000,
                    require_approval_below: 9_000_000,
                },
            )
            .unwrap_err();
        assert!(matches!(err, FunnelError::Validation(_)));

        let lead = engine
            .set_rules(
                seeded.lead_id,
                NegotiationRules {
                    min_acceptable_price: 8_500_000,
                    max_discount_percent: 15.0,
                    auto_accept_threshold: 9_200_000,
                    require_approval_below: 8_500_000,
                },
            )
            .expect("rules saved");
        assert_eq!(
            lead.negotiation.rules.expect("rules").auto_accept_threshold,
            9_200_000
        );
    }
}
