use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::FunnelResult;
use crate::models::{
    ActionResult, Actor, BuyingIntent, FunnelStage, Lead, OfferParty, OfferStatus, ViewingStatus,
};
use crate::negotiation::NegotiationEngine;
use crate::notify::{NotificationDispatcher, OutboundMessage, Target};
use crate::scheduler::{ScheduleOptions, ViewingScheduler};
use crate::store::{update_lead_with, FunnelStore, Versioned};

/// Lead qualification threshold on the 0-100 score.
const QUALIFICATION_SCORE: i32 = 60;
/// Days a pending AI counter-offer may sit before the buyer gets a nudge.
const STALE_COUNTER_DAYS: i64 = 2;
/// Follow-ups tolerated before a still-contacted lead is written off.
const MAX_FOLLOW_UPS: u32 = 5;

/// What a single `advance` invocation did.
#[derive(Debug, Clone, Serialize)]
pub struct AdvanceOutcome {
    pub lead: Lead,
    pub action: ActionResult,
}

/// Outcome of one pursue-stalled batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PursuitRun {
    pub processed: usize,
    pub follow_ups_sent: usize,
    pub disqualified: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineFilter {
    pub stage: Option<FunnelStage>,
    pub buying_intent: Option<BuyingIntent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageBucket {
    pub stage: FunnelStage,
    pub leads: Vec<Lead>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineMetrics {
    pub total_leads: usize,
    pub active_leads: usize,
    pub won_deals: usize,
    pub total_revenue: i64,
    pub conversion_rate: f64,
    pub average_deal_value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub stages: Vec<StageBucket>,
    pub metrics: PipelineMetrics,
}

/// How an advance arm wants the lead mutated, beyond the audit entry every
/// arm gets.
enum ArmEffect {
    AuditOnly,
    Transition { stage: FunnelStage, notes: String },
    ScheduleFollowUp(DateTime<Utc>),
    /// The delegate (scheduler / negotiation initiation) already persisted
    /// its own mutation, including the stage-history entry; only the audit
    /// entry remains, applied against a fresh read.
    Delegated,
}

/// Top-level orchestrator: one invocation inspects the lead's stage and
/// performs exactly one stage-specific action.
pub struct FunnelEngine {
    store: Arc<dyn FunnelStore>,
    dispatcher: Arc<NotificationDispatcher>,
    scheduler: Arc<ViewingScheduler>,
    negotiation: Arc<NegotiationEngine>,
}

impl FunnelEngine {
    pub fn new(
        store: Arc<dyn FunnelStore>,
        dispatcher: Arc<NotificationDispatcher>,
        scheduler: Arc<ViewingScheduler>,
        negotiation: Arc<NegotiationEngine>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            scheduler,
            negotiation,
        }
    }

    /// Drives the lead one step through the funnel. Delegate failures are
    /// recorded in the audit trail with `success: false` and never raised;
    /// only missing records, invalid input and write conflicts surface.
    pub async fn advance(&self, lead_id: Uuid) -> FunnelResult<AdvanceOutcome> {
        let Versioned {
            record: mut lead,
            version,
        } = self.store.lead(lead_id)?;
        let stage_before = lead.funnel_stage;

        // Terminal leads are returned untouched so repeated invocations are
        // strictly idempotent.
        if stage_before.is_terminal() {
            return Ok(AdvanceOutcome {
                lead,
                action: ActionResult::new(
                    "no_automatic_action",
                    true,
                    "Lead is in a terminal stage",
                    "No action taken",
                ),
            });
        }

        let now = Utc::now();
        let (action, effect) = match stage_before {
            FunnelStage::New => self.initial_contact(&lead).await,
            FunnelStage::Contacted => self.qualify_lead(&lead, now),
            FunnelStage::Qualified => self.auto_schedule_viewing(&lead, now).await,
            FunnelStage::Viewed => self.check_viewing_interest(&lead).await,
            FunnelStage::Negotiating => self.monitor_negotiation(&lead, now).await,
            FunnelStage::ViewingScheduled | FunnelStage::OfferMade => (
                ActionResult::new(
                    "no_automatic_action",
                    true,
                    "No automatic action for current stage",
                    "Waiting",
                ),
                ArmEffect::AuditOnly,
            ),
            FunnelStage::Won | FunnelStage::Lost | FunnelStage::Disqualified => {
                unreachable!("terminal stages return early")
            }
        };

        info!(
            "lead {} advanced from {}: {} (success: {})",
            lead_id,
            stage_before.as_str(),
            action.action,
            action.success
        );

        let lead = match effect {
            ArmEffect::Delegated => {
                update_lead_with(self.store.as_ref(), lead_id, |l| {
                    l.ai_engagement.record(
                        &action.action,
                        action.success,
                        &action.reasoning,
                        &action.outcome,
                        now,
                    );
                })?
            }
            other => {
                match other {
                    ArmEffect::Transition { stage, notes } => {
                        lead.change_stage(stage, Actor::Ai, notes, now);
                    }
                    ArmEffect::ScheduleFollowUp(at) => {
                        lead.next_follow_up_date = Some(at);
                    }
                    ArmEffect::AuditOnly => {}
                    ArmEffect::Delegated => unreachable!(),
                }
                lead.ai_engagement.record(
                    &action.action,
                    action.success,
                    &action.reasoning,
                    &action.outcome,
                    now,
                );
                self.store.update_lead(version, lead.clone())?;
                lead
            }
        };

        Ok(AdvanceOutcome { lead, action })
    }

    async fn initial_contact(&self, lead: &Lead) -> (ActionResult, ArmEffect) {
        let reasoning = "New lead requires initial contact";
        let result = match self.store.property(lead.property_id) {
            Ok(property) => {
                let message = OutboundMessage::with_subject(
                    format!("Thank you for your interest in {}", property.title),
                    format!(
                        "Thank you for expressing interest in {} ({} {}, {}). Would you like \
                         to schedule a viewing?",
                        property.title, property.currency, property.price, property.location
                    ),
                );
                let report = self
                    .dispatcher
                    .send_multi_channel(&client_target(lead), &message)
                    .await;
                if report.delivered() {
                    ActionResult::new(
                        "sent_initial_contact",
                        true,
                        reasoning,
                        "Initial contact sent",
                    )
                } else {
                    ActionResult::new(
                        "sent_initial_contact",
                        false,
                        reasoning,
                        "Failed: no channel reached the client",
                    )
                }
            }
            Err(e) => ActionResult::new(
                "sent_initial_contact",
                false,
                reasoning,
                format!("Failed: {e}"),
            ),
        };
        let notes = result.outcome.clone();
        (
            result,
            ArmEffect::Transition {
                stage: FunnelStage::Contacted,
                notes,
            },
        )
    }

    fn qualify_lead(&self, lead: &Lead, now: DateTime<Utc>) -> (ActionResult, ArmEffect) {
        if lead.score >= QUALIFICATION_SCORE {
            let outcome = "Lead qualified for viewing".to_string();
            (
                ActionResult::new(
                    "qualified_lead",
                    true,
                    format!(
                        "Lead score {}/100 meets qualification threshold",
                        lead.score
                    ),
                    outcome.clone(),
                ),
                ArmEffect::Transition {
                    stage: FunnelStage::Qualified,
                    notes: outcome,
                },
            )
        } else {
            let next = now + Duration::days(3);
            (
                ActionResult::new(
                    "scheduled_follow_up",
                    true,
                    format!(
                        "Lead score {}/100 below threshold, needs nurturing",
                        lead.score
                    ),
                    format!("Follow-up scheduled for {}", next.format("%Y-%m-%d")),
                ),
                ArmEffect::ScheduleFollowUp(next),
            )
        }
    }

    async fn auto_schedule_viewing(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> (ActionResult, ArmEffect) {
        if !lead.buying_intent.is_high() {
            return (
                ActionResult::new(
                    "no_automatic_action",
                    true,
                    "Buying intent below the auto-scheduling bar",
                    "Waiting for stronger intent",
                ),
                ArmEffect::AuditOnly,
            );
        }

        let reasoning = "High intent lead ready for viewing";
        let proposal = match self
            .scheduler
            .find_slots(lead.id, lead.property_id, &[], now)
            .await
        {
            Ok(proposal) => proposal,
            Err(e) => {
                return (
                    ActionResult::new("schedule_viewing", false, reasoning, format!("Failed: {e}")),
                    ArmEffect::AuditOnly,
                )
            }
        };
        let Some(recommended) = proposal.recommended else {
            return (
                ActionResult::new(
                    "schedule_viewing",
                    false,
                    reasoning,
                    "No available viewing slots found",
                ),
                ArmEffect::AuditOnly,
            );
        };

        match self
            .scheduler
            .schedule(
                lead.id,
                lead.property_id,
                recommended.slot.starts_at,
                ScheduleOptions {
                    is_ai_generated: true,
                    ai_reasoning: Some(recommended.reasoning.clone()),
                    ..ScheduleOptions::default()
                },
            )
            .await
        {
            Ok(viewing) => (
                ActionResult::new(
                    "scheduled_viewing",
                    true,
                    recommended.reasoning,
                    format!(
                        "Viewing scheduled for {}",
                        viewing.scheduled_date.format("%Y-%m-%d %H:%M")
                    ),
                ),
                ArmEffect::Delegated,
            ),
            Err(e) => (
                ActionResult::new("schedule_viewing", false, reasoning, format!("Failed: {e}")),
                ArmEffect::Delegated,
            ),
        }
    }

    async fn check_viewing_interest(&self, lead: &Lead) -> (ActionResult, ArmEffect) {
        let interested = match self.store.viewings_for_lead(lead.id) {
            Ok(viewings) => viewings.iter().any(|v| {
                v.status == ViewingStatus::Completed
                    && v.outcome.as_ref().is_some_and(|o| o.interested)
            }),
            Err(e) => {
                return (
                    ActionResult::new(
                        "check_viewing_interest",
                        false,
                        "Attempted to check viewing interest",
                        format!("Failed: {e}"),
                    ),
                    ArmEffect::AuditOnly,
                )
            }
        };
        if !interested {
            return (
                ActionResult::new(
                    "check_viewing_interest",
                    true,
                    "Waiting for viewing completion",
                    "No completed viewings with interest yet",
                ),
                ArmEffect::AuditOnly,
            );
        }

        match self.negotiation.initiate(lead.id).await {
            Ok(result) => (result, ArmEffect::Delegated),
            Err(e) => (
                ActionResult::new(
                    "initiate_negotiation",
                    false,
                    "Attempted to initiate negotiation",
                    format!("Failed: {e}"),
                ),
                ArmEffect::Delegated,
            ),
        }
    }

    async fn monitor_negotiation(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> (ActionResult, ArmEffect) {
        let Some(last) = lead.negotiation.counter_offers.last() else {
            return (
                ActionResult::new(
                    "check_negotiation_status",
                    true,
                    "No active offers to process",
                    "Waiting for buyer offer",
                ),
                ArmEffect::AuditOnly,
            );
        };

        let days_pending = (now - last.offered_at).num_days();
        if last.offered_by == OfferParty::Ai
            && last.status == OfferStatus::Pending
            && days_pending >= STALE_COUNTER_DAYS
        {
            let report = match self.store.property(lead.property_id) {
                Ok(property) => {
                    let message = OutboundMessage::with_subject(
                        format!("Still interested in {}?", property.title),
                        format!(
                            "Following up on our counter offer for {}. The property is still \
                             available. Are you still interested?",
                            property.title
                        ),
                    );
                    Some(
                        self.dispatcher
                            .send_multi_channel(&client_target(lead), &message)
                            .await,
                    )
                }
                Err(e) => {
                    warn!("negotiation reminder skipped for lead {}: {e}", lead.id);
                    None
                }
            };
            let delivered = report.as_ref().is_some_and(|r| r.delivered());
            return (
                ActionResult::new(
                    "sent_negotiation_reminder",
                    delivered,
                    format!("{days_pending} days since last counter-offer"),
                    if delivered {
                        "Reminder sent to buyer"
                    } else {
                        "Failed: reminder could not be delivered"
                    },
                ),
                ArmEffect::AuditOnly,
            );
        }

        (
            ActionResult::new(
                "monitor_negotiation",
                true,
                "Active negotiation in progress",
                "Waiting for buyer response",
            ),
            ArmEffect::AuditOnly,
        )
    }

    /// Batch re-engagement of stalled leads. `now` comes from the external
    /// scheduler. One lead's failure never aborts the batch.
    pub async fn pursue_stalled(&self, now: DateTime<Utc>) -> FunnelResult<PursuitRun> {
        let due = self.store.leads_due_for_follow_up(now)?;
        let mut run = PursuitRun {
            processed: due.len(),
            ..PursuitRun::default()
        };

        for snapshot in due {
            let lead_id = snapshot.record.id;
            match self.pursue_one(snapshot, now).await {
                Ok(disqualified) => {
                    run.follow_ups_sent += 1;
                    if disqualified {
                        run.disqualified += 1;
                    }
                }
                Err(e) => {
                    warn!("pursuing lead {lead_id} failed: {e}");
                    run.failures += 1;
                }
            }
        }

        info!(
            "pursued {} leads ({} disqualified, {} failures)",
            run.follow_ups_sent, run.disqualified, run.failures
        );
        Ok(run)
    }

    async fn pursue_one(&self, snapshot: Versioned<Lead>, now: DateTime<Utc>) -> FunnelResult<bool> {
        let Versioned {
            record: mut lead,
            version,
        } = snapshot;
        let property = self.store.property(lead.property_id)?;

        let cadence_days = match lead.funnel_stage {
            FunnelStage::New | FunnelStage::Contacted => 3,
            FunnelStage::Qualified => 7,
            _ => 14,
        };
        lead.next_follow_up_date = Some(now + Duration::days(cadence_days));
        lead.last_follow_up_date = Some(now);
        lead.follow_up_count += 1;
        lead.ai_engagement.record(
            "sent_follow_up",
            true,
            "Scheduled follow-up date reached",
            "Follow-up dispatched",
            now,
        );

        let disqualified =
            lead.follow_up_count >= MAX_FOLLOW_UPS && lead.funnel_stage == FunnelStage::Contacted;
        if disqualified {
            lead.change_stage(
                FunnelStage::Disqualified,
                Actor::Ai,
                "Unresponsive after repeated follow-ups",
                now,
            );
            lead.deal_closure = Some(crate::models::DealClosure {
                outcome: crate::models::DealOutcome::Disqualified,
                final_price: None,
                closed_at: now,
                closed_by: Actor::Ai,
                reason_lost: None,
                reason_disqualified: Some(crate::models::DisqualifiedReason::Unresponsive),
                revenue: None,
                commission: None,
            });
        }

        let client = client_target(&lead);
        self.store.update_lead(version, lead)?;

        // Follow-up goes out after the reschedule is committed; a delivery
        // failure is logged, not rolled back.
        let message = OutboundMessage::with_subject(
            format!("Still interested in {}?", property.title),
            format!(
                "We wanted to check in about {}. The property is still available at {} {}. \
                 Would you like to schedule a viewing or get more information?",
                property.title, property.currency, property.price
            ),
        );
        let report = self.dispatcher.send_multi_channel(&client, &message).await;
        if !report.delivered() {
            warn!("follow-up for lead {} undeliverable", client.name);
        }

        Ok(disqualified)
    }

    /// Aggregates the caller's leads by stage with pipeline metrics.
    pub fn pipeline(&self, owner: Uuid, filter: &PipelineFilter) -> FunnelResult<PipelineReport> {
        let mut leads = self.store.leads_by_owner(owner)?;
        if let Some(stage) = filter.stage {
            leads.retain(|l| l.funnel_stage == stage);
        }
        if let Some(intent) = filter.buying_intent {
            leads.retain(|l| l.buying_intent == intent);
        }
        leads.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.created_at.cmp(&a.created_at))
        });

        let total_leads = leads.len();
        let active_leads = leads
            .iter()
            .filter(|l| !l.funnel_stage.is_terminal())
            .count();
        let won: Vec<&Lead> = leads
            .iter()
            .filter(|l| l.funnel_stage == FunnelStage::Won)
            .collect();
        let total_revenue: i64 = won
            .iter()
            .filter_map(|l| l.deal_closure.as_ref().and_then(|c| c.revenue))
            .sum();
        let conversion_rate = if total_leads > 0 {
            (won.len() as f64 / total_leads as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };
        let average_deal_value = if won.is_empty() {
            0.0
        } else {
            total_revenue as f64 / won.len() as f64
        };
        let metrics = PipelineMetrics {
            total_leads,
            active_leads,
            won_deals: won.len(),
            total_revenue,
            conversion_rate,
            average_deal_value,
        };

        let stages = FunnelStage::ALL
            .iter()
            .map(|&stage| StageBucket {
                stage,
                leads: leads
                    .iter()
                    .filter(|l| l.funnel_stage == stage)
                    .cloned()
                    .collect(),
            })
            .collect();

        Ok(PipelineReport { stages, metrics })
    }
}

fn client_target(lead: &Lead) -> Target {
    Target {
        name: lead.client.name.clone(),
        phone: lead.client.phone.clone(),
        email: lead.client.email.clone(),
    }
}
