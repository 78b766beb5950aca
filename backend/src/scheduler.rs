use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::advisor::{DecisionAdvisor, SlotCandidateSummary, SlotContext, Urgency};
use crate::error::{FunnelError, FunnelResult};
use crate::models::{
    Actor, Attendee, AttendeeRole, BuyingIntent, Confirmation, FunnelStage, Property,
    ReminderChannel, ReminderRecord, ReminderStatus, Viewing, ViewingOutcome, ViewingStatus,
    ViewingType,
};
use crate::notify::{Channel, NotificationDispatcher, OutboundMessage, Target};
use crate::slots::{generate_slots, BookedInterval, CandidateSlot, SlotRules};
use crate::store::{update_lead_with, FunnelStore, Versioned};

/// How many shortlisted slots the advisor sees, and how many alternatives a
/// proposal carries back to the caller.
const ADVISOR_SHORTLIST: usize = 10;
const ALTERNATIVE_SLOTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct RecommendedSlot {
    pub slot: CandidateSlot,
    pub reasoning: String,
    pub urgency: Urgency,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotProposal {
    pub recommended: Option<RecommendedSlot>,
    pub alternatives: Vec<CandidateSlot>,
    pub existing_viewings: usize,
}

#[derive(Debug, Clone)]
pub struct ScheduleOptions {
    pub duration_minutes: i64,
    pub viewing_type: ViewingType,
    pub is_ai_generated: bool,
    pub ai_reasoning: Option<String>,
    pub scheduled_by: Option<Uuid>,
    pub rescheduled_from: Option<Uuid>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            duration_minutes: 30,
            viewing_type: ViewingType::InPerson,
            is_ai_generated: false,
            ai_reasoning: None,
            scheduled_by: None,
            rescheduled_from: None,
        }
    }
}

/// Outcome of one reminder batch run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderRun {
    pub viewings_checked: usize,
    pub reminders_sent: usize,
    pub skipped: usize,
    pub failures: usize,
}

/// Books, confirms and completes property viewings, and runs the reminder
/// batch. Slot selection delegates to the decision advisor with a
/// deterministic earliest-slot fallback.
pub struct ViewingScheduler {
    store: Arc<dyn FunnelStore>,
    advisor: Arc<dyn DecisionAdvisor>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ViewingScheduler {
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

    /// Proposes conflict-free viewing slots for the lead on the property.
    /// Candidates matching a preferred date are surfaced to the advisor
    /// first; when the advisor is unavailable or answers out of range, the
    /// first presented slot wins.
    pub async fn find_slots(
        &self,
        lead_id: Uuid,
        property_id: Uuid,
        preferred_dates: &[NaiveDate],
        now: DateTime<Utc>,
    ) -> FunnelResult<SlotProposal> {
        let lead = self.store.lead(lead_id)?.record;
        self.store.property(property_id)?;

        let booked: Vec<BookedInterval> = self
            .store
            .viewings_for_property(property_id)?
            .into_iter()
            .filter(|v| v.status.blocks_slot() && v.scheduled_date >= now)
            .map(|v| BookedInterval {
                start: v.scheduled_date,
                end: v.end_time(),
            })
            .collect();

        let candidates = generate_slots(now, &booked, preferred_dates, SlotRules::default());
        if candidates.is_empty() {
            return Ok(SlotProposal {
                recommended: None,
                alternatives: Vec::new(),
                existing_viewings: booked.len(),
            });
        }

        // Shortlist the chronologically earliest candidates, preferred first.
        let shortlist: Vec<CandidateSlot> =
            candidates.iter().copied().take(ADVISOR_SHORTLIST).collect();
        let mut presented: Vec<CandidateSlot> =
            shortlist.iter().copied().filter(|s| s.is_preferred).collect();
        presented.extend(shortlist.iter().copied().filter(|s| !s.is_preferred));

        let ctx = SlotContext {
            lead_score: lead.score,
            buying_intent: lead.buying_intent,
            follow_up_count: lead.follow_up_count,
            slots: presented
                .iter()
                .enumerate()
                .map(|(index, s)| SlotCandidateSummary {
                    index,
                    starts_at: s.starts_at,
                    is_preferred: s.is_preferred,
                })
                .collect(),
        };

        let recommended = match self.advisor.recommend_slot(&ctx).await {
            Ok(advice) if advice.recommended_slot_index < presented.len() => RecommendedSlot {
                slot: presented[advice.recommended_slot_index],
                reasoning: advice.reasoning,
                urgency: advice.urgency,
            },
            Ok(advice) => {
                warn!(
                    "advisor picked slot {} of {}, using the first candidate",
                    advice.recommended_slot_index,
                    presented.len()
                );
                Self::fallback_slot(&presented, lead.buying_intent)
            }
            Err(e) => {
                warn!("slot recommendation fell back: {e}");
                Self::fallback_slot(&presented, lead.buying_intent)
            }
        };

        let alternatives: Vec<CandidateSlot> = candidates
            .iter()
            .copied()
            .filter(|c| c.starts_at != recommended.slot.starts_at)
            .take(ALTERNATIVE_SLOTS)
            .collect();

        Ok(SlotProposal {
            recommended: Some(recommended),
            alternatives,
            existing_viewings: booked.len(),
        })
    }

    fn fallback_slot(presented: &[CandidateSlot], intent: BuyingIntent) -> RecommendedSlot {
        let urgency = match intent {
            BuyingIntent::VeryHigh | BuyingIntent::High => Urgency::Immediate,
            BuyingIntent::Medium => Urgency::Soon,
            BuyingIntent::Low => Urgency::Flexible,
        };
        RecommendedSlot {
            slot: presented[0],
            reasoning: "Earliest available slot selected".to_string(),
            urgency,
        }
    }

    /// Creates the viewing, moves the lead to `viewing_scheduled` and sends
    /// invitations to every reachable attendee. One attendee's delivery
    /// failure never blocks the others; an email-only retry runs before an
    /// attendee is given up on.
    pub async fn schedule(
        &self,
        lead_id: Uuid,
        property_id: Uuid,
        when: DateTime<Utc>,
        options: ScheduleOptions,
    ) -> FunnelResult<Viewing> {
        if options.duration_minutes <= 0 {
            return Err(FunnelError::validation("duration must be positive"));
        }

        let Versioned {
            record: mut lead,
            version,
        } = self.store.lead(lead_id)?;
        if lead.funnel_stage.is_terminal() {
            return Err(FunnelError::validation("lead is already closed"));
        }
        let property = self.store.property(property_id)?;
        let owner = self.store.user(property.owner_id)?;
        let now = Utc::now();

        let viewing = Viewing {
            id: Uuid::new_v4(),
            lead_id,
            property_id,
            scheduled_by: options.scheduled_by.unwrap_or(property.owner_id),
            scheduled_date: when,
            duration_minutes: options.duration_minutes,
            status: ViewingStatus::Scheduled,
            viewing_type: options.viewing_type,
            is_ai_generated: options.is_ai_generated,
            ai_reasoning: options.ai_reasoning.clone(),
            location: Some(property.location.clone()),
            attendees: vec![
                Attendee {
                    name: lead.client.name.clone(),
                    email: lead.client.email.clone(),
                    phone: lead.client.phone.clone(),
                    role: AttendeeRole::Lead,
                },
                Attendee {
                    name: owner.name.clone(),
                    email: owner.email.clone(),
                    phone: owner.phone.clone(),
                    role: AttendeeRole::Owner,
                },
            ],
            confirmation: Confirmation::default(),
            reminders: Vec::new(),
            outcome: None,
            notes: None,
            rescheduled_from: options.rescheduled_from,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_viewing(viewing.clone())?;

        let changed_by = if options.is_ai_generated {
            Actor::Ai
        } else {
            Actor::Manual
        };
        let when_text = when.format("%Y-%m-%d %H:%M").to_string();
        lead.change_stage(
            FunnelStage::ViewingScheduled,
            changed_by,
            format!("Viewing scheduled for {when_text}"),
            now,
        );
        if options.is_ai_generated {
            let reasoning = options
                .ai_reasoning
                .as_deref()
                .unwrap_or("Automated scheduling");
            lead.ai_engagement.record(
                "scheduled_viewing",
                true,
                reasoning,
                &format!("Viewing scheduled for {when_text}"),
                now,
            );
        }
        self.store.update_lead(version, lead)?;

        // State is committed; invitations go out after, and a failed send is
        // logged rather than rolled back.
        self.send_invitations(&viewing, &property).await;

        Ok(viewing)
    }

    async fn send_invitations(&self, viewing: &Viewing, property: &Property) {
        let when_text = viewing.scheduled_date.format("%A %B %e, %H:%M").to_string();
        let message = OutboundMessage::with_subject(
            format!("Property Viewing Scheduled - {}", property.title),
            format!(
                "A viewing of {} has been scheduled for {} ({} minutes). Location: {}. \
                 Please confirm your attendance.",
                property.title,
                when_text,
                viewing.duration_minutes,
                viewing.location.as_deref().unwrap_or(&property.location),
            ),
        );

        let mut delivered = 0usize;
        for attendee in &viewing.attendees {
            let target = Target {
                name: attendee.name.clone(),
                phone: attendee.phone.clone(),
                email: attendee.email.clone(),
            };
            if !target.reachable() {
                continue;
            }
            let mut report = self.dispatcher.send_multi_channel(&target, &message).await;
            if !report.delivered() && target.email.is_some() {
                report = self.dispatcher.send_email_only(&target, &message).await;
            }
            if report.delivered() {
                delivered += 1;
            } else {
                warn!(
                    "viewing {} invitation to {} undeliverable",
                    viewing.id, attendee.name
                );
            }
        }
        info!(
            "viewing {} invitations delivered to {}/{} attendees",
            viewing.id,
            delivered,
            viewing.attendees.len()
        );
    }

    /// Records one side's confirmation. Idempotent per role: a repeated call
    /// neither duplicates nor refreshes the original timestamp. The viewing
    /// becomes `confirmed` exactly when both sides have confirmed.
    pub fn confirm(&self, viewing_id: Uuid, role: AttendeeRole) -> FunnelResult<Viewing> {
        let Versioned {
            record: mut viewing,
            version,
        } = self.store.viewing(viewing_id)?;
        if viewing.status.is_terminal() {
            return Err(FunnelError::validation("viewing already finalized"));
        }

        let now = Utc::now();
        match role {
            AttendeeRole::Lead => {
                if !viewing.confirmation.lead_confirmed {
                    viewing.confirmation.lead_confirmed = true;
                    viewing.confirmation.lead_confirmed_at = Some(now);
                }
            }
            AttendeeRole::Agent | AttendeeRole::Owner => {
                if !viewing.confirmation.agent_confirmed {
                    viewing.confirmation.agent_confirmed = true;
                    viewing.confirmation.agent_confirmed_at = Some(now);
                }
            }
            AttendeeRole::Companion => {
                return Err(FunnelError::validation("companions cannot confirm a viewing"));
            }
        }

        if viewing.confirmation.both_confirmed() {
            viewing.status = ViewingStatus::Confirmed;
        }
        self.store.update_viewing(version, viewing.clone())?;
        Ok(viewing)
    }

    /// Marks the viewing completed, stores the outcome once, and moves the
    /// linked lead to `negotiating` or `viewed`.
    pub fn complete(&self, viewing_id: Uuid, outcome: ViewingOutcome) -> FunnelResult<Viewing> {
        let Versioned {
            record: mut viewing,
            version,
        } = self.store.viewing(viewing_id)?;
        if viewing.status.is_terminal() {
            return Err(FunnelError::validation("viewing already finalized"));
        }

        let now = Utc::now();
        viewing.status = ViewingStatus::Completed;
        viewing.outcome = Some(outcome.clone());
        self.store.update_viewing(version, viewing.clone())?;

        let next_stage = if outcome.ready_to_negotiate {
            FunnelStage::Negotiating
        } else {
            FunnelStage::Viewed
        };
        let notes = match &outcome.feedback {
            Some(feedback) => format!("Viewing completed. {feedback}"),
            None => "Viewing completed.".to_string(),
        };
        let lead_update = update_lead_with(self.store.as_ref(), viewing.lead_id, |lead| {
            if !lead.funnel_stage.is_terminal() {
                lead.change_stage(next_stage, Actor::System, notes.clone(), now);
            }
        });
        if let Err(e) = lead_update {
            warn!(
                "viewing {} completed but lead {} not updated: {e}",
                viewing.id, viewing.lead_id
            );
        }

        Ok(viewing)
    }

    /// Reminder batch: every viewing inside the next calendar day that is
    /// still scheduled or confirmed gets one reminder per reachable
    /// attendee, at most once per day per viewing. `now` comes from the
    /// external scheduler so runs are reproducible.
    pub async fn send_due_reminders(&self, now: DateTime<Utc>) -> FunnelResult<ReminderRun> {
        let window_start = (now + Duration::days(1))
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let window_end = (now + Duration::days(2))
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_utc();

        let upcoming = self.store.viewings_in_window(window_start, window_end)?;
        let mut run = ReminderRun {
            viewings_checked: upcoming.len(),
            ..ReminderRun::default()
        };

        for Versioned {
            record: viewing,
            version,
        } in upcoming
        {
            if !matches!(
                viewing.status,
                ViewingStatus::Scheduled | ViewingStatus::Confirmed
            ) {
                run.skipped += 1;
                continue;
            }
            if viewing.reminder_sent_on(now.date_naive()) {
                run.skipped += 1;
                continue;
            }

            let property = match self.store.property(viewing.property_id) {
                Ok(p) => p,
                Err(e) => {
                    warn!("reminder for viewing {} skipped: {e}", viewing.id);
                    run.failures += 1;
                    continue;
                }
            };

            let message = OutboundMessage::with_subject(
                format!("Reminder: Property Viewing Tomorrow - {}", property.title),
                format!(
                    "Friendly reminder: your viewing of {} is tomorrow at {}. Location: {}.",
                    property.title,
                    viewing.scheduled_date.format("%H:%M"),
                    viewing.location.as_deref().unwrap_or(&property.location),
                ),
            );

            let mut entries: Vec<ReminderRecord> = Vec::new();
            for attendee in &viewing.attendees {
                let target = Target {
                    name: attendee.name.clone(),
                    phone: attendee.phone.clone(),
                    email: attendee.email.clone(),
                };
                if !target.reachable() {
                    continue;
                }
                let report = self.dispatcher.send_multi_channel(&target, &message).await;
                match report.succeeded {
                    Some(channel) => {
                        entries.push(ReminderRecord {
                            sent_at: now,
                            channel: reminder_channel(channel),
                            status: ReminderStatus::Sent,
                        });
                        run.reminders_sent += 1;
                    }
                    None => run.failures += 1,
                }
            }

            if entries.is_empty() {
                continue;
            }
            let mut updated = viewing.clone();
            updated.reminders.extend(entries);
            match self.store.update_viewing(version, updated) {
                Ok(_) => {}
                Err(FunnelError::Conflict(_)) => {
                    warn!(
                        "viewing {} changed mid-reminder run, entries dropped",
                        viewing.id
                    );
                }
                Err(e) => {
                    warn!("viewing {} reminder entries not persisted: {e}", viewing.id);
                    run.failures += 1;
                }
            }
        }

        Ok(run)
    }
}

fn reminder_channel(channel: Channel) -> ReminderChannel {
    match channel {
        Channel::Chat => ReminderChannel::Whatsapp,
        Channel::Sms => ReminderChannel::Sms,
        Channel::Email => ReminderChannel::Email,
    }
}
