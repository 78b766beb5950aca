use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Actor;

/// Where a lead sits in the automated sales funnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStage {
    New,
    Contacted,
    Qualified,
    ViewingScheduled,
    Viewed,
    Negotiating,
    OfferMade,
    Won,
    Lost,
    Disqualified,
}

impl FunnelStage {
    pub const ALL: [FunnelStage; 10] = [
        FunnelStage::New,
        FunnelStage::Contacted,
        FunnelStage::Qualified,
        FunnelStage::ViewingScheduled,
        FunnelStage::Viewed,
        FunnelStage::Negotiating,
        FunnelStage::OfferMade,
        FunnelStage::Won,
        FunnelStage::Lost,
        FunnelStage::Disqualified,
    ];

    /// Terminal stages accept no further automated action.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            FunnelStage::Won | FunnelStage::Lost | FunnelStage::Disqualified
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FunnelStage::New => "new",
            FunnelStage::Contacted => "contacted",
            FunnelStage::Qualified => "qualified",
            FunnelStage::ViewingScheduled => "viewing_scheduled",
            FunnelStage::Viewed => "viewed",
            FunnelStage::Negotiating => "negotiating",
            FunnelStage::OfferMade => "offer_made",
            FunnelStage::Won => "won",
            FunnelStage::Lost => "lost",
            FunnelStage::Disqualified => "disqualified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuyingIntent {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl BuyingIntent {
    /// High-intent leads get viewings booked without waiting for a request.
    pub fn is_high(self) -> bool {
        matches!(self, BuyingIntent::High | BuyingIntent::VeryHigh)
    }
}

/// Contact details captured when the client expressed interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// One entry in the append-only stage history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageChange {
    pub stage: FunnelStage,
    pub changed_at: DateTime<Utc>,
    pub changed_by: Actor,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferParty {
    Lead,
    Ai,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Countered,
    Rejected,
}

/// One offer in the negotiation exchange, from either side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounterOffer {
    pub amount: i64,
    pub offered_by: OfferParty,
    pub offered_at: DateTime<Utc>,
    pub reasoning: String,
    pub status: OfferStatus,
}

/// Per-lead bounds the offer evaluation runs against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationRules {
    pub min_acceptable_price: i64,
    pub max_discount_percent: f64,
    pub auto_accept_threshold: i64,
    pub require_approval_below: i64,
}

impl NegotiationRules {
    /// Default bounds derived from the list price: accept at 95% or better,
    /// walk away below 90%.
    pub fn defaults_for(list_price: i64) -> Self {
        Self {
            min_acceptable_price: list_price * 90 / 100,
            max_discount_percent: 10.0,
            auto_accept_threshold: list_price * 95 / 100,
            require_approval_below: list_price * 90 / 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NegotiationState {
    pub is_active: bool,
    pub ai_negotiation_enabled: bool,
    pub rules: Option<NegotiationRules>,
    pub initial_offer: Option<i64>,
    pub current_offer: Option<i64>,
    pub counter_offers: Vec<CounterOffer>,
    pub discount_applied: Option<i64>,
    pub discount_percentage: Option<f64>,
}

impl Default for NegotiationState {
    fn default() -> Self {
        Self {
            is_active: false,
            ai_negotiation_enabled: true,
            rules: None,
            initial_offer: None,
            current_offer: None,
            counter_offers: Vec::new(),
            discount_applied: None,
            discount_percentage: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealOutcome {
    Won,
    Lost,
    Disqualified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostReason {
    PriceTooHigh,
    FoundAlternative,
    NotInterested,
    BudgetConstraints,
    TimingIssues,
    LocationMismatch,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisqualifiedReason {
    Unresponsive,
    NotSerious,
    BudgetMismatch,
    RequirementsMismatch,
    Spam,
    Duplicate,
    Other,
}

/// Written exactly once, when the lead reaches a terminal stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealClosure {
    pub outcome: DealOutcome,
    pub final_price: Option<i64>,
    pub closed_at: DateTime<Utc>,
    pub closed_by: Actor,
    pub reason_lost: Option<LostReason>,
    pub reason_disqualified: Option<DisqualifiedReason>,
    pub revenue: Option<i64>,
    pub commission: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiActionSummary {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub reasoning: String,
}

/// One entry in the append-only automation audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiActionRecord {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub reasoning: String,
    pub outcome: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AiEngagement {
    pub total_interactions: u32,
    pub last_action: Option<AiActionSummary>,
    pub actions: Vec<AiActionRecord>,
}

impl AiEngagement {
    /// Appends one audit entry and refreshes the last-action summary.
    pub fn record(
        &mut self,
        action: &str,
        success: bool,
        reasoning: &str,
        outcome: &str,
        at: DateTime<Utc>,
    ) {
        self.total_interactions += 1;
        self.last_action = Some(AiActionSummary {
            action: action.to_string(),
            timestamp: at,
            reasoning: reasoning.to_string(),
        });
        self.actions.push(AiActionRecord {
            action: action.to_string(),
            timestamp: at,
            success,
            reasoning: reasoning.to_string(),
            outcome: outcome.to_string(),
        });
    }
}

/// A prospective client's interest in one property, owned by the funnel core
/// for the duration of its active lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub property_id: Uuid,
    pub created_by: Uuid,
    pub client: ClientContact,
    pub funnel_stage: FunnelStage,
    pub score: i32,
    pub buying_intent: BuyingIntent,
    pub stage_history: Vec<StageChange>,
    pub negotiation: NegotiationState,
    pub deal_closure: Option<DealClosure>,
    pub ai_engagement: AiEngagement,
    pub last_follow_up_date: Option<DateTime<Utc>>,
    pub next_follow_up_date: Option<DateTime<Utc>>,
    pub follow_up_count: u32,
    pub auto_follow_up_enabled: bool,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(
        property_id: Uuid,
        created_by: Uuid,
        client: ClientContact,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id,
            created_by,
            client,
            funnel_stage: FunnelStage::New,
            score: 0,
            buying_intent: BuyingIntent::Medium,
            stage_history: Vec::new(),
            negotiation: NegotiationState::default(),
            deal_closure: None,
            ai_engagement: AiEngagement::default(),
            last_follow_up_date: None,
            next_follow_up_date: None,
            follow_up_count: 0,
            auto_follow_up_enabled: true,
            created_at: now,
        }
    }

    /// Moves the lead to `stage` and appends the matching history entry.
    pub fn change_stage(
        &mut self,
        stage: FunnelStage,
        changed_by: Actor,
        notes: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.funnel_stage = stage;
        self.stage_history.push(StageChange {
            stage,
            changed_at: at,
            changed_by,
            notes: Some(notes.into()),
        });
    }

    pub fn days_as_lead(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_days()
    }
}
