use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::models::{BuyingIntent, NegotiationRules};

/// Returned when the advisor cannot produce a usable recommendation; callers
/// apply their deterministic fallback instead of surfacing this.
#[derive(Debug, thiserror::Error)]
#[error("decision advisor unavailable: {0}")]
pub struct AdvisorUnavailable(pub String);

/// Everything the advisor sees when weighing an offer.
#[derive(Debug, Clone, Serialize)]
pub struct OfferContext {
    pub list_price: i64,
    pub currency: String,
    pub offer_amount: i64,
    pub offer_percent_of_list: f64,
    pub lead_score: i32,
    pub buying_intent: BuyingIntent,
    pub days_as_lead: i64,
    pub prior_offer_count: usize,
    pub rules: NegotiationRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdviceAction {
    Accepted,
    Countered,
    Rejected,
}

impl AdviceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AdviceAction::Accepted => "accepted",
            AdviceAction::Countered => "countered",
            AdviceAction::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NegotiationAdvice {
    pub action: AdviceAction,
    #[serde(default, alias = "counterOffer")]
    pub counter_offer: Option<i64>,
    pub reasoning: String,
}

/// Compact view of one candidate slot, as presented to the advisor.
#[derive(Debug, Clone, Serialize)]
pub struct SlotCandidateSummary {
    pub index: usize,
    pub starts_at: DateTime<Utc>,
    pub is_preferred: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SlotContext {
    pub lead_score: i32,
    pub buying_intent: BuyingIntent,
    pub follow_up_count: u32,
    pub slots: Vec<SlotCandidateSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    Soon,
    Flexible,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotAdvice {
    #[serde(alias = "recommendedSlotIndex")]
    pub recommended_slot_index: usize,
    pub reasoning: String,
    pub urgency: Urgency,
}

/// External decisioning capability consumed by the negotiation engine and
/// the viewing scheduler. Implementations must degrade to
/// [`AdvisorUnavailable`] on provider outage rather than raising.
#[async_trait]
pub trait DecisionAdvisor: Send + Sync {
    /// Strategy for an offer inside the discretionary band between the
    /// rejection floor and the auto-accept threshold.
    async fn negotiation_strategy(
        &self,
        ctx: &OfferContext,
    ) -> Result<NegotiationAdvice, AdvisorUnavailable>;

    /// Picks one of the presented viewing slots for the lead.
    async fn recommend_slot(&self, ctx: &SlotContext) -> Result<SlotAdvice, AdvisorUnavailable>;
}

/// Stand-in for deployments without an AI provider configured; every call
/// reports unavailable so callers run on deterministic fallbacks.
pub struct NullAdvisor;

#[async_trait]
impl DecisionAdvisor for NullAdvisor {
    async fn negotiation_strategy(
        &self,
        _ctx: &OfferContext,
    ) -> Result<NegotiationAdvice, AdvisorUnavailable> {
        Err(AdvisorUnavailable("no advisor configured".to_string()))
    }

    async fn recommend_slot(&self, _ctx: &SlotContext) -> Result<SlotAdvice, AdvisorUnavailable> {
        Err(AdvisorUnavailable("no advisor configured".to_string()))
    }
}

/// Gemini-backed advisor. The model replies in free text; the JSON object is
/// extracted with a pattern match and anything unparsable is reported as
/// unavailable so callers fall back deterministically.
pub struct GeminiAdvisor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    json_pattern: Regex,
}

impl GeminiAdvisor {
    pub fn new(endpoint: String, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let json_pattern = Regex::new(r"\{[\s\S]*\}")?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            json_pattern,
        })
    }

    async fn generate(&self, prompt: String) -> Result<String, AdvisorUnavailable> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let response = self
            .client
            .post(format!("{}?key={}", self.endpoint, self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| AdvisorUnavailable(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AdvisorUnavailable(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdvisorUnavailable(format!("invalid response body: {e}")))?;

        payload["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| AdvisorUnavailable("response carried no text".to_string()))
    }

    fn extract<T: serde::de::DeserializeOwned>(&self, text: &str) -> Result<T, AdvisorUnavailable> {
        let matched = self
            .json_pattern
            .find(text)
            .ok_or_else(|| AdvisorUnavailable("no JSON object in response".to_string()))?;
        serde_json::from_str(matched.as_str())
            .map_err(|e| AdvisorUnavailable(format!("unparsable advice: {e}")))
    }

    fn offer_prompt(ctx: &OfferContext) -> String {
        format!(
            "You are an expert real estate negotiator working a buyer offer.\n\
             List price: {currency} {list}. Offer: {currency} {offer} \
             ({percent:.1}% of list).\n\
             Lead score: {score}/100. Buying intent: {intent:?}. Days as lead: {days}. \
             Prior offers exchanged: {prior}.\n\
             Bounds: minimum acceptable {currency} {min}, auto-accept at {currency} {auto}, \
             maximum discount {max_discount}%.\n\
             Close the deal at the best price without losing the buyer.\n\
             Return ONLY a JSON object: \
             {{\"action\": \"accepted\" | \"countered\" | \"rejected\", \
             \"counter_offer\": number (only when countered), \
             \"reasoning\": \"one or two sentences\"}}",
            currency = ctx.currency,
            list = ctx.list_price,
            offer = ctx.offer_amount,
            percent = ctx.offer_percent_of_list,
            score = ctx.lead_score,
            intent = ctx.buying_intent,
            days = ctx.days_as_lead,
            prior = ctx.prior_offer_count,
            min = ctx.rules.min_acceptable_price,
            auto = ctx.rules.auto_accept_threshold,
            max_discount = ctx.rules.max_discount_percent,
        )
    }

    fn slot_prompt(ctx: &SlotContext) -> String {
        let listing = ctx
            .slots
            .iter()
            .map(|s| {
                format!(
                    "{}. {}{}",
                    s.index,
                    s.starts_at.format("%a %b %e %H:%M"),
                    if s.is_preferred { " (preferred)" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are scheduling a property viewing.\n\
             Lead score: {score}/100. Buying intent: {intent:?}. \
             Follow-ups so far: {follow_ups}.\n\
             Available slots:\n{listing}\n\
             High-intent leads should be seen within 1-2 days, medium within \
             2-4 days, low-intent may be scheduled further out.\n\
             Return ONLY a JSON object: \
             {{\"recommended_slot_index\": number, \
             \"reasoning\": \"one sentence\", \
             \"urgency\": \"immediate\" | \"soon\" | \"flexible\"}}",
            score = ctx.lead_score,
            intent = ctx.buying_intent,
            follow_ups = ctx.follow_up_count,
        )
    }
}

#[async_trait]
impl DecisionAdvisor for GeminiAdvisor {
    async fn negotiation_strategy(
        &self,
        ctx: &OfferContext,
    ) -> Result<NegotiationAdvice, AdvisorUnavailable> {
        let text = self.generate(Self::offer_prompt(ctx)).await?;
        let advice: NegotiationAdvice = self.extract(&text)?;
        if advice.action == AdviceAction::Countered
            && !advice.counter_offer.is_some_and(|c| c > 0)
        {
            warn!("advisor countered without a usable amount");
            return Err(AdvisorUnavailable(
                "counter advice carried no amount".to_string(),
            ));
        }
        Ok(advice)
    }

    async fn recommend_slot(&self, ctx: &SlotContext) -> Result<SlotAdvice, AdvisorUnavailable> {
        let text = self.generate(Self::slot_prompt(ctx)).await?;
        self.extract(&text)
    }
}
