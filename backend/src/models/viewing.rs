use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewingStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
    Rescheduled,
}

impl ViewingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ViewingStatus::Completed | ViewingStatus::Cancelled | ViewingStatus::NoShow
        )
    }

    /// Whether an appointment in this status still occupies its time slot.
    pub fn blocks_slot(self) -> bool {
        !matches!(self, ViewingStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewingType {
    InPerson,
    Virtual,
    SelfGuided,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeRole {
    Lead,
    Agent,
    Owner,
    Companion,
}

/// Fixed at creation time; invitations and reminders go to this list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: AttendeeRole,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Confirmation {
    pub lead_confirmed: bool,
    pub lead_confirmed_at: Option<DateTime<Utc>>,
    pub agent_confirmed: bool,
    pub agent_confirmed_at: Option<DateTime<Utc>>,
}

impl Confirmation {
    pub fn both_confirmed(&self) -> bool {
        self.lead_confirmed && self.agent_confirmed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderChannel {
    Email,
    Sms,
    Whatsapp,
    Push,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Sent,
    Delivered,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub sent_at: DateTime<Utc>,
    pub channel: ReminderChannel,
    pub status: ReminderStatus,
}

/// Recorded once, when the viewing is completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewingOutcome {
    pub interested: bool,
    pub feedback: Option<String>,
    pub next_steps: Option<String>,
    pub ready_to_negotiate: bool,
}

/// One scheduled property visit tied to exactly one lead and one property.
/// Cancellation is a status change, never a deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Viewing {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub property_id: Uuid,
    pub scheduled_by: Uuid,
    pub scheduled_date: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: ViewingStatus,
    pub viewing_type: ViewingType,
    pub is_ai_generated: bool,
    pub ai_reasoning: Option<String>,
    pub location: Option<String>,
    pub attendees: Vec<Attendee>,
    pub confirmation: Confirmation,
    pub reminders: Vec<ReminderRecord>,
    pub outcome: Option<ViewingOutcome>,
    pub notes: Option<String>,
    pub rescheduled_from: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Viewing {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.scheduled_date + Duration::minutes(self.duration_minutes)
    }

    /// Guard against double-sending reminders within one calendar day.
    pub fn reminder_sent_on(&self, day: NaiveDate) -> bool {
        self.reminders.iter().any(|r| r.sent_at.date_naive() == day)
    }
}
