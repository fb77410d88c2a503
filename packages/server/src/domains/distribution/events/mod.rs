//! Inbound provider events, already correlated with our records

/// Status callback for a single leg (agent leg, or the caller's own leg)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegStatusEvent {
    pub account_id: String,
    pub leg_sid: String,
    /// Raw provider `CallStatus`
    pub status: String,
    /// Present only on agent legs (we put it on the status callback URL at dial time)
    pub agent_id: Option<String>,
    /// Caller leg the agent leg was dialed for
    pub parent_call_sid: Option<String>,
}

impl LegStatusEvent {
    pub fn is_agent_leg(&self) -> bool {
        self.agent_id.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConferenceEventKind {
    ConferenceStart,
    ConferenceEnd,
    ParticipantJoin,
    ParticipantLeave,
    Other(String),
}

impl ConferenceEventKind {
    pub fn from_provider(event: &str) -> Self {
        match event {
            "conference-start" => ConferenceEventKind::ConferenceStart,
            "conference-end" => ConferenceEventKind::ConferenceEnd,
            "participant-join" => ConferenceEventKind::ParticipantJoin,
            "participant-leave" => ConferenceEventKind::ParticipantLeave,
            other => ConferenceEventKind::Other(other.to_string()),
        }
    }
}

/// Membership change in a holding conference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConferenceEvent {
    pub account_id: String,
    /// Caller leg sid that owns the conference
    pub call_sid: String,
    pub kind: ConferenceEventKind,
    /// Agent id for agent legs; callers join without a label
    pub participant_label: Option<String>,
}
