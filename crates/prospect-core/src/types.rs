use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Remote identifier of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(pub i64);

impl fmt::Display for CampaignId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote identifier of a contact enrolled in a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a campaign as reported by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    Pending,
    Running,
    Stopped,
    Completed,
    Error,
}

impl CampaignStatus {
    /// Parse a status as sent over the wire. The backend speaks Portuguese;
    /// English names are accepted as well.
    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pendente" | "pending" => Some(Self::Pending),
            "em andamento" | "running" => Some(Self::Running),
            "parado" | "pausado" | "stopped" | "paused" => Some(Self::Stopped),
            "concluído" | "concluido" | "completed" => Some(Self::Completed),
            "falha" | "error" | "failed" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Completed => "Completed",
            Self::Error => "Error",
        }
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    /// Completed and Error end the campaign's lifetime.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    pub fn can_start(self) -> bool {
        matches!(self, Self::Pending | Self::Stopped)
    }

    pub fn can_stop(self) -> bool {
        self == Self::Running
    }

    /// Editing and deleting are refused while the remote is executing.
    pub fn allows_mutation(self) -> bool {
        !self.is_running()
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl<'de> Deserialize<'de> for CampaignStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CampaignStatus::from_wire(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown campaign status: {raw}")))
    }
}

/// Per-contact progress tag inside a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContactStage {
    AwaitingStart,
    AwaitingReply,
    ReplyReceived,
    MeetingScheduled,
    QualifiedLead,
    NotInterested,
    Completed,
    NoWhatsApp,
    SendFailed,
    AiError,
    Other(String),
}

impl ContactStage {
    /// Known stages in the order an operator would cycle through them.
    pub const KNOWN: [ContactStage; 10] = [
        ContactStage::AwaitingStart,
        ContactStage::AwaitingReply,
        ContactStage::ReplyReceived,
        ContactStage::MeetingScheduled,
        ContactStage::QualifiedLead,
        ContactStage::NotInterested,
        ContactStage::Completed,
        ContactStage::NoWhatsApp,
        ContactStage::SendFailed,
        ContactStage::AiError,
    ];

    pub fn from_wire(raw: &str) -> Self {
        let trimmed = raw.trim();
        Self::KNOWN
            .iter()
            .find(|stage| stage.as_wire().eq_ignore_ascii_case(trimmed))
            .cloned()
            .unwrap_or_else(|| Self::Other(trimmed.to_string()))
    }

    pub fn as_wire(&self) -> &str {
        match self {
            Self::AwaitingStart => "Aguardando Início",
            Self::AwaitingReply => "Aguardando Resposta",
            Self::ReplyReceived => "Resposta Recebida",
            Self::MeetingScheduled => "Reunião Agendada",
            Self::QualifiedLead => "Lead Qualificado",
            Self::NotInterested => "Não Interessado",
            Self::Completed => "Concluído",
            Self::NoWhatsApp => "Sem Whatsapp",
            Self::SendFailed => "Falha no Envio",
            Self::AiError => "Erro IA",
            Self::Other(raw) => raw.as_str(),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::AwaitingStart => "Awaiting Start",
            Self::AwaitingReply => "Awaiting Reply",
            Self::ReplyReceived => "Reply Received",
            Self::MeetingScheduled => "Meeting Scheduled",
            Self::QualifiedLead => "Qualified Lead",
            Self::NotInterested => "Not Interested",
            Self::Completed => "Completed",
            Self::NoWhatsApp => "No WhatsApp",
            Self::SendFailed => "Send Failed",
            Self::AiError => "AI Error",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Next known stage, wrapping around. Unknown stages jump to the first one.
    pub fn next(&self) -> Self {
        match Self::KNOWN.iter().position(|stage| stage == self) {
            Some(pos) => Self::KNOWN[(pos + 1) % Self::KNOWN.len()].clone(),
            None => Self::KNOWN[0].clone(),
        }
    }

    pub fn previous(&self) -> Self {
        let len = Self::KNOWN.len();
        match Self::KNOWN.iter().position(|stage| stage == self) {
            Some(pos) => Self::KNOWN[(pos + len - 1) % len].clone(),
            None => Self::KNOWN[len - 1].clone(),
        }
    }
}

impl Serialize for ContactStage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for ContactStage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ContactStage::from_wire(&raw))
    }
}

/// A campaign as held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub status: CampaignStatus,
    pub config_id: Option<i64>,
    pub followup_interval_minutes: u32,
    pub initial_message_interval_seconds: u32,
    pub created_at: Option<String>,
}

/// Point-in-time read of a campaign's progress log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSnapshot {
    pub text: String,
    pub status: CampaignStatus,
}

/// One conversation turn as stored by the remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// Raw conversation record, resolved once when it leaves the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTranscript {
    StructuredTurns(Vec<Turn>),
    MarkerText(String),
}

impl Default for RawTranscript {
    fn default() -> Self {
        RawTranscript::MarkerText(String::new())
    }
}

/// Per-contact progress record within a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityEntry {
    pub id: EntryId,
    pub contact_id: Option<i64>,
    pub contact_name: String,
    pub contact_phone: String,
    pub stage: ContactStage,
    pub notes: Option<String>,
    pub transcript: RawTranscript,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Operator,
    Contact,
}

/// A display-ready conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub speaker: Speaker,
    pub text: String,
}

/// Operator edit of a campaign contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactUpdate {
    pub stage: ContactStage,
    pub notes: Option<String>,
}

/// Input for creating a campaign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCampaign {
    pub name: String,
    pub config_id: i64,
    pub contact_ids: Vec<i64>,
    pub followup_interval_minutes: u32,
    pub initial_message_interval_seconds: u32,
}

/// Partial campaign edit; `None` leaves the field as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignEdit {
    pub name: Option<String>,
    pub config_id: Option<i64>,
    pub followup_interval_minutes: Option<u32>,
    pub initial_message_interval_seconds: Option<u32>,
    pub contact_ids_to_add: Vec<i64>,
}

impl CampaignEdit {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.config_id.is_none()
            && self.followup_interval_minutes.is_none()
            && self.initial_message_interval_seconds.is_none()
            && self.contact_ids_to_add.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accepts_portuguese_and_english() {
        assert_eq!(
            CampaignStatus::from_wire("Em Andamento"),
            Some(CampaignStatus::Running)
        );
        assert_eq!(
            CampaignStatus::from_wire("Concluído"),
            Some(CampaignStatus::Completed)
        );
        assert_eq!(
            CampaignStatus::from_wire("Pausado"),
            Some(CampaignStatus::Stopped)
        );
        assert_eq!(
            CampaignStatus::from_wire(" running "),
            Some(CampaignStatus::Running)
        );
        assert_eq!(CampaignStatus::from_wire("Falha"), Some(CampaignStatus::Error));
        assert_eq!(CampaignStatus::from_wire("archived"), None);
    }

    #[test]
    fn status_transitions_allowed() {
        assert!(CampaignStatus::Pending.can_start());
        assert!(CampaignStatus::Stopped.can_start());
        assert!(!CampaignStatus::Completed.can_start());
        assert!(!CampaignStatus::Error.can_start());
        assert!(!CampaignStatus::Running.allows_mutation());
        assert!(CampaignStatus::Error.is_terminal());
    }

    #[test]
    fn stage_round_trips_wire_text() {
        let stage: ContactStage = serde_json::from_str("\"Lead Qualificado\"").unwrap();
        assert_eq!(stage, ContactStage::QualifiedLead);
        assert_eq!(serde_json::to_string(&stage).unwrap(), "\"Lead Qualificado\"");

        let other = ContactStage::from_wire("Aguardando Ação do Contato");
        assert_eq!(
            other,
            ContactStage::Other("Aguardando Ação do Contato".to_string())
        );
        assert_eq!(other.as_wire(), "Aguardando Ação do Contato");
    }

    #[test]
    fn edit_is_empty_until_a_field_is_set() {
        assert!(CampaignEdit::default().is_empty());
        let edit = CampaignEdit {
            contact_ids_to_add: vec![3],
            ..CampaignEdit::default()
        };
        assert!(!edit.is_empty());
    }

    #[test]
    fn stage_next_wraps() {
        assert_eq!(ContactStage::AwaitingStart.next(), ContactStage::AwaitingReply);
        assert_eq!(ContactStage::AiError.next(), ContactStage::AwaitingStart);
        assert_eq!(
            ContactStage::Other("x".into()).next(),
            ContactStage::AwaitingStart
        );
        assert_eq!(ContactStage::AwaitingStart.previous(), ContactStage::AiError);
        assert_eq!(ContactStage::ReplyReceived.previous(), ContactStage::AwaitingReply);
    }
}
