use crate::types::{Message, RawTranscript, Speaker, Turn};

const OPERATOR_MARKERS: [&str; 2] = ["- Operator:", "- Eu:"];
const CONTACT_MARKERS: [&str; 2] = ["- Contact:", "- Contato:"];

/// Role that maps to the operator side; every other role is the contact.
const OPERATOR_ROLE: &str = "assistant";

impl RawTranscript {
    /// Decide once which shape a stored conversation has.
    ///
    /// Anything that looks like a JSON list is decoded as role-tagged turns;
    /// a list that fails to decode becomes an empty turn list so the caller
    /// renders "no history" instead of guessing at marker text.
    pub fn resolve(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.starts_with('[') {
            return RawTranscript::MarkerText(raw.to_string());
        }
        match serde_json::from_str::<Vec<Turn>>(trimmed) {
            Ok(turns) => RawTranscript::StructuredTurns(turns),
            Err(err) => {
                tracing::debug!(error = %err, "conversation is not a valid turn list");
                RawTranscript::StructuredTurns(Vec::new())
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawTranscript::StructuredTurns(turns) => turns.is_empty(),
            RawTranscript::MarkerText(text) => text.trim().is_empty(),
        }
    }
}

/// Convert a conversation record into display messages, in source order.
pub fn parse(raw: &RawTranscript) -> Vec<Message> {
    match raw {
        RawTranscript::StructuredTurns(turns) => parse_turns(turns),
        RawTranscript::MarkerText(text) => parse_marker_text(text),
    }
}

/// Resolve and parse in one step.
pub fn parse_str(raw: &str) -> Vec<Message> {
    parse(&RawTranscript::resolve(raw))
}

fn parse_turns(turns: &[Turn]) -> Vec<Message> {
    turns
        .iter()
        .map(|turn| Message {
            speaker: speaker_for_role(&turn.role),
            text: turn.content.clone(),
        })
        .collect()
}

fn speaker_for_role(role: &str) -> Speaker {
    if role == OPERATOR_ROLE {
        Speaker::Operator
    } else {
        Speaker::Contact
    }
}

/// Lines before the first marker have no message to attach to and are dropped.
fn parse_marker_text(text: &str) -> Vec<Message> {
    let mut messages = Vec::new();
    let mut current: Option<Message> = None;

    for line in text.lines() {
        match sender_marker(line) {
            Some((speaker, rest)) => {
                if let Some(done) = current.take() {
                    messages.push(finish(done));
                }
                current = Some(Message {
                    speaker,
                    text: rest.to_string(),
                });
            }
            None => {
                if let Some(message) = current.as_mut() {
                    message.text.push('\n');
                    message.text.push_str(line);
                }
            }
        }
    }

    if let Some(done) = current {
        messages.push(finish(done));
    }
    messages
}

/// Returns the speaker and the text after the marker's colon.
fn sender_marker(line: &str) -> Option<(Speaker, &str)> {
    let trimmed = line.trim_start();
    let speaker = if OPERATOR_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        Speaker::Operator
    } else if CONTACT_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        Speaker::Contact
    } else {
        return None;
    };
    let (_, rest) = trimmed.split_once(':')?;
    Some((speaker, rest))
}

fn finish(mut message: Message) -> Message {
    message.text = message.text.trim().to_string();
    message
}
