//! Sessions, turns and the Markdown transcript format.
//!
//! A transcript renders every turn pair as
//!
//! ```text
//! **User:** <user_text>
//!
//! **Assistant:**
//! <assistant_text>
//!
//! ---
//!
//! ```
//!
//! A session without turns renders as the `# New Chat` header only.

use crate::error::{ChatError, ChatResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const FILENAME_PREFIX: &str = "chat_history_";
pub const FILENAME_SUFFIX: &str = ".md";
pub const NEW_CHAT_HEADER: &str = "# New Chat\n\n";

const USER_LABEL: &str = "**User:** ";
const ASSISTANT_LABEL: &str = "\n\n**Assistant:**\n";
const TURN_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::User => "user",
            Speaker::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "role")]
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }

    fn render_into(&self, out: &mut String) {
        match self.speaker {
            Speaker::User => {
                out.push_str(USER_LABEL);
                out.push_str(&self.text);
            }
            Speaker::Assistant => {
                out.push_str(ASSISTANT_LABEL);
                out.push_str(&self.text);
                out.push_str(TURN_SEPARATOR);
            }
        }
    }
}

/// Positive, never-reused session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(u64);

impl SessionId {
    pub const FIRST: SessionId = SessionId(1);

    pub fn new(value: u64) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn filename(&self) -> String {
        format!("{FILENAME_PREFIX}{}{FILENAME_SUFFIX}", self.0)
    }

    /// Parse `chat_history_<N>.md`. Zero-padded or signed numbers are rejected
    /// so that every id maps to exactly one filename.
    pub fn from_filename(name: &str) -> Option<Self> {
        let digits = name
            .strip_prefix(FILENAME_PREFIX)?
            .strip_suffix(FILENAME_SUFFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id = Self::new(digits.parse().ok()?)?;
        (id.filename() == name).then_some(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    turns: Vec<Turn>,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            turns: Vec::new(),
        }
    }

    /// Rebuild a session from its rendered transcript.
    pub fn from_transcript(id: SessionId, transcript: &str) -> ChatResult<Self> {
        let turns = parse_transcript(transcript)
            .ok_or_else(|| ChatError::CorruptTranscript(id.filename()))?;
        Ok(Self { id, turns })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn add_exchange(&mut self, user_text: &str, assistant_text: &str) {
        self.turns.push(Turn::user(user_text));
        self.turns.push(Turn::assistant(assistant_text));
    }

    pub fn render(&self) -> String {
        if self.turns.is_empty() {
            return NEW_CHAT_HEADER.to_string();
        }
        let mut out = String::new();
        for turn in &self.turns {
            turn.render_into(&mut out);
        }
        out
    }
}

fn parse_transcript(text: &str) -> Option<Vec<Turn>> {
    let body = text.strip_prefix(NEW_CHAT_HEADER).unwrap_or(text);
    let mut pairs = Vec::new();
    if !parse_pairs(body, &mut pairs) {
        return None;
    }
    Some(
        pairs
            .into_iter()
            .flat_map(|(user, assistant)| [Turn::user(user), Turn::assistant(assistant)])
            .collect(),
    )
}

/// Turn text may itself contain the labels or a `---` rule, so a separator
/// only closes a pair when the remainder still parses as whole pairs.
fn parse_pairs<'a>(rest: &'a str, pairs: &mut Vec<(&'a str, &'a str)>) -> bool {
    if rest.is_empty() {
        return true;
    }
    let Some(body) = rest.strip_prefix(USER_LABEL) else {
        return false;
    };
    for split in occurrences(body, ASSISTANT_LABEL) {
        let user = &body[..split];
        let after_user = &body[split + ASSISTANT_LABEL.len()..];
        for end in occurrences(after_user, TURN_SEPARATOR) {
            let next = &after_user[end + TURN_SEPARATOR.len()..];
            if !next.is_empty() && !next.starts_with(USER_LABEL) {
                continue;
            }
            pairs.push((user, &after_user[..end]));
            if parse_pairs(next, pairs) {
                return true;
            }
            pairs.pop();
        }
    }
    false
}

/// Byte offsets of every match of `needle`, overlapping ones included.
fn occurrences<'a>(haystack: &'a str, needle: &'a str) -> impl Iterator<Item = usize> + 'a {
    haystack
        .char_indices()
        .map(|(i, _)| i)
        .filter(move |&i| haystack[i..].starts_with(needle))
}
