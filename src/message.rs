use std::collections::HashMap;
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;
use uuid::Uuid;

use crate::backend::BackendKind;
use crate::error::ValidationError;

/// Outcome names generated by backends themselves. User-supplied action ids
/// must never collide with these.
pub const RESERVED_ACTION_IDS: [&str; 3] = ["closed", "replied", "timeout"];

/// Separator used by the subprocess backend when joining action labels on
/// the command line. Labels containing it cannot round-trip.
const ACTION_SEPARATOR: char = ',';

/// A user-selectable notification button: an internal id plus the label
/// shown to the user.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Action {
    pub id: String,
    pub label: String,
}

/// Backend-agnostic notification message.
///
/// Built through [`Message::builder`]; validation happens once at build time
/// and the message is immutable afterwards.
#[derive(Clone, Debug)]
pub struct Message {
    title: String,
    text: Option<String>,
    icon: Option<PathBuf>,
    timeout: Option<Duration>,
    actions: Vec<Action>,
    reply: bool,
    extra: HashMap<String, Value>,
}

impl Message {
    pub fn builder(title: impl Into<String>) -> MessageBuilder {
        MessageBuilder {
            title: title.into(),
            text: None,
            icon: None,
            timeout: None,
            actions: Vec::new(),
            reply: false,
            extra: HashMap::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Body text. When unset, the title doubles as the body.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn icon(&self) -> Option<&Path> {
        self.icon.as_deref()
    }

    /// Requested display duration. Ignored by backends whenever actions are
    /// present, since actions imply waiting indefinitely for a user choice.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn reply(&self) -> bool {
        self.reply
    }

    /// Backend-specific option, consumed opportunistically by the backend
    /// that understands it and ignored by all others.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

#[derive(Clone, Debug)]
pub struct MessageBuilder {
    title: String,
    text: Option<String>,
    icon: Option<PathBuf>,
    timeout: Option<Duration>,
    actions: Vec<Action>,
    reply: bool,
    extra: HashMap<String, Value>,
}

impl MessageBuilder {
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    #[must_use]
    pub fn icon(mut self, icon: impl Into<PathBuf>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn action(mut self, id: impl Into<String>, label: impl Into<String>) -> Self {
        self.actions.push(Action {
            id: id.into(),
            label: label.into(),
        });
        self
    }

    #[must_use]
    pub fn reply(mut self, reply: bool) -> Self {
        self.reply = reply;
        self
    }

    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Validate and freeze the message.
    ///
    /// # Errors
    ///
    /// Fails fast on a reserved or duplicate action id, a label containing
    /// the subprocess separator, `reply` combined with actions, or a
    /// dropdown label with fewer than two actions.
    pub fn build(self) -> Result<Message, ValidationError> {
        let mut seen = Vec::with_capacity(self.actions.len());
        for action in &self.actions {
            if action.label.contains(ACTION_SEPARATOR) {
                return Err(ValidationError::IllegalActionLabel {
                    label: action.label.clone(),
                });
            }
            if RESERVED_ACTION_IDS.contains(&action.id.as_str()) {
                return Err(ValidationError::ReservedActionId {
                    id: action.id.clone(),
                });
            }
            if seen.contains(&action.id.as_str()) {
                return Err(ValidationError::DuplicateActionId {
                    id: action.id.clone(),
                });
            }
            seen.push(action.id.as_str());
        }

        if self.reply && !self.actions.is_empty() {
            return Err(ValidationError::ReplyWithActions);
        }

        if self.extra.contains_key("dropdown_label") && self.actions.len() < 2 {
            return Err(ValidationError::DropdownWithoutActions);
        }

        Ok(Message {
            title: self.title,
            text: self.text,
            icon: self.icon,
            timeout: self.timeout,
            actions: self.actions,
            reply: self.reply,
            extra: self.extra,
        })
    }
}

/// Opaque correlation handle returned by `send`, used to match later
/// close/action events and explicit dismissals to a notification.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Reference {
    /// Server-assigned numeric id (bus backend).
    Id(u32),
    /// Locally generated token (subprocess and null backends).
    Token(String),
}

impl Reference {
    pub fn fresh_token() -> Self {
        Self::Token(Uuid::new_v4().to_string())
    }
}

impl Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Token(token) => f.write_str(token),
        }
    }
}

/// Normalized result of a notification, regardless of which backend
/// produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// A user clicked the action with this internal id.
    Action(String),
    Closed,
    /// The user typed a reply directly into the notification.
    Replied(String),
    Timeout,
    /// Activation type reported by a backend that maps to none of the known
    /// outcomes. Passed through raw so nothing is lost.
    Other(String),
}

/// What came back from a send: the issuing backend, the reference, and the
/// outcome once a blocking wait has resolved it.
#[derive(Clone, Debug)]
pub struct Response {
    pub backend: BackendKind,
    pub reference: Reference,
    /// `None` when the caller did not wait, or the wait ended without a
    /// correlated event.
    pub outcome: Option<Outcome>,
}
