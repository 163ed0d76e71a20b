use std::{collections::BTreeMap, fmt, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{context::Context, variants::Candidate};

pub type SessionId = String;

pub const DEFAULT_AGENT_URL: &str = "http://localhost:8100";

fn default_agent_url() -> String {
    DEFAULT_AGENT_URL.to_string()
}

fn default_request_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionServiceConfig {
    #[serde(default = "default_agent_url")]
    pub agent_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for DecisionServiceConfig {
    fn default() -> Self {
        Self {
            agent_url: default_agent_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl DecisionServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.max(1))
    }
}

/// Opaque visitor token issued by the decision service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    /// Empty strings are treated as "no token".
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a session is tied to the visitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionIdentity {
    /// Token route: the prior token, absent for first-time visitors.
    Token(Option<Token>),
    /// Stable-identity route: caller-supplied user id.
    User(String),
}

impl SessionIdentity {
    pub fn prior_token(&self) -> Option<&Token> {
        match self {
            SessionIdentity::Token(token) => token.as_ref(),
            SessionIdentity::User(_) => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            SessionIdentity::Token(_) => None,
            SessionIdentity::User(user_id) => Some(user_id.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    pub session_id: SessionId,
    pub identity: SessionIdentity,
}

/// Chosen value per decision slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Decision {
    choices: BTreeMap<String, String>,
}

impl Decision {
    pub fn from_choices<I, K, V>(choices: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            choices: choices
                .into_iter()
                .map(|(slot, value)| (slot.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, slot: &str) -> Option<&str> {
        self.choices.get(slot).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.choices
            .iter()
            .map(|(slot, value)| (slot.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (index, (slot, value)) in self.choices.iter().enumerate() {
            if index > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{slot}: {value:?}")?;
        }
        write!(f, "}}")
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecideRequest<'a> {
    pub context_key: &'a str,
    pub context: &'a Context,
    pub decision_key: &'a str,
    pub candidates: &'a [Candidate],
}

#[derive(Debug, Clone, Copy)]
pub struct ObserveRequest<'a> {
    pub context_key: &'a str,
    pub context: &'a Context,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecideOutcome {
    pub decision: Decision,
    /// Always present on the token route; the stable-identity route may run
    /// without tokens.
    pub token: Option<Token>,
}
