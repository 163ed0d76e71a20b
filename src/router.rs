use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    context::{Context, ContextBuilder},
    decision_service::{
        Session, SessionGateway,
        error::SessionError,
        types::{Decision, SessionIdentity, Token},
    },
    selector::RandomSelector,
    variants::VariantRegistry,
};

pub const CONTEXT_KEY: &str = "UserContext";
pub const DECISION_KEY: &str = "UserDecision";

/// Process-wide experiment setting, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentMode {
    /// The decision service chooses every variant.
    #[default]
    Adaptive,
    /// Variants are drawn locally; the service only observes, so it never
    /// learns from control-trial traffic.
    ControlTrial,
}

impl ExperimentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperimentMode::Adaptive => "adaptive",
            ExperimentMode::ControlTrial => "control_trial",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenUpdate {
    Issued(Token),
    /// Leave whatever the visitor already holds.
    Unchanged,
}

impl TokenUpdate {
    pub fn issued(&self) -> Option<&Token> {
        match self {
            TokenUpdate::Issued(token) => Some(token),
            TokenUpdate::Unchanged => None,
        }
    }
}

impl From<Option<Token>> for TokenUpdate {
    fn from(token: Option<Token>) -> Self {
        token.map_or(TokenUpdate::Unchanged, TokenUpdate::Issued)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedDecision {
    pub mode: ExperimentMode,
    pub decision: Decision,
    pub token: TokenUpdate,
}

pub struct DecisionRouter {
    mode: ExperimentMode,
    registry: Arc<VariantRegistry>,
    gateway: Arc<SessionGateway>,
    context_builder: ContextBuilder,
    selector: RandomSelector,
    request_timeout: Option<Duration>,
}

impl DecisionRouter {
    pub fn new(
        mode: ExperimentMode,
        registry: Arc<VariantRegistry>,
        gateway: Arc<SessionGateway>,
        context_builder: ContextBuilder,
        selector: RandomSelector,
    ) -> Self {
        Self {
            mode,
            registry,
            gateway,
            context_builder,
            selector,
            request_timeout: None,
        }
    }

    /// Overrides the gateway default for both decide and observe calls.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub async fn route(
        &self,
        identity: SessionIdentity,
        user_agent: &str,
    ) -> Result<RoutedDecision, SessionError> {
        let context = self.context_builder.build(user_agent);
        tracing::debug!(
            target: "router",
            user_agent = %user_agent,
            context = %context,
            "context_built"
        );

        let session = self.gateway.open_session(identity);
        tracing::debug!(
            target: "router",
            session_id = %session.handle().session_id,
            mode = self.mode.as_str(),
            "routing_decided"
        );

        let (decision, token) = match self.mode {
            ExperimentMode::Adaptive => self.route_adaptive(&session, &context).await?,
            ExperimentMode::ControlTrial => self.route_control_trial(&session, &context).await,
        };

        tracing::info!(
            target: "router",
            session_id = %session.handle().session_id,
            mode = self.mode.as_str(),
            context = %context,
            decision = %decision,
            token = token.issued().map(Token::as_str).unwrap_or("-"),
            "result_ready"
        );

        Ok(RoutedDecision {
            mode: self.mode,
            decision,
            token,
        })
    }

    async fn route_adaptive(
        &self,
        session: &Session<'_>,
        context: &Context,
    ) -> Result<(Decision, TokenUpdate), SessionError> {
        let outcome = session
            .decide(
                CONTEXT_KEY,
                context,
                DECISION_KEY,
                self.registry.candidates(),
                self.request_timeout,
            )
            .await
            .inspect_err(|err| {
                tracing::error!(
                    target: "router",
                    session_id = %session.handle().session_id,
                    operation = %err.operation,
                    kind = ?err.kind,
                    http_status = ?err.http_status,
                    context = %context,
                    error = %err,
                    "decision_request_failed"
                );
            })?;

        Ok((outcome.decision, outcome.token.into()))
    }

    async fn route_control_trial(
        &self,
        session: &Session<'_>,
        context: &Context,
    ) -> (Decision, TokenUpdate) {
        let token = match session
            .observe(CONTEXT_KEY, context, self.request_timeout)
            .await
        {
            Ok(token) => token.into(),
            Err(err) => {
                tracing::warn!(
                    target: "router",
                    session_id = %session.handle().session_id,
                    operation = %err.operation,
                    kind = ?err.kind,
                    http_status = ?err.http_status,
                    context = %context,
                    error = %err,
                    "observe_failed_token_unchanged"
                );
                TokenUpdate::Unchanged
            }
        };

        let mut choices = Vec::with_capacity(self.registry.candidates().len());
        for candidate in self.registry.candidates() {
            match self.selector.pick(&candidate.values) {
                Some(value) => choices.push((candidate.name.as_str(), value.as_str())),
                None => tracing::warn!(
                    target: "router",
                    slot = %candidate.name,
                    "decision_slot_has_no_values"
                ),
            }
        }

        (Decision::from_choices(choices), token)
    }
}
