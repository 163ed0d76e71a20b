use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    context::Context,
    decision_service::{
        adapters::DecisionBackend,
        error::{SessionError, SessionOperation, protocol_error},
        types::{
            DecideOutcome, DecideRequest, ObserveRequest, SessionHandle, SessionIdentity, Token,
        },
    },
    variants::Candidate,
};

/// Entry point to the decision service. Holds no per-visitor state; every
/// request opens its own [`Session`].
pub struct SessionGateway {
    backend: Arc<dyn DecisionBackend>,
    default_timeout: Duration,
}

impl SessionGateway {
    pub fn new(backend: Arc<dyn DecisionBackend>, default_timeout: Duration) -> Self {
        Self {
            backend,
            default_timeout,
        }
    }

    pub fn open_session(&self, identity: SessionIdentity) -> Session<'_> {
        let handle = SessionHandle {
            session_id: Uuid::new_v4().simple().to_string(),
            identity,
        };
        tracing::debug!(
            target: "decision_service.gateway",
            session_id = %handle.session_id,
            has_prior_token = handle.identity.prior_token().is_some(),
            has_user_id = handle.identity.user_id().is_some(),
            "session_opened"
        );
        Session {
            gateway: self,
            handle,
        }
    }
}

pub struct Session<'g> {
    gateway: &'g SessionGateway,
    handle: SessionHandle,
}

impl Session<'_> {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    fn expects_token(&self) -> bool {
        matches!(self.handle.identity, SessionIdentity::Token(_))
    }

    /// Asks the service to choose a value for every candidate slot.
    pub async fn decide(
        &self,
        context_key: &str,
        context: &Context,
        decision_key: &str,
        candidates: &[Candidate],
        timeout: Option<Duration>,
    ) -> Result<DecideOutcome, SessionError> {
        let request = DecideRequest {
            context_key,
            context,
            decision_key,
            candidates,
        };
        let timeout = timeout.unwrap_or(self.gateway.default_timeout);
        let outcome = self
            .gateway
            .backend
            .decide(&self.handle, request, timeout)
            .await?;

        for candidate in candidates {
            match outcome.decision.get(&candidate.name) {
                Some(value) if candidate.contains(value) => {}
                Some(value) => {
                    return Err(protocol_error(
                        SessionOperation::Decide,
                        format!(
                            "decision for slot '{}' is not a candidate value: {value:?}",
                            candidate.name
                        ),
                    ));
                }
                None => {
                    return Err(protocol_error(
                        SessionOperation::Decide,
                        format!("decision is missing slot '{}'", candidate.name),
                    ));
                }
            }
        }
        if self.expects_token() && outcome.token.is_none() {
            return Err(protocol_error(
                SessionOperation::Decide,
                "decision response carried no token",
            ));
        }

        Ok(outcome)
    }

    /// Records the context without asking for a decision.
    pub async fn observe(
        &self,
        context_key: &str,
        context: &Context,
        timeout: Option<Duration>,
    ) -> Result<Option<Token>, SessionError> {
        let request = ObserveRequest {
            context_key,
            context,
        };
        let timeout = timeout.unwrap_or(self.gateway.default_timeout);
        let token = self
            .gateway
            .backend
            .observe(&self.handle, request, timeout)
            .await?;

        if self.expects_token() && token.is_none() {
            return Err(protocol_error(
                SessionOperation::Observe,
                "observe response carried no token",
            ));
        }

        Ok(token)
    }
}
