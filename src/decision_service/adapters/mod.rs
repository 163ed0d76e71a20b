use std::time::Duration;

use async_trait::async_trait;

use crate::decision_service::{
    error::SessionError,
    types::{DecideOutcome, DecideRequest, ObserveRequest, SessionHandle, Token},
};

pub mod http_agent;

/// Transport to the adaptive decision service.
#[async_trait]
pub trait DecisionBackend: Send + Sync {
    async fn decide(
        &self,
        session: &SessionHandle,
        request: DecideRequest<'_>,
        timeout: Duration,
    ) -> Result<DecideOutcome, SessionError>;

    async fn observe(
        &self,
        session: &SessionHandle,
        request: ObserveRequest<'_>,
        timeout: Duration,
    ) -> Result<Option<Token>, SessionError>;
}
