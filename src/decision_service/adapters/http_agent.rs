use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    context::Context,
    decision_service::{
        adapters::DecisionBackend,
        error::{SessionError, SessionOperation, map_http_error, protocol_error, service_error},
        types::{
            DecideOutcome, DecideRequest, Decision, DecisionServiceConfig, ObserveRequest,
            SessionHandle, Token,
        },
    },
    variants::Candidate,
};

const DECIDE_PATH: &str = "/v2/decideWithContext";
const OBSERVE_PATH: &str = "/v2/observe";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DecideBody<'a> {
    project_key: &'a str,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amp_token: Option<&'a str>,
    context_name: &'a str,
    context: &'a Context,
    decision_name: &'a str,
    candidates: &'a [Candidate],
    timeout: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ObserveBody<'a> {
    project_key: &'a str,
    session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    amp_token: Option<&'a str>,
    name: &'a str,
    properties: &'a Context,
    timeout: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecideReply {
    decision: BTreeMap<String, Value>,
    #[serde(default)]
    amp_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObserveReply {
    #[serde(default)]
    amp_token: Option<String>,
}

/// Talks to a local decision agent over JSON/HTTP.
#[derive(Clone)]
pub struct HttpAgentBackend {
    client: Client,
    agent_url: String,
    project_key: String,
}

impl HttpAgentBackend {
    pub fn new(config: &DecisionServiceConfig, project_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .context("failed to build decision service http client")?;

        Ok(Self {
            client,
            agent_url: config.agent_url.trim_end_matches('/').to_string(),
            project_key: project_key.into(),
        })
    }

    async fn post<B, R>(
        &self,
        operation: SessionOperation,
        path: &str,
        session: &SessionHandle,
        body: &B,
        timeout: Duration,
    ) -> Result<R, SessionError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.agent_url, path);
        let started_at = Instant::now();
        tracing::debug!(
            target: "decision_service.http_agent",
            operation = operation.as_str(),
            session_id = %session.session_id,
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "agent_dispatch_start"
        );

        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-session-id", session.session_id.as_str())
            .json(body)
            .send()
            .await
            .map_err(|err| {
                tracing::debug!(
                    target: "decision_service.http_agent",
                    operation = operation.as_str(),
                    session_id = %session.session_id,
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    timeout = err.is_timeout(),
                    error = %err,
                    "agent_http_error"
                );
                if err.is_timeout() {
                    service_error(
                        operation,
                        format!("decision service timed out after {}ms", timeout.as_millis()),
                    )
                } else {
                    service_error(operation, format!("decision service unreachable: {err}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(
                target: "decision_service.http_agent",
                operation = operation.as_str(),
                session_id = %session.session_id,
                status = status.as_u16(),
                body_bytes = body.len(),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                "agent_http_non_success"
            );
            return Err(map_http_error(operation, status.as_u16(), &body));
        }

        let bytes = response.bytes().await.map_err(|err| {
            service_error(
                operation,
                format!("failed to read decision service response: {err}"),
            )
        })?;
        tracing::debug!(
            target: "decision_service.http_agent",
            operation = operation.as_str(),
            session_id = %session.session_id,
            status = status.as_u16(),
            body_bytes = bytes.len(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "agent_http_completed"
        );

        serde_json::from_slice(&bytes).map_err(|err| {
            protocol_error(
                operation,
                format!("invalid decision service payload: {err}"),
            )
        })
    }
}

#[async_trait]
impl DecisionBackend for HttpAgentBackend {
    async fn decide(
        &self,
        session: &SessionHandle,
        request: DecideRequest<'_>,
        timeout: Duration,
    ) -> Result<DecideOutcome, SessionError> {
        let body = DecideBody {
            project_key: &self.project_key,
            session_id: &session.session_id,
            user_id: session.identity.user_id(),
            amp_token: session.identity.prior_token().map(Token::as_str),
            context_name: request.context_key,
            context: request.context,
            decision_name: request.decision_key,
            candidates: request.candidates,
            timeout: timeout.as_millis() as u64,
        };
        let reply: DecideReply = self
            .post(SessionOperation::Decide, DECIDE_PATH, session, &body, timeout)
            .await?;

        let mut choices = Vec::with_capacity(reply.decision.len());
        for (slot, value) in reply.decision {
            match value {
                Value::String(text) => choices.push((slot, text)),
                other => {
                    return Err(protocol_error(
                        SessionOperation::Decide,
                        format!("decision for slot '{slot}' is not a string: {other}"),
                    ));
                }
            }
        }

        Ok(DecideOutcome {
            decision: Decision::from_choices(choices),
            token: reply.amp_token.as_deref().and_then(Token::parse),
        })
    }

    async fn observe(
        &self,
        session: &SessionHandle,
        request: ObserveRequest<'_>,
        timeout: Duration,
    ) -> Result<Option<Token>, SessionError> {
        let body = ObserveBody {
            project_key: &self.project_key,
            session_id: &session.session_id,
            user_id: session.identity.user_id(),
            amp_token: session.identity.prior_token().map(Token::as_str),
            name: request.context_key,
            properties: request.context,
            timeout: timeout.as_millis() as u64,
        };
        let reply: ObserveReply = self
            .post(SessionOperation::Observe, OBSERVE_PATH, session, &body, timeout)
            .await?;

        Ok(reply.amp_token.as_deref().and_then(Token::parse))
    }
}
