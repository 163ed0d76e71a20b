use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::{net::TcpListener, sync::oneshot};

use amped::{
    config::IdentityMode,
    context::ContextBuilder,
    decision_service::{
        SessionGateway, adapters::http_agent::HttpAgentBackend, types::DecisionServiceConfig,
    },
    page::PageTemplate,
    router::{DecisionRouter, ExperimentMode},
    selector::{RandomSelector, RandomSource},
    server::{AppState, build_app},
    variants::{Candidate, DONATION_INCENTIVE, VariantRegistry},
};

pub const PAGE: &str = "<html><body><p>{{.DonationIncentive}}</p></body></html>";

/// Scripted stand-in for the decision agent.
pub struct MockAgent {
    pub status: StatusCode,
    pub value: &'static str,
    pub token: Option<&'static str>,
    /// Sent verbatim with a 200 instead of the JSON reply.
    pub raw_body: Option<&'static str>,
    pub delay: Duration,
    pub seen: Mutex<Vec<(&'static str, Value)>>,
}

impl MockAgent {
    pub fn answering(value: &'static str, token: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::OK,
            value,
            token: Some(token),
            raw_body: None,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(value: &'static str, token: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::OK,
            value,
            token: Some(token),
            raw_body: None,
            delay,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn garbled(raw_body: &'static str) -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::OK,
            value: "",
            token: None,
            raw_body: Some(raw_body),
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(status: StatusCode) -> Arc<Self> {
        Arc::new(Self {
            status,
            value: "",
            token: None,
            raw_body: None,
            delay: Duration::ZERO,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self, operation: &str) -> Vec<Value> {
        self.seen
            .lock()
            .iter()
            .filter(|(name, _)| *name == operation)
            .map(|(_, body)| body.clone())
            .collect()
    }
}

/// Records the call, then applies the scripted delay, status or raw body.
async fn scripted_reply(
    agent: &MockAgent,
    operation: &'static str,
    body: Value,
) -> Option<Response> {
    agent.seen.lock().push((operation, body));
    if !agent.delay.is_zero() {
        tokio::time::sleep(agent.delay).await;
    }
    if agent.status != StatusCode::OK {
        return Some((agent.status, "agent unavailable").into_response());
    }
    agent
        .raw_body
        .map(|raw| ([(CONTENT_TYPE, "application/json")], raw).into_response())
}

async fn agent_decide(State(agent): State<Arc<MockAgent>>, Json(body): Json<Value>) -> Response {
    if let Some(response) = scripted_reply(&agent, "decide", body).await {
        return response;
    }
    Json(json!({
        "decision": { "DonationIncentive": agent.value },
        "ampToken": agent.token,
    }))
    .into_response()
}

async fn agent_observe(State(agent): State<Arc<MockAgent>>, Json(body): Json<Value>) -> Response {
    if let Some(response) = scripted_reply(&agent, "observe", body).await {
        return response;
    }
    Json(json!({ "ampToken": agent.token })).into_response()
}

pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

async fn spawn(app: Router) -> RunningServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("ephemeral port should bind");
    let addr = listener.local_addr().expect("listener should have an address");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("test server should run");
    });
    RunningServer {
        addr,
        shutdown: Some(shutdown_tx),
    }
}

pub async fn spawn_agent(agent: Arc<MockAgent>) -> RunningServer {
    let app = Router::new()
        .route("/v2/decideWithContext", post(agent_decide))
        .route("/v2/observe", post(agent_observe))
        .with_state(agent);
    spawn(app).await
}

struct FixedIndex(usize);

impl RandomSource for FixedIndex {
    fn next_index(&self, _len: usize) -> usize {
        self.0
    }
}

/// Starts the page server against `agent`, drawing local values at index 1.
pub async fn spawn_app(
    agent: &RunningServer,
    mode: ExperimentMode,
    identity: IdentityMode,
) -> RunningServer {
    spawn_app_with_timeout(agent, mode, identity, Duration::from_secs(2)).await
}

pub async fn spawn_app_with_timeout(
    agent: &RunningServer,
    mode: ExperimentMode,
    identity: IdentityMode,
    timeout: Duration,
) -> RunningServer {
    let backend = HttpAgentBackend::new(
        &DecisionServiceConfig {
            agent_url: agent.url(""),
            request_timeout_ms: timeout.as_millis() as u64,
        },
        "pk-test",
    )
    .expect("backend should build");
    let gateway = SessionGateway::new(Arc::new(backend), timeout);
    let registry = VariantRegistry::new(vec![Candidate::new(DONATION_INCENTIVE, ["A", "B", "C"])])
        .expect("registry should be valid");
    let selector = RandomSelector::new(Arc::new(FixedIndex(1)));
    let router = DecisionRouter::new(
        mode,
        Arc::new(registry),
        Arc::new(gateway),
        ContextBuilder::new(false, selector.clone()),
        selector,
    );
    let page = PageTemplate::from_source(PAGE).expect("page should parse");

    spawn(build_app(AppState::new(router, identity, page))).await
}
