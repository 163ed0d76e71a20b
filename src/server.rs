use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Query, State},
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, USER_AGENT,
        },
    },
    middleware,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tokio::{
    net::TcpListener,
    signal::unix::{SignalKind, signal},
};
use tracing::Instrument;

use crate::{
    config::{Config, IdentityMode},
    context::ContextBuilder,
    cookie::TokenCookieStore,
    decision_service::{
        SessionGateway, adapters::http_agent::HttpAgentBackend, types::SessionIdentity,
    },
    error::ServeError,
    page::PageTemplate,
    router::DecisionRouter,
    selector::RandomSelector,
    variants::VariantRegistry,
};

const USER_ID_PARAM: &str = "user_id";

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppInner>,
}

struct AppInner {
    router: DecisionRouter,
    identity: IdentityMode,
    cookies: TokenCookieStore,
    page: PageTemplate,
}

impl AppState {
    pub fn new(router: DecisionRouter, identity: IdentityMode, page: PageTemplate) -> Self {
        Self {
            inner: Arc::new(AppInner {
                router,
                identity,
                cookies: TokenCookieStore::default(),
                page,
            }),
        }
    }

    /// Wires the production collaborators. The random source is created here,
    /// once per process, and shared by the context builder and the router.
    pub fn from_config(config: &Config) -> Result<Self> {
        let selector = RandomSelector::from_clock();
        let backend = HttpAgentBackend::new(&config.decision_service, config.project_key.clone())?;
        let gateway = SessionGateway::new(
            Arc::new(backend),
            config.decision_service.request_timeout(),
        );
        let router = DecisionRouter::new(
            config.experiment.mode,
            Arc::new(VariantRegistry::donation_incentives()),
            Arc::new(gateway),
            ContextBuilder::new(config.experiment.decoy_context, selector.clone()),
            selector,
        );
        let page = PageTemplate::load(&config.server.template_path)?;

        Ok(Self::new(router, config.identity, page))
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/",
            get(serve_page).post(serve_page).options(answer_preflight),
        )
        .route("/healthz", get(healthz))
        .layer(middleware::map_response(apply_cors_headers))
        .with_state(state)
}

pub async fn run(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("unable to bind {}", config.server.listen_addr))?;

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let shutdown = async move {
        let signal_name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        tracing::info!(target: "server", signal = signal_name, "shutdown_requested");
    };

    tracing::info!(
        target: "server",
        listen_addr = %config.server.listen_addr,
        mode = config.experiment.mode.as_str(),
        identity = ?config.identity,
        decoy_context = config.experiment.decoy_context,
        agent_url = %config.decision_service.agent_url,
        "server_listening"
    );

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server failed")?;

    tracing::info!(target: "server", "server_stopped");
    Ok(())
}

async fn serve_page(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Result<Response, ServeError> {
    let span = tracing::info_span!(target: "server", "page_request", identity = ?state.inner.identity);
    render_decision(&state, &query, &headers).instrument(span).await
}

async fn render_decision(
    state: &AppState,
    query: &HashMap<String, String>,
    headers: &HeaderMap,
) -> Result<Response, ServeError> {
    let app = &state.inner;
    let identity = match app.identity {
        IdentityMode::Token => SessionIdentity::Token(app.cookies.read(headers)),
        IdentityMode::UserId => {
            let user_id = query
                .get(USER_ID_PARAM)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| {
                    tracing::warn!(target: "server", field = USER_ID_PARAM, "request_validation_failed");
                    ServeError::missing_field(USER_ID_PARAM)
                })?;
            SessionIdentity::User(user_id.to_string())
        }
    };

    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let routed = app.router.route(identity, user_agent).await?;

    let mut response_headers = HeaderMap::new();
    if app.identity == IdentityMode::Token
        && let Some(token) = routed.token.issued()
        && let Err(err) = app.cookies.write(&mut response_headers, token)
    {
        // Same outcome as a failed token update: the visitor keeps the old cookie.
        tracing::warn!(
            target: "server",
            mode = routed.mode.as_str(),
            error = %err,
            "token_cookie_skipped"
        );
    }

    let body = app.page.render(&routed.decision);
    Ok((StatusCode::OK, response_headers, Html(body)).into_response())
}

async fn answer_preflight() -> &'static str {
    "OK"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn apply_cors_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, GET, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Accept, Accept-Language, Content-Language, Content-Type"),
    );
    response
}
