
use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use amped::{
    decision_service::{
        error::{SessionErrorKind, SessionOperation},
        types::{SessionIdentity, Token},
    },
    router::{CONTEXT_KEY, ExperimentMode, TokenUpdate},
    selector::RandomSelector,
    variants::{Candidate, DONATION_INCENTIVE, VariantRegistry},
};

use support::{CountingSource, FixedIndex, MockBackend, router_with};

const MAC_CHROME: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

fn abc_registry() -> VariantRegistry {
    VariantRegistry::new(vec![Candidate::new(DONATION_INCENTIVE, ["A", "B", "C"])])
        .expect("registry should be valid")
}

fn fixed_selector(index: usize) -> RandomSelector {
    RandomSelector::new(Arc::new(FixedIndex(index)))
}

#[tokio::test]
async fn given_adaptive_mode_when_routing_then_only_decide_is_called() {
    let backend = Arc::new(MockBackend::answering("C", "tok-new"));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend.clone(),
        abc_registry(),
        fixed_selector(0),
    );

    let routed = router
        .route(SessionIdentity::Token(None), MAC_CHROME)
        .await
        .expect("adaptive route should succeed");

    assert_eq!(backend.decide_calls(), 1);
    assert_eq!(backend.observe_calls(), 0);
    assert_eq!(routed.decision.get(DONATION_INCENTIVE), Some("C"));
    assert_eq!(routed.token.issued().map(Token::as_str), Some("tok-new"));
    assert_eq!(routed.mode, ExperimentMode::Adaptive);
}

#[tokio::test]
async fn given_control_trial_when_routing_then_observe_only_and_value_is_drawn_locally() {
    let backend = Arc::new(MockBackend::answering("A", "tok-observed"));
    let router = router_with(
        ExperimentMode::ControlTrial,
        backend.clone(),
        abc_registry(),
        fixed_selector(1),
    );

    let routed = router
        .route(SessionIdentity::Token(None), MAC_CHROME)
        .await
        .expect("control trial should succeed");

    assert_eq!(backend.decide_calls(), 0);
    assert_eq!(backend.observe_calls(), 1);
    assert_eq!(routed.decision.get(DONATION_INCENTIVE), Some("B"));
    assert_eq!(routed.token.issued().map(Token::as_str), Some("tok-observed"));
}

#[tokio::test]
async fn given_adaptive_mode_when_routing_then_the_local_source_is_never_drawn() {
    let source = Arc::new(CountingSource::default());
    let backend = Arc::new(MockBackend::answering("A", "tok"));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend,
        abc_registry(),
        RandomSelector::new(source.clone()),
    );

    for _ in 0..5 {
        router
            .route(SessionIdentity::Token(None), MAC_CHROME)
            .await
            .expect("adaptive route should succeed");
    }

    assert_eq!(source.draws.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn given_control_trial_when_routing_then_one_draw_per_slot() {
    let source = Arc::new(CountingSource::default());
    let backend = Arc::new(MockBackend::answering("A", "tok"));
    let registry = VariantRegistry::new(vec![
        Candidate::new(DONATION_INCENTIVE, ["A", "B", "C"]),
        Candidate::new("Headline", ["short", "long"]),
    ])
    .expect("registry should be valid");
    let router = router_with(
        ExperimentMode::ControlTrial,
        backend.clone(),
        registry,
        RandomSelector::new(source.clone()),
    );

    let routed = router
        .route(SessionIdentity::Token(None), MAC_CHROME)
        .await
        .expect("control trial should succeed");

    assert_eq!(source.draws.load(Ordering::SeqCst), 2);
    assert_eq!(routed.decision.get("Headline"), Some("short"));
    assert_eq!(backend.decide_calls(), 0);
}

#[tokio::test]
async fn given_observe_failure_when_control_trial_then_page_still_renders_without_token() {
    let backend = Arc::new(MockBackend::failing(503));
    let router = router_with(
        ExperimentMode::ControlTrial,
        backend.clone(),
        abc_registry(),
        fixed_selector(2),
    );

    let routed = router
        .route(SessionIdentity::Token(Token::parse("tok-old")), MAC_CHROME)
        .await
        .expect("observe failures are absorbed");

    assert_eq!(backend.observe_calls(), 1);
    assert_eq!(routed.decision.get(DONATION_INCENTIVE), Some("C"));
    assert_eq!(routed.token, TokenUpdate::Unchanged);
}

#[tokio::test]
async fn given_decide_failure_when_adaptive_then_error_propagates() {
    let backend = Arc::new(MockBackend::failing(500));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend.clone(),
        abc_registry(),
        fixed_selector(0),
    );

    let err = router
        .route(SessionIdentity::Token(None), MAC_CHROME)
        .await
        .expect_err("decide failure must surface");

    assert_eq!(err.kind, SessionErrorKind::Service);
    assert_eq!(err.operation, SessionOperation::Decide);
    assert_eq!(err.http_status, Some(500));
    assert_eq!(backend.observe_calls(), 0);
}

#[tokio::test]
async fn given_out_of_list_value_when_adaptive_then_protocol_error() {
    let backend = Arc::new(MockBackend::answering("Z", "tok-new"));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend,
        abc_registry(),
        fixed_selector(0),
    );

    let err = router
        .route(SessionIdentity::Token(None), MAC_CHROME)
        .await
        .expect_err("unknown value must be rejected");
    assert_eq!(err.kind, SessionErrorKind::Protocol);
}

#[tokio::test]
async fn given_prior_token_when_routing_then_it_is_forwarded_with_context() {
    let backend = Arc::new(MockBackend::answering("A", "tok-2"));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend.clone(),
        abc_registry(),
        fixed_selector(0),
    )
    .with_request_timeout(Duration::from_millis(300));

    router
        .route(SessionIdentity::Token(Token::parse("tok-1")), MAC_CHROME)
        .await
        .expect("route should succeed");

    let calls = backend.calls.lock();
    let call = &calls.decide[0];
    assert_eq!(
        call.handle.identity.prior_token().map(Token::as_str),
        Some("tok-1")
    );
    assert_eq!(call.context_key, CONTEXT_KEY);
    assert_eq!(call.timeout, Duration::from_millis(300));
    assert!(call.context.contains("Mobile: false"), "{}", call.context);
    assert!(call.context.contains(r#"Platform: "Macintosh""#), "{}", call.context);
    assert!(call.context.contains(r#"Browser: "Chrome""#), "{}", call.context);
}

#[tokio::test]
async fn given_user_id_identity_when_routing_then_user_id_reaches_the_backend() {
    let backend = Arc::new(MockBackend::answering("B", ""));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend.clone(),
        abc_registry(),
        fixed_selector(0),
    );

    let routed = router
        .route(SessionIdentity::User("visitor-42".to_string()), MAC_CHROME)
        .await
        .expect("stable identity runs without tokens");

    assert_eq!(routed.token, TokenUpdate::Unchanged);
    let calls = backend.calls.lock();
    assert_eq!(calls.decide[0].handle.identity.user_id(), Some("visitor-42"));
}

#[tokio::test]
async fn given_many_requests_when_routing_then_each_gets_a_fresh_session() {
    let backend = Arc::new(MockBackend::answering("A", "tok"));
    let router = router_with(
        ExperimentMode::Adaptive,
        backend.clone(),
        abc_registry(),
        fixed_selector(0),
    );

    for _ in 0..3 {
        router
            .route(SessionIdentity::Token(None), "")
            .await
            .expect("route should succeed");
    }

    let calls = backend.calls.lock();
    let mut ids: Vec<_> = calls
        .decide
        .iter()
        .map(|call| call.handle.session_id.clone())
        .collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
