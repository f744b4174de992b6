//! Integration Tests - End-to-end Pipeline Behaviour
//!
//! Drives `BatchPipeline` and `PipelineTrigger` against mocked ports.
//! Uses mockall for trait mocking and paused tokio time so retry
//! backoff and inter-item pacing cost nothing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;
use serde_json::{json, Value};

use crypto_briefing_bot::domain::Prompt;
use crypto_briefing_bot::ports::{Analyst, DataRequest, DataSource, Delivery, RunTrigger};
use crypto_briefing_bot::resilience::{CallError, CircuitBreaker, ResilientDependency, RetryPolicy};
use crypto_briefing_bot::usecases::{
    BatchPipeline, ChunkedEmitter, Dependencies, PipelineError, PipelineSettings, PipelineTrigger,
};

// ---- Mock Definitions ----

mock! {
    pub Source {}

    #[async_trait::async_trait]
    impl DataSource for Source {
        async fn fetch(&self, request: &DataRequest) -> Result<Value, CallError>;
    }
}

mock! {
    pub Llm {}

    #[async_trait::async_trait]
    impl Analyst for Llm {
        async fn complete(&self, prompt: &Prompt) -> Result<String, CallError>;
    }
}

mock! {
    pub Sink {}

    #[async_trait::async_trait]
    impl Delivery for Sink {
        fn max_message_chars(&self) -> usize;
        async fn send(&self, destination: &str, text: &str) -> Result<(), CallError>;
    }
}

// ---- Fixtures ----

const COINS: [&str; 5] = ["bitcoin", "ethereum", "solana", "ripple", "cardano"];

const SENTIMENT_ANSWER: &str =
    r#"{"score": 0.4, "label": "bullish", "summary": "ETF inflows dominate."}"#;

fn coin_of(request: &DataRequest) -> Option<String> {
    request
        .query
        .iter()
        .find(|(k, _)| k == "ids")
        .map(|(_, v)| v.clone())
}

fn market_payload(coin: &str) -> Value {
    json!([{
        "id": coin,
        "symbol": &coin[..3],
        "name": coin,
        "current_price": 100.0,
        "price_change_percentage_24h": 2.5,
        "total_volume": 1.0e9,
        "market_cap": 2.0e10,
        "high_24h": 104.0,
        "low_24h": 97.0
    }])
}

fn news_payload() -> Value {
    json!({
        "results": [
            {"title": "Spot ETF sees record inflows", "source": {"title": "CoinDesk"}},
            {"title": "Exchange hacked", "source": {"title": "The Block"}}
        ]
    })
}

fn guard(name: &str, threshold: u32) -> ResilientDependency {
    ResilientDependency::new(
        name,
        RetryPolicy::exponential(3, Duration::from_millis(100)),
        CircuitBreaker::new(name, threshold, Duration::from_secs(60)),
        None,
    )
}

fn dependencies(market_threshold: u32) -> Dependencies {
    Dependencies {
        market: guard("market", market_threshold),
        news: guard("news", 5),
        llm: guard("llm", 5),
    }
}

fn settings(coins: &[&str]) -> PipelineSettings {
    PipelineSettings {
        coins: coins.iter().map(|c| c.to_string()).collect(),
        vs_currency: "usd".to_string(),
        inter_item_delay: Duration::from_millis(600),
        max_headlines: 20,
        destination: "chat-42".to_string(),
        market_url: "http://market.test".to_string(),
        news_url: "http://news.test/posts/".to_string(),
        news_api_key: None,
    }
}

/// Source serving news and market data, failing market calls for `failing`.
fn source(failing: &'static [&'static str], market_calls: Arc<AtomicUsize>) -> MockSource {
    let mut source = MockSource::new();
    source.expect_fetch().returning(move |request| {
        if request.dependency == "news" {
            return Ok(news_payload());
        }
        market_calls.fetch_add(1, Ordering::SeqCst);
        let coin = coin_of(request).unwrap_or_default();
        if failing.iter().any(|f| *f == coin) {
            Err(CallError::transport("market", Some(503), "upstream unavailable"))
        } else {
            Ok(market_payload(&coin))
        }
    });
    source
}

/// Analyst answering the sentiment prompt with `sentiment` and every
/// analysis prompt with a short briefing.
fn analyst(sentiment: &'static str) -> MockLlm {
    let mut llm = MockLlm::new();
    llm.expect_complete().returning(move |prompt| {
        if prompt.user.starts_with("Headlines:") {
            Ok(sentiment.to_string())
        } else {
            Ok("Trend up, bias: long above 98.".to_string())
        }
    });
    llm
}

/// Sink recording every delivered text; texts containing `reject` fail.
fn sink(sent: Arc<Mutex<Vec<String>>>, reject: Option<&'static str>) -> MockSink {
    let mut sink = MockSink::new();
    sink.expect_max_message_chars().return_const(4096usize);
    sink.expect_send().returning(move |_destination, text| {
        if reject.is_some_and(|r| text.contains(r)) {
            return Err(CallError::transport("delivery", Some(400), "rejected"));
        }
        sent.lock().unwrap().push(text.to_string());
        Ok(())
    });
    sink
}

fn pipeline(
    source: MockSource,
    analyst: MockLlm,
    sink: MockSink,
    deps: Dependencies,
    coins: &[&str],
) -> BatchPipeline<MockSource, MockLlm, MockSink> {
    let emitter = ChunkedEmitter::new(
        Arc::new(sink),
        ResilientDependency::new(
            "delivery",
            RetryPolicy::linear(2, Duration::from_millis(100)),
            CircuitBreaker::with_defaults("delivery"),
            None,
        ),
        3900,
        Duration::from_millis(250),
    );
    BatchPipeline::new(Arc::new(source), Arc::new(analyst), emitter, deps, settings(coins))
}

// ---- Integration Tests ----

#[tokio::test(start_paused = true)]
async fn test_failed_item_is_isolated_and_order_preserved() {
    let market_calls = Arc::new(AtomicUsize::new(0));
    let sent = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        source(&["solana"], Arc::clone(&market_calls)),
        analyst(SENTIMENT_ANSWER),
        sink(Arc::clone(&sent), None),
        dependencies(5),
        &COINS,
    );

    let result = tokio_test::assert_ok!(pipeline.run().await);

    assert_eq!(result.succeeded(), vec!["bitcoin", "ethereum", "ripple", "cardano"]);
    assert_eq!(result.failed(), vec!["solana"]);
    assert!(!result.overall_ok());
    let cause = result.failures().next().and_then(|f| f.error.clone()).unwrap();
    assert!(cause.contains("market"), "cause: {cause}");

    // Four coins fetched once, solana exhausted its three attempts.
    assert_eq!(market_calls.load(Ordering::SeqCst), 4 + 3);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 5, "four reports and one summary");
    assert!(sent[0].contains("bitcoin"));
    assert!(sent[3].contains("cardano"));
    assert!(sent[4].contains("solana: "));
    assert!(!result.sentiment.degraded);
}

#[tokio::test(start_paused = true)]
async fn test_news_failure_is_fatal_and_processes_no_items() {
    let news_calls = Arc::new(AtomicUsize::new(0));
    let market_calls = Arc::new(AtomicUsize::new(0));
    let mut source = MockSource::new();
    {
        let news_calls = Arc::clone(&news_calls);
        let market_calls = Arc::clone(&market_calls);
        source.expect_fetch().returning(move |request| {
            if request.dependency == "news" {
                news_calls.fetch_add(1, Ordering::SeqCst);
                Err(CallError::transport("news", None, "connection refused"))
            } else {
                market_calls.fetch_add(1, Ordering::SeqCst);
                Ok(market_payload("bitcoin"))
            }
        });
    }
    let mut llm = MockLlm::new();
    llm.expect_complete().never();
    let sent = Arc::new(Mutex::new(Vec::new()));

    let pipeline = pipeline(source, llm, sink(Arc::clone(&sent), None), dependencies(5), &COINS);

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Fatal { stage: "news", .. }));
    assert_eq!(news_calls.load(Ordering::SeqCst), 3);
    assert_eq!(market_calls.load(Ordering::SeqCst), 0);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("aborted during news"));
}

#[tokio::test(start_paused = true)]
async fn test_unparsable_sentiment_degrades_to_neutral() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        source(&[], Arc::new(AtomicUsize::new(0))),
        analyst("Sorry, I can only answer in prose today."),
        sink(Arc::clone(&sent), None),
        dependencies(5),
        &["bitcoin", "ethereum"],
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.overall_ok());
    assert!(result.sentiment.degraded);
    assert_eq!(result.sentiment.score, 0.0);
    assert!(sent.lock().unwrap().last().unwrap().contains("[fallback]"));
}

#[tokio::test(start_paused = true)]
async fn test_summary_delivery_failure_does_not_change_result() {
    let sent = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        source(&[], Arc::new(AtomicUsize::new(0))),
        analyst(SENTIMENT_ANSWER),
        sink(Arc::clone(&sent), Some("Briefing run complete")),
        dependencies(5),
        &["bitcoin", "ethereum"],
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.overall_ok());
    assert_eq!(result.succeeded(), vec!["bitcoin", "ethereum"]);
    assert_eq!(sent.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_market_breaker_opens_across_items() {
    let coins = ["bitcoin", "ethereum", "solana", "ripple", "cardano", "polkadot"];
    let market_calls = Arc::new(AtomicUsize::new(0));
    let sent = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        source(
            &["bitcoin", "ethereum", "solana", "ripple", "cardano", "polkadot"],
            Arc::clone(&market_calls),
        ),
        analyst(SENTIMENT_ANSWER),
        sink(Arc::clone(&sent), None),
        dependencies(5),
        &coins,
    );

    let result = pipeline.run().await.unwrap();

    assert!(result.succeeded().is_empty());
    assert_eq!(result.failed().len(), 6);
    // Five exhausted retry loops trip the breaker; the sixth coin is refused.
    assert_eq!(market_calls.load(Ordering::SeqCst), 5 * 3);
    let last = result.outcomes.last().and_then(|o| o.error.clone()).unwrap();
    assert!(last.contains("circuit breaker is open"), "last: {last}");

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("failed for every coin"));
}

#[tokio::test(start_paused = true)]
async fn test_trigger_returns_summary_for_fatal_run() {
    let mut source = MockSource::new();
    source
        .expect_fetch()
        .returning(|_| Err(CallError::transport("news", Some(500), "boom")));
    let mut llm = MockLlm::new();
    llm.expect_complete().never();
    let sent = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(source, llm, sink(sent, None), dependencies(5), &COINS);

    let trigger = PipelineTrigger::new(Arc::new(pipeline));
    let summary = trigger.run_once().await;

    assert!(!summary.ok);
    assert!(summary.run_id.is_none());
    assert!(summary.succeeded.is_empty());
    assert!(summary.error.unwrap().contains("news"));
}

/// Data source that takes a second per call and tracks overlap.
#[derive(Default)]
struct SlowSource {
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl DataSource for SlowSource {
    async fn fetch(&self, request: &DataRequest) -> Result<Value, CallError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if request.dependency == "news" {
            Ok(news_payload())
        } else {
            Ok(market_payload(&coin_of(request).unwrap_or_default()))
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_triggers_do_not_overlap() {
    let source = Arc::new(SlowSource::default());
    let sent = Arc::new(Mutex::new(Vec::new()));
    let emitter = ChunkedEmitter::new(
        Arc::new(sink(Arc::clone(&sent), None)),
        guard("delivery", 5),
        3900,
        Duration::from_millis(250),
    );
    let pipeline = BatchPipeline::new(
        Arc::clone(&source),
        Arc::new(analyst(SENTIMENT_ANSWER)),
        emitter,
        dependencies(5),
        settings(&["bitcoin", "ethereum"]),
    );
    let trigger = Arc::new(PipelineTrigger::new(Arc::new(pipeline)));

    let (a, b) = tokio::join!(trigger.run_once(), trigger.run_once());

    assert!(a.ok && b.ok);
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(source.calls.load(Ordering::SeqCst), 2 * 3);
    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    assert!(!trigger.is_running());
    // Two reports and one summary per run.
    assert_eq!(sent.lock().unwrap().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_items_are_paced_by_inter_item_delay() {
    let fetched: Arc<Mutex<Vec<(String, tokio::time::Instant)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut source = MockSource::new();
    {
        let fetched = Arc::clone(&fetched);
        source.expect_fetch().returning(move |request| {
            let label = coin_of(request).unwrap_or_else(|| request.dependency.to_string());
            fetched.lock().unwrap().push((label, tokio::time::Instant::now()));
            if request.dependency == "news" {
                Ok(news_payload())
            } else {
                Ok(market_payload(&coin_of(request).unwrap_or_default()))
            }
        });
    }
    let sent = Arc::new(Mutex::new(Vec::new()));
    let pipeline = pipeline(
        source,
        analyst(SENTIMENT_ANSWER),
        sink(Arc::clone(&sent), None),
        dependencies(5),
        &["bitcoin", "ethereum", "solana"],
    );

    let result = pipeline.run().await.unwrap();
    assert!(result.overall_ok());

    let fetched = fetched.lock().unwrap();
    let labels: Vec<&str> = fetched.iter().map(|(l, _)| l.as_str()).collect();
    assert_eq!(labels, vec!["news", "bitcoin", "ethereum", "solana"]);

    let delay = Duration::from_millis(600);
    // The first item starts straight after the shared stages.
    assert!(fetched[1].1 - fetched[0].1 < delay);
    for pair in fetched[1..].windows(2) {
        assert!(pair[1].1 - pair[0].1 >= delay, "{} followed {} too soon", pair[1].0, pair[0].0);
    }
}
