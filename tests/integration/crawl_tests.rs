//! End-to-end crawls through the HTTP fetcher
//!
//! These tests use wiremock to serve a small site and run the whole
//! config -> orchestrator -> fetcher -> output pipeline against it.

use ripple_crawl::config::{parse_config, Config};
use ripple_crawl::crawler::{self, HttpFetcher, Orchestrator};
use ripple_crawl::output::{
    format_markdown_summary, OutputHandler, RunStatus, SqliteOutputHandler,
};
use ripple_crawl::TaskError;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(format!(
            "<html><head><title>Test</title></head><body>{}</body></html>",
            body
        ))
        .insert_header("content-type", "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// Fast, deterministic settings around the given seed
fn create_test_config(seed: &str, extra: &str) -> Config {
    parse_config(&format!(
        r#"
[crawl]
seeds = ["{}"]
max-depth = 2
{}

[dispatcher]
policy = "semaphore"
max-session-permit = 4

[rate-limit]
base-delay = [0.0, 0.0]
max-delay = 0.1
max-retries = 3

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"
request-timeout = 5.0
"#,
        seed, extra
    ))
    .expect("test config should be valid")
}

async fn serve_site() -> MockServer {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/page1">Page 1</a> <a href="/page2">Page 2</a>"#,
    )
    .await;
    mount_page(&server, "/page1", r#"<a href="/page3">Page 3</a>"#).await;
    mount_page(
        &server,
        "/page2",
        r#"<a href="/">Home</a> <a href="/missing">Gone</a> <a href="https://other.invalid/">Elsewhere</a>"#,
    )
    .await;
    mount_page(&server, "/page3", r#"<a href="/page4">Too deep</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = serve_site().await;
    let base = server.uri();
    let config = create_test_config(&format!("{}/", base), "");

    let report = crawler::crawl(&config).await.unwrap();

    let mut urls: Vec<String> = report.results.iter().map(|r| r.url.clone()).collect();
    urls.sort();
    let mut expected: Vec<String> = ["/", "/missing", "/page1", "/page2", "/page3"]
        .iter()
        .map(|p| format!("{}{}", base, p))
        .collect();
    expected.sort();
    assert_eq!(urls, expected);

    let root = report
        .results
        .iter()
        .find(|r| r.depth == 0)
        .expect("seed result");
    assert!(root.success);
    assert_eq!(root.status_code, Some(200));
    assert_eq!(root.links_found, 2);

    let missing = report
        .results
        .iter()
        .find(|r| r.url.ends_with("/missing"))
        .unwrap();
    assert!(!missing.success);
    assert_eq!(missing.status_code, Some(404));
    assert!(matches!(missing.error, Some(TaskError::Fetch(_))));

    let summary = &report.summary;
    assert_eq!(summary.state.pages_admitted, 5);
    assert_eq!(summary.state.pages_fetched, 4);
    assert_eq!(summary.state.pages_failed, 1);
    assert_eq!(summary.frontier.external_dropped, 1);
    assert!(summary.frontier.duplicates >= 1);
    assert!(summary.frontier.depth_dropped >= 1);
}

#[tokio::test]
async fn test_user_agent_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(wiremock::matchers::header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(html(""))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", server.uri()), "");
    let report = crawler::crawl(&config).await.unwrap();
    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].success);
}

#[tokio::test]
async fn test_rate_limited_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_page(&server, "/", "").await;

    let config = create_test_config(&format!("{}/", server.uri()), "");
    let report = crawler::crawl(&config).await.unwrap();

    let result = &report.results[0];
    assert!(result.success);
    assert_eq!(result.dispatch.attempts, 3);
    assert_eq!(result.dispatch.backoffs.len(), 2);
    assert!(result.dispatch.backoffs[0] <= result.dispatch.backoffs[1]);
    assert!(result
        .dispatch
        .backoffs
        .iter()
        .all(|b| *b <= std::time::Duration::from_millis(100)));
}

#[tokio::test]
async fn test_rate_limit_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = create_test_config(&format!("{}/", server.uri()), "");
    let report = crawler::crawl(&config).await.unwrap();

    let result = &report.results[0];
    assert!(!result.success);
    assert_eq!(result.dispatch.attempts, 4);
    assert!(matches!(
        result.error,
        Some(TaskError::RateLimitExhausted { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_filters_and_page_cap_from_config() {
    let server = serve_site().await;
    let base = server.uri();
    let config = create_test_config(
        &format!("{}/", base),
        r#"max-pages = 2

[[filters]]
kind = "url-pattern"
patterns = ["*/page1*", "*/page3*"]
reverse = true"#,
    );

    let report = crawler::crawl(&config).await.unwrap();

    assert_eq!(report.results.len(), 2);
    assert!(report
        .results
        .iter()
        .all(|r| !r.url.contains("page1") && !r.url.contains("page3")));
    assert_eq!(report.summary.filters.len(), 1);
    assert!(report.summary.filters[0].1.rejected >= 1);
}

#[tokio::test]
async fn test_streamed_results_recorded_to_sqlite() {
    use futures::StreamExt;

    let server = serve_site().await;
    let config = create_test_config(&format!("{}/", server.uri()), "");
    let fetcher = HttpFetcher::new(&config.run_config()).unwrap();
    let orchestrator = Orchestrator::from_config(&config, Arc::new(fetcher)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let mut handler = SqliteOutputHandler::open(&dir.path().join("crawl.db"), "hash").unwrap();

    let mut stream = orchestrator.crawl_stream(&config.crawl.seeds).await.unwrap();
    let mut results = Vec::new();
    while let Some(item) = stream.next().await {
        let result = item.unwrap();
        handler.record_result(&result).unwrap();
        results.push(result);
    }
    let summary = stream.summary().await;
    assert!(summary.is_some());
    handler
        .finalize(summary.as_ref(), RunStatus::Completed)
        .unwrap();

    assert_eq!(handler.count_results().unwrap(), 5);
    assert_eq!(handler.run_status().unwrap(), Some(RunStatus::Completed));

    let markdown = format_markdown_summary(&results, summary.as_ref(), RunStatus::Completed);
    assert!(markdown.contains("## Failed URLs"));
    assert!(markdown.contains("/missing"));
}
