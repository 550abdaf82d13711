//! Fetcher and session tests against a live mock server

use crate::common;
use search_harvest::crawler::{
    CrawlSession, ErrorTag, FetchRequest, FetchStatus, Fetcher, RetryPolicy, SessionOptions,
};
use search_harvest::document::Normalizer;
use search_harvest::{DocumentFormat, HarvestError, Source};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn no_wait(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        backoff: Duration::ZERO,
    }
}

#[tokio::test]
async fn test_fetch_returns_body_and_final_url() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/end"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/end"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>done</p>"))
        .mount(&mock_server)
        .await;

    let outcome = common::fetcher()
        .fetch(&FetchRequest::get(format!("{}/start", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(outcome.status, FetchStatus::Http(200));
    assert_eq!(outcome.body.as_deref(), Some(&b"<p>done</p>"[..]));
    assert_eq!(outcome.final_url.unwrap().path(), "/end");
}

#[tokio::test]
async fn test_redirect_loop_single_shot() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&mock_server)
        .await;

    let outcome = common::fetcher()
        .fetch(&FetchRequest::get(format!("{}/loop", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(outcome.status, FetchStatus::Error(ErrorTag::TooManyRedirects));
    assert!(outcome.body.is_none());
}

#[tokio::test]
async fn test_redirect_loop_exhausts_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/loop"))
        .mount(&mock_server)
        .await;

    let request = FetchRequest::get(format!("{}/loop", mock_server.uri())).with_retry(no_wait(2));
    let result = common::fetcher().fetch(&request).await;

    assert!(matches!(
        result,
        Err(HarvestError::Connectivity {
            attempts: 2,
            last: ErrorTag::TooManyRedirects,
            ..
        })
    ));
}

#[tokio::test]
async fn test_timeout_is_tagged() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let session = CrawlSession::new(&SessionOptions {
        timeout: Duration::from_millis(200),
        ..SessionOptions::default()
    })
    .unwrap();
    let fetcher = Fetcher::new(Arc::new(session));

    let outcome = fetcher
        .fetch(&FetchRequest::get(mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.status, FetchStatus::Error(ErrorTag::Timeout));
}

#[tokio::test]
async fn test_refused_connection_single_shot() {
    let outcome = common::fetcher()
        .fetch(&FetchRequest::get(common::refused_url("/")))
        .await
        .unwrap();

    assert_eq!(outcome.status, FetchStatus::Error(ErrorTag::ConnectionError));
}

#[tokio::test]
async fn test_cookies_shared_across_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "session=abc; Path=/"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/account"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/account"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let fetcher = common::fetcher();
    fetcher
        .fetch(&FetchRequest::get(format!("{}/login", mock_server.uri())))
        .await
        .unwrap();
    let outcome = fetcher
        .fetch(&FetchRequest::get(format!("{}/account", mock_server.uri())))
        .await
        .unwrap();

    assert_eq!(outcome.status, FetchStatus::Http(200));
}

#[tokio::test]
async fn test_user_agent_is_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("user-agent", "HarvestBot/2.0"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let session = CrawlSession::new(&SessionOptions {
        user_agent: "HarvestBot/2.0".to_string(),
        ..SessionOptions::default()
    })
    .unwrap();
    let outcome = Fetcher::new(Arc::new(session))
        .fetch(&FetchRequest::get(mock_server.uri()))
        .await
        .unwrap();

    assert_eq!(outcome.status, FetchStatus::Http(200));
}

#[tokio::test]
async fn test_normalizer_fetches_url_source() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><div class="hit"><a href="next">n</a></div></body></html>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let normalizer = Normalizer::new(common::fetcher());
    let source = Source::guess(&format!("{}/page", mock_server.uri()));
    let document = normalizer.parse(source, DocumentFormat::Html).await.unwrap();

    assert!(!document.is_empty());
    assert_eq!(
        document.base_url().unwrap().as_str(),
        format!("{}/page", mock_server.uri())
    );
}

#[tokio::test]
async fn test_normalizer_missing_path() {
    let normalizer = Normalizer::new(common::fetcher());
    let result = normalizer
        .parse(Source::guess("/no/such/page.html"), DocumentFormat::Html)
        .await;

    assert!(matches!(result, Err(HarvestError::NotFound { .. })));
}
