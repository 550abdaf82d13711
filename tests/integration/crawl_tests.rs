//! End-to-end batch crawl tests

use crate::common::{self, bad_cert, refused, Scripted};
use search_harvest::crawler::{BatchCrawler, ErrorTag, FetchStatus, Fetcher, Method, WorkItem};
use search_harvest::{ExtractionPattern, HarvestError, ResultRecord};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sku1() -> Vec<WorkItem> {
    vec![WorkItem::new("abc", "SKU1")]
}

fn record(status: u16) -> ResultRecord {
    ResultRecord {
        identifier: "SKU1".to_string(),
        key: "abc".to_string(),
        status: FetchStatus::Http(status),
        extracted_link: None,
    }
}

#[tokio::test]
async fn test_scripted_success_scenario() {
    let transport = Scripted::always(Ok(200));
    let crawler = BatchCrawler::with_fetcher(
        Fetcher::new(transport.clone()),
        common::plan("https://example.test/search?q=XXXX"),
    );

    let records = crawler.run(&sku1()).await.unwrap();

    assert_eq!(records, vec![record(200)]);
    let seen = transport.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].url.as_str(), "https://example.test/search?q=abc");
}

#[tokio::test]
async fn test_scripted_connection_loss_scenario() {
    for max_retries in [1, 3, 5] {
        let transport = Scripted::always(Err(refused()));
        let mut plan = common::plan("https://example.test/search?q=XXXX");
        plan.max_retries = max_retries;
        let crawler = BatchCrawler::with_fetcher(Fetcher::new(transport.clone()), plan);

        let result = crawler.run(&sku1()).await;

        match result {
            Err(HarvestError::Connectivity { attempts, last, .. }) => {
                assert_eq!(attempts, max_retries);
                assert_eq!(last, ErrorTag::ConnectionError);
            }
            other => panic!("expected Connectivity, got {:?}", other),
        }
        assert_eq!(transport.seen().len(), max_retries as usize);
    }
}

#[tokio::test]
async fn test_scripted_tls_fallback_keeps_budget() {
    let transport = Scripted::new(vec![Err(bad_cert())], Ok(200), "<html></html>");
    let mut plan = common::plan("https://example.test/search?q=XXXX");
    plan.max_retries = 1;
    let crawler = BatchCrawler::with_fetcher(Fetcher::new(transport.clone()), plan);

    let records = crawler.run(&sku1()).await.unwrap();

    assert_eq!(records, vec![record(200)]);
    let seen = transport.seen();
    assert_eq!(seen.len(), 2);
    assert!(!seen[0].insecure);
    assert!(seen[1].insecure);
}

#[tokio::test]
async fn test_search_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>ok</body></html>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/search?q=XXXX", mock_server.uri());
    let crawler = BatchCrawler::new(&common::session(), common::plan(&template)).unwrap();

    let records = crawler.run(&sku1()).await.unwrap();
    assert_eq!(records, vec![record(200)]);
}

#[tokio::test]
async fn test_search_not_found_completes() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/search?q=XXXX", mock_server.uri());
    let crawler = BatchCrawler::new(&common::session(), common::plan(&template)).unwrap();

    let records = crawler.run(&sku1()).await.unwrap();
    assert_eq!(records, vec![record(404)]);
}

#[tokio::test]
async fn test_unreachable_host_aborts_run() {
    let template = common::refused_url("/search?q=XXXX");
    let mut plan = common::plan(&template);
    plan.max_retries = 2;
    let crawler = BatchCrawler::new(&common::session(), plan).unwrap();

    let items = vec![WorkItem::new("abc", "SKU1"), WorkItem::new("def", "SKU2")];
    let result = crawler.run(&items).await;

    assert!(matches!(
        result,
        Err(HarvestError::Connectivity { attempts: 2, .. })
    ));
    let host = crawler.fetcher().gate().host_state("127.0.0.1").unwrap();
    assert_eq!(host.request_count, 2);
}

#[tokio::test]
async fn test_default_domain_header() {
    let mock_server = MockServer::start().await;
    let domain = mock_server.uri().trim_start_matches("http://").to_string();

    Mock::given(method("GET"))
        .and(header("domain", domain.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/search?q=XXXX", mock_server.uri());
    let crawler = BatchCrawler::new(&common::session(), common::plan(&template)).unwrap();

    let records = crawler.run(&sku1()).await.unwrap();
    assert_eq!(records[0].status, FetchStatus::Http(200));
}

#[tokio::test]
async fn test_custom_headers_replace_domain_header() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(header("cookie", "region=eu"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let template = format!("{}/search?q=XXXX", mock_server.uri());
    let mut plan = common::plan(&template);
    plan.headers
        .insert("cookie".to_string(), "region=eu".to_string());
    let session = common::session();
    let crawler = BatchCrawler::new(&session, plan).unwrap();

    let records = crawler.run(&sku1()).await.unwrap();
    assert_eq!(records[0].status, FetchStatus::Http(200));
    assert!(session.headers().is_empty());
}

#[tokio::test]
async fn test_post_search() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_string_contains("keywords=abc"))
        .and(body_string_contains("submit=Search"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut plan = common::plan(&format!("{}/search", mock_server.uri()));
    plan.use_post = true;
    let crawler = BatchCrawler::new(&common::session(), plan).unwrap();

    let records = crawler.run(&sku1()).await.unwrap();
    assert_eq!(records, vec![record(200)]);
}

#[tokio::test]
async fn test_post_connection_error_is_recorded() {
    let transport = Scripted::always(Err(refused()));
    let mut plan = common::plan("https://example.test/search");
    plan.use_post = true;
    let crawler = BatchCrawler::with_fetcher(Fetcher::new(transport.clone()), plan);

    let records = crawler.run(&sku1()).await.unwrap();

    assert_eq!(
        records[0].status,
        FetchStatus::Error(ErrorTag::ConnectionError)
    );
    assert_eq!(transport.seen().len(), 1);
    assert_eq!(transport.seen()[0].method, Method::Post);
}

#[tokio::test]
async fn test_redirect_not_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut plan = common::plan(&format!("{}/search?q=XXXX", mock_server.uri()));
    plan.allow_redirects = false;
    let crawler = BatchCrawler::new(&common::session(), plan).unwrap();

    let records = crawler.run(&sku1()).await.unwrap();
    assert_eq!(records, vec![record(302)]);
}

#[tokio::test]
async fn test_harvest_extracts_and_archives() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body>
               <div class="result"><a href="/product/abc">ABC</a></div>
               <div class="result"><a href="/product/other">Other</a></div>
               </body></html>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "none"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>nothing</body></html>"))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/product/abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><head><title>ABC</title></head><body><p>Item</p></body></html>"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let template = format!("{}/search?q=XXXX", mock_server.uri());
    let crawler = BatchCrawler::new(&common::session(), common::plan(&template)).unwrap();
    let pattern = ExtractionPattern::new("div", "a", "href").with_attribute("class", "result");
    let items = vec![WorkItem::new("abc", "SKU1"), WorkItem::new("none", "SKU2")];

    let records = crawler
        .harvest(&items, &pattern, Some(dir.path()))
        .await
        .unwrap();

    assert_eq!(
        records[0].extracted_link,
        Some(format!("{}/product/abc", mock_server.uri()))
    );
    assert_eq!(records[1].extracted_link, None);

    let archived = std::fs::read_to_string(dir.path().join("SKU1.html")).unwrap();
    assert!(archived.contains("<title>"));
    assert!(archived.contains("Item"));
    assert!(!dir.path().join("SKU2.html").exists());
}

#[tokio::test]
async fn test_parallel_workers_keep_order() {
    let mock_server = MockServer::start().await;

    for (key, status) in [("a", 200), ("b", 404), ("c", 301), ("d", 500)] {
        Mock::given(method("GET"))
            .and(query_param("q", key))
            .respond_with(ResponseTemplate::new(status))
            .mount(&mock_server)
            .await;
    }

    let mut plan = common::plan(&format!("{}/search?q=XXXX", mock_server.uri()));
    plan.concurrency = 4;
    plan.allow_redirects = false;
    let crawler = BatchCrawler::new(&common::session(), plan).unwrap();

    let items: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|key| WorkItem::new(*key, key.to_uppercase()))
        .collect();
    let records = crawler.run(&items).await.unwrap();

    let statuses: Vec<_> = records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![
            FetchStatus::Http(200),
            FetchStatus::Http(404),
            FetchStatus::Http(301),
            FetchStatus::Http(500)
        ]
    );
    assert_eq!(records[2].identifier, "C");
}
