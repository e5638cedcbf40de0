//! Integration tests for the tag crawler against a mock tag listing.

use downhub::{
    ArchiveFormat, AssetClassifier, CrawlOptions, CrawlOutcome, Crawler, PageFetcher,
    RepositoryTarget,
};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tag_page(repo_path: &str, tags: &[&str]) -> String {
    let rows: String = tags
        .iter()
        .map(|tag| {
            format!(
                r#"<div class="Box-row">
                  <h2 class="f4 d-inline"><a class="Link--primary" href="{repo_path}/releases/tag/{tag}">{tag}</a></h2>
                  <a class="Link--muted" href="{repo_path}/archive/refs/tags/{tag}.zip">Source code (zip)</a>
                  <a class="Link--muted" href="{repo_path}/archive/refs/tags/{tag}.tar.gz">Source code (tar.gz)</a>
                  <a class="Link--muted" href="{repo_path}/commit/0000000">0000000</a>
                </div>"#
            )
        })
        .collect();
    format!("<html><body>{rows}</body></html>")
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

fn crawler(options: CrawlOptions) -> Crawler {
    Crawler::new(PageFetcher::new(reqwest::Client::new(), 4), options)
}

fn target(server: &MockServer, repo_path: &str) -> RepositoryTarget {
    RepositoryTarget::parse(&format!("{}{repo_path}", server.uri())).unwrap()
}

#[tokio::test]
async fn test_crawl_follows_cursor_until_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(tag_page("/o/r", &["v3.0", "v2.0"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v2.0"))
        .respond_with(html(tag_page("/o/r", &["v1.0"])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v1.0"))
        .respond_with(html(tag_page("/o/r", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawler(CrawlOptions::default())
        .crawl(target(&server, "/o/r"))
        .await
        .unwrap();

    assert!(report.outcome.is_complete());
    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.target.last_seen_tag(), Some("v1.0"));

    let base = format!("{}/o/r/archive/refs/tags", server.uri());
    assert_eq!(
        report.assets.zip(),
        [
            format!("{base}/v3.0.zip"),
            format!("{base}/v2.0.zip"),
            format!("{base}/v1.0.zip"),
        ]
    );
    assert_eq!(report.assets.tar_gz().len(), 3);
    assert_eq!(report.assets.tar_gz()[0], format!("{base}/v3.0.tar.gz"));
}

#[tokio::test]
async fn test_crawl_stops_when_page_is_reserved() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(tag_page("/o/r", &["v2.0"])))
        .mount(&server)
        .await;
    // The site keeps serving the last page for any later cursor.
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v2.0"))
        .respond_with(html(tag_page("/o/r", &["v2.0"])))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawler(CrawlOptions::default())
        .crawl(target(&server, "/o/r"))
        .await
        .unwrap();

    assert!(matches!(report.outcome, CrawlOutcome::Completed));
    assert_eq!(report.pages_visited, 2);
    // Links on the re-served page are recorded again; no deduplication.
    assert_eq!(report.assets.zip().len(), 2);
}

#[tokio::test]
async fn test_crawl_encodes_cursor_and_compares_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(tag_page("/o/r", &["release/1.0 beta"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "release/1.0 beta"))
        .respond_with(html(tag_page("/o/r", &["release/1.0 beta"])))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawler(CrawlOptions::default())
        .crawl(target(&server, "/o/r"))
        .await
        .unwrap();

    assert!(report.outcome.is_complete());
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.target.last_seen_tag(), Some("release/1.0 beta"));
}

#[tokio::test]
async fn test_crawl_page_limit_caps_visits() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(tag_page("/o/r", &["v9"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v9"))
        .respond_with(html(tag_page("/o/r", &["v8"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v8"))
        .respond_with(html(tag_page("/o/r", &["v7"])))
        .expect(0)
        .mount(&server)
        .await;

    let options = CrawlOptions {
        max_pages: 2,
        ..CrawlOptions::default()
    };
    let report = crawler(options).crawl(target(&server, "/o/r")).await.unwrap();

    assert!(matches!(report.outcome, CrawlOutcome::PageLimitReached));
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.assets.zip().len(), 2);
}

#[tokio::test]
async fn test_crawl_failure_keeps_assets_found_so_far() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(tag_page("/o/r", &["v2.0"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v2.0"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let report = crawler(CrawlOptions::default())
        .crawl(target(&server, "/o/r"))
        .await
        .unwrap();

    match &report.outcome {
        CrawlOutcome::Truncated(error) => assert!(error.to_string().contains("500")),
        other => panic!("expected truncated crawl, got {other:?}"),
    }
    assert_eq!(report.assets.zip().len(), 1);
    assert_eq!(report.assets.tar_gz().len(), 1);
}

#[tokio::test]
async fn test_crawl_respects_format_allow_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(tag_page("/o/r", &["v1"])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v1"))
        .respond_with(html(tag_page("/o/r", &[])))
        .mount(&server)
        .await;

    let options = CrawlOptions {
        classifier: AssetClassifier::new(vec![ArchiveFormat::TarGz]),
        ..CrawlOptions::default()
    };
    let report = crawler(options).crawl(target(&server, "/o/r")).await.unwrap();

    assert!(report.assets.zip().is_empty());
    assert_eq!(report.assets.tar_gz().len(), 1);
}

#[tokio::test]
async fn test_crawl_ignores_links_of_other_repositories() {
    let server = MockServer::start().await;
    let mut body = tag_page("/o/r", &["v1"]);
    body.push_str(r#"<a class="Link--muted" href="/other/repo/archive/refs/tags/v1.zip">x</a>"#);
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param_is_missing("after"))
        .respond_with(html(body))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/o/r/tags"))
        .and(query_param("after", "v1"))
        .respond_with(html(tag_page("/o/r", &[])))
        .mount(&server)
        .await;

    let report = crawler(CrawlOptions::default())
        .crawl(target(&server, "/o/r"))
        .await
        .unwrap();

    assert_eq!(report.assets.zip().len(), 1);
    assert!(report.assets.zip()[0].contains("/o/r/archive/"));
}

#[tokio::test]
async fn test_crawl_all_returns_reports_in_input_order() {
    let server = MockServer::start().await;
    for repo in ["/a/one", "/b/two"] {
        Mock::given(method("GET"))
            .and(path(format!("{repo}/tags")))
            .and(query_param_is_missing("after"))
            .respond_with(html(tag_page(repo, &["v1"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{repo}/tags")))
            .and(query_param("after", "v1"))
            .respond_with(html(tag_page(repo, &[])))
            .mount(&server)
            .await;
    }

    let reports = crawler(CrawlOptions::default())
        .crawl_all(vec![target(&server, "/a/one"), target(&server, "/b/two")])
        .await;

    assert_eq!(reports.len(), 2);
    let names: Vec<_> = reports
        .iter()
        .map(|report| report.as_ref().unwrap().target.repo_name().to_string())
        .collect();
    assert_eq!(names, ["one", "two"]);
    for report in &reports {
        assert_eq!(report.as_ref().unwrap().assets.total(), 2);
    }
}
