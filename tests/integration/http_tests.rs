//! Integration tests for the HTTP transport and full crawl runs
//!
//! These tests use wiremock to serve a small board and exercise the
//! reqwest transport, the SQLite store and the run log end-to-end.

use bbs_harvest::config::{Config, CrawlerConfig, OutputConfig, SourceConfig};
use bbs_harvest::crawler::HttpTransport;
use bbs_harvest::extract::dates::board_today;
use bbs_harvest::storage::{ArticleQueries, RunLog, RunStatus, SqliteStorage, Storage};
use bbs_harvest::{run_crawl, CrawlOptions, StopReason, Transport, TransportError};
use chrono::NaiveDate;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UTC_OFFSET_MINUTES: i32 = 8 * 60;

fn source_config(base_url: &str) -> SourceConfig {
    SourceConfig {
        base_url: base_url.to_string(),
        user_agent: "bbs-harvest-test/1.0".to_string(),
        fallback_encoding: "big5".to_string(),
        adult_consent: true,
        utc_offset_minutes: UTC_OFFSET_MINUTES,
    }
}

fn create_test_config(base_url: &str, db_path: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_concurrent_fetches: 2,
            request_timeout_secs: 5,
            cutoff_days: 7,
            max_articles: None,
            refresh_known: false,
        },
        source: source_config(base_url),
        output: OutputConfig {
            database_path: db_path.to_string(),
        },
    }
}

fn article_page(id: &str, title: &str, day: NaiveDate) -> String {
    format!(
        r#"<html><head><title>{title} - 看板 Test - 批踢踢實業坊</title></head><body><div id="main-content"><div class="article-metaline"><span class="article-meta-tag">作者</span><span class="article-meta-value">poster (Poster)</span></div><div class="article-metaline"><span class="article-meta-tag">標題</span><span class="article-meta-value">{title}</span></div><div class="article-metaline"><span class="article-meta-tag">時間</span><span class="article-meta-value">{time}</span></div>
body of {id}
--
<div class="push"><span class="push-tag">推 </span><span class="push-userid">reader</span><span class="push-content">: nice</span><span class="push-ipdatetime"> 10.0.0.1 {push}</span></div></div></body></html>"#,
        time = day.and_hms_opt(9, 0, 0).unwrap().format("%a %b %d %H:%M:%S %Y"),
        push = day.format("%m/%d 09:30"),
    )
}

fn listing_row(id: &str, title: &str, day: NaiveDate) -> String {
    format!(
        r#"<div class="r-ent"><div class="title"><a href="/bbs/Test/{id}.html">{title}</a></div><div class="meta"><div class="author">poster</div><div class="date">{date}</div></div></div>"#,
        date = day.format("%_m/%d"),
    )
}

/// Mounts a one-page board with three articles and returns their ids
async fn mount_board(server: &MockServer) -> Vec<String> {
    let today = board_today(UTC_OFFSET_MINUTES);
    let ids: Vec<String> = (1..=3).map(|n| format!("M.170000000{n}.A.00{n}")).collect();

    let rows: String = ids
        .iter()
        .map(|id| listing_row(id, &format!("[閒聊] {id}"), today))
        .collect();
    let listing = format!(
        r#"<html><body><div class="btn-group btn-group-paging"><a class="btn wide disabled">&lsaquo; 上頁</a></div><div class="r-list-container">{rows}</div></body></html>"#
    );

    Mock::given(method("GET"))
        .and(path("/bbs/Test/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing))
        .mount(server)
        .await;

    for id in &ids {
        Mock::given(method("GET"))
            .and(path(format!("/bbs/Test/{id}.html")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(article_page(
                    id,
                    &format!("[閒聊] {id}"),
                    today,
                )),
            )
            .mount(server)
            .await;
    }

    ids
}

#[tokio::test]
async fn test_transport_sends_consent_cookie_and_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bbs/Gossiping/index.html"))
        .and(header("cookie", "over18=1"))
        .and(header("user-agent", "bbs-harvest-test/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("welcome"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&source_config(&mock_server.uri())).unwrap();
    let url = Url::parse(&format!("{}/bbs/Gossiping/index.html", mock_server.uri())).unwrap();

    let body = transport.fetch(&url, Duration::from_secs(5)).await.unwrap();
    assert_eq!(&body[..], b"welcome");
}

#[tokio::test]
async fn test_transport_reports_http_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bbs/Test/index.html"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&source_config(&mock_server.uri())).unwrap();
    let url = Url::parse(&format!("{}/bbs/Test/index.html", mock_server.uri())).unwrap();

    let result = transport.fetch(&url, Duration::from_secs(5)).await;
    assert!(matches!(result, Err(TransportError::Status(503))));
}

#[tokio::test]
async fn test_transport_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let transport = HttpTransport::new(&source_config(&mock_server.uri())).unwrap();
    let url = Url::parse(&format!("{}/slow", mock_server.uri())).unwrap();

    let result = transport.fetch(&url, Duration::from_millis(100)).await;
    assert!(matches!(result, Err(TransportError::Timeout(_))));
}

#[tokio::test]
async fn test_full_crawl_against_mock_board() {
    let mock_server = MockServer::start().await;
    let ids = mount_board(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());
    let options = CrawlOptions::from_config(&config, "Test");

    let summary = run_crawl(&config, &options, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.fetched(), 3);
    assert!(summary.is_clean());

    let storage = SqliteStorage::new(&db_path).unwrap();
    let stats = storage.stats().unwrap();
    assert_eq!(stats.total_articles, 3);
    assert_eq!(stats.total_comments, 3);

    let article = storage.get_article("Test", &ids[0]).unwrap().unwrap();
    assert_eq!(article.title, format!("[閒聊] {}", ids[0]));
    assert_eq!(article.comments()[0].ip.as_deref(), Some("10.0.0.1"));

    let run = storage.latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Finished(StopReason::Exhausted));
    assert_eq!(run.config_hash, "test-hash");
    assert_eq!(run.fetched, 3);
}

#[tokio::test]
async fn test_second_run_skips_stored_articles() {
    let mock_server = MockServer::start().await;
    mount_board(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());
    let options = CrawlOptions::from_config(&config, "Test");

    let first = run_crawl(&config, &options, "h", CancellationToken::new())
        .await
        .unwrap();
    let second = run_crawl(&config, &options, "h", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(first.fetched(), 3);
    assert_eq!(second.fetched(), 0);
    assert_eq!(second.counters.skipped_duplicate, 3);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.stats().unwrap().total_articles, 3);
}

#[tokio::test]
async fn test_full_crawl_respects_article_limit() {
    let mock_server = MockServer::start().await;
    mount_board(&mock_server).await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());
    let mut options = CrawlOptions::from_config(&config, "Test");
    options.max_articles = Some(2);

    let summary = run_crawl(&config, &options, "h", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Limit);
    assert_eq!(summary.fetched(), 2);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.stats().unwrap().total_articles, 2);
    assert_eq!(
        storage.latest_run().unwrap().unwrap().status,
        RunStatus::Finished(StopReason::Limit)
    );
}

#[tokio::test]
async fn test_unreachable_board_ends_without_articles() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bbs/Test/index.html"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("harvest.db");
    let config = create_test_config(&mock_server.uri(), db_path.to_str().unwrap());
    let options = CrawlOptions::from_config(&config, "Test");

    let summary = run_crawl(&config, &options, "h", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.fetched(), 0);
}
