//! Integration tests for the crawl pipeline
//!
//! These tests drive the coordinator against a scripted in-memory transport
//! and an in-memory SQLite database.

use async_trait::async_trait;
use bbs_harvest::crawler::{Coordinator, CrawlRequest, SourceSettings, Transport};
use bbs_harvest::extract::dates::cutoff_from_days;
use bbs_harvest::storage::{ArticleQueries, SqliteStorage, Storage};
use bbs_harvest::{StopReason, TransportError};
use bytes::Bytes;
use chrono::{Days, NaiveDate, NaiveDateTime};
use encoding_rs::{Encoding, BIG5, UTF_8};
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const BASE: &str = "https://bbs.test/";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 20).unwrap()
}

fn days_ago(days: u64) -> NaiveDateTime {
    today()
        .checked_sub_days(Days::new(days))
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

/// An article to put on a scripted board
struct Post {
    id: String,
    title: String,
    created_at: NaiveDateTime,
    pushes: usize,
}

impl Post {
    fn new(n: usize, title: &str, created_at: NaiveDateTime) -> Self {
        Self {
            id: format!("M.{}.A.{:03X}", 1_700_000_000 + n, n),
            title: title.to_string(),
            created_at,
            pushes: 2,
        }
    }

    fn path(&self) -> String {
        format!("bbs/Test/{}.html", self.id)
    }

    fn page(&self) -> String {
        let pushes: String = (0..self.pushes)
            .map(|i| {
                format!(
                    r#"<div class="push"><span class="push-tag">推 </span><span class="push-userid">fan{i}</span><span class="push-content">: push {i}</span><span class="push-ipdatetime"> 1.2.3.{i} {}</span></div>"#,
                    self.created_at.format("%m/%d %H:%M")
                )
            })
            .collect();
        format!(
            r#"<html><head><title>{title} - 看板 Test - 批踢踢實業坊</title></head><body><div id="main-content"><div class="article-metaline"><span class="article-meta-tag">作者</span><span class="article-meta-value">poster (Poster)</span></div><div class="article-metaline-right"><span class="article-meta-tag">看板</span><span class="article-meta-value">Test</span></div><div class="article-metaline"><span class="article-meta-tag">標題</span><span class="article-meta-value">{title}</span></div><div class="article-metaline"><span class="article-meta-tag">時間</span><span class="article-meta-value">{time}</span></div>
article body of {title}
--
{pushes}</div></body></html>"#,
            title = self.title,
            time = self.created_at.format("%a %b %d %H:%M:%S %Y"),
        )
    }

    fn row(&self) -> String {
        format!(
            r#"<div class="r-ent"><div class="nrec"></div><div class="title"><a href="/{path}">{title}</a></div><div class="meta"><div class="author">poster</div><div class="date">{date}</div></div></div>"#,
            path = self.path(),
            title = self.title,
            date = self.created_at.format("%_m/%d"),
        )
    }
}

fn listing_page(posts: &[&Post], older: Option<&str>) -> String {
    let rows: String = posts.iter().map(|post| post.row()).collect();
    let older = match older {
        Some(path) => format!(r#"<a class="btn wide" href="/{path}">&lsaquo; 上頁</a>"#),
        None => r#"<a class="btn wide disabled">&lsaquo; 上頁</a>"#.to_string(),
    };
    format!(
        r#"<html><body><div class="btn-group btn-group-paging"><a class="btn wide" href="/bbs/Test/index1.html">最舊</a>{older}</div><div class="r-list-container action-bar-margin bbs-screen">{rows}</div></body></html>"#
    )
}

/// Serves canned pages; counts fetches and tracks peak concurrency
#[derive(Default)]
struct ScriptedTransport {
    pages: HashMap<String, Bytes>,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    article_fetches: AtomicUsize,
    cancel_on_first_article: Mutex<Option<CancellationToken>>,
}

impl ScriptedTransport {
    fn page(mut self, path: &str, body: impl Into<Bytes>) -> Self {
        self.pages.insert(format!("{BASE}{path}"), body.into());
        self
    }

    /// One newest-first board: the listing pages and every article page
    fn board(pages: &[Vec<&Post>]) -> Self {
        let mut transport = Self::default();
        for (i, posts) in pages.iter().enumerate() {
            let path = if i == 0 {
                "bbs/Test/index.html".to_string()
            } else {
                format!("bbs/Test/index{}.html", 100 - i)
            };
            let older = (i + 1 < pages.len()).then(|| format!("bbs/Test/index{}.html", 99 - i));
            transport = transport.page(&path, listing_page(posts, older.as_deref()));
            for post in posts {
                transport = transport.page(&post.path(), post.page());
            }
        }
        transport
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn fetch(&self, url: &Url, _timeout: Duration) -> Result<Bytes, TransportError> {
        let is_article = url.path().contains("/M.");
        if is_article {
            self.article_fetches.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            let token = self.cancel_on_first_article.lock().unwrap().take();
            if let Some(token) = token {
                token.cancel();
            }
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if is_article {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or(TransportError::Status(404))
    }
}

fn settings(fallback: &'static Encoding) -> SourceSettings {
    SourceSettings {
        base_url: Url::parse(BASE).unwrap(),
        today: today(),
        fallback,
        timeout: Duration::from_secs(5),
    }
}

fn request(cutoff_days: u32, max_articles: Option<u32>, concurrency: usize) -> CrawlRequest {
    CrawlRequest {
        board: "Test".to_string(),
        keyword: String::new(),
        cutoff: cutoff_from_days(today(), cutoff_days),
        max_articles,
        concurrency: NonZeroUsize::new(concurrency).unwrap(),
        start_page: None,
    }
}

fn coordinator(
    transport: ScriptedTransport,
    storage: SqliteStorage,
) -> Coordinator<ScriptedTransport, SqliteStorage> {
    Coordinator::new(transport, storage, settings(UTF_8), CancellationToken::new())
}

fn five_recent_posts() -> Vec<Post> {
    (0..5)
        .map(|n| Post::new(n, &format!("[閒聊] post {n}"), days_ago(n as u64 % 2)))
        .collect()
}

#[tokio::test]
async fn test_crawl_persists_every_article_once() {
    let posts = five_recent_posts();
    let transport = ScriptedTransport::board(&[posts.iter().collect()]);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(7, None, 3), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.fetched(), 5);
    assert!(summary.is_clean());

    let stats = coordinator.storage().stats().unwrap();
    assert_eq!(stats.total_articles, 5);
    assert_eq!(stats.total_comments, 10);

    let stored = coordinator
        .storage()
        .get_article("Test", &posts[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "[閒聊] post 0");
    assert_eq!(stored.author.as_deref(), Some("poster"));
    assert_eq!(stored.created_at, posts[0].created_at);
    assert_eq!(stored.comments()[1].ip.as_deref(), Some("1.2.3.1"));
}

#[tokio::test]
async fn test_recrawl_without_known_ids_is_idempotent() {
    let posts = five_recent_posts();
    let mut coordinator = coordinator(
        ScriptedTransport::board(&[posts.iter().collect()]),
        SqliteStorage::open_in_memory().unwrap(),
    );

    coordinator
        .crawl(&request(7, None, 2), &mut HashSet::new())
        .await
        .unwrap();
    let second = coordinator
        .crawl(&request(7, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(second.fetched(), 5);
    let stats = coordinator.storage().stats().unwrap();
    assert_eq!(stats.total_articles, 5);
    assert_eq!(stats.total_comments, 10);
}

#[tokio::test]
async fn test_known_ids_are_not_fetched_again() {
    let posts = five_recent_posts();
    let mut coordinator = coordinator(
        ScriptedTransport::board(&[posts.iter().collect()]),
        SqliteStorage::open_in_memory().unwrap(),
    );

    let mut known = coordinator.storage().known_identifiers("Test").unwrap();
    let first = coordinator.crawl(&request(7, None, 2), &mut known).await.unwrap();
    assert_eq!(first.fetched(), 5);

    let mut known = coordinator.storage().known_identifiers("Test").unwrap();
    let second = coordinator.crawl(&request(7, None, 2), &mut known).await.unwrap();

    assert_eq!(second.fetched(), 0);
    assert_eq!(second.counters.skipped_duplicate, 5);
}

#[tokio::test]
async fn test_duplicate_links_across_pages_are_fetched_once() {
    let posts = five_recent_posts();
    let transport = ScriptedTransport::board(&[
        vec![&posts[0], &posts[1], &posts[2]],
        vec![&posts[2], &posts[3], &posts[4]],
    ]);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(7, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 5);
    assert_eq!(summary.counters.skipped_duplicate, 1);
}

#[tokio::test]
async fn test_cutoff_excludes_older_articles_and_stops() {
    let posts = vec![
        Post::new(1, "today", days_ago(0)),
        Post::new(2, "three days ago", days_ago(3)),
        Post::new(3, "ten days ago", days_ago(10)),
    ];
    let older_page = vec![Post::new(4, "much older", days_ago(12))];
    let transport =
        ScriptedTransport::board(&[posts.iter().collect(), older_page.iter().collect()]);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(5, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cutoff);
    assert_eq!(summary.fetched(), 2);
    assert_eq!(summary.counters.skipped_cutoff, 1);
    assert_eq!(summary.counters.pages_visited, 1);
    assert!(!coordinator.storage().exists("Test", &posts[2].id).unwrap());
}

#[tokio::test]
async fn test_listing_page_older_than_cutoff_is_not_fetched() {
    let old = vec![Post::new(1, "old", days_ago(30))];
    let transport = ScriptedTransport::board(&[old.iter().collect()]);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(5, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cutoff);
    assert_eq!(summary.fetched(), 0);
}

#[tokio::test]
async fn test_limit_persists_exactly_max_articles() {
    let posts = five_recent_posts();
    let transport = std::sync::Arc::new(ScriptedTransport::board(&[posts.iter().collect()]));
    let mut coordinator = Coordinator::new(
        SharedTransport(transport.clone()),
        SqliteStorage::open_in_memory().unwrap(),
        settings(UTF_8),
        CancellationToken::new(),
    );

    let summary = coordinator
        .crawl(&request(7, Some(2), 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Limit);
    assert_eq!(summary.fetched(), 2);
    assert_eq!(coordinator.storage().stats().unwrap().total_articles, 2);
    assert_eq!(transport.article_fetches.load(Ordering::SeqCst), 2);
    assert_eq!(summary.counters.dropped, 3);
}

#[tokio::test]
async fn test_peak_concurrency_is_bounded() {
    let posts: Vec<Post> = (0..9)
        .map(|n| Post::new(n, &format!("post {n}"), days_ago(0)))
        .collect();
    let transport = std::sync::Arc::new(
        ScriptedTransport::board(&[posts.iter().collect()]).with_delay(Duration::from_millis(25)),
    );

    let mut coordinator = Coordinator::new(
        SharedTransport(transport.clone()),
        SqliteStorage::open_in_memory().unwrap(),
        settings(UTF_8),
        CancellationToken::new(),
    );
    coordinator
        .crawl(&request(7, None, 3), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(transport.article_fetches.load(Ordering::SeqCst), 9);
    assert!(transport.peak.load(Ordering::SeqCst) <= 3);
    assert!(transport.peak.load(Ordering::SeqCst) >= 1);
}

/// Lets a test keep a handle on the transport's counters
struct SharedTransport(std::sync::Arc<ScriptedTransport>);

#[async_trait]
impl Transport for SharedTransport {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<Bytes, TransportError> {
        self.0.fetch(url, timeout).await
    }
}

#[tokio::test]
async fn test_malformed_article_is_isolated() {
    let posts = five_recent_posts();
    let transport = ScriptedTransport::board(&[posts.iter().collect()])
        .page(&posts[2].path(), "<html><body><p>系統維護中</p></body></html>");
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(7, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 4);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert!(!coordinator.storage().exists("Test", &posts[2].id).unwrap());
}

#[tokio::test]
async fn test_missing_article_page_counts_as_failure() {
    let posts = five_recent_posts();
    let mut transport = ScriptedTransport::board(&[posts.iter().collect()]);
    transport.pages.remove(&format!("{BASE}{}", posts[4].path()));
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(7, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 4);
    assert_eq!(summary.failed(), 1);
}

#[tokio::test]
async fn test_fallback_encoding_decodes_legacy_pages() {
    let post = Post::new(1, "[問題] 測試編碼", days_ago(0));
    let listing_html = listing_page(&[&post], None);
    let article_html = post.page();
    let (listing, _, _) = BIG5.encode(&listing_html);
    let (article, _, _) = BIG5.encode(&article_html);
    let transport = ScriptedTransport::default()
        .page("bbs/Test/index.html", listing.into_owned())
        .page(&post.path(), article.into_owned());

    let mut coordinator = Coordinator::new(
        transport,
        SqliteStorage::open_in_memory().unwrap(),
        settings(BIG5),
        CancellationToken::new(),
    );
    let summary = coordinator
        .crawl(&request(7, None, 1), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 1);
    let stored = coordinator
        .storage()
        .get_article("Test", &post.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.title, "[問題] 測試編碼");
}

#[tokio::test]
async fn test_undecodable_bytes_still_yield_an_article() {
    let post = Post::new(1, "broken TITLE", days_ago(0));
    let mut article = Vec::new();
    for (i, part) in post.page().split("TITLE").enumerate() {
        if i > 0 {
            article.extend_from_slice(&[0xFF, 0xFE]);
        }
        article.extend_from_slice(part.as_bytes());
    }
    let transport = ScriptedTransport::default()
        .page("bbs/Test/index.html", listing_page(&[&post], None))
        .page(&post.path(), article);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(7, None, 1), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.fetched(), 1);
    let stored = coordinator
        .storage()
        .get_article("Test", &post.id)
        .unwrap()
        .unwrap();
    assert!(stored.title.starts_with("broken "));
    assert!(stored.title.contains('\u{FFFD}'));
}

#[tokio::test]
async fn test_two_empty_pages_exhaust_the_walk() {
    let transport = ScriptedTransport::board(&[vec![], vec![], vec![]]);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let summary = coordinator
        .crawl(&request(7, None, 2), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Exhausted);
    assert_eq!(summary.fetched(), 0);
    assert_eq!(summary.counters.pages_visited, 1);
}

#[tokio::test]
async fn test_cancellation_drops_queued_links() {
    let posts = five_recent_posts();
    let shutdown = CancellationToken::new();
    let transport = ScriptedTransport::board(&[posts.iter().collect()]);
    *transport.cancel_on_first_article.lock().unwrap() = Some(shutdown.clone());

    let mut coordinator = Coordinator::new(
        transport,
        SqliteStorage::open_in_memory().unwrap(),
        settings(UTF_8),
        shutdown,
    );
    let summary = coordinator
        .crawl(&request(7, None, 1), &mut HashSet::new())
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Cancelled);
    assert_eq!(summary.fetched(), 1);
    assert_eq!(summary.counters.dropped, 4);
}

#[tokio::test]
async fn test_keyword_filter_uses_listing_titles() {
    let posts = vec![
        Post::new(1, "[心得] Rust async", days_ago(0)),
        Post::new(2, "[閒聊] lunch", days_ago(0)),
        Post::new(3, "[問題] rust lifetimes", days_ago(1)),
    ];
    let transport = ScriptedTransport::board(&[posts.iter().collect()]);
    let mut coordinator = coordinator(transport, SqliteStorage::open_in_memory().unwrap());

    let mut request = request(7, None, 2);
    request.keyword = "RUST".to_string();
    request.start_page = Some(Url::parse(&format!("{BASE}bbs/Test/index.html")).unwrap());

    let summary = coordinator.crawl(&request, &mut HashSet::new()).await.unwrap();

    assert_eq!(summary.fetched(), 2);
    assert_eq!(summary.counters.skipped_filtered, 1);
    assert!(!coordinator.storage().exists("Test", &posts[1].id).unwrap());
}
