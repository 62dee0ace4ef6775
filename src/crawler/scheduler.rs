//! Bounded-concurrency article fetching
//!
//! This module handles:
//! - A fixed pool of workers pulling article links from a bounded queue
//! - Per-fetch timeouts
//! - Extraction of each fetched page inside the worker
//! - Turning queued work into `Dropped` outcomes once the session is cancelled
//!
//! At most `concurrency` fetch-and-extract operations are in flight at any
//! time, because there are exactly that many workers. A failure of one link
//! never affects the others.

use crate::crawler::fetcher::Transport;
use crate::extract::extract_article;
use crate::model::{Article, ArticleLink};
use crate::{ExtractionError, TransportError};
use encoding_rs::Encoding;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// The result of handing one link to the pool
#[derive(Debug)]
pub enum FetchOutcome {
    /// The page was fetched and extracted
    Fetched(Article),

    /// The fetch or the extraction failed
    Failed(FetchFailure),

    /// The link was still queued when the session was cancelled
    Dropped(ArticleLink),
}

/// A link that could not be turned into an article
#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
    pub link: ArticleLink,
    pub cause: FailureCause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Transport(TransportError),
    Extraction(ExtractionError),
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            FailureCause::Transport(e) => write!(f, "fetching {} failed: {}", self.link.url, e),
            FailureCause::Extraction(e) => write!(f, "extracting {} failed: {}", self.link.url, e),
        }
    }
}

/// What a worker needs to extract an article
#[derive(Debug, Clone)]
pub struct ExtractContext {
    pub board: String,
    pub fallback: &'static Encoding,
}

/// Hands article links to a bounded pool of workers
pub struct FetchScheduler<T> {
    transport: Arc<T>,
    concurrency: NonZeroUsize,
    timeout: Duration,
    context: Arc<ExtractContext>,
}

impl<T: Transport + 'static> FetchScheduler<T> {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `transport` - Shared transport used by every worker
    /// * `concurrency` - Maximum number of simultaneous fetches
    /// * `timeout` - Per-fetch timeout
    /// * `context` - Board and fallback encoding for extraction
    pub fn new(
        transport: Arc<T>,
        concurrency: NonZeroUsize,
        timeout: Duration,
        context: ExtractContext,
    ) -> Self {
        Self {
            transport,
            concurrency,
            timeout,
            context: Arc::new(context),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency.get()
    }

    /// Starts an empty pool with `concurrency` workers
    ///
    /// Links are added with [`FetchPool::submit`]; cancelling `cancel` turns
    /// every link that has not started yet into a `Dropped` outcome.
    pub fn start(&self, cancel: CancellationToken) -> FetchPool {
        self.spawn_pool(self.concurrency.get(), cancel)
    }

    /// Schedules a batch of links and returns the pool yielding their outcomes
    ///
    /// Outcomes arrive in completion order, not submission order. Exactly
    /// one outcome is produced per link.
    pub async fn run(&self, links: Vec<ArticleLink>, cancel: CancellationToken) -> FetchPool {
        let workers = self.concurrency.get().min(links.len().max(1));
        let mut pool = self.spawn_pool(workers, cancel);

        for link in links {
            if let Err(link) = pool.submit(link).await {
                tracing::error!("Fetch queue closed early, dropping {}", link.url);
                break;
            }
        }
        pool.close();
        pool
    }

    fn spawn_pool(&self, workers: usize, cancel: CancellationToken) -> FetchPool {
        let (job_tx, job_rx) = mpsc::channel::<ArticleLink>(self.concurrency.get());
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut tasks = JoinSet::new();
        for worker_id in 0..workers {
            let worker = Worker {
                id: worker_id,
                jobs: Arc::clone(&job_rx),
                results: result_tx.clone(),
                transport: Arc::clone(&self.transport),
                context: Arc::clone(&self.context),
                timeout: self.timeout,
                cancel: cancel.clone(),
            };
            tasks.spawn(worker.run());
        }

        FetchPool {
            jobs: Some(job_tx),
            results: result_rx,
            tasks,
            pending: 0,
        }
    }
}

/// A running pool of fetch workers
///
/// Dropping the pool aborts its workers; call [`FetchPool::shutdown`] to let
/// them finish.
pub struct FetchPool {
    jobs: Option<mpsc::Sender<ArticleLink>>,
    results: mpsc::UnboundedReceiver<FetchOutcome>,
    tasks: JoinSet<()>,
    pending: usize,
}

impl FetchPool {
    /// Queues a link, waiting while the queue is full
    ///
    /// Returns the link back if the pool no longer accepts work.
    pub async fn submit(&mut self, link: ArticleLink) -> Result<(), ArticleLink> {
        let Some(jobs) = &self.jobs else {
            return Err(link);
        };
        jobs.send(link).await.map_err(|e| e.0)?;
        self.pending += 1;
        Ok(())
    }

    /// Stops accepting new links; workers exit once the queue is drained
    pub fn close(&mut self) {
        self.jobs = None;
    }

    /// Outcomes still owed for submitted links
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Waits for the next outcome
    ///
    /// Returns `None` once every submitted link has produced an outcome.
    pub async fn next_outcome(&mut self) -> Option<FetchOutcome> {
        if self.pending == 0 {
            return None;
        }
        let outcome = self.results.recv().await?;
        self.pending -= 1;
        Some(outcome)
    }

    /// Closes the queue and waits for every worker to exit
    pub async fn shutdown(mut self) {
        self.close();
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Fetch worker panicked: {}", e);
            }
        }
    }
}

struct Worker<T> {
    id: usize,
    jobs: Arc<Mutex<mpsc::Receiver<ArticleLink>>>,
    results: mpsc::UnboundedSender<FetchOutcome>,
    transport: Arc<T>,
    context: Arc<ExtractContext>,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<T: Transport> Worker<T> {
    async fn run(self) {
        loop {
            let next = self.jobs.lock().await.recv().await;
            let Some(link) = next else {
                break;
            };

            let outcome = if self.cancel.is_cancelled() {
                FetchOutcome::Dropped(link)
            } else {
                self.fetch_and_extract(link).await
            };

            if self.results.send(outcome).is_err() {
                break;
            }
        }
        tracing::trace!("Fetch worker {} exiting", self.id);
    }

    async fn fetch_and_extract(&self, link: ArticleLink) -> FetchOutcome {
        tracing::debug!("Worker {} fetching {}", self.id, link.url);

        let fetched =
            match tokio::time::timeout(self.timeout, self.transport.fetch(&link.url, self.timeout))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(self.timeout)),
            };

        let bytes = match fetched {
            Ok(bytes) => bytes,
            Err(e) => {
                return FetchOutcome::Failed(FetchFailure {
                    link,
                    cause: FailureCause::Transport(e),
                })
            }
        };

        match extract_article(&bytes, &link, &self.context.board, self.context.fallback) {
            Ok(article) => FetchOutcome::Fetched(article),
            Err(e) => FetchOutcome::Failed(FetchFailure {
                link,
                cause: FailureCause::Extraction(e),
            }),
        }
    }
}
