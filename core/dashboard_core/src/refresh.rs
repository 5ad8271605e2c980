use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::aggregate::{aggregate, AggregateSnapshot};
use crate::source::{FetchError, RowSource};
use crate::task::{normalize_rows, Task};
use crate::view::{view, ViewState};

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("fetch timed out after {0}s")]
    Timeout(u64),
    #[error("source returned no rows")]
    EmptyDataset,
}

impl RefreshError {
    pub fn kind(&self) -> AdvisoryKind {
        match self {
            RefreshError::Fetch(_) | RefreshError::Timeout(_) => AdvisoryKind::FetchFailure,
            RefreshError::EmptyDataset => AdvisoryKind::EmptyDataset,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryKind {
    FetchFailure,
    EmptyDataset,
}

/// User-visible note about the last refresh that did not replace the dataset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub kind: AdvisoryKind,
    pub message: String,
    pub at: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshTrigger {
    Startup,
    Tick,
    Manual,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Replaced { tasks: usize },
    Kept { advisory: Advisory },
    AlreadyRunning,
}

/// Rows from one successful fetch, in source order.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub tasks: Vec<Task>,
    pub fetched_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshConfig {
    pub interval_seconds: u64,
    pub cache_ttl_seconds: u64,
    pub fetch_timeout_seconds: u64,
}

#[derive(Default)]
struct CacheState {
    dataset: Option<Arc<Dataset>>,
    snapshot: AggregateSnapshot,
    advisory: Option<Advisory>,
    /// When the fetch behind `dataset` was requested.
    loaded_at: Option<Instant>,
    invalidated: bool,
}

#[derive(Serialize)]
pub struct DashboardStatus {
    pub has_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh_ts: Option<String>,
    pub stale: bool,
    pub auto_refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub advisory: Option<Advisory>,
    pub snapshot: AggregateSnapshot,
}

/// Owns the cached dataset and decides when to replace it.
pub struct Refresher {
    source: Arc<dyn RowSource>,
    config: RefreshConfig,
    state: RwLock<CacheState>,
    in_flight: Mutex<()>,
    auto_refresh: AtomicBool,
}

impl Refresher {
    pub fn new(source: Arc<dyn RowSource>, config: RefreshConfig, auto_refresh: bool) -> Self {
        Self {
            source,
            config,
            state: RwLock::new(CacheState::default()),
            in_flight: Mutex::new(()),
            auto_refresh: AtomicBool::new(auto_refresh),
        }
    }

    pub fn config(&self) -> RefreshConfig {
        self.config
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh.load(Ordering::Relaxed)
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.auto_refresh.store(enabled, Ordering::Relaxed);
    }

    /// Fetches once and swaps in the new dataset on success. A call made while
    /// another fetch is outstanding returns `AlreadyRunning` without fetching.
    pub async fn refresh(&self, trigger: RefreshTrigger) -> RefreshOutcome {
        self.refresh_at(trigger, Instant::now()).await
    }

    /// `requested_at` becomes the age origin of the dataset on success.
    async fn refresh_at(&self, trigger: RefreshTrigger, requested_at: Instant) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            info!("refresh ({trigger:?}) skipped: fetch already in flight");
            return RefreshOutcome::AlreadyRunning;
        };

        match self.fetch_dataset().await {
            Ok(dataset) => {
                let snapshot = aggregate(&dataset.tasks);
                let tasks = dataset.tasks.len();
                let mut state = self.state.write().await;
                state.dataset = Some(Arc::new(dataset));
                state.snapshot = snapshot;
                state.advisory = None;
                state.loaded_at = Some(requested_at);
                state.invalidated = false;
                info!("refresh ({trigger:?}) loaded {tasks} tasks");
                RefreshOutcome::Replaced { tasks }
            }
            Err(err) => {
                let advisory = Advisory {
                    kind: err.kind(),
                    message: err.to_string(),
                    at: now_rfc3339(),
                };
                let has_previous = {
                    let mut state = self.state.write().await;
                    state.advisory = Some(advisory.clone());
                    state.dataset.is_some()
                };
                match &err {
                    RefreshError::EmptyDataset => {
                        warn!("refresh ({trigger:?}) returned no rows; keeping previous data")
                    }
                    _ => error!(
                        "refresh ({trigger:?}) from {} failed: {err}; has previous data: {has_previous}",
                        self.source.describe()
                    ),
                }
                RefreshOutcome::Kept { advisory }
            }
        }
    }

    /// Drops the freshness of the cached dataset and fetches again.
    pub async fn trigger_manual_refresh(&self) -> RefreshOutcome {
        self.state.write().await.invalidated = true;
        self.refresh(RefreshTrigger::Manual).await
    }

    async fn fetch_dataset(&self) -> Result<Dataset, RefreshError> {
        let timeout = Duration::from_secs(self.config.fetch_timeout_seconds);
        let rows = tokio::time::timeout(timeout, self.source.fetch_rows())
            .await
            .map_err(|_| RefreshError::Timeout(self.config.fetch_timeout_seconds))??;
        if rows.is_empty() {
            return Err(RefreshError::EmptyDataset);
        }
        Ok(Dataset {
            tasks: normalize_rows(&rows),
            fetched_at: OffsetDateTime::now_utc(),
        })
    }

    /// True when there is no dataset, it was invalidated, or it is older than the TTL.
    pub async fn is_stale(&self) -> bool {
        self.is_stale_at(Instant::now()).await
    }

    async fn is_stale_at(&self, now: Instant) -> bool {
        let state = self.state.read().await;
        if state.invalidated {
            return true;
        }
        match state.loaded_at {
            None => true,
            Some(at) => {
                now.saturating_duration_since(at)
                    >= Duration::from_secs(self.config.cache_ttl_seconds)
            }
        }
    }

    pub async fn snapshot(&self) -> AggregateSnapshot {
        self.state.read().await.snapshot.clone()
    }

    pub async fn dataset(&self) -> Option<Arc<Dataset>> {
        self.state.read().await.dataset.clone()
    }

    pub async fn view(&self, view_state: &ViewState) -> Vec<Task> {
        match self.dataset().await {
            Some(ds) => view(&ds.tasks, view_state),
            None => Vec::new(),
        }
    }

    pub async fn last_refresh_timestamp(&self) -> Option<OffsetDateTime> {
        self.state
            .read()
            .await
            .dataset
            .as_ref()
            .map(|ds| ds.fetched_at)
    }

    pub async fn status(&self) -> DashboardStatus {
        let stale = self.is_stale().await;
        let state = self.state.read().await;
        DashboardStatus {
            has_data: state.dataset.is_some(),
            last_refresh_ts: state
                .dataset
                .as_ref()
                .and_then(|ds| ds.fetched_at.format(&Rfc3339).ok()),
            stale,
            auto_refresh: self.auto_refresh(),
            advisory: state.advisory.clone(),
            snapshot: state.snapshot.clone(),
        }
    }

    /// Initial load, then one tick per interval until shutdown fires.
    pub async fn run(self: Arc<Self>, shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut shutdown = shutdown;
        self.refresh(RefreshTrigger::Startup).await;

        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.interval_seconds.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; the startup load already covered it.
        ticker.tick().await;

        loop {
            tokio::select! {
                at = ticker.tick() => {
                    if !self.auto_refresh() {
                        continue;
                    }
                    // Ages are compared on the tick schedule so interval == ttl refetches every tick.
                    if self.is_stale_at(at).await {
                        self.refresh_at(RefreshTrigger::Tick, at).await;
                    }
                }
                _ = shutdown.changed() => {
                    info!("refresh loop stopping");
                    break;
                }
            }
        }
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}
