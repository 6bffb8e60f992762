//! Background health monitor.
//!
//! A process-scoped service object owning its own HTTP client and timer:
//! callers construct one instance, call [`HealthMonitor::start`] after the
//! store is ready, and [`HealthMonitor::shutdown`] on the way out.  There is
//! no global singleton.
//!
//! Each tick probes every resource with a live URL.  Probe failures of any
//! kind — non-2xx status, timeout, refused connection, DNS — are recorded as
//! `down` and never abort the rest of the batch; the whole tick's results
//! are committed in one transaction.  The monitor shares the store with the
//! request path but never blocks it: every store access is its own
//! transactionally-scoped call.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::sqlite::SqliteStore;
use crate::db::{HealthSample, HealthStatus, ProbeTarget, ResourceStore};

pub struct HealthMonitor {
    store: Arc<SqliteStore>,
    client: reqwest::Client,
    interval: Duration,
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HealthMonitor(every {:?})", self.interval)
    }
}

impl HealthMonitor {
    pub fn new(store: Arc<SqliteStore>, config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.health_timeout_secs))
            .build()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            store,
            client,
            interval: Duration::from_secs(config.health_interval_secs),
            shutdown,
            handle: Mutex::new(None),
        })
    }

    /// Spawn the tick loop.  The first probe round runs one interval after
    /// startup.
    pub fn start(&self) {
        let store = Arc::clone(&self.store);
        let client = self.client.clone();
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown.subscribe();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // tokio intervals fire immediately; consume the first tick so the
            // initial round waits a full interval.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = run_checks(&store, &client).await {
                            warn!(error = %e, "health-check tick failed");
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("health monitor stopped");
        });
        *self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);
        info!(interval = ?self.interval, "health monitor started");
    }

    /// Signal the tick loop to stop and wait for an in-flight tick to drain.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "health monitor task did not shut down cleanly");
            }
        }
    }

    /// Run exactly one probe round, outside the scheduler.
    #[cfg(test)]
    pub(crate) async fn run_once(&self) -> Result<(), sqlx::Error> {
        run_checks(&self.store, &self.client).await
    }
}

/// One scheduler tick: probe every monitored resource, then record the whole
/// batch in a single transaction.
async fn run_checks(store: &SqliteStore, client: &reqwest::Client) -> Result<(), sqlx::Error> {
    let targets = store.list_monitored().await?;
    if targets.is_empty() {
        return Ok(());
    }
    debug!(count = targets.len(), "probing resources");

    let mut samples = Vec::with_capacity(targets.len());
    for target in &targets {
        let status = probe(client, target).await;
        samples.push(HealthSample {
            resource_id: target.id,
            status,
            checked_at: Utc::now(),
        });
    }
    store.record_health_batch(&samples).await
}

/// Probe one resource.  Any transport or HTTP failure collapses to `down`.
async fn probe(client: &reqwest::Client, target: &ProbeTarget) -> HealthStatus {
    let url = probe_target_url(&target.url, target.healthcheck_path.as_deref());
    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => HealthStatus::Up,
        Ok(response) => {
            debug!(resource_id = target.id, %url, status = %response.status(), "probe returned non-success");
            HealthStatus::Down
        }
        Err(e) => {
            debug!(resource_id = target.id, %url, error = %e, "probe failed");
            HealthStatus::Down
        }
    }
}

/// Join a base URL and a health-check path with exactly one slash.
fn probe_target_url(url: &str, healthcheck_path: Option<&str>) -> String {
    match healthcheck_path {
        Some(path) => format!(
            "{}/{}",
            url.trim_end_matches('/'),
            path.trim_start_matches('/')
        ),
        None => url.to_owned(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::db::Resource;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use berth_core::ResourceKind;
    use crate::db::ResourceSource;

    #[test]
    fn probe_target_joins_with_single_slash() {
        assert_eq!(
            probe_target_url("http://x:9000/", Some("/health")),
            "http://x:9000/health"
        );
        assert_eq!(
            probe_target_url("http://x:9000", Some("health")),
            "http://x:9000/health"
        );
        assert_eq!(probe_target_url("http://x:9000", None), "http://x:9000");
    }

    fn monitored(name: &str, slug: &str, url: String, healthcheck: Option<String>) -> Resource {
        let now = Utc::now();
        Resource {
            id: 0,
            kind: ResourceKind::App,
            name: name.to_owned(),
            slug: slug.to_owned(),
            description: None,
            tags: Vec::new(),
            url: Some(url),
            path: None,
            repo_url: None,
            owner: None,
            thumbnail_path: None,
            license: None,
            healthcheck_path: healthcheck,
            updated_at: None,
            last_synced_at: None,
            health_status: HealthStatus::Unknown,
            health_checked_at: None,
            source: ResourceSource::Manual,
            created_at: now,
            modified_at: now,
        }
    }

    /// Bind an ephemeral local server for probe tests.
    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn test_config() -> Config {
        Config {
            bind_address: String::new(),
            database_url: String::new(),
            repo_dir: std::path::PathBuf::new(),
            health_interval_secs: 30,
            health_timeout_secs: 2,
            log_level: "info".to_owned(),
            log_json: false,
            cors_allowed_origins: None,
            enable_swagger: false,
        }
    }

    #[tokio::test]
    async fn tick_records_up_and_down_without_aborting() {
        let up = spawn_server(Router::new().route("/health", get(|| async { "ok" }))).await;
        let down = spawn_server(Router::new().route(
            "/health",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        ))
        .await;

        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let up_id = store
            .insert_resource(&monitored("Up", "up", up, Some("/health".to_owned())))
            .await
            .unwrap();
        let down_id = store
            .insert_resource(&monitored("Down", "down", down, Some("/health".to_owned())))
            .await
            .unwrap();
        // Unreachable endpoint: transport error, still just `down`.
        let dead_id = store
            .insert_resource(&monitored("Dead", "dead", "http://127.0.0.1:1".to_owned(), None))
            .await
            .unwrap();

        let monitor = HealthMonitor::new(Arc::clone(&store), &test_config()).unwrap();
        monitor.run_once().await.unwrap();

        let up_res = store.get_resource(up_id).await.unwrap().unwrap();
        assert_eq!(up_res.health_status, HealthStatus::Up);
        assert!(up_res.health_checked_at.is_some());

        let down_res = store.get_resource(down_id).await.unwrap().unwrap();
        assert_eq!(down_res.health_status, HealthStatus::Down);
        assert!(down_res.health_checked_at.is_some());

        let dead_res = store.get_resource(dead_id).await.unwrap().unwrap();
        assert_eq!(dead_res.health_status, HealthStatus::Down);
    }

    #[tokio::test]
    async fn start_and_shutdown_are_clean() {
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let monitor = HealthMonitor::new(store, &test_config()).unwrap();
        monitor.start();
        monitor.shutdown().await;
    }
}
