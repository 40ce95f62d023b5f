//! Ingestion scheduler
//!
//! A single supervised task drives the pipeline on a fixed interval:
//! token -> fetch -> reconcile -> upsert -> notify. The sleep starts after
//! the cycle completes, so cycle duration adds to the effective period.
//! Errors are caught at the cycle boundary and logged; the loop itself
//! never stops. Cycles are strictly serial: the scheduler and the
//! on-demand endpoint serialize on an internal cycle lock, so two cycles
//! can never reconcile the same batch and publish it twice.

use crate::libre::{LibreClient, TokenCache};
use glucolog_common::db::models::Observation;
use glucolog_common::db::readings::{fetch_readings, upsert_readings, ReadingQuery};
use glucolog_common::events::{EventBus, GlucoseEvent};
use glucolog_common::{time, Result};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Drives periodic remote ingestion
pub struct Ingestor {
    db: SqlitePool,
    events: Arc<EventBus>,
    tokens: TokenCache,
    client: LibreClient,
    poll_interval: Duration,
    cycle_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        db: SqlitePool,
        events: Arc<EventBus>,
        tokens: TokenCache,
        client: LibreClient,
        poll_interval: Duration,
    ) -> Self {
        Self {
            db,
            events,
            tokens,
            client,
            poll_interval,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Run the ingestion loop until the task is cancelled
    ///
    /// A failed cycle is logged and swallowed; the next cycle begins after
    /// the fixed sleep regardless of the prior outcome. There is no backoff.
    pub async fn run(&self) {
        info!(
            "Ingestion scheduler started (interval {}s)",
            self.poll_interval.as_secs()
        );
        loop {
            if let Err(e) = self.fetch_and_store().await {
                warn!("Ingestion cycle failed: {e}");
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Run one ingestion cycle, returning the full fetched batch
    ///
    /// Also serves the on-demand `/remote` endpoint. Concurrent callers
    /// serialize on the cycle lock: a cycle that reconciled a batch has
    /// committed and published it before the next one starts, so the same
    /// observation cannot be announced twice.
    pub async fn fetch_and_store(&self) -> Result<Vec<Observation>> {
        let _cycle = self.cycle_lock.lock().await;

        let token = self.tokens.get_token().await?;
        let fetched = self.client.fetch(&token).await?;
        if fetched.observations.is_empty() {
            debug!("Remote returned no observations");
            return Ok(Vec::new());
        }

        let delta = reconcile_and_store(&self.db, &self.events, &fetched.observations).await?;
        info!(
            "Ingested {} observations ({} new)",
            fetched.observations.len(),
            delta.len()
        );

        Ok(fetched.observations)
    }
}

/// Reconcile a fetched batch against the store, upsert it, and publish the
/// delta of genuinely new observations
///
/// The delta is keyed on timestamp: an observation is new iff its timestamp
/// was absent from the store immediately before this call. The full batch is
/// always upserted because already-seen timestamps may carry corrected
/// values. The event is published only after the upsert transaction commits,
/// so subscribers never hear about data that failed to persist. Empty deltas
/// are not published.
pub async fn reconcile_and_store(
    db: &SqlitePool,
    events: &EventBus,
    observations: &[Observation],
) -> Result<Vec<Observation>> {
    let batch = collapse_batch(observations);
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let min_ts = batch.iter().map(|o| o.timestamp).min().unwrap_or(0);
    let stored = fetch_readings(
        db,
        &ReadingQuery {
            from_ts: Some(min_ts),
            ..Default::default()
        },
    )
    .await?;
    let known: HashSet<i64> = stored.iter().map(|r| r.timestamp).collect();

    let delta: Vec<Observation> = batch
        .iter()
        .filter(|o| !known.contains(&o.timestamp))
        .copied()
        .collect();

    upsert_readings(db, &batch).await?;

    if !delta.is_empty() {
        let delivered = events.emit(GlucoseEvent::ReadingsDiscovered {
            readings: delta.clone(),
            timestamp: time::now(),
        });
        debug!(
            "Published {} new observations to {} subscribers",
            delta.len(),
            delivered
        );
    }

    Ok(delta)
}

/// Collapse repeated timestamps within one batch, keeping the last value
/// seen for each (the live snapshot can repeat the newest graph point, and
/// the later occurrence is what the upsert would leave in the store).
/// First-appearance order is preserved.
fn collapse_batch(observations: &[Observation]) -> Vec<Observation> {
    let mut order: Vec<i64> = Vec::with_capacity(observations.len());
    let mut latest: std::collections::HashMap<i64, f64> =
        std::collections::HashMap::with_capacity(observations.len());

    for observation in observations {
        if latest.insert(observation.timestamp, observation.value).is_none() {
            order.push(observation.timestamp);
        }
    }

    order
        .into_iter()
        .map(|timestamp| Observation {
            value: latest[&timestamp],
            timestamp,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glucolog_common::config::LibreConfig;
    use glucolog_common::db::init_memory_database;
    use glucolog_common::db::readings::fetch_readings;

    fn obs(value: f64, timestamp: i64) -> Observation {
        Observation { value, timestamp }
    }

    async fn test_ingestor(dir: &tempfile::TempDir) -> Ingestor {
        // Closed port: any remote call fails fast
        let config = LibreConfig {
            host: "http://127.0.0.1:9".to_string(),
            email: "user@example.com".to_string(),
            password: "hunter2".to_string(),
            patient_id: "abc-123".to_string(),
        };
        Ingestor::new(
            init_memory_database().await.unwrap(),
            Arc::new(EventBus::new(16)),
            TokenCache::new(&config, dir.path().join("token.json")).unwrap(),
            LibreClient::new(&config).unwrap(),
            Duration::from_secs(60),
        )
    }

    fn event_readings(event: &GlucoseEvent) -> &[Observation] {
        match event {
            GlucoseEvent::ReadingsDiscovered { readings, .. } => readings,
        }
    }

    #[test]
    fn test_collapse_batch_keeps_last_value_per_timestamp() {
        let collapsed = collapse_batch(&[obs(5.4, 100), obs(5.6, 200), obs(5.7, 200)]);
        assert_eq!(collapsed, vec![obs(5.4, 100), obs(5.7, 200)]);
    }

    #[tokio::test]
    async fn test_delta_contains_only_unseen_timestamps() {
        let pool = init_memory_database().await.unwrap();
        let events = EventBus::new(16);
        upsert_readings(&pool, &[obs(5.0, 100), obs(5.1, 200)])
            .await
            .unwrap();

        let batch = [obs(9.9, 100), obs(5.2, 300), obs(5.3, 400)];
        let delta = reconcile_and_store(&pool, &events, &batch).await.unwrap();

        // 100 is a value correction, not a new observation
        assert_eq!(delta, vec![obs(5.2, 300), obs(5.3, 400)]);

        // The correction was still persisted
        let rows = fetch_readings(&pool, &ReadingQuery::default()).await.unwrap();
        let stored: Vec<Observation> = rows.iter().map(|r| r.observation()).collect();
        assert_eq!(
            stored,
            vec![obs(9.9, 100), obs(5.1, 200), obs(5.2, 300), obs(5.3, 400)]
        );
    }

    #[tokio::test]
    async fn test_delta_published_to_subscribers_after_commit() {
        let pool = init_memory_database().await.unwrap();
        let events = EventBus::new(16);
        let mut rx = events.subscribe();

        let delta = reconcile_and_store(&pool, &events, &[obs(4.8, 100)])
            .await
            .unwrap();
        assert_eq!(delta, vec![obs(4.8, 100)]);

        let event = rx.recv().await.unwrap();
        assert_eq!(event_readings(&event), &[obs(4.8, 100)]);

        // The published observation is already durable
        let rows = fetch_readings(&pool, &ReadingQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_delta_is_not_published() {
        let pool = init_memory_database().await.unwrap();
        let events = EventBus::new(16);
        upsert_readings(&pool, &[obs(5.0, 100)]).await.unwrap();
        let mut rx = events.subscribe();

        // Same timestamp, corrected value: persisted but not announced
        let delta = reconcile_and_store(&pool, &events, &[obs(6.0, 100)])
            .await
            .unwrap();
        assert!(delta.is_empty());
        assert!(rx.try_recv().is_err());

        let rows = fetch_readings(&pool, &ReadingQuery::default()).await.unwrap();
        assert_eq!(rows[0].value, 6.0);
    }

    #[tokio::test]
    async fn test_repeated_cycle_publishes_each_observation_at_most_once() {
        let pool = init_memory_database().await.unwrap();
        let events = EventBus::new(16);
        let mut rx = events.subscribe();

        let batch = [obs(5.0, 100), obs(5.1, 200)];
        reconcile_and_store(&pool, &events, &batch).await.unwrap();
        rx.recv().await.unwrap();

        // The second cycle re-fetches the same window; nothing is new
        let delta = reconcile_and_store(&pool, &events, &batch).await.unwrap();
        assert!(delta.is_empty());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_cycles_are_mutually_exclusive() {
        // An on-demand fetch racing the scheduler must not start a second
        // cycle while one is in flight; otherwise both could reconcile the
        // same batch before either commits and publish the delta twice
        let dir = tempfile::tempdir().unwrap();
        let ingestor = Arc::new(test_ingestor(&dir).await);

        let guard = ingestor.cycle_lock.lock().await;

        let racing = tokio::spawn({
            let ingestor = ingestor.clone();
            async move { ingestor.fetch_and_store().await }
        });

        // The racing cycle cannot begin while another holds the lock
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!racing.is_finished());

        drop(guard);
        let result = tokio::time::timeout(Duration::from_secs(5), racing)
            .await
            .expect("racing cycle never ran after the lock was released")
            .unwrap();
        // It then proceeds normally (and fails against the unreachable host)
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_duplicate_of_graph_point_counts_once() {
        let pool = init_memory_database().await.unwrap();
        let events = EventBus::new(16);
        let mut rx = events.subscribe();

        // Live snapshot repeats the newest graph timestamp with a fresher value
        let batch = [obs(5.6, 100), obs(5.7, 100)];
        let delta = reconcile_and_store(&pool, &events, &batch).await.unwrap();
        assert_eq!(delta, vec![obs(5.7, 100)]);

        let event = rx.recv().await.unwrap();
        assert_eq!(event_readings(&event), &[obs(5.7, 100)]);

        let rows = fetch_readings(&pool, &ReadingQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 5.7);
    }
}
