use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Szereguje zapytania zewnętrzne: jedno naraz, z minimalną przerwą między nimi.
#[derive(Debug)]
pub struct QueryGate {
    min_interval: Duration,
    last_finished: Mutex<Option<Instant>>,
}

impl QueryGate {
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval, last_finished: Mutex::new(None) }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Czeka na swoją kolej, wykonuje `query` i zapamiętuje moment zakończenia.
    pub async fn run<F, T>(&self, query: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut last = self.last_finished.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if ready_at > Instant::now() {
                debug!("Geocoder gate: waiting {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        let out = query.await;
        *last = Some(Instant::now());
        out
    }
}
