use chrono::{ Local, NaiveDate };
use log::{ debug, info };
use std::fmt;
use std::future::Future;
use tokio::sync::Mutex;

/// Calendar-day key, formatted `YYYY-MM-DD`, so string order is date order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_date(date: NaiveDate) -> Self {
        Self(date.format("%Y-%m-%d").to_string())
    }

    pub fn today() -> Self {
        Self::for_date(Local::now().date_naive())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the value computed for the most recent key. A call with another key
/// recomputes and replaces it, so yesterday's data is released once today's
/// has loaded.
///
/// The lock is never held while loading: two callers missing at the same time
/// both compute. A load that finishes after a newer key was stored is returned
/// to its caller but not kept.
pub struct DailyCache<V> {
    slot: Mutex<Option<(CacheKey, V)>>,
}

impl<V: Clone> DailyCache<V> {
    pub fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let slot = self.slot.lock().await;
        match slot.as_ref() {
            Some((cached, value)) if cached == key => Some(value.clone()),
            _ => None,
        }
    }

    pub async fn get_or_try_load<F, Fut, E>(&self, key: CacheKey, load: F) -> Result<V, E>
        where F: FnOnce() -> Fut, Fut: Future<Output = Result<V, E>>
    {
        if let Some(value) = self.get(&key).await {
            debug!("Cache hit for {}", key);
            return Ok(value);
        }

        info!("Cache miss for {}, loading", key);
        let value = load().await?;
        let mut slot = self.slot.lock().await;
        match slot.as_ref() {
            Some((current, _)) if *current > key => {
                debug!("Not caching {}: already holding {}", key, current);
            }
            _ => *slot = Some((key, value.clone())),
        }
        Ok(value)
    }
}

impl<V: Clone> Default for DailyCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
