use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::ScraperConfig;

/// Per-site request pacing. `acquire` hands back how long the caller must
/// sleep before issuing its request; the grant is recorded at permission
/// time, not at request completion, so back-to-back callers serialize
/// correctly even when the underlying fetch is slow.
pub struct RateGovernor {
    min_interval: Duration,
    jitter_max: Duration,
    overrides: HashMap<String, Duration>,
    next_slot: Mutex<HashMap<String, Instant>>,
}

impl RateGovernor {
    pub fn new(config: &ScraperConfig) -> Self {
        let overrides = config
            .site_intervals_ms
            .iter()
            .map(|(site, ms)| (site.clone(), clamp_interval(*ms)))
            .collect();

        Self {
            min_interval: clamp_interval(config.min_interval_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
            overrides,
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_interval(min_interval: Duration, jitter_max: Duration) -> Self {
        Self {
            min_interval,
            jitter_max,
            overrides: HashMap::new(),
            next_slot: Mutex::new(HashMap::new()),
        }
    }

    fn interval_for(&self, site_key: &str) -> Duration {
        self.overrides.get(site_key).copied().unwrap_or(self.min_interval)
    }

    /// Returns the duration the caller must wait before its request is
    /// permitted. State is partitioned by site key, so governors for
    /// different sites never delay each other.
    pub async fn acquire(&self, site_key: &str) -> Duration {
        let jitter = if self.jitter_max.is_zero() {
            Duration::ZERO
        } else {
            let max_ms = self.jitter_max.as_millis() as u64;
            Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
        };

        let interval = self.interval_for(site_key);
        let now = Instant::now();

        let mut slots = self.next_slot.lock().await;
        let earliest = match slots.get(site_key) {
            Some(prev_grant) => (*prev_grant + interval).max(now),
            None => now,
        };
        let permitted = earliest + jitter;
        slots.insert(site_key.to_string(), permitted);
        permitted.duration_since(now)
    }
}

fn clamp_interval(ms: i64) -> Duration {
    Duration::from_millis(ms.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn governor(interval_ms: u64) -> RateGovernor {
        RateGovernor::with_interval(Duration::from_millis(interval_ms), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let governor = governor(2000);
        assert_eq!(governor.acquire("ebay").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_sequential_acquires_space_out() {
        let governor = governor(100);
        let n = 5;

        let mut total = Duration::ZERO;
        for _ in 0..n {
            total += governor.acquire("ebay").await;
        }
        // N grants with interval T must force at least (N-1) * T of waiting.
        assert!(
            total >= Duration::from_millis(100 * (n - 1)),
            "total wait {:?} below floor",
            total
        );
    }

    #[tokio::test]
    async fn test_sites_do_not_block_each_other() {
        let governor = governor(5000);
        assert_eq!(governor.acquire("ebay").await, Duration::ZERO);
        assert_eq!(governor.acquire("mercadolivre").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_jitter_bounded() {
        let governor =
            RateGovernor::with_interval(Duration::ZERO, Duration::from_millis(50));
        // First grant per site waits for its jitter and nothing else.
        for site in 0..20 {
            let wait = governor.acquire(&format!("site{}", site)).await;
            assert!(wait <= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_negative_interval_clamps_to_zero() {
        let mut config = crate::config::ScraperConfig::default();
        config.min_interval_ms = -250;
        config.jitter_max_ms = 0;
        let governor = RateGovernor::new(&config);

        assert_eq!(governor.acquire("ebay").await, Duration::ZERO);
        assert_eq!(governor.acquire("ebay").await, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_per_site_override() {
        let mut config = crate::config::ScraperConfig::default();
        config.min_interval_ms = 0;
        config.jitter_max_ms = 0;
        config.site_intervals_ms.insert("ebay".into(), 300);
        let governor = RateGovernor::new(&config);

        assert_eq!(governor.acquire("ebay").await, Duration::ZERO);
        let second = governor.acquire("ebay").await;
        assert!(second >= Duration::from_millis(290), "override ignored: {:?}", second);
        // The default (zero) interval still applies to other sites.
        assert_eq!(governor.acquire("mercadolivre").await, Duration::ZERO);
        assert_eq!(governor.acquire("mercadolivre").await, Duration::ZERO);
    }
}
