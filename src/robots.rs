use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Robots-permission decision, injected so tests can swap the policy out.
#[async_trait]
pub trait RobotsPolicy: Send + Sync {
    async fn is_allowed(&self, host: &str, path: &str) -> bool;
}

/// Permits everything. Used in tests and when `respect_robots` is disabled.
pub struct AllowAll;

#[async_trait]
impl RobotsPolicy for AllowAll {
    async fn is_allowed(&self, _host: &str, _path: &str) -> bool {
        true
    }
}

struct HostRules {
    disallow: Vec<String>,
    fetched_at: Instant,
}

/// Fetches and caches each host's robots.txt, re-checking after the TTL
/// expires so policy changes are picked up without unbounded staleness.
/// An unreachable or malformed robots file counts as "allow": false
/// blocking is worse than a wasted fetch, so it is only logged.
pub struct RobotsCache {
    http: reqwest::Client,
    ttl: Duration,
    hosts: RwLock<HashMap<String, HostRules>>,
}

impl RobotsCache {
    pub fn new(http: reqwest::Client, ttl: Duration) -> Self {
        Self {
            http,
            ttl,
            hosts: RwLock::new(HashMap::new()),
        }
    }

    /// Extracts the `Disallow` prefixes of the `User-agent: *` group.
    fn parse_rules(body: &str) -> Vec<String> {
        let mut disallow = Vec::new();
        let mut group_applies = false;
        let mut in_group_header = false;

        for line in body.lines() {
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim().to_ascii_lowercase();
            let value = value.trim();

            match field.as_str() {
                "user-agent" => {
                    // Consecutive user-agent lines share the rule group that
                    // follows them.
                    if !in_group_header {
                        group_applies = false;
                        in_group_header = true;
                    }
                    if value == "*" {
                        group_applies = true;
                    }
                }
                "disallow" => {
                    in_group_header = false;
                    if group_applies && !value.is_empty() {
                        disallow.push(value.to_string());
                    }
                }
                _ => {
                    in_group_header = false;
                }
            }
        }

        disallow
    }

    async fn fetch_rules(&self, host: &str) -> Vec<String> {
        let robots_url = format!("https://{}/robots.txt", host);
        match self.http.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => {
                    let rules = Self::parse_rules(&body);
                    debug!(host, rules = rules.len(), "robots.txt cached");
                    rules
                }
                Err(err) => {
                    warn!(host, %err, "robots.txt body unreadable, assuming allowed");
                    Vec::new()
                }
            },
            Ok(resp) => {
                debug!(host, status = %resp.status(), "no usable robots.txt, assuming allowed");
                Vec::new()
            }
            Err(err) => {
                warn!(host, %err, "robots.txt unreachable, assuming allowed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl RobotsPolicy for RobotsCache {
    async fn is_allowed(&self, host: &str, path: &str) -> bool {
        {
            let hosts = self.hosts.read().await;
            if let Some(rules) = hosts.get(host) {
                if rules.fetched_at.elapsed() < self.ttl {
                    return !rules.disallow.iter().any(|prefix| path.starts_with(prefix));
                }
            }
        }

        let disallow = self.fetch_rules(host).await;
        let allowed = !disallow.iter().any(|prefix| path.starts_with(prefix));

        let mut hosts = self.hosts.write().await;
        hosts.insert(
            host.to_string(),
            HostRules {
                disallow,
                fetched_at: Instant::now(),
            },
        );
        allowed
    }
}
