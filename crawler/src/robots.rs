//! `robots.txt` parsing and the per-host politeness gate.
//!
//! The gate fails closed: when the robots file cannot be retrieved (transport
//! error, 5xx, 401/403) every URL on that host is denied for the rest of the
//! run. A 404 or other 4xx means the site has no robots file.

use crate::fetch::Fetcher;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Rules of the group that applies to one user agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Robots {
    pub allows: Vec<String>,
    pub disallows: Vec<String>,
    pub crawl_delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RobotsPolicy {
    Rules(Robots),
    AllowAll,
    DenyAll,
}

impl RobotsPolicy {
    pub fn allows(&self, path: &str) -> bool {
        match self {
            RobotsPolicy::Rules(rules) => path_allowed(path, rules),
            RobotsPolicy::AllowAll => true,
            RobotsPolicy::DenyAll => false,
        }
    }

    pub fn crawl_delay(&self) -> Option<Duration> {
        match self {
            RobotsPolicy::Rules(rules) => rules.crawl_delay,
            _ => None,
        }
    }
}

/// `examplebot/1.0 (+https://...)` -> `examplebot`
fn product_token(user_agent: &str) -> String {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .next()
        .unwrap_or("")
        .to_lowercase()
}

/// Picks the group naming our agent, falling back to `*`.
pub fn parse_robots(txt: &str, user_agent: &str) -> Robots {
    let agent = product_token(user_agent);
    let mut specific: Option<Robots> = None;
    let mut wildcard: Option<Robots> = None;

    let mut group_agents: Vec<String> = Vec::new();
    let mut in_rules = false;
    for line in txt.lines() {
        let l = line.split('#').next().unwrap_or("").trim();
        if l.is_empty() { continue; }
        let Some((k, v)) = l.split_once(':') else { continue };
        let key = k.trim().to_lowercase();
        let val = v.trim();

        if key == "user-agent" {
            if in_rules {
                group_agents.clear();
                in_rules = false;
            }
            group_agents.push(val.to_lowercase());
            continue;
        }
        in_rules = true;

        let names_us = group_agents.iter().any(|a| a != "*" && !agent.is_empty() && agent.contains(a.as_str()));
        let target = if names_us {
            specific.get_or_insert_with(Robots::default)
        } else if group_agents.iter().any(|a| a == "*") {
            wildcard.get_or_insert_with(Robots::default)
        } else {
            continue;
        };
        match key.as_str() {
            "allow" if !val.is_empty() => target.allows.push(val.to_string()),
            "disallow" if !val.is_empty() => target.disallows.push(val.to_string()),
            "crawl-delay" => {
                if let Ok(secs) = val.parse::<f64>() {
                    if secs.is_finite() && secs >= 0.0 {
                        target.crawl_delay = Some(Duration::from_secs_f64(secs));
                    }
                }
            }
            _ => {}
        }
    }
    specific.or(wildcard).unwrap_or_default()
}

/// Robots path pattern match: prefix match with `*` wildcards and a trailing `$` anchor.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or("");
    if !path.starts_with(first) {
        return false;
    }
    let mut rest = &path[first.len()..];
    let pieces: Vec<&str> = parts.collect();
    for (i, piece) in pieces.iter().enumerate() {
        let is_last = i + 1 == pieces.len();
        if is_last && anchored {
            return rest.ends_with(piece);
        }
        match rest.find(piece) {
            Some(idx) => rest = &rest[idx + piece.len()..],
            None => return false,
        }
    }
    !anchored || rest.is_empty()
}

/// Longest matching rule wins; Allow wins a tie.
pub fn path_allowed(path: &str, rules: &Robots) -> bool {
    let best = |patterns: &[String]| {
        patterns
            .iter()
            .filter(|p| pattern_matches(p, path))
            .map(|p| p.len())
            .max()
    };
    match (best(&rules.allows), best(&rules.disallows)) {
        (Some(a), Some(d)) => a >= d,
        (_, None) => true,
        (None, Some(_)) => false,
    }
}

/// Caches one policy per origin and agent for the lifetime of a crawl run.
#[derive(Default)]
pub struct PolitenessGate {
    cache: RwLock<HashMap<(String, String), Arc<RobotsPolicy>>>,
}

fn cache_key(url: &Url, user_agent: &str) -> Option<(String, String)> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some((origin.ascii_serialization(), product_token(user_agent)))
}

impl PolitenessGate {
    pub fn new() -> Self { Self::default() }

    /// True when the host's policy is not cached yet, so `can_fetch` will hit the network.
    pub fn needs_fetch(&self, url: &Url, user_agent: &str) -> bool {
        cache_key(url, user_agent).map_or(false, |key| !self.cache.read().contains_key(&key))
    }

    pub fn cached(&self, url: &Url, user_agent: &str) -> Option<Arc<RobotsPolicy>> {
        let key = cache_key(url, user_agent)?;
        self.cache.read().get(&key).cloned()
    }

    pub async fn policy<F: Fetcher>(&self, fetcher: &F, url: &Url, user_agent: &str) -> Arc<RobotsPolicy> {
        let Some(key) = cache_key(url, user_agent) else {
            return Arc::new(RobotsPolicy::DenyAll);
        };
        if let Some(policy) = self.cache.read().get(&key).cloned() {
            return policy;
        }
        let policy = Arc::new(fetch_policy(fetcher, &key.0, user_agent).await);
        self.cache.write().insert(key, policy.clone());
        policy
    }

    pub async fn can_fetch<F: Fetcher>(&self, fetcher: &F, url: &Url, user_agent: &str) -> bool {
        let policy = self.policy(fetcher, url, user_agent).await;
        let target = match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        };
        policy.allows(&target)
    }

    pub fn crawl_delay(&self, url: &Url, user_agent: &str) -> Option<Duration> {
        self.cached(url, user_agent).and_then(|p| p.crawl_delay())
    }
}

async fn fetch_policy<F: Fetcher>(fetcher: &F, origin: &str, user_agent: &str) -> RobotsPolicy {
    let robots_url = match Url::parse(&format!("{origin}/robots.txt")) {
        Ok(u) => u,
        Err(err) => {
            tracing::warn!(%origin, error = %err, "bad robots url, denying host");
            return RobotsPolicy::DenyAll;
        }
    };
    match fetcher.fetch(&robots_url).await {
        Ok(resp) if resp.is_success() => RobotsPolicy::Rules(parse_robots(&resp.body, user_agent)),
        Ok(resp) if resp.status == 401 || resp.status == 403 => {
            tracing::info!(%robots_url, status = resp.status, "robots access refused, denying host");
            RobotsPolicy::DenyAll
        }
        Ok(resp) if (400..500).contains(&resp.status) => RobotsPolicy::AllowAll,
        Ok(resp) => {
            tracing::warn!(%robots_url, status = resp.status, "robots unavailable, denying host");
            RobotsPolicy::DenyAll
        }
        Err(err) => {
            tracing::warn!(%robots_url, error = %err, "robots fetch failed, denying host");
            RobotsPolicy::DenyAll
        }
    }
}
