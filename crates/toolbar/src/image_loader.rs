use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::ToolbarConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum CachePolicy {
    #[default]
    Unbounded,
    /// Keeps at most `capacity` sources, evicting the oldest first.
    Bounded { capacity: usize },
}

/// Sources known to have loaded.
#[derive(Debug, Clone, Default)]
pub struct ImageCache {
    policy: CachePolicy,
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl ImageCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            seen: HashSet::new(),
            order: VecDeque::new(),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(CachePolicy::Unbounded)
    }

    pub fn bounded(capacity: usize) -> Self {
        Self::new(CachePolicy::Bounded { capacity })
    }

    pub fn contains(&self, src: &str) -> bool {
        self.seen.contains(src)
    }

    pub fn insert(&mut self, src: &str) {
        if !self.seen.insert(src.to_string()) {
            return;
        }
        self.order.push_back(src.to_string());
        if let CachePolicy::Bounded { capacity } = self.policy {
            while self.order.len() > capacity {
                if let Some(evicted) = self.order.pop_front() {
                    self.seen.remove(&evicted);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Ready,
    /// Rendering waits for `signal_loaded`.
    Suspended,
    TimedOut,
}

/// Tracks image loads. A source renders once its load was signalled; until
/// then every request suspends.
#[derive(Debug)]
pub struct ImageLoader {
    cache: ImageCache,
    pending: HashMap<String, Instant>,
    timeout: Option<Duration>,
}

impl ImageLoader {
    pub fn new(cache: ImageCache, timeout: Option<Duration>) -> Self {
        Self {
            cache,
            pending: HashMap::new(),
            timeout,
        }
    }

    pub fn from_config(config: &ToolbarConfig) -> Self {
        Self::new(
            ImageCache::new(config.image_cache),
            config.image_load_timeout_ms.map(Duration::from_millis),
        )
    }

    pub fn cache(&self) -> &ImageCache {
        &self.cache
    }

    pub fn is_pending(&self, src: &str) -> bool {
        self.pending.contains_key(src)
    }

    pub fn request(&mut self, src: &str, now: Instant) -> LoadState {
        if self.cache.contains(src) {
            return LoadState::Ready;
        }
        let started = *self.pending.entry(src.to_string()).or_insert(now);
        if let Some(timeout) = self.timeout
            && now.saturating_duration_since(started) >= timeout
        {
            self.pending.remove(src);
            tracing::warn!(src, "image load timed out");
            return LoadState::TimedOut;
        }
        LoadState::Suspended
    }

    /// Resolves the pending load of `src`. Returns false when nothing was
    /// waiting for it, including a second signal for the same load.
    pub fn signal_loaded(&mut self, src: &str) -> bool {
        if self.pending.remove(src).is_none() {
            return false;
        }
        self.cache.insert(src);
        true
    }
}
