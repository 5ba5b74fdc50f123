//! Rate and time window tracking.
//!
//! Each (agent, grant) pair keeps a log of the instants at which an action
//! was allowed. Checking the limit and recording the new instant happen
//! under the same map entry lock, so two concurrent requests can never both
//! take the last slot.

use std::collections::VecDeque;

use agentid_types::{AgentId, GrantId, RateLimits, Schedule};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const MINUTE_SECS: i64 = 60;
const HOUR_SECS: i64 = 3600;

/// Key of one rate window: an agent's use of one grant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RateKey {
    pub agent_id: AgentId,
    pub grant_id: GrantId,
}

impl RateKey {
    pub fn new(agent_id: AgentId, grant_id: GrantId) -> Self {
        Self { agent_id, grant_id }
    }
}

/// A consumed unit of quota, returned by [`RateWindowTracker::try_acquire`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSlot {
    key: RateKey,
    /// `None` when the grant has no limits and nothing was recorded
    at: Option<DateTime<Utc>>,
}

impl RateSlot {
    pub fn key(&self) -> RateKey {
        self.key
    }
}

/// The limit for a window has been reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Rate limit of {limit} per {window_secs}s exceeded, retry after {retry_after_secs} seconds")]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub window_secs: i64,
    pub retry_after_secs: u64,
}

/// Allowed actions in the current windows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RateUsage {
    pub last_minute: u32,
    pub last_hour: u32,
}

/// Sliding-window rate tracker
#[derive(Debug, Default)]
pub struct RateWindowTracker {
    windows: DashMap<RateKey, VecDeque<DateTime<Utc>>>,
}

impl RateWindowTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically check both windows and record `now` if they admit it
    pub fn try_acquire(
        &self,
        key: RateKey,
        limits: &RateLimits,
        now: DateTime<Utc>,
    ) -> Result<RateSlot, RateLimitExceeded> {
        if limits.is_unlimited() {
            return Ok(RateSlot { key, at: None });
        }

        let mut log = self.windows.entry(key).or_default();
        let hour_start = now - Duration::seconds(HOUR_SECS);
        while log.front().is_some_and(|at| *at <= hour_start) {
            log.pop_front();
        }

        for (limit, window_secs) in [
            (limits.max_per_minute, MINUTE_SECS),
            (limits.max_per_hour, HOUR_SECS),
        ] {
            let Some(limit) = limit else { continue };
            let window_start = now - Duration::seconds(window_secs);
            let in_window: Vec<&DateTime<Utc>> =
                log.iter().filter(|at| **at > window_start && **at <= now).collect();

            if in_window.len() >= limit as usize {
                let oldest = in_window.iter().min().copied().copied().unwrap_or(now);
                let expires = oldest + Duration::seconds(window_secs);
                let retry_after_secs = (expires - now).num_seconds().max(1) as u64;
                debug!(
                    agent_id = %key.agent_id,
                    grant_id = %key.grant_id,
                    limit,
                    window_secs,
                    "rate window full"
                );
                return Err(RateLimitExceeded {
                    limit,
                    window_secs,
                    retry_after_secs,
                });
            }
        }

        log.push_back(now);
        Ok(RateSlot { key, at: Some(now) })
    }

    /// Give back a slot whose action ended up denied for another reason
    pub fn release(&self, slot: RateSlot) {
        let Some(at) = slot.at else { return };
        if let Some(mut log) = self.windows.get_mut(&slot.key) {
            if let Some(position) = log.iter().rposition(|entry| *entry == at) {
                log.remove(position);
            }
        }
    }

    /// Whether a schedule admits `now`; no schedule always admits
    pub fn window_admits(schedule: Option<&Schedule>, now: DateTime<Utc>) -> bool {
        schedule.map_or(true, |schedule| schedule.admits(now))
    }

    pub fn usage(&self, key: &RateKey, now: DateTime<Utc>) -> RateUsage {
        let Some(log) = self.windows.get(key) else {
            return RateUsage::default();
        };
        let count = |secs: i64| {
            let start = now - Duration::seconds(secs);
            log.iter().filter(|at| **at > start && **at <= now).count() as u32
        };
        RateUsage {
            last_minute: count(MINUTE_SECS),
            last_hour: count(HOUR_SECS),
        }
    }

    /// Drop keys with no activity in the last hour; returns how many
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let hour_start = now - Duration::seconds(HOUR_SECS);
        let before = self.windows.len();
        self.windows
            .retain(|_, log| log.iter().any(|at| *at > hour_start));
        before - self.windows.len()
    }
}
