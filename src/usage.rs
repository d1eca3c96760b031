//! # Usage Accumulator
//! Process-wide per-channel counters updated after each channel settles.
//! Lock-free: writers bump atomics, monitoring readers snapshot at any time
//! without blocking them. Read-only for consumers; never feeds back into
//! orchestration decisions.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::channel::Channel;

#[derive(Debug, Default)]
struct ChannelCounters {
    calls: AtomicU64,
    failures: AtomicU64,
    degraded: AtomicU64,
    latency_ms_total: AtomicU64,
}

impl ChannelCounters {
    fn record(&self, degraded: bool, failed: bool, latency_ms: u64) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if failed {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if degraded {
            self.degraded.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_ms_total.fetch_add(latency_ms, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ChannelUsage {
        let calls = self.calls.load(Ordering::Relaxed);
        let latency_total = self.latency_ms_total.load(Ordering::Relaxed);
        ChannelUsage {
            calls,
            failures: self.failures.load(Ordering::Relaxed),
            degraded: self.degraded.load(Ordering::Relaxed),
            avg_latency_ms: if calls > 0 { latency_total / calls } else { 0 },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelUsage {
    pub calls: u64,
    pub failures: u64,
    pub degraded: u64,
    pub avg_latency_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageSnapshot {
    pub produce_calls: u64,
    pub news: ChannelUsage,
    pub search: ChannelUsage,
    pub analysis: ChannelUsage,
    pub deep_research: ChannelUsage,
}

#[derive(Debug, Default)]
pub struct UsageAccumulator {
    produce_calls: AtomicU64,
    news: ChannelCounters,
    search: ChannelCounters,
    analysis: ChannelCounters,
    deep_research: ChannelCounters,
}

impl UsageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, channel: Channel) -> &ChannelCounters {
        match channel {
            Channel::News => &self.news,
            Channel::Search => &self.search,
            Channel::Analysis => &self.analysis,
            Channel::DeepResearch => &self.deep_research,
        }
    }

    /// Record one settled channel call.
    pub fn record_channel(&self, channel: Channel, degraded: bool, failed: bool, latency_ms: u64) {
        self.counters(channel).record(degraded, failed, latency_ms);
    }

    /// Record one completed produce call.
    pub fn record_produce(&self) {
        self.produce_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            produce_calls: self.produce_calls.load(Ordering::Relaxed),
            news: self.news.snapshot(),
            search: self.search.snapshot(),
            analysis: self.analysis.snapshot(),
            deep_research: self.deep_research.snapshot(),
        }
    }
}
