//! # Source Credibility
//!
//! Pure, side-effect-free scoring of source references by domain trust tier:
//!
//! - Tier 1: regulators, wire services, primary data (weight 1.0)
//! - Tier 2: general reputable media (0.7)
//! - Tier 3: aggregators and forums (0.4)
//! - Tier 4: unknown/unclassified (0.2)
//!
//! - Loads the tier table from JSON config, falling back to a built-in seed.
//! - Host matching is case-insensitive and subdomain-aware
//!   (`markets.reuters.com` matches `reuters.com`).
//! - Aggregation yields a composite score in `[0, 1]`, a tier histogram,
//!   and a top-sources shortlist for presentation.

use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs, path::Path};

use crate::channel::{Channel, SourceReference};

/// Weight boost for sources surfaced by the deep-research channel,
/// reflecting its higher editorial depth. Capped at 1.0.
const DEEP_RESEARCH_BOOST: f32 = 1.1;

/// A source reference plus its assigned trust tier and weight.
/// Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredSource {
    #[serde(flatten)]
    pub source: SourceReference,
    pub channel: Channel,
    pub tier: u8,
    pub weight: f32,
}

/// Count of sources per trust tier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierHistogram {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
    pub tier4: usize,
}

impl TierHistogram {
    fn bump(&mut self, tier: u8) {
        match tier {
            1 => self.tier1 += 1,
            2 => self.tier2 += 1,
            3 => self.tier3 += 1,
            _ => self.tier4 += 1,
        }
    }
}

/// Aggregated credibility over all sources of one orchestration call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredibilityReport {
    /// Weighted composite in `[0, 1]`; 0.0 for an empty source set.
    pub composite: f32,
    pub histogram: TierHistogram,
    /// Highest-weight sources, capped at the configured shortlist size.
    pub top_sources: Vec<ScoredSource>,
}

/// Domain → tier table, loaded from JSON or seeded with defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct CredibilityTable {
    /// Canonical domain (no scheme, no `www.`) → tier 1..=3.
    /// Anything unlisted is tier 4.
    #[serde(default)]
    pub domains: HashMap<String, u8>,
}

impl CredibilityTable {
    /// Load from a JSON file; falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|_| Self::default_seed()),
            Err(_) => Self::default_seed(),
        }
    }

    /// Built-in seed covering common regulatory, media, and forum domains.
    pub fn default_seed() -> Self {
        let mut domains = HashMap::new();
        for (d, t) in [
            // Tier 1: regulators, wire services, primary data.
            ("sec.gov", 1u8),
            ("federalreserve.gov", 1),
            ("europa.eu", 1),
            ("reuters.com", 1),
            ("apnews.com", 1),
            ("bloomberg.com", 1),
            // Tier 2: general reputable media.
            ("wsj.com", 2),
            ("ft.com", 2),
            ("nytimes.com", 2),
            ("economist.com", 2),
            ("cnbc.com", 2),
            ("forbes.com", 2),
            ("techcrunch.com", 2),
            ("theverge.com", 2),
            ("wired.com", 2),
            // Tier 3: aggregators and forums.
            ("news.ycombinator.com", 3),
            ("reddit.com", 3),
            ("medium.com", 3),
            ("substack.com", 3),
            ("seekingalpha.com", 3),
            ("quora.com", 3),
        ] {
            domains.insert(d.to_string(), t);
        }
        Self { domains }
    }

    /// Classify a URL's domain into `(tier, weight)`.
    ///
    /// Steps:
    /// 1. Extract and normalize the host (strip scheme, port, `www.`).
    /// 2. Exact domain match.
    /// 3. Parent-domain match (walk subdomain labels off the front).
    /// 4. Tier 4 default.
    pub fn score_url(&self, url: &str) -> (u8, f32) {
        let host = host_of(url);

        if let Some(&t) = self.domains.get(host.as_str()) {
            return (t, weight_for_tier(t));
        }

        let mut rest = host.as_str();
        while let Some(idx) = rest.find('.') {
            rest = &rest[idx + 1..];
            if let Some(&t) = self.domains.get(rest) {
                return (t, weight_for_tier(t));
            }
        }

        (4, weight_for_tier(4))
    }

    /// Attach tier and weight to a source produced by `channel`.
    /// Deep-research sources get a mild boost, capped at 1.0.
    pub fn score(&self, channel: Channel, source: &SourceReference) -> ScoredSource {
        let (tier, base) = self.score_url(&source.url);
        let weight = if channel == Channel::DeepResearch {
            clamp01(base * DEEP_RESEARCH_BOOST)
        } else {
            base
        };
        ScoredSource {
            source: source.clone(),
            channel,
            tier,
            weight,
        }
    }

    /// Weighted composite plus histogram and shortlist. Empty input yields
    /// composite 0.0, never NaN.
    pub fn aggregate(&self, scored: &[ScoredSource], top_limit: usize) -> CredibilityReport {
        let mut histogram = TierHistogram::default();
        let mut sum = 0.0f32;
        for s in scored {
            histogram.bump(s.tier);
            sum += s.weight;
        }
        let composite = if scored.is_empty() {
            0.0
        } else {
            clamp01(sum / scored.len() as f32)
        };

        let mut top: Vec<ScoredSource> = scored.to_vec();
        top.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        top.truncate(top_limit);

        CredibilityReport {
            composite,
            histogram,
            top_sources: top,
        }
    }
}

/// Map a tier to its base weight.
pub fn weight_for_tier(tier: u8) -> f32 {
    match tier {
        1 => 1.0,
        2 => 0.7,
        3 => 0.4,
        _ => 0.2,
    }
}

/// Extract a normalized host from a URL-ish string: lowercase, scheme,
/// port, path, and leading `www.` stripped.
fn host_of(url: &str) -> String {
    let s = url.trim().to_ascii_lowercase();
    let s = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        .unwrap_or(&s);
    let s = s.split(['/', '?', '#']).next().unwrap_or("");
    let s = s.split('@').next_back().unwrap_or("");
    let s = s.split(':').next().unwrap_or("");
    s.strip_prefix("www.").unwrap_or(s).to_string()
}

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}
