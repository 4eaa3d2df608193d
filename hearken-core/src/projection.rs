//! Derived-view projections.
//!
//! Deterministic transforms from raw paginated or aggregate payloads into
//! the shapes views display. Breakdowns can be produced either from a
//! server-side aggregate or by recomputing over a topic's linked inputs; the
//! result records which path produced it and neither is treated as more
//! authoritative than the other.

use crate::entities::{Input, InputStats, Page, Topic};
use crate::enums::{Sentiment, Severity};
use crate::identity::ThemeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

// ============================================================================
// PAGINATION
// ============================================================================

/// Pagination metadata for list views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    /// 1-based current page.
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    /// 1-based index of the first item on this page, 0 when the page is empty.
    pub first_item: u64,
    /// 1-based index of the last item on this page, 0 when the page is empty.
    pub last_item: u64,
}

impl PaginationMeta {
    pub fn new(total: u64, page: u32, page_size: u32) -> Self {
        let page = page.max(1);
        let total_pages = if page_size == 0 {
            0
        } else {
            u32::try_from(total.div_ceil(u64::from(page_size))).unwrap_or(u32::MAX)
        };

        let offset = u64::from(page - 1) * u64::from(page_size);
        let (first_item, last_item) = if page_size == 0 || offset >= total {
            (0, 0)
        } else {
            (offset + 1, (offset + u64::from(page_size)).min(total))
        };

        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: page < total_pages,
            has_previous: page > 1,
            first_item,
            last_item,
        }
    }

    pub fn from_page<T>(page: &Page<T>) -> Self {
        Self::new(page.total, page.page, page.page_size)
    }
}

// ============================================================================
// BREAKDOWNS
// ============================================================================

/// Where a derived figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakdownSource {
    ServerAggregate,
    Recomputed,
}

/// Count distribution over a small closed set of categories.
///
/// Every category is present, with zero when nothing fell into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown<K: Ord> {
    pub counts: BTreeMap<K, u64>,
    /// Items that carried no value for this dimension (not yet analysed).
    pub unclassified: u64,
    pub source: BreakdownSource,
}

impl<K: Ord + Copy> Breakdown<K> {
    fn zeroed(categories: &[K], source: BreakdownSource) -> Self {
        Self {
            counts: categories.iter().map(|k| (*k, 0)).collect(),
            unclassified: 0,
            source,
        }
    }

    /// Number of classified items.
    pub fn classified(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn count(&self, key: K) -> u64 {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// Share of classified items in `key`, in percent. Zero when nothing
    /// has been classified.
    pub fn percentage(&self, key: K) -> f64 {
        let classified = self.classified();
        if classified == 0 {
            0.0
        } else {
            self.count(key) as f64 * 100.0 / classified as f64
        }
    }

    /// Category with the highest count. Ties resolve to the smallest key;
    /// `None` when nothing is classified.
    pub fn dominant(&self) -> Option<K> {
        let mut best: Option<(K, u64)> = None;
        for (key, count) in &self.counts {
            if *count == 0 {
                continue;
            }
            match best {
                Some((_, best_count)) if best_count >= *count => {}
                _ => best = Some((*key, *count)),
            }
        }
        best.map(|(key, _)| key)
    }
}

pub type SentimentBreakdown = Breakdown<Sentiment>;
pub type SeverityBreakdown = Breakdown<Severity>;

/// Sentiment distribution from a server aggregate.
pub fn sentiment_from_stats(stats: &InputStats) -> SentimentBreakdown {
    let mut breakdown = Breakdown::zeroed(&Sentiment::ALL, BreakdownSource::ServerAggregate);
    for (sentiment, count) in &stats.by_sentiment {
        breakdown.counts.insert(*sentiment, *count);
    }
    breakdown.unclassified = stats.total.saturating_sub(breakdown.classified());
    breakdown
}

/// Sentiment distribution recomputed from raw inputs.
pub fn sentiment_from_inputs(inputs: &[Input]) -> SentimentBreakdown {
    let mut breakdown = Breakdown::zeroed(&Sentiment::ALL, BreakdownSource::Recomputed);
    for input in inputs {
        match input.sentiment {
            Some(sentiment) => *breakdown.counts.entry(sentiment).or_insert(0) += 1,
            None => breakdown.unclassified += 1,
        }
    }
    breakdown
}

/// Severity distribution from a server aggregate.
pub fn severity_from_stats(stats: &InputStats) -> SeverityBreakdown {
    let mut breakdown = Breakdown::zeroed(&Severity::ALL, BreakdownSource::ServerAggregate);
    for (severity, count) in &stats.by_severity {
        breakdown.counts.insert(*severity, *count);
    }
    breakdown.unclassified = stats.total.saturating_sub(breakdown.classified());
    breakdown
}

/// Severity distribution recomputed from raw inputs.
pub fn severity_from_inputs(inputs: &[Input]) -> SeverityBreakdown {
    let mut breakdown = Breakdown::zeroed(&Severity::ALL, BreakdownSource::Recomputed);
    for input in inputs {
        match input.severity {
            Some(severity) => *breakdown.counts.entry(severity).or_insert(0) += 1,
            None => breakdown.unclassified += 1,
        }
    }
    breakdown
}

// ============================================================================
// QUALITY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityAverage {
    /// `None` when no sample carried a score.
    pub average: Option<f64>,
    pub sample_size: u64,
    pub source: BreakdownSource,
}

pub fn quality_from_stats(stats: &InputStats) -> QualityAverage {
    QualityAverage {
        average: stats.average_quality,
        sample_size: stats.total,
        source: BreakdownSource::ServerAggregate,
    }
}

pub fn quality_from_inputs(inputs: &[Input]) -> QualityAverage {
    let scores: Vec<f64> = inputs
        .iter()
        .filter_map(|input| input.quality_score)
        .filter(|score| score.is_finite())
        .collect();
    let average = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };
    QualityAverage {
        average,
        sample_size: scores.len() as u64,
        source: BreakdownSource::Recomputed,
    }
}

// ============================================================================
// THEMES
// ============================================================================

/// Themes ranked by how many inputs reference them, most frequent first.
/// Ties keep a stable order by theme id.
pub fn theme_frequency(inputs: &[Input]) -> Vec<(ThemeId, u64)> {
    let mut counts: HashMap<ThemeId, u64> = HashMap::new();
    for theme_id in inputs.iter().filter_map(|input| input.theme_id) {
        *counts.entry(theme_id).or_insert(0) += 1;
    }
    let mut ranked: Vec<(ThemeId, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

// ============================================================================
// COMPOSITE VIEWS
// ============================================================================

/// Everything a topic detail view derives from its linked inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicOverview {
    pub input_count: u64,
    pub sentiment: SentimentBreakdown,
    pub severity: SeverityBreakdown,
    pub quality: QualityAverage,
    pub top_themes: Vec<(ThemeId, u64)>,
    pub has_summary: bool,
}

pub fn topic_overview(topic: &Topic) -> TopicOverview {
    TopicOverview {
        input_count: topic.inputs.len() as u64,
        sentiment: sentiment_from_inputs(&topic.inputs),
        severity: severity_from_inputs(&topic.inputs),
        quality: quality_from_inputs(&topic.inputs),
        top_themes: theme_frequency(&topic.inputs),
        has_summary: topic.summary.is_some(),
    }
}

/// Dashboard figures from the server aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsOverview {
    pub total: u64,
    pub sentiment: SentimentBreakdown,
    pub severity: SeverityBreakdown,
    pub quality: QualityAverage,
}

pub fn stats_overview(stats: &InputStats) -> StatsOverview {
    StatsOverview {
        total: stats.total,
        sentiment: sentiment_from_stats(stats),
        severity: severity_from_stats(stats),
        quality: quality_from_stats(stats),
    }
}
