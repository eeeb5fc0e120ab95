use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeekAggregate {
    pub avg_rating: f64,
    pub review_count: u32,
    /// Reviews rated 2 stars or lower, a subset of `review_count`.
    #[serde(default)]
    pub negative_count: u32,
}

/// One monitored location with this week's and (if known) last week's aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationWeeklyStat {
    pub region: String,
    pub location_name: String,
    #[serde(default)]
    pub previous: Option<WeekAggregate>,
    pub current: WeekAggregate,
}

impl LocationWeeklyStat {
    pub fn delta_rating(&self) -> Option<f64> {
        self.previous
            .map(|prev| self.current.avg_rating - prev.avg_rating)
    }

    pub fn delta_reviews(&self) -> Option<i64> {
        self.previous
            .map(|prev| i64::from(self.current.review_count) - i64::from(prev.review_count))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedRow {
    pub region: String,
    pub location_name: String,
    pub avg_rating_prev: Option<f64>,
    pub avg_rating_curr: f64,
    pub review_count_prev: Option<u32>,
    pub review_count_curr: u32,
    pub negative_count_curr: u32,
    pub delta_rating: Option<f64>,
    pub delta_reviews: Option<i64>,
}

impl RankedRow {
    pub fn from_stat(stat: &LocationWeeklyStat) -> Self {
        Self {
            region: stat.region.clone(),
            location_name: stat.location_name.clone(),
            avg_rating_prev: stat.previous.map(|prev| prev.avg_rating),
            avg_rating_curr: stat.current.avg_rating,
            review_count_prev: stat.previous.map(|prev| prev.review_count),
            review_count_curr: stat.current.review_count,
            negative_count_curr: stat.current.negative_count,
            delta_rating: stat.delta_rating(),
            delta_reviews: stat.delta_reviews(),
        }
    }

    /// Review growth used for volume ordering; first observations count their
    /// current reviews alone.
    pub fn volume_key(&self) -> i64 {
        self.delta_reviews
            .unwrap_or_else(|| i64::from(self.review_count_curr))
    }

    pub fn negative_share(&self) -> Option<f64> {
        (self.review_count_curr > 0)
            .then(|| f64::from(self.negative_count_curr) / f64::from(self.review_count_curr))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SourceKind {
    Serious,
    Boulevard,
    Neutral,
}

impl SourceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Serious => "seriös",
            Self::Boulevard => "Boulevard",
            Self::Neutral => "neutral/spekulativ",
        }
    }

    pub const fn base_score(self) -> u8 {
        match self {
            Self::Serious => 3,
            Self::Boulevard => 2,
            Self::Neutral => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub source: String,
    pub kind: SourceKind,
    pub score: u8,
    pub published: Option<DateTime<Utc>>,
}

impl NewsItem {
    pub fn why(&self) -> &'static str {
        if self.score >= 4 {
            "relevant"
        } else {
            "beobachten"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrgentHit {
    pub title: String,
    pub link: String,
}
