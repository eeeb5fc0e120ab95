use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::config::AppConfig;
use crate::db;
use crate::models::{LocationWeeklyStat, WeekAggregate};

/// Where the weekly per-location aggregates come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StatsSource {
    /// Snapshot history in Postgres (`DATABASE_URL`)
    Db,
    /// A JSON document from `--stats-file` or `WEEKLY_REVIEWS_JSON`
    Json,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatsDocument {
    List(Vec<StatRecord>),
    Wrapped {
        #[serde(default)]
        stores: Vec<StatRecord>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatRecord {
    Weekly(LocationWeeklyStat),
    Summary(StoreSummary),
}

/// Flat per-store record of the older weekly export: this week's average,
/// its change against last week and the week's review counts.
#[derive(Deserialize)]
struct StoreSummary {
    #[serde(default)]
    region: String,
    name: String,
    avg_rating: f64,
    #[serde(default)]
    new_reviews: u32,
    #[serde(default)]
    new_negative: u32,
    delta_rating: Option<f64>,
}

impl From<StatRecord> for LocationWeeklyStat {
    fn from(record: StatRecord) -> Self {
        match record {
            StatRecord::Weekly(stat) => stat,
            // Last week's review count is not part of the summary, so the
            // whole week counts as growth, as for a first observation.
            StatRecord::Summary(store) => LocationWeeklyStat {
                region: store.region,
                location_name: store.name,
                previous: store.delta_rating.map(|delta| WeekAggregate {
                    avg_rating: store.avg_rating - delta,
                    review_count: 0,
                    negative_count: 0,
                }),
                current: WeekAggregate {
                    avg_rating: store.avg_rating,
                    review_count: store.new_reviews,
                    negative_count: store.new_negative,
                },
            },
        }
    }
}

/// Accepts either a bare array or `{"stores": [...]}`, holding weekly records
/// or flat store summaries. Blank input means no locations; malformed input
/// is an error so a broken export never produces an empty-looking report.
pub fn parse_stats_json(raw: &str) -> anyhow::Result<Vec<LocationWeeklyStat>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    let records = match serde_json::from_str::<StatsDocument>(raw)
        .context("weekly review JSON does not match the expected shape")?
    {
        StatsDocument::List(records) => records,
        StatsDocument::Wrapped { stores } => stores,
    };
    let stats: Vec<LocationWeeklyStat> = records.into_iter().map(Into::into).collect();

    for stat in &stats {
        let ratings = std::iter::once(stat.current.avg_rating)
            .chain(stat.previous.map(|prev| prev.avg_rating));
        for rating in ratings {
            if !(0.0..=5.0).contains(&rating) {
                bail!(
                    "rating {rating} for {} / {} is outside 0..=5",
                    stat.region,
                    stat.location_name
                );
            }
        }
        for week in std::iter::once(&stat.current).chain(stat.previous.as_ref()) {
            if week.negative_count > week.review_count {
                bail!(
                    "{} / {} has more negative reviews ({}) than reviews ({})",
                    stat.region,
                    stat.location_name,
                    week.negative_count,
                    week.review_count
                );
            }
        }
    }

    Ok(stats)
}

pub async fn load_stats(
    config: &AppConfig,
    source: StatsSource,
    stats_file: Option<&Path>,
    week_start: NaiveDate,
) -> anyhow::Result<Vec<LocationWeeklyStat>> {
    let stats = match source {
        StatsSource::Json => {
            let raw = match stats_file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("cannot read {}", path.display()))?,
                None => config
                    .reviews
                    .weekly_json
                    .clone()
                    .context("no JSON stats: pass --stats-file or set WEEKLY_REVIEWS_JSON")?,
            };
            parse_stats_json(&raw)?
        }
        StatsSource::Db => {
            let pool = db::connect(config.database_url.as_deref()).await?;
            db::fetch_weekly_stats(&pool, week_start).await?
        }
    };

    info!(source = ?source, %week_start, locations = stats.len(), "loaded weekly review stats");
    Ok(stats)
}
