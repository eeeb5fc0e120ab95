use std::cmp::Ordering;

use crate::models::{LocationWeeklyStat, RankedRow};

/// Deltas are differences of averages; this keeps e.g. 4.3 - 4.0 on the
/// right side of a 0.3 threshold.
const DELTA_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingConfig {
    pub threshold: f64,
    pub max_top: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            max_top: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rankings {
    pub decline: Vec<RankedRow>,
    pub improvement: Vec<RankedRow>,
    pub volume: Vec<RankedRow>,
    pub threshold: f64,
    pub evaluated: usize,
    /// Locations that qualified for neither the decline nor the improvement
    /// ranking (below threshold, unchanged, or first observation).
    pub excluded: usize,
    pub missing_previous: usize,
}

impl Rankings {
    pub fn threshold_note(&self) -> String {
        if self.evaluated == 0 {
            return format!(
                "Schwellenwert |Δ Ø-Bewertung| ≥ {}: 0 Filialen ausgewertet, keine Daten für diesen Zeitraum.",
                format_threshold(self.threshold)
            );
        }

        let mut note = format!(
            "Schwellenwert |Δ Ø-Bewertung| ≥ {}: {} von {} ausgewerteten Filialen ausgeblendet",
            format_threshold(self.threshold),
            self.excluded,
            self.evaluated
        );
        if self.missing_previous > 0 {
            note.push_str(&format!(
                " (davon {} ohne Vorwochendaten)",
                self.missing_previous
            ));
        }
        note.push('.');
        note
    }
}

pub fn rank_locations(stats: &[LocationWeeklyStat], config: &RankingConfig) -> Rankings {
    let rows: Vec<RankedRow> = stats.iter().map(RankedRow::from_stat).collect();
    let missing_previous = rows.iter().filter(|row| row.delta_rating.is_none()).count();
    let threshold = config.threshold.max(0.0);

    let mut decline: Vec<RankedRow> = rows
        .iter()
        .filter(|row| {
            row.delta_rating
                .is_some_and(|delta| delta < 0.0 && clears_threshold(delta, threshold))
        })
        .cloned()
        .collect();
    let mut improvement: Vec<RankedRow> = rows
        .iter()
        .filter(|row| {
            row.delta_rating
                .is_some_and(|delta| delta > 0.0 && clears_threshold(delta, threshold))
        })
        .cloned()
        .collect();
    let excluded = rows.len() - decline.len() - improvement.len();

    decline.sort_by(|a, b| {
        compare_delta_ascending(a, b)
            .then_with(|| b.review_count_curr.cmp(&a.review_count_curr))
    });
    improvement.sort_by(|a, b| {
        compare_delta_descending(a, b)
            .then_with(|| b.review_count_curr.cmp(&a.review_count_curr))
    });

    let evaluated = rows.len();
    let mut volume = rows;
    volume.sort_by(|a, b| {
        b.volume_key()
            .cmp(&a.volume_key())
            .then_with(|| compare_delta_descending(a, b))
    });

    decline.truncate(config.max_top);
    improvement.truncate(config.max_top);
    volume.truncate(config.max_top);

    Rankings {
        decline,
        improvement,
        volume,
        threshold,
        evaluated,
        excluded,
        missing_previous,
    }
}

/// Compact ordering for the daily briefing: large rating swings first, busy
/// locations next.
pub fn priority_highlights(stats: &[LocationWeeklyStat], limit: usize) -> Vec<RankedRow> {
    let mut rows: Vec<RankedRow> = stats.iter().map(RankedRow::from_stat).collect();
    rows.sort_by(|a, b| {
        priority_score(b)
            .partial_cmp(&priority_score(a))
            .unwrap_or(Ordering::Equal)
    });
    rows.truncate(limit);
    rows
}

pub fn priority_score(row: &RankedRow) -> f64 {
    row.delta_rating.map(f64::abs).unwrap_or(0.0) * 10.0 + f64::from(row.review_count_curr)
}

pub fn total_new_reviews(stats: &[LocationWeeklyStat]) -> u64 {
    stats
        .iter()
        .map(|stat| u64::from(stat.current.review_count))
        .sum()
}

/// Stores with the largest share of negative reviews this week. Stores
/// without negative reviews are left out.
pub fn negative_share_leaders(stats: &[LocationWeeklyStat], limit: usize) -> Vec<RankedRow> {
    let mut rows: Vec<RankedRow> = stats
        .iter()
        .map(RankedRow::from_stat)
        .filter(|row| row.negative_count_curr > 0)
        .collect();
    rows.sort_by(|a, b| {
        let share = |row: &RankedRow| row.negative_share().unwrap_or(0.0);
        share(b)
            .partial_cmp(&share(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.negative_count_curr.cmp(&a.negative_count_curr))
    });
    rows.truncate(limit);
    rows
}

/// Shortest decimal form, so the note states the threshold actually applied.
pub fn format_threshold(threshold: f64) -> String {
    let text = format!("{threshold:.6}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Whether a rating delta is large enough to be reported, whatever its sign.
pub(crate) fn clears_threshold(delta: f64, threshold: f64) -> bool {
    delta.abs() + DELTA_EPSILON >= threshold
}

fn compare_delta_ascending(a: &RankedRow, b: &RankedRow) -> Ordering {
    match (a.delta_rating, b.delta_rating) {
        (Some(left), Some(right)) => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Descending by delta, rows without a delta last.
fn compare_delta_descending(a: &RankedRow, b: &RankedRow) -> Ordering {
    match (a.delta_rating, b.delta_rating) {
        (Some(left), Some(right)) => right.partial_cmp(&left).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
