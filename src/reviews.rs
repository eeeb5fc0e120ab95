use anyhow::{bail, Context};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use tracing::debug;

use crate::models::WeekAggregate;

const SERPAPI_URL: &str = "https://serpapi.com/search.json";
/// Star ratings at or below this count as negative.
const NEGATIVE_RATING_MAX: f64 = 2.0;

#[derive(Debug, Deserialize)]
struct ReviewsPage {
    #[serde(default)]
    reviews: Vec<PlaceReview>,
    place_info: Option<PlaceInfo>,
    serpapi_pagination: Option<Pagination>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaceInfo {
    rating: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceReview {
    pub rating: Option<f64>,
    pub iso_date: Option<DateTime<Utc>>,
}

/// SerpAPI credentials and paging limits for the Google Maps reviews engine.
pub struct ReviewCollector<'a> {
    client: &'a reqwest::Client,
    api_key: &'a str,
    timezone: Tz,
    max_pages: usize,
}

impl<'a> ReviewCollector<'a> {
    pub fn new(client: &'a reqwest::Client, api_key: &'a str, timezone: Tz, max_pages: usize) -> Self {
        Self {
            client,
            api_key,
            timezone,
            max_pages: max_pages.max(1),
        }
    }

    /// Reviews are requested newest first; paging stops once a page reaches
    /// past the start of the week.
    pub async fn collect_week(
        &self,
        place_id: &str,
        week_start: NaiveDate,
    ) -> anyhow::Result<Option<WeekAggregate>> {
        let mut reviews = Vec::new();
        let mut fallback_rating = None;
        let mut token: Option<String> = None;

        for _ in 0..self.max_pages {
            let mut query = vec![
                ("engine", "google_maps_reviews"),
                ("place_id", place_id),
                ("sort_by", "newestFirst"),
                ("hl", "de"),
                ("api_key", self.api_key),
            ];
            if let Some(next) = token.as_deref() {
                query.push(("next_page_token", next));
            }

            let page: ReviewsPage = self
                .client
                .get(SERPAPI_URL)
                .query(&query)
                .send()
                .await
                .with_context(|| format!("SerpAPI request for place {place_id} failed"))?
                .error_for_status()?
                .json()
                .await
                .with_context(|| format!("SerpAPI response for place {place_id} is malformed"))?;

            if let Some(err) = page.error {
                bail!("SerpAPI rejected place {place_id}: {err}");
            }
            if fallback_rating.is_none() {
                fallback_rating = page.place_info.and_then(|info| info.rating);
            }

            let reached_older = page.reviews.iter().any(|review| {
                review
                    .iso_date
                    .is_some_and(|at| at.with_timezone(&self.timezone).date_naive() < week_start)
            });
            debug!(place_id, fetched = page.reviews.len(), reached_older, "fetched review page");
            reviews.extend(page.reviews);

            token = page.serpapi_pagination.and_then(|p| p.next_page_token);
            if reached_older || token.is_none() {
                break;
            }
        }

        Ok(aggregate_week(&reviews, week_start, self.timezone, fallback_rating))
    }
}

/// Mean rating and count of the reviews posted in the week starting at
/// `week_start` (local dates in `timezone`). A quiet week keeps the place's
/// overall rating with a count of zero.
pub fn aggregate_week(
    reviews: &[PlaceReview],
    week_start: NaiveDate,
    timezone: Tz,
    fallback_rating: Option<f64>,
) -> Option<WeekAggregate> {
    let week_end = week_start + Duration::days(7);
    let ratings: Vec<f64> = reviews
        .iter()
        .filter(|review| {
            review.iso_date.is_some_and(|at| {
                let local = at.with_timezone(&timezone).date_naive();
                local >= week_start && local < week_end
            })
        })
        .filter_map(|review| review.rating)
        .collect();

    if ratings.is_empty() {
        return fallback_rating.map(|avg_rating| WeekAggregate {
            avg_rating,
            review_count: 0,
            negative_count: 0,
        });
    }

    let review_count = ratings.len() as u32;
    let negative_count = ratings
        .iter()
        .filter(|rating| **rating <= NEGATIVE_RATING_MAX)
        .count() as u32;
    Some(WeekAggregate {
        avg_rating: ratings.iter().sum::<f64>() / f64::from(review_count),
        review_count,
        negative_count,
    })
}
