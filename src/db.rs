use anyhow::Context;
use chrono::{Duration, NaiveDate};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{LocationWeeklyStat, WeekAggregate};

/// A location whose reviews can be pulled from SerpAPI.
#[derive(Debug, Clone)]
pub struct TrackedLocation {
    pub id: Uuid,
    pub region: String,
    pub location_name: String,
    pub place_id: String,
}

pub async fn connect(database_url: Option<&str>) -> anyhow::Result<PgPool> {
    let database_url =
        database_url.context("DATABASE_URL must be set to a production Postgres instance")?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn upsert_location(
    pool: &PgPool,
    region: &str,
    location_name: &str,
    place_id: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO brand_monitor.locations (id, region, location_name, place_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (region, location_name) DO UPDATE
        SET place_id = COALESCE(EXCLUDED.place_id, brand_monitor.locations.place_id)
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(region)
    .bind(location_name)
    .bind(place_id)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

/// Returns true when the row was inserted or changed.
pub async fn upsert_snapshot(
    pool: &PgPool,
    location_id: Uuid,
    week_start: NaiveDate,
    aggregate: WeekAggregate,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO brand_monitor.weekly_reviews
        (id, location_id, week_start, avg_rating, review_count, negative_count)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (location_id, week_start) DO UPDATE
        SET avg_rating = EXCLUDED.avg_rating,
            review_count = EXCLUDED.review_count,
            negative_count = EXCLUDED.negative_count,
            recorded_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(location_id)
    .bind(week_start)
    .bind(aggregate.avg_rating)
    .bind(i32::try_from(aggregate.review_count).unwrap_or(i32::MAX))
    .bind(i32::try_from(aggregate.negative_count).unwrap_or(i32::MAX))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn seed(pool: &PgPool, week_start: NaiveDate) -> anyhow::Result<()> {
    let previous_week = week_start - Duration::days(7);
    let locations = vec![
        ("Berlin", "Kaufland Berlin-Neukölln", Some((4.3, 18, 2)), (3.9, 31, 7)),
        ("Berlin", "Kaufland Berlin-Spandau", Some((3.8, 9, 2)), (4.2, 11, 1)),
        ("Bayern", "Kaufland München-Freiham", Some((4.1, 14, 1)), (4.0, 15, 2)),
        ("Sachsen", "Kaufland Leipzig-Paunsdorf", Some((4.4, 7, 0)), (3.7, 12, 4)),
        ("Nordrhein-Westfalen", "Kaufland Köln-Ehrenfeld", None, (4.6, 5, 0)),
    ];

    for (region, name, previous, (avg_rating, review_count, negative_count)) in locations {
        let location_id = upsert_location(pool, region, name, None).await?;
        if let Some((prev_rating, prev_count, prev_negative)) = previous {
            upsert_snapshot(
                pool,
                location_id,
                previous_week,
                WeekAggregate {
                    avg_rating: prev_rating,
                    review_count: prev_count,
                    negative_count: prev_negative,
                },
            )
            .await?;
        }
        upsert_snapshot(
            pool,
            location_id,
            week_start,
            WeekAggregate {
                avg_rating,
                review_count,
                negative_count,
            },
        )
        .await?;
    }

    Ok(())
}

/// Stats for every location with a snapshot in `week_start`, joined with the
/// snapshot of the week before when one exists.
pub async fn fetch_weekly_stats(
    pool: &PgPool,
    week_start: NaiveDate,
) -> anyhow::Result<Vec<LocationWeeklyStat>> {
    let records = sqlx::query(
        r#"
        SELECT l.region, l.location_name,
               cur.avg_rating AS avg_rating_curr, cur.review_count AS review_count_curr,
               cur.negative_count AS negative_count_curr,
               prev.avg_rating AS avg_rating_prev, prev.review_count AS review_count_prev,
               prev.negative_count AS negative_count_prev
        FROM brand_monitor.weekly_reviews cur
        JOIN brand_monitor.locations l ON l.id = cur.location_id
        LEFT JOIN brand_monitor.weekly_reviews prev
               ON prev.location_id = cur.location_id
              AND prev.week_start = cur.week_start - 7
        WHERE cur.week_start = $1
        ORDER BY l.region, l.location_name
        "#,
    )
    .bind(week_start)
    .fetch_all(pool)
    .await
    .context("failed to load weekly review snapshots")?;

    let mut stats = Vec::with_capacity(records.len());
    for row in records {
        let avg_rating_prev: Option<f64> = row.get("avg_rating_prev");
        let review_count_prev: Option<i32> = row.get("review_count_prev");
        let review_count_curr: i32 = row.get("review_count_curr");
        let negative_count_prev: Option<i32> = row.get("negative_count_prev");
        let negative_count_curr: i32 = row.get("negative_count_curr");

        stats.push(LocationWeeklyStat {
            region: row.get("region"),
            location_name: row.get("location_name"),
            previous: avg_rating_prev
                .zip(review_count_prev)
                .map(|(avg_rating, count)| WeekAggregate {
                    avg_rating,
                    review_count: count.max(0) as u32,
                    negative_count: negative_count_prev.unwrap_or(0).max(0) as u32,
                }),
            current: WeekAggregate {
                avg_rating: row.get("avg_rating_curr"),
                review_count: review_count_curr.max(0) as u32,
                negative_count: negative_count_curr.max(0) as u32,
            },
        });
    }

    Ok(stats)
}

pub async fn fetch_tracked_locations(pool: &PgPool) -> anyhow::Result<Vec<TrackedLocation>> {
    let records = sqlx::query(
        r#"
        SELECT id, region, location_name, place_id
        FROM brand_monitor.locations
        WHERE place_id IS NOT NULL AND place_id <> ''
        ORDER BY region, location_name
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(records
        .into_iter()
        .map(|row| TrackedLocation {
            id: row.get("id"),
            region: row.get("region"),
            location_name: row.get("location_name"),
            place_id: row.get("place_id"),
        })
        .collect())
}

#[derive(Debug, serde::Deserialize)]
pub struct SnapshotCsvRow {
    pub region: String,
    pub location_name: String,
    pub week_start: NaiveDate,
    pub avg_rating: f64,
    pub review_count: u32,
    #[serde(default)]
    pub negative_count: u32,
    #[serde(default)]
    pub place_id: Option<String>,
}

pub fn read_snapshot_csv<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<SnapshotCsvRow>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut rows = Vec::new();
    for (idx, result) in reader.deserialize::<SnapshotCsvRow>().enumerate() {
        // header is line 1
        let row = result.with_context(|| format!("invalid snapshot on line {}", idx + 2))?;
        if !(0.0..=5.0).contains(&row.avg_rating) {
            anyhow::bail!(
                "avg_rating {} for {} is outside 0..=5",
                row.avg_rating,
                row.location_name
            );
        }
        if row.negative_count > row.review_count {
            anyhow::bail!(
                "negative_count {} for {} exceeds review_count {}",
                row.negative_count,
                row.location_name,
                row.review_count
            );
        }
        rows.push(row);
    }
    Ok(rows)
}

pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("cannot open {}", csv_path.display()))?;
    let rows = read_snapshot_csv(file)?;
    let mut stored = 0usize;

    for row in rows {
        let place_id = row.place_id.as_deref().filter(|id| !id.trim().is_empty());
        let location_id =
            upsert_location(pool, &row.region, &row.location_name, place_id).await?;
        let changed = upsert_snapshot(
            pool,
            location_id,
            row.week_start,
            WeekAggregate {
                avg_rating: row.avg_rating,
                review_count: row.review_count,
                negative_count: row.negative_count,
            },
        )
        .await?;

        if changed {
            stored += 1;
        }
    }

    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_snapshot_csv_with_optional_place_id() {
        let raw = "region,location_name,week_start,avg_rating,review_count,place_id\n\
                   Berlin,Kaufland Neukölln,2026-10-05,4.1,25,ChIJ123\n\
                   Bayern,Kaufland Freiham,2026-10-05,3.9,12,\n";
        let rows = read_snapshot_csv(raw.as_bytes()).expect("csv parses");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].place_id.as_deref(), Some("ChIJ123"));
        assert_eq!(rows[0].week_start, NaiveDate::from_ymd_opt(2026, 10, 5).unwrap());
        assert_eq!(rows[1].review_count, 12);
        assert!(rows[1].place_id.as_deref().unwrap_or_default().is_empty());
    }

    #[test]
    fn reads_optional_negative_count() {
        let raw = "region,location_name,week_start,avg_rating,review_count,negative_count\n\
                   Berlin,Kaufland Neukölln,2026-10-05,3.9,31,7\n";
        let rows = read_snapshot_csv(raw.as_bytes()).expect("csv parses");
        assert_eq!(rows[0].negative_count, 7);
        assert_eq!(rows[0].place_id, None);

        let raw = "region,location_name,week_start,avg_rating,review_count\n\
                   Berlin,Kaufland Neukölln,2026-10-05,3.9,31\n";
        let rows = read_snapshot_csv(raw.as_bytes()).expect("csv parses");
        assert_eq!(rows[0].negative_count, 0);
    }

    #[test]
    fn rejects_more_negatives_than_reviews() {
        let raw = "region,location_name,week_start,avg_rating,review_count,negative_count\n\
                   Berlin,Kaufland Neukölln,2026-10-05,3.9,3,5\n";
        let err = read_snapshot_csv(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("exceeds review_count"));
    }

    #[test]
    fn rejects_out_of_range_ratings() {
        let raw = "region,location_name,week_start,avg_rating,review_count\n\
                   Berlin,Kaufland Neukölln,2026-10-05,7.5,25\n";
        let err = read_snapshot_csv(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("outside 0..=5"));
    }

    #[test]
    fn reports_line_of_malformed_rows() {
        let raw = "region,location_name,week_start,avg_rating,review_count\n\
                   Berlin,Kaufland Neukölln,not-a-date,4.0,25\n";
        let err = read_snapshot_csv(raw.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
