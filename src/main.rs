use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::delivery::{Attachment, Mailer, OutgoingEmail};
use crate::report::{RenderedReport, ReportContext};
use crate::source::StatsSource;

mod config;
mod db;
mod delivery;
mod models;
mod net;
mod news;
mod pdf;
mod ranking;
mod report;
mod reviews;
mod source;
mod telemetry;

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "brand-review-monitor")]
#[command(about = "Scheduled news and Google review reports for a retail brand", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct StatsArgs {
    #[arg(long, value_enum, default_value_t = StatsSource::Db)]
    source: StatsSource,
    /// JSON stats document; takes precedence over WEEKLY_REVIEWS_JSON
    #[arg(long)]
    stats_file: Option<PathBuf>,
    /// Any day of the week to report; defaults to the last completed week
    #[arg(long)]
    week: Option<NaiveDate>,
}

#[derive(Args, Debug)]
struct RankingArgs {
    /// Rows per ranking, at least 1 (same rule as MAX_TOP)
    #[arg(long, value_parser = config::parse_max_top)]
    max_top: Option<usize>,
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load demo snapshots for the last completed week and the one before
    Seed {
        #[arg(long)]
        week: Option<NaiveDate>,
    },
    /// Import weekly snapshots from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Pull reviews from SerpAPI and store the weekly snapshot per location
    Collect {
        #[arg(long)]
        week: Option<NaiveDate>,
    },
    /// Print the decline, improvement and volume rankings
    Rank {
        #[command(flatten)]
        stats: StatsArgs,
        #[command(flatten)]
        ranking: RankingArgs,
    },
    /// Render and send the weekly Google review report
    Weekly {
        #[command(flatten)]
        stats: StatsArgs,
        #[command(flatten)]
        ranking: RankingArgs,
        #[arg(long)]
        template: Option<PathBuf>,
        /// Write the HTML here instead of sending it
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Render and send the daily media briefing
    Daily {
        #[command(flatten)]
        stats: StatsArgs,
        #[arg(long)]
        template: Option<PathBuf>,
        /// Write the HTML (and PDF) here instead of sending it
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        no_pdf: bool,
    },
    /// Check the feeds for urgent mentions and alert when one shows up
    Watch {
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let now = Utc::now().with_timezone(&config.timezone);
    let last_week = report::reporting_week(now.date_naive());

    match cli.command {
        Commands::InitDb => {
            let pool = db::connect(config.database_url.as_deref()).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed { week } => {
            let week_start = week.map(report::week_start_of).unwrap_or(last_week);
            let pool = db::connect(config.database_url.as_deref()).await?;
            db::seed(&pool, week_start).await?;
            println!("Seed data inserted for {}.", report::week_range_label(week_start));
        }
        Commands::Import { csv } => {
            let pool = db::connect(config.database_url.as_deref()).await?;
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Imported {inserted} snapshots from {}.", csv.display());
        }
        Commands::Collect { week } => {
            let week_start = week.map(report::week_start_of).unwrap_or(last_week);
            collect(&config, week_start).await?;
        }
        Commands::Rank { stats, ranking } => {
            let week_start = stats.week.map(report::week_start_of).unwrap_or(last_week);
            let data =
                source::load_stats(&config, stats.source, stats.stats_file.as_deref(), week_start)
                    .await?;
            let rankings = ranking::rank_locations(&data, &ranking_config(&config, &ranking));
            print_rankings(week_start, &rankings);
        }
        Commands::Weekly {
            stats,
            ranking,
            template,
            out,
        } => {
            let week_start = stats.week.map(report::week_start_of).unwrap_or(last_week);
            let data =
                source::load_stats(&config, stats.source, stats.stats_file.as_deref(), week_start)
                    .await?;
            let settings = ranking_config(&config, &ranking);
            let rankings = ranking::rank_locations(&data, &settings);
            let negative_leaders = ranking::negative_share_leaders(&data, settings.max_top);
            let template = load_template(template.as_deref(), report::WEEKLY_TEMPLATE)?;
            let ctx = ReportContext::new(&config.brand, &now, &config.mail.recipient_label());
            let rendered = report::build_weekly_report(
                &template,
                &ctx,
                week_start,
                &data,
                &rankings,
                &negative_leaders,
            );
            info!(
                week = %week_start,
                evaluated = rankings.evaluated,
                decline = rankings.decline.len(),
                improvement = rankings.improvement.len(),
                "weekly report rendered"
            );

            match out {
                Some(path) => write_output(&path, &rendered.html)?,
                None => deliver(&config, rendered, Vec::new()).await?,
            }
        }
        Commands::Daily {
            stats,
            template,
            out,
            no_pdf,
        } => {
            daily(&config, &now, last_week, stats, template, out, no_pdf).await?;
        }
        Commands::Watch { dry_run } => {
            watch(&config, dry_run).await?;
        }
    }

    Ok(())
}

fn ranking_config(config: &AppConfig, args: &RankingArgs) -> ranking::RankingConfig {
    let mut ranking = config.report.ranking();
    if let Some(max_top) = args.max_top {
        ranking.max_top = max_top;
    }
    if let Some(threshold) = args.threshold {
        ranking.threshold = threshold;
    }
    ranking
}

fn load_template(path: Option<&Path>, embedded: &str) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read template {}", path.display())),
        None => Ok(embedded.to_string()),
    }
}

fn write_output(path: &Path, html: &str) -> anyhow::Result<()> {
    std::fs::write(path, html).with_context(|| format!("cannot write {}", path.display()))?;
    println!("Report written to {}.", path.display());
    Ok(())
}

async fn deliver(
    config: &AppConfig,
    rendered: RenderedReport,
    attachments: Vec<Attachment>,
) -> anyhow::Result<()> {
    let client = net::http_client(HTTP_TIMEOUT)?;
    let email = OutgoingEmail {
        subject: rendered.subject,
        html: rendered.html,
        attachments,
    };

    if let Err(err) = Mailer::new(&config.mail, &client).send(&email).await {
        error!(error = %err, subject = %email.subject, "delivery failed");
        return Err(err.into());
    }
    Ok(())
}

fn print_rankings(week_start: NaiveDate, rankings: &ranking::Rankings) {
    println!("Google reviews {}", report::week_range_label(week_start));

    let sections = [
        ("Decline", &rankings.decline),
        ("Improvement", &rankings.improvement),
        ("Volume", &rankings.volume),
    ];
    for (title, rows) in sections {
        println!();
        println!("{title}:");
        if rows.is_empty() {
            println!("- none");
        }
        for row in rows.iter() {
            println!(
                "- {} ({}) Δ {} reviews {}",
                row.location_name,
                row.region,
                report::fmt_delta(row.delta_rating),
                report::fmt_reviews(row)
            );
        }
    }

    println!();
    println!("{}", rankings.threshold_note());
}

async fn collect(config: &AppConfig, week_start: NaiveDate) -> anyhow::Result<()> {
    if !config.report.include_reviews {
        warn!("INCLUDE_REVIEWS is disabled, skipping review collection");
        return Ok(());
    }
    let api_key = config
        .reviews
        .serpapi_key
        .as_deref()
        .context("SERPAPI_KEY must be set to collect reviews")?;

    let pool = db::connect(config.database_url.as_deref()).await?;
    let client = net::http_client(HTTP_TIMEOUT)?;
    let collector =
        reviews::ReviewCollector::new(&client, api_key, config.timezone, config.reviews.max_pages);

    let mut stored = 0;
    for location in db::fetch_tracked_locations(&pool).await? {
        match collector.collect_week(&location.place_id, week_start).await? {
            Some(aggregate) => {
                db::upsert_snapshot(&pool, location.id, week_start, aggregate).await?;
                stored += 1;
            }
            None => warn!(
                region = %location.region,
                location = %location.location_name,
                place_id = %location.place_id,
                "no reviews and no overall rating, skipping"
            ),
        }
    }

    info!(week = %week_start, stored, "review collection finished");
    println!("Stored {stored} snapshots for {}.", report::week_range_label(week_start));
    Ok(())
}

async fn daily(
    config: &AppConfig,
    now: &DateTime<Tz>,
    last_week: NaiveDate,
    stats: StatsArgs,
    template: Option<PathBuf>,
    out: Option<PathBuf>,
    no_pdf: bool,
) -> anyhow::Result<()> {
    let client = net::http_client(HTTP_TIMEOUT)?;
    let items = news::fetch_news(
        &client,
        &config.news.feeds,
        &config.brand,
        now.with_timezone(&Utc),
    )
    .await?;

    let highlights = if config.report.include_reviews {
        let week_start = stats.week.map(report::week_start_of).unwrap_or(last_week);
        let data =
            source::load_stats(config, stats.source, stats.stats_file.as_deref(), week_start)
                .await?;
        Some(ranking::priority_highlights(&data, config.report.max_top))
    } else {
        None
    };

    let template = load_template(template.as_deref(), report::DAILY_TEMPLATE)?;
    let ctx = ReportContext::new(&config.brand, now, &config.mail.recipient_label());
    let rendered = report::build_daily_report(
        &template,
        &ctx,
        &items,
        config.news.max_top,
        highlights.as_deref(),
        config.report.threshold,
    );

    let attachments = if no_pdf {
        Vec::new()
    } else {
        let bytes = pdf::build_briefing_pdf(&config.brand, &ctx.date_str, &items)?;
        vec![Attachment::pdf(pdf::briefing_file_name(now.date_naive()), bytes)]
    };
    info!(items = items.len(), attachments = attachments.len(), "daily briefing rendered");

    match out {
        Some(path) => {
            write_output(&path, &rendered.html)?;
            for attachment in &attachments {
                let pdf_path = path.with_extension("pdf");
                std::fs::write(&pdf_path, &attachment.content)
                    .with_context(|| format!("cannot write {}", pdf_path.display()))?;
                println!("PDF written to {}.", pdf_path.display());
            }
            Ok(())
        }
        None => deliver(config, rendered, attachments).await,
    }
}

async fn watch(config: &AppConfig, dry_run: bool) -> anyhow::Result<()> {
    let client = net::http_client(HTTP_TIMEOUT)?;
    let channels = news::fetch_channels(&client, &config.news.feeds).await?;
    let hits = news::urgent_hits(&channels, 10);

    if hits.is_empty() {
        info!("no urgent mentions");
        return Ok(());
    }
    warn!(hits = hits.len(), "urgent mentions found");

    let alert = report::build_urgent_alert(&config.brand, &hits);
    if dry_run {
        println!("{}", alert.subject);
        for hit in &hits {
            println!("- {} ({})", hit.title, hit.link);
        }
        return Ok(());
    }
    deliver(config, alert, Vec::new()).await
}
