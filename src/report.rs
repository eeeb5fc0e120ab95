use std::fmt::Write;

use chrono::{DateTime, Datelike, Duration, Locale, NaiveDate};
use chrono_tz::Tz;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::models::{LocationWeeklyStat, NewsItem, RankedRow, SourceKind, UrgentHit};
use crate::news;
use crate::ranking::{self, Rankings};

pub const WEEKLY_TEMPLATE: &str = include_str!("../templates/weekly_email.html");
pub const DAILY_TEMPLATE: &str = include_str!("../templates/daily_email.html");

/// Values shared by every report header.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub brand: String,
    pub date_str: String,
    pub timezone: String,
    pub recipient: String,
}

impl ReportContext {
    pub fn new(brand: &str, now: &DateTime<Tz>, recipient: &str) -> Self {
        Self {
            brand: brand.to_string(),
            date_str: date_de(now),
            timezone: now.timezone().name().to_string(),
            recipient: recipient.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedReport {
    pub subject: String,
    pub html: String,
}

/// Replaces `{name}` placeholders in one pass. Substituted text is never
/// scanned again and unknown names (including CSS blocks) stay untouched.
pub fn fill_template(template: &str, values: &[(&str, String)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replacement = after.find('}').and_then(|close| {
            let key = &after[..close];
            values
                .iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (value, close))
        });

        match replacement {
            Some((value, close)) => {
                output.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }

    output.push_str(rest);
    output
}

/// German long date, e.g. "Montag, 12. Oktober 2026".
pub fn date_de(now: &DateTime<Tz>) -> String {
    now.format_localized("%A, %d. %B %Y", Locale::de_DE)
        .to_string()
}

pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// The last completed Monday-to-Sunday week before `today`.
pub fn reporting_week(today: NaiveDate) -> NaiveDate {
    week_start_of(today) - Duration::days(7)
}

pub fn week_range_label(week_start: NaiveDate) -> String {
    let week_end = week_start + Duration::days(6);
    format!(
        "KW {} ({} – {})",
        week_start.iso_week().week(),
        week_start.format("%d.%m.%Y"),
        week_end.format("%d.%m.%Y")
    )
}

fn fmt_rating(value: Option<f64>) -> String {
    value
        .map(|rating| format!("{rating:.2}"))
        .unwrap_or_else(|| "–".to_string())
}

pub fn fmt_delta(value: Option<f64>) -> String {
    value
        .map(|delta| format!("{delta:+.2}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn delta_class(value: Option<f64>) -> &'static str {
    match value {
        Some(delta) if delta < 0.0 => "neg",
        Some(delta) if delta > 0.0 => "pos",
        _ => "",
    }
}

pub fn fmt_reviews(row: &RankedRow) -> String {
    match (row.review_count_prev, row.delta_reviews) {
        (Some(prev), Some(delta)) => format!("{prev} → {} ({delta:+})", row.review_count_curr),
        _ => format!("– → {} (n/a)", row.review_count_curr),
    }
}

pub fn ranking_row_html(row: &RankedRow) -> String {
    format!(
        r#"<tr><td>{}</td><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num {}">{}</td><td class="num">{}</td></tr>"#,
        encode_text(&row.region),
        encode_text(&row.location_name),
        fmt_rating(row.avg_rating_prev),
        fmt_rating(Some(row.avg_rating_curr)),
        delta_class(row.delta_rating),
        fmt_delta(row.delta_rating),
        fmt_reviews(row)
    )
}

fn fmt_share(value: Option<f64>) -> String {
    value
        .map(|share| format!("{:.1} %", share * 100.0))
        .unwrap_or_else(|| "–".to_string())
}

pub fn negative_share_row_html(row: &RankedRow) -> String {
    format!(
        r#"<tr><td>{}</td><td>{}</td><td class="num">{}</td><td class="num">{}</td><td class="num neg">{}</td><td class="num">{}</td></tr>"#,
        encode_text(&row.region),
        encode_text(&row.location_name),
        row.review_count_curr,
        row.negative_count_curr,
        fmt_share(row.negative_share()),
        fmt_rating(Some(row.avg_rating_curr))
    )
}

fn empty_row_html(empty_message: &str) -> String {
    format!(
        r#"<tr><td colspan="6" class="muted">{}</td></tr>"#,
        encode_text(empty_message)
    )
}

pub fn ranking_rows_html(rows: &[RankedRow], empty_message: &str) -> String {
    if rows.is_empty() {
        return empty_row_html(empty_message);
    }
    rows.iter()
        .map(ranking_row_html)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn negative_share_rows_html(rows: &[RankedRow]) -> String {
    if rows.is_empty() {
        return empty_row_html("Keine negativen Reviews in dieser Woche.");
    }
    rows.iter()
        .map(negative_share_row_html)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn weekly_summary_html(rankings: &Rankings, negative_leaders: &[RankedRow]) -> String {
    if rankings.evaluated == 0 {
        return r#"<p class="muted">Für diese Woche liegen keine Filialdaten vor.</p>"#.to_string();
    }

    let mut html = String::from("<ul>\n");
    let _ = writeln!(
        html,
        "<li>{} Filialen ausgewertet, {} davon mit einer Veränderung der Ø-Bewertung über dem Schwellenwert von {}.</li>",
        rankings.evaluated,
        rankings.evaluated - rankings.excluded,
        ranking::format_threshold(rankings.threshold)
    );
    if let Some(row) = rankings.decline.first() {
        let _ = writeln!(
            html,
            "<li>Größter Rückgang: <strong>{}</strong> ({}) mit {}.</li>",
            encode_text(&row.location_name),
            encode_text(&row.region),
            fmt_delta(row.delta_rating)
        );
    }
    if let Some(row) = rankings.improvement.first() {
        let _ = writeln!(
            html,
            "<li>Größte Verbesserung: <strong>{}</strong> ({}) mit {}.</li>",
            encode_text(&row.location_name),
            encode_text(&row.region),
            fmt_delta(row.delta_rating)
        );
    }
    if let Some(row) = rankings.volume.first() {
        let _ = writeln!(
            html,
            "<li>Meiste neue Reviews: <strong>{}</strong> ({}), {}.</li>",
            encode_text(&row.location_name),
            encode_text(&row.region),
            fmt_reviews(row)
        );
    }
    if let Some(row) = negative_leaders.first() {
        let _ = writeln!(
            html,
            "<li>Höchster Anteil negativer Reviews: <strong>{}</strong> ({}), {} von {} ({}).</li>",
            encode_text(&row.location_name),
            encode_text(&row.region),
            row.negative_count_curr,
            row.review_count_curr,
            fmt_share(row.negative_share())
        );
    }
    html.push_str("</ul>");
    html
}

pub fn weekly_subject(brand: &str, week_start: NaiveDate) -> String {
    format!(
        "📝 {brand} – Weekly Google Reviews | KW {}",
        week_start.iso_week().week()
    )
}

pub fn build_weekly_report(
    template: &str,
    ctx: &ReportContext,
    week_start: NaiveDate,
    stats: &[LocationWeeklyStat],
    rankings: &Rankings,
    negative_leaders: &[RankedRow],
) -> RenderedReport {
    let values = [
        ("brand", encode_text(&ctx.brand).into_owned()),
        ("date_str", encode_text(&ctx.date_str).into_owned()),
        ("tz", encode_text(&ctx.timezone).into_owned()),
        ("recipient", encode_text(&ctx.recipient).into_owned()),
        ("week_range", week_range_label(week_start)),
        (
            "total_new_reviews",
            ranking::total_new_reviews(stats).to_string(),
        ),
        ("summary_html", weekly_summary_html(rankings, negative_leaders)),
        (
            "neg_rows_html",
            ranking_rows_html(
                &rankings.decline,
                "Keine Filiale mit deutlicher Verschlechterung in dieser Woche.",
            ),
        ),
        (
            "pos_rows_html",
            ranking_rows_html(
                &rankings.improvement,
                "Keine Filiale mit deutlicher Verbesserung in dieser Woche.",
            ),
        ),
        (
            "vol_rows_html",
            ranking_rows_html(&rankings.volume, "Keine neuen Reviews in dieser Woche."),
        ),
        ("neg_share_rows_html", negative_share_rows_html(negative_leaders)),
        ("threshold_note", encode_text(&rankings.threshold_note()).into_owned()),
    ];

    RenderedReport {
        subject: weekly_subject(&ctx.brand, week_start),
        html: fill_template(template, &values),
    }
}

fn headline_html(rank: usize, item: &NewsItem) -> String {
    let mut meta = vec![encode_text(&item.source).into_owned()];
    meta.push(format!("Grund: {}", item.why()));
    format!(
        r#"<li class="item"><span class="rank">{rank}.</span><span><a href="{}">{}</a><div class="meta">{}</div></span></li>"#,
        encode_double_quoted_attribute(&item.url),
        encode_text(&item.title),
        meta.join(" · ")
    )
}

fn link_list_html(heading: &str, items: &[&NewsItem]) -> String {
    if items.is_empty() {
        return String::new();
    }
    let mut html = format!("<h2>{}</h2>\n<ul>\n", encode_text(heading));
    for item in items {
        let _ = writeln!(
            html,
            r#"<li><a href="{}">{}</a> <span class="meta">{} · {}</span></li>"#,
            encode_double_quoted_attribute(&item.url),
            encode_text(&item.title),
            encode_text(&item.source),
            item.kind.label()
        );
    }
    html.push_str("</ul>");
    html
}

fn review_flag(row: &RankedRow, threshold: f64) -> &'static str {
    match row.delta_rating {
        None => "neu im Monitoring",
        Some(delta) if delta < 0.0 && ranking::clears_threshold(delta, threshold) => {
            "negativer Trend"
        }
        Some(delta) if delta > 0.0 && ranking::clears_threshold(delta, threshold) => {
            "positiver Trend"
        }
        Some(_) if row.delta_reviews.is_some_and(|d| d > 0) => "mehr Reviews",
        Some(_) => "stabil",
    }
}

fn review_row_html(row: &RankedRow, threshold: f64) -> String {
    format!(
        r#"<tr><td>{} – {}</td><td>{}</td><td class="{}">{}</td><td>{}</td><td>{}</td></tr>"#,
        encode_text(&row.region),
        encode_text(&row.location_name),
        fmt_rating(Some(row.avg_rating_curr)),
        delta_class(row.delta_rating),
        fmt_delta(row.delta_rating),
        row.review_count_curr,
        review_flag(row, threshold)
    )
}

/// Review section of the daily briefing. `None` means the review path is
/// switched off for this run.
pub fn review_rows_html(rows: Option<&[RankedRow]>, threshold: f64) -> String {
    match rows {
        None => r#"<tr><td colspan="5" class="muted">Review-Auswertung ist deaktiviert (INCLUDE_REVIEWS).</td></tr>"#
            .to_string(),
        Some([]) => r#"<tr><td colspan="5" class="muted">Noch keine filialspezifischen Daten hinterlegt (Pilotmodus).</td></tr>"#
            .to_string(),
        Some(rows) => rows
            .iter()
            .map(|row| review_row_html(row, threshold))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

pub fn daily_subject(brand: &str, date_str: &str) -> String {
    format!("📰 {brand} Media & Review Briefing | {date_str}")
}

pub fn build_daily_report(
    template: &str,
    ctx: &ReportContext,
    items: &[NewsItem],
    max_top: usize,
    reviews: Option<&[RankedRow]>,
    threshold: f64,
) -> RenderedReport {
    let top: Vec<&NewsItem> = items.iter().take(max_top).collect();
    let urgent: Vec<&NewsItem> = items
        .iter()
        .filter(|item| news::is_urgent(&item.title))
        .collect();
    let rumors: Vec<&NewsItem> = items
        .iter()
        .filter(|item| item.kind == SourceKind::Boulevard)
        .take(5)
        .collect();

    let mut summary = String::new();
    let _ = writeln!(
        summary,
        "<p><strong>Insight:</strong> {} kuratierte {}-Erwähnungen der letzten 24 Stunden, davon {} in dieser Mail – nach internem Score geordnet, im PDF nach Themen gruppiert.</p>",
        items.len(),
        encode_text(&ctx.brand),
        top.len()
    );
    let _ = writeln!(
        summary,
        "<p><strong>Risiko:</strong> {} Meldung(en) mit Krisen-Stichworten, {} Boulevard-Quelle(n).</p>",
        urgent.len(),
        rumors.len()
    );
    let review_status = match reviews {
        None => "Google-Reviews sind für diesen Lauf deaktiviert.".to_string(),
        Some(rows) => format!("{} auffällige Filiale(n) aus der Review-Auswertung.", rows.len()),
    };
    let _ = write!(summary, "<p><strong>Reviews:</strong> {review_status}</p>");

    let headlines = if top.is_empty() {
        r#"<li class="item muted">Keine neuen Erwähnungen in den letzten 24 Stunden.</li>"#
            .to_string()
    } else {
        top.iter()
            .enumerate()
            .map(|(idx, item)| headline_html(idx + 1, item))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let values = [
        ("brand", encode_text(&ctx.brand).into_owned()),
        ("date_str", encode_text(&ctx.date_str).into_owned()),
        ("tz", encode_text(&ctx.timezone).into_owned()),
        ("recipient", encode_text(&ctx.recipient).into_owned()),
        ("executive_summary_html", summary),
        ("top_count", top.len().to_string()),
        ("top_headlines_html", headlines),
        ("reviews_table_rows_html", review_rows_html(reviews, threshold)),
        (
            "reviews_note",
            "Δ = Veränderung der Ø-Bewertung gegenüber der Vorwoche (sofern Daten vorliegen).".to_string(),
        ),
        ("urgent_block_html", link_list_html("⚠️ Dringend", &urgent)),
        ("rumors_block_html", link_list_html("Boulevard / Gerüchte", &rumors)),
    ];

    RenderedReport {
        subject: daily_subject(&ctx.brand, &ctx.date_str),
        html: fill_template(template, &values),
    }
}

pub fn urgent_subject(brand: &str) -> String {
    format!("⚠️ Monitoring {brand} erwähnt")
}

/// Plain alert for the watcher: one block per hit, preformatted.
pub fn build_urgent_alert(brand: &str, hits: &[UrgentHit]) -> RenderedReport {
    let mut body = format!("Dringende Erwähnungen von {brand}:\n\n");
    for hit in hits {
        let _ = writeln!(body, "- {}\n  {}", hit.title, hit.link);
    }

    RenderedReport {
        subject: urgent_subject(brand),
        html: format!("<pre>{}</pre>", encode_text(&body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekAggregate;
    use crate::ranking::{negative_share_leaders, rank_locations, RankingConfig};
    use chrono::TimeZone;
    use chrono_tz::Europe::Berlin;

    fn stat(region: &str, name: &str, prev: Option<(f64, u32)>, curr: (f64, u32)) -> LocationWeeklyStat {
        LocationWeeklyStat {
            region: region.to_string(),
            location_name: name.to_string(),
            previous: prev.map(|(avg_rating, review_count)| WeekAggregate {
                avg_rating,
                review_count,
                negative_count: 0,
            }),
            current: WeekAggregate {
                avg_rating: curr.0,
                review_count: curr.1,
                negative_count: 0,
            },
        }
    }

    fn context() -> ReportContext {
        let now = Berlin.with_ymd_and_hms(2026, 10, 12, 9, 0, 0).unwrap();
        ReportContext::new("Kaufland", &now, "stefan@example.com")
    }

    fn item(title: &str, url: &str, kind: SourceKind, score: u8) -> NewsItem {
        NewsItem {
            title: title.to_string(),
            url: url.to_string(),
            summary: String::new(),
            source: news::host_of(url).to_string(),
            kind,
            score,
            published: None,
        }
    }

    #[test]
    fn fill_template_is_single_pass() {
        let filled = fill_template(
            "<style>p { color: red; }</style>{a}|{b}|{missing}",
            &[("a", "{b}".to_string()), ("b", "x".to_string())],
        );
        assert_eq!(filled, "<style>p { color: red; }</style>{b}|x|{missing}");
        assert_eq!(fill_template("open { only", &[]), "open { only");
    }

    #[test]
    fn formats_german_dates_and_weeks() {
        let ctx = context();
        assert_eq!(ctx.date_str, "Montag, 12. Oktober 2026");
        assert_eq!(ctx.timezone, "Europe/Berlin");

        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(week_start_of(sunday), NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        assert_eq!(reporting_week(monday), NaiveDate::from_ymd_opt(2026, 10, 5).unwrap());
        assert_eq!(
            week_range_label(NaiveDate::from_ymd_opt(2026, 10, 5).unwrap()),
            "KW 41 (05.10.2026 – 11.10.2026)"
        );
    }

    #[test]
    fn ranking_rows_use_six_columns_and_na_for_first_observations() {
        let known = RankedRow::from_stat(&stat("Berlin", "A", Some((4.5, 10)), (4.0, 15)));
        let html = ranking_row_html(&known);
        assert_eq!(html.matches("<td").count(), 6);
        assert!(html.contains(">4.50<"));
        assert!(html.contains(">4.00<"));
        assert!(html.contains(r#"class="num neg">-0.50<"#));
        assert!(html.contains("10 → 15 (+5)"));

        let new = RankedRow::from_stat(&stat("Berlin", "C", None, (4.9, 3)));
        let html = ranking_row_html(&new);
        assert!(html.contains(">–<"));
        assert!(html.contains(">n/a<"));
        assert!(html.contains("– → 3 (n/a)"));
    }

    #[test]
    fn rows_escape_location_names() {
        let row = RankedRow::from_stat(&stat("Saar<land>", "A & B", None, (4.0, 1)));
        let html = ranking_row_html(&row);
        assert!(html.contains("Saar&lt;land&gt;"));
        assert!(html.contains("A &amp; B"));
    }

    #[test]
    fn empty_ranking_renders_explanation_row() {
        let html = ranking_rows_html(&[], "Nichts zu melden.");
        assert!(html.contains(r#"colspan="6""#));
        assert!(html.contains("Nichts zu melden."));
    }

    #[test]
    fn weekly_report_fills_every_placeholder() {
        let mut stats = vec![
            stat("Berlin", "A", Some((4.5, 10)), (4.0, 15)),
            stat("Bayern", "B", Some((3.0, 5)), (3.8, 6)),
            stat("Sachsen", "C", None, (4.9, 3)),
        ];
        stats[0].current.negative_count = 6;
        let rankings = rank_locations(&stats, &RankingConfig::default());
        let leaders = negative_share_leaders(&stats, 5);
        let week = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
        let report =
            build_weekly_report(WEEKLY_TEMPLATE, &context(), week, &stats, &rankings, &leaders);

        for placeholder in [
            "{date_str}",
            "{tz}",
            "{recipient}",
            "{total_new_reviews}",
            "{summary_html}",
            "{neg_rows_html}",
            "{pos_rows_html}",
            "{vol_rows_html}",
            "{threshold_note}",
            "{brand}",
            "{week_range}",
            "{neg_share_rows_html}",
        ] {
            assert!(!report.html.contains(placeholder), "{placeholder} left in output");
        }
        assert!(report.html.contains("<strong>24</strong>"));
        assert!(report.html.contains("Montag, 12. Oktober 2026"));
        assert!(report.html.contains("1 ohne Vorwochendaten"));
        assert!(report.html.contains("Größter Rückgang: <strong>A</strong>"));
        assert!(report.html.contains(
            "Höchster Anteil negativer Reviews: <strong>A</strong> (Berlin), 6 von 15 (40.0 %)"
        ));
        assert!(report.html.contains(r#"<td class="num neg">40.0 %</td>"#));
        assert_eq!(report.subject, "📝 Kaufland – Weekly Google Reviews | KW 41");
    }

    #[test]
    fn empty_week_still_explains_itself() {
        let rankings = rank_locations(&[], &RankingConfig::default());
        let week = NaiveDate::from_ymd_opt(2026, 10, 5).unwrap();
        let report = build_weekly_report(WEEKLY_TEMPLATE, &context(), week, &[], &rankings, &[]);
        assert!(report.html.contains("0 Filialen ausgewertet"));
        assert!(report.html.contains("Keine negativen Reviews in dieser Woche."));
        assert!(report.html.contains("keine Filialdaten"));
        assert!(report.html.contains("<strong>0</strong>"));
    }

    #[test]
    fn daily_report_lists_headlines_and_blocks() {
        let items = vec![
            item("Kaufland Rückruf: Käse", "https://www.tagesschau.de/a", SourceKind::Serious, 5),
            item("Kaufland Promi-Einkauf", "https://www.bild.de/b", SourceKind::Boulevard, 2),
            item("Kaufland <neu>", "https://blog.example.org/c?x=1&y=2", SourceKind::Neutral, 1),
        ];
        let report = build_daily_report(DAILY_TEMPLATE, &context(), &items, 2, None, 0.3);

        assert!(report.html.contains("Virale Erwähnungen – Top 2"));
        assert!(report.html.contains(r#"<span class="rank">1.</span>"#));
        assert!(report.html.contains("Grund: relevant"));
        assert!(!report.html.contains("Kaufland &lt;neu&gt;</a><div"));
        assert!(report.html.contains("⚠️ Dringend"));
        assert!(report.html.contains("Boulevard / Gerüchte"));
        assert!(report.html.contains("INCLUDE_REVIEWS"));
        assert!(!report.html.contains("{top_headlines_html}"));
        assert_eq!(
            report.subject,
            "📰 Kaufland Media & Review Briefing | Montag, 12. Oktober 2026"
        );
    }

    #[test]
    fn daily_review_rows_flag_trends() {
        let rows = vec![
            RankedRow::from_stat(&stat("Berlin", "A", Some((4.5, 10)), (4.0, 15))),
            RankedRow::from_stat(&stat("Sachsen", "C", None, (4.9, 3))),
            RankedRow::from_stat(&stat("Bayern", "D", Some((4.0, 3)), (4.1, 3))),
        ];
        let html = review_rows_html(Some(rows.as_slice()), 0.3);
        assert!(html.contains("negativer Trend"));
        assert!(html.contains("neu im Monitoring"));
        assert!(html.contains("stabil"));
        assert!(review_rows_html(Some(&[][..]), 0.3).contains("Pilotmodus"));
    }

    #[test]
    fn daily_flag_agrees_with_weekly_ranking_at_the_threshold() {
        let edge = stat("Berlin", "Edge", Some((4.3, 3)), (4.0, 3));
        let rankings = rank_locations(std::slice::from_ref(&edge), &RankingConfig::default());
        assert_eq!(rankings.decline.len(), 1);

        let rows = vec![RankedRow::from_stat(&edge)];
        let html = review_rows_html(Some(rows.as_slice()), 0.3);
        assert!(html.contains("negativer Trend"), "{html}");
        assert!(!html.contains("stabil"));

        let rise = RankedRow::from_stat(&stat("Berlin", "Rise", Some((4.0, 3)), (4.3, 3)));
        assert!(review_rows_html(Some(&[rise][..]), 0.3).contains("positiver Trend"));
    }

    #[test]
    fn urgent_alert_is_preformatted_and_escaped() {
        let hits = vec![
            UrgentHit {
                title: "Kaufland Rückruf <Salami>".to_string(),
                link: "https://www.tagesschau.de/a?x=1&y=2".to_string(),
            },
            UrgentHit {
                title: "Streik bei Kaufland".to_string(),
                link: "https://www.zeit.de/b".to_string(),
            },
        ];
        let alert = build_urgent_alert("Kaufland", &hits);
        assert_eq!(alert.subject, "⚠️ Monitoring Kaufland erwähnt");
        assert!(alert.html.starts_with("<pre>"));
        assert!(alert.html.contains("- Kaufland Rückruf &lt;Salami&gt;"));
        assert!(alert.html.contains("x=1&amp;y=2"));
        assert!(alert.html.contains("- Streik bei Kaufland"));
    }
}
