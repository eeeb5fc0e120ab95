use std::collections::HashSet;

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use rss::Channel;
use tracing::{debug, info};

use crate::models::{NewsItem, SourceKind, UrgentHit};
use crate::net;

const BOULEVARD_DOMAINS: [&str; 4] = ["bild.de", "express.de", "tz.de", "promiflash.de"];
const SERIOUS_HINTS: [&str; 7] = [
    "handelsblatt",
    "lebensmittelzeitung",
    "faz.net",
    "sueddeutsche",
    "zeit.de",
    "tagesschau",
    "spiegel.de",
];
const HEADLINE_BOOSTS: [&str; 8] = [
    "umsatz", "eröffnung", "rückruf", "skandal", "boykott", "krise", "esg", "invest",
];
const URGENT_KEYWORDS: [&str; 8] = [
    "rückruf",
    "skandal",
    "boykott",
    "shitstorm",
    "datenschutz",
    "krise",
    "ermittlungen",
    "streik",
];

/// Articles older than this are left to the previous run.
const FRESHNESS_HOURS: i64 = 24;

/// Editorial buckets for the PDF briefing, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Recall,
    Hygiene,
    Prices,
    Stores,
    Staff,
    Reputation,
    Other,
}

impl Topic {
    pub const ORDERED: [Topic; 7] = [
        Topic::Recall,
        Topic::Hygiene,
        Topic::Prices,
        Topic::Stores,
        Topic::Staff,
        Topic::Reputation,
        Topic::Other,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Recall => "Rückruf / Sicherheit",
            Self::Hygiene => "Hygiene / Qualität",
            Self::Prices => "Preise / Aktionen",
            Self::Stores => "Filialen / Expansion",
            Self::Staff => "Personal / Arbeitsbedingungen",
            Self::Reputation => "Reputation / Medien",
            Self::Other => "Sonstiges",
        }
    }

    const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::Recall => &[
                "rückruf",
                "warnung",
                "produktsicherheit",
                "gefährdung",
                "gesundheitsgefahr",
                "verunreinigung",
            ],
            Self::Hygiene => &[
                "hygiene",
                "verschmutzt",
                "schimmel",
                "ekel",
                "verdorben",
                "qualität",
                "abgelaufen",
            ],
            Self::Prices => &[
                "preis", "rabatt", "angebot", "aktion", "billig", "teuer", "inflation", "günstig",
            ],
            Self::Stores => &[
                "neue filiale",
                "filiale eröffnet",
                "eröffnung",
                "neuer markt",
                "umbau",
                "standort",
                "expansion",
                "verkaufsfläche",
            ],
            Self::Staff => &[
                "mitarbeiter",
                "arbeitnehmer",
                "streik",
                "tarif",
                "gehalt",
                "lohn",
                "arbeitsbedingungen",
                "personal",
                "team",
            ],
            Self::Reputation => &[
                "shitstorm",
                "boykott",
                "kritik",
                "skandal",
                "image",
                "pr-kampagne",
                "werbung",
                "kampagne",
                "social media",
                "tiktok",
                "instagram",
            ],
            Self::Other => &[],
        }
    }
}

pub fn topic_of(item: &NewsItem) -> Topic {
    let text = format!("{} {}", item.title, item.summary).to_lowercase();
    Topic::ORDERED
        .into_iter()
        .find(|topic| topic.keywords().iter().any(|kw| text.contains(kw)))
        .unwrap_or(Topic::Other)
}

pub fn host_of(url: &str) -> &str {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

pub fn classify(url: &str, title: &str) -> (String, SourceKind, u8) {
    let host = host_of(url);
    let kind = if BOULEVARD_DOMAINS.iter().any(|domain| host.contains(domain)) {
        SourceKind::Boulevard
    } else if SERIOUS_HINTS.iter().any(|hint| host.contains(hint)) {
        SourceKind::Serious
    } else {
        SourceKind::Neutral
    };

    let title_lc = title.to_lowercase();
    let boost = if HEADLINE_BOOSTS.iter().any(|kw| title_lc.contains(kw)) {
        2
    } else {
        0
    };
    (host.to_string(), kind, kind.base_score() + boost)
}

pub fn is_urgent(title: &str) -> bool {
    let title_lc = title.to_lowercase();
    URGENT_KEYWORDS.iter().any(|kw| title_lc.contains(kw))
}

/// Drops markup from feed descriptions and collapses whitespace.
pub fn strip_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = html_escape::decode_html_entities(&out);
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn shorten_url(url: &str, max_len: usize) -> String {
    let trimmed = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    if trimmed.chars().count() <= max_len {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(max_len.saturating_sub(1)).collect();
    short.push('…');
    short
}

fn published_at(item: &rss::Item) -> Option<DateTime<Utc>> {
    item.pub_date()
        .and_then(|raw| DateTime::parse_from_rfc2822(raw).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Turns raw feed channels into scored brand mentions from the last day,
/// highest score first. Links seen in an earlier feed are skipped.
pub fn collect_items(channels: &[Channel], brand: &str, now: DateTime<Utc>) -> Vec<NewsItem> {
    let cutoff = now - Duration::hours(FRESHNESS_HOURS);
    let brand_lc = brand.to_lowercase();
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for entry in channels.iter().flat_map(|channel| channel.items()) {
        let Some(link) = entry.link() else {
            continue;
        };
        if !seen.insert(link.to_string()) {
            continue;
        }

        let published = published_at(entry);
        if published.is_some_and(|at| at < cutoff) {
            continue;
        }

        let title = entry.title().unwrap_or_default().trim().to_string();
        let summary = strip_tags(entry.description().unwrap_or_default());
        if !format!("{title} {summary}").to_lowercase().contains(&brand_lc) {
            debug!(link, "skipping entry without brand mention");
            continue;
        }

        let (source, kind, score) = classify(link, &title);
        items.push(NewsItem {
            title,
            url: link.to_string(),
            summary,
            source,
            kind,
            score,
            published,
        });
    }

    items.sort_by(|a, b| b.score.cmp(&a.score));
    items
}

/// Headlines matching an urgent keyword among the newest `per_feed` entries
/// of every feed.
pub fn urgent_hits(channels: &[Channel], per_feed: usize) -> Vec<UrgentHit> {
    let mut seen = HashSet::new();
    let mut hits = Vec::new();

    for channel in channels {
        for entry in channel.items().iter().take(per_feed) {
            let Some(link) = entry.link() else {
                continue;
            };
            if !seen.insert(link.to_string()) {
                continue;
            }
            let title = entry.title().unwrap_or_default();
            if is_urgent(title) {
                hits.push(UrgentHit {
                    title: title.trim().to_string(),
                    link: link.to_string(),
                });
            }
        }
    }

    hits
}

pub async fn fetch_channels(client: &reqwest::Client, feeds: &[String]) -> anyhow::Result<Vec<Channel>> {
    let mut channels = Vec::with_capacity(feeds.len());
    for url in feeds {
        let body = net::fetch_bytes(client, url).await?;
        let channel = Channel::read_from(&body[..])
            .with_context(|| format!("feed {url} is not valid RSS"))?;
        info!(feed = %url, entries = channel.items().len(), "fetched feed");
        channels.push(channel);
    }
    Ok(channels)
}

pub async fn fetch_news(
    client: &reqwest::Client,
    feeds: &[String],
    brand: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<NewsItem>> {
    let channels = fetch_channels(client, feeds).await?;
    let items = collect_items(&channels, brand, now);
    info!(items = items.len(), "collected brand mentions");
    Ok(items)
}
