use std::env;
use std::str::FromStr;

use chrono_tz::Tz;

use crate::ranking::RankingConfig;

/// Which outbound channel delivers the rendered reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTransport {
    Smtp,
    Resend,
}

impl MailTransport {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "smtp" => Ok(Self::Smtp),
            "resend" => Ok(Self::Resend),
            _ => Err(ConfigError::invalid("MAIL_TRANSPORT", value)),
        }
    }
}

/// Top-level configuration, read once per run from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub brand: String,
    pub timezone: Tz,
    pub database_url: Option<String>,
    pub report: ReportConfig,
    pub news: NewsConfig,
    pub reviews: ReviewsConfig,
    pub mail: MailConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let first_of = |keys: &[&str]| keys.iter().find_map(|key| get(key));

        let brand = get("BRAND").unwrap_or_else(|| "Kaufland".to_string());

        let timezone_name = get("TIMEZONE").unwrap_or_else(|| "Europe/Berlin".to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|_| ConfigError::invalid("TIMEZONE", &timezone_name))?;

        let max_top = match get("MAX_TOP") {
            Some(raw) => parse_max_top(&raw)?,
            None => 5,
        };
        let threshold = parse_or("REVIEW_THRESHOLD", get("REVIEW_THRESHOLD"), 0.3f64)?;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(ConfigError::invalid("REVIEW_THRESHOLD", &threshold.to_string()));
        }
        let include_reviews = match get("INCLUDE_REVIEWS") {
            Some(value) => parse_bool("INCLUDE_REVIEWS", &value)?,
            None => false,
        };

        let feeds = match get("NEWS_FEEDS") {
            Some(value) => split_list(&value),
            None => default_feeds(&brand),
        };
        let news = NewsConfig {
            max_top: parse_or("NEWS_MAX_TOP", get("NEWS_MAX_TOP"), 15usize)?,
            feeds,
        };

        let reviews = ReviewsConfig {
            serpapi_key: get("SERPAPI_KEY"),
            max_pages: parse_or("SERPAPI_MAX_PAGES", get("SERPAPI_MAX_PAGES"), 5usize)?,
            weekly_json: get("WEEKLY_REVIEWS_JSON"),
        };

        let transport = MailTransport::parse(&get("MAIL_TRANSPORT").unwrap_or_default())?;
        let from = first_of(&["EMAIL_FROM", "SENDER_EMAIL"]);
        let mail = MailConfig {
            transport,
            recipients: first_of(&["RECIPIENT", "EMAIL_TO"])
                .map(|value| split_list(&value))
                .unwrap_or_default(),
            cc: get("CC").map(|value| split_list(&value)).unwrap_or_default(),
            bcc: get("BCC").map(|value| split_list(&value)).unwrap_or_default(),
            smtp: SmtpConfig {
                host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                port: parse_or("SMTP_PORT", get("SMTP_PORT"), 465u16)?,
                user: get("SMTP_USER").or_else(|| get("SENDER_EMAIL")),
                password: first_of(&["SMTP_PASSWORD", "SMTP_APP_PASSWORD"]),
            },
            resend_api_key: get("RESEND_API_KEY"),
            from,
        };

        Ok(Self {
            brand,
            timezone,
            database_url: get("DATABASE_URL"),
            report: ReportConfig {
                max_top,
                threshold,
                include_reviews,
            },
            news,
            reviews,
            mail,
            telemetry: TelemetryConfig {
                log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            },
        })
    }
}

/// Ranking and report shaping.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub max_top: usize,
    pub threshold: f64,
    pub include_reviews: bool,
}

impl ReportConfig {
    pub fn ranking(&self) -> RankingConfig {
        RankingConfig {
            threshold: self.threshold,
            max_top: self.max_top,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub max_top: usize,
    pub feeds: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReviewsConfig {
    pub serpapi_key: Option<String>,
    pub max_pages: usize,
    pub weekly_json: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from: Option<String>,
    pub recipients: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub smtp: SmtpConfig,
    pub resend_api_key: Option<String>,
}

impl MailConfig {
    pub fn recipient_label(&self) -> String {
        self.recipients.join(", ")
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
        }
    }
}

/// Google News RSS searches for the brand: general coverage, store news and
/// crisis terms.
pub fn default_feeds(brand: &str) -> Vec<String> {
    let query = brand.split_whitespace().collect::<Vec<_>>().join("+");
    [
        format!("{query}+Deutschland"),
        format!("{query}+Filiale"),
        format!("{query}+Skandal+OR+R%C3%BCckruf+OR+Boykott"),
    ]
    .into_iter()
    .map(|q| format!("https://news.google.com/rss/search?q={q}&hl=de&gl=DE&ceid=DE:de"))
    .collect()
}

/// Row cap for rankings; shared by `MAX_TOP` and `--max-top`.
pub fn parse_max_top(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::invalid("MAX_TOP", raw)),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T: FromStr>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError> {
    match value {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::invalid(key, &raw)),
        None => Ok(default),
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    fn load_with(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load_with(&[]).expect("config loads with defaults");
        assert_eq!(config.brand, "Kaufland");
        assert_eq!(config.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.report.max_top, 5);
        assert!((config.report.threshold - 0.3).abs() < f64::EPSILON);
        assert!(!config.report.include_reviews);
        assert_eq!(config.news.max_top, 15);
        assert_eq!(config.news.feeds.len(), 3);
        assert_eq!(config.mail.transport, MailTransport::Smtp);
        assert_eq!(config.mail.smtp.host, "smtp.gmail.com");
        assert_eq!(config.mail.smtp.port, 465);
        assert!(config.mail.recipients.is_empty());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn reads_report_settings_and_lists() {
        let config = load_with(&[
            ("RECIPIENT", "a@example.com, b@example.com"),
            ("TIMEZONE", "Europe/Vienna"),
            ("MAX_TOP", "3"),
            ("INCLUDE_REVIEWS", "true"),
            ("REVIEW_THRESHOLD", "0.15"),
            ("MAIL_TRANSPORT", "Resend"),
        ])
        .expect("config loads");
        assert_eq!(config.mail.recipients, vec!["a@example.com", "b@example.com"]);
        assert_eq!(config.mail.recipient_label(), "a@example.com, b@example.com");
        assert_eq!(config.timezone, chrono_tz::Europe::Vienna);
        assert_eq!(config.report.ranking().max_top, 3);
        assert!(config.report.include_reviews);
        assert_eq!(config.mail.transport, MailTransport::Resend);
    }

    #[test]
    fn falls_back_to_legacy_mail_keys() {
        let config = load_with(&[
            ("EMAIL_TO", "stefan@example.com"),
            ("SENDER_EMAIL", "monitor@example.com"),
            ("SMTP_APP_PASSWORD", "secret"),
        ])
        .expect("config loads");
        assert_eq!(config.mail.recipients, vec!["stefan@example.com"]);
        assert_eq!(config.mail.from.as_deref(), Some("monitor@example.com"));
        assert_eq!(config.mail.smtp.user.as_deref(), Some("monitor@example.com"));
        assert_eq!(config.mail.smtp.password.as_deref(), Some("secret"));
    }

    #[test]
    fn rejects_invalid_values() {
        assert_eq!(
            load_with(&[("MAX_TOP", "many")]).unwrap_err(),
            ConfigError::Invalid {
                key: "MAX_TOP",
                value: "many".to_string()
            }
        );
        assert!(load_with(&[("MAX_TOP", "0")]).is_err());
        assert_eq!(parse_max_top(" 4 "), Ok(4));
        assert!(parse_max_top("0").is_err());
        assert!(load_with(&[("TIMEZONE", "Mars/Olympus")]).is_err());
        assert!(load_with(&[("INCLUDE_REVIEWS", "maybe")]).is_err());
        assert!(load_with(&[("REVIEW_THRESHOLD", "-1")]).is_err());
        assert!(load_with(&[("MAIL_TRANSPORT", "pigeon")]).is_err());
    }

    #[test]
    fn feeds_follow_brand_unless_overridden() {
        let config = load_with(&[("BRAND", "Lidl Plus")]).expect("config loads");
        assert!(config.news.feeds[0].contains("q=Lidl+Plus+Deutschland"));

        let config = load_with(&[("NEWS_FEEDS", "https://a.example/rss, https://b.example/rss")])
            .expect("config loads");
        assert_eq!(config.news.feeds, vec!["https://a.example/rss", "https://b.example/rss"]);
    }

    #[test]
    fn load_reads_process_environment() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        env::set_var("MAX_TOP", "7");
        let config = AppConfig::load();
        env::remove_var("MAX_TOP");
        assert_eq!(config.expect("config loads").report.max_top, 7);
    }
}
