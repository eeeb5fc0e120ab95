//! Outbound e-mail over SMTP or the Resend API, one attempt per message.

use base64::Engine;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Serialize;
use tracing::info;

use crate::config::{MailConfig, MailTransport};

const RESEND_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("missing required config: {0}")]
    MissingConfig(&'static str),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Resend rejected the message ({status}): {body}")]
    Resend { status: u16, body: String },

    #[error("Resend request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Attachment {
    pub fn pdf(filename: String, content: Vec<u8>) -> Self {
        Self {
            filename,
            content_type: "application/pdf".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub subject: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

pub struct Mailer<'a> {
    config: &'a MailConfig,
    client: &'a reqwest::Client,
}

impl<'a> Mailer<'a> {
    pub fn new(config: &'a MailConfig, client: &'a reqwest::Client) -> Self {
        Self { config, client }
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        match self.config.transport {
            MailTransport::Smtp => self.send_smtp(email).await,
            MailTransport::Resend => self.send_resend(email).await,
        }
    }

    async fn send_smtp(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let message = build_message(self.config, email)?;
        let smtp = &self.config.smtp;

        // 587 is the submission port and expects STARTTLS; everything else
        // gets implicit TLS.
        let relay = if smtp.port == 587 {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        };
        let builder = relay
            .map_err(|err| DeliveryError::Smtp(err.to_string()))?
            .port(smtp.port);

        let builder = match (&smtp.user, &smtp.password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        builder
            .build()
            .send(message)
            .await
            .map_err(|err| DeliveryError::Smtp(err.to_string()))?;

        info!(host = %smtp.host, recipients = self.config.recipients.len(), subject = %email.subject, "sent report via SMTP");
        Ok(())
    }

    async fn send_resend(&self, email: &OutgoingEmail) -> Result<(), DeliveryError> {
        let api_key = self
            .config
            .resend_api_key
            .as_deref()
            .ok_or(DeliveryError::MissingConfig("RESEND_API_KEY"))?;
        let payload = ResendPayload::new(self.config, email)?;

        let resp = self
            .client
            .post(RESEND_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(DeliveryError::Resend {
                status: status.as_u16(),
                body,
            });
        }

        info!(status = status.as_u16(), response = %body, subject = %email.subject, "sent report via Resend");
        Ok(())
    }
}

fn parse_mailbox(value: &str) -> Result<Mailbox, DeliveryError> {
    value
        .parse::<Mailbox>()
        .map_err(|_| DeliveryError::InvalidAddress(value.to_string()))
}

fn require_addresses(config: &MailConfig) -> Result<&str, DeliveryError> {
    let from = config
        .from
        .as_deref()
        .ok_or(DeliveryError::MissingConfig("EMAIL_FROM"))?;
    if config.recipients.is_empty() {
        return Err(DeliveryError::MissingConfig("RECIPIENT"));
    }
    Ok(from)
}

pub fn build_message(config: &MailConfig, email: &OutgoingEmail) -> Result<Message, DeliveryError> {
    let from = require_addresses(config)?;

    let mut builder = Message::builder()
        .from(parse_mailbox(from)?)
        .subject(email.subject.as_str());
    for to in &config.recipients {
        builder = builder.to(parse_mailbox(to)?);
    }
    for cc in &config.cc {
        builder = builder.cc(parse_mailbox(cc)?);
    }
    for bcc in &config.bcc {
        builder = builder.bcc(parse_mailbox(bcc)?);
    }

    let mut body = MultiPart::mixed().singlepart(SinglePart::html(email.html.clone()));
    for attachment in &email.attachments {
        let content_type = ContentType::parse(&attachment.content_type)
            .map_err(|err| DeliveryError::Build(err.to_string()))?;
        body = body.singlepart(
            MailAttachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), content_type),
        );
    }

    builder
        .multipart(body)
        .map_err(|err| DeliveryError::Build(err.to_string()))
}

#[derive(Debug, Serialize)]
struct ResendAttachment<'a> {
    filename: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    cc: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    bcc: &'a [String],
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<ResendAttachment<'a>>,
}

impl<'a> ResendPayload<'a> {
    fn new(config: &'a MailConfig, email: &'a OutgoingEmail) -> Result<Self, DeliveryError> {
        let from = require_addresses(config)?;
        Ok(Self {
            from,
            to: &config.recipients,
            cc: &config.cc,
            bcc: &config.bcc,
            subject: &email.subject,
            html: &email.html,
            attachments: email
                .attachments
                .iter()
                .map(|attachment| ResendAttachment {
                    filename: &attachment.filename,
                    content: base64::engine::general_purpose::STANDARD.encode(&attachment.content),
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmtpConfig;

    fn mail_config() -> MailConfig {
        MailConfig {
            transport: MailTransport::Smtp,
            from: Some("Brand Monitoring <monitor@example.com>".to_string()),
            recipients: vec!["stefan@example.com".to_string()],
            cc: vec!["team@example.com".to_string()],
            bcc: Vec::new(),
            smtp: SmtpConfig {
                host: "smtp.example.com".to_string(),
                port: 465,
                user: None,
                password: None,
            },
            resend_api_key: Some("re_test".to_string()),
        }
    }

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            subject: "Weekly Google Reviews".to_string(),
            html: "<p>Hallo</p>".to_string(),
            attachments: vec![Attachment::pdf("briefing.pdf".to_string(), b"%PDF-1.3".to_vec())],
        }
    }

    #[test]
    fn builds_multipart_message_with_attachment() {
        let message = build_message(&mail_config(), &email()).expect("message builds");
        let raw = String::from_utf8(message.formatted()).expect("utf-8 message");
        assert!(raw.contains("Subject: Weekly Google Reviews"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("briefing.pdf"));
        assert!(raw.contains("Cc: team@example.com"));
    }

    #[test]
    fn missing_sender_or_recipient_is_a_config_error() {
        let mut config = mail_config();
        config.from = None;
        assert!(matches!(
            build_message(&config, &email()),
            Err(DeliveryError::MissingConfig("EMAIL_FROM"))
        ));

        let mut config = mail_config();
        config.recipients.clear();
        assert!(matches!(
            build_message(&config, &email()),
            Err(DeliveryError::MissingConfig("RECIPIENT"))
        ));
    }

    #[test]
    fn rejects_malformed_addresses() {
        let mut config = mail_config();
        config.recipients = vec!["not an address".to_string()];
        assert!(matches!(
            build_message(&config, &email()),
            Err(DeliveryError::InvalidAddress(addr)) if addr == "not an address"
        ));
    }

    #[test]
    fn resend_payload_encodes_attachments() {
        let config = mail_config();
        let email = email();
        let payload = ResendPayload::new(&config, &email).expect("payload builds");
        let json = serde_json::to_value(&payload).expect("payload serializes");

        assert_eq!(json["from"], "Brand Monitoring <monitor@example.com>");
        assert_eq!(json["to"][0], "stefan@example.com");
        assert_eq!(json["cc"][0], "team@example.com");
        assert!(json.get("bcc").is_none());
        assert_eq!(json["attachments"][0]["filename"], "briefing.pdf");
        assert_eq!(json["attachments"][0]["content"], "JVBERi0xLjM=");
    }
}
