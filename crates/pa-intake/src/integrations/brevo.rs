use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;

use crate::config::MailConfig;
use crate::workflows::accounts::mailer::{EmailMessage, MailError, Mailer};

/// Transactional e-mail through the Brevo SMTP API.
#[derive(Clone)]
pub struct BrevoMailer {
    http: Client,
    api_url: String,
    api_key: String,
    sender_name: String,
    sender_email: String,
}

impl BrevoMailer {
    pub fn new(http: Client, api_key: String, config: &MailConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            api_key,
            sender_name: config.sender_name.clone(),
            sender_email: config.sender_email.clone(),
        }
    }
}

#[derive(Serialize)]
struct Contact<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmail<'a> {
    sender: Contact<'a>,
    to: Vec<Contact<'a>>,
    subject: &'a str,
    html_content: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    text_content: &'a str,
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let payload = SendEmail {
            sender: Contact {
                name: Some(&self.sender_name),
                email: &self.sender_email,
            },
            to: vec![Contact {
                name: None,
                email: &message.to,
            }],
            subject: &message.subject,
            html_content: &message.html,
            text_content: &message.text,
        };

        let response = self
            .http
            .post(&self.api_url)
            .header("api-key", &self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    MailError::TimedOut
                } else {
                    MailError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::ACCEPTED
        ) {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
