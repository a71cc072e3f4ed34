use serde::Serialize;

use crate::usecase::contracts::{Mailer, MailerError, OutgoingEmail};

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

/// Email provider client speaking a simple JSON-over-HTTP send API.
/// Sends are best-effort and never retried.
#[derive(Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    sender: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, api_key: String, sender: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("failed to build mailer HTTP client"),
            endpoint,
            api_key,
            sender,
        }
    }
}

impl Mailer for HttpMailer {
    #[tracing::instrument(skip(self, email), fields(to = %email.to, subject = %email.subject))]
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailerError> {
        tracing::debug!("sending email");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&MailRequest {
                from: &self.sender,
                to: &email.to,
                subject: &email.subject,
                html: &email.html,
            })
            .send()
            .await
            .map_err(|e| MailerError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MailerError::Delivery(format!("{status}: {body}")));
        }

        tracing::debug!("email accepted by provider");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "user@example.com".to_string(),
            subject: "Maintenance tonight".to_string(),
            html: "<h2>Maintenance tonight</h2>".to_string(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_json_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer key"))
            .and(body_partial_json(serde_json::json!({
                "to": "user@example.com",
                "subject": "Maintenance tonight",
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            format!("{}/send", server.uri()),
            "key".to_string(),
            "noreply@example.com".to_string(),
        );

        assert!(mailer.send(&email()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_surfaces_provider_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("provider down"))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(
            server.uri(),
            "key".to_string(),
            "noreply@example.com".to_string(),
        );
        let result = mailer.send(&email()).await;

        assert!(matches!(result, Err(MailerError::Delivery(_))));
    }
}
