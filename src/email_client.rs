use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use uuid::Uuid;

use crate::{configuration::EmailSettings, domain::user_email::UserEmail};

/// Postmark-compatible client for the e-mails the shop sends.
#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: UserEmail,
    authorization_token: SecretString,
}

/// Receipt for a freshly placed order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderConfirmation<'a> {
    pub order_id: Uuid,
    pub username: &'a str,
    pub total_price: Decimal,
}

impl OrderConfirmation<'_> {
    pub const TAG: &'static str = "order-confirmation";

    pub fn subject(&self) -> String {
        format!("Order {} received", self.order_id)
    }

    pub fn text_body(&self) -> String {
        format!(
            "Hi {},\n\nWe received your order {}.\nTotal: {}\n",
            self.username, self.order_id, self.total_price
        )
    }

    pub fn html_body(&self) -> String {
        format!(
            "<p>Hi {},</p><p>We received your order <strong>{}</strong>.</p><p>Total: {}</p>",
            self.username, self.order_id, self.total_price
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct OutboundMessage<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html_body: &'a str,
    text_body: &'a str,
    tag: &'a str,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: UserEmail,
        authorization_token: SecretString,
        timeout: Duration,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            sender,
            authorization_token,
        })
    }

    pub fn from_settings(settings: &EmailSettings) -> Result<EmailClient, anyhow::Error> {
        let sender = settings.sender().map_err(|e| anyhow::anyhow!(e))?;

        Ok(Self::new(
            settings.api_uri.clone(),
            sender,
            settings.authorization_token.clone(),
            Duration::from_secs(settings.timeout_seconds),
        )?)
    }

    #[tracing::instrument(
        "Sending order confirmation",
        skip(self, recipient, confirmation),
        fields(recipient = %recipient, order_id = %confirmation.order_id)
    )]
    pub async fn send_order_confirmation(
        &self,
        recipient: &UserEmail,
        confirmation: &OrderConfirmation<'_>,
    ) -> Result<(), reqwest::Error> {
        let subject = confirmation.subject();
        let html_body = confirmation.html_body();
        let text_body = confirmation.text_body();

        self.post_message(OutboundMessage {
            from: self.sender.inner(),
            to: recipient.inner(),
            subject: &subject,
            html_body: &html_body,
            text_body: &text_body,
            tag: OrderConfirmation::TAG,
        })
        .await
    }

    async fn post_message(&self, message: OutboundMessage<'_>) -> Result<(), reqwest::Error> {
        self.http_client
            .post(format!("{}/email", self.base_url))
            .header(
                "X-Postmark-Server-Token",
                self.authorization_token.expose_secret(),
            )
            .json(&message)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
