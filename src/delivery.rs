// src/delivery.rs - Outbound webhook delivery
//
// Thin adapter over the automation webhooks. The matching core knows
// nothing about delivery; this module takes the plain record lists it
// produced and wraps them in the webhook envelope.
use anyhow::{Context, Result};
use chrono::Utc;
use log::info;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::models::matching::{ClassifiedRow, MissingRecord};

const DELIVERY_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'a str,
    timestamp: String,
    count: usize,
    products: &'a [T],
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub status: u16,
}

pub struct WebhookClient {
    client: Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DELIVERY_TIMEOUT_SECS))
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub async fn send_price_updates(&self, rows: &[ClassifiedRow]) -> Result<DeliveryOutcome> {
        self.send("price_updates", rows).await
    }

    pub async fn send_missing_products(&self, records: &[MissingRecord]) -> Result<DeliveryOutcome> {
        self.send("missing_products", records).await
    }

    async fn send<T: Serialize>(&self, kind: &str, products: &[T]) -> Result<DeliveryOutcome> {
        let payload = WebhookPayload {
            kind,
            timestamp: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            count: products.len(),
            products,
        };
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("Failed to deliver '{}' webhook", kind))?;
        let status = response.status().as_u16();
        let success = response.status().is_success();
        info!(
            "📤 Webhook '{}': {} products, status {}",
            kind,
            products.len(),
            status
        );
        Ok(DeliveryOutcome { success, status })
    }
}
