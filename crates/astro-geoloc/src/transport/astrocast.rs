/// Blocking client for the Astrocast message API.
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use super::MessageSource;
use crate::{record::RawMessage, TransportError};

pub const DEFAULT_API_URL: &str = "https://api.astrocast.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message object as returned by `GET /v1/messages`. Only the fields we use are listed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMessage {
    data: String,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    created_date: String,
}

pub struct AstrocastClient {
    http: Client,
    base_url: String,
    api_token: String,
}

impl AstrocastClient {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }
}

impl MessageSource for AstrocastClient {
    fn fetch_messages(
        &mut self,
        device_guid: &str,
        since: &str,
    ) -> Result<Vec<RawMessage>, TransportError> {
        info!("fetching messages for {} since {}", device_guid, since);
        let resp = self
            .http
            .get(self.messages_url())
            .query(&[("startReceivedDate", since), ("deviceGuid", device_guid)])
            .header("X-Api-Key", &self.api_token)
            .send()?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(TransportError::HttpStatus(status.as_u16()));
        }
        let body = resp.text()?;
        let messages = parse_messages(&body)?;
        info!("received {} messages", messages.len());
        Ok(messages)
    }
}

/// Parse a `/v1/messages` response body.
pub fn parse_messages(body: &str) -> Result<Vec<RawMessage>, TransportError> {
    let api_messages: Vec<ApiMessage> = serde_json::from_str(body)
        .map_err(|e| TransportError::Protocol(format!("message list: {e}")))?;
    api_messages
        .into_iter()
        .map(|m| {
            let payload = general_purpose::STANDARD.decode(&m.data).map_err(|e| {
                TransportError::Protocol(format!("message data {:?}: {e}", m.data))
            })?;
            debug!("message created {}: {} bytes", m.created_date, payload.len());
            Ok(RawMessage {
                payload,
                latitude: m.latitude,
                longitude: m.longitude,
                created_date: m.created_date,
            })
        })
        .collect()
}
