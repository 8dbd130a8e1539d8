pub mod astrocast;
pub mod mqtt;

use std::time::Duration;

use serde_json::Value;

use crate::{record::RawMessage, TransportError};

/// Source of satellite messages for one device.
pub trait MessageSource {
    /// Messages received since `since`, in the order the service returns them.
    fn fetch_messages(
        &mut self,
        device_guid: &str,
        since: &str,
    ) -> Result<Vec<RawMessage>, TransportError>;
}

/// Request/response channel to the position service.
pub trait PositionResolver {
    /// Publish `envelope` on `topics.request` and block until the first message arrives on
    /// `topics.response`, or `timeout` elapses. At most one request is outstanding at a time.
    fn publish_and_await(
        &mut self,
        envelope: &str,
        topics: &Topics,
        timeout: Duration,
    ) -> Result<Value, TransportError>;
}

/// CloudLocate request topic, shared by all devices.
pub const REQUEST_TOPIC: &str = "CloudLocate/GNSS/request";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub request: String,
    pub response: String,
}

impl Topics {
    pub fn for_device(device_id: &str) -> Self {
        Self {
            request: REQUEST_TOPIC.to_string(),
            response: format!("CloudLocate/{device_id}/GNSS/response"),
        }
    }
}
