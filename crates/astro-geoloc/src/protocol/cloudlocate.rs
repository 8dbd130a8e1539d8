/// u-blox CloudLocate request/response handling for raw GNSS measurement slots.
use std::time::Duration;

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::astrotracker::SlotTag;
use crate::{
    record::LocationRecord,
    transport::{PositionResolver, Topics},
    AGResult, Error, TransportError,
};

/// Largest MQTT message the broker accepts.
pub const MAX_MESSAGE_BYTES: usize = 8192;

/// A raw measurement waiting to be turned into a position by CloudLocate.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub slot_tag: SlotTag,
    /// Base64 of the measurement blob.
    pub body: String,
    /// Creation date of the carrying message, forwarded as the measurement time.
    pub utc_date_time: String,
}

#[derive(Serialize)]
struct Envelope<'a> {
    body: &'a str,
    headers: Headers<'a>,
}

#[derive(Serialize)]
struct Headers<'a> {
    #[serde(rename = "UTCDateTime")]
    utc_date_time: &'a str,
}

/// The fields we use from a CloudLocate answer. Anything else in the object is ignored.
#[derive(Debug, Deserialize)]
struct PositionResponse {
    #[serde(rename = "Lat")]
    lat: Option<f64>,
    #[serde(rename = "Lon")]
    lon: Option<f64>,
}

impl PendingRequest {
    pub fn new(slot_tag: SlotTag, meas: &[u8], created_date: &str) -> Self {
        Self {
            slot_tag,
            body: general_purpose::STANDARD.encode(meas),
            utc_date_time: created_date.to_string(),
        }
    }

    /// JSON envelope published on the request topic. Fails if it would not fit in one broker
    /// message.
    pub fn envelope(&self) -> AGResult<String> {
        let json = serde_json::to_string(&Envelope {
            body: &self.body,
            headers: Headers {
                utc_date_time: &self.utc_date_time,
            },
        })?;
        if json.len() > MAX_MESSAGE_BYTES {
            return Err(Error::PayloadTooLarge {
                size: json.len(),
                limit: MAX_MESSAGE_BYTES,
            });
        }
        Ok(json)
    }
}

/// Run the CloudLocate round-trip for `pending` and build the resulting record.
///
/// The record starts from `previous` with its position cleared. It only becomes complete if the
/// answer carries both `Lat` and `Lon`.
pub fn resolve<R>(
    pending: &PendingRequest,
    resolver: &mut R,
    topics: &Topics,
    timeout: Duration,
    previous: &LocationRecord,
) -> AGResult<LocationRecord>
where
    R: PositionResolver + ?Sized,
{
    let envelope = pending.envelope()?;
    debug!("CloudLocate envelope: {}", envelope);

    let answer = resolver.publish_and_await(&envelope, topics, timeout)?;
    if !answer.is_object() {
        return Err(TransportError::Protocol(format!("expected JSON object, got {answer}")).into());
    }
    let position: PositionResponse = serde_json::from_value(answer)
        .map_err(|e| TransportError::Protocol(format!("CloudLocate answer: {e}")))?;

    let mut rec = previous.without_position();
    match (position.lat, position.lon) {
        (Some(lat), Some(lon)) => {
            info!("CloudLocate position: {:.7}, {:.7}", lat, lon);
            rec.latitude = Some(lat);
            rec.longitude = Some(lon);
        }
        _ => warn!("CloudLocate answer carries no position"),
    }
    Ok(rec)
}

#[cfg(test)]
mod test {
    use base64::{engine::general_purpose, Engine as _};
    use serde_json::{json, Value};

    use super::*;
    use crate::lazy_init_tracing;

    struct Canned {
        answer: Option<Value>,
        published: Vec<(String, String, String)>,
    }

    impl PositionResolver for Canned {
        fn publish_and_await(
            &mut self,
            envelope: &str,
            topics: &Topics,
            timeout: Duration,
        ) -> Result<Value, TransportError> {
            self.published.push((
                envelope.to_string(),
                topics.request.clone(),
                topics.response.clone(),
            ));
            self.answer.clone().ok_or(TransportError::Timeout(timeout))
        }
    }

    fn pending() -> PendingRequest {
        let meas: Vec<u8> = (100..120).collect();
        PendingRequest::new(SlotTag::Raw, &meas, "2022-10-05T20:00:00")
    }

    #[test]
    fn test_envelope_format() {
        let env = pending().envelope().unwrap();
        assert_eq!(
            env,
            r#"{"body":"ZGVmZ2hpamtsbW5vcHFyc3R1dnc=","headers":{"UTCDateTime":"2022-10-05T20:00:00"}}"#
        );
    }

    #[test]
    fn test_envelope_body_decodes_to_measurement() {
        let meas: Vec<u8> = (0..20).map(|b| b * 13).collect();
        let p = PendingRequest::new(SlotTag::Raw, &meas, "2022-10-05T20:00:00");
        let env: Value = serde_json::from_str(&p.envelope().unwrap()).unwrap();
        let body = env["body"].as_str().unwrap();
        assert_eq!(general_purpose::STANDARD.decode(body).unwrap(), meas);
        assert_eq!(env["headers"]["UTCDateTime"], "2022-10-05T20:00:00");
    }

    #[test]
    fn test_envelope_too_large() {
        let p = PendingRequest::new(SlotTag::Raw, &[0; 20], &"x".repeat(MAX_MESSAGE_BYTES));
        assert!(matches!(
            p.envelope(),
            Err(Error::PayloadTooLarge { limit: MAX_MESSAGE_BYTES, .. })
        ));
    }

    #[test]
    fn test_oversized_envelope_is_never_published() {
        let mut resolver = Canned {
            answer: Some(json!({"Lat": 1.0, "Lon": 2.0})),
            published: vec![],
        };
        let p = PendingRequest::new(SlotTag::Raw, &[0; 20], &"x".repeat(MAX_MESSAGE_BYTES));
        let res = resolve(
            &p,
            &mut resolver,
            &Topics::for_device("device:abc"),
            Duration::from_secs(1),
            &LocationRecord::default(),
        );
        assert!(matches!(res, Err(Error::PayloadTooLarge { .. })));
        assert!(resolver.published.is_empty());
    }

    #[test]
    fn test_resolve_with_position() {
        lazy_init_tracing();
        let mut resolver = Canned {
            answer: Some(json!({"Lat": 46.5191, "Lon": 6.5668, "Acc": 12})),
            published: vec![],
        };
        let previous = LocationRecord {
            latitude: Some(1.0),
            longitude: Some(1.0),
            battery: Some(3.9),
            ..Default::default()
        };
        let topics = Topics::for_device("device:abc");
        let rec = resolve(
            &pending(),
            &mut resolver,
            &topics,
            Duration::from_secs(1),
            &previous,
        )
        .unwrap();
        assert_eq!(rec.latitude, Some(46.5191));
        assert_eq!(rec.longitude, Some(6.5668));
        assert_eq!(rec.battery, Some(3.9));

        let (_, req, resp) = &resolver.published[0];
        assert_eq!(req, "CloudLocate/GNSS/request");
        assert_eq!(resp, "CloudLocate/device:abc/GNSS/response");
    }

    #[test]
    fn test_resolve_without_position_is_incomplete() {
        lazy_init_tracing();
        let mut resolver = Canned {
            answer: Some(json!({"error": "not enough satellites"})),
            published: vec![],
        };
        let previous = LocationRecord {
            latitude: Some(1.0),
            longitude: Some(1.0),
            ..Default::default()
        };
        let rec = resolve(
            &pending(),
            &mut resolver,
            &Topics::for_device("device:abc"),
            Duration::from_secs(1),
            &previous,
        )
        .unwrap();
        assert!(!rec.is_complete());
    }

    #[test]
    fn test_resolve_errors() {
        let topics = Topics::for_device("device:abc");
        let mut timeout = Canned {
            answer: None,
            published: vec![],
        };
        let res = resolve(
            &pending(),
            &mut timeout,
            &topics,
            Duration::from_secs(3),
            &LocationRecord::default(),
        );
        assert!(matches!(
            res,
            Err(Error::Transport(TransportError::Timeout(_)))
        ));

        let mut not_object = Canned {
            answer: Some(json!([1, 2])),
            published: vec![],
        };
        let res = resolve(
            &pending(),
            &mut not_object,
            &topics,
            Duration::from_secs(3),
            &LocationRecord::default(),
        );
        assert!(matches!(
            res,
            Err(Error::Transport(TransportError::Protocol(_)))
        ));
    }
}
