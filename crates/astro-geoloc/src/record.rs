/// Records flowing through the extractor: raw messages as fetched, and decoded locations.
use chrono::{DateTime, Utc};

use crate::{coord::Point2d, protocol::cloudlocate::PendingRequest};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// One message as returned by the message API.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage {
    /// Payload bytes, already base64-decoded.
    pub payload: Vec<u8>,
    /// Position estimated by the satellite network, when the API supplies one.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Creation timestamp exactly as the API reports it.
    pub created_date: String,
}

/// A decoded tracker location. Every field starts unset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Degrees Celsius.
    pub temperature: Option<u8>,
    /// Volts, one decimal.
    pub battery: Option<f64>,
    pub location_date: Option<DateTime<Utc>>,
    /// Satellites in view.
    pub siv: Option<u8>,
    /// Ground speed as reported by the receiver, unscaled.
    pub ground_speed: Option<i32>,
}

impl LocationRecord {
    /// A record is exported only once it has a latitude.
    pub fn is_complete(&self) -> bool {
        self.latitude.is_some()
    }

    pub fn position(&self) -> Option<Point2d> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Point2d(lat, lon)),
            _ => None,
        }
    }

    /// Copy of this record with the position cleared, used as the starting point when the
    /// position has to come from somewhere else.
    pub fn without_position(&self) -> Self {
        Self {
            latitude: None,
            longitude: None,
            ..self.clone()
        }
    }
}

/// Outcome of decoding one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The payload carried everything needed.
    Record(LocationRecord),
    /// The payload carried raw GNSS measurements that must be resolved over CloudLocate.
    Pending(PendingRequest),
}
