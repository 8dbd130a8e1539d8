pub mod astrotracker;
pub mod cloudlocate;

use std::fmt;

use tracing::{debug, warn};

use crate::{
    record::{Decoded, LocationRecord, RawMessage},
    AGResult, Error,
};
use astrotracker::{
    battery_volts, degrees, epoch_to_utc, PvtSlot, RawSlot, SensorReport, SlotTag, PVT_SLOT_LEN,
    RAW_SLOT_LEN, V1_LEN,
};
use cloudlocate::PendingRequest;

/// AstroTracker payload variants. There is no version field on the wire; the variant is
/// inferred from the payload length alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// 6 bytes, protocol V1.
    Sensor(SensorReport),
    /// 20 bytes, protocol V2 fix.
    Pvt(PvtSlot),
    /// 21 bytes, protocol V2 raw measurements.
    Raw(RawSlot),
}

/// Decode a payload by its length. Lengths other than 6, 20 and 21 bytes are rejected.
pub fn decode(bytes: &[u8]) -> AGResult<Payload> {
    debug!("payload ({} bytes): {}", bytes.len(), Hex(bytes));
    match bytes.len() {
        V1_LEN => Ok(Payload::Sensor(astrotracker::parse_sensor_report(bytes)?)),
        PVT_SLOT_LEN => Ok(Payload::Pvt(astrotracker::parse_pvt_slot(bytes)?)),
        RAW_SLOT_LEN => Ok(Payload::Raw(astrotracker::parse_raw_slot(bytes)?)),
        len => Err(Error::UnsupportedPayload { len }),
    }
}

/// Decode `msg` on top of `previous`.
///
/// Fields the payload does not carry keep the value they had in `previous`. Pass an empty
/// record to decode a message in isolation.
pub fn decode_message(msg: &RawMessage, previous: &LocationRecord) -> AGResult<Decoded> {
    decode(&msg.payload)?.apply(msg, previous)
}

impl Payload {
    pub fn apply(self, msg: &RawMessage, previous: &LocationRecord) -> AGResult<Decoded> {
        let mut rec = previous.clone();
        match self {
            Payload::Sensor(r) => {
                rec.latitude = msg.latitude;
                rec.longitude = msg.longitude;
                rec.temperature = Some(r.temperature);
                rec.battery = Some(battery_volts(r.battery_raw));
                rec.location_date = Some(epoch_to_utc(r.timestamp)?);
                Ok(Decoded::Record(rec))
            }
            Payload::Pvt(s) => {
                check_tag(s.slot_tag, SlotTag::Pvt);
                rec.location_date = Some(epoch_to_utc(s.timestamp)?);
                rec.latitude = Some(degrees(s.lat));
                rec.longitude = Some(degrees(s.lon));
                rec.siv = Some(s.siv);
                rec.ground_speed = Some(s.ground_speed);
                rec.battery = Some(battery_volts(s.battery_raw));
                rec.temperature = Some(s.temperature);
                Ok(Decoded::Record(rec))
            }
            Payload::Raw(s) => {
                check_tag(s.slot_tag, SlotTag::Raw);
                Ok(Decoded::Pending(PendingRequest::new(
                    s.slot_tag,
                    &s.meas,
                    &msg.created_date,
                )))
            }
        }
    }
}

fn check_tag(got: SlotTag, expected: SlotTag) {
    if got != expected {
        warn!("slot tag {:?} on a {:?} sized payload", got, expected);
    }
}

/// Lowercase hex rendering for logs.
struct Hex<'a>(&'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use base64::{engine::general_purpose, Engine as _};

    use super::*;
    use crate::lazy_init_tracing;

    fn message(payload: Vec<u8>, lat: Option<f64>, lon: Option<f64>) -> RawMessage {
        RawMessage {
            payload,
            latitude: lat,
            longitude: lon,
            created_date: "2023-11-14T22:13:20".to_string(),
        }
    }

    fn v1(temperature: u8, battery: u8, epoch: i32) -> Vec<u8> {
        [&[temperature, battery][..], &epoch.to_le_bytes()].concat()
    }

    fn pvt(epoch: i32, lat: i32, lon: i32) -> Vec<u8> {
        [
            &[0x01][..],
            &epoch.to_le_bytes(),
            &lat.to_le_bytes(),
            &lon.to_le_bytes(),
            &[7],
            &345i32.to_le_bytes(),
            &[38, 19],
        ]
        .concat()
    }

    fn record(decoded: Decoded) -> LocationRecord {
        match decoded {
            Decoded::Record(r) => r,
            Decoded::Pending(p) => panic!("unexpected pending request {p:?}"),
        }
    }

    #[test]
    fn test_hex_is_half_the_length() {
        let bytes = v1(1, 2, 3);
        let hex = Hex(&bytes).to_string();
        assert_eq!(hex, "010203000000");
        assert_eq!(hex.len() / 2, V1_LEN);
    }

    #[test]
    fn test_v1_uses_side_channel_position() {
        lazy_init_tracing();
        let epoch = 1_665_000_000;
        let msg = message(v1(22, 41, epoch), Some(45.0), Some(-73.0));
        let rec = record(decode_message(&msg, &LocationRecord::default()).unwrap());
        assert_eq!(rec.latitude, Some(45.0));
        assert_eq!(rec.longitude, Some(-73.0));
        assert_eq!(rec.temperature, Some(22));
        assert_eq!(rec.battery, Some(4.1));
        assert_eq!(rec.location_date.unwrap().timestamp(), epoch as i64);
        assert_eq!(rec.siv, None);
        assert_eq!(rec.ground_speed, None);
    }

    #[test]
    fn test_v1_telemetry_independent_of_position() {
        let payload = v1(30, 36, 1_600_000_000);
        let a = record(
            decode_message(
                &message(payload.clone(), Some(10.0), Some(20.0)),
                &LocationRecord::default(),
            )
            .unwrap(),
        );
        let b = record(
            decode_message(&message(payload, None, None), &LocationRecord::default()).unwrap(),
        );
        assert_eq!(a.temperature, b.temperature);
        assert_eq!(a.battery, b.battery);
        assert_eq!(a.location_date, b.location_date);
        assert!(!b.is_complete());
    }

    #[test]
    fn test_pvt_fix() {
        lazy_init_tracing();
        let msg = message(pvt(1_700_000_000, 451_234_567, -731_234_567), None, None);
        let rec = record(decode_message(&msg, &LocationRecord::default()).unwrap());
        assert!((rec.latitude.unwrap() - 45.1234567).abs() < 1e-9);
        assert!((rec.longitude.unwrap() - -73.1234567).abs() < 1e-9);
        assert_eq!(rec.latitude, Some(451_234_567f64 * 1e-7));
        assert_eq!(rec.siv, Some(7));
        assert_eq!(rec.ground_speed, Some(345));
        assert_eq!(rec.battery, Some(3.8));
        assert_eq!(rec.temperature, Some(19));
        assert_eq!(rec.location_date.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_raw_slot_becomes_pending() {
        lazy_init_tracing();
        let meas: Vec<u8> = (1..=20).collect();
        let msg = message([&[0x04][..], &meas[..]].concat(), Some(1.0), Some(2.0));
        match decode_message(&msg, &LocationRecord::default()).unwrap() {
            Decoded::Pending(p) => {
                assert_eq!(p.slot_tag, SlotTag::Raw);
                assert_eq!(p.utc_date_time, "2023-11-14T22:13:20");
                assert_eq!(general_purpose::STANDARD.decode(&p.body).unwrap(), meas);
            }
            Decoded::Record(r) => panic!("expected pending request, got {r:?}"),
        }
    }

    #[test]
    fn test_unsupported_lengths() {
        for len in [0, 1, 5, 7, 8, 19, 22, 40] {
            let msg = message(vec![0; len], Some(1.0), Some(2.0));
            assert!(
                matches!(
                    decode_message(&msg, &LocationRecord::default()),
                    Err(Error::UnsupportedPayload { len: l }) if l == len
                ),
                "length {len}"
            );
        }
    }

    #[test]
    fn test_carry_forward() {
        lazy_init_tracing();
        let fix = record(
            decode_message(
                &message(pvt(1_700_000_000, 100_000_000, 200_000_000), None, None),
                &LocationRecord::default(),
            )
            .unwrap(),
        );
        // V1 does not carry SIV or ground speed, so they come from the previous fix.
        let next = record(
            decode_message(&message(v1(5, 33, 1_700_000_600), Some(11.0), Some(21.0)), &fix)
                .unwrap(),
        );
        assert_eq!(next.latitude, Some(11.0));
        assert_eq!(next.siv, Some(7));
        assert_eq!(next.ground_speed, Some(345));
        assert_eq!(next.temperature, Some(5));

        let isolated = record(
            decode_message(
                &message(v1(5, 33, 1_700_000_600), Some(11.0), Some(21.0)),
                &LocationRecord::default(),
            )
            .unwrap(),
        );
        assert_eq!(isolated.siv, None);
    }
}
