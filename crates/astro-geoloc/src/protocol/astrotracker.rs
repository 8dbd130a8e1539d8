use chrono::{DateTime, Utc};
use nom::{
    bytes::complete::take,
    combinator::all_consuming,
    number::complete::{le_i32, le_u8},
    Finish, IResult,
};

use crate::{AGResult, Error};

/// V1 sensor report: temperature, battery and timestamp. The position comes from the satellite
/// network, not from the payload.
pub const V1_LEN: usize = 6;

/// V2 logger PVT slot: a complete fix taken on the tracker.
pub const PVT_SLOT_LEN: usize = 20;

/// V2 logger raw slot: tag plus 20 bytes of raw GNSS measurements for CloudLocate.
pub const RAW_SLOT_LEN: usize = 21;

/// Length of the measurement blob carried in a raw slot.
pub const MEAS_LEN: usize = 20;

/// Firmware logger slot tags.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotTag {
    Pvt,
    UplinkMessage,
    UplinkCommand,
    Raw,
    Other(u8),
}

impl From<u8> for SlotTag {
    fn from(b: u8) -> Self {
        match b {
            0x01 => SlotTag::Pvt,
            0x02 => SlotTag::UplinkMessage,
            0x03 => SlotTag::UplinkCommand,
            0x04 => SlotTag::Raw,
            other => SlotTag::Other(other),
        }
    }
}

/// Protocol V1, 6 bytes.
///
/// | offset | size | field                          |
/// |--------|------|--------------------------------|
/// | 0      | 1    | temperature, degC, unsigned    |
/// | 1      | 1    | battery, 0.1 V, unsigned       |
/// | 2      | 4    | UNIX epoch seconds, LE signed  |
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReport {
    pub temperature: u8,
    pub battery_raw: u8,
    pub timestamp: i32,
}

/// Protocol V2 PVT slot, 20 bytes. All multi-byte fields little-endian.
///
/// | offset | size | field                          |
/// |--------|------|--------------------------------|
/// | 0      | 1    | slot tag                       |
/// | 1      | 4    | UNIX epoch seconds, signed     |
/// | 5      | 4    | latitude, 1e-7 deg, signed     |
/// | 9      | 4    | longitude, 1e-7 deg, signed    |
/// | 13     | 1    | satellites in view             |
/// | 14     | 4    | ground speed, signed, unscaled |
/// | 18     | 1    | battery, 0.1 V                 |
/// | 19     | 1    | temperature, degC              |
#[derive(Debug, Clone, PartialEq)]
pub struct PvtSlot {
    pub slot_tag: SlotTag,
    pub timestamp: i32,
    pub lat: i32,
    pub lon: i32,
    pub siv: u8,
    pub ground_speed: i32,
    pub battery_raw: u8,
    pub temperature: u8,
}

/// Protocol V2 raw slot, 21 bytes: slot tag followed by the opaque measurement blob.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSlot {
    pub slot_tag: SlotTag,
    pub meas: [u8; MEAS_LEN],
}

pub fn parse_sensor_report(bytes: &[u8]) -> AGResult<SensorReport> {
    let nom_res = all_consuming(nom_sensor_report)(bytes);
    nom_res.finish().map(|(_, r)| r).map_err(|e| e.into())
}

pub fn parse_pvt_slot(bytes: &[u8]) -> AGResult<PvtSlot> {
    let nom_res = all_consuming(nom_pvt_slot)(bytes);
    nom_res.finish().map(|(_, r)| r).map_err(|e| e.into())
}

pub fn parse_raw_slot(bytes: &[u8]) -> AGResult<RawSlot> {
    let nom_res = all_consuming(nom_raw_slot)(bytes);
    nom_res.finish().map(|(_, r)| r).map_err(|e| e.into())
}

fn nom_sensor_report(bytes: &[u8]) -> IResult<&[u8], SensorReport> {
    let (rest, temperature) = le_u8(bytes)?;
    let (rest, battery_raw) = le_u8(rest)?;
    let (rest, timestamp) = le_i32(rest)?;
    Ok((
        rest,
        SensorReport {
            temperature,
            battery_raw,
            timestamp,
        },
    ))
}

fn nom_pvt_slot(bytes: &[u8]) -> IResult<&[u8], PvtSlot> {
    let (rest, tag) = le_u8(bytes)?;
    let (rest, timestamp) = le_i32(rest)?;
    let (rest, lat) = le_i32(rest)?;
    let (rest, lon) = le_i32(rest)?;
    let (rest, siv) = le_u8(rest)?;
    let (rest, ground_speed) = le_i32(rest)?;
    let (rest, battery_raw) = le_u8(rest)?;
    let (rest, temperature) = le_u8(rest)?;
    Ok((
        rest,
        PvtSlot {
            slot_tag: tag.into(),
            timestamp,
            lat,
            lon,
            siv,
            ground_speed,
            battery_raw,
            temperature,
        },
    ))
}

fn nom_raw_slot(bytes: &[u8]) -> IResult<&[u8], RawSlot> {
    let (rest, tag) = le_u8(bytes)?;
    let (rest, meas) = take(MEAS_LEN)(rest)?;
    let raw = RawSlot {
        slot_tag: tag.into(),
        meas: meas.try_into().expect("fixed width measurement field"),
    };
    Ok((rest, raw))
}

/// Battery field is tenths of a volt.
pub fn battery_volts(raw: u8) -> f64 {
    raw as f64 / 10.0
}

/// Position fields are 1e-7 degrees.
pub fn degrees(raw: i32) -> f64 {
    raw as f64 * 1e-7
}

pub fn epoch_to_utc(secs: i32) -> AGResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs as i64, 0)
        .ok_or_else(|| Error::Parse(format!("timestamp {secs} out of range")))
}
