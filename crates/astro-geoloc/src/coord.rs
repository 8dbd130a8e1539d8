/// Coordinate types and utilities.
use crate::{AGResult, Error};

//  _____
// |_   _|   _ _ __   ___  ___
//   | || | | | '_ \ / _ \/ __|
//   | || |_| | |_) |  __/\__ \
//   |_| \__, | .__/ \___||___/
//       |___/|_|

/// WGS 84 (latitude, longitude) in degrees.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Point2d(pub f64, pub f64);

impl Point2d {
    pub fn validate(&self) -> AGResult<()> {
        validate_lat(self.0)?;
        validate_lon(self.1)?;
        Ok(())
    }
}

/// Arithmetic mean of one coordinate axis, or `None` when there are no values.
///
/// The map center takes latitudes and longitudes separately, each over the rows that have it.
/// It does not handle tracks crossing the antimeridian.
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn validate_lat(lat: f64) -> AGResult<()> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(Error::InvalidCoord(format!("latitude {lat}")));
    }
    Ok(())
}

fn validate_lon(lon: f64) -> AGResult<()> {
    if !(-180.0..=180.0).contains(&lon) {
        return Err(Error::InvalidCoord(format!("longitude {lon}")));
    }
    Ok(())
}
