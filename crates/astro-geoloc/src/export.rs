/// CSV and map output for a [`LocationTable`].
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

use tracing::info;

use crate::{
    collector::{LocationTable, TableRow},
    coord::{self, Point2d},
    AGResult,
};

pub const CSV_HEADER: &str = ",latitude,longitude,battery,temperature,locationDate,SIV,gSpeed";

const MAP_ZOOM: u8 = 14;
const EMPTY_MAP_ZOOM: u8 = 2;

/// Write `<stem>.csv` and `<stem>.html`. Returns the two paths.
pub fn write_outputs(table: &LocationTable, stem: &str) -> AGResult<(PathBuf, PathBuf)> {
    let csv_path = PathBuf::from(format!("{stem}.csv"));
    let html_path = PathBuf::from(format!("{stem}.html"));

    let mut csv = BufWriter::new(File::create(&csv_path)?);
    write_table(&table.rows, &mut csv)?;
    csv.flush()?;

    std::fs::write(&html_path, render_map(&table.rows)?)?;

    info!(
        "wrote {} rows to {} and {}",
        table.rows.len(),
        csv_path.display(),
        html_path.display()
    );
    Ok((csv_path, html_path))
}

/// One line per row, first column is the row's arrival index. Unset fields are empty cells.
pub fn write_table<W: Write>(rows: &[TableRow], out: &mut W) -> AGResult<()> {
    writeln!(out, "{CSV_HEADER}")?;
    for TableRow { index, record } in rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            index,
            cell(record.latitude.map(float)),
            cell(record.longitude.map(float)),
            cell(record.battery.map(float)),
            cell(record.temperature),
            cell(
                record
                    .location_date
                    .map(|d| d.format("%Y-%m-%d %H:%M:%S+00:00"))
            ),
            cell(record.siv),
            cell(record.ground_speed),
        )?;
    }
    Ok(())
}

fn cell<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

/// Shortest representation that round-trips, always with a decimal point (`45.0`, not `45`).
fn float(v: f64) -> String {
    format!("{v:?}")
}

/// Leaflet page with one marker per row and a polyline through them in table order.
///
/// The center is the mean latitude over rows with a latitude and the mean longitude over rows
/// with a longitude. A row with a latitude but no longitude still pulls the center, but gets no
/// marker and is not on the line. With no rows the map shows (0, 0) zoomed out.
pub fn render_map(rows: &[TableRow]) -> AGResult<String> {
    let lat = coord::mean(rows.iter().filter_map(|r| r.record.latitude));
    let lon = coord::mean(rows.iter().filter_map(|r| r.record.longitude));
    let (center, zoom) = match lat {
        Some(lat) => (Point2d(lat, lon.unwrap_or(0.0)), MAP_ZOOM),
        None => (Point2d(0.0, 0.0), EMPTY_MAP_ZOOM),
    };
    let coords: Vec<[f64; 2]> = rows
        .iter()
        .filter_map(|r| r.record.position())
        .map(|p| [p.0, p.1])
        .collect();

    Ok(MAP_TEMPLATE
        .replace("{{CENTER}}", &serde_json::to_string(&[center.0, center.1])?)
        .replace("{{ZOOM}}", &zoom.to_string())
        .replace("{{POINTS}}", &serde_json::to_string(&coords)?))
}

const MAP_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>AstroTracker positions</title>
    <link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css" />
    <script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
    <style>html, body, #map { height: 100%; margin: 0; }</style>
</head>
<body>
    <div id="map"></div>
    <script>
        var map = L.map("map").setView({{CENTER}}, {{ZOOM}});
        L.tileLayer("https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png", {
            maxZoom: 19,
            attribution: "&copy; OpenStreetMap contributors"
        }).addTo(map);
        var points = {{POINTS}};
        points.forEach(function (p) { L.marker(p).addTo(map); });
        L.polyline(points, { color: "red", weight: 2.5, opacity: 1 }).addTo(map);
    </script>
</body>
</html>
"#;
