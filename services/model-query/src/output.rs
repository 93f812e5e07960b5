//! Per-point output records.

use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;
use velocity_model::{Point, PropertyRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// `lon lat depth vp vs rho qp qs`, space separated
    Text,
    /// One JSON object per line
    Json,
}

#[derive(Serialize)]
struct JsonLine<'a> {
    #[serde(flatten)]
    point: &'a Point,
    #[serde(flatten)]
    record: &'a PropertyRecord,
}

/// Write one line per point.
pub fn write_records(
    out: &mut impl Write,
    format: OutputFormat,
    points: &[Point],
    records: &[PropertyRecord],
) -> anyhow::Result<()> {
    for (point, record) in points.iter().zip(records) {
        match format {
            OutputFormat::Text => writeln!(
                out,
                "{:.6} {:.6} {:.2} {:.4} {:.4} {:.4} {:.4} {:.4}",
                point.lon,
                point.lat,
                point.depth,
                record.vp,
                record.vs,
                record.rho,
                record.qp,
                record.qs
            )?,
            OutputFormat::Json => {
                serde_json::to_writer(&mut *out, &JsonLine { point, record })?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
