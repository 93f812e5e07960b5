//! Query point input: one `lon lat depth` triple per line.

use anyhow::{bail, Context, Result};
use velocity_model::Point;

/// Parse whitespace-separated `lon lat depth` lines.
///
/// Blank lines and `#` comments are skipped. Any other malformed line is an
/// error naming its line number.
pub fn parse_points(text: &str) -> Result<Vec<Point>> {
    let mut points = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = match raw.split_once('#') {
            Some((before, _)) => before,
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            bail!(
                "line {}: expected `lon lat depth`, found {} fields",
                i + 1,
                fields.len()
            );
        }
        let mut values = [0.0; 3];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field
                .parse()
                .with_context(|| format!("line {}: invalid number '{}'", i + 1, field))?;
        }
        points.push(Point::new(values[0], values[1], values[2]));
    }
    Ok(points)
}
