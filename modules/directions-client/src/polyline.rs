//! Encoded polyline algorithm format (precision 5), as used by the
//! Directions API `polyline.points` fields.

use crate::error::{DirectionsError, Result};

const PRECISION: f64 = 1e5;

/// Decode an encoded polyline into `(lat, lng)` pairs.
pub fn decode(encoded: &str) -> Result<Vec<(f64, f64)>> {
    let bytes = encoded.as_bytes();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;
    let mut points = Vec::new();

    while index < bytes.len() {
        lat += next_delta(bytes, &mut index)?;
        lng += next_delta(bytes, &mut index)?;
        points.push((lat as f64 / PRECISION, lng as f64 / PRECISION));
    }

    Ok(points)
}

fn next_delta(bytes: &[u8], index: &mut usize) -> Result<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;

    loop {
        let byte = *bytes.get(*index).ok_or_else(|| {
            DirectionsError::Polyline(format!("truncated polyline at byte {index}"))
        })?;
        *index += 1;

        let chunk = i64::from(byte) - 63;
        if !(0..64).contains(&chunk) {
            return Err(DirectionsError::Polyline(format!(
                "invalid polyline byte {byte:#x} at {}",
                *index - 1
            )));
        }
        if shift > 60 {
            return Err(DirectionsError::Polyline("polyline value overflow".to_string()));
        }

        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }

    Ok(if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    })
}

/// Encode `(lat, lng)` pairs. Used for compact logging of route sections.
pub fn encode(points: &[(f64, f64)]) -> String {
    let mut out = String::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for &(lat, lng) in points {
        let lat = (lat * PRECISION).round() as i64;
        let lng = (lng * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lng - prev_lng, &mut out);
        prev_lat = lat;
        prev_lng = lng;
    }

    out
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from(((0x20 | (v & 0x1f)) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    #[test]
    fn decodes_reference_polyline() {
        let points = decode(REFERENCE).unwrap();
        assert_eq!(points, vec![(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)]);
    }

    #[test]
    fn encodes_reference_polyline() {
        let points = [(38.5, -120.2), (40.7, -120.95), (43.252, -126.453)];
        assert_eq!(encode(&points), REFERENCE);
    }

    #[test]
    fn empty_string_is_empty_polyline() {
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn truncated_input_is_rejected() {
        // Latitude chunk present, longitude missing.
        assert!(matches!(decode("_p~iF"), Err(DirectionsError::Polyline(_))));
    }
}
