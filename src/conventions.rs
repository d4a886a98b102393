//! CF convention decoding of raw array values
//!
//! Raw elements read from a file are turned into [`Cell`]s the way scientific
//! readers present them: fill and missing values are masked, packed values are
//! unpacked with `scale_factor`/`add_offset`, and `<unit> since <date>` variables
//! become timestamps.

use crate::dataset::{ArrayVariable, AttrValue, Cell};
use chrono::{Duration, NaiveDate, NaiveDateTime};

const STANDARD_CALENDARS: [&str; 3] = ["standard", "gregorian", "proleptic_gregorian"];

/// Per-variable decoder derived from its attributes
#[derive(Debug, Clone, Default)]
pub struct ValueDecoder {
    masked_numbers: Vec<f64>,
    masked_texts: Vec<String>,
    scale_factor: Option<f64>,
    add_offset: Option<f64>,
    time_units: Option<TimeUnits>,
}

impl ValueDecoder {
    pub fn for_variable(var: &ArrayVariable) -> Self {
        let mut decoder = Self::default();

        for key in ["_FillValue", "missing_value"] {
            match var.attribute(key) {
                Some(AttrValue::Text(s)) => decoder.masked_texts.push(s.clone()),
                Some(AttrValue::Texts(ss)) => decoder.masked_texts.extend(ss.iter().cloned()),
                Some(value) => decoder.masked_numbers.extend(value.numbers()),
                None => {}
            }
        }

        decoder.scale_factor = var.attribute("scale_factor").and_then(AttrValue::as_f64);
        decoder.add_offset = var.attribute("add_offset").and_then(AttrValue::as_f64);

        let calendar_ok = match var.attribute("calendar").and_then(AttrValue::as_text) {
            Some(cal) => STANDARD_CALENDARS.contains(&cal.trim().to_lowercase().as_str()),
            None => true,
        };
        if calendar_ok {
            decoder.time_units = var
                .attribute("units")
                .and_then(AttrValue::as_text)
                .and_then(TimeUnits::parse);
        }

        decoder
    }

    /// True when decoding changes nothing but NaN masking
    pub fn is_identity(&self) -> bool {
        self.masked_numbers.is_empty()
            && self.masked_texts.is_empty()
            && self.scale_factor.is_none()
            && self.add_offset.is_none()
            && self.time_units.is_none()
    }

    pub fn decode(&self, raw: Cell) -> Cell {
        if raw.is_missing() {
            return Cell::Missing;
        }

        if let Cell::Text(ref s) = raw {
            if self.masked_texts.iter().any(|m| m == s) {
                return Cell::Missing;
            }
            return raw;
        }

        let Some(number) = raw.as_f64() else {
            return raw;
        };
        if self.masked_numbers.iter().any(|&m| m == number) {
            return Cell::Missing;
        }

        let unpacked = if self.scale_factor.is_some() || self.add_offset.is_some() {
            let value = number * self.scale_factor.unwrap_or(1.0) + self.add_offset.unwrap_or(0.0);
            Cell::Float64(value)
        } else {
            raw
        };

        match &self.time_units {
            Some(units) => unpacked
                .as_f64()
                .and_then(|offset| units.to_datetime(offset))
                .map(Cell::Time)
                .unwrap_or(unpacked),
            None => unpacked,
        }
    }
}

/// Parsed `<unit> since <reference>` time encoding
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnits {
    micros_per_unit: f64,
    epoch: NaiveDateTime,
}

impl TimeUnits {
    pub fn parse(units: &str) -> Option<Self> {
        let (unit, reference) = units.split_once(" since ")?;
        let micros_per_unit = match unit.trim().to_lowercase().as_str() {
            "days" | "day" | "d" => 86_400_000_000.0,
            "hours" | "hour" | "hr" | "h" => 3_600_000_000.0,
            "minutes" | "minute" | "min" => 60_000_000.0,
            "seconds" | "second" | "sec" | "s" => 1_000_000.0,
            "milliseconds" | "millisecond" | "ms" => 1_000.0,
            "microseconds" | "microsecond" | "us" => 1.0,
            _ => return None,
        };
        let epoch = parse_reference(reference)?;
        Some(Self {
            micros_per_unit,
            epoch,
        })
    }

    pub fn to_datetime(&self, offset: f64) -> Option<NaiveDateTime> {
        let micros = (offset * self.micros_per_unit).round();
        if !micros.is_finite() || micros.abs() > i64::MAX as f64 {
            return None;
        }
        self.epoch
            .checked_add_signed(Duration::microseconds(micros as i64))
    }
}

fn parse_reference(reference: &str) -> Option<NaiveDateTime> {
    let mut text = reference.trim();
    for suffix in ["UTC", "Z", "+00:00", "+0:00", "+00"] {
        if let Some(stripped) = text.strip_suffix(suffix) {
            text = stripped.trim_end();
        }
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
