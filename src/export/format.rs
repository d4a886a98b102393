//! Text rendering of cells and attribute values
//!
//! Output must not depend on locale or platform so archives can be compared
//! byte for byte. Floats use shortest round-trip digits, switching to
//! scientific notation outside `1e-4 <= |x| < 1e16`.

use crate::dataset::{AttrValue, Cell};
use chrono::Timelike;

/// Renders one CSV field; missing cells become empty fields
pub fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Missing => String::new(),
        Cell::Int(v) => v.to_string(),
        Cell::UInt(v) => v.to_string(),
        Cell::Float32(v) if v.is_nan() => String::new(),
        Cell::Float64(v) if v.is_nan() => String::new(),
        Cell::Float32(v) => format_f32(*v),
        Cell::Float64(v) => format_f64(*v),
        Cell::Text(s) => s.clone(),
        Cell::Time(t) => {
            if t.nanosecond() == 0 {
                t.format("%Y-%m-%d %H:%M:%S").to_string()
            } else {
                t.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
            }
        }
    }
}

pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    shortest_repr(format!("{}", v), format!("{:e}", v))
}

pub fn format_f32(v: f32) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    shortest_repr(format!("{}", v), format!("{:e}", v))
}

/// Picks positional or scientific layout from Rust's shortest-digit renderings
fn shortest_repr(positional: String, scientific: String) -> String {
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return positional,
    };

    if (-4..16).contains(&exponent) {
        if positional.contains('.') {
            positional
        } else {
            format!("{}.0", positional)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.abs())
    }
}

/// Renders an attribute value the way it is listed in the readme documents
pub fn format_attribute(value: &AttrValue) -> String {
    match value {
        AttrValue::Text(s) => s.clone(),
        AttrValue::Texts(ss) => {
            let quoted: Vec<String> = ss.iter().map(|s| format!("'{}'", s)).collect();
            format!("[{}]", quoted.join(", "))
        }
        AttrValue::Int(v) => v.to_string(),
        AttrValue::UInt(v) => v.to_string(),
        AttrValue::Float32(v) => format_f32(*v),
        AttrValue::Float64(v) => format_f64(*v),
        AttrValue::Ints(vs) => bracketed(vs.iter().map(|v| v.to_string())),
        AttrValue::UInts(vs) => bracketed(vs.iter().map(|v| v.to_string())),
        AttrValue::Float32s(vs) => bracketed(vs.iter().map(|v| format_f32(*v))),
        AttrValue::Float64s(vs) => bracketed(vs.iter().map(|v| format_f64(*v))),
    }
}

fn bracketed(items: impl Iterator<Item = String>) -> String {
    format!("[{}]", items.collect::<Vec<_>>().join(" "))
}
