//! Converts Postgres cells into JSON values for the row set.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgRow, PgValueFormat, PgValueRef};
use sqlx::types::BigDecimal;
use sqlx::{Column, Decode, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;
use uuid::Uuid;

/// Decodes every cell of `row` in column order.
pub(crate) fn row_values(row: &PgRow) -> Vec<Value> {
    row.columns()
        .iter()
        .map(|column| match row.try_get_raw(column.ordinal()) {
            Ok(raw) => cell_value(column.name(), raw),
            Err(err) => {
                debug!(column = column.name(), error = %err, "cell not readable");
                Value::Null
            }
        })
        .collect()
}

/// Column names of `row` in order.
pub(crate) fn row_columns(row: &PgRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|column| column.name().to_string())
        .collect()
}

fn cell_value(column: &str, raw: PgValueRef<'_>) -> Value {
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();

    let decoded = match type_name.as_str() {
        "BOOL" => decode::<bool>(raw).map(Value::Bool),
        "INT2" => decode::<i16>(raw).map(Value::from),
        "INT4" => decode::<i32>(raw).map(Value::from),
        "INT8" => decode::<i64>(raw).map(Value::from),
        "OID" => decode::<sqlx::postgres::types::Oid>(raw).map(|oid| Value::from(oid.0)),
        "FLOAT4" => decode::<f32>(raw).map(|f| float_value(f64::from(f))),
        "FLOAT8" => decode::<f64>(raw).map(float_value),
        "NUMERIC" => match numeric_special(&raw) {
            Some(label) => Ok(Value::String(label.to_string())),
            None => decode::<BigDecimal>(raw).map(|d| Value::String(d.to_string())),
        },
        "INTERVAL" => decode::<PgInterval>(raw).map(|iv| {
            Value::String(interval_text(iv.months, iv.days, iv.microseconds))
        }),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "UNKNOWN" => {
            decode::<String>(raw).map(Value::String)
        }
        "JSON" | "JSONB" => decode::<Value>(raw),
        "UUID" => decode::<Uuid>(raw).map(|u| Value::String(u.to_string())),
        "DATE" => decode::<NaiveDate>(raw).map(|d| Value::String(d.to_string())),
        "TIME" => decode::<NaiveTime>(raw).map(|t| Value::String(t.to_string())),
        "TIMESTAMP" => decode::<NaiveDateTime>(raw)
            .map(|ts| Value::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(raw).map(|ts| Value::String(ts.to_rfc3339())),
        "BYTEA" => decode::<Vec<u8>>(raw).map(|bytes| Value::String(hex_bytes(&bytes))),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => {
            decode::<Vec<String>>(raw).map(Value::from)
        }
        "INT2[]" => decode::<Vec<i16>>(raw).map(Value::from),
        "INT4[]" => decode::<Vec<i32>>(raw).map(Value::from),
        "INT8[]" => decode::<Vec<i64>>(raw).map(Value::from),
        "BOOL[]" => decode::<Vec<bool>>(raw).map(Value::from),
        _ => {
            debug!(column, type_name = %type_name, "unsupported column type rendered as null");
            return Value::Null;
        }
    };

    decoded.unwrap_or_else(|err| {
        debug!(column, type_name = %type_name, error = %err, "cell decode failed");
        Value::Null
    })
}

type BoxDynError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn decode<'r, T>(raw: PgValueRef<'r>) -> Result<T, BoxDynError>
where
    T: Decode<'r, Postgres>,
{
    T::decode(raw)
}

/// `NaN` and the infinities have no decimal form; read them off the wire header.
fn numeric_special(raw: &PgValueRef<'_>) -> Option<&'static str> {
    let bytes = raw.as_bytes().ok()?;
    match raw.format() {
        // ndigits, weight, sign, dscale: four big-endian 16-bit words
        PgValueFormat::Binary if bytes.len() >= 8 => {
            numeric_sign_label(u16::from_be_bytes([bytes[4], bytes[5]]))
        }
        PgValueFormat::Binary => None,
        PgValueFormat::Text => match bytes {
            b"NaN" => Some("NaN"),
            b"Infinity" => Some("Infinity"),
            b"-Infinity" => Some("-Infinity"),
            _ => None,
        },
    }
}

fn numeric_sign_label(sign: u16) -> Option<&'static str> {
    match sign {
        0xC000 => Some("NaN"),
        0xD000 => Some("Infinity"),
        0xF000 => Some("-Infinity"),
        _ => None,
    }
}

/// Renders an interval the way `psql` does with the default `IntervalStyle`.
fn interval_text(months: i32, days: i32, microseconds: i64) -> String {
    fn unit(parts: &mut Vec<String>, n: i64, singular: &str, plural: &str) {
        if n != 0 {
            parts.push(format!("{n} {}", if n == 1 { singular } else { plural }));
        }
    }

    let mut parts = Vec::new();
    unit(&mut parts, i64::from(months / 12), "year", "years");
    unit(&mut parts, i64::from(months % 12), "mon", "mons");
    unit(&mut parts, i64::from(days), "day", "days");

    if microseconds != 0 || parts.is_empty() {
        let sign = if microseconds < 0 { "-" } else { "" };
        let total = microseconds.unsigned_abs();
        let secs = total / 1_000_000;
        let frac = total % 1_000_000;
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        );
        if frac != 0 {
            let digits = format!("{frac:06}");
            clock.push('.');
            clock.push_str(digits.trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

fn float_value(f: f64) -> Value {
    serde_json::Number::from_f64(f)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(f.to_string()))
}

fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_floats_become_strings() {
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
        assert_eq!(float_value(f64::NAN), Value::String("NaN".into()));
        assert_eq!(float_value(f64::INFINITY), Value::String("inf".into()));
    }

    #[test]
    fn special_numerics_are_named() {
        assert_eq!(numeric_sign_label(0xC000), Some("NaN"));
        assert_eq!(numeric_sign_label(0xD000), Some("Infinity"));
        assert_eq!(numeric_sign_label(0xF000), Some("-Infinity"));
        assert_eq!(numeric_sign_label(0x0000), None);
        assert_eq!(numeric_sign_label(0x4000), None);
    }

    #[test]
    fn intervals_render_like_psql() {
        assert_eq!(interval_text(0, 1, 0), "1 day");
        assert_eq!(interval_text(14, 3, 14_706_000_000), "1 year 2 mons 3 days 04:05:06");
        assert_eq!(interval_text(0, 0, 0), "00:00:00");
        assert_eq!(interval_text(0, -2, -1_500_000), "-2 days -00:00:01.5");
    }

    #[test]
    fn bytea_renders_like_psql() {
        assert_eq!(hex_bytes(&[0xde, 0xad, 0x01]), "\\xdead01");
        assert_eq!(hex_bytes(&[]), "\\x");
    }
}
