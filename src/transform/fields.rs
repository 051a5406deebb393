//! Column renaming and per-field coercion shared by every transformer.

use chrono::Timelike;

use crate::data::{Value, compact_date, compact_datetime, parse_number, parse_temporal};
use crate::registry::{DateStorage, FieldKind, SourceTypeDescriptor};
use crate::table::Table;

/// Renames the first alias present for each field to its target name.
pub fn rename_columns(descriptor: &SourceTypeDescriptor, table: &mut Table) {
    for spec in descriptor.fields {
        let found = spec
            .sources
            .iter()
            .copied()
            .chain(std::iter::once(spec.target))
            .find(|name| table.has_column(name));
        if let Some(source) = found {
            table.rename(source, spec.target);
        }
    }
}

/// Applies each field's coercion policy to the matching column.
pub fn coerce_columns(descriptor: &SourceTypeDescriptor, table: &mut Table) {
    for spec in descriptor.fields {
        if let Some(column) = table.column_mut(spec.target) {
            for cell in column.values.iter_mut() {
                *cell = cell.take().and_then(|value| coerce(spec.kind, &value));
            }
            column.int_width = None;
        }
    }
}

/// Keeps only descriptor targets, in descriptor order.
pub fn project(descriptor: &SourceTypeDescriptor, table: &mut Table) {
    let targets = descriptor.target_names().collect::<Vec<_>>();
    table.select(&targets);
}

/// Rename, coerce and project in one pass. Used by the sources without
/// business rules.
pub fn apply(descriptor: &SourceTypeDescriptor, table: &mut Table) {
    rename_columns(descriptor, table);
    coerce_columns(descriptor, table);
    project(descriptor, table);
}

pub fn coerce(kind: FieldKind, value: &Value) -> Option<Value> {
    match kind {
        FieldKind::Keep => Some(value.clone()),
        FieldKind::Text => {
            let rendered = value.as_display();
            let trimmed = rendered.trim();
            (!trimmed.is_empty()).then(|| Value::Text(trimmed.to_string()))
        }
        FieldKind::EmployeeId => value.as_i64().map(Value::Integer),
        FieldKind::TimeToken => time_token(value).map(Value::Integer),
        FieldKind::Temporal(storage) => {
            let ts = parse_temporal(value)?;
            Some(match storage {
                DateStorage::Compact8 => Value::Integer(compact_date(&ts)),
                DateStorage::Compact14 => Value::Integer(compact_datetime(&ts)),
                DateStorage::IsoDateTime => {
                    Value::Text(ts.format("%Y-%m-%d %H:%M:%S").to_string())
                }
            })
        }
        FieldKind::ClockTime => clock_hhmm(value).map(Value::Integer),
        FieldKind::WorkHours => parse_work_hours(value).map(Value::Float),
        FieldKind::Minutes => parse_minutes(value).map(|m| {
            if m.fract() == 0.0 {
                Value::Integer(m as i64)
            } else {
                Value::Float(m)
            }
        }),
        FieldKind::Hours => value.as_f64().map(Value::Float),
    }
}

/// Integer token such as `70553` for 07:05:53. Separators are stripped but
/// the digits are never reinterpreted as a date.
fn time_token(value: &Value) -> Option<i64> {
    match value {
        Value::Text(s) if s.contains(':') => {
            let digits = s.trim().replace(':', "");
            digits.parse::<i64>().ok()
        }
        Value::DateTime(dt) => {
            Some(i64::from(dt.hour() * 10_000 + dt.minute() * 100 + dt.second()))
        }
        other => other.as_i64(),
    }
}

/// Time of day as an `HHMM` integer: `"09:30"` → 930, `93000` → 930.
pub fn clock_hhmm(value: &Value) -> Option<i64> {
    let hhmm = match value {
        Value::Integer(i) => normalize_clock_int(*i)?,
        Value::Float(f) if (0.0..1.0).contains(f) => {
            let minutes = (f * 1440.0).round() as i64;
            (minutes / 60) * 100 + minutes % 60
        }
        Value::Float(f) if f.fract() == 0.0 => normalize_clock_int(*f as i64)?,
        Value::Text(s) => {
            let trimmed = s.trim();
            if let Some((h, rest)) = trimmed.split_once(':') {
                let hours = h.trim().parse::<i64>().ok()?;
                let minutes = rest.split(':').next()?.trim().parse::<i64>().ok()?;
                hours * 100 + minutes
            } else {
                normalize_clock_int(trimmed.parse::<i64>().ok()?)?
            }
        }
        Value::DateTime(dt) => i64::from(dt.hour() * 100 + dt.minute()),
        _ => return None,
    };
    let (hours, minutes) = (hhmm / 100, hhmm % 100);
    ((0..=24).contains(&hours) && (0..60).contains(&minutes)).then_some(hhmm)
}

fn normalize_clock_int(raw: i64) -> Option<i64> {
    match raw {
        0..=2400 => Some(raw),
        2401..=240000 => Some(raw / 100),
        _ => None,
    }
}

/// Minutes after midnight for an `HHMM` integer.
pub fn hhmm_to_minutes(hhmm: i64) -> i64 {
    (hhmm / 100) * 60 + hhmm % 100
}

/// Work duration in hours.
///
/// Numbers are minutes, `H:MM[:SS]` text is a clock duration and digit-only
/// text is minutes. Zero, negative or unparseable input yields `None`.
pub fn parse_work_hours(value: &Value) -> Option<f64> {
    let hours = match value {
        Value::Integer(_) | Value::Float(_) => value.as_f64()? / 60.0,
        Value::Text(s) => {
            let trimmed = s.trim();
            if trimmed.contains(':') {
                clock_duration_hours(trimmed)?
            } else if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
                trimmed.parse::<f64>().ok()? / 60.0
            } else {
                return None;
            }
        }
        _ => return None,
    };
    (hours.is_finite() && hours > 0.0).then_some(hours)
}

/// Duration in minutes from a number or `H:MM` text. Zero is preserved.
pub fn parse_minutes(value: &Value) -> Option<f64> {
    let minutes = match value {
        Value::Text(s) if s.contains(':') => clock_duration_hours(s.trim()).map(|h| h * 60.0),
        Value::Text(s) => match parse_number(s)? {
            Value::Integer(i) => Some(i as f64),
            Value::Float(f) => Some(f),
            _ => None,
        },
        other => other.as_f64(),
    };
    minutes.filter(|m| m.is_finite() && *m >= 0.0)
}

fn clock_duration_hours(text: &str) -> Option<f64> {
    let mut parts = text.split(':');
    let hours = parts.next()?.trim().parse::<u32>().ok()?;
    let minutes = parts.next()?.trim().parse::<u32>().ok()?;
    let seconds = match parts.next() {
        Some(raw) => raw.trim().parse::<f64>().ok()?,
        None => 0.0,
    };
    if parts.next().is_some() || minutes >= 60 || seconds >= 60.0 {
        return None;
    }
    Some(f64::from(hours) + f64::from(minutes) / 60.0 + seconds / 3600.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn work_hours_accepts_three_shapes() {
        assert_eq!(parse_work_hours(&Value::Integer(480)), Some(8.0));
        assert_eq!(parse_work_hours(&text("8:30")), Some(8.5));
        assert_eq!(parse_work_hours(&text("540")), Some(9.0));
        assert_eq!(parse_work_hours(&text("00:00")), None);
        assert_eq!(parse_work_hours(&Value::Integer(0)), None);
        assert_eq!(parse_work_hours(&text("eight")), None);
    }

    #[test]
    fn clock_times_normalize_to_hhmm() {
        assert_eq!(clock_hhmm(&text("09:30")), Some(930));
        assert_eq!(clock_hhmm(&text("23:00:00")), Some(2300));
        assert_eq!(clock_hhmm(&Value::Integer(100)), Some(100));
        assert_eq!(clock_hhmm(&Value::Integer(183000)), Some(1830));
        assert_eq!(clock_hhmm(&Value::Float(0.5)), Some(1200));
        assert_eq!(clock_hhmm(&text("0975")), None);
    }

    #[test]
    fn time_token_is_not_reinterpreted() {
        let coerced = coerce(FieldKind::TimeToken, &Value::Integer(70553));
        assert_eq!(coerced, Some(Value::Integer(70553)));
        let from_text = coerce(FieldKind::TimeToken, &text("07:05:53"));
        assert_eq!(from_text, Some(Value::Integer(70553)));
    }

    #[test]
    fn employee_id_nulls_garbled_values() {
        assert_eq!(coerce(FieldKind::EmployeeId, &text("2019001")), Some(Value::Integer(2019001)));
        assert_eq!(coerce(FieldKind::EmployeeId, &Value::Float(2019001.0)), Some(Value::Integer(2019001)));
        assert_eq!(coerce(FieldKind::EmployeeId, &text("20A9")), None);
    }

    #[test]
    fn temporal_fields_use_destination_representation() {
        let raw = text("2025-08-15 07:30:00");
        assert_eq!(
            coerce(FieldKind::Temporal(DateStorage::Compact8), &raw),
            Some(Value::Integer(20250815))
        );
        assert_eq!(
            coerce(FieldKind::Temporal(DateStorage::Compact14), &raw),
            Some(Value::Integer(20250815073000))
        );
        assert_eq!(
            coerce(FieldKind::Temporal(DateStorage::IsoDateTime), &Value::Integer(20250815)),
            Some(text("2025-08-15 00:00:00"))
        );
        assert_eq!(coerce(FieldKind::Temporal(DateStorage::Compact8), &text("soon")), None);
    }

    #[test]
    fn minutes_keep_zero() {
        assert_eq!(parse_minutes(&Value::Integer(0)), Some(0.0));
        assert_eq!(parse_minutes(&text("1:00")), Some(60.0));
        assert_eq!(parse_minutes(&text("-5")), None);
    }
}
