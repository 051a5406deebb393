//! Working-hour claims: punch-time derivation, leave-hour imputation and
//! travel defaults, followed by organization backfill and the employee-level
//! join.

use log::info;

use crate::data::Value;
use crate::enrich::{self, OrgField, ReferenceData};
use crate::registry::{
    CLAIM_ACTUAL_HOURS, CLAIM_ATTENDANCE, CLAIM_DEPARTMENT, CLAIM_EMPLOYEE_ID, CLAIM_END,
    CLAIM_EXCLUDED, CLAIM_GRADE, CLAIM_LEAVE_HOURS, CLAIM_LEVEL, CLAIM_NAME, CLAIM_START,
    CLAIM_WORK_HOURS, SourceTypeDescriptor,
};
use crate::table::Table;
use crate::transform::fields;

/// Standard credited day for travel, training and secondment rows.
pub const FULL_DAY_HOURS: f64 = 8.0;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Attendance labels credited as leave, with their hour quantity.
pub const LEAVE_HOURS: &[(&str, f64)] = &[
    ("연차", 8.0),
    ("연차휴가", 8.0),
    ("하계휴가", 8.0),
    ("대체휴가", 8.0),
    ("경조휴가", 8.0),
    ("출산휴가", 8.0),
    ("배우자출산휴가", 8.0),
    ("육아휴직", 8.0),
    ("병가", 8.0),
    ("공가", 8.0),
    ("보건휴가", 8.0),
    ("예비군훈련", 8.0),
    ("민방위훈련", 4.0),
    ("오전반차", 4.0),
    ("오후반차", 4.0),
    ("반차", 4.0),
    ("오전반반차", 2.0),
    ("오후반반차", 2.0),
    ("반반차", 2.0),
    ("2시간휴가", 2.0),
    ("4시간휴가", 4.0),
    ("6시간휴가", 6.0),
];

/// Off-site labels. Disjoint from [`LEAVE_HOURS`].
pub const OFFSITE_LABELS: &[&str] = &[
    "출장",
    "국내출장",
    "해외출장",
    "교육",
    "사외교육",
    "파견",
    "외부파견",
];

pub fn leave_hours_for(label: &str) -> Option<f64> {
    let label = label.trim();
    LEAVE_HOURS
        .iter()
        .find(|(name, _)| *name == label)
        .map(|(_, hours)| *hours)
}

pub fn is_offsite(label: &str) -> bool {
    OFFSITE_LABELS.contains(&label.trim())
}

/// Elapsed hours between two `HHMM` punch times with midnight rollover,
/// minus `excluded_minutes`, floored at zero.
pub fn hours_from_punches(start_hhmm: i64, end_hhmm: i64, excluded_minutes: f64) -> f64 {
    let start = fields::hhmm_to_minutes(start_hhmm);
    let mut end = fields::hhmm_to_minutes(end_hhmm);
    if end < start {
        end += MINUTES_PER_DAY;
    }
    let worked = (end - start) as f64 - excluded_minutes.max(0.0);
    (worked / 60.0).max(0.0)
}

pub fn transform(
    descriptor: &SourceTypeDescriptor,
    mut table: Table,
    refs: &ReferenceData,
) -> Table {
    fields::rename_columns(descriptor, &mut table);
    fields::coerce_columns(descriptor, &mut table);

    let derived = derive_work_hours(&mut table);
    if derived > 0 {
        info!("Derived {derived} work-hour value(s) from punch times");
    }
    fill_actual_hours(&mut table);
    let (leave_rows, offsite_rows) = apply_attendance_rules(&mut table);
    info!("Leave credited on {leave_rows} row(s), off-site default on {offsite_rows} row(s)");

    enrich::backfill_organization(
        &mut table,
        CLAIM_EMPLOYEE_ID,
        &[
            (CLAIM_NAME, OrgField::Name),
            (CLAIM_DEPARTMENT, OrgField::Team),
            (CLAIM_GRADE, OrgField::Position),
        ],
        refs,
    );
    enrich::attach_employee_level(&mut table, CLAIM_GRADE, CLAIM_LEVEL, refs);

    fields::project(descriptor, &mut table);
    table
}

fn float_column(table: &Table, name: &str) -> Option<Vec<Option<f64>>> {
    table
        .column(name)
        .map(|c| c.values.iter().map(|v| v.as_ref().and_then(Value::as_f64)).collect())
}

fn to_values(values: Vec<Option<f64>>) -> Vec<Option<Value>> {
    values.into_iter().map(|v| v.map(Value::Float)).collect()
}

/// Fills missing work hours from the punch-time pair. Returns the number of
/// rows derived.
fn derive_work_hours(table: &mut Table) -> usize {
    let (Some(starts), Some(ends)) = (table.column(CLAIM_START), table.column(CLAIM_END)) else {
        return 0;
    };
    let starts = starts.values.iter().map(|v| v.as_ref().and_then(Value::as_i64)).collect::<Vec<_>>();
    let ends = ends.values.iter().map(|v| v.as_ref().and_then(Value::as_i64)).collect::<Vec<_>>();
    let excluded = float_column(table, CLAIM_EXCLUDED).unwrap_or_else(|| vec![None; table.height()]);
    let mut hours = float_column(table, CLAIM_WORK_HOURS).unwrap_or_else(|| vec![None; table.height()]);

    let mut derived = 0;
    for (row, slot) in hours.iter_mut().enumerate() {
        if slot.is_some_and(|h| h > 0.0) {
            continue;
        }
        if let (Some(start), Some(end)) = (starts[row], ends[row]) {
            *slot = Some(hours_from_punches(start, end, excluded[row].unwrap_or(0.0)));
            derived += 1;
        }
    }
    if derived > 0 || table.has_column(CLAIM_WORK_HOURS) {
        table.set_column(CLAIM_WORK_HOURS, to_values(hours));
    }
    derived
}

/// Actual hours default to work hours; when present only nulls are filled.
fn fill_actual_hours(table: &mut Table) {
    let height = table.height();
    let work = float_column(table, CLAIM_WORK_HOURS);
    let actual = match float_column(table, CLAIM_ACTUAL_HOURS) {
        Some(mut actual) => {
            if let Some(work) = &work {
                for (slot, hours) in actual.iter_mut().zip(work) {
                    if slot.is_none() {
                        *slot = *hours;
                    }
                }
            }
            actual
        }
        None => work.unwrap_or_else(|| vec![None; height]),
    };
    table.set_column(CLAIM_ACTUAL_HOURS, to_values(actual));
}

/// Leave labels set the leave-hours field and add the quantity to actual
/// hours. Off-site labels bump zero or null actual hours to a full day.
fn apply_attendance_rules(table: &mut Table) -> (usize, usize) {
    let height = table.height();
    if !table.has_column(CLAIM_LEAVE_HOURS) {
        table.set_column(CLAIM_LEAVE_HOURS, vec![None; height]);
    }
    let Some(labels) = table.column(CLAIM_ATTENDANCE) else {
        return (0, 0);
    };
    let labels = labels
        .values
        .iter()
        .map(|v| v.as_ref().map(Value::as_display))
        .collect::<Vec<_>>();
    let mut actual = float_column(table, CLAIM_ACTUAL_HOURS).unwrap_or_else(|| vec![None; height]);
    let mut leave = float_column(table, CLAIM_LEAVE_HOURS).unwrap_or_else(|| vec![None; height]);

    let (mut leave_rows, mut offsite_rows) = (0, 0);
    for (row, label) in labels.iter().enumerate() {
        let Some(label) = label else {
            continue;
        };
        if let Some(quantity) = leave_hours_for(label) {
            leave[row] = Some(quantity);
            actual[row] = Some(actual[row].unwrap_or(0.0) + quantity);
            leave_rows += 1;
        } else if is_offsite(label) && actual[row].is_none_or(|h| h == 0.0) {
            actual[row] = Some(FULL_DAY_HOURS);
            offsite_rows += 1;
        }
    }
    table.set_column(CLAIM_ACTUAL_HOURS, to_values(actual));
    table.set_column(CLAIM_LEAVE_HOURS, to_values(leave));
    (leave_rows, offsite_rows)
}
