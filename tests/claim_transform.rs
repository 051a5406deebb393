use proptest::prelude::*;
use workforce_ingest::data::Value;
use workforce_ingest::enrich::{OrgRecord, ReferenceData};
use workforce_ingest::error::TransformError;
use workforce_ingest::registry::{Registry, SourceType};
use workforce_ingest::table::Table;
use workforce_ingest::transform::Transformer;
use workforce_ingest::transform::claim::hours_from_punches;
use workforce_ingest::transform::fields::parse_work_hours;

fn text(value: &str) -> Option<Value> {
    Some(Value::Text(value.to_string()))
}

fn int(value: i64) -> Option<Value> {
    Some(Value::Integer(value))
}

fn claims(headers: &[&str], rows: Vec<Vec<Option<Value>>>) -> Table {
    let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    Table::from_rows(&headers, rows)
}

fn transform(table: Table, refs: &ReferenceData) -> Result<Table, TransformError> {
    let registry = Registry::builtin();
    let descriptor = registry.get(SourceType::Claim).unwrap();
    Transformer::for_source(descriptor).transform(table, refs)
}

fn hours(table: &Table, column: &str, row: usize) -> Option<f64> {
    table.get(column, row).and_then(Value::as_f64)
}

fn reference_data() -> ReferenceData {
    ReferenceData::empty()
        .with_organization([
            (
                "2019001".to_string(),
                OrgRecord {
                    name: Some("김하나".into()),
                    position: Some("책임".into()),
                    team: Some("생산1팀".into()),
                    ..OrgRecord::default()
                },
            ),
            (
                "2019002".to_string(),
                OrgRecord {
                    name: Some("이두리".into()),
                    position: Some("선임".into()),
                    team: Some("품질팀".into()),
                    ..OrgRecord::default()
                },
            ),
        ])
        .with_grade_levels([("책임", "Lv.3"), ("선임", "Lv.2")])
}

#[test]
fn overnight_punches_roll_over_midnight() {
    let table = claims(
        &["근무일", "사번", "근무시간", "시작", "종료"],
        vec![vec![text("2025-08-04"), int(2019001), None, text("23:00"), text("01:00")]],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(hours(&out, "근무시간", 0), Some(2.0));
    assert_eq!(hours(&out, "실제근무시간", 0), Some(2.0));
}

#[test]
fn excluded_minutes_reduce_derived_hours() {
    let table = claims(
        &["근무일자", "사번", "근무시작", "근무종료", "점심시간"],
        vec![vec![text("2025-08-04"), int(2019001), int(900), int(1800), int(60)]],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(out.get("근무일", 0), Some(&Value::Text("2025-08-04 00:00:00".into())));
    assert_eq!(out.get("시작", 0), Some(&Value::Integer(900)));
    assert_eq!(hours(&out, "근무시간", 0), Some(8.0));
}

#[test]
fn full_day_leave_adds_to_zero_hours() {
    let table = claims(
        &["근무일", "사번", "근무시간", "실제근무시간", "근태명"],
        vec![vec![text("2025-08-05"), int(2019001), None, Some(Value::Float(0.0)), text("연차")]],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(hours(&out, "실제근무시간", 0), Some(8.0));
    assert_eq!(hours(&out, "휴가_연차", 0), Some(8.0));
}

#[test]
fn half_day_leave_adds_to_worked_hours() {
    let table = claims(
        &["근무일", "사번", "근무시간", "근태명"],
        vec![vec![text("2025-08-05"), int(2019001), int(240), text("오후반차")]],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(hours(&out, "근무시간", 0), Some(4.0));
    assert_eq!(hours(&out, "실제근무시간", 0), Some(8.0));
    assert_eq!(hours(&out, "휴가_연차", 0), Some(4.0));
}

#[test]
fn overseas_trip_keeps_reported_hours() {
    let table = claims(
        &["근무일", "사번", "근무시간", "근태명"],
        vec![
            vec![text("2025-08-06"), int(2019002), int(660), text("해외출장")],
            vec![text("2025-08-07"), int(2019002), None, text("출장")],
        ],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(hours(&out, "실제근무시간", 0), Some(11.0));
    assert_eq!(hours(&out, "실제근무시간", 1), Some(8.0));
    assert_eq!(hours(&out, "휴가_연차", 0), None);
}

#[test]
fn clock_duration_text_is_parsed() {
    let table = claims(
        &["근무일", "사번", "근무시간"],
        vec![
            vec![text("2025-08-04"), int(2019001), text("8:30")],
            vec![text("2025-08-05"), int(2019001), text("00:00")],
        ],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(hours(&out, "근무시간", 0), Some(8.5));
    assert_eq!(hours(&out, "근무시간", 1), None);
}

#[test]
fn existing_actual_hours_are_only_null_filled() {
    let table = claims(
        &["근무일", "사번", "근무시간", "실제근무시간"],
        vec![
            vec![text("2025-08-04"), int(2019001), int(480), Some(Value::Float(7.5))],
            vec![text("2025-08-05"), int(2019001), int(540), None],
        ],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert_eq!(hours(&out, "실제근무시간", 0), Some(7.5));
    assert_eq!(hours(&out, "실제근무시간", 1), Some(9.0));
}

#[test]
fn organization_backfill_never_overwrites() {
    let table = claims(
        &["근무일", "사번", "성명", "부서"],
        vec![
            vec![text("2025-08-04"), int(2019001), None, text("파견팀")],
            vec![text("2025-08-04"), int(2019002), text("이두리(신)"), None],
            vec![text("2025-08-04"), text("20A9"), None, None],
        ],
    );
    let out = transform(table, &reference_data()).unwrap();

    assert_eq!(out.get("성명", 0), Some(&Value::Text("김하나".into())));
    assert_eq!(out.get("부서", 0), Some(&Value::Text("파견팀".into())));
    assert_eq!(out.get("직급", 0), Some(&Value::Text("책임".into())));
    assert_eq!(out.get("성명", 1), Some(&Value::Text("이두리(신)".into())));
    assert_eq!(out.get("부서", 1), Some(&Value::Text("품질팀".into())));
    // A garbled identifier is nulled and therefore joins nothing.
    assert_eq!(out.get("사번", 2), None);
    assert_eq!(out.get("성명", 2), None);
}

#[test]
fn employee_level_follows_grade() {
    let table = claims(
        &["근무일", "사번", "직급"],
        vec![
            vec![text("2025-08-04"), int(2019003), text("책임 ")],
            vec![text("2025-08-04"), int(2019004), text("수석")],
        ],
    );
    let out = transform(table, &reference_data()).unwrap();
    assert_eq!(out.get("employee_level", 0), Some(&Value::Text("Lv.3".into())));
    assert_eq!(out.get("employee_level", 1), None);
}

#[test]
fn output_columns_follow_destination_schema() {
    let table = claims(
        &["일자", "사번", "비고", "근무시간"],
        vec![vec![text("20250804"), int(2019001), text("memo"), int(480)]],
    );
    let out = transform(table, &ReferenceData::empty()).unwrap();
    assert!(!out.has_column("비고"));
    let names = out.column_names();
    assert_eq!(names.first(), Some(&"근무일"));
    assert!(names.contains(&"실제근무시간"));
    assert!(names.contains(&"휴가_연차"));
    assert!(names.contains(&"employee_level"));
}

#[test]
fn missing_date_column_is_rejected() {
    let table = claims(&["사번", "근무시간"], vec![vec![int(2019001), int(480)]]);
    let err = transform(table, &ReferenceData::empty()).unwrap_err();
    assert!(matches!(
        err,
        TransformError::MissingColumn { source_type: "claim_data", ref column } if column == "근무일"
    ));
}

#[test]
fn transform_is_idempotent_for_the_same_input() {
    let raw = claims(
        &["근무일", "사번", "직급", "근무시간", "시작", "종료", "근태명"],
        vec![
            vec![text("2025-08-04"), int(2019001), None, None, text("23:00"), text("01:00"), None],
            vec![text("2025-08-05"), int(2019001), None, None, None, None, text("연차")],
            vec![text("2025-08-06"), int(2019002), text("선임"), int(660), None, None, text("해외출장")],
        ],
    );
    let refs = reference_data();
    let first = transform(raw.clone(), &refs).unwrap();
    let second = transform(raw, &refs).unwrap();
    assert_eq!(first, second);
}

proptest! {
    #[test]
    fn rollover_hours_stay_within_a_day(start_h in 0i64..24, start_m in 0i64..60, end_h in 0i64..24, end_m in 0i64..60) {
        let start = start_h * 100 + start_m;
        let end = end_h * 100 + end_m;
        let elapsed = hours_from_punches(start, end, 0.0);
        prop_assert!((0.0..24.0).contains(&elapsed));
        let expected_minutes = ((end_h * 60 + end_m) - (start_h * 60 + start_m)).rem_euclid(1440);
        prop_assert!((elapsed * 60.0 - expected_minutes as f64).abs() < 1e-9);
    }

    #[test]
    fn numeric_work_hours_are_minutes(minutes in 1i64..2000) {
        let parsed = parse_work_hours(&Value::Integer(minutes));
        prop_assert_eq!(parsed, Some(minutes as f64 / 60.0));
    }

    #[test]
    fn clock_work_hours_match_components(h in 0u32..24, m in 0u32..60) {
        prop_assume!(h > 0 || m > 0);
        let parsed = parse_work_hours(&Value::Text(format!("{h}:{m:02}"))).unwrap();
        prop_assert!((parsed - (f64::from(h) + f64::from(m) / 60.0)).abs() < 1e-9);
    }
}
