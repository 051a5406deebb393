use workforce_ingest::data::Value;
use workforce_ingest::enrich::{OrgRecord, ReferenceData};
use workforce_ingest::error::TransformError;
use workforce_ingest::registry::{FieldKind, Registry, SourceType};
use workforce_ingest::table::Table;
use workforce_ingest::transform::Transformer;

fn text(value: &str) -> Option<Value> {
    Some(Value::Text(value.to_string()))
}

fn int(value: i64) -> Option<Value> {
    Some(Value::Integer(value))
}

fn table(headers: &[&str], rows: Vec<Vec<Option<Value>>>) -> Table {
    let headers = headers.iter().map(|h| h.to_string()).collect::<Vec<_>>();
    Table::from_rows(&headers, rows)
}

fn run(source: SourceType, input: Table, refs: &ReferenceData) -> Result<Table, TransformError> {
    let registry = Registry::builtin();
    let descriptor = registry.get(source).unwrap();
    Transformer::for_source(descriptor).transform(input, refs)
}

#[test]
fn tag_times_stay_hhmmss_tokens() {
    let input = table(
        &["일자", "사번", "출입시각", "DR구분"],
        vec![
            vec![int(20250815), int(2019001), int(70553), text("IN")],
            vec![text("2025-08-15"), int(2019001), text("18:02:11"), text("OUT")],
            vec![text("2025/08/16"), int(2019001), int(235959), text("OUT")],
        ],
    );
    let out = run(SourceType::Tag, input, &ReferenceData::empty()).unwrap();

    assert_eq!(out.get("ENTE_DT", 0), Some(&Value::Integer(20250815)));
    assert_eq!(out.get("ENTE_DT", 1), Some(&Value::Integer(20250815)));
    assert_eq!(out.get("ENTE_DT", 2), Some(&Value::Integer(20250816)));
    assert_eq!(out.get("출입시각", 0), Some(&Value::Integer(70553)));
    assert_eq!(out.get("출입시각", 1), Some(&Value::Integer(180211)));
    assert_eq!(out.get("출입시각", 2), Some(&Value::Integer(235959)));
    assert_eq!(out.get("DR_GB", 0), Some(&Value::Text("IN".into())));
}

#[test]
fn tag_rows_are_backfilled_from_the_organization_master() {
    let refs = ReferenceData::empty().with_organization([(
        "2019001".to_string(),
        OrgRecord {
            name: Some("김하나".into()),
            center: Some("생산센터".into()),
            team: Some("생산1팀".into()),
            group: Some("A조".into()),
            ..OrgRecord::default()
        },
    )]);
    let input = table(
        &["일자", "사번", "출입시각", "팀"],
        vec![
            vec![int(20250815), text("2019001"), int(70553), text("파견팀")],
            vec![int(20250815), text("20l9001"), int(70600), None],
        ],
    );
    let out = run(SourceType::Tag, input, &refs).unwrap();

    assert_eq!(out.get("사번", 0), Some(&Value::Integer(2019001)));
    assert_eq!(out.get("NAME", 0), Some(&Value::Text("김하나".into())));
    assert_eq!(out.get("CENTER", 0), Some(&Value::Text("생산센터".into())));
    assert_eq!(out.get("TEAM", 0), Some(&Value::Text("파견팀".into())));
    assert_eq!(out.get("GROUP_A", 0), Some(&Value::Text("A조".into())));
    assert_eq!(out.get("사번", 1), None);
    assert_eq!(out.get("NAME", 1), None);
}

#[test]
fn event_sources_use_fourteen_digit_timestamps() {
    let input = table(
        &["취식일시", "사번", "식사구분", "테이크아웃"],
        vec![
            vec![text("2025-08-01 12:01:30"), text("2019001"), text("중식"), text("N")],
            vec![text("not a time"), text("2019002"), text("석식"), text("Y")],
        ],
    );
    let out = run(SourceType::Meal, input, &ReferenceData::empty()).unwrap();

    assert_eq!(out.get("취식일시", 0), Some(&Value::Integer(20250801120130)));
    assert_eq!(out.get("취식일시", 1), None);
    assert_eq!(out.get("사번", 1), Some(&Value::Integer(2019002)));
    assert_eq!(out.height(), 2);
}

#[test]
fn knox_accounts_are_not_numeric() {
    let input = table(
        &["기안일", "기안자ID", "결재구분"],
        vec![vec![text("2025-08-01 09:15:00"), text("hana.kim"), text("승인")]],
    );
    let out = run(SourceType::KnoxApproval, input, &ReferenceData::empty()).unwrap();
    assert_eq!(out.get("기안일", 0), Some(&Value::Integer(20250801091500)));
    assert_eq!(out.get("기안자ID", 0), Some(&Value::Text("hana.kim".into())));
}

#[test]
fn meeting_dates_are_eight_digits() {
    let input = table(
        &["회의일자", "예약자ID", "회의실"],
        vec![vec![text("2025.08.01"), text("hana.kim"), text("A-301")]],
    );
    let out = run(SourceType::KnoxPims, input, &ReferenceData::empty()).unwrap();
    assert_eq!(out.get("회의일자", 0), Some(&Value::Integer(20250801)));
}

#[test]
fn undated_source_requires_employee_column() {
    let input = table(&["이름", "팀"], vec![vec![text("김하나"), text("품질팀")]]);
    let err = run(SourceType::Organization, input, &ReferenceData::empty()).unwrap_err();
    assert!(matches!(err, TransformError::MissingColumn { source_type: "employees", .. }));
}

#[test]
fn every_source_type_transforms_idempotently() {
    let registry = Registry::builtin();
    for descriptor in registry.iter() {
        let headers = descriptor
            .fields
            .iter()
            .map(|spec| spec.target.to_string())
            .collect::<Vec<_>>();
        let row = descriptor
            .fields
            .iter()
            .map(|spec| match spec.kind {
                FieldKind::Temporal(_) => text("2025-08-01 09:00:00"),
                FieldKind::EmployeeId => int(2019001),
                FieldKind::TimeToken => int(90000),
                FieldKind::ClockTime => text("09:00"),
                FieldKind::WorkHours | FieldKind::Minutes => int(60),
                FieldKind::Hours => Some(Value::Float(1.0)),
                FieldKind::Keep | FieldKind::Text => text("값"),
            })
            .collect::<Vec<_>>();
        let raw = Table::from_rows(&headers, vec![row.clone(), row]);
        let transformer = Transformer::for_source(descriptor);
        let first = transformer
            .transform(raw.clone(), &ReferenceData::empty())
            .unwrap_or_else(|err| panic!("{}: {err}", descriptor.id()));
        let second = transformer.transform(raw, &ReferenceData::empty()).unwrap();
        assert_eq!(first, second, "{} is not idempotent", descriptor.id());
        assert_eq!(first.height(), 2);
    }
}
