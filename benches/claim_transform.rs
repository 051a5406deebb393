use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use tempfile::TempDir;
use workforce_ingest::data::Value;
use workforce_ingest::enrich::{OrgRecord, ReferenceData};
use workforce_ingest::registry::{Registry, SourceType};
use workforce_ingest::store::{Gateway, InsertMode};
use workforce_ingest::table::Table;
use workforce_ingest::transform::Transformer;

const LABELS: [Option<&str>; 5] = [None, Some("연차"), Some("오전반차"), Some("해외출장"), None];

fn generate_claims(rows: usize) -> Table {
    let headers = ["근무일", "사번", "직급", "근무시간", "시작", "종료", "근태명"]
        .map(String::from)
        .to_vec();
    let rows = (0..rows)
        .map(|i| {
            let day = (i % 28) + 1;
            let overnight = i % 7 == 0;
            vec![
                Some(Value::Text(format!("2025-08-{day:02}"))),
                Some(Value::Integer(2019000 + (i % 500) as i64)),
                Some(Value::Text((if i % 2 == 0 { "책임" } else { "선임" }).to_string())),
                (!overnight).then(|| Value::Integer(480 + (i % 4) as i64 * 30)),
                Some(Value::Text((if overnight { "22:00" } else { "09:00" }).to_string())),
                Some(Value::Text((if overnight { "06:30" } else { "18:00" }).to_string())),
                LABELS[i % LABELS.len()].map(|l| Value::Text(l.to_string())),
            ]
        })
        .collect();
    Table::from_rows(&headers, rows)
}

fn reference_data() -> ReferenceData {
    ReferenceData::empty()
        .with_organization((0..500).map(|i| {
            (
                (2019000 + i).to_string(),
                OrgRecord {
                    name: Some(format!("직원{i}")),
                    position: Some("책임".to_string()),
                    team: Some(format!("{}팀", i % 20)),
                    ..OrgRecord::default()
                },
            )
        }))
        .with_grade_levels([("책임", "Lv.3"), ("선임", "Lv.2")])
}

fn bench_claim_pipeline(c: &mut Criterion) {
    let registry = Registry::builtin();
    let descriptor = registry.get(SourceType::Claim).expect("claim descriptor");
    let transformer = Transformer::for_source(descriptor);
    let raw = generate_claims(20_000);
    let refs = reference_data();

    let mut group = c.benchmark_group("claim_data");

    group.bench_function("transform_20k", |b| {
        b.iter_batched(
            || raw.clone(),
            |table| transformer.transform(table, &refs).expect("transform"),
            BatchSize::LargeInput,
        );
    });

    let transformed = transformer
        .transform(raw.clone(), &refs)
        .expect("transform");
    group.bench_function("insert_20k", |b| {
        b.iter_batched(
            || {
                let dir = TempDir::new().expect("temp dir");
                let gateway = Gateway::new(dir.path().join("bench.db"), true, Default::default());
                (dir, gateway)
            },
            |(dir, mut gateway)| {
                gateway
                    .bulk_insert(&transformed, "claim_data", InsertMode::Append, 5_000, &mut |_| {})
                    .expect("insert");
                drop(gateway);
                drop(dir);
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_claim_pipeline);
criterion_main!(benches);
