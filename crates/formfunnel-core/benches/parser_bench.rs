use criterion::{criterion_group, criterion_main, Criterion};
use formfunnel_core::{parse_request_data, ColumnSchema, Payload, TableSchema};
use serde_json::json;

fn parse_lead_bench(c: &mut Criterion) {
    let table = TableSchema::with_default_protection(
        "leads",
        vec![
            ColumnSchema::new("name", "TEXT"),
            ColumnSchema::new("organization", "TEXT"),
            ColumnSchema::new("role", "TEXT"),
            ColumnSchema::new("email", "TEXT"),
            ColumnSchema::new("mailing_list", "INTEGER"),
            ColumnSchema::new("membership_interest", "INTEGER"),
            ColumnSchema::new("message", "TEXT"),
            ColumnSchema::new("verification_token", "TEXT UNIQUE"),
            ColumnSchema::new("autokey", "INTEGER PRIMARY KEY"),
        ],
    );
    let payload: Payload = match json!({
        "name": "Harold",
        "organization": "The Chickpea Coalition",
        "role": "Chickpea Manager",
        "email": "harold@example.org",
        "mailing_list": 1,
        "membership_interest": 0,
        "message": "hello",
        "nutella": "glorious"
    }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };
    c.bench_function("parse_lead", |b| {
        b.iter(|| parse_request_data(&payload, &table));
    });
}

criterion_group!(parser_benches, parse_lead_bench);
criterion_main!(parser_benches);
