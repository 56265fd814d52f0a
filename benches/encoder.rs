#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use graphwire::prelude::*;
use std::sync::Arc;

const N_RECORDS: usize = 200;
const N_SAMPLES: usize = 10;
const SAMPLES: TypeId = 65;

#[derive(Default)]
struct Record {
    id: i64,
    label: String,
    samples: Option<Shared<Vec<i64>>>,
}

impl Transportable for Record {
    const TYPE_ID: TypeId = 64;
}

struct RecordSerializer;

impl ObjectSerializer for RecordSerializer {
    type Target = Record;

    fn write_fields(&self, r: &Record, out: &mut dyn WireOutput, _: i64) -> Result<()> {
        out.put_i64("id", r.id)?;
        out.put_str("label", &r.label)?;
        out.put_container("samples", r.samples.as_ref(), SAMPLES)
    }

    fn read_fields(&self, r: &Shared<Record>, input: &mut dyn WireInput, _: i64) -> Result<()> {
        let id = input.get_i64("id")?;
        let label = input.get_str("label")?;
        let samples = input.get_container("samples", SAMPLES)?;
        let mut r = r.borrow_mut();
        r.id = id;
        r.label = label;
        r.samples = samples;
        Ok(())
    }
}

fn registry() -> Arc<TypeRegistry> {
    TypeRegistry::builder()
        .register(ObjectAdapter::arc(RecordSerializer))
        .register(Arc::new(ListSerializer::<i64>::new(SAMPLES)))
        .build()
        .unwrap()
}

/// Records that share one samples list between each pair.
fn big_graph() -> Obj {
    let mut records: Vec<Option<Obj>> = Vec::with_capacity(N_RECORDS);
    let mut samples = shared((0..N_SAMPLES as i64).collect::<Vec<_>>());
    for i in 0..N_RECORDS {
        if i % 2 == 0 {
            samples = shared((0..N_SAMPLES as i64).map(|s| s * i as i64).collect());
        }
        records.push(Some(Obj::new(Record {
            id: i as i64,
            label: format!("record \"{}\"", i),
            samples: Some(samples.clone()),
        })));
    }
    Obj::new(records)
}

fn bench_enc(c: &mut Criterion, format: WireFormat) {
    let registry = registry();
    let graph = big_graph();
    let len = encode(&registry, format, Some(&graph), 1).unwrap().len();
    c.bench_function(
        &format!("Encoding a {:?} object graph, output size of {} bytes", format, len),
        move |b| b.iter(|| encode(&registry, format, Some(black_box(&graph)), 1).unwrap()),
    );
}

fn bench_enc_text(c: &mut Criterion) { bench_enc(c, WireFormat::Text) }

fn bench_enc_binary(c: &mut Criterion) { bench_enc(c, WireFormat::Binary) }

fn bench_size(c: &mut Criterion) {
    let registry = registry();
    let graph = big_graph();
    let ser = registry.get(graph.type_id().unwrap()).unwrap();
    c.bench_function("Measuring the binary size of an object graph", move |b| {
        b.iter(|| ser.size(black_box(&graph), &registry, 1).unwrap())
    });
}

criterion_group!(benches, bench_enc_text, bench_enc_binary, bench_size);
criterion_main!(benches);
