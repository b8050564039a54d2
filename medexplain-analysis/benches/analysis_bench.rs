// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use medexplain_analysis::{ReadabilityScorer, ResponseAssembler, TermExtractor};

const NOTE: &str = "Patient presents with Hypertension and Hyperlipidemia. \
Prescribed Lisinopril 10mg daily and Atorvastatin 20mg at bedtime. \
History of chronic kidney disease and gastroesophageal reflux. \
Follow up with cardiology in two weeks.";

const REWRITE: &str = "[[Hypertension]] means high blood pressure. \
Take [[Lisinopril 10mg]] once a day. It helps your heart. \
Please call us if you feel dizzy.";

fn bench_extract(c: &mut Criterion) {
    let extractor = TermExtractor::default();
    let mut group = c.benchmark_group("extract");

    for repeat in [1usize, 10, 50].iter() {
        let text = NOTE.repeat(*repeat);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(repeat), &text, |b, text| {
            b.iter(|| extractor.extract(black_box(text)));
        });
    }

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let scorer = ReadabilityScorer::default();

    c.bench_function("score_rewrite", |b| {
        b.iter(|| scorer.score(black_box(REWRITE), 2));
    });
}

fn bench_assemble(c: &mut Criterion) {
    let payload: String = REWRITE
        .split_inclusive(' ')
        .map(|word| {
            format!(
                "{}\n",
                serde_json::json!({ "message": { "content": word }, "done": false })
            )
        })
        .collect();
    let assembler = ResponseAssembler::default();

    c.bench_function("assemble_stream", |b| {
        b.iter(|| assembler.assemble(black_box(&payload)).unwrap());
    });
}

criterion_group!(benches, bench_extract, bench_score, bench_assemble);
criterion_main!(benches);
