//! Parser benchmarks
//!
//! Run with: cargo bench --bench parser

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use esrun::parser;
use esrun::string_dict::StringDict;

const VARIABLES: &str = r#"
let x = 1;
const y = 2;
var z = 3;
let { a, b: [c, d = 4], ...rest } = source;
"#;

const FUNCTIONS: &str = r#"
function add(a, b) { return a + b; }
const mul = (a, b) => a * b;
async function load(url) {
    const response = await fetchJson(url);
    return response.items.map(item => item.id);
}
function* range(start, end, step = 1) {
    for (let i = start; i < end; i += step) yield i;
}
"#;

const CLASSES: &str = r#"
class Shape {
    #id;
    static count = 0;
    constructor(id) { this.#id = id; Shape.count++; }
    get id() { return this.#id; }
    area() { return 0; }
}
class Circle extends Shape {
    constructor(id, r) { super(id); this.r = r; }
    area() { return Math.PI * this.r ** 2; }
    static unit() { return new Circle(0, 1); }
}
"#;

const CONTROL_FLOW: &str = r#"
outer: for (let i = 0; i < 10; i++) {
    for (const j of [1, 2, 3]) {
        if (i * j > 12) break outer;
        if (j === 2) continue;
        total += i * j;
    }
}
while (queue.length) {
    const next = queue.shift();
    switch (next.kind) {
        case 'a': handleA(next); break;
        case 'b': handleB(next); break;
        default: throw new Error('unknown ' + next.kind);
    }
}
do { n--; } while (n > 0);
try { risky(); } catch ({ message }) { log(message); } finally { done(); }
"#;

const EXPRESSIONS: &str = r#"
const value = a?.b?.[c] ?? (d || e && f);
const tpl = `${first} ${last ?? 'unknown'} (${age + 1})`;
const obj = { a, b: 2, [key]: 3, ...spread, method() { return this.a; }, get g() { return 1; } };
const arr = [1, , 3, ...more];
const re = /^[a-z]+\d*$/gi;
const cond = x > 0 ? 'pos' : x < 0 ? 'neg' : 'zero';
x ??= y ||= z &&= w;
"#;

fn generate_large_source(target_size: usize) -> String {
    let chunks = [VARIABLES, FUNCTIONS, CLASSES, CONTROL_FLOW, EXPRESSIONS];
    let mut source = String::with_capacity(target_size + 1024);
    let mut i = 0;
    while source.len() < target_size {
        // Wrap each chunk in a block so repeated lexical declarations do not collide
        source.push_str("{\n");
        if let Some(chunk) = chunks.get(i % chunks.len()) {
            source.push_str(chunk);
        }
        source.push_str("}\n");
        i += 1;
    }
    source
}

fn nested_expression(depth: usize) -> String {
    let mut source = String::from("x = ");
    for _ in 0..depth {
        source.push_str("(1 + ");
    }
    source.push('1');
    for _ in 0..depth {
        source.push(')');
    }
    source.push(';');
    source
}

fn many_statements(count: usize) -> String {
    (0..count)
        .map(|i| format!("var v{i} = v{} + {i};\n", i.saturating_sub(1)))
        .collect()
}

fn parse_source(source: &str) {
    let mut dict = StringDict::new();
    let result = parser::parse(black_box(source), "bench.js", false, &mut dict);
    let _ = black_box(result);
}

fn bench_parser_individual(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/individual");

    let cases = [
        ("variables", VARIABLES),
        ("functions", FUNCTIONS),
        ("classes", CLASSES),
        ("control_flow", CONTROL_FLOW),
        ("expressions", EXPRESSIONS),
    ];

    for (name, source) in cases {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("bytes", name), source, |b, s| {
            b.iter(|| parse_source(s));
        });
    }

    group.finish();
}

fn bench_parser_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/throughput");

    for size in [1_000, 10_000, 100_000] {
        let source = generate_large_source(size);
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(
            BenchmarkId::new("large_source", format!("{}KB", source.len() / 1024)),
            &source,
            |b, s| b.iter(|| parse_source(s)),
        );
    }

    group.finish();
}

fn bench_parser_expression_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/expression_depth");

    for depth in [10, 50, 100] {
        let source = nested_expression(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &source, |b, s| {
            b.iter(|| parse_source(s));
        });
    }

    group.finish();
}

fn bench_parser_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/statements");

    for count in [100, 1_000, 5_000] {
        let source = many_statements(count);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &source, |b, s| {
            b.iter(|| parse_source(s));
        });
    }

    group.finish();
}

fn bench_string_interning(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser/string_interning");
    let source = generate_large_source(20_000);

    group.bench_function("fresh_dict", |b| {
        b.iter(|| parse_source(&source));
    });

    group.bench_function("reused_dict", |b| {
        let mut dict = StringDict::with_common_strings();
        b.iter(|| {
            let result = parser::parse(black_box(&source), "bench.js", false, &mut dict);
            let _ = black_box(result);
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_parser_individual,
    bench_parser_throughput,
    bench_parser_expression_depth,
    bench_parser_statements,
    bench_string_interning,
);
criterion_main!(benches);
