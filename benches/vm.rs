//! End-to-end execution benchmarks
//!
//! Run with: cargo bench --bench vm

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use esrun::{Program, Runtime};

const FIB: &str = r#"
function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
fib(20)
"#;

const LOOP_ARITH: &str = r#"
let sum = 0;
for (let i = 0; i < 100000; i++) {
    sum = (sum + i * 3) % 1000003;
}
sum
"#;

const OBJECTS: &str = r#"
const points = [];
for (let i = 0; i < 5000; i++) {
    points.push({ x: i, y: i * 2, label: 'p' + i });
}
let total = 0;
for (const p of points) total += p.x + p.y;
total
"#;

const ARRAY_METHODS: &str = r#"
const data = Array.from({ length: 10000 }, (_, i) => i);
data.filter(n => n % 3 === 0).map(n => n * n).reduce((a, b) => a + b, 0)
"#;

const STRINGS: &str = r#"
const parts = [];
for (let i = 0; i < 2000; i++) parts.push(`item-${i}`);
parts.join(',').split(',').filter(s => s.endsWith('7')).length
"#;

const CLOSURES: &str = r#"
function counter() { let n = 0; return () => ++n; }
const counters = [];
for (let i = 0; i < 1000; i++) counters.push(counter());
let total = 0;
for (const c of counters) { c(); total += c(); }
total
"#;

const CLASSES: &str = r#"
class Vec2 {
    constructor(x, y) { this.x = x; this.y = y; }
    add(o) { return new Vec2(this.x + o.x, this.y + o.y); }
    get length() { return Math.sqrt(this.x * this.x + this.y * this.y); }
}
let v = new Vec2(0, 0);
for (let i = 0; i < 5000; i++) v = v.add(new Vec2(1, 1));
v.length
"#;

const PROMISES: &str = r#"
let resolved = 0;
async function step(i) { await null; resolved += i; }
for (let i = 0; i < 1000; i++) step(i);
Promise.resolve().then(() => resolved)
"#;

const JSON_ROUNDTRIP: &str = r#"
const doc = { users: Array.from({ length: 500 }, (_, i) => ({ id: i, name: 'user' + i, tags: ['a', 'b'] })) };
JSON.parse(JSON.stringify(doc)).users.length
"#;

fn bench_vm_programs(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm/programs");

    let cases = [
        ("fib", FIB),
        ("loop_arith", LOOP_ARITH),
        ("objects", OBJECTS),
        ("array_methods", ARRAY_METHODS),
        ("strings", STRINGS),
        ("closures", CLOSURES),
        ("classes", CLASSES),
        ("promises", PROMISES),
        ("json_roundtrip", JSON_ROUNDTRIP),
    ];

    for (name, source) in cases {
        let Ok(program) = Program::compile("bench.js", source, false) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new("run", name), &program, |b, p| {
            b.iter(|| {
                let mut runtime = Runtime::new();
                let _ = black_box(runtime.run(p));
            });
        });
    }

    group.finish();
}

fn bench_vm_startup(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm/startup");

    group.bench_function("new_runtime", |b| {
        b.iter(|| black_box(Runtime::new()));
    });

    group.bench_function("compile_and_run_small", |b| {
        b.iter(|| {
            let mut runtime = Runtime::new();
            let _ = black_box(runtime.run_string("1 + 2 * 3"));
        });
    });

    group.finish();
}

fn bench_vm_host_calls(c: &mut Criterion) {
    let mut group = c.benchmark_group("vm/host_calls");

    group.bench_function("call_script_function", |b| {
        let mut runtime = Runtime::new();
        let _ = runtime.run_string("function square(x) { return x * x; }");
        let Some(square) = runtime.get("square").ok().flatten().and_then(|v| runtime.assert_function(&v)) else {
            return;
        };
        b.iter(|| {
            let _ = black_box(runtime.call(&square, esrun::JsValue::Undefined, &[esrun::JsValue::from(12)]));
        });
    });

    group.bench_function("script_calls_host", |b| {
        let mut runtime = Runtime::new();
        let _ = runtime.set_function("double", |x: f64| x * 2.0);
        let Ok(program) =
            Program::compile("bench.js", "(() => { let t = 0; for (let i = 0; i < 1000; i++) t += double(i); return t; })()", false)
        else {
            return;
        };
        b.iter(|| {
            let _ = black_box(runtime.run(&program));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_vm_programs, bench_vm_startup, bench_vm_host_calls);
criterion_main!(benches);
