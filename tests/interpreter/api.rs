//! Host embedding API: globals, the serde bridge, host functions, dynamic
//! objects and callable handles

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;

use serde::{Deserialize, Serialize};

use super::create_test_runtime;
use esrun::{
    CamelCaseFieldNames, DynamicObject, FieldNameMapper, HostArray, JsError, JsValue, Program, Runtime,
    RuntimeOptions, SharedDynamicObject,
};

fn run(runtime: &mut Runtime, source: &str) -> JsValue {
    match runtime.run_string(source) {
        Ok(value) => value,
        Err(err) => panic!("script failed: {err}"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Globals
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_set_and_get_globals() {
    let mut runtime = create_test_runtime();
    assert!(runtime.set("answer", 42).is_ok());
    assert!(runtime.set("greeting", "hi").is_ok());
    assert!(runtime.set("ratio", 0.5).is_ok());
    assert!(runtime.set("flags", vec![true, false]).is_ok());
    assert_eq!(run(&mut runtime, "answer + 1"), JsValue::from(43));
    assert_eq!(run(&mut runtime, "greeting + '!' + ratio + flags.length"), JsValue::from("hi!0.52"));

    run(&mut runtime, "var fromVar = 'v'; let fromLet = 'l'; const fromConst = 'c';");
    assert_eq!(runtime.get("fromVar").ok().flatten(), Some(JsValue::from("v")));
    assert_eq!(runtime.get("fromLet").ok().flatten(), Some(JsValue::from("l")));
    assert_eq!(runtime.get("fromConst").ok().flatten(), Some(JsValue::from("c")));
    assert_eq!(runtime.get("nothingHere").ok().flatten(), None);
}

#[test]
fn test_set_updates_lexical_binding() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "let level = 1; function readLevel() { return level; }");
    assert!(runtime.set("level", 5).is_ok());
    assert_eq!(run(&mut runtime, "readLevel()"), JsValue::from(5));
    assert_eq!(runtime.get("globalThis").ok().flatten().map(|v| v.is_object()), Some(true));
}

#[test]
fn test_get_reports_throwing_getters() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "Object.defineProperty(globalThis, 'broken', { get() { throw new RangeError('no value'); } });");
    let Err(JsError::Exception(exception)) = runtime.get("broken") else {
        panic!("expected the getter's exception");
    };
    assert_eq!(exception.message, "RangeError: no value");
    assert!(matches!(runtime.get("nothingHere"), Ok(None)));
    run(&mut runtime, "let later = 1;");
    assert!(matches!(runtime.get("later"), Ok(Some(_))));
}

#[test]
fn test_set_const_is_rejected() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "const fixed = 1;");
    assert!(matches!(runtime.set("fixed", 2), Err(JsError::TypeError { .. })));
    assert_eq!(runtime.get("fixed").ok().flatten(), Some(JsValue::from(1)));
}

// ═══════════════════════════════════════════════════════════════════════════════
// serde bridge
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Order {
    id: u32,
    customer: String,
    items: Vec<Item>,
    note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Item {
    sku: String,
    qty: u32,
    price: f64,
}

fn sample_order() -> Order {
    Order {
        id: 7,
        customer: "ada".to_string(),
        items: vec![
            Item { sku: "A1".to_string(), qty: 2, price: 1.5 },
            Item { sku: "B2".to_string(), qty: 1, price: 10.0 },
        ],
        note: None,
    }
}

#[test]
fn test_to_value_builds_plain_objects() {
    let mut runtime = create_test_runtime();
    let value = runtime.to_value(&sample_order());
    let Ok(value) = value else {
        panic!("conversion failed");
    };
    assert!(runtime.set("order", value).is_ok());
    assert_eq!(
        run(&mut runtime, "order.items.reduce((sum, i) => sum + i.qty * i.price, 0)"),
        JsValue::from(13)
    );
    assert_eq!(run(&mut runtime, "order.note === null && Array.isArray(order.items)"), JsValue::Bool(true));
    assert_eq!(run(&mut runtime, "Object.keys(order).join()"), JsValue::from("id,customer,items,note"));
}

#[test]
fn test_export_to_reads_script_values() {
    let mut runtime = create_test_runtime();
    let value = run(
        &mut runtime,
        "({ id: 9, customer: 'bob', items: [{ sku: 'Z', qty: 3, price: 0.25 }], note: 'rush', extra: () => 1 })",
    );
    let order: Result<Order, _> = runtime.export_to(&value);
    assert_eq!(
        order.ok(),
        Some(Order {
            id: 9,
            customer: "bob".to_string(),
            items: vec![Item { sku: "Z".to_string(), qty: 3, price: 0.25 }],
            note: Some("rush".to_string()),
        })
    );
}

#[test]
fn test_export_collections() {
    let mut runtime = create_test_runtime();
    let map = run(&mut runtime, "new Map([['a', 1], ['b', 2]])");
    let exported: Result<BTreeMap<String, i64>, _> = runtime.export_to(&map);
    assert_eq!(exported.ok(), Some(BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)])));

    let set = run(&mut runtime, "new Set([3, 1, 3])");
    assert_eq!(runtime.export_to::<Vec<i32>>(&set).ok(), Some(vec![3, 1]));

    let date = run(&mut runtime, "new Date(0)");
    assert_eq!(runtime.export_to::<String>(&date).ok(), Some("1970-01-01T00:00:00.000Z".to_string()));

    let bytes = run(&mut runtime, "new Uint8Array([1, 2, 255])");
    assert_eq!(runtime.export_to::<Vec<u8>>(&bytes).ok(), Some(vec![1, 2, 255]));
}

#[test]
fn test_export_errors() {
    let mut runtime = create_test_runtime();
    let text = run(&mut runtime, "'not a number'");
    assert!(matches!(runtime.export_to::<i32>(&text), Err(JsError::TypeError { .. })));

    let cyclic = run(&mut runtime, "const c = {}; c.c = c; c");
    assert!(matches!(
        runtime.export_to::<serde_json::Value>(&cyclic),
        Err(JsError::TypeError { .. })
    ));
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Config {
    max_items: u32,
    user_name: String,
}

#[test]
fn test_camel_case_field_names() {
    let mut runtime = Runtime::with_options(
        RuntimeOptions::new()
            .console(false)
            .field_name_mapper(CamelCaseFieldNames),
    );
    let config = runtime.to_value(&Config { max_items: 3, user_name: "ada".to_string() });
    let Ok(config) = config else {
        panic!("conversion failed");
    };
    assert!(runtime.set("config", config).is_ok());
    assert_eq!(run(&mut runtime, "config.maxItems + ':' + config.userName"), JsValue::from("3:ada"));
    assert_eq!(run(&mut runtime, "'max_items' in config"), JsValue::Bool(false));

    let back = run(&mut runtime, "({ maxItems: config.maxItems * 2, userName: 'bob' })");
    assert_eq!(
        runtime.export_to::<Config>(&back).ok(),
        Some(Config { max_items: 6, user_name: "bob".to_string() })
    );
}

struct HideSecrets;

impl FieldNameMapper for HideSecrets {
    fn field_name(&self, field: &str) -> Option<String> {
        (field != "secret").then(|| field.to_string())
    }

    fn host_name(&self, property: &str) -> String {
        property.to_string()
    }
}

#[derive(Serialize)]
struct Account {
    login: String,
    secret: String,
}

#[test]
fn test_mapper_hides_fields() {
    let mut runtime = create_test_runtime();
    runtime.set_field_name_mapper(Some(std::rc::Rc::new(HideSecrets)));
    let account = runtime.to_value(&Account { login: "root".to_string(), secret: "hunter2".to_string() });
    let Ok(account) = account else {
        panic!("conversion failed");
    };
    assert!(runtime.set("account", account).is_ok());
    assert_eq!(run(&mut runtime, "Object.keys(account).join()"), JsValue::from("login"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Host functions
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_typed_host_functions() {
    let mut runtime = create_test_runtime();
    assert!(runtime.set_function("add", |a: f64, b: f64| a + b).is_ok());
    assert!(runtime.set_function("shout", |s: String| s.to_uppercase()).is_ok());
    assert!(runtime.set_function("pair", |n: i32| (n, n * 2)).is_ok());
    assert!(runtime.set_function("total", |items: Vec<Item>| items.iter().map(|i| f64::from(i.qty) * i.price).sum::<f64>()).is_ok());

    assert_eq!(run(&mut runtime, "add(2, 3)"), JsValue::from(5));
    assert_eq!(run(&mut runtime, "add.length"), JsValue::from(2));
    assert_eq!(run(&mut runtime, "add.name"), JsValue::from("add"));
    assert_eq!(run(&mut runtime, "shout('hey')"), JsValue::from("HEY"));
    assert_eq!(run(&mut runtime, "pair(4).join()"), JsValue::from("4,8"));
    assert_eq!(run(&mut runtime, "total([{ sku: 'a', qty: 2, price: 2.5 }])"), JsValue::from(5));
}

#[test]
fn test_missing_arguments_are_none() {
    let mut runtime = create_test_runtime();
    assert!(runtime.set_function("greet", |name: Option<String>| format!("hello {}", name.unwrap_or_else(|| "anon".to_string()))).is_ok());
    assert_eq!(run(&mut runtime, "greet()"), JsValue::from("hello anon"));
    assert_eq!(run(&mut runtime, "greet('bo')"), JsValue::from("hello bo"));
}

#[test]
fn test_bad_argument_is_type_error() {
    let mut runtime = create_test_runtime();
    assert!(runtime.set_function("double", |x: f64| x * 2.0).is_ok());
    assert_eq!(
        run(&mut runtime, "try { double('abc'); } catch (e) { e instanceof TypeError; }"),
        JsValue::Bool(true)
    );
}

#[test]
fn test_host_errors() {
    let mut runtime = create_test_runtime();
    let failing = |path: String| -> Result<String, String> { Err(format!("cannot open {path}")) };
    assert!(runtime.set_function("readFile", failing).is_ok());

    assert_eq!(
        run(&mut runtime, "try { readFile('/x'); } catch (e) { [e.name, e.message, e.value, e instanceof Error].join('|'); }"),
        JsValue::from("HostError|cannot open /x|cannot open /x|true")
    );

    let uncaught = runtime.run_string("readFile('/y')");
    let Err(JsError::Exception(exc)) = uncaught else {
        panic!("expected an exception");
    };
    assert_eq!(exc.message, "HostError: cannot open /y");
}

#[test]
fn test_js_errors_from_host_pass_through() {
    let mut runtime = create_test_runtime();
    let check = |n: f64| -> Result<f64, JsError> {
        if n < 0.0 {
            Err(JsError::range_error("negative input"))
        } else {
            Ok(n.sqrt())
        }
    };
    assert!(runtime.set_function("checkedSqrt", check).is_ok());
    assert_eq!(run(&mut runtime, "checkedSqrt(9)"), JsValue::from(3));
    assert_eq!(
        run(&mut runtime, "try { checkedSqrt(-1); } catch (e) { e.constructor === RangeError && e.message; }"),
        JsValue::from("negative input")
    );
}

#[test]
fn test_native_sees_this_and_arguments() {
    let mut runtime = create_test_runtime();
    let installed = runtime.set_native("countArgs", |_interp, this, args| {
        let tagged = this.is_object();
        Ok(JsValue::from(format!("{}:{tagged}", args.len())))
    });
    assert!(installed.is_ok());
    assert_eq!(run(&mut runtime, "countArgs(1, 2, 3).split(':')[0]"), JsValue::from("3"));
    assert_eq!(run(&mut runtime, "({ m: countArgs }).m()"), JsValue::from("0:true"));
}

#[test]
fn test_new_errors_for_scripts() {
    let mut runtime = create_test_runtime();
    let type_error = runtime.new_type_error("wrong shape");
    let host_error = runtime.new_host_error("socket closed");
    assert!(runtime.set("typeErr", type_error).is_ok());
    assert!(runtime.set("hostErr", host_error).is_ok());
    assert_eq!(
        run(&mut runtime, "typeErr instanceof TypeError && typeErr.message"),
        JsValue::from("wrong shape")
    );
    assert_eq!(
        run(&mut runtime, "hostErr.name + ':' + hostErr.value"),
        JsValue::from("HostError:socket closed")
    );    assert_eq!(
        run(&mut runtime, "hostErr instanceof HostError && hostErr instanceof Error && String(hostErr)"),
        JsValue::from("HostError: socket closed")
    );
    assert_eq!(
        run(&mut runtime, "Object.keys(hostErr).length + ':' + Object.getOwnPropertyDescriptor(hostErr, 'value').enumerable"),
        JsValue::from("0:false")
    );
}

#[test]
fn test_new_object_and_array() {
    let mut runtime = create_test_runtime();
    let obj = runtime.new_object();
    let arr = runtime.new_array(vec![JsValue::from(1), JsValue::from("two")]);
    assert!(runtime.set("hostObj", JsValue::Object(obj.clone())).is_ok());
    assert!(runtime.set("hostArr", JsValue::Object(arr)).is_ok());
    run(&mut runtime, "hostObj.filled = hostArr.length;");
    assert_eq!(run(&mut runtime, "Array.isArray(hostArr) && hostArr[1]"), JsValue::from("two"));
    assert_eq!(
        obj.borrow().get_own_value(&esrun::PropertyKey::from("filled")),
        Some(JsValue::from(2))
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Callables
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_call_script_function() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "function scale(factor) { return this.base * factor; }");
    let Some(scale) = runtime.get("scale").ok().flatten().and_then(|v| runtime.assert_function(&v)) else {
        panic!("scale is not callable");
    };
    let this = run(&mut runtime, "({ base: 10 })");
    assert_eq!(runtime.call(&scale, this, &[JsValue::from(4)]).ok(), Some(JsValue::from(40)));
    assert!(scale.value().is_callable());
}

#[test]
fn test_call_propagates_exceptions() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "var boom = () => { throw new Error('inside'); };");
    let Some(boom) = runtime.get("boom").ok().flatten().and_then(|v| runtime.assert_function(&v)) else {
        panic!("boom is not callable");
    };
    let result = runtime.call(&boom, JsValue::Undefined, &[]);
    assert!(matches!(result, Err(JsError::Exception(ref e)) if e.message == "Error: inside"));
}

#[test]
fn test_call_drains_microtasks() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "var seen = []; function later(v) { Promise.resolve(v).then(x => seen.push(x)); }");
    let Some(later) = runtime.get("later").ok().flatten().and_then(|v| runtime.assert_function(&v)) else {
        panic!("later is not callable");
    };
    assert!(runtime.call(&later, JsValue::Undefined, &[JsValue::from("x")]).is_ok());
    assert_eq!(run(&mut runtime, "seen.join()"), JsValue::from("x"));
}

#[derive(Debug, PartialEq, Deserialize)]
struct Point {
    x: f64,
    y: f64,
}

#[test]
fn test_construct_class() {
    let mut runtime = create_test_runtime();
    run(&mut runtime, "class Point { constructor(x, y) { this.x = x; this.y = y; } }");
    let Some(point) = runtime.get("Point").ok().flatten().and_then(|v| runtime.assert_constructor(&v)) else {
        panic!("Point is not a constructor");
    };
    let made = runtime.construct(&point, &[JsValue::from(1), JsValue::from(2.5)]);
    let Ok(made) = made else {
        panic!("construct failed");
    };
    assert_eq!(runtime.export_to::<Point>(&made).ok(), Some(Point { x: 1.0, y: 2.5 }));
}

#[test]
fn test_assert_rejects_wrong_kinds() {
    let mut runtime = create_test_runtime();
    let arrow = run(&mut runtime, "() => 1");
    let number = JsValue::from(3);
    assert!(runtime.assert_function(&arrow).is_some());
    assert!(runtime.assert_constructor(&arrow).is_none());
    assert!(runtime.assert_function(&number).is_none());
    let class = run(&mut runtime, "(class {})");
    assert!(runtime.assert_constructor(&class).is_some());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Programs
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_program_runs_in_many_runtimes() {
    let program = Program::compile("shared.js", "var hits = (typeof hits === 'number' ? hits : 0) + 1; hits", false);
    let Ok(program) = program else {
        panic!("compile failed");
    };
    let mut first = create_test_runtime();
    let mut second = create_test_runtime();
    assert_eq!(first.run(&program).ok(), Some(JsValue::from(1)));
    assert_eq!(first.run(&program).ok(), Some(JsValue::from(2)));
    assert_eq!(second.run(&program).ok(), Some(JsValue::from(1)));
}

#[test]
fn test_program_shared_across_threads() {
    let program = Program::compile("fib.js", "function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(15)", true);
    let Ok(program) = program else {
        panic!("compile failed");
    };
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let program = Arc::clone(&program);
            thread::spawn(move || {
                let mut runtime = Runtime::new();
                runtime.run(&program).ok().and_then(|v| v.as_number())
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().ok().flatten(), Some(610.0));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Dynamic objects
// ═══════════════════════════════════════════════════════════════════════════════

/// Key/value store that rejects writes to keys starting with `ro_`
#[derive(Default)]
struct Store {
    values: RefCell<BTreeMap<String, JsValue>>,
}

impl DynamicObject for Store {
    fn get(&self, key: &str) -> Option<JsValue> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: JsValue) -> bool {
        if key.starts_with("ro_") {
            return false;
        }
        self.values.borrow_mut().insert(key.to_string(), value);
        true
    }

    fn has(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    fn delete(&self, key: &str) -> bool {
        self.values.borrow_mut().remove(key);
        true
    }

    fn keys(&self) -> Vec<String> {
        self.values.borrow().keys().cloned().collect()
    }
}

#[test]
fn test_dynamic_object() {
    let mut runtime = create_test_runtime();
    let store = runtime.new_dynamic_object(Store::default());
    assert!(runtime.set("store", store).is_ok());
    run(&mut runtime, "store.b = 2; store.a = 1; store.c = 3; delete store.c;");
    assert_eq!(run(&mut runtime, "Object.keys(store).join()"), JsValue::from("a,b"));
    assert_eq!(run(&mut runtime, "store.a + store.b"), JsValue::from(3));
    assert_eq!(run(&mut runtime, "'a' in store && !('c' in store)"), JsValue::Bool(true));
    assert_eq!(run(&mut runtime, "JSON.stringify(store)"), JsValue::from("{\"a\":1,\"b\":2}"));
}

#[test]
fn test_dynamic_object_rejects_writes() {
    let mut runtime = create_test_runtime();
    let store = runtime.new_dynamic_object(Store::default());
    assert!(runtime.set("store", store).is_ok());
    assert_eq!(run(&mut runtime, "store.ro_x = 1; store.ro_x"), JsValue::Undefined);
    assert!(runtime.run_string("'use strict'; store.ro_y = 1;").is_err_and(|e| e.to_string().contains("TypeError")));
}

#[test]
fn test_dynamic_object_symbol_keys_are_ordinary() {
    let mut runtime = create_test_runtime();
    let store = runtime.new_dynamic_object(Store::default());
    assert!(runtime.set("store", store).is_ok());
    assert_eq!(
        run(&mut runtime, "const tag = Symbol('t'); store[tag] = 'sym'; store[tag] + Object.keys(store).length"),
        JsValue::from("sym0")
    );
}

#[test]
fn test_host_array_is_shared() {
    let mut runtime = create_test_runtime();
    let numbers = HostArray::new(vec![1.0, 2.0, 3.0]);
    let value = runtime.new_dynamic_array(numbers.clone());
    assert!(runtime.set("nums", value).is_ok());

    assert_eq!(run(&mut runtime, "Array.isArray(nums) && nums.length"), JsValue::from(3));
    assert_eq!(run(&mut runtime, "nums.map(x => x * 2).join()"), JsValue::from("2,4,6"));
    run(&mut runtime, "nums.push(4); nums[0] = 10;");
    assert_eq!(numbers.to_vec(), vec![10.0, 2.0, 3.0, 4.0]);

    numbers.push(5.0);
    assert_eq!(run(&mut runtime, "nums.length + ':' + nums[4]"), JsValue::from("5:5"));

    run(&mut runtime, "nums.length = 2;");
    assert_eq!(numbers.to_vec(), vec![10.0, 2.0]);
    assert_eq!(run(&mut runtime, "nums[1] = 'two'; nums[1]"), JsValue::from(2));
}

/// Thread-safe store shared by several runtimes
#[derive(Default)]
struct SharedStore {
    values: Mutex<BTreeMap<String, serde_json::Value>>,
}

impl SharedDynamicObject for SharedStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: serde_json::Value) -> bool {
        match self.values.lock() {
            Ok(mut values) => {
                values.insert(key.to_string(), value);
                true
            }
            Err(_) => false,
        }
    }

    fn has(&self, key: &str) -> bool {
        self.values.lock().is_ok_and(|v| v.contains_key(key))
    }

    fn delete(&self, key: &str) -> bool {
        self.values.lock().is_ok_and(|mut v| v.remove(key).is_some())
    }

    fn keys(&self) -> Vec<String> {
        self.values.lock().map(|v| v.keys().cloned().collect()).unwrap_or_default()
    }
}

#[test]
fn test_shared_dynamic_object_across_runtimes() {
    let store = Arc::new(SharedStore::default());

    let mut writer = create_test_runtime();
    let handle = writer.new_shared_dynamic_object(Arc::clone(&store));
    assert!(writer.set("shared", handle).is_ok());
    run(&mut writer, "shared.config = { retries: 3, hosts: ['a', 'b'] };");

    let mut reader = create_test_runtime();
    let handle = reader.new_shared_dynamic_object(Arc::clone(&store));
    assert!(reader.set("shared", handle).is_ok());
    assert_eq!(
        run(&mut reader, "shared.config.retries + shared.config.hosts.length"),
        JsValue::from(5)
    );
    run(&mut reader, "shared.config.retries = 9;");
    assert_eq!(run(&mut writer, "shared.config.retries"), JsValue::from(3));
}

#[test]
fn test_shared_dynamic_object_across_threads() {
    let store = Arc::new(SharedStore::default());
    let workers: Vec<_> = (0..3)
        .map(|i| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let mut runtime = Runtime::new();
                let handle = runtime.new_shared_dynamic_object(store);
                runtime.set("shared", handle).is_ok()
                    && runtime.run_string(&format!("shared.worker{i} = {i} * 10;")).is_ok()
            })
        })
        .collect();
    for worker in workers {
        assert_eq!(worker.join().ok(), Some(true));
    }
    let keys = store.keys();
    assert_eq!(keys, vec!["worker0", "worker1", "worker2"]);
    assert_eq!(store.get("worker2"), Some(serde_json::json!(20)));
}
