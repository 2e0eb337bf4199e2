//! Call stack capture from host functions

use std::cell::RefCell;
use std::rc::Rc;

use super::create_test_runtime;
use esrun::{JsError, JsValue, Runtime, StackFrame};

/// Install a `capture()` global that records the stack at the call site
fn install_capture(runtime: &mut Runtime, depth: usize) -> Rc<RefCell<Vec<StackFrame>>> {
    let captured = Rc::new(RefCell::new(Vec::new()));
    let sink = captured.clone();
    let installed = runtime.set_native("capture", move |interp, _this, _args| {
        *sink.borrow_mut() = interp.capture_call_stack(depth);
        Ok(JsValue::Undefined)
    });
    assert!(installed.is_ok());
    captured
}

const NESTED: &str = "function inner() { capture(); }\nfunction outer() { inner(); }\nouter();";

#[test]
fn test_one_frame_per_active_call() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 0);
    assert!(runtime.run_string(NESTED).is_ok());

    let frames = captured.borrow();
    let names: Vec<&str> = frames.iter().map(|f| f.function_name.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer", ""]);
    let lines: Vec<u32> = frames.iter().map(|f| f.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
    assert!(frames.iter().all(|f| f.source_name == "<eval>"));
}

#[test]
fn test_depth_limits_frames() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 1);
    assert!(runtime.run_string(NESTED).is_ok());

    let frames = captured.borrow();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames.first().map(|f| f.function_name.as_str()), Some("inner"));
}

#[test]
fn test_frame_display() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 0);
    assert!(runtime.run_string(NESTED).is_ok());

    let frames = captured.borrow();
    let rendered: Vec<String> = frames.iter().map(ToString::to_string).collect();
    assert!(rendered.first().is_some_and(|s| s.starts_with("    at inner (<eval>:1:")), "{rendered:?}");
    assert!(rendered.last().is_some_and(|s| s.starts_with("    at <eval>:3:")), "{rendered:?}");
}

#[test]
fn test_method_and_arrow_names() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 0);
    let src = "const obj = { run() { const go = () => capture(); go(); } };\nobj.run();";
    assert!(runtime.run_string(src).is_ok());

    let frames = captured.borrow();
    let names: Vec<&str> = frames.iter().map(|f| f.function_name.as_str()).collect();
    assert_eq!(names, vec!["go", "run", ""]);
}

#[test]
fn test_stack_is_empty_outside_scripts() {
    let runtime = create_test_runtime();
    assert!(runtime.capture_call_stack(0).is_empty());
}

#[test]
fn test_stack_inside_jobs() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 0);
    assert!(runtime.run_string("Promise.resolve().then(function later() { capture(); });").is_ok());

    let frames = captured.borrow();
    assert_eq!(frames.first().map(|f| f.function_name.as_str()), Some("later"));
}

#[test]
fn test_recursion_reports_every_frame() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 0);
    assert!(runtime.run_string("function down(n) { if (n === 0) { capture(); return; } down(n - 1); }\ndown(4);").is_ok());

    let frames = captured.borrow();
    assert_eq!(frames.iter().filter(|f| f.function_name == "down").count(), 5);
}

/// `{"version":3,"sources":["orig.js"],"mappings":";AAUA"}`: generated
/// line 2 maps to line 11 of orig.js
const INLINE_MAP: &str = "data:application/json;base64,eyJ2ZXJzaW9uIjozLCJzb3VyY2VzIjpbIm9yaWcuanMiXSwibWFwcGluZ3MiOiI7QUFVQSJ9";

#[test]
fn test_inline_source_map_translates_frames() {
    let mut runtime = create_test_runtime();
    let src = format!("// generated\nthrow new Error('mapped');\n//# sourceMappingURL={INLINE_MAP}\n");
    let Err(JsError::Exception(exception)) = runtime.run_string(&src) else {
        panic!("expected an exception");
    };
    assert_eq!(exception.message, "Error: mapped");
    let Some(frame) = exception.stack.first() else {
        panic!("no frames captured");
    };
    assert_eq!(frame.source_name, "orig.js");
    assert_eq!((frame.line, frame.column), (11, 1));
    assert!(exception.to_string().contains("at orig.js:11:1"), "{exception}");
}

#[test]
fn test_unmapped_lines_keep_generated_positions() {
    let mut runtime = create_test_runtime();
    let captured = install_capture(&mut runtime, 0);
    let src = format!("capture();\n//# sourceMappingURL={INLINE_MAP}\n");
    assert!(runtime.run_string(&src).is_ok());

    let frames = captured.borrow();
    let first = frames.first().map(|f| (f.source_name.as_str(), f.line));
    assert_eq!(first, Some(("<eval>", 1)));
}
