//! Console built-in
//!
//! Every method formats its arguments and hands the line to the runtime's
//! [`ConsoleProvider`](crate::platform::ConsoleProvider). Formatting never
//! runs script code: objects are rendered from their own data properties,
//! and accessors show up as `[Getter]`.

use crate::error::JsError;
use crate::number;
use crate::object::{JsObjectRef, ObjectKind, PropertyValue};
use crate::platform::ConsoleLevel;
use crate::string::JsString;
use crate::value::{JsValue, PropertyKey};

use super::arg;
use super::date;
use super::promise::{PromiseStatus, promise_state};
use crate::interpreter::Interpreter;
use crate::interpreter::realm::Intrinsic;

/// Nesting shown before objects collapse to `[Object]`
const MAX_DEPTH: usize = 2;
/// Entries shown per object before `... n more items`
const MAX_ITEMS: usize = 100;

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::Console).is_some() {
        return;
    }
    let console = interp.create_object();
    interp.register_method(&console, "log", console_log, 0);
    interp.register_method(&console, "info", console_info, 0);
    interp.register_method(&console, "debug", console_debug, 0);
    interp.register_method(&console, "warn", console_warn, 0);
    interp.register_method(&console, "error", console_error, 0);
    interp.register_method(&console, "trace", console_trace, 0);
    interp.register_method(&console, "dir", console_dir, 0);
    interp.register_method(&console, "assert", console_assert, 0);
    interp.register_method(&console, "clear", console_clear, 0);
    interp.register_method(&console, "count", console_count, 0);
    interp.register_method(&console, "countReset", console_count_reset, 0);
    interp.register_method(&console, "time", console_time, 0);
    interp.register_method(&console, "timeEnd", console_time_end, 0);
    interp.register_method(&console, "timeLog", console_time_log, 0);
    super::set_to_string_tag(&console, "console");
    interp.realm.set(Intrinsic::Console, console);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Output methods
// ═══════════════════════════════════════════════════════════════════════════════

fn emit(interp: &mut Interpreter, level: ConsoleLevel, args: &[JsValue]) -> Result<JsValue, JsError> {
    let line = format_args(interp, args)?;
    interp.console.write(level, &line);
    Ok(JsValue::Undefined)
}

/// console.log(...data)
fn console_log(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    emit(interp, ConsoleLevel::Log, args)
}

fn console_info(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    emit(interp, ConsoleLevel::Info, args)
}

fn console_debug(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    emit(interp, ConsoleLevel::Debug, args)
}

fn console_warn(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    emit(interp, ConsoleLevel::Warn, args)
}

fn console_error(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    emit(interp, ConsoleLevel::Error, args)
}

/// console.trace(...data): the message followed by the current call stack
fn console_trace(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let message = format_args(interp, args)?;
    let mut out = if message.is_empty() {
        "Trace".to_string()
    } else {
        format!("Trace: {message}")
    };
    for frame in interp.capture_call_stack(0) {
        let name = if frame.function_name.is_empty() { "<anonymous>" } else { &frame.function_name };
        out.push_str(&format!(
            "\n    at {name} ({}:{}:{})",
            frame.source_name, frame.line, frame.column
        ));
    }
    interp.console.write(ConsoleLevel::Debug, &out);
    Ok(JsValue::Undefined)
}

/// console.dir(item): the inspected form even for strings
fn console_dir(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let line = inspect(&arg(args, 0));
    interp.console.write(ConsoleLevel::Log, &line);
    Ok(JsValue::Undefined)
}

/// console.assert(condition, ...data)
fn console_assert(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if arg(args, 0).to_boolean() {
        return Ok(JsValue::Undefined);
    }
    let rest = args.get(1..).unwrap_or_default();
    let message = format_args(interp, rest)?;
    let line = if message.is_empty() {
        "Assertion failed".to_string()
    } else {
        format!("Assertion failed: {message}")
    };
    interp.console.write(ConsoleLevel::Error, &line);
    Ok(JsValue::Undefined)
}

fn console_clear(interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    interp.console.clear();
    Ok(JsValue::Undefined)
}

/// Label argument, `"default"` when missing
fn label(interp: &mut Interpreter, args: &[JsValue]) -> Result<String, JsError> {
    match args.first() {
        None | Some(JsValue::Undefined) => Ok("default".to_string()),
        Some(v) => Ok(interp.to_string(v)?.to_std_string()),
    }
}

/// console.count(label)
fn console_count(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let label = label(interp, args)?;
    let count = interp.console_counts.entry(label.clone()).or_insert(0);
    *count += 1;
    let line = format!("{label}: {count}");
    interp.console.write(ConsoleLevel::Info, &line);
    Ok(JsValue::Undefined)
}

fn console_count_reset(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let label = label(interp, args)?;
    match interp.console_counts.get_mut(&label) {
        Some(count) => *count = 0,
        None => interp
            .console
            .write(ConsoleLevel::Warn, &format!("Count for '{label}' does not exist")),
    }
    Ok(JsValue::Undefined)
}

/// console.time(label)
fn console_time(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let label = label(interp, args)?;
    if interp.console_timers.contains_key(&label) {
        interp
            .console
            .write(ConsoleLevel::Warn, &format!("Timer '{label}' already exists"));
        return Ok(JsValue::Undefined);
    }
    let start = interp.time.start_timer();
    interp.console_timers.insert(label, start);
    Ok(JsValue::Undefined)
}

fn elapsed_line(interp: &mut Interpreter, label: &str, start: u64, extra: &[JsValue]) -> Result<String, JsError> {
    let elapsed = interp.time.elapsed_millis(start);
    let mut line = format!("{label}: {elapsed}ms");
    if !extra.is_empty() {
        line.push(' ');
        line.push_str(&format_args(interp, extra)?);
    }
    Ok(line)
}

/// console.timeEnd(label)
fn console_time_end(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let label = label(interp, args)?;
    match interp.console_timers.remove(&label) {
        Some(start) => {
            let line = elapsed_line(interp, &label, start, &[])?;
            interp.console.write(ConsoleLevel::Info, &line);
        }
        None => interp
            .console
            .write(ConsoleLevel::Warn, &format!("Timer '{label}' does not exist")),
    }
    Ok(JsValue::Undefined)
}

/// console.timeLog(label, ...data)
fn console_time_log(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let label = label(interp, args)?;
    match interp.console_timers.get(&label).copied() {
        Some(start) => {
            let extra = args.get(1..).unwrap_or_default();
            let line = elapsed_line(interp, &label, start, extra)?;
            interp.console.write(ConsoleLevel::Info, &line);
        }
        None => interp
            .console
            .write(ConsoleLevel::Warn, &format!("Timer '{label}' does not exist")),
    }
    Ok(JsValue::Undefined)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Formatting
// ═══════════════════════════════════════════════════════════════════════════════

/// Join arguments with spaces, applying `%s %d %i %f %o %O %j %c %%`
/// directives when the first argument is a string
pub fn format_args(interp: &mut Interpreter, args: &[JsValue]) -> Result<String, JsError> {
    let mut out = String::new();
    let mut rest = args.iter();
    let mut need_space = false;
    if let Some(JsValue::String(template)) = args.first() {
        rest.next();
        need_space = true;
        let template = template.to_std_string();
        let mut chars = template.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            let Some(&directive) = chars.peek() else {
                out.push('%');
                break;
            };
            let piece = match directive {
                '%' => Some("%".to_string()),
                's' | 'd' | 'i' | 'f' | 'o' | 'O' | 'j' | 'c' => match rest.next() {
                    Some(value) => Some(substitute(interp, directive, value)?),
                    None => None,
                },
                _ => None,
            };
            match piece {
                Some(text) => {
                    chars.next();
                    out.push_str(&text);
                }
                None => out.push('%'),
            }
        }
    }
    for value in rest {
        if need_space {
            out.push(' ');
        }
        need_space = true;
        match value {
            JsValue::String(s) => out.push_str(&s.to_std_string()),
            other => out.push_str(&inspect(other)),
        }
    }
    Ok(out)
}

fn substitute(interp: &mut Interpreter, directive: char, value: &JsValue) -> Result<String, JsError> {
    Ok(match directive {
        's' => match value {
            JsValue::String(s) => s.to_std_string(),
            JsValue::Object(_) => inspect(value),
            other => interp.to_string(other)?.to_std_string(),
        },
        'd' | 'i' => {
            if value.is_object() {
                "NaN".to_string()
            } else {
                let n = interp.to_number(value)?;
                let n = if directive == 'i' { n.trunc() } else { n };
                number::number_to_string(n)
            }
        }
        'f' => {
            if value.is_object() {
                "NaN".to_string()
            } else {
                number::number_to_string(interp.to_number(value)?)
            }
        }
        'j' => match super::json::stringify(interp, value, &JsValue::Undefined, &JsValue::Undefined) {
            Ok(Some(s)) => s.to_std_string(),
            Ok(None) => "undefined".to_string(),
            Err(_) => "[Circular]".to_string(),
        },
        'c' => String::new(),
        _ => inspect(value),
    })
}

/// Render a value the way `console.log` shows nested values
pub fn inspect(value: &JsValue) -> String {
    let mut seen = Vec::new();
    inspect_value(value, 0, &mut seen)
}

fn quote(s: &JsString) -> String {
    let mut out = String::from("'");
    for c in s.to_std_string().chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn format_number(n: f64) -> String {
    if n == 0.0 && n.is_sign_negative() {
        "-0".to_string()
    } else {
        number::number_to_string(n)
    }
}

fn format_key(key: &PropertyKey) -> String {
    match key {
        PropertyKey::Symbol(sym) => format!("[{}]", symbol_text(sym.description())),
        _ => {
            let text = key.to_string();
            let mut chars = text.chars();
            let identifier = chars
                .next()
                .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            if identifier || key.as_index().is_some() {
                text
            } else {
                quote(&JsString::from(text.as_str()))
            }
        }
    }
}

fn symbol_text(description: Option<&JsString>) -> String {
    match description {
        Some(d) => format!("Symbol({d})"),
        None => "Symbol()".to_string(),
    }
}

fn inspect_value(value: &JsValue, depth: usize, seen: &mut Vec<usize>) -> String {
    match value {
        JsValue::Undefined => "undefined".to_string(),
        JsValue::Null => "null".to_string(),
        JsValue::Bool(b) => b.to_string(),
        JsValue::Int(i) => i.to_string(),
        JsValue::Float(f) => format_number(*f),
        JsValue::String(s) if depth == 0 => s.to_std_string(),
        JsValue::String(s) => quote(s),
        JsValue::Symbol(sym) => symbol_text(sym.description()),
        JsValue::Object(obj) => {
            let id = obj.id();
            if seen.contains(&id) {
                return "[Circular]".to_string();
            }
            seen.push(id);
            let text = inspect_object(obj, depth, seen);
            seen.pop();
            text
        }
    }
}

/// Own data property visible without running code
fn own_data(obj: &JsObjectRef, key: &str) -> Option<JsValue> {
    obj.borrow()
        .get_own(&PropertyKey::from(key))
        .and_then(|p| p.data_value().cloned())
}

/// Data property along the prototype chain
fn inherited_data(obj: &JsObjectRef, key: &str) -> Option<JsValue> {
    let mut current = Some(obj.clone());
    while let Some(o) = current {
        if let Some(p) = o.borrow().get_own(&PropertyKey::from(key)) {
            return p.data_value().cloned();
        }
        current = o.borrow().prototype.clone();
    }
    None
}

fn function_label(obj: &JsObjectRef) -> String {
    match own_data(obj, "name") {
        Some(JsValue::String(name)) if !name.is_empty() => format!("[Function: {name}]"),
        _ => "[Function (anonymous)]".to_string(),
    }
}

/// Enumerable own string-keyed and symbol-keyed properties
fn own_entries(obj: &JsObjectRef) -> Vec<(PropertyKey, Result<JsValue, &'static str>)> {
    obj.borrow()
        .properties
        .iter()
        .filter(|(_, p)| p.attrs.enumerable())
        .map(|(k, p)| {
            let value = match &p.value {
                PropertyValue::Data(v) => Ok(v.clone()),
                PropertyValue::Accessor { get: Some(_), set: Some(_) } => Err("[Getter/Setter]"),
                PropertyValue::Accessor { get: Some(_), set: None } => Err("[Getter]"),
                PropertyValue::Accessor { .. } => Err("[Setter]"),
            };
            (k.clone(), value)
        })
        .collect()
}

fn render_entries(
    entries: Vec<(PropertyKey, Result<JsValue, &'static str>)>,
    depth: usize,
    seen: &mut Vec<usize>,
) -> Vec<String> {
    entries
        .into_iter()
        .map(|(k, v)| {
            let shown = match v {
                Ok(v) => inspect_value(&v, depth + 1, seen),
                Err(label) => label.to_string(),
            };
            format!("{}: {shown}", format_key(&k))
        })
        .collect()
}

/// `{ a, b }` with a prefix such as `Map(2)` or `[Array]`
fn braces(prefix: &str, open: char, close: char, items: &[String]) -> String {
    let body = if items.is_empty() {
        format!("{open}{close}")
    } else {
        format!("{open} {} {close}", items.join(", "))
    };
    if prefix.is_empty() { body } else { format!("{prefix} {body}") }
}

fn truncated(mut items: Vec<String>, total: usize) -> Vec<String> {
    if total > MAX_ITEMS {
        items.push(format!("... {} more items", total - MAX_ITEMS));
    }
    items
}

fn inspect_object(obj: &JsObjectRef, depth: usize, seen: &mut Vec<usize>) -> String {
    enum Shape {
        Plain,
        Array(Vec<JsValue>, usize),
        Function,
        Error,
        Date(f64),
        RegExp(String),
        Map(Vec<(JsValue, JsValue)>),
        Set(Vec<JsValue>),
        Promise,
        Boxed(String),
        Typed(&'static str, Vec<f64>),
        Buffer(usize),
        Opaque(&'static str),
    }

    let shape = {
        let o = obj.borrow();
        match &o.kind {
            ObjectKind::Array(state) => Shape::Array(
                o.elements.iter().take(MAX_ITEMS).cloned().collect(),
                state.length as usize,
            ),
            ObjectKind::Function(_) => Shape::Function,
            ObjectKind::Error => Shape::Error,
            ObjectKind::Date(t) => Shape::Date(*t),
            ObjectKind::RegExp(r) => Shape::RegExp(format!("/{}/{}", r.source, r.flags)),
            ObjectKind::Map(m) => Shape::Map(m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
            ObjectKind::Set(m) => Shape::Set(m.iter().map(|(k, _)| k.clone()).collect()),
            ObjectKind::Promise(_) => Shape::Promise,
            ObjectKind::Number(n) => Shape::Boxed(format!("[Number: {}]", format_number(*n))),
            ObjectKind::Boolean(b) => Shape::Boxed(format!("[Boolean: {b}]")),
            ObjectKind::String(s) => Shape::Boxed(format!("[String: {}]", quote(s))),
            ObjectKind::Symbol(sym) => Shape::Boxed(format!("[Symbol: {}]", symbol_text(sym.description()))),
            ObjectKind::TypedArray(ta) => Shape::Typed(
                ta.kind.name(),
                (0..ta.length.min(MAX_ITEMS)).filter_map(|i| ta.read(i)).collect(),
            ),
            ObjectKind::ArrayBuffer(b) => Shape::Buffer(b.byte_length()),
            ObjectKind::WeakMap(_) => Shape::Opaque("WeakMap { <items unknown> }"),
            ObjectKind::WeakSet(_) => Shape::Opaque("WeakSet { <items unknown> }"),
            ObjectKind::Proxy(_) => Shape::Opaque("Proxy {}"),
            ObjectKind::Generator(_) => Shape::Opaque("Object [Generator] {}"),
            ObjectKind::AsyncGenerator(_) => Shape::Opaque("Object [AsyncGenerator] {}"),
            _ => Shape::Plain,
        }
    };

    let nested = depth > MAX_DEPTH;
    match shape {
        Shape::Function => function_label(obj),
        Shape::Date(t) if t.is_nan() => "Invalid Date".to_string(),
        Shape::Date(t) => date::format_iso(t),
        Shape::RegExp(text) | Shape::Boxed(text) => text,
        Shape::Opaque(text) => text.to_string(),
        Shape::Buffer(len) => format!("ArrayBuffer {{ byteLength: {len} }}"),
        Shape::Error => {
            let stack = own_data(obj, "stack");
            match stack {
                Some(JsValue::String(s)) => s.to_std_string(),
                _ => {
                    let name = inherited_data(obj, "name").map_or_else(|| "Error".to_string(), |v| text_of(&v));
                    match inherited_data(obj, "message").map(|v| text_of(&v)) {
                        Some(m) if !m.is_empty() => format!("{name}: {m}"),
                        _ => name,
                    }
                }
            }
        }
        Shape::Array(_, len) if nested => format!("[Array({len})]"),
        Shape::Array(elements, len) => {
            let mut items: Vec<String> = elements.iter().map(|v| inspect_value(v, depth + 1, seen)).collect();
            let holes = len.min(MAX_ITEMS).saturating_sub(items.len());
            if holes > 0 {
                items.push(format!("<{holes} empty items>"));
            }
            let mut items = truncated(items, len);
            let extra: Vec<_> = own_entries(obj);
            items.extend(render_entries(extra, depth, seen));
            braces("", '[', ']', &items)
        }
        Shape::Typed(name, values) => {
            let len = crate::interpreter::builtins::typed_array::element_count(&obj.borrow());
            let items: Vec<String> = values.into_iter().map(format_number).collect();
            braces(&format!("{name}({len})"), '[', ']', &truncated(items, len))
        }
        Shape::Map(_) | Shape::Set(_) | Shape::Plain | Shape::Promise if nested => "[Object]".to_string(),
        Shape::Map(entries) => {
            let total = entries.len();
            let items: Vec<String> = entries
                .iter()
                .take(MAX_ITEMS)
                .map(|(k, v)| format!("{} => {}", inspect_value(k, depth + 1, seen), inspect_value(v, depth + 1, seen)))
                .collect();
            braces(&format!("Map({total})"), '{', '}', &truncated(items, total))
        }
        Shape::Set(values) => {
            let total = values.len();
            let items: Vec<String> = values.iter().take(MAX_ITEMS).map(|v| inspect_value(v, depth + 1, seen)).collect();
            braces(&format!("Set({total})"), '{', '}', &truncated(items, total))
        }
        Shape::Promise => {
            let inner = match promise_state(obj) {
                Some((PromiseStatus::Fulfilled, v)) => inspect_value(&v, depth + 1, seen),
                Some((PromiseStatus::Rejected, v)) => format!("<rejected> {}", inspect_value(&v, depth + 1, seen)),
                _ => "<pending>".to_string(),
            };
            format!("Promise {{ {inner} }}")
        }
        Shape::Plain => {
            let entries = own_entries(obj);
            let total = entries.len();
            let items = render_entries(entries.into_iter().take(MAX_ITEMS).collect(), depth, seen);
            let prefix = match obj.borrow().prototype.as_ref() {
                None => "[Object: null prototype]".to_string(),
                Some(p) => match inherited_data(p, "constructor") {
                    Some(JsValue::Object(c)) => match own_data(&c, "name") {
                        Some(JsValue::String(n)) if n != "Object" && !n.is_empty() => n.to_std_string(),
                        _ => String::new(),
                    },
                    _ => String::new(),
                },
            };
            braces(&prefix, '{', '}', &truncated(items, total))
        }
    }
}

fn text_of(value: &JsValue) -> String {
    match value {
        JsValue::String(s) => s.to_std_string(),
        other => inspect(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interp() -> Interpreter {
        Interpreter::new(0, false)
    }

    #[test]
    fn primitives_at_top_level() {
        assert_eq!(inspect(&JsValue::from("hi")), "hi");
        assert_eq!(inspect(&JsValue::Float(-0.0)), "-0");
        assert_eq!(inspect(&JsValue::Null), "null");
    }

    #[test]
    fn nested_values_are_quoted() {
        let mut interp = interp();
        let arr = interp.create_array(vec![JsValue::from(1), JsValue::from("two")]);
        assert_eq!(inspect(&JsValue::Object(arr)), "[ 1, 'two' ]");
        let obj = interp.create_object();
        obj.borrow_mut().set_property(PropertyKey::from("a"), JsValue::from(1));
        obj.borrow_mut().set_property(PropertyKey::from("b-c"), JsValue::Bool(true));
        assert_eq!(inspect(&JsValue::Object(obj)), "{ a: 1, 'b-c': true }");
    }

    #[test]
    fn cycles_are_marked() {
        let mut interp = interp();
        let obj = interp.create_object();
        obj.borrow_mut().set_property(PropertyKey::from("self"), JsValue::Object(obj.clone()));
        assert_eq!(inspect(&JsValue::Object(obj)), "{ self: [Circular] }");
    }

    #[test]
    fn format_directives() {
        let mut interp = interp();
        let args = [
            JsValue::from("%s is %d%%"),
            JsValue::from("x"),
            JsValue::from(42),
            JsValue::from("extra"),
        ];
        assert_eq!(format_args(&mut interp, &args).ok().as_deref(), Some("x is 42% extra"));
        let args = [JsValue::from("100%"), JsValue::from(1)];
        assert_eq!(format_args(&mut interp, &args).ok().as_deref(), Some("100% 1"));
    }

    #[test]
    fn arguments_join_with_spaces() {
        let mut interp = interp();
        let args = [JsValue::from(1), JsValue::from("a"), JsValue::Undefined];
        assert_eq!(format_args(&mut interp, &args).ok().as_deref(), Some("1 a undefined"));
    }
}
