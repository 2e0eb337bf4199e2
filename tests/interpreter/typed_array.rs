//! Typed array, ArrayBuffer and DataView tests

use super::{eval, throws_error};
use esrun::JsValue;

#[test]
fn test_element_conversion() {
    assert_eq!(eval("const a = new Uint8Array(1); a[0] = 257; a[0]"), JsValue::from(1));
    assert_eq!(eval("const a = new Int8Array(1); a[0] = 200; a[0]"), JsValue::from(-56));
    assert_eq!(eval("const a = new Uint8ClampedArray(2); a[0] = 300; a[1] = 1.5; a.join()"), JsValue::from("255,2"));
    assert_eq!(eval("const a = new Float32Array(1); a[0] = 0.1; a[0] === 0.1"), JsValue::Bool(false));
    assert_eq!(eval("const a = new Float64Array([0.1]); a[0]"), JsValue::from(0.1));
    assert_eq!(eval("new Uint32Array([-1])[0]"), JsValue::from(4294967295.0));
}

#[test]
fn test_out_of_range_access() {
    assert_eq!(eval("const a = new Int16Array(2); a[5] = 1; a[5]"), JsValue::Undefined);
    assert_eq!(eval("const a = new Int16Array(2); a[5] = 1; a.length"), JsValue::from(2));
    assert_eq!(eval("const a = new Int16Array(2); a['-0'] = 1; a['-0']"), JsValue::Undefined);
}

#[test]
fn test_shared_buffer_views() {
    assert_eq!(
        eval("const buf = new ArrayBuffer(4); const u8 = new Uint8Array(buf); const u32 = new Uint32Array(buf); u32[0] = 0x01020304; u8[0]"),
        JsValue::from(4)
    );
    assert_eq!(
        eval("const buf = new ArrayBuffer(8); const a = new Uint8Array(buf, 2, 4); a.fill(9); [a.byteOffset, a.byteLength, new Uint8Array(buf).join('')].join()"),
        JsValue::from("2,4,00999900")
    );
    assert!(throws_error("new Uint32Array(new ArrayBuffer(6))", "RangeError"));
    assert!(throws_error("new Uint16Array(new ArrayBuffer(4), 1)", "RangeError"));
}

#[test]
fn test_subarray_shares_and_slice_copies() {
    assert_eq!(
        eval("const a = new Uint8Array([1, 2, 3, 4]); const s = a.subarray(1, 3); s[0] = 9; a.join()"),
        JsValue::from("1,9,3,4")
    );
    assert_eq!(
        eval("const a = new Uint8Array([1, 2, 3, 4]); const s = a.slice(1, 3); s[0] = 9; a.join()"),
        JsValue::from("1,2,3,4")
    );
}

#[test]
fn test_methods() {
    assert_eq!(eval("new Int32Array([3, 1, 2]).sort().join()"), JsValue::from("1,2,3"));
    assert_eq!(eval("new Float64Array([NaN, 1, -0, 0]).sort().join()"), JsValue::from("0,0,1,NaN"));
    assert_eq!(eval("new Uint8Array([1, 2, 3]).map(x => x * 100).join()"), JsValue::from("100,200,44"));
    assert_eq!(eval("new Int8Array([1, 2, 3]).filter(x => x > 1).length"), JsValue::from(2));
    assert_eq!(eval("new Int8Array([1, 2, 3]).reduce((a, b) => a + b)"), JsValue::from(6));
    assert_eq!(eval("const a = new Uint8Array(4); a.set([1, 2], 2); a.join()"), JsValue::from("0,0,1,2"));
    assert!(throws_error("new Uint8Array(2).set([1, 2, 3])", "RangeError"));
    assert_eq!(eval("Uint16Array.from([1, 2]).join()"), JsValue::from("1,2"));
    assert_eq!(eval("Int8Array.of(-1, 1).join()"), JsValue::from("-1,1"));
    assert_eq!(eval("[...new Uint8Array([5, 6])].join()"), JsValue::from("5,6"));
}

#[test]
fn test_to_string_tag_and_prototype() {
    assert_eq!(eval("Object.prototype.toString.call(new Uint8Array(1))"), JsValue::from("[object Uint8Array]"));
    assert_eq!(
        eval("Object.getPrototypeOf(Int8Array.prototype) === Object.getPrototypeOf(Float64Array.prototype)"),
        JsValue::Bool(true)
    );
    assert_eq!(eval("Uint8Array.BYTES_PER_ELEMENT + Float64Array.prototype.BYTES_PER_ELEMENT"), JsValue::from(9));
}

#[test]
fn test_array_buffer() {
    assert_eq!(eval("new ArrayBuffer(16).byteLength"), JsValue::from(16));
    assert_eq!(
        eval("const b = new ArrayBuffer(4); new Uint8Array(b).set([1, 2, 3, 4]); new Uint8Array(b.slice(1, 3)).join()"),
        JsValue::from("2,3")
    );
    assert_eq!(eval("ArrayBuffer.isView(new DataView(new ArrayBuffer(1)))"), JsValue::Bool(true));
    assert!(throws_error("new ArrayBuffer(-1)", "RangeError"));
}

#[test]
fn test_data_view_endianness() {
    assert_eq!(
        eval("const v = new DataView(new ArrayBuffer(4)); v.setUint16(0, 0x1234); [v.getUint8(0), v.getUint8(1)].join()"),
        JsValue::from("18,52")
    );
    assert_eq!(
        eval("const v = new DataView(new ArrayBuffer(4)); v.setUint16(0, 0x1234, true); v.getUint8(0)"),
        JsValue::from(0x34)
    );
    assert_eq!(
        eval("const v = new DataView(new ArrayBuffer(8)); v.setFloat64(0, Math.PI); v.getFloat64(0) === Math.PI"),
        JsValue::Bool(true)
    );
    assert_eq!(
        eval("const v = new DataView(new ArrayBuffer(4)); v.setInt32(0, -2); v.getUint32(0)"),
        JsValue::from(4294967294.0)
    );
    assert!(throws_error("new DataView(new ArrayBuffer(2)).getInt32(0)", "RangeError"));
}
