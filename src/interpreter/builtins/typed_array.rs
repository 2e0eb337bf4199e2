//! ArrayBuffer, the typed array constructors and DataView
//!
//! A buffer owns its bytes behind `Rc<RefCell<..>>`; every view over it
//! (typed arrays, data views, subarrays) holds a clone of that handle plus
//! the buffer object itself so the object stays alive and observable
//! through `.buffer`. Elements are stored little-endian.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::error::JsError;
use crate::gc::Tracer;
use crate::number;
use crate::object::{Attributes, JsObject, JsObjectRef, ObjectKind, Property};
use crate::value::{JsSymbol, JsValue, PropertyKey};

use super::{arg, array, relative_arg};
use crate::interpreter::Interpreter;
use crate::interpreter::ops::{EnumKind, describe};
use crate::interpreter::realm::Intrinsic;

/// Largest buffer a script may allocate
const MAX_BYTE_LENGTH: usize = 1 << 30;

pub type ByteStore = Rc<RefCell<Vec<u8>>>;

// ═══════════════════════════════════════════════════════════════════════════════
// Internal slots
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ArrayBufferData {
    pub data: ByteStore,
}

impl ArrayBufferData {
    pub fn byte_length(&self) -> usize {
        self.data.borrow().len()
    }
}

/// Element type of a typed array
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl TypedArrayKind {
    pub const ALL: [TypedArrayKind; 9] = [
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Uint8Clamped,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
        TypedArrayKind::Float32,
        TypedArrayKind::Float64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Uint8Clamped => "Uint8ClampedArray",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
            TypedArrayKind::Float32 => "Float32Array",
            TypedArrayKind::Float64 => "Float64Array",
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 | TypedArrayKind::Float32 => 4,
            TypedArrayKind::Float64 => 8,
        }
    }

    fn prototype(self) -> Intrinsic {
        match self {
            TypedArrayKind::Int8 => Intrinsic::Int8ArrayPrototype,
            TypedArrayKind::Uint8 => Intrinsic::Uint8ArrayPrototype,
            TypedArrayKind::Uint8Clamped => Intrinsic::Uint8ClampedArrayPrototype,
            TypedArrayKind::Int16 => Intrinsic::Int16ArrayPrototype,
            TypedArrayKind::Uint16 => Intrinsic::Uint16ArrayPrototype,
            TypedArrayKind::Int32 => Intrinsic::Int32ArrayPrototype,
            TypedArrayKind::Uint32 => Intrinsic::Uint32ArrayPrototype,
            TypedArrayKind::Float32 => Intrinsic::Float32ArrayPrototype,
            TypedArrayKind::Float64 => Intrinsic::Float64ArrayPrototype,
        }
    }

    fn constructor(self) -> Intrinsic {
        match self {
            TypedArrayKind::Int8 => Intrinsic::Int8Array,
            TypedArrayKind::Uint8 => Intrinsic::Uint8Array,
            TypedArrayKind::Uint8Clamped => Intrinsic::Uint8ClampedArray,
            TypedArrayKind::Int16 => Intrinsic::Int16Array,
            TypedArrayKind::Uint16 => Intrinsic::Uint16Array,
            TypedArrayKind::Int32 => Intrinsic::Int32Array,
            TypedArrayKind::Uint32 => Intrinsic::Uint32Array,
            TypedArrayKind::Float32 => Intrinsic::Float32Array,
            TypedArrayKind::Float64 => Intrinsic::Float64Array,
        }
    }

    /// Little-endian bytes of `v` converted to this element type
    fn encode(self, v: f64) -> Vec<u8> {
        match self {
            TypedArrayKind::Int8 => (number::to_int32(v) as i8).to_le_bytes().to_vec(),
            TypedArrayKind::Uint8 => (number::to_uint32(v) as u8).to_le_bytes().to_vec(),
            TypedArrayKind::Uint8Clamped => vec![clamp_u8(v)],
            TypedArrayKind::Int16 => (number::to_int32(v) as i16).to_le_bytes().to_vec(),
            TypedArrayKind::Uint16 => number::to_uint16(v).to_le_bytes().to_vec(),
            TypedArrayKind::Int32 => number::to_int32(v).to_le_bytes().to_vec(),
            TypedArrayKind::Uint32 => number::to_uint32(v).to_le_bytes().to_vec(),
            TypedArrayKind::Float32 => (v as f32).to_le_bytes().to_vec(),
            TypedArrayKind::Float64 => v.to_le_bytes().to_vec(),
        }
    }

    fn decode(self, bytes: &[u8]) -> Option<f64> {
        Some(match self {
            TypedArrayKind::Int8 => f64::from(i8::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Uint8 | TypedArrayKind::Uint8Clamped => f64::from(u8::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Int16 => f64::from(i16::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Uint16 => f64::from(u16::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Int32 => f64::from(i32::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Uint32 => f64::from(u32::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Float32 => f64::from(f32::from_le_bytes(bytes.try_into().ok()?)),
            TypedArrayKind::Float64 => f64::from_le_bytes(bytes.try_into().ok()?),
        })
    }
}

/// `ToUint8Clamp`: round half to even, saturating
fn clamp_u8(v: f64) -> u8 {
    if v.is_nan() || v <= 0.0 {
        return 0;
    }
    if v >= 255.0 {
        return 255;
    }
    let f = v.floor();
    let rounded = match (f + 0.5).partial_cmp(&v) {
        Some(Ordering::Less) => f + 1.0,
        Some(Ordering::Greater) => f,
        _ if f % 2.0 == 0.0 => f,
        _ => f + 1.0,
    };
    rounded as u8
}

/// Typed array internal slots
#[derive(Clone)]
pub struct TypedArrayData {
    pub kind: TypedArrayKind,
    pub buffer: JsObjectRef,
    pub data: ByteStore,
    pub byte_offset: usize,
    pub length: usize,
}

impl TypedArrayData {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.edge(&self.buffer);
    }

    pub fn byte_length(&self) -> usize {
        self.length * self.kind.element_size()
    }

    /// Element index for a canonical numeric key, `None` when out of range
    fn slot(&self, index: f64) -> Option<usize> {
        let integral = index.fract() == 0.0 && !(index == 0.0 && index.is_sign_negative());
        (integral && index >= 0.0 && index < self.length as f64).then_some(index as usize)
    }

    pub fn read(&self, i: usize) -> Option<f64> {
        if i >= self.length {
            return None;
        }
        let size = self.kind.element_size();
        let start = self.byte_offset + i * size;
        let data = self.data.borrow();
        let bytes = data.get(start..start + size)?;
        self.kind.decode(bytes)
    }

    pub fn write(&self, i: usize, v: f64) {
        if i >= self.length {
            return;
        }
        let size = self.kind.element_size();
        let start = self.byte_offset + i * size;
        let encoded = self.kind.encode(v);
        if let Some(slot) = self.data.borrow_mut().get_mut(start..start + size) {
            slot.copy_from_slice(&encoded);
        }
    }

    pub fn values(&self) -> Vec<f64> {
        (0..self.length).filter_map(|i| self.read(i)).collect()
    }
}

/// DataView internal slots
pub struct DataViewData {
    pub buffer: JsObjectRef,
    pub data: ByteStore,
    pub byte_offset: usize,
    pub byte_length: usize,
}

impl DataViewData {
    pub fn trace(&self, t: &mut Tracer<'_>) {
        t.edge(&self.buffer);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Element access used by the object internal methods
// ═══════════════════════════════════════════════════════════════════════════════

/// Element at a canonical numeric index, `None` when out of range
pub fn get_element(obj: &JsObject, index: f64) -> Option<JsValue> {
    let ObjectKind::TypedArray(ta) = &obj.kind else {
        return None;
    };
    ta.slot(index).and_then(|i| ta.read(i)).map(JsValue::number)
}

pub fn has_element(obj: &JsObject, index: f64) -> bool {
    match &obj.kind {
        ObjectKind::TypedArray(ta) => ta.slot(index).is_some(),
        _ => false,
    }
}

pub fn element_count(obj: &JsObject) -> usize {
    match &obj.kind {
        ObjectKind::TypedArray(ta) => ta.length,
        _ => 0,
    }
}

/// `TypedArraySetElement`: the value is converted even when the index is
/// out of range
pub fn set_element(interp: &mut Interpreter, obj: &JsObjectRef, index: f64, value: &JsValue) -> Result<(), JsError> {
    let n = interp.to_number(value)?;
    if let ObjectKind::TypedArray(ta) = &obj.borrow().kind {
        if let Some(i) = ta.slot(index) {
            ta.write(i, n);
        }
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════════

pub fn init(interp: &mut Interpreter) {
    if interp.realm.get(Intrinsic::ArrayBufferPrototype).is_some() {
        return;
    }
    init_array_buffer(interp);
    init_data_view(interp);

    let ta_proto = interp.create_object();
    interp.register_getter(&ta_proto, "buffer", typed_array_buffer);
    interp.register_getter(&ta_proto, "byteLength", typed_array_byte_length);
    interp.register_getter(&ta_proto, "byteOffset", typed_array_byte_offset);
    interp.register_getter(&ta_proto, "length", typed_array_length);
    interp.register_getter(&ta_proto, PropertyKey::Symbol(JsSymbol::to_string_tag()), typed_array_to_string_tag);
    interp.register_method(&ta_proto, "at", typed_array_at, 1);
    interp.register_method(&ta_proto, "copyWithin", typed_array_copy_within, 2);
    interp.register_method(&ta_proto, "entries", typed_array_entries, 0);
    interp.register_method(&ta_proto, "every", typed_array_every, 1);
    interp.register_method(&ta_proto, "fill", typed_array_fill, 1);
    interp.register_method(&ta_proto, "filter", typed_array_filter, 1);
    interp.register_method(&ta_proto, "find", typed_array_find, 1);
    interp.register_method(&ta_proto, "findIndex", typed_array_find_index, 1);
    interp.register_method(&ta_proto, "findLast", typed_array_find_last, 1);
    interp.register_method(&ta_proto, "findLastIndex", typed_array_find_last_index, 1);
    interp.register_method(&ta_proto, "forEach", typed_array_for_each, 1);
    interp.register_method(&ta_proto, "includes", typed_array_includes, 1);
    interp.register_method(&ta_proto, "indexOf", typed_array_index_of, 1);
    interp.register_method(&ta_proto, "join", typed_array_join, 1);
    interp.register_method(&ta_proto, "keys", typed_array_keys, 0);
    interp.register_method(&ta_proto, "lastIndexOf", typed_array_last_index_of, 1);
    interp.register_method(&ta_proto, "map", typed_array_map, 1);
    interp.register_method(&ta_proto, "reduce", typed_array_reduce, 1);
    interp.register_method(&ta_proto, "reduceRight", typed_array_reduce_right, 1);
    interp.register_method(&ta_proto, "reverse", typed_array_reverse, 0);
    interp.register_method(&ta_proto, "set", typed_array_set, 1);
    interp.register_method(&ta_proto, "slice", typed_array_slice, 2);
    interp.register_method(&ta_proto, "some", typed_array_some, 1);
    interp.register_method(&ta_proto, "sort", typed_array_sort, 1);
    interp.register_method(&ta_proto, "subarray", typed_array_subarray, 2);
    interp.register_method(&ta_proto, "toLocaleString", typed_array_to_locale_string, 0);
    interp.register_method(&ta_proto, "toReversed", typed_array_to_reversed, 0);
    interp.register_method(&ta_proto, "toSorted", typed_array_to_sorted, 1);
    interp.register_method(&ta_proto, "with", typed_array_with, 2);
    let values = interp.create_native_function("values", typed_array_values, 0);
    interp.register_value(&ta_proto, "values", JsValue::Object(values.clone()));
    interp.register_value(&ta_proto, PropertyKey::Symbol(JsSymbol::iterator()), JsValue::Object(values));
    let array_proto = interp.intrinsic(Intrinsic::ArrayPrototype);
    let to_string = array_proto.borrow().get_own(&PropertyKey::from("toString"));
    if let Some(to_string) = to_string.as_ref().and_then(|p| p.data_value()) {
        interp.register_value(&ta_proto, "toString", to_string.clone());
    }

    let ta_ctor = interp.create_native_constructor("TypedArray", typed_array_abstract, 0, &ta_proto);
    interp.register_method(&ta_ctor, "from", typed_array_from, 1);
    interp.register_method(&ta_ctor, "of", typed_array_of, 0);
    super::register_species(interp, &ta_ctor);
    interp.realm.set(Intrinsic::TypedArrayPrototype, ta_proto.clone());
    interp.realm.set(Intrinsic::TypedArray, ta_ctor.clone());

    for kind in TypedArrayKind::ALL {
        let proto = interp.create_object_with_proto(Some(ta_proto.clone()));
        let ctor = interp.create_native_constructor(kind.name(), kind_constructor(kind), 3, &proto);
        ctor.borrow_mut().prototype = Some(ta_ctor.clone());
        let size = JsValue::from(kind.element_size());
        for target in [&ctor, &proto] {
            target.borrow_mut().define_property(
                PropertyKey::from("BYTES_PER_ELEMENT"),
                Property::data(size.clone(), Attributes::NONE),
            );
        }
        interp.realm.set(kind.prototype(), proto);
        interp.realm.set(kind.constructor(), ctor);
    }
}

fn init_array_buffer(interp: &mut Interpreter) {
    let proto = interp.create_object();
    interp.register_getter(&proto, "byteLength", array_buffer_byte_length);
    interp.register_getter(&proto, "maxByteLength", array_buffer_byte_length);
    interp.register_getter(&proto, "resizable", array_buffer_resizable);
    interp.register_method(&proto, "slice", array_buffer_slice, 2);
    super::set_to_string_tag(&proto, "ArrayBuffer");
    let ctor = interp.create_native_constructor("ArrayBuffer", array_buffer_constructor, 1, &proto);
    interp.register_method(&ctor, "isView", array_buffer_is_view, 1);
    super::register_species(interp, &ctor);
    interp.realm.set(Intrinsic::ArrayBufferPrototype, proto);
    interp.realm.set(Intrinsic::ArrayBuffer, ctor);
}

fn init_data_view(interp: &mut Interpreter) {
    let proto = interp.create_object();
    interp.register_getter(&proto, "buffer", data_view_buffer);
    interp.register_getter(&proto, "byteLength", data_view_byte_length);
    interp.register_getter(&proto, "byteOffset", data_view_byte_offset);
    interp.register_method(&proto, "getInt8", data_view_get_int8, 1);
    interp.register_method(&proto, "getUint8", data_view_get_uint8, 1);
    interp.register_method(&proto, "getInt16", data_view_get_int16, 1);
    interp.register_method(&proto, "getUint16", data_view_get_uint16, 1);
    interp.register_method(&proto, "getInt32", data_view_get_int32, 1);
    interp.register_method(&proto, "getUint32", data_view_get_uint32, 1);
    interp.register_method(&proto, "getFloat32", data_view_get_float32, 1);
    interp.register_method(&proto, "getFloat64", data_view_get_float64, 1);
    interp.register_method(&proto, "setInt8", data_view_set_int8, 2);
    interp.register_method(&proto, "setUint8", data_view_set_uint8, 2);
    interp.register_method(&proto, "setInt16", data_view_set_int16, 2);
    interp.register_method(&proto, "setUint16", data_view_set_uint16, 2);
    interp.register_method(&proto, "setInt32", data_view_set_int32, 2);
    interp.register_method(&proto, "setUint32", data_view_set_uint32, 2);
    interp.register_method(&proto, "setFloat32", data_view_set_float32, 2);
    interp.register_method(&proto, "setFloat64", data_view_set_float64, 2);
    super::set_to_string_tag(&proto, "DataView");
    let ctor = interp.create_native_constructor("DataView", data_view_constructor, 1, &proto);
    interp.realm.set(Intrinsic::DataViewPrototype, proto);
    interp.realm.set(Intrinsic::DataView, ctor);
}

// ═══════════════════════════════════════════════════════════════════════════════
// ArrayBuffer
// ═══════════════════════════════════════════════════════════════════════════════

/// `AllocateArrayBuffer`
fn allocate_buffer(interp: &mut Interpreter, byte_length: usize, proto: JsObjectRef) -> Result<(JsObjectRef, ByteStore), JsError> {
    if byte_length > MAX_BYTE_LENGTH {
        return Err(JsError::range_error("Array buffer allocation failed"));
    }
    let data: ByteStore = Rc::new(RefCell::new(vec![0; byte_length]));
    let buffer = ArrayBufferData { data: data.clone() };
    let obj = interp.alloc(JsObject::new(ObjectKind::ArrayBuffer(Box::new(buffer)), Some(proto)));
    Ok((obj, data))
}

fn buffer_store(obj: &JsObjectRef) -> Option<ByteStore> {
    match &obj.borrow().kind {
        ObjectKind::ArrayBuffer(b) => Some(b.data.clone()),
        _ => None,
    }
}

fn this_buffer(this: &JsValue, method: &str) -> Result<(JsObjectRef, ByteStore), JsError> {
    if let JsValue::Object(o) = this {
        if let Some(data) = buffer_store(o) {
            return Ok((o.clone(), data));
        }
    }
    Err(JsError::type_error(format!(
        "Method ArrayBuffer.prototype.{method} called on incompatible receiver {}",
        this.display_hint()
    )))
}

/// ArrayBuffer(length)
fn array_buffer_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Constructor ArrayBuffer requires 'new'"));
    }
    let len = interp.to_index(&arg(args, 0), "array buffer length")?;
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::ArrayBufferPrototype)?;
    let (obj, _) = allocate_buffer(interp, len, proto)?;
    Ok(JsValue::Object(obj))
}

/// ArrayBuffer.isView(arg)
fn array_buffer_is_view(_interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let is_view = match arg(args, 0) {
        JsValue::Object(o) => matches!(o.borrow().kind, ObjectKind::TypedArray(_) | ObjectKind::DataView(_)),
        _ => false,
    };
    Ok(JsValue::Bool(is_view))
}

fn array_buffer_byte_length(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, data) = this_buffer(&this, "byteLength")?;
    let len = data.borrow().len();
    Ok(JsValue::from(len))
}

fn array_buffer_resizable(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    this_buffer(&this, "resizable")?;
    Ok(JsValue::Bool(false))
}

/// ArrayBuffer.prototype.slice(start, end)
fn array_buffer_slice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, data) = this_buffer(&this, "slice")?;
    let len = data.borrow().len();
    let first = relative_arg(interp, &arg(args, 0), len, 0)?;
    let last = relative_arg(interp, &arg(args, 1), len, len)?;
    let count = last.saturating_sub(first);

    let ctor = interp.species_constructor(&obj, Intrinsic::ArrayBuffer)?;
    let created = interp.construct(&ctor, &[JsValue::from(count)], None)?;
    let JsValue::Object(new_obj) = &created else {
        return Err(JsError::type_error("ArrayBuffer subclass returned this from species constructor"));
    };
    let Some(target) = buffer_store(new_obj) else {
        return Err(JsError::type_error("Species constructor did not return an ArrayBuffer"));
    };
    if new_obj.ptr_eq(&obj) {
        return Err(JsError::type_error("ArrayBuffer subclass returned this from species constructor"));
    }
    if target.borrow().len() < count {
        return Err(JsError::type_error("Species constructor returned a buffer that is too small"));
    }
    let source: Vec<u8> = data.borrow().get(first..first + count).map(<[u8]>::to_vec).unwrap_or_default();
    if let Some(dest) = target.borrow_mut().get_mut(..source.len()) {
        dest.copy_from_slice(&source);
    }
    Ok(created)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Typed array construction
// ═══════════════════════════════════════════════════════════════════════════════

fn kind_constructor(kind: TypedArrayKind) -> crate::object::NativeFn {
    match kind {
        TypedArrayKind::Int8 => int8_array_constructor,
        TypedArrayKind::Uint8 => uint8_array_constructor,
        TypedArrayKind::Uint8Clamped => uint8_clamped_array_constructor,
        TypedArrayKind::Int16 => int16_array_constructor,
        TypedArrayKind::Uint16 => uint16_array_constructor,
        TypedArrayKind::Int32 => int32_array_constructor,
        TypedArrayKind::Uint32 => uint32_array_constructor,
        TypedArrayKind::Float32 => float32_array_constructor,
        TypedArrayKind::Float64 => float64_array_constructor,
    }
}

macro_rules! kind_constructors {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            fn $name(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                construct_typed_array(interp, args, TypedArrayKind::$kind)
            }
        )*
    };
}

kind_constructors! {
    int8_array_constructor => Int8,
    uint8_array_constructor => Uint8,
    uint8_clamped_array_constructor => Uint8Clamped,
    int16_array_constructor => Int16,
    uint16_array_constructor => Uint16,
    int32_array_constructor => Int32,
    uint32_array_constructor => Uint32,
    float32_array_constructor => Float32,
    float64_array_constructor => Float64,
}

/// %TypedArray% itself cannot be constructed
fn typed_array_abstract(_interp: &mut Interpreter, _this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Err(JsError::type_error("Abstract class TypedArray not directly constructable"))
}

fn alloc_view(interp: &mut Interpreter, data: TypedArrayData, proto: JsObjectRef) -> JsObjectRef {
    interp.alloc(JsObject::new(ObjectKind::TypedArray(Box::new(data)), Some(proto)))
}

/// A fresh zero-filled typed array of `length` elements
fn create_with_length(
    interp: &mut Interpreter,
    kind: TypedArrayKind,
    length: usize,
    proto: JsObjectRef,
) -> Result<JsObjectRef, JsError> {
    let byte_length = length
        .checked_mul(kind.element_size())
        .ok_or_else(|| JsError::range_error(format!("Invalid typed array length: {length}")))?;
    let buffer_proto = interp.intrinsic(Intrinsic::ArrayBufferPrototype);
    let (buffer, data) = allocate_buffer(interp, byte_length, buffer_proto)?;
    let view = TypedArrayData {
        kind,
        buffer,
        data,
        byte_offset: 0,
        length,
    };
    Ok(alloc_view(interp, view, proto))
}

/// new XArray(length | typedArray | object | buffer, byteOffset, length)
fn construct_typed_array(interp: &mut Interpreter, args: &[JsValue], kind: TypedArrayKind) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error(format!("Constructor {} requires 'new'", kind.name())));
    }
    let proto = interp.get_prototype_from_constructor(&nt, kind.prototype())?;
    let first = arg(args, 0);
    let JsValue::Object(source) = &first else {
        let length = interp.to_index(&first, "typed array length")?;
        return Ok(JsValue::Object(create_with_length(interp, kind, length, proto)?));
    };

    if let Some(data) = buffer_store(source) {
        let size = kind.element_size();
        let offset = interp.to_index(&arg(args, 1), "typed array offset")?;
        if offset % size != 0 {
            return Err(JsError::range_error(format!(
                "start offset of {} should be a multiple of {size}",
                kind.name()
            )));
        }
        let buffer_len = data.borrow().len();
        let length = match arg(args, 2) {
            JsValue::Undefined => {
                if buffer_len % size != 0 {
                    return Err(JsError::range_error(format!(
                        "byte length of {} should be a multiple of {size}",
                        kind.name()
                    )));
                }
                if offset > buffer_len {
                    return Err(JsError::range_error(format!(
                        "Start offset {offset} is outside the bounds of the buffer"
                    )));
                }
                (buffer_len - offset) / size
            }
            len => {
                let length = interp.to_index(&len, "typed array length")?;
                if offset + length * size > buffer_len {
                    return Err(JsError::range_error(format!("Invalid typed array length: {length}")));
                }
                length
            }
        };
        let view = TypedArrayData {
            kind,
            buffer: source.clone(),
            data,
            byte_offset: offset,
            length,
        };
        return Ok(JsValue::Object(alloc_view(interp, view, proto)));
    }

    let existing = match &source.borrow().kind {
        ObjectKind::TypedArray(ta) => Some(ta.values()),
        _ => None,
    };
    let values: Vec<JsValue> = match existing {
        Some(values) => values.into_iter().map(JsValue::number).collect(),
        None => collect_source(interp, &first)?,
    };
    let obj = create_with_length(interp, kind, values.len(), proto)?;
    for (i, v) in values.iter().enumerate() {
        set_element(interp, &obj, i as f64, v)?;
    }
    Ok(JsValue::Object(obj))
}

/// Values of an iterable, or of an array-like when it has no iterator
fn collect_source(interp: &mut Interpreter, source: &JsValue) -> Result<Vec<JsValue>, JsError> {
    if let Some(method) = interp.get_method(source, &PropertyKey::Symbol(JsSymbol::iterator()))? {
        let mut record = interp.get_iterator_from_method(source, &method)?;
        let mut values = Vec::new();
        while let Some(v) = interp.iterator_step_value(&mut record)? {
            values.push(v);
        }
        return Ok(values);
    }
    let obj = interp.to_object(source)?;
    let len = interp.length_of_array_like(&obj)?;
    let mut values = Vec::with_capacity(len.min(1 << 16) as usize);
    for i in 0..len {
        values.push(interp.get(&obj, &PropertyKey::from(i as usize))?);
    }
    Ok(values)
}

/// `TypedArrayCreateFromConstructor` with a length argument
fn create_from_constructor(interp: &mut Interpreter, ctor: &JsValue, length: usize) -> Result<JsObjectRef, JsError> {
    let created = interp.construct(ctor, &[JsValue::from(length)], None)?;
    let (obj, view) = validate(&created, "constructor")?;
    if view.length < length {
        return Err(JsError::type_error(format!(
            "Derived TypedArray constructor created an array which was too small ({} < {length})",
            view.length
        )));
    }
    Ok(obj)
}

/// `TypedArraySpeciesCreate` with a length argument
fn species_create(interp: &mut Interpreter, exemplar: &JsObjectRef, kind: TypedArrayKind, length: usize) -> Result<JsObjectRef, JsError> {
    let ctor = interp.species_constructor(exemplar, kind.constructor())?;
    create_from_constructor(interp, &ctor, length)
}

/// TypedArray.from(source, mapFn, thisArg)
fn typed_array_from(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_constructor() {
        return Err(JsError::type_error(format!("{} is not a constructor", describe(&this))));
    }
    let map_fn = arg(args, 1);
    if !map_fn.is_undefined() && !map_fn.is_callable() {
        return Err(JsError::type_error(format!("{} is not a function", describe(&map_fn))));
    }
    let this_arg = arg(args, 2);
    let values = collect_source(interp, &arg(args, 0))?;
    let target = create_from_constructor(interp, &this, values.len())?;
    for (k, v) in values.into_iter().enumerate() {
        let v = if map_fn.is_undefined() {
            v
        } else {
            interp.call_function(&map_fn, this_arg.clone(), &[v, JsValue::from(k)])?
        };
        interp.set_or_throw(&target, PropertyKey::from(k), v)?;
    }
    Ok(JsValue::Object(target))
}

/// TypedArray.of(...items)
fn typed_array_of(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    if !this.is_constructor() {
        return Err(JsError::type_error(format!("{} is not a constructor", describe(&this))));
    }
    let target = create_from_constructor(interp, &this, args.len())?;
    for (k, v) in args.iter().enumerate() {
        interp.set_or_throw(&target, PropertyKey::from(k), v.clone())?;
    }
    Ok(JsValue::Object(target))
}

// ═══════════════════════════════════════════════════════════════════════════════
// %TypedArray%.prototype
// ═══════════════════════════════════════════════════════════════════════════════

/// `ValidateTypedArray`
fn validate(value: &JsValue, method: &str) -> Result<(JsObjectRef, TypedArrayData), JsError> {
    if let JsValue::Object(o) = value {
        if let ObjectKind::TypedArray(ta) = &o.borrow().kind {
            return Ok((o.clone(), (**ta).clone()));
        }
    }
    Err(JsError::type_error(format!(
        "Method %TypedArray%.prototype.{method} called on incompatible receiver {}",
        value.display_hint()
    )))
}

fn typed_array_buffer(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "buffer")?;
    Ok(JsValue::Object(view.buffer))
}

fn typed_array_byte_length(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "byteLength")?;
    Ok(JsValue::from(view.byte_length()))
}

fn typed_array_byte_offset(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "byteOffset")?;
    Ok(JsValue::from(view.byte_offset))
}

fn typed_array_length(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "length")?;
    Ok(JsValue::from(view.length))
}

/// get %TypedArray%.prototype[@@toStringTag]; undefined for non-views
fn typed_array_to_string_tag(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    Ok(match validate(&this, "") {
        Ok((_, view)) => JsValue::from(view.kind.name()),
        Err(_) => JsValue::Undefined,
    })
}

/// Methods whose generic Array versions already behave correctly once the
/// receiver is known to be a typed array
macro_rules! delegate_to_array {
    ($($name:ident => $array_fn:path, $method:literal;)*) => {
        $(
            fn $name(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                validate(&this, $method)?;
                $array_fn(interp, this, args)
            }
        )*
    };
}

delegate_to_array! {
    typed_array_at => array::array_at, "at";
    typed_array_copy_within => array::array_copy_within, "copyWithin";
    typed_array_every => array::array_every, "every";
    typed_array_find => array::array_find, "find";
    typed_array_find_index => array::array_find_index, "findIndex";
    typed_array_find_last => array::array_find_last, "findLast";
    typed_array_find_last_index => array::array_find_last_index, "findLastIndex";
    typed_array_for_each => array::array_for_each, "forEach";
    typed_array_includes => array::array_includes, "includes";
    typed_array_index_of => array::array_index_of, "indexOf";
    typed_array_join => array::array_join, "join";
    typed_array_last_index_of => array::array_last_index_of, "lastIndexOf";
    typed_array_reduce => array::array_reduce, "reduce";
    typed_array_reduce_right => array::array_reduce_right, "reduceRight";
    typed_array_some => array::array_some, "some";
    typed_array_to_locale_string => array::array_to_locale_string, "toLocaleString";
}

fn typed_array_entries(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, _) = validate(&this, "entries")?;
    Ok(super::iterator::create_array_iterator(interp, obj, EnumKind::Entries))
}

fn typed_array_keys(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, _) = validate(&this, "keys")?;
    Ok(super::iterator::create_array_iterator(interp, obj, EnumKind::Keys))
}

fn typed_array_values(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, _) = validate(&this, "values")?;
    Ok(super::iterator::create_array_iterator(interp, obj, EnumKind::Values))
}

/// %TypedArray%.prototype.fill(value, start, end); the value is converted once
fn typed_array_fill(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "fill")?;
    let n = interp.to_number(&arg(args, 0))?;
    let start = relative_arg(interp, &arg(args, 1), view.length, 0)?;
    let end = relative_arg(interp, &arg(args, 2), view.length, view.length)?;
    for i in start..end {
        view.write(i, n);
    }
    Ok(this)
}

/// %TypedArray%.prototype.filter(callback, thisArg)
fn typed_array_filter(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, view) = validate(&this, "filter")?;
    let f = super::callback(&arg(args, 0), "%TypedArray%.prototype.filter")?;
    let this_arg = arg(args, 1);
    let mut kept = Vec::new();
    for i in 0..view.length {
        let v = view.read(i).map(JsValue::number).unwrap_or_default();
        let keep = interp.call_function(&f, this_arg.clone(), &[v.clone(), JsValue::from(i), this.clone()])?;
        if keep.to_boolean() {
            kept.push(v);
        }
    }
    let result = species_create(interp, &obj, view.kind, kept.len())?;
    for (i, v) in kept.into_iter().enumerate() {
        interp.set_or_throw(&result, PropertyKey::from(i), v)?;
    }
    Ok(JsValue::Object(result))
}

/// %TypedArray%.prototype.map(callback, thisArg)
fn typed_array_map(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, view) = validate(&this, "map")?;
    let f = super::callback(&arg(args, 0), "%TypedArray%.prototype.map")?;
    let this_arg = arg(args, 1);
    let result = species_create(interp, &obj, view.kind, view.length)?;
    for i in 0..view.length {
        let v = view.read(i).map(JsValue::number).unwrap_or_default();
        let mapped = interp.call_function(&f, this_arg.clone(), &[v, JsValue::from(i), this.clone()])?;
        interp.set_or_throw(&result, PropertyKey::from(i), mapped)?;
    }
    Ok(JsValue::Object(result))
}

/// %TypedArray%.prototype.reverse()
fn typed_array_reverse(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "reverse")?;
    for (i, v) in view.values().into_iter().rev().enumerate() {
        view.write(i, v);
    }
    Ok(this)
}

/// %TypedArray%.prototype.set(source, offset)
fn typed_array_set(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, view) = validate(&this, "set")?;
    let offset = interp.to_integer_or_infinity(&arg(args, 1))?;
    if offset < 0.0 {
        return Err(JsError::range_error("offset is out of bounds"));
    }
    let source = arg(args, 0);
    let from_view = match &source {
        JsValue::Object(o) => match &o.borrow().kind {
            ObjectKind::TypedArray(ta) => Some(ta.values()),
            _ => None,
        },
        _ => None,
    };
    if let Some(values) = from_view {
        if values.len() as f64 + offset > view.length as f64 {
            return Err(JsError::range_error("offset is out of bounds"));
        }
        let start = offset as usize;
        for (i, v) in values.into_iter().enumerate() {
            view.write(start + i, v);
        }
        return Ok(JsValue::Undefined);
    }
    let src = interp.to_object(&source)?;
    let len = interp.length_of_array_like(&src)?;
    if len as f64 + offset > view.length as f64 {
        return Err(JsError::range_error("offset is out of bounds"));
    }
    let start = offset as usize;
    for i in 0..len as usize {
        let v = interp.get(&src, &PropertyKey::from(i))?;
        set_element(interp, &obj, (start + i) as f64, &v)?;
    }
    Ok(JsValue::Undefined)
}

/// %TypedArray%.prototype.slice(start, end)
fn typed_array_slice(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, view) = validate(&this, "slice")?;
    let start = relative_arg(interp, &arg(args, 0), view.length, 0)?;
    let end = relative_arg(interp, &arg(args, 1), view.length, view.length)?;
    let count = end.saturating_sub(start);
    let result = species_create(interp, &obj, view.kind, count)?;
    for i in 0..count {
        let v = view.read(start + i).map(JsValue::number).unwrap_or_default();
        interp.set_or_throw(&result, PropertyKey::from(i), v)?;
    }
    Ok(JsValue::Object(result))
}

/// Comparison for the default numeric sort: NaN last, -0 before +0
fn numeric_order(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        _ if a == 0.0 && b == 0.0 => b.is_sign_negative().cmp(&a.is_sign_negative()),
        _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

fn sorted_values(interp: &mut Interpreter, view: &TypedArrayData, cmp: &JsValue) -> Result<Vec<JsValue>, JsError> {
    let values: Vec<JsValue> = view.values().into_iter().map(JsValue::number).collect();
    array::sort_values(interp, values, &mut |interp: &mut Interpreter, a: &JsValue, b: &JsValue| {
        if cmp.is_undefined() {
            let (x, y) = (a.as_number().unwrap_or(f64::NAN), b.as_number().unwrap_or(f64::NAN));
            return Ok(numeric_order(x, y));
        }
        let r = interp.call_function(cmp, JsValue::Undefined, &[a.clone(), b.clone()])?;
        let n = interp.to_number(&r)?;
        Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
    })
}

fn comparator(args: &[JsValue], method: &str) -> Result<JsValue, JsError> {
    let cmp = arg(args, 0);
    if cmp.is_undefined() || cmp.is_callable() {
        Ok(cmp)
    } else {
        Err(JsError::type_error(format!(
            "The comparison function must be either a function or undefined in %TypedArray%.prototype.{method}"
        )))
    }
}

/// %TypedArray%.prototype.sort(comparefn)
fn typed_array_sort(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let cmp = comparator(args, "sort")?;
    let (_, view) = validate(&this, "sort")?;
    let sorted = sorted_values(interp, &view, &cmp)?;
    for (i, v) in sorted.iter().enumerate() {
        view.write(i, v.as_number().unwrap_or(f64::NAN));
    }
    Ok(this)
}

/// %TypedArray%.prototype.toSorted(comparefn)
fn typed_array_to_sorted(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let cmp = comparator(args, "toSorted")?;
    let (_, view) = validate(&this, "toSorted")?;
    let proto = interp.intrinsic(view.kind.prototype());
    let result = create_with_length(interp, view.kind, view.length, proto)?;
    let sorted = sorted_values(interp, &view, &cmp)?;
    for (i, v) in sorted.iter().enumerate() {
        set_element(interp, &result, i as f64, v)?;
    }
    Ok(JsValue::Object(result))
}

/// %TypedArray%.prototype.toReversed()
fn typed_array_to_reversed(interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "toReversed")?;
    let proto = interp.intrinsic(view.kind.prototype());
    let result = create_with_length(interp, view.kind, view.length, proto)?;
    if let ObjectKind::TypedArray(target) = &result.borrow().kind {
        for (i, v) in view.values().into_iter().rev().enumerate() {
            target.write(i, v);
        }
    }
    Ok(JsValue::Object(result))
}

/// %TypedArray%.prototype.with(index, value)
fn typed_array_with(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, view) = validate(&this, "with")?;
    let rel = interp.to_integer_or_infinity(&arg(args, 0))?;
    let index = if rel >= 0.0 { rel } else { view.length as f64 + rel };
    let n = interp.to_number(&arg(args, 1))?;
    if index < 0.0 || index >= view.length as f64 {
        return Err(JsError::range_error("Invalid typed array index"));
    }
    let proto = interp.intrinsic(view.kind.prototype());
    let result = create_with_length(interp, view.kind, view.length, proto)?;
    if let ObjectKind::TypedArray(target) = &result.borrow().kind {
        for (i, v) in view.values().into_iter().enumerate() {
            target.write(i, if i == index as usize { n } else { v });
        }
    }
    Ok(JsValue::Object(result))
}

/// %TypedArray%.prototype.subarray(begin, end): a view over the same buffer
fn typed_array_subarray(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let (obj, view) = validate(&this, "subarray")?;
    let begin = relative_arg(interp, &arg(args, 0), view.length, 0)?;
    let end = relative_arg(interp, &arg(args, 1), view.length, view.length)?;
    let count = end.saturating_sub(begin);
    let byte_offset = view.byte_offset + begin * view.kind.element_size();
    let ctor = interp.species_constructor(&obj, view.kind.constructor())?;
    let ctor_args = [
        JsValue::Object(view.buffer.clone()),
        JsValue::from(byte_offset),
        JsValue::from(count),
    ];
    let created = interp.construct(&ctor, &ctor_args, None)?;
    validate(&created, "subarray")?;
    Ok(created)
}

// ═══════════════════════════════════════════════════════════════════════════════
// DataView
// ═══════════════════════════════════════════════════════════════════════════════

/// DataView(buffer, byteOffset, byteLength)
fn data_view_constructor(interp: &mut Interpreter, _this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
    let nt = interp.new_target.clone();
    if nt.is_undefined() {
        return Err(JsError::type_error("Constructor DataView requires 'new'"));
    }
    let buffer = arg(args, 0);
    let Some((buffer_obj, data)) = buffer.as_object().and_then(|o| buffer_store(o).map(|d| (o.clone(), d))) else {
        return Err(JsError::type_error("First argument to DataView constructor must be an ArrayBuffer"));
    };
    let offset = interp.to_index(&arg(args, 1), "DataView offset")?;
    let buffer_len = data.borrow().len();
    if offset > buffer_len {
        return Err(JsError::range_error(format!(
            "Start offset {offset} is outside the bounds of the buffer"
        )));
    }
    let byte_length = match arg(args, 2) {
        JsValue::Undefined => buffer_len - offset,
        len => {
            let len = interp.to_index(&len, "DataView length")?;
            if offset + len > buffer_len {
                return Err(JsError::range_error(format!("Invalid DataView length {len}")));
            }
            len
        }
    };
    let proto = interp.get_prototype_from_constructor(&nt, Intrinsic::DataViewPrototype)?;
    let view = DataViewData {
        buffer: buffer_obj,
        data,
        byte_offset: offset,
        byte_length,
    };
    Ok(JsValue::Object(interp.alloc(JsObject::new(ObjectKind::DataView(Box::new(view)), Some(proto)))))
}

/// (buffer, bytes, offset, length) of a DataView receiver
fn this_data_view(this: &JsValue, method: &str) -> Result<(JsObjectRef, ByteStore, usize, usize), JsError> {
    if let JsValue::Object(o) = this {
        if let ObjectKind::DataView(dv) = &o.borrow().kind {
            return Ok((dv.buffer.clone(), dv.data.clone(), dv.byte_offset, dv.byte_length));
        }
    }
    Err(JsError::type_error(format!(
        "Method DataView.prototype.{method} called on incompatible receiver {}",
        this.display_hint()
    )))
}

fn data_view_buffer(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (buffer, ..) = this_data_view(&this, "buffer")?;
    Ok(JsValue::Object(buffer))
}

fn data_view_byte_length(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (.., len) = this_data_view(&this, "byteLength")?;
    Ok(JsValue::from(len))
}

fn data_view_byte_offset(_interp: &mut Interpreter, this: JsValue, _args: &[JsValue]) -> Result<JsValue, JsError> {
    let (_, _, offset, _) = this_data_view(&this, "byteOffset")?;
    Ok(JsValue::from(offset))
}

/// `GetViewValue`
fn get_view_value(
    interp: &mut Interpreter,
    this: &JsValue,
    args: &[JsValue],
    kind: TypedArrayKind,
    method: &str,
) -> Result<JsValue, JsError> {
    let (_, data, offset, len) = this_data_view(this, method)?;
    let index = interp.to_index(&arg(args, 0), "DataView index")?;
    let little_endian = arg(args, 1).to_boolean();
    let size = kind.element_size();
    if index + size > len {
        return Err(JsError::range_error("Offset is outside the bounds of the DataView"));
    }
    let start = offset + index;
    let mut bytes = data
        .borrow()
        .get(start..start + size)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| JsError::range_error("Offset is outside the bounds of the DataView"))?;
    if !little_endian {
        bytes.reverse();
    }
    Ok(kind.decode(&bytes).map(JsValue::number).unwrap_or_default())
}

/// `SetViewValue`
fn set_view_value(
    interp: &mut Interpreter,
    this: &JsValue,
    args: &[JsValue],
    kind: TypedArrayKind,
    method: &str,
) -> Result<JsValue, JsError> {
    let (_, data, offset, len) = this_data_view(this, method)?;
    let index = interp.to_index(&arg(args, 0), "DataView index")?;
    let n = interp.to_number(&arg(args, 1))?;
    let little_endian = arg(args, 2).to_boolean();
    let size = kind.element_size();
    if index + size > len {
        return Err(JsError::range_error("Offset is outside the bounds of the DataView"));
    }
    let mut bytes = kind.encode(n);
    if !little_endian {
        bytes.reverse();
    }
    let start = offset + index;
    if let Some(slot) = data.borrow_mut().get_mut(start..start + size) {
        slot.copy_from_slice(&bytes);
    }
    Ok(JsValue::Undefined)
}

macro_rules! data_view_accessors {
    ($($get:ident, $set:ident => $kind:ident, $get_name:literal, $set_name:literal;)*) => {
        $(
            fn $get(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                get_view_value(interp, &this, args, TypedArrayKind::$kind, $get_name)
            }

            fn $set(interp: &mut Interpreter, this: JsValue, args: &[JsValue]) -> Result<JsValue, JsError> {
                set_view_value(interp, &this, args, TypedArrayKind::$kind, $set_name)
            }
        )*
    };
}

data_view_accessors! {
    data_view_get_int8, data_view_set_int8 => Int8, "getInt8", "setInt8";
    data_view_get_uint8, data_view_set_uint8 => Uint8, "getUint8", "setUint8";
    data_view_get_int16, data_view_set_int16 => Int16, "getInt16", "setInt16";
    data_view_get_uint16, data_view_set_uint16 => Uint16, "getUint16", "setUint16";
    data_view_get_int32, data_view_set_int32 => Int32, "getInt32", "setInt32";
    data_view_get_uint32, data_view_set_uint32 => Uint32, "getUint32", "setUint32";
    data_view_get_float32, data_view_set_float32 => Float32, "getFloat32", "setFloat32";
    data_view_get_float64, data_view_set_float64 => Float64, "getFloat64", "setFloat64";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamped_conversion_rounds_half_to_even() {
        assert_eq!(clamp_u8(1.5), 2);
        assert_eq!(clamp_u8(2.5), 2);
        assert_eq!(clamp_u8(-3.0), 0);
        assert_eq!(clamp_u8(300.0), 255);
        assert_eq!(clamp_u8(f64::NAN), 0);
    }

    #[test]
    fn integer_kinds_wrap() {
        assert_eq!(TypedArrayKind::Int8.decode(&TypedArrayKind::Int8.encode(200.0)), Some(-56.0));
        assert_eq!(TypedArrayKind::Uint16.decode(&TypedArrayKind::Uint16.encode(-1.0)), Some(65535.0));
    }

    #[test]
    fn views_share_the_buffer() {
        let mut interp = Interpreter::new(0, false);
        let proto = interp.intrinsic(Intrinsic::Uint8ArrayPrototype);
        let Ok(bytes) = create_with_length(&mut interp, TypedArrayKind::Uint8, 4, proto) else {
            panic!("allocation failed");
        };
        let Ok(()) = set_element(&mut interp, &bytes, 0.0, &JsValue::from(1)) else {
            panic!("set failed");
        };
        let view = match &bytes.borrow().kind {
            ObjectKind::TypedArray(ta) => TypedArrayData {
                kind: TypedArrayKind::Uint16,
                length: 2,
                ..(**ta).clone()
            },
            _ => panic!("not a typed array"),
        };
        assert_eq!(view.read(0), Some(1.0));
        view.write(1, 258.0);
        assert_eq!(get_element(&bytes.borrow(), 2.0), Some(JsValue::from(2)));
        assert_eq!(get_element(&bytes.borrow(), 3.0), Some(JsValue::from(1)));
    }

    #[test]
    fn non_integral_keys_are_out_of_range() {
        let mut interp = Interpreter::new(0, false);
        let proto = interp.intrinsic(Intrinsic::Float64ArrayPrototype);
        let Ok(arr) = create_with_length(&mut interp, TypedArrayKind::Float64, 2, proto) else {
            panic!("allocation failed");
        };
        let o = arr.borrow();
        assert!(has_element(&o, 1.0));
        assert!(!has_element(&o, 1.5));
        assert!(!has_element(&o, -0.0));
        assert!(!has_element(&o, 2.0));
        assert_eq!(element_count(&o), 2);
    }

    #[test]
    fn numeric_sort_order() {
        let mut v = vec![3.0, f64::NAN, -0.0, 0.0, -1.0];
        v.sort_by(|a, b| numeric_order(*a, *b));
        assert_eq!(v.get(0), Some(&-1.0));
        assert!(v.get(1).is_some_and(|z| *z == 0.0 && z.is_sign_negative()));
        assert!(v.get(4).is_some_and(|n| n.is_nan()));
    }
}
