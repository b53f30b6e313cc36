//! Value: typed field contents of records.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::record::Record;
use crate::registry::TypeId;

/// Id stored by pointers that have no target.
pub const NULL_POINTER_ID: &str = "object0";

/// Coarse kind of a value, as selected by the low bits of a type's format.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    Pointer,
    Array,
    Record,
}

impl ValueKind {
    /// Map a tagfile type format onto a value kind. Void and opaque formats
    /// have no editable representation and map to `None`.
    pub fn from_format(format: u32) -> Option<Self> {
        match format & 0x1f {
            2 => Some(ValueKind::Bool),
            3 => Some(ValueKind::String),
            4 => Some(ValueKind::Int),
            5 => Some(ValueKind::Float),
            6 => Some(ValueKind::Pointer),
            7 => Some(ValueKind::Record),
            8 => Some(ValueKind::Array),
            _ => None,
        }
    }

    /// Element tag used for this kind in the backing document.
    pub fn tag(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "integer",
            ValueKind::Float => "real",
            ValueKind::String => "string",
            ValueKind::Pointer => "pointer",
            ValueKind::Array => "array",
            ValueKind::Record => "record",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "bool" => Some(ValueKind::Bool),
            "integer" => Some(ValueKind::Int),
            "real" => Some(ValueKind::Float),
            "string" => Some(ValueKind::String),
            "pointer" => Some(ValueKind::Pointer),
            "array" => Some(ValueKind::Array),
            "record" => Some(ValueKind::Record),
            _ => None,
        }
    }

    pub fn is_scalar(self) -> bool {
        !matches!(self, ValueKind::Array | ValueKind::Record)
    }
}

/// Attribute text a real was loaded with.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealText {
    pub dec: String,
    pub hex: Option<String>,
}

/// Floating point value. Keeps the text it was loaded with so unchanged
/// documents are written back exactly; new values are encoded on save.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Real {
    value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<RealText>,
}

/// Bitwise, so `0.0` and `-0.0` differ.
impl PartialEq for Real {
    fn eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits()
    }
}

impl Real {
    pub fn new(value: f64) -> Self {
        Real { value, text: None }
    }

    /// Decode a `real` element's attributes. Accepts both `,` and `.` as the
    /// decimal separator.
    pub fn from_encoded(dec: &str, hex: Option<&str>) -> Option<Self> {
        let value = parse_decimal(dec)?;
        Some(Real {
            value,
            text: Some(RealText {
                dec: dec.to_string(),
                hex: hex.map(str::to_string),
            }),
        })
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn loaded_text(&self) -> Option<&RealText> {
        self.text.as_ref()
    }

    /// `dec`/`hex` attribute values for writing: the loaded text when present,
    /// otherwise a fresh encoding.
    pub fn encode(&self, decimal_comma: bool) -> RealText {
        if let Some(text) = &self.text {
            return text.clone();
        }
        let mut dec = format_float(self.value);
        if decimal_comma {
            dec = dec.replace('.', ",");
        }
        RealText {
            dec,
            hex: Some(format!("#{:016x}", self.value.to_bits())),
        }
    }
}

/// Parse a decimal that may use a comma as separator.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse::<f64>().ok()
}

/// Shortest round-trip representation, always with a fractional part.
pub fn format_float(v: f64) -> String {
    let s = format!("{v}");
    if v.is_finite() && !s.contains('.') {
        format!("{s}.0")
    } else {
        s
    }
}

/// Weak by-id reference to another record.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    id: String,
}

impl Default for Pointer {
    fn default() -> Self {
        Pointer::null()
    }
}

impl Pointer {
    pub fn null() -> Self {
        Pointer {
            id: NULL_POINTER_ID.to_string(),
        }
    }

    /// Pointer to `id`; an empty id produces a null pointer.
    pub fn to(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.is_empty() {
            Pointer::null()
        } else {
            Pointer { id }
        }
    }

    pub fn is_set(&self) -> bool {
        self.id != NULL_POINTER_ID
    }

    /// Target id, `None` when unset. The target may not exist (dangling).
    pub fn target(&self) -> Option<&str> {
        self.is_set().then_some(self.id.as_str())
    }

    /// Stored id including the null sentinel.
    pub fn raw_id(&self) -> &str {
        &self.id
    }

    /// Look the target up in the container. Unset and dangling pointers resolve to `None`.
    pub fn resolve<'b>(&self, behavior: &'b crate::Behavior) -> Option<&'b Record> {
        self.target().and_then(|id| behavior.get(id))
    }
}

/// Homogeneous sequence of values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Array {
    pub element_type_id: TypeId,
    pub element_kind: ValueKind,
    pub items: Vec<Value>,
}

impl Array {
    pub fn new(element_type_id: impl Into<String>, element_kind: ValueKind) -> Self {
        Array {
            element_type_id: element_type_id.into(),
            element_kind,
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<Value>) -> Self {
        self.items = items;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.items.iter()
    }

    pub fn is_pointer_array(&self) -> bool {
        self.element_kind == ValueKind::Pointer
    }

    /// Index of the first set pointer that follows an unset one. Null pointers
    /// are only expected as a trailing run.
    pub fn first_non_terminal_null(&self) -> Option<usize> {
        if !self.is_pointer_array() {
            return None;
        }
        let mut seen_null = false;
        for (idx, item) in self.items.iter().enumerate() {
            if let Value::Pointer(p) = item {
                if !p.is_set() {
                    seen_null = true;
                } else if seen_null {
                    return Some(idx);
                }
            }
        }
        None
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(Real),
    String(String),
    Pointer(Pointer),
    Array(Array),
    Record(Record),
}

impl Value {
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::String(_) => ValueKind::String,
            Value::Pointer(_) => ValueKind::Pointer,
            Value::Array(_) => ValueKind::Array,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Default for a scalar kind: `false`, `0`, `0.0`, empty string, null pointer.
    pub fn default_for(kind: ValueKind) -> Option<Value> {
        match kind {
            ValueKind::Bool => Some(Value::Bool(false)),
            ValueKind::Int => Some(Value::Int(0)),
            ValueKind::Float => Some(Value::Float(Real::new(0.0))),
            ValueKind::String => Some(Value::String(String::new())),
            ValueKind::Pointer => Some(Value::Pointer(Pointer::null())),
            ValueKind::Array | ValueKind::Record => None,
        }
    }

    /// Text used by queries. Containers join the text of their leaves with spaces.
    pub fn text(&self) -> Cow<'_, str> {
        match self {
            Value::Bool(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(r) => Cow::Owned(format_float(r.value())),
            Value::String(s) => Cow::Borrowed(s.as_str()),
            Value::Pointer(p) => Cow::Borrowed(p.raw_id()),
            Value::Array(a) => Cow::Owned(
                a.items
                    .iter()
                    .map(|v| v.text())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            Value::Record(r) => Cow::Owned(r.text()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(r) => Some(r.value()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<&Pointer> {
        match self {
            Value::Pointer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_array_mut(&mut self) -> Option<&mut Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(Real::new(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Pointer> for Value {
    fn from(v: Pointer) -> Self {
        Value::Pointer(v)
    }
}

impl From<Record> for Value {
    fn from(v: Record) -> Self {
        Value::Record(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_low_bits_select_kind() {
        assert_eq!(ValueKind::from_format(8194), Some(ValueKind::Bool));
        assert_eq!(ValueKind::from_format(131), Some(ValueKind::String));
        assert_eq!(ValueKind::from_format(33284), Some(ValueKind::Int));
        assert_eq!(ValueKind::from_format(1525253), Some(ValueKind::Float));
        assert_eq!(ValueKind::from_format(6), Some(ValueKind::Pointer));
        assert_eq!(ValueKind::from_format(7), Some(ValueKind::Record));
        assert_eq!(ValueKind::from_format(1064), Some(ValueKind::Array));
        assert_eq!(ValueKind::from_format(0), None);
        assert_eq!(ValueKind::from_format(1), None);
    }

    #[test]
    fn real_keeps_loaded_text_and_encodes_new_values() {
        let loaded = Real::from_encoded("0,500000", Some("#3fe0000000000000")).unwrap();
        assert_eq!(loaded.value(), 0.5);
        assert_eq!(loaded.encode(false).dec, "0,500000");

        let fresh = Real::new(1.5);
        let text = fresh.encode(true);
        assert_eq!(text.dec, "1,5");
        assert_eq!(text.hex.as_deref(), Some("#3ff8000000000000"));
        assert_eq!(Real::new(2.0).encode(false).dec, "2.0");
        assert_eq!(loaded, Real::new(0.5));
    }

    #[test]
    fn pointer_null_sentinel() {
        let p = Pointer::to("");
        assert!(!p.is_set());
        assert_eq!(p.raw_id(), NULL_POINTER_ID);
        assert_eq!(p.target(), None);
        assert_eq!(Pointer::to("object7").target(), Some("object7"));
    }

    #[test]
    fn pointer_arrays_only_allow_trailing_nulls() {
        let ptrs = |ids: &[&str]| {
            Array::new("type5", ValueKind::Pointer)
                .with_items(ids.iter().map(|id| Value::Pointer(Pointer::to(*id))).collect())
        };
        assert_eq!(ptrs(&["object1", "", ""]).first_non_terminal_null(), None);
        assert_eq!(ptrs(&["object1", "", "object2"]).first_non_terminal_null(), Some(2));
        assert_eq!(ptrs(&[]).first_non_terminal_null(), None);
    }

    #[test]
    fn value_serializes_tagged() {
        let json = serde_json::to_value(Value::Int(3)).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "int", "data": 3 }));
    }
}
