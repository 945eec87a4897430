use serde_json::Value;

/// Conversion from a document leaf to a typed value.
///
/// `None` means "cannot represent" — a missing narrowing, a type mismatch,
/// a poisoned array element — and callers turn it into their default.
/// Booleans are not numbers here, and floating-point leaves do not narrow
/// to integers.
pub trait FromValue: Sized {
    fn from_value(v: &Value) -> Option<Self>;
}

impl FromValue for i64 {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_i64()
    }
}

impl FromValue for i32 {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_i64()?.try_into().ok()
    }
}

impl FromValue for u64 {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_u64()
    }
}

impl FromValue for u32 {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_u64()?.try_into().ok()
    }
}

impl FromValue for usize {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_u64()?.try_into().ok()
    }
}

impl FromValue for f64 {
    fn from_value(v: &Value) -> Option<Self> {
        // Any numeric leaf converts to floating point.
        v.as_f64()
    }
}

impl FromValue for f32 {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_f64().map(|x| x as f32)
    }
}

impl FromValue for bool {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_bool()
    }
}

impl FromValue for String {
    fn from_value(v: &Value) -> Option<Self> {
        v.as_str().map(str::to_owned)
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(v: &Value) -> Option<Self> {
        // One unconvertible element poisons the whole vector.
        v.as_array()?.iter().map(T::from_value).collect()
    }
}
