//! Value capabilities understood by the memory store.
//!
//! Stores are generic over their value type. Two optional capabilities refine
//! how a value is treated:
//!
//! - [`CacheValue::size_hint`] lets large payloads weigh more than trivial
//!   ones against `max_size`. Types that do not override it count as 1.
//! - [`Counter`] enables `increase`/`decrease` for integer-like values.

use bytes::Bytes;

/// A value that can live in a [`MemoryStore`](super::MemoryStore).
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// Weight of this value against the store's `max_size`.
    fn size_hint(&self) -> i64 {
        1
    }
}

/// In-place integer adjustment.
pub trait Counter {
    /// Add `delta` to the value. Returns false when the value is not an
    /// integer kind and was left untouched.
    fn adjust(&mut self, delta: i64) -> bool;
}

macro_rules! unit_sized {
    ($($ty:ty),* $(,)?) => {
        $(impl CacheValue for $ty {})*
    };
}

unit_sized!(bool, f32, f64, char, String, &'static str);

macro_rules! integer_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CacheValue for $ty {}

            impl Counter for $ty {
                fn adjust(&mut self, delta: i64) -> bool {
                    *self = (*self as i64).wrapping_add(delta) as $ty;
                    true
                }
            }
        )*
    };
}

integer_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl CacheValue for Bytes {
    fn size_hint(&self) -> i64 {
        self.len() as i64
    }
}

impl CacheValue for Vec<u8> {
    fn size_hint(&self) -> i64 {
        self.len() as i64
    }
}

impl<T: CacheValue> CacheValue for std::sync::Arc<T> {
    fn size_hint(&self) -> i64 {
        (**self).size_hint()
    }
}

/// Tagged value for stores that hold heterogeneous data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Text(String),
    Bytes(Bytes),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Uint(value) => i64::try_from(*value).ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl CacheValue for Value {
    fn size_hint(&self) -> i64 {
        match self {
            Self::Bytes(bytes) => bytes.size_hint(),
            _ => 1,
        }
    }
}

impl Counter for Value {
    fn adjust(&mut self, delta: i64) -> bool {
        match self {
            Self::Int(value) => value.adjust(delta),
            Self::Uint(value) => value.adjust(delta),
            _ => false,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u64> for Value {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<Bytes> for Value {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_values_weigh_one() {
        assert_eq!("London".to_string().size_hint(), 1);
        assert_eq!(42_u32.size_hint(), 1);
        assert_eq!(Value::from("Paris").size_hint(), 1);
    }

    #[test]
    fn byte_payloads_weigh_their_length() {
        assert_eq!(Bytes::from_static(b"hello").size_hint(), 5);
        assert_eq!(Value::Bytes(Bytes::from_static(b"abc")).size_hint(), 3);
    }

    #[test]
    fn only_integer_variants_count() {
        let mut visitors = Value::from(41_i64);
        assert!(visitors.adjust(1));
        assert_eq!(visitors, Value::Int(42));

        let mut unsigned = Value::Uint(1);
        assert!(unsigned.adjust(-1));
        assert_eq!(unsigned, Value::Uint(0));

        let mut text = Value::from("x");
        assert!(!text.adjust(1));
        assert_eq!(text, Value::from("x"));
    }
}
