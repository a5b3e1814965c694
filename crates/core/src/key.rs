use std::fmt;

use uuid::Uuid;

use crate::error::CoreError;

/// One column's worth of a legacy or new-system identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyValue {
    Integer(i64),
    Text(String),
}

impl KeyValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            KeyValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            KeyValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            KeyValue::Integer(_) => "integer",
            KeyValue::Text(_) => "text",
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::Integer(n) => write!(f, "{n}"),
            KeyValue::Text(s) => write!(f, "{s}"),
        }
    }
}

/// A legacy or new-system identifier that flattens to an ordered list of
/// column values. Composite identifiers are tuples of keys.
pub trait MappingKey: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Number of columns this key occupies.
    const ARITY: usize;

    fn push_values(&self, out: &mut Vec<KeyValue>);

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError>;

    fn key_values(&self) -> Vec<KeyValue> {
        let mut out = Vec::with_capacity(Self::ARITY);
        self.push_values(&mut out);
        out
    }
}

fn check_arity(values: &[KeyValue], expected: usize) -> Result<(), CoreError> {
    if values.len() != expected {
        return Err(CoreError::InvalidData(format!(
            "expected {expected} key column(s), got {}",
            values.len()
        )));
    }
    Ok(())
}

fn single(values: &[KeyValue]) -> Result<&KeyValue, CoreError> {
    check_arity(values, 1)?;
    Ok(&values[0])
}

fn kind_mismatch(expected: &str, got: &KeyValue) -> CoreError {
    CoreError::InvalidData(format!("expected {expected} key, got {}", got.kind_name()))
}

impl MappingKey for i64 {
    const ARITY: usize = 1;

    fn push_values(&self, out: &mut Vec<KeyValue>) {
        out.push(KeyValue::Integer(*self));
    }

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError> {
        let value = single(values)?;
        value.as_integer().ok_or_else(|| kind_mismatch("integer", value))
    }
}

impl MappingKey for i32 {
    const ARITY: usize = 1;

    fn push_values(&self, out: &mut Vec<KeyValue>) {
        out.push(KeyValue::Integer(i64::from(*self)));
    }

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError> {
        let value = single(values)?;
        let n = value.as_integer().ok_or_else(|| kind_mismatch("integer", value))?;
        i32::try_from(n).map_err(|_| CoreError::validation("key", format!("{n} out of range for i32")))
    }
}

impl MappingKey for String {
    const ARITY: usize = 1;

    fn push_values(&self, out: &mut Vec<KeyValue>) {
        out.push(KeyValue::Text(self.clone()));
    }

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError> {
        let value = single(values)?;
        value
            .as_text()
            .map(str::to_string)
            .ok_or_else(|| kind_mismatch("text", value))
    }
}

impl MappingKey for Uuid {
    const ARITY: usize = 1;

    fn push_values(&self, out: &mut Vec<KeyValue>) {
        out.push(KeyValue::Text(self.to_string()));
    }

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError> {
        let value = single(values)?;
        let text = value.as_text().ok_or_else(|| kind_mismatch("uuid", value))?;
        Uuid::parse_str(text)
            .map_err(|e| CoreError::validation("key", format!("invalid uuid {text:?}: {e}")))
    }
}

impl<A: MappingKey, B: MappingKey> MappingKey for (A, B) {
    const ARITY: usize = A::ARITY + B::ARITY;

    fn push_values(&self, out: &mut Vec<KeyValue>) {
        self.0.push_values(out);
        self.1.push_values(out);
    }

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError> {
        check_arity(values, Self::ARITY)?;
        let (a, b) = values.split_at(A::ARITY);
        Ok((A::from_key_values(a)?, B::from_key_values(b)?))
    }
}

impl<A: MappingKey, B: MappingKey, C: MappingKey> MappingKey for (A, B, C) {
    const ARITY: usize = A::ARITY + B::ARITY + C::ARITY;

    fn push_values(&self, out: &mut Vec<KeyValue>) {
        self.0.push_values(out);
        self.1.push_values(out);
        self.2.push_values(out);
    }

    fn from_key_values(values: &[KeyValue]) -> Result<Self, CoreError> {
        check_arity(values, Self::ARITY)?;
        let (a, rest) = values.split_at(A::ARITY);
        let (b, c) = rest.split_at(B::ARITY);
        Ok((
            A::from_key_values(a)?,
            B::from_key_values(b)?,
            C::from_key_values(c)?,
        ))
    }
}
