use std::fmt::Display;

use super::schema::{TypeId, STRING_LEN};
use crate::error::DbError;
use crate::storage::common::{Deserializer, Serializer};

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Value {
    Boolean(bool),
    Integer(i32),
    String(String),
}

impl Value {
    /// Parses a value of the given type from its fixed width representation.
    pub fn parse_value(deserializer: &mut Deserializer, type_id: TypeId) -> Self {
        match type_id {
            TypeId::Boolean => Value::Boolean(deserializer.deserialize_u8() == 1),
            TypeId::Integer => Value::Integer(deserializer.deserialize_i32()),
            TypeId::Text => {
                let len = (deserializer.deserialize_u32() as usize).min(STRING_LEN);
                let bytes = deserializer.take_bytes(STRING_LEN);
                Value::String(String::from_utf8_lossy(&bytes[..len]).into_owned())
            }
        }
    }

    /// Writes the fixed width representation of the value, `type_id().size()` bytes.
    pub fn serialize_value(&self, serializer: &mut Serializer) {
        match self {
            Value::Boolean(b) => serializer.serialize_u8(*b as u8),
            Value::Integer(val) => serializer.serialize_i32(*val),
            Value::String(val) => {
                let bytes = val.as_bytes();
                serializer.serialize_u32(bytes.len() as u32);
                serializer.copy_bytes(bytes);
                serializer.pad(STRING_LEN - bytes.len());
            }
        }
    }

    pub fn type_id(&self) -> TypeId {
        match self {
            Value::Boolean(_) => TypeId::Boolean,
            Value::Integer(_) => TypeId::Integer,
            Value::String(_) => TypeId::Text,
        }
    }

    /// Rejects values which do not fit into their fixed width slot.
    pub fn check_size(&self) -> Result<(), DbError> {
        match self {
            Value::String(val) if val.len() > STRING_LEN => Err(DbError::ValueTooLarge {
                size: val.len(),
                limit: STRING_LEN,
            }),
            _ => Ok(()),
        }
    }

    pub fn as_str(&self) -> &str {
        match &self {
            Value::String(val) => val,
            _ => unreachable!(),
        }
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            Value::Integer(val) => *val,
            _ => unreachable!(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Boolean(val) => *val,
            _ => unreachable!(),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(val) => write!(f, "{val}"),
            Value::Integer(val) => write!(f, "{val}"),
            Value::String(val) => write!(f, "{val}"),
        }
    }
}
