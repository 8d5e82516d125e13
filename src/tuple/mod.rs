use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;

use self::{schema::TupleDesc, value::Value};
use crate::common::RecordId;
use crate::error::DbError;

pub mod schema;
pub mod value;

/// A row of a table. Its values always match its descriptor.
#[derive(Clone, Debug)]
pub struct Tuple {
    desc: Arc<TupleDesc>,
    values: Vec<Value>,
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple, checking field count, field types and value sizes.
    pub fn new(desc: Arc<TupleDesc>, values: Vec<Value>) -> Result<Self> {
        if values.len() != desc.len() {
            return Err(DbError::SchemaMismatch(format!(
                "expected {} values, got {}",
                desc.len(),
                values.len()
            ))
            .into());
        }
        for (i, (value, field)) in values.iter().zip(desc.fields()).enumerate() {
            if value.type_id() != field.type_id() {
                return Err(DbError::SchemaMismatch(format!(
                    "field {i} is of type {}, got {}",
                    field.type_id(),
                    value.type_id()
                ))
                .into());
            }
            value.check_size()?;
        }

        Ok(Self {
            desc,
            values,
            record_id: None,
        })
    }

    /// Assembles a tuple read from a page, whose values are known to match `desc`.
    pub(crate) fn from_stored(desc: Arc<TupleDesc>, values: Vec<Value>, record_id: RecordId) -> Self {
        debug_assert_eq!(values.len(), desc.len());
        Self {
            desc,
            values,
            record_id: Some(record_id),
        }
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, i: usize) -> Option<&Value> {
        self.values.get(i)
    }

    /// Where the tuple is stored. Only set once the tuple was read from or written to a page.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    /// Concatenates two tuples. The result is not stored anywhere, so it has no record id.
    pub fn merge(first: &Tuple, second: &Tuple) -> Tuple {
        let desc = Arc::new(TupleDesc::merge(&first.desc, &second.desc));
        let mut values = first.values.clone();
        values.extend(second.values.iter().cloned());
        Tuple {
            desc,
            values,
            record_id: None,
        }
    }

    pub fn as_str(&self, i: usize) -> &str {
        self.values[i].as_str()
    }

    pub fn as_i32(&self, i: usize) -> i32 {
        self.values[i].as_i32()
    }

    pub fn as_bool(&self, i: usize) -> bool {
        self.values[i].as_bool()
    }
}

/// Tuples are equal if their values are. Descriptors and record ids are not compared.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values = self
            .values
            .iter()
            .map(|value| value.to_string())
            .collect::<Vec<_>>();
        write!(f, "{}", values.join("\t"))
    }
}
