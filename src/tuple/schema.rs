use std::fmt::Display;

/// Maximum number of bytes of a text value.
pub const STRING_LEN: usize = 128;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeId {
    Boolean,
    Integer,
    Text,
}

impl TypeId {
    /// Number of bytes a value of this type occupies on a page.
    pub fn size(&self) -> usize {
        match self {
            TypeId::Boolean => 1,
            TypeId::Integer => 4,
            // length prefix followed by the zero padded string
            TypeId::Text => 4 + STRING_LEN,
        }
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug)]
pub struct FieldItem {
    type_id: TypeId,
    name: Option<String>,
}

impl FieldItem {
    pub fn new(type_id: TypeId, name: Option<String>) -> Self {
        Self { type_id, name }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Display for FieldItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.type_id, self.name().unwrap_or("null"))
    }
}

/// Describes the fields of the tuples of a table.
///
/// Two descriptors are equal if their field types are, names are ignored.
#[derive(Clone, Debug)]
pub struct TupleDesc {
    fields: Vec<FieldItem>,
}

impl TupleDesc {
    pub fn new(fields: Vec<FieldItem>) -> Self {
        Self { fields }
    }

    /// A descriptor with named fields.
    pub fn named(fields: &[(TypeId, &str)]) -> Self {
        Self::new(
            fields
                .iter()
                .map(|(type_id, name)| FieldItem::new(*type_id, Some((*name).to_owned())))
                .collect(),
        )
    }

    /// A descriptor with anonymous fields.
    pub fn from_types(types: &[TypeId]) -> Self {
        Self::new(
            types
                .iter()
                .map(|type_id| FieldItem::new(*type_id, None))
                .collect(),
        )
    }

    pub fn fields(&self) -> &[FieldItem] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_type(&self, i: usize) -> Option<TypeId> {
        self.fields.get(i).map(FieldItem::type_id)
    }

    pub fn field_name(&self, i: usize) -> Option<&str> {
        self.fields.get(i).and_then(FieldItem::name)
    }

    /// Returns the position of the first field with the given name.
    pub fn field_name_to_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name() == Some(name))
    }

    /// Number of bytes a tuple of this descriptor occupies on a page.
    pub fn byte_size(&self) -> usize {
        self.fields.iter().map(|field| field.type_id().size()).sum()
    }

    /// Concatenates the fields of two descriptors.
    pub fn merge(first: &TupleDesc, second: &TupleDesc) -> TupleDesc {
        let mut fields = first.fields.clone();
        fields.extend(second.fields.iter().cloned());
        TupleDesc::new(fields)
    }
}

impl PartialEq for TupleDesc {
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.type_id() == b.type_id())
    }
}

impl Eq for TupleDesc {}

impl Display for TupleDesc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields = self
            .fields
            .iter()
            .map(|field| field.to_string())
            .collect::<Vec<_>>();
        write!(f, "{}", fields.join(","))
    }
}
