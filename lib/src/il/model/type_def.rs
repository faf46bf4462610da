use super::{FieldId, MethodId, TypeId};
use crate::il::TypeFlags;

/// Semantic representation of a type definition
#[derive(Clone, Debug, PartialEq)]
pub struct TypeDef {
    /// Empty for nested types (they are qualified through their declaring type)
    pub namespace: String,
    pub name: String,
    pub flags: TypeFlags,

    /// Enclosing type, for nested types
    pub declaring_type: Option<TypeId>,

    /// Methods in declaration order (overloads share a name)
    pub methods: Vec<MethodId>,

    /// Fields in declaration order (names are unique within a type)
    pub fields: Vec<FieldId>,

    pub nested_types: Vec<TypeId>,
}

impl TypeDef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, flags: TypeFlags) -> TypeDef {
        TypeDef {
            namespace: namespace.into(),
            name: name.into(),
            flags,
            declaring_type: None,
            methods: vec![],
            fields: vec![],
            nested_types: vec![],
        }
    }

    pub fn is_external(&self) -> bool {
        self.flags.contains(TypeFlags::EXTERNAL)
    }

    pub fn is_value_type(&self) -> bool {
        self.flags.contains(TypeFlags::VALUE_TYPE)
    }
}
