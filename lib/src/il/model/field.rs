use super::TypeId;
use crate::il::{FieldFlags, TypeSig};

/// Semantic representation of a field
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub declaring_type: TypeId,
    pub name: String,
    pub flags: FieldFlags,
    pub field_type: TypeSig,
}

impl FieldDef {
    pub fn is_static(&self) -> bool {
        self.flags.contains(FieldFlags::STATIC)
    }
}
