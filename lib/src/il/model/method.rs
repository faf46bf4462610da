use super::{MethodBody, TypeId};
use crate::il::{MethodFlags, MethodSig};

/// Name shared by all instance constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";

/// Semantic representation of a method
#[derive(Clone, Debug, PartialEq)]
pub struct MethodDef {
    pub declaring_type: TypeId,
    pub name: String,
    pub flags: MethodFlags,
    pub signature: MethodSig,

    /// Abstract methods and methods of external types have no body
    pub body: Option<MethodBody>,
}

impl MethodDef {
    pub fn is_static(&self) -> bool {
        self.flags.contains(MethodFlags::STATIC)
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME && !self.is_static()
    }

    /// Number of argument slots, including `this` for instance methods
    pub fn argument_count(&self) -> usize {
        self.signature.params.len() + if self.is_static() { 0 } else { 1 }
    }
}
