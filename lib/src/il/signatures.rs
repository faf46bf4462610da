use super::model::{Module, TypeId};
use super::{Deserialize, Error, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Type as it appears in signatures: fields, locals, parameters, return types, and type operands
///
/// The tags used when (de)serializing are the ECMA-335 element types.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeSig {
    Void,
    Boolean,
    Char,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    IntPtr,
    String,
    Object,

    /// Reference type defined in the module type table
    Class(TypeId),

    /// Value type defined in the module type table
    ValueType(TypeId),

    /// Single-dimensional, zero-based array
    SzArray(Box<TypeSig>),

    /// Generic parameter of the enclosing type
    Var(u16),

    /// Generic parameter of the enclosing method
    MVar(u16),
}

impl TypeSig {
    pub fn is_void(&self) -> bool {
        matches!(self, TypeSig::Void)
    }

    /// Type table entry referred to, if any
    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            TypeSig::Class(id) | TypeSig::ValueType(id) => Some(*id),
            _ => None,
        }
    }

    /// Render in C#-like syntax, resolving type table entries to their qualified names
    pub fn render(&self, module: &Module) -> String {
        match self {
            TypeSig::Void => String::from("void"),
            TypeSig::Boolean => String::from("bool"),
            TypeSig::Char => String::from("char"),
            TypeSig::Int8 => String::from("sbyte"),
            TypeSig::UInt8 => String::from("byte"),
            TypeSig::Int16 => String::from("short"),
            TypeSig::UInt16 => String::from("ushort"),
            TypeSig::Int32 => String::from("int"),
            TypeSig::UInt32 => String::from("uint"),
            TypeSig::Int64 => String::from("long"),
            TypeSig::UInt64 => String::from("ulong"),
            TypeSig::Float32 => String::from("float"),
            TypeSig::Float64 => String::from("double"),
            TypeSig::IntPtr => String::from("nint"),
            TypeSig::String => String::from("string"),
            TypeSig::Object => String::from("object"),
            TypeSig::Class(id) | TypeSig::ValueType(id) => module.type_name(*id),
            TypeSig::SzArray(elem) => format!("{}[]", elem.render(module)),
            TypeSig::Var(idx) => format!("!{}", idx),
            TypeSig::MVar(idx) => format!("!!{}", idx),
        }
    }

    /// Visit every type table entry mentioned (used to validate loaded modules)
    pub fn referenced_types(&self, found: &mut Vec<TypeId>) {
        match self {
            TypeSig::Class(id) | TypeSig::ValueType(id) => found.push(*id),
            TypeSig::SzArray(elem) => elem.referenced_types(found),
            _ => (),
        }
    }
}

/// Method parameter
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub sig: TypeSig,
}

impl Param {
    pub fn new(name: impl Into<String>, sig: TypeSig) -> Param {
        Param {
            name: name.into(),
            sig,
        }
    }
}

/// Method signature
///
/// Whether the method takes an implicit `this` argument is decided by the method flags, not by
/// the signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSig {
    pub return_type: TypeSig,
    pub params: Vec<Param>,
    pub generic_params: Vec<String>,
}

impl MethodSig {
    pub fn new(return_type: TypeSig, params: Vec<Param>) -> MethodSig {
        MethodSig {
            return_type,
            params,
            generic_params: vec![],
        }
    }

    /// Do two signatures accept and produce the same types? (Parameter names are ignored.)
    pub fn same_shape(&self, other: &MethodSig) -> bool {
        self.return_type == other.return_type
            && self.generic_params.len() == other.generic_params.len()
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(p1, p2)| p1.sig == p2.sig)
    }
}

impl Serialize for TypeSig {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            TypeSig::Void => 0x01u8.serialize(writer),
            TypeSig::Boolean => 0x02u8.serialize(writer),
            TypeSig::Char => 0x03u8.serialize(writer),
            TypeSig::Int8 => 0x04u8.serialize(writer),
            TypeSig::UInt8 => 0x05u8.serialize(writer),
            TypeSig::Int16 => 0x06u8.serialize(writer),
            TypeSig::UInt16 => 0x07u8.serialize(writer),
            TypeSig::Int32 => 0x08u8.serialize(writer),
            TypeSig::UInt32 => 0x09u8.serialize(writer),
            TypeSig::Int64 => 0x0au8.serialize(writer),
            TypeSig::UInt64 => 0x0bu8.serialize(writer),
            TypeSig::Float32 => 0x0cu8.serialize(writer),
            TypeSig::Float64 => 0x0du8.serialize(writer),
            TypeSig::String => 0x0eu8.serialize(writer),
            TypeSig::ValueType(id) => {
                0x11u8.serialize(writer)?;
                id.serialize(writer)
            }
            TypeSig::Class(id) => {
                0x12u8.serialize(writer)?;
                id.serialize(writer)
            }
            TypeSig::Var(idx) => {
                0x13u8.serialize(writer)?;
                idx.serialize(writer)
            }
            TypeSig::IntPtr => 0x18u8.serialize(writer),
            TypeSig::Object => 0x1cu8.serialize(writer),
            TypeSig::SzArray(elem) => {
                0x1du8.serialize(writer)?;
                elem.serialize(writer)
            }
            TypeSig::MVar(idx) => {
                0x1eu8.serialize(writer)?;
                idx.serialize(writer)
            }
        }
    }
}

impl Deserialize for TypeSig {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(match u8::deserialize(reader)? {
            0x01 => TypeSig::Void,
            0x02 => TypeSig::Boolean,
            0x03 => TypeSig::Char,
            0x04 => TypeSig::Int8,
            0x05 => TypeSig::UInt8,
            0x06 => TypeSig::Int16,
            0x07 => TypeSig::UInt16,
            0x08 => TypeSig::Int32,
            0x09 => TypeSig::UInt32,
            0x0a => TypeSig::Int64,
            0x0b => TypeSig::UInt64,
            0x0c => TypeSig::Float32,
            0x0d => TypeSig::Float64,
            0x0e => TypeSig::String,
            0x11 => TypeSig::ValueType(TypeId::deserialize(reader)?),
            0x12 => TypeSig::Class(TypeId::deserialize(reader)?),
            0x13 => TypeSig::Var(u16::deserialize(reader)?),
            0x18 => TypeSig::IntPtr,
            0x1c => TypeSig::Object,
            0x1d => TypeSig::SzArray(Box::new(TypeSig::deserialize(reader)?)),
            0x1e => TypeSig::MVar(u16::deserialize(reader)?),
            other => {
                return Err(Error::Malformed(format!(
                    "unknown element type {:#04x}",
                    other
                )))
            }
        })
    }
}

impl Serialize for Param {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.name.serialize(writer)?;
        self.sig.serialize(writer)
    }
}

impl Deserialize for Param {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let name = String::deserialize(reader)?;
        let sig = TypeSig::deserialize(reader)?;
        Ok(Param { name, sig })
    }
}

impl Serialize for MethodSig {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.return_type.serialize(writer)?;
        self.params.serialize(writer)?;
        self.generic_params.serialize(writer)
    }
}

impl Deserialize for MethodSig {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let return_type = TypeSig::deserialize(reader)?;
        let params = Vec::<Param>::deserialize(reader)?;
        let generic_params = Vec::<String>::deserialize(reader)?;
        Ok(MethodSig {
            return_type,
            params,
            generic_params,
        })
    }
}
