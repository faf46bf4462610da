use super::{Deserialize, Error, Serialize};
use bitflags::bitflags;
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::Result;

bitflags! {
    /// Attributes on type definitions
    pub struct TypeFlags: u32 {
        const PUBLIC = 0x0001;
        const NESTED = 0x0002;
        const INTERFACE = 0x0020;
        const ABSTRACT = 0x0080;
        const SEALED = 0x0100;
        const VALUE_TYPE = 0x0200;

        /// Defined in another module: members carry signatures but never bodies
        const EXTERNAL = 0x1000;
    }
}

bitflags! {
    /// Attributes on methods
    pub struct MethodFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0010;
        const FINAL = 0x0020;
        const VIRTUAL = 0x0040;
        const ABSTRACT = 0x0400;
        const SPECIAL_NAME = 0x0800;
        const RT_SPECIAL_NAME = 0x1000;
    }
}

bitflags! {
    /// Attributes on fields
    pub struct FieldFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0010;
        const INIT_ONLY = 0x0020;
        const LITERAL = 0x0040;
    }
}

impl MethodFlags {
    /// Swap whatever access bits are set for `PUBLIC`
    pub fn make_public(&mut self) {
        self.remove(MethodFlags::PRIVATE | MethodFlags::PROTECTED);
        self.insert(MethodFlags::PUBLIC);
    }
}

impl Serialize for TypeFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for MethodFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for FieldFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.bits().serialize(writer)
    }
}

impl Deserialize for TypeFlags {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let bits = u32::deserialize(reader)?;
        TypeFlags::from_bits(bits)
            .ok_or_else(|| Error::Malformed(format!("unknown type flags {:#x}", bits)))
    }
}

impl Deserialize for MethodFlags {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let bits = u16::deserialize(reader)?;
        MethodFlags::from_bits(bits)
            .ok_or_else(|| Error::Malformed(format!("unknown method flags {:#x}", bits)))
    }
}

impl Deserialize for FieldFlags {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let bits = u16::deserialize(reader)?;
        FieldFlags::from_bits(bits)
            .ok_or_else(|| Error::Malformed(format!("unknown field flags {:#x}", bits)))
    }
}
