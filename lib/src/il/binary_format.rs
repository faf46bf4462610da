use super::Error;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Result};

/// Utility trait for serializing data inside module files
///
/// Everything is little-endian. Sequences and strings are prefixed with their length as a `u32`
/// and optional values with a `u8` presence tag.
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Inverse of [`Serialize`]
///
/// Deserialization can fail on well-formed bytes that don't describe a valid module (bad tags,
/// invalid UTF-8), so this produces a full [`Error`] rather than an IO error.
pub trait Deserialize: Sized {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error>;
}

/// Upper bound on how much we pre-allocate based on a length read from the input
const MAX_PREALLOCATION: usize = 4096;

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<LittleEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<LittleEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<LittleEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<LittleEndian>(*self)
    }
}

impl Serialize for bool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (*self as u8).serialize(writer)
    }
}

impl Serialize for String {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u32).serialize(writer)?;
        writer.write_all(self.as_bytes())
    }
}

/// Size in `u32` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u32).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl<A: Serialize> Serialize for Option<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        match self {
            None => 0u8.serialize(writer),
            Some(value) => {
                1u8.serialize(writer)?;
                value.serialize(writer)
            }
        }
    }
}

impl Deserialize for u8 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u8()?)
    }
}

impl Deserialize for u16 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl Deserialize for u32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl Deserialize for i32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
}

impl Deserialize for i64 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_i64::<LittleEndian>()?)
    }
}

impl Deserialize for f32 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_f32::<LittleEndian>()?)
    }
}

impl Deserialize for f64 {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(reader.read_f64::<LittleEndian>()?)
    }
}

impl Deserialize for bool {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        match u8::deserialize(reader)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(Error::Malformed(format!("invalid boolean byte {}", other))),
        }
    }
}

impl Deserialize for String {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u32::deserialize(reader)? as usize;
        let mut bytes = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        reader.by_ref().take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() != len {
            return Err(Error::Malformed(String::from("truncated string")));
        }
        String::from_utf8(bytes)
            .map_err(|err| Error::Malformed(format!("string is not UTF-8: {}", err)))
    }
}

impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let len = u32::deserialize(reader)? as usize;
        let mut elems = Vec::with_capacity(len.min(MAX_PREALLOCATION));
        for _ in 0..len {
            elems.push(A::deserialize(reader)?);
        }
        Ok(elems)
    }
}

impl<A: Deserialize> Deserialize for Option<A> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        match u8::deserialize(reader)? {
            0 => Ok(None),
            1 => Ok(Some(A::deserialize(reader)?)),
            other => Err(Error::Malformed(format!("invalid option tag {}", other))),
        }
    }
}
