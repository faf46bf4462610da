//! Semantic representation of a module
//!
//! This is the representation every editing operation works on. Types, methods, and fields live
//! in flat tables owned by the [`Module`] and refer to each other through typed indices:
//!
//!   - __Type__ is represented using [`TypeDef`] and addressed by [`TypeId`]
//!   - __Method__ is represented using [`MethodDef`] and addressed by [`MethodId`]
//!   - __Field__ is represented using [`FieldDef`] and addressed by [`FieldId`]
//!
//! Instructions are stored once, in the module-wide arena, and bodies only hold handles to them.

mod body;
mod field;
mod method;
mod module;
mod type_def;

pub use body::*;
pub use field::*;
pub use method::*;
pub use module::*;
pub use type_def::*;

use super::{Deserialize, Error, Serialize};
use byteorder::{ReadBytesExt, WriteBytesExt};

macro_rules! table_index {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }

        impl Serialize for $name {
            fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
                self.0.serialize(writer)
            }
        }

        impl Deserialize for $name {
            fn deserialize<R: ReadBytesExt>(reader: &mut R) -> Result<Self, Error> {
                Ok($name(u32::deserialize(reader)?))
            }
        }
    };
}

table_index!(
    /// Index into the type table of a module
    TypeId,
    "t"
);
table_index!(
    /// Index into the method table of a module
    MethodId,
    "m"
);
table_index!(
    /// Index into the field table of a module
    FieldId,
    "f"
);
