//! Represent and (de)serialize IL modules
//!
//! ### Simple example
//!
//! Declaring a type with a method that returns a constant, then encoding the module:
//!
//! ```
//! use ilpatch::il::*;
//! use ilpatch::il::model::Module;
//! use ilpatch::edit::BodyEditor;
//!
//! # fn build_module() -> Result<(), Error> {
//! let mut module = Module::new("Assembly-CSharp");
//! let stats = module.add_type("Game", "PlayerStats", TypeFlags::PUBLIC)?;
//! let get_max = module.add_method(
//!     stats,
//!     "get_MaxStamina",
//!     MethodFlags::PUBLIC,
//!     MethodSig::new(TypeSig::Int32, vec![]),
//! )?;
//!
//! let mut editor = BodyEditor::new(&mut module, get_max)?;
//! editor.append_sequence(vec![Instruction::LdcI4(100), Instruction::Ret])?;
//! assert_eq!(module.body(get_max)?.max_stack, 1);
//!
//! let mut bytes: Vec<u8> = vec![];
//! module.to_module_file()?.serialize(&mut bytes)?;
//! # Ok(())
//! # }
//! # build_module().unwrap();
//! ```

mod arena;
mod binary_format;
mod display;
mod errors;
mod flags;
mod instructions;
pub mod model;
pub mod module_file;
pub mod names;
mod signatures;

pub use arena::*;
pub use binary_format::*;
pub use display::*;
pub use errors::*;
pub use flags::*;
pub use instructions::*;
pub use signatures::*;
