//! Structural edits of method bodies
//!
//! Every operation here either leaves the module in a state where branch targets, exception
//! ranges, and local/argument indices all resolve, or fails and leaves the module untouched.
//!
//!   - [`BodyEditor`] is the entry point for instruction-level edits: insert, remove, replace,
//!     append, in-place rewrite, plus splicing of [`Fragment`]s and stack/locals bookkeeping
//!   - the free functions build on it for whole-method operations: synthesizing a literal
//!     return, cloning a method, injecting a call at entry
//!
//! Symbol lookups by name are methods on [`Module`](crate::il::model::Module), see [`resolver`].

mod accountant;
mod clone;
mod editor;
mod fixup;
mod inject;
pub mod resolver;
mod stack;
mod synthesize;
mod verify;

pub use accountant::*;
pub use clone::*;
pub use editor::*;
pub use fixup::*;
pub use inject::*;
pub use stack::*;
pub use synthesize::*;
pub use verify::*;
