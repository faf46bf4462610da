//! Structural editing of IL method bodies
//!
//! Modules are loaded into a [`il::model::Module`], edited through the operations in [`edit`],
//! optionally driven by a [`batch::Batch`] of patches, then written back in one go. Every edit
//! keeps branch targets, exception ranges, local and argument indices, and the declared stack
//! bound consistent, or fails without changing anything.

pub mod batch;
pub mod edit;
pub mod il;

#[cfg(test)]
pub(crate) mod test_util;
