//! Ordered, transactional application of patches to a module
//!
//! Each patch runs against a snapshot of the module taken just before it. Once the patch returns,
//! every body it touched is verified. A patch that fails to resolve some symbol is rolled back and
//! skipped; any other failure rolls the patch back and aborts the batch. Patches run in order and
//! later ones see what earlier ones did (new methods, new locals, and so on).

mod ops;
mod plan;

pub use ops::*;
pub use plan::*;

use crate::edit::verify_body;
use crate::il::model::Module;
use crate::il::Error;

/// Named edit of a module
pub trait Patch {
    /// Name used in diagnostics
    fn name(&self) -> String;

    fn apply(&self, module: &mut Module) -> Result<(), Error>;
}

/// Outcome of a batch that ran to completion
#[derive(Debug)]
pub struct BatchReport {
    /// Names of the patches that were applied, in order
    pub applied: Vec<String>,

    /// Patches that were skipped because a symbol could not be found
    pub skipped: Vec<(String, Error)>,
}

#[derive(Default)]
pub struct Batch {
    patches: Vec<Box<dyn Patch>>,
}

impl Batch {
    pub fn new() -> Batch {
        Batch::default()
    }

    pub fn push(&mut self, patch: impl Patch + 'static) {
        self.patches.push(Box::new(patch));
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Apply every patch in order
    ///
    /// On a hard failure, the module is left as it was after the last successful patch and the
    /// error is returned. A batch that runs to completion compacts the instruction arena, so
    /// instruction handles from before the run are stale afterwards.
    pub fn run(&self, module: &mut Module) -> Result<BatchReport, Error> {
        let mut report = BatchReport {
            applied: vec![],
            skipped: vec![],
        };
        module.take_touched();

        for patch in &self.patches {
            let name = patch.name();
            let snapshot = module.snapshot();
            let outcome = patch.apply(module).and_then(|()| verify_touched(module));
            module.take_touched();

            match outcome {
                Ok(()) => {
                    log::info!("Applied {}", name);
                    report.applied.push(name);
                }
                Err(err) if err.is_soft() => {
                    module.restore(snapshot);
                    log::warn!("Skipped {}: {:?}", name, err);
                    report.skipped.push((name, err));
                }
                Err(err) => {
                    module.restore(snapshot);
                    log::error!("Failed {}: {:?}", name, err);
                    return Err(err);
                }
            }
        }

        if let Err(err) = module.compact() {
            log::warn!("Could not compact instruction arena: {:?}", err);
        }
        Ok(report)
    }
}

fn verify_touched(module: &mut Module) -> Result<(), Error> {
    for method in module.take_touched() {
        let required = verify_body(module, method)?;
        log::trace!(
            "Verified {} (stack depth {})",
            module.method_name(method),
            required
        );
    }
    Ok(())
}
