use super::verify::check_operands;
use super::BodyEditor;
use crate::il::model::{ExceptionRange, MethodId, Module};
use crate::il::{Error, InsnId, Instruction};
use std::collections::HashMap;

/// Name used in errors about fragments that don't belong to any method yet
const DETACHED: &str = "<fragment>";

/// Branch-closed sequence of instructions, not attached to any body
///
/// Branch targets and exception range markers are positions inside the fragment, so a fragment
/// can be spliced anywhere (and any number of times) without its internal control flow breaking.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    instructions: Vec<Instruction<usize>>,
    handlers: Vec<ExceptionRange<usize>>,
}

impl Fragment {
    /// Build a fragment, checking that every branch stays inside it
    pub fn new(instructions: Vec<Instruction<usize>>) -> Result<Fragment, Error> {
        Fragment::with_handlers(instructions, vec![])
    }

    /// Build a fragment with exception ranges, checking that every branch and marker stays
    /// inside it
    pub fn with_handlers(
        instructions: Vec<Instruction<usize>>,
        handlers: Vec<ExceptionRange<usize>>,
    ) -> Result<Fragment, Error> {
        let len = instructions.len();
        for (pos, insn) in instructions.iter().enumerate() {
            if insn.jump_targets().targets().iter().any(|target| *target >= len) {
                return Err(Error::UnresolvableExternalBranch {
                    method: String::from(DETACHED),
                    position: pos,
                });
            }
        }
        for (idx, handler) in handlers.iter().enumerate() {
            if handler.markers().iter().any(|marker| *marker >= len)
                || handler.try_start > handler.try_end
                || handler.handler_start > handler.handler_end
            {
                return Err(Error::PartialHandlerRange {
                    method: String::from(DETACHED),
                    handler: idx,
                });
            }
        }
        Ok(Fragment {
            instructions,
            handlers,
        })
    }

    pub fn instructions(&self) -> &[Instruction<usize>] {
        &self.instructions
    }

    pub fn handlers(&self) -> &[ExceptionRange<usize>] {
        &self.handlers
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Lift positions `from` through `to` (inclusive) of a body into a fragment
///
/// Branches leaving the range make the fragment unresolvable. Exception ranges entirely inside
/// the range come along; ranges with markers on both sides of the boundary are an error, and
/// ranges with no markers inside are left behind.
pub fn extract_fragment(
    module: &Module,
    method: MethodId,
    from: usize,
    to: usize,
) -> Result<Fragment, Error> {
    let body = module.body(method)?;
    if from > to || to >= body.instructions.len() {
        return Err(Error::PositionOutOfRange {
            method: module.method_name(method),
            position: if from > to { from } else { to },
            len: body.instructions.len(),
        });
    }

    let relative: HashMap<InsnId, usize> = body.instructions[from..=to]
        .iter()
        .enumerate()
        .map(|(offset, id)| (*id, offset))
        .collect();

    let mut instructions = Vec::with_capacity(to - from + 1);
    for (offset, id) in body.instructions[from..=to].iter().enumerate() {
        let insn = module
            .instruction(*id)
            .ok_or_else(|| Error::InstructionNotInBody {
                method: module.method_name(method),
                instruction: *id,
            })?;
        let insn = insn.try_map_labels(|target| {
            relative
                .get(target)
                .copied()
                .ok_or_else(|| Error::UnresolvableExternalBranch {
                    method: module.method_name(method),
                    position: from + offset,
                })
        })?;
        instructions.push(insn);
    }

    let mut handlers = vec![];
    for (idx, handler) in body.handlers.iter().enumerate() {
        let markers = handler.markers();
        let inside = markers
            .iter()
            .filter(|marker| relative.contains_key(*marker))
            .count();
        if inside == 0 {
            continue;
        }
        if inside < markers.len() {
            return Err(Error::PartialHandlerRange {
                method: module.method_name(method),
                handler: idx,
            });
        }
        let carried = handler.try_map_labels(|marker| {
            relative
                .get(marker)
                .copied()
                .ok_or_else(|| Error::PartialHandlerRange {
                    method: module.method_name(method),
                    handler: idx,
                })
        })?;
        handlers.push(carried);
    }

    log::trace!(
        "Extracted {} instructions and {} handlers from {}",
        instructions.len(),
        handlers.len(),
        module.method_name(method)
    );
    Ok(Fragment {
        instructions,
        handlers,
    })
}

impl<'m> BodyEditor<'m> {
    /// Splice a copy of the fragment in so that it starts at `position`
    ///
    /// Every instruction gets a fresh handle, and branches and exception range markers inside the
    /// fragment are rewritten to point at the corresponding new handles. Returns the new handles,
    /// in order.
    pub fn splice_fragment(
        &mut self,
        position: usize,
        fragment: &Fragment,
    ) -> Result<Vec<InsnId>, Error> {
        if position > self.len() {
            return Err(self.out_of_range(position));
        }
        let locals = self.body().locals.len();
        for insn in &fragment.instructions {
            check_operands(self.module, self.method, locals, insn)?;
        }

        let method = self.method;
        let (body, arena) = self.module.parts_mut(method)?;

        // Reserve the handles first so that forward branches have something to point at
        let ids: Vec<InsnId> = fragment
            .instructions
            .iter()
            .map(|_| arena.alloc(Instruction::Nop, Some(method)))
            .collect();
        for (id, insn) in ids.iter().zip(&fragment.instructions) {
            if let Some(slot) = arena.get_mut(*id) {
                *slot = insn.map_labels(|target| ids[*target]);
            }
        }

        let tail = body.instructions.split_off(position);
        body.instructions.extend(ids.iter().copied());
        body.instructions.extend(tail);

        // Spliced ranges can only be nested inside existing ones, so they go first
        let mut handlers = fragment
            .handlers
            .iter()
            .map(|handler| handler.try_map_labels(|marker| Ok::<_, Error>(ids[*marker])))
            .collect::<Result<Vec<_>, _>>()?;
        handlers.append(&mut body.handlers);
        body.handlers = handlers;

        log::debug!(
            "Spliced {} instructions into {} at {}",
            ids.len(),
            self.method_name(),
            position
        );
        self.refresh();
        Ok(ids)
    }

    /// Copy positions `from` through `to` of `source` so that they start at `position` here
    ///
    /// The source can be this very body; the copy never aliases the original instructions.
    pub fn copy_range(
        &mut self,
        source: MethodId,
        from: usize,
        to: usize,
        position: usize,
    ) -> Result<Vec<InsnId>, Error> {
        let fragment = extract_fragment(self.module, source, from, to)?;
        self.splice_fragment(position, &fragment)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::edit::verify_body;
    use crate::il::model::HandlerKind;
    use crate::il::{Comparison, MethodFlags, MethodSig, Param, TypeSig};
    use crate::test_util::sample_module;

    #[test]
    fn hand_built_fragments_must_be_closed() {
        assert!(matches!(
            Fragment::new(vec![Instruction::Br(1)]),
            Err(Error::UnresolvableExternalBranch { position: 0, .. })
        ));
        assert!(Fragment::new(vec![Instruction::Br(0)]).is_ok());
    }

    #[test]
    fn extract_rejects_outbound_branch() {
        let (module, sample) = sample_module();
        assert!(matches!(
            extract_fragment(&module, sample.is_complete, 0, 3),
            Err(Error::UnresolvableExternalBranch { position: 2, .. })
        ));
    }

    #[test]
    fn extract_is_position_relative() {
        let (module, sample) = sample_module();
        let fragment = extract_fragment(&module, sample.is_complete, 2, 6).unwrap();
        assert_eq!(fragment.len(), 5);
        assert_eq!(
            fragment.instructions()[0],
            Instruction::BrCmp(Comparison::Lt, 3)
        );
    }

    #[test]
    fn extract_rejects_straddling_handler() {
        let (module, sample) = sample_module();
        assert!(matches!(
            extract_fragment(&module, sample.guarded, 0, 2),
            Err(Error::UnresolvableExternalBranch { .. }) | Err(Error::PartialHandlerRange { .. })
        ));
        assert!(matches!(
            extract_fragment(&module, sample.guarded, 2, 3),
            Err(Error::PartialHandlerRange { handler: 0, .. })
        ));

        let fragment = extract_fragment(&module, sample.guarded, 0, 4).unwrap();
        assert_eq!(fragment.handlers().len(), 1);
        assert_eq!(fragment.handlers()[0].kind, HandlerKind::Finally);
    }

    #[test]
    fn branches_follow_the_copy() {
        let (mut module, sample) = sample_module();
        let stats = module.method(sample.is_complete).declaring_type;
        let clone = module
            .add_method(
                stats,
                "IsCompleteCopy",
                MethodFlags::PUBLIC,
                MethodSig::new(TypeSig::Boolean, vec![Param::new("level", TypeSig::Int32)]),
            )
            .unwrap();

        let mut editor = BodyEditor::new(&mut module, clone).unwrap();
        let ids = editor.copy_range(sample.is_complete, 0, 6, 0).unwrap();
        assert_eq!(
            editor.instruction_at(2),
            Some(&Instruction::BrCmp(Comparison::Lt, ids[5]))
        );
        assert_eq!(editor.body().max_stack, 2);
        verify_body(&module, clone).unwrap();
        verify_body(&module, sample.is_complete).unwrap();

        let original = module.body(sample.is_complete).unwrap();
        assert!(ids.iter().all(|id| !original.contains(*id)));
    }

    #[test]
    fn self_copy_with_handlers() {
        let (mut module, sample) = sample_module();
        let mut editor = BodyEditor::new(&mut module, sample.guarded).unwrap();
        let ids = editor.copy_range(sample.guarded, 0, 4, 0).unwrap();
        assert_eq!(editor.len(), 10);
        assert_eq!(editor.body().handlers.len(), 2);
        assert_eq!(editor.body().handlers[0].try_start, ids[0]);
        assert_eq!(
            editor.instruction_at(1),
            Some(&Instruction::Leave(ids[4]))
        );
        verify_body(&module, sample.guarded).unwrap();
    }
}
