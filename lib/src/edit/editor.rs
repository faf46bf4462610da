use super::raise_max_stack;
use super::verify::check_operands;
use crate::il::model::{MethodBody, MethodId, Module};
use crate::il::{Error, InsnId, Instruction};
use std::collections::HashSet;

/// Editor over the instruction list of one method body
///
/// All positions are logical indices into the current instruction list, while handles
/// ([`InsnId`]) stay attached to the same instruction no matter how the list shifts around it.
/// Each mutation is atomic: it validates everything first, and only then changes the body.
///
/// After every successful mutation the body is re-simulated and its declared max-stack raised
/// if needed.
pub struct BodyEditor<'m> {
    pub(crate) module: &'m mut Module,
    pub(crate) method: MethodId,
}

impl<'m> BodyEditor<'m> {
    /// Start editing the body of `method` (which must have one)
    pub fn new(module: &'m mut Module, method: MethodId) -> Result<BodyEditor<'m>, Error> {
        module.body(method)?;
        module.touch(method);
        Ok(BodyEditor { module, method })
    }

    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn module(&self) -> &Module {
        self.module
    }

    pub fn body(&self) -> &MethodBody {
        match self.module.method(self.method).body.as_ref() {
            Some(body) => body,
            None => unreachable!("editor is only constructed on methods with bodies"),
        }
    }

    pub fn len(&self) -> usize {
        self.body().instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body().instructions.is_empty()
    }

    pub fn handle_at(&self, position: usize) -> Option<InsnId> {
        self.body().instructions.get(position).copied()
    }

    pub fn instruction_at(&self, position: usize) -> Option<&Instruction<InsnId>> {
        self.handle_at(position)
            .and_then(|id| self.module.instruction(id))
    }

    pub fn position_of(&self, id: InsnId) -> Option<usize> {
        self.body().position_of(id)
    }

    pub(crate) fn method_name(&self) -> String {
        self.module.method_name(self.method)
    }

    pub(crate) fn out_of_range(&self, position: usize) -> Error {
        Error::PositionOutOfRange {
            method: self.method_name(),
            position,
            len: self.len(),
        }
    }

    /// Check that an instruction (to be placed at `position`) only refers to things in this body
    fn check_placement(&self, insn: &Instruction<InsnId>, position: usize) -> Result<(), Error> {
        check_operands(self.module, self.method, self.body().locals.len(), insn)?;
        let body = self.body();
        for target in insn.jump_targets().targets() {
            if !body.contains(*target) {
                return Err(Error::DanglingBranchTarget {
                    method: self.method_name(),
                    branch: position,
                    target: *target,
                });
            }
        }
        Ok(())
    }

    /// Re-simulate and raise the declared max-stack if the body now needs more
    pub(crate) fn refresh(&mut self) {
        self.module.touch(self.method);
        raise_max_stack(self.module, self.method);
    }

    /// Insert an instruction so that it ends up at `position`
    ///
    /// The instruction's own branch targets must already be in the body and its local and
    /// argument indices in range. Reachability is not checked.
    pub fn insert_at(
        &mut self,
        position: usize,
        insn: Instruction<InsnId>,
    ) -> Result<InsnId, Error> {
        if position > self.len() {
            return Err(self.out_of_range(position));
        }
        self.check_placement(&insn, position)?;

        log::debug!(
            "Inserting {} at {} in {}",
            insn.mnemonic(),
            position,
            self.method_name()
        );
        let method = self.method;
        let (body, arena) = self.module.parts_mut(method)?;
        let id = arena.alloc(insn, Some(method));
        body.instructions.insert(position, id);
        self.refresh();
        Ok(id)
    }

    /// Append instructions at the end of the body, all or nothing
    pub fn append_sequence(
        &mut self,
        instructions: Vec<Instruction<InsnId>>,
    ) -> Result<Vec<InsnId>, Error> {
        let start = self.len();
        for (offset, insn) in instructions.iter().enumerate() {
            self.check_placement(insn, start + offset)?;
        }

        let method = self.method;
        let (body, arena) = self.module.parts_mut(method)?;
        let ids: Vec<InsnId> = instructions
            .into_iter()
            .map(|insn| arena.alloc(insn, Some(method)))
            .collect();
        body.instructions.extend(ids.iter().copied());
        log::debug!("Appended {} instructions to {}", ids.len(), self.method_name());
        self.refresh();
        Ok(ids)
    }

    /// Remove the instructions at positions `from` through `to` (inclusive)
    ///
    /// Fails, without removing anything, if an instruction staying in the body branches into the
    /// range or if an exception range would lose some (but not all) of its markers. Exception
    /// ranges entirely inside the removed range are dropped along with it.
    pub fn remove_range(&mut self, from: usize, to: usize) -> Result<Vec<InsnId>, Error> {
        if to >= self.len() {
            return Err(self.out_of_range(to));
        }
        if from > to {
            return Err(self.out_of_range(from));
        }

        let body = self.body();
        let removed: HashSet<InsnId> = body.instructions[from..=to].iter().copied().collect();

        for (pos, insn_id) in body.instructions.iter().enumerate() {
            if (from..=to).contains(&pos) {
                continue;
            }
            if let Some(insn) = self.module.instruction(*insn_id) {
                for target in insn.jump_targets().targets() {
                    if removed.contains(target) {
                        return Err(Error::DanglingBranchTarget {
                            method: self.method_name(),
                            branch: pos,
                            target: *target,
                        });
                    }
                }
            }
        }

        let mut dropped_handlers: Vec<usize> = vec![];
        for (idx, handler) in body.handlers.iter().enumerate() {
            let markers = handler.markers();
            let lost = markers.iter().filter(|m| removed.contains(*m)).count();
            if lost == markers.len() {
                dropped_handlers.push(idx);
            } else if lost > 0 {
                return Err(Error::DanglingHandlerRange {
                    method: self.method_name(),
                    handler: idx,
                });
            }
        }

        log::debug!(
            "Removing {} through {} in {}",
            from,
            to,
            self.method_name()
        );
        let method = self.method;
        let (body, arena) = self.module.parts_mut(method)?;
        let taken: Vec<InsnId> = body.instructions.drain(from..=to).collect();
        for id in &taken {
            arena.release(*id);
        }
        let mut idx = 0;
        body.handlers.retain(|_| {
            let keep = !dropped_handlers.contains(&idx);
            idx += 1;
            keep
        });
        self.refresh();
        Ok(taken)
    }

    /// Replace the instruction at `position` with a new one
    ///
    /// The new instruction gets a fresh handle. Branches and exception range markers which
    /// referred to the old instruction are moved over to the new one, so control flow into the
    /// slot is unaffected.
    pub fn replace_at(
        &mut self,
        position: usize,
        insn: Instruction<InsnId>,
    ) -> Result<InsnId, Error> {
        let old = match self.handle_at(position) {
            Some(old) => old,
            None => return Err(self.out_of_range(position)),
        };
        self.check_placement(&insn, position)?;

        log::debug!(
            "Replacing {:?} at {} in {} with {}",
            old,
            position,
            self.method_name(),
            insn.mnemonic()
        );
        let method = self.method;
        let (body, arena) = self.module.parts_mut(method)?;
        let new = arena.alloc(insn, Some(method));
        body.instructions[position] = new;
        arena.release(old);

        let follow = |lbl: &InsnId| if *lbl == old { new } else { *lbl };
        for id in &body.instructions {
            if let Some(insn) = arena.get_mut(*id) {
                if insn.jump_targets().targets().contains(&old) {
                    *insn = insn.map_labels(follow);
                }
            }
        }
        for handler in body.handlers.iter_mut() {
            if handler.markers().contains(&old) {
                if let Ok(moved) = handler.try_map_labels(|lbl| Ok::<_, Error>(follow(lbl))) {
                    *handler = moved;
                }
            }
        }

        self.refresh();
        Ok(new)
    }

    /// Change the contents of an instruction in the body, keeping its handle and position
    pub fn rewrite(&mut self, id: InsnId, insn: Instruction<InsnId>) -> Result<(), Error> {
        let position = match self.position_of(id) {
            Some(position) => position,
            None => {
                return Err(Error::InstructionNotInBody {
                    method: self.method_name(),
                    instruction: id,
                })
            }
        };
        self.check_placement(&insn, position)?;

        log::debug!(
            "Rewriting {:?} in {} to {}",
            id,
            self.method_name(),
            insn.mnemonic()
        );
        let method = self.method;
        let (_, arena) = self.module.parts_mut(method)?;
        if let Some(slot) = arena.get_mut(id) {
            *slot = insn;
        }
        self.refresh();
        Ok(())
    }

    /// Change the contents of the instruction at `position`
    pub fn rewrite_at(&mut self, position: usize, insn: Instruction<InsnId>) -> Result<(), Error> {
        match self.handle_at(position) {
            Some(id) => self.rewrite(id, insn),
            None => Err(self.out_of_range(position)),
        }
    }
}
