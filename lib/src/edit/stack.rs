use crate::il::model::{MethodId, Module};
use crate::il::{Error, InsnId, Instruction};
use std::collections::HashMap;

/// Number of values an instruction takes off and puts on the evaluation stack
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StackEffect {
    pub pops: u16,
    pub pushes: u16,
}

impl StackEffect {
    const fn new(pops: u16, pushes: u16) -> StackEffect {
        StackEffect { pops, pushes }
    }
}

/// Stack effect of an instruction appearing in the body of `current`
///
/// Calls are resolved against the callee signature, and `ret` against the return type of the
/// current method. `leave` and `endfinally` also empty the stack, which the simulation handles
/// separately.
pub fn stack_effect<Lbl>(
    module: &Module,
    current: MethodId,
    insn: &Instruction<Lbl>,
) -> StackEffect {
    match insn {
        Instruction::Nop
        | Instruction::Br(_)
        | Instruction::Leave(_)
        | Instruction::Rethrow
        | Instruction::EndFinally => StackEffect::new(0, 0),

        Instruction::LdNull
        | Instruction::LdcI4(_)
        | Instruction::LdcI8(_)
        | Instruction::LdcR4(_)
        | Instruction::LdcR8(_)
        | Instruction::LdStr(_)
        | Instruction::LdArg(_)
        | Instruction::LdArgA(_)
        | Instruction::LdLoc(_)
        | Instruction::LdLocA(_)
        | Instruction::LdsFld(_) => StackEffect::new(0, 1),

        Instruction::StArg(_)
        | Instruction::StLoc(_)
        | Instruction::Pop
        | Instruction::StsFld(_)
        | Instruction::InitObj(_)
        | Instruction::BrIf(_, _)
        | Instruction::Switch(_)
        | Instruction::Throw => StackEffect::new(1, 0),

        Instruction::Dup => StackEffect::new(1, 2),

        Instruction::Neg
        | Instruction::Not
        | Instruction::Conv(_)
        | Instruction::LdFld(_)
        | Instruction::LdFldA(_)
        | Instruction::NewArr(_)
        | Instruction::LdLen
        | Instruction::BoxValue(_)
        | Instruction::UnboxAny(_)
        | Instruction::CastClass(_)
        | Instruction::IsInst(_) => StackEffect::new(1, 1),

        Instruction::Arith(_) | Instruction::Compare(_) | Instruction::LdElem(_) => {
            StackEffect::new(2, 1)
        }
        Instruction::StFld(_) | Instruction::BrCmp(_, _) => StackEffect::new(2, 0),
        Instruction::StElem(_) => StackEffect::new(3, 0),

        Instruction::Call(callee) | Instruction::CallVirt(callee) => {
            let callee = module.method(*callee);
            let pops = callee.argument_count() as u16;
            let pushes = if callee.signature.return_type.is_void() {
                0
            } else {
                1
            };
            StackEffect::new(pops, pushes)
        }
        Instruction::NewObj(ctor) => {
            let ctor = module.method(*ctor);
            StackEffect::new(ctor.signature.params.len() as u16, 1)
        }

        Instruction::Ret => {
            if module.method(current).signature.return_type.is_void() {
                StackEffect::new(0, 0)
            } else {
                StackEffect::new(1, 0)
            }
        }
    }
}

/// Simulate the evaluation stack along every reachable path of a body
///
/// Returns the maximum depth reached. Fails if any path underflows, overflows `u16::MAX`, falls
/// off the end of the body, or reaches the same instruction with two different depths.
pub fn simulate(module: &Module, method: MethodId) -> Result<u16, Error> {
    let body = module.body(method)?;
    if body.instructions.is_empty() {
        return Err(Error::EmptyBody(module.method_name(method)));
    }

    let positions: HashMap<InsnId, usize> = body
        .instructions
        .iter()
        .enumerate()
        .map(|(pos, insn)| (*insn, pos))
        .collect();

    // Entry plus every handler (and filter) entry point, with its initial depth
    let mut worklist: Vec<(usize, u16)> = vec![(0, 0)];
    for (idx, handler) in body.handlers.iter().enumerate() {
        for (entry, depth) in handler.entry_points() {
            let pos = positions
                .get(&entry)
                .copied()
                .ok_or_else(|| Error::DanglingHandlerRange {
                    method: module.method_name(method),
                    handler: idx,
                })?;
            worklist.push((pos, depth));
        }
    }

    let mut depth_at: Vec<Option<u16>> = vec![None; body.instructions.len()];
    let mut max_depth: u16 = 0;

    while let Some((pos, depth)) = worklist.pop() {
        match depth_at[pos] {
            Some(expected) if expected == depth => continue,
            Some(expected) => {
                return Err(Error::StackHeightMismatch {
                    method: module.method_name(method),
                    position: pos,
                    expected,
                    found: depth,
                })
            }
            None => depth_at[pos] = Some(depth),
        }
        max_depth = max_depth.max(depth);

        let insn_id = body.instructions[pos];
        let insn = module
            .instruction(insn_id)
            .ok_or_else(|| Error::InstructionNotInBody {
                method: module.method_name(method),
                instruction: insn_id,
            })?;

        let effect = stack_effect(module, method, insn);
        if depth < effect.pops {
            return Err(Error::StackUnderflow {
                method: module.method_name(method),
                position: pos,
            });
        }
        let mut after = (depth - effect.pops)
            .checked_add(effect.pushes)
            .ok_or_else(|| Error::StackOverflow {
                method: module.method_name(method),
                position: pos,
            })?;
        max_depth = max_depth.max(after);
        if matches!(insn, Instruction::Leave(_) | Instruction::EndFinally) {
            after = 0;
        }

        for target in insn.jump_targets().targets() {
            let target_pos =
                positions
                    .get(target)
                    .copied()
                    .ok_or_else(|| Error::DanglingBranchTarget {
                        method: module.method_name(method),
                        branch: pos,
                        target: *target,
                    })?;
            worklist.push((target_pos, after));
        }

        if insn.falls_through() {
            if pos + 1 >= body.instructions.len() {
                return Err(Error::FallsOffEnd {
                    method: module.method_name(method),
                    position: pos,
                });
            }
            worklist.push((pos + 1, after));
        }
    }

    Ok(max_depth)
}

/// Raise the declared max-stack of a body to what the simulation requires
///
/// The declared bound is never lowered. Bodies that don't simulate (typically because they are
/// still being assembled) are left alone.
pub fn raise_max_stack(module: &mut Module, method: MethodId) -> Option<u16> {
    match simulate(module, method) {
        Ok(required) => {
            let declared = module.body(method).ok()?.max_stack;
            if required > declared {
                log::trace!(
                    "Raising max stack of {} from {} to {}",
                    module.method_name(method),
                    declared,
                    required
                );
                let (body, _) = module.parts_mut(method).ok()?;
                body.max_stack = required;
            }
            Some(required)
        }
        Err(err) => {
            log::trace!(
                "Not adjusting max stack of {}: {:?}",
                module.method_name(method),
                err
            );
            None
        }
    }
}
