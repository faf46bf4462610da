use super::simulate;
use crate::il::model::{MethodId, Module};
use crate::il::{Error, InsnId, Instruction, TypeSig};
use std::collections::HashSet;

/// Check the non-branch operands of an instruction headed for the body of `method`
///
/// Local indices must fit in `locals` slots, argument indices in the method's argument count,
/// and field/method/type operands must exist in the module.
pub(crate) fn check_operands<Lbl>(
    module: &Module,
    method: MethodId,
    locals: usize,
    insn: &Instruction<Lbl>,
) -> Result<(), Error> {
    if let Some(index) = insn.local_index() {
        if index as usize >= locals {
            return Err(Error::LocalIndexOutOfRange {
                method: module.method_name(method),
                index,
                locals,
            });
        }
    }
    if let Some(index) = insn.argument_index() {
        let arguments = module.method(method).argument_count();
        if index as usize >= arguments {
            return Err(Error::ArgumentIndexOutOfRange {
                method: module.method_name(method),
                index,
                arguments,
            });
        }
    }
    if let Some(field) = insn.field() {
        if field.index() >= module.field_count() {
            return Err(Error::Malformed(format!("missing field {:?}", field)));
        }
    }
    if let Some(callee) = insn.method() {
        if callee.index() >= module.method_count() {
            return Err(Error::Malformed(format!("missing method {:?}", callee)));
        }
    }
    if let Some(ty) = insn.type_operand() {
        check_type_sig(module, ty)?;
    }
    Ok(())
}

pub(crate) fn check_type_sig(module: &Module, sig: &TypeSig) -> Result<(), Error> {
    let mut found = vec![];
    sig.referenced_types(&mut found);
    let type_count = module.type_count();
    match found.into_iter().find(|id| id.index() >= type_count) {
        Some(missing) => Err(Error::Malformed(format!("missing type {:?}", missing))),
        None => Ok(()),
    }
}

/// Check every structural invariant of a body
///
///   - the body is non-empty and every handle in it is owned by it (exactly once)
///   - branch targets and exception range markers resolve inside the body, and each range has
///     its start no later than its end
///   - local and argument indices are in range
///   - the stack simulation succeeds and fits in the declared max-stack
///
/// Returns the stack depth the body requires.
pub fn verify_body(module: &Module, method: MethodId) -> Result<u16, Error> {
    let body = module.body(method)?;
    if body.instructions.is_empty() {
        return Err(Error::EmptyBody(module.method_name(method)));
    }

    let mut seen: HashSet<InsnId> = HashSet::new();
    for (pos, insn_id) in body.instructions.iter().enumerate() {
        if module.arena().owner(*insn_id) != Some(method) || !seen.insert(*insn_id) {
            return Err(Error::InstructionOwnedElsewhere {
                method: module.method_name(method),
                instruction: *insn_id,
            });
        }
        let insn = module
            .instruction(*insn_id)
            .ok_or_else(|| Error::InstructionNotInBody {
                method: module.method_name(method),
                instruction: *insn_id,
            })?;
        check_operands(module, method, body.locals.len(), insn)?;
        for target in insn.jump_targets().targets() {
            if !body.contains(*target) {
                return Err(Error::DanglingBranchTarget {
                    method: module.method_name(method),
                    branch: pos,
                    target: *target,
                });
            }
        }
    }

    for (idx, handler) in body.handlers.iter().enumerate() {
        let dangling = || Error::DanglingHandlerRange {
            method: module.method_name(method),
            handler: idx,
        };
        let position = |marker: &InsnId| body.position_of(*marker).ok_or_else(dangling);
        let range = handler.try_map_labels(position)?;
        if range.try_start > range.try_end || range.handler_start > range.handler_end {
            return Err(dangling());
        }
    }

    let required = simulate(module, method)?;
    if required > body.max_stack {
        return Err(Error::MaxStackExceeded {
            method: module.method_name(method),
            declared: body.max_stack,
            required,
        });
    }
    Ok(required)
}

/// Verify every body in the module
pub fn verify_module(module: &Module) -> Result<(), Error> {
    for method in module.method_ids() {
        if module.method(method).body.is_some() {
            verify_body(module, method)?;
        }
    }
    Ok(())
}
