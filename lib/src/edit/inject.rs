use super::{BodyEditor, Fragment};
use crate::il::model::{MethodId, Module};
use crate::il::{Error, InsnId, Instruction, TypeSig};

/// Make `target` call `callee` before anything else
///
/// Static callees are called directly. For instance callees, a receiver is constructed with the
/// parameterless constructor of the callee's type and kept in a new local of `target`. Whatever
/// the callee returns is discarded. Only callees without parameters are supported.
///
/// Branches that targeted the original first instruction still target it, so loops back to the
/// start of the method do not re-run the injected call.
pub fn inject_call_at_entry(
    module: &mut Module,
    target: MethodId,
    callee: MethodId,
) -> Result<Vec<InsnId>, Error> {
    module.body(target)?;
    let callee_def = module.method(callee);
    if !callee_def.signature.params.is_empty() || callee_def.is_constructor() {
        return Err(Error::UnsupportedCallee(module.method_name(callee)));
    }
    let returns_value = !callee_def.signature.return_type.is_void();

    let receiver = if callee_def.is_static() {
        None
    } else {
        let receiver_type = callee_def.declaring_type;
        let ctor = module
            .find_parameterless_constructor(receiver_type)
            .ok_or_else(|| Error::NoParameterlessConstructor(module.type_name(receiver_type)))?;
        let by_value = module.type_def(receiver_type).is_value_type();
        Some((receiver_type, ctor, by_value))
    };

    let mut editor = BodyEditor::new(module, target)?;
    let mut instructions = vec![];
    match receiver {
        None => instructions.push(Instruction::Call(callee)),
        Some((receiver_type, ctor, false)) => {
            let local = editor.add_local(TypeSig::Class(receiver_type))?;
            instructions.push(Instruction::NewObj(ctor));
            instructions.push(Instruction::StLoc(local));
            instructions.push(Instruction::LdLoc(local));
            instructions.push(Instruction::CallVirt(callee));
        }
        Some((receiver_type, ctor, true)) => {
            let local = editor.add_local(TypeSig::ValueType(receiver_type))?;
            instructions.push(Instruction::NewObj(ctor));
            instructions.push(Instruction::StLoc(local));
            instructions.push(Instruction::LdLocA(local));
            instructions.push(Instruction::Call(callee));
        }
    }
    if returns_value {
        instructions.push(Instruction::Pop);
    }

    log::debug!(
        "Injecting call to {} at entry of {}",
        editor.module().method_name(callee),
        editor.module().method_name(target)
    );
    let fragment = Fragment::new(instructions)?;
    editor.splice_fragment(0, &fragment)
}
