use super::{extract_fragment, BodyEditor};
use crate::il::model::{MethodBody, MethodId, Module, TypeId};
use crate::il::{Error, InsnId};

/// Declare a new method on `target_type` shaped like `template`
///
/// Flags, return type, parameters and generic parameters are copied, and so are the types of the
/// template's locals. The new body has no instructions: it is up to the caller to fill it in,
/// typically with fragments pulled out of other methods.
pub fn clone_signature(
    module: &mut Module,
    target_type: TypeId,
    template: MethodId,
    new_name: &str,
) -> Result<MethodId, Error> {
    let template_def = module.method(template);
    let flags = template_def.flags;
    let signature = template_def.signature.clone();
    let locals = template_def
        .body
        .as_ref()
        .map(|body| (body.locals.clone(), body.init_locals));

    let method = module.add_method(target_type, new_name, flags, signature)?;
    if let (Some((locals, init_locals)), Ok((body, _))) = (locals, module.parts_mut(method)) {
        body.locals = locals;
        body.init_locals = init_locals;
    }
    log::debug!(
        "Cloned signature of {} as {}",
        module.method_name(template),
        module.method_name(method)
    );
    Ok(method)
}

/// Replace the body of `target` with a copy of the body of `source`
///
/// Both methods must take and return the same types, and agree on being static. Branches and
/// exception ranges in the copy refer to the copied instructions, never to the source ones.
pub fn copy_method_body(
    module: &mut Module,
    source: MethodId,
    target: MethodId,
) -> Result<Vec<InsnId>, Error> {
    let source_def = module.method(source);
    let target_def = module.method(target);
    if !source_def.signature.same_shape(&target_def.signature)
        || source_def.is_static() != target_def.is_static()
    {
        return Err(Error::SignatureMismatch {
            source: module.method_name(source),
            target: module.method_name(target),
        });
    }
    module.body(target)?;

    let source_body = module.body(source)?;
    if source_body.is_empty() {
        return Err(Error::EmptyBody(module.method_name(source)));
    }
    let fragment = extract_fragment(module, source, 0, source_body.len() - 1)?;
    let fresh = MethodBody {
        locals: source_body.locals.clone(),
        max_stack: source_body.max_stack,
        init_locals: source_body.init_locals,
        ..MethodBody::new()
    };

    module.reset_body(target, fresh)?;
    let mut editor = BodyEditor::new(module, target)?;
    editor.splice_fragment(0, &fragment)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::edit::verify_body;
    use crate::il::{Instruction, TypeSig};
    use crate::test_util::sample_module;

    #[test]
    fn cloned_signature_has_empty_body() {
        let (mut module, sample) = sample_module();
        let mut editor = BodyEditor::new(&mut module, sample.is_complete).unwrap();
        editor.add_local(TypeSig::Float64).unwrap();

        let clone =
            clone_signature(&mut module, sample.helper, sample.is_complete, "IsDone").unwrap();
        let clone_def = module.method(clone);
        let template_def = module.method(sample.is_complete);
        assert_eq!(clone_def.declaring_type, sample.helper);
        assert_eq!(clone_def.flags, template_def.flags);
        assert_eq!(clone_def.signature, template_def.signature);

        let body = module.body(clone).unwrap();
        assert!(body.is_empty());
        assert_eq!(body.locals.len(), 1);
        assert_eq!(body.locals[0].var_type, TypeSig::Float64);
        assert!(body.init_locals);
    }

    #[test]
    fn assemble_from_fragments() {
        let (mut module, sample) = sample_module();
        let clone =
            clone_signature(&mut module, sample.stats, sample.is_complete, "IsAlmostComplete")
                .unwrap();
        let mut editor = BodyEditor::new(&mut module, clone).unwrap();
        editor.copy_range(sample.is_complete, 0, 1, 0).unwrap();
        let tail = editor.copy_range(sample.is_complete, 2, 6, 2).unwrap();
        editor.rewrite_at(1, Instruction::LdcI4(2)).unwrap();
        assert_eq!(editor.len(), 7);
        assert_eq!(
            editor.instruction_at(2).and_then(|insn| insn.jump_targets().targets().first().copied()),
            Some(tail[3])
        );
        verify_body(&module, clone).unwrap();
    }

    #[test]
    fn copy_whole_body() {
        let (mut module, sample) = sample_module();
        let clone =
            clone_signature(&mut module, sample.helper, sample.guarded, "GuardedCopy").unwrap();
        let ids = copy_method_body(&mut module, sample.guarded, clone).unwrap();
        assert_eq!(ids.len(), 5);

        let body = module.body(clone).unwrap();
        assert_eq!(body.handlers.len(), 1);
        assert_eq!(body.handlers[0].handler_start, ids[2]);
        assert_eq!(module.instruction(ids[1]), Some(&Instruction::Leave(ids[4])));
        verify_body(&module, clone).unwrap();

        assert!(matches!(
            copy_method_body(&mut module, sample.get_name, clone),
            Err(Error::SignatureMismatch { .. })
        ));
        assert!(matches!(
            copy_method_body(&mut module, clone, sample.helper_log),
            Ok(_)
        ));
    }
}
