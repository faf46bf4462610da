use super::BodyEditor;
use crate::il::model::{MethodBody, MethodId, Module, TypeId};
use crate::il::{Error, InsnId, Instruction, TypeSig};

/// Value that a synthesized body returns
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    String(String),
    Int32(i32),
    Boolean(bool),
    Float32(f32),
    Float64(f64),

    /// Fresh instance of a type, built with its parameterless constructor
    Construct(TypeId),
}

impl Literal {
    /// Static type of the value
    pub fn type_sig(&self, module: &Module) -> TypeSig {
        match self {
            Literal::String(_) => TypeSig::String,
            Literal::Int32(_) => TypeSig::Int32,
            Literal::Boolean(_) => TypeSig::Boolean,
            Literal::Float32(_) => TypeSig::Float32,
            Literal::Float64(_) => TypeSig::Float64,
            Literal::Construct(id) if module.type_def(*id).is_value_type() => {
                TypeSig::ValueType(*id)
            }
            Literal::Construct(id) => TypeSig::Class(*id),
        }
    }

    /// Instruction pushing the value
    fn push(&self, module: &Module) -> Result<Instruction<InsnId>, Error> {
        Ok(match self {
            Literal::String(s) => Instruction::LdStr(s.clone()),
            Literal::Int32(i) => Instruction::LdcI4(*i),
            Literal::Boolean(b) => Instruction::LdcI4(if *b { 1 } else { 0 }),
            Literal::Float32(f) => Instruction::LdcR4(*f),
            Literal::Float64(d) => Instruction::LdcR8(*d),
            Literal::Construct(id) => {
                let ctor = module
                    .find_parameterless_constructor(*id)
                    .ok_or_else(|| Error::NoParameterlessConstructor(module.type_name(*id)))?;
                Instruction::NewObj(ctor)
            }
        })
    }
}

/// Replace the body of `method` with one that just returns `value`
///
/// The value's type must be exactly the declared return type. The old instructions, locals and
/// exception ranges are all discarded. Returns the handles of the new instructions.
pub fn synthesize_return(
    module: &mut Module,
    method: MethodId,
    value: &Literal,
) -> Result<Vec<InsnId>, Error> {
    module.body(method)?;
    let expected = &module.method(method).signature.return_type;
    let found = value.type_sig(module);
    if *expected != found {
        return Err(Error::ReturnTypeMismatch {
            method: module.method_name(method),
            expected: expected.render(module),
            found: found.render(module),
        });
    }
    let push = value.push(module)?;

    log::debug!(
        "Replacing body of {} with a constant {}",
        module.method_name(method),
        found.render(module)
    );
    module.reset_body(method, MethodBody::new())?;
    let mut editor = BodyEditor::new(module, method)?;
    editor.append_sequence(vec![push, Instruction::Ret])
}
