use super::Patch;
use crate::edit::{
    clone_signature, copy_method_body, inject_call_at_entry, synthesize_return, BodyEditor,
    Literal,
};
use crate::il::model::{FieldId, MethodId, Module};
use crate::il::{Error, InsnId, Instruction};

/// Value in a plan, with types still referred to by name
#[derive(Clone, Debug, PartialEq)]
pub enum PlanValue {
    String(String),
    Int32(i32),
    Boolean(bool),
    Float32(f32),
    Float64(f64),

    /// Instance of the named type, built with its parameterless constructor
    Construct(String),
}

impl PlanValue {
    pub fn resolve(&self, module: &Module) -> Result<Literal, Error> {
        Ok(match self {
            PlanValue::String(s) => Literal::String(s.clone()),
            PlanValue::Int32(i) => Literal::Int32(*i),
            PlanValue::Boolean(b) => Literal::Boolean(*b),
            PlanValue::Float32(f) => Literal::Float32(*f),
            PlanValue::Float64(d) => Literal::Float64(*d),
            PlanValue::Construct(type_name) => Literal::Construct(module.require_type(type_name)?),
        })
    }
}

/// Field access instructions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FieldAccess {
    Load,
    LoadAddress,
    Store,
    LoadStatic,
    StoreStatic,
}

impl FieldAccess {
    fn instruction(self, field: FieldId) -> Instruction<InsnId> {
        match self {
            FieldAccess::Load => Instruction::LdFld(field),
            FieldAccess::LoadAddress => Instruction::LdFldA(field),
            FieldAccess::Store => Instruction::StFld(field),
            FieldAccess::LoadStatic => Instruction::LdsFld(field),
            FieldAccess::StoreStatic => Instruction::StsFld(field),
        }
    }
}

/// Instruction in a plan, with members still referred to by name
///
/// Plans can't express branches, since there is nothing in a plan line for them to target.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanInsn {
    /// Instruction without member operands (`nop`, `ldc.i4 5`, `ldstr ...`, `ldloc 0`, ...)
    Plain(Instruction<InsnId>),
    Call {
        virtual_call: bool,
        type_name: String,
        method: String,
    },

    /// `newobj` on the parameterless constructor of the named type
    NewObj(String),
    Field {
        access: FieldAccess,
        type_name: String,
        field: String,
    },
}

impl PlanInsn {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            PlanInsn::Plain(insn) => insn.mnemonic(),
            PlanInsn::Call {
                virtual_call: false,
                ..
            } => "call",
            PlanInsn::Call {
                virtual_call: true, ..
            } => "callvirt",
            PlanInsn::NewObj(_) => "newobj",
            PlanInsn::Field { access, .. } => access.instruction(FieldId(0)).mnemonic(),
        }
    }

    pub fn resolve(&self, module: &Module) -> Result<Instruction<InsnId>, Error> {
        Ok(match self {
            PlanInsn::Plain(insn) => insn.clone(),
            PlanInsn::Call {
                virtual_call,
                type_name,
                method,
            } => {
                let callee = resolve_method(module, type_name, method)?;
                if *virtual_call {
                    Instruction::CallVirt(callee)
                } else {
                    Instruction::Call(callee)
                }
            }
            PlanInsn::NewObj(type_name) => {
                let class = module.require_type(type_name)?;
                let ctor = module
                    .find_parameterless_constructor(class)
                    .ok_or_else(|| Error::NoParameterlessConstructor(module.type_name(class)))?;
                Instruction::NewObj(ctor)
            }
            PlanInsn::Field {
                access,
                type_name,
                field,
            } => {
                let declaring_type = module.require_type(type_name)?;
                access.instruction(module.require_field(declaring_type, field)?)
            }
        })
    }
}

/// Generic patch operations, as written in plans
///
/// Methods are looked up by name, taking the first declared overload.
#[derive(Clone, Debug, PartialEq)]
pub enum PatchOp {
    SetReturn {
        type_name: String,
        method: String,
        value: PlanValue,
    },
    MakePublic {
        type_name: String,
        method: String,
    },
    InjectCall {
        type_name: String,
        method: String,
        callee_type: String,
        callee: String,
    },
    RemoveRange {
        type_name: String,
        method: String,
        from: usize,
        to: usize,
    },
    Pad {
        type_name: String,
        method: String,
        position: usize,
        count: usize,
    },

    /// Declare a copy of `template` (signature and body) on the same type
    CloneMethod {
        type_name: String,
        template: String,
        new_name: String,
    },
    Insert {
        type_name: String,
        method: String,
        position: usize,
        insn: PlanInsn,
    },

    /// Swap out the instruction at `position`, keeping branches into it pointed at the new one
    Replace {
        type_name: String,
        method: String,
        position: usize,
        insn: PlanInsn,
    },

    /// Copy positions `from` through `to` of `source` into `method` at `position`
    CopyRange {
        type_name: String,
        method: String,
        source_type: String,
        source: String,
        from: usize,
        to: usize,
        position: usize,
    },
}

fn resolve_method(module: &Module, type_name: &str, method: &str) -> Result<MethodId, Error> {
    let declaring_type = module.require_type(type_name)?;
    module.require_method(declaring_type, method)
}

impl Patch for PatchOp {
    fn name(&self) -> String {
        match self {
            PatchOp::SetReturn {
                type_name, method, ..
            } => format!("set-return {}::{}", type_name, method),
            PatchOp::MakePublic { type_name, method } => {
                format!("make-public {}::{}", type_name, method)
            }
            PatchOp::InjectCall {
                type_name,
                method,
                callee_type,
                callee,
            } => format!(
                "inject-call {}::{} -> {}::{}",
                type_name, method, callee_type, callee
            ),
            PatchOp::RemoveRange {
                type_name,
                method,
                from,
                to,
            } => format!("remove-range {}::{} {}..={}", type_name, method, from, to),
            PatchOp::Pad {
                type_name,
                method,
                position,
                count,
            } => format!("pad {}::{} {} x{}", type_name, method, position, count),
            PatchOp::CloneMethod {
                type_name,
                template,
                new_name,
            } => format!("clone-method {}::{} as {}", type_name, template, new_name),
            PatchOp::Insert {
                type_name,
                method,
                position,
                insn,
            } => format!(
                "insert {}::{} {} {}",
                type_name,
                method,
                position,
                insn.mnemonic()
            ),
            PatchOp::Replace {
                type_name,
                method,
                position,
                insn,
            } => format!(
                "replace {}::{} {} {}",
                type_name,
                method,
                position,
                insn.mnemonic()
            ),
            PatchOp::CopyRange {
                type_name,
                method,
                source_type,
                source,
                from,
                to,
                position,
            } => format!(
                "copy-range {}::{} {}..={} -> {}::{} {}",
                source_type, source, from, to, type_name, method, position
            ),
        }
    }

    fn apply(&self, module: &mut Module) -> Result<(), Error> {
        match self {
            PatchOp::SetReturn {
                type_name,
                method,
                value,
            } => {
                let method = resolve_method(module, type_name, method)?;
                let value = value.resolve(module)?;
                synthesize_return(module, method, &value)?;
            }
            PatchOp::MakePublic { type_name, method } => {
                let method = resolve_method(module, type_name, method)?;
                module.method_mut(method).flags.make_public();
            }
            PatchOp::InjectCall {
                type_name,
                method,
                callee_type,
                callee,
            } => {
                let target = resolve_method(module, type_name, method)?;
                let callee = resolve_method(module, callee_type, callee)?;
                inject_call_at_entry(module, target, callee)?;
            }
            PatchOp::RemoveRange {
                type_name,
                method,
                from,
                to,
            } => {
                let method = resolve_method(module, type_name, method)?;
                BodyEditor::new(module, method)?.remove_range(*from, *to)?;
            }
            PatchOp::Pad {
                type_name,
                method,
                position,
                count,
            } => {
                let method = resolve_method(module, type_name, method)?;
                BodyEditor::new(module, method)?.pad(*position, *count)?;
            }
            PatchOp::CloneMethod {
                type_name,
                template,
                new_name,
            } => {
                let declaring_type = module.require_type(type_name)?;
                let template = module.require_method(declaring_type, template)?;
                let clone = clone_signature(module, declaring_type, template, new_name)?;
                if module.body(template).is_ok() {
                    copy_method_body(module, template, clone)?;
                }
            }
            PatchOp::Insert {
                type_name,
                method,
                position,
                insn,
            } => {
                let method = resolve_method(module, type_name, method)?;
                let insn = insn.resolve(module)?;
                BodyEditor::new(module, method)?.insert_at(*position, insn)?;
            }
            PatchOp::Replace {
                type_name,
                method,
                position,
                insn,
            } => {
                let method = resolve_method(module, type_name, method)?;
                let insn = insn.resolve(module)?;
                BodyEditor::new(module, method)?.replace_at(*position, insn)?;
            }
            PatchOp::CopyRange {
                type_name,
                method,
                source_type,
                source,
                from,
                to,
                position,
            } => {
                let target = resolve_method(module, type_name, method)?;
                let source = resolve_method(module, source_type, source)?;
                BodyEditor::new(module, target)?.copy_range(source, *from, *to, *position)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::il::{Instruction, MethodFlags};
    use crate::test_util::sample_module;

    fn op(type_name: &str, method: &str) -> (String, String) {
        (String::from(type_name), String::from(method))
    }

    #[test]
    fn make_public() {
        let (mut module, sample) = sample_module();
        let (type_name, method) = op("Game.PlayerStats", "Guarded");
        PatchOp::MakePublic { type_name, method }
            .apply(&mut module)
            .unwrap();
        let flags = module.method(sample.guarded).flags;
        assert!(flags.contains(MethodFlags::PUBLIC | MethodFlags::STATIC));
        assert!(!flags.contains(MethodFlags::PRIVATE));
    }

    #[test]
    fn set_return_constructs_by_name() {
        let (mut module, sample) = sample_module();
        let factory = module
            .add_method(
                sample.stats,
                "MakeHelper",
                MethodFlags::STATIC,
                crate::il::MethodSig::new(crate::il::TypeSig::Class(sample.helper), vec![]),
            )
            .unwrap();
        let (type_name, method) = op("Game.PlayerStats", "MakeHelper");
        PatchOp::SetReturn {
            type_name,
            method,
            value: PlanValue::Construct(String::from("Game.Helper")),
        }
        .apply(&mut module)
        .unwrap();
        let body = module.body(factory).unwrap();
        assert_eq!(
            module.instruction(body.instructions[0]),
            Some(&Instruction::NewObj(sample.helper_ctor))
        );

        let (type_name, method) = op("Game.PlayerStats", "MakeHelper");
        assert!(matches!(
            PatchOp::SetReturn {
                type_name,
                method,
                value: PlanValue::Construct(String::from("Game.Missing")),
            }
            .apply(&mut module),
            Err(Error::SymbolNotFound(_))
        ));
    }

    #[test]
    fn insert_and_replace_resolve_members() {
        let (mut module, sample) = sample_module();
        let insert = PatchOp::Insert {
            type_name: String::from("Game.PlayerStats"),
            method: String::from("get_Name"),
            position: 0,
            insn: PlanInsn::Call {
                virtual_call: false,
                type_name: String::from("Game.Helper"),
                method: String::from("Log"),
            },
        };
        assert_eq!(insert.name(), "insert Game.PlayerStats::get_Name 0 call");
        insert.apply(&mut module).unwrap();

        // The original `ldstr` is now at 1
        PatchOp::Replace {
            type_name: String::from("Game.PlayerStats"),
            method: String::from("get_Name"),
            position: 1,
            insn: PlanInsn::Plain(Instruction::LdStr(String::from("Hero"))),
        }
        .apply(&mut module)
        .unwrap();

        let body = module.body(sample.get_name).unwrap();
        assert_eq!(body.len(), 3);
        assert_eq!(
            module.instruction(body.instructions[0]),
            Some(&Instruction::Call(sample.helper_log))
        );
        assert_eq!(
            module.instruction(body.instructions[1]),
            Some(&Instruction::LdStr(String::from("Hero")))
        );
        crate::edit::verify_body(&module, sample.get_name).unwrap();

        let field = PlanInsn::Field {
            access: FieldAccess::LoadStatic,
            type_name: String::from("Game.PlayerStats"),
            field: String::from("_stamina"),
        };
        assert_eq!(field.mnemonic(), "ldsfld");
        assert_eq!(
            field.resolve(&module).unwrap(),
            Instruction::LdsFld(sample.stamina)
        );
        assert_eq!(
            PlanInsn::NewObj(String::from("Game.Helper"))
                .resolve(&module)
                .unwrap(),
            Instruction::NewObj(sample.helper_ctor)
        );

        let missing = PatchOp::Insert {
            type_name: String::from("Game.PlayerStats"),
            method: String::from("get_Name"),
            position: 0,
            insn: PlanInsn::NewObj(String::from("Game.Nope")),
        };
        assert!(matches!(
            missing.apply(&mut module),
            Err(Error::SymbolNotFound(_))
        ));
    }

    #[test]
    fn copy_range_between_methods() {
        let (mut module, sample) = sample_module();
        let patch = PatchOp::CopyRange {
            type_name: String::from("Game.PlayerStats"),
            method: String::from("get_Name"),
            source_type: String::from("Game.PlayerStats"),
            source: String::from("get_MaxStamina"),
            from: 0,
            to: 1,
            position: 0,
        };
        assert_eq!(
            patch.name(),
            "copy-range Game.PlayerStats::get_MaxStamina 0..=1 -> Game.PlayerStats::get_Name 0"
        );
        patch.apply(&mut module).unwrap();

        let body = module.body(sample.get_name).unwrap();
        assert_eq!(body.len(), 4);
        assert_eq!(
            module.instruction(body.instructions[1]),
            Some(&Instruction::LdFld(sample.stamina))
        );
        assert_eq!(module.body(sample.get_max_stamina).unwrap().len(), 3);
    }

    #[test]
    fn clone_method() {
        let (mut module, sample) = sample_module();
        let patch = PatchOp::CloneMethod {
            type_name: String::from("Game.PlayerStats"),
            template: String::from("IsComplete"),
            new_name: String::from("IsCompleteCopy"),
        };
        assert_eq!(
            patch.name(),
            "clone-method Game.PlayerStats::IsComplete as IsCompleteCopy"
        );
        patch.apply(&mut module).unwrap();

        let clone = module.find_method(sample.stats, "IsCompleteCopy").unwrap();
        assert_eq!(module.body(clone).unwrap().len(), 7);
        crate::edit::verify_body(&module, clone).unwrap();
    }
}
