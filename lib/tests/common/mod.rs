use ilpatch::edit::{BodyEditor, Fragment};
use ilpatch::il::model::{ExceptionRange, FieldId, HandlerKind, MethodId, Module, TypeId};
use ilpatch::il::*;

#[allow(dead_code)]
pub struct Game {
    pub object_type: TypeId,
    pub player: TypeId,
    pub gold: FieldId,
    pub get_gold: MethodId,
    pub countdown: MethodId,
    pub get_title: MethodId,
    pub safe: MethodId,
    pub logger: TypeId,
    pub logger_ctor: MethodId,
    pub hello: MethodId,
    pub version: MethodId,
}

fn fill(
    module: &mut Module,
    method: MethodId,
    instructions: Vec<Instruction<usize>>,
    handlers: Vec<ExceptionRange<usize>>,
) -> Result<(), Error> {
    let fragment = Fragment::with_handlers(instructions, handlers)?;
    BodyEditor::new(module, method)?.splice_fragment(0, &fragment)?;
    Ok(())
}

fn signature(return_type: TypeSig, params: Vec<Param>) -> MethodSig {
    MethodSig::new(return_type, params)
}

/// Module shaped like a small game assembly
pub fn game_module() -> Result<(Module, Game), Error> {
    let mut module = Module::new("Assembly-CSharp");
    let ctor_flags = MethodFlags::PUBLIC | MethodFlags::SPECIAL_NAME | MethodFlags::RT_SPECIAL_NAME;

    let object_type =
        module.add_type("System", "Object", TypeFlags::PUBLIC | TypeFlags::EXTERNAL)?;
    let object_ctor =
        module.add_method(object_type, ".ctor", ctor_flags, signature(TypeSig::Void, vec![]))?;

    let player = module.add_type("Game", "Player", TypeFlags::PUBLIC)?;
    let gold = module.add_field(player, "_gold", FieldFlags::PRIVATE, TypeSig::Int32)?;
    let player_ctor =
        module.add_method(player, ".ctor", ctor_flags, signature(TypeSig::Void, vec![]))?;
    let get_gold = module.add_method(
        player,
        "GetGold",
        MethodFlags::PUBLIC,
        signature(TypeSig::Int32, vec![]),
    )?;
    let countdown = module.add_method(
        player,
        "Countdown",
        MethodFlags::PRIVATE | MethodFlags::STATIC,
        signature(TypeSig::Int32, vec![Param::new("n", TypeSig::Int32)]),
    )?;
    let get_title = module.add_method(
        player,
        "get_Title",
        MethodFlags::PUBLIC | MethodFlags::SPECIAL_NAME,
        signature(TypeSig::String, vec![]),
    )?;
    let safe = module.add_method(
        player,
        "Safe",
        MethodFlags::PUBLIC | MethodFlags::STATIC,
        signature(TypeSig::Void, vec![]),
    )?;

    let logger = module.add_type("Game", "Logger", TypeFlags::PUBLIC | TypeFlags::SEALED)?;
    let logger_ctor =
        module.add_method(logger, ".ctor", ctor_flags, signature(TypeSig::Void, vec![]))?;
    let hello = module.add_method(
        logger,
        "Hello",
        MethodFlags::PUBLIC,
        signature(TypeSig::Void, vec![]),
    )?;
    let version = module.add_method(
        logger,
        "Version",
        MethodFlags::PUBLIC | MethodFlags::STATIC,
        signature(TypeSig::Int32, vec![]),
    )?;

    for ctor in [player_ctor, logger_ctor] {
        fill(
            &mut module,
            ctor,
            vec![
                Instruction::LdArg(0),
                Instruction::Call(object_ctor),
                Instruction::Ret,
            ],
            vec![],
        )?;
    }
    fill(
        &mut module,
        get_gold,
        vec![
            Instruction::LdArg(0),
            Instruction::LdFld(gold),
            Instruction::Ret,
        ],
        vec![],
    )?;

    // do { n -= 1; } while (n > 0); return n;
    fill(
        &mut module,
        countdown,
        vec![
            Instruction::LdArg(0),
            Instruction::LdcI4(1),
            Instruction::Arith(ArithOp::Sub),
            Instruction::StArg(0),
            Instruction::LdArg(0),
            Instruction::LdcI4(0),
            Instruction::BrCmp(Comparison::Gt, 0),
            Instruction::LdArg(0),
            Instruction::Ret,
        ],
        vec![],
    )?;
    fill(
        &mut module,
        get_title,
        vec![Instruction::LdStr(String::from("Novice")), Instruction::Ret],
        vec![],
    )?;
    fill(
        &mut module,
        safe,
        vec![
            Instruction::Nop,
            Instruction::Leave(4),
            Instruction::Pop,
            Instruction::Leave(4),
            Instruction::Ret,
        ],
        vec![ExceptionRange {
            kind: HandlerKind::Catch(TypeSig::Class(object_type)),
            try_start: 0,
            try_end: 1,
            handler_start: 2,
            handler_end: 3,
        }],
    )?;
    fill(&mut module, hello, vec![Instruction::Ret], vec![])?;
    fill(
        &mut module,
        version,
        vec![Instruction::LdcI4(2), Instruction::Ret],
        vec![],
    )?;
    module.take_touched();

    let game = Game {
        object_type,
        player,
        gold,
        get_gold,
        countdown,
        get_title,
        safe,
        logger,
        logger_ctor,
        hello,
        version,
    };
    Ok((module, game))
}

/// Every branch target and exception range marker of the body is in the body
#[allow(dead_code)]
pub fn assert_references_resolve(module: &Module, method: MethodId) {
    let body = module.body(method).unwrap();
    for id in &body.instructions {
        assert_eq!(module.arena().owner(*id), Some(method));
        let insn = module.instruction(*id).unwrap();
        for target in insn.jump_targets().targets() {
            assert!(body.contains(*target), "{:?} branches out of the body", id);
        }
    }
    for handler in &body.handlers {
        for marker in handler.markers() {
            assert!(body.contains(marker), "exception range marker {:?} is gone", marker);
        }
    }
}
