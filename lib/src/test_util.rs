use crate::edit::{BodyEditor, Fragment};
use crate::il::model::{ExceptionRange, FieldId, HandlerKind, MethodId, Module, TypeId};
use crate::il::{
    Comparison, FieldFlags, Instruction, MethodFlags, MethodSig, Param, TypeFlags, TypeSig,
};

/// Handles into the module built by [`sample_module`]
pub struct Sample {
    pub object_type: TypeId,
    pub object_ctor: MethodId,

    pub stats: TypeId,
    pub data: TypeId,
    pub stamina: FieldId,
    pub stats_ctor: MethodId,
    pub get_max_stamina: MethodId,
    pub is_complete: MethodId,
    pub get_name: MethodId,
    pub guarded: MethodId,

    pub helper: TypeId,
    pub helper_ctor: MethodId,
    pub helper_log: MethodId,
    pub helper_ping: MethodId,
}

fn fill(module: &mut Module, method: MethodId, instructions: Vec<Instruction<usize>>) {
    let fragment = Fragment::new(instructions).unwrap();
    BodyEditor::new(module, method)
        .unwrap()
        .splice_fragment(0, &fragment)
        .unwrap();
}

fn void() -> MethodSig {
    MethodSig::new(TypeSig::Void, vec![])
}

/// Small module with an external base type, a game type and a helper type
///
/// ```text
/// System.Object          .ctor (no body)
/// Game.PlayerStats       int _stamina
///                        .ctor                      _stamina = 100
///                        int get_MaxStamina()       return _stamina
///                        bool IsComplete(int level) return !(level < 3)
///                        string get_Name()          return "Player"
///                        static void Guarded()      try {} finally {}
/// Game.PlayerStats/Data
/// Game.Helper            .ctor, static void Log(), int Ping()
/// ```
pub fn sample_module() -> (Module, Sample) {
    let mut module = Module::new("Assembly-CSharp");
    let ctor_flags = MethodFlags::PUBLIC | MethodFlags::SPECIAL_NAME | MethodFlags::RT_SPECIAL_NAME;

    let object_type = module
        .add_type("System", "Object", TypeFlags::PUBLIC | TypeFlags::EXTERNAL)
        .unwrap();
    let object_ctor = module
        .add_method(object_type, ".ctor", ctor_flags, void())
        .unwrap();

    let stats = module
        .add_type("Game", "PlayerStats", TypeFlags::PUBLIC)
        .unwrap();
    let data = module
        .add_nested_type(stats, "Data", TypeFlags::PUBLIC)
        .unwrap();
    let stamina = module
        .add_field(stats, "_stamina", FieldFlags::PRIVATE, TypeSig::Int32)
        .unwrap();
    let stats_ctor = module.add_method(stats, ".ctor", ctor_flags, void()).unwrap();
    let get_max_stamina = module
        .add_method(
            stats,
            "get_MaxStamina",
            MethodFlags::PUBLIC | MethodFlags::SPECIAL_NAME,
            MethodSig::new(TypeSig::Int32, vec![]),
        )
        .unwrap();
    let is_complete = module
        .add_method(
            stats,
            "IsComplete",
            MethodFlags::PUBLIC,
            MethodSig::new(TypeSig::Boolean, vec![Param::new("level", TypeSig::Int32)]),
        )
        .unwrap();
    let get_name = module
        .add_method(
            stats,
            "get_Name",
            MethodFlags::PUBLIC | MethodFlags::SPECIAL_NAME,
            MethodSig::new(TypeSig::String, vec![]),
        )
        .unwrap();
    let guarded = module
        .add_method(
            stats,
            "Guarded",
            MethodFlags::PRIVATE | MethodFlags::STATIC,
            void(),
        )
        .unwrap();

    let helper = module.add_type("Game", "Helper", TypeFlags::PUBLIC).unwrap();
    let helper_ctor = module.add_method(helper, ".ctor", ctor_flags, void()).unwrap();
    let helper_log = module
        .add_method(
            helper,
            "Log",
            MethodFlags::PUBLIC | MethodFlags::STATIC,
            void(),
        )
        .unwrap();
    let helper_ping = module
        .add_method(
            helper,
            "Ping",
            MethodFlags::PUBLIC,
            MethodSig::new(TypeSig::Int32, vec![]),
        )
        .unwrap();

    fill(
        &mut module,
        stats_ctor,
        vec![
            Instruction::LdArg(0),
            Instruction::LdcI4(100),
            Instruction::StFld(stamina),
            Instruction::Ret,
        ],
    );
    fill(
        &mut module,
        get_max_stamina,
        vec![
            Instruction::LdArg(0),
            Instruction::LdFld(stamina),
            Instruction::Ret,
        ],
    );
    fill(
        &mut module,
        is_complete,
        vec![
            Instruction::LdArg(1),
            Instruction::LdcI4(3),
            Instruction::BrCmp(Comparison::Lt, 5),
            Instruction::LdcI4(1),
            Instruction::Ret,
            Instruction::LdcI4(0),
            Instruction::Ret,
        ],
    );
    fill(
        &mut module,
        get_name,
        vec![Instruction::LdStr(String::from("Player")), Instruction::Ret],
    );

    let guarded_body = Fragment::with_handlers(
        vec![
            Instruction::Nop,
            Instruction::Leave(4),
            Instruction::Nop,
            Instruction::EndFinally,
            Instruction::Ret,
        ],
        vec![ExceptionRange {
            kind: HandlerKind::Finally,
            try_start: 0,
            try_end: 1,
            handler_start: 2,
            handler_end: 3,
        }],
    )
    .unwrap();
    BodyEditor::new(&mut module, guarded)
        .unwrap()
        .splice_fragment(0, &guarded_body)
        .unwrap();

    fill(
        &mut module,
        helper_ctor,
        vec![
            Instruction::LdArg(0),
            Instruction::Call(object_ctor),
            Instruction::Ret,
        ],
    );
    fill(&mut module, helper_log, vec![Instruction::Ret]);
    fill(
        &mut module,
        helper_ping,
        vec![Instruction::LdcI4(1), Instruction::Ret],
    );

    module.take_touched();
    let sample = Sample {
        object_type,
        object_ctor,
        stats,
        data,
        stamina,
        stats_ctor,
        get_max_stamina,
        is_complete,
        get_name,
        guarded,
        helper,
        helper_ctor,
        helper_log,
        helper_ping,
    };
    (module, sample)
}
