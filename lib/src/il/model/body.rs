use crate::il::{InsnId, TypeSig};

/// Semantic representation of a method body
#[derive(Clone, Debug, PartialEq)]
pub struct MethodBody {
    /// Instruction handles in execution order (the handles are owned by this body)
    pub instructions: Vec<InsnId>,

    /// Local variable slots (indices are `0..locals.len()`)
    pub locals: Vec<VariableSlot>,

    /// Exception ranges, innermost first
    pub handlers: Vec<ExceptionRange<InsnId>>,

    /// Declared maximum depth of the evaluation stack
    pub max_stack: u16,

    /// Must locals be zero-initialized on entry?
    pub init_locals: bool,
}

impl MethodBody {
    pub fn new() -> MethodBody {
        MethodBody {
            instructions: vec![],
            locals: vec![],
            handlers: vec![],
            max_stack: 0,
            init_locals: false,
        }
    }

    /// Current position of a handle in this body
    pub fn position_of(&self, id: InsnId) -> Option<usize> {
        self.instructions.iter().position(|insn| *insn == id)
    }

    pub fn contains(&self, id: InsnId) -> bool {
        self.instructions.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

impl Default for MethodBody {
    fn default() -> MethodBody {
        MethodBody::new()
    }
}

/// Local variable slot
#[derive(Clone, Debug, PartialEq)]
pub struct VariableSlot {
    pub index: u16,
    pub var_type: TypeSig,
}

/// What a protected region does when control leaves it exceptionally (or at all, for `Finally`)
#[derive(Clone, Debug, PartialEq)]
pub enum HandlerKind<Lbl> {
    /// Handler runs for exceptions assignable to the type, which it finds on the stack
    Catch(TypeSig),

    /// Filter code starts at the label and decides whether the handler runs
    Filter(Lbl),

    Finally,
    Fault,
}

/// Exception range, parametrized over how its markers refer to instructions
///
/// Both the protected region and the handler are inclusive at both ends.
#[derive(Clone, Debug, PartialEq)]
pub struct ExceptionRange<Lbl> {
    pub kind: HandlerKind<Lbl>,
    pub try_start: Lbl,
    pub try_end: Lbl,
    pub handler_start: Lbl,
    pub handler_end: Lbl,
}

impl<Lbl: Copy> ExceptionRange<Lbl> {
    /// Every instruction the range refers to
    pub fn markers(&self) -> Vec<Lbl> {
        let mut markers = vec![
            self.try_start,
            self.try_end,
            self.handler_start,
            self.handler_end,
        ];
        if let HandlerKind::Filter(filter_start) = &self.kind {
            markers.push(*filter_start);
        }
        markers
    }

    /// Entry points reached with an exception (or nothing, for finally/fault) on the stack
    pub fn entry_points(&self) -> Vec<(Lbl, u16)> {
        match &self.kind {
            HandlerKind::Catch(_) => vec![(self.handler_start, 1)],
            HandlerKind::Filter(filter_start) => {
                vec![(*filter_start, 1), (self.handler_start, 1)]
            }
            HandlerKind::Finally | HandlerKind::Fault => vec![(self.handler_start, 0)],
        }
    }
}

impl<Lbl> ExceptionRange<Lbl> {
    pub fn try_map_labels<Lbl2, E>(
        &self,
        map_label: impl Fn(&Lbl) -> Result<Lbl2, E>,
    ) -> Result<ExceptionRange<Lbl2>, E> {
        let kind = match &self.kind {
            HandlerKind::Catch(ty) => HandlerKind::Catch(ty.clone()),
            HandlerKind::Filter(lbl) => HandlerKind::Filter(map_label(lbl)?),
            HandlerKind::Finally => HandlerKind::Finally,
            HandlerKind::Fault => HandlerKind::Fault,
        };
        Ok(ExceptionRange {
            kind,
            try_start: map_label(&self.try_start)?,
            try_end: map_label(&self.try_end)?,
            handler_start: map_label(&self.handler_start)?,
            handler_end: map_label(&self.handler_end)?,
        })
    }
}
