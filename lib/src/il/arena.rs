use super::model::MethodId;
use super::Instruction;

/// Opaque, position-independent handle to an instruction in a module's arena
///
/// Handles stay valid while the instruction moves around inside its body. They never get reused,
/// even after the instruction they point to is removed.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InsnId(pub u32);

impl InsnId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Debug for InsnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Slot {
    instruction: Instruction<InsnId>,

    /// Body currently holding the handle (`None` once removed or before placement)
    owner: Option<MethodId>,
}

/// Module-wide instruction storage
///
/// Every instruction of every body lives here. A handle is held by at most one body at a time;
/// copying an instruction into another body always goes through [`InstructionArena::alloc`].
///
/// Released slots are never reclaimed in place, since that would reuse their handles. The arena
/// only grows while a module is being edited (and snapshots copy the dead slots along with the
/// live ones) until [`Module::compact`] rebuilds it.
///
/// [`Module::compact`]: super::model::Module::compact
#[derive(Clone, Debug, PartialEq, Default)]
pub struct InstructionArena {
    slots: Vec<Slot>,
}

impl InstructionArena {
    pub fn new() -> InstructionArena {
        InstructionArena::default()
    }

    /// Store a new instruction, returning its handle
    pub fn alloc(&mut self, instruction: Instruction<InsnId>, owner: Option<MethodId>) -> InsnId {
        let id = InsnId(self.slots.len() as u32);
        self.slots.push(Slot { instruction, owner });
        id
    }

    pub fn get(&self, id: InsnId) -> Option<&Instruction<InsnId>> {
        self.slots.get(id.index()).map(|slot| &slot.instruction)
    }

    pub(crate) fn get_mut(&mut self, id: InsnId) -> Option<&mut Instruction<InsnId>> {
        self.slots.get_mut(id.index()).map(|slot| &mut slot.instruction)
    }

    /// Which body holds the handle, if any
    pub fn owner(&self, id: InsnId) -> Option<MethodId> {
        self.slots.get(id.index()).and_then(|slot| slot.owner)
    }

    /// Detach the handle from its body (the instruction stays readable)
    pub(crate) fn release(&mut self, id: InsnId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            slot.owner = None;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
