use super::InsnId;

#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),

    /// Input does not start with the module file magic
    BadMagic([u8; 4]),
    UnsupportedVersion(u16),
    UnknownOpcode(u16),

    /// Structurally broken module file (bad UTF-8, out-of-range table index, ...)
    Malformed(String),

    /// A type, method, or field could not be resolved by name
    ///
    /// This is the only soft error: a batch skips the patch that hit it and carries on.
    SymbolNotFound(String),

    /// Zero or several overloads match a lookup which needs exactly one
    AmbiguousOrMissing {
        type_name: String,
        method_name: String,
        candidates: usize,
    },

    DuplicateType(String),
    DuplicateField(String),
    InvalidName(String),

    /// Method is abstract or external and has no body to edit
    NoBody(String),

    PositionOutOfRange {
        method: String,
        position: usize,
        len: usize,
    },
    LocalIndexOutOfRange {
        method: String,
        index: u16,
        locals: usize,
    },
    ArgumentIndexOutOfRange {
        method: String,
        index: u16,
        arguments: usize,
    },
    LocalsOverflow(String),

    /// Handle is not part of the body it was used with
    InstructionNotInBody {
        method: String,
        instruction: InsnId,
    },

    /// Handle already belongs to a body other than the one it is being placed in
    InstructionOwnedElsewhere {
        method: String,
        instruction: InsnId,
    },

    /// A branch (at `branch` in the body) refers to an instruction not in the body
    DanglingBranchTarget {
        method: String,
        branch: usize,
        target: InsnId,
    },

    /// An exception range would lose some, but not all, of its boundary instructions
    DanglingHandlerRange { method: String, handler: usize },

    /// A branch inside a range being copied jumps outside of that range
    UnresolvableExternalBranch { method: String, position: usize },

    /// An exception range straddles the boundary of a range being copied
    PartialHandlerRange { method: String, handler: usize },

    ReturnTypeMismatch {
        method: String,
        expected: String,
        found: String,
    },
    NoParameterlessConstructor(String),
    UnsupportedCallee(String),
    SignatureMismatch { source: String, target: String },

    EmptyBody(String),
    StackUnderflow { method: String, position: usize },

    /// The evaluation stack would hold more than `u16::MAX` values
    StackOverflow { method: String, position: usize },
    StackHeightMismatch {
        method: String,
        position: usize,
        expected: u16,
        found: u16,
    },
    MaxStackExceeded {
        method: String,
        declared: u16,
        required: u16,
    },
    FallsOffEnd { method: String, position: usize },

    /// Syntax or semantic error in a patch plan (lines are 1-based)
    InvalidPlan { line: usize, message: String },
}

impl Error {
    /// Soft errors leave the module untouched and do not abort a batch
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::SymbolNotFound(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
