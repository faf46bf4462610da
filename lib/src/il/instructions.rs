//! This module contains the AST of IL instructions. The representation is slightly different from
//! the usual presentation to make editing more convenient:
//!
//!   - Short forms (`ldc.i4.0`, `ldloc.s`, `br.s`, ...) don't show up at all. Every instruction
//!     uses its long form, so an instruction's encoding never depends on where it sits
//!
//!   - Some instructions (like the conditional branches and the arithmetic) get abstracted into
//!     one instruction with a field. This helps with repetitive pattern matches
//!
//!   - Branch targets are a type parameter. Inside a body they are [`InsnId`] handles, inside a
//!     [`Fragment`] they are fragment-relative positions, and in a module file they are positions
//!     in the body
//!
//! [`InsnId`]: super::InsnId
//! [`Fragment`]: crate::edit::Fragment

use super::model::{FieldId, MethodId};
use super::{Deserialize, Error, Serialize, TypeSig};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::Infallible;
use std::io::Result;

/// IL instruction, parametrized over the representation of branch targets
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction<Lbl> {
    Nop,
    LdNull,
    LdcI4(i32),
    LdcI8(i64),
    LdcR4(f32),
    LdcR8(f64),
    LdStr(String),

    LdArg(u16),
    LdArgA(u16),
    StArg(u16),
    LdLoc(u16),
    LdLocA(u16),
    StLoc(u16),

    Dup,
    Pop,

    Arith(ArithOp), // covers `add`, `sub`, `mul`, `div`, `rem`, `and`, `or`, `xor`, `shl`, `shr`
    Neg,
    Not,
    Compare(CompareOp), // covers `ceq`, `cgt`, `clt`
    Conv(ConvKind),     // covers `conv.i4`, `conv.i8`, `conv.r4`, `conv.r8`

    LdFld(FieldId),
    LdFldA(FieldId),
    StFld(FieldId),
    LdsFld(FieldId),
    StsFld(FieldId),

    Call(MethodId),
    CallVirt(MethodId),
    NewObj(MethodId),

    NewArr(TypeSig),
    LdLen,
    LdElem(TypeSig),
    StElem(TypeSig),
    BoxValue(TypeSig),
    UnboxAny(TypeSig),
    CastClass(TypeSig),
    IsInst(TypeSig),
    InitObj(TypeSig),

    Br(Lbl),
    BrIf(Condition, Lbl),   // covers `brtrue`, `brfalse`
    BrCmp(Comparison, Lbl), // covers `beq`, `bne.un`, `blt`, `bge`, `bgt`, `ble`
    Switch(Vec<Lbl>),

    /// Exit a protected region, emptying the evaluation stack
    Leave(Lbl),

    Ret,
    Throw,
    Rethrow,
    EndFinally,
}

/// Binary arithmetic and bitwise operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

/// Comparisons pushing `0` or `1`
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
}

/// Numeric conversion targets
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ConvKind {
    I4,
    I8,
    R4,
    R8,
}

/// Truthiness tested by single-operand branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Condition {
    True,
    False,
}

/// Binary comparison operators available for two-operand branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Ge,
    Gt,
    Le,
}

/// Jump targets of an instruction (not counting fallthrough)
pub enum JumpTargets<Lbl> {
    None,
    Regular(Lbl),
    Many(Vec<Lbl>),
}

impl<A> JumpTargets<A> {
    pub fn targets(&self) -> &[A] {
        match self {
            JumpTargets::None => &[],
            JumpTargets::Regular(a) => std::slice::from_ref(a),
            JumpTargets::Many(a_many) => a_many,
        }
    }
}

impl<Lbl: Copy> Instruction<Lbl> {
    /// If the instruction can jump somewhere other than the next instruction, get those targets
    pub fn jump_targets(&self) -> JumpTargets<Lbl> {
        match self {
            Instruction::Br(lbl)
            | Instruction::BrIf(_, lbl)
            | Instruction::BrCmp(_, lbl)
            | Instruction::Leave(lbl) => JumpTargets::Regular(*lbl),
            Instruction::Switch(lbls) => JumpTargets::Many(lbls.clone()),
            _ => JumpTargets::None,
        }
    }
}

impl<Lbl> Instruction<Lbl> {
    /// Can control reach the next instruction in the body?
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Br(_)
                | Instruction::Leave(_)
                | Instruction::Ret
                | Instruction::Throw
                | Instruction::Rethrow
                | Instruction::EndFinally
        )
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Instruction::Br(_)
                | Instruction::BrIf(_, _)
                | Instruction::BrCmp(_, _)
                | Instruction::Switch(_)
                | Instruction::Leave(_)
        )
    }

    /// Local variable slot read or written
    pub fn local_index(&self) -> Option<u16> {
        match self {
            Instruction::LdLoc(idx) | Instruction::LdLocA(idx) | Instruction::StLoc(idx) => {
                Some(*idx)
            }
            _ => None,
        }
    }

    /// Argument slot read or written (`this` is argument 0 for instance methods)
    pub fn argument_index(&self) -> Option<u16> {
        match self {
            Instruction::LdArg(idx) | Instruction::LdArgA(idx) | Instruction::StArg(idx) => {
                Some(*idx)
            }
            _ => None,
        }
    }

    pub fn field(&self) -> Option<FieldId> {
        match self {
            Instruction::LdFld(field)
            | Instruction::LdFldA(field)
            | Instruction::StFld(field)
            | Instruction::LdsFld(field)
            | Instruction::StsFld(field) => Some(*field),
            _ => None,
        }
    }

    pub fn method(&self) -> Option<MethodId> {
        match self {
            Instruction::Call(method)
            | Instruction::CallVirt(method)
            | Instruction::NewObj(method) => Some(*method),
            _ => None,
        }
    }

    pub fn type_operand(&self) -> Option<&TypeSig> {
        match self {
            Instruction::NewArr(ty)
            | Instruction::LdElem(ty)
            | Instruction::StElem(ty)
            | Instruction::BoxValue(ty)
            | Instruction::UnboxAny(ty)
            | Instruction::CastClass(ty)
            | Instruction::IsInst(ty)
            | Instruction::InitObj(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn map_labels<Lbl2>(&self, map_label: impl Fn(&Lbl) -> Lbl2) -> Instruction<Lbl2> {
        match self.try_map_labels(|lbl| Ok::<Lbl2, Infallible>(map_label(lbl))) {
            Ok(insn) => insn,
            Err(never) => match never {},
        }
    }

    /// Rewrite every branch target, stopping at the first one that fails to map
    pub fn try_map_labels<Lbl2, E>(
        &self,
        map_label: impl Fn(&Lbl) -> std::result::Result<Lbl2, E>,
    ) -> std::result::Result<Instruction<Lbl2>, E> {
        use Instruction as I;

        Ok(match self {
            I::Br(lbl) => I::Br(map_label(lbl)?),
            I::BrIf(cond, lbl) => I::BrIf(*cond, map_label(lbl)?),
            I::BrCmp(comp, lbl) => I::BrCmp(*comp, map_label(lbl)?),
            I::Leave(lbl) => I::Leave(map_label(lbl)?),
            I::Switch(lbls) => I::Switch(
                lbls.iter()
                    .map(&map_label)
                    .collect::<std::result::Result<Vec<Lbl2>, E>>()?,
            ),

            I::Nop => I::Nop,
            I::LdNull => I::LdNull,
            I::LdcI4(i) => I::LdcI4(*i),
            I::LdcI8(l) => I::LdcI8(*l),
            I::LdcR4(f) => I::LdcR4(*f),
            I::LdcR8(d) => I::LdcR8(*d),
            I::LdStr(s) => I::LdStr(s.clone()),
            I::LdArg(idx) => I::LdArg(*idx),
            I::LdArgA(idx) => I::LdArgA(*idx),
            I::StArg(idx) => I::StArg(*idx),
            I::LdLoc(idx) => I::LdLoc(*idx),
            I::LdLocA(idx) => I::LdLocA(*idx),
            I::StLoc(idx) => I::StLoc(*idx),
            I::Dup => I::Dup,
            I::Pop => I::Pop,
            I::Arith(op) => I::Arith(*op),
            I::Neg => I::Neg,
            I::Not => I::Not,
            I::Compare(op) => I::Compare(*op),
            I::Conv(kind) => I::Conv(*kind),
            I::LdFld(field) => I::LdFld(*field),
            I::LdFldA(field) => I::LdFldA(*field),
            I::StFld(field) => I::StFld(*field),
            I::LdsFld(field) => I::LdsFld(*field),
            I::StsFld(field) => I::StsFld(*field),
            I::Call(method) => I::Call(*method),
            I::CallVirt(method) => I::CallVirt(*method),
            I::NewObj(method) => I::NewObj(*method),
            I::NewArr(ty) => I::NewArr(ty.clone()),
            I::LdLen => I::LdLen,
            I::LdElem(ty) => I::LdElem(ty.clone()),
            I::StElem(ty) => I::StElem(ty.clone()),
            I::BoxValue(ty) => I::BoxValue(ty.clone()),
            I::UnboxAny(ty) => I::UnboxAny(ty.clone()),
            I::CastClass(ty) => I::CastClass(ty.clone()),
            I::IsInst(ty) => I::IsInst(ty.clone()),
            I::InitObj(ty) => I::InitObj(ty.clone()),
            I::Ret => I::Ret,
            I::Throw => I::Throw,
            I::Rethrow => I::Rethrow,
            I::EndFinally => I::EndFinally,
        })
    }

    /// Textual opcode name
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "nop",
            Instruction::LdNull => "ldnull",
            Instruction::LdcI4(_) => "ldc.i4",
            Instruction::LdcI8(_) => "ldc.i8",
            Instruction::LdcR4(_) => "ldc.r4",
            Instruction::LdcR8(_) => "ldc.r8",
            Instruction::LdStr(_) => "ldstr",
            Instruction::LdArg(_) => "ldarg",
            Instruction::LdArgA(_) => "ldarga",
            Instruction::StArg(_) => "starg",
            Instruction::LdLoc(_) => "ldloc",
            Instruction::LdLocA(_) => "ldloca",
            Instruction::StLoc(_) => "stloc",
            Instruction::Dup => "dup",
            Instruction::Pop => "pop",
            Instruction::Arith(op) => match op {
                ArithOp::Add => "add",
                ArithOp::Sub => "sub",
                ArithOp::Mul => "mul",
                ArithOp::Div => "div",
                ArithOp::Rem => "rem",
                ArithOp::And => "and",
                ArithOp::Or => "or",
                ArithOp::Xor => "xor",
                ArithOp::Shl => "shl",
                ArithOp::Shr => "shr",
            },
            Instruction::Neg => "neg",
            Instruction::Not => "not",
            Instruction::Compare(op) => match op {
                CompareOp::Eq => "ceq",
                CompareOp::Gt => "cgt",
                CompareOp::Lt => "clt",
            },
            Instruction::Conv(kind) => match kind {
                ConvKind::I4 => "conv.i4",
                ConvKind::I8 => "conv.i8",
                ConvKind::R4 => "conv.r4",
                ConvKind::R8 => "conv.r8",
            },
            Instruction::LdFld(_) => "ldfld",
            Instruction::LdFldA(_) => "ldflda",
            Instruction::StFld(_) => "stfld",
            Instruction::LdsFld(_) => "ldsfld",
            Instruction::StsFld(_) => "stsfld",
            Instruction::Call(_) => "call",
            Instruction::CallVirt(_) => "callvirt",
            Instruction::NewObj(_) => "newobj",
            Instruction::NewArr(_) => "newarr",
            Instruction::LdLen => "ldlen",
            Instruction::LdElem(_) => "ldelem",
            Instruction::StElem(_) => "stelem",
            Instruction::BoxValue(_) => "box",
            Instruction::UnboxAny(_) => "unbox.any",
            Instruction::CastClass(_) => "castclass",
            Instruction::IsInst(_) => "isinst",
            Instruction::InitObj(_) => "initobj",
            Instruction::Br(_) => "br",
            Instruction::BrIf(Condition::True, _) => "brtrue",
            Instruction::BrIf(Condition::False, _) => "brfalse",
            Instruction::BrCmp(comp, _) => match comp {
                Comparison::Eq => "beq",
                Comparison::Ne => "bne.un",
                Comparison::Lt => "blt",
                Comparison::Ge => "bge",
                Comparison::Gt => "bgt",
                Comparison::Le => "ble",
            },
            Instruction::Switch(_) => "switch",
            Instruction::Leave(_) => "leave",
            Instruction::Ret => "ret",
            Instruction::Throw => "throw",
            Instruction::Rethrow => "rethrow",
            Instruction::EndFinally => "endfinally",
        }
    }
}

/// Prefix byte of two-byte opcodes
const TWO_BYTE_PREFIX: u8 = 0xFE;

impl Serialize for Instruction<u32> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        fn two_byte<W: WriteBytesExt>(writer: &mut W, opcode: u8) -> Result<()> {
            TWO_BYTE_PREFIX.serialize(writer)?;
            opcode.serialize(writer)
        }

        match self {
            Instruction::Nop => 0x00u8.serialize(writer)?,
            Instruction::LdNull => 0x14u8.serialize(writer)?,
            Instruction::LdcI4(i) => {
                0x20u8.serialize(writer)?;
                i.serialize(writer)?;
            }
            Instruction::LdcI8(l) => {
                0x21u8.serialize(writer)?;
                l.serialize(writer)?;
            }
            Instruction::LdcR4(f) => {
                0x22u8.serialize(writer)?;
                f.serialize(writer)?;
            }
            Instruction::LdcR8(d) => {
                0x23u8.serialize(writer)?;
                d.serialize(writer)?;
            }
            Instruction::Dup => 0x25u8.serialize(writer)?,
            Instruction::Pop => 0x26u8.serialize(writer)?,
            Instruction::Call(method) => {
                0x28u8.serialize(writer)?;
                method.serialize(writer)?;
            }
            Instruction::Ret => 0x2Au8.serialize(writer)?,
            Instruction::Br(lbl) => {
                0x38u8.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            Instruction::BrIf(cond, lbl) => {
                let opcode: u8 = match cond {
                    Condition::False => 0x39,
                    Condition::True => 0x3A,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            Instruction::BrCmp(comp, lbl) => {
                let opcode: u8 = match comp {
                    Comparison::Eq => 0x3B,
                    Comparison::Ge => 0x3C,
                    Comparison::Gt => 0x3D,
                    Comparison::Le => 0x3E,
                    Comparison::Lt => 0x3F,
                    Comparison::Ne => 0x40,
                };
                opcode.serialize(writer)?;
                lbl.serialize(writer)?;
            }
            Instruction::Switch(lbls) => {
                0x45u8.serialize(writer)?;
                lbls.serialize(writer)?;
            }
            Instruction::Arith(op) => {
                let opcode: u8 = match op {
                    ArithOp::Add => 0x58,
                    ArithOp::Sub => 0x59,
                    ArithOp::Mul => 0x5A,
                    ArithOp::Div => 0x5B,
                    ArithOp::Rem => 0x5D,
                    ArithOp::And => 0x5F,
                    ArithOp::Or => 0x60,
                    ArithOp::Xor => 0x61,
                    ArithOp::Shl => 0x62,
                    ArithOp::Shr => 0x63,
                };
                opcode.serialize(writer)?;
            }
            Instruction::Neg => 0x65u8.serialize(writer)?,
            Instruction::Not => 0x66u8.serialize(writer)?,
            Instruction::Conv(kind) => {
                let opcode: u8 = match kind {
                    ConvKind::I4 => 0x69,
                    ConvKind::I8 => 0x6A,
                    ConvKind::R4 => 0x6B,
                    ConvKind::R8 => 0x6C,
                };
                opcode.serialize(writer)?;
            }
            Instruction::CallVirt(method) => {
                0x6Fu8.serialize(writer)?;
                method.serialize(writer)?;
            }
            Instruction::LdStr(s) => {
                0x72u8.serialize(writer)?;
                s.serialize(writer)?;
            }
            Instruction::NewObj(method) => {
                0x73u8.serialize(writer)?;
                method.serialize(writer)?;
            }
            Instruction::CastClass(ty) => {
                0x74u8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::IsInst(ty) => {
                0x75u8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::Throw => 0x7Au8.serialize(writer)?,
            Instruction::LdFld(field) => {
                0x7Bu8.serialize(writer)?;
                field.serialize(writer)?;
            }
            Instruction::LdFldA(field) => {
                0x7Cu8.serialize(writer)?;
                field.serialize(writer)?;
            }
            Instruction::StFld(field) => {
                0x7Du8.serialize(writer)?;
                field.serialize(writer)?;
            }
            Instruction::LdsFld(field) => {
                0x7Eu8.serialize(writer)?;
                field.serialize(writer)?;
            }
            Instruction::StsFld(field) => {
                0x80u8.serialize(writer)?;
                field.serialize(writer)?;
            }
            Instruction::BoxValue(ty) => {
                0x8Cu8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::NewArr(ty) => {
                0x8Du8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::LdLen => 0x8Eu8.serialize(writer)?,
            Instruction::LdElem(ty) => {
                0xA3u8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::StElem(ty) => {
                0xA4u8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::UnboxAny(ty) => {
                0xA5u8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            Instruction::EndFinally => 0xDCu8.serialize(writer)?,
            Instruction::Leave(lbl) => {
                0xDDu8.serialize(writer)?;
                lbl.serialize(writer)?;
            }

            Instruction::Compare(op) => {
                let opcode: u8 = match op {
                    CompareOp::Eq => 0x01,
                    CompareOp::Gt => 0x02,
                    CompareOp::Lt => 0x04,
                };
                two_byte(writer, opcode)?;
            }
            Instruction::LdArg(idx) => {
                two_byte(writer, 0x09)?;
                idx.serialize(writer)?;
            }
            Instruction::LdArgA(idx) => {
                two_byte(writer, 0x0A)?;
                idx.serialize(writer)?;
            }
            Instruction::StArg(idx) => {
                two_byte(writer, 0x0B)?;
                idx.serialize(writer)?;
            }
            Instruction::LdLoc(idx) => {
                two_byte(writer, 0x0C)?;
                idx.serialize(writer)?;
            }
            Instruction::LdLocA(idx) => {
                two_byte(writer, 0x0D)?;
                idx.serialize(writer)?;
            }
            Instruction::StLoc(idx) => {
                two_byte(writer, 0x0E)?;
                idx.serialize(writer)?;
            }
            Instruction::InitObj(ty) => {
                two_byte(writer, 0x15)?;
                ty.serialize(writer)?;
            }
            Instruction::Rethrow => two_byte(writer, 0x1A)?,
        }
        Ok(())
    }
}

impl Deserialize for Instruction<u32> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let opcode = u8::deserialize(reader)?;
        Ok(match opcode {
            0x00 => Instruction::Nop,
            0x14 => Instruction::LdNull,
            0x20 => Instruction::LdcI4(i32::deserialize(reader)?),
            0x21 => Instruction::LdcI8(i64::deserialize(reader)?),
            0x22 => Instruction::LdcR4(f32::deserialize(reader)?),
            0x23 => Instruction::LdcR8(f64::deserialize(reader)?),
            0x25 => Instruction::Dup,
            0x26 => Instruction::Pop,
            0x28 => Instruction::Call(MethodId::deserialize(reader)?),
            0x2A => Instruction::Ret,
            0x38 => Instruction::Br(u32::deserialize(reader)?),
            0x39 => Instruction::BrIf(Condition::False, u32::deserialize(reader)?),
            0x3A => Instruction::BrIf(Condition::True, u32::deserialize(reader)?),
            0x3B => Instruction::BrCmp(Comparison::Eq, u32::deserialize(reader)?),
            0x3C => Instruction::BrCmp(Comparison::Ge, u32::deserialize(reader)?),
            0x3D => Instruction::BrCmp(Comparison::Gt, u32::deserialize(reader)?),
            0x3E => Instruction::BrCmp(Comparison::Le, u32::deserialize(reader)?),
            0x3F => Instruction::BrCmp(Comparison::Lt, u32::deserialize(reader)?),
            0x40 => Instruction::BrCmp(Comparison::Ne, u32::deserialize(reader)?),
            0x45 => Instruction::Switch(Vec::<u32>::deserialize(reader)?),
            0x58 => Instruction::Arith(ArithOp::Add),
            0x59 => Instruction::Arith(ArithOp::Sub),
            0x5A => Instruction::Arith(ArithOp::Mul),
            0x5B => Instruction::Arith(ArithOp::Div),
            0x5D => Instruction::Arith(ArithOp::Rem),
            0x5F => Instruction::Arith(ArithOp::And),
            0x60 => Instruction::Arith(ArithOp::Or),
            0x61 => Instruction::Arith(ArithOp::Xor),
            0x62 => Instruction::Arith(ArithOp::Shl),
            0x63 => Instruction::Arith(ArithOp::Shr),
            0x65 => Instruction::Neg,
            0x66 => Instruction::Not,
            0x69 => Instruction::Conv(ConvKind::I4),
            0x6A => Instruction::Conv(ConvKind::I8),
            0x6B => Instruction::Conv(ConvKind::R4),
            0x6C => Instruction::Conv(ConvKind::R8),
            0x6F => Instruction::CallVirt(MethodId::deserialize(reader)?),
            0x72 => Instruction::LdStr(String::deserialize(reader)?),
            0x73 => Instruction::NewObj(MethodId::deserialize(reader)?),
            0x74 => Instruction::CastClass(TypeSig::deserialize(reader)?),
            0x75 => Instruction::IsInst(TypeSig::deserialize(reader)?),
            0x7A => Instruction::Throw,
            0x7B => Instruction::LdFld(FieldId::deserialize(reader)?),
            0x7C => Instruction::LdFldA(FieldId::deserialize(reader)?),
            0x7D => Instruction::StFld(FieldId::deserialize(reader)?),
            0x7E => Instruction::LdsFld(FieldId::deserialize(reader)?),
            0x80 => Instruction::StsFld(FieldId::deserialize(reader)?),
            0x8C => Instruction::BoxValue(TypeSig::deserialize(reader)?),
            0x8D => Instruction::NewArr(TypeSig::deserialize(reader)?),
            0x8E => Instruction::LdLen,
            0xA3 => Instruction::LdElem(TypeSig::deserialize(reader)?),
            0xA4 => Instruction::StElem(TypeSig::deserialize(reader)?),
            0xA5 => Instruction::UnboxAny(TypeSig::deserialize(reader)?),
            0xDC => Instruction::EndFinally,
            0xDD => Instruction::Leave(u32::deserialize(reader)?),
            TWO_BYTE_PREFIX => {
                let second = u8::deserialize(reader)?;
                match second {
                    0x01 => Instruction::Compare(CompareOp::Eq),
                    0x02 => Instruction::Compare(CompareOp::Gt),
                    0x04 => Instruction::Compare(CompareOp::Lt),
                    0x09 => Instruction::LdArg(u16::deserialize(reader)?),
                    0x0A => Instruction::LdArgA(u16::deserialize(reader)?),
                    0x0B => Instruction::StArg(u16::deserialize(reader)?),
                    0x0C => Instruction::LdLoc(u16::deserialize(reader)?),
                    0x0D => Instruction::LdLocA(u16::deserialize(reader)?),
                    0x0E => Instruction::StLoc(u16::deserialize(reader)?),
                    0x15 => Instruction::InitObj(TypeSig::deserialize(reader)?),
                    0x1A => Instruction::Rethrow,
                    other => return Err(Error::UnknownOpcode(0xFE00 | other as u16)),
                }
            }
            other => return Err(Error::UnknownOpcode(other as u16)),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn control_flow_classification() {
        let br: Instruction<usize> = Instruction::Br(3);
        assert!(!br.falls_through());
        assert_eq!(br.jump_targets().targets(), &[3]);

        let cond: Instruction<usize> = Instruction::BrIf(Condition::True, 1);
        assert!(cond.falls_through());
        assert!(cond.is_branch());

        let switch: Instruction<usize> = Instruction::Switch(vec![0, 2, 2]);
        assert_eq!(switch.jump_targets().targets(), &[0, 2, 2]);
        assert!(Instruction::<usize>::Ret.jump_targets().targets().is_empty());
    }

    #[test]
    fn map_labels_keeps_operands() {
        let insn: Instruction<usize> = Instruction::BrCmp(Comparison::Lt, 5);
        assert_eq!(
            insn.map_labels(|lbl| *lbl as u32 + 10),
            Instruction::BrCmp(Comparison::Lt, 15u32)
        );

        let failed = Instruction::Switch(vec![1usize, 7]).try_map_labels(|lbl| {
            if *lbl < 5 {
                Ok(*lbl)
            } else {
                Err(*lbl)
            }
        });
        assert_eq!(failed, Err(7));
    }

    #[test]
    fn two_byte_opcodes_use_prefix() {
        let mut bytes = vec![];
        Instruction::<u32>::LdLoc(2).serialize(&mut bytes).unwrap();
        assert_eq!(bytes, vec![0xFE, 0x0C, 0x02, 0x00]);

        let decoded = Instruction::<u32>::deserialize(&mut bytes.as_slice()).unwrap();
        assert_eq!(decoded, Instruction::LdLoc(2));
    }

    #[test]
    fn unknown_opcode() {
        let bytes: Vec<u8> = vec![0xFE, 0x99];
        assert!(matches!(
            Instruction::<u32>::deserialize(&mut bytes.as_slice()),
            Err(Error::UnknownOpcode(0xFE99))
        ));
    }
}
