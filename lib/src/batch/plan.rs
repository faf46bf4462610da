//! Line-oriented patch plans
//!
//! Each non-blank line that does not start with `#` is one operation:
//!
//! ```text
//! set-return   <Type> <method> <literal>
//! make-public  <Type> <method>
//! inject-call  <Type> <method> <CalleeType> <callee>
//! remove-range <Type> <method> <from> <to>
//! pad          <Type> <method> <position> <count>
//! clone-method <Type> <template> <new-name>
//! insert       <Type> <method> <position> <instruction>
//! replace      <Type> <method> <position> <instruction>
//! copy-range   <Type> <method> <SourceType> <source> <from> <to> <position>
//! ```
//!
//! Literals are `int:1000`, `bool:true`, `float:0.5`, `double:0.25`, `new:Namespace.Type`, or
//! `str:` followed by the rest of the line.
//!
//! Instructions are written as a mnemonic and its operands:
//!
//! ```text
//! ldc.i4 1000        ldc.r4 0.5         ldstr Rest of the line
//! ldloc 0            starg 1            pop
//! call Game.Logger Hello                callvirt Game.Logger Hello
//! newobj Game.Logger                    ldfld Game.Player _gold
//! ```

use super::{Batch, FieldAccess, PatchOp, PlanInsn, PlanValue};
use crate::il::{ArithOp, CompareOp, ConvKind, Error, InsnId, Instruction};
use std::str::FromStr;

/// Split off the first word of `line`, returning it and whatever follows (trimmed at the start)
fn next_word(line: &str) -> Option<(&str, &str)> {
    let line = line.trim_start();
    if line.is_empty() {
        return None;
    }
    match line.find(char::is_whitespace) {
        Some(end) => Some((&line[..end], line[end..].trim_start())),
        None => Some((line, "")),
    }
}

/// Cursor over the words of one plan line
struct Words<'a> {
    rest: &'a str,
}

impl<'a> Words<'a> {
    fn word(&mut self, what: &str) -> Result<&'a str, String> {
        match next_word(self.rest) {
            Some((word, rest)) => {
                self.rest = rest;
                Ok(word)
            }
            None => Err(format!("missing {}", what)),
        }
    }

    fn owned(&mut self, what: &str) -> Result<String, String> {
        self.word(what).map(String::from)
    }

    fn number(&mut self, what: &str) -> Result<usize, String> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| format!("{} must be a non-negative integer, got `{}`", what, word))
    }

    fn parsed<T: FromStr>(&mut self, what: &str) -> Result<T, String> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| format!("invalid {} `{}`", what, word))
    }

    /// Everything left on the line
    fn remainder(&mut self) -> &'a str {
        std::mem::take(&mut self.rest)
    }

    fn finish(&self) -> Result<(), String> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(format!("unexpected trailing `{}`", self.rest))
        }
    }
}

pub fn parse_value(text: &str) -> Result<PlanValue, String> {
    let (kind, payload) = text
        .split_once(':')
        .ok_or_else(|| format!("literal `{}` has no `kind:` prefix", text))?;
    let invalid = |what: &str| format!("invalid {} literal `{}`", what, payload);
    match kind {
        "str" => Ok(PlanValue::String(String::from(payload))),
        "int" => payload
            .parse()
            .map(PlanValue::Int32)
            .map_err(|_| invalid("int")),
        "bool" => match payload {
            "true" => Ok(PlanValue::Boolean(true)),
            "false" => Ok(PlanValue::Boolean(false)),
            _ => Err(invalid("bool")),
        },
        "float" => payload
            .parse()
            .map(PlanValue::Float32)
            .map_err(|_| invalid("float")),
        "double" => payload
            .parse()
            .map(PlanValue::Float64)
            .map_err(|_| invalid("double")),
        "new" if !payload.is_empty() && !payload.contains(char::is_whitespace) => {
            Ok(PlanValue::Construct(String::from(payload)))
        }
        "new" => Err(invalid("new")),
        _ => Err(format!("unknown literal kind `{}`", kind)),
    }
}

/// Instructions written as a bare mnemonic
fn operand_free() -> Vec<Instruction<InsnId>> {
    let mut instructions = vec![
        Instruction::Nop,
        Instruction::LdNull,
        Instruction::Dup,
        Instruction::Pop,
        Instruction::Neg,
        Instruction::Not,
        Instruction::LdLen,
        Instruction::Ret,
        Instruction::Throw,
    ];
    instructions.extend(
        [
            ArithOp::Add,
            ArithOp::Sub,
            ArithOp::Mul,
            ArithOp::Div,
            ArithOp::Rem,
            ArithOp::And,
            ArithOp::Or,
            ArithOp::Xor,
            ArithOp::Shl,
            ArithOp::Shr,
        ]
        .map(Instruction::Arith),
    );
    instructions.extend([CompareOp::Eq, CompareOp::Gt, CompareOp::Lt].map(Instruction::Compare));
    instructions.extend(
        [ConvKind::I4, ConvKind::I8, ConvKind::R4, ConvKind::R8].map(Instruction::Conv),
    );
    instructions
}

fn field(words: &mut Words, access: FieldAccess) -> Result<PlanInsn, String> {
    Ok(PlanInsn::Field {
        access,
        type_name: words.owned("field type")?,
        field: words.owned("field")?,
    })
}

fn parse_insn_words(words: &mut Words) -> Result<PlanInsn, String> {
    let mnemonic = words.word("instruction")?;
    let plain = |insn: Instruction<InsnId>| -> Result<PlanInsn, String> {
        Ok(PlanInsn::Plain(insn))
    };

    match mnemonic {
        "ldstr" => match words.remainder() {
            "" => Err(String::from("missing string")),
            text => plain(Instruction::LdStr(String::from(text))),
        },
        "ldc.i4" => plain(Instruction::LdcI4(words.parsed("int32")?)),
        "ldc.i8" => plain(Instruction::LdcI8(words.parsed("int64")?)),
        "ldc.r4" => plain(Instruction::LdcR4(words.parsed("float32")?)),
        "ldc.r8" => plain(Instruction::LdcR8(words.parsed("float64")?)),
        "ldarg" => plain(Instruction::LdArg(words.parsed("argument index")?)),
        "ldarga" => plain(Instruction::LdArgA(words.parsed("argument index")?)),
        "starg" => plain(Instruction::StArg(words.parsed("argument index")?)),
        "ldloc" => plain(Instruction::LdLoc(words.parsed("local index")?)),
        "ldloca" => plain(Instruction::LdLocA(words.parsed("local index")?)),
        "stloc" => plain(Instruction::StLoc(words.parsed("local index")?)),
        "call" | "callvirt" => Ok(PlanInsn::Call {
            virtual_call: mnemonic == "callvirt",
            type_name: words.owned("callee type")?,
            method: words.owned("callee")?,
        }),
        "newobj" => Ok(PlanInsn::NewObj(words.owned("type")?)),
        "ldfld" => field(words, FieldAccess::Load),
        "ldflda" => field(words, FieldAccess::LoadAddress),
        "stfld" => field(words, FieldAccess::Store),
        "ldsfld" => field(words, FieldAccess::LoadStatic),
        "stsfld" => field(words, FieldAccess::StoreStatic),
        other => match operand_free()
            .into_iter()
            .find(|insn| insn.mnemonic() == other)
        {
            Some(insn) => plain(insn),
            None => Err(format!("unsupported instruction `{}`", other)),
        },
    }
}

/// Parse an instruction written as a mnemonic followed by its operands
pub fn parse_insn(text: &str) -> Result<PlanInsn, String> {
    let mut words = Words { rest: text.trim() };
    let insn = parse_insn_words(&mut words)?;
    words.finish()?;
    Ok(insn)
}

/// Parse one (non-blank, non-comment) line
pub fn parse_op(line: &str) -> Result<PatchOp, String> {
    let mut words = Words { rest: line.trim() };
    let op = match words.word("operation")? {
        "set-return" => {
            let type_name = words.owned("type")?;
            let method = words.owned("method")?;
            let literal = words.remainder();
            if literal.is_empty() {
                return Err(String::from("missing literal"));
            }
            let value = parse_value(literal)?;
            if !matches!(value, PlanValue::String(_)) && literal.contains(char::is_whitespace) {
                return Err(format!("unexpected whitespace in literal `{}`", literal));
            }
            PatchOp::SetReturn {
                type_name,
                method,
                value,
            }
        }
        "make-public" => PatchOp::MakePublic {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
        },
        "inject-call" => PatchOp::InjectCall {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
            callee_type: words.owned("callee type")?,
            callee: words.owned("callee")?,
        },
        "remove-range" => PatchOp::RemoveRange {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
            from: words.number("start position")?,
            to: words.number("end position")?,
        },
        "pad" => PatchOp::Pad {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
            position: words.number("position")?,
            count: words.number("count")?,
        },
        "clone-method" => PatchOp::CloneMethod {
            type_name: words.owned("type")?,
            template: words.owned("template method")?,
            new_name: words.owned("new method name")?,
        },
        "insert" => PatchOp::Insert {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
            position: words.number("position")?,
            insn: parse_insn_words(&mut words)?,
        },
        "replace" => PatchOp::Replace {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
            position: words.number("position")?,
            insn: parse_insn_words(&mut words)?,
        },
        "copy-range" => PatchOp::CopyRange {
            type_name: words.owned("type")?,
            method: words.owned("method")?,
            source_type: words.owned("source type")?,
            source: words.owned("source method")?,
            from: words.number("start position")?,
            to: words.number("end position")?,
            position: words.number("position")?,
        },
        other => return Err(format!("unknown operation `{}`", other)),
    };
    words.finish()?;
    Ok(op)
}

/// Parse a whole plan, reporting the first bad line
pub fn parse_plan(source: &str) -> Result<Vec<PatchOp>, Error> {
    let mut ops = vec![];
    for (idx, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let op = parse_op(trimmed).map_err(|message| Error::InvalidPlan {
            line: idx + 1,
            message,
        })?;
        ops.push(op);
    }
    Ok(ops)
}

impl Batch {
    /// Batch running the operations of a plan, in order
    pub fn from_plan(source: &str) -> Result<Batch, Error> {
        let mut batch = Batch::new();
        for op in parse_plan(source)? {
            batch.push(op);
        }
        Ok(batch)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(parse_value("int:-5"), Ok(PlanValue::Int32(-5)));
        assert_eq!(parse_value("bool:false"), Ok(PlanValue::Boolean(false)));
        assert_eq!(parse_value("float:0.5"), Ok(PlanValue::Float32(0.5)));
        assert_eq!(parse_value("double:0.25"), Ok(PlanValue::Float64(0.25)));
        assert_eq!(
            parse_value("str:a: b"),
            Ok(PlanValue::String(String::from("a: b")))
        );
        assert_eq!(
            parse_value("new:Game.Helper"),
            Ok(PlanValue::Construct(String::from("Game.Helper")))
        );
        assert!(parse_value("int:1e3").is_err());
        assert!(parse_value("bool:True").is_err());
        assert!(parse_value("new:").is_err());
        assert!(parse_value("1000").is_err());
        assert!(parse_value("char:x").is_err());
    }

    #[test]
    fn string_literal_runs_to_end_of_line() {
        let op = parse_op("set-return  Game.PlayerStats get_Name   str:Garp the  Hero").unwrap();
        assert_eq!(
            op,
            PatchOp::SetReturn {
                type_name: String::from("Game.PlayerStats"),
                method: String::from("get_Name"),
                value: PlanValue::String(String::from("Garp the  Hero")),
            }
        );
        assert!(parse_op("set-return Game.PlayerStats get_MaxStamina int:1 2").is_err());
    }

    #[test]
    fn whole_plan() {
        let source = "\
# Stamina tweaks
set-return Game.PlayerStats get_MaxStamina int:1000

make-public Game.PlayerStats Guarded
inject-call Game.PlayerStats IsComplete Game.Helper Ping
pad Game.PlayerStats IsComplete 0 2
clone-method Game.PlayerStats IsComplete IsCompleteCopy
remove-range Game.PlayerStats IsCompleteCopy 0 1
";
        let ops = parse_plan(source).unwrap();
        assert_eq!(ops.len(), 6);
        assert_eq!(
            ops[3],
            PatchOp::Pad {
                type_name: String::from("Game.PlayerStats"),
                method: String::from("IsComplete"),
                position: 0,
                count: 2,
            }
        );
        assert_eq!(Batch::from_plan(source).unwrap().len(), 6);
    }

    #[test]
    fn instructions() {
        assert_eq!(
            parse_insn("ldc.i4 -12"),
            Ok(PlanInsn::Plain(Instruction::LdcI4(-12)))
        );
        assert_eq!(
            parse_insn("ldc.r4 0.5"),
            Ok(PlanInsn::Plain(Instruction::LdcR4(0.5)))
        );
        assert_eq!(
            parse_insn("ldstr  Modded by  Garp"),
            Ok(PlanInsn::Plain(Instruction::LdStr(String::from(
                "Modded by  Garp"
            ))))
        );
        assert_eq!(
            parse_insn("stloc 3"),
            Ok(PlanInsn::Plain(Instruction::StLoc(3)))
        );
        assert_eq!(parse_insn("pop"), Ok(PlanInsn::Plain(Instruction::Pop)));
        assert_eq!(
            parse_insn("cgt"),
            Ok(PlanInsn::Plain(Instruction::Compare(CompareOp::Gt)))
        );
        assert_eq!(
            parse_insn("callvirt Game.Helper Ping"),
            Ok(PlanInsn::Call {
                virtual_call: true,
                type_name: String::from("Game.Helper"),
                method: String::from("Ping"),
            })
        );
        assert_eq!(
            parse_insn("ldfld Game.PlayerStats _stamina"),
            Ok(PlanInsn::Field {
                access: FieldAccess::Load,
                type_name: String::from("Game.PlayerStats"),
                field: String::from("_stamina"),
            })
        );
        assert_eq!(
            parse_insn("newobj Game.Helper"),
            Ok(PlanInsn::NewObj(String::from("Game.Helper")))
        );

        assert!(parse_insn("ldstr").is_err());
        assert!(parse_insn("ldc.i4 4000000000").is_err());
        assert!(parse_insn("ldloc -1").is_err());
        assert!(parse_insn("pop 1").is_err());
        assert!(parse_insn("call Game.Helper").is_err());
        assert_eq!(
            parse_insn("br 3"),
            Err(String::from("unsupported instruction `br`"))
        );
    }

    #[test]
    fn instruction_operations() {
        let source = "\
insert Game.PlayerStats get_Name 0 ldstr Modded
replace Game.PlayerStats Ping 12 ldc.i4 5
copy-range Game.PlayerStats get_Name Game.Helper Ping 0 3 1
";
        let ops = parse_plan(source).unwrap();
        assert_eq!(
            ops[0],
            PatchOp::Insert {
                type_name: String::from("Game.PlayerStats"),
                method: String::from("get_Name"),
                position: 0,
                insn: PlanInsn::Plain(Instruction::LdStr(String::from("Modded"))),
            }
        );
        assert_eq!(
            ops[1],
            PatchOp::Replace {
                type_name: String::from("Game.PlayerStats"),
                method: String::from("Ping"),
                position: 12,
                insn: PlanInsn::Plain(Instruction::LdcI4(5)),
            }
        );
        assert_eq!(
            ops[2],
            PatchOp::CopyRange {
                type_name: String::from("Game.PlayerStats"),
                method: String::from("get_Name"),
                source_type: String::from("Game.Helper"),
                source: String::from("Ping"),
                from: 0,
                to: 3,
                position: 1,
            }
        );

        assert!(matches!(
            parse_plan("insert A.B c 0"),
            Err(Error::InvalidPlan { message, .. }) if message == "missing instruction"
        ));
        assert!(matches!(
            parse_plan("replace A.B c 0 ldc.i4 1 2"),
            Err(Error::InvalidPlan { message, .. }) if message == "unexpected trailing `2`"
        ));
        assert!(matches!(
            parse_plan("copy-range A.B c D.E f 0 1"),
            Err(Error::InvalidPlan { message, .. }) if message == "missing position"
        ));
    }

    #[test]
    fn errors_carry_line_numbers() {
        let source = "make-public A.B c\n\npad A.B c 0\n";
        assert!(matches!(
            parse_plan(source),
            Err(Error::InvalidPlan { line: 3, message }) if message == "missing count"
        ));
        assert!(matches!(
            parse_plan("remove-range A.B c 1 -2"),
            Err(Error::InvalidPlan { line: 1, .. })
        ));
        assert!(matches!(
            parse_plan("make-public A.B c d"),
            Err(Error::InvalidPlan { message, .. }) if message == "unexpected trailing `d`"
        ));
        assert!(matches!(
            parse_plan("rename A.B c d"),
            Err(Error::InvalidPlan { message, .. }) if message == "unknown operation `rename`"
        ));
    }
}
