use super::model::{HandlerKind, MethodId, Module};
use super::{InsnId, Instruction, MethodFlags};
use std::collections::HashMap;
use std::fmt::Write;

/// Human-readable listing of a method: signature, locals, exception ranges, and instructions
///
/// Branch targets and exception range markers are shown as `IL_nnnn` labels, where `nnnn` is the
/// target's position in the body (not a byte offset).
pub fn describe_method(module: &Module, method_id: MethodId) -> String {
    let method = module.method(method_id);
    let mut out = String::new();

    let mut modifiers = vec![];
    for (flag, keyword) in [
        (MethodFlags::PUBLIC, "public"),
        (MethodFlags::PRIVATE, "private"),
        (MethodFlags::PROTECTED, "protected"),
        (MethodFlags::STATIC, "static"),
        (MethodFlags::ABSTRACT, "abstract"),
        (MethodFlags::VIRTUAL, "virtual"),
        (MethodFlags::FINAL, "final"),
    ] {
        if method.flags.contains(flag) {
            modifiers.push(keyword);
        }
    }
    let params: Vec<String> = method
        .signature
        .params
        .iter()
        .map(|param| format!("{} {}", param.sig.render(module), param.name))
        .collect();
    let generics = if method.signature.generic_params.is_empty() {
        String::new()
    } else {
        format!("<{}>", method.signature.generic_params.join(", "))
    };
    let _ = writeln!(
        out,
        "{}{}{} {}{}({})",
        modifiers.join(" "),
        if modifiers.is_empty() { "" } else { " " },
        method.signature.return_type.render(module),
        module.method_name(method_id),
        generics,
        params.join(", ")
    );

    let body = match &method.body {
        Some(body) => body,
        None => {
            out.push_str("  (no body)\n");
            return out;
        }
    };

    let positions: HashMap<InsnId, usize> = body
        .instructions
        .iter()
        .enumerate()
        .map(|(pos, insn)| (*insn, pos))
        .collect();
    let label = |id: &InsnId| match positions.get(id) {
        Some(pos) => format!("IL_{:04}", pos),
        None => format!("IL_????({:?})", id),
    };

    let _ = writeln!(out, "  .maxstack {}", body.max_stack);
    if !body.locals.is_empty() {
        let locals: Vec<String> = body
            .locals
            .iter()
            .map(|local| format!("{} V_{}", local.var_type.render(module), local.index))
            .collect();
        let _ = writeln!(
            out,
            "  .locals {}({})",
            if body.init_locals { "init " } else { "" },
            locals.join(", ")
        );
    }
    for handler in &body.handlers {
        let kind = match &handler.kind {
            HandlerKind::Catch(ty) => format!("catch {}", ty.render(module)),
            HandlerKind::Filter(filter_start) => format!("filter {}", label(filter_start)),
            HandlerKind::Finally => String::from("finally"),
            HandlerKind::Fault => String::from("fault"),
        };
        let _ = writeln!(
            out,
            "  .try {} to {} {} handler {} to {}",
            label(&handler.try_start),
            label(&handler.try_end),
            kind,
            label(&handler.handler_start),
            label(&handler.handler_end)
        );
    }

    for (pos, insn_id) in body.instructions.iter().enumerate() {
        let _ = write!(out, "  IL_{:04}: ", pos);
        match module.instruction(*insn_id) {
            Some(insn) => {
                out.push_str(insn.mnemonic());
                let operand = render_operand(module, insn, &label);
                if !operand.is_empty() {
                    out.push(' ');
                    out.push_str(&operand);
                }
            }
            None => {
                let _ = write!(out, "<missing {:?}>", insn_id);
            }
        }
        out.push('\n');
    }

    out
}

fn render_operand(
    module: &Module,
    insn: &Instruction<InsnId>,
    label: &impl Fn(&InsnId) -> String,
) -> String {
    match insn {
        Instruction::LdcI4(i) => i.to_string(),
        Instruction::LdcI8(l) => l.to_string(),
        Instruction::LdcR4(f) => f.to_string(),
        Instruction::LdcR8(d) => d.to_string(),
        Instruction::LdStr(s) => format!("{:?}", s),
        Instruction::Switch(targets) => {
            let targets: Vec<String> = targets.iter().map(label).collect();
            format!("({})", targets.join(", "))
        }
        _ => {
            if let Some(idx) = insn.local_index().or_else(|| insn.argument_index()) {
                idx.to_string()
            } else if let Some(field) = insn.field() {
                module.field_name(field)
            } else if let Some(method) = insn.method() {
                module.method_name(method)
            } else if let Some(ty) = insn.type_operand() {
                ty.render(module)
            } else if let Some(target) = insn.jump_targets().targets().first() {
                label(target)
            } else {
                String::new()
            }
        }
    }
}
