use super::{simulate, BodyEditor, Fragment};
use crate::il::model::{MethodBody, Module, VariableSlot};
use crate::il::{Error, InsnId, Instruction, TypeSig};

impl<'m> BodyEditor<'m> {
    /// Overwrite the declared max-stack
    ///
    /// Later edits may still raise it, but nothing lowers it again.
    pub fn declare_max_stack(&mut self, max_stack: u16) {
        let method = self.method;
        if let Ok((body, _)) = self.module.parts_mut(method) {
            body.max_stack = max_stack;
        }
        self.module.touch(method);
    }

    /// Insert `count` pushes followed by `count` pops at `position`
    ///
    /// The net stack effect is zero, but the body then needs `count` more stack slots at that
    /// point (which the automatic max-stack adjustment picks up). Padding that would not fit on
    /// top of the deepest point of the body is rejected.
    pub fn pad(&mut self, position: usize, count: usize) -> Result<Vec<InsnId>, Error> {
        if position > self.len() {
            return Err(self.out_of_range(position));
        }

        // The padding sits on top of whatever is already on the stack at `position`
        let deepest = simulate(self.module, self.method)
            .unwrap_or(0)
            .max(self.body().max_stack);
        if count > (u16::MAX - deepest) as usize {
            return Err(Error::StackOverflow {
                method: self.method_name(),
                position,
            });
        }

        let mut instructions = vec![Instruction::LdcI4(0); count];
        instructions.extend(vec![Instruction::Pop; count]);
        let fragment = Fragment::new(instructions)?;
        self.splice_fragment(position, &fragment)
    }

    /// Add a local variable slot, returning its index
    ///
    /// Since the new slot is read before being written in most injected code, this also turns on
    /// zero-initialization of locals.
    pub fn add_local(&mut self, var_type: TypeSig) -> Result<u16, Error> {
        super::verify::check_type_sig(self.module, &var_type)?;
        let method = self.method;
        let method_name = self.method_name();
        let (body, _) = self.module.parts_mut(method)?;
        let index = match u16::try_from(body.locals.len()) {
            Ok(index) => index,
            Err(_) => return Err(Error::LocalsOverflow(method_name)),
        };
        body.locals.push(VariableSlot { index, var_type });
        body.init_locals = true;
        log::debug!("Added local {} to {}", index, method_name);
        self.module.touch(method);
        Ok(index)
    }

    /// Declared type of a local variable slot
    pub fn local_type(&self, index: u16) -> Option<&TypeSig> {
        local_type(self.body(), index)
    }
}

/// Declared type of a local variable slot
pub fn local_type(body: &MethodBody, index: u16) -> Option<&TypeSig> {
    body.locals
        .get(index as usize)
        .map(|local| &local.var_type)
}

/// Declared type of the field an instruction accesses, if it accesses one
pub fn field_type_of<'a, Lbl>(module: &'a Module, insn: &Instruction<Lbl>) -> Option<&'a TypeSig> {
    insn.field().map(|field| &module.field(field).field_type)
}
