use super::{FieldDef, FieldId, MethodBody, MethodDef, MethodId, TypeDef, TypeId};
use crate::il::names::{check_valid_name, check_valid_namespace, qualify, NESTED_SEPARATOR};
use crate::il::{
    Error, FieldFlags, InsnId, Instruction, InstructionArena, MethodFlags, MethodSig, TypeFlags,
    TypeSig,
};
use std::collections::BTreeSet;

/// In-memory module: metadata tables plus the instruction arena shared by every body
///
/// A module is loaded once, mutated through the editing operations, and written back once.
/// Cloning a module produces a full, independent snapshot.
#[derive(Clone, Debug)]
pub struct Module {
    pub name: String,
    pub(crate) types: Vec<TypeDef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) arena: InstructionArena,

    /// Bodies mutated since the last call to `take_touched`
    touched: BTreeSet<MethodId>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            types: vec![],
            methods: vec![],
            fields: vec![],
            arena: InstructionArena::new(),
            touched: BTreeSet::new(),
        }
    }

    /// Add a top-level type
    pub fn add_type(
        &mut self,
        namespace: impl Into<String>,
        name: impl Into<String>,
        flags: TypeFlags,
    ) -> Result<TypeId, Error> {
        let namespace = namespace.into();
        let name = name.into();
        check_valid_namespace(&namespace).map_err(Error::InvalidName)?;
        check_valid_name(&name).map_err(Error::InvalidName)?;

        let qualified = qualify(&namespace, &name);
        if self.type_ids().any(|id| self.type_name(id) == qualified) {
            return Err(Error::DuplicateType(qualified));
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeDef::new(namespace, name, flags));
        Ok(id)
    }

    /// Add a type nested inside `declaring_type`
    pub fn add_nested_type(
        &mut self,
        declaring_type: TypeId,
        name: impl Into<String>,
        flags: TypeFlags,
    ) -> Result<TypeId, Error> {
        let name = name.into();
        check_valid_name(&name).map_err(Error::InvalidName)?;
        let outer = &self.types[declaring_type.index()];
        if outer
            .nested_types
            .iter()
            .any(|nested| self.types[nested.index()].name == name)
        {
            return Err(Error::DuplicateType(format!(
                "{}{}{}",
                self.type_name(declaring_type),
                NESTED_SEPARATOR,
                name
            )));
        }

        let id = TypeId(self.types.len() as u32);
        let mut type_def = TypeDef::new(String::new(), name, flags | TypeFlags::NESTED);
        type_def.declaring_type = Some(declaring_type);
        if outer.is_external() {
            type_def.flags.insert(TypeFlags::EXTERNAL);
        }
        self.types.push(type_def);
        self.types[declaring_type.index()].nested_types.push(id);
        Ok(id)
    }

    pub fn add_field(
        &mut self,
        declaring_type: TypeId,
        name: impl Into<String>,
        flags: FieldFlags,
        field_type: TypeSig,
    ) -> Result<FieldId, Error> {
        let name = name.into();
        check_valid_name(&name).map_err(Error::InvalidName)?;
        if self.types[declaring_type.index()]
            .fields
            .iter()
            .any(|field| self.fields[field.index()].name == name)
        {
            return Err(Error::DuplicateField(format!(
                "{}::{}",
                self.type_name(declaring_type),
                name
            )));
        }

        let id = FieldId(self.fields.len() as u32);
        self.fields.push(FieldDef {
            declaring_type,
            name,
            flags,
            field_type,
        });
        self.types[declaring_type.index()].fields.push(id);
        Ok(id)
    }

    /// Declare a method
    ///
    /// Methods of regular types get an empty body to fill in; abstract methods and methods of
    /// external types get none.
    pub fn add_method(
        &mut self,
        declaring_type: TypeId,
        name: impl Into<String>,
        flags: MethodFlags,
        signature: MethodSig,
    ) -> Result<MethodId, Error> {
        let name = name.into();
        check_valid_name(&name).map_err(Error::InvalidName)?;

        let has_body = !self.types[declaring_type.index()].is_external()
            && !flags.contains(MethodFlags::ABSTRACT);
        let id = MethodId(self.methods.len() as u32);
        self.methods.push(MethodDef {
            declaring_type,
            name,
            flags,
            signature,
            body: if has_body {
                Some(MethodBody::new())
            } else {
                None
            },
        });
        self.types[declaring_type.index()].methods.push(id);
        log::trace!("Declared {}", self.method_name(id));
        Ok(id)
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.types.len() as u32).map(TypeId)
    }

    pub fn method_ids(&self) -> impl Iterator<Item = MethodId> {
        (0..self.methods.len() as u32).map(MethodId)
    }

    pub fn field_ids(&self) -> impl Iterator<Item = FieldId> {
        (0..self.fields.len() as u32).map(FieldId)
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn type_def(&self, id: TypeId) -> &TypeDef {
        &self.types[id.index()]
    }

    pub fn type_def_mut(&mut self, id: TypeId) -> &mut TypeDef {
        &mut self.types[id.index()]
    }

    pub fn method(&self, id: MethodId) -> &MethodDef {
        &self.methods[id.index()]
    }

    /// Mutable access to method metadata (flags, name, signature)
    ///
    /// Body edits should go through [`crate::edit::BodyEditor`] so that references stay valid.
    pub fn method_mut(&mut self, id: MethodId) -> &mut MethodDef {
        &mut self.methods[id.index()]
    }

    pub fn field(&self, id: FieldId) -> &FieldDef {
        &self.fields[id.index()]
    }

    pub fn arena(&self) -> &InstructionArena {
        &self.arena
    }

    pub fn instruction(&self, id: InsnId) -> Option<&Instruction<InsnId>> {
        self.arena.get(id)
    }

    /// Body of a method, failing for abstract or external methods
    pub fn body(&self, method: MethodId) -> Result<&MethodBody, Error> {
        self.methods[method.index()]
            .body
            .as_ref()
            .ok_or_else(|| Error::NoBody(self.method_name(method)))
    }

    /// Split borrow of a body and the arena its handles live in
    pub(crate) fn parts_mut(
        &mut self,
        method: MethodId,
    ) -> Result<(&mut MethodBody, &mut InstructionArena), Error> {
        if self.methods[method.index()].body.is_none() {
            return Err(Error::NoBody(self.method_name(method)));
        }
        let Module { methods, arena, .. } = self;
        match methods[method.index()].body.as_mut() {
            Some(body) => Ok((body, arena)),
            None => unreachable!("checked above"),
        }
    }

    /// Replace a body wholesale, releasing the handles of the old one
    pub(crate) fn reset_body(&mut self, method: MethodId, body: MethodBody) -> Result<(), Error> {
        let (old_body, arena) = self.parts_mut(method)?;
        for insn in old_body.instructions.drain(..) {
            arena.release(insn);
        }
        *old_body = body;
        self.touch(method);
        Ok(())
    }

    /// Qualified name of a type (`Namespace.Name` or `Outer/Inner`)
    pub fn type_name(&self, id: TypeId) -> String {
        let type_def = &self.types[id.index()];
        match type_def.declaring_type {
            Some(outer) => format!(
                "{}{}{}",
                self.type_name(outer),
                NESTED_SEPARATOR,
                type_def.name
            ),
            None => qualify(&type_def.namespace, &type_def.name),
        }
    }

    /// Method name qualified by its declaring type (`Namespace.Type::name`)
    pub fn method_name(&self, id: MethodId) -> String {
        let method = &self.methods[id.index()];
        format!("{}::{}", self.type_name(method.declaring_type), method.name)
    }

    pub fn field_name(&self, id: FieldId) -> String {
        let field = &self.fields[id.index()];
        format!("{}::{}", self.type_name(field.declaring_type), field.name)
    }

    /// Deep copy of the module state, for use with [`Module::restore`]
    pub fn snapshot(&self) -> Module {
        self.clone()
    }

    /// Roll back to a snapshot taken earlier
    pub fn restore(&mut self, snapshot: Module) {
        *self = snapshot;
    }

    /// Rebuild the instruction arena with only the instructions still held by a body
    ///
    /// Every instruction handle changes, so handles taken before compacting must not be used
    /// afterwards. Type, method, and field ids are unaffected.
    pub fn compact(&mut self) -> Result<(), Error> {
        let mut compacted = self.to_module_file()?.into_module()?;
        log::debug!(
            "Compacted instruction arena of {} from {} to {} slots",
            self.name,
            self.arena.len(),
            compacted.arena.len()
        );
        compacted.touched = std::mem::take(&mut self.touched);
        *self = compacted;
        Ok(())
    }

    pub(crate) fn touch(&mut self, method: MethodId) {
        self.touched.insert(method);
    }

    /// Bodies mutated since the last call, clearing the set
    pub fn take_touched(&mut self) -> Vec<MethodId> {
        std::mem::take(&mut self.touched).into_iter().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn duplicate_types_and_fields() {
        let mut module = Module::new("Test");
        let ty = module.add_type("Game", "Stats", TypeFlags::PUBLIC).unwrap();
        assert!(matches!(
            module.add_type("Game", "Stats", TypeFlags::PUBLIC),
            Err(Error::DuplicateType(name)) if name == "Game.Stats"
        ));

        module
            .add_field(ty, "_hp", FieldFlags::PRIVATE, TypeSig::Int32)
            .unwrap();
        assert!(matches!(
            module.add_field(ty, "_hp", FieldFlags::PRIVATE, TypeSig::Float32),
            Err(Error::DuplicateField(_))
        ));
        assert!(matches!(
            module.add_type("Game", "Bad Name", TypeFlags::PUBLIC),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn nested_names_and_bodies() {
        let mut module = Module::new("Test");
        let system = module
            .add_type("System", "Object", TypeFlags::PUBLIC | TypeFlags::EXTERNAL)
            .unwrap();
        let outer = module.add_type("Game", "Stats", TypeFlags::PUBLIC).unwrap();
        let inner = module
            .add_nested_type(outer, "Data", TypeFlags::PUBLIC)
            .unwrap();
        assert_eq!(module.type_name(inner), "Game.Stats/Data");
        assert!(module.type_def(inner).flags.contains(TypeFlags::NESTED));

        let external = module
            .add_method(
                system,
                ".ctor",
                MethodFlags::PUBLIC,
                MethodSig::new(TypeSig::Void, vec![]),
            )
            .unwrap();
        let local = module
            .add_method(
                inner,
                "Run",
                MethodFlags::PUBLIC | MethodFlags::STATIC,
                MethodSig::new(TypeSig::Void, vec![]),
            )
            .unwrap();
        assert!(matches!(module.body(external), Err(Error::NoBody(_))));
        assert!(module.body(local).is_ok());
        assert_eq!(module.method_name(local), "Game.Stats/Data::Run");
    }

    #[test]
    fn compact_drops_released_slots() {
        let (mut module, sample) = crate::test_util::sample_module();
        let live: usize = module
            .method_ids()
            .filter_map(|method| module.body(method).ok())
            .map(|body| body.len())
            .sum();
        let listing = crate::il::describe_method(&module, sample.is_complete);

        crate::edit::BodyEditor::new(&mut module, sample.get_name)
            .unwrap()
            .replace_at(0, Instruction::LdStr(String::from("Hero")))
            .unwrap();
        assert_eq!(module.arena().len(), live + 1);

        module.compact().unwrap();
        assert_eq!(module.arena().len(), live);
        assert_eq!(module.take_touched(), vec![sample.get_name]);
        assert_eq!(
            crate::il::describe_method(&module, sample.is_complete),
            listing
        );
        let first = module.body(sample.get_name).unwrap().instructions[0];
        assert_eq!(module.arena().owner(first), Some(sample.get_name));
    }

    #[test]
    fn snapshot_restore() {
        let mut module = Module::new("Test");
        let snapshot = module.snapshot();
        module.add_type("Game", "Stats", TypeFlags::PUBLIC).unwrap();
        module.restore(snapshot);
        assert_eq!(module.type_ids().count(), 0);
    }
}
