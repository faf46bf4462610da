//! On-disk representation of a module
//!
//! The records here mirror the module tables, except that instructions refer to each other by
//! their position inside the body instead of by handle. Converting from a [`Module`] resolves
//! every handle (failing on dangling references) and converting back allocates fresh handles.

use super::model::{
    ExceptionRange, FieldDef, FieldId, HandlerKind, MethodBody, MethodDef, MethodId, Module,
    TypeDef, TypeId, VariableSlot,
};
use super::{
    Deserialize, Error, FieldFlags, InsnId, Instruction, MethodFlags, MethodSig, Serialize,
    TypeFlags, TypeSig,
};
use byteorder::{ReadBytesExt, WriteBytesExt};
use super::names::{check_valid_name, check_valid_namespace};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{Result, Write};
use std::path::Path;

/// Representation of a module file
#[derive(Clone, Debug, PartialEq)]
pub struct ModuleFile {
    pub version: u16,
    pub name: String,
    pub types: Vec<TypeRecord>,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TypeRecord {
    pub namespace: String,
    pub name: String,
    pub flags: TypeFlags,

    /// Must come earlier in the type table than the nested type itself
    pub declaring_type: Option<TypeId>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldRecord {
    pub declaring_type: TypeId,
    pub name: String,
    pub flags: FieldFlags,
    pub field_type: TypeSig,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MethodRecord {
    pub declaring_type: TypeId,
    pub name: String,
    pub flags: MethodFlags,
    pub signature: MethodSig,
    pub body: Option<BodyRecord>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyRecord {
    pub max_stack: u16,
    pub init_locals: bool,
    pub locals: Vec<TypeSig>,
    pub instructions: Vec<Instruction<u32>>,
    pub handlers: Vec<ExceptionRange<u32>>,
}

impl ModuleFile {
    /// Magic header bytes that go at the front of the serialized module file
    const MAGIC: [u8; 4] = *b"ILMD";

    /// Only format version understood
    pub const VERSION: u16 = 1;

    /// Save the module file to disk
    ///
    /// The bytes go to a temporary file next to `path` which only replaces `path` once fully
    /// written, so a failed save never leaves a truncated module behind.
    pub fn save_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> std::result::Result<(), Error> {
        let path = path.as_ref();
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if create_missing_directories {
            fs::create_dir_all(directory)?;
        }

        let mut bytes: Vec<u8> = vec![];
        self.serialize(&mut bytes)?;

        let mut temp_file = tempfile::NamedTempFile::new_in(directory)?;
        temp_file.write_all(&bytes)?;
        temp_file.as_file().sync_all()?;
        temp_file
            .persist(path)
            .map_err(|err| Error::IoError(err.error))?;
        Ok(())
    }

    /// Read a module file from disk
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> std::result::Result<ModuleFile, Error> {
        let bytes = fs::read(path)?;
        let mut reader: &[u8] = &bytes;
        let module_file = ModuleFile::deserialize(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::Malformed(format!(
                "{} trailing bytes after module",
                reader.len()
            )));
        }
        Ok(module_file)
    }

    /// Build the in-memory module, checking every table index and branch position
    pub fn into_module(self) -> std::result::Result<Module, Error> {
        let type_count = self.types.len();
        let field_count = self.fields.len();
        let method_count = self.methods.len();
        let check_type = |id: TypeId, context: &str| -> std::result::Result<(), Error> {
            if id.index() < type_count {
                Ok(())
            } else {
                Err(Error::Malformed(format!(
                    "{} refers to missing type {:?}",
                    context, id
                )))
            }
        };
        let check_sig = |sig: &TypeSig, context: &str| -> std::result::Result<(), Error> {
            let mut found = vec![];
            sig.referenced_types(&mut found);
            found.into_iter().try_for_each(|id| check_type(id, context))
        };

        let mut module = Module::new(self.name);
        let mut type_names: HashSet<String> = HashSet::new();

        for (idx, record) in self.types.into_iter().enumerate() {
            check_valid_namespace(&record.namespace).map_err(Error::InvalidName)?;
            check_valid_name(&record.name).map_err(Error::InvalidName)?;
            let mut type_def = TypeDef::new(record.namespace, record.name, record.flags);
            if let Some(outer) = record.declaring_type {
                if outer.index() >= idx {
                    return Err(Error::Malformed(format!(
                        "type {} is nested in later type {:?}",
                        idx, outer
                    )));
                }
                type_def.declaring_type = Some(outer);
                module.types[outer.index()].nested_types.push(TypeId(idx as u32));
            }
            module.types.push(type_def);

            let qualified = module.type_name(TypeId(idx as u32));
            if !type_names.insert(qualified.clone()) {
                return Err(Error::DuplicateType(qualified));
            }
        }

        for (idx, record) in self.fields.into_iter().enumerate() {
            let context = format!("field {}", idx);
            check_type(record.declaring_type, &context)?;
            check_sig(&record.field_type, &context)?;
            check_valid_name(&record.name).map_err(Error::InvalidName)?;
            let declaring_type = &module.types[record.declaring_type.index()];
            if declaring_type
                .fields
                .iter()
                .any(|field| module.fields[field.index()].name == record.name)
            {
                return Err(Error::DuplicateField(format!(
                    "{}::{}",
                    module.type_name(record.declaring_type),
                    record.name
                )));
            }
            module.types[record.declaring_type.index()]
                .fields
                .push(FieldId(idx as u32));
            module.fields.push(FieldDef {
                declaring_type: record.declaring_type,
                name: record.name,
                flags: record.flags,
                field_type: record.field_type,
            });
        }

        for (idx, record) in self.methods.into_iter().enumerate() {
            let method_id = MethodId(idx as u32);
            let context = format!("method {}", idx);
            check_type(record.declaring_type, &context)?;
            check_sig(&record.signature.return_type, &context)?;
            for param in &record.signature.params {
                check_sig(&param.sig, &context)?;
            }
            check_valid_name(&record.name).map_err(Error::InvalidName)?;

            let body = match record.body {
                None => None,
                Some(body) => {
                    let len = body.instructions.len();
                    let check_position = |pos: &u32| -> std::result::Result<u32, Error> {
                        if (*pos as usize) < len {
                            Ok(*pos)
                        } else {
                            Err(Error::Malformed(format!(
                                "{} has a reference to position {} past its end",
                                context, pos
                            )))
                        }
                    };

                    // Handles are allocated contiguously, so position `p` is `first + p`
                    let first = module.arena.len() as u32;
                    let mut instructions = Vec::with_capacity(len);
                    for insn in &body.instructions {
                        if let Some(field) = insn.field() {
                            if field.index() >= field_count {
                                return Err(Error::Malformed(format!(
                                    "{} refers to missing field {:?}",
                                    context, field
                                )));
                            }
                        }
                        if let Some(method) = insn.method() {
                            if method.index() >= method_count {
                                return Err(Error::Malformed(format!(
                                    "{} refers to missing method {:?}",
                                    context, method
                                )));
                            }
                        }
                        if let Some(ty) = insn.type_operand() {
                            check_sig(ty, &context)?;
                        }
                        let insn = insn.try_map_labels(|pos| {
                            check_position(pos).map(|pos| InsnId(first + pos))
                        })?;
                        instructions.push(module.arena.alloc(insn, Some(method_id)));
                    }

                    let mut handlers = Vec::with_capacity(body.handlers.len());
                    for handler in &body.handlers {
                        if let HandlerKind::Catch(ty) = &handler.kind {
                            check_sig(ty, &context)?;
                        }
                        handlers.push(handler.try_map_labels(|pos| {
                            check_position(pos).map(|pos| InsnId(first + pos))
                        })?);
                    }

                    let mut locals = Vec::with_capacity(body.locals.len());
                    for (index, var_type) in body.locals.into_iter().enumerate() {
                        check_sig(&var_type, &context)?;
                        let index = u16::try_from(index).map_err(|_| {
                            Error::LocalsOverflow(format!(
                                "{}::{}",
                                module.type_name(record.declaring_type),
                                record.name
                            ))
                        })?;
                        locals.push(VariableSlot {
                            index,
                            var_type,
                        });
                    }

                    Some(MethodBody {
                        instructions,
                        locals,
                        handlers,
                        max_stack: body.max_stack,
                        init_locals: body.init_locals,
                    })
                }
            };

            module.types[record.declaring_type.index()]
                .methods
                .push(method_id);
            module.methods.push(MethodDef {
                declaring_type: record.declaring_type,
                name: record.name,
                flags: record.flags,
                signature: record.signature,
                body,
            });
        }

        Ok(module)
    }
}

impl Module {
    /// Encode the module, resolving every handle to a position in its body
    ///
    /// Fails if a branch or exception range refers to an instruction outside of its body.
    pub fn to_module_file(&self) -> std::result::Result<ModuleFile, Error> {
        let types = self
            .types
            .iter()
            .map(|type_def| TypeRecord {
                namespace: type_def.namespace.clone(),
                name: type_def.name.clone(),
                flags: type_def.flags,
                declaring_type: type_def.declaring_type,
            })
            .collect();

        let fields = self
            .fields
            .iter()
            .map(|field| FieldRecord {
                declaring_type: field.declaring_type,
                name: field.name.clone(),
                flags: field.flags,
                field_type: field.field_type.clone(),
            })
            .collect();

        let mut methods = Vec::with_capacity(self.methods.len());
        for method_id in self.method_ids() {
            let method = self.method(method_id);
            let body = match &method.body {
                None => None,
                Some(body) => Some(self.body_record(method_id, body)?),
            };
            methods.push(MethodRecord {
                declaring_type: method.declaring_type,
                name: method.name.clone(),
                flags: method.flags,
                signature: method.signature.clone(),
                body,
            });
        }

        Ok(ModuleFile {
            version: ModuleFile::VERSION,
            name: self.name.clone(),
            types,
            fields,
            methods,
        })
    }

    fn body_record(
        &self,
        method: MethodId,
        body: &MethodBody,
    ) -> std::result::Result<BodyRecord, Error> {
        let positions: HashMap<InsnId, u32> = body
            .instructions
            .iter()
            .enumerate()
            .map(|(pos, insn)| (*insn, pos as u32))
            .collect();

        let mut instructions = Vec::with_capacity(body.instructions.len());
        for (pos, insn_id) in body.instructions.iter().enumerate() {
            let insn = self
                .instruction(*insn_id)
                .ok_or_else(|| Error::InstructionNotInBody {
                    method: self.method_name(method),
                    instruction: *insn_id,
                })?;
            instructions.push(insn.try_map_labels(|target| {
                positions
                    .get(target)
                    .copied()
                    .ok_or_else(|| Error::DanglingBranchTarget {
                        method: self.method_name(method),
                        branch: pos,
                        target: *target,
                    })
            })?);
        }

        let mut handlers = Vec::with_capacity(body.handlers.len());
        for (idx, handler) in body.handlers.iter().enumerate() {
            handlers.push(handler.try_map_labels(|marker| {
                positions
                    .get(marker)
                    .copied()
                    .ok_or_else(|| Error::DanglingHandlerRange {
                        method: self.method_name(method),
                        handler: idx,
                    })
            })?);
        }

        Ok(BodyRecord {
            max_stack: body.max_stack,
            init_locals: body.init_locals,
            locals: body
                .locals
                .iter()
                .map(|local| local.var_type.clone())
                .collect(),
            instructions,
            handlers,
        })
    }

    /// Load a module from disk
    pub fn open<P: AsRef<Path>>(path: P) -> std::result::Result<Module, Error> {
        let path = path.as_ref();
        let module = ModuleFile::load_from_path(path)?.into_module()?;
        log::info!(
            "Loaded module '{}' from {} ({} types, {} methods)",
            module.name,
            path.display(),
            module.types.len(),
            module.methods.len()
        );
        Ok(module)
    }

    /// Write the module to disk, atomically replacing whatever is at `path`
    pub fn write_to_path<P: AsRef<Path>>(
        &self,
        path: P,
        create_missing_directories: bool,
    ) -> std::result::Result<(), Error> {
        let path = path.as_ref();
        self.to_module_file()?
            .save_to_path(path, create_missing_directories)?;
        log::info!("Wrote module '{}' to {}", self.name, path.display());
        Ok(())
    }
}

impl Serialize for ModuleFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&ModuleFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.name.serialize(writer)?;
        self.types.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ModuleFile {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != ModuleFile::MAGIC {
            return Err(Error::BadMagic(magic));
        }
        let version = u16::deserialize(reader)?;
        if version != ModuleFile::VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        Ok(ModuleFile {
            version,
            name: String::deserialize(reader)?,
            types: Vec::<TypeRecord>::deserialize(reader)?,
            fields: Vec::<FieldRecord>::deserialize(reader)?,
            methods: Vec::<MethodRecord>::deserialize(reader)?,
        })
    }
}

impl Serialize for TypeRecord {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.namespace.serialize(writer)?;
        self.name.serialize(writer)?;
        self.flags.serialize(writer)?;
        self.declaring_type.serialize(writer)
    }
}

impl Deserialize for TypeRecord {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(TypeRecord {
            namespace: String::deserialize(reader)?,
            name: String::deserialize(reader)?,
            flags: TypeFlags::deserialize(reader)?,
            declaring_type: Option::<TypeId>::deserialize(reader)?,
        })
    }
}

impl Serialize for FieldRecord {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.declaring_type.serialize(writer)?;
        self.name.serialize(writer)?;
        self.flags.serialize(writer)?;
        self.field_type.serialize(writer)
    }
}

impl Deserialize for FieldRecord {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(FieldRecord {
            declaring_type: TypeId::deserialize(reader)?,
            name: String::deserialize(reader)?,
            flags: FieldFlags::deserialize(reader)?,
            field_type: TypeSig::deserialize(reader)?,
        })
    }
}

impl Serialize for MethodRecord {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.declaring_type.serialize(writer)?;
        self.name.serialize(writer)?;
        self.flags.serialize(writer)?;
        self.signature.serialize(writer)?;
        self.body.serialize(writer)
    }
}

impl Deserialize for MethodRecord {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(MethodRecord {
            declaring_type: TypeId::deserialize(reader)?,
            name: String::deserialize(reader)?,
            flags: MethodFlags::deserialize(reader)?,
            signature: MethodSig::deserialize(reader)?,
            body: Option::<BodyRecord>::deserialize(reader)?,
        })
    }
}

impl Serialize for BodyRecord {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.max_stack.serialize(writer)?;
        self.init_locals.serialize(writer)?;
        self.locals.serialize(writer)?;
        self.instructions.serialize(writer)?;
        self.handlers.serialize(writer)
    }
}

impl Deserialize for BodyRecord {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        Ok(BodyRecord {
            max_stack: u16::deserialize(reader)?,
            init_locals: bool::deserialize(reader)?,
            locals: Vec::<TypeSig>::deserialize(reader)?,
            instructions: Vec::<Instruction<u32>>::deserialize(reader)?,
            handlers: Vec::<ExceptionRange<u32>>::deserialize(reader)?,
        })
    }
}

impl Serialize for ExceptionRange<u32> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        // Clause kinds use the ECMA-335 flag values
        match &self.kind {
            HandlerKind::Catch(ty) => {
                0u8.serialize(writer)?;
                ty.serialize(writer)?;
            }
            HandlerKind::Filter(filter_start) => {
                1u8.serialize(writer)?;
                filter_start.serialize(writer)?;
            }
            HandlerKind::Finally => 2u8.serialize(writer)?,
            HandlerKind::Fault => 4u8.serialize(writer)?,
        }
        self.try_start.serialize(writer)?;
        self.try_end.serialize(writer)?;
        self.handler_start.serialize(writer)?;
        self.handler_end.serialize(writer)
    }
}

impl Deserialize for ExceptionRange<u32> {
    fn deserialize<R: ReadBytesExt>(reader: &mut R) -> std::result::Result<Self, Error> {
        let kind = match u8::deserialize(reader)? {
            0 => HandlerKind::Catch(TypeSig::deserialize(reader)?),
            1 => HandlerKind::Filter(u32::deserialize(reader)?),
            2 => HandlerKind::Finally,
            4 => HandlerKind::Fault,
            other => {
                return Err(Error::Malformed(format!(
                    "unknown exception clause kind {}",
                    other
                )))
            }
        };
        Ok(ExceptionRange {
            kind,
            try_start: u32::deserialize(reader)?,
            try_end: u32::deserialize(reader)?,
            handler_start: u32::deserialize(reader)?,
            handler_end: u32::deserialize(reader)?,
        })
    }
}
