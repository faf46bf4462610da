//! Symbol lookups by name
//!
//! Lookups compare names exactly (case-sensitive). The `find_*` family returns `None` on a miss,
//! while `require_*` turns a miss into [`Error::SymbolNotFound`], which a batch treats as a
//! reason to skip a patch rather than abort.

use crate::il::model::{FieldId, MethodId, Module, TypeId};
use crate::il::names::{qualify, split_nested};
use crate::il::Error;

impl Module {
    /// Find a type by qualified name (`Namespace.Name`, or `Outer/Inner` for nested types)
    pub fn find_type(&self, qualified_name: &str) -> Option<TypeId> {
        let (top, nested) = split_nested(qualified_name);
        let mut found = self.type_ids().find(|id| {
            let type_def = self.type_def(*id);
            type_def.declaring_type.is_none() && qualify(&type_def.namespace, &type_def.name) == top
        })?;
        for name in nested {
            found = self.find_nested_type(found, name)?;
        }
        Some(found)
    }

    pub fn find_nested_type(&self, declaring_type: TypeId, name: &str) -> Option<TypeId> {
        self.type_def(declaring_type)
            .nested_types
            .iter()
            .copied()
            .find(|nested| self.type_def(*nested).name == name)
    }

    /// First method with the given name, in declaration order
    pub fn find_method(&self, declaring_type: TypeId, name: &str) -> Option<MethodId> {
        self.type_def(declaring_type)
            .methods
            .iter()
            .copied()
            .find(|method| self.method(*method).name == name)
    }

    /// Every overload with the given name, in declaration order
    pub fn find_methods(&self, declaring_type: TypeId, name: &str) -> Vec<MethodId> {
        self.type_def(declaring_type)
            .methods
            .iter()
            .copied()
            .filter(|method| self.method(*method).name == name)
            .collect()
    }

    /// The method with the given name, failing if there are none or several overloads
    pub fn find_unique_method(
        &self,
        declaring_type: TypeId,
        name: &str,
    ) -> Result<MethodId, Error> {
        match self.find_methods(declaring_type, name).as_slice() {
            [method] => Ok(*method),
            candidates => Err(Error::AmbiguousOrMissing {
                type_name: self.type_name(declaring_type),
                method_name: String::from(name),
                candidates: candidates.len(),
            }),
        }
    }

    pub fn find_field(&self, declaring_type: TypeId, name: &str) -> Option<FieldId> {
        self.type_def(declaring_type)
            .fields
            .iter()
            .copied()
            .find(|field| self.field(*field).name == name)
    }

    /// Instance constructor taking no arguments
    pub fn find_parameterless_constructor(&self, declaring_type: TypeId) -> Option<MethodId> {
        self.type_def(declaring_type)
            .methods
            .iter()
            .copied()
            .find(|method| {
                let method = self.method(*method);
                method.is_constructor() && method.signature.params.is_empty()
            })
    }

    pub fn require_type(&self, qualified_name: &str) -> Result<TypeId, Error> {
        self.find_type(qualified_name)
            .ok_or_else(|| Error::SymbolNotFound(String::from(qualified_name)))
    }

    pub fn require_method(&self, declaring_type: TypeId, name: &str) -> Result<MethodId, Error> {
        self.find_method(declaring_type, name).ok_or_else(|| {
            Error::SymbolNotFound(format!("{}::{}", self.type_name(declaring_type), name))
        })
    }

    pub fn require_field(&self, declaring_type: TypeId, name: &str) -> Result<FieldId, Error> {
        self.find_field(declaring_type, name).ok_or_else(|| {
            Error::SymbolNotFound(format!("{}::{}", self.type_name(declaring_type), name))
        })
    }
}

#[cfg(test)]
mod test {
    use crate::il::{Error, MethodFlags, MethodSig, Param, TypeSig};
    use crate::test_util::sample_module;

    #[test]
    fn types() {
        let (module, sample) = sample_module();
        assert_eq!(module.find_type("Game.PlayerStats"), Some(sample.stats));
        assert_eq!(module.find_type("System.Object"), Some(sample.object_type));
        assert_eq!(module.find_type("Game.PlayerStats/Data"), Some(sample.data));
        assert_eq!(module.find_type("game.playerstats"), None);
        assert_eq!(module.find_type("Game.PlayerStats/Missing"), None);
        assert_eq!(module.find_type("Data"), None);
        assert!(matches!(
            module.require_type("Game.Nope"),
            Err(Error::SymbolNotFound(name)) if name == "Game.Nope"
        ));
    }

    #[test]
    fn overloads() {
        let (mut module, sample) = sample_module();
        assert_eq!(
            module.find_method(sample.stats, "IsComplete"),
            Some(sample.is_complete)
        );
        assert_eq!(
            module.find_unique_method(sample.stats, "IsComplete").unwrap(),
            sample.is_complete
        );

        let overload = module
            .add_method(
                sample.stats,
                "IsComplete",
                MethodFlags::PUBLIC,
                MethodSig::new(TypeSig::Boolean, vec![Param::new("name", TypeSig::String)]),
            )
            .unwrap();
        assert_eq!(
            module.find_methods(sample.stats, "IsComplete"),
            vec![sample.is_complete, overload]
        );
        assert_eq!(
            module.find_method(sample.stats, "IsComplete"),
            Some(sample.is_complete)
        );
        assert!(matches!(
            module.find_unique_method(sample.stats, "IsComplete"),
            Err(Error::AmbiguousOrMissing { candidates: 2, .. })
        ));
        assert!(matches!(
            module.find_unique_method(sample.stats, "isComplete"),
            Err(Error::AmbiguousOrMissing { candidates: 0, .. })
        ));
    }

    #[test]
    fn fields_and_constructors() {
        let (module, sample) = sample_module();
        assert_eq!(
            module.find_field(sample.stats, "_stamina"),
            Some(sample.stamina)
        );
        assert!(module.require_field(sample.stats, "_Stamina").is_err());
        assert_eq!(
            module.find_parameterless_constructor(sample.helper),
            Some(sample.helper_ctor)
        );
        assert_eq!(module.find_parameterless_constructor(sample.data), None);
    }
}
