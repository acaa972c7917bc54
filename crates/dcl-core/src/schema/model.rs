//! Schema model: the closed set of types, properties and functions legal in a
//! script context.
//!
//! An [`AnalysisSchema`] is built once per script-context kind by the
//! [`SchemaBuilder`](super::builder::SchemaBuilder) and is immutable after
//! that. Resolution only ever reads it, so one schema is shared (behind an
//! `Arc`) by every script of its kind.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::types::{ConstantType, DataTypeRef, FqName};

// =============================================================================
// MEMBERS
// =============================================================================

/// A mutable (or read-only) storage location on a data class
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataProperty {
    pub name: String,
    pub type_ref: DataTypeRef,
    pub is_read_only: bool,
    pub has_default: bool,
}

impl DataProperty {
    pub fn new(name: impl Into<String>, type_ref: DataTypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            is_read_only: false,
            has_default: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.is_read_only = true;
        self
    }
}

/// What happens to an argument's value when the call is evaluated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterSemantics {
    /// The value is written to the property as a side effect of the call
    StoreValueInProperty(DataProperty),
    /// The value is consumed by host logic with no schema-visible effect
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataParameter {
    pub name: String,
    pub type_ref: DataTypeRef,
    pub is_default: bool,
    pub semantics: ParameterSemantics,
}

impl DataParameter {
    pub fn new(name: impl Into<String>, type_ref: DataTypeRef) -> Self {
        Self {
            name: name.into(),
            type_ref,
            is_default: false,
            semantics: ParameterSemantics::Unknown,
        }
    }

    pub fn stored_in(mut self, property: DataProperty) -> Self {
        self.semantics = ParameterSemantics::StoreValueInProperty(property);
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_default = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessReturnKind {
    Unit,
    ConfiguredObject,
}

/// How an access-and-configure call reaches the object it configures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigureAccessor {
    Property(DataProperty),
    /// A host accessor function, identified opaquely for the evaluator
    Custom {
        object_type: DataTypeRef,
        accessor_id: String,
    },
}

impl ConfigureAccessor {
    pub fn object_type(&self) -> &DataTypeRef {
        match self {
            ConfigureAccessor::Property(property) => &property.type_ref,
            ConfigureAccessor::Custom { object_type, .. } => object_type,
        }
    }
}

/// Whether a call may or must be followed by a configure block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigureBlockRequirement {
    NotAllowed,
    Optional,
    Required,
}

/// The protocol by which a call interacts with schema state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionSemantics {
    Pure {
        return_type: DataTypeRef,
    },
    Builder {
        return_type: DataTypeRef,
    },
    AddAndConfigure {
        element_type: DataTypeRef,
        accepts_configure_block: bool,
    },
    AccessAndConfigure {
        accessor: ConfigureAccessor,
        return_kind: AccessReturnKind,
    },
}

impl FunctionSemantics {
    /// Type of the value a call with these semantics produces
    pub fn return_type(&self) -> DataTypeRef {
        match self {
            FunctionSemantics::Pure { return_type } | FunctionSemantics::Builder { return_type } => {
                return_type.clone()
            }
            FunctionSemantics::AddAndConfigure { element_type, .. } => element_type.clone(),
            FunctionSemantics::AccessAndConfigure {
                accessor,
                return_kind,
            } => match return_kind {
                AccessReturnKind::Unit => DataTypeRef::Unit,
                AccessReturnKind::ConfiguredObject => accessor.object_type().clone(),
            },
        }
    }

    /// Receiver type of the configure block, when one is accepted
    pub fn configured_type(&self) -> Option<&DataTypeRef> {
        match self {
            FunctionSemantics::AddAndConfigure {
                element_type,
                accepts_configure_block: true,
            } => Some(element_type),
            FunctionSemantics::AccessAndConfigure { accessor, .. } => Some(accessor.object_type()),
            _ => None,
        }
    }

    pub fn configure_block(&self) -> ConfigureBlockRequirement {
        match self {
            FunctionSemantics::Pure { .. } | FunctionSemantics::Builder { .. } => {
                ConfigureBlockRequirement::NotAllowed
            }
            FunctionSemantics::AddAndConfigure {
                accepts_configure_block,
                ..
            } => {
                if *accepts_configure_block {
                    ConfigureBlockRequirement::Optional
                } else {
                    ConfigureBlockRequirement::NotAllowed
                }
            }
            FunctionSemantics::AccessAndConfigure { .. } => ConfigureBlockRequirement::Required,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            FunctionSemantics::Pure { .. } => "pure",
            FunctionSemantics::Builder { .. } => "builder",
            FunctionSemantics::AddAndConfigure { .. } => "add-and-configure",
            FunctionSemantics::AccessAndConfigure { .. } => "access-and-configure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataMemberFunction {
    pub receiver: FqName,
    pub name: String,
    pub parameters: Vec<DataParameter>,
    pub semantics: FunctionSemantics,
}

/// A free function visible without a receiver once imported
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTopLevelFunction {
    pub fq_name: FqName,
    pub parameters: Vec<DataParameter>,
    pub semantics: FunctionSemantics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConstructor {
    pub parameters: Vec<DataParameter>,
}

/// A named host type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataClass {
    pub name: FqName,
    pub supertypes: BTreeSet<FqName>,
    pub properties: Vec<DataProperty>,
    pub member_functions: Vec<DataMemberFunction>,
    pub constructors: Vec<DataConstructor>,
}

impl DataClass {
    pub fn property(&self, name: &str) -> Option<&DataProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn functions_named<'a, 'n>(
        &'a self,
        name: &'n str,
    ) -> impl Iterator<Item = &'a DataMemberFunction> + 'n
    where
        'a: 'n,
    {
        self.member_functions.iter().filter(move |f| f.name == name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.member_functions.iter().any(|f| f.name == name)
    }
}

// =============================================================================
// CONFIGURE LAMBDAS
// =============================================================================

/// How host functions spell "a block that configures a `T`".
///
/// The schema builder uses this to recognise the trailing parameter that
/// becomes a configure block; the evaluator uses it to adapt blocks back to
/// host callables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigureLambdaStyle {
    /// `T.() -> Unit`
    #[default]
    ReceiverFunction,
    /// `Action<T>`
    ActionInterface,
}

impl ConfigureLambdaStyle {
    /// Configured type name if `type_text` has this style's configure shape
    pub fn configured_type<'t>(&self, type_text: &'t str) -> Option<&'t str> {
        let text = type_text.trim();
        let configured = match self {
            ConfigureLambdaStyle::ReceiverFunction => {
                let (receiver, result) = text.split_once(".()")?;
                let result = result.trim().strip_prefix("->")?;
                if result.trim() != "Unit" {
                    return None;
                }
                receiver
            }
            ConfigureLambdaStyle::ActionInterface => {
                text.strip_prefix("Action<")?.strip_suffix('>')?
            }
        };

        let configured = configured.trim();
        if configured.is_empty() {
            None
        } else {
            Some(configured)
        }
    }

    /// Type text of a block configuring `type_name`, in this style
    pub fn spell(&self, type_name: &str) -> String {
        match self {
            ConfigureLambdaStyle::ReceiverFunction => format!("{}.() -> Unit", type_name),
            ConfigureLambdaStyle::ActionInterface => format!("Action<{}>", type_name),
        }
    }
}

// =============================================================================
// ANALYSIS SCHEMA
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSchema {
    pub top_level_receiver: FqName,
    pub data_classes: BTreeMap<FqName, DataClass>,
    pub external_functions: BTreeMap<FqName, DataTopLevelFunction>,
    pub external_objects: BTreeMap<FqName, DataTypeRef>,
    pub default_imports: BTreeSet<FqName>,
    pub configure_lambdas: ConfigureLambdaStyle,
}

impl AnalysisSchema {
    pub fn data_class(&self, name: &FqName) -> Option<&DataClass> {
        self.data_classes.get(name)
    }

    /// The class of the implicit receiver at the top of a script
    pub fn top_level_class(&self) -> Option<&DataClass> {
        self.data_classes.get(&self.top_level_receiver)
    }

    /// Whether `name` is a class, external function or external object
    pub fn declares(&self, name: &FqName) -> bool {
        self.data_classes.contains_key(name)
            || self.external_functions.contains_key(name)
            || self.external_objects.contains_key(name)
    }

    /// Whether a value of type `source` may be stored where `target` is expected
    pub fn is_assignable(&self, target: &DataTypeRef, source: &DataTypeRef) -> bool {
        match (target, source) {
            (t, s) if t == s => true,
            (DataTypeRef::Constant(ConstantType::Long), DataTypeRef::Constant(ConstantType::Int)) => {
                true
            }
            (DataTypeRef::Name(_), DataTypeRef::Null) => true,
            (DataTypeRef::Name(target), DataTypeRef::Name(source)) => self.is_subtype(source, target),
            _ => false,
        }
    }

    fn is_subtype(&self, sub: &FqName, sup: &FqName) -> bool {
        let mut pending = vec![sub];
        let mut seen = BTreeSet::new();

        while let Some(current) = pending.pop() {
            if current == sup {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            if let Some(class) = self.data_classes.get(current) {
                pending.extend(class.supertypes.iter());
            }
        }

        false
    }

    /// Stable content hash, suitable as a cache key for built schemas
    pub fn fingerprint(&self) -> String {
        // BTreeMap/Vec ordering makes the JSON form canonical
        let canonical = serde_json::to_vec(self)
            .expect("schema map keys are FqNames, which serialize as strings");
        hex::encode(Sha256::digest(&canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> FqName {
        FqName::parse(s).unwrap()
    }

    fn class(fq: &str, supertypes: &[&str]) -> DataClass {
        DataClass {
            name: name(fq),
            supertypes: supertypes.iter().map(|s| name(s)).collect(),
            properties: vec![],
            member_functions: vec![],
            constructors: vec![],
        }
    }

    fn schema_with(classes: Vec<DataClass>) -> AnalysisSchema {
        AnalysisSchema {
            top_level_receiver: classes[0].name.clone(),
            data_classes: classes.into_iter().map(|c| (c.name.clone(), c)).collect(),
            external_functions: BTreeMap::new(),
            external_objects: BTreeMap::new(),
            default_imports: BTreeSet::new(),
            configure_lambdas: ConfigureLambdaStyle::default(),
        }
    }

    #[test]
    fn test_configure_lambda_shapes() {
        let receiver = ConfigureLambdaStyle::ReceiverFunction;
        assert_eq!(receiver.configured_type("com.example.C.() -> Unit"), Some("com.example.C"));
        assert_eq!(receiver.configured_type("C.()->Unit"), Some("C"));
        assert_eq!(receiver.configured_type("C.() -> Int"), None);
        assert_eq!(receiver.configured_type("Action<C>"), None);

        let action = ConfigureLambdaStyle::ActionInterface;
        assert_eq!(action.configured_type("Action<com.example.C>"), Some("com.example.C"));
        assert_eq!(action.configured_type("C.() -> Unit"), None);

        for style in [receiver, action] {
            assert_eq!(style.configured_type(&style.spell("a.B")), Some("a.B"));
        }
    }

    #[test]
    fn test_assignability() {
        let schema = schema_with(vec![
            class("a.Top", &[]),
            class("a.Base", &[]),
            class("a.Mid", &["a.Base"]),
            class("a.Leaf", &["a.Mid"]),
        ]);
        let base = DataTypeRef::Name(name("a.Base"));
        let leaf = DataTypeRef::Name(name("a.Leaf"));

        assert!(schema.is_assignable(&base, &leaf));
        assert!(!schema.is_assignable(&leaf, &base));
        assert!(schema.is_assignable(&base, &DataTypeRef::Null));
        assert!(schema.is_assignable(&DataTypeRef::LONG, &DataTypeRef::INT));
        assert!(!schema.is_assignable(&DataTypeRef::INT, &DataTypeRef::LONG));
        assert!(!schema.is_assignable(&DataTypeRef::INT, &DataTypeRef::Null));
        assert!(!schema.is_assignable(&DataTypeRef::STRING, &DataTypeRef::BOOLEAN));
    }

    #[test]
    fn test_semantics_return_and_block_requirement() {
        let c = DataTypeRef::Name(name("a.C"));
        let adding = FunctionSemantics::AddAndConfigure {
            element_type: c.clone(),
            accepts_configure_block: true,
        };
        assert_eq!(adding.return_type(), c);
        assert_eq!(adding.configure_block(), ConfigureBlockRequirement::Optional);
        assert_eq!(adding.configured_type(), Some(&c));

        let access = FunctionSemantics::AccessAndConfigure {
            accessor: ConfigureAccessor::Property(DataProperty::new("c", c.clone()).read_only()),
            return_kind: AccessReturnKind::Unit,
        };
        assert_eq!(access.return_type(), DataTypeRef::Unit);
        assert_eq!(access.configure_block(), ConfigureBlockRequirement::Required);

        let pure = FunctionSemantics::Pure {
            return_type: DataTypeRef::INT,
        };
        assert_eq!(pure.configure_block(), ConfigureBlockRequirement::NotAllowed);
        assert_eq!(pure.configured_type(), None);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let one = schema_with(vec![class("a.Top", &[])]);
        let two = schema_with(vec![class("a.Top", &[])]);
        let other = schema_with(vec![class("a.Other", &[])]);

        assert_eq!(one.fingerprint(), two.fingerprint());
        assert_ne!(one.fingerprint(), other.fingerprint());
        assert_eq!(one.fingerprint().len(), 64);
    }

    #[test]
    fn test_fingerprint_covers_external_declarations() {
        let bare = schema_with(vec![class("a.Top", &[])]);
        let mut with_object = bare.clone();
        with_object
            .external_objects
            .insert(name("a.Default"), DataTypeRef::Name(name("a.Top")));

        assert_ne!(bare.fingerprint(), with_object.fingerprint());
        assert_eq!(with_object.fingerprint(), with_object.clone().fingerprint());
    }

    // the found function borrows from the class only, never from the name
    fn first_named(class: &DataClass, name: String) -> Option<&DataMemberFunction> {
        class.functions_named(&name).next()
    }

    #[test]
    fn test_functions_named_with_temporary_name() {
        let mut top = class("a.Top", &[]);
        for (function, returns) in [("g", DataTypeRef::INT), ("h", DataTypeRef::STRING)] {
            top.member_functions.push(DataMemberFunction {
                receiver: name("a.Top"),
                name: function.to_string(),
                parameters: vec![],
                semantics: FunctionSemantics::Pure {
                    return_type: returns,
                },
            });
        }

        let h = first_named(&top, "h".to_string()).unwrap();
        assert_eq!(
            h.semantics,
            FunctionSemantics::Pure {
                return_type: DataTypeRef::STRING
            }
        );
        assert!(first_named(&top, "missing".to_string()).is_none());
    }
}
