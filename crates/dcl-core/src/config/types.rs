//! Host type catalog configuration
//!
//! A catalog describes the host types a script context exposes. It is the
//! explicit stand-in for reflecting over host classes: every property,
//! function and constructor a script may use is listed here, together with
//! the tag that says how a call interacts with schema state.

use serde::{Deserialize, Serialize};

/// Root of a catalog file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostTypeCatalog {
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
    /// Top-level functions, visible to scripts once imported
    #[serde(default)]
    pub functions: Vec<TopLevelFunctionDescriptor>,
    /// Singleton objects, visible to scripts once imported
    #[serde(default)]
    pub objects: Vec<ObjectDescriptor>,
    #[serde(default)]
    pub default_imports: Vec<String>,
}

impl HostTypeCatalog {
    /// Append everything from `other`. Duplicate type names are kept and
    /// rejected later by the schema builder.
    pub fn merge(&mut self, other: HostTypeCatalog) {
        self.types.extend(other.types);
        self.functions.extend(other.functions);
        self.objects.extend(other.objects);
        for import in other.default_imports {
            if !self.default_imports.contains(&import) {
                self.default_imports.push(import);
            }
        }
    }

    pub fn type_named(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|t| t.name == name)
    }

    pub fn type_named_mut(&mut self, name: &str) -> Option<&mut TypeDescriptor> {
        self.types.iter_mut().find(|t| t.name == name)
    }
}

/// Definition of a single host type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Fully-qualified name
    pub name: String,
    #[serde(default)]
    pub supertypes: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
    #[serde(default)]
    pub functions: Vec<FunctionDescriptor>,
    #[serde(default)]
    pub constructors: Vec<ConstructorDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    /// Type text; a configure-lambda shape (`T.() -> Unit`) marks the
    /// parameter as the call's configure block
    #[serde(rename = "type")]
    pub type_name: String,
    /// The parameter may be omitted
    #[serde(default)]
    pub default: bool,
    /// Property of the function's target object that receives the value
    #[serde(default)]
    pub stores: Option<String>,
}

/// How a member function interacts with schema state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    /// No side effect; returns a value
    Pure,
    /// Mutates the receiver and returns it for chaining
    Builder,
    /// Creates a new element, optionally configured by a block
    Adding,
    /// Configures an existing object through a block
    Configuring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub kind: FunctionKind,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    /// Return type text; `Unit` when absent
    #[serde(default)]
    pub returns: Option<String>,
    /// Configuring functions: the receiver property being configured
    #[serde(default)]
    pub configures: Option<String>,
    /// Configuring functions: identifier of a host accessor function
    #[serde(default)]
    pub accessor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructorDescriptor {
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopLevelFunctionDescriptor {
    pub package: String,
    pub name: String,
    #[serde(default = "pure_kind")]
    pub kind: FunctionKind,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default)]
    pub returns: Option<String>,
}

fn pure_kind() -> FunctionKind {
    FunctionKind::Pure
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Fully-qualified name of the object
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

// =============================================================================
// SOFTWARE TYPES
// =============================================================================

/// Externally declared feature types, exposed as configuring blocks on the
/// project receiver and in settings `conventions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftwareTypeRegistry {
    #[serde(default)]
    pub software_types: Vec<SoftwareType>,
}

impl SoftwareTypeRegistry {
    pub fn is_empty(&self) -> bool {
        self.software_types.is_empty()
    }

    pub fn merge(&mut self, other: SoftwareTypeRegistry) {
        self.software_types.extend(other.software_types);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwareType {
    /// Block name in scripts: `javaLibrary { ... }`
    pub name: String,
    /// Fully-qualified name of the model type the block configures
    pub model: String,
    /// Descriptors for the model type and anything it references
    #[serde(default)]
    pub types: Vec<TypeDescriptor>,
}
