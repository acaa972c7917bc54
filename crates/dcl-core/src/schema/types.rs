//! Names and type references shared by the syntax tree and the schema model.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid qualified name '{0}'")]
pub struct InvalidFqName(pub String);

/// Fully-qualified, dot-separated name of a schema entity: `build.plugins.PluginsBlock`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FqName(String);

impl FqName {
    /// Parse a dotted name; every segment must be an identifier
    pub fn parse(name: &str) -> Result<Self, InvalidFqName> {
        let valid = !name.is_empty()
            && name.split('.').all(|segment| {
                let mut chars = segment.chars();
                matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
                    && chars.all(|c| c.is_alphanumeric() || c == '_')
            });

        if valid {
            Ok(Self(name.to_string()))
        } else {
            Err(InvalidFqName(name.to_string()))
        }
    }

    pub fn from_parts(parts: &[String]) -> Result<Self, InvalidFqName> {
        Self::parse(&parts.join("."))
    }

    /// Name of a member declared in `package`
    pub fn in_package(package: &str, name: &str) -> Result<Self, InvalidFqName> {
        if package.is_empty() {
            Self::parse(name)
        } else {
            Self::parse(&format!("{}.{}", package, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment: the name an import makes visible
    pub fn simple_name(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((_, simple)) => simple,
            None => &self.0,
        }
    }

    pub fn package(&self) -> Option<&str> {
        self.0.rsplit_once('.').map(|(package, _)| package)
    }
}

impl TryFrom<String> for FqName {
    type Error = InvalidFqName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FqName> for String {
    fn from(name: FqName) -> Self {
        name.0
    }
}

impl fmt::Display for FqName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Types of the literal values the language can spell directly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConstantType {
    String,
    Int,
    Long,
    Boolean,
}

impl ConstantType {
    pub fn name(&self) -> &'static str {
        match self {
            ConstantType::String => "String",
            ConstantType::Int => "Int",
            ConstantType::Long => "Long",
            ConstantType::Boolean => "Boolean",
        }
    }
}

/// Stored form of a type: primitives inline, classes by name.
///
/// Class references are resolved lazily against the owning schema's type
/// table, so mutually referential types never need to exist as a graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataTypeRef {
    Constant(ConstantType),
    Null,
    Unit,
    Name(FqName),
}

impl DataTypeRef {
    pub const STRING: DataTypeRef = DataTypeRef::Constant(ConstantType::String);
    pub const INT: DataTypeRef = DataTypeRef::Constant(ConstantType::Int);
    pub const LONG: DataTypeRef = DataTypeRef::Constant(ConstantType::Long);
    pub const BOOLEAN: DataTypeRef = DataTypeRef::Constant(ConstantType::Boolean);

    /// Parse the textual type used in host type descriptors
    pub fn parse(text: &str) -> Result<Self, InvalidFqName> {
        match text.trim() {
            "String" => Ok(Self::STRING),
            "Int" => Ok(Self::INT),
            "Long" => Ok(Self::LONG),
            "Boolean" => Ok(Self::BOOLEAN),
            "Unit" => Ok(DataTypeRef::Unit),
            other => FqName::parse(other).map(DataTypeRef::Name),
        }
    }

    pub fn class_name(&self) -> Option<&FqName> {
        match self {
            DataTypeRef::Name(name) => Some(name),
            _ => None,
        }
    }
}

impl From<ConstantType> for DataTypeRef {
    fn from(constant: ConstantType) -> Self {
        DataTypeRef::Constant(constant)
    }
}

impl fmt::Display for DataTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataTypeRef::Constant(constant) => f.write_str(constant.name()),
            DataTypeRef::Null => f.write_str("Nothing?"),
            DataTypeRef::Unit => f.write_str("Unit"),
            DataTypeRef::Name(name) => write!(f, "{}", name),
        }
    }
}
