//! Schema model and builder

pub mod builder;
pub mod model;
pub mod types;

pub use builder::{SchemaBuildError, SchemaBuilder, UnresolvedTypeReference};
pub use model::{
    AccessReturnKind, AnalysisSchema, ConfigureAccessor, ConfigureBlockRequirement,
    ConfigureLambdaStyle, DataClass, DataConstructor, DataMemberFunction, DataParameter,
    DataProperty, DataTopLevelFunction, FunctionSemantics, ParameterSemantics,
};
pub use types::{ConstantType, DataTypeRef, FqName, InvalidFqName};
