//! Call candidates and argument binding

use crate::schema::{
    AnalysisSchema, ConfigureBlockRequirement, DataParameter, DataTypeRef, FqName,
    FunctionSemantics,
};

use super::operations::CalleeRef;

/// A function a call might refer to
#[derive(Debug, Clone)]
pub(crate) struct Candidate<'s> {
    pub callee: CalleeRef,
    pub parameters: &'s [DataParameter],
    pub semantics: FunctionSemantics,
}

impl<'s> Candidate<'s> {
    /// Member functions named `name` on `class`
    pub(crate) fn members(schema: &'s AnalysisSchema, class: &FqName, name: &str) -> Vec<Self> {
        schema
            .data_class(class)
            .map(|c| {
                c.functions_named(name)
                    .map(|f| Candidate {
                        callee: CalleeRef::Member {
                            owner: class.clone(),
                            name: f.name.clone(),
                        },
                        parameters: &f.parameters,
                        semantics: f.semantics.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The external function imported as `fq_name`, if any
    pub(crate) fn external(schema: &'s AnalysisSchema, fq_name: &FqName) -> Vec<Self> {
        schema
            .external_functions
            .get(fq_name)
            .map(|f| Candidate {
                callee: CalleeRef::External(f.fq_name.clone()),
                parameters: &f.parameters,
                semantics: f.semantics.clone(),
            })
            .into_iter()
            .collect()
    }

    /// Constructors of the class imported as `fq_name`
    pub(crate) fn constructors(schema: &'s AnalysisSchema, fq_name: &FqName) -> Vec<Self> {
        schema
            .data_class(fq_name)
            .map(|c| {
                c.constructors
                    .iter()
                    .map(|constructor| Candidate {
                        callee: CalleeRef::Constructor(fq_name.clone()),
                        parameters: &constructor.parameters,
                        semantics: FunctionSemantics::Pure {
                            return_type: DataTypeRef::Name(fq_name.clone()),
                        },
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A value argument after its expression has been typed
#[derive(Debug, Clone)]
pub(crate) struct TypedArgument {
    pub name: Option<String>,
    pub type_ref: DataTypeRef,
}

/// Why a candidate does not accept a call
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BindingMismatch {
    UnexpectedConfigureBlock,
    MissingConfigureBlock,
    TooManyArguments,
    UnknownNamedArgument(String),
    DuplicateArgument(String),
    MissingArgument(String),
    TypeMismatch {
        parameter: String,
        expected: DataTypeRef,
        found: DataTypeRef,
    },
}

impl std::fmt::Display for BindingMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingMismatch::UnexpectedConfigureBlock => f.write_str("it takes no configure block"),
            BindingMismatch::MissingConfigureBlock => f.write_str("it requires a configure block"),
            BindingMismatch::TooManyArguments => f.write_str("too many arguments"),
            BindingMismatch::UnknownNamedArgument(name) => write!(f, "no parameter named '{}'", name),
            BindingMismatch::DuplicateArgument(name) => {
                write!(f, "parameter '{}' is given more than once", name)
            }
            BindingMismatch::MissingArgument(name) => write!(f, "missing argument for '{}'", name),
            BindingMismatch::TypeMismatch {
                parameter,
                expected,
                found,
            } => write!(
                f,
                "argument '{}' expects {}, found {}",
                parameter, expected, found
            ),
        }
    }
}

/// Bind arguments to a candidate's parameters.
///
/// Named arguments bind by name; positional arguments fill the unbound
/// parameters left to right. Returns, per parameter, the index of the
/// argument bound to it (`None` for an omitted defaulted parameter).
pub(crate) fn bind_arguments(
    schema: &AnalysisSchema,
    candidate: &Candidate<'_>,
    arguments: &[TypedArgument],
    has_configure_block: bool,
) -> Result<Vec<Option<usize>>, BindingMismatch> {
    match (candidate.semantics.configure_block(), has_configure_block) {
        (ConfigureBlockRequirement::NotAllowed, true) => {
            return Err(BindingMismatch::UnexpectedConfigureBlock)
        }
        (ConfigureBlockRequirement::Required, false) => {
            return Err(BindingMismatch::MissingConfigureBlock)
        }
        _ => {}
    }

    let parameters = candidate.parameters;
    let mut bound: Vec<Option<usize>> = vec![None; parameters.len()];

    for (index, argument) in arguments.iter().enumerate() {
        if let Some(name) = &argument.name {
            let position = parameters
                .iter()
                .position(|p| &p.name == name)
                .ok_or_else(|| BindingMismatch::UnknownNamedArgument(name.clone()))?;
            if bound[position].is_some() {
                return Err(BindingMismatch::DuplicateArgument(name.clone()));
            }
            bound[position] = Some(index);
        }
    }

    for (index, argument) in arguments.iter().enumerate() {
        if argument.name.is_none() {
            let position = bound
                .iter()
                .position(Option::is_none)
                .ok_or(BindingMismatch::TooManyArguments)?;
            bound[position] = Some(index);
        }
    }

    for (parameter, slot) in parameters.iter().zip(&bound) {
        match slot {
            None if !parameter.is_default => {
                return Err(BindingMismatch::MissingArgument(parameter.name.clone()))
            }
            None => {}
            Some(index) => {
                let found = &arguments[*index].type_ref;
                if !schema.is_assignable(&parameter.type_ref, found) {
                    return Err(BindingMismatch::TypeMismatch {
                        parameter: parameter.name.clone(),
                        expected: parameter.type_ref.clone(),
                        found: found.clone(),
                    });
                }
            }
        }
    }

    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ConfigureLambdaStyle, DataTypeRef};
    use std::collections::{BTreeMap, BTreeSet};

    fn schema() -> AnalysisSchema {
        AnalysisSchema {
            top_level_receiver: FqName::parse("a.Top").unwrap(),
            data_classes: BTreeMap::new(),
            external_functions: BTreeMap::new(),
            external_objects: BTreeMap::new(),
            default_imports: BTreeSet::new(),
            configure_lambdas: ConfigureLambdaStyle::default(),
        }
    }

    fn positional(type_ref: DataTypeRef) -> TypedArgument {
        TypedArgument {
            name: None,
            type_ref,
        }
    }

    fn named(name: &str, type_ref: DataTypeRef) -> TypedArgument {
        TypedArgument {
            name: Some(name.to_string()),
            type_ref,
        }
    }

    fn pure(parameters: &[DataParameter]) -> Candidate<'_> {
        Candidate {
            callee: CalleeRef::External(FqName::parse("a.f").unwrap()),
            parameters,
            semantics: FunctionSemantics::Pure {
                return_type: DataTypeRef::Unit,
            },
        }
    }

    #[test]
    fn test_positional_and_named_mix() {
        let params = vec![
            DataParameter::new("x", DataTypeRef::INT),
            DataParameter::new("y", DataTypeRef::STRING),
        ];
        let schema = schema();
        let bound = bind_arguments(
            &schema,
            &pure(&params),
            &[named("y", DataTypeRef::STRING), positional(DataTypeRef::INT)],
            false,
        )
        .unwrap();
        assert_eq!(bound, vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_defaulted_parameter_may_be_omitted() {
        let params = vec![
            DataParameter::new("x", DataTypeRef::INT),
            DataParameter::new("y", DataTypeRef::STRING).optional(),
        ];
        let schema = schema();
        let bound = bind_arguments(&schema, &pure(&params), &[positional(DataTypeRef::INT)], false);
        assert_eq!(bound, Ok(vec![Some(0), None]));
    }

    #[test]
    fn test_mismatches() {
        let params = vec![DataParameter::new("x", DataTypeRef::LONG)];
        let schema = schema();
        let candidate = pure(&params);

        assert_eq!(
            bind_arguments(&schema, &candidate, &[], false),
            Err(BindingMismatch::MissingArgument("x".to_string()))
        );
        assert_eq!(
            bind_arguments(
                &schema,
                &candidate,
                &[positional(DataTypeRef::INT), positional(DataTypeRef::INT)],
                false
            ),
            Err(BindingMismatch::TooManyArguments)
        );
        assert_eq!(
            bind_arguments(&schema, &candidate, &[named("z", DataTypeRef::INT)], false),
            Err(BindingMismatch::UnknownNamedArgument("z".to_string()))
        );
        assert_eq!(
            bind_arguments(
                &schema,
                &candidate,
                &[named("x", DataTypeRef::INT), named("x", DataTypeRef::INT)],
                false
            ),
            Err(BindingMismatch::DuplicateArgument("x".to_string()))
        );
        assert!(matches!(
            bind_arguments(&schema, &candidate, &[positional(DataTypeRef::STRING)], false),
            Err(BindingMismatch::TypeMismatch { .. })
        ));
        // Int widens to Long
        assert!(bind_arguments(&schema, &candidate, &[positional(DataTypeRef::INT)], false).is_ok());
    }

    #[test]
    fn test_configure_block_checked_first() {
        let params = vec![DataParameter::new("x", DataTypeRef::INT)];
        let schema = schema();
        assert_eq!(
            bind_arguments(&schema, &pure(&params), &[], true),
            Err(BindingMismatch::UnexpectedConfigureBlock)
        );
    }
}
