//! Schema builder
//!
//! Turns a [`HostTypeCatalog`] into an [`AnalysisSchema`] rooted at a
//! top-level receiver type:
//!
//! 1. collect every type reachable from the root, the catalog's top-level
//!    functions and objects, and its default imports
//! 2. materialise a [`DataClass`] per reachable type, flattening members
//!    inherited from catalog supertypes
//! 3. assemble the name tables and check default imports
//!
//! Unknown type names are not reported one at a time: reachability finishes
//! first and every unresolved name is returned together, each with the chain
//! of members that led to it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use thiserror::Error;
use tracing::debug;

use super::model::*;
use super::types::{DataTypeRef, FqName, InvalidFqName};
use crate::config::types::{
    FunctionDescriptor, FunctionKind, HostTypeCatalog, ParameterDescriptor, PropertyDescriptor,
    TypeDescriptor,
};

/// A type name no catalog entry declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedTypeReference {
    pub name: String,
    /// Members leading from a root to the reference, outermost first
    pub chain: Vec<String>,
}

impl std::fmt::Display for UnresolvedTypeReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.chain.is_empty() {
            write!(f, "{} (top-level receiver)", self.name)
        } else {
            write!(f, "{} (via {})", self.name, self.chain.join(" -> "))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaBuildError {
    #[error("unresolved type references: {}", render_unresolved(.0))]
    UnresolvedTypes(Vec<UnresolvedTypeReference>),

    #[error("type '{0}' is declared more than once")]
    DuplicateType(String),

    #[error(transparent)]
    InvalidName(#[from] InvalidFqName),

    #[error("function '{function}': {reason}")]
    InvalidFunction { function: String, reason: String },

    #[error("function '{function}' refers to unknown property '{property}' of '{owner}'")]
    UnknownProperty {
        function: String,
        owner: String,
        property: String,
    },

    #[error("default import '{0}' does not name a type, function or object of the schema")]
    UnknownDefaultImport(String),
}

fn render_unresolved(references: &[UnresolvedTypeReference]) -> String {
    references
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn invalid(function: &str, reason: impl Into<String>) -> SchemaBuildError {
    SchemaBuildError::InvalidFunction {
        function: function.to_string(),
        reason: reason.into(),
    }
}

type TypeIndex<'c> = BTreeMap<FqName, &'c TypeDescriptor>;

pub struct SchemaBuilder<'c> {
    catalog: &'c HostTypeCatalog,
    configure_lambdas: ConfigureLambdaStyle,
}

impl<'c> SchemaBuilder<'c> {
    pub fn new(catalog: &'c HostTypeCatalog) -> Self {
        Self {
            catalog,
            configure_lambdas: ConfigureLambdaStyle::default(),
        }
    }

    pub fn with_configure_lambdas(mut self, style: ConfigureLambdaStyle) -> Self {
        self.configure_lambdas = style;
        self
    }

    pub fn build(&self, top_level_receiver: &str) -> Result<AnalysisSchema, SchemaBuildError> {
        let root = FqName::parse(top_level_receiver)?;
        let index = self.index_types()?;
        let reachable = self.reachable_types(&root, &index)?;

        let mut data_classes = BTreeMap::new();
        for name in &reachable {
            data_classes.insert(name.clone(), self.data_class(name, &index)?);
        }

        let mut external_functions = BTreeMap::new();
        for function in &self.catalog.functions {
            let fq_name = FqName::in_package(&function.package, &function.name)?;
            if function.kind != FunctionKind::Pure {
                return Err(invalid(fq_name.as_str(), "top-level functions must be pure"));
            }
            let (parameters, configured) =
                self.split_configure_parameter(fq_name.as_str(), &function.parameters)?;
            if configured.is_some() {
                return Err(invalid(
                    fq_name.as_str(),
                    "pure functions cannot take a configure block",
                ));
            }
            let parameters = parameters
                .iter()
                .map(|p| self.parameter(fq_name.as_str(), p, None, &index))
                .collect::<Result<Vec<_>, _>>()?;
            let return_type = parse_optional(function.returns.as_deref())?.unwrap_or(DataTypeRef::Unit);

            external_functions.insert(
                fq_name.clone(),
                DataTopLevelFunction {
                    fq_name,
                    parameters,
                    semantics: FunctionSemantics::Pure { return_type },
                },
            );
        }

        let mut external_objects = BTreeMap::new();
        for object in &self.catalog.objects {
            external_objects.insert(
                FqName::parse(&object.name)?,
                DataTypeRef::parse(&object.type_name)?,
            );
        }

        let mut schema = AnalysisSchema {
            top_level_receiver: root,
            data_classes,
            external_functions,
            external_objects,
            default_imports: BTreeSet::new(),
            configure_lambdas: self.configure_lambdas,
        };

        for import in &self.catalog.default_imports {
            let name = FqName::parse(import)?;
            if !schema.declares(&name) {
                return Err(SchemaBuildError::UnknownDefaultImport(import.clone()));
            }
            schema.default_imports.insert(name);
        }

        debug!(
            root = %schema.top_level_receiver,
            classes = schema.data_classes.len(),
            functions = schema.external_functions.len(),
            objects = schema.external_objects.len(),
            "built analysis schema"
        );

        Ok(schema)
    }

    fn index_types(&self) -> Result<TypeIndex<'c>, SchemaBuildError> {
        let mut index = BTreeMap::new();
        for descriptor in &self.catalog.types {
            let name = FqName::parse(&descriptor.name)?;
            if index.insert(name, descriptor).is_some() {
                return Err(SchemaBuildError::DuplicateType(descriptor.name.clone()));
            }
        }
        Ok(index)
    }

    // =========================================================================
    // REACHABILITY
    // =========================================================================

    fn reachable_types(
        &self,
        root: &FqName,
        index: &TypeIndex<'c>,
    ) -> Result<BTreeSet<FqName>, SchemaBuildError> {
        let mut queue: VecDeque<(FqName, Vec<String>)> = VecDeque::new();
        queue.push_back((root.clone(), vec![]));

        for function in &self.catalog.functions {
            let owner = format!("{}.{}", function.package, function.name);
            for parameter in &function.parameters {
                if let Some(name) = self.referenced_class(&parameter.type_name)? {
                    queue.push_back((name, vec![owner.clone()]));
                }
            }
            if let Some(returns) = &function.returns {
                if let Some(name) = self.referenced_class(returns)? {
                    queue.push_back((name, vec![owner.clone()]));
                }
            }
        }

        for object in &self.catalog.objects {
            if let Some(name) = self.referenced_class(&object.type_name)? {
                queue.push_back((name, vec![object.name.clone()]));
            }
        }

        for import in &self.catalog.default_imports {
            let name = FqName::parse(import)?;
            if index.contains_key(&name) {
                queue.push_back((name, vec![]));
            }
        }

        let mut seen = BTreeSet::new();
        let mut reachable = BTreeSet::new();
        let mut unresolved = Vec::new();

        while let Some((name, chain)) = queue.pop_front() {
            if !seen.insert(name.clone()) {
                continue;
            }

            let Some(descriptor) = index.get(&name) else {
                unresolved.push(UnresolvedTypeReference {
                    name: name.to_string(),
                    chain,
                });
                continue;
            };

            for (member, type_text) in referenced_type_texts(descriptor) {
                if let Some(referenced) = self.referenced_class(type_text)? {
                    let mut next = chain.clone();
                    next.push(format!("{}.{}", name, member));
                    queue.push_back((referenced, next));
                }
            }

            for supertype in &descriptor.supertypes {
                let supertype = FqName::parse(supertype)?;
                if index.contains_key(&supertype) {
                    let mut next = chain.clone();
                    next.push(format!("{}: {}", name, supertype));
                    queue.push_back((supertype, next));
                }
            }

            reachable.insert(name);
        }

        if unresolved.is_empty() {
            Ok(reachable)
        } else {
            Err(SchemaBuildError::UnresolvedTypes(unresolved))
        }
    }

    /// Class named by a type text, looking through configure-lambda shapes
    fn referenced_class(&self, type_text: &str) -> Result<Option<FqName>, SchemaBuildError> {
        let text = self
            .configure_lambdas
            .configured_type(type_text)
            .unwrap_or(type_text);
        Ok(DataTypeRef::parse(text)?.class_name().cloned())
    }

    // =========================================================================
    // MATERIALISATION
    // =========================================================================

    /// The type and its catalog supertypes, nearest first
    fn lineage(&self, name: &FqName, index: &TypeIndex<'c>) -> Vec<&'c TypeDescriptor> {
        let mut lineage = Vec::new();
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::from([name.clone()]);

        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(descriptor) = index.get(&current) {
                lineage.push(*descriptor);
                for supertype in &descriptor.supertypes {
                    if let Ok(supertype) = FqName::parse(supertype) {
                        queue.push_back(supertype);
                    }
                }
            }
        }

        lineage
    }

    fn data_class(&self, name: &FqName, index: &TypeIndex<'c>) -> Result<DataClass, SchemaBuildError> {
        let lineage = self.lineage(name, index);

        let mut properties: Vec<DataProperty> = Vec::new();
        let mut functions: Vec<&FunctionDescriptor> = Vec::new();
        for descriptor in &lineage {
            for property in &descriptor.properties {
                if !properties.iter().any(|p| p.name == property.name) {
                    properties.push(data_property(property)?);
                }
            }
            for function in &descriptor.functions {
                // own members win over inherited ones with the same signature
                if !functions.iter().any(|f| same_signature(f, function)) {
                    functions.push(function);
                }
            }
        }

        let member_functions = functions
            .into_iter()
            .map(|f| self.member_function(name, f, index))
            .collect::<Result<Vec<_>, _>>()?;

        let mut constructors = Vec::new();
        if let Some(descriptor) = index.get(name) {
            for constructor in &descriptor.constructors {
                let owner = format!("{}.<init>", name);
                let parameters = constructor
                    .parameters
                    .iter()
                    .map(|p| self.parameter(&owner, p, Some(name), index))
                    .collect::<Result<Vec<_>, _>>()?;
                constructors.push(DataConstructor { parameters });
            }
        }

        let mut supertypes = BTreeSet::new();
        if let Some(descriptor) = index.get(name) {
            for supertype in &descriptor.supertypes {
                let supertype = FqName::parse(supertype)?;
                if index.contains_key(&supertype) {
                    supertypes.insert(supertype);
                }
            }
        }

        Ok(DataClass {
            name: name.clone(),
            supertypes,
            properties,
            member_functions,
            constructors,
        })
    }

    fn member_function(
        &self,
        receiver: &FqName,
        function: &FunctionDescriptor,
        index: &TypeIndex<'c>,
    ) -> Result<DataMemberFunction, SchemaBuildError> {
        let full_name = format!("{}.{}", receiver, function.name);
        let (value_parameters, configured) =
            self.split_configure_parameter(&full_name, &function.parameters)?;
        let returns = parse_optional(function.returns.as_deref())?;

        let semantics = match function.kind {
            FunctionKind::Pure => {
                if configured.is_some() {
                    return Err(invalid(&full_name, "pure functions cannot take a configure block"));
                }
                FunctionSemantics::Pure {
                    return_type: returns.unwrap_or(DataTypeRef::Unit),
                }
            }
            FunctionKind::Builder => {
                if configured.is_some() {
                    return Err(invalid(
                        &full_name,
                        "builder functions cannot take a configure block",
                    ));
                }
                // an inherited builder may declare the supertype it was written on
                let returns_lineage = |r: &DataTypeRef| {
                    r.class_name().map_or(false, |n| {
                        self.lineage(receiver, index).iter().any(|d| d.name == n.as_str())
                    })
                };
                let own = DataTypeRef::Name(receiver.clone());
                if matches!(&returns, Some(r) if !returns_lineage(r)) {
                    return Err(invalid(
                        &full_name,
                        "builder functions must return their receiver type",
                    ));
                }
                FunctionSemantics::Builder { return_type: own }
            }
            FunctionKind::Adding => {
                let element_type = returns.ok_or_else(|| {
                    invalid(&full_name, "adding functions must declare the element type they return")
                })?;
                if element_type.class_name().is_none() {
                    return Err(invalid(&full_name, "adding functions must return a class type"));
                }
                if matches!(&configured, Some(c) if *c != element_type) {
                    return Err(invalid(
                        &full_name,
                        "the configure block must configure the added element",
                    ));
                }
                FunctionSemantics::AddAndConfigure {
                    element_type,
                    accepts_configure_block: configured.is_some(),
                }
            }
            FunctionKind::Configuring => {
                let object_type = configured.ok_or_else(|| {
                    invalid(&full_name, "configuring functions require a configure block parameter")
                })?;

                let accessor = match &function.configures {
                    Some(property_name) => {
                        let property = self
                            .find_property(receiver, property_name, index)?
                            .ok_or_else(|| SchemaBuildError::UnknownProperty {
                                function: full_name.clone(),
                                owner: receiver.to_string(),
                                property: property_name.clone(),
                            })?;
                        if property.type_ref != object_type {
                            return Err(invalid(
                                &full_name,
                                "configured property type does not match the configure block",
                            ));
                        }
                        ConfigureAccessor::Property(property)
                    }
                    None => ConfigureAccessor::Custom {
                        object_type: object_type.clone(),
                        accessor_id: function.accessor.clone().unwrap_or_else(|| full_name.clone()),
                    },
                };

                let return_kind = match returns {
                    None | Some(DataTypeRef::Unit) => AccessReturnKind::Unit,
                    Some(r) if r == object_type => AccessReturnKind::ConfiguredObject,
                    Some(_) => {
                        return Err(invalid(
                            &full_name,
                            "configuring functions return Unit or the configured object",
                        ))
                    }
                };

                FunctionSemantics::AccessAndConfigure {
                    accessor,
                    return_kind,
                }
            }
        };

        let target = match &semantics {
            FunctionSemantics::AddAndConfigure { element_type, .. } => element_type.class_name(),
            FunctionSemantics::AccessAndConfigure { accessor, .. } => {
                accessor.object_type().class_name()
            }
            FunctionSemantics::Pure { .. } | FunctionSemantics::Builder { .. } => Some(receiver),
        };

        let parameters = value_parameters
            .iter()
            .map(|p| self.parameter(&full_name, p, target, index))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DataMemberFunction {
            receiver: receiver.clone(),
            name: function.name.clone(),
            parameters,
            semantics,
        })
    }

    /// Separate the trailing configure-block parameter, returning its
    /// configured type
    fn split_configure_parameter<'p>(
        &self,
        function: &str,
        parameters: &'p [ParameterDescriptor],
    ) -> Result<(Vec<&'p ParameterDescriptor>, Option<DataTypeRef>), SchemaBuildError> {
        let mut value_parameters = Vec::new();
        let mut configured = None;

        for (position, parameter) in parameters.iter().enumerate() {
            match self.configure_lambdas.configured_type(&parameter.type_name) {
                Some(type_text) => {
                    if configured.is_some() {
                        return Err(invalid(function, "more than one configure block parameter"));
                    }
                    if position + 1 != parameters.len() {
                        return Err(invalid(function, "the configure block parameter must be last"));
                    }
                    let type_ref = DataTypeRef::parse(type_text)?;
                    if type_ref.class_name().is_none() {
                        return Err(invalid(function, "a configure block must configure a class type"));
                    }
                    configured = Some(type_ref);
                }
                None => value_parameters.push(parameter),
            }
        }

        Ok((value_parameters, configured))
    }

    fn parameter(
        &self,
        function: &str,
        parameter: &ParameterDescriptor,
        target: Option<&FqName>,
        index: &TypeIndex<'c>,
    ) -> Result<DataParameter, SchemaBuildError> {
        let type_ref = DataTypeRef::parse(&parameter.type_name)?;

        let semantics = match &parameter.stores {
            None => ParameterSemantics::Unknown,
            Some(property_name) => {
                let unknown = || SchemaBuildError::UnknownProperty {
                    function: function.to_string(),
                    owner: target.map(|t| t.to_string()).unwrap_or_else(|| "<none>".to_string()),
                    property: property_name.clone(),
                };
                let owner = target.ok_or_else(unknown)?;
                let property = self
                    .find_property(owner, property_name, index)?
                    .ok_or_else(unknown)?;
                if property.type_ref != type_ref {
                    return Err(invalid(
                        function,
                        format!(
                            "parameter '{}' of type {} cannot be stored in '{}' of type {}",
                            parameter.name, type_ref, property.name, property.type_ref
                        ),
                    ));
                }
                ParameterSemantics::StoreValueInProperty(property)
            }
        };

        Ok(DataParameter {
            name: parameter.name.clone(),
            type_ref,
            is_default: parameter.default,
            semantics,
        })
    }

    fn find_property(
        &self,
        owner: &FqName,
        property: &str,
        index: &TypeIndex<'c>,
    ) -> Result<Option<DataProperty>, SchemaBuildError> {
        for descriptor in self.lineage(owner, index) {
            if let Some(found) = descriptor.properties.iter().find(|p| p.name == property) {
                return Ok(Some(data_property(found)?));
            }
        }
        Ok(None)
    }
}

fn data_property(property: &PropertyDescriptor) -> Result<DataProperty, SchemaBuildError> {
    Ok(DataProperty {
        name: property.name.clone(),
        type_ref: DataTypeRef::parse(&property.type_name)?,
        is_read_only: property.read_only,
        has_default: property.has_default,
    })
}

fn parse_optional(text: Option<&str>) -> Result<Option<DataTypeRef>, SchemaBuildError> {
    Ok(text.map(DataTypeRef::parse).transpose()?)
}

fn same_signature(a: &FunctionDescriptor, b: &FunctionDescriptor) -> bool {
    a.name == b.name
        && a.parameters.len() == b.parameters.len()
        && a.parameters
            .iter()
            .zip(&b.parameters)
            .all(|(x, y)| x.type_name == y.type_name)
}

/// Every `(member, type text)` pair a type descriptor mentions
fn referenced_type_texts(descriptor: &TypeDescriptor) -> Vec<(&str, &str)> {
    let mut texts = Vec::new();

    for property in &descriptor.properties {
        texts.push((property.name.as_str(), property.type_name.as_str()));
    }
    for function in &descriptor.functions {
        for parameter in &function.parameters {
            texts.push((function.name.as_str(), parameter.type_name.as_str()));
        }
        if let Some(returns) = &function.returns {
            texts.push((function.name.as_str(), returns.as_str()));
        }
    }
    for constructor in &descriptor.constructors {
        for parameter in &constructor.parameters {
            texts.push(("<init>", parameter.type_name.as_str()));
        }
    }

    texts
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog(yaml: &str) -> HostTypeCatalog {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn name(s: &str) -> FqName {
        FqName::parse(s).unwrap()
    }

    const PLUGINS: &str = r#"
types:
  - name: p.Top
    properties:
      - { name: plugins, type: p.PluginsBlock, read_only: true }
    functions:
      - name: plugins
        kind: configuring
        configures: plugins
        parameters:
          - { name: configure, type: "p.PluginsBlock.() -> Unit" }
  - name: p.PluginsBlock
    functions:
      - name: id
        kind: adding
        returns: p.PluginDefinition
        parameters:
          - { name: identifier, type: String, stores: id }
  - name: p.PluginDefinition
    properties:
      - { name: id, type: String, read_only: true }
      - { name: version, type: String }
    functions:
      - name: version
        kind: builder
        parameters:
          - { name: newValue, type: String, stores: version }
  - name: p.Unreachable
"#;

    #[test]
    fn test_build_plugins_schema() {
        let catalog = catalog(PLUGINS);
        let schema = SchemaBuilder::new(&catalog).build("p.Top").unwrap();

        assert_eq!(schema.top_level_receiver, name("p.Top"));
        let names: Vec<&str> = schema.data_classes.keys().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["p.PluginDefinition", "p.PluginsBlock", "p.Top"]);

        let top = schema.top_level_class().unwrap();
        let plugins = top.functions_named("plugins").next().unwrap();
        assert!(plugins.parameters.is_empty());
        match &plugins.semantics {
            FunctionSemantics::AccessAndConfigure {
                accessor: ConfigureAccessor::Property(property),
                return_kind: AccessReturnKind::Unit,
            } => assert_eq!(property.name, "plugins"),
            other => panic!("Expected property accessor, got {:?}", other),
        }

        let block = schema.data_class(&name("p.PluginsBlock")).unwrap();
        let id = block.functions_named("id").next().unwrap();
        assert_eq!(
            id.semantics,
            FunctionSemantics::AddAndConfigure {
                element_type: DataTypeRef::Name(name("p.PluginDefinition")),
                accepts_configure_block: false,
            }
        );
        match &id.parameters[0].semantics {
            ParameterSemantics::StoreValueInProperty(property) => {
                assert_eq!(property.name, "id");
                assert!(property.is_read_only);
            }
            other => panic!("Expected stored parameter, got {:?}", other),
        }

        let definition = schema.data_class(&name("p.PluginDefinition")).unwrap();
        let version = definition.functions_named("version").next().unwrap();
        assert_eq!(
            version.semantics,
            FunctionSemantics::Builder {
                return_type: DataTypeRef::Name(name("p.PluginDefinition"))
            }
        );
    }

    #[test]
    fn test_build_is_deterministic() {
        let catalog = catalog(PLUGINS);
        let first = SchemaBuilder::new(&catalog).build("p.Top").unwrap();
        let second = SchemaBuilder::new(&catalog).build("p.Top").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_all_unresolved_references_reported() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
    properties:
      - { name: first, type: a.Missing1 }
      - { name: nested, type: a.Nested }
  - name: a.Nested
    functions:
      - { name: f, kind: pure, returns: a.Missing2 }
"#,
        );
        let err = SchemaBuilder::new(&catalog).build("a.Top").unwrap_err();

        match err {
            SchemaBuildError::UnresolvedTypes(references) => {
                assert_eq!(
                    references,
                    vec![
                        UnresolvedTypeReference {
                            name: "a.Missing1".to_string(),
                            chain: vec!["a.Top.first".to_string()],
                        },
                        UnresolvedTypeReference {
                            name: "a.Missing2".to_string(),
                            chain: vec!["a.Top.nested".to_string(), "a.Nested.f".to_string()],
                        },
                    ]
                );
            }
            other => panic!("Expected unresolved types, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_root_reported() {
        let catalog = catalog("types: []");
        let err = SchemaBuilder::new(&catalog).build("a.Nope").unwrap_err();
        assert_eq!(err.to_string(), "unresolved type references: a.Nope (top-level receiver)");
    }

    #[test]
    fn test_supertype_members_flattened_own_wins() {
        let catalog = catalog(
            r#"
types:
  - name: a.Child
    supertypes: [a.Parent, external.NotInCatalog]
    properties:
      - { name: shared, type: Long }
  - name: a.Parent
    properties:
      - { name: shared, type: Int }
      - { name: inherited, type: String }
    functions:
      - { name: g, kind: pure, returns: Int }
"#,
        );
        let schema = SchemaBuilder::new(&catalog).build("a.Child").unwrap();
        let child = schema.data_class(&name("a.Child")).unwrap();

        assert_eq!(child.property("shared").unwrap().type_ref, DataTypeRef::LONG);
        assert_eq!(child.property("inherited").unwrap().type_ref, DataTypeRef::STRING);
        assert_eq!(child.functions_named("g").next().unwrap().receiver, name("a.Child"));
        assert_eq!(child.supertypes.iter().collect::<Vec<_>>(), vec![&name("a.Parent")]);
        assert!(schema.data_class(&name("a.Parent")).is_some());
    }

    #[test]
    fn test_action_interface_style() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
    functions:
      - name: c
        kind: adding
        returns: a.C
        parameters:
          - { name: configure, type: "Action<a.C>" }
  - name: a.C
"#,
        );
        let schema = SchemaBuilder::new(&catalog)
            .with_configure_lambdas(ConfigureLambdaStyle::ActionInterface)
            .build("a.Top")
            .unwrap();
        let c = schema.top_level_class().unwrap().functions_named("c").next().unwrap();
        assert!(c.parameters.is_empty());
        assert_eq!(c.semantics.configured_type(), Some(&DataTypeRef::Name(name("a.C"))));

        // the receiver-function style does not recognise the parameter
        assert!(SchemaBuilder::new(&catalog).build("a.Top").is_err());
    }

    #[test]
    fn test_configure_block_on_pure_rejected() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
    functions:
      - name: f
        kind: pure
        parameters:
          - { name: configure, type: "a.Top.() -> Unit" }
"#,
        );
        let err = SchemaBuilder::new(&catalog).build("a.Top").unwrap_err();
        assert!(matches!(err, SchemaBuildError::InvalidFunction { ref function, .. } if function == "a.Top.f"));
    }

    #[test]
    fn test_misplaced_configure_parameter_rejected() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
    functions:
      - name: c
        kind: adding
        returns: a.Top
        parameters:
          - { name: configure, type: "a.Top.() -> Unit" }
          - { name: x, type: Int }
"#,
        );
        let err = SchemaBuilder::new(&catalog).build("a.Top").unwrap_err();
        assert_eq!(
            err.to_string(),
            "function 'a.Top.c': the configure block parameter must be last"
        );
    }

    #[test]
    fn test_builder_returning_foreign_type_rejected() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
    functions:
      - { name: b, kind: builder, returns: a.Other }
  - name: a.Other
"#,
        );
        assert!(matches!(
            SchemaBuilder::new(&catalog).build("a.Top"),
            Err(SchemaBuildError::InvalidFunction { .. })
        ));
    }

    #[test]
    fn test_inherited_builder_returns_subtype() {
        let catalog = catalog(
            r#"
types:
  - name: a.Parent
    properties:
      - { name: version, type: String }
    functions:
      - name: version
        kind: builder
        returns: a.Parent
        parameters:
          - { name: newValue, type: String, stores: version }
  - name: a.Child
    supertypes: [a.Parent]
"#,
        );
        assert!(SchemaBuilder::new(&catalog).build("a.Parent").is_ok());

        let schema = SchemaBuilder::new(&catalog).build("a.Child").unwrap();
        let child = schema.data_class(&name("a.Child")).unwrap();
        let version = child.functions_named("version").next().unwrap();
        assert_eq!(
            version.semantics,
            FunctionSemantics::Builder {
                return_type: DataTypeRef::Name(name("a.Child")),
            }
        );
    }

    #[test]
    fn test_adding_non_class_rejected() {
        let catalog = catalog(
            "types:\n  - name: a.Top\n    functions:\n      - { name: n, kind: adding, returns: Int }\n",
        );
        let err = SchemaBuilder::new(&catalog).build("a.Top").unwrap_err();
        assert!(err.to_string().contains("must return a class type"));
    }

    #[test]
    fn test_unknown_stored_property_rejected() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
    functions:
      - name: set
        kind: builder
        parameters:
          - { name: v, type: Int, stores: missing }
"#,
        );
        let err = SchemaBuilder::new(&catalog).build("a.Top").unwrap_err();
        assert_eq!(
            err,
            SchemaBuildError::UnknownProperty {
                function: "a.Top.set".to_string(),
                owner: "a.Top".to_string(),
                property: "missing".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let catalog = catalog("types:\n  - name: a.Top\n  - name: a.Top\n");
        assert_eq!(
            SchemaBuilder::new(&catalog).build("a.Top").unwrap_err(),
            SchemaBuildError::DuplicateType("a.Top".to_string())
        );
    }

    #[test]
    fn test_external_functions_objects_and_default_imports() {
        let catalog = catalog(
            r#"
types:
  - name: a.Top
functions:
  - package: a
    name: newD
    returns: a.D
    parameters:
      - { name: id, type: String }
objects:
  - { name: a.Defaults, type: a.D }
types_extra: ignored
default_imports: [a.newD, a.Defaults]
"#,
        );
        let mut catalog = catalog;
        catalog.types.push(TypeDescriptor {
            name: "a.D".to_string(),
            supertypes: vec![],
            properties: vec![],
            functions: vec![],
            constructors: vec![],
        });

        let schema = SchemaBuilder::new(&catalog).build("a.Top").unwrap();
        let new_d = &schema.external_functions[&name("a.newD")];
        assert_eq!(new_d.semantics.return_type(), DataTypeRef::Name(name("a.D")));
        assert_eq!(schema.external_objects[&name("a.Defaults")], DataTypeRef::Name(name("a.D")));
        assert!(schema.default_imports.contains(&name("a.newD")));
        assert!(schema.data_class(&name("a.D")).is_some());
    }

    #[test]
    fn test_unknown_default_import_rejected() {
        let catalog = catalog("types:\n  - name: a.Top\ndefault_imports: [a.nothing]\n");
        assert_eq!(
            SchemaBuilder::new(&catalog).build("a.Top").unwrap_err(),
            SchemaBuildError::UnknownDefaultImport("a.nothing".to_string())
        );
    }
}
