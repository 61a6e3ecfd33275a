//! The configuration surface of a single Kubernetes resource kind.
//!
//! A [`ResourceSchema`] is an ordered tree of [`FieldSpec`]s together with the constants that
//! get injected into every manifest (`apiVersion` and `kind`). Schemas are plain data: they
//! are usually compiled from a declarative [`definition`] and then shared read-only by every
//! read of the data source.
use std::{collections::BTreeSet, fmt::Display};

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu, ensure};

use crate::{
    materialize::{Decoder, Diagnostics, FieldPath, Validator},
    schema::constraint::{Constraint, Format},
};

pub mod constraint;
pub mod definition;

/// Attribute holding the computed `namespace/name` or `name` identifier.
pub const ID: &str = "id";
/// Attribute holding the rendered manifest.
pub const YAML: &str = "yaml";
pub const METADATA: &str = "metadata";
pub const SPEC: &str = "spec";

pub const NAME: &str = "name";
pub const NAMESPACE: &str = "namespace";
pub const LABELS: &str = "labels";
pub const ANNOTATIONS: &str = "annotations";

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Error {
    #[snafu(display("field {path} is declared more than once"))]
    DuplicateField { path: FieldPath },

    #[snafu(display("field {path} uses the manifest key {wire_name:?} more than once"))]
    DuplicateWireName { path: FieldPath, wire_name: String },

    #[snafu(display(
        "constraint {constraint} cannot be applied to field {path} of type {field_type}"
    ))]
    InapplicableConstraint {
        path: FieldPath,
        constraint: String,
        field_type: String,
    },

    #[snafu(display("field {path} has an invalid default value"))]
    InvalidDefault { source: Diagnostics, path: FieldPath },
}

/// Whether a resource's identity requires a namespace in addition to its name.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
pub enum Scope {
    #[default]
    Namespaced,
    Cluster,
}

/// Whether the data source exposes the computed `id` attribute.
///
/// This is an explicit property of every schema rather than something derived from the scope,
/// both namespaced and cluster scoped kinds can go either way.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IdentifierAttribute {
    #[default]
    Exposed,
    Omitted,
}

/// The type of a single field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldType {
    String,
    Bool,
    Int64,
    Float64,

    /// A map of strings to strings, such as labels.
    Map,

    /// A list of elements of the given type.
    List(Box<FieldType>),

    /// A nested object with its own ordered set of fields.
    Object(Vec<FieldSpec>),
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Bool => f.write_str("bool"),
            Self::Int64 => f.write_str("int64"),
            Self::Float64 => f.write_str("float64"),
            Self::Map => f.write_str("map of string"),
            Self::List(element) => write!(f, "list of {element}"),
            Self::Object(_) => f.write_str("object"),
        }
    }
}

/// Who provides the value of a field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Requiredness {
    /// The caller must provide a value.
    Required,

    /// The caller may provide a value, the field is omitted from the manifest otherwise.
    #[default]
    Optional,

    /// The caller may provide a value, the given default is used otherwise.
    Defaulted(serde_json::Value),

    /// The provider computes the value, the caller must not provide one.
    Computed,
}

/// A single named field of a [`ResourceSchema`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    name: String,
    wire_name: String,
    description: String,
    field_type: FieldType,
    requiredness: Requiredness,
    constraints: Vec<Constraint>,
}

impl FieldSpec {
    /// Creates an optional field. The manifest key defaults to the camelCase form of `name`.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            wire_name: name.to_case(Case::Camel),
            name,
            description: String::new(),
            field_type,
            requiredness: Requiredness::Optional,
            constraints: Vec::new(),
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::String)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Bool)
    }

    pub fn int64(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Int64)
    }

    pub fn map(name: impl Into<String>) -> Self {
        Self::new(name, FieldType::Map)
    }

    pub fn object(name: impl Into<String>, fields: Vec<Self>) -> Self {
        Self::new(name, FieldType::Object(fields))
    }

    pub fn list_of(name: impl Into<String>, element: FieldType) -> Self {
        Self::new(name, FieldType::List(Box::new(element)))
    }

    pub fn required(self) -> Self {
        self.with_requiredness(Requiredness::Required)
    }

    pub fn computed(self) -> Self {
        self.with_requiredness(Requiredness::Computed)
    }

    pub fn with_default(self, default: serde_json::Value) -> Self {
        self.with_requiredness(Requiredness::Defaulted(default))
    }

    pub fn with_requiredness(mut self, requiredness: Requiredness) -> Self {
        self.requiredness = requiredness;
        self
    }

    pub fn with_wire_name(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = wire_name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// The attribute name used by the configuration engine, e.g. `secret_key_ref`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The key used in the rendered manifest, e.g. `secretKeyRef`.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    pub fn requiredness(&self) -> &Requiredness {
        &self.requiredness
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn is_computed(&self) -> bool {
        self.requiredness == Requiredness::Computed
    }

    /// Nested fields of objects and lists of objects.
    pub fn children(&self) -> &[Self] {
        match &self.field_type {
            FieldType::Object(fields) => fields,
            FieldType::List(element) => match element.as_ref() {
                FieldType::Object(fields) => fields,
                _ => &[],
            },
            _ => &[],
        }
    }
}

/// The declared shape of one Kubernetes resource kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSchema {
    group: String,
    version: String,
    kind: String,
    scope: Scope,
    identifier: IdentifierAttribute,
    description: String,
    fields: Vec<FieldSpec>,
}

impl ResourceSchema {
    pub fn builder(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> ResourceSchemaBuilder {
        ResourceSchemaBuilder {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
            scope: Scope::default(),
            identifier: IdentifierAttribute::default(),
            description: String::new(),
            spec: None,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn identifier(&self) -> IdentifierAttribute {
        self.identifier
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// All top-level attributes, including the computed ones.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The `apiVersion` injected into every manifest. The core group has no prefix.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// The name the configuration engine refers to this data source by, e.g.
    /// `k8s_app_terraform_io_module_v1alpha2_manifest`.
    pub fn data_source_name(&self) -> String {
        let group = self.group.replace(['.', '-'], "_");
        let kind = self.kind.to_lowercase();

        ["k8s", &group, &kind, &self.version, "manifest"]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
    }
}

pub struct ResourceSchemaBuilder {
    group: String,
    version: String,
    kind: String,
    scope: Scope,
    identifier: IdentifierAttribute,
    description: String,
    spec: Option<FieldSpec>,
}

impl ResourceSchemaBuilder {
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn identifier(mut self, identifier: IdentifierAttribute) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declares the `spec` object of the resource.
    pub fn spec(mut self, fields: Vec<FieldSpec>, requiredness: Requiredness) -> Self {
        self.spec = Some(FieldSpec::object(SPEC, fields).with_requiredness(requiredness));
        self
    }

    pub fn build(self) -> Result<ResourceSchema> {
        let mut fields = Vec::new();

        if self.identifier == IdentifierAttribute::Exposed {
            let description = match self.scope {
                Scope::Namespaced => "Contains the value 'metadata.namespace/metadata.name'.",
                Scope::Cluster => "Contains the value 'metadata.name'.",
            };
            fields.push(FieldSpec::string(ID).computed().with_description(description));
        }
        fields.push(
            FieldSpec::string(YAML)
                .computed()
                .with_description("The generated manifest in YAML format."),
        );
        fields.push(metadata_field(self.scope));
        fields.extend(self.spec);

        check_fields(&fields, &Validator::root())?;

        Ok(ResourceSchema {
            group: self.group,
            version: self.version,
            kind: self.kind,
            scope: self.scope,
            identifier: self.identifier,
            description: self.description,
            fields,
        })
    }
}

const NAME_DESCRIPTION: &str = "Unique identifier for this object within its namespace, or within the cluster for cluster scoped kinds.";
const LABELS_DESCRIPTION: &str = "Map of string keys and values that can be used to organize and categorize (scope and select) objects.";
const ANNOTATIONS_DESCRIPTION: &str = "Unstructured key value map stored with a resource that may be set by external tools to store and retrieve arbitrary metadata.";

/// The `metadata` block every manifest carries.
fn metadata_field(scope: Scope) -> FieldSpec {
    let mut fields = vec![
        FieldSpec::string(NAME)
            .required()
            .with_description(NAME_DESCRIPTION)
            .with_constraint(Constraint::MinLength(1))
            .with_constraint(Constraint::Format(Format::DnsSubdomain)),
    ];

    if scope == Scope::Namespaced {
        fields.push(
            FieldSpec::string(NAMESPACE)
                .required()
                .with_description("The namespace this object lives in.")
                .with_constraint(Constraint::MinLength(1))
                .with_constraint(Constraint::Format(Format::DnsLabel)),
        );
    }

    fields.push(
        FieldSpec::map(LABELS)
            .with_description(LABELS_DESCRIPTION)
            .with_constraint(Constraint::Keys(vec![Constraint::Format(
                Format::QualifiedName,
            )]))
            .with_constraint(Constraint::Values(vec![Constraint::Format(
                Format::LabelValue,
            )])),
    );
    fields.push(
        FieldSpec::map(ANNOTATIONS)
            .with_description(ANNOTATIONS_DESCRIPTION)
            .with_constraint(Constraint::Keys(vec![Constraint::Format(
                Format::QualifiedName,
            )])),
    );

    FieldSpec::object(METADATA, fields)
        .required()
        .with_description("Data that helps uniquely identify the object.")
}

/// Checks a level of the field tree (and everything below it) for duplicate names, for
/// constraints that do not fit the type of their field and for defaults the field would reject.
fn check_fields(fields: &[FieldSpec], parent: &Validator) -> Result<()> {
    let mut names = BTreeSet::new();
    let mut wire_names = BTreeSet::new();

    for field in fields {
        let validator = parent.field(field.name());
        let path = validator.path();

        ensure!(
            names.insert(field.name()),
            DuplicateFieldSnafu { path: path.clone() }
        );
        ensure!(
            wire_names.insert(field.wire_name()),
            DuplicateWireNameSnafu {
                path: path.clone(),
                wire_name: field.wire_name()
            }
        );

        for constraint in field.constraints() {
            ensure!(
                constraint.applies_to(field.field_type()),
                InapplicableConstraintSnafu {
                    path: path.clone(),
                    constraint: constraint.to_string(),
                    field_type: field.field_type().to_string(),
                }
            );
        }

        if let Requiredness::Defaulted(default) = field.requiredness() {
            Decoder::default()
                .check_default(field, default, &validator)
                .context(InvalidDefaultSnafu { path })?;
        }

        check_fields(field.children(), &validator)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn module_schema() -> ResourceSchemaBuilder {
        ResourceSchema::builder("app.terraform.io", "v1alpha2", "Module").spec(
            vec![FieldSpec::string("organization").required()],
            Requiredness::Required,
        )
    }

    #[rstest]
    #[case(
        "app.terraform.io",
        "v1alpha2",
        "Module",
        "app.terraform.io/v1alpha2",
        "k8s_app_terraform_io_module_v1alpha2_manifest"
    )]
    #[case(
        "operator.openshift.io",
        "v1",
        "Config",
        "operator.openshift.io/v1",
        "k8s_operator_openshift_io_config_v1_manifest"
    )]
    #[case("", "v1", "ConfigMap", "v1", "k8s_configmap_v1_manifest")]
    #[case(
        "cert-manager.io",
        "v1",
        "Issuer",
        "cert-manager.io/v1",
        "k8s_cert_manager_io_issuer_v1_manifest"
    )]
    fn names(
        #[case] group: &str,
        #[case] version: &str,
        #[case] kind: &str,
        #[case] api_version: &str,
        #[case] data_source_name: &str,
    ) {
        let schema = ResourceSchema::builder(group, version, kind)
            .build()
            .expect("schema without spec is valid");

        assert_eq!(schema.api_version(), api_version);
        assert_eq!(schema.data_source_name(), data_source_name);
    }

    #[test]
    fn builder_declares_standard_attributes() {
        let schema = module_schema().build().expect("schema is valid");

        let names = schema
            .fields()
            .iter()
            .map(FieldSpec::name)
            .collect::<Vec<_>>();
        assert_eq!(names, [ID, YAML, METADATA, SPEC]);

        assert!(schema.field(ID).expect("id is declared").is_computed());
        assert!(schema.field(YAML).expect("yaml is declared").is_computed());

        let metadata = schema.field(METADATA).expect("metadata is declared");
        let metadata_names = metadata
            .children()
            .iter()
            .map(FieldSpec::name)
            .collect::<Vec<_>>();
        assert_eq!(metadata_names, [NAME, NAMESPACE, LABELS, ANNOTATIONS]);

        let name = &metadata.children()[0];
        assert_eq!(name.requiredness(), &Requiredness::Required);
        assert!(name.constraints().contains(&Constraint::MinLength(1)));
    }

    #[test]
    fn cluster_scoped_schema_has_no_namespace() {
        let schema = module_schema()
            .scope(Scope::Cluster)
            .identifier(IdentifierAttribute::Omitted)
            .build()
            .expect("schema is valid");

        assert!(schema.field(ID).is_none());

        let metadata = schema.field(METADATA).expect("metadata is declared");
        assert!(
            metadata
                .children()
                .iter()
                .all(|field| field.name() != NAMESPACE)
        );
    }

    #[test]
    fn wire_names_default_to_camel_case() {
        let field = FieldSpec::string("secret_key_ref");
        assert_eq!(field.wire_name(), "secretKeyRef");

        let field = FieldSpec::string("positive_ttl").with_wire_name("positiveTTL");
        assert_eq!(field.wire_name(), "positiveTTL");
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let err = ResourceSchema::builder("example.com", "v1", "Thing")
            .spec(
                vec![
                    FieldSpec::object(
                        "nested",
                        vec![FieldSpec::string("value"), FieldSpec::bool("value")],
                    ),
                ],
                Requiredness::Optional,
            )
            .build()
            .expect_err("duplicate field is rejected");

        assert_eq!(err.to_string(), "field spec.nested.value is declared more than once");
    }

    #[test]
    fn inapplicable_constraints_are_rejected() {
        let err = ResourceSchema::builder("example.com", "v1", "Thing")
            .spec(
                vec![FieldSpec::bool("enabled").with_constraint(Constraint::MinLength(1))],
                Requiredness::Optional,
            )
            .build()
            .expect_err("length constraint on a bool is rejected");

        assert!(matches!(err, Error::InapplicableConstraint { .. }));
    }

    #[rstest]
    #[case::wrong_type(
        FieldSpec::int64("port").with_default(serde_json::json!("53")),
        "field spec.upstream.port must be of type int64, got string"
    )]
    #[case::violates_constraint(
        FieldSpec::int64("port")
            .with_default(serde_json::json!(0))
            .with_constraint(Constraint::AtLeast(1)),
        "invalid value for field spec.upstream.port: value 0 is less than the minimum of 1"
    )]
    fn invalid_defaults_are_rejected(#[case] port: FieldSpec, #[case] diagnostic: &str) {
        let err = ResourceSchema::builder("operator.openshift.io", "v1", "DNS")
            .spec(
                vec![FieldSpec::object("upstream", vec![port])],
                Requiredness::Optional,
            )
            .build()
            .expect_err("default is rejected");

        assert_eq!(
            err.to_string(),
            "field spec.upstream.port has an invalid default value"
        );
        assert!(matches!(
            &err,
            Error::InvalidDefault { source, .. } if source.to_string() == diagnostic
        ));
    }

    #[test]
    fn valid_defaults_are_accepted() {
        let schema = ResourceSchema::builder("operator.openshift.io", "v1", "DNS")
            .spec(
                vec![
                    FieldSpec::int64("port")
                        .with_default(serde_json::json!(53))
                        .with_constraint(Constraint::AtLeast(1)),
                ],
                Requiredness::Optional,
            )
            .build()
            .expect("default is valid");

        assert!(schema.field(SPEC).is_some());
    }
}
