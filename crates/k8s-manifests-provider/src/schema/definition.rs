//! Declarative resource definitions.
//!
//! Every data source is described by a small YAML document which is compiled into a
//! [`ResourceSchema`]. Defaults are checked against their field while compiling, so a broken
//! definition fails when the catalog is built instead of on every read. Constraints are written
//! as singleton maps:
//!
//! ```yaml
//! group: app.terraform.io
//! version: v1alpha2
//! kind: Module
//! spec:
//!   required: true
//!   fields:
//!     - name: workspace
//!       type: object
//!       fields:
//!         - name: id
//!           type: string
//!           constraints:
//!             - pattern: ^ws-[a-zA-Z0-9]+$
//! ```
use k8s_manifests_shared::yaml;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu, ensure};

use crate::{
    materialize::FieldPath,
    schema::{
        self, FieldSpec, FieldType, IdentifierAttribute, Requiredness, ResourceSchema, Scope,
        constraint::{Constraint, Format, Pattern},
    },
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse resource definition"))]
    Parse { source: yaml::Error },

    #[snafu(display("field {path} has an invalid pattern"))]
    InvalidPattern { source: regex::Error, path: FieldPath },

    #[snafu(display("list field {path} does not declare the type of its items"))]
    MissingListItems { path: FieldPath },

    #[snafu(display("object field {path} does not declare any fields"))]
    EmptyObject { path: FieldPath },

    #[snafu(display("field {path} of type {type_name} cannot declare nested fields or items"))]
    UnexpectedChildren { path: FieldPath, type_name: TypeName },

    #[snafu(display("field {path} can only be one of required, computed or defaulted"))]
    ConflictingRequiredness { path: FieldPath },

    #[snafu(display("invalid {kind} definition"))]
    Build { source: schema::Error, kind: String },
}

/// The top-level document describing one resource kind.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ResourceDefinition {
    /// API group, empty for the core group.
    #[serde(default)]
    pub group: String,
    pub version: String,
    pub kind: String,

    #[serde(default)]
    pub scope: Scope,

    #[serde(default)]
    pub identifier: IdentifierAttribute,

    #[serde(default)]
    pub description: String,

    pub spec: Option<SpecDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpecDefinition {
    #[serde(default)]
    pub required: bool,
    pub fields: Vec<FieldDefinition>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FieldDefinition {
    /// The snake_case attribute name.
    pub name: String,

    /// Overrides the camelCase manifest key derived from the name.
    pub wire_name: Option<String>,

    #[serde(rename = "type")]
    pub type_name: TypeName,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub computed: bool,

    pub default: Option<serde_json::Value>,

    #[serde(default)]
    pub constraints: Vec<ConstraintDefinition>,

    /// Nested fields of an `object`.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    /// Element type of a `list`.
    pub items: Option<Box<ItemsDefinition>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ItemsDefinition {
    #[serde(rename = "type")]
    pub type_name: TypeName,

    #[serde(default)]
    pub fields: Vec<FieldDefinition>,

    pub items: Option<Box<ItemsDefinition>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TypeName {
    String,
    Bool,
    Int64,
    Float64,
    Map,
    List,
    Object,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintDefinition {
    Pattern(String),
    MinLength(usize),
    MaxLength(usize),
    AtLeast(i64),
    AtMost(i64),
    OneOf(Vec<String>),
    Format(Format),
    MinItems(usize),
    MaxItems(usize),
    Keys(Vec<ConstraintDefinition>),
    Values(Vec<ConstraintDefinition>),
    Items(Vec<ConstraintDefinition>),
}

impl ResourceDefinition {
    pub fn from_yaml(input: &str) -> Result<Self> {
        yaml::deserialize_singleton_maps(input).context(ParseSnafu)
    }

    pub fn compile(self) -> Result<ResourceSchema> {
        let mut builder = ResourceSchema::builder(self.group, self.version, &self.kind)
            .scope(self.scope)
            .identifier(self.identifier)
            .description(self.description);

        if let Some(spec) = self.spec {
            let path = FieldPath::default().join(schema::SPEC);
            let fields = compile_fields(spec.fields, &path)?;
            let requiredness = if spec.required {
                Requiredness::Required
            } else {
                Requiredness::Optional
            };
            builder = builder.spec(fields, requiredness);
        }

        builder.build().context(BuildSnafu { kind: self.kind })
    }
}

fn compile_fields(fields: Vec<FieldDefinition>, parent: &FieldPath) -> Result<Vec<FieldSpec>> {
    fields
        .into_iter()
        .map(|field| field.compile(parent))
        .collect()
}

impl FieldDefinition {
    fn compile(self, parent: &FieldPath) -> Result<FieldSpec> {
        let path = parent.join(&self.name);

        let requiredness = match (self.required, self.computed, self.default) {
            (false, false, None) => Requiredness::Optional,
            (true, false, None) => Requiredness::Required,
            (false, true, None) => Requiredness::Computed,
            (false, false, Some(default)) => Requiredness::Defaulted(default),
            _ => return ConflictingRequirednessSnafu { path }.fail(),
        };

        let field_type = compile_type(self.type_name, self.fields, self.items, &path)?;
        let constraints = self
            .constraints
            .into_iter()
            .map(|constraint| constraint.compile(&path))
            .collect::<Result<Vec<_>>>()?;

        let mut field = FieldSpec::new(self.name, field_type)
            .with_requiredness(requiredness)
            .with_description(self.description);
        if let Some(wire_name) = self.wire_name {
            field = field.with_wire_name(wire_name);
        }

        Ok(constraints
            .into_iter()
            .fold(field, FieldSpec::with_constraint))
    }
}

fn compile_type(
    type_name: TypeName,
    fields: Vec<FieldDefinition>,
    items: Option<Box<ItemsDefinition>>,
    path: &FieldPath,
) -> Result<FieldType> {
    let leaf = match type_name {
        TypeName::Object => {
            ensure!(
                items.is_none(),
                UnexpectedChildrenSnafu {
                    path: path.clone(),
                    type_name
                }
            );
            ensure!(!fields.is_empty(), EmptyObjectSnafu { path: path.clone() });
            return Ok(FieldType::Object(compile_fields(fields, path)?));
        }
        TypeName::List => {
            ensure!(
                fields.is_empty(),
                UnexpectedChildrenSnafu {
                    path: path.clone(),
                    type_name
                }
            );
            let items = items.context(MissingListItemsSnafu { path: path.clone() })?;
            let element = compile_type(items.type_name, items.fields, items.items, path)?;
            return Ok(FieldType::List(Box::new(element)));
        }
        TypeName::String => FieldType::String,
        TypeName::Bool => FieldType::Bool,
        TypeName::Int64 => FieldType::Int64,
        TypeName::Float64 => FieldType::Float64,
        TypeName::Map => FieldType::Map,
    };

    ensure!(
        fields.is_empty() && items.is_none(),
        UnexpectedChildrenSnafu {
            path: path.clone(),
            type_name
        }
    );
    Ok(leaf)
}

impl ConstraintDefinition {
    fn compile(self, path: &FieldPath) -> Result<Constraint> {
        let compile_all = |constraints: Vec<Self>| {
            constraints
                .into_iter()
                .map(|constraint| constraint.compile(path))
                .collect::<Result<Vec<_>>>()
        };

        Ok(match self {
            Self::Pattern(pattern) => Constraint::Pattern(
                Pattern::new(&pattern).context(InvalidPatternSnafu { path: path.clone() })?,
            ),
            Self::MinLength(min) => Constraint::MinLength(min),
            Self::MaxLength(max) => Constraint::MaxLength(max),
            Self::AtLeast(min) => Constraint::AtLeast(min),
            Self::AtMost(max) => Constraint::AtMost(max),
            Self::OneOf(allowed) => Constraint::OneOf(allowed),
            Self::Format(format) => Constraint::Format(format),
            Self::MinItems(min) => Constraint::MinItems(min),
            Self::MaxItems(max) => Constraint::MaxItems(max),
            Self::Keys(constraints) => Constraint::Keys(compile_all(constraints)?),
            Self::Values(constraints) => Constraint::Values(compile_all(constraints)?),
            Self::Items(constraints) => Constraint::Items(compile_all(constraints)?),
        })
    }
}
