//! Turns raw configuration into a finished manifest.
//!
//! [`Materializer::decode`] walks the [`ResourceSchema`] depth-first and collects every
//! [`Diagnostic`] it comes across instead of stopping at the first one. Only a configuration
//! without any diagnostics is turned into a [`MaterializedDocument`].
use serde::{Serialize, ser::SerializeMap};
use tracing::{debug, instrument};

use crate::{
    config::FieldPolicy,
    schema::{
        FieldSpec, FieldType, IdentifierAttribute, METADATA, NAME, NAMESPACE, Requiredness,
        ResourceSchema, Scope,
    },
    value::{Node, Object, Presence, Rewritten, keep},
};

pub mod validator;

pub use validator::{Diagnostic, Diagnostics, FieldPath, Validator};

/// Top-level keys the constants injected into every manifest might be given as. They are
/// ignored, the schema always wins.
const INJECTED_KEYS: &[&str] = &["api_version", "apiVersion", "kind"];

/// A configuration that was successfully decoded against its schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigInstance {
    root: Object,
}

impl ConfigInstance {
    pub fn root(&self) -> &Object {
        &self.root
    }

    pub fn metadata(&self) -> Option<&Object> {
        self.root.get_object(METADATA)
    }
}

/// The manifest produced by a single read.
///
/// Serializes as `apiVersion`, `kind` and then every non-computed top-level field in
/// declaration order.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterializedDocument {
    api_version: String,
    kind: String,
    body: Object,
    identifier: Option<String>,
}

impl MaterializedDocument {
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn body(&self) -> &Object {
        &self.body
    }

    /// The computed `namespace/name` or `name`, if the schema exposes it.
    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }
}

impl Serialize for MaterializedDocument {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Rewritten::new(self, &keep).serialize(serializer)
    }
}

impl Serialize for Rewritten<'_, MaterializedDocument> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let document = self.value();
        let present = document
            .body
            .iter()
            .filter_map(|(_, member)| Some((member.wire_name(), member.value().present()?)))
            .collect::<Vec<_>>();

        let mut map = serializer.serialize_map(Some(present.len() + 2))?;
        map.serialize_entry("apiVersion", &self.string(&document.api_version))?;
        map.serialize_entry("kind", &self.string(&document.kind))?;
        for (wire_name, node) in present {
            map.serialize_entry(wire_name, &self.nested(node))?;
        }
        map.end()
    }
}

/// Decodes configurations for one [`ResourceSchema`].
///
/// The schema is only borrowed, any number of materializers can share it across threads.
#[derive(Clone, Copy, Debug)]
pub struct Materializer<'a> {
    schema: &'a ResourceSchema,
    decoder: Decoder,
}

impl<'a> Materializer<'a> {
    pub fn new(schema: &'a ResourceSchema) -> Self {
        Self {
            schema,
            decoder: Decoder::default(),
        }
    }

    /// What to do with values given for computed fields.
    pub fn computed_fields(mut self, policy: FieldPolicy) -> Self {
        self.decoder.computed_fields = policy;
        self
    }

    /// What to do with keys the schema does not declare.
    pub fn unknown_fields(mut self, policy: FieldPolicy) -> Self {
        self.decoder.unknown_fields = policy;
        self
    }

    pub fn schema(&self) -> &'a ResourceSchema {
        self.schema
    }

    /// Decodes and validates `raw` against the schema, reporting every problem at once.
    #[instrument(skip_all, fields(kind = self.schema.kind()))]
    pub fn decode(&self, raw: &serde_json::Value) -> Result<ConfigInstance, Diagnostics> {
        let mut diagnostics = Diagnostics::default();
        let root = Validator::root();

        let Some(map) = raw.as_object() else {
            diagnostics.push(root.unexpected_type("object", json_type_name(raw)));
            return Err(diagnostics);
        };

        let root = self
            .decoder
            .decode_members(self.schema.fields(), map, &root, true, &mut diagnostics);
        debug!(diagnostics = diagnostics.len(), "decoded configuration");

        diagnostics.into_result(ConfigInstance { root })
    }

    /// Builds the manifest for an already decoded configuration.
    pub fn document(&self, instance: &ConfigInstance) -> MaterializedDocument {
        let mut body = Object::default();
        for field in self.schema.fields().iter().filter(|f| !f.is_computed()) {
            if let Some(member) = instance.root.member(field.name()) {
                body.insert(field.name(), member.wire_name(), member.value().clone());
            }
        }

        MaterializedDocument {
            api_version: self.schema.api_version(),
            kind: self.schema.kind().to_owned(),
            body,
            identifier: self.identifier(instance),
        }
    }

    /// Decodes `raw` and builds its manifest.
    pub fn materialize(
        &self,
        raw: &serde_json::Value,
    ) -> Result<(ConfigInstance, MaterializedDocument), Diagnostics> {
        let instance = self.decode(raw)?;
        let document = self.document(&instance);
        Ok((instance, document))
    }

    /// `namespace/name` for namespaced kinds, `name` for cluster scoped kinds, both verbatim.
    fn identifier(&self, instance: &ConfigInstance) -> Option<String> {
        if self.schema.identifier() == IdentifierAttribute::Omitted {
            return None;
        }

        let metadata = instance.metadata()?;
        let name = metadata.get_str(NAME)?;

        match self.schema.scope() {
            Scope::Namespaced => {
                let namespace = metadata.get_str(NAMESPACE)?;
                Some(format!("{namespace}/{name}"))
            }
            Scope::Cluster => Some(name.to_owned()),
        }
    }
}

/// Decodes values against field specs, independent of any particular schema.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Decoder {
    computed_fields: FieldPolicy,
    unknown_fields: FieldPolicy,
}

impl Decoder {
    /// Decodes `default` like a value given for `field`, reporting every problem with it.
    pub(crate) fn check_default(
        &self,
        field: &FieldSpec,
        default: &serde_json::Value,
        validator: &Validator,
    ) -> Result<(), Diagnostics> {
        let mut diagnostics = Diagnostics::default();
        self.decode_value(field, default, validator, &mut diagnostics);
        diagnostics.into_result(())
    }

    fn decode_members(
        &self,
        fields: &[FieldSpec],
        map: &serde_json::Map<String, serde_json::Value>,
        validator: &Validator,
        is_root: bool,
        diagnostics: &mut Diagnostics,
    ) -> Object {
        let mut object = Object::default();

        for field in fields {
            let raw = map.get(field.name()).filter(|raw| !raw.is_null());
            let presence =
                self.decode_field(field, raw, &validator.field(field.name()), diagnostics);
            object.insert(field.name(), field.wire_name(), presence);
        }

        for key in map.keys() {
            if fields.iter().any(|field| field.name() == key) {
                continue;
            }
            if is_root && INJECTED_KEYS.contains(&key.as_str()) {
                debug!(key = %key, "ignoring value for injected constant");
                continue;
            }
            match self.unknown_fields {
                FieldPolicy::Reject => diagnostics.push(validator.field(key).unsupported()),
                FieldPolicy::Ignore => {
                    debug!(field = %validator.field(key).path(), "ignoring unsupported field");
                }
            }
        }

        object
    }

    fn decode_field(
        &self,
        field: &FieldSpec,
        raw: Option<&serde_json::Value>,
        validator: &Validator,
        diagnostics: &mut Diagnostics,
    ) -> Presence<Node> {
        match (field.requiredness(), raw) {
            (Requiredness::Computed, Some(_)) => {
                match self.computed_fields {
                    FieldPolicy::Reject => diagnostics.push(validator.computed_supplied()),
                    FieldPolicy::Ignore => {
                        debug!(field = %validator.path(), "ignoring value for computed field");
                    }
                }
                Presence::Absent
            }
            (Requiredness::Required, None) => {
                diagnostics.push(validator.missing_required());
                Presence::Absent
            }
            (Requiredness::Optional | Requiredness::Computed, None) => Presence::Absent,
            (Requiredness::Defaulted(default), None) => {
                self.decode_value(field, default, validator, diagnostics)
                    .into()
            }
            (_, Some(raw)) => {
                self.decode_value(field, raw, validator, diagnostics)
                    .into()
            }
        }
    }

    fn decode_value(
        &self,
        field: &FieldSpec,
        raw: &serde_json::Value,
        validator: &Validator,
        diagnostics: &mut Diagnostics,
    ) -> Option<Node> {
        let node = self.decode_type(field.field_type(), raw, validator, diagnostics)?;

        for constraint in field.constraints() {
            for violation in constraint.check(&node) {
                diagnostics.push(validator.invalid_value(violation));
            }
        }

        Some(node)
    }

    fn decode_type(
        &self,
        field_type: &FieldType,
        raw: &serde_json::Value,
        validator: &Validator,
        diagnostics: &mut Diagnostics,
    ) -> Option<Node> {
        use serde_json::Value;

        let node = match (field_type, raw) {
            (FieldType::String, Value::String(value)) => Node::String(value.clone()),
            (FieldType::Bool, Value::Bool(value)) => Node::Bool(*value),
            (FieldType::Int64, Value::Number(number)) if number.is_i64() => {
                Node::Int64(number.as_i64()?)
            }
            (FieldType::Int64, Value::Number(number)) if number.is_u64() => {
                diagnostics.push(validator.out_of_range(number, field_type));
                return None;
            }
            (FieldType::Float64, Value::Number(number)) => Node::Float64(number.as_f64()?),
            (FieldType::Map, Value::Object(map)) => {
                let mut entries = std::collections::BTreeMap::new();
                let mut valid = true;
                for (key, value) in map {
                    match value {
                        Value::String(value) => {
                            entries.insert(key.clone(), value.clone());
                        }
                        other => {
                            valid = false;
                            diagnostics.push(
                                validator
                                    .field(key)
                                    .unexpected_type(FieldType::String, json_type_name(other)),
                            );
                        }
                    }
                }
                valid.then_some(Node::Map(entries))?
            }
            (FieldType::List(element), Value::Array(items)) => {
                let mut nodes = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let validator = validator.index(index);
                    if let Some(node) = self.decode_type(element, item, &validator, diagnostics) {
                        nodes.push(node);
                    }
                }
                (nodes.len() == items.len()).then_some(Node::List(nodes))?
            }
            (FieldType::Object(fields), Value::Object(map)) => {
                Node::Object(self.decode_members(fields, map, validator, false, diagnostics))
            }
            (expected, other) => {
                diagnostics.push(validator.unexpected_type(expected, json_type_name(other)));
                return None;
            }
        };

        Some(node)
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(number) if number.is_i64() || number.is_u64() => "integer",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "object",
    }
}
