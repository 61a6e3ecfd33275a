//! Hands the result of a read back to the configuration engine.
use serde_json::Value;

use crate::{
    materialize::{ConfigInstance, MaterializedDocument},
    schema::{ID, YAML},
};

/// Attribute values of a data source, keyed by attribute name.
pub type StateMap = serde_json::Map<String, Value>;

/// Writes every attribute of `instance` into `state`, followed by the computed `yaml` and, if
/// the schema exposes it, `id` attributes.
///
/// Absent optional attributes are written as `null` so the engine can tell them apart from
/// zero values.
pub fn publish(
    instance: &ConfigInstance,
    document: &MaterializedDocument,
    yaml: String,
    state: &mut StateMap,
) {
    state.extend(instance.root().to_state());
    state.insert(YAML.to_owned(), Value::String(yaml));

    if let Some(identifier) = document.identifier() {
        state.insert(ID.to_owned(), Value::from(identifier));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        materialize::Materializer,
        schema::{FieldSpec, IdentifierAttribute, Requiredness, ResourceSchema, Scope},
    };

    fn read(schema: &ResourceSchema, raw: &Value) -> StateMap {
        let (instance, document) = Materializer::new(schema)
            .materialize(raw)
            .expect("configuration is valid");

        let mut state = StateMap::new();
        publish(&instance, &document, "kind: Test\n".to_owned(), &mut state);
        state
    }

    #[test]
    fn publishes_namespaced_identifier() {
        let schema = ResourceSchema::builder("app.terraform.io", "v1alpha2", "Workspace")
            .spec(
                vec![FieldSpec::string("organization"), FieldSpec::string("description")],
                Requiredness::Required,
            )
            .build()
            .expect("schema is valid");

        let state = read(
            &schema,
            &json!({
                "metadata": {"name": "web", "namespace": "team-a"},
                "spec": {"organization": "acme"},
            }),
        );

        assert_eq!(
            Value::from(state),
            json!({
                "id": "team-a/web",
                "yaml": "kind: Test\n",
                "metadata": {
                    "name": "web",
                    "namespace": "team-a",
                    "labels": null,
                    "annotations": null,
                },
                "spec": {"organization": "acme", "description": null},
            })
        );
    }

    #[test]
    fn cluster_scoped_identifier() {
        let schema = ResourceSchema::builder("operator.openshift.io", "v1", "Config")
            .scope(Scope::Cluster)
            .build()
            .expect("schema is valid");

        let state = read(&schema, &json!({"metadata": {"name": "cluster"}}));
        assert_eq!(state.get(ID), Some(&json!("cluster")));
    }

    #[test]
    fn omitted_identifier() {
        let schema = ResourceSchema::builder("operator.openshift.io", "v1", "DNS")
            .scope(Scope::Cluster)
            .identifier(IdentifierAttribute::Omitted)
            .build()
            .expect("schema is valid");

        let state = read(&schema, &json!({"metadata": {"name": "default"}}));
        assert!(!state.contains_key(ID));
        assert_eq!(state.get(YAML), Some(&json!("kind: Test\n")));
    }
}
