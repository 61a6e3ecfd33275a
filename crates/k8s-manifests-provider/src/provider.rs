//! The surface a configuration engine talks to.
//!
//! A [`Provider`] answers schema lookups and reads for every data source in its [`Catalog`].
//! Reads are pure: they only depend on the schema and the configuration handed in, so a single
//! provider can serve any number of threads at once.
use serde::Serialize;
use snafu::{ResultExt, Snafu};
use tracing::{debug, instrument, warn};

use crate::{
    catalog::{self, Catalog},
    config::ProviderOptions,
    materialize::{Diagnostics, Materializer},
    publish::{StateMap, publish},
    render,
    schema::ResourceSchema,
};

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to look up data source"))]
    LookupDataSource { source: catalog::Error },

    #[snafu(display("invalid configuration for {data_source}"))]
    InvalidConfiguration {
        source: Diagnostics,
        data_source: String,
    },

    #[snafu(display("failed to render manifest for {data_source}"))]
    RenderManifest {
        source: render::Error,
        data_source: String,
    },
}

/// Result of a read in the shape configuration engines expect: either a fully populated state
/// without diagnostics, or no state and at least one diagnostic.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadResponse {
    pub state: Option<StateMap>,
    pub diagnostics: Vec<ReadDiagnostic>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadDiagnostic {
    pub summary: String,

    /// The attribute path the diagnostic refers to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Error {
    /// One diagnostic per configuration problem, or a single one describing any other failure.
    pub fn diagnostics(&self) -> Vec<ReadDiagnostic> {
        match self {
            Self::InvalidConfiguration { source, .. } => source
                .iter()
                .map(|diagnostic| ReadDiagnostic {
                    summary: diagnostic.to_string(),
                    attribute: Some(diagnostic.path().to_string()),
                })
                .collect(),
            other => vec![ReadDiagnostic {
                summary: snafu::Report::from_error(other).to_string(),
                attribute: None,
            }],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Provider {
    catalog: Catalog,
    options: ProviderOptions,
}

impl Provider {
    pub fn new(catalog: Catalog, options: ProviderOptions) -> Self {
        Self { catalog, options }
    }

    /// A provider serving every data source shipped with this crate.
    pub fn builtin(options: ProviderOptions) -> Result<Self, catalog::Error> {
        Ok(Self::new(Catalog::builtin()?, options))
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Names of all data sources, sorted.
    pub fn data_sources(&self) -> impl Iterator<Item = &str> {
        self.catalog.names()
    }

    pub fn schema(&self, data_source: &str) -> Result<&ResourceSchema> {
        self.catalog.get(data_source).context(LookupDataSourceSnafu)
    }

    /// Checks `config` without rendering anything. Returns every diagnostic, which is empty if
    /// the configuration is valid.
    pub fn validate(&self, data_source: &str, config: &serde_json::Value) -> Result<Diagnostics> {
        let schema = self.schema(data_source)?;
        Ok(self
            .materializer(schema)
            .decode(config)
            .err()
            .unwrap_or_default())
    }

    /// Decodes `config`, renders the manifest and returns the state of the data source.
    #[instrument(skip(self, config))]
    pub fn read(&self, data_source: &str, config: &serde_json::Value) -> Result<StateMap> {
        let schema = self.schema(data_source)?;

        let (instance, document) = self
            .materializer(schema)
            .materialize(config)
            .context(InvalidConfigurationSnafu { data_source })?;
        let yaml = render::render(&document, self.options.serialize_options())
            .context(RenderManifestSnafu { data_source })?;

        let mut state = StateMap::new();
        publish(&instance, &document, yaml, &mut state);

        debug!(id = document.identifier(), "rendered manifest");
        Ok(state)
    }

    /// Like [`Provider::read`], but reports failures as diagnostics.
    pub fn read_response(&self, data_source: &str, config: &serde_json::Value) -> ReadResponse {
        match self.read(data_source, config) {
            Ok(state) => ReadResponse {
                state: Some(state),
                diagnostics: Vec::new(),
            },
            Err(err) => {
                warn!(data_source, error = %err, "read failed");
                ReadResponse {
                    state: None,
                    diagnostics: err.diagnostics(),
                }
            }
        }
    }

    fn materializer<'a>(&self, schema: &'a ResourceSchema) -> Materializer<'a> {
        Materializer::new(schema)
            .computed_fields(self.options.computed_fields)
            .unknown_fields(self.options.unknown_fields)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::FieldPolicy;

    const MODULE: &str = "k8s_app_terraform_io_module_v1alpha2_manifest";

    fn provider() -> Provider {
        Provider::builtin(ProviderOptions::default()).expect("builtin catalog compiles")
    }

    fn module_config() -> serde_json::Value {
        json!({
            "metadata": {"name": "m1", "namespace": "ns1"},
            "spec": {
                "organization": "acme",
                "token": {"secret_key_ref": {"key": "token", "name": "tfc-secret"}},
                "module": {"source": "terraform-aws-modules/vpc/aws"},
                "workspace": {"name": "prod"},
            },
        })
    }

    #[test]
    fn provider_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Provider>();
    }

    #[test]
    fn validate_reports_diagnostics() {
        let provider = provider();

        assert!(
            provider
                .validate(MODULE, &module_config())
                .expect("module is registered")
                .is_empty()
        );

        let diagnostics = provider
            .validate(MODULE, &json!({"metadata": {"name": "m1", "namespace": "ns1"}}))
            .expect("module is registered");
        assert_eq!(diagnostics.to_string(), "missing required field spec");
    }

    #[test]
    fn read_response_with_state() {
        let response = provider().read_response(MODULE, &module_config());

        assert!(response.diagnostics.is_empty());
        let state = response.state.expect("read succeeds");
        assert_eq!(state.get("id"), Some(&json!("ns1/m1")));
    }

    #[test]
    fn read_response_with_diagnostics() {
        let mut config = module_config();
        config["id"] = json!("ns1/m1");
        config["spec"]["workspace"]["id"] = json!("workspace-1");

        let response = provider().read_response(MODULE, &config);

        assert_eq!(response.state, None);
        assert_eq!(
            response
                .diagnostics
                .iter()
                .map(|d| d.attribute.as_deref())
                .collect::<Vec<_>>(),
            [Some("id"), Some("spec.workspace.id")]
        );
    }

    #[test]
    fn unknown_data_source() {
        let response = provider().read_response("k8s_example_com_widget_v1_manifest", &json!({}));

        assert_eq!(response.state, None);
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].attribute, None);
        assert!(
            response.diagnostics[0]
                .summary
                .contains(r#"unknown data source "k8s_example_com_widget_v1_manifest""#)
        );
    }

    #[test]
    fn options_are_applied() {
        let provider = Provider::builtin(ProviderOptions {
            computed_fields: FieldPolicy::Ignore,
            explicit_document: true,
            ..ProviderOptions::default()
        })
        .expect("builtin catalog compiles");

        let mut config = module_config();
        config["yaml"] = json!("kind: Other");

        let state = provider
            .read(MODULE, &config)
            .expect("computed value is ignored");
        let yaml = state
            .get("yaml")
            .and_then(serde_json::Value::as_str)
            .expect("yaml is published");
        assert!(yaml.starts_with("---\napiVersion: app.terraform.io/v1alpha2\nkind: Module\n"));
    }
}
