use std::path::{Path, PathBuf};

use k8s_manifests_provider::{
    provider::{self, Provider},
    schema::YAML,
};
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to read configuration from {path}", path = path.display()))]
    ReadInput {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to parse configuration in {path}", path = path.display()))]
    ParseInput {
        source: serde_yaml::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to read data source {data_source}"))]
    Read {
        source: provider::Error,
        data_source: String,
    },

    #[snafu(display("data source {data_source} did not publish a manifest"))]
    MissingManifest { data_source: String },
}

/// Reads `input` as the configuration of `data_source` and prints the rendered manifest.
pub fn render(provider: &Provider, data_source: &str, input: &Path) -> Result<(), Error> {
    print!("{}", render_to_string(provider, data_source, input)?);
    Ok(())
}

fn render_to_string(provider: &Provider, data_source: &str, input: &Path) -> Result<String, Error> {
    let contents = std::fs::read_to_string(input).context(ReadInputSnafu { path: input })?;

    // YAML is a superset of JSON, which lets this accept both
    let config: serde_json::Value =
        serde_yaml::from_str(&contents).context(ParseInputSnafu { path: input })?;

    let mut state = provider
        .read(data_source, &config)
        .context(ReadSnafu { data_source })?;

    tracing::debug!(data_source, "rendered manifest");
    state
        .remove(YAML)
        .and_then(|yaml| match yaml {
            serde_json::Value::String(yaml) => Some(yaml),
            _ => None,
        })
        .context(MissingManifestSnafu { data_source })
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use k8s_manifests_provider::config::ProviderOptions;

    use super::*;

    #[test]
    fn renders_config_file() {
        let directory = tempfile::tempdir().expect("temporary directory is created");
        let input = directory.path().join("dns.yaml");
        let config = indoc! {"
            metadata:
              name: default
            spec:
              log_level: Debug
        "};
        std::fs::write(&input, config).expect("configuration is written");

        let provider =
            Provider::builtin(ProviderOptions::default()).expect("builtin catalog compiles");
        let yaml = render_to_string(&provider, "k8s_operator_openshift_io_dns_v1_manifest", &input)
            .expect("configuration renders");

        assert_eq!(
            yaml,
            indoc! {"
                apiVersion: operator.openshift.io/v1
                kind: DNS
                metadata:
                  name: default
                spec:
                  logLevel: Debug
                  operatorLogLevel: Normal
            "}
        );
    }

    #[test]
    fn reports_invalid_configuration() {
        let directory = tempfile::tempdir().expect("temporary directory is created");
        let input = directory.path().join("module.json");
        std::fs::write(&input, r#"{"metadata": {"name": "m1"}}"#)
            .expect("configuration is written");

        let provider =
            Provider::builtin(ProviderOptions::default()).expect("builtin catalog compiles");
        let err = render_to_string(
            &provider,
            "k8s_app_terraform_io_module_v1alpha2_manifest",
            &input,
        )
        .expect_err("configuration is incomplete");

        assert!(matches!(err, Error::Read { .. }));
    }
}
