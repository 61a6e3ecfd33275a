//! Provider-wide options.
//!
//! [`ProviderOptions`] can be flattened into a clap-based CLI (every option also reads from the
//! environment) or deserialized from a YAML/JSON provider configuration block.
//!
//! ```
//! use k8s_manifests_provider::config::{FieldPolicy, ProviderOptions};
//!
//! let options = ProviderOptions::from_yaml("computedFields: ignore").unwrap();
//! assert_eq!(options.computed_fields, FieldPolicy::Ignore);
//! assert_eq!(options.unknown_fields, FieldPolicy::Reject);
//! ```
use k8s_manifests_shared::yaml::SerializeOptions;
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse provider options"))]
    ParseOptions { source: serde_yaml::Error },
}

/// How to treat configuration values the schema does not expect.
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
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FieldPolicy {
    /// Report a diagnostic and fail the read.
    #[default]
    Reject,

    /// Drop the value and log it at debug level.
    Ignore,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderOptions {
    /// What to do when a configuration sets an attribute the provider computes, like `id` or
    /// `yaml`.
    #[cfg_attr(feature = "clap", arg(long, env, value_enum, default_value_t))]
    pub computed_fields: FieldPolicy,

    /// What to do when a configuration contains attributes the data source does not declare.
    #[cfg_attr(feature = "clap", arg(long, env, value_enum, default_value_t))]
    pub unknown_fields: FieldPolicy,

    /// Prefix every rendered manifest with a `---` document separator.
    #[cfg_attr(feature = "clap", arg(long, env))]
    pub explicit_document: bool,
}

impl ProviderOptions {
    pub fn from_yaml(input: &str) -> Result<Self, Error> {
        serde_yaml::from_str(input).context(ParseOptionsSnafu)
    }

    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions {
            explicit_document: self.explicit_document,
            ..SerializeOptions::bare()
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_are_strict() {
        let options = ProviderOptions::default();

        assert_eq!(options.computed_fields, FieldPolicy::Reject);
        assert_eq!(options.unknown_fields, FieldPolicy::Reject);
        assert_eq!(options.serialize_options(), SerializeOptions::bare());
    }

    #[test]
    fn from_yaml() {
        let options = ProviderOptions::from_yaml(indoc! {"
            computedFields: ignore
            unknownFields: reject
            explicitDocument: true
        "})
        .expect("test YAML is valid");

        assert_eq!(
            options,
            ProviderOptions {
                computed_fields: FieldPolicy::Ignore,
                unknown_fields: FieldPolicy::Reject,
                explicit_document: true,
            }
        );
        assert!(options.serialize_options().explicit_document);
    }

    #[test]
    fn from_yaml_rejects_unknown_policies() {
        assert!(ProviderOptions::from_yaml("computedFields: maybe").is_err());
    }

    #[rstest]
    #[case("reject", FieldPolicy::Reject)]
    #[case("ignore", FieldPolicy::Ignore)]
    fn policy_names(#[case] input: &str, #[case] policy: FieldPolicy) {
        assert_eq!(input.parse::<FieldPolicy>().expect("policy name is valid"), policy);
        assert_eq!(policy.to_string(), input);
    }

    #[cfg(feature = "clap")]
    #[test]
    fn verify_cli() {
        use clap::{CommandFactory, Parser};

        #[derive(Parser)]
        struct Cli {
            #[command(flatten)]
            options: ProviderOptions,
        }

        Cli::command().debug_assert();

        let cli = Cli::parse_from([
            "provider",
            "--computed-fields",
            "ignore",
            "--explicit-document",
        ]);
        assert_eq!(cli.options.computed_fields, FieldPolicy::Ignore);
        assert!(cli.options.explicit_document);
    }
}
