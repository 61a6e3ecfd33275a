//! Renders a [`MaterializedDocument`] as YAML.
//!
//! Manifests are read back by Kubernetes tooling, which parses YAML 1.1. There, plain scalars
//! such as `on`, `no` or `1_000` are booleans and numbers, so strings like these are always
//! single quoted.
use std::sync::LazyLock;

use k8s_manifests_shared::yaml::{self, SerializeOptions, YamlDocument};
use regex::Regex;
use snafu::{ResultExt, Snafu};

use crate::{materialize::MaterializedDocument, value::Rewritten};

/// Plain scalars YAML 1.1 resolves to booleans, or to the merge key.
const YAML_1_1_LITERALS: &[&str] = &[
    "y", "Y", "yes", "Yes", "YES", "n", "N", "no", "No", "NO", "on", "On", "ON", "off", "Off",
    "OFF", "<<",
];

/// Plain scalars YAML 1.1 resolves to numbers, including binary and `_` separated ones.
static YAML_1_1_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[-+]?(0b[01_]+|0x[0-9a-fA-F_]+|0o?[0-7_]+|[0-9][0-9_]*(\.[0-9_]*)?([eE][-+]?[0-9]+)?|\.[0-9_]+([eE][-+]?[0-9]+)?)$",
    )
    .expect("failed to compile YAML 1.1 number regex")
});

/// Plain scalars YAML 1.1 resolves to timestamps.
static YAML_1_1_TIMESTAMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9]{4}-[0-9]{1,2}-[0-9]{1,2}([Tt ][0-9:.+\-Zz ]*)?$")
        .expect("failed to compile YAML 1.1 timestamp regex")
});

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize {kind} manifest"))]
    SerializationFailure { source: yaml::Error, kind: String },
}

/// Serializes the document with two-space indentation and keys in declaration order.
///
/// The output only depends on the document, rendering the same document twice yields the same
/// bytes.
pub fn render(document: &MaterializedDocument, options: SerializeOptions) -> Result<String, Error> {
    let plain = document
        .to_yaml_string(options)
        .context(SerializationFailureSnafu {
            kind: document.kind(),
        })?;

    // serde_yaml has no way to force a scalar style. Ambiguous strings are replaced by
    // placeholders which render as plain scalars and are quoted afterwards. The marker must not
    // occur anywhere else in the output.
    let mut generation = 0_usize;
    while plain.contains(&marker(generation)) {
        generation += 1;
    }
    let marker = marker(generation);

    let rewrite = |value: &str| {
        if needs_quotes(value) {
            Some(format!("{marker}{value}{marker}"))
        } else {
            None
        }
    };
    let guarded = Rewritten::new(document, &rewrite)
        .to_yaml_string(options)
        .context(SerializationFailureSnafu {
            kind: document.kind(),
        })?;

    // Every placeholder contributes two markers, so every odd part is a string to quote.
    let mut rendered = String::with_capacity(guarded.len());
    for (index, part) in guarded.split(marker.as_str()).enumerate() {
        if index % 2 == 1 {
            rendered.push('\'');
            rendered.push_str(part);
            rendered.push('\'');
        } else {
            rendered.push_str(part);
        }
    }

    Ok(rendered)
}

fn marker(generation: usize) -> String {
    format!("k8s-manifests-quoted-{generation}-")
}

/// Whether a YAML 1.1 parser would read `value` as anything but a string if it was not quoted.
fn needs_quotes(value: &str) -> bool {
    YAML_1_1_LITERALS.contains(&value)
        || YAML_1_1_NUMBER.is_match(value)
        || YAML_1_1_TIMESTAMP.is_match(value)
}
