//! Utility functions for processing data in the YAML file format
use std::{io::Write, path::Path};

use serde::de::DeserializeOwned;
use snafu::{ResultExt, Snafu};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Represents every error which can be encountered during YAML (de)serialization.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to serialize YAML"))]
    SerializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to deserialize YAML"))]
    DeserializeYaml { source: serde_yaml::Error },

    #[snafu(display("failed to write YAML document separator"))]
    WriteDocumentSeparator { source: std::io::Error },

    #[snafu(display("failed to write YAML to file"))]
    WriteToFile { source: std::io::Error },

    #[snafu(display("failed to parse bytes as valid UTF-8 string"))]
    ParseUtf8Bytes { source: std::string::FromUtf8Error },
}

/// Provides configurable options during YAML serialization.
///
/// For most people the default implementation [`SerializeOptions::default()`] is sufficient as it
/// enables explicit document and singleton map serialization. Manifests handed back to a
/// configuration engine usually want [`SerializeOptions::bare()`] instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Adds leading triple dashes (`---`) to the output string.
    pub explicit_document: bool,

    /// Serialize enum variants as YAML maps using the variant name as the key.
    pub singleton_map: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            explicit_document: true,
            singleton_map: true,
        }
    }
}

impl SerializeOptions {
    /// Singleton map serialization without the leading document separator.
    pub fn bare() -> Self {
        Self {
            explicit_document: false,
            ..Self::default()
        }
    }
}

/// Serializes any type `T` which is [serializable](serde::Serialize) as a YAML document using
/// the provided [`SerializeOptions`].
pub trait YamlDocument: Sized + serde::Serialize {
    /// Renders `self` as a YAML string.
    fn to_yaml_string(&self, options: SerializeOptions) -> Result<String> {
        let mut buffer = Vec::new();
        serialize(&self, &mut buffer, options)?;

        String::from_utf8(buffer).context(ParseUtf8BytesSnafu)
    }

    /// Renders `self` and writes the YAML document to a file at `path`.
    fn write_yaml_document<P: AsRef<Path>>(
        &self,
        path: P,
        options: SerializeOptions,
    ) -> Result<()> {
        let document = self.to_yaml_string(options)?;
        std::fs::write(path, document).context(WriteToFileSnafu)
    }
}

impl<T> YamlDocument for T where T: serde::ser::Serialize {}

/// Serializes the given data structure and writes it to a [`Writer`](Write).
pub fn serialize<T, W>(value: &T, mut writer: W, options: SerializeOptions) -> Result<()>
where
    T: serde::Serialize,
    W: std::io::Write,
{
    if options.explicit_document {
        writer
            .write_all(b"---\n")
            .context(WriteDocumentSeparatorSnafu)?;
    }

    let mut serializer = serde_yaml::Serializer::new(writer);

    if options.singleton_map {
        serde_yaml::with::singleton_map_recursive::serialize(value, &mut serializer)
            .context(SerializeYamlSnafu)?;
    } else {
        value
            .serialize(&mut serializer)
            .context(SerializeYamlSnafu)?;
    }

    Ok(())
}

/// Deserializes `input`, accepting enum variants written as singleton maps (`variant: value`)
/// at any depth. This is the counterpart to serializing with [`SerializeOptions::singleton_map`].
pub fn deserialize_singleton_maps<T>(input: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let deserializer = serde_yaml::Deserializer::from_str(input);
    serde_yaml::with::singleton_map_recursive::deserialize(deserializer)
        .context(DeserializeYamlSnafu)
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rstest::rstest;
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    enum Bound {
        AtLeast(i64),
        OneOf(Vec<String>),
    }

    #[rstest]
    #[case(SerializeOptions::default(), "---\n- atLeast: 1\n")]
    #[case(SerializeOptions::bare(), "- atLeast: 1\n")]
    fn serialize_with_options(#[case] options: SerializeOptions, #[case] expected: &str) {
        let yaml = vec![Bound::AtLeast(1)]
            .to_yaml_string(options)
            .expect("serializing a plain enum works");

        assert_eq!(yaml, expected);
    }

    #[test]
    fn deserialize_nested_singleton_maps() {
        let bounds: Vec<Bound> = deserialize_singleton_maps(indoc! {"
            - atLeast: 0
            - oneOf:
              - Normal
              - Debug
        "})
        .expect("test YAML is valid");

        assert_eq!(
            bounds,
            vec![
                Bound::AtLeast(0),
                Bound::OneOf(vec!["Normal".to_owned(), "Debug".to_owned()])
            ]
        );
    }

    #[test]
    fn write_document_to_file() {
        let dir = tempfile::tempdir().expect("temporary directory can be created");
        let path = dir.path().join("bounds.yaml");

        vec![Bound::AtLeast(3)]
            .write_yaml_document(&path, SerializeOptions::default())
            .expect("writing to a temporary file works");

        let written = std::fs::read_to_string(&path).expect("written file can be read");
        assert_eq!(written, "---\n- atLeast: 3\n");
    }
}
