use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use indoc::formatdoc;
use k8s_manifests_provider::{
    provider::Provider,
    schema::{FieldSpec, FieldType, NAME, NAMESPACE, Requiredness, ResourceSchema, Scope},
};
use snafu::{OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to get manifest directory"))]
    GetManifestDirectory { source: std::env::VarError },

    #[snafu(display("failed to get workspace directory of {path}", path = path.display()))]
    GetWorkspaceDirectory { path: PathBuf },

    #[snafu(display("failed to create directory {path}", path = path.display()))]
    CreateDirectory {
        source: std::io::Error,
        path: PathBuf,
    },

    #[snafu(display("failed to format documentation of {data_source}"))]
    FormatDocs {
        source: std::fmt::Error,
        data_source: String,
    },

    #[snafu(display("failed to write documentation to file at {path}", path = path.display()))]
    WriteDocs {
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Writes one Markdown file per data source into `output`, or `docs/data-sources` of the
/// workspace if no output directory is given.
pub fn generate(provider: &Provider, output: Option<PathBuf>) -> Result<(), Error> {
    let output = match output {
        Some(output) => output,
        None => default_output()?,
    };

    std::fs::create_dir_all(&output).with_context(|_| CreateDirectorySnafu {
        path: output.clone(),
    })?;

    for (name, schema) in provider.catalog().iter() {
        let docs = render(name, schema).context(FormatDocsSnafu { data_source: name })?;

        let mut path = output.join(name);
        path.set_extension("md");
        std::fs::write(&path, docs).with_context(|_| WriteDocsSnafu { path: path.clone() })?;
        tracing::info!(path = %path.display(), "wrote data source documentation");
    }

    Ok(())
}

fn default_output() -> Result<PathBuf, Error> {
    let path = std::env::var("CARGO_MANIFEST_DIR")
        .map(PathBuf::from)
        .context(GetManifestDirectorySnafu)?;

    // crates/xtask
    let workspace = path
        .parent()
        .and_then(Path::parent)
        .with_context(|| GetWorkspaceDirectorySnafu { path: path.clone() })?;

    Ok(workspace.join("docs/data-sources"))
}

/// Renders the documentation page of a single data source.
fn render(name: &str, schema: &ResourceSchema) -> Result<String, std::fmt::Error> {
    let namespace = match schema.scope() {
        Scope::Namespaced => format!("\n    {NAMESPACE} = \"some-namespace\""),
        Scope::Cluster => String::new(),
    };
    let name_padding = match schema.scope() {
        Scope::Namespaced => "     ",
        Scope::Cluster => "",
    };

    let mut out = formatdoc! {r#"
        ---
        page_title: "{name} Data Source"
        description: |-
          {description}
        ---

        # {name} (Data Source)

        {description}

        ## Example Usage

        ```terraform
        data "{name}" "example" {{
          metadata = {{
            {NAME}{name_padding} = "some-name"{namespace}
          }}
        }}
        ```

        ## Schema
        "#,
        description = schema.description(),
    };

    let mut nested = Vec::new();
    write_attributes(&mut out, schema.fields(), "", &mut nested)?;

    // Nested objects are appended while rendering, so this cannot be a plain iterator
    let mut index = 0;
    while let Some((path, fields)) = nested.get(index).cloned() {
        writeln!(out)?;
        writeln!(out, "<a id=\"nestedatt--{}\"></a>", anchor(&path))?;
        writeln!(out, "### Nested Schema for `{path}`")?;
        write_attributes(&mut out, fields, &path, &mut nested)?;
        index += 1;
    }

    Ok(out)
}

fn write_attributes<'a>(
    out: &mut String,
    fields: &'a [FieldSpec],
    parent: &str,
    nested: &mut Vec<(String, &'a [FieldSpec])>,
) -> std::fmt::Result {
    let groups = [
        ("Required", Group::Required),
        ("Optional", Group::Optional),
        ("Read-Only", Group::ReadOnly),
    ];

    for (title, group) in groups {
        let members = fields
            .iter()
            .filter(|field| Group::of(field) == group)
            .collect::<Vec<_>>();
        if members.is_empty() {
            continue;
        }

        writeln!(out)?;
        match parent {
            "" => writeln!(out, "### {title}")?,
            _ => writeln!(out, "{title}:")?,
        }
        writeln!(out)?;

        for field in members {
            let path = match parent {
                "" => field.name().to_owned(),
                parent => format!("{parent}.{}", field.name()),
            };

            write!(out, "- `{}` ({})", field.name(), type_label(field.field_type()))?;
            if !field.description().is_empty() {
                write!(out, " {}", field.description())?;
            }
            if let Requiredness::Defaulted(default) = field.requiredness() {
                write!(out, " Defaults to `{default}`.")?;
            }
            if !field.constraints().is_empty() {
                let constraints = field
                    .constraints()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>();
                write!(out, " Must satisfy: {}.", constraints.join(", "))?;
            }
            if !field.children().is_empty() {
                write!(
                    out,
                    " (see [below for nested schema](#nestedatt--{}))",
                    anchor(&path)
                )?;
                nested.push((path, field.children()));
            }
            writeln!(out)?;
        }
    }

    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Group {
    Required,
    Optional,
    ReadOnly,
}

impl Group {
    fn of(field: &FieldSpec) -> Self {
        match field.requiredness() {
            Requiredness::Required => Self::Required,
            Requiredness::Optional | Requiredness::Defaulted(_) => Self::Optional,
            Requiredness::Computed => Self::ReadOnly,
        }
    }
}

fn type_label(field_type: &FieldType) -> String {
    match field_type {
        FieldType::String => "String".to_owned(),
        FieldType::Bool => "Boolean".to_owned(),
        FieldType::Int64 | FieldType::Float64 => "Number".to_owned(),
        FieldType::Map => "Map of String".to_owned(),
        FieldType::Object(_) => "Attributes".to_owned(),
        FieldType::List(element) => match element.as_ref() {
            FieldType::Object(_) => "Attributes List".to_owned(),
            element => format!("List of {}", type_label(element)),
        },
    }
}

fn anchor(path: &str) -> String {
    path.replace('.', "--")
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use k8s_manifests_provider::config::ProviderOptions;

    use super::*;

    fn provider() -> Provider {
        Provider::builtin(ProviderOptions::default()).expect("builtin catalog compiles")
    }

    #[test]
    fn renders_nested_schemas() {
        let provider = provider();
        let schema = provider
            .schema("k8s_app_terraform_io_module_v1alpha2_manifest")
            .expect("module is registered");

        let docs = render("k8s_app_terraform_io_module_v1alpha2_manifest", schema)
            .expect("docs are formatted");

        assert!(docs.starts_with(indoc! {r#"
            ---
            page_title: "k8s_app_terraform_io_module_v1alpha2_manifest Data Source"
        "#}));
        assert!(docs.contains(indoc! {r#"
            data "k8s_app_terraform_io_module_v1alpha2_manifest" "example" {
              metadata = {
                name      = "some-name"
                namespace = "some-namespace"
              }
            }
        "#}));
        assert!(docs.contains(
            "- `id` (String) Contains the value 'metadata.namespace/metadata.name'.\n"
        ));
        assert!(docs.contains(indoc! {"
            <a id=\"nestedatt--spec--token--secret_key_ref\"></a>
            ### Nested Schema for `spec.token.secret_key_ref`

            Required:

            - `key` (String) The key of the secret to select from. Must be a valid secret key.
        "}));
        assert!(docs.contains("- `variables` (Attributes List)"));
    }

    #[test]
    fn writes_one_file_per_data_source() {
        let directory = tempfile::tempdir().expect("temporary directory is created");
        let provider = provider();

        generate(&provider, Some(directory.path().to_owned())).expect("docs are written");

        for name in provider.data_sources() {
            assert!(directory.path().join(format!("{name}.md")).is_file());
        }
    }
}
