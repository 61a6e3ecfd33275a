use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use k8s_manifests_provider::{
    catalog,
    config::ProviderOptions,
    logging::{self, LogFormat, initialize_logging},
    provider::Provider,
};
use snafu::{ResultExt, Snafu};

mod docs;
mod render;
mod schema;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to initialize logging"))]
    InitializeLogging { source: logging::Error },

    #[snafu(display("failed to load builtin data sources"))]
    LoadCatalog { source: catalog::Error },

    #[snafu(display("failed to render manifest"))]
    Render { source: render::Error },

    #[snafu(display("failed to generate data source documentation"))]
    Docs { source: docs::Error },
}

#[derive(Debug, Parser)]
struct Cli {
    /// Format of log lines, which are always written to stderr.
    #[arg(long, env = "XTASK_LOG_FORMAT", value_enum, default_value_t, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Renders the manifest of a single data source configuration.
    Render(RenderArguments),

    /// Generates Markdown documentation for every data source.
    Docs(DocsArguments),

    #[command(subcommand)]
    Schema(SchemaCommand),
}

#[derive(Debug, Args)]
struct RenderArguments {
    /// Name of the data source, e.g. k8s_app_terraform_io_module_v1alpha2_manifest.
    #[arg(long)]
    data_source: String,

    /// YAML or JSON file with the data source configuration, using attribute names.
    #[arg(long)]
    input: PathBuf,

    #[command(flatten)]
    options: ProviderOptions,
}

#[derive(Debug, Args)]
struct DocsArguments {
    /// Directory the documentation is written to. Defaults to docs/data-sources in the
    /// workspace root.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum SchemaCommand {
    /// Lists every data source together with the resource it renders.
    List,
}

#[snafu::report]
fn main() -> Result<(), Error> {
    let cli = Cli::parse();
    initialize_logging("XTASK_LOG", "xtask", cli.log_format).context(InitializeLoggingSnafu)?;

    match cli.command {
        Command::Render(arguments) => {
            let provider = Provider::builtin(arguments.options).context(LoadCatalogSnafu)?;
            render::render(&provider, &arguments.data_source, &arguments.input)
                .context(RenderSnafu)
        }
        Command::Docs(arguments) => {
            let provider = Provider::builtin(ProviderOptions::default()).context(LoadCatalogSnafu)?;
            docs::generate(&provider, arguments.output).context(DocsSnafu)
        }
        Command::Schema(SchemaCommand::List) => {
            let provider = Provider::builtin(ProviderOptions::default()).context(LoadCatalogSnafu)?;
            schema::list(&provider);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
