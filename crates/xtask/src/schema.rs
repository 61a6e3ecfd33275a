use k8s_manifests_provider::provider::Provider;

/// Prints one line per data source: its name, the rendered `apiVersion` and `kind`, and its
/// scope.
pub fn list(provider: &Provider) {
    for (name, schema) in provider.catalog().iter() {
        println!(
            "{name}\t{api_version}\t{kind}\t{scope}",
            api_version = schema.api_version(),
            kind = schema.kind(),
            scope = schema.scope(),
        );
    }
}
