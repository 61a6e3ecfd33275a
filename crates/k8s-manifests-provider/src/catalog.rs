//! The set of data sources a provider serves.
use std::collections::{BTreeMap, btree_map::Entry};

use snafu::{OptionExt, ResultExt, Snafu};
use tracing::debug;

use crate::schema::{
    ResourceSchema,
    definition::{self, ResourceDefinition},
};

type Result<T, E = Error> = std::result::Result<T, E>;

/// Definitions compiled into every provider, keyed by file name.
const BUILTIN_DEFINITIONS: &[(&str, &str)] = &[
    ("module.yaml", include_str!("../schemas/module.yaml")),
    ("workspace.yaml", include_str!("../schemas/workspace.yaml")),
    ("config.yaml", include_str!("../schemas/config.yaml")),
    ("dns.yaml", include_str!("../schemas/dns.yaml")),
];

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to load resource definition {file:?}"))]
    Definition {
        source: definition::Error,
        file: String,
    },

    #[snafu(display("data source {name:?} is defined more than once"))]
    DuplicateDataSource { name: String },

    #[snafu(display("unknown data source {name:?}"))]
    UnknownDataSource { name: String },
}

/// Compiled schemas keyed by data source name.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    schemas: BTreeMap<String, ResourceSchema>,
}

impl Catalog {
    /// Compiles the definitions shipped with this crate.
    pub fn builtin() -> Result<Self> {
        Self::from_definitions(BUILTIN_DEFINITIONS.iter().copied())
    }

    /// Compiles `(file, contents)` pairs of YAML resource definitions.
    pub fn from_definitions<'a>(
        definitions: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self> {
        let mut catalog = Self::default();

        for (file, contents) in definitions {
            let schema = ResourceDefinition::from_yaml(contents)
                .and_then(ResourceDefinition::compile)
                .context(DefinitionSnafu { file })?;
            catalog.insert(schema)?;
        }

        Ok(catalog)
    }

    pub fn insert(&mut self, schema: ResourceSchema) -> Result<()> {
        match self.schemas.entry(schema.data_source_name()) {
            Entry::Occupied(entry) => DuplicateDataSourceSnafu { name: entry.key() }.fail(),
            Entry::Vacant(entry) => {
                debug!(data_source = %entry.key(), "registered data source");
                entry.insert(schema);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&ResourceSchema> {
        self.schemas
            .get(name)
            .context(UnknownDataSourceSnafu { name })
    }

    /// Data source names in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceSchema)> {
        self.schemas
            .iter()
            .map(|(name, schema)| (name.as_str(), schema))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
