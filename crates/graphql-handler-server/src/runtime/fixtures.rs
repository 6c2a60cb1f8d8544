//! Root field fixtures loaded from JSON

use std::path::{Path, PathBuf};

use graphql_handler::{BoxError, ResolveParams, Resolvers};
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Could not read fixtures from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid fixtures JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Fixtures for {0} must be an object of field values")]
    NotAnObject(String),
}

/// Read a fixtures file into resolvers returning the listed values
pub fn load_fixtures(path: &Path) -> Result<Resolvers, FixtureError> {
    let source = std::fs::read_to_string(path).map_err(|source| FixtureError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    fixture_resolvers(serde_json::from_str(&source)?)
}

/// Build resolvers from `{ "<RootType>": { "<field>": <value> } }`
fn fixture_resolvers(fixtures: Map<String, Value>) -> Result<Resolvers, FixtureError> {
    let mut resolvers = Resolvers::new();
    for (type_name, fields) in fixtures {
        let Value::Object(fields) = fields else {
            return Err(FixtureError::NotAnObject(type_name));
        };
        for (field_name, value) in fields {
            resolvers = resolvers.field(type_name.clone(), field_name, move |_: ResolveParams| {
                let value = value.clone();
                async move { Ok::<_, BoxError>(value) }
            });
        }
    }
    Ok(resolvers)
}
