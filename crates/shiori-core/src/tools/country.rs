//! Author country-of-origin lookup, the bundled demo tool.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ToolHandler, ToolSpec};
use crate::error::Result;

/// Wire name of the lookup tool.
pub const COUNTRY_TOOL_NAME: &str = "getCountry";

/// Query seam for author metadata. A lookup that errors (backend down) is
/// different from an author the catalog simply has no record of.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Country of origin for an author, `None` when unknown.
    async fn author_country(&self, author: &str) -> Result<Option<String>>;
}

/// In-memory catalog, seedable with the demo library's authors.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    countries: HashMap<String, String>,
}

impl MemoryCatalog {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        Self {
            countries: entries
                .iter()
                .map(|(author, country)| (author.to_string(), country.to_string()))
                .collect(),
        }
    }

    /// The demo library catalog.
    pub fn seeded() -> Self {
        Self::new(&[
            ("Ariadne Thread", "Uruguay"),
            ("Caspian Rook", "South Africa"),
            ("Elara Thornwood", "Ireland"),
            ("Finn Barlow", "Norway"),
            ("Milo Vesper", "Italy"),
            ("Orion Ember", "United Kingdom"),
        ])
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn author_country(&self, author: &str) -> Result<Option<String>> {
        Ok(self.countries.get(author).cloned())
    }
}

/// Handler answering "what country is this author from".
pub struct CountryLookup {
    catalog: Arc<dyn Catalog>,
}

impl CountryLookup {
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self { catalog }
    }

    /// Declaration sent upstream: one required string property `author`.
    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            COUNTRY_TOOL_NAME,
            "Get the country of the author",
            json!({
                "type": "object",
                "properties": {
                    "author": {
                        "type": "string",
                        "description": "Author name to get the country for.",
                    }
                },
                "required": ["author"],
            }),
        )
    }
}

#[async_trait]
impl ToolHandler for CountryLookup {
    async fn call(&self, args: Value) -> std::result::Result<Value, String> {
        let author = args
            .get("author")
            .and_then(Value::as_str)
            .ok_or_else(|| "getCountry requires a string `author` argument".to_string())?;

        let country = self
            .catalog
            .author_country(author)
            .await
            .map_err(|e| e.to_string())?;

        // A miss is an answer, not a failure: the model needs something it
        // can relay to the user.
        Ok(match country {
            Some(country) => json!({ "name": author, "country": country }),
            None => json!({
                "country": format!(
                    "There is no available data on the country of origin for {author}."
                )
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_author_resolves_country() {
        let tool = CountryLookup::new(Arc::new(MemoryCatalog::seeded()));
        let value = tool
            .call(json!({ "author": "Ariadne Thread" }))
            .await
            .unwrap();
        assert_eq!(
            value,
            json!({ "name": "Ariadne Thread", "country": "Uruguay" })
        );
    }

    #[tokio::test]
    async fn test_unknown_author_gets_no_data_sentence() {
        let tool = CountryLookup::new(Arc::new(MemoryCatalog::seeded()));
        let value = tool
            .call(json!({ "author": "Nobody Anywhere" }))
            .await
            .unwrap();
        assert_eq!(
            value,
            json!({
                "country":
                    "There is no available data on the country of origin for Nobody Anywhere."
            })
        );
    }

    #[tokio::test]
    async fn test_missing_author_argument_is_handler_error() {
        let tool = CountryLookup::new(Arc::new(MemoryCatalog::seeded()));
        let err = tool.call(json!({ "writer": "Finn Barlow" })).await.unwrap_err();
        assert!(err.contains("author"));
    }

    #[test]
    fn test_spec_declares_required_author() {
        let spec = CountryLookup::spec();
        assert_eq!(spec.name, COUNTRY_TOOL_NAME);
        assert_eq!(spec.parameters["required"], json!(["author"]));
        assert_eq!(spec.parameters["properties"]["author"]["type"], "string");
    }
}
