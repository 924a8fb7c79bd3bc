use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The `data_sources` block attached to a grounded chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSources {
    /// Data sources the model may retrieve from.
    pub data_sources: Vec<DataSource>,
}

impl DataSources {
    /// A block with a single Azure AI Search data source.
    pub fn azure_search(parameters: AzureSearchParameters) -> Self {
        Self {
            data_sources: vec![DataSource::AzureSearch(parameters)],
        }
    }
}

/// A retrieval data source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "parameters", rename_all = "snake_case")]
pub enum DataSource {
    /// A hosted search index.
    AzureSearch(AzureSearchParameters),
}

/// How the completion service authenticates to the search index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchAuthentication {
    /// A search service key.
    ApiKey {
        /// The key.
        key: String,
    },
}

/// Parameters of an Azure AI Search data source.
///
/// `strictness` and `top_n_documents` are passed through unvalidated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AzureSearchParameters {
    /// Search service endpoint.
    pub endpoint: String,

    /// Name of the index to query.
    pub index_name: String,

    /// Semantic ranker configuration name.
    pub semantic_configuration: String,

    /// Query type, e.g. `simple` or `semantic`.
    pub query_type: String,

    /// Index field mapping.  Always empty; the service infers it.
    #[serde(default)]
    pub fields_mapping: Map<String, Value>,

    /// Restrict answers to retrieved documents.
    pub in_scope: bool,

    /// Search filter; always sent, usually null.
    #[serde(default)]
    pub filter: Option<String>,

    /// How aggressively irrelevant documents are dropped.
    pub strictness: i64,

    /// Number of documents to retrieve.
    pub top_n_documents: i64,

    /// Credentials for the search service.
    pub authentication: SearchAuthentication,

    /// System prompt forwarded to the retrieval pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_information: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    fn parameters() -> AzureSearchParameters {
        AzureSearchParameters {
            endpoint: "https://search.example.net".to_string(),
            index_name: "docs".to_string(),
            semantic_configuration: "default".to_string(),
            query_type: "simple".to_string(),
            fields_mapping: Map::new(),
            in_scope: true,
            filter: None,
            strictness: 3,
            top_n_documents: 5,
            authentication: SearchAuthentication::ApiKey {
                key: "secret".to_string(),
            },
            role_information: None,
        }
    }

    #[test]
    fn azure_search_wire_format() {
        let block = DataSources::azure_search(parameters());
        assert_eq!(
            to_value(&block).unwrap(),
            json!({
                "data_sources": [{
                    "type": "azure_search",
                    "parameters": {
                        "endpoint": "https://search.example.net",
                        "index_name": "docs",
                        "semantic_configuration": "default",
                        "query_type": "simple",
                        "fields_mapping": {},
                        "in_scope": true,
                        "filter": null,
                        "strictness": 3,
                        "top_n_documents": 5,
                        "authentication": {"type": "api_key", "key": "secret"}
                    }
                }]
            })
        );
    }

    #[test]
    fn role_information_serialized_when_present() {
        let mut params = parameters();
        params.role_information = Some("Answer from the docs.".to_string());
        let json = to_value(&params).unwrap();
        assert_eq!(json["role_information"], "Answer from the docs.");
    }
}
