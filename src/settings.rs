//! Typed settings resolved from an [`Environment`] snapshot.
//!
//! - [`ModelSettings`]: the hosted completion deployment.  Required for direct mode.
//! - [`SearchSettings`]: optional search index grounding ("on your data").
//! - [`ProxySettings`]: the local proxy backend.

use std::fmt;
use std::time::Duration;

use serde_json::Map;

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::types::{AzureSearchParameters, DataSources, SearchAuthentication};

/// API version sent to the hosted completion service.
pub const DEFAULT_API_VERSION: &str = "2025-01-01-preview";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: i64 = 60;

/// Default semantic configuration name.
pub const DEFAULT_SEMANTIC_CONFIGURATION: &str = "default";

/// Default query type.
pub const DEFAULT_QUERY_TYPE: &str = "simple";

/// Default retrieval strictness.
pub const DEFAULT_STRICTNESS: i64 = 3;

/// Default number of retrieved documents.
pub const DEFAULT_TOP_N_DOCUMENTS: i64 = 5;

/// Default proxy backend address.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/";

/// Default idle period after which an open stream is abandoned, in seconds.
pub const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: i64 = 60;

/// Connection settings for the hosted completion deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelSettings {
    /// Service endpoint, e.g. `https://my-resource.openai.azure.com/`.
    pub endpoint: String,
    /// Deployment (model) name.
    pub deployment: String,
    /// API key.
    pub api_key: String,
    /// API version query parameter.
    pub api_version: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl ModelSettings {
    /// Resolve model settings; endpoint, deployment and key are required.
    pub fn from_env(env: &Environment) -> Result<Self> {
        let endpoint = required(env, "ENDPOINT_URL", "Your Azure OpenAI endpoint URL")?;
        let deployment = required(env, "DEPLOYMENT_NAME", "Your deployment model name")?;
        let api_key = required(env, "AZURE_OPENAI_API_KEY", "Your Azure OpenAI API key")?;
        Ok(Self {
            endpoint,
            deployment,
            api_key,
            api_version: env.resolve("AZURE_OPENAI_API_VERSION", &[], DEFAULT_API_VERSION),
            timeout: seconds(env.resolve_int("REQUEST_TIMEOUT_SECS", &[], DEFAULT_TIMEOUT_SECS)),
        })
    }

    /// Short label for the endpoint: everything before the first dot.
    pub fn endpoint_label(&self) -> &str {
        self.endpoint.split('.').next().unwrap_or(&self.endpoint)
    }
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("endpoint", &self.endpoint)
            .field("deployment", &self.deployment)
            .field("api_key", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Whether search grounding is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalStatus {
    /// Endpoint, index and key are all set.
    On {
        /// Index that answers are grounded in.
        index: String,
    },
    /// Some but not all of endpoint, index and key are set.
    Partial,
    /// Nothing is set.
    Off,
}

impl fmt::Display for RetrievalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalStatus::On { index } => write!(f, "Retrieval: ON · Index: {index}"),
            RetrievalStatus::Partial => {
                write!(f, "Retrieval: PARTIAL (incomplete configuration detected)")
            }
            RetrievalStatus::Off => write!(f, "Retrieval: OFF"),
        }
    }
}

/// Search index grounding settings.
#[derive(Clone, PartialEq, Eq)]
pub struct SearchSettings {
    /// Search service endpoint.
    pub endpoint: Option<String>,
    /// Index name.
    pub index_name: Option<String>,
    /// Search service key.
    pub key: Option<String>,
    /// Semantic configuration name.
    pub semantic_configuration: String,
    /// Query type.
    pub query_type: String,
    /// Restrict answers to retrieved documents.
    pub in_scope: bool,
    /// Retrieval strictness.
    pub strictness: i64,
    /// Number of documents to retrieve.
    pub top_n_documents: i64,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            index_name: None,
            key: None,
            semantic_configuration: DEFAULT_SEMANTIC_CONFIGURATION.to_string(),
            query_type: DEFAULT_QUERY_TYPE.to_string(),
            in_scope: true,
            strictness: DEFAULT_STRICTNESS,
            top_n_documents: DEFAULT_TOP_N_DOCUMENTS,
        }
    }
}

impl SearchSettings {
    /// Resolve search settings.  Never fails; missing values disable grounding.
    pub fn from_env(env: &Environment) -> Self {
        Self {
            endpoint: env
                .first_nonempty("SEARCH_ENDPOINT", &["AZURE_AI_SEARCH_ENDPOINT"])
                .map(String::from),
            index_name: env
                .first_nonempty("SEARCH_INDEX_NAME", &["AZURE_AI_SEARCH_INDEX_NAME"])
                .map(String::from),
            key: env
                .first_nonempty(
                    "SEARCH_KEY",
                    &["AZURE_AI_SEARCH_ADMIN_KEY", "AZURE_AI_SEARCH_API_KEY"],
                )
                .map(String::from),
            semantic_configuration: env.resolve(
                "AZURE_AI_SEARCH_SEMANTIC_CONFIGURATION",
                &[],
                DEFAULT_SEMANTIC_CONFIGURATION,
            ),
            query_type: env.resolve("AZURE_AI_SEARCH_QUERY_TYPE", &[], DEFAULT_QUERY_TYPE),
            in_scope: env.resolve_bool("AZURE_AI_SEARCH_IN_SCOPE", &[], true),
            strictness: env.resolve_int("AZURE_AI_SEARCH_STRICTNESS", &[], DEFAULT_STRICTNESS),
            top_n_documents: env.resolve_int(
                "AZURE_AI_SEARCH_TOPN",
                &[],
                DEFAULT_TOP_N_DOCUMENTS,
            ),
        }
    }

    /// Build the data source block for one request.
    ///
    /// Returns `None` unless endpoint, index and key are all non-blank.
    /// `role_information` is attached only when it is non-blank.
    pub fn descriptor(&self, role_information: Option<&str>) -> Option<DataSources> {
        let endpoint = nonblank(self.endpoint.as_deref())?;
        let index_name = nonblank(self.index_name.as_deref())?;
        let key = nonblank(self.key.as_deref())?;
        Some(DataSources::azure_search(AzureSearchParameters {
            endpoint: endpoint.to_string(),
            index_name: index_name.to_string(),
            semantic_configuration: self.semantic_configuration.clone(),
            query_type: self.query_type.clone(),
            fields_mapping: Map::new(),
            in_scope: self.in_scope,
            filter: None,
            strictness: self.strictness,
            top_n_documents: self.top_n_documents,
            authentication: SearchAuthentication::ApiKey {
                key: key.to_string(),
            },
            role_information: nonblank(role_information).map(String::from),
        }))
    }

    /// Summarize whether grounding is configured.
    pub fn status(&self) -> RetrievalStatus {
        let parts = [
            nonblank(self.endpoint.as_deref()),
            nonblank(self.index_name.as_deref()),
            nonblank(self.key.as_deref()),
        ];
        match (parts.iter().all(Option::is_some), parts.iter().any(Option::is_some)) {
            (true, _) => RetrievalStatus::On {
                index: self.index_name.clone().unwrap_or_default(),
            },
            (false, true) => RetrievalStatus::Partial,
            (false, false) => RetrievalStatus::Off,
        }
    }
}

impl fmt::Debug for SearchSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchSettings")
            .field("endpoint", &self.endpoint)
            .field("index_name", &self.index_name)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("semantic_configuration", &self.semantic_configuration)
            .field("query_type", &self.query_type)
            .field("in_scope", &self.in_scope)
            .field("strictness", &self.strictness)
            .field("top_n_documents", &self.top_n_documents)
            .finish()
    }
}

/// Settings for the local proxy backend.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Backend base address; `chat` is resolved against it.
    pub base_url: String,
    /// Basic-auth user name.
    pub username: Option<String>,
    /// Basic-auth password.
    pub password: Option<String>,
    /// Connect timeout for the backend.
    pub connect_timeout: Duration,
    /// Longest silence tolerated on an open stream.
    pub idle_timeout: Duration,
}

impl ProxySettings {
    /// Resolve proxy settings.  Every value has a default.
    pub fn from_env(env: &Environment) -> Self {
        Self {
            base_url: env.resolve("BACKEND_URL", &["CHAT_BACKEND_URL"], DEFAULT_BACKEND_URL),
            username: env.resolve_opt("BASIC_AUTH_USERNAME", &[]),
            password: env.resolve_opt("BASIC_AUTH_PASSWORD", &[]),
            connect_timeout: seconds(env.resolve_int(
                "REQUEST_TIMEOUT_SECS",
                &[],
                DEFAULT_TIMEOUT_SECS,
            )),
            idle_timeout: seconds(env.resolve_int(
                "STREAM_IDLE_TIMEOUT_SECS",
                &[],
                DEFAULT_STREAM_IDLE_TIMEOUT_SECS,
            )),
        }
    }

    /// Override the backend address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

fn required(env: &Environment, name: &str, description: &str) -> Result<String> {
    env.resolve_opt(name, &[])
        .ok_or_else(|| Error::configuration_missing(name, description))
}

fn nonblank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// Non-positive values fall back to one second rather than disabling the timeout.
fn seconds(value: i64) -> Duration {
    Duration::from_secs(value.max(1) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataSource;

    fn search_env() -> Environment {
        Environment::from_pairs([
            ("AZURE_AI_SEARCH_ENDPOINT", "https://search.example.net"),
            ("SEARCH_INDEX_NAME", "docs"),
            ("AZURE_AI_SEARCH_API_KEY", "secret"),
        ])
    }

    fn parameters(block: &DataSources) -> &AzureSearchParameters {
        match &block.data_sources[0] {
            DataSource::AzureSearch(params) => params,
        }
    }

    #[test]
    fn model_settings_require_all_three() {
        let env = Environment::from_pairs([
            ("ENDPOINT_URL", "https://res.openai.azure.com/"),
            ("DEPLOYMENT_NAME", "gpt-4o-mini"),
        ]);
        let err = ModelSettings::from_env(&env).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn model_settings_defaults() {
        let env = Environment::from_pairs([
            ("ENDPOINT_URL", "https://res.openai.azure.com/"),
            ("DEPLOYMENT_NAME", "gpt-4o-mini"),
            ("AZURE_OPENAI_API_KEY", "key"),
        ]);
        let settings = ModelSettings::from_env(&env).unwrap();
        assert_eq!(settings.api_version, DEFAULT_API_VERSION);
        assert_eq!(settings.timeout, Duration::from_secs(60));
        assert_eq!(settings.endpoint_label(), "https://res");
        assert!(format!("{settings:?}").contains("<redacted>"));
    }

    #[test]
    fn search_defaults() {
        let settings = SearchSettings::from_env(&Environment::default());
        assert_eq!(settings, SearchSettings::default());
        assert_eq!(settings.status(), RetrievalStatus::Off);
        assert!(settings.descriptor(Some("system")).is_none());
    }

    #[test]
    fn search_aliases_and_bad_numbers() {
        let mut pairs = vec![
            ("AZURE_AI_SEARCH_STRICTNESS", "strict"),
            ("AZURE_AI_SEARCH_TOPN", "many"),
            ("AZURE_AI_SEARCH_IN_SCOPE", "off"),
        ];
        pairs.extend([
            ("AZURE_AI_SEARCH_ENDPOINT", "https://search.example.net"),
            ("SEARCH_INDEX_NAME", "docs"),
            ("AZURE_AI_SEARCH_ADMIN_KEY", "admin"),
            ("AZURE_AI_SEARCH_API_KEY", "api"),
        ]);
        let settings = SearchSettings::from_env(&Environment::from_pairs(pairs));
        assert_eq!(settings.strictness, 3);
        assert_eq!(settings.top_n_documents, 5);
        assert!(!settings.in_scope);
        assert_eq!(settings.key.as_deref(), Some("admin"));
    }

    #[test]
    fn descriptor_copies_fields_verbatim() {
        let settings = SearchSettings::from_env(&search_env());
        let block = settings.descriptor(None).unwrap();
        let params = parameters(&block);
        assert_eq!(params.endpoint, "https://search.example.net");
        assert_eq!(params.index_name, "docs");
        assert_eq!(params.semantic_configuration, "default");
        assert_eq!(params.query_type, "simple");
        assert!(params.in_scope);
        assert_eq!(params.strictness, 3);
        assert_eq!(params.top_n_documents, 5);
        assert_eq!(
            params.authentication,
            SearchAuthentication::ApiKey {
                key: "secret".to_string()
            }
        );
        assert!(params.role_information.is_none());
    }

    #[test]
    fn descriptor_role_information_only_when_nonblank() {
        let settings = SearchSettings::from_env(&search_env());
        let block = settings.descriptor(Some("Ground answers.")).unwrap();
        assert_eq!(
            parameters(&block).role_information.as_deref(),
            Some("Ground answers.")
        );
        let block = settings.descriptor(Some("   ")).unwrap();
        assert!(parameters(&block).role_information.is_none());
        let block = settings.descriptor(Some("")).unwrap();
        assert!(parameters(&block).role_information.is_none());
    }

    #[test]
    fn descriptor_absent_on_partial_or_blank() {
        let full = SearchSettings::from_env(&search_env());
        assert_eq!(
            full.status(),
            RetrievalStatus::On {
                index: "docs".to_string()
            }
        );

        for blank in ["", "   ", "\t"] {
            let mut settings = full.clone();
            settings.endpoint = Some(blank.to_string());
            assert!(settings.descriptor(None).is_none());

            let mut settings = full.clone();
            settings.index_name = Some(blank.to_string());
            assert!(settings.descriptor(None).is_none());

            let mut settings = full.clone();
            settings.key = Some(blank.to_string());
            assert!(settings.descriptor(None).is_none());
            assert_eq!(settings.status(), RetrievalStatus::Partial);
        }

        let mut settings = full.clone();
        settings.key = None;
        assert!(settings.descriptor(None).is_none());
        assert_eq!(
            settings.status().to_string(),
            "Retrieval: PARTIAL (incomplete configuration detected)"
        );
    }

    #[test]
    fn proxy_settings() {
        let settings = ProxySettings::from_env(&Environment::from_pairs([
            ("CHAT_BACKEND_URL", "http://backend:9000/"),
            ("BASIC_AUTH_USERNAME", "user"),
            ("STREAM_IDLE_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(settings.base_url, "http://backend:9000/");
        assert_eq!(settings.username.as_deref(), Some("user"));
        assert!(settings.password.is_none());
        assert_eq!(settings.idle_timeout, Duration::from_secs(5));

        let settings = ProxySettings::from_env(&Environment::default());
        assert_eq!(settings.base_url, DEFAULT_BACKEND_URL);
        assert_eq!(settings.idle_timeout, Duration::from_secs(60));
    }
}
