use crate::config::SearchConfig;
use crate::http::{client, join_url, send_json};
use async_trait::async_trait;
use ensemble_skills::{
    fault, Capability, CapabilityDescriptor, CapabilityRequest, OperationDescriptor,
};
use serde_json::{json, Value};
use tracing::info;

const API_VERSION: &str = "2023-11-01";

/// Document and hotel search against a search index.
pub struct SearchCapability {
    descriptor: CapabilityDescriptor,
    config: SearchConfig,
    client: reqwest::Client,
}

impl SearchCapability {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            descriptor: CapabilityDescriptor {
                name: crate::SEARCH.to_string(),
                description: "Hotel recommendations and document retrieval over a search index."
                    .to_string(),
                primary_operation: "search_documents".to_string(),
                operations: vec![
                    OperationDescriptor {
                        name: "search_documents".to_string(),
                        description: "Search and retrieve relevant documents.".to_string(),
                        parameters_schema: json!({
                            "type": "object",
                            "properties": {
                                "query": {"type": "string", "description": "Search query"}
                            },
                            "required": ["query"]
                        }),
                    },
                    OperationDescriptor {
                        name: "analyze_search_trends".to_string(),
                        description: "Report how many indexed documents match a topic."
                            .to_string(),
                        parameters_schema: json!({
                            "type": "object",
                            "properties": {
                                "topic": {"type": "string", "description": "Topic to analyze"}
                            },
                            "required": ["topic"]
                        }),
                    },
                ],
            },
            config,
            client: client(),
        }
    }

    fn search_request(&self, endpoint: &str, body: Value) -> reqwest::RequestBuilder {
        let url = join_url(
            endpoint,
            &format!("indexes/{}/docs/search?api-version={API_VERSION}", self.config.index),
        );
        let mut request = self.client.post(url).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header("api-key", key);
        }
        request
    }

    async fn search_documents(&self, query: &str) -> Value {
        let Some(endpoint) = &self.config.endpoint else {
            return json!({
                "query": query,
                "mode": "simulated",
                "message": format!(
                    "Searched for '{query}'. No search endpoint is configured, \
                     so no documents were retrieved."
                ),
            });
        };

        info!(index = %self.config.index, query = %query, "Search documents");
        let body = json!({"search": query, "top": self.config.top});
        match send_json(self.search_request(endpoint, body), "Search").await {
            Ok(response) => {
                let documents = response["value"].as_array().cloned().unwrap_or_default();
                json!({
                    "query": query,
                    "count": documents.len(),
                    "documents": documents,
                })
            }
            Err(fault) => fault,
        }
    }

    async fn analyze_search_trends(&self, topic: &str) -> Value {
        let Some(endpoint) = &self.config.endpoint else {
            return json!({
                "topic": topic,
                "mode": "simulated",
                "message": format!(
                    "Analyzing search trends for '{topic}'. No search endpoint is configured."
                ),
            });
        };

        let body = json!({"search": topic, "top": 0, "count": true});
        match send_json(self.search_request(endpoint, body), "Search").await {
            Ok(response) => json!({
                "topic": topic,
                "matching_documents": response["@odata.count"].as_u64().unwrap_or(0),
            }),
            Err(fault) => fault,
        }
    }
}

#[async_trait]
impl Capability for SearchCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: CapabilityRequest) -> Value {
        match request.operation.as_str() {
            "search_documents" => match request.arg_str("query") {
                Some(query) => self.search_documents(query).await,
                None => fault("Missing argument", "'query' is required"),
            },
            "analyze_search_trends" => match request.arg_str("topic") {
                Some(topic) => self.analyze_search_trends(topic).await,
                None => fault("Missing argument", "'topic' is required"),
            },
            other => fault(
                format!("Unsupported operation: {other}"),
                "search exposes search_documents and analyze_search_trends",
            ),
        }
    }
}
