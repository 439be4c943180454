use crate::config::AnalyticsConfig;
use crate::http::{client, join_url, send_json};
use async_trait::async_trait;
use ensemble_skills::{
    fault, Capability, CapabilityDescriptor, CapabilityRequest, OperationDescriptor,
};
use rand::Rng;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Natural-language analytics conversations against a data-space API.
///
/// A question either starts a new conversation or continues an existing one
/// when a `conversation_id` is supplied. Tabular answers are formatted for
/// display: nulls as `NULL`, decimals with two places, integers and decimals
/// with thousands separators.
///
/// Without an endpoint and space id the answers are simulated from keywords
/// in the question, over taxi trip data.
pub struct AnalyticsCapability {
    descriptor: CapabilityDescriptor,
    config: AnalyticsConfig,
    client: reqwest::Client,
}

impl AnalyticsCapability {
    pub fn new(config: AnalyticsConfig) -> Self {
        Self {
            descriptor: CapabilityDescriptor {
                name: crate::ANALYTICS.to_string(),
                description: "Big-data analytics: transactions, user behaviour, system metrics."
                    .to_string(),
                primary_operation: "ask_genie".to_string(),
                operations: vec![OperationDescriptor {
                    name: "ask_genie".to_string(),
                    description: "Ask an analytics question; reuse conversation_id to keep context."
                        .to_string(),
                    parameters_schema: json!({
                        "type": "object",
                        "properties": {
                            "question": {"type": "string"},
                            "conversation_id": {"type": "string"}
                        },
                        "required": ["question"]
                    }),
                }],
            },
            config,
            client: client(),
        }
    }

    async fn ask(&self, question: &str, conversation_id: Option<&str>) -> Value {
        let (Some(endpoint), Some(space_id)) = (&self.config.endpoint, &self.config.space_id)
        else {
            return simulate(question, conversation_id);
        };

        let path = match conversation_id {
            Some(id) => format!("spaces/{space_id}/conversations/{id}/messages"),
            None => format!("spaces/{space_id}/conversations"),
        };
        info!(space = %space_id, continuing = conversation_id.is_some(), "Analytics question");

        let mut request = self
            .client
            .post(join_url(endpoint, &path))
            .json(&json!({"content": question}));
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = match send_json(request, "Analytics").await {
            Ok(r) => r,
            Err(fault) => return fault,
        };

        let conversation_id = response["conversation_id"]
            .as_str()
            .or(conversation_id)
            .unwrap_or_default()
            .to_string();

        if let Some(table) = response.get("table").filter(|t| t.is_object()) {
            return json!({
                "conversation_id": conversation_id,
                "table": format_table(table),
            });
        }

        let message = response["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .unwrap_or("No content returned.");
        json!({
            "conversation_id": conversation_id,
            "message": message,
        })
    }
}

#[async_trait]
impl Capability for AnalyticsCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: CapabilityRequest) -> Value {
        if request.operation != "ask_genie" {
            return fault(
                format!("Unsupported operation: {}", request.operation),
                "analytics exposes ask_genie",
            );
        }
        let Some(question) = request.arg_str("question") else {
            return fault("Missing argument", "'question' is required");
        };
        // Models sometimes send the literal string "null".
        let conversation_id = request.arg_str("conversation_id").filter(|id| *id != "null");
        self.ask(question, conversation_id).await
    }
}

/// Keyword-driven answer used when no analytics space is configured.
fn simulate(question: &str, conversation_id: Option<&str>) -> Value {
    let lower = question.to_lowercase();
    let mentions = |words: &[&str]| words.iter().any(|w| lower.contains(*w));
    let mut rng = rand::thread_rng();

    let conversation_id = conversation_id
        .map(str::to_string)
        .unwrap_or_else(|| format!("conv_{}", rng.gen_range(1000..=9999)));
    debug!(conversation = %conversation_id, "Simulated analytics answer");

    let table = if mentions(&["average", "fare", "cost"]) {
        json!({
            "columns": [
                {"name": "metric", "type_name": "STRING"},
                {"name": "value", "type_name": "DECIMAL"},
                {"name": "currency", "type_name": "STRING"}
            ],
            "rows": [
                ["Average Fare", rng.gen_range(12.5..18.7), "USD"],
                ["Median Fare", rng.gen_range(10.2..15.8), "USD"],
                ["Max Fare", rng.gen_range(150.0..350.0), "USD"]
            ]
        })
    } else if mentions(&["trips", "count", "number"]) {
        json!({
            "columns": [
                {"name": "time_period", "type_name": "STRING"},
                {"name": "trip_count", "type_name": "BIGINT"},
                {"name": "percentage", "type_name": "STRING"}
            ],
            "rows": [
                ["Morning (6-12)", rng.gen_range(25_000..=35_000), "28%"],
                ["Afternoon (12-18)", rng.gen_range(30_000..=40_000), "32%"],
                ["Evening (18-24)", rng.gen_range(20_000..=30_000), "24%"],
                ["Night (0-6)", rng.gen_range(10_000..=20_000), "16%"]
            ]
        })
    } else if mentions(&["distance", "mile", "km"]) {
        json!({
            "columns": [
                {"name": "distance_range", "type_name": "STRING"},
                {"name": "trip_count", "type_name": "BIGINT"},
                {"name": "avg_fare_usd", "type_name": "DECIMAL"}
            ],
            "rows": [
                ["0-2 miles", rng.gen_range(40_000..=60_000), rng.gen_range(8.0..12.0)],
                ["2-5 miles", rng.gen_range(30_000..=50_000), rng.gen_range(15.0..25.0)],
                ["5-10 miles", rng.gen_range(15_000..=25_000), rng.gen_range(28.0..45.0)],
                ["10+ miles", rng.gen_range(5_000..=15_000), rng.gen_range(50.0..85.0)]
            ]
        })
    } else if mentions(&["pickup", "location", "zone", "area"]) {
        let rows: Vec<Value> = [
            "Manhattan Midtown",
            "JFK Airport",
            "LaGuardia Airport",
            "Brooklyn",
            "Queens",
        ]
        .iter()
        .map(|zone| json!([zone, rng.gen_range(5_000..=25_000), rng.gen_range(12.0..28.0)]))
        .collect();
        json!({
            "columns": [
                {"name": "pickup_location", "type_name": "STRING"},
                {"name": "trip_count", "type_name": "BIGINT"},
                {"name": "avg_fare_usd", "type_name": "DECIMAL"}
            ],
            "rows": rows
        })
    } else {
        return json!({
            "conversation_id": conversation_id,
            "message": format!(
                "Based on the NYC taxi dataset analysis: {question}. The data shows various \
                 patterns in taxi usage across different time periods and locations."
            ),
        });
    };

    json!({
        "conversation_id": conversation_id,
        "table": format_table(&table),
    })
}

/// Convert `{columns: [{name, type_name}], rows: [[..]]}` into display form.
fn format_table(table: &Value) -> Value {
    let columns = table["columns"].as_array().cloned().unwrap_or_default();
    let headers: Vec<String> = columns
        .iter()
        .map(|c| c["name"].as_str().unwrap_or_default().to_string())
        .collect();
    let types: Vec<String> = columns
        .iter()
        .map(|c| c["type_name"].as_str().unwrap_or_default().to_uppercase())
        .collect();

    let rows: Vec<Vec<String>> = table["rows"]
        .as_array()
        .map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| {
                            cells
                                .iter()
                                .zip(types.iter())
                                .map(|(cell, ty)| format_cell(cell, ty))
                                .collect()
                        })
                        .unwrap_or_default()
                })
                .collect()
        })
        .unwrap_or_default();

    json!({"columns": headers, "rows": rows})
}

fn format_cell(value: &Value, type_name: &str) -> String {
    let raw = match value {
        Value::Null => return "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match type_name {
        "DECIMAL" | "DOUBLE" | "FLOAT" => match raw.parse::<f64>() {
            Ok(n) => {
                let fixed = format!("{n:.2}");
                let (int_part, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
                format!("{}.{frac}", group_thousands(int_part))
            }
            Err(_) => raw,
        },
        "INT" | "BIGINT" | "LONG" => match raw.parse::<i64>() {
            Ok(n) => group_thousands(&n.to_string()),
            Err(_) => raw,
        },
        _ => raw,
    }
}

fn group_thousands(digits: &str) -> String {
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", digits),
    };
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    format!("{sign}{out}")
}
