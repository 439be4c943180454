use crate::config::BusinessIntelligenceConfig;
use async_trait::async_trait;
use ensemble_skills::{
    fault, Capability, CapabilityDescriptor, CapabilityRequest, OperationDescriptor,
};
use rand::Rng;
use serde_json::{json, Value};
use tracing::debug;

/// Lakehouse KPI queries over taxi trip data.
///
/// The lakehouse itself is not queried: answers are simulated by keyword with
/// randomized but plausible figures, so a configured connection name only
/// gates availability.
pub struct BusinessIntelligenceCapability {
    descriptor: CapabilityDescriptor,
    config: BusinessIntelligenceConfig,
}

impl BusinessIntelligenceCapability {
    pub fn new(config: BusinessIntelligenceConfig) -> Self {
        Self {
            descriptor: CapabilityDescriptor {
                name: crate::BUSINESS_INTELLIGENCE.to_string(),
                description: "Business intelligence over taxi trip data: \
                              holiday vs weekday, fares, day vs night."
                    .to_string(),
                primary_operation: "query_fabric".to_string(),
                operations: vec![OperationDescriptor {
                    name: "query_fabric".to_string(),
                    description: "Query the lakehouse for trip statistics.".to_string(),
                    parameters_schema: json!({
                        "type": "object",
                        "properties": {
                            "question": {"type": "string"},
                            "query_type": {
                                "type": "string",
                                "description": "general, stats, trends, anomaly, geography",
                                "default": "general"
                            }
                        },
                        "required": ["question"]
                    }),
                }],
            },
            config,
        }
    }

    fn query(&self, question: &str, query_type: &str) -> Value {
        if self.config.connection.is_none() {
            return fault(
                "Business intelligence connection not initialized",
                "Set business_intelligence.connection (BI_CONNECTION_NAME)",
            );
        }

        debug!(query_type = %query_type, "Lakehouse query");
        let lower = question.to_lowercase();
        let mut rng = rand::thread_rng();

        let result = if lower.contains("trip count") {
            let holiday_trips: u32 = rng.gen_range(45_000..=55_000);
            let weekday_trips: u32 = rng.gen_range(65_000..=75_000);
            let difference = weekday_trips - holiday_trips;
            json!({
                "holiday_trips": holiday_trips,
                "weekday_trips": weekday_trips,
                "difference": difference,
                "analysis": format!(
                    "Weekday trips ({weekday_trips}) exceed holiday trips ({holiday_trips}) by {difference}"
                ),
            })
        } else if lower.contains("fare") {
            let average_fare = round2(rng.gen_range(12.5..=15.8));
            let high_fare_trips: u32 = rng.gen_range(8_000..=12_000);
            let total_trips: u32 = rng.gen_range(500_000..=600_000);
            let percentage = round2(f64::from(high_fare_trips) / f64::from(total_trips) * 100.0);
            json!({
                "average_fare": average_fare,
                "high_fare_trips": high_fare_trips,
                "total_trips": total_trips,
                "percentage": percentage,
                "analysis": format!(
                    "Average fare is ${average_fare}; high-fare trips (> $70) are {percentage}% of all trips"
                ),
            })
        } else if lower.contains("day") && lower.contains("night") {
            let day_trips: u32 = rng.gen_range(380_000..=420_000);
            let night_trips: u32 = rng.gen_range(180_000..=220_000);
            let day_avg_fare = round2(rng.gen_range(13.2..=15.5));
            let night_avg_fare = round2(rng.gen_range(14.8..=17.2));
            json!({
                "day_trips": day_trips,
                "night_trips": night_trips,
                "day_avg_fare": day_avg_fare,
                "night_avg_fare": night_avg_fare,
                "analysis": format!(
                    "Day: {day_trips} trips (avg ${day_avg_fare}); night: {night_trips} trips (avg ${night_avg_fare})"
                ),
            })
        } else {
            json!({
                "message": "Simulated analysis of taxi trip data",
                "data_source": "lakehouse (simulated)",
                "note": "No SQL was executed against the lakehouse",
            })
        };

        json!({
            "query": question,
            "query_type": query_type,
            "result": result,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[async_trait]
impl Capability for BusinessIntelligenceCapability {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn invoke(&self, request: CapabilityRequest) -> Value {
        if request.operation != "query_fabric" {
            return fault(
                format!("Unsupported operation: {}", request.operation),
                "business_intelligence exposes query_fabric",
            );
        }
        let Some(question) = request.arg_str("question") else {
            return fault("Missing argument", "'question' is required");
        };
        let query_type = request.arg_str("query_type").unwrap_or("general");
        self.query(question, query_type)
    }
}
