use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An ordered chain of agents where one step's output feeds the next
/// step's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<PipelineStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_destinations: Option<Vec<OutputDestination>>,
    pub created_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.into(),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
            output_destinations: None,
            created_at: Utc::now(),
        }
    }
}

/// One step of a pipeline: the agent to invoke and how its input is
/// derived from the previous step's output (`direct` when absent).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStep {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_mapping: Option<String>,
}

/// Declarative delivery target for a pipeline's final output. Delivery
/// itself is out of scope; the record is metadata only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDestination {
    #[serde(rename = "type")]
    pub kind: String,
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_round_trips_through_json() {
        let mut pipeline = Pipeline::new("local", "draft-then-polish");
        pipeline.steps = vec![
            PipelineStep {
                agent_id: "a1".into(),
                input_mapping: None,
            },
            PipelineStep {
                agent_id: "a2".into(),
                input_mapping: Some("field.summary".into()),
            },
        ];

        let json = serde_json::to_value(&pipeline).unwrap();
        assert_eq!(json["steps"][1]["inputMapping"], "field.summary");

        let back: Pipeline = serde_json::from_value(json).unwrap();
        assert_eq!(back.steps.len(), 2);
        assert_eq!(back.steps[0].input_mapping, None);
    }
}
