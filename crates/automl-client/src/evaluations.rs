//! Model evaluation listing.

use automl_models::ImageObjectDetectionMetrics;

use crate::client::VertexClient;
use crate::error::{VertexError, VertexResult};
use crate::types::{ListModelEvaluationsResponse, Model, ModelEvaluation};

impl VertexClient {
    pub async fn get_model(&self, model: &str) -> VertexResult<Model> {
        let name = self.resource_name("models", model);
        self.get("get_model", &name).await
    }

    /// List every evaluation of a model, following pagination.
    pub async fn list_model_evaluations(&self, model: &str) -> VertexResult<Vec<ModelEvaluation>> {
        let name = self.resource_name("models", model);
        let mut evaluations = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let path = match &page_token {
                Some(token) => format!(
                    "{}/evaluations?pageToken={}",
                    name,
                    urlencoding::encode(token)
                ),
                None => format!("{}/evaluations", name),
            };

            let page: ListModelEvaluationsResponse =
                self.get("list_model_evaluations", &path).await?;
            evaluations.extend(page.model_evaluations);

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(evaluations)
    }
}

impl ModelEvaluation {
    /// Decode the metrics of an object detection evaluation.
    pub fn object_detection_metrics(&self) -> VertexResult<ImageObjectDetectionMetrics> {
        ImageObjectDetectionMetrics::from_value(&self.metrics).map_err(|e| {
            VertexError::invalid_response(format!(
                "Evaluation {} has unexpected metrics: {}",
                self.name, e
            ))
        })
    }
}
