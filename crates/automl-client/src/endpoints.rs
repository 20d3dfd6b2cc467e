//! Endpoints, model deployment and online prediction.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::client::VertexClient;
use crate::error::{VertexError, VertexResult};
use crate::types::{
    AutomaticResources, DeployModelRequest, DeployModelResponse, DeployedModel, Endpoint,
    ImageInstance, Operation, PredictRequest, PredictResponse, PredictionParameters,
    UndeployModelRequest,
};

impl VertexClient {
    /// Start creating an empty endpoint.
    pub async fn create_endpoint(&self, display_name: &str) -> VertexResult<Operation> {
        let path = format!("{}/endpoints", self.config().parent());
        let body = Endpoint {
            display_name: display_name.to_string(),
            ..Default::default()
        };

        info!(display_name = %display_name, "Creating endpoint");
        self.post("create_endpoint", &path, &body).await
    }

    pub async fn create_endpoint_and_wait(&self, display_name: &str) -> VertexResult<Endpoint> {
        let operation = self.create_endpoint(display_name).await?;
        let endpoint: Endpoint = self.wait_for_operation_response(operation).await?;
        if endpoint.name.is_none() {
            return Err(VertexError::invalid_response("Created endpoint has no name"));
        }
        Ok(endpoint)
    }

    pub async fn get_endpoint(&self, endpoint: &str) -> VertexResult<Endpoint> {
        let name = self.resource_name("endpoints", endpoint);
        self.get("get_endpoint", &name).await
    }

    /// Start deploying a model to an endpoint with all traffic routed to it.
    pub async fn deploy_model(
        &self,
        endpoint: &str,
        model: &str,
        display_name: &str,
        resources: AutomaticResources,
    ) -> VertexResult<Operation> {
        if resources.min_replica_count == 0 || resources.max_replica_count < resources.min_replica_count {
            return Err(VertexError::InvalidArgument(format!(
                "Invalid replica counts: min={} max={}",
                resources.min_replica_count, resources.max_replica_count
            )));
        }

        let endpoint = self.resource_name("endpoints", endpoint);
        let path = format!("{}:deployModel", endpoint);
        let body = DeployModelRequest {
            deployed_model: DeployedModel {
                id: None,
                model: self.resource_name("models", model),
                display_name: display_name.to_string(),
                automatic_resources: Some(resources),
            },
            traffic_split: BTreeMap::from([("0".to_string(), 100)]),
        };

        info!(
            endpoint = %endpoint,
            model = %body.deployed_model.model,
            min_replicas = resources.min_replica_count,
            max_replicas = resources.max_replica_count,
            "Deploying model"
        );
        self.post("deploy_model", &path, &body).await
    }

    /// Deploy a model and wait; returns the deployed model id.
    pub async fn deploy_model_and_wait(
        &self,
        endpoint: &str,
        model: &str,
        display_name: &str,
        resources: AutomaticResources,
    ) -> VertexResult<String> {
        let operation = self
            .deploy_model(endpoint, model, display_name, resources)
            .await?;
        let response: DeployModelResponse = self.wait_for_operation_response(operation).await?;
        response
            .deployed_model
            .id
            .ok_or_else(|| VertexError::invalid_response("Deploy response has no deployed model id"))
    }

    /// Request detections for base64-encoded images.
    pub async fn predict(
        &self,
        endpoint: &str,
        instances: Vec<ImageInstance>,
        parameters: PredictionParameters,
    ) -> VertexResult<PredictResponse> {
        if instances.is_empty() {
            return Err(VertexError::InvalidArgument(
                "At least one instance is required".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&parameters.confidence_threshold) {
            return Err(VertexError::InvalidArgument(format!(
                "Confidence threshold {} is outside [0, 1]",
                parameters.confidence_threshold
            )));
        }

        let endpoint = self.resource_name("endpoints", endpoint);
        let path = format!("{}:predict", endpoint);
        let instance_count = instances.len();
        let body = PredictRequest {
            instances,
            parameters,
        };

        let response: PredictResponse = self.post("predict", &path, &body).await?;
        if response.predictions.len() != instance_count {
            warn!(
                expected = instance_count,
                received = response.predictions.len(),
                "Prediction count differs from instance count"
            );
        }
        Ok(response)
    }

    pub async fn undeploy_model(
        &self,
        endpoint: &str,
        deployed_model_id: &str,
    ) -> VertexResult<Operation> {
        let endpoint = self.resource_name("endpoints", endpoint);
        let path = format!("{}:undeployModel", endpoint);
        let body = UndeployModelRequest {
            deployed_model_id: deployed_model_id.to_string(),
        };

        info!(endpoint = %endpoint, deployed_model_id = %deployed_model_id, "Undeploying model");
        self.post("undeploy_model", &path, &body).await
    }

    pub async fn undeploy_model_and_wait(
        &self,
        endpoint: &str,
        deployed_model_id: &str,
    ) -> VertexResult<()> {
        let operation = self.undeploy_model(endpoint, deployed_model_id).await?;
        self.wait_for_operation(operation).await?;
        Ok(())
    }

    /// Undeploy everything on the endpoint, then delete it.
    /// An endpoint that no longer exists counts as deleted.
    pub async fn delete_endpoint(&self, endpoint: &str) -> VertexResult<()> {
        let name = self.resource_name("endpoints", endpoint);

        let existing = match self.get_endpoint(&name).await {
            Ok(e) => e,
            Err(VertexError::NotFound(_)) => {
                debug!("Endpoint {} already deleted (idempotent)", name);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        for deployed in existing.deployed_models.iter() {
            if let Some(id) = deployed.id.as_deref() {
                self.undeploy_model_and_wait(&name, id).await?;
            }
        }

        self.delete_resource("delete_endpoint", &name).await
    }

    /// Delete a model. A model that no longer exists counts as deleted.
    pub async fn delete_model(&self, model: &str) -> VertexResult<()> {
        let name = self.resource_name("models", model);
        self.delete_resource("delete_model", &name).await
    }

    async fn delete_resource(&self, operation: &str, name: &str) -> VertexResult<()> {
        match self.delete::<Operation>(operation, name).await {
            Ok(op) => {
                self.wait_for_operation(op).await?;
                info!(resource = %name, "Deleted");
                Ok(())
            }
            Err(VertexError::NotFound(_)) => {
                debug!("{} already deleted (idempotent)", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
