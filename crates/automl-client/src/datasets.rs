//! Image dataset creation and annotation import.

use tracing::{debug, info};

use crate::client::VertexClient;
use crate::error::{VertexError, VertexResult};
use crate::types::{
    Dataset, GcsSource, ImportDataConfig, ImportDataRequest, Operation, IMAGE_METADATA_SCHEMA,
};

impl VertexClient {
    /// Start creating an empty image dataset.
    pub async fn create_dataset(&self, display_name: &str) -> VertexResult<Operation> {
        let path = format!("{}/datasets", self.config().parent());
        let body = Dataset {
            display_name: display_name.to_string(),
            metadata_schema_uri: IMAGE_METADATA_SCHEMA.to_string(),
            ..Default::default()
        };

        info!(display_name = %display_name, "Creating image dataset");
        self.post("create_dataset", &path, &body).await
    }

    /// Create an image dataset and wait until it exists.
    pub async fn create_dataset_and_wait(&self, display_name: &str) -> VertexResult<Dataset> {
        let operation = self.create_dataset(display_name).await?;
        let dataset: Dataset = self.wait_for_operation_response(operation).await?;
        if dataset.name.is_none() {
            return Err(VertexError::invalid_response("Created dataset has no name"));
        }
        Ok(dataset)
    }

    pub async fn get_dataset(&self, dataset: &str) -> VertexResult<Dataset> {
        let name = self.resource_name("datasets", dataset);
        self.get("get_dataset", &name).await
    }

    /// Start importing annotation manifests into a dataset.
    pub async fn import_data(
        &self,
        dataset: &str,
        gcs_uris: &[String],
        import_schema_uri: &str,
    ) -> VertexResult<Operation> {
        if gcs_uris.is_empty() {
            return Err(VertexError::InvalidArgument(
                "At least one manifest URI is required".to_string(),
            ));
        }

        let name = self.resource_name("datasets", dataset);
        let path = format!("{}:import", name);
        let body = ImportDataRequest {
            import_configs: vec![ImportDataConfig {
                gcs_source: GcsSource {
                    uris: gcs_uris.to_vec(),
                },
                import_schema_uri: import_schema_uri.to_string(),
            }],
        };

        info!(dataset = %name, manifests = ?gcs_uris, "Importing annotations");
        self.post("import_data", &path, &body).await
    }

    /// Import manifests and wait for the import to finish.
    pub async fn import_data_and_wait(
        &self,
        dataset: &str,
        gcs_uris: &[String],
        import_schema_uri: &str,
    ) -> VertexResult<()> {
        let operation = self.import_data(dataset, gcs_uris, import_schema_uri).await?;
        self.wait_for_operation(operation).await?;
        Ok(())
    }

    /// Delete a dataset. A dataset that no longer exists counts as deleted.
    pub async fn delete_dataset(&self, dataset: &str) -> VertexResult<()> {
        let name = self.resource_name("datasets", dataset);
        match self.delete::<Operation>("delete_dataset", &name).await {
            Ok(operation) => {
                self.wait_for_operation(operation).await?;
                info!(dataset = %name, "Deleted dataset");
                Ok(())
            }
            Err(VertexError::NotFound(_)) => {
                debug!("Dataset {} already deleted (idempotent)", name);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
