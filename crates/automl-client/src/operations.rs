//! Long-running operation polling.

use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::client::VertexClient;
use crate::error::{VertexError, VertexResult};
use crate::metrics::record_poll;
use crate::types::Operation;

impl VertexClient {
    /// Fetch the current state of an operation by its full name.
    pub async fn get_operation(&self, name: &str) -> VertexResult<Operation> {
        self.get("get_operation", name).await
    }

    /// Poll until the operation is done.
    ///
    /// An operation that finishes with an `error` status is returned as
    /// [`VertexError::OperationFailed`].
    pub async fn wait_for_operation(&self, operation: Operation) -> VertexResult<Operation> {
        let started = Instant::now();
        let mut current = operation;

        loop {
            if current.done {
                if let Some(status) = current.error {
                    return Err(VertexError::OperationFailed {
                        name: current.name,
                        code: status.code,
                        message: status.message,
                    });
                }
                info!(
                    operation = %current.name,
                    elapsed_secs = started.elapsed().as_secs(),
                    "Operation completed"
                );
                return Ok(current);
            }

            if started.elapsed() >= self.config().operation_timeout {
                return Err(VertexError::Timeout(current.name));
            }

            debug!(operation = %current.name, "Operation still running");
            tokio::time::sleep(self.config().poll_interval).await;
            record_poll("operation");
            current = self.get_operation(&current.name).await?;
        }
    }

    /// Wait for the operation and decode its `response` payload.
    pub async fn wait_for_operation_response<T>(&self, operation: Operation) -> VertexResult<T>
    where
        T: DeserializeOwned,
    {
        let done = self.wait_for_operation(operation).await?;
        let response = done.response.ok_or_else(|| {
            VertexError::invalid_response(format!("Operation {} has no response", done.name))
        })?;
        Ok(serde_json::from_value(response)?)
    }
}
