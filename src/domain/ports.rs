use crate::domain::model::{BatchFailure, BatchRecord, BatchResult, ModelOutputs};
use crate::utils::error::Result;
use async_trait::async_trait;

/// A runtime able to evaluate an exported model on one input row.
pub trait InferenceBackend: Send + Sync {
    fn run(&self, input: &[f32]) -> Result<ModelOutputs>;
    fn input_len(&self) -> usize;
}

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Rows read from a source; rows that failed to parse are kept as failures.
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    pub records: Vec<BatchRecord>,
    pub rejected: Vec<BatchFailure>,
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Extracted>;
    async fn transform(&self, data: Extracted) -> Result<BatchResult>;
    async fn load(&self, result: BatchResult) -> Result<String>;
}
