use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub output_path: String,
    pub predicted: usize,
    pub failed: usize,
}

pub struct SwipEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> SwipEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();
        tracing::info!("Starting batch inference");

        let extracted = self.pipeline.extract().await?;
        tracing::info!(
            "Extracted {} samples ({} rejected)",
            extracted.records.len(),
            extracted.rejected.len()
        );

        let result = self.pipeline.transform(extracted).await?;
        let predicted = result.predictions.len();
        let failed = result.failures.len();
        tracing::info!("Classified {} samples, {} failures", predicted, failed);

        let output_path = self.pipeline.load(result).await?;
        tracing::info!("Reports written to {} in {:?}", output_path, started.elapsed());

        Ok(RunSummary {
            output_path,
            predicted,
            failed,
        })
    }
}
