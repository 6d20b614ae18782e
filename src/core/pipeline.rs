use crate::core::classifier::Classifier;
use crate::domain::model::{BatchFailure, BatchRecord, BatchResult, FeatureSample};
use crate::domain::ports::{Extracted, Pipeline, Storage};
use crate::utils::error::{Result, SwipError};
use std::sync::Arc;

pub const PREDICTIONS_CSV: &str = "predictions.csv";
pub const PREDICTIONS_JSON: &str = "predictions.json";
pub const FAILURES_CSV: &str = "failures.csv";

const DEFAULT_ID_COLUMN: &str = "id";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub input_path: String,
    pub id_column: Option<String>,
    pub output_dir: String,
    pub formats: Vec<String>,
}

/// Classifies every row of a feature CSV and writes prediction reports.
pub struct BatchPipeline<S: Storage> {
    storage: S,
    classifier: Arc<Classifier>,
    options: BatchOptions,
}

impl<S: Storage> BatchPipeline<S> {
    pub fn new(storage: S, classifier: Arc<Classifier>, options: BatchOptions) -> Self {
        Self {
            storage,
            classifier,
            options,
        }
    }

    fn output_file(&self, name: &str) -> String {
        if self.options.output_dir.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.options.output_dir.trim_end_matches('/'), name)
        }
    }

    fn wants(&self, format: &str) -> bool {
        self.options.formats.iter().any(|f| f == format)
    }

    fn render_csv(&self, result: &BatchResult) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec!["id".to_string(), "label".to_string()];
        header.extend(self.classifier.labels().iter().map(|l| l.to_string()));
        header.push("confidence".to_string());
        header.push("model".to_string());
        header.push("timestamp".to_string());
        writer.write_record(&header)?;

        for (id, prediction) in &result.predictions {
            let mut row = vec![id.clone(), prediction.label.to_string()];
            row.extend(prediction.probabilities.iter().map(|(_, p)| format!("{:.4}", p)));
            row.push(format!("{:.4}", prediction.confidence()));
            row.push(prediction.model_id.clone().unwrap_or_default());
            row.push(prediction.timestamp.to_rfc3339());
            writer.write_record(&row)?;
        }

        writer.into_inner().map_err(|e| SwipError::IoError(e.into_error()))
    }

    fn render_failures_csv(result: &BatchResult) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(["id", "error"])?;
        for failure in &result.failures {
            writer.write_record([failure.id.as_str(), failure.message.as_str()])?;
        }
        writer.into_inner().map_err(|e| SwipError::IoError(e.into_error()))
    }
}

fn parse_rows(data: &[u8], id_column: &str) -> Result<Extracted> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(data);
    let headers = reader.headers()?.clone();
    let id_index = headers.iter().position(|h| h == id_column);

    let mut extracted = Extracted::default();
    for (row, record) in reader.records().enumerate() {
        let fallback_id = (row + 1).to_string();
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                extracted.rejected.push(BatchFailure {
                    id: fallback_id,
                    message: format!("unreadable row: {}", e),
                });
                continue;
            }
        };

        let id = id_index
            .and_then(|i| record.get(i))
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or(fallback_id);

        let mut sample = FeatureSample::new();
        let mut problem = None;
        for (i, (name, value)) in headers.iter().zip(record.iter()).enumerate() {
            if Some(i) == id_index || value.is_empty() {
                continue;
            }
            match value.parse::<f64>() {
                Ok(v) => sample.insert(name, v),
                Err(_) => {
                    problem = Some(format!("column '{}' is not numeric: '{}'", name, value));
                    break;
                }
            }
        }

        match problem {
            Some(message) => extracted.rejected.push(BatchFailure { id, message }),
            None => extracted.records.push(BatchRecord { id, sample }),
        }
    }

    Ok(extracted)
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for BatchPipeline<S> {
    async fn extract(&self) -> Result<Extracted> {
        tracing::debug!("Reading samples from {}", self.options.input_path);
        let data = self.storage.read_file(&self.options.input_path).await?;
        let id_column = self.options.id_column.as_deref().unwrap_or(DEFAULT_ID_COLUMN);
        let extracted = parse_rows(&data, id_column)?;

        if !extracted.rejected.is_empty() {
            tracing::warn!("{} rows could not be parsed", extracted.rejected.len());
        }
        Ok(extracted)
    }

    async fn transform(&self, data: Extracted) -> Result<BatchResult> {
        let mut result = BatchResult {
            predictions: Vec::with_capacity(data.records.len()),
            failures: data.rejected,
        };

        for record in data.records {
            match self.classifier.predict(&record.sample) {
                Ok(prediction) => result.predictions.push((record.id, prediction)),
                Err(e) => {
                    tracing::warn!("Row {} skipped: {}", record.id, e);
                    result.failures.push(BatchFailure {
                        id: record.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        Ok(result)
    }

    async fn load(&self, result: BatchResult) -> Result<String> {
        if self.wants("csv") {
            let csv_data = self.render_csv(&result)?;
            self.storage.write_file(&self.output_file(PREDICTIONS_CSV), &csv_data).await?;
            if !result.failures.is_empty() {
                let failures = Self::render_failures_csv(&result)?;
                self.storage.write_file(&self.output_file(FAILURES_CSV), &failures).await?;
            }
        }

        if self.wants("json") {
            let json_data = serde_json::to_vec_pretty(&result)?;
            self.storage.write_file(&self.output_file(PREDICTIONS_JSON), &json_data).await?;
        }

        tracing::debug!(
            "Wrote {} predictions and {} failures",
            result.predictions.len(),
            result.failures.len()
        );
        Ok(self.options.output_dir.clone())
    }
}
