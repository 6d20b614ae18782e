use std::path::Path;
use std::sync::Arc;
use swip::utils::integrity::sha256_hex;
use swip::utils::validation::Validate;
use swip::{
    compute_features, AffectLabel, ArtifactFilter, BatchOptions, BatchPipeline, Classifier, FeatureSample,
    LocalStorage, RrWindow, SwipConfig, SwipEngine, SwipError,
};
use tempfile::TempDir;

// Two stumps: low RMSSD votes Stressed, high heart rate votes Stressed,
// otherwise Calm with some Amused mass.
const MODEL_JSON: &str = r#"{
    "n_features": 5,
    "n_classes": 3,
    "trees": [
        {"nodes": [
            {"branch": {"feature": 1, "threshold": 25.0, "true_child": 1, "false_child": 2}},
            {"leaf": {"values": [0.0, 1.0, 0.0]}},
            {"leaf": {"values": [0.8, 0.0, 0.2]}}
        ]},
        {"nodes": [
            {"branch": {"feature": 4, "threshold": 90.0, "mode": "gt", "true_child": 1, "false_child": 2}},
            {"leaf": {"values": [0.0, 0.9, 0.1]}},
            {"leaf": {"values": [0.6, 0.0, 0.4]}}
        ]}
    ]
}"#;

fn write_model(dir: &Path, sha256: Option<&str>) -> (std::path::PathBuf, std::path::PathBuf) {
    let model_path = dir.join("extratrees_wrist_all_v1_0.json");
    let sidecar_path = dir.join("extratrees_wrist_all_v1_0.meta.json");
    std::fs::write(&model_path, MODEL_JSON).unwrap();

    let mut meta = serde_json::json!({
        "schema": {"input_names": ["SDNN", "RMSSD", "pNN50", "Mean_RR", "HR_mean"]},
        "labels": ["Calm", "Stressed", "Amused"],
        "model": {"name": "extratrees_wrist_all", "version": "1.0"}
    });
    if let Some(hash) = sha256 {
        meta["model"]["sha256"] = serde_json::Value::String(hash.to_string());
    }
    std::fs::write(&sidecar_path, serde_json::to_string_pretty(&meta).unwrap()).unwrap();

    (model_path, sidecar_path)
}

fn relaxed_sample() -> FeatureSample {
    FeatureSample::new()
        .with("SDNN", 50.0)
        .with("RMSSD", 30.0)
        .with("pNN50", 15.0)
        .with("Mean_RR", 850.0)
        .with("HR_mean", 70.6)
}

#[test]
fn test_load_verified_model_and_predict() {
    let temp_dir = TempDir::new().unwrap();
    let hash = sha256_hex(MODEL_JSON.as_bytes());
    let (model, sidecar) = write_model(temp_dir.path(), Some(&hash));

    let classifier = Classifier::load(&model, &sidecar, true).unwrap();
    let prediction = classifier.predict(&relaxed_sample()).unwrap();

    assert_eq!(prediction.label, AffectLabel::Calm);
    assert_eq!(prediction.class_index, 0);
    assert!((prediction.probability(AffectLabel::Calm).unwrap() - 0.7).abs() < 1e-6);
    assert!((prediction.probability(AffectLabel::Amused).unwrap() - 0.3).abs() < 1e-6);
    assert_eq!(prediction.model_id.as_deref(), Some("extratrees_wrist_all@1.0"));
}

#[test]
fn test_checksum_mismatch_blocks_load() {
    let temp_dir = TempDir::new().unwrap();
    let (model, sidecar) = write_model(temp_dir.path(), Some(&sha256_hex(b"another model")));

    let err = Classifier::load(&model, &sidecar, true).unwrap_err();
    assert!(matches!(err, SwipError::ChecksumMismatch { .. }));

    // Verification disabled: the same files load.
    assert!(Classifier::load(&model, &sidecar, false).is_ok());
}

#[test]
fn test_missing_files_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    let (model, sidecar) = write_model(temp_dir.path(), None);

    let err = Classifier::load(temp_dir.path().join("absent.json"), &sidecar, true).unwrap_err();
    assert!(matches!(err, SwipError::ModelNotFound { .. }));

    let err = Classifier::load(&model, temp_dir.path().join("absent.meta.json"), true).unwrap_err();
    assert!(matches!(err, SwipError::SidecarNotFound { .. }));
}

#[test]
fn test_label_count_must_match_model() {
    let temp_dir = TempDir::new().unwrap();
    let (model, sidecar) = write_model(temp_dir.path(), None);
    std::fs::write(
        &sidecar,
        r#"{"schema": {"input_names": ["SDNN", "RMSSD", "pNN50", "Mean_RR", "HR_mean"]}, "labels": ["Calm", "Stressed"]}"#,
    )
    .unwrap();

    assert!(matches!(
        Classifier::load(&model, &sidecar, true),
        Err(SwipError::InvalidModel { .. })
    ));
}

#[test]
fn test_rr_intervals_to_prediction() {
    let temp_dir = TempDir::new().unwrap();
    let (model, sidecar) = write_model(temp_dir.path(), None);
    let classifier = Classifier::load(&model, &sidecar, true).unwrap();

    // Fast, rigid rhythm around 100 bpm with a couple of artifacts.
    let mut rr: Vec<f64> = (0..60).map(|i| 600.0 + (i % 3) as f64 * 5.0).collect();
    rr.push(150.0);
    rr.push(4000.0);

    let features = compute_features(&rr, &ArtifactFilter::default()).unwrap();
    assert!(features.hr_mean > 90.0);
    assert!(features.rmssd < 25.0);

    let prediction = classifier.predict_hrv(&features).unwrap();
    assert_eq!(prediction.label, AffectLabel::Stressed);

    let mut window = RrWindow::new(30.0, ArtifactFilter::default());
    window.extend(rr);
    assert!(window.span_ms() <= 30_000.0);
    assert_eq!(
        classifier.predict_hrv(&window.features().unwrap()).unwrap().label,
        AffectLabel::Stressed
    );
}

#[tokio::test]
async fn test_batch_pipeline_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let (model, sidecar) = write_model(temp_dir.path(), None);
    let classifier = Arc::new(Classifier::load(&model, &sidecar, true).unwrap());

    std::fs::write(
        temp_dir.path().join("samples.csv"),
        "id,SDNN,RMSSD,pNN50,Mean_RR,HR_mean\n\
         relaxed,50,30,15,850,70.6\n\
         tense,20,12,2,600,100\n\
         broken,20,abc,2,600,100\n\
         partial,20,12,,600,100\n",
    )
    .unwrap();

    let options = BatchOptions {
        input_path: "samples.csv".to_string(),
        id_column: None,
        output_dir: "out".to_string(),
        formats: vec!["csv".to_string(), "json".to_string()],
    };
    let pipeline = BatchPipeline::new(LocalStorage::new(temp_dir.path()), classifier, options);
    let summary = SwipEngine::new(pipeline).run().await.unwrap();

    assert_eq!(summary.predicted, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.output_path, "out");

    let out = temp_dir.path().join("out");
    let csv = std::fs::read_to_string(out.join("predictions.csv")).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next().unwrap(),
        "id,label,Calm,Stressed,Amused,confidence,model,timestamp"
    );
    assert!(lines
        .next()
        .unwrap()
        .starts_with("relaxed,Calm,0.7000,0.0000,0.3000,0.7000,extratrees_wrist_all@1.0,"));
    assert!(lines.next().unwrap().starts_with("tense,Stressed,0.0000,0.9500,0.0500,0.9500,"));

    let failures = std::fs::read_to_string(out.join("failures.csv")).unwrap();
    assert!(failures.contains("broken"));
    assert!(failures.contains("partial"));
    assert!(failures.contains("pNN50"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("predictions.json")).unwrap()).unwrap();
    assert_eq!(json["predictions"].as_array().unwrap().len(), 2);
    assert_eq!(json["failures"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_batch_from_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let hash = sha256_hex(MODEL_JSON.as_bytes());
    let (model, sidecar) = write_model(temp_dir.path(), Some(&hash));
    let samples = temp_dir.path().join("samples.csv");
    std::fs::write(&samples, "subject,SDNN,RMSSD,pNN50,Mean_RR,HR_mean\nS2,50,30,15,850,70.6\n").unwrap();

    let config_path = temp_dir.path().join("swip.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[model]
path = "{}"
sidecar = "{}"

[input]
path = "{}"
id_column = "subject"

[output]
path = "{}"
formats = ["json"]
"#,
            model.display(),
            sidecar.display(),
            samples.display(),
            temp_dir.path().join("reports").display()
        ),
    )
    .unwrap();

    let config = SwipConfig::from_file(&config_path).unwrap();
    config.validate().unwrap();

    let classifier = Classifier::load(&config.model.path, &config.model.sidecar, config.model.verify_checksum).unwrap();
    let input = config.input.clone().unwrap();
    let options = BatchOptions {
        input_path: input.path,
        id_column: input.id_column,
        output_dir: config.output.clone().unwrap().path,
        formats: config.output_formats(),
    };
    let pipeline = BatchPipeline::new(LocalStorage::new(temp_dir.path()), Arc::new(classifier), options);
    let summary = SwipEngine::new(pipeline).run().await.unwrap();
    assert_eq!(summary.predicted, 1);

    let reports = temp_dir.path().join("reports");
    assert!(reports.join("predictions.json").exists());
    assert!(!reports.join("predictions.csv").exists());

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(reports.join("predictions.json")).unwrap()).unwrap();
    assert_eq!(json["predictions"][0][0], "S2");
    assert_eq!(json["predictions"][0][1]["label"], "Calm");
}
