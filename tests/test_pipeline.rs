//! Integration test: full analysis run from a CSV file

use esports_analysis::error::AnalysisError;
use esports_analysis::preprocessing::PreprocessingConfig;
use esports_analysis::{Analysis, AnalysisConfig};
use std::fmt::Write as _;
use std::path::Path;
use tempfile::TempDir;

const HEADER: &str =
    "match_id,map_type,map_name,player_name,team_name,hero_name,kills,deaths,healing,team_one_name,team_two_name,match_winner";

/// Write a deterministic match table; every 17th row has empty categorical cells
fn write_match_csv(dir: &Path, n_rows: usize) -> std::path::PathBuf {
    let map_types = ["Control", "Escort", "Hybrid"];
    let mut csv = String::from(HEADER);
    csv.push('\n');

    for i in 0..n_rows {
        let kills = (i * 7) % 23;
        let deaths = (i * 5) % 19;
        let healing = (i * 37) % 1000;
        let winner = if kills > deaths { "Fuel" } else { "Shock" };

        if i % 17 == 16 {
            writeln!(csv, "{},,,,,,{},{},,Fuel,Shock,{}", i / 10, kills, deaths, winner).unwrap();
        } else {
            writeln!(
                csv,
                "{},{},map_{},player_{:02},{},hero_{:02},{},{},{},Fuel,Shock,{}",
                i / 10,
                map_types[i % 3],
                i % 7,
                i % 12,
                if i % 2 == 0 { "Fuel" } else { "Shock" },
                i % 50,
                kills,
                deaths,
                healing,
                winner
            )
            .unwrap();
        }
    }

    let path = dir.join("merged_esports_data_updated.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn config_for(path: &Path) -> AnalysisConfig {
    AnalysisConfig::new()
        .with_data_path(path)
        .with_selector_estimators(25)
        .with_wait_for_dismiss(false)
}

#[test]
fn test_full_run_from_csv() {
    let dir = TempDir::new().unwrap();
    let path = write_match_csv(dir.path(), 500);

    let result = Analysis::new(config_for(&path)).run();
    assert!(result.is_ok(), "analysis failed: {:?}", result.err());
    let outcome = result.unwrap();

    assert_eq!(outcome.n_samples, 500);
    assert_eq!(outcome.n_test, 100);
    assert_eq!(outcome.n_train, 400);
    assert!(!outcome.selected_features.is_empty());
    assert!(outcome.selected_features.len() < outcome.n_features);

    let models: Vec<&str> = outcome.reports.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec!["Logistic Regression", "Random Forest", "Gradient Boosting"]);
    for model in &models {
        let report = outcome.report(model).unwrap();
        assert_eq!(report.total_support(), 100);
        assert!(report.accuracy > 0.5, "{} accuracy {}", model, report.accuracy);
    }

    assert_eq!(outcome.forest_importances.len(), 20);
    assert!(outcome.boosting_importances.len() <= 20);
    assert!(outcome
        .boosting_importances
        .iter()
        .all(|f| outcome.selected_features.contains(&f.name)));
}

#[test]
fn test_runs_are_reproducible() {
    let dir = TempDir::new().unwrap();
    let path = write_match_csv(dir.path(), 300);
    let analysis = Analysis::new(config_for(&path));

    let first = analysis.run().unwrap();
    let second = analysis.run().unwrap();

    assert_eq!(first.selected_features, second.selected_features);
    assert_eq!(first.forest_importances, second.forest_importances);
    for (a, b) in first.reports.iter().zip(second.reports.iter()) {
        assert_eq!(a.report.accuracy, b.report.accuracy);
    }
}

#[test]
fn test_chart_has_both_panels() {
    let dir = TempDir::new().unwrap();
    let path = write_match_csv(dir.path(), 300);
    let outcome = Analysis::new(config_for(&path)).run().unwrap();

    let text = outcome.chart(30).with_color(false).render();
    let first_line = text.lines().next().unwrap_or_default();
    assert!(first_line.contains("Top 20 Feature Importances - Random Forest"));
    assert!(first_line.contains("Top 20 Feature Importances - Gradient Boosting"));
    assert!(text.contains("Importance"));
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir.path().join("does_not_exist.csv"));

    let result = Analysis::new(config).run();
    assert!(matches!(result, Err(AnalysisError::IoError(_))));
}

#[test]
fn test_missing_drop_column_aborts_the_run() {
    let dir = TempDir::new().unwrap();
    let path = write_match_csv(dir.path(), 100);
    let config = config_for(&path).with_preprocessing(
        PreprocessingConfig::new().with_drop_columns(&["team_one_name", "team_three_name"]),
    );

    let result = Analysis::new(config).run();
    assert!(matches!(result, Err(AnalysisError::FeatureNotFound(ref c)) if c == "team_three_name"));
}

#[test]
fn test_empty_table_is_a_data_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.csv");
    std::fs::write(&path, format!("{}\n", HEADER)).unwrap();

    let result = Analysis::new(config_for(&path)).run();
    assert!(result.is_err(), "empty table should fail");
}

#[test]
fn test_invalid_config_is_rejected_before_loading() {
    let config = AnalysisConfig::new().with_test_size(1.5).with_data_path("nowhere.csv");
    let result = Analysis::new(config).run();
    assert!(matches!(result, Err(AnalysisError::InvalidParameter { .. })));
}
