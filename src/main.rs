//! Esports match outcome analysis - Main Entry Point
//!
//! Runs the analysis on the default dataset, prints the three classification
//! reports and the importance charts.

use esports_analysis::visualization::wait_for_dismiss;
use esports_analysis::{Analysis, AnalysisConfig};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "esports_analysis=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = AnalysisConfig::default();
    let outcome = Analysis::new(config.clone()).run()?;

    for model_report in &outcome.reports {
        println!("{} Classification Report:", model_report.model);
        println!("{}", model_report.report);
    }

    outcome.chart(config.chart_bar_width).print();

    if config.wait_for_dismiss {
        wait_for_dismiss()?;
    }

    Ok(())
}
