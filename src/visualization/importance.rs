//! Ranked feature importances drawn as horizontal text bar charts

use crate::error::{AnalysisError, Result};
use colored::*;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, IsTerminal, Write};

/// Sky blue bars
pub const SKY_BLUE: (u8, u8, u8) = (135, 206, 235);
/// Light green bars
pub const LIGHT_GREEN: (u8, u8, u8) = (144, 238, 144);

const X_LABEL: &str = "Importance";
const PANEL_GAP: usize = 4;

/// One feature and its importance score
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedFeature {
    pub name: String,
    pub importance: f64,
}

/// Sort features by importance, highest first, and keep the top `top_k`.
///
/// Equal scores come out in reverse column order, as a stable ascending
/// sort read backwards would give.
pub fn rank_importances(
    names: &[String],
    importances: &[f64],
    top_k: usize,
) -> Result<Vec<RankedFeature>> {
    if names.len() != importances.len() {
        return Err(AnalysisError::ShapeError {
            expected: format!("{} importances", names.len()),
            actual: format!("{} importances", importances.len()),
        });
    }

    let mut ranked: Vec<RankedFeature> = names
        .iter()
        .zip(importances.iter())
        .map(|(name, &importance)| RankedFeature {
            name: name.clone(),
            importance,
        })
        .collect();

    ranked.reverse();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked.truncate(top_k);
    Ok(ranked)
}

/// One titled chart
#[derive(Debug, Clone)]
pub struct ImportancePanel {
    pub title: String,
    pub color: (u8, u8, u8),
    pub features: Vec<RankedFeature>,
}

impl ImportancePanel {
    /// Plain-text lines and their visible widths, without colour codes
    fn layout(&self, bar_width: usize, colored: bool) -> Vec<(String, usize)> {
        let name_width = self
            .features
            .iter()
            .map(|f| f.name.chars().count())
            .max()
            .unwrap_or(0);
        let max_importance = self
            .features
            .iter()
            .map(|f| f.importance)
            .fold(0.0_f64, f64::max);

        let mut lines = Vec::with_capacity(self.features.len() + 4);
        lines.push((self.title.clone(), self.title.chars().count()));
        lines.push((String::new(), 0));

        for feature in &self.features {
            let len = if max_importance > 0.0 {
                ((feature.importance / max_importance) * bar_width as f64).round() as usize
            } else {
                0
            };
            let bar = "█".repeat(len);
            let bar = if colored {
                let (r, g, b) = self.color;
                bar.truecolor(r, g, b).to_string()
            } else {
                bar
            };
            let value = format!("{:.4}", feature.importance);
            let text = format!(
                "{:>name_width$} │{}{} {}",
                feature.name,
                bar,
                " ".repeat(bar_width - len.min(bar_width)),
                value,
                name_width = name_width
            );
            let visible = name_width + 2 + bar_width.max(len) + 1 + value.len();
            lines.push((text, visible));
        }

        let axis = format!("{} └{}", " ".repeat(name_width), "─".repeat(bar_width));
        lines.push((axis, name_width + 2 + bar_width));

        let pad = name_width + 2 + bar_width.saturating_sub(X_LABEL.len()) / 2;
        lines.push((format!("{}{}", " ".repeat(pad), X_LABEL), pad + X_LABEL.len()));

        lines
    }
}

/// Side-by-side importance charts
#[derive(Debug, Clone)]
pub struct ImportanceChart {
    panels: Vec<ImportancePanel>,
    bar_width: usize,
    colored: bool,
}

impl Default for ImportanceChart {
    fn default() -> Self {
        Self::new(40)
    }
}

impl ImportanceChart {
    /// Create an empty chart with the given maximum bar length
    pub fn new(bar_width: usize) -> Self {
        Self {
            panels: Vec::new(),
            bar_width: bar_width.max(1),
            colored: true,
        }
    }

    /// Builder method to add a panel to the right of the existing ones
    pub fn with_panel(
        mut self,
        title: impl Into<String>,
        color: (u8, u8, u8),
        features: Vec<RankedFeature>,
    ) -> Self {
        self.panels.push(ImportancePanel {
            title: title.into(),
            color,
            features,
        });
        self
    }

    /// Builder method to toggle ANSI colours
    pub fn with_color(mut self, colored: bool) -> Self {
        self.colored = colored;
        self
    }

    /// Panels in display order
    pub fn panels(&self) -> &[ImportancePanel] {
        &self.panels
    }

    /// Render every panel, laid out left to right
    pub fn render(&self) -> String {
        let layouts: Vec<Vec<(String, usize)>> = self
            .panels
            .iter()
            .map(|p| p.layout(self.bar_width, self.colored))
            .collect();

        let widths: Vec<usize> = layouts
            .iter()
            .map(|lines| lines.iter().map(|(_, w)| *w).max().unwrap_or(0))
            .collect();
        let height = layouts.iter().map(|l| l.len()).max().unwrap_or(0);

        let mut out = String::new();
        for row in 0..height {
            let mut line = String::new();
            for (panel_idx, lines) in layouts.iter().enumerate() {
                let is_last = panel_idx + 1 == layouts.len();
                let (text, visible) = lines
                    .get(row)
                    .map(|(t, w)| (t.as_str(), *w))
                    .unwrap_or(("", 0));

                let text = if row == 0 && self.colored {
                    text.bold().to_string()
                } else {
                    text.to_string()
                };
                line.push_str(&text);

                if !is_last {
                    line.push_str(&" ".repeat(widths[panel_idx] - visible + PANEL_GAP));
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }

    /// Write the rendered chart to stdout
    pub fn print(&self) {
        print!("{}", self.render());
    }
}

/// Block until the user presses enter, when stdin is an interactive terminal
pub fn wait_for_dismiss() -> Result<()> {
    let stdin = std::io::stdin();
    if !stdin.is_terminal() {
        return Ok(());
    }

    println!();
    println!("  {}", "press enter to continue".truecolor(100, 100, 100));
    std::io::stdout().flush()?;

    let mut input = String::new();
    stdin.lock().read_line(&mut input)?;
    Ok(())
}
