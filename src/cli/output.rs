// Output formatting utilities

use crate::board::{Notification, NotificationLevel, Notifier};
use crate::models::{Pipeline, Stage, StageChange, StageType};
use chrono::{Local, TimeZone};
use std::io::IsTerminal;

// ANSI escape codes for terminal formatting
const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_FG_RED: &str = "\x1b[31m";
const ANSI_FG_GREEN: &str = "\x1b[32m";
const ANSI_FG_BRIGHT_BLACK: &str = "\x1b[90m";

const COLUMN_GAP: usize = 2;
const MIN_COLUMN_WIDTH: usize = 18;
const MAX_COLUMN_WIDTH: usize = 32;

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Get terminal width dynamically
///
/// Uses the `terminal_size` crate, with fallback to the COLUMNS environment
/// variable and a sensible default.
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }

    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }

    120
}

fn styled(text: &str, style: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", style, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

/// Pad to `width` display columns; `styled` text is padded on its plain length
fn pad(text: &str, plain_len: usize, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(plain_len)))
}

/// Cut to `width` characters, marking the cut with `..`
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width <= 2 {
        return text.chars().take(width).collect();
    }
    let mut cut: String = text.chars().take(width - 2).collect();
    cut.push_str("..");
    cut
}

/// Format a money amount with thousands separators (`5,000`, `1,250.50`)
pub fn format_amount(amount: f64) -> String {
    let cents = (amount * 100.0).round() as i64;
    let whole = (cents / 100).abs();
    let fraction = (cents % 100).abs();

    let digits = whole.to_string();
    let mut grouped = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if cents < 0 { "-" } else { "" };
    if fraction == 0 {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{:02}", sign, grouped, fraction)
    }
}

pub fn format_timestamp(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => ts.to_string(),
    }
}

fn stage_type_style(stage_type: StageType) -> &'static str {
    match stage_type {
        StageType::Open => ANSI_BOLD,
        StageType::Won => ANSI_FG_GREEN,
        StageType::Lost => ANSI_FG_RED,
    }
}

/// Lines of one kanban column, each paired with its plain (unstyled) length
fn stage_column(stage: &Stage, width: usize, is_tty: bool) -> Vec<(String, usize)> {
    let mut lines = Vec::new();

    let title = truncate(&format!("{}. {}", stage.stage_order, stage.name), width);
    lines.push((styled(&title, stage_type_style(stage.stage_type), is_tty), title.chars().count()));

    let meta = truncate(
        &format!("#{} {} {}%", stage.id, stage.stage_type.as_str(), stage.win_probability),
        width,
    );
    lines.push((styled(&meta, ANSI_FG_BRIGHT_BLACK, is_tty), meta.chars().count()));

    let summary = truncate(
        &format!("{} deal{} {}", stage.deal_count(), if stage.deal_count() == 1 { "" } else { "s" }, format_amount(stage.total_value())),
        width,
    );
    lines.push((summary.clone(), summary.chars().count()));
    lines.push(("-".repeat(width), width));

    if stage.deals.is_empty() {
        let empty = truncate("(no deals)", width);
        lines.push((styled(&empty, ANSI_FG_BRIGHT_BLACK, is_tty), empty.chars().count()));
    }
    for deal in &stage.deals {
        let name = truncate(&format!("#{} {}", deal.id, deal.name), width);
        lines.push((name.clone(), name.chars().count()));
        let detail = match &deal.owner {
            Some(owner) => format!("  {} @{}", format_amount(deal.amount), owner),
            None => format!("  {}", format_amount(deal.amount)),
        };
        let detail = truncate(&detail, width);
        lines.push((detail.clone(), detail.chars().count()));
    }

    lines
}

/// Render a pipeline as a kanban board
///
/// Stages are laid out left to right in order. When the terminal is too
/// narrow for every column, the columns wrap onto further bands.
pub fn format_board(pipeline: &Pipeline, term_width: usize, is_tty: bool) -> String {
    let mut out = String::new();
    let header = format!(
        "{} (pipeline {}): {} deal{}, total {}",
        pipeline.name,
        pipeline.id,
        pipeline.deal_count(),
        if pipeline.deal_count() == 1 { "" } else { "s" },
        format_amount(pipeline.total_value()),
    );
    out.push_str(&styled(&header, ANSI_BOLD, is_tty));
    out.push('\n');

    if pipeline.stages.is_empty() {
        out.push_str("No stages. Add one with: pipeboard stages add ");
        out.push_str(&pipeline.id.to_string());
        out.push_str(" <NAME>\n");
        return out;
    }

    let count = pipeline.stages.len();
    let fit = term_width.saturating_sub(COLUMN_GAP * count.saturating_sub(1)) / count;
    let width = fit.clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
    let per_band = ((term_width + COLUMN_GAP) / (width + COLUMN_GAP)).max(1);

    for band in pipeline.stages.chunks(per_band) {
        out.push('\n');
        let columns: Vec<Vec<(String, usize)>> = band.iter()
            .map(|stage| stage_column(stage, width, is_tty))
            .collect();
        let height = columns.iter().map(|c| c.len()).max().unwrap_or(0);

        for row in 0..height {
            let mut line = String::new();
            for (i, column) in columns.iter().enumerate() {
                let is_last = i + 1 == columns.len();
                match column.get(row) {
                    Some((text, _)) if is_last => line.push_str(text),
                    Some((text, plain_len)) => line.push_str(&pad(text, *plain_len, width)),
                    None if is_last => {}
                    None => line.push_str(&" ".repeat(width)),
                }
                if !is_last {
                    line.push_str(&" ".repeat(COLUMN_GAP));
                }
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }

    out
}

/// Render the pipeline list as a table
pub fn format_pipeline_list(pipelines: &[Pipeline]) -> String {
    if pipelines.is_empty() {
        return "No pipelines found.\n".to_string();
    }

    let mut out = String::new();
    out.push_str(&format!("{:<6} {:<30} {:>6} {:>6} {:>14}\n", "ID", "Name", "Stages", "Deals", "Value"));
    out.push_str(&format!("{}\n", "-".repeat(66)));
    for pipeline in pipelines {
        out.push_str(&format!(
            "{:<6} {:<30} {:>6} {:>6} {:>14}\n",
            pipeline.id,
            truncate(&pipeline.name, 30),
            pipeline.stages.len(),
            pipeline.deal_count(),
            format_amount(pipeline.total_value()),
        ));
    }
    out
}

/// Render a deal's stage history, resolving stage names where known
pub fn format_deal_history(changes: &[StageChange], stage_name: impl Fn(i64) -> Option<String>) -> String {
    if changes.is_empty() {
        return "No stage history.\n".to_string();
    }
    let label = |id: i64| match stage_name(id) {
        Some(name) => format!("{} (#{})", name, id),
        None => format!("#{}", id),
    };

    let mut out = String::new();
    out.push_str(&format!("{:<17} {:<26} {:<26}\n", "When", "From", "To"));
    out.push_str(&format!("{}\n", "-".repeat(71)));
    for change in changes {
        let from = change.from_stage_id.map(&label).unwrap_or_else(|| "(created)".to_string());
        out.push_str(&format!(
            "{:<17} {:<26} {:<26}\n",
            format_timestamp(change.changed_ts),
            truncate(&from, 26),
            truncate(&label(change.to_stage_id), 26),
        ));
    }
    out
}

/// JSON view of a pipeline, with recomputed aggregates
pub fn pipeline_json(pipeline: &Pipeline) -> serde_json::Value {
    let stages: Vec<serde_json::Value> = pipeline.stages.iter().map(|stage| {
        serde_json::json!({
            "id": stage.id,
            "pipelineId": stage.pipeline_id,
            "name": stage.name,
            "stageOrder": stage.stage_order,
            "stageType": stage.stage_type.as_str(),
            "winProbability": stage.win_probability,
            "dealCount": stage.deal_count(),
            "totalValue": stage.total_value(),
            "weightedValue": stage.weighted_value(),
            "deals": stage.deals,
        })
    }).collect();

    serde_json::json!({
        "id": pipeline.id,
        "name": pipeline.name,
        "dealCount": pipeline.deal_count(),
        "totalValue": pipeline.total_value(),
        "stages": stages,
    })
}

/// Prints notifications as they arrive
///
/// Success and info go to stdout; warnings and errors go to stderr.
#[derive(Debug, Default)]
pub struct ConsoleNotifier {
    is_tty: bool,
    errors: usize,
}

impl ConsoleNotifier {
    pub fn new(is_tty: bool) -> Self {
        Self { is_tty, errors: 0 }
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&mut self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                println!("{}", styled(&notification.message, ANSI_FG_GREEN, self.is_tty));
            }
            NotificationLevel::Warning => {
                eprintln!("Warning: {}", notification.message);
            }
            NotificationLevel::Error => {
                self.errors += 1;
                eprintln!("Error: {}", notification.message);
            }
        }
    }
}
