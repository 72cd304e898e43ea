//! Output formatting: table, JSON, YAML.
//!
//! Tables go through `tabled`; structured formats serialize the original
//! data with serde so scripts see every field.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Color a rendered diff line by its leading marker.
fn paint_diff_line(line: &str) -> String {
    if line.starts_with("+++") || line.starts_with("---") {
        line.bold().to_string()
    } else if line.starts_with("@@") {
        line.cyan().to_string()
    } else if line.starts_with('+') {
        line.green().to_string()
    } else if line.starts_with('-') {
        line.red().to_string()
    } else if line.starts_with('#') {
        line.dimmed().to_string()
    } else {
        line.to_owned()
    }
}

pub fn colorize_diff(text: &str, color: bool) -> String {
    if !color {
        return text.to_owned();
    }
    text.lines().map(paint_diff_line).collect::<Vec<_>>().join("\n")
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list: `table` builds rows with `to_row`, the structured
/// formats serialize `data` itself.
pub fn render_list<'a, T, R>(
    format: OutputFormat,
    data: &'a [T],
    to_row: impl Fn(&'a T) -> R,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            Ok(render_table(&rows))
        }
        _ => render_structured(format, data),
    }
}

/// Render one item; `detail_fn` supplies the table-mode text.
pub fn render_single<T>(
    format: OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
{
    match format {
        OutputFormat::Table => Ok(detail_fn(data)),
        _ => render_structured(format, data),
    }
}

/// Print to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Status line on stderr, suppressed by `--quiet`.
pub fn status(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{message}");
    }
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    if rows.is_empty() {
        return "(none)".into();
    }
    Table::new(rows).with(Style::rounded()).to_string()
}

fn render_structured<T: serde::Serialize + ?Sized>(
    format: OutputFormat,
    data: &T,
) -> Result<String, CliError> {
    let rendered = match format {
        OutputFormat::Json | OutputFormat::Table => serde_json::to_string_pretty(data)
            .map_err(|e| CliError::Internal(format!("JSON encoding failed: {e}")))?,
        OutputFormat::JsonCompact => serde_json::to_string(data)
            .map_err(|e| CliError::Internal(format!("JSON encoding failed: {e}")))?,
        OutputFormat::Yaml => serde_yaml::to_string(data)
            .map_err(|e| CliError::Internal(format!("YAML encoding failed: {e}")))?,
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Serialize)]
    struct Item {
        name: &'static str,
    }

    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "Name")]
        name: String,
    }

    #[test]
    fn table_and_json_render_the_same_items() {
        let items = [Item { name: "HQ" }, Item { name: "LAB-01" }];
        let to_row = |i: &Item| Row { name: i.name.into() };

        let table = render_list(OutputFormat::Table, &items, to_row).unwrap_or_default();
        assert!(table.contains("Name") && table.contains("LAB-01"));

        let json = render_list(OutputFormat::JsonCompact, &items, to_row).unwrap_or_default();
        assert_eq!(json, r#"[{"name":"HQ"},{"name":"LAB-01"}]"#);
    }

    #[test]
    fn uncolored_diff_is_untouched() {
        let text = "--- live\n+ name = \"AP-1\"";
        assert_eq!(colorize_diff(text, false), text);
        assert_ne!(colorize_diff(text, true), text);
    }
}
