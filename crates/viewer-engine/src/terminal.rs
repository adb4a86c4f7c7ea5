use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use viewer_contracts::frames::Table;

use crate::Presenter;

const CELL_MAX_CHARS: usize = 40;
const PLOTLY_JS_URL: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
/// Trace fields used to count the points of a series, first match wins.
const POINT_FIELDS: &[&str] = &["x", "y", "values", "labels", "z", "open"];

/// Plain-text presenter. Charts are summarized inline and, when a chart
/// directory is set, exported as JSON plus a standalone HTML page.
pub struct TerminalPresenter<W: Write> {
    out: W,
    show_raw: bool,
    chart_dir: Option<PathBuf>,
    exported: Vec<PathBuf>,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            show_raw: false,
            chart_dir: None,
            exported: Vec::new(),
        }
    }

    pub fn with_raw(mut self, show_raw: bool) -> Self {
        self.show_raw = show_raw;
        self
    }

    pub fn with_chart_dir(mut self, chart_dir: Option<PathBuf>) -> Self {
        self.chart_dir = chart_dir;
        self
    }

    pub fn exported(&self) -> &[PathBuf] {
        &self.exported
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn export_chart(&mut self, dir: &Path, number: usize, figure: &Value) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("failed creating {}", dir.display()))?;
        let stem = format!("response-{number:02}");

        let json_path = dir.join(format!("{stem}.json"));
        fs::write(&json_path, serde_json::to_string_pretty(figure)?)
            .with_context(|| format!("failed writing {}", json_path.display()))?;

        let html_path = dir.join(format!("{stem}.html"));
        fs::write(&html_path, chart_html(&stem, figure)?)
            .with_context(|| format!("failed writing {}", html_path.display()))?;

        writeln!(self.out, "  saved {}", html_path.display())?;
        self.exported.push(json_path);
        self.exported.push(html_path);
        Ok(())
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn header(&mut self, number: usize, kind: &str) -> Result<()> {
        writeln!(self.out)?;
        writeln!(self.out, "### Response {number} - `{kind}`")?;
        Ok(())
    }

    fn info(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    fn markdown(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "{text}")?;
        Ok(())
    }

    fn caption(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "  {text}")?;
        Ok(())
    }

    fn warning(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "warning: {text}")?;
        Ok(())
    }

    fn error(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "error: {text}")?;
        Ok(())
    }

    fn success(&mut self, text: &str) -> Result<()> {
        writeln!(self.out, "ok: {text}")?;
        Ok(())
    }

    fn image(&mut self, url: &str, caption: &str) -> Result<()> {
        if caption.is_empty() {
            writeln!(self.out, "[image] {url}")?;
        } else {
            writeln!(self.out, "[image] {caption} <{url}>")?;
        }
        Ok(())
    }

    fn link(&mut self, title: &str, url: &str) -> Result<()> {
        writeln!(self.out, "{title} <{url}>")?;
        Ok(())
    }

    fn button(&mut self, label: &str) -> Result<()> {
        writeln!(self.out, "[ {label} ]")?;
        Ok(())
    }

    fn table(&mut self, table: &Table) -> Result<()> {
        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect();
        let mut widths: Vec<usize> = table
            .columns
            .iter()
            .map(|column| column.chars().count())
            .collect();
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let header: Vec<String> = table.columns.iter().map(|column| clamp_cell(column)).collect();
        writeln!(self.out, "{}", join_padded(&header, &widths))?;
        let rule: Vec<String> = widths
            .iter()
            .map(|width| "-".repeat((*width).min(CELL_MAX_CHARS)))
            .collect();
        writeln!(self.out, "{}", rule.join("-+-"))?;
        for row in &rows {
            writeln!(self.out, "{}", join_padded(row, &widths))?;
        }
        writeln!(self.out, "({} rows)", table.rows.len())?;
        Ok(())
    }

    fn code(&mut self, code: &str, language: &str) -> Result<()> {
        writeln!(self.out, "```{language}")?;
        writeln!(self.out, "{}", code.trim_end())?;
        writeln!(self.out, "```")?;
        Ok(())
    }

    fn chart(&mut self, number: usize, figure: &Value) -> Result<()> {
        let traces = figure
            .get("data")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let title = figure
            .pointer("/layout/title/text")
            .or_else(|| figure.pointer("/layout/title"))
            .and_then(Value::as_str)
            .unwrap_or("untitled");
        writeln!(self.out, "[chart] {title} ({} traces)", traces.len())?;
        for trace in traces {
            let kind = trace.get("type").and_then(Value::as_str).unwrap_or("scatter");
            let points = POINT_FIELDS
                .iter()
                .find_map(|field| trace.get(*field).and_then(Value::as_array))
                .map(Vec::len)
                .unwrap_or(0);
            match trace.get("name").and_then(Value::as_str) {
                Some(name) => writeln!(self.out, "  - {kind} \"{name}\": {points} points")?,
                None => writeln!(self.out, "  - {kind}: {points} points")?,
            }
        }
        if let Some(dir) = self.chart_dir.clone() {
            self.export_chart(&dir, number, figure)?;
        }
        Ok(())
    }

    fn raw_json(&mut self, label: &str, value: &Value) -> Result<()> {
        if self.show_raw {
            writeln!(self.out, "{label}:")?;
            writeln!(self.out, "{}", serde_json::to_string_pretty(value)?)?;
        } else {
            let size = serde_json::to_string(value)?.len();
            writeln!(self.out, "{label}: {size} bytes (use --raw to show)")?;
        }
        Ok(())
    }
}

fn chart_html(title: &str, figure: &Value) -> Result<String> {
    // `</` would close the inline script early.
    let embedded = serde_json::to_string(figure)?.replace("</", "<\\/");
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_JS_URL}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:95vh;"></div>
<script>
const figure = {embedded};
Plotly.newPlot("chart", figure.data, figure.layout || {{}}, {{responsive: true}});
</script>
</body>
</html>
"#
    ))
}

fn cell_text(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    clamp_cell(&text)
}

fn clamp_cell(text: &str) -> String {
    let single_line = text.replace(['\n', '\r'], " ");
    if single_line.chars().count() <= CELL_MAX_CHARS {
        return single_line;
    }
    single_line.chars().take(CELL_MAX_CHARS - 1).collect::<String>() + "…"
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:<width$}", width = (*width).min(CELL_MAX_CHARS)))
        .collect::<Vec<String>>()
        .join(" | ")
        .trim_end()
        .to_string()
}
