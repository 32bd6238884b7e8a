//! Output renderers and formatting helpers for CLI commands.

use std::io::Write;

use anyhow::anyhow;
use pklookup_api_models::{ServerListResponse, ServerRecord, TokenListResponse, TokenRecord};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

const COLUMN_GAP: &str = "  ";

pub(crate) fn render_token_list(list: &TokenListResponse, format: OutputFormat) -> CliResult<String> {
    match format {
        OutputFormat::Json => render_json(&list.tokens),
        OutputFormat::Table => {
            let rows: Vec<Vec<&str>> = list.tokens.iter().map(TokenRecord::row).collect();
            Ok(render_table(&TokenRecord::COLUMNS, &rows))
        }
    }
}

pub(crate) fn render_server_list(
    list: &ServerListResponse,
    format: OutputFormat,
) -> CliResult<String> {
    match format {
        OutputFormat::Json => render_json(&list.servers),
        OutputFormat::Table => {
            let rows: Vec<Vec<&str>> = list.servers.iter().map(ServerRecord::row).collect();
            Ok(render_table(&ServerRecord::COLUMNS, &rows))
        }
    }
}

/// Lay out rows under a header and a dashed rule, padding every column to its widest cell.
#[must_use]
pub(crate) fn render_table(columns: &[&str], rows: &[Vec<&str>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|column| column.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    let rule: Vec<&str> = rule.iter().map(String::as_str).collect();

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(columns, &widths));
    lines.push(format_row(&rule, &widths));
    lines.extend(rows.iter().map(|row| format_row(row, &widths)));
    lines.join("\n")
}

fn format_row(cells: &[&str], widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    padded.join(COLUMN_GAP).trim_end().to_string()
}

fn render_json<T: Serialize + ?Sized>(value: &T) -> CliResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))
}

/// Write one line of command output.
pub(crate) fn emit(out: &mut dyn Write, text: &str) -> CliResult<()> {
    writeln!(out, "{text}").map_err(|err| CliError::failure(anyhow!("failed to write output: {err}")))
}
