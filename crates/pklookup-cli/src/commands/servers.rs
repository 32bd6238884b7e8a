use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use pklookup_api_models::{
    MessageResponse, RecordIdQuery, ServerCreateRequest, ServerListResponse, parse_response,
};

use crate::cli::{RecordIdArgs, ServerAddArgs};
use crate::client::{AppContext, CliError, CliResult, Fields, fields_of};
use crate::commands::{
    INVALID_RESPONSE, INVALID_SERVER_ID, INVALID_SERVER_LIST, SERVER_PATH, invalid,
};
use crate::output::{emit, render_server_list};

pub(crate) async fn handle_server_add(
    ctx: &AppContext,
    args: ServerAddArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let request = ServerCreateRequest {
        public_key: resolve_public_key(&args.public_key)?,
    };

    let body = ctx.transport.post(SERVER_PATH, &fields_of(&request)?).await?;
    let response: MessageResponse = parse_response(body).map_err(invalid(INVALID_RESPONSE))?;

    emit(out, response.message.as_str())
}

pub(crate) async fn handle_server_delete(
    ctx: &AppContext,
    args: RecordIdArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let query = RecordIdQuery { id: args.id };

    let body = ctx.transport.delete(SERVER_PATH, &fields_of(&query)?).await?;
    let response: MessageResponse = parse_response(body).map_err(invalid(INVALID_RESPONSE))?;

    emit(out, response.message.as_str())
}

pub(crate) async fn handle_server_list(ctx: &AppContext, out: &mut dyn Write) -> CliResult<()> {
    let body = ctx.transport.get(SERVER_PATH, &Fields::new()).await?;
    let list: ServerListResponse = parse_response(body).map_err(invalid(INVALID_SERVER_LIST))?;

    emit(out, &render_server_list(&list, ctx.output)?)
}

pub(crate) async fn handle_server_save_key(
    ctx: &AppContext,
    args: RecordIdArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let query = RecordIdQuery { id: args.id };

    let body = ctx.transport.get(SERVER_PATH, &fields_of(&query)?).await?;
    let list: ServerListResponse = parse_response(body).map_err(invalid(INVALID_SERVER_LIST))?;
    let server = list
        .servers
        .first()
        .ok_or_else(|| CliError::validation(INVALID_SERVER_ID))?;
    let entry = server
        .known_hosts_entry()
        .ok_or_else(|| CliError::validation(INVALID_SERVER_LIST))?;

    emit(
        out,
        &format!("{}: saving '{entry}'", ctx.known_hosts.display()),
    )?;
    append_known_host(&ctx.known_hosts, &entry)
}

/// Accept a literal key, or `@path` to read the first line of a key file.
fn resolve_public_key(value: &str) -> CliResult<String> {
    let Some(path) = value.strip_prefix('@') else {
        return Ok(value.to_string());
    };

    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read public key from {path}"))
        .map_err(CliError::failure)?;
    Ok(contents.lines().next().unwrap_or_default().trim().to_string())
}

fn append_known_host(path: &Path, entry: &str) -> CliResult<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
        .map_err(CliError::failure)?;
    writeln!(file, "{entry}")
        .with_context(|| format!("failed to append to {}", path.display()))
        .map_err(CliError::failure)?;
    tracing::debug!(path = %path.display(), "appended known host");
    Ok(())
}
