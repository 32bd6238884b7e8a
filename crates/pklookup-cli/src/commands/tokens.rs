use std::io::Write;

use pklookup_api_models::{
    MessageResponse, RecordIdQuery, TokenCreateRequest, TokenCreatedResponse, TokenListResponse,
    parse_response,
};

use crate::cli::{RecordIdArgs, TokenAddArgs};
use crate::client::{AppContext, CliResult, Fields, fields_of};
use crate::commands::{INVALID_RESPONSE, INVALID_TOKEN_LIST, TOKEN_PATH, invalid};
use crate::output::{emit, render_token_list};

pub(crate) async fn handle_token_add(
    ctx: &AppContext,
    args: TokenAddArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let request = TokenCreateRequest {
        role: args.role.into(),
        description: args.description,
    };

    let body = ctx.transport.post(TOKEN_PATH, &fields_of(&request)?).await?;
    let created: TokenCreatedResponse = parse_response(body).map_err(invalid(INVALID_RESPONSE))?;

    emit(out, &format!("{} token: {}", request.role.as_str(), created.token))
}

pub(crate) async fn handle_token_delete(
    ctx: &AppContext,
    args: RecordIdArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let query = RecordIdQuery { id: args.id };

    let body = ctx.transport.delete(TOKEN_PATH, &fields_of(&query)?).await?;
    let response: MessageResponse = parse_response(body).map_err(invalid(INVALID_RESPONSE))?;

    emit(out, response.message.as_str())
}

pub(crate) async fn handle_token_list(ctx: &AppContext, out: &mut dyn Write) -> CliResult<()> {
    let body = ctx.transport.get(TOKEN_PATH, &Fields::new()).await?;
    let list: TokenListResponse = parse_response(body).map_err(invalid(INVALID_TOKEN_LIST))?;

    emit(out, &render_token_list(&list, ctx.output)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::cli::RoleArg;
    use crate::client::{CliError, TransportError};
    use crate::commands::test_support::context_with;

    fn output(buffer: Vec<u8>) -> Result<String> {
        Ok(String::from_utf8(buffer)?)
    }

    #[tokio::test]
    async fn token_add_posts_role_and_description() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/token")
                .header("authorization", "bearer abcd")
                .json_body(json!({"role": "admin", "description": "desc"}));
            then.status(200).json_body(json!({"token": "xyz"}));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;
        let mut out = Vec::new();

        handle_token_add(
            &ctx,
            TokenAddArgs {
                role: RoleArg::Admin,
                description: Some("desc".to_string()),
            },
            &mut out,
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;

        mock.assert();
        assert_eq!(output(out)?, "admin token: xyz\n");
        Ok(())
    }

    #[tokio::test]
    async fn token_add_rejects_response_without_token() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/v1/token");
            then.status(200).json_body(json!({"tok": "xyz"}));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;

        let result = handle_token_add(
            &ctx,
            TokenAddArgs {
                role: RoleArg::Server,
                description: None,
            },
            &mut Vec::new(),
        )
        .await;

        assert!(matches!(result, Err(CliError::Validation(message)) if message == INVALID_RESPONSE));
        Ok(())
    }

    #[tokio::test]
    async fn token_delete_prints_confirmation() -> Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(DELETE)
                .path("/api/v1/token")
                .json_body(json!({"id": 1}));
            then.status(200).json_body(json!({"message": "xyz"}));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;
        let mut out = Vec::new();

        handle_token_delete(&ctx, RecordIdArgs { id: 1 }, &mut out)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        mock.assert();
        assert_eq!(output(out)?, "xyz\n");
        Ok(())
    }

    #[tokio::test]
    async fn token_delete_rejects_non_object_response() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(DELETE).path("/api/v1/token");
            then.status(200).json_body(json!("abcd"));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;

        let result = handle_token_delete(&ctx, RecordIdArgs { id: 1 }, &mut Vec::new()).await;

        assert!(matches!(result, Err(CliError::Validation(message)) if message == INVALID_RESPONSE));
        Ok(())
    }

    #[tokio::test]
    async fn token_list_renders_table() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/token");
            then.status(200).json_body(json!({
                "tokens": [{"id": "1", "role": "admin", "description": "d", "created": "t"}]
            }));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;
        let mut out = Vec::new();

        handle_token_list(&ctx, &mut out)
            .await
            .map_err(|err| anyhow!(err.display_message()))?;

        let text = output(out)?;
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id  role   description  created");
        assert_eq!(lines[2], "1   admin  d            t");
        Ok(())
    }

    #[tokio::test]
    async fn token_list_rejects_records_missing_fields() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/token");
            then.status(200).json_body(json!({
                "tokens": [{"role": "admin", "description": "d", "created": "t"}]
            }));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;

        let result = handle_token_list(&ctx, &mut Vec::new()).await;

        assert!(matches!(result, Err(CliError::Validation(message)) if message == INVALID_TOKEN_LIST));
        Ok(())
    }

    #[tokio::test]
    async fn token_list_surfaces_transport_errors() -> Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/token");
            then.status(403).json_body(json!({"message": "forbidden"}));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_with(&server, &dir.path().join("known_hosts"))?;

        let result = handle_token_list(&ctx, &mut Vec::new()).await;

        assert!(matches!(
            result,
            Err(CliError::Transport(TransportError::Api { ref message, .. })) if message == "forbidden"
        ));
        Ok(())
    }
}
