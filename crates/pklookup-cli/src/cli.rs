//! Argument parsing, command dispatch, and error reporting.

use std::ffi::OsString;
use std::io::{self, Write};

use clap::{Args, Parser, Subcommand, ValueEnum};
use pklookup_api_models::TokenRole;

use crate::client::{AppContext, CliResult};
use crate::commands::servers::{
    handle_server_add, handle_server_delete, handle_server_list, handle_server_save_key,
};
use crate::commands::tokens::{handle_token_add, handle_token_delete, handle_token_list};
use crate::settings::{DEFAULT_CONFIG_FILE, Settings};

/// Parses process arguments, executes the requested command, and reports
/// failures on stderr. Returns the process exit code.
pub async fn run() -> i32 {
    run_with(std::env::args_os(), &mut io::stdout(), &mut io::stderr()).await
}

/// Same as [`run`] with explicit arguments and output streams.
pub async fn run_with<'a, I, T>(
    args: I,
    stdout: &'a mut dyn Write,
    stderr: &'a mut dyn Write,
) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let target = if err.use_stderr() { stderr } else { stdout };
            let _ = write!(target, "{}", err.render());
            return err.exit_code();
        }
    };
    let command = command_label(&cli.command);

    match dispatch(cli, stdout).await {
        Ok(()) => 0,
        Err(err) => {
            let message = err.display_message();
            tracing::debug!(command, category = err.category(), %message, "command failed");
            let _ = writeln!(stderr, "ERROR: {message}");
            err.exit_code()
        }
    }
}

async fn dispatch(cli: Cli, out: &mut dyn Write) -> CliResult<()> {
    let settings = Settings::load(&cli.config_file)?.with_prompted_token(&cli.config_file)?;
    let ctx = AppContext::new(&settings, cli.output)?;

    match cli.command {
        Command::Token(token) => match token {
            TokenCommand::Add(args) => handle_token_add(&ctx, args, out).await,
            TokenCommand::Delete(args) => handle_token_delete(&ctx, args, out).await,
            TokenCommand::List => handle_token_list(&ctx, out).await,
        },
        Command::Server(server) => match server {
            ServerCommand::Add(args) => handle_server_add(&ctx, args, out).await,
            ServerCommand::Delete(args) => handle_server_delete(&ctx, args, out).await,
            ServerCommand::List => handle_server_list(&ctx, out).await,
            ServerCommand::SaveKey(args) => handle_server_save_key(&ctx, args, out).await,
        },
    }
}

#[derive(Parser)]
#[command(
    name = "pklookup",
    version,
    about = "Administrative CLI for the pklookup public key service"
)]
pub(crate) struct Cli {
    #[arg(
        short = 'c',
        long,
        global = true,
        env = "PKLOOKUP_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    config_file: String,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for list commands"
    )]
    output: OutputFormat,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage API tokens.
    #[command(subcommand)]
    Token(TokenCommand),
    /// Manage registered servers and their public keys.
    #[command(subcommand)]
    Server(ServerCommand),
}

#[derive(Subcommand)]
enum TokenCommand {
    /// Issue a new token.
    Add(TokenAddArgs),
    /// Revoke a token.
    Delete(RecordIdArgs),
    /// List all tokens.
    List,
}

#[derive(Subcommand)]
enum ServerCommand {
    /// Register a server public key.
    Add(ServerAddArgs),
    /// Remove a registered server.
    Delete(RecordIdArgs),
    /// List registered servers.
    List,
    /// Append a server's key to the known-hosts file.
    SaveKey(RecordIdArgs),
}

#[derive(Args)]
pub(crate) struct TokenAddArgs {
    #[arg(short, long, value_enum)]
    pub(crate) role: RoleArg,
    #[arg(short, long)]
    pub(crate) description: Option<String>,
}

#[derive(Args)]
pub(crate) struct ServerAddArgs {
    #[arg(long, help = "Public key, or @path to read the first line of a key file")]
    pub(crate) public_key: String,
}

#[derive(Args)]
pub(crate) struct RecordIdArgs {
    #[arg(long)]
    pub(crate) id: i64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum RoleArg {
    Admin,
    Server,
}

impl From<RoleArg> for TokenRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Admin => Self::Admin,
            RoleArg::Server => Self::Server,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Token(TokenCommand::Add(_)) => "token_add",
        Command::Token(TokenCommand::Delete(_)) => "token_delete",
        Command::Token(TokenCommand::List) => "token_list",
        Command::Server(ServerCommand::Add(_)) => "server_add",
        Command::Server(ServerCommand::Delete(_)) => "server_delete",
        Command::Server(ServerCommand::List) => "server_list",
        Command::Server(ServerCommand::SaveKey(_)) => "server_save_key",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_save_key_with_global_config_flag() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from([
            "pklookup",
            "server",
            "save-key",
            "--id=3",
            "-c",
            "/tmp/pklookup.ini",
        ])?;
        assert_eq!(cli.config_file, "/tmp/pklookup.ini");
        assert!(matches!(
            cli.command,
            Command::Server(ServerCommand::SaveKey(RecordIdArgs { id: 3 }))
        ));
        Ok(())
    }

    #[test]
    fn token_add_requires_known_role() {
        assert!(Cli::try_parse_from(["pklookup", "token", "add"]).is_err());
        assert!(Cli::try_parse_from(["pklookup", "token", "add", "--role", "root"]).is_err());
        assert!(Cli::try_parse_from(["pklookup", "token", "add", "-r", "server"]).is_ok());
    }

    #[test]
    fn id_must_be_an_integer() {
        assert!(Cli::try_parse_from(["pklookup", "server", "delete", "--id=asdf"]).is_err());
        assert!(Cli::try_parse_from(["pklookup", "token", "delete"]).is_err());
    }

    #[test]
    fn command_label_matches_variants() -> Result<(), clap::Error> {
        let cli = Cli::try_parse_from(["pklookup", "token", "list"])?;
        assert_eq!(command_label(&cli.command), "token_list");
        let cli = Cli::try_parse_from(["pklookup", "server", "add", "--public-key", "k"])?;
        assert_eq!(command_label(&cli.command), "server_add");
        Ok(())
    }

    #[tokio::test]
    async fn parse_failures_are_routed_by_kind() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run_with(["pklookup", "--help"], &mut stdout, &mut stderr).await;
        assert_eq!(code, 0);
        assert!(String::from_utf8_lossy(&stdout).contains("token"));
        assert!(stderr.is_empty());

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run_with(["pklookup", "token", "add"], &mut stdout, &mut stderr).await;
        assert_eq!(code, 2);
        assert!(stdout.is_empty());
        assert!(String::from_utf8_lossy(&stderr).contains("--role"));
    }

    #[test]
    fn role_arg_maps_to_wire_role() {
        assert_eq!(TokenRole::from(RoleArg::Admin), TokenRole::Admin);
        assert_eq!(TokenRole::from(RoleArg::Server).as_str(), "server");
    }
}
