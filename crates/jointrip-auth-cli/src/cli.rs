use clap::{Parser, Subcommand, ValueEnum};
use jointrip_auth::TokenKind;

#[derive(Parser)]
#[command(name = "jointrip-auth")]
#[command(about = "JoinTrip authentication tooling: config checks and token inspection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the configuration file (defaults to ./jointrip-auth.toml if present)
    #[arg(short, long, global = true, env = "JOINTRIP_CONFIG")]
    pub config: Option<String>,

    /// Log level filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the configuration, then print it with secrets redacted
    CheckConfig,
    /// Print the identity provider consent URL
    AuthUrl(AuthUrlArgs),
    /// Issue, inspect, and verify first-party tokens
    Token(TokenArgs),
}

#[derive(clap::Args)]
pub struct AuthUrlArgs {
    /// Opaque state echoed back by the provider
    #[arg(long)]
    pub state: String,
}

#[derive(clap::Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue an access/refresh pair for an account id
    Issue {
        /// Account id (UUID)
        account_id: uuid::Uuid,
    },
    /// Decode a token after checking its signature, ignoring expiry
    Inspect {
        /// Signed token
        token: String,
    },
    /// Fully verify a token and print its subject
    Verify {
        /// Signed token
        token: String,
        /// Expected token type
        #[arg(long, default_value = "access")]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Access,
    Refresh,
}

impl From<KindArg> for TokenKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Access => TokenKind::Access,
            KindArg::Refresh => TokenKind::Refresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_token_verify() {
        let cli = Cli::try_parse_from([
            "jointrip-auth",
            "--config",
            "auth.toml",
            "token",
            "verify",
            "abc.def.ghi",
            "--kind",
            "refresh",
        ])
        .unwrap();

        assert_eq!(cli.config.as_deref(), Some("auth.toml"));
        match cli.command {
            Commands::Token(TokenArgs {
                command: TokenCommands::Verify { token, kind },
            }) => {
                assert_eq!(token, "abc.def.ghi");
                assert_eq!(TokenKind::from(kind), TokenKind::Refresh);
            }
            _ => panic!("expected token verify"),
        }
    }

    #[test]
    fn test_issue_requires_uuid() {
        assert!(Cli::try_parse_from(["jointrip-auth", "token", "issue", "not-a-uuid"]).is_err());
    }
}
