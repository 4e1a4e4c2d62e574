//! Command-line definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use profileforge_profile::Encoding;

#[derive(Parser)]
#[command(name = "profileforge")]
#[command(version, about = "Compose, validate and submit configuration profiles")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to <config dir>/profileforge/settings.json)
    #[arg(long, global = true, env = "PROFILEFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (defaults to <data dir>/profileforge/profileforge.db)
    #[arg(long, global = true, env = "PROFILEFORGE_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Account management
    Account {
        #[command(subcommand)]
        command: AccountCommands,
    },

    /// Check that an account's server answers
    Probe {
        /// Account id
        account: i64,
    },

    /// Authenticate an account and store its session
    Connect(ConnectArgs),

    /// Sign an account out
    Logout {
        /// Account id
        account: i64,
    },

    /// Validate a profile without sending it
    Validate(ProfileArgs),

    /// Write a profile to disk
    Export(ExportArgs),

    /// Create or update a profile on an account's server
    Submit(SubmitArgs),
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Add an account
    Add(AddAccountArgs),

    /// List accounts
    List,

    /// Remove an account and its stored secrets
    Remove {
        /// Account id
        account: i64,
    },

    /// Remove every account and every stored secret
    Wipe {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Args)]
pub struct AddAccountArgs {
    /// Display name
    #[arg(long)]
    pub name: String,

    /// Server address, e.g. https://acme.jamfcloud.com
    #[arg(long)]
    pub server: String,

    /// Vendor (jamf, kandji, mosyle, custom)
    #[arg(long, default_value = "jamf")]
    pub vendor: String,

    /// Make this the default account
    #[arg(long)]
    pub default: bool,

    #[command(flatten)]
    pub credentials: CredentialArgs,
}

#[derive(Args, Default)]
pub struct CredentialArgs {
    /// API client id
    #[arg(long, requires = "client_secret", conflicts_with = "username")]
    pub client_id: Option<String>,

    /// API client secret
    #[arg(long, env = "PROFILEFORGE_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Username for basic exchange
    #[arg(long, requires = "password")]
    pub username: Option<String>,

    /// Password for basic exchange
    #[arg(long, env = "PROFILEFORGE_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args)]
pub struct ConnectArgs {
    /// Account id
    pub account: i64,

    #[command(flatten)]
    pub credentials: CredentialArgs,

    /// Store the given credentials for later connects
    #[arg(long)]
    pub remember: bool,
}

#[derive(Args)]
pub struct ProfileArgs {
    /// Template (.json) or existing profile (.mobileconfig)
    pub source: PathBuf,

    /// Profile name (defaults to the template name)
    #[arg(long)]
    pub name: Option<String>,

    /// Reverse-DNS profile identifier (required for templates)
    #[arg(long)]
    pub identifier: Option<String>,

    /// Organization (defaults to the configured organization)
    #[arg(long)]
    pub organization: Option<String>,
}

#[derive(Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub profile: ProfileArgs,

    /// Output directory (defaults to the configured export directory)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Output encoding (defaults to the configured encoding)
    #[arg(long, value_enum)]
    pub encoding: Option<EncodingArg>,
}

#[derive(Args)]
pub struct SubmitArgs {
    /// Account id
    #[arg(long)]
    pub account: i64,

    #[command(flatten)]
    pub profile: ProfileArgs,
}

/// Property list encoding.
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum EncodingArg {
    Xml,
    Binary,
}

impl From<EncodingArg> for Encoding {
    fn from(arg: EncodingArg) -> Self {
        match arg {
            EncodingArg::Xml => Self::Xml,
            EncodingArg::Binary => Self::Binary,
        }
    }
}
