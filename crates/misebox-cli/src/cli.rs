use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "misebox")]
#[command(about = "Drive the Misebox client from the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Optional path to the client config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Optional path to the local document store snapshot
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Use the offline auth provider even when Supabase is configured
    #[arg(long, global = true)]
    pub offline: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive shell (default)
    Shell,
    /// Manage the client config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    #[value(name = "powershell")]
    PowerShell,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a config file, keeping values already present
    Init {
        /// Collection holding user documents
        #[arg(long, value_name = "NAME")]
        users_collection: Option<String>,
        /// Collection holding extended profile documents
        #[arg(long, value_name = "NAME")]
        profiles_collection: Option<String>,
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Overwrite an existing file instead of merging into it
        #[arg(long)]
        force: bool,
    },
    /// Print the effective config
    Show,
}

/// One line typed into the interactive shell.
#[derive(Parser)]
#[command(name = "misebox>", no_binary_name = true, disable_help_subcommand = true)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct ShellLine {
    #[command(subcommand)]
    pub command: ShellCommand,
}

#[derive(Subcommand)]
pub enum ShellCommand {
    /// Sign in with a provider
    Signin {
        #[arg(value_enum)]
        method: SignInMethod,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Sign in to an existing email account instead of creating one
        #[arg(long)]
        returning: bool,
        /// Identity token from Google or Apple
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        nonce: Option<String>,
    },
    /// Sign out and clear the local profile
    Signout,
    /// Show the session and profile
    Whoami,
    /// Change the username
    Username { name: Vec<String> },
    /// Add or remove roles
    Role {
        #[command(subcommand)]
        command: RoleCommand,
    },
    /// Set the full name
    Name {
        first: String,
        last: Option<String>,
        #[arg(long)]
        middle: Option<String>,
    },
    /// Write the profile to the document store
    Save,
    /// Reload the profile from the document store
    Refresh,
    /// Attach document listeners (both when no entity is given)
    Listen {
        #[arg(value_enum)]
        entity: Option<EntityArg>,
    },
    /// Apply queued remote changes
    Sync,
    /// List every stored user
    Users,
    /// Show the main toolbar, or apply one of its actions
    Menu {
        #[arg(value_enum)]
        action: Option<MenuAction>,
    },
    /// Inspect or change the main navigation path
    Nav {
        #[command(subcommand)]
        command: NavCommand,
    },
    /// Show the dashboard, or act on it
    Dash {
        #[command(subcommand)]
        command: Option<DashCommand>,
    },
    /// Print the visible main screen
    Screen,
    /// Rotate the welcome message
    Welcome,
    /// List shell commands
    Help,
    /// Leave the shell
    #[command(alias = "exit")]
    Quit,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum SignInMethod {
    #[value(alias = "anon")]
    Anonymous,
    Google,
    Apple,
    Email,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum EntityArg {
    User,
    Profile,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum MenuAction {
    Option1,
    Option2,
    Notifs,
    Chats,
    Back,
    Help,
}

#[derive(Subcommand)]
pub enum RoleCommand {
    /// Add a role, replacing one with the same tag
    Add {
        tag: String,
        /// Attribute as key=value; repeatable
        #[arg(long = "attr", value_name = "KEY=VALUE")]
        attributes: Vec<String>,
    },
    /// Remove a role by tag
    Remove { tag: String },
}

#[derive(Subcommand)]
pub enum NavCommand {
    Push { route: String },
    Pop,
    /// Replace the path; no routes returns to the root screen
    Reset { routes: Vec<String> },
    Show,
}

#[derive(Subcommand)]
pub enum DashCommand {
    /// Open the user or role card
    Tap { route: String },
    Back,
}
