//! Interactive shell over an [`AppContext`].

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser};
use misebox_core::auth::{CredentialKind, EmailIntent};
use misebox_core::dashboard::DashboardView;
use misebox_core::navigation::{apply_profile_action, Toolbar, ToolbarAction, ToolbarItem};
use misebox_core::onboarding::Gate;
use misebox_core::session::{ListenedEntity, VerifyOutcome};
use misebox_core::sync::MemoryDocumentStore;
use misebox_core::{AppContext, AuthState, DashboardRoute, FullName, GlobalRoute, Route, UserRole};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::auth::build_provider;
use crate::cli::{
    DashCommand, EntityArg, MenuAction, NavCommand, RoleCommand, ShellCommand, ShellLine,
    SignInMethod,
};
use crate::error::CliError;
use crate::paths::{accounts_path, load_config};

const PROMPT: &str = "misebox> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell {
    context: AppContext,
    store: MemoryDocumentStore,
    store_path: Option<PathBuf>,
}

pub async fn run_shell(config_path: &Path, store_path: PathBuf, offline: bool) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let selected = build_provider(&config, offline, &accounts_path(&store_path))?;
    tracing::debug!("Auth provider: {:?}", selected.kind());
    let stored_user = match selected.stored_user().await {
        Ok(user) => user,
        Err(error) => {
            tracing::warn!("Could not read the stored session: {}", error);
            None
        }
    };

    let store = MemoryDocumentStore::load_from_path(&store_path)?;
    let context = AppContext::new(config, selected.shared(), Arc::new(store.clone()));
    let mut shell = Shell::new(context, store, Some(store_path));

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", shell.context.onboarding.welcome())?;
    if let Some(user) = stored_user {
        let who = user.email.unwrap_or(user.id);
        writeln!(stdout, "Found a stored session for {who}; sign in again to load the profile.")?;
    }
    writeln!(stdout, "Type `help` for commands.")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        write!(stdout, "{PROMPT}")?;
        stdout.flush()?;
        let Some(line) = lines.next_line().await? else {
            writeln!(stdout)?;
            break;
        };
        let flow = match shell.execute_line(&line, &mut stdout).await {
            Ok(flow) => flow,
            Err(error) => {
                writeln!(stdout, "{}", error.user_message())?;
                Flow::Continue
            }
        };
        if let Err(error) = shell.persist() {
            tracing::warn!("Failed to save document store: {}", error);
        }
        if flow == Flow::Quit {
            break;
        }
    }
    Ok(())
}

impl Shell {
    pub const fn new(
        context: AppContext,
        store: MemoryDocumentStore,
        store_path: Option<PathBuf>,
    ) -> Self {
        Self {
            context,
            store,
            store_path,
        }
    }

    pub const fn context(&self) -> &AppContext {
        &self.context
    }

    /// Save the document store snapshot, if the shell has a store file.
    pub fn persist(&self) -> Result<(), CliError> {
        if let Some(path) = &self.store_path {
            self.store.save_to_path(path)?;
        }
        Ok(())
    }

    /// Parse and run one input line. Parse errors are printed, not returned.
    pub async fn execute_line(
        &mut self,
        line: &str,
        out: &mut impl Write,
    ) -> Result<Flow, CliError> {
        let words = split_line(line);
        if words.is_empty() {
            return Ok(Flow::Continue);
        }
        match ShellLine::try_parse_from(words) {
            Ok(parsed) => self.execute(parsed.command, out).await,
            Err(error) => {
                write!(out, "{}", error.render())?;
                Ok(Flow::Continue)
            }
        }
    }

    async fn execute(&mut self, command: ShellCommand, out: &mut impl Write) -> Result<Flow, CliError> {
        match command {
            ShellCommand::Signin {
                method,
                email,
                password,
                returning,
                token,
                nonce,
            } => {
                let onboarding = &mut self.context.onboarding;
                if let Some(email) = email {
                    onboarding.email = email;
                }
                if let Some(password) = password {
                    onboarding.password = password;
                }
                onboarding.intent = if returning {
                    EmailIntent::ReturningUser
                } else {
                    EmailIntent::NewUser
                };
                if let Some(token) = token {
                    onboarding.identity_token = token;
                }
                onboarding.nonce = nonce;

                match self.context.sign_in(credential_kind(method)).await? {
                    VerifyOutcome::Authenticated { user_id, anonymous } => {
                        let suffix = if anonymous { " (anonymous)" } else { "" };
                        writeln!(out, "Signed in as {user_id}{suffix}")?;
                    }
                    VerifyOutcome::Discarded => writeln!(out, "Sign-in was superseded")?,
                }
            }
            ShellCommand::Signout => {
                self.context.sign_out().await;
                writeln!(out, "Signed out")?;
            }
            ShellCommand::Whoami => self.print_whoami(out)?,
            ShellCommand::Username { name } => {
                self.context.session.update_username(&name.join(" "))?;
                writeln!(out, "Username set to {}", self.context.session.user().username)?;
            }
            ShellCommand::Role { command } => self.run_role(command, out)?,
            ShellCommand::Name {
                first,
                last,
                middle,
            } => {
                let full_name =
                    FullName::new(first, middle.unwrap_or_default(), last.unwrap_or_default());
                self.context.session.set_full_name(full_name);
                writeln!(out, "Name set to {}", self.context.session.profile().display_name())?;
            }
            ShellCommand::Save => {
                self.context.session.persist_profile().await?;
                writeln!(out, "Saved")?;
            }
            ShellCommand::Refresh => {
                self.context.session.refresh_from_remote().await?;
                writeln!(out, "Refreshed from remote")?;
            }
            ShellCommand::Listen { entity } => {
                let entities = entity.map_or_else(|| ListenedEntity::ALL.to_vec(), |entity| {
                    vec![listened_entity(entity)]
                });
                for entity in entities {
                    let handle = self.context.session.attach_listener(entity)?;
                    writeln!(out, "Listening to {entity:?} (#{})", handle.0)?;
                }
            }
            ShellCommand::Sync => {
                let applied = self.context.session.process_remote_changes();
                writeln!(out, "Applied {applied} remote change(s)")?;
            }
            ShellCommand::Users => {
                let mut feed = self.context.session.watch_users()?;
                let users = feed.latest().unwrap_or_default();
                if users.is_empty() {
                    writeln!(out, "No users stored")?;
                }
                for user in users {
                    writeln!(out, "{}  {}  [{}]", user.id, user.username, format_roles(&user.roles))?;
                }
            }
            ShellCommand::Menu { action } => {
                if let Some(action) = action {
                    self.context.apply(toolbar_action(action));
                    writeln!(out, "{}", format_path(&self.context.navigation.path()))?;
                } else {
                    writeln!(out, "{}", render_toolbar(&self.context.toolbar()))?;
                }
            }
            ShellCommand::Nav { command } => self.run_nav(command, out)?,
            ShellCommand::Dash { command } => self.run_dash(command, out)?,
            ShellCommand::Screen => {
                let gate = self.context.gate();
                if gate == Gate::SignIn {
                    writeln!(out, "sign-in: {}", self.context.onboarding.welcome())?;
                } else {
                    writeln!(out, "{}", serde_json::to_string(&self.context.screen())?)?;
                }
            }
            ShellCommand::Welcome => {
                writeln!(out, "{}", self.context.onboarding.advance_welcome())?;
            }
            ShellCommand::Help => {
                write!(out, "{}", ShellLine::command().render_help())?;
            }
            ShellCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn print_whoami(&self, out: &mut impl Write) -> Result<(), CliError> {
        let session = &self.context.session;
        let state = match session.state() {
            AuthState::Unauthenticated => "signed out",
            AuthState::Authenticating => "signing in",
            AuthState::Authenticated { anonymous: true } => "signed in (anonymous)",
            AuthState::Authenticated { anonymous: false } => "signed in",
        };
        writeln!(out, "state: {state}")?;
        if !session.is_authenticated() {
            return Ok(());
        }

        let user = session.user();
        let profile = session.profile();
        writeln!(out, "id: {}", user.id)?;
        writeln!(out, "username: {}", user.username)?;
        writeln!(out, "name: {}", profile.display_name())?;
        writeln!(out, "image: {}", user.image_url)?;
        writeln!(out, "verified: {}", if user.verified { "yes" } else { "no" })?;
        writeln!(out, "roles: {}", format_roles(&user.roles))?;
        writeln!(out, "providers: {}", profile.account_providers.join(", "))?;
        Ok(())
    }

    fn run_role(&mut self, command: RoleCommand, out: &mut impl Write) -> Result<(), CliError> {
        match command {
            RoleCommand::Add { tag, attributes } => {
                let mut role = UserRole::new(&tag)?;
                for attribute in attributes {
                    let (key, value) = parse_attribute(&attribute)?;
                    role = role.with_attribute(key, value)?;
                }
                writeln!(out, "Added role {}", role.role)?;
                self.context.session.add_role(role);
            }
            RoleCommand::Remove { tag } => {
                if self.context.session.remove_role(&tag) {
                    writeln!(out, "Removed role {}", tag.trim())?;
                } else {
                    writeln!(out, "No role {} to remove", tag.trim())?;
                }
            }
        }
        Ok(())
    }

    fn run_nav(&self, command: NavCommand, out: &mut impl Write) -> Result<(), CliError> {
        let navigation = &self.context.navigation;
        match command {
            NavCommand::Push { route } => navigation.push(global_route(&route)?),
            NavCommand::Pop => {
                if navigation.pop().is_none() {
                    writeln!(out, "Already at the root screen")?;
                }
            }
            NavCommand::Reset { routes } => {
                let routes = routes
                    .iter()
                    .map(|route| global_route(route))
                    .collect::<Result<Vec<_>, _>>()?;
                navigation.reset(routes);
            }
            NavCommand::Show => {}
        }
        writeln!(out, "{}", format_path(&navigation.path()))?;
        Ok(())
    }

    fn run_dash(&self, command: Option<DashCommand>, out: &mut impl Write) -> Result<(), CliError> {
        if self.context.gate() == Gate::SignIn {
            writeln!(out, "Sign in to open the dashboard")?;
            return Ok(());
        }
        let dashboard = &self.context.dashboard;
        match command {
            None => match self.context.dashboard_view() {
                DashboardView::Anonymous => {
                    writeln!(out, "You are browsing anonymously. Sign in to build your profile.")?;
                }
                DashboardView::Cards {
                    user_card,
                    role_card,
                    sign_out,
                } => {
                    writeln!(out, "user card: {}", serde_json::to_string(&user_card)?)?;
                    if let Some(role_card) = role_card {
                        writeln!(out, "role card: {}", serde_json::to_string(&role_card)?)?;
                    }
                    writeln!(out, "[{sign_out}]")?;
                }
            },
            Some(DashCommand::Tap { route }) => {
                let route = DashboardRoute::from_key(&route).ok_or_else(|| CliError::UnknownRoute {
                    registry: "dashboard",
                    key: route.clone(),
                })?;
                if !dashboard.tap(route) {
                    writeln!(out, "No {} card on this dashboard", route.display_name())?;
                }
                writeln!(out, "{}", serde_json::to_string(&dashboard.screen())?)?;
            }
            Some(DashCommand::Back) => {
                apply_profile_action(ToolbarAction::Back, dashboard.navigation());
                writeln!(out, "{}", render_toolbar(&dashboard.toolbar()))?;
            }
        }
        Ok(())
    }
}

/// Split a line on whitespace, keeping double-quoted sections together.
pub fn split_line(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_word = false;

    for character in line.chars() {
        match character {
            '"' => {
                quoted = !quoted;
                has_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_word {
                    words.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        words.push(current);
    }
    words
}

pub fn parse_attribute(raw: &str) -> Result<(String, String), CliError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::InvalidAttribute(raw.to_string()))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

pub fn render_toolbar(toolbar: &Toolbar) -> String {
    let render = |items: &[ToolbarItem]| {
        items
            .iter()
            .map(|item| match item {
                ToolbarItem::Menu { entries, .. } => format!(
                    "menu({})",
                    entries
                        .iter()
                        .map(|entry| entry.label.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                ToolbarItem::Back { label, .. } => format!("< {label}"),
                ToolbarItem::Title(title) => title.clone(),
                ToolbarItem::Button { icon, label, .. } if icon.is_empty() => format!("[{label}]"),
                ToolbarItem::Button { icon, label, .. } => format!("[{label} {icon}]"),
            })
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!("{} | {}", render(&toolbar.leading), render(&toolbar.trailing))
}

fn format_path<R: Route>(path: &[R]) -> String {
    if path.is_empty() {
        return "(root)".to_string();
    }
    path.iter()
        .map(|route| route.display_name())
        .collect::<Vec<_>>()
        .join(" > ")
}

fn format_roles(roles: &[UserRole]) -> String {
    roles
        .iter()
        .map(|role| {
            if role.attributes.is_empty() {
                role.role.clone()
            } else {
                let attributes = role
                    .attributes
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}({attributes})", role.role)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn global_route(key: &str) -> Result<GlobalRoute, CliError> {
    GlobalRoute::from_key(key).ok_or_else(|| CliError::UnknownRoute {
        registry: "menu",
        key: key.to_string(),
    })
}

const fn credential_kind(method: SignInMethod) -> CredentialKind {
    match method {
        SignInMethod::Anonymous => CredentialKind::Anonymous,
        SignInMethod::Google => CredentialKind::Google,
        SignInMethod::Apple => CredentialKind::Apple,
        SignInMethod::Email => CredentialKind::Email,
    }
}

const fn listened_entity(entity: EntityArg) -> ListenedEntity {
    match entity {
        EntityArg::User => ListenedEntity::User,
        EntityArg::Profile => ListenedEntity::Profile,
    }
}

const fn toolbar_action(action: MenuAction) -> ToolbarAction {
    match action {
        MenuAction::Option1 => ToolbarAction::SelectOption1,
        MenuAction::Option2 => ToolbarAction::SelectOption2,
        MenuAction::Notifs => ToolbarAction::OpenNotifs,
        MenuAction::Chats => ToolbarAction::OpenChats,
        MenuAction::Back => ToolbarAction::Back,
        MenuAction::Help => ToolbarAction::Help,
    }
}
