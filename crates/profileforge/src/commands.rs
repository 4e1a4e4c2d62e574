//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use profileforge_auth::{ExchangeCredentials, Reachability};
use profileforge_core::{
    Account, AccountId, AuthEngine, CredentialStore, Session, Settings, Submitter, Vendor,
};
use profileforge_profile::{
    Document, ProfileComposer, ProfileTemplate, ValidationReport, export_document, validate,
};
use tracing::{debug, info};

use crate::cli::{
    AccountCommands, AddAccountArgs, ConnectArgs, CredentialArgs, ExportArgs, ProfileArgs,
    SubmitArgs,
};

/// Settings and services shared by every command.
pub struct App {
    pub settings: Settings,
    pub engine: AuthEngine,
    store: Arc<CredentialStore>,
}

impl App {
    pub async fn open(config: Option<&Path>, db_path: Option<&Path>) -> Result<Self> {
        let settings = match config {
            Some(path) => Settings::load_from(path),
            None => Settings::load(),
        }
        .context("Failed to load settings")?;

        let db_path = db_path.map_or_else(Settings::database_path, Path::to_path_buf);
        if let Some(dir) = db_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        debug!("Opening account database at {}", db_path.display());
        let store = Arc::new(
            CredentialStore::open(&db_path.to_string_lossy())
                .await
                .context("Failed to open account database")?,
        );
        let engine = AuthEngine::new(Arc::clone(&store), settings.clone())?;
        Ok(Self {
            settings,
            engine,
            store,
        })
    }
}

pub async fn account(app: &App, command: AccountCommands) -> Result<()> {
    match command {
        AccountCommands::Add(args) => add_account(app, args).await,
        AccountCommands::List => list_accounts(app).await,
        AccountCommands::Remove { account } => {
            app.store.delete_account(AccountId::new(account)).await?;
            println!("Removed account {account}");
            Ok(())
        }
        AccountCommands::Wipe { yes } => {
            if !yes {
                bail!("Refusing to wipe without --yes");
            }
            let removed = app.store.wipe_all().await?;
            println!("Removed {removed} account(s)");
            Ok(())
        }
    }
}

async fn add_account(app: &App, args: AddAccountArgs) -> Result<()> {
    let mut account = Account::new(args.name, Vendor::parse(&args.vendor), args.server);
    if args.default {
        account = account.as_default();
    }
    let id = app.store.store(&mut account).await?;
    if let Some(credentials) = exchange_credentials(args.credentials) {
        app.store.store_exchange_credentials(id, &credentials)?;
    }
    println!("Added account {id} ({})", account.name);
    Ok(())
}

async fn list_accounts(app: &App) -> Result<()> {
    let accounts = app.store.accounts().list().await?;
    if accounts.is_empty() {
        println!("No accounts");
        return Ok(());
    }
    for account in accounts {
        let id = account.id.map(|id| id.to_string()).unwrap_or_default();
        let marker = if account.is_default { "*" } else { " " };
        let last_used = account
            .last_used_at
            .map_or_else(|| "never".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string());
        let signed_in = account
            .id
            .is_some_and(|id| matches!(app.store.retrieve_token(id), Ok(Some(_))));
        let state = if signed_in { "signed in" } else { "signed out" };
        println!(
            "{marker} {id:>3}  {:<20} {:<10} {}  (last used {last_used}, {state})",
            account.name,
            account.vendor.display_name(),
            account.server_url,
        );
    }
    Ok(())
}

pub async fn probe(app: &App, account: i64) -> Result<()> {
    let report = app.engine.probe(AccountId::new(account)).await?;
    for attempt in &report.attempts {
        match attempt.outcome {
            Ok(Reachability::Healthy(status)) => println!("  {status}  {}", attempt.url),
            Ok(Reachability::AuthRequired(status)) => {
                println!("  {status}  {} (credentials required)", attempt.url);
            }
            Ok(Reachability::Responded(status)) => {
                println!("  {status}  {} (unexpected status)", attempt.url);
            }
            Err(kind) => println!("  ---  {} ({kind})", attempt.url),
        }
    }
    if report.is_reachable() {
        println!("Reachable");
        Ok(())
    } else {
        bail!("Unreachable after {} attempt(s)", report.attempts.len())
    }
}

pub async fn connect(app: &App, args: ConnectArgs) -> Result<()> {
    let id = AccountId::new(args.account);
    let credentials = match exchange_credentials(args.credentials) {
        Some(credentials) => {
            if args.remember {
                app.store.store_exchange_credentials(id, &credentials)?;
            }
            credentials
        }
        None => app
            .store
            .load_exchange_credentials(id)?
            .context("No credentials given and none stored for this account")?,
    };

    match app.engine.connect(id, &credentials).await {
        Ok(session) => {
            println!(
                "Connected to {} (session valid until {})",
                session.server(),
                session.expires_at().format("%H:%M:%S UTC")
            );
            Ok(())
        }
        Err(e) => bail!(e.user_message()),
    }
}

pub async fn logout(app: &App, account: i64) -> Result<()> {
    app.engine.logout(AccountId::new(account)).await?;
    println!("Signed out");
    Ok(())
}

pub fn validate_profile(app: &App, args: &ProfileArgs) -> Result<()> {
    let document = load_document(&app.settings, args)?;
    let report = validate(&document);
    print_report(&report);
    if report.is_valid() {
        println!("'{}' is valid", document.name);
        Ok(())
    } else {
        bail!("'{}' has {} error(s)", document.name, report.errors.len())
    }
}

pub fn export(app: &App, args: &ExportArgs) -> Result<()> {
    let document = load_document(&app.settings, &args.profile)?;
    let dir = args
        .out
        .clone()
        .or_else(|| app.settings.export_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));
    let encoding = args
        .encoding
        .map_or(app.settings.export_encoding, Into::into);

    match export_document(&document, &dir, encoding) {
        Ok(path) => {
            println!("Wrote {}", path.display());
            Ok(())
        }
        Err(profileforge_profile::Error::Validation(report)) => {
            print_report(&report);
            bail!("'{}' was not exported", document.name)
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn submit(app: &App, args: &SubmitArgs) -> Result<()> {
    let document = load_document(&app.settings, &args.profile)?;
    let session = resume(app, AccountId::new(args.account)).await?;
    let submitter = Submitter::new(&app.settings)?;
    match submitter.submit(&document, &session).await {
        Ok(outcome) => {
            println!("Profile '{}' {outcome}", document.name);
            Ok(())
        }
        Err(profileforge_core::Error::Validation { report, .. }) => {
            print_report(&report);
            bail!("'{}' was not submitted", document.name)
        }
        Err(e) => Err(e.into()),
    }
}

async fn resume(app: &App, id: AccountId) -> Result<Session> {
    if let Some(session) = app.engine.session(id).await {
        return Ok(session);
    }
    let Some(credentials) = app.store.load_exchange_credentials(id)? else {
        bail!("Account {id} is signed out; run `profileforge connect {id}` first");
    };
    info!("No stored session for account {id}; reconnecting");
    app.engine
        .connect(id, &credentials)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()))
}

fn exchange_credentials(args: CredentialArgs) -> Option<ExchangeCredentials> {
    match args {
        CredentialArgs {
            client_id: Some(id),
            client_secret: Some(secret),
            ..
        } => Some(ExchangeCredentials::client_credentials(id, secret)),
        CredentialArgs {
            username: Some(username),
            password: Some(password),
            ..
        } => Some(ExchangeCredentials::basic(username, password)),
        _ => None,
    }
}

fn load_document(settings: &Settings, args: &ProfileArgs) -> Result<Document> {
    let is_profile = args
        .source
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mobileconfig"));

    let mut composer = if is_profile {
        let bytes = std::fs::read(&args.source)
            .with_context(|| format!("Failed to read {}", args.source.display()))?;
        let document = Document::from_plist_bytes(&bytes)
            .with_context(|| format!("{} is not a profile", args.source.display()))?;
        ProfileComposer::from_document(&document)
    } else {
        let template = ProfileTemplate::from_file(&args.source)
            .with_context(|| format!("Failed to load template {}", args.source.display()))?;
        let Some(identifier) = args.identifier.as_deref() else {
            bail!("--identifier is required when building from a template");
        };
        let mut composer = ProfileComposer::new(template.name.clone(), identifier)
            .with_description(template.description.clone());
        if let Some(organization) = &settings.default_organization {
            composer = composer.with_organization(organization.clone());
        }
        composer.apply_template(&template);
        composer
    };

    if let Some(name) = &args.name {
        composer.set_name(name.clone());
    }
    if let Some(organization) = &args.organization {
        composer = composer.with_organization(organization.clone());
    }
    Ok(composer.build())
}

fn print_report(report: &ValidationReport) {
    for issue in &report.errors {
        println!("error: {issue}");
    }
    for issue in &report.warnings {
        println!("warning: {issue}");
    }
    for issue in &report.compliance_issues {
        println!("compliance: {issue}");
    }
    for issue in &report.suggestions {
        println!("suggestion: {issue}");
    }
}
