//! svnportal command-line management tool.
//!
//! Manages the project registry and per-project password overrides, and
//! exercises repository access (root lookup, directory listing) as a given
//! user. Also generates and validates configuration files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use dialoguer::Password;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use svnportal_core::config::AppConfig;
use svnportal_core::crypto::{AesGcmCipher, MissingKeyCipher, PasswordCipher};
use svnportal_core::db::Database;
use svnportal_core::models::{DirEntry, NodeKind, Project, Revision, TransportType, User};
use svnportal_core::service::RepositoryService;
use svnportal_core::transport::initialize_transports;
use svnportal_core::url::normalize_url;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// svnportal command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "svnportal",
    version,
    about = "Manage projects and inspect their Subversion repositories"
)]
struct Cli {
    /// Path to the TOML configuration file.
    /// Defaults to `<config dir>/svnportal/config.toml`.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter. Defaults to the config's `logging.level`, or
    /// `warn` without a config; RUST_LOG overrides both.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./svnportal.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Print a fresh base64 key for stored-password encryption.
    Keygen,

    /// Manage registered projects.
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Manage per-project password overrides.
    Override {
        #[command(subcommand)]
        action: OverrideAction,
    },

    /// Print the repository root URL of a project.
    Root {
        /// Project code.
        code: String,

        #[command(flatten)]
        user: UserArgs,
    },

    /// List a directory in a project's repository.
    Ls {
        /// Project code.
        code: String,

        /// Repository path, relative to the root.
        #[arg(default_value = "/")]
        path: String,

        /// Revision to list (default: HEAD).
        #[arg(short, long)]
        rev: Option<i64>,

        /// Emit JSON instead of a table.
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        user: UserArgs,
    },

    /// Create an empty local repository and print its file:// URL.
    CreateRepo {
        /// Directory to create the repository in.
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum ProjectAction {
    /// Register a project.
    Add {
        /// Unique project code.
        code: String,

        /// Repository URL.
        url: String,

        /// How the repository is served.
        #[arg(short = 't', long = "type", value_enum, default_value_t = ProjectTransport::Svn)]
        transport: ProjectTransport,

        /// Free-form description.
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List registered projects.
    List,
    /// Remove a project and its overrides.
    Remove {
        /// Project code.
        code: String,
    },
}

#[derive(Subcommand, Debug)]
enum OverrideAction {
    /// Store a project-specific password for a user.
    Set {
        /// Project code.
        code: String,

        /// Portal username.
        username: String,

        /// Read the password from this environment variable instead of
        /// prompting.
        #[arg(long)]
        password_env: Option<String>,
    },
    /// Remove a user's project-specific password.
    Remove {
        /// Project code.
        code: String,

        /// Portal username.
        username: String,
    },
    /// List users holding an override on a project.
    List {
        /// Project code.
        code: String,
    },
}

/// Who the repository is accessed as.
#[derive(Args, Debug)]
struct UserArgs {
    /// Portal username.
    #[arg(short, long, env = "USER")]
    user: String,

    /// Environment variable holding the user's global password.
    #[arg(long, default_value = "SVNPORTAL_PASSWORD")]
    password_env: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProjectTransport {
    Svn,
    Http,
    HttpMultiplexed,
}

impl From<ProjectTransport> for TransportType {
    fn from(t: ProjectTransport) -> Self {
        match t {
            ProjectTransport::Svn => TransportType::Svn,
            ProjectTransport::Http => TransportType::Http,
            ProjectTransport::HttpMultiplexed => TransportType::HttpMultiplexed,
        }
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(default_config_path);
    let config_level = AppConfig::load_from_file(&config_path)
        .ok()
        .map(|config| config.logging.level);
    let level = log_level(cli.log_level.as_deref(), config_level.as_deref());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&config_path),
        Commands::Keygen => cmd_keygen(),
        command => {
            // Everything else needs the config and database
            let config = load_config(&config_path)?;
            let db = Arc::new(open_database(&config)?);

            match command {
                Commands::Project { action } => cmd_project(&db, action),
                Commands::Override { action } => cmd_override(&db, &config, action),
                Commands::Root { code, user } => {
                    let service = build_service(&db, &config)?;
                    cmd_root(&db, &service, &code, &user).await
                }
                Commands::Ls {
                    code,
                    path,
                    rev,
                    json,
                    user,
                } => {
                    let service = build_service(&db, &config)?;
                    cmd_ls(&service, &code, &path, rev, json, &user).await
                }
                Commands::CreateRepo { path } => {
                    let service = build_service(&db, &config)?;
                    cmd_create_repo(&service, &path).await
                }
                Commands::Init { .. } | Commands::Validate | Commands::Keygen => {
                    unreachable!("handled above")
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Setup helpers
// ---------------------------------------------------------------------------

/// `--log-level` wins over the config file; `warn` when neither is given.
fn log_level<'a>(flag: Option<&'a str>, config: Option<&'a str>) -> &'a str {
    flag.or(config).unwrap_or("warn")
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("svnportal").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("/etc/svnportal/config.toml"))
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load_and_resolve(path).context("failed to load configuration file")
}

fn open_database(config: &AppConfig) -> Result<Database> {
    let db = Database::new(&config.database.path).context("failed to open database")?;
    db.initialize().context("failed to initialize database")?;
    Ok(db)
}

fn cipher_from(config: &AppConfig) -> Result<Arc<dyn PasswordCipher>> {
    match config.crypto.key.as_deref() {
        Some(key) => {
            let cipher = AesGcmCipher::from_base64_key(key)
                .with_context(|| format!("invalid key in ${}", config.crypto.key_env))?;
            Ok(Arc::new(cipher))
        }
        None => {
            debug!(key_env = %config.crypto.key_env, "no encryption key; overrides unavailable");
            Ok(Arc::new(MissingKeyCipher))
        }
    }
}

fn build_service(db: &Arc<Database>, config: &AppConfig) -> Result<RepositoryService> {
    let transports = initialize_transports(&config.transport);
    Ok(RepositoryService::new(
        db.clone(),
        db.clone(),
        cipher_from(config)?,
        transports,
        config.transport.clone(),
    ))
}

fn current_user(args: &UserArgs) -> User {
    let password = std::env::var(&args.password_env).unwrap_or_else(|_| {
        warn!(env = %args.password_env, "password variable not set; using empty password");
        String::new()
    });
    User::new(args.user.clone(), password)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# svnportal configuration

[database]
path = "/var/lib/svnportal/svnportal.db"

[crypto]
# Environment variable holding the base64 AES-256 key (see `svnportal keygen`).
key_env = "SVNPORTAL_KEY"

[transport]
svn_binary = "svn"
svnadmin_binary = "svnadmin"
connect_timeout_secs = 15
read_timeout_secs = 120
# "none" passes --no-auth-cache to every command; "default" lets svn cache.
credential_cache = "none"
trust_server_cert = false

[logging]
level = "info"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("Default configuration written to {}", output.display());
    println!();
    println!("Next steps:");
    println!("  1. Generate a key with: svnportal keygen");
    println!("  2. Export it as SVNPORTAL_KEY");
    println!(
        "  3. Validate with: svnportal validate --config {}",
        output.display()
    );

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config.resolve_env_vars()?;
    println!("  [OK] Environment variable references processed");

    if let Err(e) = config.validate() {
        println!("  [FAIL] Validation error: {}", e);
        anyhow::bail!("configuration validation failed");
    }
    println!("  [OK] All required fields are valid");

    let key_status = match config.crypto.key.as_deref() {
        Some(key) => match AesGcmCipher::from_base64_key(key) {
            Ok(_) => "set",
            Err(_) => "INVALID",
        },
        None => "NOT SET",
    };

    println!();
    println!("Configuration summary:");
    println!("  Database      : {}", config.database.path.display());
    println!("  Key variable  : {} ({})", config.crypto.key_env, key_status);
    println!("  svn binary    : {}", config.transport.svn_binary);
    println!("  svnadmin      : {}", config.transport.svnadmin_binary);
    println!(
        "  Timeouts      : connect {}s, read {}s",
        config.transport.connect_timeout_secs, config.transport.read_timeout_secs
    );
    println!("  Log level     : {}", config.logging.level);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_keygen() -> Result<()> {
    println!("{}", AesGcmCipher::generate_key());
    Ok(())
}

fn cmd_project(db: &Database, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Add {
            code,
            url,
            transport,
            description,
        } => {
            if normalize_url(&url).map_or(true, |u| u.is_empty()) {
                anyhow::bail!("'{}' is not a usable repository URL", url);
            }
            let mut project = Project::new(code, url, transport.into());
            project.description = description;
            db.insert_project(&project)
                .with_context(|| format!("failed to add project '{}'", project.code))?;
            println!(
                "Project {} added ({})",
                project.code, project.transport_type
            );
            Ok(())
        }

        ProjectAction::List => {
            let projects = db.list_projects().context("failed to list projects")?;
            if projects.is_empty() {
                println!("No projects registered.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Code", "URL", "Transport", "Description", "Created"]);
            for record in &projects {
                let p = &record.project;
                table.add_row(vec![
                    Cell::new(&p.code),
                    Cell::new(&p.url),
                    Cell::new(p.transport_type.as_str()),
                    Cell::new(p.description.as_deref().unwrap_or("")),
                    Cell::new(&record.created_at[..10.min(record.created_at.len())]),
                ]);
            }
            println!("{}", table);
            Ok(())
        }

        ProjectAction::Remove { code } => {
            if db.delete_project(&code).context("failed to remove project")? {
                println!("Project {} removed", code);
                Ok(())
            } else {
                anyhow::bail!("project '{}' not found", code)
            }
        }
    }
}

fn cmd_override(db: &Database, config: &AppConfig, action: OverrideAction) -> Result<()> {
    match action {
        OverrideAction::Set {
            code,
            username,
            password_env,
        } => {
            let project = db
                .get_project(&code)
                .context("database error")?
                .ok_or_else(|| anyhow::anyhow!("project '{}' not found", code))?;
            if !project.transport_type.allows_overrides() {
                warn!(
                    project = %code,
                    "multiplexed projects ignore overrides; stored value will not be used"
                );
            }

            let key = config.crypto.key.as_deref().ok_or_else(|| {
                anyhow::anyhow!(
                    "encryption key not set; export ${} first",
                    config.crypto.key_env
                )
            })?;
            let cipher = AesGcmCipher::from_base64_key(key).context("invalid encryption key")?;

            let password = match password_env {
                Some(var) => std::env::var(&var)
                    .with_context(|| format!("environment variable {} is not set", var))?,
                None => Password::new()
                    .with_prompt(format!("Password for {} on {}", username, code))
                    .with_confirmation("Confirm password", "Passwords do not match")
                    .interact()
                    .context("failed to read password")?,
            };

            let encrypted = cipher.encrypt(&password).context("failed to encrypt password")?;
            db.upsert_override(&code, &username, &encrypted)
                .context("failed to store override")?;
            println!("Override stored for {} on {}", username, code);
            Ok(())
        }

        OverrideAction::Remove { code, username } => {
            if db
                .delete_override(&code, &username)
                .context("failed to remove override")?
            {
                println!("Override removed for {} on {}", username, code);
            } else {
                println!("No override for {} on {}", username, code);
            }
            Ok(())
        }

        OverrideAction::List { code } => {
            let rows = db.list_overrides(&code).context("failed to list overrides")?;
            if rows.is_empty() {
                println!("No overrides for {}.", code);
                return Ok(());
            }
            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["User", "Updated"]);
            for row in &rows {
                table.add_row(vec![Cell::new(&row.username), Cell::new(&row.updated_at)]);
            }
            println!("{}", table);
            Ok(())
        }
    }
}

async fn cmd_root(
    db: &Database,
    service: &RepositoryService,
    code: &str,
    user: &UserArgs,
) -> Result<()> {
    let project = db
        .get_project(code)
        .context("database error")?
        .ok_or_else(|| anyhow::anyhow!("project '{}' not found", code))?;
    match service.get_repository_root(&project, &current_user(user)).await {
        Some(root) => {
            println!("{}", root);
            Ok(())
        }
        None => anyhow::bail!("could not determine repository root for '{}'", code),
    }
}

async fn cmd_ls(
    service: &RepositoryService,
    code: &str,
    path: &str,
    rev: Option<i64>,
    json: bool,
    user: &UserArgs,
) -> Result<()> {
    let revision = rev.map_or(Revision::Head, Revision::from_number);
    let entries = service
        .list_directory_at(code, path, revision, &current_user(user))
        .await
        .with_context(|| format!("failed to list '{}' in {}", path, code))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    println!("{}", entries_table(&entries));
    Ok(())
}

fn entries_table(entries: &[DirEntry]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Name", "Kind", "Size", "Rev", "Author", "Date"]);
    for e in entries {
        let name = match e.kind {
            NodeKind::Dir => format!("{}/", e.name),
            _ => e.name.clone(),
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(format!("{:?}", e.kind).to_lowercase()),
            Cell::new(e.size.map(|s| s.to_string()).unwrap_or_default()),
            Cell::new(e.revision.map(|r| format!("r{}", r)).unwrap_or_default()),
            Cell::new(e.author.as_deref().unwrap_or("")),
            Cell::new(
                e.date
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ),
        ]);
    }
    table
}

async fn cmd_create_repo(service: &RepositoryService, path: &Path) -> Result<()> {
    let url = service
        .create_local_repository(path)
        .await
        .context("failed to create repository")?;
    println!("{}", url);
    Ok(())
}
