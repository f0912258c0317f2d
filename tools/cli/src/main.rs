//! GitVault CLI - Command line interface for vault operations.
//!
//! This tool provides a command-line interface for creating a vault in a git
//! repository, moving files in and out of it, and sharing them.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroize;

use gitvault_common::{Password, Username, VaultPath};
use gitvault_storage::{GitRemote, RawFetcher, RemoteBackend, RemoteConfig};
use gitvault_vault::{
    download_shared, read_shared, EntryKind, Session, SessionCache, ShareString,
    VaultOperations,
};

#[derive(Parser)]
#[command(name = "gitvault")]
#[command(about = "GitVault - Encrypted file vault backed by a git repository")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Remote configuration file (JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Session cache file (default: user cache directory).
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault. Destroys anything already in the repository.
    Setup {
        /// Account that owns the vault repository.
        #[arg(short, long)]
        user: String,

        /// SSH private key with push access to the repository.
        #[arg(short, long)]
        key: PathBuf,

        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Unlock a vault and cache the session locally.
    Connect {
        #[arg(short, long)]
        user: String,
    },

    /// Forget the cached session.
    Disconnect,

    /// Upload a file or directory.
    Upload {
        /// Local file or directory.
        source: PathBuf,

        /// Destination path in vault.
        dest: String,
    },

    /// Download a file from the vault.
    Download {
        /// Source path in vault.
        source: String,

        /// Destination file or directory (default: current directory).
        #[arg(default_value = ".")]
        dest: PathBuf,
    },

    /// Print a vault file to stdout.
    Cat {
        path: String,
    },

    /// Delete a file or folder.
    Rm {
        path: String,
    },

    /// List a vault folder.
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },

    /// Search vault paths.
    Search {
        query: String,
    },

    /// Erase the whole vault, history included.
    Purge {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },

    /// Share a file under a separate password.
    Share {
        path: String,
    },

    /// Manage shared files.
    #[command(subcommand)]
    Shared(SharedCommands),

    /// Fetch a shared file using only its share string.
    GetShared {
        share: String,

        /// Destination file or directory (default: current directory).
        #[arg(default_value = ".")]
        dest: PathBuf,

        /// Print to stdout instead of writing a file.
        #[arg(long)]
        stdout: bool,
    },

    /// Show or change vault settings.
    #[command(subcommand)]
    Settings(SettingsCommands),

    /// Change vault password.
    Passwd,
}

#[derive(Subcommand)]
enum SharedCommands {
    /// List active shares, or those whose file name matches a pattern.
    Ls { pattern: Option<String> },
    /// Revoke a share by reference or file name.
    Rm { query: String },
    /// Show one share, including its share string.
    Info { query: String },
}

#[derive(Subcommand)]
enum SettingsCommands {
    /// Show current settings.
    Info,
    /// Set one value (author-name, author-email, commit-message,
    /// file-hash-length, share-hash-length).
    Set { key: String, value: String },
}

/// Resolved global options.
struct CliContext {
    remote: RemoteConfig,
    cache: SessionCache,
}

impl CliContext {
    fn backend(&self) -> Result<Arc<dyn RemoteBackend>> {
        let remote = GitRemote::new(self.remote.clone()).context("Failed to set up remote")?;
        Ok(Arc::new(remote))
    }

    /// The cached session, or an error telling the user to connect.
    fn session(&self) -> Result<Session> {
        self.cache
            .load(self.backend()?)
            .context("Failed to load session")?
            .context("Not connected. Run `gitvault connect --user <name>` first")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let remote = match &cli.config {
        Some(path) => RemoteConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RemoteConfig::default(),
    };
    let cache = match cli.session_file {
        Some(path) => SessionCache::new(path),
        None => SessionCache::default_location()?,
    };
    let ctx = CliContext { remote, cache };

    match cli.command {
        Commands::Setup { user, key, yes } => cmd_setup(&ctx, &user, &key, yes).await,
        Commands::Connect { user } => cmd_connect(&ctx, &user).await,
        Commands::Disconnect => cmd_disconnect(&ctx),
        Commands::Upload { source, dest } => cmd_upload(&ctx, &source, &dest).await,
        Commands::Download { source, dest } => cmd_download(&ctx, &source, &dest).await,
        Commands::Cat { path } => cmd_cat(&ctx, &path).await,
        Commands::Rm { path } => cmd_rm(&ctx, &path).await,
        Commands::Ls { path } => cmd_ls(&ctx, &path),
        Commands::Search { query } => cmd_search(&ctx, &query),
        Commands::Purge { yes } => cmd_purge(&ctx, yes).await,
        Commands::Share { path } => cmd_share(&ctx, &path).await,
        Commands::Shared(SharedCommands::Ls { pattern }) => {
            cmd_shared_ls(&ctx, pattern.as_deref())
        }
        Commands::Shared(SharedCommands::Rm { query }) => cmd_shared_rm(&ctx, &query).await,
        Commands::Shared(SharedCommands::Info { query }) => cmd_shared_info(&ctx, &query),
        Commands::GetShared {
            share,
            dest,
            stdout,
        } => cmd_get_shared(&ctx, &share, &dest, stdout).await,
        Commands::Settings(SettingsCommands::Info) => cmd_settings_info(&ctx),
        Commands::Settings(SettingsCommands::Set { key, value }) => {
            cmd_settings_set(&ctx, &key, &value).await
        }
        Commands::Passwd => cmd_passwd(&ctx).await,
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Password> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(Password::new(password)?)
}

/// Prompt twice and require both entries to match.
fn prompt_new_password(prompt: &str) -> Result<Password> {
    let password = prompt_password(prompt)?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        anyhow::bail!("Passwords do not match");
    }
    Ok(password)
}

/// Ask the user to type `expected` before a destructive operation.
fn confirm(action: &str, expected: &str) -> Result<()> {
    print!("{} Type '{}' to continue: ", action, expected);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin()
        .read_line(&mut answer)
        .context("Failed to read confirmation")?;
    if answer.trim() != expected {
        anyhow::bail!("Aborted");
    }
    Ok(())
}

fn vault_path(path: &str) -> Result<VaultPath> {
    VaultPath::parse(path).with_context(|| format!("Invalid vault path '{}'", path))
}

/// Create a new vault.
async fn cmd_setup(ctx: &CliContext, user: &str, key: &Path, yes: bool) -> Result<()> {
    let username = Username::new(user)?;
    let mut ssh_key = tokio::fs::read(key)
        .await
        .with_context(|| format!("Failed to read SSH key {}", key.display()))?;

    if !yes {
        confirm(
            "This replaces everything in the vault repository, history included.",
            user,
        )?;
    }
    let password = prompt_new_password("Choose vault password: ")?;

    info!("Creating vault for {}", username);
    let session = Session::bootstrap(ctx.backend()?, username, ssh_key.clone(), password)
        .await
        .context("Failed to create vault")?;
    ssh_key.zeroize();

    ctx.cache.save(&session)?;
    println!("Vault created and connected as {}.", session.username());
    Ok(())
}

/// Unlock the vault and cache the session.
async fn cmd_connect(ctx: &CliContext, user: &str) -> Result<()> {
    let username = Username::new(user)?;
    let password = prompt_password("Vault password: ")?;

    let session = Session::authenticate(ctx.backend()?, username, password)
        .await
        .context("Failed to unlock vault")?;

    ctx.cache.save(&session)?;
    println!(
        "Connected as {} ({} files, {} shares).",
        session.username(),
        session.index().file_count(),
        session.shared().len()
    );
    Ok(())
}

fn cmd_disconnect(ctx: &CliContext) -> Result<()> {
    if ctx.cache.clear()? {
        println!("Disconnected.");
    } else {
        println!("No cached session.");
    }
    Ok(())
}

/// Upload a file or a directory tree.
async fn cmd_upload(ctx: &CliContext, source: &Path, dest: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let dest_path = vault_path(dest)?;
    let mut ops = VaultOperations::new(&mut session);

    if source.is_dir() {
        let uploaded = ops
            .upload_directory(source, &dest_path)
            .await
            .context("Failed to upload directory")?;
        println!("Uploaded {} files to {}", uploaded.len(), dest_path);
    } else {
        ops.upload(source, &dest_path)
            .await
            .context("Failed to upload file")?;
        println!("Uploaded {} to {}", source.display(), dest_path);
    }

    ctx.cache.save(&session)?;
    Ok(())
}

async fn cmd_download(ctx: &CliContext, source: &str, dest: &Path) -> Result<()> {
    let mut session = ctx.session()?;
    let ops = VaultOperations::new(&mut session);

    let written = ops
        .download(&vault_path(source)?, dest)
        .await
        .context("Failed to download file")?;
    println!("Downloaded {} to {}", source, written.display());
    Ok(())
}

async fn cmd_cat(ctx: &CliContext, path: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let ops = VaultOperations::new(&mut session);

    let content = ops
        .read(&vault_path(path)?)
        .await
        .context("Failed to read file")?;
    std::io::stdout().write_all(&content)?;
    Ok(())
}

async fn cmd_rm(ctx: &CliContext, path: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let target = vault_path(path)?;

    let removed = VaultOperations::new(&mut session)
        .delete(&target)
        .await
        .context("Failed to delete")?;

    ctx.cache.save(&session)?;
    println!("Deleted {} ({} objects)", target, removed.len());
    Ok(())
}

fn cmd_ls(ctx: &CliContext, path: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let dir = vault_path(path)?;
    let entries = VaultOperations::new(&mut session)
        .list(&dir)
        .context("Failed to list folder")?;

    if entries.is_empty() {
        println!("Folder is empty.");
        return Ok(());
    }

    println!("Contents of {}:", dir);
    for entry in entries {
        let name = entry.path.name().unwrap_or_default();
        match entry.kind {
            EntryKind::Folder => println!("  [DIR]  {}/", name),
            EntryKind::File => println!(
                "  [FILE] {} ({})",
                name,
                entry.storage_id.unwrap_or_default()
            ),
        }
    }
    Ok(())
}

fn cmd_search(ctx: &CliContext, query: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let hits = VaultOperations::new(&mut session).search(query);

    if hits.is_empty() {
        println!("No matches for '{}'.", query);
    }
    for hit in hits {
        let marker = match hit.kind {
            EntryKind::Folder => "/",
            EntryKind::File => "",
        };
        println!("  {}{}", hit.path, marker);
    }
    Ok(())
}

async fn cmd_purge(ctx: &CliContext, yes: bool) -> Result<()> {
    let mut session = ctx.session()?;
    if !yes {
        confirm(
            "This permanently erases every file, share and setting in the vault.",
            session.username().as_str(),
        )?;
    }

    VaultOperations::new(&mut session)
        .purge()
        .await
        .context("Failed to purge vault")?;

    // The key object is gone; the session cannot be reused.
    ctx.cache.clear()?;
    println!("Vault purged. Run `gitvault setup` to start over.");
    Ok(())
}

async fn cmd_share(ctx: &CliContext, path: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let share_password = prompt_new_password("Share password: ")?;

    let share = VaultOperations::new(&mut session)
        .share(&vault_path(path)?, &share_password)
        .await
        .context("Failed to share file")?;

    ctx.cache.save(&session)?;
    println!("Shared {} as {}", path, share.reference);
    println!("{}", share);
    Ok(())
}

fn cmd_shared_ls(ctx: &CliContext, pattern: Option<&str>) -> Result<()> {
    let mut session = ctx.session()?;
    let ops = VaultOperations::new(&mut session);

    let Some(pattern) = pattern else {
        let entries = ops.shared_files();
        if entries.is_empty() {
            println!("No shared files.");
        }
        for entry in entries {
            println!(
                "  {}  {}  {}  ({})",
                entry.reference,
                entry.shared_at.format("%Y-%m-%d %H:%M"),
                entry.name,
                entry.original_path
            );
        }
        return Ok(());
    };

    let matches = ops.find_shared(pattern);
    if matches.is_empty() {
        println!("No shared files match '{}'.", pattern);
    }
    for hit in matches {
        println!(
            "  {}  {:<9}  {}  ({})",
            hit.entry.reference, hit.kind, hit.entry.name, hit.entry.original_path
        );
    }
    Ok(())
}

async fn cmd_shared_rm(ctx: &CliContext, query: &str) -> Result<()> {
    let mut session = ctx.session()?;

    let entry = VaultOperations::new(&mut session)
        .revoke(query)
        .await
        .context("Failed to revoke share")?;

    ctx.cache.save(&session)?;
    println!("Revoked {} ({})", entry.reference, entry.name);
    Ok(())
}

fn cmd_shared_info(ctx: &CliContext, query: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let username = session.username().clone();
    let ops = VaultOperations::new(&mut session);
    let entry = ops.shared_info(query)?;

    let share = ShareString {
        username,
        reference: entry.reference.clone(),
        password: entry.password.clone(),
        filename: Some(entry.name.clone()),
    };

    println!("Reference:     {}", entry.reference);
    println!("Name:          {}", entry.name);
    println!("Original path: {}", entry.original_path);
    println!("Shared at:     {}", entry.shared_at.to_rfc3339());
    println!("Share string:  {}", share);
    Ok(())
}

/// Anonymous download; needs no session.
async fn cmd_get_shared(ctx: &CliContext, share: &str, dest: &Path, stdout: bool) -> Result<()> {
    let share: ShareString = share.parse().context("Invalid share string")?;
    let fetcher = RawFetcher::new(ctx.remote.clone())?;

    if stdout {
        let content = read_shared(&fetcher, &share)
            .await
            .context("Failed to fetch shared file")?;
        std::io::stdout().write_all(&content)?;
    } else {
        let written = download_shared(&fetcher, &share, dest)
            .await
            .context("Failed to fetch shared file")?;
        println!("Saved {}", written.display());
    }
    Ok(())
}

fn cmd_settings_info(ctx: &CliContext) -> Result<()> {
    let session = ctx.session()?;
    let settings = session.settings();

    println!("Vault Settings:");
    println!("  author-name:       {}", settings.author_name);
    println!("  author-email:      {}", settings.author_email);
    println!("  commit-message:    {}", settings.commit_message);
    println!("  file-hash-length:  {}", settings.file_id_length);
    println!("  share-hash-length: {}", settings.share_id_length);
    Ok(())
}

async fn cmd_settings_set(ctx: &CliContext, key: &str, value: &str) -> Result<()> {
    let mut session = ctx.session()?;
    let mut settings = session.settings().clone();
    settings.set(key, value)?;

    VaultOperations::new(&mut session)
        .save_settings(settings)
        .await
        .context("Failed to save settings")?;

    ctx.cache.save(&session)?;
    println!("Set {} = {}", key, value);
    Ok(())
}

/// Change vault password.
async fn cmd_passwd(ctx: &CliContext) -> Result<()> {
    let mut session = ctx.session()?;
    let new_password = prompt_new_password("New vault password: ")?;

    session
        .change_password(new_password)
        .await
        .context("Failed to change password")?;

    ctx.cache.save(&session)?;
    println!("Password changed successfully!");
    Ok(())
}
