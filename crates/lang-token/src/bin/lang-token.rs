use std::{fs, path::PathBuf, process, time::UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use lang_token::cli_i18n as i18n;
use lang_token::{
    CoreError, DocumentSink, DocumentSource, EditorConfig, EditorSession, FsStore, Layout,
    OfflineCache, ReferenceOrigin, default_root, paths::expand_tilde, serve::ServeArgs,
};
use serde_json::{Value, json};
use time::{OffsetDateTime, UtcOffset};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "lang-token",
    version,
    about = "i18n:cli.about",
    disable_version_flag = true
)]
struct Cli {
    #[arg(
        short = 'v',
        long = "version",
        global = true,
        action = ArgAction::SetTrue,
        help = "i18n:cli.version_flag_help"
    )]
    show_version: bool,
    #[arg(long, global = true, value_name = "DIR", help = "i18n:cli.root_help")]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "i18n:command.init.about")]
    Init,

    #[command(about = "i18n:command.files.about")]
    Files,

    #[command(about = "i18n:command.missing.about")]
    Missing(MissingArgs),

    #[command(about = "i18n:command.groups.about")]
    Groups(GroupsArgs),

    #[command(about = "i18n:command.set.about")]
    Set(SetArgs),

    #[command(about = "i18n:command.save_as.about")]
    SaveAs(SaveAsArgs),

    #[command(about = "i18n:command.picture.about")]
    Picture(PictureArgs),

    #[command(about = "i18n:command.serve.about")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct MissingArgs {
    #[arg(value_name = "FILE", help = "i18n:args.file")]
    file: String,
    #[arg(long, help = "i18n:args.json")]
    json: bool,
}

#[derive(Args, Debug)]
struct GroupsArgs {
    #[arg(value_name = "FILE", help = "i18n:args.file")]
    file: String,
    #[arg(long, help = "i18n:args.missing_only")]
    missing_only: bool,
    #[arg(long, help = "i18n:args.json")]
    json: bool,
}

#[derive(Args, Debug)]
struct SetArgs {
    #[arg(value_name = "FILE", help = "i18n:args.file")]
    file: String,
    #[arg(value_name = "KEY", help = "i18n:args.key")]
    key: String,
    #[arg(value_name = "VALUE", help = "i18n:args.value")]
    value: String,
}

#[derive(Args, Debug)]
struct SaveAsArgs {
    #[arg(value_name = "FILE", help = "i18n:args.file")]
    file: String,
    #[arg(value_name = "PATH", help = "i18n:args.save_as.path")]
    path: PathBuf,
}

#[derive(Args, Debug)]
struct PictureArgs {
    #[arg(value_name = "PREFIX", help = "i18n:args.picture.prefix")]
    prefix: String,
    #[arg(value_name = "REFERENCE", help = "i18n:args.picture.reference")]
    reference: String,
    #[arg(long, help = "i18n:args.picture.upload")]
    upload: bool,
}

/// Resolved workspace for commands that work on local files.
struct Workspace {
    layout: Layout,
    config: EditorConfig,
}

impl Workspace {
    fn open(root_override: Option<PathBuf>) -> Result<Self> {
        let layout = resolve_layout(root_override)?;
        let config = EditorConfig::load(&layout)?;
        Ok(Self { layout, config })
    }

    fn reference_name(&self) -> &str {
        &self.config.editor().reference
    }

    fn session(&self) -> EditorSession<FsStore> {
        EditorSession::new(FsStore::new(&self.layout), self.reference_name())
            .with_offline_cache(OfflineCache::new(&self.layout))
    }

    /// Session with the reference loaded, from the tokens directory or the
    /// offline copy.
    fn reconciling_session(&self) -> Result<EditorSession<FsStore>> {
        let mut session = self.session();
        if session.open()? == ReferenceOrigin::Unavailable {
            return Err(
                CoreError::ReferenceUnavailable { name: self.reference_name().to_string() }.into()
            );
        }
        Ok(session)
    }
}

#[tokio::main]
async fn main() {
    let messages = i18n::messages();
    let command = i18n::localize_command(Cli::command(), messages);

    let mut matches = command.get_matches();
    let cli = Cli::from_arg_matches_mut(&mut matches).unwrap_or_else(|err| err.exit());

    if cli.show_version {
        if let Some(version) = Cli::command().get_version() {
            println!("{version}");
        }
        return;
    }

    if let Err(err) = run(cli).await {
        let rendered = messages.render_anyhow(&err);
        eprintln!("{} {}", messages.error_prefix(), rendered);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let root = cli.root;
    match cli.command {
        Command::Serve(args) => lang_token::serve::run(root, args).await,
        Command::Init => with_workspace(root, handle_init),
        Command::Files => with_workspace(root, handle_files),
        Command::Missing(args) => with_workspace(root, |ws| handle_missing(ws, args)),
        Command::Groups(args) => with_workspace(root, |ws| handle_groups(ws, args)),
        Command::Set(args) => with_workspace(root, |ws| handle_set(ws, args)),
        Command::SaveAs(args) => with_workspace(root, |ws| handle_save_as(ws, args)),
        Command::Picture(args) => with_workspace(root, |ws| handle_picture(ws, args)),
    }
}

fn with_workspace(
    root: Option<PathBuf>,
    handler: impl FnOnce(&Workspace) -> Result<()>,
) -> Result<()> {
    init_cli_tracing();
    let workspace = Workspace::open(root)?;
    handler(&workspace)
}

fn init_cli_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_layout(root_override: Option<PathBuf>) -> Result<Layout> {
    let root = match root_override {
        Some(path) => expand_tilde(path)?,
        None => default_root()?,
    };
    Ok(Layout::new(root))
}

fn handle_init(workspace: &Workspace) -> Result<()> {
    let messages = i18n::messages();
    let layout = &workspace.layout;
    layout.ensure()?;

    let mut created = false;
    let config_path = layout.config_path();
    if !config_path.exists() {
        let toml = workspace.config.to_toml_string()?;
        fs::write(&config_path, toml).with_context(|| messages.sample_write_failed(&config_path))?;
        println!("{}", messages.config_written(&config_path));
        created = true;
    }

    let sample = layout.document_path(workspace.reference_name());
    if !sample.exists() {
        FsStore::new(layout)
            .write_document(workspace.reference_name(), &sample_reference())
            .with_context(|| messages.sample_write_failed(&sample))?;
        println!("{}", messages.workspace_initialized(layout.root(), &sample));
        created = true;
    }

    if !created {
        println!("{}", messages.workspace_already_initialized(layout.root()));
    }
    Ok(())
}

fn sample_reference() -> Value {
    json!({
        "app": {
            "title": "Translation editor",
            "save": "Save"
        },
        "home": {
            "welcome": "Welcome back",
            "logout": "Log out"
        },
        "footer": "All rights reserved"
    })
}

fn handle_files(workspace: &Workspace) -> Result<()> {
    let messages = i18n::messages();
    let files = workspace.session().files()?;
    if files.is_empty() {
        println!("{}", messages.no_documents(workspace.layout.tokens_dir()));
        return Ok(());
    }

    let (name_header, modified_header) = messages.files_headers();
    let width = files.iter().map(String::len).chain([name_header.len()]).max().unwrap_or(0);
    println!("{name_header:<width$}  {modified_header}");
    for name in &files {
        let modified = fs::metadata(workspace.layout.document_path(name))
            .and_then(|meta| meta.modified())
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|elapsed| format_timestamp(elapsed.as_secs()))
            .unwrap_or_else(|| "-".to_string());
        if name.eq_ignore_ascii_case(workspace.reference_name()) {
            println!("{name:<width$}  {modified} {}", messages.reference_marker());
        } else {
            println!("{name:<width$}  {modified}");
        }
    }
    Ok(())
}

fn handle_missing(workspace: &Workspace, args: MissingArgs) -> Result<()> {
    let messages = i18n::messages();
    let mut session = workspace.reconciling_session()?;
    session.load_file(&args.file)?;

    let reconciler = session.reconciler();
    let missing: Vec<&str> = reconciler.missing().collect();
    if args.json {
        let report = json!({
            "reference": workspace.reference_name(),
            "file": args.file,
            "missing": missing,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if missing.is_empty() {
        println!("{}", messages.nothing_missing(&args.file, workspace.reference_name()));
        return Ok(());
    }
    for key in &missing {
        println!("{key}");
    }
    println!(
        "{}",
        messages.missing_summary(&args.file, missing.len(), reconciler.reference_count())
    );
    Ok(())
}

fn handle_groups(workspace: &Workspace, args: GroupsArgs) -> Result<()> {
    let messages = i18n::messages();
    let mut session = workspace.reconciling_session()?;
    session.load_file(&args.file)?;
    session.set_missing_only(args.missing_only);

    let groups = session.groups().to_vec();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    if groups.is_empty() {
        println!("{}", messages.no_groups());
        return Ok(());
    }
    let target = session.reconciler().target();
    for group in &groups {
        match &group.picture {
            Some(picture) => println!("[{}] {}", group.prefix, messages.group_picture(picture)),
            None => println!("[{}]", group.prefix),
        }
        for key in &group.tokens {
            let value = target
                .get(key)
                .map(String::as_str)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(messages.missing_marker());
            println!("  {key} = {value}");
        }
    }
    Ok(())
}

fn handle_set(workspace: &Workspace, args: SetArgs) -> Result<()> {
    let messages = i18n::messages();
    let mut session = workspace.reconciling_session()?;
    if session.is_reference_name(&args.file) {
        return Err(CoreError::ReferenceNotEditable { name: args.file }.into());
    }
    if session.store().contains(&args.file) {
        session.load_file(&args.file)?;
    } else {
        // Start a new language from scratch.
        session.load_target_document(&args.file, &json!({}));
    }

    session.set_token(args.key.as_str(), args.value.as_str());
    session.refresh();
    session.save()?;

    println!("{}", messages.token_saved(&args.key, &args.file));
    let remaining = session.reconciler().missing_count();
    if remaining > 0 {
        println!("{}", messages.tokens_still_missing(remaining));
    }
    Ok(())
}

fn handle_save_as(workspace: &Workspace, args: SaveAsArgs) -> Result<()> {
    let messages = i18n::messages();
    let mut session = workspace.session();
    let document = session.store().read_document(&args.file)?;
    session.load_target_document(&args.file, &document);
    session.export(&args.path)?;
    println!("{}", messages.exported(&args.file, &args.path));
    Ok(())
}

fn handle_picture(workspace: &Workspace, args: PictureArgs) -> Result<()> {
    let messages = i18n::messages();
    let mut session = workspace.session();

    let picture = if args.upload {
        let path = PathBuf::from(&args.reference);
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .with_context(|| messages.picture_name_invalid(&path))?;
        let bytes = fs::read(&path).with_context(|| messages.picture_read_failed(&path))?;
        session.store().store_upload(&name, &bytes)?;
        workspace.config.file_url(&name)?.to_string()
    } else {
        args.reference.clone()
    };

    // Existing metadata must be readable so it is extended, not replaced.
    session.load_pictures()?;
    session.attach_picture(&args.prefix, &picture)?;
    println!("{}", messages.picture_attached(&args.prefix, &picture));
    Ok(())
}

fn format_timestamp(secs: u64) -> String {
    let timestamp = i64::try_from(secs)
        .ok()
        .and_then(|secs| OffsetDateTime::from_unix_timestamp(secs).ok())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    let local_timestamp = match UtcOffset::current_local_offset() {
        Ok(local_offset) => timestamp.to_offset(local_offset),
        Err(_) => timestamp,
    };

    time::format_description::parse("[year]-[month]-[day] [hour]:[minute]:[second]")
        .ok()
        .and_then(|format| local_timestamp.format(&format).ok())
        .unwrap_or_else(|| secs.to_string())
}
