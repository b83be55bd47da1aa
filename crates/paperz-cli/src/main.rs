//! Command line client for the paperz review board and memez feed.
//!
//! Every subcommand except `config` connects a session to the local
//! conductor first; ports come from the config file unless overridden by
//! flag or environment.

mod display;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use paperz_client::upload::{self, UploadTracker};
use paperz_client::{HubStatus, Session, boot};
use paperz_core::config::ConductorConfig;
use paperz_core::hash::EntryHash;
use paperz_core::sensemaker::{
    AGENT_PATH, ANNOTATIONZ_PATH, DEFAULT_FEED_SCORE_COMP, DEFAULT_SM_COMP_EXPR,
    DEFAULT_SM_INIT_EXPR,
};
use paperz_core::types::Annotation;

// ── Command surface ──

#[derive(Parser, Debug)]
#[command(name = "paperz")]
#[command(about = "Talk to a local conductor running the paperz and memez apps")]
#[command(version)]
struct Cli {
    /// App interface port, overriding the config file.
    #[arg(long, env = "PAPERZ_APP_PORT", global = true)]
    app_port: Option<u16>,

    /// Admin interface port, overriding the config file.
    #[arg(long, env = "PAPERZ_ADMIN_PORT", global = true)]
    admin_port: Option<u16>,

    /// Config file to use instead of the per-user default.
    #[arg(long, env = "PAPERZ_CONFIG", global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or edit the persisted configuration.
    #[command(subcommand)]
    Config(ConfigCommand),

    #[command(flatten)]
    Conductor(ConductorCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective configuration as JSON.
    Show,
    /// Persist new websocket ports.
    SetPorts {
        /// App interface port.
        app_port: u16,
        /// Admin interface port.
        admin_port: u16,
    },
}

/// Everything that needs a live conductor.
#[derive(Subcommand, Debug)]
enum ConductorCommand {
    /// Conductor overview: app, cell, and hub presence.
    Status,
    /// Provision the hub app on a fresh conductor.
    Bootstrap,
    /// Upload and browse papers.
    #[command(subcommand)]
    Paper(PaperCommand),
    /// Attach a review note to a paper.
    Annotate {
        /// Paper entry hash, base64.
        paper: EntryHash,
        /// Page the note refers to.
        #[arg(long)]
        page: u64,
        /// Paragraph within the page.
        #[arg(long)]
        paragraph: u64,
        /// The text as printed.
        #[arg(long)]
        says: String,
        /// The text as it should read.
        #[arg(long)]
        should_say: String,
    },
    /// Inspect and edit stored machine expressions.
    #[command(subcommand)]
    Sm(SmCommand),
    /// Upload, score, and clap for memes.
    #[command(subcommand)]
    Meme(MemeCommand),
}

#[derive(Subcommand, Debug)]
enum PaperCommand {
    /// Upload a file as a new paper.
    Upload {
        /// File to upload.
        file: PathBuf,
    },
    /// Print the full review board.
    List,
}

#[derive(Subcommand, Debug)]
enum SmCommand {
    /// Print the stored init and comp expressions for a path.
    Show {
        /// Machine path label.
        #[arg(long, default_value = ANNOTATIONZ_PATH)]
        path: String,
    },
    /// Store an init expression under a path.
    SetInit {
        /// Expression text; omit to read --file instead.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        expr: Option<String>,
        /// Read the expression from a file.
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
        #[arg(long, default_value = ANNOTATIONZ_PATH)]
        path: String,
    },
    /// Store a comp expression under a path.
    SetComp {
        /// Expression text; omit to read --file instead.
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        expr: Option<String>,
        /// Read the expression from a file.
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
        #[arg(long, default_value = ANNOTATIONZ_PATH)]
        path: String,
    },
    /// Store the stock two-state review expressions for annotations.
    SetDefaults,
    /// Create this agent's own machine state under the agent path.
    InitAgent,
    /// Step one annotation's machine with an action.
    Step {
        /// Annotation entry hash, base64.
        annotation: EntryHash,
        /// Action handed to the comp expression.
        act: String,
        #[arg(long, default_value = ANNOTATIONZ_PATH)]
        path: String,
    },
}

#[derive(Subcommand, Debug)]
enum MemeCommand {
    /// Upload an image file as a new meme.
    Upload {
        /// File to upload.
        file: PathBuf,
    },
    /// Print the scored feed.
    Feed {
        /// Comp expression scoring (clap count, agent score) pairs.
        #[arg(long, default_value = DEFAULT_FEED_SCORE_COMP)]
        score_comp: String,
    },
    /// Clap for a meme.
    Clap {
        /// Meme entry hash, base64.
        meme: EntryHash,
    },
    /// Print one meme's clap count.
    Count {
        /// Meme entry hash, base64.
        meme: EntryHash,
    },
}

// ── Entry point ──

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    tracing::info!("paperz v{}", env!("CARGO_PKG_VERSION"));
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(ref path) => path.clone(),
        None => ConductorConfig::default_path()?,
    };
    let mut config = ConductorConfig::load_or_init(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(port) = cli.app_port {
        config.app_port = port;
    }
    if let Some(port) = cli.admin_port {
        config.admin_port = port;
    }

    match cli.command {
        Command::Config(command) => run_config(command, config, &config_path),
        Command::Conductor(command) => {
            let session = Session::connect(config).await?;
            run_conductor(command, &session).await
        }
    }
}

// ── Handlers ──

fn run_config(
    command: ConfigCommand,
    mut config: ConductorConfig,
    path: &Path,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigCommand::SetPorts {
            app_port,
            admin_port,
        } => {
            config.app_port = app_port;
            config.admin_port = admin_port;
            config.save(path)?;
            println!("wrote {}", path.display());
            Ok(())
        }
    }
}

async fn run_conductor(command: ConductorCommand, session: &Session) -> anyhow::Result<()> {
    match command {
        ConductorCommand::Status => status(session).await,
        ConductorCommand::Bootstrap => bootstrap(session).await,
        ConductorCommand::Paper(command) => paper(command, session).await,
        ConductorCommand::Annotate {
            paper,
            page,
            paragraph,
            says,
            should_say,
        } => annotate(session, paper, page, paragraph, says, should_say).await,
        ConductorCommand::Sm(command) => sm(command, session).await,
        ConductorCommand::Meme(command) => meme(command, session).await,
    }
}

async fn status(session: &Session) -> anyhow::Result<()> {
    let config = session.config();
    let cells = session.admin.list_cell_ids().await?;
    let active = session.admin.list_active_apps().await?;
    let present = session.sensemaker_present().await?;
    let paperz = session.paperz();
    let hub = paperz.get_hub_cell_id().await?;

    println!(
        "{:<12} {} (app port {}, admin port {})",
        "app", config.app_id, config.app_port, config.admin_port
    );
    println!("{:<12} {}", "cell", session.cell());
    println!("{:<12} {}", "cells", cells.len());
    println!(
        "{:<12} {}",
        "active",
        if active.is_empty() {
            "-".to_string()
        } else {
            active.join(", ")
        }
    );
    println!(
        "{:<12} {}",
        "sense-maker",
        if present { "present" } else { "absent" }
    );
    match hub {
        Some(cell) => println!("{:<12} {}", "hub cell", cell),
        None => println!("{:<12} (unset)", "hub cell"),
    }

    let def = paperz.sm_definition(ANNOTATIONZ_PATH).await?;
    print!("{}", display::render_definition(ANNOTATIONZ_PATH, &def));
    Ok(())
}

async fn bootstrap(session: &Session) -> anyhow::Result<()> {
    let report = boot(session).await?;
    match report.hub {
        HubStatus::Provisioned(cell) => println!("hub provisioned in {cell}"),
        HubStatus::Untouched { cells } => {
            println!("conductor not fresh ({cells} cells), left untouched")
        }
    }
    for (path, def) in &report.definitions {
        print!("{}", display::render_definition(path, def));
    }
    print!("{}", display::render_board(&report.board));
    Ok(())
}

async fn paper(command: PaperCommand, session: &Session) -> anyhow::Result<()> {
    let paperz = session.paperz();
    match command {
        PaperCommand::Upload { file } => {
            let mut tracker = UploadTracker::new();
            let (entry, _) = upload::upload_paper_file(&paperz, &mut tracker, &file).await?;
            println!("uploaded {entry}");
            Ok(())
        }
        PaperCommand::List => {
            let board = paperz.fetch_board().await?;
            print!("{}", display::render_board(&board));
            Ok(())
        }
    }
}

async fn annotate(
    session: &Session,
    paper: EntryHash,
    page: u64,
    paragraph: u64,
    says: String,
    should_say: String,
) -> anyhow::Result<()> {
    let annotation = Annotation {
        paper_ref: paper,
        page_num: page,
        paragraph_num: paragraph,
        what_it_says: says,
        what_it_should_say: should_say,
    };
    let paperz = session.paperz();
    let (entry, action) = paperz.create_annotation(&annotation).await?;
    println!("created {entry} (action {action})");

    // The annotation's inherited review state only shows on a board fetch.
    let board = paperz.fetch_board().await?;
    print!("{}", display::render_board(&board));
    Ok(())
}

async fn sm(command: SmCommand, session: &Session) -> anyhow::Result<()> {
    let paperz = session.paperz();
    match command {
        SmCommand::Show { path } => {
            let def = paperz.sm_definition(&path).await?;
            print!("{}", display::render_definition(&path, &def));
            Ok(())
        }
        SmCommand::SetInit { expr, file, path } => {
            let expr = expr_source(expr, file)?;
            let (accepted, def) = paperz.submit_sm_init(&path, &expr).await?;
            print!("{}", display::render_definition(&path, &def));
            report_accepted(accepted)
        }
        SmCommand::SetComp { expr, file, path } => {
            let expr = expr_source(expr, file)?;
            let (accepted, def) = paperz.submit_sm_comp(&path, &expr).await?;
            print!("{}", display::render_definition(&path, &def));
            report_accepted(accepted)
        }
        SmCommand::SetDefaults => {
            let (init, _) = paperz
                .submit_sm_init(ANNOTATIONZ_PATH, DEFAULT_SM_INIT_EXPR)
                .await?;
            let (comp, def) = paperz
                .submit_sm_comp(ANNOTATIONZ_PATH, DEFAULT_SM_COMP_EXPR)
                .await?;
            print!("{}", display::render_definition(ANNOTATIONZ_PATH, &def));
            report_accepted(init && comp)
        }
        SmCommand::InitAgent => {
            paperz.init_agent_sm_data(AGENT_PATH).await?;
            println!("agent machine initialized");
            Ok(())
        }
        SmCommand::Step {
            annotation,
            act,
            path,
        } => {
            paperz.step_sm(&path, &annotation, &act).await?;
            let data = paperz.get_sm_data_for_eh(&annotation).await?;
            println!("state {}", display::render_sm_data(data.as_ref()));
            Ok(())
        }
    }
}

async fn meme(command: MemeCommand, session: &Session) -> anyhow::Result<()> {
    let memez = session.memez();
    match command {
        MemeCommand::Upload { file } => {
            let mut tracker = UploadTracker::new();
            let (entry, _) = upload::upload_meme_file(&memez, &mut tracker, &file).await?;
            println!("uploaded {entry}");
            Ok(())
        }
        MemeCommand::Feed { score_comp } => {
            let feed = memez.fetch_feed(&score_comp).await?;
            print!("{}", display::render_feed(&feed));
            Ok(())
        }
        MemeCommand::Clap { meme } => {
            memez.clap_for_meme(&meme).await?;
            match memez.clap_count(&meme).await? {
                Some(count) => println!("clapped, count {count}"),
                None => println!("clapped"),
            }
            Ok(())
        }
        MemeCommand::Count { meme } => {
            match memez.clap_count(&meme).await? {
                Some(count) => println!("{count}"),
                None => println!("no machine for this meme"),
            }
            Ok(())
        }
    }
}

fn expr_source(expr: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    match (expr, file) {
        (Some(expr), _) => Ok(expr),
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
        }
        (None, None) => anyhow::bail!("expression required, by argument or --file"),
    }
}

fn report_accepted(accepted: bool) -> anyhow::Result<()> {
    if accepted {
        println!("accepted");
        Ok(())
    } else {
        anyhow::bail!("hub rejected the expression")
    }
}
