use clap::{Parser, Subcommand};
use crate::board::{Board, DropOutcome, EntityRef};
use crate::cli::error::{user_error, validate_id, parse_stage_order, parse_stage_type, parse_probability, parse_amount};
use crate::cli::output::{format_board, format_pipeline_list, format_deal_history, pipeline_json, get_terminal_width, is_tty, ConsoleNotifier};
use crate::config::Config;
use crate::db::DbConnection;
use crate::models::{DealDraft, Pipeline, Stage, StageDraft, StageUpdate};
use crate::provider::{DataProvider, HttpProvider, LocalProvider, Session};
use anyhow::{Context, Result};

#[derive(Parser)]
#[command(name = "pipeboard")]
#[command(about = "Sales pipeline board - stages, deals and drag-and-drop from the terminal")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pipeline management commands
    Pipelines {
        #[command(subcommand)]
        subcommand: PipelineCommands,
    },
    /// Stage management commands
    Stages {
        #[command(subcommand)]
        subcommand: StageCommands,
    },
    /// Deal management commands
    Deals {
        #[command(subcommand)]
        subcommand: DealCommands,
    },
    /// Show a pipeline as a kanban board
    Board {
        /// Pipeline ID (defaults to the first pipeline)
        pipeline_id: Option<String>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Drag a stage or a deal onto a stage
    Drag {
        #[command(subcommand)]
        subcommand: DragCommands,
    },
}

#[derive(Subcommand)]
pub enum PipelineCommands {
    /// List pipelines
    List {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Create a new pipeline
    Add {
        /// Pipeline name
        name: String,
    },
}

#[derive(Subcommand)]
pub enum StageCommands {
    /// Add a stage to a pipeline
    Add {
        /// Pipeline ID
        pipeline_id: String,
        /// Stage name
        name: String,
        /// Position (1-based); defaults to the end
        #[arg(long)]
        order: Option<String>,
        /// Stage type: open, won or lost
        #[arg(long = "type", value_name = "TYPE")]
        stage_type: Option<String>,
        /// Win probability percentage (0-100)
        #[arg(long)]
        probability: Option<String>,
    },
    /// Update a stage; a new order moves it and renumbers the others
    Update {
        /// Stage ID
        stage_id: String,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New position (1-based)
        #[arg(long)]
        order: Option<String>,
        /// Stage type: open, won or lost
        #[arg(long = "type", value_name = "TYPE")]
        stage_type: Option<String>,
        /// Win probability percentage (0-100)
        #[arg(long)]
        probability: Option<String>,
    },
    /// Delete an empty stage
    Delete {
        /// Stage ID
        stage_id: String,
    },
}

#[derive(Subcommand)]
pub enum DealCommands {
    /// Add a deal to a stage
    Add {
        /// Stage ID
        stage_id: String,
        /// Deal name
        name: String,
        /// Deal amount (e.g., 5000, 1,250.50)
        #[arg(long, allow_hyphen_values = true)]
        amount: String,
        /// Deal owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show the stages a deal has been in (local store only)
    History {
        /// Deal ID
        deal_id: String,
    },
}

#[derive(Subcommand)]
pub enum DragCommands {
    /// Drop a stage onto another stage's position
    Stage {
        /// Stage ID to drag
        stage_id: String,
        /// Target stage ID
        #[arg(long)]
        onto: String,
    },
    /// Drop a deal onto a stage
    Deal {
        /// Deal ID to drag
        deal_id: String,
        /// Target stage ID
        #[arg(long)]
        onto: String,
    },
}

type CliBoard = Board<Box<dyn DataProvider>, ConsoleNotifier>;

pub fn run() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Help and version go to stdout with exit 0; usage errors are user errors
            let is_usage_error = e.use_stderr();
            e.print()?;
            if is_usage_error {
                std::process::exit(1);
            }
            return Ok(());
        }
    };

    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match cli.command {
        Commands::Pipelines { subcommand } => handle_pipelines(&config, subcommand),
        Commands::Stages { subcommand } => handle_stages(&config, subcommand),
        Commands::Deals { subcommand } => handle_deals(&config, subcommand),
        Commands::Board { pipeline_id, json } => handle_board(&config, pipeline_id, json),
        Commands::Drag { subcommand } => handle_drag(&config, subcommand),
    }
}

/// Pick the provider named by the configuration
///
/// `api.url` selects the REST backend; otherwise the local store is used.
fn open_provider(config: &Config) -> Result<Box<dyn DataProvider>> {
    match &config.api_url {
        Some(url) => {
            let session = match &config.api_token {
                Some(token) => Session::with_token(token),
                None => Session::anonymous(),
            };
            log::debug!("Using REST backend at {}", url);
            let provider = HttpProvider::new(url, session)?;
            Ok(Box::new(provider))
        }
        None => {
            log::debug!("Using local store at {}", config.data_location.display());
            let conn = DbConnection::connect(config)
                .context("Failed to connect to database")?;
            Ok(Box::new(LocalProvider::new(conn)))
        }
    }
}

fn open_board(config: &Config) -> Result<CliBoard> {
    let provider = open_provider(config)?;
    Ok(Board::new(provider, ConsoleNotifier::new(is_tty())))
}

/// Exit 1 if the board surfaced any error notification
fn exit_on_reported_errors(board: &CliBoard) {
    if board.notifier().error_count() > 0 {
        std::process::exit(1);
    }
}

fn parse_id_or_exit(id_str: &str, kind: &str) -> i64 {
    validate_id(id_str, kind).unwrap_or_else(|e| user_error(&e))
}

fn find_stage(pipelines: &[Pipeline], stage_id: i64) -> Option<&Stage> {
    pipelines.iter().find_map(|p| p.stage(stage_id))
}

fn print_board(pipeline: &Pipeline) {
    print!("{}", format_board(pipeline, get_terminal_width(), is_tty()));
}

fn handle_pipelines(config: &Config, cmd: PipelineCommands) -> Result<()> {
    let mut board = open_board(config)?;

    match cmd {
        PipelineCommands::List { json } => {
            board.load();
            exit_on_reported_errors(&board);

            if json {
                let json_pipelines: Vec<serde_json::Value> = board.pipelines().iter()
                    .map(pipeline_json)
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_pipelines)?);
            } else {
                print!("{}", format_pipeline_list(board.pipelines()));
            }
        }
        PipelineCommands::Add { name } => {
            board.create_pipeline(&name);
            exit_on_reported_errors(&board);
        }
    }
    Ok(())
}

fn handle_stages(config: &Config, cmd: StageCommands) -> Result<()> {
    match cmd {
        StageCommands::Add { pipeline_id, name, order, stage_type, probability } => {
            let pipeline_id = parse_id_or_exit(&pipeline_id, "pipeline");
            let mut draft = StageDraft::new(&name);
            if let Some(order) = order {
                draft.stage_order = Some(parse_stage_order(&order).unwrap_or_else(|e| user_error(&e)));
            }
            if let Some(stage_type) = stage_type {
                draft.stage_type = parse_stage_type(&stage_type).unwrap_or_else(|e| user_error(&e));
            }
            if let Some(probability) = probability {
                draft.win_probability = parse_probability(&probability).unwrap_or_else(|e| user_error(&e));
            }

            let mut board = open_board(config)?;
            board.create_stage(pipeline_id, &draft);
            exit_on_reported_errors(&board);
        }
        StageCommands::Update { stage_id, name, order, stage_type, probability } => {
            let stage_id = parse_id_or_exit(&stage_id, "stage");
            if name.is_none() && order.is_none() && stage_type.is_none() && probability.is_none() {
                user_error("Nothing to update. Use --name, --order, --type or --probability.");
            }

            let mut board = open_board(config)?;
            board.load();
            exit_on_reported_errors(&board);

            // The backend expects the full payload, so start from the current values
            let current = match find_stage(board.pipelines(), stage_id) {
                Some(stage) => stage,
                None => user_error(&format!("Stage {} not found", stage_id)),
            };
            let mut update = StageUpdate::from_stage(current);
            if let Some(name) = name {
                update.name = name;
            }
            if let Some(order) = order {
                update.stage_order = parse_stage_order(&order).unwrap_or_else(|e| user_error(&e));
            }
            if let Some(stage_type) = stage_type {
                update.stage_type = parse_stage_type(&stage_type).unwrap_or_else(|e| user_error(&e));
            }
            if let Some(probability) = probability {
                update.win_probability = parse_probability(&probability).unwrap_or_else(|e| user_error(&e));
            }

            board.update_stage(stage_id, &update);
            exit_on_reported_errors(&board);
        }
        StageCommands::Delete { stage_id } => {
            let stage_id = parse_id_or_exit(&stage_id, "stage");
            let mut board = open_board(config)?;
            board.delete_stage(stage_id);
            exit_on_reported_errors(&board);
        }
    }
    Ok(())
}

fn handle_deals(config: &Config, cmd: DealCommands) -> Result<()> {
    match cmd {
        DealCommands::Add { stage_id, name, amount, owner } => {
            let draft = DealDraft {
                stage_id: parse_id_or_exit(&stage_id, "stage"),
                name,
                amount: parse_amount(&amount).unwrap_or_else(|e| user_error(&e)),
                owner: owner.filter(|o| !o.trim().is_empty()),
            };

            let mut board = open_board(config)?;
            board.create_deal(&draft);
            exit_on_reported_errors(&board);
        }
        DealCommands::History { deal_id } => {
            let deal_id = parse_id_or_exit(&deal_id, "deal");
            if config.api_url.is_some() {
                user_error("Deal history is only available with the local store (remove api.url from the rc file).");
            }

            let conn = DbConnection::connect(config)
                .context("Failed to connect to database")?;
            let provider = LocalProvider::new(conn);
            let changes = provider.deal_history(deal_id)
                .unwrap_or_else(|e| user_error(&e.to_string()));
            let pipelines = provider.list_pipelines()
                .context("Failed to load pipelines")?;

            print!("{}", format_deal_history(&changes, |id| {
                find_stage(&pipelines, id).map(|s| s.name.clone())
            }));
        }
    }
    Ok(())
}

fn handle_board(config: &Config, pipeline_id: Option<String>, json: bool) -> Result<()> {
    let pipeline_id = pipeline_id.map(|id| parse_id_or_exit(&id, "pipeline"));

    let mut board = open_board(config)?;
    board.load();
    exit_on_reported_errors(&board);
    if let Some(id) = pipeline_id {
        board.select_pipeline(id);
        exit_on_reported_errors(&board);
    }

    let Some(pipeline) = board.pipeline() else {
        match pipeline_id {
            Some(id) => user_error(&format!("Pipeline {} not found", id)),
            None => {
                println!("No pipelines. Create one with: pipeboard pipelines add <NAME>");
                return Ok(());
            }
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&pipeline_json(pipeline))?);
    } else {
        print_board(pipeline);
    }
    Ok(())
}

/// Run one full gesture: pick up, hover, drop, end
fn handle_drag(config: &Config, cmd: DragCommands) -> Result<()> {
    let (entity, target) = match cmd {
        DragCommands::Stage { stage_id, onto } => (
            EntityRef::Stage(parse_id_or_exit(&stage_id, "stage")),
            parse_id_or_exit(&onto, "stage"),
        ),
        DragCommands::Deal { deal_id, onto } => (
            EntityRef::Deal(parse_id_or_exit(&deal_id, "deal")),
            parse_id_or_exit(&onto, "stage"),
        ),
    };

    let mut board = open_board(config)?;
    board.load();
    exit_on_reported_errors(&board);

    let home = board.pipelines().iter()
        .find(|p| match entity {
            EntityRef::Stage(id) => p.stage(id).is_some(),
            EntityRef::Deal(id) => p.deal(id).is_some(),
        })
        .map(|p| p.id);
    let Some(pipeline_id) = home else {
        match entity {
            EntityRef::Stage(id) => user_error(&format!("Stage {} not found", id)),
            EntityRef::Deal(id) => user_error(&format!("Deal {} not found", id)),
        }
    };
    board.select_pipeline(pipeline_id);
    exit_on_reported_errors(&board);
    if board.pipeline().and_then(|p| p.stage(target)).is_none() {
        user_error(&format!("Stage {} is not in pipeline {}", target, pipeline_id));
    }

    if !board.begin_drag(entity) {
        user_error("Could not start the drag");
    }
    board.hover_target(target);
    let outcome = board.drop(target);
    board.end_drag();

    if outcome == DropOutcome::NoOp {
        println!("Nothing to move.");
    }
    if let Some(pipeline) = board.pipeline() {
        print_board(pipeline);
    }
    if outcome == DropOutcome::Failed {
        std::process::exit(1);
    }
    Ok(())
}
