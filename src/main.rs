use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod controller;
mod domain;
mod inputter;
mod model;
mod table;
mod transfer;
mod ui;
mod validation;
mod view;

use controller::Controller;
use domain::{TMConfig, TMError, Theme};
use model::{Model, Status, expand_path};
use ui::TableUI;

/// A tui based tabular data editor with CSV import and export.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to import on start
    path: Option<String>,

    /// Rows shown per page
    #[arg(short, long, default_value_t = 10)]
    rows_per_page: usize,

    /// Write logs to this file (filter with RUST_LOG)
    #[arg(long)]
    log_file: Option<String>,

    /// Start with the light theme
    #[arg(long)]
    light: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            ratatui::restore();
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => {
            ratatui::restore();
            ExitCode::SUCCESS
        }
    }
}

/// The terminal belongs to the ui, so logs only go to a file.
fn init_logging(log_file: Option<&Path>) -> Result<(), TMError> {
    let Some(path) = log_file else {
        return Ok(());
    };
    let file = File::create(path)?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<(), TMError> {
    let log_file = args.log_file.as_deref().map(expand_path);
    init_logging(log_file.as_deref())?;

    let theme = if args.light { Theme::Light } else { Theme::Dark };
    let cfg = TMConfig::default()
        .with_rows_per_page(args.rows_per_page)
        .with_theme(theme);
    info!("Starting tabman with {cfg:?}");

    let mut model = Model::init(&cfg);
    if let Some(path) = args.path.as_deref() {
        let path = expand_path(path);
        if !path.exists() {
            return Err(TMError::FileNotFound);
        }
        if !path.is_file() {
            return Err(TMError::NotAFile);
        }
        model.import_file(&path);
    }

    let ui = TableUI::new();
    let controller = Controller::new(&cfg);
    let mut terminal = ratatui::init();

    while model.status != Status::QUITTING {
        terminal.draw(|f| ui.draw(&model, f))?;

        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }

    info!("Bye");
    Ok(())
}
