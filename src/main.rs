use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use ratatui::DefaultTerminal;
use tracing::{info, trace};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod inputter;
mod model;
mod report;
mod session;
mod table;
mod ui;

use controller::Controller;
use domain::{SRConfig, SRError};
use model::{Model, Status};
use ui::TableUI;

/// Turn survey CSV files into distribution and summary PDF reports.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// CSV file to open on start
    file: Option<String>,

    /// Text banner shown above the instructions
    #[arg(long, default_value = "assets/banner.txt")]
    banner: String,

    /// Directory the saved reports are written to
    #[arg(long, default_value = ".")]
    output_dir: String,

    /// Log file, the terminal belongs to the ui
    #[arg(long, default_value = "survey-report.log")]
    log_file: String,

    /// Event poll time in milliseconds
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand(path: &str) -> Result<PathBuf, SRError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| SRError::LoadingFailed(e.to_string()))
}

fn init_logging(path: &Path) -> Result<(), SRError> {
    let file = fs::File::create(path)?;
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false),
        )
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(ErrorLayer::default())
        .init();
    Ok(())
}

/// Reads the banner asset, failing before the terminal is taken over.
fn load_banner(path: &Path) -> Result<String, SRError> {
    if !path.is_file() {
        return Err(SRError::MissingAsset(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?.trim_end().to_string())
}

fn run(args: Args) -> Result<(), SRError> {
    init_logging(&expand(&args.log_file)?)?;

    let config = SRConfig::default()
        .event_poll_time(args.poll_ms)
        .banner_path(expand(&args.banner)?)
        .output_dir(expand(&args.output_dir)?);
    trace!("Config: {:?}", config);

    let banner = load_banner(&config.banner_path)?;
    if !config.output_dir.is_dir() {
        return Err(SRError::LoadingFailed(format!(
            "output directory '{}' does not exist",
            config.output_dir.display()
        )));
    }

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &config, banner, args.file.as_deref());
    ratatui::restore();
    result
}

fn event_loop(
    terminal: &mut DefaultTerminal,
    config: &SRConfig,
    banner: String,
    file: Option<&str>,
) -> Result<(), SRError> {
    let size = terminal.size()?;
    let mut model = Model::init(config, banner, size.width as usize, size.height as usize);
    if let Some(file) = file {
        model.load_data_file(expand(file)?);
    }

    let mut ui = TableUI::new();
    let controller = Controller::new(config);

    info!("Starting survey-report");
    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message
        if let Some(message) = controller.handle_event(&model)? {
            model.update(Some(message))?;
        };
    }
    Ok(())
}
