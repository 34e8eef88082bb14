use std::fmt;
use std::io::Error;
use std::path::PathBuf;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

pub const APP_TITLE: &str = " Survey Results Grapher ";

pub const INSTRUCTIONS: &str = "\
This tool builds PDF reports from survey results so you can analyse them and take decisions for your business.
1. Open your survey CSV file.
2. Select every column you want to analyse.
3. Do NOT request statistics on text columns. Select the numeric ones separately.
4. Generate charts and statistics with the corresponding keys and save them as PDF.";

pub const FOOTER: &str = "Survey Results Grapher. Every session starts empty, nothing is stored.";

pub const HELP_TEXT: &str = "\
o        Open a CSV file
↑/k ↓/j  Move in the column list
Space    Select / unselect column
a        Select all columns
c        Clear selection
g        Generate charts (graphs.pdf)
s        Generate statistics (stats_summary.pdf)
G        Save graphs.pdf
S        Save stats_summary.pdf
?        Show this help
Esc      Close popup / cancel input
q        Quit";

#[derive(Debug)]
pub enum SRError {
    IoError(Error),
    PolarsError(PolarsError),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    MissingAsset(PathBuf),
    NoTable,
    EmptySelection,
    UnknownColumn(String),
    NonNumericColumns(Vec<String>),
    PdfFailed(String),
    NotReady(&'static str),
}

impl SRError {
    /// Advisory errors are warnings about the user's input, nothing failed.
    pub fn is_advisory(&self) -> bool {
        matches!(self, SRError::EmptySelection | SRError::NoTable)
    }
}

impl fmt::Display for SRError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SRError::IoError(e) => write!(f, "I/O error: {e}"),
            SRError::PolarsError(e) => write!(f, "Could not parse the CSV file: {e}"),
            SRError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            SRError::FileNotFound => write!(f, "File not found"),
            SRError::PermissionDenied => write!(f, "Permission denied"),
            SRError::UnknownFileType => write!(f, "Only .csv files are supported"),
            SRError::MissingAsset(path) => {
                write!(f, "Banner asset not found at '{}'", path.display())
            }
            SRError::NoTable => write!(f, "Please open a CSV file first."),
            SRError::EmptySelection => write!(f, "Please select at least one column."),
            SRError::UnknownColumn(name) => write!(f, "Unknown column '{name}'"),
            SRError::NonNumericColumns(names) => {
                write!(f, "Non-numeric column(s): {}", names.join(", "))
            }
            SRError::PdfFailed(reason) => write!(f, "Could not write PDF: {reason}"),
            SRError::NotReady(file_name) => {
                write!(f, "{file_name} has not been generated yet")
            }
        }
    }
}

impl From<Error> for SRError {
    fn from(err: Error) -> Self {
        SRError::IoError(err)
    }
}

impl From<PolarsError> for SRError {
    fn from(err: PolarsError) -> Self {
        SRError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Setters)]
pub struct SRConfig {
    pub event_poll_time: u64,
    pub banner_path: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for SRConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            banner_path: PathBuf::from("assets/banner.txt"),
            output_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    OpenFile,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveBeginning,
    MoveEnd,
    ToggleColumn,
    SelectAll,
    ClearSelection,
    GenerateGraphs,
    GenerateStats,
    DownloadGraphs,
    DownloadStats,
    OpenFile,
    Help,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}
