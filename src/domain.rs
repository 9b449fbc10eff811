use std::fmt;
use std::io::Error;
use std::time::Duration;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum TMError {
    IoError(Error),
    PolarsError(PolarsError),
    FileNotFound,
    PermissionDenied,
    NotAFile,
    DuplicateRowId(String),
    DuplicateColumnId(String),
    InvalidColumnId(String),
}

impl fmt::Display for TMError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TMError::IoError(e) => write!(f, "I/O error: {e}"),
            TMError::PolarsError(e) => write!(f, "CSV error: {e}"),
            TMError::FileNotFound => write!(f, "File not found"),
            TMError::PermissionDenied => write!(f, "Permission denied"),
            TMError::NotAFile => write!(f, "Not a file"),
            TMError::DuplicateRowId(id) => write!(f, "Row with id \"{id}\" already exists"),
            TMError::DuplicateColumnId(id) => {
                write!(f, "Column with id \"{id}\" already exists")
            }
            TMError::InvalidColumnId(id) => write!(f, "Invalid column id \"{id}\""),
        }
    }
}

impl std::error::Error for TMError {}

impl From<Error> for TMError {
    fn from(err: Error) -> Self {
        TMError::IoError(err)
    }
}

impl From<PolarsError> for TMError {
    fn from(err: PolarsError) -> Self {
        TMError::PolarsError(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct TMConfig {
    pub event_poll_time: u64,
    pub rows_per_page: usize,
    pub export_file: String,
    pub template_file: String,
    pub delete_confirm_window: Duration,
    pub theme: Theme,
}

impl Default for TMConfig {
    fn default() -> Self {
        TMConfig {
            event_poll_time: 100,
            rows_per_page: 10,
            export_file: "table-export.csv".to_string(),
            template_file: "sample-template.csv".to_string(),
            delete_confirm_window: Duration::from_secs(3),
            theme: Theme::Dark,
        }
    }
}

/// What the command line is currently collecting input for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    EditField,
    ImportPath,
    ExportPath,
    TemplatePath,
    NewColumnId,
    NewColumnLabel,
    ConfirmReset,
}

impl CMDMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            CMDMode::Search => "/",
            CMDMode::EditField => "Value: ",
            CMDMode::ImportPath => "Import CSV: ",
            CMDMode::ExportPath => "Export to: ",
            CMDMode::TemplatePath => "Write template to: ",
            CMDMode::NewColumnId => "Column id: ",
            CMDMode::NewColumnLabel => "Column label: ",
            CMDMode::ConfirmReset => "Reset table to default data? (y/n): ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    CyclePageSize,
    Search,
    ClearSearch,
    Sort,
    EditRow,
    SaveRow,
    AddRow,
    DeleteRow,
    ManageColumns,
    ToggleColumn,
    MoveColumnUp,
    MoveColumnDown,
    AddColumn,
    Import,
    Export,
    Template,
    Reset,
    ToggleTheme,
    CopyCell,
    CopyRow,
    Help,
    Enter,
    Exit,
    Resize(usize, usize),
    RawKey(KeyEvent),
}

pub const HELP_TEXT: &str = "\
Table
  arrows / hjkl   move selection
  n / p           next / previous page
  g / G           first / last page
  +               cycle rows per page (5, 10, 25, 50)
  /               search all visible columns
  Backspace       clear search
  s               sort by selected column (again to reverse)
  e               edit selected row
  a               add a new row
  d d             delete selected row (press twice)
  c               manage columns
  i               import CSV file
  x               export visible columns to CSV
  t               write a sample CSV template
  R               reset table to default data
  y / Y           copy cell / row to clipboard
  T               toggle light / dark theme
  ?               this help
  q               quit

Edit row
  left / right    select field
  Enter           change field value
  w               save row
  Esc             cancel

Columns
  up / down       select column
  Space           show / hide column
  K / J           move column up / down
  n               add column
  Esc             close

Popups
  up / down       scroll
  Esc / Enter     close";
