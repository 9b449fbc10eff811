use arboard::Clipboard;
use ratatui::crossterm::event::KeyEvent;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing::{debug, error, info, trace, warn};

use crate::domain::{CMDMode, HELP_TEXT, Message, TMConfig, TMError, Theme};
use crate::inputter::{InputResult, Inputter};
use crate::table::{
    ColumnConfig, NewColumn, PAGE_SIZE_OPTIONS, Row, SortDirection, TableState, move_column,
    normalize_column_id,
};
use crate::transfer::{self, ImportError};
use crate::validation::validate_field;

#[derive(Debug, PartialEq)]
pub enum Status {
    READY,
    QUITTING,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    TABLE,
    EDIT,
    COLUMNS,
    POPUP,
    CMDINPUT,
}

/// One field of the row currently being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct EditField {
    pub id: String,
    pub label: String,
    pub value: String,
    pub valid: bool,
}

impl EditField {
    fn new(id: &str, label: &str, value: String) -> Self {
        let valid = validate_field(id, &value);
        EditField {
            id: id.to_string(),
            label: label.to_string(),
            value,
            valid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderView {
    pub label: String,
    pub sort: Option<SortDirection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Popup {
    pub title: String,
    pub message: String,
    /// First message line shown.
    pub scroll: u16,
}

impl Popup {
    fn scroll_by(&mut self, down: bool) {
        let last = self.message.lines().count().saturating_sub(1);
        let last = u16::try_from(last).unwrap_or(u16::MAX);
        self.scroll = if down {
            (self.scroll + 1).min(last)
        } else {
            self.scroll.saturating_sub(1)
        };
    }
}

/// Everything the ui needs to draw one frame.
pub struct UIData {
    pub headers: Vec<HeaderView>,
    pub rows: Vec<Vec<String>>,
    pub selected_row: usize,
    pub selected_column: usize,
    pub editing_row: Option<usize>,
    pub edit_fields: Vec<EditField>,
    pub selected_field: usize,
    pub first_row_number: usize,
    pub total_rows: usize,
    pub all_rows: usize,
    pub page: usize,
    pub page_count: usize,
    pub rows_per_page: usize,
    pub search: String,
    pub columns: Vec<ColumnConfig>,
    pub selected_column_item: usize,
    pub show_columns: bool,
    pub popup: Option<Popup>,
    pub cmdinput: InputResult,
    pub cmd_mode: Option<CMDMode>,
    pub active_cmdinput: bool,
    pub status_message: String,
    pub last_status_message_update: Instant,
    pub theme: Theme,
}

impl UIData {
    pub fn empty(theme: Theme) -> Self {
        UIData {
            headers: Vec::new(),
            rows: Vec::new(),
            selected_row: 0,
            selected_column: 0,
            editing_row: None,
            edit_fields: Vec::new(),
            selected_field: 0,
            first_row_number: 1,
            total_rows: 0,
            all_rows: 0,
            page: 0,
            page_count: 0,
            rows_per_page: 0,
            search: String::new(),
            columns: Vec::new(),
            selected_column_item: 0,
            show_columns: false,
            popup: None,
            cmdinput: InputResult::default(),
            cmd_mode: None,
            active_cmdinput: false,
            status_message: String::new(),
            last_status_message_update: Instant::now(),
            theme,
        }
    }
}

pub struct Model {
    config: TMConfig,
    pub status: Status,
    modus: Modus,
    previous_modus: Modus,
    table: TableState,
    cursor_row: usize,
    cursor_column: usize,
    edit_fields: Vec<EditField>,
    edit_field: usize,
    column_cursor: usize,
    pending_column_id: Option<String>,
    delete_confirm: Option<(String, Instant)>,
    popup: Option<Popup>,
    theme: Theme,
    uidata: UIData,
    clipboard: Option<Clipboard>,
    input: Inputter,
    cmd_mode: Option<CMDMode>,
    last_input: InputResult,
    active_cmdinput: bool,
    status_message: String,
    last_status_message_update: Instant,
}

impl Model {
    pub fn init(config: &TMConfig) -> Self {
        let mut model = Self {
            config: config.clone(),
            status: Status::READY,
            modus: Modus::TABLE,
            previous_modus: Modus::TABLE,
            table: TableState::new(config.rows_per_page),
            cursor_row: 0,
            cursor_column: 0,
            edit_fields: Vec::new(),
            edit_field: 0,
            column_cursor: 0,
            pending_column_id: None,
            delete_confirm: None,
            popup: None,
            theme: config.theme,
            uidata: UIData::empty(config.theme),
            clipboard: None,
            input: Inputter::default(),
            cmd_mode: None,
            last_input: InputResult::default(),
            active_cmdinput: false,
            status_message: "Press ? for help".to_string(),
            last_status_message_update: Instant::now(),
        };
        model.refresh_uidata();
        model
    }

    pub fn get_uidata(&self) -> &UIData {
        &self.uidata
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn raw_keyevents(&self) -> bool {
        self.active_cmdinput
    }

    pub fn quit(&mut self) {
        self.status = Status::QUITTING;
    }

    /// Imports `path` and replaces the table when every row is valid.
    pub fn import_file(&mut self, path: &Path) {
        match transfer::import_csv_file(path) {
            Ok(result) => match result.apply(&mut self.table) {
                Ok(imported) => {
                    self.cursor_row = 0;
                    self.set_status_message(format!(
                        "Imported {imported} rows from {}",
                        path.display()
                    ));
                }
                Err(errors) => self.show_import_errors(&errors),
            },
            Err(e) => {
                error!("Import of {} failed: {e}", path.display());
                self.set_status_message(format!("Import failed: {e}"));
            }
        }
        self.refresh_uidata();
    }

    pub fn update(&mut self, message: Option<Message>) -> Result<(), TMError> {
        if let Some(msg) = message {
            match self.modus {
                Modus::TABLE => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.cursor_row = self.cursor_row.saturating_sub(1),
                    Message::MoveDown => self.cursor_row += 1,
                    Message::MoveLeft => self.cursor_column = self.cursor_column.saturating_sub(1),
                    Message::MoveRight => self.cursor_column += 1,
                    Message::NextPage => self.next_page(),
                    Message::PrevPage => self.prev_page(),
                    Message::FirstPage => self.goto_page(0),
                    Message::LastPage => self.goto_page(self.page_count().saturating_sub(1)),
                    Message::CyclePageSize => self.cycle_page_size(),
                    Message::Search => {
                        let search = self.table.view().search.clone();
                        self.enter_cmd_mode(CMDMode::Search, &search);
                    }
                    Message::ClearSearch => {
                        self.table.set_search_query("");
                        self.cursor_row = 0;
                    }
                    Message::Sort => self.sort_current_column(),
                    Message::EditRow => self.start_edit(),
                    Message::AddRow => self.add_row()?,
                    Message::DeleteRow => self.delete_selected_row(),
                    Message::ManageColumns => {
                        self.column_cursor = 0;
                        self.modus = Modus::COLUMNS;
                    }
                    Message::Import => self.enter_cmd_mode(CMDMode::ImportPath, ""),
                    Message::Export => {
                        let file = self.config.export_file.clone();
                        self.enter_cmd_mode(CMDMode::ExportPath, &file);
                    }
                    Message::Template => {
                        let file = self.config.template_file.clone();
                        self.enter_cmd_mode(CMDMode::TemplatePath, &file);
                    }
                    Message::Reset => self.enter_cmd_mode(CMDMode::ConfirmReset, ""),
                    Message::ToggleTheme => self.toggle_theme(),
                    Message::CopyCell => self.copy_cell(),
                    Message::CopyRow => self.copy_row(),
                    Message::Help => self.show_popup("Help", HELP_TEXT.to_string()),
                    Message::Exit => self.delete_confirm = None,
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::EDIT => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveLeft => self.edit_field = self.edit_field.saturating_sub(1),
                    Message::MoveRight => {
                        if self.edit_field + 1 < self.edit_fields.len() {
                            self.edit_field += 1;
                        }
                    }
                    Message::Enter => {
                        if let Some(field) = self.edit_fields.get(self.edit_field) {
                            let value = field.value.clone();
                            self.enter_cmd_mode(CMDMode::EditField, &value);
                        }
                    }
                    Message::SaveRow => self.save_edit(),
                    Message::Exit => self.cancel_edit(),
                    Message::Help => self.show_popup("Help", HELP_TEXT.to_string()),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::COLUMNS => match msg {
                    Message::Quit => self.quit(),
                    Message::MoveUp => self.column_cursor = self.column_cursor.saturating_sub(1),
                    Message::MoveDown => {
                        if self.column_cursor + 1 < self.table.columns().len() {
                            self.column_cursor += 1;
                        }
                    }
                    Message::ToggleColumn => {
                        if let Some(column) = self.table.columns().get(self.column_cursor) {
                            let id = column.id.clone();
                            self.table.toggle_column_visibility(&id);
                        }
                    }
                    Message::MoveColumnUp => self.move_selected_column(false),
                    Message::MoveColumnDown => self.move_selected_column(true),
                    Message::AddColumn => self.enter_cmd_mode(CMDMode::NewColumnId, ""),
                    Message::Exit => self.modus = Modus::TABLE,
                    Message::Help => self.show_popup("Help", HELP_TEXT.to_string()),
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::POPUP => match msg {
                    Message::Quit => self.quit(),
                    Message::Exit => self.close_popup(),
                    Message::MoveUp | Message::MoveDown => {
                        if let Some(popup) = self.popup.as_mut() {
                            popup.scroll_by(msg == Message::MoveDown);
                        }
                    }
                    Message::Resize(width, height) => self.ui_resize(width, height),
                    _ => (),
                },
                Modus::CMDINPUT => {
                    if let Message::RawKey(key) = msg {
                        self.raw_input(key)
                    }
                }
            }
        }

        self.refresh_uidata();
        Ok(())
    }

    // -------------------- Table handling functions ---------------------- //

    fn page_count(&self) -> usize {
        self.table.derive().page_count()
    }

    fn goto_page(&mut self, page: usize) {
        self.table.set_page(page);
        self.cursor_row = 0;
    }

    fn next_page(&mut self) {
        let page = self.table.view().page;
        if page + 1 < self.page_count() {
            self.goto_page(page + 1);
        }
    }

    fn prev_page(&mut self) {
        let page = self.table.view().page;
        if page > 0 {
            self.goto_page(page - 1);
        }
    }

    fn cycle_page_size(&mut self) {
        let current = self.table.view().rows_per_page;
        let next = PAGE_SIZE_OPTIONS
            .iter()
            .copied()
            .find(|&size| size > current)
            .unwrap_or(PAGE_SIZE_OPTIONS[0]);
        self.table.set_rows_per_page(next);
        self.cursor_row = 0;
        self.set_status_message(format!("{next} rows per page"));
    }

    fn selected_row_id(&self) -> Option<String> {
        let view = self.table.derive();
        view.rows.get(self.cursor_row).map(|row| row.id.clone())
    }

    fn selected_column_id(&self) -> Option<String> {
        let view = self.table.derive();
        view.columns.get(self.cursor_column).map(|column| column.id.clone())
    }

    fn sort_current_column(&mut self) {
        if let Some(column) = self.selected_column_id() {
            self.table.sort_by_column(&column);
            let message = self
                .table
                .view()
                .sort
                .as_ref()
                .map(|spec| format!("Sorted by {} ({:?})", spec.column, spec.direction));
            if let Some(message) = message {
                self.set_status_message(message);
            }
        }
    }

    fn add_row(&mut self) -> Result<(), TMError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let mut id = millis.to_string();
        let mut bump = millis;
        while self.table.row(&id).is_some() {
            bump += 1;
            id = bump.to_string();
        }
        self.table.add_row(Row::new(id.clone(), "", "", 0, ""))?;
        self.set_status_message(format!("Added row {id}"));
        Ok(())
    }

    fn delete_selected_row(&mut self) {
        let Some(id) = self.selected_row_id() else {
            return;
        };
        let confirmed = matches!(
            &self.delete_confirm,
            Some((pending, at)) if *pending == id && at.elapsed() <= self.config.delete_confirm_window
        );
        if !confirmed {
            self.delete_confirm = Some((id, Instant::now()));
            self.set_status_message("Press d again to delete the row");
            return;
        }
        self.delete_confirm = None;
        self.table.delete_row(&id);
        // Stay on a page that still has rows.
        let pages = self.page_count();
        if pages > 0 && self.table.view().page >= pages {
            self.table.set_page(pages - 1);
        }
        self.set_status_message(format!("Deleted row {id}"));
    }

    fn start_edit(&mut self) {
        let Some(id) = self.selected_row_id() else {
            return;
        };
        if !self.table.set_editing_row(Some(&id)) {
            warn!("Cannot edit row {id}, another row is being edited");
            return;
        }
        let fields = {
            let view = self.table.derive();
            let row = view.rows.get(self.cursor_row).copied();
            view.columns
                .iter()
                .map(|c| {
                    let value = row.map(|r| r.display(&c.id)).unwrap_or_default();
                    EditField::new(&c.id, &c.label, value)
                })
                .collect()
        };
        self.edit_fields = fields;
        self.edit_field = self.cursor_column.min(self.edit_fields.len().saturating_sub(1));
        self.modus = Modus::EDIT;
        debug!("Editing row {id}");
    }

    fn save_edit(&mut self) {
        if let Some(id) = self.table.view().editing_row.clone() {
            let attributes = self
                .edit_fields
                .iter()
                .map(|f| (f.id.as_str(), f.value.as_str()));
            self.table.update_row(&id, attributes);
            self.set_status_message(format!("Saved row {id}"));
        }
        self.cancel_edit();
    }

    fn cancel_edit(&mut self) {
        self.table.set_editing_row(None);
        self.edit_fields.clear();
        self.edit_field = 0;
        self.modus = Modus::TABLE;
    }

    fn move_selected_column(&mut self, down: bool) {
        let from = self.column_cursor;
        let to = if down {
            from + 1
        } else {
            match from.checked_sub(1) {
                Some(to) => to,
                None => return,
            }
        };
        if to >= self.table.columns().len() {
            return;
        }
        let columns = move_column(self.table.columns(), from, to);
        self.table.reorder_columns(columns);
        self.column_cursor = to;
    }

    fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        self.set_status_message(format!("{:?} theme", self.theme));
    }

    fn copy_cell(&mut self) {
        let cell = {
            let view = self.table.derive();
            match (view.rows.get(self.cursor_row), view.columns.get(self.cursor_column)) {
                (Some(row), Some(column)) => Some(row.display(&column.id)),
                _ => None,
            }
        };
        if let Some(cell) = cell {
            trace!("Cell content: {}", cell);
            self.copy_to_clipboard(cell);
        }
    }

    fn copy_row(&mut self) {
        let line = {
            let view = self.table.derive();
            view.rows.get(self.cursor_row).map(|row| {
                view.columns
                    .iter()
                    .map(|c| transfer::quote_field(&row.display(&c.id)))
                    .collect::<Vec<String>>()
                    .join(",")
            })
        };
        if let Some(line) = line {
            self.copy_to_clipboard(line);
        }
    }

    fn copy_to_clipboard(&mut self, content: String) {
        if self.clipboard.is_none() {
            match Clipboard::new() {
                Ok(clipboard) => self.clipboard = Some(clipboard),
                Err(e) => {
                    error!("Clipboard unavailable: {e:?}");
                    self.set_status_message("Clipboard unavailable");
                    return;
                }
            }
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            match clipboard.set_text(content) {
                Ok(_) => self.set_status_message("Copied to clipboard"),
                Err(e) => {
                    error!("Error copying to clipboard: {e:?}");
                    self.set_status_message("Copy failed");
                }
            }
        }
    }

    fn export(&mut self, path: &Path) {
        match transfer::export_to_file(self.table.rows(), self.table.columns(), path) {
            Ok(()) => self.set_status_message(format!(
                "Exported {} rows to {}",
                self.table.rows().len(),
                path.display()
            )),
            Err(e) => {
                error!("Export to {} failed: {e}", path.display());
                self.set_status_message(format!("Export failed: {e}"));
            }
        }
    }

    fn write_template(&mut self, path: &Path) {
        match transfer::write_template(path) {
            Ok(()) => self.set_status_message(format!("Template written to {}", path.display())),
            Err(e) => {
                error!("Writing template to {} failed: {e}", path.display());
                self.set_status_message(format!("Template failed: {e}"));
            }
        }
    }

    fn show_import_errors(&mut self, errors: &[ImportError]) {
        info!("Import rejected with {} errors", errors.len());
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        self.show_popup(
            &format!("Import failed: {} errors, table unchanged", errors.len()),
            message,
        );
    }

    // -------------------- Popup and command line ---------------------- //

    fn show_popup(&mut self, title: &str, message: String) {
        if self.modus != Modus::POPUP {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::POPUP;
        self.popup = Some(Popup {
            title: title.to_string(),
            message,
            scroll: 0,
        });
    }

    fn close_popup(&mut self) {
        trace!("Close popup ...");
        self.popup = None;
        self.modus = match self.previous_modus {
            Modus::POPUP | Modus::CMDINPUT => Modus::TABLE,
            modus => modus,
        };
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
        self.last_status_message_update = Instant::now();
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!("UI was resized to w:{width}, h:{height}");
    }

    fn raw_input(&mut self, key: KeyEvent) {
        if self.active_cmdinput {
            self.last_input = self.input.read(key);
            if self.last_input.finished {
                self.handle_cmd_input();
            }
        }
    }

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {mode:?} ...");
        self.previous_modus = self.modus;
        self.modus = Modus::CMDINPUT;
        self.cmd_mode = Some(mode);

        self.active_cmdinput = true;
        self.input.clear();
        self.input.set(prefill);
        self.last_input = self.input.get();
    }

    fn handle_cmd_input(&mut self) {
        trace!("Handle cmd input {}", self.last_input.input);

        self.active_cmdinput = false;
        self.modus = self.previous_modus;
        self.previous_modus = Modus::CMDINPUT;

        let mode = self.cmd_mode.take();
        if self.last_input.canceled {
            self.pending_column_id = None;
            return;
        }

        let cmd_input = self.last_input.input.clone();
        match mode {
            Some(CMDMode::Search) => {
                self.table.set_search_query(cmd_input);
                self.cursor_row = 0;
            }
            Some(CMDMode::EditField) => {
                if let Some(field) = self.edit_fields.get_mut(self.edit_field) {
                    field.valid = validate_field(&field.id, &cmd_input);
                    field.value = cmd_input;
                }
            }
            Some(CMDMode::ImportPath) => {
                if !cmd_input.trim().is_empty() {
                    self.import_file(&expand_path(&cmd_input));
                }
            }
            Some(CMDMode::ExportPath) => self.export(&expand_path(&cmd_input)),
            Some(CMDMode::TemplatePath) => self.write_template(&expand_path(&cmd_input)),
            Some(CMDMode::NewColumnId) => self.new_column_id(&cmd_input),
            Some(CMDMode::NewColumnLabel) => self.new_column_label(cmd_input),
            Some(CMDMode::ConfirmReset) => {
                if matches!(cmd_input.trim().to_lowercase().as_str(), "y" | "yes") {
                    self.table.reset();
                    self.cursor_row = 0;
                    self.cursor_column = 0;
                    self.set_status_message("Table reset to default data");
                }
            }
            None => {
                info!("Cmd mode is none!")
            }
        }
    }

    fn new_column_id(&mut self, input: &str) {
        let id = normalize_column_id(input);
        if id.is_empty() {
            self.set_status_message("Column id must not be empty");
        } else if self.table.columns().iter().any(|c| c.id == id) {
            self.set_status_message("Column with this ID already exists!");
        } else {
            self.pending_column_id = Some(id);
            self.enter_cmd_mode(CMDMode::NewColumnLabel, input.trim());
        }
    }

    fn new_column_label(&mut self, label: String) {
        let Some(id) = self.pending_column_id.take() else {
            return;
        };
        if label.trim().is_empty() {
            self.set_status_message("Column label must not be empty");
            return;
        }
        let column = NewColumn {
            id: id.clone(),
            label,
            visible: true,
        };
        match self.table.add_column(column) {
            Ok(()) => {
                self.column_cursor = self.table.columns().len() - 1;
                self.set_status_message(format!("Added column {id}"));
            }
            Err(e) => self.set_status_message(e.to_string()),
        }
    }

    // -------------------- UI data ---------------------- //

    fn refresh_uidata(&mut self) {
        let view = self.table.derive();
        self.cursor_row = self.cursor_row.min(view.rows.len().saturating_sub(1));
        self.cursor_column = self.cursor_column.min(view.columns.len().saturating_sub(1));

        let sort = self.table.view().sort.as_ref();
        let headers = view
            .columns
            .iter()
            .map(|c| HeaderView {
                label: c.label.clone(),
                sort: sort.filter(|s| s.column == c.id).map(|s| s.direction),
            })
            .collect();
        let rows = view
            .rows
            .iter()
            .map(|r| view.columns.iter().map(|c| r.display(&c.id)).collect())
            .collect();
        let editing_row = self
            .table
            .view()
            .editing_row
            .as_ref()
            .and_then(|id| view.rows.iter().position(|r| &r.id == id));

        self.uidata = UIData {
            headers,
            rows,
            selected_row: self.cursor_row,
            selected_column: self.cursor_column,
            editing_row,
            edit_fields: self.edit_fields.clone(),
            selected_field: self.edit_field,
            first_row_number: view.first_row_number(),
            total_rows: view.total_rows,
            all_rows: self.table.rows().len(),
            page: view.page,
            page_count: view.page_count(),
            rows_per_page: view.rows_per_page,
            search: self.table.view().search.clone(),
            columns: self.table.columns().to_vec(),
            selected_column_item: self.column_cursor,
            show_columns: self.modus == Modus::COLUMNS
                || (self.modus != Modus::TABLE && self.previous_modus == Modus::COLUMNS),
            popup: self.popup.clone(),
            cmdinput: self.last_input.clone(),
            cmd_mode: self.cmd_mode,
            active_cmdinput: self.active_cmdinput,
            status_message: self.status_message.clone(),
            last_status_message_update: self.last_status_message_update,
            theme: self.theme,
        };
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> PathBuf {
    let raw = raw.trim();
    match shellexpand::full(raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            warn!("Could not expand {raw}: {e}");
            PathBuf::from(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::{KeyCode, KeyModifiers};
    use tempfile::tempdir;

    fn model() -> Model {
        Model::init(&TMConfig::default())
    }

    fn send(model: &mut Model, message: Message) {
        model.update(Some(message)).unwrap();
    }

    fn key(model: &mut Model, code: KeyCode, modifiers: KeyModifiers) {
        send(model, Message::RawKey(KeyEvent::new(code, modifiers)));
    }

    fn type_line(model: &mut Model, text: &str) {
        assert!(model.raw_keyevents());
        key(model, KeyCode::Char('u'), KeyModifiers::CONTROL);
        for c in text.chars() {
            key(model, KeyCode::Char(c), KeyModifiers::NONE);
        }
        key(model, KeyCode::Enter, KeyModifiers::NONE);
    }

    fn names(model: &Model) -> Vec<String> {
        model.get_uidata().rows.iter().map(|r| r[0].clone()).collect()
    }

    #[test]
    fn search_through_command_line() {
        let mut model = model();
        send(&mut model, Message::Search);
        assert_eq!(model.modus(), Modus::CMDINPUT);
        type_line(&mut model, "dev");
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(names(&model), ["John Doe", "Alice Williams"]);
        assert_eq!(model.get_uidata().search, "dev");

        send(&mut model, Message::ClearSearch);
        assert_eq!(model.get_uidata().rows.len(), 5);
    }

    #[test]
    fn escape_cancels_command() {
        let mut model = model();
        send(&mut model, Message::Search);
        key(&mut model, KeyCode::Char('x'), KeyModifiers::NONE);
        key(&mut model, KeyCode::Esc, KeyModifiers::NONE);
        assert_eq!(model.modus(), Modus::TABLE);
        assert_eq!(model.get_uidata().search, "");
    }

    #[test]
    fn sort_toggles_on_selected_column() {
        let mut model = model();
        send(&mut model, Message::Sort);
        assert_eq!(model.get_uidata().headers[0].sort, Some(SortDirection::Ascending));
        assert_eq!(names(&model)[0], "Alice Williams");
        send(&mut model, Message::Sort);
        assert_eq!(model.get_uidata().headers[0].sort, Some(SortDirection::Descending));
        assert_eq!(names(&model)[0], "John Doe");
    }

    #[test]
    fn delete_needs_confirmation() {
        let mut model = model();
        send(&mut model, Message::DeleteRow);
        assert_eq!(model.get_uidata().all_rows, 5);
        send(&mut model, Message::DeleteRow);
        assert_eq!(model.get_uidata().all_rows, 4);
        assert_eq!(names(&model)[0], "Jane Smith");
    }

    #[test]
    fn delete_confirmation_is_per_row() {
        let mut model = model();
        send(&mut model, Message::DeleteRow);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::DeleteRow);
        assert_eq!(model.get_uidata().all_rows, 5);
    }

    #[test]
    fn deleting_last_row_of_last_page_moves_back() {
        let mut model = model();
        send(&mut model, Message::CyclePageSize);
        assert_eq!(model.get_uidata().rows_per_page, 25);
        for _ in 0..3 {
            send(&mut model, Message::CyclePageSize);
        }
        assert_eq!(model.get_uidata().rows_per_page, 10);

        model.table.set_rows_per_page(2);
        send(&mut model, Message::LastPage);
        assert_eq!(model.get_uidata().page, 2);
        send(&mut model, Message::DeleteRow);
        send(&mut model, Message::DeleteRow);
        assert_eq!(model.get_uidata().page, 1);
        assert_eq!(names(&model), ["Bob Johnson", "Alice Williams"]);
    }

    #[test]
    fn edit_and_save_row() {
        let mut model = model();
        send(&mut model, Message::EditRow);
        assert_eq!(model.modus(), Modus::EDIT);
        assert_eq!(model.get_uidata().editing_row, Some(0));

        send(&mut model, Message::MoveRight);
        send(&mut model, Message::Enter);
        type_line(&mut model, "broken");
        assert_eq!(model.modus(), Modus::EDIT);
        assert!(!model.get_uidata().edit_fields[1].valid);

        send(&mut model, Message::Enter);
        type_line(&mut model, "johnny@example.com");
        send(&mut model, Message::MoveRight);
        send(&mut model, Message::Enter);
        type_line(&mut model, "29");
        send(&mut model, Message::SaveRow);

        assert_eq!(model.modus(), Modus::TABLE);
        let row = model.table.row("1").unwrap();
        assert_eq!(row.email, "johnny@example.com");
        assert_eq!(row.age, 29);
        assert_eq!(model.table.view().editing_row, None);
    }

    #[test]
    fn cancel_edit_keeps_row() {
        let mut model = model();
        send(&mut model, Message::EditRow);
        send(&mut model, Message::Enter);
        type_line(&mut model, "Someone Else");
        send(&mut model, Message::Exit);
        assert_eq!(model.table.row("1").unwrap().name, "John Doe");
        assert_eq!(model.modus(), Modus::TABLE);
    }

    #[test]
    fn add_row_appends_blank_row() {
        let mut model = model();
        send(&mut model, Message::AddRow);
        send(&mut model, Message::AddRow);
        let rows = model.table.rows();
        assert_eq!(rows.len(), 7);
        assert_ne!(rows[5].id, rows[6].id);
        assert_eq!(rows[6].name, "");
        assert_eq!(rows[6].age, 0);
    }

    #[test]
    fn add_column_from_manager() {
        let mut model = model();
        send(&mut model, Message::ManageColumns);
        assert!(model.get_uidata().show_columns);
        send(&mut model, Message::AddColumn);
        type_line(&mut model, "Home Town");
        assert_eq!(model.modus(), Modus::CMDINPUT);
        type_line(&mut model, "Home town");
        assert_eq!(model.modus(), Modus::COLUMNS);

        let column = model.table.columns().last().unwrap();
        assert_eq!(column.id, "home_town");
        assert_eq!(column.label, "Home town");
        assert_eq!(column.order, 4);
        assert_eq!(model.get_uidata().headers.len(), 5);
    }

    #[test]
    fn add_existing_column_is_refused() {
        let mut model = model();
        send(&mut model, Message::ManageColumns);
        send(&mut model, Message::AddColumn);
        type_line(&mut model, "Email");
        assert_eq!(model.modus(), Modus::COLUMNS);
        assert_eq!(model.table.columns().len(), 4);
    }

    #[test]
    fn toggle_and_move_columns() {
        let mut model = model();
        send(&mut model, Message::ManageColumns);
        send(&mut model, Message::ToggleColumn);
        let labels: Vec<_> = model.get_uidata().headers.iter().map(|h| h.label.clone()).collect();
        assert_eq!(labels, ["Email", "Age", "Role"]);
        send(&mut model, Message::ToggleColumn);

        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveDown);
        send(&mut model, Message::MoveColumnUp);
        let labels: Vec<_> = model.get_uidata().headers.iter().map(|h| h.label.clone()).collect();
        assert_eq!(labels, ["Name", "Email", "Role", "Age"]);
        send(&mut model, Message::Exit);
        assert_eq!(model.modus(), Modus::TABLE);
        assert!(!model.get_uidata().show_columns);
    }

    #[test]
    fn reset_needs_yes() {
        let mut model = model();
        send(&mut model, Message::DeleteRow);
        send(&mut model, Message::DeleteRow);
        send(&mut model, Message::Reset);
        type_line(&mut model, "n");
        assert_eq!(model.get_uidata().all_rows, 4);
        send(&mut model, Message::Reset);
        type_line(&mut model, "y");
        assert_eq!(model.get_uidata().all_rows, 5);
    }

    #[test]
    fn import_errors_leave_table_untouched() {
        let mut model = model();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/invalid.csv");
        model.import_file(&path);
        assert_eq!(model.modus(), Modus::POPUP);
        let popup = model.get_uidata().popup.clone().unwrap();
        assert!(popup.message.starts_with("Row 2: Invalid email format: kari at example.no"));
        assert_eq!(model.get_uidata().all_rows, 5);

        send(&mut model, Message::Exit);
        assert_eq!(model.modus(), Modus::TABLE);
        assert!(model.get_uidata().popup.is_none());
    }

    #[test]
    fn import_error_popup_scrolls_within_its_lines() {
        let mut model = model();
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/invalid.csv");
        model.import_file(&path);
        let scroll = |model: &Model| model.get_uidata().popup.as_ref().map(|p| p.scroll);
        assert_eq!(scroll(&model), Some(0));

        send(&mut model, Message::MoveUp);
        assert_eq!(scroll(&model), Some(0));
        for _ in 0..5 {
            send(&mut model, Message::MoveDown);
        }
        assert_eq!(scroll(&model), Some(2));
        send(&mut model, Message::MoveUp);
        assert_eq!(scroll(&model), Some(1));
        assert_eq!(model.modus(), Modus::POPUP);
    }

    #[test]
    fn import_and_export_through_command_line() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("out.csv");
        let mut model = model();
        send(&mut model, Message::Export);
        type_line(&mut model, export.to_str().unwrap());
        assert!(export.exists());

        let template = dir.path().join("template.csv");
        send(&mut model, Message::Template);
        type_line(&mut model, template.to_str().unwrap());

        send(&mut model, Message::Import);
        type_line(&mut model, template.to_str().unwrap());
        assert_eq!(model.get_uidata().all_rows, 18);
        assert_eq!(model.get_uidata().rows.len(), 10);
        assert_eq!(model.get_uidata().page_count, 2);
    }

    #[test]
    fn theme_is_carried_in_uidata() {
        let mut model = model();
        assert_eq!(model.get_uidata().theme, Theme::Dark);
        send(&mut model, Message::ToggleTheme);
        assert_eq!(model.get_uidata().theme, Theme::Light);
    }

    #[test]
    fn help_popup_returns_to_previous_mode() {
        let mut model = model();
        send(&mut model, Message::ManageColumns);
        send(&mut model, Message::Help);
        assert_eq!(model.modus(), Modus::POPUP);
        send(&mut model, Message::Exit);
        assert_eq!(model.modus(), Modus::COLUMNS);
    }

    #[test]
    fn expand_path_handles_home() {
        assert_eq!(expand_path(" data.csv "), PathBuf::from("data.csv"));
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_path("~/x.csv"), Path::new(&home).join("x.csv"));
        }
    }
}
