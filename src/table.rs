use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, trace, warn};

use crate::domain::TMError;

pub const PAGE_SIZE_OPTIONS: [usize; 4] = [5, 10, 25, 50];

/// A single attribute value of a row, borrowed from the row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Number(i64),
    Text(&'a str),
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
        }
    }
}

/// One record of the table. The core attributes are fixed fields, everything
/// else lives in `extra`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub id: String,
    pub name: String,
    pub email: String,
    pub age: i64,
    pub role: String,
    pub extra: BTreeMap<String, String>,
}

impl Row {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        age: i64,
        role: impl Into<String>,
    ) -> Self {
        Row {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            age,
            role: role.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<Value<'_>> {
        match key {
            "id" => Some(Value::Text(&self.id)),
            "name" => Some(Value::Text(&self.name)),
            "email" => Some(Value::Text(&self.email)),
            "age" => Some(Value::Number(self.age)),
            "role" => Some(Value::Text(&self.role)),
            other => self.extra.get(other).map(|v| Value::Text(v.as_str())),
        }
    }

    /// String form of an attribute, empty when the row has no such attribute.
    pub fn display(&self, key: &str) -> String {
        self.get(key).map(|v| v.to_string()).unwrap_or_default()
    }

    /// Writes one attribute from its string form. The id is immutable and an
    /// age that is not an integer is not stored. Returns whether the row changed.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match key {
            "id" => {
                warn!("Ignoring attempt to overwrite id of row {}", self.id);
                false
            }
            "name" => replace(&mut self.name, value),
            "email" => replace(&mut self.email, value),
            "role" => replace(&mut self.role, value),
            "age" => match value.trim().parse::<i64>() {
                Ok(age) => {
                    let changed = self.age != age;
                    self.age = age;
                    changed
                }
                Err(_) => {
                    warn!("Keeping age {} of row {}, \"{value}\" is not an integer", self.age, self.id);
                    false
                }
            },
            other => {
                let previous = self.extra.insert(other.to_string(), value.to_string());
                previous.as_deref() != Some(value)
            }
        }
    }
}

fn replace(field: &mut String, value: &str) -> bool {
    if field == value {
        return false;
    }
    *field = value.to_string();
    true
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnConfig {
    pub id: String,
    pub label: String,
    pub visible: bool,
    pub order: i64,
}

impl ColumnConfig {
    pub fn new(id: impl Into<String>, label: impl Into<String>, visible: bool, order: i64) -> Self {
        ColumnConfig {
            id: id.into(),
            label: label.into(),
            visible,
            order,
        }
    }
}

/// A column to be added; its order is assigned on insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewColumn {
    pub id: String,
    pub label: String,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub search: String,
    pub sort: Option<SortSpec>,
    pub page: usize,
    pub rows_per_page: usize,
    pub editing_row: Option<String>,
}

impl ViewState {
    fn new(rows_per_page: usize) -> Self {
        ViewState {
            search: String::new(),
            sort: None,
            page: 0,
            rows_per_page: rows_per_page.max(1),
            editing_row: None,
        }
    }
}

pub fn default_columns() -> Vec<ColumnConfig> {
    vec![
        ColumnConfig::new("name", "Name", true, 0),
        ColumnConfig::new("email", "Email", true, 1),
        ColumnConfig::new("age", "Age", true, 2),
        ColumnConfig::new("role", "Role", true, 3),
    ]
}

pub fn sample_rows() -> Vec<Row> {
    vec![
        Row::new("1", "John Doe", "john@example.com", 28, "Developer"),
        Row::new("2", "Jane Smith", "jane@example.com", 32, "Designer"),
        Row::new("3", "Bob Johnson", "bob@example.com", 45, "Manager"),
        Row::new("4", "Alice Williams", "alice@example.com", 25, "Developer"),
        Row::new("5", "Charlie Brown", "charlie@example.com", 38, "Analyst"),
    ]
}

/// Lowercases a user supplied column id and joins whitespace runs with `_`.
pub fn normalize_column_id(id: &str) -> String {
    id.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Moves the column at `from` to `to` and renumbers every column by its new
/// list position.
pub fn move_column(columns: &[ColumnConfig], from: usize, to: usize) -> Vec<ColumnConfig> {
    let mut items = columns.to_vec();
    if from >= items.len() || to >= items.len() {
        return items;
    }
    let column = items.remove(from);
    items.insert(to, column);
    for (idx, column) in items.iter_mut().enumerate() {
        column.order = idx as i64;
    }
    items
}

/// The table engine: rows, column configuration and view state. All mutation
/// goes through the methods below; the rendered slice comes from `derive`.
#[derive(Debug, Clone)]
pub struct TableState {
    pub(crate) rows: Vec<Row>,
    pub(crate) columns: Vec<ColumnConfig>,
    pub(crate) view: ViewState,
}

impl Default for TableState {
    fn default() -> Self {
        TableState::new(10)
    }
}

impl TableState {
    pub fn new(rows_per_page: usize) -> Self {
        TableState {
            rows: sample_rows(),
            columns: default_columns(),
            view: ViewState::new(rows_per_page),
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[ColumnConfig] {
        &self.columns
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn row(&self, id: &str) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn set_search_query(&mut self, text: impl Into<String>) {
        self.view.search = text.into();
        self.view.page = 0;
        trace!("Search set to \"{}\"", self.view.search);
    }

    pub fn set_sorting(&mut self, column: impl Into<String>, direction: SortDirection) {
        let column = column.into();
        trace!("Sorting by {column} {direction:?}");
        self.view.sort = Some(SortSpec { column, direction });
    }

    /// Sorts by `column`, reversing the direction when it already is the sort column.
    pub fn sort_by_column(&mut self, column: &str) {
        let direction = match &self.view.sort {
            Some(spec) if spec.column == column => spec.direction.reversed(),
            _ => SortDirection::Ascending,
        };
        self.set_sorting(column, direction);
    }

    pub fn set_page(&mut self, page: usize) {
        self.view.page = page;
    }

    /// A size of zero is treated as one.
    pub fn set_rows_per_page(&mut self, size: usize) {
        self.view.rows_per_page = size.max(1);
        self.view.page = 0;
    }

    pub fn add_row(&mut self, row: Row) -> Result<(), TMError> {
        if self.row(&row.id).is_some() {
            return Err(TMError::DuplicateRowId(row.id));
        }
        debug!("Adding row {}", row.id);
        self.rows.push(row);
        Ok(())
    }

    /// Merges `attributes` into the row with `id`. Unknown ids are ignored.
    pub fn update_row<'a, I>(&mut self, id: &str, attributes: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let Some(row) = self.rows.iter_mut().find(|r| r.id == id) else {
            trace!("update_row: no row with id {id}");
            return;
        };
        let changed = attributes
            .into_iter()
            .fold(0, |n, (key, value)| n + usize::from(row.set(key, value)));
        debug!("Updated {changed} attributes of row {id}");
    }

    pub fn delete_row(&mut self, id: &str) {
        let before = self.rows.len();
        self.rows.retain(|r| r.id != id);
        if self.rows.len() != before {
            debug!("Deleted row {id}");
            if self.view.editing_row.as_deref() == Some(id) {
                self.view.editing_row = None;
            }
        }
    }

    /// Bulk replacement, used by CSV import.
    pub fn replace_rows(&mut self, rows: Vec<Row>) {
        debug!("Replacing {} rows with {}", self.rows.len(), rows.len());
        self.rows = rows;
        self.view.page = 0;
        self.view.editing_row = None;
    }

    /// Appends a column with order one past the current maximum (or 0).
    pub fn add_column(&mut self, column: NewColumn) -> Result<(), TMError> {
        if column.id.trim().is_empty() {
            return Err(TMError::InvalidColumnId(column.id));
        }
        if self.columns.iter().any(|c| c.id == column.id) {
            return Err(TMError::DuplicateColumnId(column.id));
        }
        let order = self.columns.iter().map(|c| c.order).max().unwrap_or(-1) + 1;
        debug!("Adding column {} with order {order}", column.id);
        self.columns.push(ColumnConfig {
            id: column.id,
            label: column.label,
            visible: column.visible,
            order,
        });
        Ok(())
    }

    pub fn toggle_column_visibility(&mut self, id: &str) {
        if let Some(column) = self.columns.iter_mut().find(|c| c.id == id) {
            column.visible = !column.visible;
            trace!("Column {id} visible: {}", column.visible);
        }
    }

    /// Replaces the column list. Callers assign `order` to match positions.
    pub fn reorder_columns(&mut self, columns: Vec<ColumnConfig>) {
        self.columns = columns;
    }

    /// Enters edit mode for `id`, or leaves it with `None`. Entering fails
    /// while another row is being edited or when the row does not exist.
    pub fn set_editing_row(&mut self, id: Option<&str>) -> bool {
        match id {
            None => {
                self.view.editing_row = None;
                true
            }
            Some(id) => {
                let busy = self
                    .view
                    .editing_row
                    .as_deref()
                    .is_some_and(|current| current != id);
                if busy || self.row(id).is_none() {
                    return false;
                }
                self.view.editing_row = Some(id.to_string());
                true
            }
        }
    }

    pub fn reset(&mut self) {
        debug!("Resetting table to default data");
        self.rows = sample_rows();
        self.columns = default_columns();
        self.view.search.clear();
        self.view.sort = None;
        self.view.page = 0;
        self.view.editing_row = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_column(id: &str, label: &str) -> NewColumn {
        NewColumn {
            id: id.to_string(),
            label: label.to_string(),
            visible: true,
        }
    }

    #[test]
    fn search_resets_page() {
        let mut table = TableState::default();
        table.set_page(3);
        table.set_search_query("dev");
        assert_eq!(table.view().search, "dev");
        assert_eq!(table.view().page, 0);
    }

    #[test]
    fn sorting_keeps_page() {
        let mut table = TableState::default();
        table.set_page(2);
        table.set_sorting("age", SortDirection::Descending);
        assert_eq!(table.view().page, 2);
        assert_eq!(
            table.view().sort,
            Some(SortSpec {
                column: "age".into(),
                direction: SortDirection::Descending
            })
        );
    }

    #[test]
    fn sort_by_same_column_reverses() {
        let mut table = TableState::default();
        table.sort_by_column("name");
        assert_eq!(table.view().sort.as_ref().unwrap().direction, SortDirection::Ascending);
        table.sort_by_column("name");
        assert_eq!(table.view().sort.as_ref().unwrap().direction, SortDirection::Descending);
        table.sort_by_column("age");
        assert_eq!(table.view().sort.as_ref().unwrap().direction, SortDirection::Ascending);
    }

    #[test]
    fn page_size_change_resets_page() {
        let mut table = TableState::default();
        table.set_page(1);
        table.set_rows_per_page(25);
        assert_eq!(table.view().rows_per_page, 25);
        assert_eq!(table.view().page, 0);

        table.set_rows_per_page(0);
        assert_eq!(table.view().rows_per_page, 1);
    }

    #[test]
    fn add_row_rejects_duplicate_id() {
        let mut table = TableState::default();
        table.add_row(Row::new("6", "Dana", "dana@example.com", 30, "")).unwrap();
        assert_eq!(table.rows().len(), 6);

        let err = table.add_row(Row::new("6", "Eve", "eve@example.com", 31, ""));
        assert!(matches!(err, Err(TMError::DuplicateRowId(id)) if id == "6"));
        assert_eq!(table.rows().len(), 6);
    }

    #[test]
    fn update_row_merges_attributes() {
        let mut table = TableState::default();
        table.update_row("1", [("role", "Lead"), ("age", "29"), ("team", "Core")]);
        let row = table.row("1").unwrap();
        assert_eq!(row.role, "Lead");
        assert_eq!(row.age, 29);
        assert_eq!(row.name, "John Doe");
        assert_eq!(row.extra.get("team").map(String::as_str), Some("Core"));
    }

    #[test]
    fn update_row_keeps_id_and_bad_age() {
        let mut table = TableState::default();
        table.update_row("1", [("id", "99"), ("age", "old")]);
        let row = table.row("1").unwrap();
        assert_eq!(row.age, 28);
        assert!(table.row("99").is_none());
    }

    #[test]
    fn unknown_ids_are_noops() {
        let mut table = TableState::default();
        let before = table.clone();
        table.update_row("missing", [("name", "X")]);
        table.delete_row("missing");
        table.toggle_column_visibility("missing");
        assert_eq!(table.rows(), before.rows());
        assert_eq!(table.columns(), before.columns());
    }

    #[test]
    fn delete_row_clears_edit_mode() {
        let mut table = TableState::default();
        assert!(table.set_editing_row(Some("2")));
        table.delete_row("2");
        assert!(table.row("2").is_none());
        assert_eq!(table.view().editing_row, None);
    }

    #[test]
    fn only_one_row_in_edit_mode() {
        let mut table = TableState::default();
        assert!(table.set_editing_row(Some("1")));
        assert!(!table.set_editing_row(Some("2")));
        assert_eq!(table.view().editing_row.as_deref(), Some("1"));
        assert!(table.set_editing_row(None));
        assert!(table.set_editing_row(Some("2")));
        table.set_editing_row(None);
        assert!(!table.set_editing_row(Some("missing")));
    }

    #[test]
    fn add_column_assigns_next_order() {
        let mut table = TableState::default();
        table.add_column(new_column("dept", "Department")).unwrap();
        let column = table.columns().last().unwrap();
        assert_eq!(column.id, "dept");
        assert_eq!(column.order, 4);
        assert!(column.visible);
    }

    #[test]
    fn add_column_on_empty_list_starts_at_zero() {
        let mut table = TableState::default();
        table.reorder_columns(Vec::new());
        table.add_column(new_column("dept", "Department")).unwrap();
        assert_eq!(table.columns()[0].order, 0);
    }

    #[test]
    fn add_column_rejects_duplicates_and_blank_ids() {
        let mut table = TableState::default();
        assert!(matches!(
            table.add_column(new_column("email", "Mail")),
            Err(TMError::DuplicateColumnId(_))
        ));
        assert!(matches!(
            table.add_column(new_column("  ", "Blank")),
            Err(TMError::InvalidColumnId(_))
        ));
        assert_eq!(table.columns().len(), 4);
    }

    #[test]
    fn toggle_column_visibility_flips() {
        let mut table = TableState::default();
        table.toggle_column_visibility("age");
        assert!(!table.columns()[2].visible);
        table.toggle_column_visibility("age");
        assert!(table.columns()[2].visible);
    }

    #[test]
    fn move_column_renumbers_orders() {
        let moved = move_column(&default_columns(), 3, 0);
        let ids: Vec<_> = moved.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["role", "name", "email", "age"]);
        let orders: Vec<_> = moved.iter().map(|c| c.order).collect();
        assert_eq!(orders, [0, 1, 2, 3]);

        assert_eq!(move_column(&default_columns(), 7, 0), default_columns());
    }

    #[test]
    fn normalizes_column_ids() {
        assert_eq!(normalize_column_id("Home  Town"), "home_town");
        assert_eq!(normalize_column_id(" dept "), "dept");
    }

    #[test]
    fn reset_restores_defaults() {
        let mut table = TableState::default();
        table.delete_row("1");
        table.add_column(new_column("dept", "Department")).unwrap();
        table.set_search_query("x");
        table.set_sorting("age", SortDirection::Descending);
        table.set_page(4);
        table.reset();
        assert_eq!(table.rows(), sample_rows().as_slice());
        assert_eq!(table.columns(), default_columns().as_slice());
        assert_eq!(table.view().search, "");
        assert_eq!(table.view().sort, None);
        assert_eq!(table.view().page, 0);
    }

    #[test]
    fn replace_rows_resets_page_and_edit() {
        let mut table = TableState::default();
        table.set_editing_row(Some("1"));
        table.set_page(2);
        table.replace_rows(vec![Row::new("a", "A", "a@b.co", 1, "")]);
        assert_eq!(table.rows().len(), 1);
        assert_eq!(table.view().page, 0);
        assert_eq!(table.view().editing_row, None);
    }
}
