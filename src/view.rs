use std::cmp::Ordering;

use rayon::prelude::*;
use tracing::trace;

use crate::table::{ColumnConfig, Row, SortDirection, SortSpec, TableState, Value};

/// The slice of the table that is actually rendered.
#[derive(Debug)]
pub struct DerivedView<'a> {
    pub columns: Vec<&'a ColumnConfig>,
    pub rows: Vec<&'a Row>,
    /// Number of rows that passed the search filter, over all pages.
    pub total_rows: usize,
    pub page: usize,
    pub rows_per_page: usize,
}

impl DerivedView<'_> {
    pub fn page_count(&self) -> usize {
        self.total_rows.div_ceil(self.rows_per_page.max(1))
    }

    pub fn first_row_number(&self) -> usize {
        self.page * self.rows_per_page + 1
    }
}

impl TableState {
    /// Computes visible columns, then filter, sort and paginate.
    pub fn derive(&self) -> DerivedView<'_> {
        let columns = visible_columns(&self.columns);
        let mut rows = filter_rows(&self.rows, &columns, &self.view.search);
        sort_rows(&mut rows, self.view.sort.as_ref());
        let total_rows = rows.len();
        let page = paginate(&rows, self.view.page, self.view.rows_per_page).to_vec();
        trace!(
            "Derived {} of {total_rows} rows on page {}",
            page.len(),
            self.view.page
        );
        DerivedView {
            columns,
            rows: page,
            total_rows,
            page: self.view.page,
            rows_per_page: self.view.rows_per_page,
        }
    }
}

/// Visible columns ordered by their `order` value.
pub fn visible_columns(columns: &[ColumnConfig]) -> Vec<&ColumnConfig> {
    let mut visible: Vec<&ColumnConfig> = columns.iter().filter(|c| c.visible).collect();
    visible.sort_by_key(|c| c.order);
    visible
}

/// Keeps rows where any visible column contains `query`, ignoring case.
/// Input order is preserved.
pub fn filter_rows<'a>(rows: &'a [Row], columns: &[&ColumnConfig], query: &str) -> Vec<&'a Row> {
    if query.is_empty() {
        return rows.iter().collect();
    }
    let needle = query.to_lowercase();
    rows.par_iter()
        .filter(|row| row_matches(row, columns, &needle))
        .collect()
}

fn row_matches(row: &Row, columns: &[&ColumnConfig], needle: &str) -> bool {
    columns.iter().any(|column| {
        row.get(&column.id)
            .is_some_and(|value| value.to_string().to_lowercase().contains(needle))
    })
}

/// Stable sort; rows with equal keys keep their relative order in both directions.
pub fn sort_rows(rows: &mut [&Row], sort: Option<&SortSpec>) {
    let Some(spec) = sort else {
        return;
    };
    rows.par_sort_by(|a, b| {
        let ordering = compare_values(a.get(&spec.column), b.get(&spec.column));
        match spec.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

/// Numbers compare numerically, anything else by its string form.
pub fn compare_values(a: Option<Value<'_>>, b: Option<Value<'_>>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a.cmp(&b),
        _ => compare_text(&text_of(a), &text_of(b)),
    }
}

fn text_of(value: Option<Value<'_>>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// Case-insensitive, so "apple" sorts before "Banana" and "Developer" ties with "developer".
fn compare_text(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase())
}

/// `[page * size, page * size + size)`, empty when the page lies past the end.
pub fn paginate<T>(items: &[T], page: usize, size: usize) -> &[T] {
    let size = size.max(1);
    let start = page.saturating_mul(size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(size).min(items.len());
    &items[start..end]
}
