//! The output container: named typed columns in input order.

use serde::Serialize;

use crate::column::Column;

/// A materialized table. Column order matches the input; row `i` of every
/// column corresponds to input data row `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub(crate) fn new(names: Vec<String>, columns: Vec<Column>) -> Table {
        debug_assert_eq!(names.len(), columns.len());
        Table { names, columns }
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, Column::len)
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_by_name(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .and_then(|i| self.columns.get(i))
    }
}
