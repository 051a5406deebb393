//! Column-oriented in-memory table shared by the loader, the transformers and
//! the persistence gateway, plus plain-text rendering for console previews.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::data::Value;

/// Smallest integer width that losslessly holds a column's observed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
}

impl IntWidth {
    pub fn for_range(min: i64, max: i64) -> Self {
        let fits = |lo: i64, hi: i64| min >= lo && max <= hi;
        if fits(i8::MIN.into(), i8::MAX.into()) {
            IntWidth::I8
        } else if fits(i16::MIN.into(), i16::MAX.into()) {
            IntWidth::I16
        } else if fits(i32::MIN.into(), i32::MAX.into()) {
            IntWidth::I32
        } else {
            IntWidth::I64
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            IntWidth::I8 => 8,
            IntWidth::I16 => 16,
            IntWidth::I32 => 32,
            IntWidth::I64 => 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<Value>>,
    /// Set by type normalization when every non-null value is an integer.
    pub int_width: Option<IntWidth>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            values,
            int_width: None,
        }
    }

    pub fn non_null(&self) -> impl Iterator<Item = &Value> {
        self.values.iter().flatten()
    }
}

/// Ordered named columns of equal height.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    height: usize,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from a header row and data rows. Short rows are padded
    /// with nulls, surplus cells are ignored.
    pub fn from_rows(headers: &[String], rows: Vec<Vec<Option<Value>>>) -> Self {
        let height = rows.len();
        let mut columns = headers
            .iter()
            .map(|h| Column::new(h.clone(), Vec::with_capacity(height)))
            .collect::<Vec<_>>();
        for row in rows {
            let mut cells = row.into_iter();
            for column in &mut columns {
                column.values.push(cells.next().flatten());
            }
        }
        Self { columns, height }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn get(&self, name: &str, row: usize) -> Option<&Value> {
        self.column(name)?.values.get(row)?.as_ref()
    }

    /// Adds a column or replaces an existing one with the same name.
    ///
    /// Panics in debug builds when the height does not match.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<Value>>) {
        if self.columns.is_empty() {
            self.height = values.len();
        }
        debug_assert_eq!(values.len(), self.height, "column '{name}' height mismatch");
        match self.column_mut(name) {
            Some(existing) => {
                existing.values = values;
                existing.int_width = None;
            }
            None => self.columns.push(Column::new(name, values)),
        }
    }

    /// Renames `from` to `to`. A pre-existing `to` column is replaced.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.has_column(from);
        }
        let Some(idx) = self.index_of(from) else {
            return false;
        };
        if let Some(existing) = self.index_of(to) {
            let mut moved = self.columns.remove(idx);
            moved.name = to.to_string();
            let target = if existing > idx { existing - 1 } else { existing };
            self.columns[target] = moved;
        } else {
            self.columns[idx].name = to.to_string();
        }
        true
    }

    /// Keeps the named columns in the given order, silently skipping absent ones.
    pub fn select(&mut self, names: &[&str]) {
        let mut remaining = std::mem::take(&mut self.columns);
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            if let Some(pos) = remaining.iter().position(|c| c.name == *name) {
                selected.push(remaining.remove(pos));
            }
        }
        self.columns = selected;
        if self.columns.is_empty() {
            self.height = 0;
        }
    }

    /// Cells of one row in column order.
    pub fn row(&self, index: usize) -> Vec<Option<&Value>> {
        self.columns
            .iter()
            .map(|c| c.values.get(index).and_then(Option::as_ref))
            .collect()
    }

    /// Unions tables by column name in first-seen order. Rows from a table
    /// lacking a column receive nulls for it.
    pub fn concat(tables: Vec<Table>) -> Table {
        let mut order: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for table in &tables {
            for column in &table.columns {
                if !positions.contains_key(&column.name) {
                    positions.insert(column.name.clone(), order.len());
                    order.push(column.name.clone());
                }
            }
        }
        let total = tables.iter().map(Table::height).sum();
        let mut merged = order
            .iter()
            .map(|name| Column::new(name.clone(), Vec::with_capacity(total)))
            .collect::<Vec<_>>();
        for table in tables {
            let height = table.height;
            let mut seen = vec![false; merged.len()];
            for column in table.columns {
                if let Some(&pos) = positions.get(&column.name)
                    && !seen[pos]
                {
                    seen[pos] = true;
                    merged[pos].values.extend(column.values);
                }
            }
            for (pos, filled) in seen.iter().enumerate() {
                if !filled {
                    merged[pos].values.extend(std::iter::repeat_n(None, height));
                }
            }
        }
        Table {
            columns: merged,
            height: total,
        }
    }

    /// Renders the first `limit` rows as an aligned text table.
    pub fn preview(&self, limit: usize) -> String {
        let headers = self
            .columns
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>();
        let rows = (0..self.height.min(limit))
            .map(|idx| {
                self.row(idx)
                    .into_iter()
                    .map(|cell| cell.map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect::<Vec<Vec<String>>>();
        render_table(&headers, &rows)
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator_cells, &separator_widths));

    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (value, width) in values.iter().zip(widths) {
        let sanitized = sanitize_cell(value);
        let padding = width.saturating_sub(display_width(sanitized.as_ref()));
        let mut cell = sanitized.into_owned();
        cell.push_str(&" ".repeat(padding));
        cells.push(cell);
    }
    cells.join("  ").trim_end().to_string()
}

/// Terminal column count; Hangul and other wide glyphs occupy two cells.
fn display_width(value: &str) -> usize {
    value
        .chars()
        .map(|ch| match ch as u32 {
            0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF | 0xFF00..=0xFF60 => 2,
            _ => 1,
        })
        .sum()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Option<Value> {
        Some(Value::Text(s.to_string()))
    }

    #[test]
    fn concat_unions_columns_by_name() {
        let first = Table::from_rows(
            &["사번".into(), "이름".into()],
            vec![vec![Some(Value::Integer(1)), text("kim")]],
        );
        let second = Table::from_rows(
            &["사번".into(), "팀".into()],
            vec![
                vec![Some(Value::Integer(2)), text("ops")],
                vec![Some(Value::Integer(3)), None],
            ],
        );
        let merged = Table::concat(vec![first, second]);
        assert_eq!(merged.column_names(), vec!["사번", "이름", "팀"]);
        assert_eq!(merged.height(), 3);
        assert_eq!(merged.column("이름").unwrap().values, vec![text("kim"), None, None]);
        assert_eq!(merged.column("팀").unwrap().values, vec![None, text("ops"), None]);
    }

    #[test]
    fn rename_onto_existing_column_replaces_it() {
        let mut table = Table::from_rows(
            &["a".into(), "b".into()],
            vec![vec![text("1"), text("2")]],
        );
        assert!(table.rename("a", "b"));
        assert_eq!(table.column_names(), vec!["b"]);
        assert_eq!(table.get("b", 0), Some(&Value::Text("1".into())));
    }

    #[test]
    fn select_orders_and_drops_columns() {
        let mut table = Table::from_rows(
            &["a".into(), "b".into(), "c".into()],
            vec![vec![text("1"), text("2"), text("3")]],
        );
        table.select(&["c", "a", "missing"]);
        assert_eq!(table.column_names(), vec!["c", "a"]);
        assert_eq!(table.height(), 1);
    }

    #[test]
    fn int_width_picks_smallest_lossless_width() {
        assert_eq!(IntWidth::for_range(-5, 100), IntWidth::I8);
        assert_eq!(IntWidth::for_range(0, 70553), IntWidth::I32);
        assert_eq!(IntWidth::for_range(0, 20250815073015), IntWidth::I64);
    }

    #[test]
    fn render_table_pads_wide_characters() {
        let rendered = render_table(
            &["이름".to_string(), "id".to_string()],
            &[vec!["kim".to_string(), "7".to_string()]],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "이름  id");
        assert_eq!(lines[2], "kim   7");
    }
}
