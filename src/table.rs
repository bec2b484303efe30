// src/table.rs

use std::collections::BTreeMap;

use crate::error::FetchError;

/// A flat table pulled out of a response body: ordered columns plus string cells.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub type Record = BTreeMap<String, String>;

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Table { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row)?.get(index).map(String::as_str)
    }

    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a str> + 'a {
        let index = self.column_index(column);
        self.rows
            .iter()
            .filter_map(move |row| index.and_then(|i| row.get(i)).map(String::as_str))
    }

    pub fn record(&self, row: usize) -> Option<Record> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect(),
        )
    }

    pub fn records(&self) -> Vec<Record> {
        (0..self.rows.len()).filter_map(|row| self.record(row)).collect()
    }

    /// Turns the first data row into the header, for pages that render headings as `<td>`.
    pub fn promote_first_row(mut self) -> Self {
        if !self.rows.is_empty() {
            self.columns = self.rows.remove(0);
        }
        self
    }

    /// Keeps only the rows whose `column` value satisfies `keep`.
    pub fn retain_rows<F>(&mut self, column: &str, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        if let Some(index) = self.column_index(column) {
            self.rows
                .retain(|row| row.get(index).map(|value| keep(value)).unwrap_or(false));
        }
    }
}

/// Black-box conversion of a raw body into the tables it contains, in document order.
pub trait TableExtractor: Send + Sync {
    fn extract(&self, body: &[u8]) -> Result<Vec<Table>, FetchError>;
}

/// Maps logical table roles to the positional index a given source renders them at.
#[derive(Clone, Debug, Default)]
pub struct TableLayout {
    roles: Vec<(&'static str, usize)>,
}

impl TableLayout {
    pub fn new(roles: &[(&'static str, usize)]) -> Self {
        TableLayout { roles: roles.to_vec() }
    }

    pub fn index_of(&self, role: &str) -> Option<usize> {
        self.roles
            .iter()
            .find(|(name, _)| *name == role)
            .map(|(_, index)| *index)
    }

    pub fn has(&self, role: &str) -> bool {
        self.index_of(role).is_some()
    }

    /// Pulls the table playing `role` out of an extracted page.
    pub fn take(&self, tables: &mut Vec<Table>, role: &str) -> Result<Table, FetchError> {
        let index = self.index_of(role).ok_or_else(|| FetchError::MissingTable {
            role: role.to_string(),
            index: usize::MAX,
            found: tables.len(),
        })?;
        match tables.get_mut(index) {
            Some(table) => Ok(std::mem::take(table)),
            None => Err(FetchError::MissingTable {
                role: role.to_string(),
                index,
                found: tables.len(),
            }),
        }
    }
}

/// Naive tag scanner for the server-rendered tables the vendor pages emit.
///
/// Handles nested tables by skipping them while reading the outer table's rows.
/// A first row made only of `<th>` cells becomes the header; otherwise columns are
/// named by position. Blank header cells are named `#<position>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlTableExtractor;

impl TableExtractor for HtmlTableExtractor {
    fn extract(&self, body: &[u8]) -> Result<Vec<Table>, FetchError> {
        let html = String::from_utf8_lossy(body);
        let lower = to_lower(&html);
        let mut tables = Vec::new();
        let mut from = 0;
        while let Some(start) = find_tag(&lower, "table", from) {
            let Some(end) = matching_close(&lower, "table", start) else {
                break;
            };
            tables.push(parse_table(&html, &lower, start, end));
            // nested tables are reported on their own, after their parent
            from = start + "<table".len();
        }
        Ok(tables)
    }
}

fn parse_table(html: &str, lower: &str, start: usize, end: usize) -> Table {
    let Some(open_end) = html[start..end].find('>').map(|i| start + i + 1) else {
        return Table::default();
    };
    let inner_end = end - "</table>".len();
    let (flat_html, flat_lower) = without_nested(html, lower, open_end, inner_end);

    let mut raw_rows: Vec<(bool, Vec<String>)> = Vec::new();
    let limit = flat_lower.len();
    let mut cursor = 0;
    while let Some(row) = find_tag(&flat_lower, "tr", cursor) {
        let row_end = row_end(&flat_lower, row, limit);
        raw_rows.push(parse_row(&flat_html, &flat_lower, row, row_end));
        cursor = row_end.max(row + 3);
    }

    let mut rows = raw_rows.into_iter().filter(|(_, cells)| !cells.is_empty());
    match rows.next() {
        None => Table::default(),
        Some((true, header)) => {
            let columns = header
                .into_iter()
                .enumerate()
                .map(|(i, name)| if name.is_empty() { format!("#{}", i) } else { name })
                .collect::<Vec<_>>();
            let rows = rows.map(|(_, cells)| pad(cells, columns.len())).collect();
            Table::new(columns, rows)
        }
        Some((false, first)) => {
            let mut body = vec![first];
            body.extend(rows.map(|(_, cells)| cells));
            let width = body.iter().map(Vec::len).max().unwrap_or(0);
            let columns = (0..width).map(|i| i.to_string()).collect();
            let rows = body.into_iter().map(|cells| pad(cells, width)).collect();
            Table::new(columns, rows)
        }
    }
}

/// Copies `from..to` leaving out any nested `<table>` blocks.
fn without_nested(html: &str, lower: &str, from: usize, to: usize) -> (String, String) {
    let mut flat_html = String::with_capacity(to.saturating_sub(from));
    let mut flat_lower = String::with_capacity(to.saturating_sub(from));
    let mut cursor = from;
    while let Some(nested) = find_tag(lower, "table", cursor).filter(|i| *i < to) {
        flat_html.push_str(&html[cursor..nested]);
        flat_lower.push_str(&lower[cursor..nested]);
        cursor = matching_close(lower, "table", nested).unwrap_or(to).min(to);
    }
    flat_html.push_str(&html[cursor..to]);
    flat_lower.push_str(&lower[cursor..to]);
    (flat_html, flat_lower)
}

fn pad(mut cells: Vec<String>, width: usize) -> Vec<String> {
    cells.resize(width, String::new());
    cells
}

fn row_end(lower: &str, row: usize, limit: usize) -> usize {
    let close = lower[row..limit].find("</tr").map(|i| row + i);
    let next_open = find_tag(lower, "tr", row + 3).filter(|i| *i < limit);
    match (close, next_open) {
        (Some(c), Some(n)) if n < c => n,
        (Some(c), _) => c + lower[c..].find('>').map(|i| i + 1).unwrap_or(0),
        (None, Some(n)) => n,
        (None, None) => limit,
    }
}

fn parse_row(html: &str, lower: &str, start: usize, end: usize) -> (bool, Vec<String>) {
    let mut cells = Vec::new();
    let mut all_header = true;
    let mut cursor = start;
    loop {
        let th = find_tag(lower, "th", cursor).filter(|i| *i < end);
        let td = find_tag(lower, "td", cursor).filter(|i| *i < end);
        let (tag, open) = match (th, td) {
            (Some(h), Some(d)) if h < d => ("th", h),
            (_, Some(d)) => ("td", d),
            (Some(h), None) => ("th", h),
            (None, None) => break,
        };
        let Some(content_start) = html[open..end].find('>').map(|i| open + i + 1) else {
            break;
        };
        let close_pattern = format!("</{}", tag);
        let content_end = lower[content_start..end]
            .find(&close_pattern)
            .or_else(|| next_cell(lower, content_start, end).map(|i| i - content_start))
            .map(|i| content_start + i)
            .unwrap_or(end);
        all_header &= tag == "th";
        cells.push(clean_cell(&html[content_start..content_end]));
        cursor = content_end;
    }
    (all_header && !cells.is_empty(), cells)
}

fn next_cell(lower: &str, from: usize, end: usize) -> Option<usize> {
    let th = find_tag(lower, "th", from).filter(|i| *i < end);
    let td = find_tag(lower, "td", from).filter(|i| *i < end);
    match (th, td) {
        (Some(h), Some(d)) => Some(h.min(d)),
        (h, d) => h.or(d),
    }
}

/// Position of the next `<tag` whose name is not merely a prefix (`<th` vs `<thead`).
fn find_tag(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let pattern = format!("<{}", tag);
    let mut cursor = from;
    while let Some(rel) = lower.get(cursor..)?.find(&pattern) {
        let at = cursor + rel;
        let after = lower.as_bytes().get(at + pattern.len()).copied();
        match after {
            Some(b'>') | Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'/') | None => {
                return Some(at)
            }
            _ => cursor = at + pattern.len(),
        }
    }
    None
}

/// End (exclusive) of the `</tag>` balancing the `<tag` at `start`.
fn matching_close(lower: &str, tag: &str, start: usize) -> Option<usize> {
    let close = format!("</{}>", tag);
    let mut depth = 0usize;
    let mut cursor = start;
    loop {
        let open = find_tag(lower, tag, cursor);
        let shut = lower.get(cursor..)?.find(&close).map(|i| cursor + i)?;
        match open {
            Some(o) if o < shut => {
                depth += 1;
                cursor = o + tag.len() + 1;
            }
            _ => {
                depth = depth.saturating_sub(1);
                cursor = shut + close.len();
                if depth == 0 {
                    return Some(cursor);
                }
            }
        }
    }
}

fn clean_cell(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len());
    let mut in_tag = false;
    for ch in raw.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    let decoded = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn to_lower(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii() { c.to_ascii_lowercase() } else { c })
        .collect()
}

/// Parses a displayed number such as `$1,250.50`, `(3.5)` or `4.125%`.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    let negative = trimmed.starts_with('(') && trimmed.ends_with(')');
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '(' | ')' | ' '))
        .collect();
    let value = digits.parse::<f64>().ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body>
        <TABLE class="grid">
          <thead><tr><th></th><th>Maturity</th><th>Estimated Total</th></tr></thead>
          <tbody>
            <tr><td><a href="#">912797LJ4</a></td><td>06/27/2024</td><td>$1,000.00</td></tr>
            <tr><td>912797LD7</td><td>07/25/2024</td><td>&nbsp;2,500&amp;</td></tr>
          </tbody>
        </TABLE>
        <table><tr><td>Outer</td><td><table><tr><td>inner</td></tr></table></td></tr>
        <tr><td>second</td><td>row</td></tr></table>
        </body></html>"##;

    #[test]
    fn header_row_and_blank_header_naming() {
        let tables = HtmlTableExtractor.extract(PAGE.as_bytes()).unwrap();
        let grid = &tables[0];
        assert_eq!(grid.columns, vec!["#0", "Maturity", "Estimated Total"]);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.cell(0, "#0"), Some("912797LJ4"));
        assert_eq!(grid.cell(1, "Estimated Total"), Some("2,500&"));
    }

    #[test]
    fn nested_tables_are_listed_after_their_parent() {
        let tables = HtmlTableExtractor.extract(PAGE.as_bytes()).unwrap();
        assert_eq!(tables.len(), 3);
        assert_eq!(tables[1].columns, vec!["0", "1"]);
        assert_eq!(tables[1].rows[0][0], "Outer");
        assert_eq!(tables[1].rows[1], vec!["second", "row"]);
        assert_eq!(tables[2].rows, vec![vec!["inner".to_string()]]);
    }

    #[test]
    fn layout_take_reports_missing_index() {
        let layout = TableLayout::new(&[("quotes", 0), ("otr", 5)]);
        let mut tables = vec![Table::default()];
        assert!(layout.take(&mut tables, "quotes").is_ok());
        match layout.take(&mut tables, "otr") {
            Err(FetchError::MissingTable { index, found, .. }) => {
                assert_eq!(index, 5);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn displayed_numbers() {
        assert_eq!(parse_number("$1,250.50"), Some(1250.5));
        assert_eq!(parse_number("(3.5)"), Some(-3.5));
        assert_eq!(parse_number("4.125%"), Some(4.125));
        assert_eq!(parse_number("--"), None);
    }
}
