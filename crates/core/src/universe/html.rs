use scraper::{ElementRef, Html, Selector};

/// A `<table>` flattened into a header row and body rows of cell text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtmlTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HtmlTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .filter_map(move |row| row.get(idx).map(String::as_str))
    }
}

/// Parses every table of the document, in document order.
///
/// The header is the first row carrying `<th>` cells; body rows are the rows with `<td>` cells.
/// Rows belonging to nested tables are attributed to the innermost table only. A `colspan`
/// cell is repeated once per spanned column; `rowspan` is not expanded.
pub fn parse_tables(html: &str) -> Vec<HtmlTable> {
    let document = Html::parse_document(html);
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for table in document.select(&table_sel) {
        let mut parsed = HtmlTable::default();
        let mut have_header = false;

        for row in table.select(&row_sel) {
            if innermost_table(row).map(|t| t.id()) != Some(table.id()) {
                continue;
            }

            let cells: Vec<ElementRef> = row
                .select(&cell_sel)
                .filter(|c| c.parent().map(|p| p.id()) == Some(row.id()))
                .collect();
            let has_td = cells.iter().any(|c| c.value().name() == "td");

            if !have_header && !has_td && !cells.is_empty() {
                parsed.columns = spread(&cells, header_text);
                have_header = true;
                continue;
            }
            if has_td {
                parsed.rows.push(spread(&cells, cell_text));
            }
        }

        out.push(parsed);
    }

    out
}

const MAX_COLSPAN: usize = 64;

fn spread(cells: &[ElementRef<'_>], text: fn(ElementRef<'_>) -> String) -> Vec<String> {
    let mut out = Vec::with_capacity(cells.len());
    for cell in cells {
        let span = cell
            .value()
            .attr("colspan")
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(1)
            .clamp(1, MAX_COLSPAN);
        let value = text(*cell);
        out.extend(std::iter::repeat(value).take(span));
    }
    out
}

fn innermost_table(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|a| a.value().name() == "table")
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

// Wikipedia headers often carry footnote markers, e.g. "Symbol[3]".
fn header_text(cell: ElementRef<'_>) -> String {
    let text = cell_text(cell);
    match text.find('[') {
        Some(pos) if text.ends_with(']') => text[..pos].trim().to_string(),
        _ => text,
    }
}
