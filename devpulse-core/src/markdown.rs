//! Markdown building blocks and fixed-width table rendering.
//!
//! Block-level helpers return strings; sibling blocks are joined with a blank
//! line by [`lines`], which is what separates paragraphs in the output.

const ELLIPSIS: char = '…';

/// Join blocks with a blank line between each.
pub fn lines<I>(blocks: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let blocks: Vec<I::Item> = blocks.into_iter().collect();
    let parts: Vec<&str> = blocks.iter().map(AsRef::as_ref).collect();
    parts.join("\n\n")
}

/// Heading of `level` (clamped to 1..=6) followed by its content blocks.
pub fn heading<I>(level: u8, title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let hashes = "#".repeat(usize::from(level.clamp(1, 6)));
    let mut blocks = vec![format!("{hashes} {title}")];
    blocks.extend(contents.into_iter().map(|block| block.as_ref().to_string()));
    lines(blocks)
}

/// Level 1 heading with contents.
pub fn h1<I>(title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    heading(1, title, contents)
}

/// Level 2 heading with contents.
pub fn h2<I>(title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    heading(2, title, contents)
}

/// Level 3 heading with contents.
pub fn h3<I>(title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    heading(3, title, contents)
}

/// Level 4 heading with contents.
pub fn h4<I>(title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    heading(4, title, contents)
}

/// Level 5 heading with contents.
pub fn h5<I>(title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    heading(5, title, contents)
}

/// Level 6 heading with contents.
pub fn h6<I>(title: &str, contents: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    heading(6, title, contents)
}

/// Inline link; the URL doubles as the text when no title is given.
pub fn link(url: &str, title: Option<&str>) -> String {
    format!("[{}]({url})", title.unwrap_or(url))
}

/// Emphasised text.
pub fn italics(contents: &str) -> String {
    format!("*{contents}*")
}

/// Strong text.
pub fn bold(contents: &str) -> String {
    format!("**{contents}**")
}

/// Struck-through text.
pub fn strikethrough(contents: &str) -> String {
    format!("~~{contents}~~")
}

/// Inline code span.
pub fn code(contents: &str) -> String {
    format!("`{contents}`")
}

/// Fenced code block with an optional language tag.
pub fn code_block(contents: &str, language: Option<&str>) -> String {
    format!("```{}\n{contents}\n```", language.unwrap_or_default())
}

/// Quote each fragment, prefixing every line with `> `.
pub fn block_quote<I>(fragments: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    lines(fragments.into_iter().map(|fragment| {
        fragment
            .as_ref()
            .split('\n')
            .map(|line| format!("> {line}"))
            .collect::<Vec<_>>()
            .join("\n")
    }))
}

/// Bulleted list, one block per item.
pub fn unordered_list<I>(items: I) -> String
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    lines(items.into_iter().map(|item| format!("- {}", item.as_ref())))
}

/// Shorten `text` to at most `limit` characters, marking the cut with `…`.
///
/// Text shorter than `limit` is returned unchanged.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() < limit {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(limit.saturating_sub(1)).collect();
    truncated.push(ELLIPSIS);
    truncated
}

/// A row that can be looked up by field name.
pub trait TableRow {
    /// Text of the named field, or `None` if the row has no such field.
    fn field(&self, name: &str) -> Option<String>;
}

impl TableRow for serde_json::Value {
    fn field(&self, name: &str) -> Option<String> {
        match self.get(name)? {
            serde_json::Value::String(text) => Some(text.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }
}

/// How a table column obtains its label and cell text.
pub enum Column<'a, T> {
    /// Field looked up by name; the name is also the label.
    Field(&'a str),
    /// Cell text computed from the row.
    Mapped {
        /// Header label.
        label: &'a str,
        /// Row-to-cell mapping.
        map: Box<dyn Fn(&T) -> String + 'a>,
    },
    /// Field looked up by name, shown under a different label.
    Renamed {
        /// Header label.
        label: &'a str,
        /// Field name on the row.
        field: &'a str,
    },
}

impl<'a, T> Column<'a, T> {
    /// Column showing the named field under its own name.
    pub fn field(name: &'a str) -> Self {
        Self::Field(name)
    }

    /// Column computed by `map`.
    pub fn mapped(label: &'a str, map: impl Fn(&T) -> String + 'a) -> Self {
        Self::Mapped {
            label,
            map: Box::new(map),
        }
    }

    /// Column showing `field` under `label`.
    pub fn renamed(label: &'a str, field: &'a str) -> Self {
        Self::Renamed { label, field }
    }
}

struct RenderedColumn<'a> {
    label: &'a str,
    cells: Vec<String>,
    width: usize,
}

fn render_column<'c, T: TableRow>(column: &'c Column<'_, T>, rows: &[T]) -> RenderedColumn<'c> {
    let (label, cells): (&'c str, Vec<String>) = match column {
        Column::Field(name) => (*name, lookup_cells(rows, name)),
        Column::Renamed { label, field } => (*label, lookup_cells(rows, field)),
        Column::Mapped { label, map } => (*label, rows.iter().map(|row| map(row)).collect()),
    };
    let width = cells
        .iter()
        .map(|cell| cell.chars().count())
        .chain(std::iter::once(label.chars().count()))
        .max()
        .unwrap_or(0);
    RenderedColumn {
        label,
        cells,
        width,
    }
}

fn lookup_cells<T: TableRow>(rows: &[T], name: &str) -> Vec<String> {
    rows.iter()
        .map(|row| row.field(name).unwrap_or_default())
        .collect()
}

fn table_line<'c>(cells: impl Iterator<Item = (&'c str, usize)>) -> String {
    let padded: Vec<String> = cells
        .map(|(text, width)| format!("{text:<width$}"))
        .collect();
    format!("| {} |", padded.join(" | "))
}

/// Render `rows` as a padded markdown table.
///
/// Every column is as wide as its longest cell or label. Rows are emitted in
/// the order given; missing fields render as empty cells.
pub fn table<T: TableRow>(columns: &[Column<'_, T>], rows: &[T]) -> String {
    let rendered: Vec<RenderedColumn<'_>> = columns
        .iter()
        .map(|column| render_column(column, rows))
        .collect();
    let dashes: Vec<String> = rendered
        .iter()
        .map(|column| "-".repeat(column.width))
        .collect();

    let mut output = Vec::with_capacity(rows.len() + 2);
    output.push(table_line(
        rendered.iter().map(|column| (column.label, column.width)),
    ));
    output.push(table_line(
        dashes
            .iter()
            .zip(&rendered)
            .map(|(dash, column)| (dash.as_str(), column.width)),
    ));
    for index in 0..rows.len() {
        output.push(table_line(
            rendered
                .iter()
                .map(|column| (column.cells[index].as_str(), column.width)),
        ));
    }
    output.join("\n")
}
