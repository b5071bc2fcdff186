//! Contacts loader for CSV files and spreadsheet workbooks.

use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result, bail};
use calamine::{Data, Reader, open_workbook_auto};
use courier::WorkItem;
use serde::{Deserialize, Serialize};

/// Header names of the three required columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Columns {
	pub name: String,
	pub identifier: String,
	pub message: String,
}

impl Default for Columns {
	fn default() -> Self {
		Self {
			name: "First Name".to_string(),
			identifier: "Mobile Phone".to_string(),
			message: "Message".to_string(),
		}
	}
}

/// Reads `path` into work items, in file order.
///
/// The reader is picked by extension: `.csv` as delimited text, `.xlsx`,
/// `.xlsm`, `.xls` and `.ods` as a workbook whose first sheet holds the rows.
pub fn load(path: &Path, columns: &Columns) -> Result<Vec<WorkItem>> {
	let extension = path
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase)
		.unwrap_or_default();

	let items = match extension.as_str() {
		"csv" => {
			let bytes = std::fs::read(path).with_context(|| format!("reading contacts file {}", path.display()))?;
			parse(&decode(&bytes), columns)
		}
		"xlsx" | "xlsm" | "xls" | "ods" => read_workbook(path, columns),
		_ => bail!(
			"unsupported contacts file {}; expected .csv, .xlsx, .xlsm, .xls or .ods",
			path.display()
		),
	}
	.with_context(|| format!("loading contacts from {}", path.display()))?;

	tracing::info!(target: "courier.contacts", path = %path.display(), contacts = items.len(), "contacts loaded");
	Ok(items)
}

/// UTF-8 (with or without BOM), falling back to Latin-1 for legacy spreadsheet exports.
fn decode(bytes: &[u8]) -> Cow<'_, str> {
	let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
	match std::str::from_utf8(bytes) {
		Ok(text) => Cow::Borrowed(text),
		Err(_) => {
			tracing::warn!(target: "courier.contacts", "contacts file is not UTF-8; reading as Latin-1");
			Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())
		}
	}
}

pub fn parse(text: &str, columns: &Columns) -> Result<Vec<WorkItem>> {
	let mut reader = csv::ReaderBuilder::new()
		.trim(csv::Trim::Headers)
		.flexible(true)
		.from_reader(text.as_bytes());

	let headers: Vec<String> = reader.headers().context("reading header row")?.iter().map(str::to_string).collect();
	let layout = Layout::locate(&headers, columns)?;

	let mut items = Vec::new();
	for (index, record) in reader.records().enumerate() {
		// Header is line 1.
		let line = index + 2;
		let record = record.with_context(|| format!("line {line}"))?;
		let fields: Vec<&str> = record.iter().collect();
		items.extend(layout.item(line, &fields)?);
	}
	finish(items)
}

fn read_workbook(path: &Path, columns: &Columns) -> Result<Vec<WorkItem>> {
	let mut workbook = open_workbook_auto(path).with_context(|| format!("opening workbook {}", path.display()))?;
	let range = workbook
		.worksheet_range_at(0)
		.context("workbook has no sheets")?
		.context("reading first sheet")?;

	let first_line = range.start().map_or(1, |(row, _)| row as usize + 1);
	let mut rows = range.rows();
	let headers: Vec<String> = rows
		.next()
		.context("contacts file has no rows")?
		.iter()
		.map(|cell| cell.to_string().trim().to_string())
		.collect();
	let layout = Layout::locate(&headers, columns)?;

	let mut items = Vec::new();
	for (index, row) in rows.enumerate() {
		let line = first_line + index + 1;
		let fields: Vec<String> = row.iter().map(cell_text).collect();
		items.extend(layout.item(line, &fields)?);
	}
	finish(items)
}

/// Cell contents as the operator typed them; whole-number floats lose the `.0`.
fn cell_text(cell: &Data) -> String {
	match cell {
		Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{}", *value as i64),
		other => other.to_string(),
	}
}

/// Column positions of the required fields within a header row.
struct Layout {
	name: usize,
	identifier: usize,
	message: usize,
}

impl Layout {
	fn locate(headers: &[String], columns: &Columns) -> Result<Self> {
		let position = |name: &str| headers.iter().position(|h| h == name);
		let wanted = [&columns.name, &columns.identifier, &columns.message];
		let missing: Vec<&str> = wanted
			.iter()
			.filter(|name| position(name.as_str()).is_none())
			.map(|name| name.as_str())
			.collect();
		if !missing.is_empty() {
			bail!("missing required columns: {}", missing.join(", "));
		}
		let [name, identifier, message] = wanted.map(|name| position(name.as_str()).unwrap_or_default());
		Ok(Self {
			name,
			identifier,
			message,
		})
	}

	/// Builds the item for one data row; `None` for a blank row.
	fn item<S: AsRef<str>>(&self, line: usize, fields: &[S]) -> Result<Option<WorkItem>> {
		if fields.iter().all(|f| f.as_ref().trim().is_empty()) {
			return Ok(None);
		}
		let field = |at: usize| fields.get(at).map_or("", |f| f.as_ref());

		let raw_identifier = field(self.identifier);
		let item = WorkItem::new(raw_identifier, field(self.name).trim(), field(self.message));
		if item.key.is_empty() {
			bail!("line {line}: {raw_identifier:?} is not a usable recipient identifier");
		}
		Ok(Some(item))
	}
}

fn finish(items: Vec<WorkItem>) -> Result<Vec<WorkItem>> {
	if items.is_empty() {
		bail!("contacts file has no rows");
	}
	Ok(items)
}
