//! Minimal `.docx` reader: body paragraphs with their style names, top-level tables and
//! section count.
//!
//! Only `word/document.xml` and `word/styles.xml` are read. Paragraphs inside tables belong to
//! their cell rather than the body. Text boxes and nested tables are skipped.

use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use zip::ZipArchive;
use zip::result::ZipError;

use super::ConvertError;

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub text: String,
    /// Display name of the paragraph style, `Normal` when none is set
    pub style: String,
}

impl Paragraph {
    /// Outline level of a heading paragraph: the style name with `Heading ` removed.
    pub fn heading_level(&self) -> Option<String> {
        self.style
            .contains("Heading")
            .then(|| self.style.replace("Heading ", ""))
    }
}

/// Rows of cell text, with merged cells repeated across the cells they cover.
pub type TableRows = Vec<Vec<String>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordDocument {
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<TableRows>,
    pub sections: usize,
}

/// Structure summary reported for uploaded Word documents.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct DocumentInfo {
    pub paragraphs: usize,
    pub tables: usize,
    pub sections: usize,
    pub total_chars: usize,
    pub total_words: usize,
}

impl WordDocument {
    pub fn open(path: &Path) -> Result<Self, ConvertError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, ConvertError> {
        let mut archive = ZipArchive::new(reader)?;
        let body = read_entry(&mut archive, "word/document.xml")?.ok_or(ConvertError::MissingPart("word/document.xml"))?;
        let styles = match read_entry(&mut archive, "word/styles.xml")? {
            Some(xml) => parse_styles(&xml)?,
            None => HashMap::new(),
        };
        parse_body(&body, &styles)
    }

    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            paragraphs: self.paragraphs.len(),
            tables: self.tables.len(),
            sections: self.sections,
            total_chars: self.paragraphs.iter().map(|p| p.text.chars().count()).sum(),
            total_words: self.paragraphs.iter().map(|p| p.text.split_whitespace().count()).sum(),
        }
    }
}

pub fn inspect_document(path: &Path) -> Result<DocumentInfo, ConvertError> {
    Ok(WordDocument::open(path)?.info())
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Option<String>, ConvertError> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut xml = String::new();
            entry.read_to_string(&mut xml)?;
            Ok(Some(xml))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn get_attr(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Map style ids to display names from `word/styles.xml`.
///
/// Built-in styles are stored lowercase (`heading 1`, `title`); these are capitalised the way
/// Word shows them.
fn parse_styles(xml: &str) -> Result<HashMap<String, String>, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut styles = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:style" => {
                current = get_attr(&e, b"w:styleId");
            }
            Event::End(e) if e.name().as_ref() == b"w:style" => {
                current = None;
            }
            Event::Empty(e) if e.name().as_ref() == b"w:name" => {
                if let (Some(id), Some(name)) = (current.as_ref(), get_attr(&e, b"w:val")) {
                    styles.insert(id.clone(), display_style_name(&name));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(styles)
}

fn display_style_name(name: &str) -> String {
    const BUILT_IN: &[&str] = &["heading ", "title", "subtitle", "caption", "header", "footer"];
    if BUILT_IN.iter().any(|prefix| name.starts_with(prefix)) {
        let mut chars = name.chars();
        chars
            .next()
            .map(|c| c.to_ascii_uppercase().to_string() + chars.as_str())
            .unwrap_or_default()
    } else {
        name.to_string()
    }
}

/// Style name for a paragraph whose `w:pStyle` is `style_id`.
///
/// Falls back to the raw id, turning `HeadingN` into `Heading N` so documents without a
/// styles part still expose their outline.
fn resolve_style(style_id: Option<&str>, styles: &HashMap<String, String>) -> String {
    let Some(id) = style_id else {
        return "Normal".to_string();
    };
    if let Some(name) = styles.get(id) {
        return name.clone();
    }
    match id.strip_prefix("Heading") {
        Some(level) if !level.is_empty() && level.chars().all(|c| c.is_ascii_digit()) => format!("Heading {level}"),
        _ => id.to_string(),
    }
}

#[derive(Default)]
struct CellBuilder {
    paragraphs: Vec<String>,
    span: usize,
    continues_merge: bool,
}

#[derive(Default)]
struct TableBuilder {
    rows: TableRows,
    row: Vec<String>,
    cell: Option<CellBuilder>,
}

impl TableBuilder {
    fn finish_cell(&mut self) {
        let Some(cell) = self.cell.take() else { return };
        let text = if cell.continues_merge {
            // vertical merge: repeat whatever the cell above holds
            self.rows
                .last()
                .and_then(|above| above.get(self.row.len()))
                .cloned()
                .unwrap_or_default()
        } else {
            cell.paragraphs.join("\n").trim().to_string()
        };
        for _ in 0..cell.span.max(1) {
            self.row.push(text.clone());
        }
    }
}

struct ParagraphBuilder {
    text: String,
    style_id: Option<String>,
}

/// Walk `word/document.xml` collecting top-level paragraphs and tables.
pub(crate) fn parse_body(xml: &str, styles: &HashMap<String, String>) -> Result<WordDocument, ConvertError> {
    let mut reader = Reader::from_str(xml);
    let mut doc = WordDocument::default();

    let mut table_depth = 0usize;
    let mut skip_depth = 0usize;
    let mut in_text = false;
    let mut paragraph: Option<ParagraphBuilder> = None;
    let mut table: Option<TableBuilder> = None;

    loop {
        let event = reader.read_event()?;

        if skip_depth > 0 {
            match &event {
                Event::Start(e) if e.name().as_ref() == b"w:txbxContent" => skip_depth += 1,
                Event::End(e) if e.name().as_ref() == b"w:txbxContent" => skip_depth -= 1,
                Event::Eof => break,
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(e) => match e.name().as_ref() {
                b"w:txbxContent" => skip_depth += 1,
                b"w:tbl" => {
                    table_depth += 1;
                    if table_depth == 1 {
                        table = Some(TableBuilder::default());
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        t.row.clear();
                    }
                }
                b"w:tc" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        t.cell = Some(CellBuilder {
                            span: 1,
                            ..Default::default()
                        });
                    }
                }
                b"w:p" => {
                    if paragraph.is_none() {
                        paragraph = Some(ParagraphBuilder {
                            text: String::new(),
                            style_id: None,
                        });
                    }
                }
                b"w:t" => in_text = true,
                b"w:vMerge" if table_depth == 1 => mark_merge(&e, &mut table),
                b"w:sectPr" if table_depth == 0 => doc.sections += 1,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:p" => {
                    paragraph = Some(ParagraphBuilder {
                        text: String::new(),
                        style_id: None,
                    });
                    finish_paragraph(&mut paragraph, &mut table, table_depth, &mut doc, styles);
                }
                b"w:pStyle" => {
                    if let Some(p) = paragraph.as_mut() {
                        p.style_id = get_attr(&e, b"w:val");
                    }
                }
                // tab stops in w:tabs carry w:val, tabs inside runs do not
                b"w:tab" if get_attr(&e, b"w:val").is_none() => {
                    if let Some(p) = paragraph.as_mut() {
                        p.text.push('\t');
                    }
                }
                b"w:br" | b"w:cr" => {
                    let kind = get_attr(&e, b"w:type");
                    if !matches!(kind.as_deref(), Some("page") | Some("column"))
                        && let Some(p) = paragraph.as_mut()
                    {
                        p.text.push('\n');
                    }
                }
                b"w:gridSpan" if table_depth == 1 => {
                    let span = get_attr(&e, b"w:val").and_then(|v| v.parse::<usize>().ok());
                    if let (Some(span), Some(cell)) = (span, table.as_mut().and_then(|t| t.cell.as_mut())) {
                        cell.span = span;
                    }
                }
                b"w:vMerge" if table_depth == 1 => mark_merge(&e, &mut table),
                b"w:sectPr" if table_depth == 0 => doc.sections += 1,
                _ => {}
            },
            Event::Text(t) if in_text => {
                if let Some(p) = paragraph.as_mut() {
                    p.text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => finish_paragraph(&mut paragraph, &mut table, table_depth, &mut doc, styles),
                b"w:tc" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        t.finish_cell();
                    }
                }
                b"w:tr" if table_depth == 1 => {
                    if let Some(t) = table.as_mut() {
                        let row = std::mem::take(&mut t.row);
                        t.rows.push(row);
                    }
                }
                b"w:tbl" => {
                    if table_depth == 1
                        && let Some(t) = table.take()
                    {
                        doc.tables.push(t.rows);
                    }
                    table_depth = table_depth.saturating_sub(1);
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(doc)
}

fn finish_paragraph(
    paragraph: &mut Option<ParagraphBuilder>,
    table: &mut Option<TableBuilder>,
    table_depth: usize,
    doc: &mut WordDocument,
    styles: &HashMap<String, String>,
) {
    let Some(p) = paragraph.take() else { return };
    match table_depth {
        0 => doc.paragraphs.push(Paragraph {
            style: resolve_style(p.style_id.as_deref(), styles),
            text: p.text,
        }),
        1 => {
            if let Some(cell) = table.as_mut().and_then(|t| t.cell.as_mut()) {
                cell.paragraphs.push(p.text);
            }
        }
        // paragraphs of nested tables are not collected
        _ => {}
    }
}

fn mark_merge(e: &BytesStart, table: &mut Option<TableBuilder>) {
    let continues = !matches!(get_attr(e, b"w:val").as_deref(), Some("restart"));
    if let Some(cell) = table.as_mut().and_then(|t| t.cell.as_mut()) {
        cell.continues_merge = continues;
    }
}
