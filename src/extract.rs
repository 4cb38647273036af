//! Text extraction for binary document formats (PDF, OOXML).
//!
//! Loaders hand over raw bytes; this module returns plain UTF-8 text. PDFs
//! are extracted per page so callers can attach page numbers. Failures are
//! reported as [`ExtractError`] and never panic; the loader skips the file.

use std::io::{Cursor, Read};
use thiserror::Error;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

fn ooxml_err(e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Ooxml(e.to_string())
}

/// Text recovered from a PDF.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfText {
    /// One entry per page, in page order.
    Pages(Vec<String>),
    /// The page tree could not be read; whole-document text only.
    Whole(String),
}

/// Extract PDF text per page, falling back to whole-document extraction.
pub fn extract_pdf(bytes: &[u8]) -> Result<PdfText, ExtractError> {
    match pdf_pages_by_tree(bytes) {
        Ok(pages) if !pages.is_empty() => Ok(PdfText::Pages(pages)),
        _ => pdf_extract::extract_text_from_mem(bytes)
            .map(PdfText::Whole)
            .map_err(|e| ExtractError::Pdf(e.to_string())),
    }
}

/// Per-page text via the page tree. A page whose text cannot be decoded
/// is kept as an empty page; if no page decodes at all this fails.
fn pdf_pages_by_tree(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let mut pages = Vec::new();
    let mut decoded = 0usize;
    let mut last_err = None;
    for page_no in doc.get_pages().keys() {
        match doc.extract_text(&[*page_no]) {
            Ok(text) => {
                decoded += 1;
                pages.push(text);
            }
            Err(e) => {
                last_err = Some(e.to_string());
                pages.push(String::new());
            }
        }
    }
    if decoded == 0 {
        if let Some(e) = last_err {
            return Err(ExtractError::Pdf(e));
        }
    }
    Ok(pages)
}

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(ooxml_err)
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, ExtractError> {
    let entry = archive.by_name(name).map_err(ooxml_err)?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(ooxml_err)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, MAX_XML_ENTRY_BYTES
        )));
    }
    Ok(out)
}

/// Entries named `{prefix}{n}.xml`, ordered by `n`.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Concatenate the text of every `<t>` element (any namespace prefix).
fn text_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) if e.local_name().as_ref() == b"t" => {
                if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf) {
                    out.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(quick_xml::events::Event::End(e)) if e.local_name().as_ref() == b"p" => {
                out.push('\n');
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry_bounded(&mut archive, "word/document.xml")?;
    text_elements(&xml)
}

pub fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let mut out = String::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let xml = read_entry_bounded(&mut archive, &name)?;
        let text = text_elements(&xml)?;
        if !out.is_empty() && !text.is_empty() {
            out.push('\n');
        }
        out.push_str(&text);
    }
    Ok(out)
}

pub fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared = read_shared_strings(&mut archive)?;
    let mut rows = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        let xml = read_entry_bounded(&mut archive, &name)?;
        rows.extend(sheet_rows(&xml, &shared)?);
    }
    Ok(rows.join("\n"))
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    // Workbooks with only numeric cells have no shared-string table
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_entry_bounded(archive, "xl/sharedStrings.xml")?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        if let Some(s) = current.as_mut() {
                            s.push_str(te.unescape().unwrap_or_default().as_ref());
                        }
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::End(e)) if e.local_name().as_ref() == b"si" => {
                strings.extend(current.take());
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// One line per row, cells joined by tabs. Inline numbers are kept as-is.
fn sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut in_value = false;
    let mut shared_cell = false;
    let mut cells = 0usize;
    loop {
        if cells >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" => in_value = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(te)) if in_value => {
                let v = te.unescape().unwrap_or_default();
                let v = v.trim();
                if shared_cell {
                    if let Some(s) = v.parse::<usize>().ok().and_then(|i| shared.get(i)) {
                        row.push(s.clone());
                    }
                } else if !v.is_empty() {
                    row.push(v.to_string());
                }
                cells += 1;
                in_value = false;
            }
            Ok(quick_xml::events::Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"c" => shared_cell = false,
                b"row" => {
                    if !row.is_empty() {
                        rows.push(row.join("\t"));
                        row.clear();
                    }
                }
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ooxml_err(e)),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row.join("\t"));
    }
    Ok(rows)
}
