//! Text extraction for uploaded files, dispatched on file type.

use std::io::Read;

use tracing::debug;

use super::IngestError;

/// Decompressed-size bound on the DOCX body entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// File extensions the upload path accepts.
pub const SUPPORTED_FILE_TYPES: [&str; 4] = ["txt", "md", "pdf", "docx"];

/// Whether the upload path can extract text from `file_type`.
pub fn is_supported(file_type: &str) -> bool {
    SUPPORTED_FILE_TYPES.contains(&file_type.to_ascii_lowercase().as_str())
}

/// Extract plain text from `bytes` according to `file_type`.
///
/// Unsupported extensions are rejected before any extraction attempt.
pub fn extract_file_text(bytes: &[u8], file_type: &str) -> Result<String, IngestError> {
    match file_type.to_ascii_lowercase().as_str() {
        // Undecodable byte sequences are dropped, not fatal.
        "txt" | "md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
        "pdf" => extract_pdf(bytes),
        "docx" => extract_docx(bytes),
        other => Err(IngestError::UnsupportedFileType(other.to_string())),
    }
}

/// Per-page PDF text, non-empty pages joined with a blank line.
fn extract_pdf(bytes: &[u8]) -> Result<String, IngestError> {
    let raw =
        pdf_extract::extract_text_from_mem(bytes).map_err(|err| IngestError::Pdf(err.to_string()))?;

    // pdf-extract separates pages with form feeds; a document without them
    // is treated as a single page.
    let pages: Vec<String> = raw
        .split('\u{c}')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .map(String::from)
        .collect();

    debug!(pages = pages.len(), "pdf extracted");
    Ok(pages.join("\n\n"))
}

/// Per-paragraph DOCX text, non-empty paragraphs joined with a blank line.
///
/// Reads `word/document.xml` out of the OOXML archive and collects the
/// `w:t` runs inside each `w:p` paragraph.
fn extract_docx(bytes: &[u8]) -> Result<String, IngestError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|err| IngestError::Docx(err.to_string()))?;

    let mut document_xml = Vec::new();
    {
        let entry = archive
            .by_name("word/document.xml")
            .map_err(|err| IngestError::Docx(err.to_string()))?;
        entry
            .take(MAX_XML_ENTRY_BYTES)
            .read_to_end(&mut document_xml)
            .map_err(|err| IngestError::Docx(err.to_string()))?;
    }
    if document_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(IngestError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }

    let mut reader = quick_xml::Reader::from_reader(document_xml.as_slice());
    reader.config_mut().trim_text(true);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(element)) => {
                if element.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(text)) =
                        reader.read_event_into(&mut buf)
                    {
                        current.push_str(text.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(element)) => {
                if element.local_name().as_ref() == b"p" {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(err) => return Err(IngestError::Docx(err.to_string())),
            _ => {}
        }
        buf.clear();
    }

    debug!(paragraphs = paragraphs.len(), "docx extracted");
    Ok(paragraphs.join("\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = zip::write::SimpleFileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn plain_text_decodes_lossily() {
        let bytes = b"hello \xff world";
        let text = extract_file_text(bytes, "txt").unwrap();
        assert!(text.starts_with("hello"));
        assert!(text.ends_with("world"));
    }

    #[test]
    fn unsupported_extension_is_rejected_up_front() {
        let err = extract_file_text(b"data", "exe").unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFileType(ft) if ft == "exe"));
        assert!(!is_supported("exe"));
        assert!(is_supported("PDF"));
    }

    #[test]
    fn corrupt_pdf_is_an_extraction_error() {
        let err = extract_file_text(b"not a pdf", "pdf").unwrap_err();
        assert!(matches!(err, IngestError::Pdf(_)));
    }

    #[test]
    fn corrupt_docx_is_an_extraction_error() {
        let err = extract_file_text(b"not a zip", "docx").unwrap_err();
        assert!(matches!(err, IngestError::Docx(_)));
    }

    #[test]
    fn docx_paragraphs_join_with_blank_lines_and_skip_empties() {
        let xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p></w:p>
                <w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;
        let text = extract_file_text(&docx_bytes(xml), "docx").unwrap();
        assert_eq!(text, "First paragraph.\n\nSecond paragraph.");
    }
}
