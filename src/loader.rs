//! Document loading.
//!
//! Extracts plain text from the supported input formats. Plain text and
//! Markdown are read as-is; DOCX is unzipped and its `w:t` runs pulled
//! out of `word/document.xml`; PDF goes through `pdf_extract`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::WeaveError;

/// Load a document's text by file extension (case-insensitive).
pub fn load(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        "docx" => extract_docx(path),
        "pdf" => extract_pdf(path),
        other => Err(WeaveError::UnsupportedFormat(other.to_string()).into()),
    }
}

/// A DOCX file is a zip archive; the document body lives in
/// `word/document.xml` with visible text inside `<w:t>` elements.
/// Paragraph ends (`</w:p>`) become newlines.
fn extract_docx(path: &Path) -> Result<String> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("{} is not a valid DOCX archive", path.display()))?;

    let mut document_xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("DOCX archive has no word/document.xml")?
        .read_to_string(&mut document_xml)
        .context("failed to read word/document.xml")?;

    let mut reader = Reader::from_str(&document_xml);
    let mut text = String::new();
    let mut in_text_run = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"w:t" => in_text_run = true,
            Ok(Event::End(ref e)) => match e.name().as_ref() {
                b"w:t" => in_text_run = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                text.push_str(&e.unescape().context("invalid XML text run")?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(e).context("failed to parse word/document.xml"),
        }
    }

    Ok(text)
}

fn extract_pdf(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    pdf_extract::extract_text_from_mem(&bytes)
        .with_context(|| format!("failed to extract text from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_plain_text() {
        let mut f = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        f.write_all(b"hello from a file").unwrap();
        assert_eq!(load(f.path()).unwrap(), "hello from a file");
    }

    #[test]
    fn loads_markdown() {
        let mut f = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        f.write_all(b"# Heading\n\nBody.").unwrap();
        assert!(load(f.path()).unwrap().starts_with("# Heading"));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let mut f = tempfile::Builder::new().suffix(".TXT").tempfile().unwrap();
        f.write_all(b"upper case extension").unwrap();
        assert_eq!(load(f.path()).unwrap(), "upper case extension");
    }

    #[test]
    fn unsupported_extension_is_typed_error() {
        let f = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        let err = load(f.path()).unwrap_err();
        match err.downcast_ref::<WeaveError>() {
            Some(WeaveError::UnsupportedFormat(ext)) => assert_eq!(ext, "csv"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn invalid_docx_bytes_error() {
        let mut f = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
        f.write_all(b"this is not a zip archive").unwrap();
        assert!(load(f.path()).is_err());
    }

    #[test]
    fn docx_text_runs_are_extracted() {
        let document_xml = r#"<?xml version="1.0"?>
            <w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
              <w:body>
                <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
                <w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph.</w:t></w:r></w:p>
              </w:body>
            </w:document>"#;

        let f = tempfile::Builder::new().suffix(".docx").tempfile().unwrap();
        {
            let mut archive = zip::ZipWriter::new(f.as_file());
            archive
                .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
                .unwrap();
            archive.write_all(document_xml.as_bytes()).unwrap();
            archive.finish().unwrap();
        }

        let text = load(f.path()).unwrap();
        assert!(text.contains("First paragraph."));
        assert!(text.contains("Second paragraph."));
        assert_eq!(text.lines().count(), 2);
    }
}
