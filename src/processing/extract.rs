//! Per-format text extraction.
//!
//! Dispatches on the source key's file extension and yields chunk-ready text
//! fragments. Extraction failures are logged and collapse to an empty fragment
//! list; the processor treats that as "no content extracted".

use std::path::Path;

use super::chunking::chunk_text;

/// Lowercased file extension of a storage key, empty when there is none.
pub fn file_extension(source_key: &str) -> String {
    source_key
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Extract text fragments from the local copy of a document.
///
/// Plain-text formats are chunked; tabular files yield one fragment per row
/// without chunking. Unsupported extensions and extraction errors produce an
/// empty list.
pub fn extract_fragments(
    path: &Path,
    source_key: &str,
    chunk_size: usize,
    overlap: usize,
) -> Vec<String> {
    let extension = file_extension(source_key);
    match extension.as_str() {
        "txt" | "md" => extract_plain_text(path, chunk_size, overlap),
        "pdf" => extract_pdf(path, chunk_size, overlap),
        "docx" | "doc" => extract_word(path, chunk_size, overlap),
        "csv" => extract_csv(path),
        other => {
            tracing::warn!(source_key, extension = other, "Unsupported file type");
            Vec::new()
        }
    }
}

fn extract_plain_text(path: &Path, chunk_size: usize, overlap: usize) -> Vec<String> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "Failed to read text file");
            return Vec::new();
        }
    };
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        // Latin-1 maps every byte to the code point of the same value.
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    };
    chunk_text(&content, chunk_size, overlap)
}

fn extract_pdf(path: &Path, chunk_size: usize, overlap: usize) -> Vec<String> {
    match pdf_extract::extract_text_by_pages(path) {
        Ok(pages) => {
            let text = pages
                .iter()
                .map(|page| page.trim())
                .filter(|page| !page.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            chunk_text(&text, chunk_size, overlap)
        }
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "Failed to extract PDF content");
            Vec::new()
        }
    }
}

fn extract_word(path: &Path, chunk_size: usize, overlap: usize) -> Vec<String> {
    match extract_word_paragraphs(path) {
        Ok(paragraphs) => chunk_text(&paragraphs.join(" "), chunk_size, overlap),
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "Failed to extract Word content");
            Vec::new()
        }
    }
}

/// Read `word/document.xml` from the OOXML container and collect the text of
/// each non-empty paragraph (`w:p`, runs in `w:t` elements).
fn extract_word_paragraphs(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut document = String::new();
    {
        use std::io::Read;
        archive
            .by_name("word/document.xml")?
            .read_to_string(&mut document)?;
    }

    let mut reader = quick_xml::Reader::from_str(&document);
    reader.config_mut().trim_text(false);
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_text_run = false;
    loop {
        match reader.read_event()? {
            quick_xml::events::Event::Start(element) => match element.local_name().as_ref() {
                b"p" => current.clear(),
                b"t" => in_text_run = true,
                _ => {}
            },
            quick_xml::events::Event::Text(text) => {
                if in_text_run {
                    current.push_str(&text.unescape()?);
                }
            }
            quick_xml::events::Event::End(element) => match element.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if !current.trim().is_empty() {
                        paragraphs.push(current.trim().to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            quick_xml::events::Event::Eof => break,
            _ => {}
        }
    }
    Ok(paragraphs)
}

/// One fragment per row, keyed by the row's original 1-based line number.
/// Blank rows are skipped but keep their place in the numbering.
fn extract_csv(path: &Path) -> Vec<String> {
    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(err) => {
            tracing::error!(path = %path.display(), error = %err, "Failed to open CSV file");
            return Vec::new();
        }
    };

    let mut fragments = Vec::new();
    for result in reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                tracing::error!(path = %path.display(), error = %err, "Failed to parse CSV row");
                return Vec::new();
            }
        };
        let line = record.position().map_or(0, |pos| pos.line());
        let row_text = record
            .iter()
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .collect::<Vec<_>>()
            .join(" | ");
        if !row_text.is_empty() {
            fragments.push(format!("Row {line}: {row_text}"));
        }
    }
    fragments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("temp file");
        file.write_all(bytes).expect("write");
        file
    }

    #[test]
    fn extension_is_lowercased_and_taken_from_the_file_name() {
        assert_eq!(file_extension("docs/Report.PDF"), "pdf");
        assert_eq!(file_extension("a/b/c.tar.gz"), "gz");
        assert_eq!(file_extension("no-extension"), "");
    }

    #[test]
    fn plain_text_is_chunked() {
        let file = write_temp(".txt", b"  hello world  ");
        let fragments = extract_fragments(file.path(), "docs/a.txt", 1000, 200);
        assert_eq!(fragments, vec!["hello world"]);
    }

    #[test]
    fn non_utf8_text_falls_back_to_latin1() {
        // 0xE9 is 'e' with acute accent in Latin-1 and invalid as UTF-8.
        let file = write_temp(".txt", b"caf\xE9 au lait");
        let fragments = extract_fragments(file.path(), "docs/menu.txt", 1000, 200);
        assert_eq!(fragments, vec!["caf\u{e9} au lait"]);
    }

    #[test]
    fn csv_rows_become_fragments_with_original_line_numbers() {
        let file = write_temp(".csv", b"a,b\n\nc,d\n");
        let fragments = extract_fragments(file.path(), "docs/table.csv", 1000, 200);
        assert_eq!(fragments, vec!["Row 1: a | b", "Row 3: c | d"]);
    }

    #[test]
    fn csv_skips_empty_cells_within_a_row() {
        let file = write_temp(".csv", b"name,,city\n");
        let fragments = extract_fragments(file.path(), "docs/table.csv", 1000, 200);
        assert_eq!(fragments, vec!["Row 1: name | city"]);
    }

    #[test]
    fn word_paragraphs_are_joined_and_chunked() {
        let file = tempfile::Builder::new()
            .suffix(".docx")
            .tempfile()
            .expect("temp file");
        let mut archive = zip::ZipWriter::new(std::fs::File::create(file.path()).expect("create"));
        archive
            .start_file("word/document.xml", zip::write::SimpleFileOptions::default())
            .expect("start entry");
        archive
            .write_all(
                br#"<?xml version="1.0"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p>
    <w:p><w:r><w:t></w:t></w:r></w:p>
    <w:p><w:r><w:t>Second</w:t></w:r><w:r><w:t> paragraph.</w:t></w:r></w:p>
  </w:body>
</w:document>"#,
            )
            .expect("write entry");
        archive.finish().expect("finish");

        let fragments = extract_fragments(file.path(), "docs/notes.docx", 1000, 200);
        assert_eq!(fragments, vec!["First paragraph. Second paragraph."]);
    }

    #[test]
    fn unsupported_extension_yields_nothing() {
        let file = write_temp(".xyz", b"whatever");
        assert!(extract_fragments(file.path(), "docs/blob.xyz", 1000, 200).is_empty());
    }

    #[test]
    fn unreadable_file_yields_nothing() {
        let missing = std::path::Path::new("/nonexistent/gone.txt");
        assert!(extract_fragments(missing, "docs/gone.txt", 1000, 200).is_empty());
    }
}
