//! Content-type resolution and text extraction.

use docqa_rag::{ContentType, DefaultTextExtractor, ErrorKind, RagError, TextExtractor};

#[test]
fn content_type_labels_resolve() {
    let cases = [
        ("application/pdf", ContentType::Pdf),
        ("PDF", ContentType::Pdf),
        ("text/plain; charset=utf-8", ContentType::Txt),
        (".txt", ContentType::Txt),
        ("text/csv", ContentType::Csv),
        ("application/csv", ContentType::Csv),
    ];
    for (label, expected) in cases {
        assert_eq!(label.parse::<ContentType>().unwrap(), expected, "{label}");
    }
}

#[test]
fn unknown_labels_are_unsupported() {
    for label in ["application/msword", "docx", ""] {
        let err = label.parse::<ContentType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat, "{label}");
    }
}

#[test]
fn content_type_from_filename() {
    assert_eq!(ContentType::from_filename("Q3 report.PDF").unwrap(), ContentType::Pdf);
    assert_eq!(ContentType::from_filename("notes.txt").unwrap(), ContentType::Txt);
    let err = ContentType::from_filename("README").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    assert_eq!(ContentType::Csv.mime(), "text/csv");
}

#[test]
fn plain_text_strips_byte_order_mark() {
    let raw = b"\xEF\xBB\xBFhello world";
    let text = DefaultTextExtractor.extract(raw, ContentType::Txt).unwrap();
    assert_eq!(text, "hello world");
}

#[test]
fn invalid_utf8_is_an_extraction_error() {
    let err = DefaultTextExtractor.extract(&[0xc3, 0x28], ContentType::Txt).unwrap_err();
    assert!(matches!(err, RagError::ExtractionError { ref format, .. } if format == "txt"));
}

#[test]
fn csv_rows_become_labelled_lines() {
    let raw = b"name,role\nAda,engineer\nGrace,admiral,extra\n";
    let text = DefaultTextExtractor.extract(raw, ContentType::Csv).unwrap();
    assert_eq!(text, "name: Ada\nrole: engineer\n\nname: Grace\nrole: admiral\nextra");
}

#[test]
fn csv_with_only_headers_is_empty() {
    let text = DefaultTextExtractor.extract(b"a,b,c\n", ContentType::Csv).unwrap();
    assert!(text.is_empty());
}

#[cfg(feature = "pdf")]
#[test]
fn malformed_pdf_is_an_extraction_error() {
    let err = DefaultTextExtractor.extract(b"not a pdf", ContentType::Pdf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExtractionError);
}

#[cfg(not(feature = "pdf"))]
#[test]
fn pdf_without_feature_is_unsupported() {
    let err = DefaultTextExtractor.extract(b"%PDF-1.4", ContentType::Pdf).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
}
