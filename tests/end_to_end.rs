use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use emx_xmlview::{Document, Exporter, Extractor, Format};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

fn xlsx_bytes() -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer.write_all(b"<?xml version=\"1.0\"?><Types/>").unwrap();
    writer.start_file("xl/workbook.xml", options).unwrap();
    writer.write_all(b"<?xml version=\"1.0\"?><workbook/>").unwrap();
    writer.finish().unwrap().into_inner()
}

fn pdf_bytes() -> Vec<u8> {
    let mut data = b"%PDF-1.5\n".to_vec();
    data.extend((0..200u8).map(|i| b'a' + i % 26));
    data
}

fn signed_document() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<wnio:Dokument xmlns:wnio="http://crd.gov.pl/wzor/2008/05/09/1/" xmlns:str="http://crd.gov.pl/xml/schematy/struktura/2009/11/16/" xmlns:ds="http://www.w3.org/2000/09/xmldsig#">
  <wnio:TrescDokumentu>
    <wnio:Informacja>Wniosek o wydanie zaświadczenia</wnio:Informacja>
    <wnio:Miasto>Gdańsk</wnio:Miasto>
    <str:Zalaczniki>
      <str:Zalacznik nazwaPliku="skan">{pdf}</str:Zalacznik>
      <str:Zalacznik>{pdf}</str:Zalacznik>
    </str:Zalaczniki>
  </wnio:TrescDokumentu>
  <ds:Signature>
    <ds:SignatureValue>{pdf}<ds:Inner>secret</ds:Inner></ds:SignatureValue>
    <ds:KeyInfo>
      <ds:X509Data>
        <ds:X509Certificate>{pdf}</ds:X509Certificate>
      </ds:X509Data>
    </ds:KeyInfo>
  </ds:Signature>
</wnio:Dokument>"#,
        pdf = STANDARD.encode(pdf_bytes())
    )
}

#[test]
fn test_heading_and_inherited_office_attachment() {
    let xml = format!(
        r#"<root><Info>Decision notice</Info><Zalacznik nazwaPliku="report">{}</Zalacznik></root>"#,
        STANDARD.encode(xlsx_bytes())
    );

    let document = Document::parse(&xml).unwrap();
    let result = Extractor::new().extract(&document);

    assert_eq!(result.attachments.len(), 1);
    assert_eq!(result.attachments[0].name, "report.xlsx");
    assert_eq!(result.attachments[0].format(), Some(Format::Xlsx));
    assert!(result.lines.contains(&"  ## Decision notice".to_string()));
}

#[test]
fn test_signed_document_skipping_signatures() {
    let document = Document::parse(&signed_document()).unwrap();
    let result = Extractor::new().extract(&document);

    assert_eq!(
        result.lines,
        vec![
            "    ## Wniosek o wydanie zaświadczenia",
            "    Miasto: Gdańsk",
            "      Zalacznik:",
            "        Attachment name: skan.pdf",
            "      Zalacznik:",
            "        Attachment name: attachment_2.pdf",
        ]
    );
    let names: Vec<&str> = result.attachments.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["skan.pdf", "attachment_2.pdf"]);
}

#[test]
fn test_signed_document_keeping_signatures() {
    let document = Document::parse(&signed_document()).unwrap();
    let result = Extractor::new().with_skip_signatures(false).extract(&document);

    assert_eq!(result.attachments.len(), 4);
    assert_eq!(result.attachments[2].name, "attachment_3.pdf");
    assert_eq!(result.attachments[3].name, "attachment_4.pdf");
    assert!(result.lines.contains(&"    SignatureValue:".to_string()));
    assert!(result.lines.contains(&"      Inner: secret".to_string()));
    assert!(result.lines.contains(&"        X509Certificate:".to_string()));
}

#[test]
fn test_extraction_is_deterministic() {
    let document = Document::parse(&signed_document()).unwrap();

    for skip in [true, false] {
        let extractor = Extractor::new().with_skip_signatures(skip);
        assert_eq!(extractor.extract(&document), extractor.extract(&document));
    }
}

#[test]
fn test_concurrent_extraction_of_shared_document() {
    let document = Document::parse(&signed_document()).unwrap();
    let extractor = Extractor::new();
    let expected = extractor.extract(&document);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| scope.spawn(|| extractor.extract(&document)))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn test_payload_with_surrounding_whitespace() {
    let encoded = STANDARD.encode(pdf_bytes());
    let xml = format!("<a>\n      {}\n    </a>", encoded);

    let document = Document::parse(&xml).unwrap();
    let result = Extractor::new().extract(&document);

    assert_eq!(result.attachments.len(), 1);
    assert_eq!(result.attachments[0].decode().unwrap(), pdf_bytes());
}

#[test]
fn test_text_split_by_comments() {
    let xml = format!(
        "<root><Zalacznik nazwaPliku=\"skan\"><!-- scan -->{}</Zalacznik><Miasto>Kra<!-- x -->kow</Miasto></root>",
        STANDARD.encode(pdf_bytes())
    );

    let document = Document::parse(&xml).unwrap();
    let result = Extractor::new().extract(&document);

    assert_eq!(result.attachments.len(), 1);
    assert_eq!(result.attachments[0].name, "skan.pdf");
    assert!(result.lines.contains(&"  Miasto: Krakow".to_string()));
}

#[test]
fn test_malformed_document_is_fatal() {
    assert!(Document::parse("<a><Zalacznik></a>").is_err());
    assert!(Document::from_bytes(b"not xml at all").is_err());
}

#[test]
fn test_extract_and_save() {
    let document = Document::parse(&signed_document()).unwrap();
    let result = Extractor::new().extract(&document);
    let dir = tempfile::tempdir().unwrap();

    let report = Exporter::new().save_all(&result.attachments, dir.path()).unwrap();

    assert!(report.is_complete());
    assert_eq!(report.saved.len(), 2);
    assert_eq!(std::fs::read(dir.path().join("skan.pdf")).unwrap(), pdf_bytes());
    assert_eq!(std::fs::read(dir.path().join("attachment_2.pdf")).unwrap(), pdf_bytes());
}
