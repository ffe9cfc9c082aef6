//! Example of flattening a document and listing its attachments

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use emx_xmlview::{summary_lines, Document, Extractor};

fn main() -> anyhow::Result<()> {
    println!("=== XML Attachment Example ===\n");

    // Simulated JPEG and PDF payloads
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
    jpeg.resize(120, 0);
    let mut pdf = b"%PDF-1.4\n".to_vec();
    pdf.resize(120, b' ');

    let xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Dokument xmlns:str="http://crd.gov.pl/xml/schematy/struktura/2009/11/16/">
  <Informacja>Wniosek o wydanie dowodu</Informacja>
  <Wnioskodawca>Jan Kowalski</Wnioskodawca>
  <Uwagi>Termin: 14 dni</Uwagi>
  <str:Zalaczniki>
    <str:Zalacznik nazwaPliku="zdjecie">{}</str:Zalacznik>
    <str:Zalacznik>{}</str:Zalacznik>
  </str:Zalaczniki>
  <SignatureValue>{}</SignatureValue>
</Dokument>"#,
        STANDARD.encode(&jpeg),
        STANDARD.encode(&pdf),
        STANDARD.encode(&pdf),
    );

    let document = Document::parse(&xml)?;

    for skip in [true, false] {
        let extraction = Extractor::new().with_skip_signatures(skip).extract(&document);

        println!("--- skip signatures: {} ---", skip);
        println!("{}", extraction.text());
        println!();
        for line in summary_lines(&extraction.attachments) {
            println!("  {}", line);
        }
        println!();
    }

    Ok(())
}
