//! Fixture builders shared by unit tests.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Build a DMARC aggregate report with one `<record>` per tuple of
/// `(source_ip, dkim, spf, disposition)`.
pub fn report_xml(rows: &[(&str, &str, &str, &str)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feedback>
  <report_metadata>
    <org_name>example.net</org_name>
    <report_id>1234567890</report_id>
    <date_range><begin>1700000000</begin><end>1700086399</end></date_range>
  </report_metadata>
  <policy_published>
    <domain>example.org</domain>
    <p>none</p>
  </policy_published>
"#,
    );

    for (source, dkim, spf, disposition) in rows {
        xml.push_str(&format!(
            r#"  <record>
    <row>
      <source_ip>{source}</source_ip>
      <count>1</count>
      <policy_evaluated>
        <disposition>{disposition}</disposition>
        <dkim>{dkim}</dkim>
        <spf>{spf}</spf>
      </policy_evaluated>
    </row>
    <identifiers><header_from>example.org</header_from></identifiers>
  </record>
"#
        ));
    }

    xml.push_str("</feedback>\n");
    xml
}

/// Write a zip container with the given `(entry name, contents)` pairs.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut writer = ZipWriter::new(file);
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

/// Write a single-member gzip file.
pub fn write_gzip(path: &Path, contents: &str) {
    let file = File::create(path).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(contents.as_bytes()).unwrap();
    encoder.finish().unwrap();
}
