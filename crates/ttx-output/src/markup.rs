//! Legacy translation-table markup.
//!
//! The layout is line oriented: every line is tab indented and ends with
//! a newline, closed blocks are followed by a blank line, and the file ends
//! with a blank line after `</translation_table>`. Consumers diff old and
//! new files, so the layout must not drift.

use anyhow::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};

use ttx_model::{ExportRecord, VariableKind};

use crate::fields::{Fields, Node, record_fields};

const ROOT: &str = "translation_table";
const CDATA_END: &str = "]]>";

/// Serializes a record in the legacy markup layout.
pub fn to_markup(record: &ExportRecord) -> Result<Vec<u8>> {
    let fields = record_fields(record);
    let mut out = LineWriter::new();
    out.open(ROOT, 0)?;
    out.blank()?;
    for key in ["var", "varlab"] {
        if let Some(Node::Text(text)) = fields.get(key) {
            out.element(key, text, 1)?;
        }
    }
    out.blank()?;
    match record.kind {
        VariableKind::Integrated => write_integrated(&mut out, &fields)?,
        VariableKind::Source => write_source(&mut out, &fields)?,
    }
    out.close(ROOT, 0)?;
    out.blank()?;
    Ok(out.finish())
}

fn write_integrated(out: &mut LineWriter, fields: &Fields) -> Result<()> {
    for entry in blocks(fields, "universe") {
        out.open("univdisp", 1)?;
        for (key, node) in &entry.0 {
            match node {
                Node::Texts(samples) => {
                    for sample in samples {
                        out.element("samp", sample, 2)?;
                    }
                }
                _ => out.node(key, node, 2)?,
            }
        }
        out.close("univdisp", 1)?;
        out.blank()?;
    }
    write_codes(out, fields)?;
    for sample in blocks(fields, "samples") {
        out.open("sample", 1)?;
        for (key, node) in &sample.0 {
            match node {
                Node::Blocks(rows) if rows.is_empty() => {}
                Node::Blocks(rows) => {
                    out.blank()?;
                    for row in rows {
                        out.block(key, row, 2)?;
                    }
                }
                _ => out.node(key, node, 2)?,
            }
        }
        out.close("sample", 1)?;
        out.blank()?;
    }
    Ok(())
}

fn write_source(out: &mut LineWriter, fields: &Fields) -> Result<()> {
    out.open("univdisp", 1)?;
    for entry in blocks(fields, "universe") {
        for (key, node) in &entry.0 {
            out.node(key, node, 2)?;
        }
    }
    out.close("univdisp", 1)?;
    out.blank()?;
    write_codes(out, fields)?;
    if let Some(Node::Block(sample)) = fields.get("sample") {
        out.open("sample", 1)?;
        for (key, node) in &sample.0 {
            match node {
                Node::Block(inner) => out.block(key, inner, 2)?,
                Node::Blocks(rows) => {
                    for row in rows {
                        out.block(key, row, 2)?;
                    }
                }
                _ => out.node(key, node, 2)?,
            }
        }
        out.blank()?;
        out.close("sample", 1)?;
        out.blank()?;
    }
    Ok(())
}

fn write_codes(out: &mut LineWriter, fields: &Fields) -> Result<()> {
    for code in blocks(fields, "codes") {
        out.block("code", code, 1)?;
        out.blank()?;
    }
    Ok(())
}

fn blocks<'a>(fields: &'a Fields, key: &str) -> &'a [Fields] {
    match fields.get(key) {
        Some(Node::Blocks(blocks)) => blocks,
        _ => &[],
    }
}

struct LineWriter {
    xml: Writer<Vec<u8>>,
}

impl LineWriter {
    fn new() -> Self {
        Self {
            xml: Writer::new(Vec::new()),
        }
    }

    fn indent(&mut self, depth: usize) -> Result<()> {
        if depth > 0 {
            self.raw(&"\t".repeat(depth))?;
        }
        Ok(())
    }

    fn raw(&mut self, text: &str) -> Result<()> {
        self.xml
            .write_event(Event::Text(BytesText::from_escaped(text)))?;
        Ok(())
    }

    fn newline(&mut self) -> Result<()> {
        self.raw("\n")
    }

    fn blank(&mut self) -> Result<()> {
        self.newline()
    }

    fn open(&mut self, tag: &str, depth: usize) -> Result<()> {
        self.indent(depth)?;
        self.xml.write_event(Event::Start(BytesStart::new(tag)))?;
        self.newline()
    }

    fn close(&mut self, tag: &str, depth: usize) -> Result<()> {
        self.indent(depth)?;
        self.xml.write_event(Event::End(BytesEnd::new(tag)))?;
        self.newline()
    }

    /// `<tag>text</tag>` on one line. Text with `<` or `&` goes in CDATA.
    fn element(&mut self, tag: &str, text: &str, depth: usize) -> Result<()> {
        self.indent(depth)?;
        self.xml.write_event(Event::Start(BytesStart::new(tag)))?;
        if text.contains('<') || text.contains('&') {
            self.cdata(text)?;
        } else if !text.is_empty() {
            self.raw(text)?;
        }
        self.xml.write_event(Event::End(BytesEnd::new(tag)))?;
        self.newline()
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        let mut rest = text;
        while let Some(position) = rest.find(CDATA_END) {
            let (head, tail) = rest.split_at(position + 2);
            self.xml.write_event(Event::CData(BytesCData::new(head)))?;
            rest = tail;
        }
        self.xml.write_event(Event::CData(BytesCData::new(rest)))?;
        Ok(())
    }

    fn node(&mut self, tag: &str, node: &Node, depth: usize) -> Result<()> {
        match node {
            Node::Text(text) => self.element(tag, text, depth),
            Node::Texts(texts) => self.element(tag, &texts.join(" "), depth),
            Node::Block(fields) => self.block(tag, fields, depth),
            Node::Blocks(rows) => {
                for row in rows {
                    self.block(tag, row, depth)?;
                }
                Ok(())
            }
        }
    }

    /// An open tag, one line per field one level deeper, and a close tag.
    fn block(&mut self, tag: &str, fields: &Fields, depth: usize) -> Result<()> {
        self.open(tag, depth)?;
        for (key, node) in &fields.0 {
            self.node(key, node, depth + 1)?;
        }
        self.close(tag, depth)
    }

    fn finish(self) -> Vec<u8> {
        self.xml.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ttx_model::UniverseEntry;

    fn record(label: &str) -> ExportRecord {
        ExportRecord {
            variable_name: "AGE".into(),
            variable_label: label.into(),
            kind: VariableKind::Integrated,
            universe_entries: vec![],
            output_codes: vec![],
            sample_blocks: vec![],
        }
    }

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn empty_record_layout() {
        let markup = text(to_markup(&record("Age")).unwrap());
        assert_eq!(
            markup,
            "<translation_table>\n\n\t<var>AGE</var>\n\t<varlab>Age</varlab>\n\n</translation_table>\n\n"
        );
    }

    #[test]
    fn special_characters_use_cdata() {
        let markup = text(to_markup(&record("Age < 5 & over")).unwrap());
        assert!(markup.contains("\t<varlab><![CDATA[Age < 5 & over]]></varlab>\n"));

        let markup = text(to_markup(&record("Age > 5 \"years\"")).unwrap());
        assert!(markup.contains("\t<varlab>Age > 5 \"years\"</varlab>\n"));
    }

    #[test]
    fn cdata_terminator_is_split() {
        let markup = text(to_markup(&record("a<b]]>c")).unwrap());
        assert!(markup.contains("<varlab><![CDATA[a<b]]]]><![CDATA[>c]]></varlab>"));
    }

    #[test]
    fn empty_text_keeps_both_tags() {
        let mut record = record("");
        record.universe_entries = vec![UniverseEntry::new("[all]", "", vec![])];
        let markup = text(to_markup(&record).unwrap());
        assert!(markup.contains("\t<varlab></varlab>\n"));
        assert!(markup.contains("\t\t<univstatement></univstatement>\n"));
    }
}
