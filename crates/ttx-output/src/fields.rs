//! Legacy field layout of an export record.
//!
//! The markup and structured serializers both walk these field lists, so
//! tag names, key order and value text are defined in one place.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use ttx_model::{ExportRecord, OutputCode, Recoding, SampleBlock, UniverseEntry, VariableKind};

/// One value in the legacy layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Node {
    Text(String),
    Texts(Vec<String>),
    Block(Fields),
    Blocks(Vec<Fields>),
}

/// Ordered key/value pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Fields(pub(crate) Vec<(&'static str, Node)>);

impl Fields {
    fn text(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.0.push((key, Node::Text(value.into())));
        self
    }

    fn node(&mut self, key: &'static str, node: Node) -> &mut Self {
        self.0.push((key, node));
        self
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Node> {
        self.0
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, node)| node)
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Text(text) => serializer.serialize_str(text),
            Node::Texts(texts) => texts.serialize(serializer),
            Node::Block(fields) => fields.serialize(serializer),
            Node::Blocks(blocks) => {
                let mut seq = serializer.serialize_seq(Some(blocks.len()))?;
                for block in blocks {
                    seq.serialize_element(block)?;
                }
                seq.end()
            }
        }
    }
}

impl Serialize for Fields {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, node) in &self.0 {
            map.serialize_entry(key, node)?;
        }
        map.end()
    }
}

pub(crate) fn flag(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Top-level layout: `var`, `varlab`, `universe`, `codes`, then
/// `samples` for integrated records or `sample` for source records.
pub(crate) fn record_fields(record: &ExportRecord) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("var", &record.variable_name)
        .text("varlab", &record.variable_label);
    match record.kind {
        VariableKind::Integrated => {
            fields
                .node(
                    "universe",
                    Node::Blocks(record.universe_entries.iter().map(universe_fields).collect()),
                )
                .node(
                    "codes",
                    Node::Blocks(record.output_codes.iter().map(code_fields).collect()),
                )
                .node(
                    "samples",
                    Node::Blocks(record.sample_blocks.iter().map(sample_fields).collect()),
                );
        }
        VariableKind::Source => {
            fields
                .node(
                    "universe",
                    Node::Blocks(
                        record
                            .universe_entries
                            .iter()
                            .map(source_universe_fields)
                            .collect(),
                    ),
                )
                .node(
                    "codes",
                    Node::Blocks(record.output_codes.iter().map(source_code_fields).collect()),
                );
            if let Some(block) = record.sample_blocks.first() {
                fields.node("sample", Node::Block(source_sample_fields(block)));
            }
        }
    }
    fields
}

fn universe_head(entry: &UniverseEntry) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("sampstatement", &entry.sample_statement)
        .text("univstatement", &entry.universe_statement)
        .text("makesampstatement", flag(entry.has_sample_list))
        .text("nosampstatement", flag(entry.no_sample_statement));
    fields
}

fn universe_fields(entry: &UniverseEntry) -> Fields {
    let mut fields = universe_head(entry);
    fields.node("samps", Node::Texts(entry.samples.clone()));
    fields
}

fn source_universe_fields(entry: &UniverseEntry) -> Fields {
    let mut fields = universe_head(entry);
    fields.text("samp", entry.samples.join(" "));
    fields
}

fn code_fields(code: &OutputCode) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("id", code.id.to_string())
        .text("targetcode", &code.target_code)
        .text("labelonly", flag(code.is_label_only))
        .text("label", &code.label)
        .text("indent", code.indent.to_string())
        .text("syntax", &code.syntax)
        .text("genlab", &code.generic_label)
        .text("indentgen", code.generic_indent.to_string())
        .text("codetype", &code.code_type)
        .text("missing", &code.missing_flag);
    fields
}

fn source_code_fields(code: &OutputCode) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("targetcode", &code.target_code)
        .text("labelonly", flag(code.is_label_only))
        .text("id", code.id.to_string())
        .text("label", &code.label)
        .text("indent", code.indent.to_string())
        .text("syntax", &code.syntax)
        .text("genlab", &code.generic_label)
        .text("missing", &code.missing_flag)
        .text("indentgen", code.generic_indent.to_string())
        .text("codetype", &code.code_type);
    fields
}

fn recode_fields(recoding: &Recoding) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("orig", &recoding.input_code)
        .text("targ", &recoding.output_code)
        .text("lab", &recoding.input_label)
        .text("freq", &recoding.frequency);
    fields
}

fn sample_fields(block: &SampleBlock) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("id", &block.sample_id)
        .text("rectype", &block.record_type)
        .text("norecode", flag(block.has_no_recode))
        .text("hide", flag(block.is_hidden));
    if let Some(restricted) = &block.restricted_flag {
        fields.text("restricted", restricted);
    }
    fields
        .text("svar", block.sourcing_text())
        .text("invar", &block.input_variable)
        .text("anchor_form", &block.anchor_form)
        .text("svar_doc", &block.source_doc)
        .text("anchor_inst", &block.anchor_instrument)
        .text("univ", &block.universe_text);
    let cols = block
        .column_ranges
        .iter()
        .map(|range| {
            let mut fields = Fields::default();
            fields.text("beg", &range.begin).text("end", &range.end);
            fields
        })
        .collect();
    fields.node("cols", Node::Blocks(cols));
    if let Some(recodings) = &block.recodings {
        fields.node(
            "recode",
            Node::Blocks(recodings.iter().map(recode_fields).collect()),
        );
    }
    fields
}

fn source_sample_fields(block: &SampleBlock) -> Fields {
    let mut fields = Fields::default();
    fields
        .text("id", &block.sample_id)
        .text("rectype", &block.record_type)
        .text("norecode", flag(block.has_no_recode))
        .text("univ", &block.universe_text);
    if let Some(restricted) = &block.restricted_flag {
        fields.text("restricted", restricted);
    }
    fields
        .text("svar", block.sourcing_text())
        .text("invar", &block.input_variable)
        .text("anchor_form", &block.anchor_form)
        .text("svar_doc", &block.source_doc)
        .text("anchor_inst", &block.anchor_instrument);
    let mut cols = Fields::default();
    if let Some(range) = block.column_ranges.first() {
        cols.text("beg", &range.begin).text("end", &range.end);
    }
    fields.node("cols", Node::Block(cols));
    if let Some(recodings) = &block.recodings {
        fields.node(
            "recode",
            Node::Blocks(recodings.iter().map(recode_fields).collect()),
        );
    }
    fields
}
