//! Layout tests for the markup and structured serializers.

use ttx_model::{
    ColumnRange, ExportRecord, OutputCode, Recoding, SampleBlock, UniverseEntry, VariableKind,
};
use ttx_output::{to_markup, to_structured};

fn code(id: u32, target: &str, label: &str, indent: u32) -> OutputCode {
    OutputCode {
        id,
        target_code: target.to_string(),
        is_label_only: target.is_empty(),
        label: label.to_string(),
        indent,
        generic_label: label.to_string(),
        generic_indent: indent,
        syntax: String::new(),
        code_type: "n".to_string(),
        missing_flag: String::new(),
    }
}

fn householder(output: &str) -> Recoding {
    Recoding {
        input_code: "01".to_string(),
        output_code: output.to_string(),
        input_label: "Householder".to_string(),
        frequency: "1000".to_string(),
    }
}

fn block(sample: &str) -> SampleBlock {
    SampleBlock {
        sample_id: sample.to_string(),
        record_type: "P".to_string(),
        has_no_recode: false,
        is_hidden: false,
        restricted_flag: None,
        source_variable_ids: vec![],
        source_fallback: String::new(),
        input_variable: String::new(),
        anchor_form: String::new(),
        source_doc: String::new(),
        anchor_instrument: String::new(),
        universe_text: "All persons".to_string(),
        column_ranges: vec![],
        recodings: None,
    }
}

fn integrated() -> ExportRecord {
    let mut recoded = block("us2000a");
    recoded.source_variable_ids = vec!["US2000A_1020".to_string()];
    recoded.column_ranges = vec![ColumnRange::new("101", "102")];
    recoded.recodings = Some(vec![householder("0101")]);

    let mut plain = block("us2001a");
    plain.has_no_recode = true;
    plain.is_hidden = true;
    plain.source_fallback = "RELATE from census".to_string();
    plain.universe_text = "UNKNOWN!".to_string();

    let mut head = code(2, "0101", "Head & spouse", 1);
    head.syntax = "RELATE < 2".to_string();

    ExportRecord {
        variable_name: "RELATE".to_string(),
        variable_label: "Relationship to household head".to_string(),
        kind: VariableKind::Integrated,
        universe_entries: vec![UniverseEntry::new(
            "[list]",
            "All persons",
            vec!["us2000a".to_string(), "us2001a".to_string()],
        )],
        output_codes: vec![code(1, "", "Head", 0), head],
        sample_blocks: vec![recoded, plain],
    }
}

fn source() -> ExportRecord {
    let mut sample = block("us2000a");
    sample.record_type = "0".to_string();
    sample.source_variable_ids = vec!["US2000A_1020".to_string()];
    sample.column_ranges = vec![ColumnRange::new("101", "102")];
    sample.recodings = Some(vec![householder("01")]);

    let mut householder_code = code(1, "01", "Householder", 0);
    householder_code.generic_label = String::new();

    ExportRecord {
        variable_name: "US2000A_1020".to_string(),
        variable_label: "Relationship".to_string(),
        kind: VariableKind::Source,
        universe_entries: vec![UniverseEntry::new(
            "[list]",
            "All persons",
            vec!["us2000a".to_string()],
        )],
        output_codes: vec![householder_code],
        sample_blocks: vec![sample],
    }
}

fn markup(record: &ExportRecord) -> String {
    String::from_utf8(to_markup(record).unwrap()).unwrap()
}

#[test]
fn integrated_markup_layout() {
    let markup = markup(&integrated());
    assert!(markup.ends_with("</translation_table>\n\n"));
    insta::assert_snapshot!(markup, @r"<translation_table>

	<var>RELATE</var>
	<varlab>Relationship to household head</varlab>

	<univdisp>
		<sampstatement>[list]</sampstatement>
		<univstatement>All persons</univstatement>
		<makesampstatement>1</makesampstatement>
		<nosampstatement>0</nosampstatement>
		<samp>us2000a</samp>
		<samp>us2001a</samp>
	</univdisp>

	<code>
		<id>1</id>
		<targetcode></targetcode>
		<labelonly>1</labelonly>
		<label>Head</label>
		<indent>0</indent>
		<syntax></syntax>
		<genlab>Head</genlab>
		<indentgen>0</indentgen>
		<codetype>n</codetype>
		<missing></missing>
	</code>

	<code>
		<id>2</id>
		<targetcode>0101</targetcode>
		<labelonly>0</labelonly>
		<label><![CDATA[Head & spouse]]></label>
		<indent>1</indent>
		<syntax><![CDATA[RELATE < 2]]></syntax>
		<genlab><![CDATA[Head & spouse]]></genlab>
		<indentgen>1</indentgen>
		<codetype>n</codetype>
		<missing></missing>
	</code>

	<sample>
		<id>us2000a</id>
		<rectype>P</rectype>
		<norecode>0</norecode>
		<hide>0</hide>
		<svar>US2000A_1020</svar>
		<invar></invar>
		<anchor_form></anchor_form>
		<svar_doc></svar_doc>
		<anchor_inst></anchor_inst>
		<univ>All persons</univ>

		<cols>
			<beg>101</beg>
			<end>102</end>
		</cols>

		<recode>
			<orig>01</orig>
			<targ>0101</targ>
			<lab>Householder</lab>
			<freq>1000</freq>
		</recode>
	</sample>

	<sample>
		<id>us2001a</id>
		<rectype>P</rectype>
		<norecode>1</norecode>
		<hide>1</hide>
		<svar>RELATE from census</svar>
		<invar></invar>
		<anchor_form></anchor_form>
		<svar_doc></svar_doc>
		<anchor_inst></anchor_inst>
		<univ>UNKNOWN!</univ>
	</sample>

</translation_table>");
}

#[test]
fn source_markup_layout() {
    let markup = markup(&source());
    assert!(markup.contains("\t\t</recode>\n\n\t</sample>\n\n</translation_table>\n\n"));
    insta::assert_snapshot!(markup, @r"<translation_table>

	<var>US2000A_1020</var>
	<varlab>Relationship</varlab>

	<univdisp>
		<sampstatement>[list]</sampstatement>
		<univstatement>All persons</univstatement>
		<makesampstatement>1</makesampstatement>
		<nosampstatement>0</nosampstatement>
		<samp>us2000a</samp>
	</univdisp>

	<code>
		<targetcode>01</targetcode>
		<labelonly>0</labelonly>
		<id>1</id>
		<label>Householder</label>
		<indent>0</indent>
		<syntax></syntax>
		<genlab></genlab>
		<missing></missing>
		<indentgen>0</indentgen>
		<codetype>n</codetype>
	</code>

	<sample>
		<id>us2000a</id>
		<rectype>0</rectype>
		<norecode>0</norecode>
		<univ>All persons</univ>
		<svar>US2000A_1020</svar>
		<invar></invar>
		<anchor_form></anchor_form>
		<svar_doc></svar_doc>
		<anchor_inst></anchor_inst>
		<cols>
			<beg>101</beg>
			<end>102</end>
		</cols>
		<recode>
			<orig>01</orig>
			<targ>01</targ>
			<lab>Householder</lab>
			<freq>1000</freq>
		</recode>

	</sample>

</translation_table>");
}

#[test]
fn source_structured_layout() {
    let json = String::from_utf8(to_structured(&source()).unwrap()).unwrap();
    insta::assert_snapshot!(json, @r#"{
    "var": "US2000A_1020",
    "varlab": "Relationship",
    "universe": [
        {
            "sampstatement": "[list]",
            "univstatement": "All persons",
            "makesampstatement": "1",
            "nosampstatement": "0",
            "samp": "us2000a"
        }
    ],
    "codes": [
        {
            "targetcode": "01",
            "labelonly": "0",
            "id": "1",
            "label": "Householder",
            "indent": "0",
            "syntax": "",
            "genlab": "",
            "missing": "",
            "indentgen": "0",
            "codetype": "n"
        }
    ],
    "sample": {
        "id": "us2000a",
        "rectype": "0",
        "norecode": "0",
        "univ": "All persons",
        "svar": "US2000A_1020",
        "invar": "",
        "anchor_form": "",
        "svar_doc": "",
        "anchor_inst": "",
        "cols": {
            "beg": "101",
            "end": "102"
        },
        "recode": [
            {
                "orig": "01",
                "targ": "01",
                "lab": "Householder",
                "freq": "1000"
            }
        ]
    }
}"#);
}

#[test]
fn integrated_structured_keeps_sample_lists() {
    let json: serde_json::Value =
        serde_json::from_slice(&to_structured(&integrated()).unwrap()).unwrap();
    assert_eq!(json["universe"][0]["samps"][1], "us2001a");
    assert_eq!(json["samples"][0]["cols"][0]["beg"], "101");
    assert_eq!(json["samples"][1]["cols"], serde_json::json!([]));
    assert!(json["samples"][1].get("recode").is_none());
    assert_eq!(json["codes"][1]["label"], "Head & spouse");
}
