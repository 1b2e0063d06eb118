pub mod codegen;
pub mod diag;
pub mod element;
pub mod labels;
pub mod lexer;
pub mod preprocess;
pub mod row;
pub mod section;

use indexmap::IndexMap;

use crate::codegen::Artifact;
use crate::diag::{Diag, DiagSink};
use crate::section::Section;

/// One compiled file. Sibling units are handed to later compiles so
/// `.import` can splice their sections in; the unit itself is immutable
/// once built.
#[derive(Debug)]
pub struct Unit {
    pub name: String,
    pub sections: Vec<Section>,
    pub artifact: Artifact,
    pub diags: Vec<Diag>,
    pub ok: bool,
}

pub type Siblings = IndexMap<String, Unit>;

/// Run the whole pipeline on one source text: lex, preprocess, scan
/// elements, classify rows, group sections, generate code. Every phase
/// appends to the same diagnostic list and never aborts the compile.
pub fn compile(name: &str, source: &str, siblings: &Siblings) -> Unit {
    let mut diags = DiagSink::new();

    let lines = lexer::Lexer::new(source).tokenize();
    let pre = preprocess::preprocess(lines, siblings, &mut diags);

    let mut scanner = element::Scanner::new();
    let mut builder = row::RowBuilder::new();
    let mut rows = Vec::new();
    for (idx, line) in pre.lines.iter().enumerate() {
        let elements = scanner.scan_line(line, &mut diags);
        let line_no = line.first().map(|t| t.pos.line).unwrap_or(idx);
        if let Some(row) = builder.line(elements, line_no, &mut diags) {
            rows.push(row);
        }
    }
    builder.finish(&mut diags);

    let mut sections = section::group(rows, &mut diags);
    sections.extend(pre.imported.iter().cloned());

    let artifact = codegen::generate(&sections, pre.entry_label.as_deref(), &mut diags);
    let ok = !diags.has_errors();

    Unit {
        name: name.to_string(),
        sections,
        artifact,
        diags: diags.diags,
        ok,
    }
}
