use arch::isa::{self, InstrType};
use arch::mnemonic::Mnemonic;

use crate::diag::DiagSink;
use crate::element::{Directive, Element, EmitKind, Label, Param};
use crate::lexer::{Constant, Pos};
use crate::section::SectionKind;

#[derive(Debug, Clone)]
pub enum Row {
    SectionStart { kind: SectionKind, line: usize },
    Instr(InstrRow),
    InitData(InitDataRow),
    UninitData(UninitDataRow),
}

impl Row {
    pub fn line(&self) -> usize {
        match self {
            Row::SectionStart { line, .. } => *line,
            Row::Instr(r) => r.line,
            Row::InitData(r) => r.line,
            Row::UninitData(r) => r.line,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InstrRow {
    pub mnemonic: Mnemonic,
    pub ty: &'static InstrType,
    /// Operands with split symbols already stripped
    pub params: Vec<Param>,
    /// Every label bound to this address, pending ones included
    pub labels: Vec<Label>,
    /// Nearest preceding top-level label, for display purposes
    pub parent: Option<String>,
    pub first: bool,
    pub line: usize,
    pub pos: Pos,
}

#[derive(Debug, Clone)]
pub struct InitDataRow {
    pub label: Label,
    pub emit: EmitKind,
    pub value: Constant,
    pub line: usize,
}

#[derive(Debug, Clone)]
pub struct UninitDataRow {
    pub label: Label,
    pub emit: EmitKind,
    pub line: usize,
}

// ----------------------------------------------------------------------------

/// Classifies the per-line element lists into rows by ordered shape
/// match. Labels on their own line stay pending until the next row
/// claims their address.
pub struct RowBuilder {
    pending: Vec<Label>,
    parent: Option<String>,
    seen_instr: bool,
}

impl RowBuilder {
    pub fn new() -> Self {
        RowBuilder {
            pending: Vec::new(),
            parent: None,
            seen_instr: false,
        }
    }

    pub fn line(
        &mut self,
        elements: Vec<Element>,
        line_no: usize,
        diags: &mut DiagSink,
    ) -> Option<Row> {
        let mut labels = Vec::new();
        let mut directive = None;
        let mut instr = None;
        let mut params: Vec<Param> = Vec::new();
        let mut pos = Pos {
            line: line_no,
            col: 0,
        };

        for element in elements {
            match element {
                Element::Label(l) => labels.push(l),
                Element::Directive(d, tok) => {
                    directive = Some((d, tok));
                }
                Element::Instr(m, tok) => {
                    pos = tok.pos;
                    instr = Some((m, tok));
                }
                Element::Params(p) => params = p,
            }
        }

        for label in &labels {
            if !label.sub {
                self.parent = Some(label.qualified.clone());
            }
        }

        // Ordered shapes, first match wins
        if let Some((mnemonic, _tok)) = instr {
            let mut all = std::mem::take(&mut self.pending);
            all.extend(labels);
            let first = !self.seen_instr;
            self.seen_instr = true;
            let params = params
                .into_iter()
                .filter(|p| !matches!(p, Param::Split(_)))
                .collect();
            return Some(Row::Instr(InstrRow {
                mnemonic,
                ty: isa::lookup(mnemonic),
                params,
                labels: all,
                parent: self.parent.clone(),
                first,
                line: line_no,
                pos,
            }));
        }

        match directive {
            Some((Directive::Section(kind), tok)) => {
                if !labels.is_empty() {
                    diags.error("A section start cannot carry a label", Some(&tok));
                }
                return Some(Row::SectionStart {
                    kind,
                    line: line_no,
                });
            }
            Some((Directive::Emit(emit), tok)) => {
                let mut all = std::mem::take(&mut self.pending);
                all.extend(labels);
                let Some(label) = all.pop() else {
                    diags.error("Data directive requires a label", Some(&tok));
                    return None;
                };
                for extra in all {
                    diags.error(
                        format!("Multiple labels on one data allocation: `{}`", extra.qualified),
                        Some(&tok),
                    );
                }
                let constants: Vec<&Param> = params
                    .iter()
                    .filter(|p| !matches!(p, Param::Split(_)))
                    .collect();
                return match constants.as_slice() {
                    [] => Some(Row::UninitData(UninitDataRow {
                        label,
                        emit,
                        line: line_no,
                    })),
                    [Param::Constant(c)] => Some(Row::InitData(InitDataRow {
                        label,
                        emit,
                        value: c.clone(),
                        line: line_no,
                    })),
                    _ => {
                        diags.error(
                            "Couldn't match elements to row: data directive takes one constant",
                            Some(&tok),
                        );
                        None
                    }
                };
            }
            None => {}
        }

        if !labels.is_empty() {
            self.pending.extend(labels);
            return None;
        }

        if !params.is_empty() {
            diags.error_at("Couldn't match elements to row", pos);
        }
        None
    }

    /// Labels left dangling at end of input never bind to an address.
    pub fn finish(&mut self, diags: &mut DiagSink) {
        for label in self.pending.drain(..) {
            diags.error_at(
                format!("Label `{}` is not bound to any row", label.qualified),
                label.pos,
            );
        }
    }
}
