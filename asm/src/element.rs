use arch::mnemonic::Mnemonic;
use arch::reg::Reg;

use crate::diag::DiagSink;
use crate::lexer::{Constant, Pos, Token, TokenKind};
use crate::section::SectionKind;

/// A label definition. Sub-labels start with the `.` marker and carry
/// their parent-qualified name; the parent was resolved at scan time so
/// nothing ever walks backwards later.
#[derive(Debug, Clone)]
pub struct Label {
    pub qualified: String,
    pub sub: bool,
    pub pos: Pos,
}

/// Data-emitting directive family. Aligned emitters get natural
/// alignment during allocation, the `.2byte`/`.4byte`/`.8byte` forms do
/// not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitKind {
    Byte,
    Half,
    Word,
    Dword,
    Asciz,
    Str,
    U2,
    U4,
    U8,
}

impl EmitKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ".byte" => Some(EmitKind::Byte),
            ".half" => Some(EmitKind::Half),
            ".word" => Some(EmitKind::Word),
            ".dword" => Some(EmitKind::Dword),
            ".asciz" => Some(EmitKind::Asciz),
            ".string" => Some(EmitKind::Str),
            ".2byte" => Some(EmitKind::U2),
            ".4byte" => Some(EmitKind::U4),
            ".8byte" => Some(EmitKind::U8),
            _ => None,
        }
    }

    pub fn width(self) -> u32 {
        match self {
            EmitKind::Byte | EmitKind::Asciz | EmitKind::Str => 1,
            EmitKind::Half | EmitKind::U2 => 2,
            EmitKind::Word | EmitKind::U4 => 4,
            EmitKind::Dword | EmitKind::U8 => 8,
        }
    }

    pub fn aligned(self) -> bool {
        !matches!(self, EmitKind::U2 | EmitKind::U4 | EmitKind::U8)
    }

    /// String-typed emitters append the terminating NUL themselves.
    pub fn zero_terminated(self) -> bool {
        matches!(self, EmitKind::Asciz | EmitKind::Str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Section(SectionKind),
    Emit(EmitKind),
}

impl Directive {
    pub fn parse(s: &str) -> Option<Self> {
        SectionKind::parse(s)
            .map(Directive::Section)
            .or_else(|| EmitKind::parse(s).map(Directive::Emit))
    }
}

/// One operand. Split symbols survive scanning so the row shapes can
/// see the raw element list; they are stripped before semantic use.
#[derive(Debug, Clone)]
pub enum Param {
    Register(Reg),
    Constant(Constant),
    Offset { imm: i32, reg: Reg },
    Link { name: String, pos: Pos },
    Split(char),
}

#[derive(Debug, Clone)]
pub enum Element {
    Label(Label),
    Directive(Directive, Token),
    Instr(Mnemonic, Token),
    Params(Vec<Param>),
}

// ----------------------------------------------------------------------------

/// Turns cleaned token lines into typed elements. Carries the nearest
/// preceding top-level label across lines so sub-labels and `.`-prefixed
/// references qualify without backward scans.
pub struct Scanner {
    parent: Option<String>,
}

impl Scanner {
    pub fn new() -> Self {
        Scanner { parent: None }
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn scan_line(&mut self, line: &[Token], diags: &mut DiagSink) -> Vec<Element> {
        let mut elements = Vec::new();
        let mut i = 0;

        // Labels first: their presence changes how the rest classifies
        while i + 1 < line.len()
            && line[i].ident().is_some()
            && line[i + 1].is_symbol(':')
        {
            if let Some(label) = self.scan_label(&line[i], diags) {
                elements.push(Element::Label(label));
            }
            i += 2;
        }

        if i >= line.len() {
            return elements;
        }

        // One directive or instruction name
        match &line[i].kind {
            TokenKind::Word | TokenKind::AlphaNum => {
                let text = &line[i].text;
                if text.starts_with('.') {
                    match Directive::parse(text) {
                        Some(d) => elements.push(Element::Directive(d, line[i].clone())),
                        None => {
                            diags.error(format!("Unknown directive: `{text}`"), Some(&line[i]));
                            return elements;
                        }
                    }
                } else {
                    match Mnemonic::parse(text) {
                        Ok(m) => elements.push(Element::Instr(m, line[i].clone())),
                        Err(msg) => {
                            diags.error(msg, Some(&line[i]));
                            return elements;
                        }
                    }
                }
            }
            _ => {
                diags.error(
                    format!("Cannot read `{}` as a label, directive or instruction", line[i].text),
                    Some(&line[i]),
                );
                return elements;
            }
        }
        i += 1;

        // Parameter collection
        let params = self.scan_params(&line[i..], diags);
        if !params.is_empty() {
            elements.push(Element::Params(params));
        }
        elements
    }

    fn scan_label(&mut self, tok: &Token, diags: &mut DiagSink) -> Option<Label> {
        let name = tok.text.clone();
        if let Some(sub) = name.strip_prefix('.') {
            match &self.parent {
                Some(parent) => Some(Label {
                    qualified: format!("{parent}.{sub}"),
                    sub: true,
                    pos: tok.pos,
                }),
                None => {
                    diags.error(
                        format!("Sub-label `{name}` has no preceding top-level label"),
                        Some(tok),
                    );
                    None
                }
            }
        } else {
            self.parent = Some(name.clone());
            Some(Label {
                qualified: name,
                sub: false,
                pos: tok.pos,
            })
        }
    }

    fn scan_params(&self, tokens: &[Token], diags: &mut DiagSink) -> Vec<Param> {
        let mut params = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            let tok = &tokens[i];
            match &tok.kind {
                TokenKind::Register(reg) => {
                    params.push(Param::Register(*reg));
                    i += 1;
                }
                TokenKind::Constant(c) => {
                    // imm(reg) collapses into one offset parameter
                    let base = match (tokens.get(i + 1), tokens.get(i + 2), tokens.get(i + 3)) {
                        (Some(open), Some(reg), Some(close))
                            if open.is_symbol('(') && close.is_symbol(')') =>
                        {
                            match reg.kind {
                                TokenKind::Register(r) => Some(r),
                                _ => None,
                            }
                        }
                        _ => None,
                    };
                    match (base, c.value()) {
                        (Some(reg), Some(imm)) => {
                            params.push(Param::Offset {
                                imm: imm as i32,
                                reg,
                            });
                            i += 4;
                        }
                        _ => {
                            params.push(Param::Constant(c.clone()));
                            i += 1;
                        }
                    }
                }
                TokenKind::Word | TokenKind::AlphaNum => {
                    let name = match tok.text.strip_prefix('.') {
                        Some(sub) => match &self.parent {
                            Some(parent) => format!("{parent}.{sub}"),
                            None => tok.text.clone(),
                        },
                        None => tok.text.clone(),
                    };
                    params.push(Param::Link {
                        name,
                        pos: tok.pos,
                    });
                    i += 1;
                }
                TokenKind::Symbol(',') => {
                    params.push(Param::Split(','));
                    i += 1;
                }
                _ => {
                    diags.error(
                        format!("Cannot read `{}` as a parameter", tok.text),
                        Some(tok),
                    );
                    i += 1;
                }
            }
        }
        params
    }
}
