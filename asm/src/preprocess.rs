use indexmap::IndexMap;

use crate::diag::DiagSink;
use crate::lexer::{Token, TokenKind};
use crate::section::Section;
use crate::Siblings;

/// Output of the preprocessing passes: cleaned token lines (blanked
/// lines keep their slot so positions stay stable), sections spliced in
/// from imports, the decorative lines that were stripped, and the entry
/// label named by `.global` if any.
#[derive(Debug, Default)]
pub struct Preprocessed {
    pub lines: Vec<Vec<Token>>,
    pub imported: Vec<Section>,
    pub pres: Vec<Vec<Token>>,
    pub entry_label: Option<String>,
}

struct Macro {
    params: Vec<String>,
    body: Vec<Vec<Token>>,
}

const MAX_EXPANSION_DEPTH: usize = 16;

/// Fixed pass order: imports, comments/options, `.equ` substitution,
/// macro expansion. Every error is collected, never thrown; offending
/// lines are blanked so later passes and the grammar still run.
pub fn preprocess(
    mut lines: Vec<Vec<Token>>,
    siblings: &Siblings,
    diags: &mut DiagSink,
) -> Preprocessed {
    let mut out = Preprocessed::default();

    resolve_imports(&mut lines, siblings, &mut out, diags);
    strip_comments(&mut lines, &mut out, diags);
    substitute_equs(&mut lines, diags);
    expand_macros(&mut lines, diags);

    out.lines = lines;
    out
}

// ----------------------------------------------------------------------------
// Pass 1: imports

fn resolve_imports(
    lines: &mut [Vec<Token>],
    siblings: &Siblings,
    out: &mut Preprocessed,
    diags: &mut DiagSink,
) {
    for line in lines.iter_mut() {
        let Some(head) = line.first() else { continue };
        if !head.is_word(".import") {
            continue;
        }
        let name = match line.get(1) {
            Some(tok) => match (&tok.kind, tok.constant()) {
                (TokenKind::Word | TokenKind::AlphaNum, _) => Some(tok.text.clone()),
                (_, Some(crate::lexer::Constant::Str(s))) => Some(s.clone()),
                _ => None,
            },
            None => None,
        };
        match name {
            Some(name) => match siblings.get(&name) {
                Some(unit) if unit.ok => out.imported.extend(unit.sections.iter().cloned()),
                Some(_) => diags.error(
                    format!("Cannot import `{name}`: it did not compile cleanly"),
                    line.first(),
                ),
                None => diags.error(
                    format!("Cannot import `{name}`: no such file was compiled"),
                    line.first(),
                ),
            },
            None => diags.error("Malformed import: expected `.import NAME`", line.first()),
        }
        line.clear();
    }
}

// ----------------------------------------------------------------------------
// Pass 2: comments, options, attributes, `.global`

fn strip_comments(lines: &mut [Vec<Token>], out: &mut Preprocessed, diags: &mut DiagSink) {
    for line in lines.iter_mut() {
        if let Some(i) = line.iter().position(|t| t.is_symbol('#')) {
            line.truncate(i);
        }
        let Some(head) = line.first() else { continue };
        if head.is_word(".option") || head.is_word(".attribute") {
            out.pres.push(std::mem::take(line));
            continue;
        }
        if head.is_word(".global") || head.is_word(".globl") {
            match line.get(1).and_then(|t| t.ident()) {
                Some(name) => out.entry_label = Some(name.to_string()),
                None => diags.error("Malformed directive: expected `.global NAME`", Some(head)),
            }
            out.pres.push(std::mem::take(line));
        }
    }
}

// ----------------------------------------------------------------------------
// Pass 3: `.equ NAME, CONST`

fn substitute_equs(lines: &mut [Vec<Token>], diags: &mut DiagSink) {
    let mut consts: IndexMap<String, Token> = IndexMap::new();

    for line in lines.iter_mut() {
        let Some(head) = line.first() else { continue };
        if !head.is_word(".equ") {
            continue;
        }
        let name = line.get(1).and_then(|t| t.ident()).map(str::to_string);
        let comma = line.get(2).map(|t| t.is_symbol(',')).unwrap_or(false);
        let value = line
            .get(3)
            .filter(|t| matches!(t.kind, TokenKind::Constant(_)));
        match (name, comma, value, line.len()) {
            (Some(name), true, Some(value), 4) => {
                if consts.insert(name.clone(), value.clone()).is_some() {
                    diags.warning(format!("Re-defined constant: `{name}`"), line.first());
                }
            }
            _ => diags.error(
                "Malformed definition: expected `.equ NAME, CONST`",
                line.first(),
            ),
        }
        line.clear();
    }

    for line in lines.iter_mut() {
        for tok in line.iter_mut() {
            let replacement = tok.ident().and_then(|name| consts.get(name)).cloned();
            if let Some(value) = replacement {
                *tok = Token::new(value.kind, value.text, tok.pos);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Pass 4: parametric macros

fn expand_macros(lines: &mut Vec<Vec<Token>>, diags: &mut DiagSink) {
    let macros = collect_macros(lines, diags);
    if macros.is_empty() {
        return;
    }

    for _ in 0..MAX_EXPANSION_DEPTH {
        let mut changed = false;
        let mut next: Vec<Vec<Token>> = Vec::with_capacity(lines.len());
        for line in lines.drain(..) {
            let mac = line
                .first()
                .and_then(|t| t.ident())
                .and_then(|name| macros.get(name));
            let Some(mac) = mac else {
                next.push(line);
                continue;
            };
            let args = split_args(&line[1..]);
            if args.len() != mac.params.len() {
                // Arity mismatch is not an invocation; the grammar
                // reports the unknown instruction later
                next.push(line);
                continue;
            }
            changed = true;
            for body_line in &mac.body {
                next.push(substitute_args(body_line, &mac.params, &args));
            }
        }
        *lines = next;
        if !changed {
            return;
        }
    }
    diags.error("Macro expansion did not terminate", None);
}

fn collect_macros(lines: &mut Vec<Vec<Token>>, diags: &mut DiagSink) -> IndexMap<String, Macro> {
    let mut macros: IndexMap<String, Macro> = IndexMap::new();
    let mut current: Option<(String, Macro, Token)> = None;

    for line in lines.iter_mut() {
        if current.is_some() {
            if line.first().map(|t| t.is_word(".endm")).unwrap_or(false) {
                let (name, mac, def) = current.take().unwrap();
                check_macro(&name, &mac, &def, diags);
                if macros.insert(name.clone(), mac).is_some() {
                    diags.warning(format!("Re-defined macro: `{name}`"), Some(&def));
                }
            } else if !line.is_empty() {
                let (_, mac, _) = current.as_mut().unwrap();
                mac.body.push(line.clone());
            }
            line.clear();
            continue;
        }

        let Some(head) = line.first() else { continue };
        if !head.is_word(".macro") {
            continue;
        }
        let def = head.clone();
        let name = line.get(1).and_then(|t| t.ident()).map(str::to_string);
        match name {
            Some(name) => {
                let mut params = Vec::new();
                let mut ok = true;
                for group in split_args(&line[2..]) {
                    match group.as_slice() {
                        [tok] if tok.ident().is_some() => {
                            params.push(tok.ident().unwrap().to_string())
                        }
                        _ => ok = false,
                    }
                }
                if ok {
                    current = Some((
                        name,
                        Macro {
                            params,
                            body: Vec::new(),
                        },
                        def,
                    ));
                } else {
                    diags.error(
                        "Malformed definition: expected `.macro NAME arg, ...`",
                        Some(&def),
                    );
                }
            }
            None => diags.error(
                "Malformed definition: expected `.macro NAME arg, ...`",
                Some(&def),
            ),
        }
        line.clear();
    }

    if let Some((name, _, def)) = current {
        diags.error(format!("Unterminated macro: `{name}`"), Some(&def));
    }
    macros
}

fn check_macro(name: &str, mac: &Macro, def: &Token, diags: &mut DiagSink) {
    for param in &mac.params {
        let marker = format!("\\{param}");
        let used = mac
            .body
            .iter()
            .flatten()
            .any(|t| t.ident() == Some(marker.as_str()));
        if !used {
            diags.warning(
                format!("Macro `{name}`: unused argument `{param}`"),
                Some(def),
            );
        }
    }
    for tok in mac.body.iter().flatten() {
        if let Some(ident) = tok.ident() {
            if let Some(referenced) = ident.strip_prefix('\\') {
                if !mac.params.iter().any(|p| p == referenced) {
                    diags.warning(
                        format!("Macro `{name}`: undeclared argument `{referenced}`"),
                        Some(tok),
                    );
                }
            }
        }
    }
}

/// Split a parameter list on commas; each argument is the token run
/// between separators.
fn split_args(tokens: &[Token]) -> Vec<Vec<Token>> {
    let mut args = Vec::new();
    let mut cur = Vec::new();
    for tok in tokens {
        if tok.is_symbol(',') {
            args.push(std::mem::take(&mut cur));
        } else {
            cur.push(tok.clone());
        }
    }
    if !cur.is_empty() {
        args.push(cur);
    }
    args
}

fn substitute_args(line: &[Token], params: &[String], args: &[Vec<Token>]) -> Vec<Token> {
    let mut out = Vec::with_capacity(line.len());
    for tok in line {
        let index = tok
            .ident()
            .and_then(|ident| ident.strip_prefix('\\'))
            .and_then(|name| params.iter().position(|p| p == name));
        match index {
            Some(i) => out.extend(args[i].iter().cloned()),
            None => out.push(tok.clone()),
        }
    }
    out
}
