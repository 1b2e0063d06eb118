use indexmap::IndexMap;

use crate::lexer::Pos;

/// What the qualified name addresses once the code generator has placed
/// it: an instruction, initialized data or reserved space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Instr,
    InitData,
    UninitData,
}

#[derive(Debug, Clone)]
pub struct LabelInfo {
    pub pos: Pos,
    pub kind: LabelKind,
    pub addr: u32,
}

/// Insertion-ordered table of every placed label, local and imported.
/// Qualified names are unique; a second definition is the caller's
/// error to report.
#[derive(Debug, Default)]
pub struct Labels(IndexMap<String, LabelInfo>);

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, info: LabelInfo) -> Option<LabelInfo> {
        self.0.insert(name, info)
    }

    pub fn get(&self, name: &str) -> Option<&LabelInfo> {
        self.0.get(name)
    }

    pub fn addr_of(&self, name: &str) -> Option<u32> {
        self.0.get(name).map(|info| info.addr)
    }

    /// Names bound to one address, for the transcript view.
    pub fn at_addr(&self, addr: u32) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(_, info)| info.addr == addr)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LabelInfo)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
