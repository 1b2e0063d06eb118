use std::collections::BTreeMap;

/// Role a bit field plays inside one 32-bit instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldRole {
    Opcode,
    Rd,
    Rs1,
    Rs2,
    Funct3,
    Funct7,
    Shamt,
    Imm5,
    Imm7,
    Imm12,
    Imm20,
    None,
}

/// Dynamic field values keyed by role, as consumed by encode and
/// produced by decode.
pub type FieldMap = BTreeMap<FieldRole, u32>;

/// One fixed-width bit field. `value: Some(_)` is a static field that
/// identifies the instruction; `None` is filled from a FieldMap at
/// encode time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub role: FieldRole,
    pub bits: u32,
    pub value: Option<u32>,
}

impl Field {
    pub const fn fix(role: FieldRole, bits: u32, value: u32) -> Self {
        Field {
            role,
            bits,
            value: Some(value),
        }
    }

    pub const fn dynamic(role: FieldRole, bits: u32) -> Self {
        Field {
            role,
            bits,
            value: None,
        }
    }
}

/// Declarative field layout of one real instruction, ordered LSB first.
/// Invariant: the field widths sum to exactly 32.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpCode(pub Vec<Field>);

fn ones(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

impl OpCode {
    pub fn width(&self) -> u32 {
        self.0.iter().map(|f| f.bits).sum()
    }

    /// Static value of the low-order opcode segment, used as the first
    /// comparison during catalogue decode.
    pub fn opcode_bits(&self) -> Option<u32> {
        self.0
            .iter()
            .find(|f| f.role == FieldRole::Opcode)
            .and_then(|f| f.value)
    }

    /// Pack a field map into a 32-bit word. Missing or oversized dynamic
    /// values contribute zero bits; callers detect those with [`check`]
    /// and report them. None when the layout does not cover 32 bits.
    ///
    /// [`check`]: OpCode::check
    pub fn encode(&self, fields: &FieldMap) -> Option<u32> {
        if self.width() != 32 {
            return None;
        }
        let mut word = 0u32;
        let mut shift = 0;
        for f in &self.0 {
            let raw = match f.value {
                Some(v) => v,
                None => fields.get(&f.role).copied().unwrap_or(0),
            };
            word |= (raw & ones(f.bits)) << shift;
            shift += f.bits;
        }
        Some(word)
    }

    /// Dynamic roles that are missing from the map or do not fit their
    /// declared width. Empty when encode is exact.
    pub fn check(&self, fields: &FieldMap) -> Vec<FieldRole> {
        self.0
            .iter()
            .filter(|f| f.value.is_none())
            .filter(|f| match fields.get(&f.role) {
                None => true,
                Some(v) => *v > ones(f.bits),
            })
            .map(|f| f.role)
            .collect()
    }

    /// Split a word per the layout. Every static field must match
    /// exactly; the dynamic fields come back as a map. None on a static
    /// mismatch or a non-32-bit layout.
    pub fn decode(&self, word: u32) -> Option<FieldMap> {
        if self.width() != 32 {
            return None;
        }
        let mut fields = FieldMap::new();
        let mut shift = 0;
        for f in &self.0 {
            let raw = (word >> shift) & ones(f.bits);
            match f.value {
                Some(v) => {
                    if v & ones(f.bits) != raw {
                        return None;
                    }
                }
                None => {
                    fields.insert(f.role, raw);
                }
            }
            shift += f.bits;
        }
        Some(fields)
    }
}

// ----------------------------------------------------------------------------
