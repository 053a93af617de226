// VCDIFF instruction code tables (RFC 3284, Sections 5.4-5.6 and 7).
//
// Maps each opcode byte to up to two half-instructions.  The default
// table is generated from the RFC descriptor; application-defined tables
// arrive as the 1536-byte serialized form (six 256-byte arrays).

use std::sync::LazyLock;

/// Minimum COPY size in the default table.
pub const MIN_MATCH: u8 = 4;

/// Length of the serialized code table string.
pub const CODE_TABLE_STRING_LEN: usize = 6 * 256;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    #[default]
    Noop,
    Add,
    Run,
    Copy,
}

impl InstructionKind {
    /// Serialized type codes from RFC 3284 Section 5.4.
    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Noop),
            1 => Some(Self::Add),
            2 => Some(Self::Run),
            3 => Some(Self::Copy),
            _ => None,
        }
    }

    fn code(self) -> u8 {
        match self {
            Self::Noop => 0,
            Self::Add => 1,
            Self::Run => 2,
            Self::Copy => 3,
        }
    }
}

/// One half of a code table entry.
///
/// A `size` of zero means the real size follows the opcode as a varint
/// in the instruction section.  `mode` is only meaningful for COPY.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HalfInstruction {
    pub kind: InstructionKind,
    pub size: u8,
    pub mode: u8,
}

impl HalfInstruction {
    pub const NOOP: Self = Self {
        kind: InstructionKind::Noop,
        size: 0,
        mode: 0,
    };

    const fn add(size: u8) -> Self {
        Self {
            kind: InstructionKind::Add,
            size,
            mode: 0,
        }
    }

    const fn copy(size: u8, mode: u8) -> Self {
        Self {
            kind: InstructionKind::Copy,
            size,
            mode,
        }
    }

    #[inline]
    pub fn is_noop(&self) -> bool {
        self.kind == InstructionKind::Noop
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodeTableEntry {
    pub first: HalfInstruction,
    pub second: HalfInstruction,
}

impl CodeTableEntry {
    /// Iterate the non-NOOP halves in execution order.
    pub fn halves(&self) -> impl Iterator<Item = HalfInstruction> {
        [self.first, self.second].into_iter().filter(|h| !h.is_noop())
    }
}

/// A complete 256-entry code table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeTable {
    entries: Box<[CodeTableEntry; 256]>,
}

impl CodeTable {
    #[inline]
    pub fn get(&self, opcode: u8) -> &CodeTableEntry {
        &self.entries[usize::from(opcode)]
    }

    /// Build the RFC 3284 default table.
    pub fn rfc3284() -> Self {
        const ADD_SIZES: u8 = 17;
        const NEAR_MODES: u8 = 4;
        const SAME_MODES: u8 = 3;
        const CPY_SIZES: u8 = 15;
        const ADDCOPY_ADD_MAX: u8 = 4;
        const ADDCOPY_NEAR_CPY_MAX: u8 = 6;
        const ADDCOPY_SAME_CPY_MAX: u8 = 4;
        const COPYADD_ADD_MAX: u8 = 1;
        const COPYADD_NEAR_CPY_MAX: u8 = 4;
        const COPYADD_SAME_CPY_MAX: u8 = 4;
        const CPY_MODES: u8 = 2 + NEAR_MODES + SAME_MODES;

        let mut entries = Vec::with_capacity(256);
        let single = |first| CodeTableEntry {
            first,
            second: HalfInstruction::NOOP,
        };

        entries.push(single(HalfInstruction {
            kind: InstructionKind::Run,
            size: 0,
            mode: 0,
        }));
        for size in 0..=ADD_SIZES {
            entries.push(single(HalfInstruction::add(size)));
        }
        for mode in 0..CPY_MODES {
            entries.push(single(HalfInstruction::copy(0, mode)));
            for size in MIN_MATCH..MIN_MATCH + CPY_SIZES {
                entries.push(single(HalfInstruction::copy(size, mode)));
            }
        }

        let copy_limit = |mode: u8, near_max, same_max| {
            if mode < 2 + NEAR_MODES {
                near_max
            } else {
                same_max
            }
        };
        for mode in 0..CPY_MODES {
            let cpy_max = copy_limit(mode, ADDCOPY_NEAR_CPY_MAX, ADDCOPY_SAME_CPY_MAX);
            for add_size in 1..=ADDCOPY_ADD_MAX {
                for cpy_size in MIN_MATCH..=cpy_max {
                    entries.push(CodeTableEntry {
                        first: HalfInstruction::add(add_size),
                        second: HalfInstruction::copy(cpy_size, mode),
                    });
                }
            }
        }
        for mode in 0..CPY_MODES {
            let cpy_max = copy_limit(mode, COPYADD_NEAR_CPY_MAX, COPYADD_SAME_CPY_MAX);
            for cpy_size in MIN_MATCH..=cpy_max {
                for add_size in 1..=COPYADD_ADD_MAX {
                    entries.push(CodeTableEntry {
                        first: HalfInstruction::copy(cpy_size, mode),
                        second: HalfInstruction::add(add_size),
                    });
                }
            }
        }

        debug_assert_eq!(entries.len(), 256, "code table must have exactly 256 entries");
        let mut table = Box::new([CodeTableEntry::default(); 256]);
        table.copy_from_slice(&entries);
        Self { entries: table }
    }

    /// Serialize as the RFC 3284 Section 7 code table string:
    /// `inst1[256] inst2[256] size1[256] size2[256] mode1[256] mode2[256]`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = vec![0u8; CODE_TABLE_STRING_LEN];
        for (i, e) in self.entries.iter().enumerate() {
            out[i] = e.first.kind.code();
            out[256 + i] = e.second.kind.code();
            out[512 + i] = e.first.size;
            out[768 + i] = e.second.size;
            out[1024 + i] = e.first.mode;
            out[1280 + i] = e.second.mode;
        }
        out
    }

    /// Parse a code table string.  `mode_count` bounds the COPY modes
    /// the table may reference (2 + s_near + s_same).
    pub fn from_bytes(bytes: &[u8], mode_count: usize) -> Result<Self, CodeTableError> {
        if bytes.len() != CODE_TABLE_STRING_LEN {
            return Err(CodeTableError::Length(bytes.len()));
        }
        let half = |i: usize, base: usize| -> Result<HalfInstruction, CodeTableError> {
            let code = bytes[base + i];
            let kind =
                InstructionKind::from_code(code).ok_or(CodeTableError::Kind { opcode: i, code })?;
            let mode = if kind == InstructionKind::Copy {
                bytes[base + 1024 + i]
            } else {
                0
            };
            if usize::from(mode) >= mode_count {
                return Err(CodeTableError::Mode { opcode: i, mode });
            }
            Ok(HalfInstruction {
                kind,
                size: bytes[base + 512 + i],
                mode,
            })
        };

        let mut entries = Box::new([CodeTableEntry::default(); 256]);
        for (i, entry) in entries.iter_mut().enumerate() {
            *entry = CodeTableEntry {
                first: half(i, 0)?,
                second: half(i, 256)?,
            };
        }
        Ok(Self { entries })
    }
}

impl Default for CodeTable {
    fn default() -> Self {
        default_code_table().clone()
    }
}

/// Return the lazily-built default code table.
pub fn default_code_table() -> &'static CodeTable {
    static TABLE: LazyLock<CodeTable> = LazyLock::new(CodeTable::rfc3284);
    &TABLE
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeTableError {
    #[error("code table string is {0} bytes, expected {CODE_TABLE_STRING_LEN}")]
    Length(usize),
    #[error("opcode {opcode}: unknown instruction type {code}")]
    Kind { opcode: usize, code: u8 },
    #[error("opcode {opcode}: COPY mode {mode} exceeds the address cache")]
    Mode { opcode: usize, mode: u8 },
}
