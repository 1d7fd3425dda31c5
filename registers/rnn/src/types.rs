// Licensed under the Apache-2.0 license

//! Core data types for register databases.
//!
//! A [`Database`] is filled in by the loader, then consumed by the resolver
//! which fills in the derived fields (`fullname`, resolved [`TypeKind`]s,
//! variant bitmaps) and wraps it into an immutable [`crate::Schema`].
//!
//! ## Architecture Overview
//!
//! ```text
//! Database
//! ├── enums: Vec<Enum>           # named value lists, also used as varsets
//! ├── bitsets: Vec<Bitset>       # reusable bitfield layouts
//! ├── domains: Vec<Domain>       # top-level address spaces
//! │   └── subelems: Vec<Delem>   # registers, arrays, stripes, use-groups
//! ├── groups: Vec<Group>         # element fragments spliced by use-group
//! └── spectypes: Vec<Spectype>   # named scalar types
//! ```
//!
//! Cross references after resolution are indices into the database vectors
//! ([`EnumIdx`], [`BitsetIdx`], [`SpectypeIdx`]), so the whole structure is
//! plain owned data that can be shared read-only.

use crate::error::Diagnostic;
use std::path::PathBuf;

/// Index into [`Database::enums`].
pub type EnumIdx = usize;

/// Index into [`Database::bitsets`].
pub type BitsetIdx = usize;

/// Index into [`Database::spectypes`].
pub type SpectypeIdx = usize;

/// Index into [`Database::files`].
pub type FileIdx = usize;

//=============================================================================
// Database - Root container
//=============================================================================

/// Root container of everything loaded from one or more database files.
#[derive(Clone, Debug, Default)]
pub struct Database {
    pub enums: Vec<Enum>,
    pub bitsets: Vec<Bitset>,
    pub domains: Vec<Domain>,
    pub groups: Vec<Group>,
    pub spectypes: Vec<Spectype>,

    /// Every file loaded so far, used for import deduplication and as the
    /// target of [`FileIdx`] references.
    pub files: Vec<PathBuf>,

    pub copyright: Copyright,

    /// Accumulated non-fatal errors.
    pub diagnostics: Vec<Diagnostic>,

    /// Set whenever a diagnostic is recorded.
    pub failed: bool,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enum_idx(&self, name: &str) -> Option<EnumIdx> {
        self.enums.iter().position(|e| e.name == name)
    }

    pub fn bitset_idx(&self, name: &str) -> Option<BitsetIdx> {
        self.bitsets.iter().position(|b| b.name == name)
    }

    pub fn spectype_idx(&self, name: &str) -> Option<SpectypeIdx> {
        self.spectypes.iter().position(|s| s.name == name)
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.domains.iter().find(|d| d.name == name)
    }

    pub fn file(&self, idx: FileIdx) -> Option<&PathBuf> {
        self.files.get(idx)
    }
}

/// Where a definition came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceLoc {
    pub file: FileIdx,
    pub line: u32,
}

//=============================================================================
// Copyright metadata
//=============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
    pub contributions: Option<String>,
    pub nicknames: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Copyright {
    /// Earliest year seen across all files.
    pub first_year: Option<u64>,
    pub license: Option<String>,
    pub authors: Vec<Author>,
}

//=============================================================================
// Variant information
//=============================================================================

/// Per-varset inclusion bitmap, one entry per value of the varset enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarsetMask {
    pub venum: EnumIdx,
    pub variants: Vec<bool>,
}

/// Variant state of a node.
///
/// The `*_str` fields are what the source declared; the remaining fields are
/// derived by the resolver from the declaration and the parent's state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VarInfo {
    pub prefix_str: Option<String>,
    pub varset_str: Option<String>,
    pub variants_str: Option<String>,

    /// Enum whose first enabled value becomes the naming prefix.
    pub prefix_enum: Option<EnumIdx>,
    /// Resolved naming prefix, if any.
    pub prefix: Option<String>,
    /// Accumulated restrictions, inherited from ancestors.
    pub varsets: Vec<VarsetMask>,
    /// True when some restricted varset has no enabled value left, so the
    /// node can never match. Descendants of a dead node are dead.
    pub dead: bool,
}

impl VarInfo {
    pub fn has_declarations(&self) -> bool {
        self.prefix_str.is_some() || self.varset_str.is_some() || self.variants_str.is_some()
    }

    /// Whether two declarations agree, for merging re-declared definitions.
    pub fn same_declaration(&self, other: &VarInfo) -> bool {
        self.prefix_str == other.prefix_str
            && self.varset_str == other.varset_str
            && self.variants_str == other.variants_str
    }
}

//=============================================================================
// Enums and values
//=============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Value {
    pub name: String,
    pub value: Option<u64>,
    pub varinfo: VarInfo,
    pub fullname: String,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Enum {
    pub name: String,
    pub bare: bool,
    pub inline: bool,
    pub values: Vec<Value>,
    pub varinfo: VarInfo,
    pub fullname: String,
    pub loc: SourceLoc,
}

impl Enum {
    /// Position of a value by name, case-insensitively.
    pub fn value_position(&self, name: &str) -> Option<usize> {
        self.values
            .iter()
            .position(|v| v.name.eq_ignore_ascii_case(name))
    }
}

//=============================================================================
// Types
//=============================================================================

/// What a typed bit range means.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    /// Not resolved yet; holds whatever nested `<value>`/`<bitfield>`
    /// children the declaration carried.
    Unresolved {
        values: Vec<Value>,
        bitfields: Vec<Bitfield>,
    },
    /// Values owned by this type. `source` is the inline enum they were
    /// copied from, if the type named one.
    InlineEnum {
        source: Option<EnumIdx>,
        values: Vec<Value>,
    },
    /// Bitfields owned by this type.
    InlineBitset(Vec<Bitfield>),
    Enum(EnumIdx),
    Bitset(BitsetIdx),
    Spectype(SpectypeIdx),
    Hex,
    Int,
    UInt,
    Float,
    Boolean,
    Fixed,
    UFixed,
    A3xxRegId,
}

impl Default for TypeKind {
    fn default() -> Self {
        TypeKind::Unresolved {
            values: Vec::new(),
            bitfields: Vec::new(),
        }
    }
}

/// A typed bit range `[low, high]` plus its formatting/encoding attributes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeInfo {
    /// Type name as declared (or the builtin chosen by default).
    pub name: Option<String>,
    pub kind: TypeKind,
    pub low: u32,
    pub high: u32,
    pub shr: u32,
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub align: Option<u64>,
    pub radix: Option<u32>,
    /// Decoding a value of this enum type selects it as a variant.
    pub addvariant: bool,
}

impl TypeInfo {
    /// A plain range with no type declared yet.
    pub fn with_range(low: u32, high: u32) -> Self {
        Self {
            low,
            high,
            ..Default::default()
        }
    }

    /// Number of bits covered by the range.
    pub fn width(&self) -> u32 {
        self.high.saturating_sub(self.low) + 1
    }

    /// Mask selecting `[low, high]` within a 64-bit word.
    pub fn mask(&self) -> u64 {
        if self.low > 63 {
            return 0;
        }
        let width = self.width();
        let bits = if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        bits << self.low
    }

    /// Type named `address` or `waddress`.
    pub fn is_address(&self) -> bool {
        matches!(self.name.as_deref(), Some("address" | "waddress"))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, TypeKind::Boolean)
    }
}

//=============================================================================
// Bitsets and bitfields
//=============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitfield {
    pub name: String,
    pub typeinfo: TypeInfo,
    pub varinfo: VarInfo,
    pub fullname: String,
    pub loc: SourceLoc,
}

impl Bitfield {
    /// Fields named `UNK<digits>` describe bits nobody understands yet.
    pub fn is_unknown(&self) -> bool {
        self.name
            .strip_prefix("UNK")
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bitset {
    pub name: String,
    pub bare: bool,
    pub inline: bool,
    pub bitfields: Vec<Bitfield>,
    pub varinfo: VarInfo,
    pub fullname: String,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Spectype {
    pub name: String,
    pub typeinfo: TypeInfo,
    pub loc: SourceLoc,
}

//=============================================================================
// Domains and elements
//=============================================================================

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
    pub bare: bool,
    /// Bits per address unit.
    pub width: u32,
    pub size: Option<u64>,
    pub subelems: Vec<Delem>,
    pub varinfo: VarInfo,
    pub fullname: String,
    pub loc: SourceLoc,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub subelems: Vec<Delem>,
    pub loc: SourceLoc,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Access {
    R,
    W,
    #[default]
    RW,
}

impl Access {
    pub fn allows(self, write: bool) -> bool {
        match self {
            Access::R => !write,
            Access::W => write,
            Access::RW => true,
        }
    }
}

/// Where repeated instances of an element live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement {
    /// `offset + stride * index`.
    Fixed(u64),
    /// Explicit per-index offsets.
    Table(Vec<u64>),
    /// Offset computed by an expression only the consumer can evaluate.
    Dynamic(String),
    /// Per-index offset expressions.
    DynamicTable(Vec<String>),
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Fixed(0)
    }
}

impl Placement {
    /// Offset of instance `idx`, when it is known statically.
    pub fn offset_of(&self, idx: u64, stride: u64) -> Option<u64> {
        match self {
            Placement::Fixed(base) => Some(base.wrapping_add(stride.wrapping_mul(idx))),
            Placement::Table(offsets) => offsets.get(usize::try_from(idx).ok()?).copied(),
            Placement::Dynamic(_) | Placement::DynamicTable(_) => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Placement::Dynamic(_) | Placement::DynamicTable(_))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reg {
    /// Register width in bits.
    pub width: u32,
    pub access: Access,
    pub typeinfo: TypeInfo,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DelemKind {
    Reg(Reg),
    Array(Vec<Delem>),
    Stripe(Vec<Delem>),
    /// Reference to a [`Group`]; replaced by a transparent stripe holding a
    /// private copy of the group during resolution.
    UseGroup(String),
}

/// A schema element inside a domain, array, stripe or group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delem {
    pub name: Option<String>,
    pub fullname: Option<String>,
    pub placement: Placement,
    /// Number of instances; 0 means unbounded (stripes only).
    pub length: u64,
    pub stride: u64,
    /// Enum naming the indices of a repeated element.
    pub index: Option<String>,
    pub index_enum: Option<EnumIdx>,
    pub varinfo: VarInfo,
    pub loc: SourceLoc,
    pub kind: DelemKind,
}

impl Delem {
    pub fn new(kind: DelemKind, loc: SourceLoc) -> Self {
        Self {
            name: None,
            fullname: None,
            placement: Placement::default(),
            length: 1,
            stride: 0,
            index: None,
            index_enum: None,
            varinfo: VarInfo::default(),
            loc,
            kind,
        }
    }

    /// Static offset of the first instance, 0 for dynamic placements.
    pub fn base_offset(&self) -> u64 {
        self.placement.offset_of(0, self.stride).unwrap_or(0)
    }

    pub fn subelems(&self) -> &[Delem] {
        match &self.kind {
            DelemKind::Array(subs) | DelemKind::Stripe(subs) => subs,
            DelemKind::Reg(_) | DelemKind::UseGroup(_) => &[],
        }
    }

    pub fn as_reg(&self) -> Option<&Reg> {
        match &self.kind {
            DelemKind::Reg(reg) => Some(reg),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            DelemKind::Reg(_) => "register",
            DelemKind::Array(_) => "array",
            DelemKind::Stripe(_) => "stripe",
            DelemKind::UseGroup(_) => "use-group",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typeinfo_mask() {
        assert_eq!(TypeInfo::with_range(4, 7).mask(), 0xf0);
        assert_eq!(TypeInfo::with_range(0, 31).mask(), 0xffff_ffff);
        assert_eq!(TypeInfo::with_range(0, 63).mask(), u64::MAX);
        assert_eq!(TypeInfo::with_range(63, 63).mask(), 1 << 63);
    }

    #[test]
    fn test_unknown_field_names() {
        let bf = |name: &str| Bitfield {
            name: name.into(),
            ..Default::default()
        };
        assert!(bf("UNK12").is_unknown());
        assert!(!bf("UNK").is_unknown());
        assert!(!bf("UNKNOWN").is_unknown());
        assert!(!bf("FOO").is_unknown());
    }

    #[test]
    fn test_placement_offsets() {
        assert_eq!(Placement::Fixed(0x10).offset_of(2, 4), Some(0x18));
        assert_eq!(Placement::Table(vec![0x10, 0x40]).offset_of(1, 4), Some(0x40));
        assert_eq!(Placement::Table(vec![0x10]).offset_of(1, 4), None);
        assert_eq!(Placement::Dynamic("x".into()).offset_of(0, 4), None);
    }
}
