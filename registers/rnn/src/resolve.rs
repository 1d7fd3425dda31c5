// Licensed under the Apache-2.0 license

//! Turning a loaded [`Database`] into an immutable [`Schema`].
//!
//! Resolution runs once, in a fixed order:
//!
//! ```text
//! enums ──► bitsets ──► domains ──► spectypes
//!   │          │           │
//!   │          │           ├── use-group ─► private stripe copy
//!   │          │           └── reg types  ─► enum/bitset/spectype/builtin
//!   └──────────┴── varinfo, fullnames
//! ```
//!
//! Lookups go through a snapshot of the declarations taken before anything
//! is modified, so inline enums and bitsets are copied from their declared
//! form and re-resolved at every use site.

use crate::error::{Diagnostic, LoadError};
use crate::types::*;
use crate::util::join_name;
use log::{debug, warn};
use std::ops::Deref;

/// A fully resolved database, shared read-only by decoders and emitters.
#[derive(Clone, Debug)]
pub struct Schema {
    db: Database,
}

impl Deref for Schema {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.db
    }
}

impl Schema {
    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn into_database(self) -> Database {
        self.db
    }

    pub fn find_enum(&self, name: &str) -> Option<&Enum> {
        self.db.enums.iter().find(|e| e.name == name)
    }

    pub fn find_bitset(&self, name: &str) -> Option<&Bitset> {
        self.db.bitsets.iter().find(|b| b.name == name)
    }

    pub fn find_domain(&self, name: &str) -> Option<&Domain> {
        self.db.domain(name)
    }

    pub fn find_spectype(&self, name: &str) -> Option<&Spectype> {
        self.db.spectypes.iter().find(|s| s.name == name)
    }

    /// A `width`-bit type named like a `type=` attribute: an enum, bitset,
    /// spectype or builtin scalar.
    pub fn named_type(&self, name: &str, width: u32) -> Option<TypeInfo> {
        let kind = if let Some(idx) = self.db.enum_idx(name) {
            TypeKind::Enum(idx)
        } else if let Some(idx) = self.db.bitset_idx(name) {
            TypeKind::Bitset(idx)
        } else if let Some(idx) = self.db.spectype_idx(name) {
            TypeKind::Spectype(idx)
        } else {
            match builtin(name)? {
                BuiltinType::Plain(kind) => kind,
                BuiltinType::Values | BuiltinType::Fields => return None,
            }
        };
        Some(TypeInfo {
            name: Some(name.to_string()),
            kind,
            ..TypeInfo::with_range(0, width.clamp(1, 64) - 1)
        })
    }
}

/// Resolve names, types, variants and groups.
///
/// Soft errors are appended to the database diagnostics; only
/// [`LoadError::ArrayMissingStride`] aborts.
pub fn resolve(mut db: Database) -> Result<Schema, LoadError> {
    let mut resolver = Resolver {
        symbols: Database {
            enums: db.enums.clone(),
            bitsets: db.bitsets.clone(),
            groups: db.groups.clone(),
            spectypes: db.spectypes.clone(),
            files: db.files.clone(),
            ..Default::default()
        },
        diagnostics: Vec::new(),
        group_stack: Vec::new(),
    };

    let root = VarInfo::default();
    for en in &mut db.enums {
        resolver.prep_enum(en, &root);
    }
    for bs in &mut db.bitsets {
        resolver.prep_bitset(bs, &root);
    }
    for dom in &mut db.domains {
        resolver.prep_domain(dom, &root)?;
    }
    for (idx, st) in db.spectypes.iter_mut().enumerate() {
        let name = st.name.clone();
        if resolver.spectype_cycle(idx) {
            resolver.error(
                st.loc,
                LoadError::UnresolvedTypeReference {
                    context: name.clone(),
                    name: st.typeinfo.name.clone().unwrap_or_default(),
                },
            );
            st.typeinfo.kind = TypeKind::Hex;
        }
        resolver.prep_typeinfo(&mut st.typeinfo, &name, &root, st.loc);
    }

    if !resolver.diagnostics.is_empty() {
        db.failed = true;
        db.diagnostics.append(&mut resolver.diagnostics);
    }
    Ok(Schema { db })
}

struct Resolver {
    /// Declarations as loaded, used for every by-name lookup.
    symbols: Database,
    diagnostics: Vec<Diagnostic>,
    /// Groups currently being inlined.
    group_stack: Vec<String>,
}

impl Resolver {
    fn error(&mut self, loc: SourceLoc, error: LoadError) {
        let diag = Diagnostic {
            file: self.symbols.files.get(loc.file).cloned(),
            line: Some(loc.line),
            error,
        };
        warn!("{diag}");
        self.diagnostics.push(diag);
    }

    //=========================================================================
    // Variants
    //=========================================================================

    /// Derive `vi` from its declaration and the parent's state.
    fn prep_varinfo(&mut self, what: &str, vi: &mut VarInfo, parent: &VarInfo, loc: SourceLoc) {
        vi.prefix_enum = parent.prefix_enum;
        vi.varsets = parent.varsets.clone();
        if let Some(prefix) = vi.prefix_str.clone() {
            vi.prefix_enum = if prefix == "none" {
                None
            } else {
                self.lookup_enum(what, &prefix, loc)
            };
        }

        let mut varset = vi.prefix_enum;
        if varset.is_none() && vi.varset_str.is_none() {
            vi.varset_str = parent.varset_str.clone();
        }
        if let Some(name) = vi.varset_str.clone() {
            varset = self.lookup_enum(what, &name, loc);
        }

        if let Some(variants) = vi.variants_str.clone() {
            match varset {
                Some(venum) => self.restrict(what, vi, venum, &variants, loc),
                None => self.error(
                    loc,
                    LoadError::UnknownVariant {
                        context: what.into(),
                        varset: "(none)".into(),
                        variant: variants,
                    },
                ),
            }
        }

        vi.dead = parent.dead || vi.varsets.iter().any(|vs| !vs.variants.contains(&true));
        vi.prefix = if vi.dead {
            None
        } else {
            vi.prefix_enum.and_then(|penum| {
                let values = &self.symbols.enums[penum].values;
                let pos = match vi.varsets.iter().find(|vs| vs.venum == penum) {
                    Some(vs) => vs.variants.iter().position(|&on| on)?,
                    None => 0,
                };
                values.get(pos).map(|v| v.name.clone())
            })
        };
    }

    /// Whether following spectype `start` by type name leads back to it.
    fn spectype_cycle(&self, start: usize) -> bool {
        let mut seen = vec![false; self.symbols.spectypes.len()];
        let mut cur = start;
        loop {
            if seen[cur] {
                return cur == start;
            }
            seen[cur] = true;
            let Some(name) = self.symbols.spectypes[cur].typeinfo.name.as_deref() else {
                return false;
            };
            if self.symbols.enum_idx(name).is_some() || self.symbols.bitset_idx(name).is_some() {
                return false;
            }
            match self.symbols.spectype_idx(name) {
                Some(next) => cur = next,
                None => return false,
            }
        }
    }

    /// Intersect the inherited mask for `venum` with the `variants` tokens.
    fn restrict(
        &mut self,
        what: &str,
        vi: &mut VarInfo,
        venum: EnumIdx,
        variants: &str,
        loc: SourceLoc,
    ) {
        let count = self.symbols.enums[venum].values.len();
        let mut selected = vec![false; count];
        for token in variants.split_whitespace() {
            match self.variant_range(venum, token) {
                Some((first, last)) if first < last => {
                    if let Some(range) = selected.get_mut(first..last.min(count)) {
                        range.fill(true);
                    }
                }
                Some(_) => {
                    let varset = self.symbols.enums[venum].name.clone();
                    self.error(
                        loc,
                        LoadError::EmptyVariantRange {
                            context: what.into(),
                            varset,
                            range: token.into(),
                        },
                    );
                }
                None => {
                    let varset = self.symbols.enums[venum].name.clone();
                    self.error(
                        loc,
                        LoadError::UnknownVariant {
                            context: what.into(),
                            varset,
                            variant: token.into(),
                        },
                    );
                }
            }
        }

        match vi.varsets.iter_mut().find(|vs| vs.venum == venum) {
            Some(vs) => {
                for (on, sel) in vs.variants.iter_mut().zip(&selected) {
                    *on &= *sel;
                }
            }
            None => vi.varsets.push(VarsetMask {
                venum,
                variants: selected,
            }),
        }
    }

    /// Half-open index range named by one variant token: `A`, `A-B`
    /// (inclusive), `A:B` (exclusive), with either end optional.
    fn variant_range(&self, venum: EnumIdx, token: &str) -> Option<(usize, usize)> {
        let en = &self.symbols.enums[venum];
        let find = |name: &str| en.value_position(name);
        if let Some((first, last)) = token.split_once('-') {
            let first = if first.is_empty() { 0 } else { find(first)? };
            let last = if last.is_empty() {
                en.values.len()
            } else {
                find(last)? + 1
            };
            Some((first, last))
        } else if let Some((first, last)) = token.split_once(':') {
            let first = if first.is_empty() { 0 } else { find(first)? };
            let last = if last.is_empty() {
                en.values.len()
            } else {
                find(last)?
            };
            Some((first, last))
        } else {
            let pos = find(token)?;
            Some((pos, pos + 1))
        }
    }

    fn lookup_enum(&mut self, what: &str, name: &str, loc: SourceLoc) -> Option<EnumIdx> {
        let idx = self.symbols.enum_idx(name);
        if idx.is_none() {
            self.error(
                loc,
                LoadError::UnresolvedTypeReference {
                    context: what.into(),
                    name: name.into(),
                },
            );
        }
        idx
    }

    //=========================================================================
    // Enums, bitsets, values and fields
    //=========================================================================

    fn prep_enum(&mut self, en: &mut Enum, parent: &VarInfo) {
        self.prep_varinfo(&en.name.clone(), &mut en.varinfo, parent, en.loc);
        en.fullname = en.name.clone();
        if en.inline {
            return;
        }
        let prefix = (!en.bare).then(|| en.fullname.clone());
        for val in &mut en.values {
            self.prep_value(val, prefix.as_deref(), &en.varinfo);
        }
    }

    fn prep_value(&mut self, val: &mut Value, prefix: Option<&str>, parent: &VarInfo) {
        self.prep_varinfo(&val.name.clone(), &mut val.varinfo, parent, val.loc);
        if val.varinfo.dead {
            return;
        }
        val.fullname = qualify(prefix, &val.varinfo, parent, &val.name);
    }

    fn prep_bitset(&mut self, bs: &mut Bitset, parent: &VarInfo) {
        self.prep_varinfo(&bs.name.clone(), &mut bs.varinfo, parent, bs.loc);
        bs.fullname = bs.name.clone();
        if bs.inline {
            return;
        }
        let prefix = (!bs.bare).then(|| bs.fullname.clone());
        for bf in &mut bs.bitfields {
            self.prep_bitfield(bf, prefix.as_deref(), &bs.varinfo);
        }
    }

    fn prep_bitfield(&mut self, bf: &mut Bitfield, prefix: Option<&str>, parent: &VarInfo) {
        self.prep_varinfo(&bf.name.clone(), &mut bf.varinfo, parent, bf.loc);
        if bf.varinfo.dead {
            return;
        }
        bf.fullname = qualify(prefix, &bf.varinfo, parent, &bf.name);
        let fullname = bf.fullname.clone();
        self.prep_typeinfo(&mut bf.typeinfo, &fullname, &bf.varinfo, bf.loc);
    }

    //=========================================================================
    // Types
    //=========================================================================

    /// Resolve `ti.kind`. Nested and inlined values/fields are resolved
    /// under `owner` (the fullname of the node carrying the type).
    fn prep_typeinfo(&mut self, ti: &mut TypeInfo, owner: &str, vi: &VarInfo, loc: SourceLoc) {
        let (mut values, mut bitfields) = match std::mem::take(&mut ti.kind) {
            TypeKind::Unresolved { values, bitfields } => (values, bitfields),
            resolved => {
                ti.kind = resolved;
                return;
            }
        };

        enum Shape {
            Values(Option<EnumIdx>),
            Fields,
            Plain(TypeKind),
        }

        let shape = match ti.name.as_deref() {
            Some(name) => {
                if let Some(idx) = self.symbols.enum_idx(name) {
                    let en = &self.symbols.enums[idx];
                    if en.inline {
                        values.extend(en.values.iter().cloned());
                        Shape::Values(Some(idx))
                    } else {
                        Shape::Plain(TypeKind::Enum(idx))
                    }
                } else if let Some(idx) = self.symbols.bitset_idx(name) {
                    let bs = &self.symbols.bitsets[idx];
                    if bs.inline {
                        bitfields.extend(bs.bitfields.iter().cloned());
                        Shape::Fields
                    } else {
                        Shape::Plain(TypeKind::Bitset(idx))
                    }
                } else if let Some(idx) = self.symbols.spectype_idx(name) {
                    Shape::Plain(TypeKind::Spectype(idx))
                } else {
                    match builtin(name) {
                        Some(BuiltinType::Values) => Shape::Values(None),
                        Some(BuiltinType::Fields) => Shape::Fields,
                        Some(BuiltinType::Plain(kind)) => Shape::Plain(kind),
                        None => {
                            self.error(
                                loc,
                                LoadError::UnresolvedTypeReference {
                                    context: owner.into(),
                                    name: name.into(),
                                },
                            );
                            Shape::Plain(TypeKind::Hex)
                        }
                    }
                }
            }
            None if !bitfields.is_empty() => Shape::Fields,
            None if !values.is_empty() => Shape::Values(None),
            None if ti.low == ti.high => Shape::Plain(TypeKind::Boolean),
            None => Shape::Plain(TypeKind::Hex),
        };

        let is_enum = matches!(shape, Shape::Values(Some(_)) | Shape::Plain(TypeKind::Enum(_)));
        if ti.addvariant && !is_enum {
            self.error(
                loc,
                LoadError::AddVariantOnNonEnum {
                    context: owner.into(),
                    name: ti.name.clone().unwrap_or_default(),
                },
            );
        }

        ti.kind = match shape {
            Shape::Values(source) => {
                for val in &mut values {
                    self.prep_value(val, Some(owner), vi);
                }
                TypeKind::InlineEnum { source, values }
            }
            Shape::Fields => {
                for bf in &mut bitfields {
                    self.prep_bitfield(bf, Some(owner), vi);
                }
                TypeKind::InlineBitset(bitfields)
            }
            Shape::Plain(kind) => kind,
        };
    }

    //=========================================================================
    // Domains and elements
    //=========================================================================

    fn prep_domain(&mut self, dom: &mut Domain, parent: &VarInfo) -> Result<(), LoadError> {
        self.prep_varinfo(&dom.name.clone(), &mut dom.varinfo, parent, dom.loc);
        dom.fullname = dom.name.clone();
        let prefix = (!dom.bare).then(|| dom.fullname.clone());
        let unit = dom.width.max(1);
        for elem in &mut dom.subelems {
            self.prep_delem(elem, prefix.as_deref(), &dom.varinfo, unit)?;
        }
        Ok(())
    }

    fn prep_delem(
        &mut self,
        elem: &mut Delem,
        prefix: Option<&str>,
        parent: &VarInfo,
        unit: u32,
    ) -> Result<(), LoadError> {
        if let DelemKind::UseGroup(group) = &elem.kind {
            let group = group.clone();
            return self.inline_group(elem, &group, prefix, parent, unit);
        }

        let what = elem
            .name
            .clone()
            .unwrap_or_else(|| elem.kind_name().to_string());
        self.prep_varinfo(&what, &mut elem.varinfo, parent, elem.loc);
        if elem.varinfo.dead {
            return Ok(());
        }

        if elem.length != 1 && elem.stride == 0 {
            match &elem.kind {
                DelemKind::Reg(reg) => elem.stride = u64::from((reg.width / unit).max(1)),
                _ => return Err(LoadError::ArrayMissingStride(what)),
            }
        }

        if let Some(name) = &elem.name {
            let own = single_variant(&elem.varinfo).filter(|p| Some(*p) != parent.prefix.as_deref());
            elem.fullname = Some(match own {
                Some(own) => join_name(Some(own), name),
                None => qualify(prefix, &elem.varinfo, parent, name),
            });
        }

        if let Some(index) = elem.index.clone() {
            elem.index_enum = self.lookup_enum(&what, &index, elem.loc);
        }

        let child_prefix = elem.fullname.as_deref().or(prefix);
        match &mut elem.kind {
            DelemKind::Array(subs) | DelemKind::Stripe(subs) => {
                for sub in subs {
                    self.prep_delem(sub, child_prefix, &elem.varinfo, unit)?;
                }
            }
            DelemKind::Reg(reg) => {
                let owner = child_prefix.unwrap_or(&what).to_string();
                self.prep_typeinfo(&mut reg.typeinfo, &owner, &elem.varinfo, elem.loc);
                self.check_reg_range(&owner, reg, elem.loc);
            }
            DelemKind::UseGroup(_) => {}
        }
        Ok(())
    }

    /// Replace a use-group reference with a transparent stripe holding a
    /// private copy of the group's elements.
    fn inline_group(
        &mut self,
        elem: &mut Delem,
        group: &str,
        prefix: Option<&str>,
        parent: &VarInfo,
        unit: u32,
    ) -> Result<(), LoadError> {
        let subs = if self.group_stack.iter().any(|g| g == group) {
            self.error(elem.loc, LoadError::RecursiveGroup(group.into()));
            Vec::new()
        } else {
            match self.symbols.groups.iter().find(|g| g.name == group) {
                Some(g) => {
                    debug!("inlining group {group}");
                    let mut subs = g.subelems.clone();
                    relocate(&mut subs, elem.loc.file);
                    subs
                }
                None => {
                    self.error(elem.loc, LoadError::UnresolvedGroupReference(group.into()));
                    Vec::new()
                }
            }
        };

        elem.kind = DelemKind::Stripe(subs);
        elem.name = None;
        elem.length = 1;
        self.group_stack.push(group.to_string());
        let result = self.prep_delem(elem, prefix, parent, unit);
        self.group_stack.pop();
        result
    }

    /// Report fields that don't fit in the register.
    fn check_reg_range(&mut self, owner: &str, reg: &Reg, loc: SourceLoc) {
        let ti = &reg.typeinfo;
        let mut bad = Vec::new();
        if ti.high >= reg.width {
            bad.push((owner.to_string(), ti.low, ti.high));
        }
        let fields = match &ti.kind {
            TypeKind::InlineBitset(fields) => fields.as_slice(),
            TypeKind::Bitset(idx) => self.symbols.bitsets[*idx].bitfields.as_slice(),
            _ => &[],
        };
        for bf in fields {
            if bf.typeinfo.high >= reg.width {
                bad.push((
                    format!("{owner}.{}", bf.name),
                    bf.typeinfo.low,
                    bf.typeinfo.high,
                ));
            }
        }
        for (name, low, high) in bad {
            self.error(loc, LoadError::InvalidBitRange { name, low, high });
        }
    }
}

enum BuiltinType {
    Values,
    Fields,
    Plain(TypeKind),
}

fn builtin(name: &str) -> Option<BuiltinType> {
    let kind = match name {
        "hex" | "address" | "waddress" => TypeKind::Hex,
        "float" => TypeKind::Float,
        "uint" => TypeKind::UInt,
        "int" => TypeKind::Int,
        "boolean" => TypeKind::Boolean,
        "fixed" => TypeKind::Fixed,
        "ufixed" => TypeKind::UFixed,
        "a3xx_regid" => TypeKind::A3xxRegId,
        "enum" => return Some(BuiltinType::Values),
        "bitfield" => return Some(BuiltinType::Fields),
        _ => return None,
    };
    Some(BuiltinType::Plain(kind))
}

/// Full name of a node: the parent prefix joined with `name`, unless the
/// node's variant prefix differs from its parent's, which then replaces it.
fn qualify(prefix: Option<&str>, vi: &VarInfo, parent: &VarInfo, name: &str) -> String {
    let own = vi.prefix.as_deref().filter(|_| vi.prefix != parent.prefix);
    join_name(own.or(prefix), name)
}

/// A `variants` declaration naming exactly one variant.
fn single_variant(vi: &VarInfo) -> Option<&str> {
    let variants = vi.variants_str.as_deref()?.trim();
    let single = !variants.is_empty()
        && !variants.contains(char::is_whitespace)
        && !variants.contains(['-', ':']);
    single.then_some(variants)
}

/// Attribute copied group elements to the file that uses them.
fn relocate(elems: &mut [Delem], file: FileIdx) {
    for elem in elems {
        elem.loc.file = file;
        if let DelemKind::Array(subs) | DelemKind::Stripe(subs) = &mut elem.kind {
            relocate(subs, file);
        }
    }
}
