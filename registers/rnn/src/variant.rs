// Licensed under the Apache-2.0 license

//! Variant selection state used while decoding.

use crate::error::DecodeError;
use crate::types::{Database, EnumIdx, VarInfo};
use log::{debug, warn};

/// The selected value of each varset the caller cares about.
///
/// Selections are made explicitly with [`VariantContext::select`] or as a
/// side effect of decoding a field whose type has `addvariant` set.
///
/// # Example
///
/// ```
/// use registers_rnn::VariantContext;
///
/// let mut ctx = VariantContext::new();
/// ctx.select_index(0, 2);
/// assert_eq!(ctx.selected(0), Some(2));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VariantContext {
    selections: Vec<(EnumIdx, usize)>,
}

impl VariantContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `variant` (matched case-insensitively) of the enum `varset`.
    pub fn select(
        &mut self,
        db: &Database,
        varset: &str,
        variant: &str,
    ) -> Result<(), DecodeError> {
        let venum = db
            .enum_idx(varset)
            .ok_or_else(|| DecodeError::UnknownEnum(varset.into()))?;
        let pos = db.enums[venum]
            .value_position(variant)
            .ok_or_else(|| DecodeError::UnknownVariant {
                varset: varset.into(),
                variant: variant.into(),
            })?;
        debug!("selecting {varset} variant {variant}");
        self.select_index(venum, pos);
        Ok(())
    }

    /// Select value `pos` of enum `venum`, replacing any earlier choice.
    pub fn select_index(&mut self, venum: EnumIdx, pos: usize) {
        match self.selections.iter_mut().find(|(e, _)| *e == venum) {
            Some(sel) => sel.1 = pos,
            None => self.selections.push((venum, pos)),
        }
    }

    pub fn selected(&self, venum: EnumIdx) -> Option<usize> {
        self.selections
            .iter()
            .find(|(e, _)| *e == venum)
            .map(|(_, pos)| *pos)
    }

    /// Whether a node with variant state `vi` exists under this selection.
    ///
    /// A node restricted by a varset nothing was selected for doesn't
    /// match.
    pub fn matches(&self, db: &Database, vi: &VarInfo) -> bool {
        if vi.dead {
            return false;
        }
        vi.varsets.iter().all(|vs| match self.selected(vs.venum) {
            Some(pos) => vs.variants.get(pos).copied().unwrap_or(false),
            None => {
                let name = db
                    .enums
                    .get(vs.venum)
                    .map_or("?", |e| e.name.as_str());
                warn!("{}", DecodeError::NoVariantSelected(name.into()));
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Enum, Value, VarsetMask};

    fn chips() -> Database {
        let value = |name: &str| Value {
            name: name.into(),
            ..Default::default()
        };
        Database {
            enums: vec![Enum {
                name: "chip".into(),
                values: vec![value("A"), value("B"), value("C"), value("D")],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn restricted(mask: [bool; 4]) -> VarInfo {
        VarInfo {
            varsets: vec![VarsetMask {
                venum: 0,
                variants: mask.to_vec(),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_select_case_insensitive() {
        let db = chips();
        let mut ctx = VariantContext::new();
        ctx.select(&db, "chip", "c").unwrap();
        assert_eq!(ctx.selected(0), Some(2));
        ctx.select(&db, "chip", "A").unwrap();
        assert_eq!(ctx.selected(0), Some(0));
        assert_eq!(
            ctx.select(&db, "chip", "Z"),
            Err(DecodeError::UnknownVariant {
                varset: "chip".into(),
                variant: "Z".into()
            })
        );
        assert_eq!(
            ctx.select(&db, "gpu", "A"),
            Err(DecodeError::UnknownEnum("gpu".into()))
        );
    }

    #[test]
    fn test_range_membership() {
        let db = chips();
        let vi = restricted([true, true, true, false]);
        let mut ctx = VariantContext::new();
        ctx.select(&db, "chip", "B").unwrap();
        assert!(ctx.matches(&db, &vi));
        ctx.select(&db, "chip", "D").unwrap();
        assert!(!ctx.matches(&db, &vi));
    }

    #[test]
    fn test_missing_selection_never_matches() {
        let db = chips();
        let ctx = VariantContext::new();
        assert!(!ctx.matches(&db, &restricted([true; 4])));
        assert!(ctx.matches(&db, &VarInfo::default()));
    }

    #[test]
    fn test_dead_never_matches() {
        let db = chips();
        let mut ctx = VariantContext::new();
        ctx.select_index(0, 0);
        let vi = VarInfo {
            dead: true,
            ..Default::default()
        };
        assert!(!ctx.matches(&db, &vi));
    }
}
