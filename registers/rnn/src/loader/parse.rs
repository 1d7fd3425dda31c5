// Licensed under the Apache-2.0 license

//! Element parsers.
//!
//! Each `parse_*` function converts one markup element into the matching
//! database definition. Unknown attributes and children are reported and
//! skipped; only a failing nested import aborts.

use super::*;

impl LoadSession<'_> {
    /// Handles the definitions allowed anywhere a body accepts them.
    /// Returns `Ok(false)` if `node` isn't one.
    pub(super) fn try_top(&mut self, node: &Element) -> Result<bool, LoadError> {
        match node.name.as_str() {
            "enum" => self.parse_enum(node)?,
            "bitset" => self.parse_bitset(node)?,
            "group" => self.parse_group(node)?,
            "domain" => self.parse_domain(node)?,
            "spectype" => self.parse_spectype(node),
            "import" => self.parse_import(node)?,
            "copyright" => self.parse_copyright(node),
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn parse_import(&mut self, node: &Element) -> Result<(), LoadError> {
        let mut file = None;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "file" => file = Some(attr.value.clone()),
                _ => self.wrong_attr(node, attr),
            }
        }
        let Some(file) = file else {
            self.missing(node, "file");
            return Ok(());
        };
        let dir = self.current_dir();
        self.load_file(Path::new(&file), dir.as_deref())
    }

    //=========================================================================
    // Enums
    //=========================================================================

    fn parse_enum(&mut self, node: &Element) -> Result<(), LoadError> {
        let mut name = None;
        let mut bare = false;
        let mut inline = false;
        let mut varinfo = VarInfo::default();
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                "bare" => bare = self.bool_attr(node, attr),
                "inline" => inline = self.bool_attr(node, attr),
                _ if try_varinfo_attr(&mut varinfo, attr) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        let Some(name) = name else {
            self.missing(node, "name");
            return Ok(());
        };

        let idx = match self.db.enum_idx(&name) {
            Some(idx) => {
                let cur = &self.db.enums[idx];
                if cur.bare != bare
                    || cur.inline != inline
                    || !cur.varinfo.same_declaration(&varinfo)
                {
                    self.conflict(node, "enum", &name, "attributes differ");
                }
                idx
            }
            None => {
                self.db.enums.push(Enum {
                    name,
                    bare,
                    inline,
                    varinfo,
                    loc: self.loc(node),
                    ..Default::default()
                });
                self.db.enums.len() - 1
            }
        };

        for child in &node.children {
            if child.name == "value" {
                if let Some(value) = self.parse_value(child) {
                    self.db.enums[idx].values.push(value);
                }
            } else if !self.try_top(child)? && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        Ok(())
    }

    fn parse_value(&mut self, node: &Element) -> Option<Value> {
        let mut value = Value {
            loc: self.loc(node),
            ..Default::default()
        };
        let mut name = None;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                "value" => value.value = Some(self.num_attr(node, attr)),
                _ if try_varinfo_attr(&mut value.varinfo, attr) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        for child in &node.children {
            if !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        match name {
            Some(name) => {
                value.name = name;
                Some(value)
            }
            None => {
                self.missing(node, "name");
                None
            }
        }
    }

    //=========================================================================
    // Bitsets
    //=========================================================================

    fn parse_bitset(&mut self, node: &Element) -> Result<(), LoadError> {
        let mut name = None;
        let mut bare = false;
        let mut inline = false;
        let mut varinfo = VarInfo::default();
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                "bare" => bare = self.bool_attr(node, attr),
                "inline" => inline = self.bool_attr(node, attr),
                _ if try_varinfo_attr(&mut varinfo, attr) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        let Some(name) = name else {
            self.missing(node, "name");
            return Ok(());
        };

        let idx = match self.db.bitset_idx(&name) {
            Some(idx) => {
                let cur = &self.db.bitsets[idx];
                if cur.bare != bare
                    || cur.inline != inline
                    || !cur.varinfo.same_declaration(&varinfo)
                {
                    self.conflict(node, "bitset", &name, "attributes differ");
                }
                idx
            }
            None => {
                self.db.bitsets.push(Bitset {
                    name,
                    bare,
                    inline,
                    varinfo,
                    loc: self.loc(node),
                    ..Default::default()
                });
                self.db.bitsets.len() - 1
            }
        };

        for child in &node.children {
            if child.name == "bitfield" {
                if let Some(bf) = self.parse_bitfield(child) {
                    self.db.bitsets[idx].bitfields.push(bf);
                }
            } else if !self.try_top(child)? && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        Ok(())
    }

    /// Parses a bitfield; fields without a name or with an impossible bit
    /// range are dropped.
    fn parse_bitfield(&mut self, node: &Element) -> Option<Bitfield> {
        let mut bf = Bitfield {
            loc: self.loc(node),
            ..Default::default()
        };
        let mut name = None;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                _ if try_varinfo_attr(&mut bf.varinfo, attr) => {}
                _ if self.try_type_attr(node, attr, &mut bf.typeinfo) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        for child in &node.children {
            if !self.try_type_tag(child, &mut bf.typeinfo) && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }

        let Some(name) = name else {
            self.missing(node, "name");
            return None;
        };
        let has_low = node.attr("pos").or(node.attr("low")).is_some();
        let has_high = node.attr("pos").or(node.attr("high")).is_some();
        let ti = &bf.typeinfo;
        if !has_low || !has_high || ti.low > ti.high || ti.high > 63 {
            let (low, high) = (ti.low, ti.high);
            self.error(
                Some(node.line),
                LoadError::InvalidBitRange { name, low, high },
            );
            return None;
        }
        bf.name = name;
        Some(bf)
    }

    //=========================================================================
    // Types
    //=========================================================================

    /// Handles the type attributes shared by bitfields, registers and
    /// spectypes.
    fn try_type_attr(&mut self, node: &Element, attr: &Attribute, ti: &mut TypeInfo) -> bool {
        match attr.name.as_str() {
            "type" => ti.name = Some(attr.value.clone()),
            "shr" => ti.shr = self.u32_attr(node, attr),
            "min" => ti.min = Some(self.num_attr(node, attr)),
            "max" => ti.max = Some(self.num_attr(node, attr)),
            "align" => ti.align = Some(self.num_attr(node, attr)),
            "radix" => ti.radix = Some(self.u32_attr(node, attr)),
            "addvariant" => ti.addvariant = self.bool_attr(node, attr),
            "pos" => {
                let pos = self.u32_attr(node, attr);
                ti.low = pos;
                ti.high = pos;
            }
            "low" => ti.low = self.u32_attr(node, attr),
            "high" => ti.high = self.u32_attr(node, attr),
            _ => return false,
        }
        true
    }

    /// Collects nested `<value>`/`<bitfield>` children of a typed node.
    fn try_type_tag(&mut self, node: &Element, ti: &mut TypeInfo) -> bool {
        match node.name.as_str() {
            "value" => {
                if let Some(value) = self.parse_value(node) {
                    if let TypeKind::Unresolved { values, .. } = &mut ti.kind {
                        values.push(value);
                    }
                }
            }
            "bitfield" => {
                if let Some(bf) = self.parse_bitfield(node) {
                    if let TypeKind::Unresolved { bitfields, .. } = &mut ti.kind {
                        bitfields.push(bf);
                    }
                }
            }
            _ => return false,
        }
        true
    }

    fn parse_spectype(&mut self, node: &Element) {
        let mut spectype = Spectype {
            loc: self.loc(node),
            ..Default::default()
        };
        let mut name = None;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                _ if self.try_type_attr(node, attr, &mut spectype.typeinfo) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        for child in &node.children {
            if !self.try_type_tag(child, &mut spectype.typeinfo) && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        let Some(name) = name else {
            self.missing(node, "name");
            return;
        };
        if self.db.spectype_idx(&name).is_some() {
            self.conflict(node, "spectype", &name, "already defined");
            return;
        }
        spectype.name = name;
        self.db.spectypes.push(spectype);
    }

    //=========================================================================
    // Domains, groups and elements
    //=========================================================================

    fn parse_domain(&mut self, node: &Element) -> Result<(), LoadError> {
        let mut name = None;
        let mut bare = false;
        let mut width = 8;
        let mut size = None;
        let mut varinfo = VarInfo::default();
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                "bare" => bare = self.bool_attr(node, attr),
                "width" => width = self.u32_attr(node, attr),
                "size" => size = Some(self.num_attr(node, attr)),
                _ if try_varinfo_attr(&mut varinfo, attr) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        let Some(name) = name else {
            self.missing(node, "name");
            return Ok(());
        };

        let idx = match self.db.domains.iter().position(|d| d.name == name) {
            Some(idx) => {
                let cur = &self.db.domains[idx];
                if cur.bare != bare
                    || cur.width != width
                    || cur.size != size
                    || !cur.varinfo.same_declaration(&varinfo)
                {
                    self.conflict(node, "domain", &name, "attributes differ");
                }
                idx
            }
            None => {
                self.db.domains.push(Domain {
                    name,
                    bare,
                    width,
                    size,
                    varinfo,
                    loc: self.loc(node),
                    ..Default::default()
                });
                self.db.domains.len() - 1
            }
        };

        for child in &node.children {
            if let Some(delem) = self.try_delem(child)? {
                self.db.domains[idx].subelems.push(delem);
            } else if !is_delem(child) && !self.try_top(child)? && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        Ok(())
    }

    fn parse_group(&mut self, node: &Element) -> Result<(), LoadError> {
        let mut name = None;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => name = Some(attr.value.clone()),
                _ => self.wrong_attr(node, attr),
            }
        }
        let Some(name) = name else {
            self.missing(node, "name");
            return Ok(());
        };

        let idx = match self.db.groups.iter().position(|g| g.name == name) {
            Some(idx) => idx,
            None => {
                self.db.groups.push(Group {
                    name,
                    subelems: Vec::new(),
                    loc: self.loc(node),
                });
                self.db.groups.len() - 1
            }
        };

        for child in &node.children {
            if let Some(delem) = self.try_delem(child)? {
                self.db.groups[idx].subelems.push(delem);
            } else if !is_delem(child) && !self.try_top(child)? && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        Ok(())
    }

    /// Parses an element if `node` is one. Elements that fail to parse are
    /// reported and yield `Ok(None)` just like non-elements; callers use
    /// [`is_delem`] to tell them apart.
    fn try_delem(&mut self, node: &Element) -> Result<Option<Delem>, LoadError> {
        match node.name.as_str() {
            "use-group" => Ok(self.parse_use_group(node)),
            "array" | "stripe" => self.parse_array_or_stripe(node),
            "reg8" | "reg16" | "reg32" | "reg64" => Ok(self.parse_reg(node)),
            _ => Ok(None),
        }
    }

    fn parse_use_group(&mut self, node: &Element) -> Option<Delem> {
        let mut name = None;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" | "ref" => name = Some(attr.value.clone()),
                _ => self.wrong_attr(node, attr),
            }
        }
        match name {
            Some(name) => Some(Delem::new(DelemKind::UseGroup(name), self.loc(node))),
            None => {
                self.missing(node, "name");
                None
            }
        }
    }

    fn parse_array_or_stripe(&mut self, node: &Element) -> Result<Option<Delem>, LoadError> {
        let is_array = node.name == "array";
        let mut subelems = Vec::new();
        let mut delem = Delem::new(DelemKind::Stripe(Vec::new()), self.loc(node));
        let mut explicit_length = false;
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => delem.name = Some(attr.value.clone()),
                "offset" => delem.placement = Placement::Fixed(self.num_attr(node, attr)),
                "offsets" => {
                    let offsets = attr
                        .value
                        .split(',')
                        .map(|tok| {
                            let tok = Attribute {
                                name: attr.name.clone(),
                                value: tok.trim().to_string(),
                            };
                            self.num_attr(node, &tok)
                        })
                        .collect();
                    delem.placement = Placement::Table(offsets);
                }
                "doffset" => delem.placement = Placement::Dynamic(attr.value.clone()),
                "doffsets" => {
                    delem.placement = Placement::DynamicTable(
                        attr.value.split(',').map(|s| s.trim().to_string()).collect(),
                    )
                }
                "length" => {
                    delem.length = self.num_attr(node, attr);
                    explicit_length = true;
                }
                "stride" => delem.stride = self.num_attr(node, attr),
                "index" => delem.index = Some(attr.value.clone()),
                "usage" => {}
                _ if try_varinfo_attr(&mut delem.varinfo, attr) => {}
                _ => self.wrong_attr(node, attr),
            }
        }

        for child in &node.children {
            if let Some(sub) = self.try_delem(child)? {
                subelems.push(sub);
            } else if !is_delem(child) && !self.try_top(child)? && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }

        if !explicit_length {
            match &delem.placement {
                Placement::Table(t) => delem.length = t.len() as u64,
                Placement::DynamicTable(t) => delem.length = t.len() as u64,
                _ => {}
            }
        }
        if is_array && delem.name.is_none() {
            self.missing(node, "name");
            return Ok(None);
        }
        delem.kind = if is_array {
            DelemKind::Array(subelems)
        } else {
            DelemKind::Stripe(subelems)
        };
        Ok(Some(delem))
    }

    fn parse_reg(&mut self, node: &Element) -> Option<Delem> {
        let width = match node.name.as_str() {
            "reg8" => 8,
            "reg16" => 16,
            "reg32" => 32,
            _ => 64,
        };
        let mut reg = Reg {
            width,
            access: Access::RW,
            typeinfo: TypeInfo::with_range(0, width - 1),
        };
        let mut delem = Delem::new(DelemKind::Stripe(Vec::new()), self.loc(node));
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => delem.name = Some(attr.value.clone()),
                "offset" => delem.placement = Placement::Fixed(self.num_attr(node, attr)),
                "length" => delem.length = self.num_attr(node, attr),
                "stride" => delem.stride = self.num_attr(node, attr),
                "access" => {
                    reg.access = match attr.value.as_str() {
                        "r" => Access::R,
                        "w" => Access::W,
                        "rw" => Access::RW,
                        _ => {
                            self.error(
                                Some(node.line),
                                LoadError::MalformedAttribute {
                                    attr: attr.name.clone(),
                                    value: attr.value.clone(),
                                    expected: "access",
                                },
                            );
                            Access::RW
                        }
                    }
                }
                "usage" => {}
                _ if try_varinfo_attr(&mut delem.varinfo, attr) => {}
                _ if self.try_type_attr(node, attr, &mut reg.typeinfo) => {}
                _ => self.wrong_attr(node, attr),
            }
        }
        for child in &node.children {
            if !self.try_type_tag(child, &mut reg.typeinfo) && !is_doc(child) {
                self.wrong_tag(node, child);
            }
        }
        if delem.name.is_none() {
            self.missing(node, "name");
            return None;
        }
        delem.kind = DelemKind::Reg(reg);
        Some(delem)
    }

    //=========================================================================
    // Copyright
    //=========================================================================

    fn parse_copyright(&mut self, node: &Element) {
        for attr in &node.attrs {
            match attr.name.as_str() {
                "year" => {
                    let year = self.num_attr(node, attr);
                    let first = &mut self.db.copyright.first_year;
                    *first = Some(first.map_or(year, |cur| cur.min(year)));
                }
                _ => self.wrong_attr(node, attr),
            }
        }
        for child in &node.children {
            match child.name.as_str() {
                "license" => {
                    let text = child.text.clone();
                    match &self.db.copyright.license {
                        Some(cur) if *cur != text => {
                            self.conflict(child, "license", "copyright", "license differs")
                        }
                        Some(_) => {}
                        None => self.db.copyright.license = Some(text),
                    }
                }
                "author" => {
                    let author = self.parse_author(child);
                    self.db.copyright.authors.push(author);
                }
                _ if is_doc(child) => {}
                _ => self.wrong_tag(node, child),
            }
        }
    }

    fn parse_author(&mut self, node: &Element) -> Author {
        let mut author = Author::default();
        for attr in &node.attrs {
            match attr.name.as_str() {
                "name" => author.name = Some(attr.value.clone()),
                "email" => author.email = Some(attr.value.clone()),
                _ => self.wrong_attr(node, attr),
            }
        }
        for child in &node.children {
            match child.name.as_str() {
                "nick" => match child.attr("name") {
                    Some(nick) => author.nicknames.push(nick.to_string()),
                    None => self.missing(child, "name"),
                },
                _ => self.wrong_tag(node, child),
            }
        }
        if !node.text.is_empty() {
            author.contributions = Some(node.text.clone());
        }
        author
    }
}

/// Element tags accepted inside domains, groups, arrays and stripes.
fn is_delem(node: &Element) -> bool {
    matches!(
        node.name.as_str(),
        "use-group" | "array" | "stripe" | "reg8" | "reg16" | "reg32" | "reg64"
    )
}
