// admbwf
// Copyright (c) 2024 The admbwf Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The value bag (spec.md §3.3): an ordered list of name/value entries carried by every ADM
//! object so `SetValues()` can extract typed fields while leaving everything it doesn't
//! recognize to round-trip verbatim.

/// One entry of an object's value bag: either an XML attribute or a child element (which may
/// itself carry attributes and nested children, e.g. a `<position>` element).
#[derive(Debug, Clone, PartialEq)]
pub enum XmlValue {
    Attr { name: String, value: String },
    Elem { name: String, text: String, attrs: Vec<(String, String)>, children: Vec<XmlValue> },
}

impl XmlValue {
    pub fn name(&self) -> &str {
        match self {
            XmlValue::Attr { name, .. } => name,
            XmlValue::Elem { name, .. } => name,
        }
    }

    pub fn attr(name: impl Into<String>, value: impl Into<String>) -> Self {
        XmlValue::Attr { name: name.into(), value: value.into() }
    }

    pub fn elem(name: impl Into<String>, text: impl Into<String>) -> Self {
        XmlValue::Elem { name: name.into(), text: text.into(), attrs: Vec::new(), children: Vec::new() }
    }
}

/// Finds the target entity's type name for a reference element/attribute name, by matching it
/// against each known kind's own `type_name() + reference_suffix()` rather than blindly
/// stripping an `IDRef`/`Ref` suffix. A blind strip is ambiguous: `audioTrackUIDRef` ends in the
/// literal substring `IDRef` too, since `audioTrackUID` itself ends in `ID` (spec.md §3.1:
/// "`audioTrackUID` uses `Ref`").
pub fn target_type_from_ref_name(name: &str) -> Option<&'static str> {
    crate::ids::EntityKind::from_reference_name(name).map(|k| k.type_name())
}

/// An ordered bag of [`XmlValue`] entries, preserving insertion order for round-trip fidelity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlValues(Vec<XmlValue>);

impl XmlValues {
    pub fn new() -> Self {
        XmlValues(Vec::new())
    }

    pub fn push(&mut self, value: XmlValue) {
        self.0.push(value);
    }

    pub fn iter(&self) -> impl Iterator<Item = &XmlValue> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends every entry from `extra` onto this bag, in order. Used by the XML codec to stash
    /// an element's unrecognized attributes/children for verbatim round-trip.
    pub fn extend(&mut self, extra: Vec<XmlValue>) {
        self.0.extend(extra);
    }

    /// Removes and returns the first attribute entry named `name`.
    pub fn take_attr(&mut self, name: &str) -> Option<String> {
        let pos = self.0.iter().position(|v| matches!(v, XmlValue::Attr { name: n, .. } if n == name))?;
        match self.0.remove(pos) {
            XmlValue::Attr { value, .. } => Some(value),
            XmlValue::Elem { .. } => unreachable!(),
        }
    }

    /// Removes and returns the first element entry named `name`.
    pub fn take_elem(&mut self, name: &str) -> Option<XmlValue> {
        let pos = self.0.iter().position(|v| matches!(v, XmlValue::Elem { name: n, .. } if n == name))?;
        Some(self.0.remove(pos))
    }

    /// Removes and returns every element entry named `name`, in original order.
    pub fn take_all_elems(&mut self, name: &str) -> Vec<XmlValue> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.0.len() {
            if matches!(&self.0[i], XmlValue::Elem { name: n, .. } if n == name) {
                taken.push(self.0.remove(i));
            }
            else {
                i += 1;
            }
        }
        taken
    }

    /// Removes and returns every entry (attribute or element) whose name is a reference suffix
    /// (`IDRef`/`Ref`), paired with the resolved target type name and target ID string
    /// (spec.md §4.6: "scanned for entries whose names end in `IDRef`... or plain `Ref`").
    pub fn take_references(&mut self) -> Vec<(String, String)> {
        let mut refs = Vec::new();
        let mut i = 0;
        while i < self.0.len() {
            let matched = match &self.0[i] {
                XmlValue::Attr { name, value } => {
                    target_type_from_ref_name(name).map(|t| (t.to_string(), value.clone()))
                }
                XmlValue::Elem { name, text, .. } => {
                    target_type_from_ref_name(name).map(|t| (t.to_string(), text.clone()))
                }
            };

            match matched {
                Some(pair) => {
                    refs.push(pair);
                    self.0.remove(i);
                }
                None => i += 1,
            }
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_attr_removes_matching_entry_only() {
        let mut bag = XmlValues::new();
        bag.push(XmlValue::attr("language", "en"));
        bag.push(XmlValue::attr("other", "x"));

        assert_eq!(bag.take_attr("language"), Some("en".to_string()));
        assert_eq!(bag.len(), 1);
        assert_eq!(bag.take_attr("language"), None);
    }

    #[test]
    fn take_references_splits_idref_and_uid_ref_correctly() {
        let mut bag = XmlValues::new();
        bag.push(XmlValue::elem("audioContentIDRef", "ACO_1001"));
        bag.push(XmlValue::elem("audioTrackUIDRef", "ATU_00000001"));
        bag.push(XmlValue::attr("language", "en"));

        let refs = bag.take_references();
        assert_eq!(refs, vec![
            ("audioContent".to_string(), "ACO_1001".to_string()),
            ("audioTrackUID".to_string(), "ATU_00000001".to_string()),
        ]);
        assert_eq!(bag.len(), 1);
    }

    #[test]
    fn target_type_prefers_idref_suffix_over_ref() {
        assert_eq!(target_type_from_ref_name("audioContentIDRef"), Some("audioContent"));
        assert_eq!(target_type_from_ref_name("audioTrackUIDRef"), Some("audioTrackUID"));
        assert_eq!(target_type_from_ref_name("language"), None);
    }
}
