use markup5ever::QualName;
use std::str::FromStr;

use super::{Attribute, Attributes};
use crate::util::html_name;

#[derive(Debug, Clone)]
pub struct ElementData {
    /// The elements tag name, namespace and prefix
    pub name: QualName,

    /// The elements id attribute (if it has one)
    pub id: Option<String>,

    /// The element's attributes
    pub attrs: Attributes,
}

impl ElementData {
    pub fn new(name: QualName, attrs: Vec<Attribute>) -> Self {
        let id = attrs
            .iter()
            .find(|attr| &*attr.name.local == "id")
            .map(|attr| attr.value.clone());

        ElementData {
            name,
            id,
            attrs: Attributes::new(attrs),
        }
    }

    /// The lowercase local tag name (e.g. `"p"`)
    pub fn tag(&self) -> &str {
        &self.name.local
    }

    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        let attr = self.attrs.iter().find(|attr| &*attr.name.local == name)?;
        Some(&attr.value)
    }

    pub fn attr_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.attr(name)?.parse::<T>().ok()
    }

    /// Detects the presence of the attribute, treating *any* value as truthy.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|attr| &*attr.name.local == name)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        if name == "id" {
            self.id = Some(value.to_string());
        }
        self.attrs.set(html_name(name), value);
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<Attribute> {
        if name == "id" {
            self.id = None;
        }
        self.attrs.remove_local(name)
    }

    /// Iterate over the whitespace separated entries of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class")
            .unwrap_or("")
            .split_ascii_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }
        let value = match self.attr("class") {
            Some(existing) if !existing.trim().is_empty() => format!("{} {class}", existing.trim()),
            _ => class.to_string(),
        };
        self.set_attr("class", &value);
    }

    pub fn remove_class(&mut self, class: &str) {
        if !self.has_class(class) {
            return;
        }
        let value = self
            .classes()
            .filter(|c| *c != class)
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr("class", &value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_list_editing() {
        let mut el = ElementData::new(html_name("span"), Vec::new());
        el.add_class("annotator-hl");
        el.add_class("annotator-hl");
        el.add_class("active");
        assert_eq!(el.attr("class"), Some("annotator-hl active"));

        el.remove_class("annotator-hl");
        assert!(!el.has_class("annotator-hl"));
        assert!(el.has_class("active"));
    }

    #[test]
    fn id_attribute_is_tracked() {
        let mut el = ElementData::new(html_name("div"), Vec::new());
        el.set_attr("id", "counts");
        assert_eq!(el.id.as_deref(), Some("counts"));
        el.remove_attr("id");
        assert_eq!(el.id, None);
    }
}
