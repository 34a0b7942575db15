//! Redaction policy applied during snapshot and mutation emission
//!
//! Levels are resolved per node from the `data-retrace-privacy` attribute on
//! the node or its nearest ancestor, crossing shadow boundaries through the
//! host, and fall back to the configured default.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeKey, NodeKind};

/// Attribute carrying a privacy override
pub const PRIVACY_ATTR_NAME: &str = "data-retrace-privacy";

/// Replacement for masked attribute and form values
pub const MASK_TOKEN: &str = "***";

/// Replacement for each masked word of text
pub const TEXT_MASK_RUN: &str = "xxx";

/// Privacy level, ordered from least to most restrictive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrivacyLevel {
    Allow,
    MaskUserInput,
    Mask,
    Hidden,
}

impl PrivacyLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::MaskUserInput => "mask-user-input",
            Self::Mask => "mask",
            Self::Hidden => "hidden",
        }
    }

    /// Whether form control values are replaced at this level
    pub fn masks_user_input(self) -> bool {
        matches!(self, Self::MaskUserInput | Self::Mask)
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "mask-user-input" => Ok(Self::MaskUserInput),
            "mask" => Ok(Self::Mask),
            "hidden" => Ok(Self::Hidden),
            other => Err(format!("unknown privacy level: {}", other)),
        }
    }
}

// Attributes kept verbatim under Mask
const MASK_ALLOWED_ATTRIBUTES: &[&str] = &[
    "id",
    "class",
    "style",
    "type",
    "name",
    "rel",
    "role",
    "dir",
    "lang",
    "tabindex",
    "width",
    "height",
    "for",
    "disabled",
    "hidden",
    "media",
    "colspan",
    "rowspan",
    "_cssText",
];

// Attributes kept under Mask with their value replaced
const MASK_TEXT_ATTRIBUTES: &[&str] = &["title", "alt", "placeholder", "aria-label"];

const FORM_CONTROL_TAGS: &[&str] = &["input", "textarea", "select", "option"];

/// True for tags whose value is user input
pub fn is_form_control(tag_name: &str) -> bool {
    FORM_CONTROL_TAGS.contains(&tag_name)
}

/// Explicit override carried by `node`, if any
pub fn own_level(doc: &Document, node: NodeKey) -> Option<PrivacyLevel> {
    doc.attribute(node, PRIVACY_ATTR_NAME)
        .and_then(|value| value.parse().ok())
}

/// Level of a node whose parent resolved to `parent_level`.
///
/// A hidden parent always wins; otherwise the node's own override applies.
pub fn child_level(doc: &Document, node: NodeKey, parent_level: PrivacyLevel) -> PrivacyLevel {
    if parent_level == PrivacyLevel::Hidden {
        return PrivacyLevel::Hidden;
    }
    own_level(doc, node).unwrap_or(parent_level)
}

/// Resolve the level of `node` from the nearest override above it
pub fn effective_level(doc: &Document, node: NodeKey, default_level: PrivacyLevel) -> PrivacyLevel {
    let mut nearest = None;
    let mut current = Some(node);
    while let Some(key) = current {
        if let Some(level) = own_level(doc, key) {
            if level == PrivacyLevel::Hidden {
                return PrivacyLevel::Hidden;
            }
            nearest.get_or_insert(level);
        }
        current = doc.parent_or_host(key);
    }
    nearest.unwrap_or(default_level)
}

/// Replace every word with a fixed mask run, keeping whitespace
pub fn redact_text(text: &str, level: PrivacyLevel) -> String {
    match level {
        PrivacyLevel::Allow | PrivacyLevel::MaskUserInput => text.to_string(),
        PrivacyLevel::Hidden => String::new(),
        PrivacyLevel::Mask => {
            let mut out = String::with_capacity(text.len());
            let mut in_word = false;
            for ch in text.chars() {
                if ch.is_whitespace() {
                    out.push(ch);
                    in_word = false;
                } else if !in_word {
                    out.push_str(TEXT_MASK_RUN);
                    in_word = true;
                }
            }
            out
        }
    }
}

/// Redacted value of an attribute, or `None` when it must be dropped
pub fn redact_attribute(
    tag_name: &str,
    name: &str,
    value: &str,
    level: PrivacyLevel,
) -> Option<String> {
    if name == PRIVACY_ATTR_NAME {
        return Some(value.to_string());
    }
    if level == PrivacyLevel::Hidden {
        return None;
    }
    if name == "value" && is_form_control(tag_name) && level.masks_user_input() {
        return Some(MASK_TOKEN.to_string());
    }
    match level {
        PrivacyLevel::Allow | PrivacyLevel::MaskUserInput => Some(value.to_string()),
        _ if MASK_ALLOWED_ATTRIBUTES.contains(&name) => Some(value.to_string()),
        _ if tag_name == "link" && name == "href" => Some(value.to_string()),
        _ if MASK_TEXT_ATTRIBUTES.contains(&name) || name.starts_with("data-") => {
            Some(MASK_TOKEN.to_string())
        }
        _ => None,
    }
}

/// Policy bound to a default level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedactionPolicy {
    default_level: PrivacyLevel,
}

impl RedactionPolicy {
    pub fn new(default_level: PrivacyLevel) -> Self {
        Self { default_level }
    }

    pub fn default_level(&self) -> PrivacyLevel {
        self.default_level
    }

    pub fn effective_level(&self, doc: &Document, node: NodeKey) -> PrivacyLevel {
        effective_level(doc, node, self.default_level)
    }

    /// Level inherited by the children of `node`; the default for roots
    pub fn level_below(&self, doc: &Document, node: Option<NodeKey>) -> PrivacyLevel {
        node.map(|node| self.effective_level(doc, node))
            .unwrap_or(self.default_level)
    }

    /// Redacted current value of a form control.
    ///
    /// Password inputs are masked whatever the level.
    pub fn input_value(&self, doc: &Document, control: NodeKey, level: PrivacyLevel) -> Option<String> {
        let element = doc.element(control)?;
        if !is_form_control(&element.tag_name) || element.is_checkable() {
            return None;
        }
        let value = doc.value(control)?;
        let is_password =
            element.tag_name == "input" && element.input_type().as_deref() == Some("password");
        if is_password || level.masks_user_input() {
            Some(MASK_TOKEN.to_string())
        } else {
            Some(value.to_string())
        }
    }

    /// Redacted character data of a text-like node under `parent_level`.
    ///
    /// Returns `None` under Hidden.
    pub fn text_content(&self, doc: &Document, node: NodeKey, parent_level: PrivacyLevel) -> Option<String> {
        let text = doc.text(node)?;
        let parent_tag = doc.parent(node).and_then(|parent| doc.tag_name(parent));
        match parent_level {
            PrivacyLevel::Hidden => None,
            _ if parent_tag == Some("style") => Some(text.to_string()),
            PrivacyLevel::MaskUserInput if matches!(parent_tag, Some("textarea" | "option")) => {
                Some(redact_text(text, PrivacyLevel::Mask))
            }
            level => match doc.kind(node) {
                NodeKind::Comment(_) | NodeKind::Text(_) => Some(redact_text(text, level)),
                _ => Some(text.to_string()),
            },
        }
    }
}

impl Default for RedactionPolicy {
    fn default() -> Self {
        Self::new(PrivacyLevel::Allow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_text_keeps_whitespace() {
        assert_eq!(redact_text("foo bar", PrivacyLevel::Mask), "xxx xxx");
        assert_eq!(
            redact_text("  a  longer\ttext\n", PrivacyLevel::Mask),
            "  xxx  xxx\txxx\n"
        );
        assert_eq!(redact_text("foo bar", PrivacyLevel::Allow), "foo bar");
        assert_eq!(redact_text("", PrivacyLevel::Mask), "");
    }

    #[test]
    fn test_redact_attribute_rules() {
        use PrivacyLevel::*;

        assert_eq!(redact_attribute("input", "value", "secret", Mask).as_deref(), Some("***"));
        assert_eq!(
            redact_attribute("input", "value", "secret", MaskUserInput).as_deref(),
            Some("***")
        );
        assert_eq!(redact_attribute("input", "value", "secret", Allow).as_deref(), Some("secret"));
        assert_eq!(redact_attribute("div", "data-foo", "bar", Mask).as_deref(), Some("***"));
        assert_eq!(redact_attribute("div", "class", "card", Mask).as_deref(), Some("card"));
        assert_eq!(redact_attribute("a", "href", "https://x.test", Mask), None);
        assert_eq!(
            redact_attribute("link", "href", "main.css", Mask).as_deref(),
            Some("main.css")
        );
        assert_eq!(
            redact_attribute("div", PRIVACY_ATTR_NAME, "mask", Mask).as_deref(),
            Some("mask")
        );
        assert_eq!(redact_attribute("div", "class", "card", Hidden), None);
    }

    #[test]
    fn test_effective_level_nearest_override() {
        let mut doc = Document::new("https://example.test/");
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        let leaf = doc.create_element("span");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);
        doc.append_child(inner, leaf);
        doc.set_attribute(outer, PRIVACY_ATTR_NAME, "mask");
        doc.set_attribute(inner, PRIVACY_ATTR_NAME, "allow");

        assert_eq!(effective_level(&doc, leaf, PrivacyLevel::Hidden), PrivacyLevel::Allow);
        assert_eq!(effective_level(&doc, outer, PrivacyLevel::Allow), PrivacyLevel::Mask);
        assert_eq!(
            effective_level(&doc, doc.body(), PrivacyLevel::MaskUserInput),
            PrivacyLevel::MaskUserInput
        );
    }

    #[test]
    fn test_hidden_ancestor_cannot_be_overridden() {
        let mut doc = Document::new("https://example.test/");
        let outer = doc.create_element("div");
        let inner = doc.create_element("div");
        doc.append_child(doc.body(), outer);
        doc.append_child(outer, inner);
        doc.set_attribute(outer, PRIVACY_ATTR_NAME, "hidden");
        doc.set_attribute(inner, PRIVACY_ATTR_NAME, "allow");

        assert_eq!(effective_level(&doc, inner, PrivacyLevel::Allow), PrivacyLevel::Hidden);
        assert_eq!(
            child_level(&doc, inner, PrivacyLevel::Hidden),
            PrivacyLevel::Hidden
        );
    }

    #[test]
    fn test_level_crosses_shadow_boundary() {
        let mut doc = Document::new("https://example.test/");
        let host = doc.create_element("div");
        doc.append_child(doc.body(), host);
        doc.set_attribute(host, PRIVACY_ATTR_NAME, "mask");
        let shadow = doc.attach_shadow(host);
        let span = doc.create_element("span");
        doc.append_child(shadow, span);

        assert_eq!(effective_level(&doc, span, PrivacyLevel::Allow), PrivacyLevel::Mask);
    }

    #[test]
    fn test_input_value_masking() {
        let mut doc = Document::new("https://example.test/");
        let policy = RedactionPolicy::new(PrivacyLevel::Allow);
        let text = doc.create_element("input");
        let password = doc.create_element("input");
        doc.set_attribute(password, "type", "password");
        doc.append_child(doc.body(), text);
        doc.append_child(doc.body(), password);
        doc.set_value(text, "hello");
        doc.set_value(password, "hunter2");

        assert_eq!(policy.input_value(&doc, text, PrivacyLevel::Allow).as_deref(), Some("hello"));
        assert_eq!(
            policy.input_value(&doc, text, PrivacyLevel::MaskUserInput).as_deref(),
            Some("***")
        );
        assert_eq!(
            policy.input_value(&doc, password, PrivacyLevel::Allow).as_deref(),
            Some("***")
        );
    }

    #[test]
    fn test_textarea_text_is_user_input() {
        let mut doc = Document::new("https://example.test/");
        let policy = RedactionPolicy::default();
        let textarea = doc.create_element("textarea");
        let label = doc.create_element("label");
        let typed = doc.create_text("typed words");
        let caption = doc.create_text("Name");
        doc.append_child(doc.body(), textarea);
        doc.append_child(doc.body(), label);
        doc.append_child(textarea, typed);
        doc.append_child(label, caption);

        assert_eq!(
            policy.text_content(&doc, typed, PrivacyLevel::MaskUserInput).as_deref(),
            Some("xxx xxx")
        );
        assert_eq!(
            policy.text_content(&doc, caption, PrivacyLevel::MaskUserInput).as_deref(),
            Some("Name")
        );
        assert_eq!(policy.text_content(&doc, caption, PrivacyLevel::Hidden), None);
    }

    #[test]
    fn test_level_parsing() {
        assert_eq!("mask-user-input".parse::<PrivacyLevel>(), Ok(PrivacyLevel::MaskUserInput));
        assert_eq!(" Hidden ".parse::<PrivacyLevel>(), Ok(PrivacyLevel::Hidden));
        assert!("secret".parse::<PrivacyLevel>().is_err());
        assert!(PrivacyLevel::Hidden > PrivacyLevel::Mask);
    }
}
