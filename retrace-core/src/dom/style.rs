//! Stylesheets attached to style carriers and shadow roots

use serde::{Deserialize, Serialize};

/// A single CSS rule as exposed by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CssRule {
    /// Any rule that is not an import, kept as its CSS text
    Style(String),

    /// `@import` rule; `sheet` is `None` until the imported sheet has loaded
    Import {
        /// Imported URL as written in the rule
        href: String,
        /// Loaded sheet, possibly cross-origin
        sheet: Option<StyleSheet>,
    },
}

impl CssRule {
    /// Plain style rule
    pub fn style(text: impl Into<String>) -> Self {
        Self::Style(text.into())
    }

    /// Import rule whose sheet is not loaded
    pub fn import(href: impl Into<String>) -> Self {
        Self::Import {
            href: href.into(),
            sheet: None,
        }
    }

    /// Import rule with its loaded sheet
    pub fn import_loaded(href: impl Into<String>, sheet: StyleSheet) -> Self {
        Self::Import {
            href: href.into(),
            sheet: Some(sheet),
        }
    }

    /// CSS text of the rule itself, without inlining imports
    pub fn css_text(&self) -> String {
        match self {
            Self::Style(text) => text.clone(),
            Self::Import { href, .. } => format!("@import url(\"{}\");", href),
        }
    }
}

/// Returned when reading the rules of a cross-origin sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("stylesheet rules are not accessible")]
pub struct InaccessibleSheet;

/// A stylesheet; rules are `None` when the host refuses access (cross-origin)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StyleSheet {
    rules: Option<Vec<CssRule>>,
}

impl StyleSheet {
    /// Accessible sheet with the given rules
    pub fn new(rules: Vec<CssRule>) -> Self {
        Self { rules: Some(rules) }
    }

    /// Sheet whose rules cannot be read
    pub fn inaccessible() -> Self {
        Self { rules: None }
    }

    /// Rules of the sheet
    pub fn css_rules(&self) -> Result<&[CssRule], InaccessibleSheet> {
        self.rules.as_deref().ok_or(InaccessibleSheet)
    }

    /// Append a rule; no-op on an inaccessible sheet
    pub fn insert_rule(&mut self, rule: CssRule) {
        if let Some(rules) = self.rules.as_mut() {
            rules.push(rule);
        }
    }

    /// Whole sheet as one CSS string with accessible imports inlined.
    ///
    /// Returns `None` when the sheet itself is inaccessible. An import whose
    /// sheet is missing or inaccessible is kept as the unresolved `@import`.
    pub fn css_text(&self) -> Option<String> {
        let rules = self.css_rules().ok()?;
        Some(rules.iter().map(rule_css_text).collect())
    }

    /// Each rule rendered on its own, imports inlined
    pub fn rule_texts(&self) -> Option<Vec<String>> {
        let rules = self.css_rules().ok()?;
        Some(rules.iter().map(rule_css_text).collect())
    }
}

fn rule_css_text(rule: &CssRule) -> String {
    match rule {
        CssRule::Import {
            sheet: Some(sheet), ..
        } => sheet.css_text().unwrap_or_else(|| rule.css_text()),
        _ => rule.css_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_css_text_joins_rules() {
        let sheet = StyleSheet::new(vec![CssRule::style("body { color: red; }")]);
        assert_eq!(sheet.css_text().as_deref(), Some("body { color: red; }"));
    }

    #[test]
    fn test_css_text_inlines_accessible_imports() {
        let imported = StyleSheet::new(vec![CssRule::style("p { margin: 0; }")]);
        let sheet = StyleSheet::new(vec![CssRule::import_loaded("toto.css", imported)]);
        assert_eq!(sheet.css_text().as_deref(), Some("p { margin: 0; }"));
    }

    #[test]
    fn test_css_text_keeps_inaccessible_imports() {
        let sheet = StyleSheet::new(vec![CssRule::import_loaded(
            "toto.css",
            StyleSheet::inaccessible(),
        )]);
        assert_eq!(
            sheet.css_text().as_deref(),
            Some("@import url(\"toto.css\");")
        );
    }

    #[test]
    fn test_inaccessible_sheet_has_no_text() {
        assert!(StyleSheet::inaccessible().css_text().is_none());
        assert_eq!(
            StyleSheet::inaccessible().css_rules().unwrap_err(),
            InaccessibleSheet
        );
    }
}
