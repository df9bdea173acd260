use super::edit::{EditError, ModifyOptions, apply_edits, set_value};
use super::formatter::{FormattingOptions, format};
use super::tree::{Node, ParseError, ParseOptions, PathSegment, parse_tree};
use serde_json::Value;

/// JSONC text that can be edited in place.
///
/// Every operation works on byte offsets of the current text, so comments and
/// whitespace outside the touched region survive untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDocument {
    text: String,
}

impl TokenDocument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn tree(&self) -> Result<Option<Node>, ParseError> {
        parse_tree(&self.text, ParseOptions::JSONC)
    }

    /// Plain value of the current text, `None` for an empty document.
    pub fn value(&self) -> Result<Option<Value>, ParseError> {
        Ok(self.tree()?.map(|root| root.to_value()))
    }

    /// Set the value at `path`, or remove it when `value` is `None`.
    pub fn set(
        &mut self,
        path: &[PathSegment],
        value: Option<&Value>,
        options: ModifyOptions,
    ) -> Result<(), EditError> {
        let edits = set_value(&self.text, path, value, options)?;
        if !edits.is_empty() {
            self.text = apply_edits(&self.text, &edits)?;
        }
        Ok(())
    }

    /// Normalize whitespace across the document.
    pub fn format(&mut self, options: &FormattingOptions) -> Result<(), EditError> {
        let edits = format(&self.text, options);
        if !edits.is_empty() {
            self.text = apply_edits(&self.text, &edits)?;
        }
        Ok(())
    }
}
