use serde::Serialize;

/// Errors and warnings collected while validating one part of a config.
///
/// Children hold the diagnostics of nested scopes (a named environment, a
/// single binding). An error anywhere in the tree means the config must not
/// be used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub description: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Diagnostics>,
}

impl Diagnostics {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Attach a child; empty children are dropped.
    pub fn add_child(&mut self, child: Diagnostics) {
        if child.has_errors() || child.has_warnings() {
            self.children.push(child);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.children.iter().any(Diagnostics::has_errors)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || self.children.iter().any(Diagnostics::has_warnings)
    }

    pub fn render_errors(&self) -> String {
        self.render(|d| &d.errors, Diagnostics::has_errors)
    }

    pub fn render_warnings(&self) -> String {
        self.render(|d| &d.warnings, Diagnostics::has_warnings)
    }

    fn render(
        &self,
        messages: fn(&Diagnostics) -> &Vec<String>,
        has: fn(&Diagnostics) -> bool,
    ) -> String {
        let mut lines = Vec::new();
        for child in self.children.iter().filter(|c| has(c)) {
            lines.push(indent(&child.render(messages, has), "  "));
        }
        for message in messages(self) {
            lines.push(format!("  - {}", indent(message, "    ").trim_start()));
        }
        if lines.is_empty() {
            return String::new();
        }
        format!("{}\n{}", self.description, lines.join("\n"))
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_errors_propagate() {
        let mut root = Diagnostics::new("root");
        let mut child = Diagnostics::new("child");
        child.error("bad");
        root.add_child(child);
        root.add_child(Diagnostics::new("empty"));

        assert!(root.has_errors());
        assert!(!root.has_warnings());
        assert_eq!(root.children.len(), 1);
    }

    #[test]
    fn test_render_nests_children() {
        let mut root = Diagnostics::new("Processing wrangler.toml configuration:");
        root.warn("top warning\nsecond line");
        let mut child = Diagnostics::new("\"env.staging\" environment configuration");
        child.warn("env warning");
        root.add_child(child);

        assert_eq!(
            root.render_warnings(),
            "Processing wrangler.toml configuration:\n\
             \x20\x20\"env.staging\" environment configuration\n\
             \x20\x20\x20\x20- env warning\n\
             \x20\x20- top warning\n\
             \x20\x20\x20\x20second line"
        );
        assert_eq!(root.render_errors(), "");
    }
}
