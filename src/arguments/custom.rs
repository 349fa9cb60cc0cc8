//! Raw option strings built by the caller.

use super::Argument;

/// A pre-rendered option string, e.g. `-c:v libx264 -crf 20`, passed through
/// unchanged.
#[derive(Debug, Clone)]
pub struct CustomArgument {
    text: String,
}

impl CustomArgument {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl Argument for CustomArgument {
    fn text(&self) -> String {
        self.text.clone()
    }
}
