//! Warm-up prompt construction

use crate::model::ModelKind;

/// Prompt text for one warm-up call. Built once and consumed by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload {
    text: String,
    kind: ModelKind,
}

impl PromptPayload {
    /// Local models get the plain text; remote models get it escaped and
    /// wrapped as a single system turn of chat markup.
    pub fn build(collection: &str, content: &str, kind: ModelKind) -> Self {
        let plain = format!(
            "### Context from LocalDocs:\nCollection: {}\nFull Document Content:\n{}\n\n",
            collection, content
        );
        let text = match kind {
            ModelKind::Local => plain,
            ModelKind::Remote => format!("<chat><system>{}</system></chat>", escape_html(&plain)),
        };
        Self { text, kind }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }
}

/// Escape `&`, `<`, `>` and `"` for embedding in chat markup.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
