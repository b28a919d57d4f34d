//! Merge-field templating
//!
//! Titles and messages may reference a closed set of `{token}` placeholders.
//! Anything else in braces is left alone.

use crate::types::FieldValue;

/// Tokens understood by [`render`]
pub const KNOWN_TOKENS: [&str; 4] = ["oldValue", "newValue", "recordId", "objectName"];

/// Values substituted into a template for one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeContext {
    pub old_value: String,
    pub new_value: String,
    pub record_id: String,
    pub object_name: String,
}

impl MergeContext {
    /// Build a context, formatting the old and new values for display
    pub fn new(
        old: Option<&FieldValue>,
        new: Option<&FieldValue>,
        record_id: Option<&str>,
        object_name: Option<&str>,
        placeholder: &str,
    ) -> Self {
        Self {
            old_value: format_value(old, placeholder),
            new_value: format_value(new, placeholder),
            record_id: record_id.unwrap_or_default().to_string(),
            object_name: object_name.unwrap_or_default().to_string(),
        }
    }

    fn lookup(&self, token: &str) -> Option<&str> {
        match token {
            "oldValue" => Some(&self.old_value),
            "newValue" => Some(&self.new_value),
            "recordId" => Some(&self.record_id),
            "objectName" => Some(&self.object_name),
            _ => None,
        }
    }
}

/// Format a field value for display; absent, null and "" become `placeholder`
pub fn format_value(value: Option<&FieldValue>, placeholder: &str) -> String {
    match value {
        None => placeholder.to_string(),
        Some(v) if v.is_blank() => placeholder.to_string(),
        Some(v) => v.to_string(),
    }
}

/// True if the template contains at least one known token
pub fn has_tokens(template: &str) -> bool {
    KNOWN_TOKENS
        .iter()
        .any(|token| template.contains(&format!("{{{}}}", token)))
}

/// Replace every occurrence of every known token
///
/// Tokens are disjoint literal patterns, so substitution order is irrelevant.
/// Substituted values are not rescanned.
pub fn render(template: &str, context: &MergeContext) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let candidate = &rest[open..];

        let replaced = candidate[1..].find('}').and_then(|close| {
            let name = &candidate[1..1 + close];
            context.lookup(name).map(|value| (value, close + 2))
        });

        match replaced {
            Some((value, consumed)) => {
                result.push_str(value);
                rest = &candidate[consumed..];
            }
            None => {
                result.push('{');
                rest = &candidate[1..];
            }
        }
    }

    result.push_str(rest);
    result
}
