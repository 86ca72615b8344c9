//! Built-in transformers.
//!
//! These are dependency-scanning stand-ins, not real language frontends:
//! they extract module specifiers well enough to drive graph construction
//! and pass content through otherwise. Each is a pure function of its
//! input, which is what makes transform results cacheable by content key.

use std::collections::BTreeMap;

use crate::plugin::{
    DiscoveredDependency, PluginError, TransformInput, TransformOutput, Transformer,
};

/// Scans JavaScript for `import`, `require()`, and dynamic `import()`
/// specifiers. Dynamic imports become asynchronous dependencies.
pub struct JsTransformer;

impl Transformer for JsTransformer {
    fn name(&self) -> &'static str {
        "transformer-js"
    }

    fn transform(&self, input: &TransformInput) -> Result<TransformOutput, PluginError> {
        let mut dependencies = Vec::new();

        // Call-form imports can appear anywhere in an expression.
        for specifier in specifiers_after(&input.code, "import(") {
            push_unique(&mut dependencies, DiscoveredDependency::lazy(specifier));
        }
        for specifier in specifiers_after(&input.code, "require(") {
            push_unique(&mut dependencies, DiscoveredDependency::sync(specifier));
        }

        // Statement-form imports: `import x from "spec"` and `import "spec"`.
        for line in input.code.lines() {
            let line = line.trim_start();
            if !line.starts_with("import") || line.starts_with("import(") {
                continue;
            }
            if let Some(specifier) = first_quoted(&line["import".len()..]) {
                push_unique(&mut dependencies, DiscoveredDependency::sync(specifier));
            }
        }

        Ok(TransformOutput {
            asset_type: "js".to_string(),
            code: input.code.clone(),
            dependencies,
            meta: BTreeMap::new(),
        })
    }
}

/// Wraps a JSON document as a CommonJS module export.
pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn name(&self) -> &'static str {
        "transformer-json"
    }

    fn transform(&self, input: &TransformInput) -> Result<TransformOutput, PluginError> {
        let value: serde_json::Value = serde_json::from_str(&input.code)
            .map_err(|e| PluginError::new(format!("invalid JSON: {e}")))?;

        Ok(TransformOutput {
            asset_type: "js".to_string(),
            code: format!("module.exports = {value};"),
            dependencies: Vec::new(),
            meta: BTreeMap::new(),
        })
    }
}

/// Scans CSS for `@import` rules. Matched rules are lifted into graph
/// dependencies and stripped from the output, since packaging emits the
/// imported sheets inline.
pub struct CssTransformer;

impl Transformer for CssTransformer {
    fn name(&self) -> &'static str {
        "transformer-css"
    }

    fn transform(&self, input: &TransformInput) -> Result<TransformOutput, PluginError> {
        let mut dependencies = Vec::new();
        let mut kept_lines = Vec::new();

        for line in input.code.lines() {
            let trimmed = line.trim_start();
            if let Some(rest) = trimmed.strip_prefix("@import") {
                if let Some(specifier) = first_quoted(rest) {
                    push_unique(&mut dependencies, DiscoveredDependency::sync(specifier));
                    continue;
                }
            }
            kept_lines.push(line);
        }

        Ok(TransformOutput {
            asset_type: "css".to_string(),
            code: kept_lines.join("\n"),
            dependencies,
            meta: BTreeMap::new(),
        })
    }
}

/// Extracts the quoted string immediately following each occurrence of
/// `marker` in `code`.
fn specifiers_after(code: &str, marker: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = code;
    while let Some(pos) = rest.find(marker) {
        rest = &rest[pos + marker.len()..];
        if let Some(specifier) = leading_quoted(rest) {
            found.push(specifier);
        }
    }
    found
}

/// Reads a quoted string at the start of `text`, after optional whitespace.
fn leading_quoted(text: &str) -> Option<String> {
    let text = text.trim_start();
    let quote = text.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let body = &text[1..];
    let end = body.find(quote)?;
    Some(body[..end].to_string())
}

/// Finds the first quoted string anywhere in `text`, including inside a
/// CSS `url(...)` wrapper.
fn first_quoted(text: &str) -> Option<String> {
    let start = text.find(['"', '\''])?;
    leading_quoted(&text[start..])
}

fn push_unique(deps: &mut Vec<DiscoveredDependency>, dep: DiscoveredDependency) {
    if !deps.contains(&dep) {
        deps.push(dep);
    }
}
