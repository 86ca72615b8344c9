//! Built-in packagers.

use fardel_bundle::Bundle;
use fardel_graph::Asset;

use crate::plugin::{Packager, PluginError};

/// Packages JS bundles as a module-map IIFE.
///
/// Each asset becomes one entry in a module map keyed by its id; a small
/// loader prelude executes the entry module. The loader is a stand-in: it
/// wires ids, not full specifier resolution.
pub struct JsPackager;

impl Packager for JsPackager {
    fn name(&self) -> &'static str {
        "packager-js"
    }

    fn package(&self, bundle: &Bundle, assets: &[Asset]) -> Result<Vec<u8>, PluginError> {
        let mut out = String::new();
        out.push_str("(function (modules, entry) {\n");
        out.push_str("  var cache = {};\n");
        out.push_str("  function load(id) {\n");
        out.push_str("    if (cache[id]) return cache[id].exports;\n");
        out.push_str("    var module = (cache[id] = { exports: {} });\n");
        out.push_str("    modules[id](load, module, module.exports);\n");
        out.push_str("    return module.exports;\n");
        out.push_str("  }\n");
        out.push_str("  load(entry);\n");
        out.push_str("})({\n");

        for asset in assets {
            if asset.asset_type != "js" {
                return Err(PluginError::new(format!(
                    "cannot package '{}' asset {} into a js bundle",
                    asset.asset_type,
                    asset.file_path.display()
                )));
            }
            out.push_str(&format!(
                "\"{}\": function (require, module, exports) {{\n{}\n}},\n",
                asset.id, asset.code
            ));
        }

        out.push_str(&format!("}}, \"{}\");\n", bundle.entry_asset_id));
        Ok(out.into_bytes())
    }
}

/// Packages CSS bundles by concatenating sheets in bundle order.
///
/// `@import` rules were already lifted into graph dependencies during
/// transformation, so plain concatenation preserves cascade order.
pub struct CssPackager;

impl Packager for CssPackager {
    fn name(&self) -> &'static str {
        "packager-css"
    }

    fn package(&self, _bundle: &Bundle, assets: &[Asset]) -> Result<Vec<u8>, PluginError> {
        let mut out = String::new();
        for asset in assets {
            if asset.asset_type != "css" {
                return Err(PluginError::new(format!(
                    "cannot package '{}' asset {} into a css bundle",
                    asset.asset_type,
                    asset.file_path.display()
                )));
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&asset.code);
        }
        Ok(out.into_bytes())
    }
}
