//! Tool naming for plugin functions.
//!
//! Each plugin function is exposed as a tool named `<plugin>__<function>`
//! (e.g., `manageClusterContextPlugin__setClusterContext`) whose description
//! starts with `[via <plugin>]`.

use std::sync::Arc;

use rmcp::model::Tool;

use crate::plugin::FunctionDescriptor;

const SEPARATOR: &str = "__";

/// Build the namespaced tool for one function of `plugin`.
pub fn function_tool(plugin: &str, function: &FunctionDescriptor) -> Tool {
    let description = if function.description.is_empty() {
        format!("[via {}]", plugin)
    } else {
        format!("[via {}] {}", plugin, function.description)
    };
    Tool {
        name: namespaced_name(plugin, &function.name).into(),
        title: None,
        description: Some(description.into()),
        input_schema: Arc::new(function.input_schema()),
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

pub fn namespaced_name(plugin: &str, function: &str) -> String {
    format!("{}{}{}", plugin, SEPARATOR, function)
}

/// Extract (plugin, function) from a namespaced tool name.
/// Returns None if no double underscore separator found.
pub fn split_tool_name(namespaced: &str) -> Option<(&str, &str)> {
    namespaced.split_once(SEPARATOR)
}
