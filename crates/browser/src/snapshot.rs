//! Accessibility tree snapshot and ref system.
//!
//! Converts Chrome's accessibility tree into an indented text rendering with
//! element refs (`[ref=e1]`, `[ref=e2]`, ...). Refs are numbered afresh for
//! every snapshot, so a ref is only meaningful against the snapshot that
//! produced it.

use serde_json::Value;
use std::collections::HashMap;

/// An accessibility node with ref annotation.
#[derive(Debug, Clone, Default)]
pub struct AXNode {
    pub role: String,
    pub name: String,
    pub value: String,
    pub backend_node_id: Option<i64>,
    pub ref_id: Option<String>,
    pub children: Vec<AXNode>,
    pub interactive: bool,
    pub focused: bool,
    pub checked: Option<bool>,
    pub disabled: bool,
    pub readonly: bool,
    pub editable: bool,
    pub expanded: Option<bool>,
    pub level: Option<i32>,
}

/// What a ref resolves to in the live page.
#[derive(Debug, Clone, PartialEq)]
pub struct RefTarget {
    pub role: String,
    pub name: String,
    pub backend_node_id: Option<i64>,
}

/// Roles considered interactive (buttons, inputs, links, etc.).
const INTERACTIVE_ROLES: &[&str] = &[
    "button", "link", "textbox", "searchbox", "combobox", "listbox",
    "menuitem", "menuitemcheckbox", "menuitemradio", "option",
    "radio", "checkbox", "switch", "slider", "spinbutton",
    "tab", "treeitem", "textField", "select", "textarea",
];

/// Container roles that carry no meaning on their own.
const STRUCTURAL_ROLES: &[&str] = &[
    "generic", "none", "presentation", "group", "region",
    "GenericContainer", "Section", "InlineTextBox",
];

/// Names longer than this are shortened in compact renderings.
const COMPACT_NAME_LIMIT: usize = 80;

/// Parse an `Accessibility.getFullAXTree` response into a node tree.
pub fn parse_ax_tree(cdp_response: &Value) -> Vec<AXNode> {
    let Some(nodes) = cdp_response.get("nodes").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    let Some(root) = nodes.first() else {
        return Vec::new();
    };

    let node_map: HashMap<&str, &Value> = nodes
        .iter()
        .filter_map(|node| node.get("nodeId").and_then(|v| v.as_str()).map(|id| (id, node)))
        .collect();

    let root_id = root.get("nodeId").and_then(|v| v.as_str()).unwrap_or("");
    vec![build_ax_node(root_id, &node_map)]
}

fn build_ax_node(node_id: &str, node_map: &HashMap<&str, &Value>) -> AXNode {
    let Some(node) = node_map.get(node_id).copied() else {
        return AXNode {
            role: "unknown".to_string(),
            ..AXNode::default()
        };
    };

    let role = get_ax_value(node, "role");
    let interactive = INTERACTIVE_ROLES.iter().any(|r| r.eq_ignore_ascii_case(&role));

    let mut ax = AXNode {
        name: get_ax_value(node, "name"),
        value: get_ax_value(node, "value"),
        backend_node_id: node.get("backendDOMNodeId").and_then(|v| v.as_i64()),
        interactive,
        role,
        ..AXNode::default()
    };

    if let Some(props) = node.get("properties").and_then(|v| v.as_array()) {
        for prop in props {
            let prop_name = prop.get("name").and_then(|v| v.as_str()).unwrap_or("");
            let prop_value = prop.get("value").and_then(|v| v.get("value")).cloned().unwrap_or(Value::Null);
            match prop_name {
                "focused" => ax.focused = prop_value.as_bool().unwrap_or(false),
                "checked" => ax.checked = prop_value.as_bool().or(Some(prop_value.as_str() == Some("true"))),
                "disabled" => ax.disabled = prop_value.as_bool().unwrap_or(false),
                "readonly" => ax.readonly = prop_value.as_bool().unwrap_or(false),
                "editable" => ax.editable = prop_value.as_str().map_or(false, |s| !s.is_empty()),
                "expanded" => ax.expanded = prop_value.as_bool(),
                "level" => ax.level = prop_value.as_i64().and_then(|v| i32::try_from(v).ok()),
                _ => {}
            }
        }
    }

    if let Some(child_ids) = node.get("childIds").and_then(|v| v.as_array()) {
        ax.children = child_ids
            .iter()
            .filter_map(|id| id.as_str())
            .map(|id| build_ax_node(id, node_map))
            .collect();
    }

    ax
}

fn get_ax_value(node: &Value, field: &str) -> String {
    node.get(field)
        .and_then(|v| {
            // CDP wraps role/name/value as {type, value}.
            v.get("value").and_then(|val| val.as_str()).or_else(|| v.as_str())
        })
        .unwrap_or("")
        .to_string()
}

fn is_structural(role: &str) -> bool {
    STRUCTURAL_ROLES.iter().any(|r| r.eq_ignore_ascii_case(role))
}

/// Number refs across the tree starting at `e1`.
///
/// Interactive nodes, editable nodes (rich-text composers expose themselves
/// as paragraphs inside an editable region) and any named non-structural node
/// get a ref.
pub fn assign_refs(nodes: &mut [AXNode]) -> HashMap<String, RefTarget> {
    let mut counter = 0u32;
    let mut ref_map = HashMap::new();
    for node in nodes.iter_mut() {
        assign_refs_recursive(node, &mut counter, &mut ref_map);
    }
    ref_map
}

fn assign_refs_recursive(node: &mut AXNode, counter: &mut u32, ref_map: &mut HashMap<String, RefTarget>) {
    let should_assign = node.interactive
        || node.editable
        || (!node.name.is_empty() && !is_structural(&node.role));

    if should_assign {
        *counter += 1;
        let ref_id = format!("e{}", counter);
        node.ref_id = Some(ref_id.clone());
        ref_map.insert(
            ref_id,
            RefTarget {
                role: node.role.clone(),
                name: node.name.clone(),
                backend_node_id: node.backend_node_id,
            },
        );
    }

    for child in node.children.iter_mut() {
        assign_refs_recursive(child, counter, ref_map);
    }
}

/// Render the tree as indented text. Compact mode drops empty structural
/// containers and shortens long names; verbose mode keeps everything.
pub fn render_tree(nodes: &[AXNode], compact: bool, max_depth: Option<usize>) -> String {
    let mut output = String::new();
    for node in nodes {
        render_node(&mut output, node, 0, compact, max_depth);
    }
    output
}

fn render_node(output: &mut String, node: &AXNode, indent: usize, compact: bool, max_depth: Option<usize>) {
    if max_depth.is_some_and(|max| indent > max) {
        return;
    }

    if compact && is_structural(&node.role) && node.name.is_empty() && node.ref_id.is_none() {
        for child in &node.children {
            render_node(output, child, indent, compact, max_depth);
        }
        return;
    }

    if compact && node.role == "StaticText" && node.name.is_empty() {
        return;
    }

    let mut line = format!("{}- {}", "  ".repeat(indent), node.role);

    if !node.name.is_empty() {
        let name = if compact && node.name.chars().count() > COMPACT_NAME_LIMIT {
            let head: String = node.name.chars().take(COMPACT_NAME_LIMIT - 3).collect();
            format!("{}...", head)
        } else {
            node.name.clone()
        };
        line.push_str(&format!(" \"{}\"", name.replace('\n', " ")));
    }

    if let Some(ref ref_id) = node.ref_id {
        line.push_str(&format!(" [ref={}]", ref_id));
    }
    if let Some(level) = node.level {
        line.push_str(&format!(" [level={}]", level));
    }
    if node.focused {
        line.push_str(" [focused]");
    }
    if let Some(true) = node.checked {
        line.push_str(" [checked]");
    }
    if node.disabled {
        line.push_str(" [disabled]");
    }
    if node.readonly {
        line.push_str(" [readonly]");
    }
    if node.editable {
        line.push_str(" [editable]");
    }
    if let Some(expanded) = node.expanded {
        line.push_str(if expanded { " [expanded]" } else { " [collapsed]" });
    }
    if !node.value.is_empty() && node.value != node.name {
        line.push_str(&format!(" value=\"{}\"", node.value.replace('\n', " ")));
    }

    output.push_str(&line);
    output.push('\n');

    for child in &node.children {
        render_node(output, child, indent + 1, compact, max_depth);
    }
}
