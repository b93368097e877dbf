use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One decoded wire unit: zero or more node entries and zero or more edge
/// entries, in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fragment {
    pub nodes: Vec<NodeUpdate>,
    pub edges: Vec<EdgeUpdate>,
}

/// A node entry as it arrived. `None` fields leave the stored value alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeUpdate {
    pub id: Option<String>,
    pub label: Option<String>,
    pub external: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeUpdate {
    pub source: Option<String>,
    pub target: Option<String>,
}

impl NodeUpdate {
    pub fn new(id: impl Into<String>, label: impl Into<String>, external: bool) -> Self {
        Self {
            id: Some(id.into()),
            label: Some(label.into()),
            external: Some(external),
        }
    }
}

impl EdgeUpdate {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            target: Some(target.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawFragment {
    #[serde(default)]
    nodes: Option<Value>,
    #[serde(default)]
    edges: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNode {
    #[serde(default, deserialize_with = "flexible_id")]
    id: Option<String>,
    #[serde(default)]
    label: Option<Value>,
    #[serde(default)]
    url: Option<Value>,
    #[serde(default)]
    external: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEdge {
    #[serde(default, deserialize_with = "flexible_id")]
    source: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    target: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    from: Option<String>,
    #[serde(default, deserialize_with = "flexible_id")]
    to: Option<String>,
}

fn flexible_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_from_value))
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn entries(field: Option<Value>, kind: &str) -> Vec<Value> {
    match field {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        Some(other) => {
            tracing::warn!(kind, found = %json_type(&other), "fragment field is not a list; ignoring");
            Vec::new()
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl Fragment {
    /// Decodes one parsed JSON value. Returns `None` when the value is not an
    /// object; malformed entries inside an object become updates with missing
    /// fields so the store can count them as skipped.
    pub fn from_value(value: Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }

        let raw = RawFragment::deserialize(value).ok()?;

        let nodes = entries(raw.nodes, "nodes")
            .iter()
            .map(|entry| {
                let Ok(node) = RawNode::deserialize(entry) else {
                    return NodeUpdate::default();
                };
                let label = node
                    .label
                    .as_ref()
                    .and_then(Value::as_str)
                    .or_else(|| node.url.as_ref().and_then(Value::as_str))
                    .map(str::to_owned);
                NodeUpdate {
                    id: node.id,
                    label,
                    external: node.external.as_ref().and_then(Value::as_bool),
                }
            })
            .collect();

        let edges = entries(raw.edges, "edges")
            .iter()
            .map(|entry| {
                let Ok(edge) = RawEdge::deserialize(entry) else {
                    return EdgeUpdate::default();
                };
                EdgeUpdate {
                    source: edge.source.or(edge.from),
                    target: edge.target.or(edge.to),
                }
            })
            .collect();

        Some(Self { nodes, edges })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_client_shape() {
        let fragment = Fragment::from_value(json!({
            "nodes": [{"id": "a", "url": "http://x/a", "external": false}],
            "edges": [{"source": "a", "target": "b"}]
        }))
        .expect("object fragment");

        assert_eq!(
            fragment.nodes,
            vec![NodeUpdate::new("a", "http://x/a", false)]
        );
        assert_eq!(fragment.edges, vec![EdgeUpdate::new("a", "b")]);
    }

    #[test]
    fn decodes_server_shape_with_integer_ids() {
        let fragment = Fragment::from_value(json!({
            "nodes": [{"id": 7, "label": "http://x/", "external": true, "group": "0"}],
            "edges": [{"from": 7, "to": 9, "arrows": "to, from"}]
        }))
        .expect("object fragment");

        assert_eq!(fragment.nodes, vec![NodeUpdate::new("7", "http://x/", true)]);
        assert_eq!(fragment.edges, vec![EdgeUpdate::new("7", "9")]);
    }

    #[test]
    fn label_wins_over_url() {
        let fragment = Fragment::from_value(json!({
            "nodes": [{"id": "a", "label": "Home", "url": "http://x/"}]
        }))
        .expect("object fragment");

        assert_eq!(fragment.nodes[0].label.as_deref(), Some("Home"));
    }

    #[test]
    fn malformed_entries_keep_their_slot_without_id() {
        let fragment = Fragment::from_value(json!({
            "nodes": [{"url": "http://x/no-id"}, 42, {"id": "", "external": "yes"}],
            "edges": [{"source": "a"}, "junk"]
        }))
        .expect("object fragment");

        assert_eq!(fragment.nodes.len(), 3);
        assert!(fragment.nodes.iter().all(|node| node.id.is_none()));
        assert_eq!(fragment.edges.len(), 2);
        assert!(fragment.edges.iter().all(|edge| edge.target.is_none()));
    }

    #[test]
    fn non_list_fields_are_ignored() {
        let fragment = Fragment::from_value(json!({"nodes": {"id": "a"}, "edges": null}))
            .expect("object fragment");
        assert!(fragment.is_empty());
    }

    #[test]
    fn non_object_values_are_rejected() {
        assert!(Fragment::from_value(json!([1, 2, 3])).is_none());
        assert!(Fragment::from_value(json!("nodes")).is_none());
    }
}
