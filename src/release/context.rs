//! Per-run release aggregates: resource map and pack table.

use indexmap::IndexMap;
use serde::Serialize;

/// Bundle name → ordered member subpaths.
pub type PackTable = IndexMap<String, Vec<String>>;

/// One resource-map record.
///
/// Field presence follows the wire format: `extras` only when the file has
/// its own metadata, `deps` only when `requires` is non-empty.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MapEntry {
    /// URL the runtime loader fetches the resource from
    pub uri: String,
    /// Resolved type extension, leading separator stripped
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extras: Option<serde_json::Map<String, serde_json::Value>>,
    /// Ordered dependency ids
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deps: Option<Vec<String>>,
}

/// The two map namespaces consumed by the runtime loader.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResourceMap {
    /// Source resources
    pub res: IndexMap<String, MapEntry>,
    /// Packaged bundles
    pub pkg: IndexMap<String, MapEntry>,
}

/// Map namespace selector for collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Res,
    Pkg,
}

/// Per-invocation aggregate handed to hooks and packaging phases.
///
/// Exclusively owned by one release run and returned in its report.
#[derive(Debug, Default)]
pub struct ReleaseContext {
    /// id → subpath for every mapped file
    pub ids: IndexMap<String, String>,
    /// The resource map under construction
    pub map: ResourceMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_entry_optional_fields_omitted() {
        let entry = MapEntry {
            uri: "/a.js".to_string(),
            kind: "js".to_string(),
            extras: None,
            deps: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(json, r#"{"uri":"/a.js","type":"js"}"#);
    }

    #[test]
    fn test_map_entry_with_deps() {
        let entry = MapEntry {
            uri: "/a.js".to_string(),
            kind: "js".to_string(),
            extras: None,
            deps: Some(vec!["b.js".to_string()]),
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains(r#""deps":["b.js"]"#));
    }

    #[test]
    fn test_resource_map_shape() {
        let map = ResourceMap::default();
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"res":{},"pkg":{}}"#);
    }
}
