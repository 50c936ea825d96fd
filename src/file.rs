//! Project file abstraction.
//!
//! A [`ProjectFile`] is a single resource tracked by the release pipeline.
//! Files are identified by their `subpath` (project-relative, with a leading
//! separator) and carry the flags the pipeline consults: whether the file is
//! released, whether it contributes a resource-map entry, which bundle it
//! packs into, and any derived artifacts produced while compiling it.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Working-set registry: subpath → file, in discovery order.
///
/// Insertion with an existing key keeps the original position and replaces
/// the value (last write wins).
pub type FileSet = IndexMap<String, ProjectFile>;

/// Resolve the output extension for a source extension.
///
/// Source formats that compile to another type report the compiled
/// extension (`.less` files release as `.css`, `.ts` as `.js`, and so on).
pub fn resolved_ext(ext: &str) -> &str {
    match ext {
        ".less" | ".scss" | ".sass" | ".styl" => ".css",
        ".ts" | ".tsx" | ".jsx" | ".coffee" => ".js",
        ".md" => ".html",
        other => other,
    }
}

/// Extract the extension (with leading dot) from a subpath.
pub fn ext_of(subpath: &str) -> &str {
    match subpath.rfind('.') {
        Some(idx) if !subpath[idx..].contains('/') => &subpath[idx..],
        _ => "",
    }
}

/// File content: UTF-8 text, or raw bytes for binary assets.
///
/// Discovery keeps binary assets (images, fonts) byte-for-byte. Token
/// substitution and concatenation apply to text only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Bytes(Vec<u8>),
}

impl FileContent {
    /// Decode bytes as UTF-8, keeping them raw when decoding fails.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => FileContent::Text(text),
            Err(e) => FileContent::Bytes(e.into_bytes()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FileContent::Text(text) => Some(text),
            FileContent::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileContent::Text(text) => text.as_bytes(),
            FileContent::Bytes(bytes) => bytes,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FileContent::Text(_))
    }
}

impl Default for FileContent {
    fn default() -> Self {
        FileContent::Text(String::new())
    }
}

impl From<String> for FileContent {
    fn from(text: String) -> Self {
        FileContent::Text(text)
    }
}

impl From<&str> for FileContent {
    fn from(text: &str) -> Self {
        FileContent::Text(text.to_string())
    }
}

impl From<Vec<u8>> for FileContent {
    fn from(bytes: Vec<u8>) -> Self {
        FileContent::Bytes(bytes)
    }
}

impl PartialEq<str> for FileContent {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for FileContent {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Overrides for a file derived as a compile side effect.
///
/// A derived record describes a secondary artifact; the full file is built
/// with [`ProjectFile::derive`], which copies the parent's capability flags
/// and applies these overrides on top.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivedSpec {
    /// Subpath the derived file is registered under.
    pub subpath: String,
    /// Content of the derived file.
    pub content: String,
    /// Override the inherited `release` flag.
    pub release: Option<bool>,
    /// Override the inherited `use_map` flag.
    pub use_map: Option<bool>,
    /// Override the inherited bundle target.
    pub pack_to: Option<String>,
    /// Dependency ids of the derived file.
    pub requires: Vec<String>,
    /// Nested derived records. Accepted for forward compatibility but not
    /// expanded: derivation is single-level.
    pub derived: Vec<DerivedSpec>,
}

/// A single resource in the working set.
#[derive(Debug, Clone)]
pub struct ProjectFile {
    /// Project-relative identity, with a leading `/`. Unique per registry;
    /// last write wins on collision.
    pub subpath: String,
    /// Current content, text or raw bytes. Mutated in place by compile and
    /// packaging phases.
    pub content: FileContent,
    /// Whether the file is included in release output.
    pub release: bool,
    /// Whether the file contributes a resource-map entry.
    pub use_map: bool,
    /// Resolved type extension (with leading dot), e.g. `.js` for a `.ts`
    /// source.
    pub r_ext: String,
    /// Ordered dependency id list.
    pub requires: Vec<String>,
    /// Opaque metadata copied into the map entry when non-empty.
    pub extras: serde_json::Map<String, serde_json::Value>,
    /// Derived records produced while compiling this file.
    pub derived: Vec<DerivedSpec>,
    /// Target bundle name, if any.
    pub pack_to: Option<String>,
    /// Partials are fragments that are never independently released.
    pub is_partial: bool,
    /// Marks a reserved placeholder file that receives the serialized
    /// resource map after packaging.
    pub is_resource_map: bool,
    /// Whether the file is subject to a minifying transform; controls
    /// compact vs. pretty map serialization.
    pub minified: bool,
    /// Whether same-name requires are added after processing.
    pub use_same_name_require: bool,
}

impl ProjectFile {
    /// Create a file with defaults derived from its subpath.
    ///
    /// `use_map` defaults to true for script, style, and markup types;
    /// other types (images, fonts) are located through the pack table or
    /// direct URLs instead.
    pub fn new(subpath: impl Into<String>, content: impl Into<FileContent>) -> Self {
        let subpath = subpath.into();
        let r_ext = resolved_ext(ext_of(&subpath)).to_string();
        let use_map = matches!(r_ext.as_str(), ".js" | ".css" | ".html" | ".htm");
        Self {
            subpath,
            content: content.into(),
            release: true,
            use_map,
            r_ext,
            requires: Vec::new(),
            extras: serde_json::Map::new(),
            derived: Vec::new(),
            pack_to: None,
            is_partial: false,
            is_resource_map: false,
            minified: false,
            use_same_name_require: false,
        }
    }

    /// Stable resource identifier, distinct from the subpath.
    pub fn id(&self) -> String {
        self.subpath.trim_start_matches('/').to_string()
    }

    /// Computed URL the runtime loader fetches this resource from.
    pub fn uri(&self) -> String {
        self.subpath.clone()
    }

    /// Resolved type with the leading separator stripped, as it appears in
    /// map entries.
    pub fn map_type(&self) -> &str {
        self.r_ext.trim_start_matches('.')
    }

    pub fn is_js_like(&self) -> bool {
        self.r_ext == ".js"
    }

    pub fn is_html_like(&self) -> bool {
        matches!(self.r_ext.as_str(), ".html" | ".htm")
    }

    /// Build a derived file from this one.
    ///
    /// The derived file inherits the parent's capability flags, is keyed by
    /// its own subpath, and has its type classification recomputed from that
    /// subpath. The spec's own nested `derived` list is not carried over:
    /// expansion is single-level.
    pub fn derive(&self, spec: &DerivedSpec) -> ProjectFile {
        let mut file = ProjectFile::new(spec.subpath.clone(), spec.content.clone());
        file.release = spec.release.unwrap_or(self.release);
        file.use_map = spec.use_map.unwrap_or(file.use_map && self.use_map);
        file.pack_to = spec.pack_to.clone().or_else(|| self.pack_to.clone());
        file.is_partial = self.is_partial;
        file.minified = self.minified;
        file.use_same_name_require = self.use_same_name_require;
        file.requires = spec.requires.clone();
        file
    }

    /// Add the same-name id with `ext` substituted to `requires`, if absent.
    ///
    /// Used for conventions like `a.js` implicitly requiring `a.css`.
    pub fn add_same_name_require(&mut self, ext: &str) {
        let base = match self.subpath.rfind('.') {
            Some(idx) if !self.subpath[idx..].contains('/') => &self.subpath[..idx],
            _ => self.subpath.as_str(),
        };
        let id = format!("{}{}", base, ext).trim_start_matches('/').to_string();
        if !self.requires.contains(&id) {
            self.requires.push(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ext_of() {
        assert_eq!(ext_of("/js/app.js"), ".js");
        assert_eq!(ext_of("/style/main.less"), ".less");
        assert_eq!(ext_of("/no_ext"), "");
        assert_eq!(ext_of("/dir.v2/file"), "");
    }

    #[test]
    fn test_resolved_ext() {
        assert_eq!(resolved_ext(".less"), ".css");
        assert_eq!(resolved_ext(".ts"), ".js");
        assert_eq!(resolved_ext(".png"), ".png");
    }

    #[test]
    fn test_new_defaults() {
        let file = ProjectFile::new("/js/app.ts", "let x = 1;");
        assert_eq!(file.r_ext, ".js");
        assert!(file.release);
        assert!(file.use_map);

        let img = ProjectFile::new("/img/logo.png", "");
        assert!(!img.use_map);
    }

    #[test]
    fn test_id_and_uri() {
        let file = ProjectFile::new("/js/app.js", "");
        assert_eq!(file.id(), "js/app.js");
        assert_eq!(file.uri(), "/js/app.js");
        assert_eq!(file.map_type(), "js");
    }

    #[test]
    fn test_derive_inherits_capabilities() {
        let mut parent = ProjectFile::new("/js/app.js", "");
        parent.pack_to = Some("bundle.js".to_string());
        parent.minified = true;

        let spec = DerivedSpec { subpath: "/js/app.map.json".to_string(), ..Default::default() };
        let child = parent.derive(&spec);

        assert_eq!(child.subpath, "/js/app.map.json");
        assert_eq!(child.r_ext, ".json");
        assert!(child.release);
        assert!(child.minified);
        assert_eq!(child.pack_to.as_deref(), Some("bundle.js"));
    }

    #[test]
    fn test_derive_overrides() {
        let parent = ProjectFile::new("/js/app.js", "");
        let spec = DerivedSpec {
            subpath: "/js/app.extra.js".to_string(),
            release: Some(false),
            use_map: Some(false),
            ..Default::default()
        };
        let child = parent.derive(&spec);
        assert!(!child.release);
        assert!(!child.use_map);
    }

    #[test]
    fn test_derive_is_single_level() {
        let parent = ProjectFile::new("/a.js", "");
        let spec = DerivedSpec {
            subpath: "/b.js".to_string(),
            derived: vec![DerivedSpec { subpath: "/c.js".to_string(), ..Default::default() }],
            ..Default::default()
        };
        let child = parent.derive(&spec);
        assert!(child.derived.is_empty());
    }

    #[test]
    fn test_content_from_bytes() {
        let text = FileContent::from_bytes(b"var a;".to_vec());
        assert!(text.is_text());
        assert_eq!(text, "var a;");

        let raw = vec![0x89, b'P', b'N', b'G', 0xff, 0xfe, 0x80];
        let binary = FileContent::from_bytes(raw.clone());
        assert!(!binary.is_text());
        assert!(binary.as_str().is_none());
        assert_eq!(binary.as_bytes(), raw.as_slice());
    }

    #[test]
    fn test_add_same_name_require() {
        let mut file = ProjectFile::new("/js/app.js", "");
        file.add_same_name_require(".css");
        assert_eq!(file.requires, vec!["js/app.css".to_string()]);

        // idempotent
        file.add_same_name_require(".css");
        assert_eq!(file.requires.len(), 1);
    }
}
