//! Resource-map collection and placeholder substitution.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::file::{FileContent, FileSet, ProjectFile};
use crate::release::context::{MapEntry, Namespace, ReleaseContext, ResourceMap};

/// Reserved token replaced with the serialized map after packaging.
pub const RESOURCE_MAP_TOKEN: &str = "__RESOURCE_MAP__";

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b__RESOURCE_MAP__\b").expect("valid token regex"));

/// Add a file's record to the map if it is release-eligible and mapped.
///
/// Records `uri`, `type` (leading separator stripped), `extras` when the
/// file carries any own metadata, and `deps` when `requires` is non-empty.
/// The record is keyed by the file's stable identifier, which also lands
/// in `ctx.ids`.
pub fn collect(ctx: &mut ReleaseContext, file: &ProjectFile, namespace: Namespace) {
    if !(file.release && file.use_map) {
        return;
    }
    let id = file.id();
    let entry = MapEntry {
        uri: file.uri(),
        kind: file.map_type().to_string(),
        extras: if file.extras.is_empty() { None } else { Some(file.extras.clone()) },
        deps: if file.requires.is_empty() { None } else { Some(file.requires.clone()) },
    };
    ctx.ids.insert(id.clone(), file.subpath.clone());
    match namespace {
        Namespace::Res => ctx.map.res.insert(id, entry),
        Namespace::Pkg => ctx.map.pkg.insert(id, entry),
    };
}

/// Serialize the map: 4-space pretty by default, compact for minified
/// consumers.
pub fn serialize_map(map: &ResourceMap, compact: bool) -> Result<String, serde_json::Error> {
    if compact {
        serde_json::to_string(map)
    } else {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        map.serialize(&mut serializer)?;
        Ok(String::from_utf8(out).expect("serde_json emits UTF-8"))
    }
}

/// Replace every reserved-token occurrence in the placeholder files.
///
/// Runs exactly once per release, after all packaging phases. Placeholder
/// files subject to a minifying transform receive the compact form.
pub fn fill_resource_maps(
    map: &ResourceMap,
    working: &mut FileSet,
    placeholders: &[String],
) -> Result<(), serde_json::Error> {
    for subpath in placeholders {
        let Some(file) = working.get_mut(subpath) else { continue };
        let Some(text) = file.content.as_str() else {
            log::warn!("resource map placeholder {} is not text, skipped", subpath);
            continue;
        };
        let json = serialize_map(map, file.minified)?;
        let filled = TOKEN_RE.replace_all(text, regex::NoExpand(json.as_str())).into_owned();
        file.content = FileContent::Text(filled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_requires_release_and_use_map() {
        let mut ctx = ReleaseContext::default();
        let mut file = ProjectFile::new("/a.js", "");
        file.use_map = false;
        collect(&mut ctx, &file, Namespace::Res);
        assert!(ctx.map.res.is_empty());

        file.use_map = true;
        file.release = false;
        collect(&mut ctx, &file, Namespace::Res);
        assert!(ctx.map.res.is_empty());
    }

    #[test]
    fn test_collect_record_fields() {
        let mut ctx = ReleaseContext::default();
        let mut file = ProjectFile::new("/js/app.ts", "");
        file.requires = vec!["js/dep.js".to_string()];
        file.extras.insert("async".to_string(), serde_json::Value::Bool(true));

        collect(&mut ctx, &file, Namespace::Res);
        let entry = &ctx.map.res["js/app.ts"];
        assert_eq!(entry.uri, "/js/app.ts");
        assert_eq!(entry.kind, "js");
        assert_eq!(entry.deps.as_ref().unwrap(), &vec!["js/dep.js".to_string()]);
        assert!(entry.extras.as_ref().unwrap().contains_key("async"));
        assert_eq!(ctx.ids["js/app.ts"], "/js/app.ts");
    }

    #[test]
    fn test_collect_no_deps_key_when_requires_empty() {
        let mut ctx = ReleaseContext::default();
        let file = ProjectFile::new("/a.js", "");
        collect(&mut ctx, &file, Namespace::Res);
        assert!(ctx.map.res["a.js"].deps.is_none());
        assert!(ctx.map.res["a.js"].extras.is_none());
    }

    #[test]
    fn test_fill_replaces_every_occurrence() {
        let map = ResourceMap::default();
        let mut working = FileSet::new();
        let mut file = ProjectFile::new("/loader.js", "a(__RESOURCE_MAP__); b(__RESOURCE_MAP__);");
        file.minified = true;
        file.is_resource_map = true;
        working.insert(file.subpath.clone(), file);

        fill_resource_maps(&map, &mut working, &["/loader.js".to_string()]).unwrap();
        let content = &working["/loader.js"].content;
        assert_eq!(content, r#"a({"res":{},"pkg":{}}); b({"res":{},"pkg":{}});"#);
    }

    #[test]
    fn test_fill_token_requires_word_boundary() {
        let map = ResourceMap::default();
        let mut working = FileSet::new();
        let mut file = ProjectFile::new("/loader.js", "x__RESOURCE_MAP__y");
        file.minified = true;
        working.insert(file.subpath.clone(), file);

        fill_resource_maps(&map, &mut working, &["/loader.js".to_string()]).unwrap();
        assert_eq!(working["/loader.js"].content, "x__RESOURCE_MAP__y");
    }

    #[test]
    fn test_pretty_serialization_is_indented() {
        let mut ctx = ReleaseContext::default();
        collect(&mut ctx, &ProjectFile::new("/a.js", ""), Namespace::Res);
        let json = serialize_map(&ctx.map, false).unwrap();
        assert!(json.contains("\n    \"res\""));
    }
}
