//! Stylesheet discovery over the bundler's asset graph.
//!
//! A chunk's stylesheets are its own `css` entries plus those of everything it
//! imports, transitively. The graph may contain cycles and shared imports.

use std::collections::HashSet;

use indexmap::IndexSet;
use pagewright_core::BundlerManifest;
use tracing::trace;

/// Collect the transitive stylesheets of `entry`.
///
/// Nodes are expanded depth-first in declaration order and never more than
/// once, so the walk terminates on cyclic graphs and a shared import
/// contributes its stylesheets exactly once. The returned order is stable and
/// is used verbatim for `<link>` emission.
#[must_use]
pub fn walk_asset_graph(entry: &str, manifest: &BundlerManifest) -> IndexSet<String> {
    let mut css = IndexSet::new();
    let Some(root) = manifest.get(entry) else {
        trace!(entry, "chunk not in manifest");
        return css;
    };

    let mut seen: HashSet<&str> = HashSet::new();
    seen.insert(entry);
    css.extend(root.css.iter().cloned());

    let mut stack = vec![root.imports.iter()];
    while let Some(imports) = stack.last_mut() {
        let Some(import) = imports.next() else {
            stack.pop();
            continue;
        };
        if !seen.insert(import.as_str()) {
            continue;
        }
        if let Some(node) = manifest.get(import) {
            css.extend(node.css.iter().cloned());
            stack.push(node.imports.iter());
        }
    }

    trace!(entry, count = css.len(), "collected stylesheets");
    css
}

#[cfg(test)]
mod tests {
    use pagewright_core::ManifestEntry;

    use super::*;

    fn entry(css: &[&str], imports: &[&str]) -> ManifestEntry {
        ManifestEntry {
            file: String::new(),
            is_entry: false,
            imports: imports.iter().map(|s| (*s).to_string()).collect(),
            css: css.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    fn collect(entry: &str, manifest: &BundlerManifest) -> Vec<String> {
        walk_asset_graph(entry, manifest).into_iter().collect()
    }

    #[test]
    fn test_simple_chain() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("a".into(), entry(&["x.css"], &["b"]));
        manifest.insert("b".into(), entry(&["y.css"], &[]));

        assert_eq!(collect("a", &manifest), vec!["x.css", "y.css"]);
    }

    #[test]
    fn test_missing_entry_is_empty() {
        let manifest = BundlerManifest::new();
        assert!(walk_asset_graph("nope", &manifest).is_empty());
    }

    #[test]
    fn test_missing_import_is_skipped() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("a".into(), entry(&["a.css"], &["ghost", "b"]));
        manifest.insert("b".into(), entry(&["b.css"], &[]));

        assert_eq!(collect("a", &manifest), vec!["a.css", "b.css"]);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("a".into(), entry(&["a.css"], &["b"]));
        manifest.insert("b".into(), entry(&["b.css"], &["c"]));
        manifest.insert("c".into(), entry(&["c.css"], &["a", "b"]));

        assert_eq!(collect("a", &manifest), vec!["a.css", "b.css", "c.css"]);
    }

    #[test]
    fn test_self_import() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("a".into(), entry(&["a.css"], &["a"]));

        assert_eq!(collect("a", &manifest), vec!["a.css"]);
    }

    #[test]
    fn test_diamond_contributes_once() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("top".into(), entry(&["top.css"], &["left", "right"]));
        manifest.insert("left".into(), entry(&["left.css"], &["shared"]));
        manifest.insert("right".into(), entry(&["right.css"], &["shared"]));
        manifest.insert("shared".into(), entry(&["shared.css"], &[]));

        assert_eq!(
            collect("top", &manifest),
            vec!["top.css", "left.css", "shared.css", "right.css"]
        );
    }

    #[test]
    fn test_duplicate_css_across_nodes() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("a".into(), entry(&["common.css", "a.css"], &["b"]));
        manifest.insert("b".into(), entry(&["common.css", "b.css"], &[]));

        assert_eq!(collect("a", &manifest), vec!["common.css", "a.css", "b.css"]);
    }

    #[test]
    fn test_depth_first_order() {
        let mut manifest = BundlerManifest::new();
        manifest.insert("a".into(), entry(&[], &["b", "d"]));
        manifest.insert("b".into(), entry(&["b.css"], &["c"]));
        manifest.insert("c".into(), entry(&["c.css"], &[]));
        manifest.insert("d".into(), entry(&["d.css"], &[]));

        assert_eq!(collect("a", &manifest), vec!["b.css", "c.css", "d.css"]);
    }

    #[test]
    fn test_deep_chain_without_recursion() {
        let mut manifest = BundlerManifest::new();
        let depth = 10_000;
        for i in 0..depth {
            let next = format!("n{}", i + 1);
            let css = format!("n{i}.css");
            manifest.insert(format!("n{i}"), entry(&[css.as_str()], &[next.as_str()]));
        }

        assert_eq!(walk_asset_graph("n0", &manifest).len(), depth);
    }
}
