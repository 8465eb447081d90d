//! End-to-end tests for Pagewright.
//!
//! These tests drive a small site through the public API: module registry,
//! resolver, renderer and builder.

use std::{fs, sync::Arc};

use pagewright_core::{
    CoreError, Document, HeadConfig, Manifest, RawModule, RenderMode, SiteConfig, Tag, TagType,
    normalize,
};
use pagewright_generator::{
    Builder, DescriptorCache, JsonDocumentStore, ModuleRegistry, PageAssembler, PageRenderer,
    RELATIVE_PREFIX_TOKEN, RouteQuery, RouteResolver, render_head_config, walk_asset_graph,
};
use serde_json::json;
use tempfile::TempDir;

fn manifest() -> Manifest {
    serde_json::from_value(json!({
        "bundlePaths": { "location": "assets/server/location.js" },
        "bundlerManifest": {
            "src/templates/location.tsx": {
                "file": "assets/location.js",
                "isEntry": true,
                "imports": ["_layout.js", "_shared.js"],
                "css": ["assets/location.css"]
            },
            "_layout.js": {
                "file": "assets/layout.js",
                "imports": ["_shared.js"],
                "css": ["assets/layout.css"]
            },
            "_shared.js": {
                "file": "assets/shared.js",
                "imports": ["_layout.js"],
                "css": ["assets/shared.css"]
            },
            "src/templates/_client.tsx": { "file": "assets/client.js", "isEntry": true },
            ".temp/hydration_templates/location.tsx": {
                "file": "assets/hydrate/location.js",
                "isEntry": true
            }
        }
    }))
    .expect("manifest")
}

fn site() -> ModuleRegistry {
    ModuleRegistry::new()
        .with_module("src/templates/location.tsx", || {
            RawModule::new()
                .with_config(json!({
                    "hydrate": true,
                    "stream": {
                        "$id": "locations",
                        "filter": { "entityTypes": ["location"] },
                        "fields": ["id", "name", "slug"],
                        "localization": { "locales": ["en", "es"] }
                    }
                }))
                .with_get_path(|props| {
                    let locale = props.document.locale().unwrap_or("en");
                    let slug = props.document.slug().unwrap_or("unknown");
                    if locale == "en" {
                        format!("{slug}/index.html")
                    } else {
                        format!("{locale}/{slug}/index.html")
                    }
                })
                .with_head_config(|props| {
                    let name = props
                        .document
                        .get("name")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default();
                    HeadConfig::new()
                        .with_title(name)
                        .with_tag(Tag::new(TagType::Meta).attr("name", "description").attr(
                            "content",
                            format!("Visit {name}"),
                        ))
                })
                .with_redirects(|props| {
                    vec![format!("/location/{}", props.document.id().unwrap_or_default())]
                })
                .with_default(|props| {
                    format!(
                        "<main><h1>{}</h1></main>",
                        props
                            .document
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                    )
                })
        })
        .with_module("src/templates/index.tsx", || {
            RawModule::new()
                .with_get_path(|_| "index.html".to_string())
                .with_default(|_| "<main>Home</main>".to_string())
        })
}

fn documents() -> JsonDocumentStore {
    JsonDocumentStore::new(vec![
        Document::new(json!({
            "id": "101", "locale": "en", "slug": "madrid-centro", "name": "Madrid Centro",
            "__": { "name": "location" }
        })),
        Document::new(json!({
            "id": "101", "locale": "es", "slug": "madrid-centro", "name": "Madrid Centro ES",
            "__": { "name": "location" }
        })),
    ])
}

fn renderer(registry: ModuleRegistry) -> PageRenderer<ModuleRegistry> {
    let resolver = RouteResolver::new(registry, DescriptorCache::new());
    let assembler = PageAssembler::new(Arc::new(manifest()), RenderMode::Production);
    PageRenderer::new(resolver, Arc::new(documents()), assembler)
}

#[test]
fn test_template_name_from_path() {
    let raw = RawModule::new()
        .with_config(json!({ "streamId": "$id" }))
        .with_get_path(|_| "index.html".to_string())
        .with_default(|_| String::new());

    let descriptor = normalize(raw, "src/templates/myTemplate.tsx", false).expect("normalize");
    assert_eq!(descriptor.name(), "myTemplate");
}

#[test]
fn test_default_head_title() {
    let html = render_head_config(&HeadConfig::default());
    assert!(html.contains("<title>Yext Pages Site</title>"));
}

#[test]
fn test_asset_graph_from_manifest() {
    let manifest = serde_json::from_value(json!({
        "a": { "file": "a.js", "css": ["x.css"], "imports": ["b"] },
        "b": { "file": "b.js", "css": ["y.css"] }
    }))
    .expect("manifest");

    let css: Vec<_> = walk_asset_graph("a", &manifest).into_iter().collect();
    assert_eq!(css, vec!["x.css", "y.css"]);
}

#[test]
fn test_module_without_renderable_export() {
    let raw = RawModule::new().with_get_path(|_| "index.html".to_string());

    let err = normalize(raw, "src/templates/empty.tsx", false).unwrap_err();
    assert!(matches!(err, CoreError::NoRenderableExport { .. }));
    assert!(err.to_string().contains("src/templates/empty.tsx"));
}

#[tokio::test]
async fn test_static_path_conflict_is_reported() {
    let registry = site().with_module("src/templates/home.tsx", || {
        RawModule::new()
            .with_get_path(|_| "index.html".to_string())
            .with_default(|_| String::new())
    });
    let candidates = registry.paths();
    let resolver = RouteResolver::new(registry, DescriptorCache::new());

    let err = resolver
        .by_static_path("index.html", &candidates)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::DuplicateStaticPath { .. }));
}

#[tokio::test]
async fn test_hydrated_entity_page() {
    let registry = site();
    let candidates = registry.paths();
    let renderer = renderer(registry);

    let query = RouteQuery::Feature {
        name: "location".into(),
        entity_id: Some("101".into()),
    };
    let page = renderer
        .render_route(&query, &candidates, Some("es"))
        .await
        .expect("render");

    assert_eq!(page.path, "es/madrid-centro/index.html");
    assert_eq!(page.redirects, vec!["/location/101"]);

    let html = &page.content;
    assert!(html.contains("<html lang=\"es\">"));
    assert!(html.contains("<title>Madrid Centro ES</title>"));
    assert!(html.contains(r#"<meta name="description" content="Visit Madrid Centro ES" />"#));
    assert!(html.contains("<main><h1>Madrid Centro ES</h1></main>"));

    let location = html
        .find(r#"<link rel="stylesheet" href="../../assets/location.css">"#)
        .expect("location css");
    let layout = html
        .find(r#"<link rel="stylesheet" href="../../assets/layout.css">"#)
        .expect("layout css");
    let shared = html
        .find(r#"<link rel="stylesheet" href="../../assets/shared.css">"#)
        .expect("shared css");
    assert!(location < layout && layout < shared);
    assert_eq!(html.matches("assets/shared.css").count(), 1);

    assert!(html.contains(r#"import {default as Component} from "../../assets/hydrate/location.js";"#));
    assert!(html.contains(r#"import {render} from "../../assets/client.js";"#));
    assert!(!html.contains(RELATIVE_PREFIX_TOKEN));

    let head = html.find("<head>").expect("head");
    let title = html.find("<title>").expect("title");
    let body = html.find("<body>").expect("body");
    assert!(head < title && title < body);
}

#[tokio::test]
async fn test_slug_route_with_encoded_slug() {
    let registry = site();
    let candidates = registry.paths();
    let renderer = renderer(registry);

    let page = renderer
        .render_route(&RouteQuery::Slug("madrid%2Dcentro".into()), &candidates, None)
        .await
        .expect("render");
    assert_eq!(page.path, "madrid-centro/index.html");
    assert!(page.content.contains(r#"href="./assets/location.css""#));

    let proxied = renderer
        .render_route_at(
            &RouteQuery::Slug("madrid-centro".into()),
            &candidates,
            None,
            "/locations/madrid-centro/",
        )
        .await
        .expect("render");
    assert!(proxied.content.contains(r#"href="../../assets/location.css""#));
}

#[tokio::test]
async fn test_build_site_from_config() {
    let root = TempDir::new().expect("temp dir");
    fs::create_dir_all(root.path().join("data")).expect("data dir");
    fs::write(
        root.path().join("data/locations.json"),
        serde_json::to_string(&documents().documents()).expect("serialize"),
    )
    .expect("write documents");
    fs::create_dir_all(root.path().join(".temp")).expect("temp dir");
    fs::write(
        root.path().join(".temp/manifest.json"),
        serde_json::to_string(&manifest()).expect("serialize"),
    )
    .expect("write manifest");
    fs::write(
        root.path().join("pagewright.toml"),
        "[build]\ndocuments_dir = \"data\"\noutput_dir = \"public\"\n",
    )
    .expect("write config");

    let config = SiteConfig::load(&root.path().join("pagewright.toml")).expect("config");
    let registry = site();
    let candidates = registry.paths();
    let builder = Builder::from_config(&config, root.path(), registry).expect("builder");

    let stats = builder.build(&candidates).await.expect("build");
    assert_eq!(stats.pages, 3);
    assert_eq!(stats.redirects, 2);

    let public = root.path().join("public");
    let home = fs::read_to_string(public.join("index.html")).expect("index");
    assert!(home.contains("<main>Home</main>"));
    assert!(home.contains("<html lang=\"en\">"));

    let en = fs::read_to_string(public.join("madrid-centro/index.html")).expect("en page");
    assert!(en.contains(r#"href="../assets/location.css""#));
    assert!(public.join("es/madrid-centro/index.html").exists());

    let redirects = fs::read_to_string(public.join("_redirects")).expect("redirects");
    assert!(redirects.contains("/location/101 /madrid-centro/index.html 301"));
    assert!(redirects.contains("/location/101 /es/madrid-centro/index.html 301"));
}
