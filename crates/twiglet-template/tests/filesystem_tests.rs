/*
 * filesystem_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Loading templates from disk through FileSystemResolver and ResolverChain.
 */

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use twiglet_template::{
    Context, Environment, ErrorKind, FileSystemResolver, MemoryResolver, ResolverChain,
};

fn write(root: &Path, name: &str, content: &str) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "layouts/base.twig",
        "<h1>{% block title %}{% endblock %}</h1>{% include '../partials/footer.twig' %}",
    );
    write(dir.path(), "partials/footer.twig", "<footer>{{ site }}</footer>");
    write(
        dir.path(),
        "pages/about.twig",
        "{% extends 'layouts/base.twig' %}{% block title %}About{% endblock %}",
    );
    dir
}

#[test]
fn test_load_from_disk() {
    let dir = fixture();
    let env = Environment::default().with_resolver(FileSystemResolver::new(dir.path()));
    let template = env.load("pages/about.twig").unwrap();
    assert_eq!(template.name().map(|id| id.as_str()), Some("pages/about.twig"));

    let output = template.render(&Context::new().with("site", "example.org")).unwrap();
    assert_eq!(output, "<h1>About</h1><footer>example.org</footer>");
}

#[test]
fn test_missing_file() {
    let dir = fixture();
    let env = Environment::default().with_resolver(FileSystemResolver::new(dir.path()));
    let err = env.load("pages/contact.twig").unwrap_err();
    assert_eq!(err.kind_chain(), vec![ErrorKind::Compile, ErrorKind::Resource]);
}

#[test]
fn test_reference_cannot_escape_root() {
    let dir = fixture();
    let env = Environment::default()
        .with_resolver(FileSystemResolver::new(dir.path().join("pages")));
    let err = env.load("../partials/footer.twig").unwrap_err();
    assert!(err.to_string().contains("escapes the template root"), "{}", err);
}

#[test]
fn test_chain_prefers_earlier_resolvers() {
    let dir = fixture();
    let mut overrides = MemoryResolver::new();
    overrides.add("partials/footer.twig", "<footer>override</footer>");

    let env = Environment::default().with_resolver(
        ResolverChain::new()
            .with(overrides)
            .with(FileSystemResolver::new(dir.path())),
    );
    let output = env
        .load("pages/about.twig")
        .unwrap()
        .render(&Context::new())
        .unwrap();
    assert_eq!(output, "<h1>About</h1><footer>override</footer>");
}

#[test]
fn test_compiled_template_outlives_files() {
    let dir = fixture();
    let env = Environment::default().with_resolver(FileSystemResolver::new(dir.path()));
    let template = env.load("pages/about.twig").unwrap();
    drop(dir);

    let output = template.render(&Context::new().with("site", "s")).unwrap();
    assert_eq!(output, "<h1>About</h1><footer>s</footer>");
}
