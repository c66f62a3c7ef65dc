/*
 * include_extends_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Composition across resources: include, extends and blocks.
 */

use pretty_assertions::assert_eq;
use twiglet_template::{
    Context, EngineConfig, Environment, ErrorKind, IncludeIsolation, MemoryResolver, Value,
};

fn env_with(templates: &[(&str, &str)]) -> Environment {
    env_with_config(EngineConfig::default(), templates)
}

fn env_with_config(config: EngineConfig, templates: &[(&str, &str)]) -> Environment {
    Environment::new(config).unwrap().with_resolver(MemoryResolver::with_templates(
        templates.iter().map(|(name, content)| (*name, *content)),
    ))
}

fn render(env: &Environment, name: &str, context: &Context) -> String {
    env.load(name)
        .unwrap_or_else(|e| panic!("Failed to compile {}: {}", name, e))
        .render(context)
        .unwrap_or_else(|e| panic!("Failed to render {}: {}", name, e))
}

// ============================================================================
// Include
// ============================================================================

#[test]
fn test_include_sees_outer_scope() {
    let env = env_with(&[
        ("page.twig", "[{% include 'card.twig' %}]"),
        ("card.twig", "{{ title }}"),
    ]);
    let context = Context::new().with("title", "Hello");
    assert_eq!(render(&env, "page.twig", &context), "[Hello]");
}

#[test]
fn test_include_with_variables() {
    let env = env_with(&[
        ("page.twig", "{% include 'card.twig' with {title: 'Inner'} %}|{{ title }}"),
        ("card.twig", "{{ title }}/{{ other }}"),
    ]);
    let context = Context::new().with("title", "Outer").with("other", "x");
    assert_eq!(render(&env, "page.twig", &context), "Inner/x|Outer");
}

#[test]
fn test_include_only_hides_outer_scope() {
    let env = env_with(&[
        ("page.twig", "{% include 'card.twig' with {title: 'T'} only %}"),
        ("card.twig", "{{ title }}/{{ other }}"),
    ]);
    let context = Context::new().with("other", "x");
    assert_eq!(render(&env, "page.twig", &context), "T/");
}

#[test]
fn test_isolated_configuration() {
    let config = EngineConfig::default().with_include_isolation(IncludeIsolation::Isolated);
    let env = env_with_config(
        config,
        &[
            ("page.twig", "{% include 'card.twig' %}{% include 'card.twig' with {other: 'w'} %}"),
            ("card.twig", "[{{ other }}]"),
        ],
    );
    let context = Context::new().with("other", "x");
    assert_eq!(render(&env, "page.twig", &context), "[][w]");
}

#[test]
fn test_include_with_inside_loop() {
    let env = env_with(&[
        (
            "list.twig",
            "{% for user in users %}{% include 'row.twig' with {n: loop.index} %}{% endfor %}",
        ),
        ("row.twig", "{{ n }}.{{ user }} "),
    ]);
    let context = Context::new().with("users", vec!["ann", "bob"]);
    assert_eq!(render(&env, "list.twig", &context), "1.ann 2.bob ");
}

#[test]
fn test_include_with_non_map_fails_at_render() {
    let env = env_with(&[
        ("page.twig", "{% include 'card.twig' with items %}"),
        ("card.twig", "card"),
    ]);
    let template = env.load("page.twig").unwrap();
    let err = template
        .render(&Context::new().with("items", vec![1, 2]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert_eq!(
        err.to_string(),
        "Render error: line 1, column 1: Unable to include 'card.twig', got list: Include 'with' must be given a map."
    );
}

#[test]
fn test_missing_include_fails_at_compile() {
    let env = env_with(&[("page.twig", "ok\n  {% include 'missing.twig' %}")]);
    let err = env.load("page.twig").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert_eq!(err.kind_chain(), vec![ErrorKind::Compile, ErrorKind::Resource]);
    assert_eq!(
        err.to_string(),
        "Compile error: Unable to include 'missing.twig' at line 2, column 3: Resource error: 'missing.twig': not found"
    );
}

#[test]
fn test_parse_error_in_include_fails_at_compile() {
    let env = env_with(&[
        ("page.twig", "{% include 'broken.twig' %}"),
        ("broken.twig", "{% if %}"),
    ]);
    let err = env.load("page.twig").unwrap_err();
    assert_eq!(err.kind_chain(), vec![ErrorKind::Compile, ErrorKind::Parse]);
}

#[test]
fn test_dynamic_include_path_is_rejected() {
    let env = env_with(&[("page.twig", "{% include name %}")]);
    let err = env.load("page.twig").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert!(err.to_string().contains("must be a constant string"), "{}", err);
}

#[test]
fn test_constant_include_path_expression() {
    let env = env_with(&[
        ("page.twig", "{% include 'parts/' ~ 'card.twig' %}"),
        ("parts/card.twig", "card"),
    ]);
    assert_eq!(render(&env, "page.twig", &Context::new()), "card");
}

#[test]
fn test_relative_include() {
    let env = env_with(&[
        ("pages/blog/post.twig", "{% include './card.twig' %}+{% include '../nav.twig' %}"),
        ("pages/blog/card.twig", "card"),
        ("pages/nav.twig", "nav"),
    ]);
    assert_eq!(render(&env, "pages/blog/post.twig", &Context::new()), "card+nav");
}

#[test]
fn test_recursive_include_hits_depth_limit() {
    let config = EngineConfig::default().with_max_include_depth(5);
    let env = env_with_config(config, &[("loop.twig", "x{% include 'loop.twig' %}")]);
    let err = env.load("loop.twig").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert!(
        err.to_string().contains("maximum nesting depth of 5 exceeded"),
        "{}",
        err
    );
}

// ============================================================================
// Extends and blocks
// ============================================================================

const BASE: &str = "<title>{% block title %}Base{% endblock %}</title>\
<main>{% block content %}base content{% endblock %}</main>\
<footer>{% block footer %}(c){% endblock %}</footer>";

#[test]
fn test_blocks_render_in_place() {
    let env = env_with(&[("base.twig", BASE)]);
    assert_eq!(
        render(&env, "base.twig", &Context::new()),
        "<title>Base</title><main>base content</main><footer>(c)</footer>"
    );
}

#[test]
fn test_extends_overrides_blocks() {
    let env = env_with(&[
        ("base.twig", BASE),
        (
            "page.twig",
            "{% extends 'base.twig' %}\n{% block title %}Page{% endblock %}\n{% block content %}Hi {{ name }}{% endblock %}\n",
        ),
    ]);
    let context = Context::new().with("name", "Ann");
    assert_eq!(
        render(&env, "page.twig", &context),
        "<title>Page</title><main>Hi Ann</main><footer>(c)</footer>"
    );
}

#[test]
fn test_three_level_extends_most_derived_wins() {
    let env = env_with(&[
        ("base.twig", BASE),
        (
            "layout.twig",
            "{% extends 'base.twig' %}{% block title %}Layout{% endblock %}{% block footer %}layout footer{% endblock %}",
        ),
        (
            "page.twig",
            "{% extends 'layout.twig' %}{% block title %}Page{% endblock %}",
        ),
    ]);
    assert_eq!(
        render(&env, "page.twig", &Context::new()),
        "<title>Page</title><main>base content</main><footer>layout footer</footer>"
    );
}

#[test]
fn test_nested_block_override() {
    let env = env_with(&[
        (
            "base.twig",
            "{% block outer %}[{% block inner %}inner{% endblock %}]{% endblock %}",
        ),
        (
            "page.twig",
            "{% extends 'base.twig' %}{% block inner %}replaced{% endblock %}",
        ),
    ]);
    assert_eq!(render(&env, "page.twig", &Context::new()), "[replaced]");
}

#[test]
fn test_block_nested_in_override_is_registered() {
    let base = "{% block a %}A{% endblock %}|{% block b %}B{% endblock %}";
    let child = "{% extends 'base.twig' %}{% block a %}[{% block b %}child{% endblock %}]{% endblock %}";
    let env = env_with(&[
        ("base.twig", base),
        ("child.twig", child),
        (
            "grandchild.twig",
            "{% extends 'child.twig' %}{% block b %}grandchild{% endblock %}",
        ),
    ]);
    assert_eq!(render(&env, "child.twig", &Context::new()), "[child]|child");
    assert_eq!(
        render(&env, "grandchild.twig", &Context::new()),
        "[grandchild]|grandchild"
    );
}

#[test]
fn test_child_set_is_visible_in_parent() {
    let env = env_with(&[
        ("base.twig", "{{ greeting }} {% block body %}{% endblock %}"),
        (
            "page.twig",
            "{% extends 'base.twig' %}{% set greeting = 'Hey' %}{% block body %}{{ greeting }}!{% endblock %}",
        ),
    ]);
    assert_eq!(render(&env, "page.twig", &Context::new()), "Hey Hey!");
}

#[test]
fn test_content_outside_blocks_warns() {
    let env = env_with(&[
        ("base.twig", "{% block a %}A{% endblock %}"),
        ("page.twig", "{% extends 'base.twig' %}\nstray text\n{% block a %}B{% endblock %}"),
    ]);
    let template = env.load("page.twig").unwrap();
    assert_eq!(template.render(&Context::new()).unwrap(), "B");

    let warnings: Vec<String> = template.diagnostics().iter().map(|d| d.to_string()).collect();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("warning: page.twig:1:"), "{}", warnings[0]);
    assert!(warnings[0].contains("Content outside of blocks is ignored"));
}

#[test]
fn test_duplicate_block_fails() {
    let env = env_with(&[(
        "page.twig",
        "{% block a %}1{% endblock %}{% block a %}2{% endblock %}",
    )]);
    let err = env.load("page.twig").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert!(
        err.to_string().contains("Block 'a' is defined twice in 'page.twig'"),
        "{}",
        err
    );
}

#[test]
fn test_extends_must_come_first() {
    let env = env_with(&[
        ("base.twig", "base"),
        ("page.twig", "{{ x }}{% extends 'base.twig' %}"),
    ]);
    let err = env.load("page.twig").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Compile);
    assert!(err.to_string().contains("must be the first tag"), "{}", err);
}

#[test]
fn test_missing_parent_fails_at_compile() {
    let env = env_with(&[("page.twig", "{% extends 'nope.twig' %}")]);
    let err = env.load("page.twig").unwrap_err();
    assert_eq!(err.kind_chain(), vec![ErrorKind::Compile, ErrorKind::Resource]);
}

#[test]
fn test_included_template_can_extend() {
    let env = env_with(&[
        ("base.twig", "<{% block x %}base{% endblock %}>"),
        ("widget.twig", "{% extends 'base.twig' %}{% block x %}widget{% endblock %}"),
        ("page.twig", "{% block x %}page{% endblock %} {% include 'widget.twig' %}"),
    ]);
    assert_eq!(render(&env, "page.twig", &Context::new()), "page <widget>");
}

// ============================================================================
// Reuse
// ============================================================================

#[test]
fn test_rendering_is_deterministic() {
    let env = env_with(&[
        ("base.twig", BASE),
        ("page.twig", "{% extends 'base.twig' %}{% block content %}{% for k, v in data %}{{ k }}={{ v }} {% endfor %}{% endblock %}"),
    ]);
    let template = env.load("page.twig").unwrap();
    let mut data = twiglet_template::Map::new();
    data.insert("b".to_string(), Value::Integer(2));
    data.insert("a".to_string(), Value::Integer(1));
    let context = Context::new().with("data", Value::Map(data));

    let first = template.render(&context).unwrap();
    for _ in 0..10 {
        assert_eq!(template.render(&context).unwrap(), first);
    }
    assert!(first.contains("<main>b=2 a=1 </main>"), "{}", first);
}

#[test]
fn test_concurrent_renders() {
    let env = env_with(&[
        ("page.twig", "{% for i in range(1, n) %}{% include 'item.twig' %}{% endfor %}"),
        ("item.twig", "{{ i * n }},"),
    ]);
    let template = env.load("page.twig").unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (1..=8)
            .map(|n: i64| {
                let template = &template;
                scope.spawn(move || {
                    let output = template.render(&Context::new().with("n", n)).unwrap();
                    let expected: String = (1..=n).map(|i| format!("{},", i * n)).collect();
                    assert_eq!(output, expected);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });
}
