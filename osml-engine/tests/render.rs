// Template rendering through the public API

use osml_engine::{
    parse_document, DataContext, EvaluatorKind, ExpressionEngine, ProcessorConfig,
    TemplateErrorKind, TemplateLibrary, TemplateProcessor, Value,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use tempfile::NamedTempFile;

const LIBRARY: &str = r#"<Templates>
  <Style>.friend { float: left }</Style>
  <TemplateDef tag="app:FriendList">
    <JavaScript>function pick(id) {}</JavaScript>
    <Template><ul class="friend"><li repeat="${My.people}" var="p" if="${p.visible}"><os:Name person="${p}"/> (${Context.Index + 1} of ${Context.Count})</li></ul></Template>
  </TemplateDef>
</Templates>"#;

const BUILTINS: &str = r#"<Templates>
  <Template tag="os:Name"><b>${My.person.name}</b></Template>
</Templates>"#;

fn builtin_file() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(BUILTINS.as_bytes()).unwrap();
    file
}

fn render(template: &str, data: serde_json::Value, config: ProcessorConfig) -> String {
    let mut library = TemplateLibrary::from_config(&config);
    library.add_template_library(LIBRARY).unwrap();

    let mut doc = parse_document(template).unwrap();
    let root = doc.root();
    TemplateProcessor::new(config)
        .process(&mut doc, root, Value::from(data), &mut library)
        .unwrap();
    doc.to_xml(root)
}

#[test]
fn test_custom_tag_with_nested_builtin() {
    let builtins = builtin_file();
    let config = ProcessorConfig::default().with_builtin_library(builtins.path());
    let out = render(
        r#"<div><app:FriendList people="${friends}"/></div>"#,
        json!({
            "friends": [
                {"name": "Ada", "visible": true},
                {"name": "Bob", "visible": false},
                {"name": "Cy & Co", "visible": "true"}
            ]
        }),
        config,
    );
    assert_eq!(
        out,
        concat!(
            "<div>",
            r#"<style type="text/css">.friend { float: left }</style>"#,
            r#"<script type="text/javascript">function pick(id) {}</script>"#,
            r#"<ul class="friend">"#,
            "<li><b>Ada</b> (1 of 3)</li>",
            "<li><b>Cy &amp; Co</b> (3 of 3)</li>",
            "</ul>",
            "</div>"
        )
    );
}

#[test]
fn test_repeat_nesting_restores_context() {
    let out = render(
        r#"<table><tr repeat="${rows}" var="row"><td repeat="${row}">${Context.Index}</td><th>${Context.Index}/${Context.Count}</th></tr></table>"#,
        json!({"rows": [["a", "b", "c"], ["d"]]}),
        ProcessorConfig::default(),
    );
    assert_eq!(
        out,
        "<table><tr><td>0</td><td>1</td><td>2</td><th>0/2</th></tr><tr><td>0</td><th>1/2</th></tr></table>"
    );
}

#[test]
fn test_repeat_over_map_follows_document_order() {
    let data: serde_json::Value =
        serde_json::from_str(r#"{"steps": {"zeta": "first", "alpha": "second"}}"#).unwrap();
    let out = render(
        r#"<ol><li repeat="${steps}">${Cur}</li></ol>"#,
        data,
        ProcessorConfig::default(),
    );
    assert_eq!(out, "<ol><li>first</li><li>second</li></ol>");
}

#[test]
fn test_ternary_does_not_evaluate_untaken_branch() {
    let out = render(
        r#"<p>${1 == 1 ? 'yes' : 'no'} ${false ? (1/0) : 'safe'}</p>"#,
        json!({}),
        ProcessorConfig::default(),
    );
    assert_eq!(out, "<p>yes safe</p>");
}

#[test]
fn test_cur_shadows_top() {
    let context = DataContext::new(Value::from(json!({"Foo": 2})))
        .with_cur(Value::from(json!({"Foo": 1})));
    let engine = ExpressionEngine::default();
    assert_eq!(engine.evaluate_markers("${Foo}", &context).unwrap(), Value::Int(1));
    assert_eq!(engine.evaluate_markers("${Top.Foo}", &context).unwrap(), Value::Int(2));
}

#[test]
fn test_word_and_symbol_operators_agree() {
    let engine = ExpressionEngine::default();
    let context = DataContext::new(Value::from(json!({"a": 3, "b": 5})));
    for (symbol, word) in [
        ("==", "eq"),
        ("!=", "ne"),
        (">", "gt"),
        ("<", "lt"),
        (">=", "ge"),
        ("<=", "le"),
    ] {
        let with_symbol = engine.evaluate(&format!("a {} b", symbol), &context).unwrap();
        let with_word = engine.evaluate(&format!("a {} b", word), &context).unwrap();
        assert_eq!(with_symbol, with_word, "{} vs {}", symbol, word);
    }
}

#[test]
fn test_legacy_config_renders_simple_markers() {
    let config = ProcessorConfig::from_yaml_str("evaluator: legacy\n").unwrap();
    assert_eq!(config.evaluator, EvaluatorKind::Legacy);
    let out = render(
        r#"<p title="${user.name}">${count * 2 + 1}</p>"#,
        json!({"user": {"name": "Ada"}, "count": 4}),
        config,
    );
    assert_eq!(out, r#"<p title="Ada">9</p>"#);
}

#[test]
fn test_errors_abort_the_pass() {
    let mut library = TemplateLibrary::new();
    let mut doc = parse_document(r#"<div><os:Repeat expression="${user}"/></div>"#).unwrap();
    let root = doc.root();
    let err = TemplateProcessor::new(ProcessorConfig::default())
        .process(&mut doc, root, Value::from(json!({"user": "Ada"})), &mut library)
        .unwrap_err();
    assert_eq!(err.kind, TemplateErrorKind::NotAnArray);
    assert!(err.to_string().contains("os:Repeat"));
}
