// tests/formatter_tests.rs

use serde_json::json;
use sprig_lang::{Formatter, Template};

fn fmt(source: &str) -> String {
    Template::new(source)
        .unwrap_or_else(|e| panic!("parse failed for {:?}: {}", source, e))
        .format()
}

/// Formatting the parse of a formatted template must reproduce the text.
fn assert_idempotent(source: &str) {
    let once = fmt(source);
    let twice = fmt(&once);
    assert_eq!(once, twice, "format not idempotent for {:?}", source);
}

// ============================================================================
// Canonical Output
// ============================================================================

#[test]
fn test_expression_statement() {
    assert_eq!(fmt("{{ x }}"), "{{- x -}}");
}

#[test]
fn test_if_block_indents_body() {
    assert_eq!(
        fmt("{%if x%}a{%endif%}"),
        "{%- if x -%}\n    a\n{%- endif -%}"
    );
}

#[test]
fn test_custom_indent_width() {
    let template = Template::new("{%if x%}a{%endif%}").unwrap();
    assert_eq!(
        template.format_with(&Formatter::with_width(2)),
        "{%- if x -%}\n  a\n{%- endif -%}"
    );
}

#[test]
fn test_elif_chain_prints_flat() {
    let formatted = fmt("{% if a %}1{% elif b %}2{% else %}3{% endif %}");
    assert_eq!(
        formatted,
        "{%- if a -%}\n    1\n{%- elif b -%}\n    2\n{%- else -%}\n    3\n{%- endif -%}"
    );
}

#[test]
fn test_for_with_else() {
    assert_eq!(
        fmt("{% for x in items %}{{ x }}{% else %}none{% endfor %}"),
        "{%- for x in items -%}\n    {{- x -}}\n{%- else -%}\n    none\n{%- endfor -%}"
    );
}

#[test]
fn test_for_with_inline_filter() {
    assert_eq!(
        fmt("{% for x in items if x > 2 %}{{ x }}{% endfor %}"),
        "{%- for x in items if x > 2 -%}\n    {{- x -}}\n{%- endfor -%}"
    );
}

#[test]
fn test_set_forms() {
    assert_eq!(fmt("{% set x = 1 %}"), "{%- set x = 1 -%}");
    assert_eq!(fmt("{% set a, b = 1, 2 %}"), "{%- set a, b = 1, 2 -%}");
    assert_eq!(
        fmt("{% set x %}body{% endset %}"),
        "{%- set x -%}\n    body\n{%- endset -%}"
    );
}

#[test]
fn test_macro_and_call() {
    assert_eq!(
        fmt(r#"{% macro greet(name, greeting="Hi") %}{{ name }}{% endmacro %}"#),
        "{%- macro greet(name, greeting=\"Hi\") -%}\n    {{- name -}}\n{%- endmacro -%}"
    );
    assert_eq!(
        fmt("{% call(x) each([1]) %}{{ x }}{% endcall %}"),
        "{%- call(x) each([1]) -%}\n    {{- x -}}\n{%- endcall -%}"
    );
}

#[test]
fn test_filter_block_and_loop_controls() {
    assert_eq!(
        fmt("{% filter upper %}a{% endfilter %}"),
        "{%- filter upper -%}\n    a\n{%- endfilter -%}"
    );
    assert_eq!(
        fmt("{% for x in a %}{% break %}{% endfor %}"),
        "{%- for x in a -%}\n    {%- break -%}\n{%- endfor -%}"
    );
}

#[test]
fn test_comment_statement() {
    assert_eq!(fmt("{#  spaced out  #}"), "{# spaced out #}");
}

#[test]
fn test_text_is_trimmed() {
    assert_eq!(fmt("  hello  "), "hello");
}

// ============================================================================
// Expression Printing
// ============================================================================

#[test]
fn test_minimal_parentheses() {
    assert_eq!(fmt("{{ 1 + 2 * 3 }}"), "{{- 1 + 2 * 3 -}}");
    assert_eq!(fmt("{{ (1 + 2) * 3 }}"), "{{- (1 + 2) * 3 -}}");
    assert_eq!(fmt("{{ 1 + (2 * 3) }}"), "{{- 1 + 2 * 3 -}}");
}

#[test]
fn test_left_associative_subtraction_keeps_parens() {
    assert_eq!(fmt("{{ 1 - (2 - 3) }}"), "{{- 1 - (2 - 3) -}}");
    assert_eq!(fmt("{{ (1 - 2) - 3 }}"), "{{- 1 - 2 - 3 -}}");
}

#[test]
fn test_logical_and_not_parentheses() {
    assert_eq!(fmt("{{ not (a and b) }}"), "{{- not (a and b) -}}");
    assert_eq!(fmt("{{ not a == b }}"), "{{- not a == b -}}");
    assert_eq!(fmt("{{ (a or b) and c }}"), "{{- (a or b) and c -}}");
}

#[test]
fn test_ternary_printing() {
    assert_eq!(fmt("{{ a if c else b }}"), "{{- a if c else b -}}");
    assert_eq!(
        fmt("{{ (a if c else b) + 1 }}"),
        "{{- (a if c else b) + 1 -}}"
    );
}

#[test]
fn test_filter_and_test_printing() {
    assert_eq!(fmt("{{ x|upper }}"), "{{- x | upper -}}");
    assert_eq!(
        fmt("{{ items | join(',') }}"),
        "{{- items | join(\",\") -}}"
    );
    assert_eq!(fmt("{{ x is not none }}"), "{{- x is not none -}}");
    assert_eq!(fmt("{{ x is equalto(3) }}"), "{{- x is equalto(3) -}}");
}

#[test]
fn test_member_slice_and_call_printing() {
    assert_eq!(fmt("{{ a.b.c }}"), "{{- a.b.c -}}");
    assert_eq!(fmt("{{ items[1:3] }}"), "{{- items[1:3] -}}");
    assert_eq!(fmt("{{ items[::-1] }}"), "{{- items[::-1] -}}");
    assert_eq!(fmt("{{ items[:2] }}"), "{{- items[:2] -}}");
    assert_eq!(
        fmt("{{ f(1, key=2, *rest) }}"),
        "{{- f(1, key=2, *rest) -}}"
    );
}

#[test]
fn test_literal_printing() {
    assert_eq!(fmt("{{ 2.0 }}"), "{{- 2.0 -}}");
    assert_eq!(fmt("{{ 'a\\nb' }}"), "{{- \"a\\nb\" -}}");
    assert_eq!(
        fmt(r#"{{ {"k": [1, (2, 3)]} }}"#),
        r#"{{- {"k": [1, (2, 3)]} -}}"#
    );
}

#[test]
fn test_concat_operator_printing() {
    assert_eq!(fmt("{{ 'a' ~ 'b' ~ 'c' }}"), "{{- \"a\" ~ \"b\" ~ \"c\" -}}");
}

// ============================================================================
// Idempotence
// ============================================================================

#[test]
fn test_format_is_idempotent() {
    let templates = [
        "hello {{ name }}!",
        "{% if a %}x{% elif b %}y{% else %}z{% endif %}",
        "{% for x in [1, 2, 3] if x > 1 %}{{ loop.index }}:{{ x }}{% else %}-{% endfor %}",
        r#"{% macro greet(name, greeting="Hi") %}{{ greeting }}, {{ name }}!{% endmacro %}{{ greet("Ana") }}"#,
        "{% set ns = namespace(total=0) %}{% set ns.total = ns.total + 1 %}{{ ns.total }}",
        "{% filter upper %}text{% endfilter %}",
        "{% call(x) each([1, 2]) %}[{{ x }}]{% endcall %}",
        "a {# note #} b {{ x | default('?') }} c",
        "{{ {'a': [1, 2], 'b': (1, 2)} | tojson(indent=2) }}",
        "{% if x is defined and x > 1 %}{{ x[1:] }}{% endif %}",
        "line one\nline two {% break %}",
        "{%- if nested -%}\n  {%- if deeper -%}\n    deep\n  {%- endif -%}\n{%- endif -%}",
    ];

    for template in templates {
        assert_idempotent(template);
    }
}

#[test]
fn test_formatted_template_renders_identically() {
    let source = "{% if x %}yes{% else %}no{% endif %}";
    let template = Template::new(source).unwrap();
    let formatted = template.format();
    let reparsed = Template::new(&formatted).unwrap();

    let context = json!({"x": true});
    assert_eq!(
        template.render(&context).unwrap(),
        reparsed.render(&context).unwrap()
    );
}

#[test]
fn test_format_of_already_canonical_source() {
    let canonical = "{%- if x -%}\n    a\n{%- endif -%}";
    assert_eq!(fmt(canonical), canonical);
}
