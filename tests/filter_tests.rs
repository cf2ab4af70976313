// tests/filter_tests.rs

use serde_json::json;
use sprig_lang::Template;

fn render(source: &str, context: serde_json::Value) -> Result<String, String> {
    let template = Template::new(source).map_err(|e| e.to_string())?;
    template.render(&context).map_err(|e| e.to_string())
}

fn render_ok(source: &str, context: serde_json::Value) -> String {
    match render(source, context) {
        Ok(output) => output,
        Err(e) => panic!("render failed for {:?}: {}", source, e),
    }
}

// ============================================================================
// String Filters
// ============================================================================

#[test]
fn test_case_filters() {
    assert_eq!(render_ok("{{ 'ab c' | upper }}", json!({})), "AB C");
    assert_eq!(render_ok("{{ 'AB C' | lower }}", json!({})), "ab c");
    assert_eq!(render_ok("{{ 'ab cd' | title }}", json!({})), "Ab Cd");
    assert_eq!(render_ok("{{ 'aBC dE' | capitalize }}", json!({})), "Abc de");
}

#[test]
fn test_trim_filter() {
    assert_eq!(render_ok("[{{ '  x ' | trim }}]", json!({})), "[x]");
}

#[test]
fn test_replace_filter() {
    assert_eq!(
        render_ok("{{ 'hello' | replace('l', 'L') }}", json!({})),
        "heLLo"
    );
}

#[test]
fn test_indent_filter() {
    assert_eq!(
        render_ok("{{ 'a\nb' | indent }}", json!({})),
        "a\n    b"
    );
    assert_eq!(
        render_ok("{{ 'a\nb' | indent(2) }}", json!({})),
        "a\n  b"
    );
    assert_eq!(
        render_ok("{{ 'a\nb' | indent(width=2, first=true) }}", json!({})),
        "  a\n  b"
    );
    // Blank lines stay unindented unless asked
    assert_eq!(
        render_ok("{{ 'a\n\nb' | indent(2) }}", json!({})),
        "a\n\n  b"
    );
}

// ============================================================================
// Sequence Filters
// ============================================================================

#[test]
fn test_length_filter() {
    assert_eq!(render_ok("{{ [1, 2, 3] | length }}", json!({})), "3");
    assert_eq!(render_ok("{{ 'abcd' | length }}", json!({})), "4");
    assert_eq!(
        render_ok("{{ obj | count }}", json!({"obj": {"a": 1, "b": 2}})),
        "2"
    );
}

#[test]
fn test_first_and_last() {
    assert_eq!(render_ok("{{ [7, 8, 9] | first }}", json!({})), "7");
    assert_eq!(render_ok("{{ [7, 8, 9] | last }}", json!({})), "9");
    assert_eq!(render_ok("{{ 'abc' | first }}", json!({})), "a");
    assert_eq!(render_ok("{{ [] | first is undefined }}", json!({})), "true");
}

#[test]
fn test_reverse_filter() {
    assert_eq!(
        render_ok("{{ [1, 2, 3] | reverse | join(',') }}", json!({})),
        "3,2,1"
    );
    assert_eq!(render_ok("{{ 'abc' | reverse }}", json!({})), "cba");
}

#[test]
fn test_join_default_separator() {
    assert_eq!(render_ok("{{ [1, 2] | join }}", json!({})), "12");
}

#[test]
fn test_unique_preserves_first_occurrence() {
    assert_eq!(
        render_ok("{{ [3, 1, 3, 2, 1] | unique | join(',') }}", json!({})),
        "3,1,2"
    );
}

#[test]
fn test_list_filter() {
    assert_eq!(
        render_ok("{{ 'abc' | list | join('-') }}", json!({})),
        "a-b-c"
    );
    assert_eq!(
        render_ok("{{ obj | list | join(',') }}", json!({"obj": {"a": 1, "b": 2}})),
        "a,b"
    );
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn test_sort_numbers() {
    assert_eq!(
        render_ok("{{ [3, 1.5, 2] | sort | join(',') }}", json!({})),
        "1.5,2,3"
    );
}

#[test]
fn test_sort_strings_case_insensitive_by_default() {
    assert_eq!(
        render_ok("{{ ['b', 'A', 'c'] | sort | join(',') }}", json!({})),
        "A,b,c"
    );
}

#[test]
fn test_sort_case_sensitive() {
    assert_eq!(
        render_ok(
            "{{ ['b', 'A', 'c'] | sort(case_sensitive=true) | join(',') }}",
            json!({})
        ),
        "A,b,c"
    );
    assert_eq!(
        render_ok(
            "{{ ['a', 'B'] | sort(case_sensitive=true) | join(',') }}",
            json!({})
        ),
        "B,a"
    );
}

#[test]
fn test_sort_reverse() {
    assert_eq!(
        render_ok("{{ [1, 3, 2] | sort(reverse=true) | join(',') }}", json!({})),
        "3,2,1"
    );
}

#[test]
fn test_sort_by_attribute() {
    let context = json!({"items": [{"n": 2, "id": "b"}, {"n": 1, "id": "a"}]});
    assert_eq!(
        render_ok(
            "{% for i in items | sort(attribute='n') %}{{ i.id }}{% endfor %}",
            context
        ),
        "ab"
    );
}

#[test]
fn test_sort_mixed_types_errors() {
    let err = render("{{ [1, 'a'] | sort }}", json!({})).unwrap_err();
    assert!(err.contains("Cannot compare"));
}

#[test]
fn test_sort_is_stable() {
    let context = json!({"items": [
        {"k": 1, "id": "x"}, {"k": 0, "id": "y"}, {"k": 1, "id": "z"}
    ]});
    assert_eq!(
        render_ok(
            "{% for i in items | sort(attribute='k') %}{{ i.id }}{% endfor %}",
            context
        ),
        "yxz"
    );
}

// ============================================================================
// Object Filters
// ============================================================================

#[test]
fn test_items_filter() {
    assert_eq!(
        render_ok(
            "{% for k, v in obj | items %}{{ k }}:{{ v }};{% endfor %}",
            json!({"obj": {"a": 1, "b": 2}})
        ),
        "a:1;b:2;"
    );
}

#[test]
fn test_dictsort_by_key() {
    assert_eq!(
        render_ok(
            "{% for k, v in obj | dictsort %}{{ k }}={{ v }};{% endfor %}",
            json!({"obj": {"b": 2, "a": 1, "C": 3}})
        ),
        "a=1;b=2;C=3;"
    );
}

#[test]
fn test_dictsort_by_value_reversed() {
    assert_eq!(
        render_ok(
            "{% for k, v in obj | dictsort(by='value', reverse=true) %}{{ k }}{% endfor %}",
            json!({"obj": {"a": 2, "b": 3, "c": 1}})
        ),
        "bac"
    );
}

#[test]
fn test_object_get_method() {
    let context = json!({"obj": {"a": 1}});
    assert_eq!(render_ok("{{ obj.get('a') }}", context.clone()), "1");
    assert_eq!(render_ok("{{ obj.get('z', 9) }}", context.clone()), "9");
    assert_eq!(
        render_ok("{{ obj.get('z') is undefined }}", context),
        "true"
    );
}

#[test]
fn test_object_keys_values_methods() {
    let context = json!({"obj": {"a": 1, "b": 2}});
    assert_eq!(
        render_ok("{{ obj.keys() | join(',') }}", context.clone()),
        "a,b"
    );
    assert_eq!(render_ok("{{ obj.values() | join(',') }}", context), "1,2");
}

// ============================================================================
// Selection Filters
// ============================================================================

#[test]
fn test_selectattr_truthiness() {
    let context = json!({"users": [
        {"name": "a", "active": true},
        {"name": "b", "active": false},
        {"name": "c", "active": true}
    ]});
    assert_eq!(
        render_ok(
            "{% for u in users | selectattr('active') %}{{ u.name }}{% endfor %}",
            context
        ),
        "ac"
    );
}

#[test]
fn test_selectattr_with_test() {
    let context = json!({"users": [
        {"name": "a", "role": "admin"},
        {"name": "b", "role": "user"}
    ]});
    assert_eq!(
        render_ok(
            "{% for u in users | selectattr('role', 'equalto', 'admin') %}{{ u.name }}{% endfor %}",
            context
        ),
        "a"
    );
}

#[test]
fn test_rejectattr() {
    let context = json!({"users": [
        {"name": "a", "hidden": true},
        {"name": "b", "hidden": false}
    ]});
    assert_eq!(
        render_ok(
            "{% for u in users | rejectattr('hidden') %}{{ u.name }}{% endfor %}",
            context
        ),
        "b"
    );
}

#[test]
fn test_map_attribute() {
    let context = json!({"users": [{"name": "a"}, {"name": "b"}]});
    assert_eq!(
        render_ok(
            "{{ users | map(attribute='name') | join(',') }}",
            context
        ),
        "a,b"
    );
}

#[test]
fn test_map_attribute_with_default() {
    let context = json!({"users": [{"name": "a"}, {}]});
    assert_eq!(
        render_ok(
            "{{ users | map(attribute='name', default='?') | join(',') }}",
            context
        ),
        "a,?"
    );
}

// ============================================================================
// Conversion Filters
// ============================================================================

#[test]
fn test_int_filter() {
    assert_eq!(render_ok("{{ '42' | int }}", json!({})), "42");
    assert_eq!(render_ok("{{ 3.9 | int }}", json!({})), "3");
    assert_eq!(render_ok("{{ true | int }}", json!({})), "1");
    assert_eq!(render_ok("{{ 'junk' | int }}", json!({})), "0");
    assert_eq!(render_ok("{{ 'junk' | int(7) }}", json!({})), "7");
    assert_eq!(render_ok("{{ '2.5' | int }}", json!({})), "2");
}

#[test]
fn test_float_filter() {
    assert_eq!(render_ok("{{ '2.5' | float }}", json!({})), "2.5");
    assert_eq!(render_ok("{{ 2 | float }}", json!({})), "2.0");
    assert_eq!(render_ok("{{ 'junk' | float }}", json!({})), "0.0");
}

#[test]
fn test_abs_filter() {
    assert_eq!(render_ok("{{ -3 | abs }}", json!({})), "3");
    assert_eq!(render_ok("{{ -2.5 | abs }}", json!({})), "2.5");
}

#[test]
fn test_string_filter() {
    assert_eq!(render_ok("{{ 42 | string | length }}", json!({})), "2");
}

// ============================================================================
// Default Filter
// ============================================================================

#[test]
fn test_default_replaces_undefined_only() {
    assert_eq!(render_ok("{{ missing | default('x') }}", json!({})), "x");
    assert_eq!(render_ok("{{ '' | default('x') }}", json!({})), "");
    // Null is defined, so it is not replaced (and renders as nothing)
    assert_eq!(render_ok("[{{ n | default('x') }}]", json!({"n": null})), "[]");
}

#[test]
fn test_default_boolean_mode_replaces_falsy() {
    assert_eq!(
        render_ok("{{ '' | default('x', true) }}", json!({})),
        "x"
    );
    assert_eq!(
        render_ok("{{ 0 | default('x', boolean=true) }}", json!({})),
        "x"
    );
    assert_eq!(
        render_ok("{{ 'v' | default('x', true) }}", json!({})),
        "v"
    );
}

// ============================================================================
// tojson
// ============================================================================

#[test]
fn test_tojson_roundtrip() {
    let output = render_ok(r#"{{ {"a": 1, "b": [1, 2]} | tojson }}"#, json!({}));
    let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
    assert_eq!(parsed, json!({"a": 1, "b": [1, 2]}));
}

#[test]
fn test_tojson_compact_separators() {
    assert_eq!(
        render_ok("{{ [1, 2] | tojson }}", json!({})),
        "[1, 2]"
    );
    assert_eq!(
        render_ok(r#"{{ [1, 2] | tojson(separators=[",", ":"]) }}"#, json!({})),
        "[1,2]"
    );
}

#[test]
fn test_tojson_indent() {
    assert_eq!(
        render_ok(r#"{{ {"a": 1} | tojson(indent=2) }}"#, json!({})),
        "{\n  \"a\": 1\n}"
    );
    assert_eq!(
        render_ok("{{ [1, [2]] | tojson(indent=2) }}", json!({})),
        "[\n  1,\n  [\n    2\n  ]\n]"
    );
}

#[test]
fn test_tojson_sort_keys() {
    assert_eq!(
        render_ok(r#"{{ {"b": 1, "a": 2} | tojson(sort_keys=true) }}"#, json!({})),
        r#"{"a": 2, "b": 1}"#
    );
}

#[test]
fn test_tojson_ensure_ascii() {
    assert_eq!(
        render_ok(r#"{{ "héllo" | tojson(ensure_ascii=true) }}"#, json!({})),
        r#""h\u00e9llo""#
    );
    assert_eq!(render_ok(r#"{{ "héllo" | tojson }}"#, json!({})), "\"héllo\"");
}

#[test]
fn test_tojson_escapes_and_types() {
    assert_eq!(
        render_ok(r#"{{ "a\"b\nc" | tojson }}"#, json!({})),
        r#""a\"b\nc""#
    );
    assert_eq!(render_ok("{{ 2.0 | tojson }}", json!({})), "2.0");
    assert_eq!(render_ok("{{ none | tojson }}", json!({})), "null");
    assert_eq!(render_ok("{{ true | tojson }}", json!({})), "true");
}

#[test]
fn test_tojson_rejects_functions() {
    let source = "{% macro m() %}x{% endmacro %}{{ m | tojson }}";
    let err = render(source, json!({})).unwrap_err();
    assert!(err.contains("not JSON serializable"));
}
