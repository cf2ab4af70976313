// tests/render_tests.rs

use serde_json::json;
use sprig_lang::{Template, TokenizeOptions};

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

#[test]
fn test_plain_text_passthrough() {
    assert_eq!(render_ok("hello world", json!({})), "hello world");
}

#[test]
fn test_variable_output() {
    assert_eq!(
        render_ok("Hello, {{ name }}!", json!({"name": "Ana"})),
        "Hello, Ana!"
    );
}

#[test]
fn test_undefined_variable_renders_empty() {
    assert_eq!(render_ok("[{{ missing }}]", json!({})), "[]");
}

#[test]
fn test_comment_produces_no_output() {
    assert_eq!(render_ok("a{# hidden #}b", json!({})), "ab");
}

#[test]
fn test_render_twice_is_stable() {
    let template = Template::new("{% for x in items %}{{ x }},{% endfor %}").unwrap();
    let context = json!({"items": [1, 2, 3]});
    let first = template.render(&context).unwrap();
    let second = template.render(&context).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, "1,2,3,");
}

// ============================================================================
// Arithmetic and Operators
// ============================================================================

#[test]
fn test_integer_addition_stays_integer() {
    assert_eq!(render_ok("{{ 1 + 1 }}", json!({})), "2");
}

#[test]
fn test_float_operand_promotes() {
    assert_eq!(render_ok("{{ 1 + 1.0 }}", json!({})), "2.0");
    assert_eq!(render_ok("{{ 2.5 * 2 }}", json!({})), "5.0");
    assert_eq!(render_ok("{{ 5 - 0.5 }}", json!({})), "4.5");
}

#[test]
fn test_division_always_float() {
    assert_eq!(render_ok("{{ 3 / 2 }}", json!({})), "1.5");
    assert_eq!(render_ok("{{ 4 / 2 }}", json!({})), "2.0");
}

#[test]
fn test_modulo_preserves_type() {
    assert_eq!(render_ok("{{ 7 % 2 }}", json!({})), "1");
    assert_eq!(render_ok("{{ 7.5 % 2 }}", json!({})), "1.5");
}

#[test]
fn test_division_by_zero_errors() {
    let err = render("{{ 1 / 0 }}", json!({})).unwrap_err();
    assert!(err.contains("Division by zero"));
}

#[test]
fn test_string_concat_operator_coerces() {
    assert_eq!(render_ok("{{ 'v' ~ 1 ~ '.' ~ 2.5 }}", json!({})), "v1.2.5");
}

#[test]
fn test_array_addition_concatenates() {
    assert_eq!(
        render_ok("{{ ([1] + [2, 3]) | join(',') }}", json!({})),
        "1,2,3"
    );
}

#[test]
fn test_adding_mixed_types_errors() {
    let err = render("{{ 1 + 'x' }}", json!({})).unwrap_err();
    assert!(err.contains("Cannot add"));
}

#[test]
fn test_mixed_numeric_equality() {
    assert_eq!(render_ok("{{ 1 == 1.0 }}", json!({})), "true");
}

#[test]
fn test_comparisons() {
    assert_eq!(render_ok("{{ 2 > 1 }}", json!({})), "true");
    assert_eq!(render_ok("{{ 2 <= 1 }}", json!({})), "false");
    assert_eq!(render_ok("{{ true > 0 }}", json!({})), "true");
}

#[test]
fn test_string_comparison_case_insensitive() {
    assert_eq!(render_ok("{{ 'Apple' < 'banana' }}", json!({})), "true");
}

#[test]
fn test_comparing_null_with_number_errors() {
    let err = render("{{ none < 1 }}", json!({})).unwrap_err();
    assert!(err.contains("Cannot compare"));
}

#[test]
fn test_logical_operators_short_circuit() {
    assert_eq!(render_ok("{{ false and missing.x }}", json!({})), "false");
    assert_eq!(render_ok("{{ true or missing.x }}", json!({})), "true");
    assert_eq!(render_ok("{{ not '' }}", json!({})), "true");
}

#[test]
fn test_unary_minus() {
    assert_eq!(render_ok("{{ -n }}", json!({"n": 5})), "-5");
    assert_eq!(render_ok("{{ 10 - -2 }}", json!({})), "12");
}

// ============================================================================
// Membership
// ============================================================================

#[test]
fn test_string_membership() {
    assert_eq!(render_ok(r#"{{ "cd" in "abcde" }}"#, json!({})), "true");
    assert_eq!(render_ok(r#"{{ "x" not in "abcde" }}"#, json!({})), "true");
}

#[test]
fn test_array_membership() {
    assert_eq!(render_ok("{{ 2 in [1, 2, 3] }}", json!({})), "true");
    assert_eq!(render_ok("{{ 9 in [1, 2, 3] }}", json!({})), "false");
}

#[test]
fn test_object_key_membership() {
    assert_eq!(
        render_ok("{{ 'a' in obj }}", json!({"obj": {"a": 1}})),
        "true"
    );
}

#[test]
fn test_membership_in_undefined_degrades() {
    assert_eq!(render_ok("{{ 1 in missing }}", json!({})), "false");
    assert_eq!(render_ok("{{ 1 not in missing }}", json!({})), "true");
}

// ============================================================================
// Undefined vs Null
// ============================================================================

#[test]
fn test_undefined_is_not_null() {
    assert_eq!(render_ok("{{ missing_var == none }}", json!({})), "false");
    assert_eq!(render_ok("{{ missing_var is undefined }}", json!({})), "true");
    assert_eq!(render_ok("{{ missing_var is defined }}", json!({})), "false");
}

#[test]
fn test_null_context_value() {
    assert_eq!(render_ok("{{ x is none }}", json!({"x": null})), "true");
    assert_eq!(render_ok("{{ x is undefined }}", json!({"x": null})), "false");
}

#[test]
fn test_literal_aliases() {
    assert_eq!(render_ok("{{ True }}|{{ False }}", json!({})), "true|false");
    assert_eq!(render_ok("{{ None == none }}", json!({})), "true");
}

// ============================================================================
// Member Access and Slicing
// ============================================================================

#[test]
fn test_nested_member_access() {
    let context = json!({"user": {"profile": {"name": "Ana"}}});
    assert_eq!(render_ok("{{ user.profile.name }}", context), "Ana");
}

#[test]
fn test_computed_access() {
    assert_eq!(
        render_ok("{{ obj['a b'] }}", json!({"obj": {"a b": 7}})),
        "7"
    );
}

#[test]
fn test_array_indexing() {
    let context = json!({"items": [10, 20, 30]});
    assert_eq!(render_ok("{{ items[1] }}", context.clone()), "20");
    assert_eq!(render_ok("{{ items[-1] }}", context.clone()), "30");
    assert_eq!(render_ok("{{ items[9] is undefined }}", context), "true");
}

#[test]
fn test_string_indexing() {
    assert_eq!(render_ok("{{ 'abc'[0] }}{{ 'abc'[-1] }}", json!({})), "ac");
}

#[test]
fn test_length_property() {
    assert_eq!(render_ok("{{ [1, 2, 3].length }}", json!({})), "3");
    assert_eq!(render_ok("{{ 'abcd'.length }}", json!({})), "4");
}

#[test]
fn test_slices() {
    let context = json!({"items": [0, 1, 2, 3, 4]});
    assert_eq!(
        render_ok("{{ items[1:3] | join(',') }}", context.clone()),
        "1,2"
    );
    assert_eq!(
        render_ok("{{ items[:2] | join(',') }}", context.clone()),
        "0,1"
    );
    assert_eq!(
        render_ok("{{ items[::2] | join(',') }}", context.clone()),
        "0,2,4"
    );
    assert_eq!(
        render_ok("{{ items[::-1] | join(',') }}", context),
        "4,3,2,1,0"
    );
}

#[test]
fn test_string_slicing() {
    assert_eq!(render_ok("{{ 'hello'[::-1] }}", json!({})), "olleh");
    assert_eq!(render_ok("{{ 'hello'[1:4] }}", json!({})), "ell");
}

#[test]
fn test_property_of_undefined_errors() {
    let err = render("{{ missing.x }}", json!({})).unwrap_err();
    assert!(err.contains("undefined"));
}

// ============================================================================
// Conditionals
// ============================================================================

#[test]
fn test_if_else() {
    let source = "{% if age >= 18 %}adult{% else %}minor{% endif %}";
    assert_eq!(render_ok(source, json!({"age": 21})), "adult");
    assert_eq!(render_ok(source, json!({"age": 12})), "minor");
}

#[test]
fn test_elif_chain() {
    let source = "{% if x > 10 %}big{% elif x > 5 %}mid{% elif x > 0 %}small{% else %}zero{% endif %}";
    assert_eq!(render_ok(source, json!({"x": 11})), "big");
    assert_eq!(render_ok(source, json!({"x": 7})), "mid");
    assert_eq!(render_ok(source, json!({"x": 2})), "small");
    assert_eq!(render_ok(source, json!({"x": 0})), "zero");
}

#[test]
fn test_truthiness_rules() {
    assert_eq!(render_ok("{% if [] %}y{% else %}n{% endif %}", json!({})), "n");
    assert_eq!(render_ok("{% if '' %}y{% else %}n{% endif %}", json!({})), "n");
    assert_eq!(render_ok("{% if 0 %}y{% else %}n{% endif %}", json!({})), "n");
    assert_eq!(
        render_ok("{% if obj %}y{% else %}n{% endif %}", json!({"obj": {}})),
        "n"
    );
    assert_eq!(render_ok("{% if [0] %}y{% else %}n{% endif %}", json!({})), "y");
}

#[test]
fn test_ternary_expression() {
    assert_eq!(render_ok("{{ 'y' if 1 > 0 else 'n' }}", json!({})), "y");
    assert_eq!(render_ok("{{ 'y' if 0 > 1 else 'n' }}", json!({})), "n");
}

#[test]
fn test_select_without_else_yields_nothing() {
    assert_eq!(render_ok("[{{ 'y' if 0 }}]", json!({})), "[]");
}

// ============================================================================
// Loops
// ============================================================================

#[test]
fn test_loop_metadata() {
    assert_eq!(
        render_ok(
            "{% for x in [10,20,30] %}{{loop.index}}:{{loop.first}} {% endfor %}",
            json!({})
        ),
        "1:true 2:false 3:false "
    );
}

#[test]
fn test_loop_revindex_and_neighbors() {
    assert_eq!(
        render_ok(
            "{% for x in [1,2,3] %}{{ loop.revindex }}{{ loop.previtem }}{{ loop.nextitem }};{% endfor %}",
            json!({})
        ),
        "32;213;12;"
    );
}

#[test]
fn test_inline_if_excludes_from_iteration_count() {
    assert_eq!(
        render_ok("{% for x in [1,2,3,4] if x > 2 %}{{x}}{% endfor %}", json!({})),
        "34"
    );
    assert_eq!(
        render_ok(
            "{% for x in [1,2,3,4] if x > 2 %}{{loop.length}}{% endfor %}",
            json!({})
        ),
        "22"
    );
}

#[test]
fn test_for_else_on_empty() {
    assert_eq!(
        render_ok("{% for x in [] %}{{x}}{% else %}empty{% endfor %}", json!({})),
        "empty"
    );
}

#[test]
fn test_for_else_on_filtered_to_empty() {
    assert_eq!(
        render_ok(
            "{% for x in [1] if x > 5 %}{{x}}{% else %}empty{% endfor %}",
            json!({})
        ),
        "empty"
    );
}

#[test]
fn test_break() {
    assert_eq!(
        render_ok(
            "{% for x in [1,2,3,4,5] %}{% if x == 3 %}{% break %}{% endif %}{{x}}{% endfor %}",
            json!({})
        ),
        "12"
    );
}

#[test]
fn test_continue() {
    assert_eq!(
        render_ok(
            "{% for x in [1,2,3,4] %}{% if x % 2 == 0 %}{% continue %}{% endif %}{{x}}{% endfor %}",
            json!({})
        ),
        "13"
    );
}

#[test]
fn test_break_keeps_output_emitted_before_it() {
    assert_eq!(
        render_ok("{% for x in [1,2] %}a{% break %}b{% endfor %}", json!({})),
        "a"
    );
}

#[test]
fn test_break_outside_loop_errors() {
    let err = render("{% break %}", json!({})).unwrap_err();
    assert!(err.contains("outside of a for loop"));
}

#[test]
fn test_continue_outside_loop_errors() {
    let err = render("{% continue %}", json!({})).unwrap_err();
    assert!(err.contains("outside of a for loop"));
}

#[test]
fn test_signal_does_not_cross_macro_boundary() {
    let source =
        "{% for x in [1] %}{% macro m() %}{% continue %}{% endmacro %}{{ m() }}{% endfor %}";
    let err = render(source, json!({})).unwrap_err();
    assert!(err.contains("'continue' outside of a for loop"));
}

#[test]
fn test_break_in_for_else_stops_enclosing_loop() {
    let source =
        "{% for a in [1, 2] %}{% for b in [] %}x{% else %}{% break %}{% endfor %}{{ a }}{% endfor %}";
    assert_eq!(render_ok(source, json!({})), "");
}

#[test]
fn test_iterate_string_by_character() {
    assert_eq!(
        render_ok("{% for c in 'abc' %}{{c}}-{% endfor %}", json!({})),
        "a-b-c-"
    );
}

#[test]
fn test_iterate_object_by_keys() {
    assert_eq!(
        render_ok(
            "{% for k in obj %}{{k}}{% endfor %}",
            json!({"obj": {"a": 1, "b": 2}})
        ),
        "ab"
    );
}

#[test]
fn test_loop_tuple_destructuring() {
    assert_eq!(
        render_ok(
            "{% for k, v in obj | items %}{{k}}={{v}};{% endfor %}",
            json!({"obj": {"a": 1, "b": 2}})
        ),
        "a=1;b=2;"
    );
}

#[test]
fn test_destructuring_arity_mismatch_errors() {
    let err = render(
        "{% for a, b in [[1, 2, 3]] %}{{a}}{% endfor %}",
        json!({}),
    )
    .unwrap_err();
    assert!(err.contains("unpack"));
}

#[test]
fn test_nested_loops() {
    assert_eq!(
        render_ok(
            "{% for a in [1,2] %}{% for b in [3,4] %}{{a}}{{b}} {% endfor %}{% endfor %}",
            json!({})
        ),
        "13 14 23 24 "
    );
}

#[test]
fn test_break_only_stops_inner_loop() {
    assert_eq!(
        render_ok(
            "{% for a in [1,2] %}{% for b in [3,4] %}{% break %}{% endfor %}{{a}}{% endfor %}",
            json!({})
        ),
        "12"
    );
}

#[test]
fn test_iterating_number_errors() {
    let err = render("{% for x in 5 %}{{x}}{% endfor %}", json!({})).unwrap_err();
    assert!(err.contains("Cannot iterate"));
}

// ============================================================================
// Set and Scoping
// ============================================================================

#[test]
fn test_set_and_use() {
    assert_eq!(render_ok("{% set x = 40 + 2 %}{{ x }}", json!({})), "42");
}

#[test]
fn test_set_overwrites() {
    assert_eq!(
        render_ok("{% set x = 1 %}{% set x = 2 %}{{ x }}", json!({})),
        "2"
    );
}

#[test]
fn test_set_inside_if_is_visible_after() {
    assert_eq!(
        render_ok("{% if true %}{% set x = 5 %}{% endif %}{{ x }}", json!({})),
        "5"
    );
}

#[test]
fn test_set_inside_loop_does_not_leak() {
    assert_eq!(
        render_ok(
            "{% for i in [1] %}{% set x = 9 %}{% endfor %}[{{ x }}]",
            json!({})
        ),
        "[]"
    );
}

#[test]
fn test_set_tuple_destructuring() {
    assert_eq!(
        render_ok("{% set a, b = 1, 2 %}{{ a }}{{ b }}", json!({})),
        "12"
    );
}

#[test]
fn test_set_block_capture() {
    assert_eq!(
        render_ok("{% set x %}a{{ 1 + 1 }}{% endset %}{{ x }}/{{ x }}", json!({})),
        "a2/a2"
    );
}

#[test]
fn test_namespace_escapes_block_scoping() {
    let source = "{% set ns = namespace(total=0) %}\
{% for n in [1, 2, 3] %}{% set ns.total = ns.total + n %}{% endfor %}\
{{ ns.total }}";
    assert_eq!(render_ok(source, json!({})), "6");
}

#[test]
fn test_member_assignment_requires_object() {
    let err = render("{% set x = 1 %}{% set x.y = 2 %}", json!({})).unwrap_err();
    assert!(err.contains("Cannot assign"));
}

#[test]
fn test_member_assignment_on_context_object() {
    assert_eq!(
        render_ok(
            "{% set obj.b = 2 %}{{ obj.a }}{{ obj.b }}",
            json!({"obj": {"a": 1}})
        ),
        "12"
    );
}

// ============================================================================
// Macros
// ============================================================================

#[test]
fn test_macro_with_keyword_default() {
    let source = r#"{% macro greet(name, greeting="Hi") %}{{greeting}}, {{name}}!{% endmacro %}{{ greet("Ana") }}"#;
    assert_eq!(render_ok(source, json!({})), "Hi, Ana!");

    let source = r#"{% macro greet(name, greeting="Hi") %}{{greeting}}, {{name}}!{% endmacro %}{{ greet("Ana", greeting="Yo") }}"#;
    assert_eq!(render_ok(source, json!({})), "Yo, Ana!");
}

#[test]
fn test_macro_positional_over_default() {
    let source = r#"{% macro greet(name, greeting="Hi") %}{{greeting}}, {{name}}!{% endmacro %}{{ greet("Ana", "Hey") }}"#;
    assert_eq!(render_ok(source, json!({})), "Hey, Ana!");
}

#[test]
fn test_macro_missing_required_argument_errors() {
    let source = "{% macro greet(name) %}{{name}}{% endmacro %}{{ greet() }}";
    let err = render(source, json!({})).unwrap_err();
    assert!(err.contains("missing required argument"));
}

#[test]
fn test_macro_spread_arguments() {
    let source = "{% macro add(a, b) %}{{ a + b }}{% endmacro %}{{ add(*nums) }}";
    assert_eq!(render_ok(source, json!({"nums": [2, 3]})), "5");
}

#[test]
fn test_macro_sees_definition_scope() {
    let source = "{% set who = 'world' %}{% macro hello() %}hello {{ who }}{% endmacro %}{{ hello() }}";
    assert_eq!(render_ok(source, json!({})), "hello world");
}

#[test]
fn test_calling_non_function_errors() {
    let err = render("{{ x() }}", json!({"x": 1})).unwrap_err();
    assert!(err.contains("not callable"));
}

// ============================================================================
// Call Blocks
// ============================================================================

#[test]
fn test_call_block_injects_caller() {
    let source = "{% macro wrap() %}<{{ caller() }}>{% endmacro %}{% call wrap() %}hi{% endcall %}";
    assert_eq!(render_ok(source, json!({})), "<hi>");
}

#[test]
fn test_call_block_with_caller_arguments() {
    let source = "{% macro each(items) %}{% for i in items %}{{ caller(i) }}{% endfor %}{% endmacro %}\
{% call(x) each([1, 2]) %}[{{ x }}]{% endcall %}";
    assert_eq!(render_ok(source, json!({})), "[1][2]");
}

// ============================================================================
// Filter Blocks
// ============================================================================

#[test]
fn test_filter_block() {
    assert_eq!(
        render_ok("{% filter upper %}quiet {{ 'word' }}{% endfilter %}", json!({})),
        "QUIET WORD"
    );
}

#[test]
fn test_filter_block_with_arguments() {
    assert_eq!(
        render_ok("{% filter replace('a', 'o') %}banana{% endfilter %}", json!({})),
        "bonono"
    );
}

// ============================================================================
// Filters and Tests
// ============================================================================

#[test]
fn test_filter_chaining() {
    assert_eq!(
        render_ok(r#"{{ [3,1,2] | sort | join(",") }}"#, json!({})),
        "1,2,3"
    );
}

#[test]
fn test_unknown_filter_errors() {
    let err = render("{{ 1 | frob }}", json!({})).unwrap_err();
    assert!(err.contains("Unknown filter"));
}

#[test]
fn test_known_filter_on_wrong_type_errors() {
    let err = render("{{ 1 | sort }}", json!({})).unwrap_err();
    assert!(err.contains("not defined for"));
}

#[test]
fn test_unknown_test_errors() {
    let err = render("{{ 1 is frobby }}", json!({})).unwrap_err();
    assert!(err.contains("Unknown test"));
}

#[test]
fn test_builtin_tests() {
    assert_eq!(render_ok("{{ 3 is odd }}", json!({})), "true");
    assert_eq!(render_ok("{{ 3 is even }}", json!({})), "false");
    assert_eq!(render_ok("{{ 3 is number }}", json!({})), "true");
    assert_eq!(render_ok("{{ 3 is integer }}", json!({})), "true");
    assert_eq!(render_ok("{{ 3.5 is integer }}", json!({})), "false");
    assert_eq!(render_ok("{{ 'a' is string }}", json!({})), "true");
    assert_eq!(render_ok("{{ true is boolean }}", json!({})), "true");
    assert_eq!(render_ok("{{ [1] is iterable }}", json!({})), "true");
    assert_eq!(render_ok("{{ obj is mapping }}", json!({"obj": {}})), "true");
    assert_eq!(render_ok("{{ 'abc' is lower }}", json!({})), "true");
    assert_eq!(render_ok("{{ 'ABC' is upper }}", json!({})), "true");
    assert_eq!(render_ok("{{ 3 is eq 3 }}", json!({})), "true");
    assert_eq!(render_ok("{{ 3 is equalto(4) }}", json!({})), "false");
    assert_eq!(render_ok("{{ range is callable }}", json!({})), "true");
    assert_eq!(render_ok("{{ 1 is not string }}", json!({})), "true");
}

#[test]
fn test_tests_bind_tighter_than_and() {
    assert_eq!(
        render_ok("{{ x is defined and x > 1 }}", json!({"x": 2})),
        "true"
    );
}

// ============================================================================
// String Methods
// ============================================================================

#[test]
fn test_string_methods() {
    assert_eq!(render_ok("{{ 'abc'.upper() }}", json!({})), "ABC");
    assert_eq!(render_ok("{{ 'ABC'.lower() }}", json!({})), "abc");
    assert_eq!(render_ok("{{ '  x  '.strip() }}", json!({})), "x");
    assert_eq!(render_ok("{{ 'one two'.title() }}", json!({})), "One Two");
    assert_eq!(render_ok("{{ 'hELLO'.capitalize() }}", json!({})), "Hello");
    assert_eq!(render_ok("{{ 'abc'.startswith('ab') }}", json!({})), "true");
    assert_eq!(render_ok("{{ 'abc'.endswith('bc') }}", json!({})), "true");
    assert_eq!(
        render_ok("{{ 'a,b,c'.split(',') | join('-') }}", json!({})),
        "a-b-c"
    );
    assert_eq!(
        render_ok("{{ '  a  b  '.split() | join('-') }}", json!({})),
        "a-b"
    );
    assert_eq!(
        render_ok("{{ 'banana'.replace('a', 'o', 2) }}", json!({})),
        "bonona"
    );
}

// ============================================================================
// Globals
// ============================================================================

#[test]
fn test_range() {
    assert_eq!(render_ok("{{ range(3) | join(',') }}", json!({})), "0,1,2");
    assert_eq!(
        render_ok("{{ range(2, 5) | join(',') }}", json!({})),
        "2,3,4"
    );
    assert_eq!(
        render_ok("{{ range(5, 1, -2) | join(',') }}", json!({})),
        "5,3"
    );
    assert_eq!(render_ok("{{ range(0) | length }}", json!({})), "0");
}

#[test]
fn test_range_zero_step_errors() {
    let err = render("{{ range(1, 5, 0) }}", json!({})).unwrap_err();
    assert!(err.contains("step"));
}

#[test]
fn test_strftime_now() {
    let year = render_ok("{{ strftime_now('%Y') }}", json!({}));
    assert_eq!(year.len(), 4);
    assert!(year.chars().all(|c| c.is_ascii_digit()));

    let escaped = render_ok("{{ strftime_now('%%') }}", json!({}));
    assert_eq!(escaped, "%");
}

#[test]
fn test_raise_exception() {
    let err = render("{{ raise_exception('boom') }}", json!({})).unwrap_err();
    assert!(err.contains("boom"));
}

// ============================================================================
// Whitespace Control
// ============================================================================

#[test]
fn test_trim_markers() {
    assert_eq!(
        render_ok("a  {%- if true -%}  b  {%- endif -%}  c", json!({})),
        "abc"
    );
}

#[test]
fn test_trim_blocks_option() {
    let template = Template::with_options(
        "{% if true %}\nx\n{% endif %}\n",
        &TokenizeOptions {
            trim_blocks: true,
            lstrip_blocks: false,
        },
    )
    .unwrap();
    assert_eq!(template.render(&json!({})).unwrap(), "x\n");
}

#[test]
fn test_lstrip_blocks_option() {
    let template = Template::with_options(
        "x\n    {% if true %}y{% endif %}",
        &TokenizeOptions {
            trim_blocks: false,
            lstrip_blocks: true,
        },
    )
    .unwrap();
    assert_eq!(template.render(&json!({})).unwrap(), "x\ny");
}

#[test]
fn test_generation_region_is_deleted() {
    assert_eq!(
        render_ok("a{% generation %}{{ boom() }}{% endgeneration %}b", json!({})),
        "ab"
    );
}
