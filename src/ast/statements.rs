use crate::ast::Expr;

/// Template statement.
///
/// A parsed template is a sequence of statements; block statements own their
/// nested bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Literal text emitted verbatim
    Text(String),

    /// Comment, dropped during evaluation
    ///
    /// # Example
    /// ```text
    /// {# explain yourself #}
    /// ```
    Comment(String),

    /// Expression output
    ///
    /// # Example
    /// ```text
    /// {{ user.name | upper }}
    /// ```
    Expression(Expr),

    /// Conditional block
    ///
    /// `elif` chains are represented as a nested `If` in the alternate slot.
    ///
    /// # Example
    /// ```text
    /// {% if x > 1 %}...{% elif x > 0 %}...{% else %}...{% endif %}
    /// ```
    If {
        condition: Expr,
        body: Vec<Statement>,
        alternate: Vec<Statement>,
    },

    /// Loop over an iterable
    ///
    /// `target` is an identifier or a tuple of identifiers (destructuring).
    /// The `default` block runs only when the loop performed zero iterations.
    ///
    /// # Example
    /// ```text
    /// {% for item in items if item.price > 0 %}...{% else %}none{% endfor %}
    /// ```
    For {
        target: Expr,
        iterable: Expr,
        body: Vec<Statement>,
        default: Vec<Statement>,
    },

    /// Variable assignment
    ///
    /// Either `{% set target = value %}` or the block-capture form
    /// `{% set target %}body{% endset %}` (`value` is `None`, the rendered
    /// body becomes the value). The target may be an identifier, a tuple of
    /// identifiers, or a member expression.
    Set {
        target: Expr,
        value: Option<Expr>,
        body: Vec<Statement>,
    },

    /// Macro definition
    ///
    /// Parameters are identifiers or keyword arguments carrying defaults.
    ///
    /// # Example
    /// ```text
    /// {% macro greet(name, greeting="Hi") %}{{ greeting }}, {{ name }}!{% endmacro %}
    /// ```
    Macro {
        name: String,
        params: Vec<Expr>,
        body: Vec<Statement>,
    },

    /// Call block, invoking a macro with an injectable `caller()` body
    ///
    /// # Example
    /// ```text
    /// {% call(user) list_users(users) %}{{ user.name }}{% endcall %}
    /// ```
    CallBlock {
        caller_params: Vec<Expr>,
        call: Expr,
        body: Vec<Statement>,
    },

    /// Filter block, applying a filter to the rendered body
    ///
    /// # Example
    /// ```text
    /// {% filter upper %}shout{% endfilter %}
    /// ```
    FilterBlock {
        name: String,
        args: Vec<Expr>,
        body: Vec<Statement>,
    },

    /// Abort the nearest enclosing loop
    Break,

    /// Skip to the next iteration of the nearest enclosing loop
    Continue,
}
