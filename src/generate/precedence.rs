use serde::Serialize;

/// Binding strength of a generated Python expression.
///
/// Higher binds tighter. Levels are spaced so that [`Precedence::tighter`]
/// lands strictly between a level and the next one up, which lets a rule ask
/// for "tighter than additive" on the right-hand side of `a - (b - c)`
/// without naming the multiplicative level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Precedence(u8);

impl Precedence {
    /// No requirement. A slot asking for `NONE` never wraps.
    pub const NONE: Precedence = Precedence(0);
    pub const LAMBDA: Precedence = Precedence(10);
    /// `a if b else c`
    pub const CONDITIONAL: Precedence = Precedence(20);
    pub const LOGICAL_OR: Precedence = Precedence(30);
    pub const LOGICAL_AND: Precedence = Precedence(40);
    pub const LOGICAL_NOT: Precedence = Precedence(50);
    /// `in`, `not in`, `is`, `<`, `==`, ...
    pub const RELATIONAL: Precedence = Precedence(60);
    pub const BITWISE_OR: Precedence = Precedence(70);
    pub const BITWISE_XOR: Precedence = Precedence(80);
    pub const BITWISE_AND: Precedence = Precedence(90);
    pub const BITWISE_SHIFT: Precedence = Precedence(100);
    /// `+ -`
    pub const ADDITIVE: Precedence = Precedence(110);
    /// `* / // %`
    pub const MULTIPLICATIVE: Precedence = Precedence(120);
    /// `+x -x ~x`
    pub const UNARY: Precedence = Precedence(130);
    /// `**`
    pub const EXPONENTIATION: Precedence = Precedence(140);
    /// `f(x)`, `x.attr`, `x[i]`
    pub const FUNCTION_CALL: Precedence = Precedence(150);
    /// `[...]`, `{...}`, `(...)` displays
    pub const COLLECTION: Precedence = Precedence(160);
    /// Literals and names
    pub const ATOMIC: Precedence = Precedence(170);

    /// A level strictly tighter than `self` but looser than the next named level.
    pub const fn tighter(self) -> Precedence {
        Precedence(self.0 + 1)
    }
}

/// Whether a child expression must be grouped before it is substituted into a
/// slot that requires `required`.
pub fn needs_wrapping(child: Precedence, required: Precedence) -> bool {
    child < required
}

/// Wrap `code` in grouping syntax when `needs_wrapping` says so.
pub fn wrap(code: String, child: Precedence, required: Precedence) -> String {
    if needs_wrapping(child, required) {
        format!("({})", code)
    } else {
        code
    }
}
