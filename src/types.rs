use std::fmt::{self, Display};

/// Lexical category of a token or construct.
///
/// The order is significant: every variant at or after [`Type::NonInterchangeable`]
/// can only be matched against a node with byte-equal label, never renamed into
/// another type (or into another variant beyond the barrier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Type {
    /// Structural node invented by a parser, with no spelling of its own.
    #[default]
    Virtual,
    Functions,
    UserTypes,
    Identifiers,
    Jumps,
    Specifiers,
    Types,
    LeftBrackets,
    RightBrackets,
    Comparisons,
    Operators,
    LogicalOperators,
    Assignments,
    Directives,
    Comments,
    /// Barrier: this and everything after it never takes part in renames.
    NonInterchangeable,
    StrConstants,
    IntConstants,
    FPConstants,
    CharConstants,
    Keywords,
    Other,
}

impl Type {
    /// Folds aliases together for matching purposes: user-defined type names
    /// behave like built-in type names.
    pub fn canonize(self) -> Self {
        match self {
            Self::UserTypes => Self::Types,
            other => other,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
