//! Predicate registry and per-domain value conversion.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::date::DateLocale;

/// Comparison a [`super::FilterField`] applies to its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Predicate {
    OneOf,
    NotOneOf,
    Glob,
    NotGlob,
    Gt,
    Ge,
    Lt,
    Le,
}

/// Value domain of a column expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueDomain {
    Text,
    Integer,
    Real,
    Date,
}

/// Family of SQL fragment a predicate produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateKind {
    /// Equality against any of the values.
    OneOf,
    /// Substring match through `LIKE`.
    Glob,
    /// Ordered comparison using the descriptor's operator.
    Compare,
}

/// Which end of a date bucket a comparison binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// Bind both ends as a half-open range.
    Range,
    Start,
    /// Bind the last millisecond of the bucket.
    Last,
}

/// Static strategy record for a [`Predicate`].
#[derive(Debug)]
pub struct PredicateDescriptor {
    pub kind: PredicateKind,
    /// SQL comparison operator for [`PredicateKind::Compare`].
    pub operator: &'static str,
    /// True when the match is inverted after building the positive form.
    pub negate: bool,
    /// Positive form of this predicate.
    pub positive: Predicate,
    pub date_bound: DateBound,
}

static ONE_OF: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::OneOf,
    operator: "=",
    negate: false,
    positive: Predicate::OneOf,
    date_bound: DateBound::Range,
};
static NOT_ONE_OF: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::OneOf,
    operator: "=",
    negate: true,
    positive: Predicate::OneOf,
    date_bound: DateBound::Range,
};
static GLOB: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::Glob,
    operator: "LIKE",
    negate: false,
    positive: Predicate::Glob,
    date_bound: DateBound::Range,
};
static NOT_GLOB: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::Glob,
    operator: "LIKE",
    negate: true,
    positive: Predicate::Glob,
    date_bound: DateBound::Range,
};
static GT: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::Compare,
    operator: ">",
    negate: false,
    positive: Predicate::Gt,
    date_bound: DateBound::Last,
};
static GE: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::Compare,
    operator: ">=",
    negate: false,
    positive: Predicate::Ge,
    date_bound: DateBound::Start,
};
static LT: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::Compare,
    operator: "<",
    negate: false,
    positive: Predicate::Lt,
    date_bound: DateBound::Start,
};
static LE: PredicateDescriptor = PredicateDescriptor {
    kind: PredicateKind::Compare,
    operator: "<=",
    negate: false,
    positive: Predicate::Le,
    date_bound: DateBound::Last,
};

impl Predicate {
    pub const ALL: [Predicate; 8] = [
        Predicate::OneOf,
        Predicate::NotOneOf,
        Predicate::Glob,
        Predicate::NotGlob,
        Predicate::Gt,
        Predicate::Ge,
        Predicate::Lt,
        Predicate::Le,
    ];

    pub fn descriptor(self) -> &'static PredicateDescriptor {
        match self {
            Predicate::OneOf => &ONE_OF,
            Predicate::NotOneOf => &NOT_ONE_OF,
            Predicate::Glob => &GLOB,
            Predicate::NotGlob => &NOT_GLOB,
            Predicate::Gt => &GT,
            Predicate::Ge => &GE,
            Predicate::Lt => &LT,
            Predicate::Le => &LE,
        }
    }

    pub fn negate(self) -> bool {
        self.descriptor().negate
    }

    pub fn positive(self) -> Predicate {
        self.descriptor().positive
    }

    /// Converts one raw filter value into the arguments bound for it.
    ///
    /// Returns `None` when the value does not convert in `domain`; the value
    /// is then dropped from its field.
    pub fn convert(
        self,
        domain: ValueDomain,
        raw: &str,
        locale: &DateLocale,
    ) -> Option<Vec<Value>> {
        let desc = self.descriptor();
        match desc.kind {
            PredicateKind::Glob => match domain {
                ValueDomain::Date => None,
                _ => Some(vec![Value::Text(format!("%{}%", escape_like(raw)))]),
            },
            PredicateKind::OneOf | PredicateKind::Compare => match domain {
                ValueDomain::Text if desc.kind == PredicateKind::OneOf => {
                    Some(vec![Value::Text(escape_like(raw))])
                }
                ValueDomain::Text => Some(vec![Value::Text(raw.to_string())]),
                ValueDomain::Integer => {
                    raw.trim().parse::<i64>().ok().map(|v| vec![Value::Integer(v)])
                }
                ValueDomain::Real => raw
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|v| v.is_finite())
                    .map(|v| vec![Value::Real(v)]),
                ValueDomain::Date => {
                    let bucket = locale.parse_bucket(raw)?;
                    Some(match desc.date_bound {
                        DateBound::Range => {
                            vec![Value::Integer(bucket.start), Value::Integer(bucket.end)]
                        }
                        DateBound::Start => vec![Value::Integer(bucket.start)],
                        DateBound::Last => vec![Value::Integer(bucket.last())],
                    })
                }
            },
        }
    }

    /// SQL fragment comparing `name` against the arguments from
    /// [`Predicate::convert`].
    pub fn sub_expression(self, name: &str, domain: ValueDomain) -> String {
        let desc = self.descriptor();
        match (desc.kind, domain) {
            (PredicateKind::Glob, _) | (PredicateKind::OneOf, ValueDomain::Text) => {
                format!("{name} LIKE ? ESCAPE '\\'")
            }
            (PredicateKind::OneOf, ValueDomain::Date) => {
                format!("( {name} >= ? ) AND ( {name} < ? )")
            }
            (PredicateKind::OneOf, _) => format!("{name} = ?"),
            (PredicateKind::Compare, _) => format!("{name} {} ?", desc.operator),
        }
    }
}

/// Escapes `\`, `%` and `_` for a `LIKE ... ESCAPE '\'` pattern.
pub fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
