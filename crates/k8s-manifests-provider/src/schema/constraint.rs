//! Machine-checkable rules attached to a [`FieldSpec`](super::FieldSpec).
//!
//! Every rule is data. A single [`Constraint::check`] evaluates any of them against a decoded
//! [`Node`], which keeps the validation logic in one place instead of per resource kind.
use std::fmt::Display;

use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

use crate::{schema::FieldType, validation, value::Node};

/// A compiled regular expression which compares by its source.
#[derive(Clone, Debug)]
pub struct Pattern(Regex);

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.0.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Pattern {}

/// Well-known Kubernetes string formats.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "camelCase")]
pub enum Format {
    /// Object names, see [`validation::is_rfc_1123_subdomain`].
    #[strum(serialize = "DNS subdomain")]
    DnsSubdomain,

    /// Namespace names, see [`validation::is_rfc_1123_label`].
    #[strum(serialize = "DNS label")]
    DnsLabel,

    /// Label and annotation keys, see [`validation::is_qualified_name`].
    #[strum(serialize = "qualified name")]
    QualifiedName,

    #[strum(serialize = "label value")]
    LabelValue,
}

impl Format {
    fn check(self, value: &str) -> Result<(), validation::Errors> {
        match self {
            Self::DnsSubdomain => validation::is_rfc_1123_subdomain(value),
            Self::DnsLabel => validation::is_rfc_1123_label(value),
            Self::QualifiedName => validation::is_qualified_name(value),
            Self::LabelValue => validation::is_label_value(value),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Constraint {
    /// The string must match the regular expression.
    Pattern(Pattern),

    /// The string must have at least this many characters.
    MinLength(usize),
    MaxLength(usize),

    /// The number must be greater than or equal to the bound.
    AtLeast(i64),
    AtMost(i64),

    /// The string must be exactly one of the given values.
    OneOf(Vec<String>),

    Format(Format),

    /// The list or map must have at least this many entries.
    MinItems(usize),
    MaxItems(usize),

    /// Applied to every key of a map.
    Keys(Vec<Constraint>),

    /// Applied to every value of a map.
    Values(Vec<Constraint>),

    /// Applied to every element of a list of scalars.
    Items(Vec<Constraint>),
}

impl Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pattern(pattern) => write!(f, "pattern {:?}", pattern.as_str()),
            Self::MinLength(min) => write!(f, "length at least {min}"),
            Self::MaxLength(max) => write!(f, "length at most {max}"),
            Self::AtLeast(min) => write!(f, "value at least {min}"),
            Self::AtMost(max) => write!(f, "value at most {max}"),
            Self::OneOf(allowed) => write!(f, "one of {allowed:?}"),
            Self::Format(format) => write!(f, "valid {format}"),
            Self::MinItems(min) => write!(f, "at least {min} entries"),
            Self::MaxItems(max) => write!(f, "at most {max} entries"),
            Self::Keys(constraints) => write!(f, "keys must be {}", join(constraints)),
            Self::Values(constraints) => write!(f, "values must be {}", join(constraints)),
            Self::Items(constraints) => write!(f, "items must be {}", join(constraints)),
        }
    }
}

fn join(constraints: &[Constraint]) -> String {
    constraints
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Describes how a value violated a [`Constraint`].
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum ConstraintViolation {
    #[snafu(display("value {value:?} does not match regex {pattern:?}"))]
    PatternMismatch { value: String, pattern: String },

    #[snafu(display("value is {length} characters long but must be at least {min}"))]
    TooShort { length: usize, min: usize },

    #[snafu(display("value is {length} characters long but must be no more than {max}"))]
    TooLong { length: usize, max: usize },

    #[snafu(display("value {value} is less than the minimum of {min}"))]
    BelowMinimum { value: String, min: i64 },

    #[snafu(display("value {value} is greater than the maximum of {max}"))]
    AboveMaximum { value: String, max: i64 },

    #[snafu(display("value {value:?} must be one of {allowed:?}"))]
    NotOneOf { value: String, allowed: Vec<String> },

    #[snafu(display("value {value:?} is not a valid {format}: {source}"))]
    InvalidFormat {
        value: String,
        format: Format,
        source: validation::Errors,
    },

    #[snafu(display("{count} entries given but at least {min} are required"))]
    TooFewItems { count: usize, min: usize },

    #[snafu(display("{count} entries given but no more than {max} are allowed"))]
    TooManyItems { count: usize, max: usize },

    #[snafu(display("entry {entry:?}: {source}"))]
    Entry {
        entry: String,
        source: Box<ConstraintViolation>,
    },
}

impl Constraint {
    /// Whether the constraint makes sense for a field of the given type.
    pub fn applies_to(&self, field_type: &FieldType) -> bool {
        match self {
            Self::Pattern(_)
            | Self::MinLength(_)
            | Self::MaxLength(_)
            | Self::OneOf(_)
            | Self::Format(_) => *field_type == FieldType::String,
            Self::AtLeast(_) | Self::AtMost(_) => {
                matches!(field_type, FieldType::Int64 | FieldType::Float64)
            }
            Self::MinItems(_) | Self::MaxItems(_) => {
                matches!(field_type, FieldType::List(_) | FieldType::Map)
            }
            Self::Keys(constraints) | Self::Values(constraints) => {
                *field_type == FieldType::Map
                    && constraints.iter().all(|c| c.applies_to(&FieldType::String))
            }
            Self::Items(constraints) => match field_type {
                FieldType::List(element) => constraints.iter().all(|c| c.applies_to(element)),
                _ => false,
            },
        }
    }

    /// Returns every violation of `self` by `node`.
    ///
    /// Nodes of a type the constraint does not apply to never violate it, schemas reject such
    /// combinations when they are built.
    pub fn check(&self, node: &Node) -> Vec<ConstraintViolation> {
        match (self, node) {
            (Self::Keys(constraints), Node::Map(map)) => map
                .keys()
                .flat_map(|key| entry_violations(key, constraints, &Node::String(key.clone())))
                .collect(),
            (Self::Values(constraints), Node::Map(map)) => map
                .iter()
                .flat_map(|(key, value)| {
                    entry_violations(key, constraints, &Node::String(value.clone()))
                })
                .collect(),
            (Self::Items(constraints), Node::List(items)) => items
                .iter()
                .enumerate()
                .flat_map(|(index, item)| entry_violations(&index.to_string(), constraints, item))
                .collect(),
            _ => self.check_single(node).err().into_iter().collect(),
        }
    }

    fn check_single(&self, node: &Node) -> Result<(), ConstraintViolation> {
        match (self, node) {
            (Self::Pattern(pattern), Node::String(value)) => {
                if pattern.is_match(value) {
                    Ok(())
                } else {
                    PatternMismatchSnafu {
                        value,
                        pattern: pattern.as_str(),
                    }
                    .fail()
                }
            }
            (Self::MinLength(min), Node::String(value)) => {
                let length = value.chars().count();
                if length < *min {
                    TooShortSnafu { length, min: *min }.fail()
                } else {
                    Ok(())
                }
            }
            (Self::MaxLength(max), Node::String(value)) => {
                let length = value.chars().count();
                if length > *max {
                    TooLongSnafu { length, max: *max }.fail()
                } else {
                    Ok(())
                }
            }
            (Self::AtLeast(min), Node::Int64(value)) if value < min => BelowMinimumSnafu {
                value: value.to_string(),
                min: *min,
            }
            .fail(),
            (Self::AtLeast(min), Node::Float64(value)) if *value < *min as f64 => {
                BelowMinimumSnafu {
                    value: value.to_string(),
                    min: *min,
                }
                .fail()
            }
            (Self::AtMost(max), Node::Int64(value)) if value > max => AboveMaximumSnafu {
                value: value.to_string(),
                max: *max,
            }
            .fail(),
            (Self::AtMost(max), Node::Float64(value)) if *value > *max as f64 => {
                AboveMaximumSnafu {
                    value: value.to_string(),
                    max: *max,
                }
                .fail()
            }
            (Self::OneOf(allowed), Node::String(value)) => {
                if allowed.contains(value) {
                    Ok(())
                } else {
                    NotOneOfSnafu {
                        value,
                        allowed: allowed.clone(),
                    }
                    .fail()
                }
            }
            (Self::Format(format), Node::String(value)) => {
                format.check(value).map_err(|source| ConstraintViolation::InvalidFormat {
                    value: value.clone(),
                    format: *format,
                    source,
                })
            }
            (Self::MinItems(min), Node::List(_) | Node::Map(_)) => {
                let count = node.len();
                if count < *min {
                    TooFewItemsSnafu { count, min: *min }.fail()
                } else {
                    Ok(())
                }
            }
            (Self::MaxItems(max), Node::List(_) | Node::Map(_)) => {
                let count = node.len();
                if count > *max {
                    TooManyItemsSnafu { count, max: *max }.fail()
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

fn entry_violations(
    entry: &str,
    constraints: &[Constraint],
    node: &Node,
) -> Vec<ConstraintViolation> {
    constraints
        .iter()
        .flat_map(|constraint| constraint.check(node))
        .map(|violation| ConstraintViolation::Entry {
            entry: entry.to_owned(),
            source: Box::new(violation),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rstest::rstest;

    use super::*;

    fn string(value: &str) -> Node {
        Node::String(value.to_owned())
    }

    fn workspace_id() -> Constraint {
        Constraint::Pattern(Pattern::new("^ws-[a-zA-Z0-9]+$").expect("pattern is valid"))
    }

    #[rstest]
    #[case(workspace_id(), string("ws-ABC123"))]
    #[case(Constraint::MinLength(1), string("a"))]
    #[case(Constraint::MaxLength(3), string("äöü"))]
    #[case(Constraint::AtLeast(0), Node::Int64(0))]
    #[case(Constraint::AtMost(65535), Node::Int64(53))]
    #[case(Constraint::AtLeast(1), Node::Float64(1.5))]
    #[case(Constraint::OneOf(vec!["Normal".to_owned(), "Debug".to_owned()]), string("Debug"))]
    #[case(Constraint::Format(Format::DnsLabel), string("team-a"))]
    #[case(Constraint::MinItems(1), Node::List(vec![string("a")]))]
    fn accepted(#[case] constraint: Constraint, #[case] node: Node) {
        assert_eq!(constraint.check(&node), vec![]);
    }

    #[rstest]
    #[case(workspace_id(), string("workspace-1"))]
    #[case(Constraint::MinLength(1), string(""))]
    #[case(Constraint::MaxLength(2), string("abc"))]
    #[case(Constraint::AtLeast(0), Node::Int64(-1))]
    #[case(Constraint::AtMost(65535), Node::Int64(65536))]
    #[case(Constraint::AtMost(1), Node::Float64(1.5))]
    #[case(Constraint::OneOf(vec!["Normal".to_owned()]), string("normal"))]
    #[case(Constraint::Format(Format::DnsSubdomain), string("Not_A_Name"))]
    #[case(Constraint::MaxItems(1), Node::List(vec![string("a"), string("b")]))]
    fn rejected(#[case] constraint: Constraint, #[case] node: Node) {
        assert_eq!(constraint.check(&node).len(), 1);
    }

    #[test]
    fn pattern_violation_cites_regex() {
        let violations = workspace_id().check(&string("workspace-1"));

        assert_eq!(
            violations,
            vec![ConstraintViolation::PatternMismatch {
                value: "workspace-1".to_owned(),
                pattern: "^ws-[a-zA-Z0-9]+$".to_owned(),
            }]
        );
        assert_eq!(
            violations[0].to_string(),
            r#"value "workspace-1" does not match regex "^ws-[a-zA-Z0-9]+$""#
        );
    }

    #[test]
    fn map_entries_are_checked_individually() {
        let labels = Node::Map(BTreeMap::from([
            ("app".to_owned(), "web".to_owned()),
            ("bad key".to_owned(), "ok".to_owned()),
            ("tier".to_owned(), "-bad-value".to_owned()),
        ]));

        let key_violations =
            Constraint::Keys(vec![Constraint::Format(Format::QualifiedName)]).check(&labels);
        assert_eq!(key_violations.len(), 1);
        assert!(matches!(
            &key_violations[0],
            ConstraintViolation::Entry { entry, .. } if entry == "bad key"
        ));

        let value_violations =
            Constraint::Values(vec![Constraint::Format(Format::LabelValue)]).check(&labels);
        assert_eq!(value_violations.len(), 1);
        assert!(matches!(
            &value_violations[0],
            ConstraintViolation::Entry { entry, .. } if entry == "tier"
        ));
    }

    #[test]
    fn list_items_are_checked_individually() {
        let constraint = Constraint::Items(vec![Constraint::MinLength(2)]);
        let violations = constraint.check(&Node::List(vec![string("ok"), string("x"), string("")]));

        assert_eq!(violations.len(), 2);
    }

    #[rstest]
    #[case(Constraint::MinLength(1), FieldType::String, true)]
    #[case(Constraint::MinLength(1), FieldType::Int64, false)]
    #[case(Constraint::AtLeast(0), FieldType::Float64, true)]
    #[case(Constraint::MinItems(1), FieldType::Map, true)]
    #[case(Constraint::Keys(vec![Constraint::MinLength(1)]), FieldType::Map, true)]
    #[case(
        Constraint::Items(vec![Constraint::AtLeast(1)]),
        FieldType::List(Box::new(FieldType::Int64)),
        true
    )]
    #[case(
        Constraint::Items(vec![Constraint::AtLeast(1)]),
        FieldType::List(Box::new(FieldType::String)),
        false
    )]
    fn applicability(
        #[case] constraint: Constraint,
        #[case] field_type: FieldType,
        #[case] applies: bool,
    ) {
        assert_eq!(constraint.applies_to(&field_type), applies);
    }
}
