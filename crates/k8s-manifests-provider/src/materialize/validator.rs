use std::fmt::{Display, Write};

use snafu::Snafu;

use crate::schema::constraint::ConstraintViolation;

/// Contains context used for generating diagnostics.
///
/// Every nested field or list element gets its own `Validator`, pointing back at its parent,
/// so the full path is only assembled once something actually goes wrong.
pub struct Validator<'a> {
    segment: Option<Segment<'a>>,
    parent: Option<&'a Validator<'a>>,
}

#[derive(Clone, Copy)]
enum Segment<'a> {
    Field(&'a str),
    Index(usize),
}

impl Validator<'_> {
    pub fn root() -> Validator<'static> {
        Validator {
            segment: None,
            parent: None,
        }
    }

    /// Creates a `Validator` for a subfield of the current object.
    pub fn field<'b>(&'b self, name: &'b str) -> Validator<'b> {
        Validator {
            segment: Some(Segment::Field(name)),
            parent: Some(self),
        }
    }

    /// Creates a `Validator` for an element of the current list.
    pub fn index(&self, index: usize) -> Validator<'_> {
        Validator {
            segment: Some(Segment::Index(index)),
            parent: Some(self),
        }
    }

    pub fn path(&self) -> FieldPath {
        let mut segments = Vec::new();
        let mut curr = Some(self);
        while let Some(curr_some) = curr {
            if let Some(segment) = curr_some.segment {
                segments.push(match segment {
                    Segment::Field(name) => PathSegment::Field(name.to_owned()),
                    Segment::Index(index) => PathSegment::Index(index),
                });
            }
            curr = curr_some.parent;
        }
        segments.reverse();
        FieldPath { segments }
    }

    pub fn missing_required(&self) -> Diagnostic {
        Diagnostic::MissingRequiredField { path: self.path() }
    }

    pub fn invalid_value(&self, violation: ConstraintViolation) -> Diagnostic {
        Diagnostic::InvalidFieldValue {
            path: self.path(),
            violation,
        }
    }

    pub fn computed_supplied(&self) -> Diagnostic {
        Diagnostic::ComputedFieldSupplied { path: self.path() }
    }

    pub fn unexpected_type(&self, expected: impl Display, found: &'static str) -> Diagnostic {
        Diagnostic::UnexpectedType {
            path: self.path(),
            expected: expected.to_string(),
            found,
        }
    }

    pub fn unsupported(&self) -> Diagnostic {
        Diagnostic::UnsupportedField { path: self.path() }
    }

    pub fn out_of_range(&self, value: impl Display, expected: impl Display) -> Diagnostic {
        Diagnostic::ValueOutOfRange {
            path: self.path(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum PathSegment {
    Field(String),
    Index(usize),
}

/// The location of a field within a configuration, rendered as `spec.variables[0].name`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Returns a new path with `name` appended.
    pub fn join(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name.to_owned()));
        Self { segments }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl<'a> FromIterator<&'a str> for FieldPath {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        Self {
            segments: iter
                .into_iter()
                .map(|name| PathSegment::Field(name.to_owned()))
                .collect(),
        }
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }

        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Field(name) => {
                    if i > 0 {
                        f.write_char('.')?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

/// A problem discovered while decoding a configuration against its schema.
#[derive(Debug, PartialEq, Eq, Snafu)]
pub enum Diagnostic {
    #[snafu(display("missing required field {path}"))]
    MissingRequiredField { path: FieldPath },

    #[snafu(display("invalid value for field {path}: {violation}"))]
    InvalidFieldValue {
        path: FieldPath,
        #[snafu(source)]
        violation: ConstraintViolation,
    },

    #[snafu(display("field {path} is computed by the provider and cannot be set"))]
    ComputedFieldSupplied { path: FieldPath },

    #[snafu(display("field {path} must be of type {expected}, got {found}"))]
    UnexpectedType {
        path: FieldPath,
        expected: String,
        found: &'static str,
    },

    #[snafu(display("field {path} is not supported by this data source"))]
    UnsupportedField { path: FieldPath },

    #[snafu(display("value {value} of field {path} is out of range for {expected}"))]
    ValueOutOfRange {
        path: FieldPath,
        value: String,
        expected: String,
    },
}

impl Diagnostic {
    pub fn path(&self) -> &FieldPath {
        match self {
            Self::MissingRequiredField { path }
            | Self::InvalidFieldValue { path, .. }
            | Self::ComputedFieldSupplied { path }
            | Self::UnexpectedType { path, .. }
            | Self::UnsupportedField { path }
            | Self::ValueOutOfRange { path, .. } => path,
        }
    }
}

/// All diagnostics discovered while decoding a single configuration.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns [`Ok`] with `value` if nothing was reported, otherwise returns all diagnostics.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl IntoIterator for Diagnostics {
    type IntoIter = std::vec::IntoIter<Diagnostic>;
    type Item = Diagnostic;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, diagnostic) in self.0.iter().enumerate() {
            let prefix = match i {
                0 => "",
                _ => ", ",
            };
            write!(f, "{prefix}{diagnostic}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_paths() {
        let root = Validator::root();
        let spec = root.field("spec");
        let variables = spec.field("variables");
        let first = variables.index(0);
        let name = first.field("name");

        assert_eq!(name.path().to_string(), "spec.variables[0].name");
        assert_eq!(root.path().to_string(), "<root>");
    }

    #[test]
    fn paths_from_names() {
        let path = ["metadata", "name"].into_iter().collect::<FieldPath>();

        assert_eq!(path.to_string(), "metadata.name");
        assert_eq!(
            FieldPath::default().join("spec").join("module"),
            ["spec", "module"].into_iter().collect()
        );
    }

    #[test]
    fn diagnostics_are_listed_together() {
        let root = Validator::root();
        let metadata = root.field("metadata");

        let mut diagnostics = Diagnostics::default();
        diagnostics.push(metadata.field("name").missing_required());
        diagnostics.push(root.field("id").computed_supplied());

        assert_eq!(
            diagnostics.to_string(),
            "missing required field metadata.name, \
             field id is computed by the provider and cannot be set"
        );
        assert!(diagnostics.into_result(()).is_err());
    }
}
