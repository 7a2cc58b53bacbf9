#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![doc(test(attr(deny(warnings))))]

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::take;
use std::str::FromStr;

/// Characters percent-encoded when a variable value is expanded into a path segment.
///
/// Everything outside unreserved characters (alphanumeric, `-`, `_`, `.`, `~`) plus
/// a few segment-safe symbols is encoded, so that an expanded value never spills
/// over a segment boundary and always survives a match/decode round trip.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// A parsed URI path template like `/items/{id}` or `/{collection}/{id:[0-9]+}`.
///
/// Literal characters must match the request path exactly, `{var}` matches one
/// non-empty run of characters without `/`, and `{var:pattern}` matches per the
/// given anchored regular expression. Values captured by [`match_path`](Self::match_path)
/// are returned percent-decoded; values substituted by [`expand`](Self::expand)
/// are percent-encoded, so expansion followed by matching yields the original values.
///
/// ```
/// use oxuritemplate::UriTemplate;
///
/// let template = UriTemplate::new("/report/{year:[0-9]{4}}/{name}")?;
/// let m = template.match_path("/report/2007/q3%20final").unwrap();
/// assert_eq!(m.get("year"), Some("2007"));
/// assert_eq!(m.get("name"), Some("q3 final"));
/// assert!(template.match_path("/report/nope/q3").is_none());
/// # Ok::<_, oxuritemplate::UriTemplateParseError>(())
/// ```
#[derive(Debug, Clone)]
pub struct UriTemplate {
    source: String,
    parts: Vec<Part>,
    regex: Regex,
    variables: Vec<String>,
    precedence: Precedence,
}

impl UriTemplate {
    /// Parses a URI path template.
    ///
    /// Variable names must be of the form `[A-Za-z_][A-Za-z0-9_]*` and unique
    /// within the template. Custom variable patterns are compiled eagerly so
    /// invalid regular expressions are reported here and not at match time.
    pub fn new(template: impl Into<String>) -> Result<Self, UriTemplateParseError> {
        let source = template.into();
        let parts = parse_parts(&source)?;

        let mut regex_source = String::with_capacity(source.len() + 16);
        regex_source.push('^');
        let mut variables = Vec::new();
        for part in &parts {
            match part {
                Part::Literal(text) => regex_source.push_str(&regex::escape(text)),
                Part::Variable { name, pattern } => {
                    if variables.contains(name) {
                        return Err(UriTemplateParseError::DuplicateVariableName {
                            name: name.clone(),
                        });
                    }
                    regex_source.push_str("(?P<v");
                    regex_source.push_str(&variables.len().to_string());
                    regex_source.push('>');
                    regex_source.push_str(pattern.as_ref().map_or("[^/]+", |p| p.source.as_str()));
                    regex_source.push(')');
                    variables.push(name.clone());
                }
            }
        }
        regex_source.push('$');
        let regex = Regex::new(&regex_source)
            .map_err(|error| UriTemplateParseError::InvalidTemplate { error })?;

        let precedence = Precedence {
            literal_chars: parts
                .iter()
                .map(|p| match p {
                    Part::Literal(text) => text.chars().count(),
                    Part::Variable { .. } => 0,
                })
                .sum(),
            variables: variables.len(),
            regex_variables: parts
                .iter()
                .filter(|p| matches!(p, Part::Variable { pattern: Some(_), .. }))
                .count(),
        };

        Ok(Self {
            source,
            parts,
            regex,
            variables,
            precedence,
        })
    }

    /// The template text this value was parsed from.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The variable names in declaration order.
    #[inline]
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(String::as_str)
    }

    /// The number of variables declared by the template.
    #[inline]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// The structural specificity score used to order templates during routing.
    #[inline]
    pub fn precedence(&self) -> Precedence {
        self.precedence
    }

    /// Returns whether the given path matches this template.
    #[inline]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    /// Matches a path against the template and returns the captured variable values.
    ///
    /// Captured values are percent-decoded. A capture that does not decode to
    /// valid UTF-8 makes the whole match fail.
    pub fn match_path(&self, path: &str) -> Option<PathMatch> {
        let captures = self.regex.captures(path)?;
        let mut values = Vec::with_capacity(self.variables.len());
        for (i, name) in self.variables.iter().enumerate() {
            let raw = captures.name(&format!("v{i}"))?.as_str();
            let value = percent_decode_str(raw).decode_utf8().ok()?;
            values.push((name.clone(), value.into_owned()));
        }
        Some(PathMatch { values })
    }

    /// Expands the template by substituting a value for every variable, the
    /// inverse of [`match_path`](Self::match_path).
    ///
    /// `lookup` is called once per variable in declaration order. Values are
    /// percent-encoded into the result. A value must be non-empty and, for
    /// `{var:pattern}` variables, must match the variable's pattern, otherwise
    /// the expanded path would not match the template again.
    ///
    /// ```
    /// use oxuritemplate::UriTemplate;
    ///
    /// let template = UriTemplate::new("/items/{id}")?;
    /// let path = template.expand(|name| (name == "id").then(|| "a b".to_owned()))?;
    /// assert_eq!(path, "/items/a%20b");
    /// # Ok::<_, Box<dyn std::error::Error>>(())
    /// ```
    pub fn expand<F: Fn(&str) -> Option<String>>(
        &self,
        lookup: F,
    ) -> Result<String, UriTemplateExpansionError> {
        let mut out = String::with_capacity(self.source.len());
        for part in &self.parts {
            match part {
                Part::Literal(text) => out.push_str(text),
                Part::Variable { name, pattern } => {
                    let value = lookup(name).ok_or_else(|| {
                        UriTemplateExpansionError::MissingVariable { name: name.clone() }
                    })?;
                    let pattern_ok = match pattern {
                        Some(p) => p.regex.is_match(&value),
                        None => !value.is_empty(),
                    };
                    if !pattern_ok {
                        return Err(UriTemplateExpansionError::ValueMismatch {
                            name: name.clone(),
                            value,
                        });
                    }
                    out.extend(utf8_percent_encode(&value, PATH_SEGMENT));
                }
            }
        }
        Ok(out)
    }

    /// Total order over template structure, used as the final routing tie-break
    /// between templates with equal [`Precedence`].
    ///
    /// Parts are compared pairwise: a literal sorts before a regex variable,
    /// which sorts before a plain variable; equal-kind literals compare by text
    /// and regex variables by pattern text; a shorter template sorts before a
    /// longer one. Variable names do not participate, so two templates that only
    /// differ in names compare [`Ordering::Equal`].
    pub fn cmp_structure(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(&other.parts) {
            let ordering = a.cmp_structure(b);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        self.parts.len().cmp(&other.parts.len())
    }
}

impl fmt::Display for UriTemplate {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for UriTemplate {
    type Err = UriTemplateParseError;

    fn from_str(template: &str) -> Result<Self, Self::Err> {
        Self::new(template)
    }
}

impl PartialEq for UriTemplate {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for UriTemplate {}

impl Hash for UriTemplate {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source.hash(state);
    }
}

/// Structural specificity of a [`UriTemplate`].
///
/// A greater precedence means a more specific template that a router must try
/// first: more literal characters win, then fewer variables, then more
/// pattern-narrowed variables.
///
/// ```
/// use oxuritemplate::UriTemplate;
///
/// let specific = UriTemplate::new("/foo/{id}")?;
/// let generic = UriTemplate::new("/{a}/{b}")?;
/// assert!(specific.precedence() > generic.precedence());
/// # Ok::<_, oxuritemplate::UriTemplateParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Precedence {
    literal_chars: usize,
    variables: usize,
    regex_variables: usize,
}

impl Precedence {
    /// The number of literal (non-variable) characters in the template.
    #[inline]
    pub fn literal_chars(self) -> usize {
        self.literal_chars
    }

    /// The number of variables in the template.
    #[inline]
    pub fn variables(self) -> usize {
        self.variables
    }

    /// The number of variables with a custom pattern in the template.
    #[inline]
    pub fn regex_variables(self) -> usize {
        self.regex_variables
    }
}

impl Ord for Precedence {
    fn cmp(&self, other: &Self) -> Ordering {
        self.literal_chars
            .cmp(&other.literal_chars)
            .then_with(|| other.variables.cmp(&self.variables))
            .then_with(|| self.regex_variables.cmp(&other.regex_variables))
    }
}

impl PartialOrd for Precedence {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The variable values captured by a successful [`UriTemplate::match_path`].
///
/// Values are kept in template declaration order and are already percent-decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PathMatch {
    values: Vec<(String, String)>,
}

impl PathMatch {
    /// The captured value of the given variable, if the template declares it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All `(variable, value)` pairs in template declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The number of captured variables.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Part {
    Literal(String),
    Variable {
        name: String,
        pattern: Option<VariablePattern>,
    },
}

impl Part {
    fn cmp_structure(&self, other: &Self) -> Ordering {
        fn rank(part: &Part) -> u8 {
            match part {
                Part::Literal(_) => 0,
                Part::Variable {
                    pattern: Some(_), ..
                } => 1,
                Part::Variable { pattern: None, .. } => 2,
            }
        }
        rank(self).cmp(&rank(other)).then_with(|| match (self, other) {
            (Part::Literal(a), Part::Literal(b)) => a.cmp(b),
            (
                Part::Variable {
                    pattern: Some(a), ..
                },
                Part::Variable {
                    pattern: Some(b), ..
                },
            ) => a.source.cmp(&b.source),
            _ => Ordering::Equal,
        })
    }
}

#[derive(Debug, Clone)]
struct VariablePattern {
    source: String,
    regex: Regex,
}

impl VariablePattern {
    fn new(name: &str, source: String) -> Result<Self, UriTemplateParseError> {
        // Anchored copy used to check expansion values against the pattern.
        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|error| {
            UriTemplateParseError::InvalidVariablePattern {
                name: name.to_owned(),
                error,
            }
        })?;
        Ok(Self { source, regex })
    }
}

fn parse_parts(template: &str) -> Result<Vec<Part>, UriTemplateParseError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        match c {
            '{' => {
                if !literal.is_empty() {
                    parts.push(Part::Literal(take(&mut literal)));
                }
                let mut inner = String::new();
                let mut depth = 1usize;
                for c in chars.by_ref() {
                    match c {
                        '{' => {
                            depth += 1;
                            inner.push(c);
                        }
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                            inner.push(c);
                        }
                        _ => inner.push(c),
                    }
                }
                if depth != 0 {
                    return Err(UriTemplateParseError::UnclosedVariable {
                        template: template.to_owned(),
                    });
                }
                let (name, pattern) = match inner.find(':') {
                    Some(i) => (inner[..i].trim(), Some(inner[i + 1..].trim())),
                    None => (inner.trim(), None),
                };
                validate_variable_name(name, template)?;
                parts.push(Part::Variable {
                    name: name.to_owned(),
                    pattern: pattern
                        .map(|p| VariablePattern::new(name, p.to_owned()))
                        .transpose()?,
                });
            }
            '}' => {
                return Err(UriTemplateParseError::UnexpectedCloseBrace {
                    template: template.to_owned(),
                })
            }
            _ => literal.push(c),
        }
    }
    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }
    Ok(parts)
}

fn validate_variable_name(name: &str, template: &str) -> Result<(), UriTemplateParseError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => {
            return Err(UriTemplateParseError::EmptyVariableName {
                template: template.to_owned(),
            })
        }
    };
    if valid {
        Ok(())
    } else {
        Err(UriTemplateParseError::InvalidVariableName {
            name: name.to_owned(),
        })
    }
}

/// An error raised while parsing a [`UriTemplate`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UriTemplateParseError {
    /// A `{` is never closed by a matching `}`.
    #[error("unclosed variable in URI template '{template}'")]
    UnclosedVariable { template: String },
    /// A `}` appears outside of any variable.
    #[error("unexpected '}}' in URI template '{template}'")]
    UnexpectedCloseBrace { template: String },
    /// A variable is declared as `{}` or `{:pattern}`.
    #[error("empty variable name in URI template '{template}'")]
    EmptyVariableName { template: String },
    /// A variable name does not match `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid URI template variable name '{name}'")]
    InvalidVariableName { name: String },
    /// The same variable name is declared twice.
    #[error("duplicate URI template variable name '{name}'")]
    DuplicateVariableName { name: String },
    /// A `{var:pattern}` pattern is not a valid regular expression.
    #[error("invalid pattern for URI template variable '{name}': {error}")]
    InvalidVariablePattern {
        name: String,
        #[source]
        error: regex::Error,
    },
    /// The template as a whole does not compile, e.g. a variable pattern
    /// declares a capture group name that collides with another one.
    #[error("invalid URI template: {error}")]
    InvalidTemplate {
        #[source]
        error: regex::Error,
    },
}

/// An error raised while expanding a [`UriTemplate`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum UriTemplateExpansionError {
    /// No value was supplied for a template variable.
    #[error("no value for URI template variable '{name}'")]
    MissingVariable { name: String },
    /// The supplied value is empty or does not match the variable's pattern.
    #[error("value '{value}' does not match the pattern of URI template variable '{name}'")]
    ValueMismatch { name: String, value: String },
}
