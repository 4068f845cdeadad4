//! Occurrence bounds, facets and per-type attributes
//!
//! Attributes hang off a descriptor rather than a field: customizing a
//! type for one use (say, making it repeatable) produces a variant
//! descriptor with different attributes.

use crate::error::{Error, ParseError, Result};
use crate::model::primitive::Primitive;
use crate::model::value::Value;
use regex::Regex;
use rust_decimal::Decimal;
use std::fmt;

/// Occurrence bounds (minOccurs, maxOccurs); `max == None` is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Occurs {
    /// Minimum number of occurrences
    pub min: u32,
    /// Maximum number of occurrences (None = unbounded)
    pub max: Option<u32>,
}

impl Occurs {
    /// Create new occurrence bounds
    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Exactly once (1, 1), the XSD default
    pub fn once() -> Self {
        Self { min: 1, max: Some(1) }
    }

    /// Optional occurrence (0, 1)
    pub fn optional() -> Self {
        Self { min: 0, max: Some(1) }
    }

    /// Zero or more (0, unbounded)
    pub fn zero_or_more() -> Self {
        Self { min: 0, max: None }
    }

    /// Check if particle can have multiple occurrences
    pub fn is_multiple(&self) -> bool {
        self.max != Some(1) && self.max != Some(0)
    }

    /// Check if occurrence count is under the minimum
    pub fn is_missing(&self, count: u32) -> bool {
        count < self.min
    }

    /// Check if occurrence count exceeds the maximum
    pub fn is_exceeded(&self, count: u32) -> bool {
        match self.max {
            Some(max) => count > max,
            None => false,
        }
    }

    /// Lexical minOccurs
    pub fn min_lexical(&self) -> String {
        self.min.to_string()
    }

    /// Lexical maxOccurs; unbounded is the literal `unbounded`
    pub fn max_lexical(&self) -> String {
        match self.max {
            Some(max) => max.to_string(),
            None => "unbounded".to_string(),
        }
    }
}

impl Default for Occurs {
    fn default() -> Self {
        Self::once()
    }
}

/// Parse minOccurs/maxOccurs attribute values; absent values default to 1
pub fn parse_occurs(min_occurs: Option<&str>, max_occurs: Option<&str>) -> Result<Occurs> {
    let mut occurs = Occurs::once();

    if let Some(min_str) = min_occurs {
        occurs.min = min_str.trim().parse::<u32>().map_err(|_| {
            ParseError::new("minOccurs value is not a valid non-negative integer")
        })?;
    }

    match max_occurs.map(str::trim) {
        Some("unbounded") => occurs.max = None,
        Some(max_str) => {
            let max = max_str.parse::<u32>().map_err(|_| {
                ParseError::new("maxOccurs value must be a non-negative integer or 'unbounded'")
            })?;
            occurs.max = Some(max);
        }
        None => {}
    }

    if let Some(max) = occurs.max {
        if occurs.min > max {
            return Err(ParseError::new("minOccurs must be lesser or equal than maxOccurs").into());
        }
    }

    Ok(occurs)
}

/// Anchored regular expression facet
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

/// XSD `\i`: initial name characters
const NAME_START: &str = r"_:A-Za-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\u{200C}-\u{200D}\u{2070}-\u{218F}\u{2C00}-\u{2FEF}\u{3001}-\u{D7FF}\u{F900}-\u{FDCF}\u{FDF0}-\u{FFFD}\u{10000}-\u{EFFFF}";

/// XSD `\c` beyond [`NAME_START`]
const NAME_REST: &str = r"\-.0-9\u{B7}\u{300}-\u{36F}\u{203F}-\u{2040}";

/// Rewrite XSD regex syntax the `regex` crate reads differently.
///
/// Name escapes become explicit classes, class subtraction `[a-z-[aeiou]]`
/// becomes `[a-z--[aeiou]]`, and `^`/`$` outside classes are literals.
fn translate(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 16);
    let mut chars = source.chars().peekable();
    let mut depth = 0usize;
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('i') => out.push_str(&format!("[{}]", NAME_START)),
                Some('I') => out.push_str(&format!("[^{}]", NAME_START)),
                Some('c') => out.push_str(&format!("[{}{}]", NAME_START, NAME_REST)),
                Some('C') => out.push_str(&format!("[^{}{}]", NAME_START, NAME_REST)),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            },
            '[' => {
                depth += 1;
                out.push('[');
            }
            ']' if depth > 0 => {
                depth -= 1;
                out.push(']');
            }
            '-' if depth > 0 && chars.peek() == Some(&'[') => out.push_str("--"),
            '^' | '$' if depth == 0 => {
                out.push('\\');
                out.push(c);
            }
            '&' | '~' if depth > 0 => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

impl Pattern {
    /// Compile an XSD pattern; XSD patterns always match the whole value
    pub fn new(source: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{})$", translate(source)))
            .map_err(|e| Error::Value(format!("Invalid pattern '{}': {}", source, e)))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `text` matches
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// Value-space restrictions of a simple type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Facets {
    /// Enumerated literals
    pub values: Vec<String>,
    /// Minimum length
    pub min_len: Option<usize>,
    /// Maximum length
    pub max_len: Option<usize>,
    /// Pattern
    pub pattern: Option<Pattern>,
    /// Exclusive lower bound (minExclusive)
    pub gt: Option<Decimal>,
    /// Inclusive lower bound (minInclusive)
    pub ge: Option<Decimal>,
    /// Exclusive upper bound (maxExclusive)
    pub lt: Option<Decimal>,
    /// Inclusive upper bound (maxInclusive)
    pub le: Option<Decimal>,
}

impl Facets {
    /// Whether no facet is set
    pub fn is_empty(&self) -> bool {
        *self == Facets::default()
    }

    /// Facets that differ from `base`, the ones a restriction of `base`
    /// has to state
    pub fn beyond(&self, base: &Facets) -> Facets {
        fn changed<T: PartialEq + Clone>(own: &Option<T>, base: &Option<T>) -> Option<T> {
            if own == base {
                None
            } else {
                own.clone()
            }
        }
        Facets {
            values: if self.values == base.values {
                Vec::new()
            } else {
                self.values.clone()
            },
            min_len: changed(&self.min_len, &base.min_len),
            max_len: changed(&self.max_len, &base.max_len),
            pattern: changed(&self.pattern, &base.pattern),
            gt: changed(&self.gt, &base.gt),
            ge: changed(&self.ge, &base.ge),
            lt: changed(&self.lt, &base.lt),
            le: changed(&self.le, &base.le),
        }
    }

    /// Check a decoded value; the error is a human-readable reason
    pub fn check(&self, primitive: Primitive, value: &Value) -> std::result::Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        let lexical = primitive.format(value).map_err(|e| e.to_string())?;

        if !self.values.is_empty() && !self.values.iter().any(|v| *v == lexical) {
            return Err(format!(
                "'{}' is not one of the allowed values {:?}",
                lexical, self.values
            ));
        }

        if let Some(len) = Primitive::length(value) {
            if let Some(min) = self.min_len {
                if len < min {
                    return Err(format!("length {} is shorter than {}", len, min));
                }
            }
            if let Some(max) = self.max_len {
                if len > max {
                    return Err(format!("length {} is longer than {}", len, max));
                }
            }
        }

        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(&lexical) {
                return Err(format!(
                    "'{}' does not match pattern '{}'",
                    lexical,
                    pattern.as_str()
                ));
            }
        }

        if let Some(n) = Primitive::numeric(value) {
            if let Some(gt) = self.gt {
                if n <= gt {
                    return Err(format!("{} is not greater than {}", n, gt));
                }
            }
            if let Some(ge) = self.ge {
                if n < ge {
                    return Err(format!("{} is less than {}", n, ge));
                }
            }
            if let Some(lt) = self.lt {
                if n >= lt {
                    return Err(format!("{} is not less than {}", n, lt));
                }
            }
            if let Some(le) = self.le {
                if n > le {
                    return Err(format!("{} is greater than {}", n, le));
                }
            }
        }

        Ok(())
    }
}

/// Per-type attributes
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    /// Whether an explicit nil is allowed
    pub nillable: bool,
    /// Occurrence bounds when used as a field
    pub occurs: Occurs,
    /// Lexical default substituted for null values
    pub default: Option<String>,
    /// Value restrictions
    pub facets: Facets,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            nillable: true,
            occurs: Occurs::optional(),
            default: None,
            facets: Facets::default(),
        }
    }
}

/// Attribute changes requested by [`crate::model::TypeRegistry::derive`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    /// Explicit name for a facet-restricted subtype
    pub type_name: Option<String>,
    /// nillable
    pub nillable: Option<bool>,
    /// minOccurs
    pub min_occurs: Option<u32>,
    /// maxOccurs (inner None = unbounded)
    pub max_occurs: Option<Option<u32>>,
    /// Default value
    pub default: Option<String>,
    /// Enumerated literals
    pub values: Option<Vec<String>>,
    /// Minimum length
    pub min_len: Option<usize>,
    /// Maximum length
    pub max_len: Option<usize>,
    /// Pattern source
    pub pattern: Option<String>,
    /// Exclusive lower bound
    pub gt: Option<Decimal>,
    /// Inclusive lower bound
    pub ge: Option<Decimal>,
    /// Exclusive upper bound
    pub lt: Option<Decimal>,
    /// Inclusive upper bound
    pub le: Option<Decimal>,
}

impl Overrides {
    /// No changes
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the restricted subtype
    pub fn with_type_name(mut self, name: impl Into<String>) -> Self {
        self.type_name = Some(name.into());
        self
    }

    /// Set nillable
    pub fn with_nillable(mut self, nillable: bool) -> Self {
        self.nillable = Some(nillable);
        self
    }

    /// Set minOccurs
    pub fn with_min_occurs(mut self, min: u32) -> Self {
        self.min_occurs = Some(min);
        self
    }

    /// Set a bounded maxOccurs
    pub fn with_max_occurs(mut self, max: u32) -> Self {
        self.max_occurs = Some(Some(max));
        self
    }

    /// Set maxOccurs to unbounded
    pub fn unbounded(mut self) -> Self {
        self.max_occurs = Some(None);
        self
    }

    /// Set both bounds
    pub fn with_occurs(mut self, occurs: Occurs) -> Self {
        self.min_occurs = Some(occurs.min);
        self.max_occurs = Some(occurs.max);
        self
    }

    /// Set the lexical default
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Restrict to enumerated literals
    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Set minimum length
    pub fn with_min_len(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self
    }

    /// Set maximum length
    pub fn with_max_len(mut self, len: usize) -> Self {
        self.max_len = Some(len);
        self
    }

    /// Set an exact length
    pub fn with_length(mut self, len: usize) -> Self {
        self.min_len = Some(len);
        self.max_len = Some(len);
        self
    }

    /// Set the pattern
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Set minExclusive
    pub fn with_gt(mut self, bound: impl Into<Decimal>) -> Self {
        self.gt = Some(bound.into());
        self
    }

    /// Set minInclusive
    pub fn with_ge(mut self, bound: impl Into<Decimal>) -> Self {
        self.ge = Some(bound.into());
        self
    }

    /// Set maxExclusive
    pub fn with_lt(mut self, bound: impl Into<Decimal>) -> Self {
        self.lt = Some(bound.into());
        self
    }

    /// Set maxInclusive
    pub fn with_le(mut self, bound: impl Into<Decimal>) -> Self {
        self.le = Some(bound.into());
        self
    }

    /// Whether any value-space facet changes.
    /// Only these produce a new named restriction.
    pub fn touches_facets(&self) -> bool {
        self.type_name.is_some()
            || self.values.is_some()
            || self.min_len.is_some()
            || self.max_len.is_some()
            || self.pattern.is_some()
            || self.gt.is_some()
            || self.ge.is_some()
            || self.lt.is_some()
            || self.le.is_some()
    }

    /// Apply to a copy of `base`
    pub fn apply(&self, base: &Attributes) -> Result<Attributes> {
        let mut attrs = base.clone();
        if let Some(nillable) = self.nillable {
            attrs.nillable = nillable;
        }
        if let Some(min) = self.min_occurs {
            attrs.occurs.min = min;
        }
        if let Some(max) = self.max_occurs {
            attrs.occurs.max = max;
        }
        if let Some(max) = attrs.occurs.max {
            if attrs.occurs.min > max {
                return Err(Error::Value(format!(
                    "min_occurs {} is greater than max_occurs {}",
                    attrs.occurs.min, max
                )));
            }
        }
        if let Some(default) = &self.default {
            attrs.default = Some(default.clone());
        }
        let facets = &mut attrs.facets;
        if let Some(values) = &self.values {
            facets.values = values.clone();
        }
        if self.min_len.is_some() {
            facets.min_len = self.min_len;
        }
        if self.max_len.is_some() {
            facets.max_len = self.max_len;
        }
        if let Some(pattern) = &self.pattern {
            facets.pattern = Some(Pattern::new(pattern)?);
        }
        if self.gt.is_some() {
            facets.gt = self.gt;
        }
        if self.ge.is_some() {
            facets.ge = self.ge;
        }
        if self.lt.is_some() {
            facets.lt = self.lt;
        }
        if self.le.is_some() {
            facets.le = self.le;
        }
        Ok(attrs)
    }
}

impl fmt::Display for Occurs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max_lexical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_occurs() {
        assert_eq!(parse_occurs(None, None).unwrap(), Occurs::once());
        assert_eq!(
            parse_occurs(Some("0"), Some("unbounded")).unwrap(),
            Occurs::zero_or_more()
        );
        assert_eq!(parse_occurs(Some("2"), Some("5")).unwrap(), Occurs::new(2, Some(5)));
        assert!(parse_occurs(Some("3"), Some("2")).is_err());
        assert!(parse_occurs(Some("2"), None).is_err());
        assert!(parse_occurs(Some("-1"), None).is_err());
    }

    #[test]
    fn test_occurs_checks() {
        let occurs = Occurs::new(1, Some(2));
        assert!(occurs.is_missing(0));
        assert!(!occurs.is_exceeded(2));
        assert!(occurs.is_exceeded(3));
        assert!(occurs.is_multiple());
        assert!(!Occurs::optional().is_multiple());
        assert_eq!(Occurs::zero_or_more().max_lexical(), "unbounded");
    }

    #[test]
    fn test_pattern_is_anchored() {
        let pattern = Pattern::new("[a-z]+").unwrap();
        assert!(pattern.is_match("abc"));
        assert!(!pattern.is_match("abc1"));
        assert!(Pattern::new("(").is_err());
    }

    #[test]
    fn test_pattern_xsd_syntax() {
        let name = Pattern::new(r"\i\c*").unwrap();
        assert!(name.is_match("_item-2.x"));
        assert!(!name.is_match("2item"));

        let ncname = Pattern::new(r"[\i-[:]][\c-[:]]*").unwrap();
        assert!(ncname.is_match("item"));
        assert!(!ncname.is_match("xs:item"));

        let consonants = Pattern::new("[a-z-[aeiou]]+").unwrap();
        assert!(consonants.is_match("bcd"));
        assert!(!consonants.is_match("bad"));

        let price = Pattern::new(r"\d+\$|^\d+").unwrap();
        assert!(price.is_match("12$"));
        assert!(price.is_match("^12"));
        assert!(!price.is_match("12"));
    }

    #[test]
    fn test_facet_checks() {
        let facets = Overrides::new()
            .with_max_len(3)
            .with_pattern("[A-Z]+")
            .apply(&Attributes::default())
            .unwrap()
            .facets;
        assert!(facets.check(Primitive::String, &Value::from("AB")).is_ok());
        assert!(facets.check(Primitive::String, &Value::from("ABCD")).is_err());
        assert!(facets.check(Primitive::String, &Value::from("ab")).is_err());

        let range = Overrides::new()
            .with_ge(0i64)
            .with_lt(10i64)
            .apply(&Attributes::default())
            .unwrap()
            .facets;
        assert!(range.check(Primitive::Integer, &Value::Integer(0)).is_ok());
        assert!(range.check(Primitive::Integer, &Value::Integer(10)).is_err());
        assert!(range.check(Primitive::Integer, &Value::Integer(-1)).is_err());
        assert!(range.check(Primitive::Double, &Value::Float(9.5)).is_ok());
    }

    #[test]
    fn test_enumeration_check() {
        let facets = Facets {
            values: vec!["red".into(), "green".into()],
            ..Facets::default()
        };
        assert!(facets.check(Primitive::String, &Value::from("red")).is_ok());
        assert!(facets.check(Primitive::String, &Value::from("blue")).is_err());
    }

    #[test]
    fn test_overrides_classification() {
        assert!(!Overrides::new().with_min_occurs(1).unbounded().touches_facets());
        assert!(Overrides::new().with_max_len(5).touches_facets());
        assert!(Overrides::new()
            .with_min_occurs(3)
            .with_max_occurs(2)
            .apply(&Attributes::default())
            .is_err());
    }
}
