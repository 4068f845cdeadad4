//! XML name validation and synthesized type names
//!
//! Every type and field name ends up as an XML NCName on the wire, and
//! names the resolver invents (array wrappers, anonymous inner types,
//! operation wrappers) follow fixed patterns.

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static NCNAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}][A-Z_a-z\u{C0}-\u{D6}\u{D8}-\u{F6}\u{F8}-\u{2FF}\u{370}-\u{37D}\u{37F}-\u{1FFF}\-\.0-9\u{B7}]*$",
    )
    .unwrap()
});

/// Check if a string is a valid NCName (non-colonized name)
pub fn is_valid_ncname(name: &str) -> bool {
    NCNAME.is_match(name)
}

/// Check if a string is a valid QName (qualified name)
pub fn is_valid_qname(name: &str) -> bool {
    match name.split_once(':') {
        Some((prefix, local)) => is_valid_ncname(prefix) && is_valid_ncname(local),
        None => is_valid_ncname(name),
    }
}

/// Validate an NCName and return an error if invalid
pub fn validate_ncname(name: &str) -> Result<()> {
    if is_valid_ncname(name) {
        Ok(())
    } else {
        Err(Error::Name(format!("Invalid NCName: '{}'", name)))
    }
}

/// Split a QName into prefix and local name
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some((prefix, local)) = qname.split_once(':') {
        (Some(prefix), local)
    } else {
        (None, qname)
    }
}

/// Name of an anonymous type declared inline for `field` of `owner`
pub fn anonymous_type_name(owner: &str, field: &str, suffix: &str) -> String {
    format!("{}_{}{}", owner, field, suffix)
}

/// Name of the wrapper type of an array of `member`
pub fn array_type_name(member: &str, suffix: &str) -> String {
    format!("{}{}", member, suffix)
}

/// `name` with a numeric suffix, used when a synthesized name collides
pub fn numbered(name: &str, n: usize) -> String {
    format!("{}{}", name, n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ncname() {
        assert!(is_valid_ncname("element"));
        assert!(is_valid_ncname("my-element"));
        assert!(is_valid_ncname("_element.v2"));
        assert!(is_valid_ncname("Person_addressType"));

        assert!(!is_valid_ncname(""));
        assert!(!is_valid_ncname("prefix:element"));
        assert!(!is_valid_ncname("123element"));
        assert!(!is_valid_ncname("-element"));
        assert!(!is_valid_ncname("has space"));
    }

    #[test]
    fn test_is_valid_qname() {
        assert!(is_valid_qname("element"));
        assert!(is_valid_qname("xs:schema"));

        assert!(!is_valid_qname(""));
        assert!(!is_valid_qname(":element"));
        assert!(!is_valid_qname("element:"));
    }

    #[test]
    fn test_split_qname() {
        assert_eq!(split_qname("element"), (None, "element"));
        assert_eq!(split_qname("xs:element"), (Some("xs"), "element"));
    }

    #[test]
    fn test_synthesized_names() {
        assert_eq!(anonymous_type_name("Person", "address", "Type"), "Person_addressType");
        assert_eq!(array_type_name("integer", "Array"), "integerArray");
        assert_eq!(numbered("integerArray", 1), "integerArray1");
        assert!(validate_ncname("integerArray").is_ok());
        assert!(validate_ncname("a b").is_err());
    }
}
