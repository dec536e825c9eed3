//! Terms, triples and the vocabulary the purge and identity rules look for.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write as _};

pub const VM: &str = "http://visual-meaning.com/rdf/";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const OWL: &str = "http://www.w3.org/2002/07/owl#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";

/// Prefixes understood in transform templates, also used when printing Turtle.
pub const PREFIXES: &[(&str, &str)] = &[
    ("rdf", RDF),
    ("rdfs", RDFS),
    ("owl", OWL),
    ("xsd", XSD),
    ("vm", VM),
];

const GEO_NAMESPACE: &str = "http://visual-meaning.com/rdf/geo/";
const ISSUE_NAMESPACE: &str = "http://visual-meaning.com/rdf/issue/";

const GEO_PREDICATES: &[&str] = &[
    "http://visual-meaning.com/rdf/atGeoPoint",
    "http://visual-meaning.com/rdf/latitude",
    "http://visual-meaning.com/rdf/longitude",
    "http://visual-meaning.com/rdf/geoName",
];

const NAMING_PREDICATES: &[&str] = &[
    "http://visual-meaning.com/rdf/name",
    "http://www.w3.org/2000/01/rdf-schema#label",
];

const ISSUE_PREDICATES: &[&str] = &[
    "http://visual-meaning.com/rdf/relatesTo",
    "http://visual-meaning.com/rdf/hasIssue",
    "http://visual-meaning.com/rdf/issueStatus",
];

const SAME_AS_PREDICATES: &[&str] = &[
    "http://www.w3.org/2002/07/owl#sameAs",
    "http://visual-meaning.com/rdf/sameAs",
];

/// A node or value in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Term {
    Iri {
        value: String,
    },
    Blank {
        value: String,
    },
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri {
            value: value.into(),
        }
    }

    pub fn blank(value: impl Into<String>) -> Self {
        Term::Blank {
            value: value.into(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal { .. })
    }

    fn in_namespace(&self, namespace: &str) -> bool {
        self.as_iri().is_some_and(|iri| iri.starts_with(namespace))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri { value } => write!(f, "<{value}>"),
            Term::Blank { value } => write!(f, "_:{value}"),
            Term::Literal {
                value,
                datatype,
                language,
            } => {
                write!(f, "{value:?}")?;
                if let Some(language) = language {
                    write!(f, "@{language}")
                } else if let Some(datatype) = datatype {
                    write!(f, "^^<{datatype}>")
                } else {
                    Ok(())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Triple {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

impl Triple {
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    fn predicate_in(&self, candidates: &[&str]) -> bool {
        self.predicate
            .as_iri()
            .is_some_and(|iri| candidates.contains(&iri))
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// Expand `prefix:local` forms and join relative references onto `base`.
///
/// Characters an IRI cannot carry are percent-encoded.
pub fn expand_iri(reference: &str, base: &str) -> String {
    if reference.contains("://") || reference.starts_with("urn:") {
        return escape_iri(reference);
    }
    if let Some((prefix, local)) = reference.split_once(':')
        && let Some((_, namespace)) = PREFIXES.iter().find(|(name, _)| *name == prefix)
    {
        return escape_iri(&format!("{namespace}{local}"));
    }
    escape_iri(&format!("{base}{}", reference.trim()))
}

/// Percent-encode, as UTF-8, every character outside the IRI grammar.
///
/// A `%` already followed by two hex digits is kept, as is the first `#`.
pub fn escape_iri(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut seen_fragment = false;
    for (at, ch) in text.char_indices() {
        let keep = match ch {
            '%' => starts_with_hex_pair(&text[at + 1..]),
            '#' => !std::mem::replace(&mut seen_fragment, true),
            _ => is_iri_char(ch),
        };
        if keep {
            out.push(ch);
        } else {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02X}");
            }
        }
    }
    out
}

fn starts_with_hex_pair(rest: &str) -> bool {
    matches!(rest.as_bytes(), [a, b, ..] if a.is_ascii_hexdigit() && b.is_ascii_hexdigit())
}

fn is_iri_char(ch: char) -> bool {
    if ch.is_ascii() {
        return !ch.is_ascii_control()
            && !matches!(
                ch,
                ' ' | '"' | '<' | '>' | '\\' | '^' | '`' | '{' | '|' | '}' | '[' | ']'
            );
    }
    let code = ch as u32;
    matches!(code, 0xA0..=0xD7FF | 0xF900..=0xFDCF | 0xFDF0..=0xFFEF)
        || ((0x10000..=0xEFFFD).contains(&code) && code & 0xFFFF < 0xFFFE)
}

/// Triple concerns geographic naming.
pub fn relates_geo_name(triple: &Triple) -> bool {
    triple.predicate_in(GEO_PREDICATES)
        || (triple.predicate_in(NAMING_PREDICATES) && triple.subject.in_namespace(GEO_NAMESPACE))
}

/// Triple concerns issue tracking.
pub fn relates_issue(triple: &Triple) -> bool {
    triple.predicate_in(ISSUE_PREDICATES)
        || triple.subject.in_namespace(ISSUE_NAMESPACE)
        || triple.object.in_namespace(ISSUE_NAMESPACE)
}

/// Triple asserts two nodes denote the same entity.
pub fn asserts_same_identity(triple: &Triple) -> bool {
    triple.predicate_in(SAME_AS_PREDICATES)
        && !triple.subject.is_literal()
        && !triple.object.is_literal()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm(local: &str) -> Term {
        Term::iri(format!("{VM}{local}"))
    }

    #[test]
    fn expands_known_prefixes_and_relative_references() {
        assert_eq!(expand_iri("vm:name", VM), format!("{VM}name"));
        assert_eq!(expand_iri("rdf:type", VM), format!("{RDF}type"));
        assert_eq!(
            expand_iri("https://example.org/x", VM),
            "https://example.org/x"
        );
        assert_eq!(expand_iri("site/North Gate", VM), format!("{VM}site/North%20Gate"));
        assert_eq!(expand_iri("odd:thing", "http://b/"), "http://b/odd:thing");
    }

    #[test]
    fn characters_outside_the_iri_grammar_are_encoded() {
        assert_eq!(expand_iri("A|\"1\"", VM), format!("{VM}A%7C%221%22"));
        assert_eq!(expand_iri("a\tb{c}\r", VM), format!("{VM}a%09b%7Bc%7D"));
        assert_eq!(expand_iri("vm:x<y>", VM), format!("{VM}x%3Cy%3E"));
        assert_eq!(expand_iri("site/x%20y", VM), format!("{VM}site/x%20y"));
        assert_eq!(expand_iri("100%", VM), format!("{VM}100%25"));
        assert_eq!(expand_iri("a#b#c", VM), format!("{VM}a#b%23c"));
        assert_eq!(expand_iri("rdf:a#b", VM), format!("{RDF}a%23b"));
        assert_eq!(expand_iri("site/Zürich", VM), format!("{VM}site/Zürich"));

        for reference in ["A|\"1\"", "a\\b^c`d", "[x]", "\u{7f}", "\u{fffe}", "#a#"] {
            let iri = expand_iri(reference, VM);
            assert!(
                oxigraph::model::NamedNode::new(&iri).is_ok(),
                "{reference:?} expanded to invalid {iri:?}"
            );
        }
    }

    #[test]
    fn geo_rule_keeps_geo_predicates_and_geo_names() {
        let point = Triple::new(vm("site/1"), vm("atGeoPoint"), Term::literal("POINT(1 2)"));
        let geo_name = Triple::new(vm("geo/fr"), vm("name"), Term::literal("France"));
        let site_name = Triple::new(vm("site/1"), vm("name"), Term::literal("Gate"));
        assert!(relates_geo_name(&point));
        assert!(relates_geo_name(&geo_name));
        assert!(!relates_geo_name(&site_name));
    }

    #[test]
    fn issue_rule_matches_namespace_on_either_end() {
        let subject = Triple::new(vm("issue/7"), vm("name"), Term::literal("Flooding"));
        let object = Triple::new(vm("site/1"), vm("mentions"), vm("issue/7"));
        let unrelated = Triple::new(vm("site/1"), vm("name"), Term::literal("Gate"));
        assert!(relates_issue(&subject));
        assert!(relates_issue(&object));
        assert!(!relates_issue(&unrelated));
    }

    #[test]
    fn same_identity_requires_node_objects() {
        let same = Triple::new(vm("a"), Term::iri(format!("{OWL}sameAs")), vm("b"));
        let literal = Triple::new(vm("a"), Term::iri(format!("{OWL}sameAs")), Term::literal("b"));
        assert!(asserts_same_identity(&same));
        assert!(!asserts_same_identity(&literal));
    }

    #[test]
    fn literal_display_carries_language_or_datatype() {
        let tagged = Term::Literal {
            value: "Gate".into(),
            datatype: None,
            language: Some("en".into()),
        };
        assert_eq!(tagged.to_string(), "\"Gate\"@en");
        let typed = Term::Literal {
            value: "3".into(),
            datatype: Some(format!("{XSD}integer")),
            language: None,
        };
        assert_eq!(typed.to_string(), format!("\"3\"^^<{XSD}integer>"));
    }
}
