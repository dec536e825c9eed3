//! `{Column}` placeholders filled from a spreadsheet row.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Column(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a template; `{{` and `}}` stand for literal braces.
    pub fn parse(source: &str) -> Result<Self, String> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();

        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '{' => {
                    let mut column = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => {
                                return Err(format!("unclosed placeholder in {source:?}"));
                            }
                            Some(c) => column.push(c),
                        }
                    }
                    let column = column.trim();
                    if column.is_empty() {
                        return Err(format!("empty placeholder in {source:?}"));
                    }
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Column(column.to_string()));
                }
                '}' => return Err(format!("unmatched '}}' in {source:?}")),
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }
        Ok(Self { segments })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Column(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    /// Fill placeholders from `row`. Empty when any referenced cell is blank.
    pub fn render(&self, row: &HashMap<&str, &str>) -> Option<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Column(name) => {
                    let value = row.get(name.as_str()).copied().unwrap_or_default().trim();
                    if value.is_empty() {
                        return None;
                    }
                    out.push_str(value);
                }
            }
        }
        (!out.is_empty()).then_some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_placeholders_from_row() {
        let template = Template::parse("site/{Site ID}-{Code}").expect("parse");
        assert_eq!(template.columns().collect::<Vec<_>>(), vec!["Site ID", "Code"]);
        let row = HashMap::from([("Site ID", " 7 "), ("Code", "N")]);
        assert_eq!(template.render(&row).as_deref(), Some("site/7-N"));
    }

    #[test]
    fn blank_cell_renders_nothing() {
        let template = Template::parse("{Name}").expect("parse");
        let row = HashMap::from([("Name", "  ")]);
        assert_eq!(template.render(&row), None);
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = Template::parse("{{x}}").expect("parse");
        assert_eq!(template.columns().count(), 0);
        assert_eq!(template.render(&HashMap::new()).as_deref(), Some("{x}"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(Template::parse("{Name").is_err());
        assert!(Template::parse("Name}").is_err());
        assert!(Template::parse("{}").is_err());
    }
}
