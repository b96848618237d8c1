//! Nested sectioned key/value documents.
//!
//! Section headers nest by bracket depth (`[part 1]`, `[[audio 2]]`,
//! `[[[question 1]]]`). Values are bare or quoted strings, comma-separated
//! lists, or triple-quoted blocks spanning several lines. `#` starts a
//! comment outside quotes.

mod coerce;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConfigError;

pub use coerce::{parse_bool, parse_float, parse_int};

static HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\[+)\s*([^\[\]]*?)\s*(\]+)\s*(?:#.*)?$").expect("section header pattern")
});

/// A raw value as written in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Single(String),
    List(Vec<String>),
}

impl RawValue {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            RawValue::Single(value) => Some(value),
            RawValue::List(_) => None,
        }
    }

    /// Items of a list; a single value is a list of one.
    pub fn items(&self) -> Vec<String> {
        match self {
            RawValue::Single(value) => vec![value.clone()],
            RawValue::List(items) => items.clone(),
        }
    }
}

/// One section of the document with its entries and subsections in file order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Section {
    pub name: String,
    pub path: String,
    pub depth: usize,
    entries: Vec<(String, RawValue)>,
    sections: Vec<Section>,
}

impl Section {
    fn child(parent: &Section, name: &str) -> Self {
        let path = if parent.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", parent.path, name)
        };
        Self {
            name: name.to_string(),
            path,
            depth: parent.depth + 1,
            entries: Vec::new(),
            sections: Vec::new(),
        }
    }

    /// Label used in error messages.
    pub fn label(&self) -> &str {
        if self.path.is_empty() { "root" } else { &self.path }
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.name == name)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.sections.is_empty()
    }

    fn insert(&mut self, key: String, value: RawValue, line: usize) -> Result<(), ConfigError> {
        if self.contains_key(&key) {
            return Err(ConfigError::Syntax {
                line,
                message: format!("duplicate key '{}' in [{}]", key, self.label()),
            });
        }
        self.entries.push((key, value));
        Ok(())
    }

    fn attach(&mut self, section: Section, line: usize) -> Result<(), ConfigError> {
        if self.section(&section.name).is_some() {
            return Err(ConfigError::Syntax {
                line,
                message: format!("duplicate section [{}]", section.path),
            });
        }
        self.sections.push(section);
        Ok(())
    }
}

/// Parse a document into its root section.
pub fn parse(text: &str) -> Result<Section, ConfigError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let lines: Vec<&str> = text.lines().collect();
    let mut stack = vec![Section::default()];
    let mut idx = 0;

    while idx < lines.len() {
        let line_no = idx + 1;
        let line = lines[idx].trim();
        idx += 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let (depth, name) = parse_header(line, line_no)?;
            if depth > stack.len() {
                return Err(ConfigError::Syntax {
                    line: line_no,
                    message: format!("section [{}] is nested too deeply", name),
                });
            }
            while stack.len() > depth {
                close_section(&mut stack, line_no)?;
            }
            let parent = stack.last().ok_or_else(|| ConfigError::Syntax {
                line: line_no,
                message: "section without parent".into(),
            })?;
            let child = Section::child(parent, &name);
            stack.push(child);
            continue;
        }

        let Some((key, rest)) = line.split_once('=') else {
            return Err(ConfigError::Syntax {
                line: line_no,
                message: format!("expected 'key = value', found '{}'", line),
            });
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::Syntax {
                line: line_no,
                message: "empty key".into(),
            });
        }

        let rest = rest.trim();
        let value = if let Some(delimiter) = triple_quote(rest) {
            let (block, consumed) = read_block(rest, delimiter, &lines[idx..], line_no)?;
            idx += consumed;
            RawValue::Single(block)
        } else {
            parse_value(rest, line_no)?
        };

        let current = stack.last_mut().ok_or_else(|| ConfigError::Syntax {
            line: line_no,
            message: "value outside of any section".into(),
        })?;
        current.insert(key.to_string(), value, line_no)?;
    }

    let last_line = lines.len();
    while stack.len() > 1 {
        close_section(&mut stack, last_line)?;
    }
    stack.pop().ok_or_else(|| ConfigError::Syntax {
        line: last_line,
        message: "empty document".into(),
    })
}

fn close_section(stack: &mut Vec<Section>, line: usize) -> Result<(), ConfigError> {
    let Some(section) = stack.pop() else {
        return Ok(());
    };
    match stack.last_mut() {
        Some(parent) => parent.attach(section, line),
        None => Err(ConfigError::Syntax {
            line,
            message: "unbalanced sections".into(),
        }),
    }
}

fn parse_header(line: &str, line_no: usize) -> Result<(usize, String), ConfigError> {
    let invalid = || ConfigError::Syntax {
        line: line_no,
        message: format!("invalid section header '{}'", line),
    };
    let captures = HEADER.captures(line).ok_or_else(invalid)?;
    let open = captures.get(1).map_or(0, |m| m.as_str().len());
    let close = captures.get(3).map_or(0, |m| m.as_str().len());
    let name = captures.get(2).map_or("", |m| m.as_str());
    if open != close || name.is_empty() {
        return Err(invalid());
    }
    Ok((open, strip_quotes(name).to_string()))
}

fn strip_quotes(text: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

fn triple_quote(value: &str) -> Option<&'static str> {
    ["'''", "\"\"\""]
        .into_iter()
        .find(|delimiter| value.starts_with(delimiter))
}

/// Reads a triple-quoted block. Returns the content and the number of extra lines consumed.
fn read_block(
    first: &str,
    delimiter: &str,
    following: &[&str],
    line_no: usize,
) -> Result<(String, usize), ConfigError> {
    let opened = &first[delimiter.len()..];
    if let Some(end) = opened.find(delimiter) {
        ensure_trailing_comment(&opened[end + delimiter.len()..], line_no)?;
        return Ok((opened[..end].to_string(), 0));
    }

    let mut content = opened.to_string();
    for (offset, raw) in following.iter().enumerate() {
        content.push('\n');
        if let Some(end) = raw.find(delimiter) {
            content.push_str(&raw[..end]);
            ensure_trailing_comment(&raw[end + delimiter.len()..], line_no + offset + 1)?;
            return Ok((content, offset + 1));
        }
        content.push_str(raw);
    }

    Err(ConfigError::Syntax {
        line: line_no,
        message: format!("unterminated {} block", delimiter),
    })
}

fn ensure_trailing_comment(rest: &str, line_no: usize) -> Result<(), ConfigError> {
    let rest = rest.trim();
    if rest.is_empty() || rest.starts_with('#') {
        Ok(())
    } else {
        Err(ConfigError::Syntax {
            line: line_no,
            message: format!("unexpected text '{}' after quoted block", rest),
        })
    }
}

fn parse_value(raw: &str, line_no: usize) -> Result<RawValue, ConfigError> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut saw_comma = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' if !quoted && current.trim().is_empty() => {
                let mut inner = String::new();
                let mut closed = false;
                for next in chars.by_ref() {
                    if next == c {
                        closed = true;
                        break;
                    }
                    inner.push(next);
                }
                if !closed {
                    return Err(ConfigError::Syntax {
                        line: line_no,
                        message: format!("unterminated quote in '{}'", raw),
                    });
                }
                current = inner;
                quoted = true;
            }
            ',' => {
                items.push(finish_item(&current, quoted));
                current.clear();
                quoted = false;
                saw_comma = true;
            }
            '#' => break,
            _ if quoted => {
                if !c.is_whitespace() {
                    return Err(ConfigError::Syntax {
                        line: line_no,
                        message: format!("unexpected text after quoted value in '{}'", raw),
                    });
                }
            }
            _ => current.push(c),
        }
    }

    let last = finish_item(&current, quoted);
    if saw_comma {
        if quoted || !last.is_empty() {
            items.push(last);
        }
        Ok(RawValue::List(items))
    } else {
        Ok(RawValue::Single(last))
    }
}

fn finish_item(current: &str, quoted: bool) -> String {
    if quoted {
        current.to_string()
    } else {
        current.trim().to_string()
    }
}
