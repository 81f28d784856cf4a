//! CFI Parser
//!
//! Parses EPUB CFI strings into structured Cfi objects.
//!
//! Grammar:
//! ```text
//! cfi       = "epubcfi(" base "!" body ")"
//! body      = path | path "," path "," path
//! path      = ("/" step)* [terminal]
//! step      = index ["[" id "]"]
//! terminal  = ":" offset ["[" [prefix] ["," suffix] (";" key "=" value)* "]"]
//! ```
//!
//! Inside brackets `^` escapes the following character.

use tracing::trace;

use super::error::{CfiError, Result};
use super::types::*;

/// Characters that end a step index token
const STEP_DELIMITERS: &[char] = &['/', '[', ':', '!', ',', ')'];

/// Parser state
struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.skip_if(expected) {
            return Ok(());
        }
        let reason = match self.peek() {
            Some(ch) => format!("expected '{}', found '{}'", expected, ch),
            None => format!("expected '{}', found end of input", expected),
        };
        Err(CfiError::malformed(self.pos, reason))
    }

    fn skip_str(&mut self, s: &str) -> bool {
        if self.input[self.pos..].starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Parse a step index; anything other than plain digits is rejected
    fn parse_index(&mut self) -> Result<u32> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if STEP_DELIMITERS.contains(&ch) {
                break;
            }
            self.advance();
        }

        let input = self.input;
        let token = &input[start..self.pos];
        let invalid = || CfiError::InvalidStepIndex {
            token: token.to_string(),
            position: start,
        };

        if token.is_empty() || !token.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(invalid());
        }
        token.parse().map_err(|_| invalid())
    }

    /// Parse the digits of a character offset
    fn parse_offset(&mut self) -> Result<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.advance();
        }

        if self.pos == start {
            return Err(CfiError::malformed(start, "expected character offset"));
        }

        self.input[start..self.pos]
            .parse()
            .map_err(|_| CfiError::malformed(start, "character offset out of range"))
    }

    /// Consume `[ ... ]` and return the raw content, escapes still in place
    fn parse_bracket(&mut self) -> Result<&'a str> {
        let input = self.input;
        let open = self.pos;
        self.expect('[')?;
        let start = self.pos;
        let mut escaped = false;

        while let Some(ch) = self.peek() {
            if escaped {
                escaped = false;
            } else if ch == '^' {
                escaped = true;
            } else if ch == ']' {
                let content = &input[start..self.pos];
                self.advance();
                return Ok(content);
            } else if ch == '[' {
                // Nested brackets not allowed without escape
                return Err(CfiError::malformed(self.pos, "unescaped '[' inside brackets"));
            }
            self.advance();
        }

        Err(CfiError::malformed(open, "unclosed bracket"))
    }

    fn parse_step(&mut self) -> Result<CfiStep> {
        let index = self.parse_index()?;
        let id = if self.peek() == Some('[') {
            let raw = self.parse_bracket()?;
            Some(unescape(raw)).filter(|id| !id.is_empty())
        } else {
            None
        };

        Ok(CfiStep {
            kind: StepKind::from_index(index),
            index,
            id,
        })
    }

    fn parse_terminal(&mut self) -> Result<Terminal> {
        let offset = self.parse_offset()?;
        let mut terminal = Terminal::offset(offset);

        if self.peek() != Some('[') {
            return Ok(terminal);
        }

        let bracket_pos = self.pos;
        let raw = self.parse_bracket()?;
        let mut sections = split_unescaped(raw, ';').into_iter();

        if let Some(text) = sections.next() {
            terminal.assertion = parse_text_assertion(text);
        }

        for param in sections {
            let Some((key, value)) = split_once_unescaped(param, '=') else {
                return Err(CfiError::malformed(
                    bracket_pos,
                    format!("parameter '{}' is missing '='", unescape(param)),
                ));
            };
            let key = unescape(key);
            let value = unescape(value);

            if key.is_empty() {
                return Err(CfiError::malformed(bracket_pos, "parameter has an empty key"));
            }

            if key == "s" {
                terminal.side_bias = Some(match value.as_str() {
                    "b" => SideBias::Before,
                    "a" => SideBias::After,
                    other => {
                        return Err(CfiError::malformed(
                            bracket_pos,
                            format!("unknown side bias '{}'", other),
                        ))
                    }
                });
            } else {
                terminal.parameters.push((key, value));
            }
        }

        Ok(terminal)
    }

    /// Parse a path (sequence of steps with optional terminal)
    fn parse_path(&mut self) -> Result<CfiPath> {
        let mut steps = Vec::new();
        while self.skip_if('/') {
            steps.push(self.parse_step()?);
        }

        let terminal = if self.skip_if(':') {
            Some(self.parse_terminal()?)
        } else {
            None
        };

        Ok(CfiPath { steps, terminal })
    }

    /// Parse a complete CFI
    fn parse_cfi(&mut self) -> Result<Cfi> {
        if !self.skip_str("epubcfi(") {
            return Err(CfiError::malformed(0, "CFI must start with 'epubcfi('"));
        }

        let base_pos = self.pos;
        let base = self.parse_path()?;
        if base.steps.is_empty() {
            return Err(CfiError::malformed(base_pos, "base path has no steps"));
        }
        if base.terminal.is_some() {
            return Err(CfiError::malformed(base_pos, "base path cannot carry an offset"));
        }
        self.expect('!')?;

        let path_pos = self.pos;
        let path = self.parse_path()?;

        let range = if self.skip_if(',') {
            if path.terminal.is_some() {
                return Err(CfiError::malformed(
                    path_pos,
                    "common path of a range cannot carry an offset",
                ));
            }
            let start = self.parse_path()?;
            self.expect(',')?;
            let end = self.parse_path()?;
            Some(CfiRange { start, end })
        } else if path.steps.is_empty() {
            return Err(CfiError::malformed(path_pos, "path has no steps"));
        } else {
            None
        };

        self.expect(')')?;

        Ok(Cfi { base, path, range })
    }
}

/// Split on `sep` where it is not preceded by the `^` escape
fn split_unescaped(raw: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut escaped = false;

    for (i, ch) in raw.char_indices() {
        if escaped {
            escaped = false;
        } else if ch == '^' {
            escaped = true;
        } else if ch == sep {
            parts.push(&raw[start..i]);
            start = i + ch.len_utf8();
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn split_once_unescaped(raw: &str, sep: char) -> Option<(&str, &str)> {
    let parts = split_unescaped(raw, sep);
    if parts.len() < 2 {
        return None;
    }
    let key = parts[0];
    Some((key, &raw[key.len() + sep.len_utf8()..]))
}

/// Parse `prefix,suffix` from the text part of a terminal bracket
fn parse_text_assertion(raw: &str) -> Option<TextAssertion> {
    let (prefix, suffix) = match split_once_unescaped(raw, ',') {
        Some((prefix, suffix)) => (prefix, Some(suffix)),
        None => (raw, None),
    };

    let prefix = Some(unescape(prefix)).filter(|s| !s.is_empty());
    let suffix = suffix.map(unescape).filter(|s| !s.is_empty());

    if prefix.is_none() && suffix.is_none() {
        None
    } else {
        Some(TextAssertion { prefix, suffix })
    }
}

/// Remove `^` escapes
fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut escaped = false;
    for ch in raw.chars() {
        if escaped {
            result.push(ch);
            escaped = false;
        } else if ch == '^' {
            escaped = true;
        } else {
            result.push(ch);
        }
    }
    result
}

/// Parse a CFI string into a Cfi struct
pub fn parse(input: &str) -> Result<Cfi> {
    let input = input.trim();
    trace!(cfi = %input, "Parsing CFI");

    let mut parser = Parser::new(input);
    let cfi = parser.parse_cfi()?;

    // Ensure we consumed all input
    if !parser.at_end() {
        return Err(CfiError::malformed(
            parser.pos,
            "unexpected trailing input after ')'",
        ));
    }

    Ok(cfi)
}

/// Parse a CFI string, discarding the error
pub fn try_parse(input: &str) -> Option<Cfi> {
    parse(input).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices(path: &CfiPath) -> Vec<u32> {
        path.steps.iter().map(|s| s.index).collect()
    }

    #[test]
    fn test_parse_simple_cfi() {
        let cfi = parse("epubcfi(/6/4!/4/2)").unwrap();
        assert_eq!(indices(&cfi.base), vec![6, 4]);
        assert_eq!(indices(&cfi.path), vec![4, 2]);
        assert!(cfi.path.terminal.is_none());
        assert!(!cfi.is_range());
    }

    #[test]
    fn test_parse_cfi_with_id() {
        let cfi = parse("epubcfi(/6/4[chapter1]!/4[body01]/2)").unwrap();
        assert_eq!(cfi.base.steps[1].id, Some("chapter1".to_string()));
        assert_eq!(cfi.path.steps[0].id, Some("body01".to_string()));
        assert_eq!(cfi.path.steps[1].id, None);
    }

    #[test]
    fn test_parse_step_kinds() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:42)").unwrap();
        let kinds: Vec<StepKind> = cfi.path.steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Element, StepKind::Element, StepKind::Text]
        );
        assert_eq!(cfi.path.terminal.as_ref().unwrap().offset, 42);
    }

    #[test]
    fn test_parse_cfi_with_text_assertion() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:42[hello,world])").unwrap();
        let terminal = cfi.path.terminal.as_ref().unwrap();
        let assertion = terminal.assertion.as_ref().unwrap();
        assert_eq!(assertion.prefix, Some("hello".to_string()));
        assert_eq!(assertion.suffix, Some("world".to_string()));
        assert_eq!(terminal.side_bias, None);
    }

    #[test]
    fn test_parse_side_bias() {
        let cfi = parse("epubcfi(/6/4!/4/2/1:42[;s=b])").unwrap();
        let terminal = cfi.path.terminal.as_ref().unwrap();
        assert_eq!(terminal.side_bias, Some(SideBias::Before));
        assert!(terminal.assertion.is_none());

        let cfi = parse("epubcfi(/6/4!/4/2/1:0[xx,yy;s=a;lang=en])").unwrap();
        let terminal = cfi.path.terminal.as_ref().unwrap();
        assert_eq!(terminal.side_bias, Some(SideBias::After));
        assert_eq!(
            terminal.parameters,
            vec![("lang".to_string(), "en".to_string())]
        );
    }

    #[test]
    fn test_parse_range_example() {
        let cfi = parse("epubcfi(/6/4!/4/2,/2:0,/4:3)").unwrap();
        assert!(cfi.is_range());
        assert_eq!(indices(&cfi.base), vec![6, 4]);
        assert_eq!(indices(&cfi.path), vec![4, 2]);
        assert!(cfi.path.terminal.is_none());

        let range = cfi.range.as_ref().unwrap();
        assert_eq!(indices(&range.start), vec![2]);
        assert_eq!(range.start.terminal.as_ref().unwrap().offset, 0);
        assert_eq!(indices(&range.end), vec![4]);
        assert_eq!(range.end.terminal.as_ref().unwrap().offset, 3);
    }

    #[test]
    fn test_parse_range_with_empty_common_path() {
        let cfi = parse("epubcfi(/6/4!,/4/1:0,/6/1:2)").unwrap();
        assert!(cfi.path.steps.is_empty());
        assert_eq!(indices(&cfi.range.as_ref().unwrap().end), vec![6, 1]);
    }

    #[test]
    fn test_parse_range_with_offset_only_suffixes() {
        let cfi = parse("epubcfi(/6/4!/4/2/1,:5,:9)").unwrap();
        let range = cfi.range.as_ref().unwrap();
        assert!(range.start.steps.is_empty());
        assert_eq!(range.start.terminal.as_ref().unwrap().offset, 5);
        assert_eq!(range.end.terminal.as_ref().unwrap().offset, 9);
    }

    #[test]
    fn test_roundtrip() {
        for original in [
            "epubcfi(/6/4[chapter1]!/4/2/1:42)",
            "epubcfi(/6/4!/4/2,/1:0,/1:10)",
            "epubcfi(/6/4!/4/2/1:3[yes^, no;s=a])",
            "epubcfi(/6/14[chap05ref]!/4[body01]/10/2/1:3[2^[1^]])",
        ] {
            let cfi = parse(original).unwrap();
            assert_eq!(cfi.to_string(), original);
            assert_eq!(parse(&cfi.to_string()).unwrap(), cfi);
        }
    }

    #[test]
    fn test_roundtrip_drops_empty_id() {
        let cfi = parse("epubcfi(/6/4[]!/4)").unwrap();
        assert_eq!(cfi.to_string(), "epubcfi(/6/4!/4)");
        assert_eq!(parse(&cfi.to_string()).unwrap(), cfi);
    }

    #[test]
    fn test_escaped_bracket() {
        let cfi = parse("epubcfi(/6/4[test^]value]!/4)").unwrap();
        assert_eq!(cfi.base.steps[1].id, Some("test]value".to_string()));
    }

    #[test]
    fn test_whitespace_is_trimmed() {
        assert!(parse("  epubcfi(/6/4!/4)\n").is_ok());
    }

    #[test]
    fn test_error_empty() {
        assert!(matches!(
            parse(""),
            Err(CfiError::MalformedIdentifier { position: 0, .. })
        ));
    }

    #[test]
    fn test_error_missing_prefix() {
        assert!(matches!(
            parse("/6/4!/4"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_missing_paren() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_missing_indirection() {
        assert!(matches!(
            parse("epubcfi(/6/4)"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_trailing_input() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4)x"),
            Err(CfiError::MalformedIdentifier { position: 16, .. })
        ));
    }

    #[test]
    fn test_error_invalid_step_index() {
        assert_eq!(
            parse("epubcfi(/6/-4!/4)"),
            Err(CfiError::InvalidStepIndex {
                token: "-4".to_string(),
                position: 11,
            })
        );
        assert!(matches!(
            parse("epubcfi(/6/4!/abc)"),
            Err(CfiError::InvalidStepIndex { .. })
        ));
        assert!(matches!(
            parse("epubcfi(/6//4!/4)"),
            Err(CfiError::InvalidStepIndex { .. })
        ));
        assert!(matches!(
            parse("epubcfi(/6/4!/99999999999)"),
            Err(CfiError::InvalidStepIndex { .. })
        ));
    }

    #[test]
    fn test_error_bad_offset() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4/1:x)"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_offset_in_base() {
        assert!(matches!(
            parse("epubcfi(/6/4:3!/4)"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_incomplete_range() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4,/2:0)"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_offset_on_common_path() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4/1:3,:5,:9)"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_unclosed_bracket() {
        assert!(matches!(
            parse("epubcfi(/6/4[abc!/4)"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_unknown_side_bias() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4/1:2[;s=x])"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_error_empty_parameter_key() {
        assert!(matches!(
            parse("epubcfi(/6/4!/4/1:2[;=x])"),
            Err(CfiError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_try_parse() {
        assert!(try_parse("epubcfi(/6/4!/4)").is_some());
        assert!(try_parse("not a cfi").is_none());
    }
}
