use crate::error::LexingError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    String,
    LineComment,
    BlockComment,
}

/// Character scanner for a single physical line.
struct Scanner {
    chars: Vec<char>,
    current: usize,
}

impl Scanner {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            current: 0,
        }
    }

    fn at(&self) -> char {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> char {
        self.chars.get(self.current + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) {
        self.current += 1;
    }

    fn is_eof(&self) -> bool {
        self.current >= self.chars.len()
    }

    /// Whether the current character follows an odd run of backslashes.
    fn is_escaped(&self) -> bool {
        let backslashes = self.chars[..self.current.min(self.chars.len())]
            .iter()
            .rev()
            .take_while(|&&c| c == '\\')
            .count();
        backslashes % 2 == 1
    }
}

/// Strips `#`, `//` and `/* */` commentary and surrounding whitespace.
///
/// String literals are copied verbatim, so `print "#1"` keeps its argument.
/// Comment state never crosses lines: an unterminated `/*` swallows the rest
/// of this line only.
pub fn clean_line(line: &str) -> String {
    let mut scanner = Scanner::new(line);
    let mut state = State::Code;
    let mut output = String::with_capacity(line.len());

    while !scanner.is_eof() {
        let ch = scanner.at();
        match state {
            State::Code => match ch {
                '#' => state = State::LineComment,
                '/' if scanner.peek(1) == '/' => state = State::LineComment,
                '/' if scanner.peek(1) == '*' => {
                    scanner.advance();
                    state = State::BlockComment;
                }
                '"' => {
                    state = State::String;
                    output.push(ch);
                }
                _ => output.push(ch),
            },
            State::String => {
                if ch == '"' && !scanner.is_escaped() {
                    state = State::Code;
                }
                output.push(ch);
            }
            State::LineComment => {
                if ch == '\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if ch == '*' && scanner.peek(1) == '/' {
                    scanner.advance();
                    state = State::Code;
                }
            }
        }
        scanner.advance();
    }

    output.trim().to_string()
}

/// Splits a cleaned line on spaces; a double-quoted span is one token and keeps its quotes.
pub fn tokenize(line: &str) -> Result<Vec<String>, LexingError> {
    split_outside_strings(line, ' ')
}

/// Splits a cleaned line into separate statements on `;`, ignoring `;` inside strings.
pub fn split_on_semicolons(line: &str) -> Result<Vec<String>, LexingError> {
    Ok(split_outside_strings(line, ';')?
        .into_iter()
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect())
}

fn split_outside_strings(line: &str, separator: char) -> Result<Vec<String>, LexingError> {
    let mut scanner = Scanner::new(line);
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut string_start = 0;

    while !scanner.is_eof() {
        let ch = scanner.at();
        if ch == '"' && !scanner.is_escaped() {
            if !in_string {
                string_start = scanner.current + 1;
            }
            in_string = !in_string;
            current.push(ch);
        } else if ch == separator && !in_string {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
        scanner.advance();
    }

    if in_string {
        return Err(LexingError::new("Unterminated string literal", string_start));
    }
    if !current.is_empty() {
        parts.push(current);
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn strips_line_comments() {
        assert_eq!(clean_line("set x 5 # the answer"), "set x 5");
        assert_eq!(clean_line("set x 5 // the answer"), "set x 5");
        assert_eq!(clean_line("   # only a comment"), "");
    }

    #[test]
    fn strips_block_comments_in_the_middle() {
        assert_eq!(clean_line("op add /* sum */ x 1 2"), "op add  x 1 2");
        assert_eq!(clean_line("print 1 /* never closed"), "print 1");
    }

    #[test]
    fn comment_markers_inside_strings_survive() {
        assert_eq!(clean_line(r#"print "a # b // c""#), r#"print "a # b // c""#);
        assert_eq!(clean_line(r#"print "x" # y"#), r#"print "x""#);
    }

    #[test]
    fn cleaning_is_idempotent_on_clean_lines() {
        for line in ["set x 5", r#"print "hello world""#, "jump 0 always", "label:"] {
            assert_eq!(clean_line(line), line);
        }
    }

    #[test]
    fn tokenize_keeps_quoted_spans_together() {
        assert_eq!(
            tokenize(r#"print "hello world" x"#).unwrap(),
            vec!["print", r#""hello world""#, "x"]
        );
    }

    #[test]
    fn tokenize_collapses_repeated_spaces() {
        assert_eq!(tokenize("op add  x 1 2").unwrap(), vec!["op", "add", "x", "1", "2"]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let error = tokenize(r#"print "oops"#).unwrap_err();
        assert_eq!(error.message, "Unterminated string literal");
        assert_eq!(error.column, 7);
    }

    #[test]
    fn an_escaped_backslash_does_not_escape_the_quote() {
        assert_eq!(tokenize(r#"print "a\\""#).unwrap(), vec!["print", r#""a\\""#]);
        assert_eq!(clean_line(r#"print "a\\" # note"#), r#"print "a\\""#);
        assert!(tokenize(r#"print "a\"#).is_err());
    }

    #[test]
    fn semicolons_split_statements_outside_strings() {
        assert_eq!(
            split_on_semicolons(r#"set x 1; print "a;b" ;end"#).unwrap(),
            vec!["set x 1", r#"print "a;b""#, "end"]
        );
    }
}
