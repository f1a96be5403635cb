//! Lenient web-search query syntax, rendered to an FTS5 MATCH expression.
//!
//! Supported: bare words (implicit AND), `"quoted phrases"`, `or` between
//! operands, and a leading `-` to exclude a word or phrase. Anything else is
//! treated as plain text. Every operand is emitted as a double-quoted FTS5
//! string so user input can never reach the FTS5 operator grammar.

#[derive(Debug, PartialEq)]
enum Token {
    Operand { text: String, negated: bool },
    Or,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let negated = chars.next_if_eq(&'-').is_some();
        match chars.peek() {
            None => break,
            Some(c) if c.is_whitespace() => continue,
            Some('"') => {
                chars.next();
                let mut phrase = String::new();
                // An unterminated quote runs to the end of the input.
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    phrase.push(c);
                }
                tokens.push(Token::Operand {
                    text: phrase,
                    negated,
                });
            }
            Some(_) => {
                let mut word = String::new();
                while let Some(c) = chars.next_if(|c| !c.is_whitespace() && *c != '"') {
                    word.push(c);
                }
                if !negated && word.eq_ignore_ascii_case("or") {
                    tokens.push(Token::Or);
                } else {
                    tokens.push(Token::Operand {
                        text: word,
                        negated,
                    });
                }
            }
        }
    }

    tokens
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Parse `input` and render it as an FTS5 MATCH expression.
///
/// Returns `None` when the query has nothing positive to match, which callers
/// treat as an empty result rather than an error.
pub fn to_fts_match(input: &str) -> Option<String> {
    // Each inner Vec is a group of OR-ed alternatives; groups are AND-ed.
    let mut required: Vec<Vec<String>> = Vec::new();
    let mut excluded: Vec<String> = Vec::new();
    let mut pending_or = false;

    for token in tokenize(input) {
        match token {
            Token::Or => pending_or = !required.is_empty(),
            Token::Operand { text, negated } => {
                let text = text.trim();
                if !text.chars().any(char::is_alphanumeric) {
                    continue;
                }
                let operand = quote(text);
                if negated {
                    excluded.push(operand);
                } else if pending_or {
                    if let Some(group) = required.last_mut() {
                        group.push(operand);
                    }
                } else {
                    required.push(vec![operand]);
                }
                pending_or = false;
            }
        }
    }

    if required.is_empty() {
        return None;
    }

    let positive = required
        .into_iter()
        .map(|group| {
            if group.len() == 1 {
                group.join("")
            } else {
                format!("({})", group.join(" OR "))
            }
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    if excluded.is_empty() {
        return Some(positive);
    }
    let mut expr = format!("({positive})");
    for operand in excluded {
        expr.push_str(" NOT ");
        expr.push_str(&operand);
    }
    Some(expr)
}
