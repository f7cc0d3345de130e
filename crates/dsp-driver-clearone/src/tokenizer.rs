//! Quote-aware splitting.
//!
//! The device quotes free-text fields (caller names, SIP display names) that may
//! contain the separator, so a plain `split` would tear them apart.

/// Split `input` on `separator`, ignoring separators inside double quotes.
///
/// Tokens are trimmed and empty tokens are dropped, so runs of spaces collapse.
/// Quotes are kept in the token; use [`unquote`] to strip them.
pub fn tokenize(input: &str, separator: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in input.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            current.push(c);
        } else if c == separator && !in_quotes {
            push_token(&mut tokens, &current);
            current.clear();
        } else {
            current.push(c);
        }
    }
    push_token(&mut tokens, &current);

    tokens
}

fn push_token(tokens: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        tokens.push(trimmed.to_string());
    }
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(token: &str) -> &str {
    let t = token.trim();
    t.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_id_line_has_six_tokens() {
        let tokens = tokenize(r#"EP UA 101 NOTIFICATION CALLER_ID "John Q Smith""#, ' ');
        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], "EP");
        assert_eq!(tokens[2], "101");
        assert_eq!(tokens[5], r#""John Q Smith""#);
    }

    #[test]
    fn test_never_splits_inside_quotes() {
        let tokens = tokenize(r#"a "b c d" e "f g""#, ' ');
        assert_eq!(tokens, vec!["a", r#""b c d""#, "e", r#""f g""#]);
    }

    #[test]
    fn test_semicolon_sub_tokens() {
        let tokens = tokenize("PARTY_LINE:ON;RINGBACK:OFF", ';');
        assert_eq!(tokens, vec!["PARTY_LINE:ON", "RINGBACK:OFF"]);
    }

    #[test]
    fn test_semicolon_inside_quotes_kept() {
        let tokens = tokenize(r#"PL 1;INCOMING:"55;51234" <SIP:a@b>"#, ';');
        assert_eq!(tokens, vec!["PL 1", r#"INCOMING:"55;51234" <SIP:a@b>"#]);
    }

    #[test]
    fn test_tokens_trimmed_and_empty_dropped() {
        let tokens = tokenize("  EP   MIC  101 ", ' ');
        assert_eq!(tokens, vec!["EP", "MIC", "101"]);
        assert!(tokenize("", ' ').is_empty());
        assert!(tokenize(" ; ;", ';').is_empty());
    }

    #[test]
    fn test_unbalanced_quote_swallows_rest() {
        let tokens = tokenize(r#"EP "MIC 101"#, ' ');
        assert_eq!(tokens, vec!["EP", r#""MIC 101"#]);
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""John Q Smith""#), "John Q Smith");
        assert_eq!(unquote("5551234"), "5551234");
        assert_eq!(unquote(r#""open"#), r#""open"#);
    }
}
