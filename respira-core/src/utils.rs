// respira-core/src/utils.rs
//! Small helpers shared by the agent and the CLI.

/// Shortens `input` to at most `max_chars` characters for log lines,
/// ending with `...` when something was cut and there is room for it.
pub fn truncate_string(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some(_) if max_chars < 3 => input.chars().take(max_chars).collect(),
        Some(_) => {
            let kept: String = input.chars().take(max_chars - 3).collect();
            format!("{}...", kept)
        }
    }
}

/// Collapses whitespace runs so multi-line prompts stay on one log line.
pub fn single_line(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_are_untouched() {
        assert_eq!(truncate_string("idade", 10), "idade");
        assert_eq!(truncate_string("idade", 5), "idade");
        assert_eq!(truncate_string("", 0), "");
    }

    #[test]
    fn long_strings_get_an_ellipsis() {
        assert_eq!(truncate_string("internações respiratórias", 10), "interna...");
        assert_eq!(truncate_string("hello world", 3), "...");
        assert_eq!(truncate_string("hello world", 2), "he");
    }

    #[test]
    fn single_line_collapses_whitespace() {
        assert_eq!(single_line("  top\n cities \t2020 "), "top cities 2020");
    }
}
