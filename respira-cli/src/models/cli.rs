use clap::{ArgAction, ArgGroup, Parser};
use std::path::PathBuf;

/// Respira: ask questions about respiratory-disease hospitalizations.
/// Answers a single prompt, or starts an interactive session with `-i`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["prompt", "interactive"])))]
pub struct Cli {
    /// Increase message verbosity.
    ///
    /// Specify multiple times for more verbose output:
    ///  -v:  INFO level
    ///  -vv: DEBUG level
    ///  -vvv: TRACE level (most verbose)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Question to answer non-interactively.
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Let the model call the analytics tools (always on in interactive mode).
    #[arg(short = 'f', long)]
    pub function_calling: bool,

    /// Start an interactive session.
    #[arg(short, long)]
    pub interactive: bool,

    /// Path to a Respira.toml; searched upwards from the current directory when omitted.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Provider id from the config to use instead of `default_provider`.
    #[arg(long, value_name = "ID")]
    pub provider: Option<String>,

    /// Print the full message transcript after each answer.
    #[arg(long)]
    pub show_history: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_prompt_with_tools() {
        let cli = Cli::try_parse_from(["respira", "-p", "Top cities?", "-f", "-vv"]).unwrap();
        assert_eq!(cli.prompt.as_deref(), Some("Top cities?"));
        assert!(cli.function_calling);
        assert!(!cli.interactive);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn interactive_with_overrides() {
        let cli = Cli::try_parse_from([
            "respira",
            "--interactive",
            "--config",
            "conf/Respira.toml",
            "--provider",
            "openai",
            "--show-history",
        ])
        .unwrap();
        assert!(cli.interactive);
        assert_eq!(cli.config, Some(PathBuf::from("conf/Respira.toml")));
        assert_eq!(cli.provider.as_deref(), Some("openai"));
        assert!(cli.show_history);
    }

    #[test]
    fn a_mode_is_required() {
        assert!(Cli::try_parse_from(["respira", "-f"]).is_err());
        assert!(Cli::try_parse_from(["respira", "-p", "hi", "-i"]).is_err());
    }
}
