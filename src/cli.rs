use std::path::PathBuf;

use clap::{ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "techcoach", about = "Python coding practice with automated grading and an AI tutor", version)]
#[command(group(ArgGroup::new("mode").args(["run", "submit", "reset", "list", "show", "ask", "repl"]).multiple(false)))]
#[command(group(ArgGroup::new("identity").args(["user", "anonymous"]).multiple(false)))]
#[command(group(ArgGroup::new("md_switch").args(["md", "no_md"]).multiple(false)))]
pub struct Cli {
    /// Run a source file as-is and print its output. Use `-` for stdin.
    #[arg(long, value_name = "FILE")]
    pub run: Option<PathBuf>,

    /// Grade a source file against the exercise's tests. Use `-` for stdin.
    #[arg(long, value_name = "FILE")]
    pub submit: Option<PathBuf>,

    /// Print the exercise's default template.
    #[arg(long)]
    pub reset: bool,

    /// List all exercises with completion markers.
    #[arg(short = 'l', long)]
    pub list: bool,

    /// Show the exercise description, examples, constraints and hints.
    #[arg(long)]
    pub show: bool,

    /// Ask the AI tutor a question about the exercise.
    #[arg(long, value_name = "QUESTION")]
    pub ask: Option<String>,

    /// Start an interactive session over one persistent interpreter.
    #[arg(long)]
    pub repl: bool,

    /// Exercise id or slug.
    #[arg(short = 'x', long, value_name = "ID", default_value = "1")]
    pub exercise: String,

    /// Learner id; snapshots and progress are kept per learner.
    #[arg(short = 'u', long, value_name = "ID")]
    pub user: Option<String>,

    /// Work anonymously even if TECHCOACH_USER is set.
    #[arg(long)]
    pub anonymous: bool,

    /// Ask the tutor for feedback after grading (also TUTOR_FEEDBACK=true).
    #[arg(long)]
    pub feedback: bool,

    /// Code file to include as context with --ask. Defaults to the saved snapshot.
    #[arg(long, value_name = "FILE")]
    pub code: Option<PathBuf>,

    /// Large language model used by the tutor.
    #[arg(long)]
    pub model: Option<String>,

    /// Prettify Markdown output.
    #[arg(long)]
    pub md: bool,
    /// Disable Markdown prettifying.
    #[arg(long = "no-md")]
    pub no_md: bool,
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["techcoach", "--list", "--show"]).is_err());
        assert!(Cli::try_parse_from(["techcoach", "--user", "ada", "--anonymous"]).is_err());
    }

    #[test]
    fn exercise_defaults_to_the_first() {
        let cli = Cli::try_parse_from(["techcoach", "--submit", "-"]).unwrap();
        assert_eq!(cli.exercise, "1");
        assert_eq!(cli.submit.as_deref(), Some(std::path::Path::new("-")));
    }
}
