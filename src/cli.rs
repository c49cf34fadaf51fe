use std::path::PathBuf;

use clap::{ArgAction, ArgGroup, Parser};

#[derive(Parser, Debug, Clone)]
#[command(name = "planexec", about = "Run declarative data-analysis plans", version)]
#[command(group(ArgGroup::new("question_source").args(["question", "questions"]).multiple(false)))]
pub struct Cli {
    /// The question to plan and answer.
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Read the question from a file.
    #[arg(long, value_name = "FILE")]
    pub questions: Option<PathBuf>,

    /// Execute this plan file instead of asking the planner ("-" reads stdin).
    #[arg(long, value_name = "FILE")]
    pub plan: Option<String>,

    /// Copy a file into the job workspace.
    /// Can be used multiple times: --file data.csv --file page.html
    #[arg(long = "file", value_name = "FILE", action = ArgAction::Append)]
    pub files: Vec<PathBuf>,

    /// Global job deadline in seconds (overrides MAX_JOB_SECONDS).
    #[arg(long, value_name = "SECS")]
    pub deadline: Option<u64>,

    /// Planner model (overrides DEFAULT_MODEL).
    #[arg(long)]
    pub model: Option<String>,

    /// Bypass the planner response cache.
    #[arg(long = "no-cache")]
    pub no_cache: bool,

    /// Print the validated plan and exit without executing it.
    #[arg(long = "show-plan")]
    pub show_plan: bool,

    /// Print compact JSON instead of pretty-printed.
    #[arg(long)]
    pub raw: bool,

    /// More logging on stderr (-v info, -vv debug).
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
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
    fn test_parse_flags() {
        let cli = Cli::try_parse_from([
            "planexec", "--plan", "-", "--file", "a.csv", "--file", "b.html", "--deadline", "5", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.plan.as_deref(), Some("-"));
        assert_eq!(cli.files.len(), 2);
        assert_eq!(cli.deadline, Some(5));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_question_sources_conflict() {
        assert!(Cli::try_parse_from(["planexec", "why?", "--questions", "q.txt"]).is_err());
    }
}
