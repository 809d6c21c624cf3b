use crate::{error::CliError, output};
use cursor_client::Cursor;
use std::{fmt, str::FromStr};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Next,
    Previous,
    First,
    Last,
    Absolute(i64),
    Relative(i64),
    BeforeFirst,
    AfterLast,
}

impl FromStr for Step {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CliError::InvalidStep(s.trim().to_string());
        let mut parts = s.split_whitespace();
        let verb = parts.next().ok_or_else(invalid)?.to_ascii_lowercase();
        let mut arg = || -> Result<i64, CliError> {
            parts
                .next()
                .and_then(|n| n.parse::<i64>().ok())
                .ok_or_else(invalid)
        };

        match verb.as_str() {
            "next" => Ok(Step::Next),
            "prev" | "previous" => Ok(Step::Previous),
            "first" => Ok(Step::First),
            "last" => Ok(Step::Last),
            "abs" | "absolute" => Ok(Step::Absolute(arg()?)),
            "rel" | "relative" => Ok(Step::Relative(arg()?)),
            "before" => Ok(Step::BeforeFirst),
            "after" => Ok(Step::AfterLast),
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Next => write!(f, "next"),
            Step::Previous => write!(f, "prev"),
            Step::First => write!(f, "first"),
            Step::Last => write!(f, "last"),
            Step::Absolute(n) => write!(f, "abs {n}"),
            Step::Relative(n) => write!(f, "rel {n}"),
            Step::BeforeFirst => write!(f, "before"),
            Step::AfterLast => write!(f, "after"),
        }
    }
}

pub fn parse(script: &str) -> Result<Vec<Step>, CliError> {
    script
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Applies each step and prints one JSON line per step. Cursor errors are
/// reported in the line and do not stop the script.
pub async fn run(
    cursor: &mut Cursor,
    steps: &[Step],
    cancel: &CancellationToken,
) -> Result<(), CliError> {
    for step in steps {
        if cancel.is_cancelled() {
            return Err(CliError::ShutdownRequested);
        }
        let outcome = match step {
            Step::Next => cursor.next().await,
            Step::Previous => cursor.previous().await,
            Step::First => cursor.first().await,
            Step::Last => cursor.last().await,
            Step::Absolute(n) => cursor.absolute(*n).await,
            Step::Relative(n) => cursor.relative(*n).await,
            Step::BeforeFirst => cursor.before_first().map(|_| false),
            Step::AfterLast => cursor.after_last().map(|_| false),
        };
        output::print_step(&step.to_string(), cursor, outcome)?;
    }
    Ok(())
}
