//! The line-oriented planning session.
//!
//! One command per line. Positions are the 1-based numbers shown in the `#`
//! column; they never shift while the session runs, whatever the sort order
//! of the table.
//!
//! ```text
//! r N          mark validator N for removal
//! u N          undo a removal
//! s N AMOUNT   set the target of N
//! + N AMOUNT   raise the target of N
//! - N AMOUNT   lower the target of N
//! n ADDR [NAME]
//!              propose a new validator
//! b            rebalance freed stake across kept validators
//! v            check feasibility
//! e            export the plan (ends the session when feasible)
//! l            show the table
//! h            help
//! q            quit without exporting
//! ```

use std::io::{self, BufRead, Write};

use chrono::Utc;
use colored::Colorize;
use stakeplan_allocation::{
    rebalance, validate, Allocation, AllocationError, FeasibilityPolicy, Plan, PlanError,
};
use stakeplan_id::{PoolAddress, VoteAccount};
use thiserror::Error;
use tracing::{debug, info};

use crate::output::render_allocation;

const HELP: &str = "\
Commands (N is the number in the # column):
  r N            mark validator N for removal
  u N            undo removal of validator N
  s N AMOUNT     set the target of validator N
  + N AMOUNT     add AMOUNT to the target of validator N
  - N AMOUNT     subtract AMOUNT from the target of validator N
  n ADDR [NAME]  propose a new validator
  b              rebalance freed stake across kept validators
  v              validate the plan
  e              export the plan and finish
  l              show the table
  h              show this help
  q              quit without exporting";

/// A parsed session command. Indices are 0-based storage positions.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Remove(usize),
    Undo(usize),
    Set { index: usize, amount: f64 },
    Add { index: usize, amount: f64 },
    Subtract { index: usize, amount: f64 },
    New {
        identity: VoteAccount,
        name: Option<String>,
    },
    Rebalance,
    Validate,
    Export,
    List,
    Help,
    Quit,
}

/// A line that is not a valid command.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("unknown command '{0}' (h for help)")]
    UnknownCommand(String),

    #[error("{command} needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{0} takes no further arguments")]
    UnexpectedArgument(&'static str),

    #[error("'{0}' is not a validator number (numbers start at 1)")]
    InvalidIndex(String),

    #[error("'{0}' is not a valid amount (expected a non-negative number)")]
    InvalidAmount(String),

    #[error("invalid vote account: {0}")]
    InvalidAddress(String),
}

impl SessionCommand {
    /// Parse one input line. Blank lines and `#` comments yield `None`.
    pub fn parse_line(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut args = line.split_whitespace();
        let Some(keyword) = args.next() else {
            return Ok(None);
        };

        let command = match keyword.to_ascii_lowercase().as_str() {
            "r" | "remove" => Self::Remove(index_arg(&mut args, "remove")?),
            "u" | "undo" => Self::Undo(index_arg(&mut args, "undo")?),
            "s" | "set" => {
                let index = index_arg(&mut args, "set")?;
                Self::Set {
                    index,
                    amount: amount_arg(&mut args, "set")?,
                }
            }
            "+" | "add" => {
                let index = index_arg(&mut args, "add")?;
                Self::Add {
                    index,
                    amount: amount_arg(&mut args, "add")?,
                }
            }
            "-" | "sub" | "subtract" => {
                let index = index_arg(&mut args, "subtract")?;
                Self::Subtract {
                    index,
                    amount: amount_arg(&mut args, "subtract")?,
                }
            }
            "n" | "new" => {
                let raw = args.next().ok_or(ParseError::MissingArgument {
                    command: "new",
                    argument: "a vote account",
                })?;
                let identity = raw
                    .parse::<VoteAccount>()
                    .map_err(|e| ParseError::InvalidAddress(e.to_string()))?;
                let name = args.collect::<Vec<_>>().join(" ");
                return Ok(Some(Self::New {
                    identity,
                    name: (!name.is_empty()).then_some(name),
                }));
            }
            "b" | "rebalance" => Self::Rebalance,
            "v" | "validate" => Self::Validate,
            "e" | "export" | "save" => Self::Export,
            "l" | "ls" | "list" => Self::List,
            "h" | "?" | "help" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => return Err(ParseError::UnknownCommand(other.to_string())),
        };

        if args.next().is_some() {
            return Err(ParseError::UnexpectedArgument(command.name()));
        }
        Ok(Some(command))
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Remove(_) => "remove",
            Self::Undo(_) => "undo",
            Self::Set { .. } => "set",
            Self::Add { .. } => "add",
            Self::Subtract { .. } => "subtract",
            Self::New { .. } => "new",
            Self::Rebalance => "rebalance",
            Self::Validate => "validate",
            Self::Export => "export",
            Self::List => "list",
            Self::Help => "help",
            Self::Quit => "quit",
        }
    }
}

fn index_arg<'a>(
    args: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
) -> Result<usize, ParseError> {
    let raw = args.next().ok_or(ParseError::MissingArgument {
        command,
        argument: "a validator number",
    })?;
    match raw.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(ParseError::InvalidIndex(raw.to_string())),
    }
}

fn amount_arg<'a>(
    args: &mut impl Iterator<Item = &'a str>,
    command: &'static str,
) -> Result<f64, ParseError> {
    let raw = args.next().ok_or(ParseError::MissingArgument {
        command,
        argument: "an amount",
    })?;
    match raw.parse::<f64>() {
        Ok(amount) if amount.is_finite() && amount >= 0.0 => Ok(amount),
        _ => Err(ParseError::InvalidAmount(raw.to_string())),
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    /// A feasible plan was produced.
    Exported(Box<Plan>),
    /// The operator quit.
    Quit,
    /// Input ran out before an export or quit.
    EndOfInput,
}

enum Step {
    Continue,
    Finish(SessionOutcome),
}

/// Drives an [`Allocation`] from a stream of command lines.
pub struct Session<W: Write> {
    allocation: Allocation,
    policy: FeasibilityPolicy,
    pool: Option<PoolAddress>,
    out: W,
    interactive: bool,
}

impl<W: Write> Session<W> {
    pub fn new(allocation: Allocation, policy: FeasibilityPolicy, out: W) -> Self {
        Self {
            allocation,
            policy,
            pool: None,
            out,
            interactive: false,
        }
    }

    /// Pool recorded on exported plans.
    #[must_use]
    pub fn with_pool(mut self, pool: Option<PoolAddress>) -> Self {
        self.pool = pool;
        self
    }

    /// Show a prompt before each line instead of echoing the input.
    #[must_use]
    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn allocation(&self) -> &Allocation {
        &self.allocation
    }

    /// Read commands until export, quit or end of input.
    pub fn run<R: BufRead>(&mut self, input: R) -> io::Result<SessionOutcome> {
        writeln!(self.out, "{}", render_allocation(&self.allocation))?;
        writeln!(self.out, "{}", "Type h for help.".dimmed())?;

        let mut lines = input.lines();
        loop {
            if self.interactive {
                write!(self.out, "{} ", ">".cyan().bold())?;
                self.out.flush()?;
            }

            let Some(line) = lines.next() else {
                return Ok(SessionOutcome::EndOfInput);
            };
            let line = line?;
            if !self.interactive && !line.trim().is_empty() {
                writeln!(self.out, "> {}", line.trim())?;
            }

            let command = match SessionCommand::parse_line(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    self.report_error(&e.to_string())?;
                    continue;
                }
            };

            debug!(command = command.name(), "session command");
            if let Step::Finish(outcome) = self.execute(command)? {
                return Ok(outcome);
            }
        }
    }

    fn execute(&mut self, command: SessionCommand) -> io::Result<Step> {
        match command {
            SessionCommand::Remove(index) => {
                let result = self.allocation.mark_removed(index);
                self.after_edit(index, result, "marked for removal")
            }
            SessionCommand::Undo(index) => {
                let result = self.allocation.undo_removed(index);
                self.after_edit(index, result, "restored")
            }
            SessionCommand::Set { index, amount } => {
                let result = self.allocation.set_target(index, amount);
                self.after_edit(index, result, "target set")
            }
            SessionCommand::Add { index, amount } => {
                let result = self.allocation.add_to_target(index, amount);
                self.after_edit(index, result, "target raised")
            }
            SessionCommand::Subtract { index, amount } => {
                let result = self.allocation.subtract_from_target(index, amount);
                self.after_edit(index, result, "target lowered")
            }
            SessionCommand::New { identity, name } => {
                match self.allocation.add_validator(identity, name) {
                    Ok(index) => self.after_edit(index, Ok(()), "proposed"),
                    Err(e) => {
                        let message = self.describe(&e);
                        self.report_error(&message)?;
                        Ok(Step::Continue)
                    }
                }
            }
            SessionCommand::Rebalance => {
                let outcome = rebalance(&mut self.allocation);
                info!(%outcome, "rebalance");
                writeln!(self.out, "{}", outcome)?;
                if outcome.is_applied() {
                    writeln!(self.out, "{}", render_allocation(&self.allocation))?;
                }
                Ok(Step::Continue)
            }
            SessionCommand::Validate => {
                let report = validate(&self.allocation, &self.policy);
                if report.is_feasible() {
                    writeln!(self.out, "{} {}", "OK".green().bold(), report)?;
                } else {
                    writeln!(self.out, "{}", "Plan is not feasible:".red().bold())?;
                    writeln!(self.out, "{}", report)?;
                }
                Ok(Step::Continue)
            }
            SessionCommand::Export => match Plan::build(&self.allocation, &self.policy, Utc::now())
            {
                Ok(plan) => {
                    let plan = match &self.pool {
                        Some(pool) => plan.with_pool(pool.clone()),
                        None => plan,
                    };
                    info!(plan_id = %plan.plan_id, changes = !plan.is_empty(), "plan exported");
                    Ok(Step::Finish(SessionOutcome::Exported(Box::new(plan))))
                }
                Err(PlanError::Infeasible(report)) => {
                    writeln!(
                        self.out,
                        "{}",
                        "Plan is not feasible; nothing exported:".red().bold()
                    )?;
                    writeln!(self.out, "{}", report)?;
                    Ok(Step::Continue)
                }
            },
            SessionCommand::List => {
                writeln!(self.out, "{}", render_allocation(&self.allocation))?;
                Ok(Step::Continue)
            }
            SessionCommand::Help => {
                writeln!(self.out, "{}", HELP)?;
                Ok(Step::Continue)
            }
            SessionCommand::Quit => Ok(Step::Finish(SessionOutcome::Quit)),
        }
    }

    fn after_edit(
        &mut self,
        index: usize,
        result: Result<(), AllocationError>,
        what: &str,
    ) -> io::Result<Step> {
        match result {
            Ok(()) => {
                let label = self
                    .allocation
                    .get(index)
                    .map(|r| r.label())
                    .unwrap_or_default();
                writeln!(self.out, "{} {}: {}", "ok".green(), label, what)?;
                writeln!(self.out, "{}", render_allocation(&self.allocation))?;
            }
            Err(e) => {
                let message = self.describe(&e);
                self.report_error(&message)?;
            }
        }
        Ok(Step::Continue)
    }

    /// Error text in the operator's 1-based numbering.
    fn describe(&self, err: &AllocationError) -> String {
        match err {
            AllocationError::InvalidIndex { index, len } => {
                format!("no validator number {} (1-{})", index + 1, len)
            }
            other => other.to_string(),
        }
    }

    fn report_error(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "{} {}", "error:".red().bold(), message)
    }
}
