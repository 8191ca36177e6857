//! Operator console on stdin

use anyhow::{Result, bail};
use overseer_supervisor::{SequenceReport, Supervisor};
use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::debug;

const HELP: &str = "\
commands:
  start-all        start every enabled unit in priority order
  stop-all         stop every unit in reverse priority order
  start <id>       start one unit
  stop <id>        stop one unit
  restart <id>     stop then start one unit
  rearm <id>       re-enable auto-restart for a unit
  status           print the status of all units
  help             show this help
  quit             shut down and exit";

/// One console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    StartAll,
    StopAll,
    Start(String),
    Stop(String),
    Restart(String),
    Rearm(String),
    Status,
    Help,
    Quit,
}

impl ConsoleCommand {
    /// Parse a console line; blank lines yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();
        if words.next().is_some() {
            bail!("too many arguments for '{}'", verb);
        }

        let unit = |arg: Option<&str>| match arg {
            Some(id) => Ok(id.to_string()),
            None => Err(anyhow::anyhow!("'{}' needs a unit id", verb)),
        };
        let bare = |command: Self| match arg {
            None => Ok(command),
            Some(_) => Err(anyhow::anyhow!("'{}' takes no arguments", verb)),
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "start-all" => bare(Self::StartAll)?,
            "stop-all" => bare(Self::StopAll)?,
            "start" => Self::Start(unit(arg)?),
            "stop" => Self::Stop(unit(arg)?),
            "restart" => Self::Restart(unit(arg)?),
            "rearm" => Self::Rearm(unit(arg)?),
            "status" => bare(Self::Status)?,
            "help" | "?" => bare(Self::Help)?,
            "quit" | "exit" => bare(Self::Quit)?,
            other => bail!("unknown command '{}', try 'help'", other),
        };
        Ok(Some(command))
    }
}

fn print_report(report: &SequenceReport) {
    for id in &report.started {
        println!("started  {}", id);
    }
    for id in &report.stopped {
        println!("stopped  {}", id);
    }
    for id in &report.failed {
        println!("failed   {}", id);
    }
    for id in &report.skipped {
        println!("skipped  {}", id);
    }
}

fn print_outcome(action: &str, id: &str, result: overseer_supervisor::Result<()>) {
    match result {
        Ok(()) => println!("{} {}: ok", action, id),
        Err(e) => println!("{} {}: {}", action, id, e),
    }
}

/// Execute one command. Returns `true` when the operator asked to quit.
pub async fn execute(supervisor: &Supervisor, command: ConsoleCommand) -> bool {
    match command {
        ConsoleCommand::StartAll => print_report(&supervisor.start_all().await),
        ConsoleCommand::StopAll => print_report(&supervisor.stop_all().await),
        ConsoleCommand::Start(id) => print_outcome("start", &id, supervisor.start(&id).await),
        ConsoleCommand::Stop(id) => print_outcome("stop", &id, supervisor.stop(&id).await),
        ConsoleCommand::Restart(id) => {
            print_outcome("restart", &id, supervisor.restart(&id).await)
        }
        ConsoleCommand::Rearm(id) => print_outcome("rearm", &id, supervisor.rearm(&id).await),
        ConsoleCommand::Status => print!("{}", supervisor.status()),
        ConsoleCommand::Help => println!("{}", HELP),
        ConsoleCommand::Quit => return true,
    }
    false
}

/// Stdin lines, read on a plain thread. A pending read must not hold up runtime shutdown.
fn read_stdin() -> Result<mpsc::UnboundedReceiver<String>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("overseer-console".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })?;
    Ok(rx)
}

/// Read commands from stdin until `quit`.
///
/// Returns `false` if stdin closes first.
pub async fn run(supervisor: &Supervisor) -> Result<bool> {
    let mut lines = read_stdin()?;
    println!("overseer console ready, type 'help' for commands");

    while let Some(line) = lines.recv().await {
        match ConsoleCommand::parse(&line) {
            Ok(Some(command)) => {
                if execute(supervisor, command).await {
                    return Ok(true);
                }
            }
            Ok(None) => {}
            Err(e) => println!("{}", e),
        }
    }

    debug!("console input closed");
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use overseer_core::config::SupervisorSettings;
    use overseer_supervisor::UnitSpec;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            ConsoleCommand::parse("start-all").unwrap(),
            Some(ConsoleCommand::StartAll)
        );
        assert_eq!(
            ConsoleCommand::parse("  restart   api ").unwrap(),
            Some(ConsoleCommand::Restart("api".to_string()))
        );
        assert_eq!(
            ConsoleCommand::parse("REARM worker").unwrap(),
            Some(ConsoleCommand::Rearm("worker".to_string()))
        );
        assert_eq!(ConsoleCommand::parse("exit").unwrap(), Some(ConsoleCommand::Quit));
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(ConsoleCommand::parse("restart").is_err());
        assert!(ConsoleCommand::parse("status now").is_err());
        assert!(ConsoleCommand::parse("stop a b").is_err());
        assert!(ConsoleCommand::parse("reboot").is_err());
    }

    #[tokio::test]
    async fn test_execute_against_supervisor() {
        let supervisor = Supervisor::new(SupervisorSettings::default());
        supervisor
            .register(UnitSpec::process("idle", "/nonexistent/overseer-console-test"))
            .unwrap();

        assert!(!execute(&supervisor, ConsoleCommand::Status).await);
        assert!(!execute(&supervisor, ConsoleCommand::Restart("ghost".to_string())).await);
        assert!(!execute(&supervisor, ConsoleCommand::Stop("idle".to_string())).await);
        assert!(execute(&supervisor, ConsoleCommand::Quit).await);
    }
}
