//! Text commands typed at the console prompt or read from a script.

use console_core::WorkflowCommand;
use shared::domain::{BoundingBox, CentreId, GraphDetail, StudentId};

use crate::config::ConsoleSettings;

pub const HELP: &str = "\
commands:
  capacity <n>                       enable centre selection with capacity n
  centre <lat> <lon>                 add a test centre
  build [low|medium|high] [cache|nocache]
                                     build the road graph for the configured view
  simulate <n>                       generate n students around the centres
  allot                              run the allotment
  path <student_id> [centre_id]      route to a centre (default: assigned centre)
  export                             save the backend diagnostics report
  bench                              run the parallel dijkstra benchmark
  clear                              reset the session
  status                             show session summary and legend
  show <student_id>                  show a student's assignment and travel times
  help                               this text
  quit                               leave the console";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Workflow(WorkflowCommand),
    Status,
    Show(StudentId),
    Help,
    Quit,
}

/// Turns console lines into commands. Graph builds take their view and
/// default options from the settings.
#[derive(Debug, Clone)]
pub struct CommandParser {
    view: BoundingBox,
    graph_detail: GraphDetail,
    use_cache: bool,
}

impl CommandParser {
    pub fn new(settings: &ConsoleSettings) -> Self {
        Self {
            view: settings.view,
            graph_detail: settings.graph_detail,
            use_cache: settings.use_cache,
        }
    }

    /// `Ok(None)` for blank lines and `#` comments.
    pub fn parse(&self, line: &str) -> Result<Option<ConsoleCommand>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = words.collect();

        let command = match verb.to_ascii_lowercase().as_str() {
            "capacity" => {
                let [n] = exact::<1>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::EnableSelection {
                    capacity: integer(n)?,
                })
            }
            "centre" | "center" => {
                let [lat, lon] = exact::<2>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::AddCentre {
                    lat: number(lat)?,
                    lon: number(lon)?,
                })
            }
            "build" => self.build(&args)?,
            "simulate" => {
                let [n] = exact::<1>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::Simulate { count: integer(n)? })
            }
            "allot" => {
                exact::<0>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::RunAllotment)
            }
            "path" => match args.as_slice() {
                [student] => ConsoleCommand::Workflow(WorkflowCommand::InspectPath {
                    student_id: StudentId::from(*student),
                    centre_id: None,
                }),
                [student, centre] => ConsoleCommand::Workflow(WorkflowCommand::InspectPath {
                    student_id: StudentId::from(*student),
                    centre_id: Some(CentreId::from(*centre)),
                }),
                _ => return Err("usage: path <student_id> [centre_id]".to_string()),
            },
            "export" => {
                exact::<0>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::ExportDiagnostics)
            }
            "bench" => {
                exact::<0>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::RunParallelBenchmark)
            }
            "clear" => {
                exact::<0>(verb, &args)?;
                ConsoleCommand::Workflow(WorkflowCommand::ClearAll)
            }
            "status" => ConsoleCommand::Status,
            "show" => {
                let [student] = exact::<1>(verb, &args)?;
                ConsoleCommand::Show(StudentId::from(student))
            }
            "help" | "?" => ConsoleCommand::Help,
            "quit" | "exit" => ConsoleCommand::Quit,
            other => return Err(format!("unknown command '{other}', try 'help'")),
        };
        Ok(Some(command))
    }

    fn build(&self, args: &[&str]) -> Result<ConsoleCommand, String> {
        let mut graph_detail = self.graph_detail;
        let mut use_cache = self.use_cache;
        for arg in args {
            match arg.to_ascii_lowercase().as_str() {
                "cache" => use_cache = true,
                "nocache" => use_cache = false,
                other => graph_detail = other.parse()?,
            }
        }
        Ok(ConsoleCommand::Workflow(WorkflowCommand::BuildGraph {
            bbox: self.view,
            graph_detail,
            use_cache,
        }))
    }
}

fn exact<'a, const N: usize>(verb: &str, args: &[&'a str]) -> Result<[&'a str; N], String> {
    <[&str; N]>::try_from(args)
        .map_err(|_| format!("'{verb}' takes {N} argument(s), got {}", args.len()))
}

fn integer(raw: &str) -> Result<i64, String> {
    raw.parse()
        .map_err(|_| format!("'{raw}' is not a whole number"))
}

fn number(raw: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{raw}' is not a number"))
}
