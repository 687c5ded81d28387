use std::cell::{Cell, RefCell};
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::thread;

use super::session::{BatchHandler, Handler, Session};
use super::API_VERSION;
use crate::config::{Config, NetworkLevel};
use crate::error::{Result, SolverError};
use crate::model::{Requirements, Selections};
use crate::solver::{CancellationToken, Solver};

/// Delegates solving to a separate solver program over the framed
/// stdio protocol.
///
/// The program is taken from the `external-solver` configuration value and
/// started once per [`Solver::solve`] call with `slave <api-version>`.
pub struct ExternalSolver<'a> {
    program: Vec<String>,
    network_use: NetworkLevel,
    verbosity: u8,
    refresh: bool,
    cancellation: CancellationToken,
    handler: RefCell<Box<dyn Handler + 'a>>,
    stale: Cell<bool>,
}

impl<'a> ExternalSolver<'a> {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.external_solver.clone(),
            network_use: config.network_use,
            verbosity: 0,
            refresh: false,
            cancellation: CancellationToken::new(),
            handler: RefCell::new(Box::new(BatchHandler)),
            stale: Cell::new(false),
        }
    }

    pub fn with_program(mut self, program: Vec<String>) -> Self {
        self.program = program;
        self
    }

    /// Number of `-v` flags passed to the program
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Ask the program to re-download feeds before solving
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn with_handler(mut self, handler: Box<dyn Handler + 'a>) -> Self {
        self.handler = RefCell::new(handler);
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Whether the last reply said some feeds were out of date
    pub fn is_stale(&self) -> bool {
        self.stale.get()
    }

    /// Arguments passed after the program name
    pub fn arguments(&self) -> Result<Vec<String>> {
        let Some((_, leading)) = self.program.split_first() else {
            return Err(SolverError::Config("No external solver configured".to_string()));
        };

        let mut args = leading.to_vec();
        args.push("slave".to_string());
        args.push(API_VERSION.to_string());
        args.extend(std::iter::repeat("-v".to_string()).take(self.verbosity as usize));
        if self.network_use == NetworkLevel::Offline {
            args.push("--offline".to_string());
        }
        if self.refresh {
            args.push("--refresh".to_string());
        }
        Ok(args)
    }

    fn spawn(&self) -> Result<Child> {
        let args = self.arguments()?;
        let program = &self.program[0];
        log::debug!("Starting external solver: {} {}", program, args.join(" "));

        Command::new(program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                SolverError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to start external solver {}: {}", program, e),
                ))
            })
    }

    fn run(&self, child: &mut Child, requirements: &Requirements) -> Result<Selections> {
        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            return Err(SolverError::Config("External solver has no stdio pipes".to_string()));
        };

        let mut session = Session::new(BufReader::new(stdout), stdin, self.cancellation.clone());
        session.handshake()?;

        let mut handler = self.handler.borrow_mut();
        let reply = session.select(requirements, self.refresh, handler.as_mut())?;
        self.stale.set(reply.stale);
        Ok(reply.selections)
    }
}

impl Solver for ExternalSolver<'_> {
    fn solve(&self, requirements: &Requirements) -> Result<Selections> {
        let mut child = self.spawn()?;

        let stderr_logger = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(std::io::Result::ok) {
                    log::info!("external solver: {}", line);
                }
            })
        });

        let result = self.run(&mut child, requirements);
        if result.is_err() {
            let _ = child.kill();
        }

        match child.wait() {
            Ok(status) if !status.success() && result.is_ok() => {
                log::warn!("External solver exited with {}", status);
            }
            Err(e) => log::warn!("Failed to wait for external solver: {}", e),
            _ => {}
        }
        if let Some(handle) = stderr_logger {
            let _ = handle.join();
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver(config: &Config) -> ExternalSolver<'static> {
        ExternalSolver::new(config).with_program(vec!["zinject".to_string(), "--quiet".to_string()])
    }

    #[test]
    fn test_arguments() {
        let config = Config::default();
        let args = solver(&config).arguments().unwrap();
        assert_eq!(args, vec!["--quiet", "slave", API_VERSION]);
    }

    #[test]
    fn test_arguments_with_flags() {
        let mut config = Config::default();
        config.set_network_use(NetworkLevel::Offline);
        let args = solver(&config).with_verbosity(2).with_refresh(true).arguments().unwrap();
        assert_eq!(args, vec!["--quiet", "slave", API_VERSION, "-v", "-v", "--offline", "--refresh"]);
    }

    #[test]
    fn test_no_program_configured() {
        let config = Config::default();
        let solver = ExternalSolver::new(&config);
        assert!(matches!(solver.arguments(), Err(SolverError::Config(_))));

        let requirements = Requirements::new(crate::model::FeedUri::parse("http://test/app.xml").unwrap());
        assert!(matches!(solver.solve(&requirements), Err(SolverError::Config(_))));
    }

    #[test]
    fn test_missing_program() {
        let config = Config::default();
        let solver = ExternalSolver::new(&config).with_program(vec!["/nonexistent/zinject-solver".to_string()]);
        let requirements = Requirements::new(crate::model::FeedUri::parse("http://test/app.xml").unwrap());
        let err = solver.solve(&requirements).unwrap_err();
        assert!(err.is_network_error());
        assert!(err.to_string().contains("/nonexistent/zinject-solver"));
    }
}
