//! Final report printed when the process exits.

use std::error::Error as _;

use serde::Serialize;

use crate::{
    cli::OutputFormat,
    error::ClientError,
    relaxation::{ConvergenceLoop, Outcome},
};

const BANNER: &str = "========================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Converged,
    Terminated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub index: i32,
    pub rounds: u32,
    pub final_temperature: f32,
    pub outcome: OutcomeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
}

impl RunReport {
    /// Builds the report from the outcome; the loop's own state is only
    /// consulted for failures, which carry no payload.
    pub fn new(relaxation: &ConvergenceLoop, result: &Result<Outcome, ClientError>) -> Self {
        let (outcome, final_temperature, rounds, error) = match *result {
            Ok(Outcome::Converged { temperature, rounds }) => {
                (OutcomeKind::Converged, temperature, rounds, None)
            }
            Ok(Outcome::Terminated { temperature, rounds }) => {
                (OutcomeKind::Terminated, temperature, rounds, None)
            }
            Err(ref err) => (
                OutcomeKind::Failed,
                relaxation.current_temperature(),
                relaxation.rounds(),
                Some(ErrorReport {
                    kind: err.kind(),
                    message: error_chain(err),
                }),
            ),
        };

        Self {
            index: relaxation.index(),
            rounds,
            final_temperature,
            outcome,
            error,
        }
    }

    /// Only convergence counts as success.
    pub fn is_success(&self) -> bool {
        self.outcome == OutcomeKind::Converged
    }

    pub fn render(&self, format: OutputFormat) -> serde_json::Result<String> {
        match format {
            OutputFormat::Text => Ok(self.render_text()),
            OutputFormat::Json => serde_json::to_string(self),
        }
    }

    pub fn render_text(&self) -> String {
        match self.outcome {
            OutcomeKind::Converged => format!(
                "{BANNER}\nCONVERGENCE ACHIEVED!\nFinal temperature of External Process {}: {:.6}\n{BANNER}",
                self.index, self.final_temperature
            ),
            OutcomeKind::Terminated => format!(
                "coordinator terminated unexpectedly after {} rounds; External Process {} stopped at {:.6}",
                self.rounds, self.index, self.final_temperature
            ),
            OutcomeKind::Failed => {
                let message = self
                    .error
                    .as_ref()
                    .map_or("unknown failure", |error| error.message.as_str());
                format!("error: {message}")
            }
        }
    }
}

fn error_chain(err: &ClientError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
