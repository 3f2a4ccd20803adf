//! The convergence exchange run by one external process.
//!
//! [`ConvergenceLoop`] holds the state machine
//!
//! ```text
//! Init -> Connected -> AwaitingReply -> Updating -> AwaitingReply ...
//!                                    \-> Converged | Terminated | Failed
//! ```
//!
//! The transition methods do no I/O. [`ConvergenceLoop::run`] drives them over
//! a [`Connection`], awaiting one send or receive at a time. There is no
//! timeout on the receive: a coordinator that never answers stalls the loop
//! until the process is killed.

use std::net::SocketAddr;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::{
    codec::{Codec, Message},
    connection::{Connection, Received},
    error::{Result, SendStage},
};

const OWN_WEIGHT: f64 = 3.0;
const CENTRAL_WEIGHT: f64 = 2.0;
const TOTAL_WEIGHT: f64 = 5.0;

/// One relaxation step: `(3 * current + 2 * central) / 5`.
///
/// Evaluated in double precision in exactly this order and narrowed back to
/// `f32`, so results match coordinators that compute the same expression.
pub fn relax(current: f32, central: f32) -> f32 {
    let weighted = OWN_WEIGHT * f64::from(current) + CENTRAL_WEIGHT * f64::from(central);
    (weighted / TOTAL_WEIGHT) as f32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Connected,
    AwaitingReply,
    Updating,
    Converged,
    Terminated,
    Failed,
}

/// How an exchange ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// The coordinator sent the sentinel index.
    Converged { temperature: f32, rounds: u32 },
    /// The coordinator closed the stream without sending the sentinel.
    Terminated { temperature: f32, rounds: u32 },
}

/// What the driver must do after a receive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Send(Message),
    Finished(Outcome),
}

#[derive(Debug, Clone)]
pub struct ConvergenceLoop {
    index: i32,
    current_temperature: f32,
    rounds: u32,
    phase: Phase,
}

impl ConvergenceLoop {
    pub fn new(index: i32, initial_temperature: f32) -> Self {
        Self {
            index,
            current_temperature: initial_temperature,
            rounds: 0,
            phase: Phase::Init,
        }
    }

    pub fn index(&self) -> i32 {
        self.index
    }

    pub fn current_temperature(&self) -> f32 {
        self.current_temperature
    }

    /// Completed update rounds so far.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// `Init -> Connected`. Returns the initial report to send.
    pub fn connected(&mut self) -> Message {
        self.phase = Phase::Connected;
        self.report()
    }

    /// `Connected | Updating -> AwaitingReply`.
    pub fn await_reply(&mut self) {
        self.phase = Phase::AwaitingReply;
    }

    /// Applies one receive event.
    pub fn on_received(&mut self, received: Received) -> Step {
        let message = match received {
            Received::Closed => {
                self.phase = Phase::Terminated;
                warn!(
                    index = self.index,
                    rounds = self.rounds,
                    "coordinator terminated unexpectedly"
                );
                return Step::Finished(Outcome::Terminated {
                    temperature: self.current_temperature,
                    rounds: self.rounds,
                });
            }
            Received::Message(message) => message,
        };

        if message.is_sentinel() {
            self.phase = Phase::Converged;
            info!(
                index = self.index,
                rounds = self.rounds,
                temperature = self.current_temperature,
                "convergence achieved"
            );
            return Step::Finished(Outcome::Converged {
                temperature: self.current_temperature,
                rounds: self.rounds,
            });
        }

        self.phase = Phase::Updating;
        self.rounds += 1;
        let central = message.temperature;
        self.current_temperature = relax(self.current_temperature, central);
        info!(
            round = self.rounds,
            central,
            temperature = self.current_temperature,
            "updated temperature"
        );

        Step::Send(self.report())
    }

    /// Any state `-> Failed`.
    pub fn fail(&mut self) {
        self.phase = Phase::Failed;
    }

    fn report(&self) -> Message {
        Message::new(self.index, self.current_temperature)
    }

    /// Connects to `server` and runs the exchange to a terminal phase.
    pub async fn connect_and_run(&mut self, server: SocketAddr, codec: Codec) -> Result<Outcome> {
        let connection = match Connection::connect(server, codec).await {
            Ok(connection) => connection,
            Err(err) => {
                self.fail();
                return Err(err);
            }
        };
        self.run(connection).await
    }

    /// Runs the exchange over an established connection, which is consumed
    /// and released whatever the result.
    pub async fn run<S>(&mut self, mut connection: Connection<S>) -> Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match self.exchange(&mut connection).await {
            Ok(outcome) => {
                connection.close().await;
                Ok(outcome)
            }
            Err(err) => {
                self.fail();
                Err(err)
            }
        }
    }

    async fn exchange<S>(&mut self, connection: &mut Connection<S>) -> Result<Outcome>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let initial = self.connected();
        connection.send_message(&initial, SendStage::Initial).await?;
        info!(
            index = self.index,
            temperature = self.current_temperature,
            "sent initial temperature"
        );

        loop {
            self.await_reply();
            let received = connection.receive_message().await?;
            match self.on_received(received) {
                Step::Send(message) => {
                    connection.send_message(&message, SendStage::Update).await?
                }
                Step::Finished(outcome) => return Ok(outcome),
            }
        }
    }
}
