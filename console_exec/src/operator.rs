//! # Operator interface
//!
//! Line-based console for the human operator. A dedicated thread runs the
//! readline loop and forwards parsed commands over a channel, so the cyclic
//! control loop never blocks on the terminal.
//!
//! The thread is a pure producer of [`OperatorCmd`] values; all state lives
//! with the consumer in the main loop.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use structopt::StructOpt;

// Internal
use comms_if::cmd::SpeedScale;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const PROMPT: &str = "console $ ";
const HISTORY_PATH: &str = "history.txt";

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command issued by the operator at the console.
#[derive(Debug, Clone, PartialEq, StructOpt)]
#[structopt(name = "console")]
pub enum OperatorCmd {
    /// Connect to the vehicle, optionally overriding the configured endpoint
    #[structopt(name = "conn")]
    Conn { endpoint: Option<String> },

    /// Disconnect from the vehicle
    #[structopt(name = "disc")]
    Disc,

    /// Select the speed scale (low, medium or high)
    #[structopt(name = "scale")]
    Scale { scale: SpeedScale },

    /// Move the joystick to the given pointer position
    #[structopt(name = "stick")]
    Stick { x: f64, y: f64 },

    /// Release the joystick, recentring it
    #[structopt(name = "release")]
    Release,

    /// Move the throttle to the given vertical pointer position
    #[structopt(name = "throttle")]
    Throttle { y: f64 },

    /// Release the throttle, dropping it to zero
    #[structopt(name = "throttle-release")]
    ThrottleRelease,

    /// Control trajectory recording
    #[structopt(name = "rec")]
    Rec(RecCmd),

    /// List the stored trajectories
    #[structopt(name = "list")]
    List,

    /// Replay a stored trajectory
    #[structopt(name = "replay")]
    Replay {
        id: u64,

        /// Use the configured fixed inter-point interval instead of the
        /// recorded timing
        #[structopt(long)]
        fixed: bool,

        /// Override the fixed interval in milliseconds, implies --fixed
        #[structopt(long = "fixed-ms")]
        fixed_ms: Option<u64>,
    },

    /// Exit the console
    #[structopt(name = "quit")]
    Quit,
}

/// Recording subcommands.
#[derive(Debug, Clone, PartialEq, StructOpt)]
pub enum RecCmd {
    /// Start recording under the given name
    #[structopt(name = "start")]
    Start { name: String },

    /// Stop the active recording
    #[structopt(name = "stop")]
    Stop,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Parse one console line into an operator command.
pub fn parse_line(line: &str) -> Result<OperatorCmd, structopt::clap::Error> {
    // from_iter expects argv, so prepend a binary name
    OperatorCmd::from_iter_safe(std::iter::once("console").chain(line.split_whitespace()))
}

/// Spawn the readline thread.
///
/// Parsed commands are forwarded over `cmd_tx`. The thread exits after
/// forwarding [`OperatorCmd::Quit`], which it also produces on Ctrl-C and
/// Ctrl-D.
pub fn spawn_repl(cmd_tx: Sender<OperatorCmd>) -> JoinHandle<()> {
    thread::spawn(move || repl(cmd_tx))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn repl(cmd_tx: Sender<OperatorCmd>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            println!("Could not start the console: {}", e);
            let _ = cmd_tx.send(OperatorCmd::Quit);
            return;
        }
    };

    let _ = rl.load_history(HISTORY_PATH);

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match parse_line(line) {
                    Ok(cmd) => {
                        let quit = cmd == OperatorCmd::Quit;
                        if cmd_tx.send(cmd).is_err() || quit {
                            break;
                        }
                    }
                    // clap's error text doubles as the help/usage output
                    Err(e) => println!("{}", e.message),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                let _ = cmd_tx.send(OperatorCmd::Quit);
                break;
            }
            Err(e) => {
                println!("Console error: {:?}", e);
                let _ = cmd_tx.send(OperatorCmd::Quit);
                break;
            }
        }
    }

    let _ = rl.save_history(HISTORY_PATH);
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_connection_commands() {
        assert_eq!(
            parse_line("conn").unwrap(),
            OperatorCmd::Conn { endpoint: None }
        );
        assert_eq!(
            parse_line("conn tcp://192.168.0.10:5000").unwrap(),
            OperatorCmd::Conn {
                endpoint: Some("tcp://192.168.0.10:5000".into())
            }
        );
        assert_eq!(parse_line("disc").unwrap(), OperatorCmd::Disc);
    }

    #[test]
    fn test_parse_input_commands() {
        assert_eq!(
            parse_line("scale med").unwrap(),
            OperatorCmd::Scale {
                scale: SpeedScale::Medium
            }
        );
        assert_eq!(
            parse_line("stick 120.5 80").unwrap(),
            OperatorCmd::Stick { x: 120.5, y: 80.0 }
        );
        assert_eq!(parse_line("release").unwrap(), OperatorCmd::Release);
        assert_eq!(
            parse_line("throttle 42").unwrap(),
            OperatorCmd::Throttle { y: 42.0 }
        );
        assert_eq!(
            parse_line("throttle-release").unwrap(),
            OperatorCmd::ThrottleRelease
        );
    }

    #[test]
    fn test_parse_recording_commands() {
        assert_eq!(
            parse_line("rec start lap1").unwrap(),
            OperatorCmd::Rec(RecCmd::Start {
                name: "lap1".into()
            })
        );
        assert_eq!(parse_line("rec stop").unwrap(), OperatorCmd::Rec(RecCmd::Stop));
        assert_eq!(parse_line("list").unwrap(), OperatorCmd::List);
    }

    #[test]
    fn test_parse_replay_commands() {
        assert_eq!(
            parse_line("replay 7").unwrap(),
            OperatorCmd::Replay {
                id: 7,
                fixed: false,
                fixed_ms: None
            }
        );
        assert_eq!(
            parse_line("replay 7 --fixed").unwrap(),
            OperatorCmd::Replay {
                id: 7,
                fixed: true,
                fixed_ms: None
            }
        );
        assert_eq!(
            parse_line("replay 7 --fixed-ms 80").unwrap(),
            OperatorCmd::Replay {
                id: 7,
                fixed: false,
                fixed_ms: Some(80)
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("flarp").is_err());
        assert!(parse_line("scale warp").is_err());
        assert!(parse_line("stick one two").is_err());
        assert!(parse_line("replay").is_err());
    }
}
