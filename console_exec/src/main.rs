//! Main console executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise all modules
//!     - Main loop:
//!         - Operator command processing
//!         - Vehicle channel polling (state changes and inbound messages)
//!         - Live command pipeline (derive, throttle, transmit, capture)
//!         - Replay stepping
//!
//! The loop ticks at the minimum send interval, so a held input is always
//! picked up within one tick. Everything which could block lives on its own
//! thread: the operator readline loop, the storage capture worker and the
//! socket monitor all feed the loop through channels or atomics.

// ---------------------------------------------------------------------------
// USE MODULES FROM LIBRARY
// ---------------------------------------------------------------------------

use console_lib::{
    data_store::DataStore,
    input::{idle_stick, normalise_stick, normalise_throttle, PointerSample, StickGeometry, ThrottleGeometry},
    operator::{spawn_repl, OperatorCmd, RecCmd},
    params::ConsoleExecParams,
    recorder::Recorder,
    replayer::{ReplayStep, ReplayTiming, Replayer},
    storage_client::{HttpTrajectoryStore, TrajectoryStore},
    throttler::Throttler,
    vehicle_client::{ConnectionEvent, VehicleClient},
};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::{error, info, warn};
use std::sync::mpsc::{channel, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use comms_if::{cmd::Command, net::zmq};
use util::{
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("console_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Vehicle Console Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let params: ConsoleExecParams =
        util::params::load("console_exec.toml").wrap_err("Could not load console exec params")?;

    info!("Exec parameters loaded");

    let stick_geom = StickGeometry {
        centre_x: params.stick_centre_x,
        centre_y: params.stick_centre_y,
        radius: params.stick_radius,
    };
    let throttle_geom = ThrottleGeometry {
        top: params.throttle_top,
        height: params.throttle_height,
    };

    let cycle_period = Duration::from_millis(params.min_send_interval_ms);

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut ds = DataStore::default();

    let store = Arc::new(
        HttpTrajectoryStore::new(&params.storage_url)
            .wrap_err("Failed to initialise the trajectory store client")?,
    );

    let mut recorder = Recorder::new(
        store.clone() as Arc<dyn TrajectoryStore>,
        Duration::from_millis(params.min_capture_interval_ms),
    );

    let mut throttler = Throttler::new(cycle_period);

    let mut replayer: Option<Replayer> = None;

    info!("Module initialisation complete\n");

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = zmq::Context::new();

    let mut vehicle = VehicleClient::new();

    info!("Network initialisation complete");

    // ---- START OPERATOR INTERFACE ----

    let (cmd_tx, cmd_rx) = channel();

    // Not joined on shutdown, the thread sits in readline until the process
    // exits
    let _repl = spawn_repl(cmd_tx);

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    'main: loop {
        // Get cycle start time
        let cycle_start_instant = Instant::now();

        // ---- OPERATOR COMMAND PROCESSING ----

        loop {
            let cmd = match cmd_rx.try_recv() {
                Ok(c) => c,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Operator interface is gone, stopping");
                    break 'main;
                }
            };

            match cmd {
                OperatorCmd::Conn { endpoint } => {
                    let endpoint = endpoint.as_deref().unwrap_or(&params.vehicle_endpoint);
                    if let Err(e) = vehicle.connect(&zmq_ctx, endpoint) {
                        error!("Could not connect: {}", e);
                    }
                }
                OperatorCmd::Disc => vehicle.disconnect(),
                OperatorCmd::Scale { scale } => {
                    info!("Speed scale set to {:?}", scale);
                    ds.speed_scale = Some(scale);
                }
                OperatorCmd::Stick { x, y } => {
                    ds.stick = Some(normalise_stick(&stick_geom, &PointerSample { x, y }));
                }
                OperatorCmd::Release => ds.stick = Some(idle_stick()),
                OperatorCmd::Throttle { y } => {
                    ds.throttle_raw = Some(normalise_throttle(&throttle_geom, y));
                }
                OperatorCmd::ThrottleRelease => ds.throttle_raw = Some(0),
                OperatorCmd::Rec(RecCmd::Start { name }) => match recorder.arm(&name) {
                    Ok(id) => info!("Recording trajectory {}", id),
                    Err(e) => error!("Could not start recording: {}", e),
                },
                OperatorCmd::Rec(RecCmd::Stop) => {
                    if let Err(e) = recorder.disarm() {
                        error!("Could not stop recording: {}", e);
                    }
                }
                OperatorCmd::List => match store.list() {
                    Ok(items) => {
                        info!("{} stored trajectories:", items.len());
                        for item in items {
                            info!("  {}: {}", item.id, item.name);
                        }
                    }
                    Err(e) => error!("Could not list trajectories: {}", e),
                },
                OperatorCmd::Replay { id, fixed, fixed_ms } => {
                    if replayer.is_some() {
                        warn!("A replay is already in progress");
                        continue;
                    }

                    let timing = match (fixed, fixed_ms) {
                        (_, Some(ms)) => ReplayTiming::FixedInterval(Duration::from_millis(ms)),
                        (true, None) => ReplayTiming::FixedInterval(Duration::from_millis(
                            params.replay_fixed_interval_ms,
                        )),
                        (false, None) => ReplayTiming::RespectRecorded,
                    };

                    match Replayer::fetch(store.as_ref(), id, timing) {
                        Ok(r) => replayer = Some(r),
                        Err(e) => error!("Could not start replay: {}", e),
                    }
                }
                OperatorCmd::Quit => {
                    info!("Operator requested stop");
                    break 'main;
                }
            }
        }

        // ---- VEHICLE CHANNEL POLLING ----

        match vehicle.poll() {
            // A fresh channel gets the full current state even if it matches
            // what went out before the drop
            ConnectionEvent::Opened => throttler.reset(),
            ConnectionEvent::Lost => (),
            ConnectionEvent::None => (),
        }

        vehicle.poll_inbound();

        // ---- LIVE COMMAND PIPELINE ----

        // Live input is paused while a replay holds the channel
        if replayer.is_none() && vehicle.is_open() {
            if let Some(cmd) = throttler.offer(ds.current_command(), cycle_start_instant) {
                if vehicle.send_if_open(&cmd) {
                    // Only commands which actually went out are captured
                    recorder.capture(&cmd, cycle_start_instant);
                }
            }
        }

        // ---- REPLAY STEPPING ----

        let replay_finished = match replayer {
            Some(ref mut rep) => {
                let mut send = |cmd: &Command| {
                    let sent = vehicle.send_if_open(cmd);
                    if sent {
                        recorder.capture(cmd, cycle_start_instant);
                    }
                    sent
                };

                match rep.step(cycle_start_instant, &mut send) {
                    ReplayStep::Waiting | ReplayStep::Sent { .. } => false,
                    ReplayStep::Complete { sent } => {
                        info!("Replay of trajectory {} complete, {} points sent", rep.id(), sent);
                        true
                    }
                    ReplayStep::ChannelClosed { sent } => {
                        warn!(
                            "Replay of trajectory {} aborted, channel closed after {} points",
                            rep.id(),
                            sent
                        );
                        true
                    }
                }
            }
            None => false,
        };

        if replay_finished {
            replayer = None;
            // The next live command must go out whatever was replayed last
            throttler.reset();
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = Instant::now() - cycle_start_instant;

        // Get sleep duration
        match cycle_period.checked_sub(cycle_dur) {
            Some(d) => {
                ds.num_consec_cycle_overruns = 0;
                thread::sleep(d);
            }
            None => {
                warn!(
                    "Cycle overran by {:.06} s",
                    (cycle_dur - cycle_period).as_secs_f64()
                );
                ds.num_consec_cycle_overruns += 1;
            }
        }

        // Increment cycle counter
        ds.num_cycles += 1;
    }

    // ---- SHUTDOWN ----

    vehicle.disconnect();

    if recorder.is_armed() {
        if let Err(e) = recorder.disarm() {
            warn!("Could not close the recording on shutdown: {}", e);
        }
    }

    info!("End of execution");

    Ok(())
}
