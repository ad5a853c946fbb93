//! # Arm Executable
//!
//! Supervisory executable for the robot arm. Command lines are read from stdin and replies written
//! to stdout, the arm is driven over its command and feedback channels, and the arm status is
//! broadcast to subscribers every cycle.
//!
//! # Architecture
//!
//!     - Initialise the session, logging and parameters
//!     - Start the status server and the command input reader
//!     - Connect to the arm, installing the safety guard
//!     - Run the control loop until a signal, the end of input, or a fatal error
//!
//! The arm is always stopped and powered off before the process exits. Any fatal error gives an
//! exit code of 1.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{Result, eyre::WrapErr};
use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::{Arc, atomic::{AtomicBool, Ordering}};
use structopt::StructOpt;

// Internal
use arm_lib::{
    arm_client::TcpConnector,
    auto_init::InitStepper,
    control_loop::{Collaborators, ControlLoop},
    inputs::Inputs,
    motion_ctrl::DirectController,
    params::ArmExecParams,
    status_server::StatusServer,
};
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Robot arm supervisory executable.
///
/// Options given here override those in the parameter file.
#[derive(Debug, StructOpt)]
#[structopt(name = "arm_exec")]
struct Opts {
    /// Parameter file, defaults are used for anything it doesn't set
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// Identifier commands must carry to be accepted
    #[structopt(long)]
    id: Option<u16>,

    /// Cycle period in seconds, 0 disables sleeping between cycles
    #[structopt(long)]
    sleep: Option<f64>,

    /// Log at debug level, including every motion command sent
    #[structopt(short, long)]
    verbose: bool,

    /// Print the default parameters as TOML and exit
    #[structopt(long)]
    output_config: bool,

    /// Tool force limit for automatic initialisation, in newtons
    #[structopt(long)]
    init_force_limit: Option<f64>,

    #[structopt(long)]
    robot_arm_host: Option<String>,

    #[structopt(long)]
    robot_arm_port: Option<u16>,

    #[structopt(long)]
    feedback_host: Option<String>,

    #[structopt(long)]
    feedback_port: Option<u16>,

    /// ZMQ endpoint the arm status is broadcast on
    #[structopt(long)]
    status_endpoint: Option<String>,

    /// Directory holding the home marker file
    #[structopt(long, parse(from_os_str))]
    work_dir: Option<PathBuf>,

    /// Directory sessions are created in
    #[structopt(long, parse(from_os_str), default_value = "sessions")]
    session_dir: PathBuf,
}

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    if opts.output_config {
        let toml = util::params::to_string(&ArmExecParams::default())
            .wrap_err("Failed to serialise the default parameters")?;
        print!("{}", toml);
        return Ok(())
    }

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("arm_exec", &opts.session_dir)
        .wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = match opts.verbose {
        true => LevelFilter::Debug,
        false => LevelFilter::Info,
    };
    logger_init(level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Robot Arm Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut params: ArmExecParams = match opts.config {
        Some(ref path) => util::params::load(path)
            .wrap_err_with(|| format!("Could not load parameters from {:?}", path))?,
        None => {
            info!("No parameter file given, using defaults");
            ArmExecParams::default()
        }
    };
    apply_overrides(&mut params, &opts);

    info!("Exec parameters loaded");
    debug!(
        "Parameters: {}",
        serde_json::to_string_pretty(&params).wrap_err("Failed to serialise the parameters")?
    );
    for (i, angle) in params.home_position_deg.iter().enumerate() {
        info!("    Home joint {}: {:.2} deg", i, angle);
    }

    // ---- SIGNALS ----

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))
            .wrap_err("Failed to install the signal handler")?;
    }

    // ---- INITIALISE NETWORK ----

    info!("Initialising network");

    let zmq_ctx = comms_if::net::zmq::Context::new();

    let status_server = StatusServer::new(&zmq_ctx, &params.status_endpoint)
        .wrap_err("Failed to initialise the StatusServer")?;

    let inputs = Inputs::from_reader(params.rover_id, std::io::BufReader::new(std::io::stdin()))
        .wrap_err("Failed to initialise the command inputs")?;

    let collab = Collaborators {
        controller: Box::new(DirectController::new(&params)),
        auto_init: Box::new(InitStepper::new(&params)),
        sink: Box::new(status_server),
        inputs,
        replies: Box::new(std::io::stdout()),
    };

    // ---- CONTROL SESSION ----

    let mut connector = TcpConnector::new(&params);

    let result = ControlLoop::connect(params, &mut connector, collab, shutdown)
        .and_then(|control_loop| control_loop.run());

    match result {
        Ok(summary) => {
            info!(
                "End of execution after {} cycles ({:?})",
                summary.num_cycles,
                summary.exit_cause
            );
            Ok(())
        },
        Err(e) => {
            error!("Fatal error: {}", e);
            Err(e).wrap_err("Control session failed")
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Apply any command line overrides to the loaded parameters.
fn apply_overrides(params: &mut ArmExecParams, opts: &Opts) {
    if let Some(id) = opts.id {
        params.rover_id = id;
    }
    if let Some(sleep) = opts.sleep {
        params.cycle_period_s = sleep;
    }
    if let Some(limit) = opts.init_force_limit {
        params.init_force_limit_n = Some(limit);
    }
    if let Some(ref host) = opts.robot_arm_host {
        params.arm_host = host.clone();
    }
    if let Some(port) = opts.robot_arm_port {
        params.arm_port = port;
    }
    if let Some(ref host) = opts.feedback_host {
        params.feedback_host = host.clone();
    }
    if let Some(port) = opts.feedback_port {
        params.feedback_port = port;
    }
    if let Some(ref endpoint) = opts.status_endpoint {
        params.status_endpoint = endpoint.clone();
    }
    if let Some(ref dir) = opts.work_dir {
        params.work_directory = dir.clone();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_overrides() {
        let opts = Opts::from_iter(&[
            "arm_exec",
            "--id", "3",
            "--sleep", "0.2",
            "--init-force-limit", "40",
            "--robot-arm-host", "10.0.0.2",
            "--feedback-port", "30013",
            "--work-dir", "/var/arm",
        ]);

        let mut params = ArmExecParams::default();
        apply_overrides(&mut params, &opts);

        assert_eq!(params.rover_id, 3);
        assert_eq!(params.cycle_period_s, 0.2);
        assert_eq!(params.init_force_limit_n, Some(40.0));
        assert_eq!(params.arm_host, "10.0.0.2");
        assert_eq!(params.arm_port, 30002);
        assert_eq!(params.feedback_port, 30013);
        assert_eq!(params.work_directory, PathBuf::from("/var/arm"));
        assert_eq!(opts.session_dir, PathBuf::from("sessions"));
    }
}
