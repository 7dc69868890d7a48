use std::net::SocketAddr;
use std::sync::mpsc;
use std::thread;

use powerprims_rpc::{Supervisor, SupervisorConfig};
use serde::Serialize;
use tracing::info;

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{hw_error, io_error, rpc_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct ListeningOutput {
    listening: String,
    port: u16,
    domains: Vec<&'static str>,
    sweep_interval_ms: u128,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let modules = args.modules();
    if modules.is_empty() {
        return Err(CliError::new(
            USAGE,
            "no module activated; pass --topology, --cpufreq, --energy, --task or --all",
        ));
    }
    modules
        .validate()
        .map_err(|err| hw_error("invalid module set", err))?;
    let sweep_interval = parse_duration(&args.sweep_interval)?;

    // Fail fast on a machine the modules cannot run on; connections then
    // build their own tables.
    let config = args.local.config();
    modules
        .build_dispatch_table(&config)
        .map_err(|err| hw_error("module setup failed", err))?;
    let supervisor = Supervisor::bind_addr(
        SocketAddr::new(args.bind, args.port),
        modules.table_factory(config),
    )
        .map_err(|err| rpc_error("bind failed", err))?
        .with_config(SupervisorConfig {
            sweep_interval,
            ..SupervisorConfig::default()
        });

    let addr = supervisor.local_addr();
    print_listening(
        &ListeningOutput {
            listening: addr.to_string(),
            port: addr.port(),
            domains: modules.domains(),
            sweep_interval_ms: sweep_interval.as_millis(),
        },
        format,
    );

    // Ctrl-C sends `None`; a failed supervisor sends its error.
    let (done_tx, done_rx) = mpsc::channel();
    let ctrlc_tx = done_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(None);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    thread::Builder::new()
        .name("powerprims-serve".to_string())
        .spawn(move || {
            let _ = done_tx.send(supervisor.serve().err());
        })
        .map_err(|err| io_error("failed to start server thread", err))?;

    match done_rx.recv() {
        Ok(Some(err)) => Err(rpc_error("serve failed", err)),
        Ok(None) | Err(_) => {
            info!(%addr, "shutting down");
            Ok(SUCCESS)
        }
    }
}

fn print_listening(out: &ListeningOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "listening on {} (modules: {})",
                out.listening,
                out.domains.join(", ")
            );
        }
        OutputFormat::Raw => println!("{}", out.listening),
    }
}
