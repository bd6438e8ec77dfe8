#![allow(rustdoc::private_intra_doc_links)]

use anyhow::{bail, Context, Result};
use clap::CommandFactory as _;
use daemon_response::DaemonResponse;
use opts::ActionWithServer;
use paths::NotibarPaths;
use std::{os::unix::net, path::Path, time::Duration};

mod app;
mod application_lifecycle;
mod client;
mod daemon_response;
mod error_handling_ctx;
mod format;
mod framing;
mod ipc_server;
mod opts;
mod paths;
mod server;
mod stdout_sink;
mod util;

fn main() {
    let opts: opts::Opt = opts::Opt::from_env();

    let log_level_filter = if opts.log_debug { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if std::env::var("RUST_LOG").is_ok() {
        pretty_env_logger::init_timed();
    } else {
        pretty_env_logger::formatted_timed_builder()
            .filter(Some("notibar"), log_level_filter)
            .filter(Some("rofication"), log_level_filter)
            .init();
    }

    if let opts::Action::ShellCompletions { shell } = opts.action {
        clap_complete::generate(shell, &mut opts::RawOpt::command(), "notibar", &mut std::io::stdout());
        return;
    }

    if let Err(err) = run(opts) {
        error_handling_ctx::print_error(err);
        std::process::exit(1);
    }
}

fn run(opts: opts::Opt) -> Result<()> {
    let paths = NotibarPaths::new(opts.socket_path, opts.control_socket_path);

    match opts.action {
        opts::Action::ShellCompletions { .. } => unreachable!(),

        // make sure that there isn't already a notibar instance for this daemon running.
        opts::Action::Run(_) if check_server_running(paths.get_control_socket()) => {
            bail!("notibar is already running for {}", paths.get_daemon_socket().display());
        }
        opts::Action::Run(args) => {
            log::info!("Initializing notibar. ({})", paths.get_control_socket().display());
            let _ = std::fs::remove_file(paths.get_control_socket());
            server::initialize_server(paths, args)?;
        }

        opts::Action::WithServer(action) => {
            if let Some(response) = handle_server_command(&paths, &action, 5)? {
                handle_daemon_response(response);
            }
        }
    }
    Ok(())
}

/// attempt to connect to a running notibar instance and send it the given action.
fn handle_server_command(paths: &NotibarPaths, action: &ActionWithServer, connect_attempts: usize) -> Result<Option<DaemonResponse>> {
    log::debug!("Trying to find notibar instance at socket {}", paths.get_control_socket().display());
    let mut stream = attempt_connect(paths.get_control_socket(), connect_attempts).context("Failed to connect to notibar")?;
    log::debug!("Connected to notibar ({}).", &paths.get_control_socket().display());
    client::do_server_call(&mut stream, action).context("Error while forwarding command to notibar")
}

fn handle_daemon_response(res: DaemonResponse) {
    match res {
        DaemonResponse::Success(x) => {
            if !x.is_empty() {
                println!("{}", x)
            }
        }
        DaemonResponse::Failure(x) => {
            eprintln!("{}", x);
            std::process::exit(1);
        }
    }
}

fn attempt_connect(socket_path: impl AsRef<Path>, attempts: usize) -> Option<net::UnixStream> {
    for _ in 0..attempts {
        if let Ok(mut con) = net::UnixStream::connect(&socket_path) {
            if client::do_server_call(&mut con, &opts::ActionWithServer::Ping).is_ok() {
                return net::UnixStream::connect(&socket_path).ok();
            }
        }
        std::thread::sleep(Duration::from_millis(200));
    }
    None
}

/// Check if a notibar instance is currently running by trying to send a ping message to it.
fn check_server_running(socket_path: impl AsRef<Path>) -> bool {
    let response = net::UnixStream::connect(socket_path)
        .ok()
        .and_then(|mut stream| client::do_server_call(&mut stream, &opts::ActionWithServer::Ping).ok());
    response.is_some()
}
