use crate::{
    app::App,
    format::FormatRule,
    ipc_server,
    opts::RunArgs,
    paths::NotibarPaths,
    stdout_sink::StdoutSink,
};
use anyhow::{Context, Result};
use rofication::{Module, ModuleConfig, RoficationSocket};
use std::time::Duration;

/// Run the notification module in the foreground until it is told to stop.
pub fn initialize_server(paths: NotibarPaths, args: RunArgs) -> Result<()> {
    let format = FormatRule::parse(&args.format)?;
    let config = ModuleConfig {
        interval: Duration::from_secs(args.interval),
        fetch_timeout: Duration::from_secs(args.timeout),
        suppress_repeated_empty: args.suppress_repeated_empty,
        ..ModuleConfig::default()
    };

    log::info!("Loading paths: {}", &paths);

    simple_signal::set_handler(&[simple_signal::Signal::Int, simple_signal::Signal::Term], move |_| {
        log::info!("Shutting down notibar...");
        crate::application_lifecycle::send_exit();
    });

    let rt = tokio::runtime::Builder::new_multi_thread().enable_all().build().context("Failed to initialize tokio runtime")?;
    rt.block_on(run(paths, config, format))
}

async fn run(paths: NotibarPaths, config: ModuleConfig, format: FormatRule) -> Result<()> {
    let (evt_send, mut evt_recv) = tokio::sync::mpsc::unbounded_channel();
    let (sink, shown) = StdoutSink::new(std::io::stdout());
    let module = Module::with_rule(config, format.clone().into_rule());
    let mut app = App { paths: paths.clone(), config: module.config().clone(), format, rule: module.rule(), shown };

    let ipc_server_handle = {
        let control_socket = paths.control_socket.clone();
        tokio::spawn(async move { ipc_server::run_server(evt_send, control_socket).await })
    };

    let source = RoficationSocket::new(paths.get_daemon_socket());
    log::info!("Polling notification daemon at {} every {:?}", source.path().display(), module.config().interval);
    let module_stream = module.stream(source, sink);
    tokio::pin!(module_stream);

    crate::loop_select_exiting! {
        _ = &mut module_stream => break,
        Some(command) = evt_recv.recv() => app.handle_command(command),
        else => break,
    };

    log::debug!("Stopping control server");
    ipc_server_handle.abort();
    match ipc_server_handle.await {
        Ok(result) => crate::print_result_err!("in control server", result),
        Err(err) if err.is_cancelled() => {}
        Err(err) => log::error!("Control server panicked: {:?}", err),
    }
    crate::print_result_err!("while removing control socket", std::fs::remove_file(paths.get_control_socket()));
    log::info!("notibar stopped");
    Ok(())
}

