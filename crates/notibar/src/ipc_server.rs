use crate::{app, framing, opts};
use anyhow::{Context, Result};
use std::time::Duration;
use tokio::{io::AsyncWriteExt, sync::mpsc::*};

pub async fn run_server<P: AsRef<std::path::Path>>(evt_send: UnboundedSender<app::DaemonCommand>, socket_path: P) -> Result<()> {
    let socket_path = socket_path.as_ref();
    let listener = tokio::net::UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind control socket {}", socket_path.display()))?;
    log::info!("Control server initialized at {}", socket_path.display());
    crate::loop_select_exiting! {
        connection = listener.accept() => match connection {
            Ok((stream, _addr)) => {
                let evt_send = evt_send.clone();
                tokio::spawn(async move {
                    let result = handle_connection(stream, evt_send).await;
                    crate::print_result_err!("while handling control connection with client", result);
                });
            },
            Err(e) => log::error!("Failed to connect to client: {:?}", e),
        }
    }
    Ok(())
}

/// Handle a single control connection from start to end.
async fn handle_connection(mut stream: tokio::net::UnixStream, evt_send: UnboundedSender<app::DaemonCommand>) -> Result<()> {
    let (mut stream_read, mut stream_write) = stream.split();

    let action: opts::ActionWithServer = framing::read_frame(&mut stream_read).await?;
    log::debug!("received command from control socket: {:?}", &action);

    let (command, maybe_response_recv) = action.into_daemon_command();
    evt_send.send(command)?;

    // commands without a response are answered by closing the connection
    if let Some(mut response_recv) = maybe_response_recv {
        log::debug!("Waiting for response for control client");
        match tokio::time::timeout(Duration::from_millis(100), response_recv.recv()).await {
            Ok(Some(response)) => {
                let result = framing::write_frame(&mut stream_write, &response).await;
                crate::print_result_err!("sending response to control client", &result);
            }
            Ok(None) => log::debug!("Command was dropped without a response"),
            Err(_) => log::warn!("No response to control command within 100ms"),
        }
    }
    stream_write.shutdown().await?;
    Ok(())
}
