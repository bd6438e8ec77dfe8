use crate::{daemon_response::DaemonResponse, framing, opts};
use anyhow::{Context, Result};
use std::{
    io::{Read, Write},
    os::unix::net::UnixStream,
};

/// Send the given request to a running notibar instance.
/// Returns the response, or None if the instance did not provide any useful response. An Ok(None) response does _not_ indicate failure.
pub fn do_server_call(stream: &mut UnixStream, action: &opts::ActionWithServer) -> Result<Option<DaemonResponse>> {
    log::debug!("Forwarding options to server");
    stream.set_nonblocking(false).context("Failed to set stream to blocking")?;

    stream.write_all(&framing::encode(action)?).context("Failed to write command to control stream")?;

    let mut buf = Vec::new();
    stream.set_read_timeout(Some(std::time::Duration::from_millis(100))).context("Failed to set read timeout")?;
    stream.read_to_end(&mut buf).context("Error reading response from server")?;

    if buf.is_empty() {
        return Ok(None);
    }
    framing::decode(&buf).map(Some).context("Invalid response from server")
}
