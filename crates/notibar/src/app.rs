use anyhow::Result;
use rofication::{ModuleConfig, Observable, RenderRule};
use tokio::sync::watch;

use crate::{daemon_response::DaemonResponseSender, error_handling_ctx, format::FormatRule, paths::NotibarPaths};

#[derive(Debug)]
pub enum DaemonCommand {
    NoOp,
    SetFormat { format: String, sender: DaemonResponseSender },
    PrintState(DaemonResponseSender),
    KillServer,
}

/// State of a running notibar instance that control commands act on.
pub struct App {
    pub paths: NotibarPaths,
    pub config: ModuleConfig,
    pub format: FormatRule,
    /// Slot holding the rendering rule of the running module.
    pub rule: Observable<RenderRule<String>>,
    /// The line currently shown on the bar.
    pub shown: watch::Receiver<String>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("paths", &self.paths)
            .field("config", &self.config)
            .field("format", &self.format.template())
            .field("shown", &*self.shown.borrow())
            .finish()
    }
}

impl App {
    /// Handle a DaemonCommand event.
    pub fn handle_command(&mut self, event: DaemonCommand) {
        log::debug!("Handling event: {:?}", &event);
        if let Err(err) = self.try_handle_command(event) {
            error_handling_ctx::print_error(err);
        }
    }

    fn try_handle_command(&mut self, event: DaemonCommand) -> Result<()> {
        match event {
            DaemonCommand::NoOp => {}
            DaemonCommand::SetFormat { format, sender } => {
                let result = FormatRule::parse(&format).map(|format| self.set_format(format));
                sender.respond_with_result(result)?;
            }
            DaemonCommand::PrintState(sender) => {
                let output = format!(
                    "daemon-socket: {}\ninterval: {}s\nformat: {}\nshown: {}",
                    self.paths.get_daemon_socket().display(),
                    self.config.interval.as_secs(),
                    self.format.template(),
                    *self.shown.borrow(),
                );
                sender.send_success(output)?
            }
            DaemonCommand::KillServer => {
                log::info!("Received kill command, stopping notibar!");
                crate::application_lifecycle::send_exit();
            }
        }
        Ok(())
    }

    fn set_format(&mut self, format: FormatRule) {
        log::info!("Changing format to '{}'", format.template());
        self.rule.set(format.clone().into_rule());
        self.format = format;
    }
}
