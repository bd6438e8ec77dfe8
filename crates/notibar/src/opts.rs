use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::{
    app,
    daemon_response::{self, DaemonResponseReceiver, DaemonResponseSender},
    format,
};

pub const DEFAULT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Struct that gets generated from `RawOpt`.
#[derive(Debug, PartialEq)]
pub struct Opt {
    pub log_debug: bool,
    pub socket_path: Option<PathBuf>,
    pub control_socket_path: Option<PathBuf>,
    pub action: Action,
}

#[derive(Parser, Debug, PartialEq)]
#[command(author = "elkowar", version, about)]
pub(super) struct RawOpt {
    /// Write out debug logs.
    #[arg(long = "debug", global = true)]
    log_debug: bool,

    /// Socket of the rofication daemon
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Control socket of the notibar instance (defaults to one derived from the daemon socket)
    #[arg(long, global = true)]
    control_socket: Option<PathBuf>,

    #[command(subcommand)]
    action: Option<Action>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Action {
    /// Generate a shell completion script
    ShellCompletions {
        #[arg(short, long)]
        shell: clap_complete::shells::Shell,
    },

    /// Poll the notification daemon and print the rendered status line to stdout. This is the default.
    #[command(name = "run", alias = "r")]
    Run(RunArgs),

    #[command(flatten)]
    WithServer(ActionWithServer),
}

#[derive(clap::Args, Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Seconds between the end of one fetch and the start of the next
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    /// Seconds to wait for the daemon to answer before giving up on a fetch
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Output format. Supports {total}, {apps} and {app:NAME}. Nothing is shown without unread notifications.
    #[arg(short, long, default_value = format::DEFAULT_FORMAT)]
    pub format: String,

    /// Only print one empty line when there is nothing to show several times in a row
    #[arg(long)]
    pub suppress_repeated_empty: bool,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL_SECS,
            timeout: DEFAULT_TIMEOUT_SECS,
            format: format::DEFAULT_FORMAT.to_string(),
            suppress_repeated_empty: false,
        }
    }
}

#[derive(Subcommand, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum ActionWithServer {
    /// Ping the running notibar instance, checking if it is reachable.
    #[command(name = "ping")]
    Ping,

    /// Change the output format of the running notibar instance
    #[command(name = "format", alias = "f")]
    SetFormat { format: String },

    /// Print the state of the running notibar instance
    #[command(name = "state")]
    ShowState,

    /// Stop the running notibar instance
    #[command(name = "kill", alias = "k")]
    KillServer,
}

impl Opt {
    pub fn from_env() -> Self {
        let raw: RawOpt = RawOpt::parse();
        raw.into()
    }
}

impl From<RawOpt> for Opt {
    fn from(other: RawOpt) -> Self {
        let RawOpt { log_debug, socket, control_socket, action } = other;
        Opt {
            log_debug,
            socket_path: socket,
            control_socket_path: control_socket,
            action: action.unwrap_or_else(|| Action::Run(RunArgs::default())),
        }
    }
}

impl ActionWithServer {
    pub fn into_daemon_command(self) -> (app::DaemonCommand, Option<DaemonResponseReceiver>) {
        let command = match self {
            ActionWithServer::Ping => {
                let (send, recv) = daemon_response::create_pair();
                let _ = send.send_success("pong".to_owned());
                return (app::DaemonCommand::NoOp, Some(recv));
            }
            ActionWithServer::KillServer => app::DaemonCommand::KillServer,
            ActionWithServer::SetFormat { format } => {
                return with_response_channel(|sender| app::DaemonCommand::SetFormat { format, sender })
            }
            ActionWithServer::ShowState => return with_response_channel(app::DaemonCommand::PrintState),
        };
        (command, None)
    }
}

fn with_response_channel<O, F>(f: F) -> (O, Option<DaemonResponseReceiver>)
where
    F: FnOnce(DaemonResponseSender) -> O,
{
    let (sender, recv) = daemon_response::create_pair();
    (f(sender), Some(recv))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Opt {
        RawOpt::try_parse_from(args).unwrap().into()
    }

    #[test]
    fn verify_cli() {
        RawOpt::command().debug_assert();
    }

    #[test]
    fn test_run_is_the_default_action() {
        let opt = parse(&["notibar"]);
        assert_eq!(Action::Run(RunArgs::default()), opt.action);
        assert_eq!(Action::Run(RunArgs::default()), parse(&["notibar", "run"]).action);
    }

    #[test]
    fn test_parse_run_args() {
        let opt = parse(&["notibar", "--socket", "/tmp/rofi", "run", "-i", "30", "--format", "{apps}", "--suppress-repeated-empty"]);
        assert_eq!(Some(PathBuf::from("/tmp/rofi")), opt.socket_path);
        assert_eq!(
            Action::Run(RunArgs { interval: 30, timeout: DEFAULT_TIMEOUT_SECS, format: "{apps}".to_string(), suppress_repeated_empty: true }),
            opt.action
        );
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        assert!(RawOpt::try_parse_from(["notibar", "run", "-i", "0"]).is_err());
        assert!(RawOpt::try_parse_from(["notibar", "run", "--timeout", "0"]).is_err());
        assert_eq!(Action::Run(RunArgs { interval: 1, ..RunArgs::default() }), parse(&["notibar", "run", "-i", "1"]).action);
    }

    #[test]
    fn test_parse_server_action() {
        let opt = parse(&["notibar", "format", "mail: {app:mail}", "--debug"]);
        assert!(opt.log_debug);
        assert_eq!(Action::WithServer(ActionWithServer::SetFormat { format: "mail: {app:mail}".to_string() }), opt.action);
    }

    #[test]
    fn test_ping_answers_without_reaching_the_app() {
        let (command, recv) = ActionWithServer::Ping.into_daemon_command();
        assert!(matches!(command, app::DaemonCommand::NoOp));
        assert_eq!(Some(daemon_response::DaemonResponse::Success("pong".to_string())), recv.unwrap().try_recv().ok());
    }
}
