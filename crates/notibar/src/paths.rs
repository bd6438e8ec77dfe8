use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
};

/// Stores references to all the paths relevant to notibar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotibarPaths {
    pub daemon_socket: PathBuf,
    pub control_socket: PathBuf,
}

impl NotibarPaths {
    pub fn new(daemon_socket: Option<PathBuf>, control_socket: Option<PathBuf>) -> Self {
        let daemon_socket = daemon_socket.unwrap_or_else(|| PathBuf::from(rofication::DEFAULT_SOCKET_PATH));
        let control_socket = control_socket.unwrap_or_else(|| default_control_socket(&daemon_socket));
        NotibarPaths { daemon_socket, control_socket }
    }

    pub fn get_daemon_socket(&self) -> &Path {
        self.daemon_socket.as_path()
    }

    pub fn get_control_socket(&self) -> &Path {
        self.control_socket.as_path()
    }
}

/// One control socket per daemon socket, so several instances watching different daemons don't collide.
fn default_control_socket(daemon_socket: &Path) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    format!("{}", daemon_socket.display()).hash(&mut hasher);
    // hashing keeps the socket path short, unix socket paths are limited to 108 bytes (see man 7 unix)
    let instance_id = format!("{:x}", hasher.finish());

    let control_socket = std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
        .join(format!("notibar_{}", instance_id));

    // 100 as the limit isn't quite 108 everywhere (i.e 104 on BSD or mac)
    if format!("{}", control_socket.display()).len() > 100 {
        log::warn!("The control socket's absolute path exceeds 100 bytes, the socket may fail to create.");
    }
    control_socket
}

impl std::fmt::Display for NotibarPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "daemon-socket: {}, control-socket: {}", self.daemon_socket.display(), self.control_socket.display())
    }
}
