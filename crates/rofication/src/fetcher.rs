use std::{
    future::Future,
    path::{Path, PathBuf},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::UnixStream,
    time::Instant,
};

use crate::{Error, Notification, Notifications, Result};

/// Socket the rofication daemon listens on by default.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/rofi_notification_daemon";

const LIST_REQUEST: &[u8] = b"list\n";

/// Something that can report the currently unread notifications.
pub trait NotificationSource {
    fn list(&mut self) -> impl Future<Output = Result<Vec<Notification>>> + Send;
}

/// Talks to a rofication daemon over its unix socket, using a fresh connection for every request.
#[derive(Debug, Clone)]
pub struct RoficationSocket {
    path: PathBuf,
}

impl RoficationSocket {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl Default for RoficationSocket {
    fn default() -> Self {
        Self::new(DEFAULT_SOCKET_PATH)
    }
}

impl NotificationSource for RoficationSocket {
    async fn list(&mut self) -> Result<Vec<Notification>> {
        let mut stream =
            UnixStream::connect(&self.path).await.map_err(|source| Error::Connect { path: self.path.clone(), source })?;
        stream.write_all(LIST_REQUEST).await?;
        read_notification_list(&mut stream).await
    }
}

/// Upper bound for a single reply of the daemon.
const MAX_REPLY_LEN: usize = 8 * 1024 * 1024;

/// Read a single JSON array of notifications from the stream.
/// The daemon doesn't frame its reply, so we read until the first JSON value is complete
/// or the daemon closes the connection.
async fn read_notification_list<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<Notification>> {
    let mut buf = Vec::new();
    let mut scanner = ValueScanner::default();
    loop {
        let scanned = buf.len();
        let at_eof = reader.read_buf(&mut buf).await? == 0;
        if let Some(end) = scanner.feed(&buf[scanned..]) {
            return Ok(serde_json::from_slice(&buf[..scanned + end])?);
        }
        if at_eof {
            // not a complete array or object, let serde_json say what is wrong with it
            return Ok(serde_json::from_slice(&buf)?);
        }
        if buf.len() > MAX_REPLY_LEN {
            return Err(Error::ReplyTooLarge(MAX_REPLY_LEN));
        }
    }
}

/// Finds the end of the first JSON array or object in a byte stream, one chunk at a time.
#[derive(Debug, Default)]
struct ValueScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ValueScanner {
    /// Returns the offset just past the end of the value, if it ends within `bytes`.
    fn feed(&mut self, bytes: &[u8]) -> Option<usize> {
        for (i, &byte) in bytes.iter().enumerate() {
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'[' | b'{' => self.depth += 1,
                b']' | b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }
        None
    }
}

/// One-shot timer deciding when the next fetch is due.
#[derive(Debug, Default)]
pub struct Scheduler {
    deadline: Option<Instant>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer to fire `delay` from now, replacing any earlier deadline.
    pub fn after(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Wait for the armed deadline and disarm. Never resolves while the timer is not armed.
    pub async fn tick(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

/// Exponential backoff for reconnecting to a daemon that can't be reached.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Option<Duration>,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max: max.max(initial), current: None }
    }

    /// Delay to wait after one more consecutive failure.
    pub fn next_delay(&mut self) -> Duration {
        let next = match self.current {
            Some(current) => current.saturating_mul(2).min(self.max),
            None => self.initial,
        };
        self.current = Some(next);
        next
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Fetches notification summaries from a [`NotificationSource`] and owns the refresh timer.
#[derive(Debug)]
pub struct NotificationFetcher<S> {
    source: S,
    interval: Duration,
    timeout: Duration,
    backoff: Backoff,
    scheduler: Scheduler,
}

impl<S: NotificationSource> NotificationFetcher<S> {
    pub fn new(source: S, interval: Duration, timeout: Duration, backoff: Backoff) -> Self {
        Self { source, interval, timeout, backoff, scheduler: Scheduler::new() }
    }

    /// Do a single round trip to the daemon, then arm the timer for the next one.
    ///
    /// The timer is armed relative to the moment the fetch completed, so a slow daemon
    /// delays the schedule by at most one fetch duration per cycle.
    /// If the daemon couldn't be reached, the next attempt is scheduled with backoff instead.
    pub async fn fetch_once(&mut self) -> Result<Notifications> {
        let result = match tokio::time::timeout(self.timeout, self.source.list()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(self.timeout)),
        };

        match &result {
            Err(err) if err.is_connection_failure() => {
                let delay = self.backoff.next_delay();
                log::debug!("Notification daemon unreachable, retrying in {:?}", delay);
                self.scheduler.after(delay);
            }
            _ => {
                self.backoff.reset();
                self.scheduler.after(self.interval);
            }
        }

        result.map(|list| list.iter().collect())
    }

    /// Wait until the next fetch is due.
    pub async fn tick(&mut self) {
        self.scheduler.tick().await
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use maplit::hashmap;
    use pretty_assertions::assert_eq;
    use tokio::net::UnixListener;

    pub(crate) const SCENARIO: &str = r#"[{"id":1,"summary":"x","body":"","application":"mail","urgency":1,"actions":[]},{"id":2,"summary":"y","body":"","application":"mail","urgency":1,"actions":[]},{"id":3,"summary":"z","body":"","application":"chat","urgency":1,"actions":[]}]"#;

    pub(crate) fn temp_socket_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rofication-test-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_file(&path);
        path
    }

    /// Serve a single connection, returning the request the daemon received.
    pub(crate) fn serve_once(path: &Path, response: &'static str) -> tokio::task::JoinHandle<String> {
        let listener = UnixListener::bind(path).unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = [0u8; LIST_REQUEST.len()];
            stream.read_exact(&mut request).await.unwrap();
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        })
    }

    /// Source that replays scripted results, taking `latency` for each of them.
    pub(crate) struct FakeSource {
        pub results: std::collections::VecDeque<Result<Vec<Notification>>>,
        pub latency: Duration,
    }

    impl NotificationSource for FakeSource {
        async fn list(&mut self) -> Result<Vec<Notification>> {
            tokio::time::sleep(self.latency).await;
            match self.results.pop_front() {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }

    #[tokio::test]
    async fn test_list_over_socket() {
        let path = temp_socket_path("list");
        let server = serve_once(&path, SCENARIO);

        let mut socket = RoficationSocket::new(&path);
        assert_eq!(path.as_path(), socket.path());
        let list = socket.list().await.unwrap();
        let notifications: Notifications = list.iter().collect();

        assert_eq!("list\n", server.await.unwrap());
        assert_eq!(Notifications::from(hashmap! { "mail".to_string() => 2, "chat".to_string() => 1 }), notifications);
        assert_eq!(3, notifications.total());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_list_empty_over_socket() {
        let path = temp_socket_path("empty");
        let server = serve_once(&path, "[]\n");

        let list = RoficationSocket::new(&path).list().await.unwrap();

        server.await.unwrap();
        assert!(list.is_empty());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_unreachable_daemon_is_connection_failure() {
        let path = temp_socket_path("missing");
        let err = RoficationSocket::new(&path).list().await.unwrap_err();
        assert!(err.is_connection_failure(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_read_list_split_across_chunks() {
        let (mut client, mut server) = tokio::io::duplex(16);
        let writer = tokio::spawn(async move {
            for chunk in SCENARIO.as_bytes().chunks(7) {
                server.write_all(chunk).await.unwrap();
                tokio::task::yield_now().await;
            }
            // the reply is complete before the connection is closed
            server
        });
        let list = read_notification_list(&mut client).await.unwrap();
        assert_eq!(3, list.len());
        assert_eq!("z", list[2].summary);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_list_with_brackets_inside_strings() {
        let (mut client, mut server) = tokio::io::duplex(8);
        let reply = r#"[{"application": "a]pp", "summary": "\"}]"}]\n"#;
        let writer = tokio::spawn(async move {
            server.write_all(reply.as_bytes()).await.unwrap();
            server
        });
        let list = read_notification_list(&mut client).await.unwrap();
        assert_eq!("a]pp", list[0].application);
        assert_eq!("\"}]", list[0].summary);
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_read_list_is_capped() {
        let mut endless = tokio::io::repeat(b'[');
        assert!(matches!(read_notification_list(&mut endless).await, Err(Error::ReplyTooLarge(MAX_REPLY_LEN))));
    }

    #[tokio::test]
    async fn test_read_list_rejects_garbage() {
        let mut reply: &[u8] = b"{\"not\": \"a list\"}";
        assert!(matches!(read_notification_list(&mut reply).await, Err(Error::Decode(_))));
    }

    #[tokio::test]
    async fn test_read_list_rejects_truncated_reply() {
        let mut reply: &[u8] = b"[{\"application\": \"mail\"";
        assert!(matches!(read_notification_list(&mut reply).await, Err(Error::Decode(_))));
        let mut empty: &[u8] = b"  \n";
        assert!(matches!(read_notification_list(&mut empty).await, Err(Error::Decode(_))));
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
        let delays: Vec<_> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(vec![1, 2, 4, 8, 10, 10], delays);
        backoff.reset();
        assert_eq!(Duration::from_secs(1), backoff.next_delay());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_fetch_armed_relative_to_completion() {
        let source = FakeSource { results: vec![Ok(Vec::new())].into(), latency: Duration::from_secs(2) };
        let mut fetcher =
            NotificationFetcher::new(source, Duration::from_secs(10), Duration::from_secs(5), Backoff::new(Duration::from_secs(1), Duration::from_secs(10)));

        let start = Instant::now();
        fetcher.fetch_once().await.unwrap();
        assert_eq!(Some(start + Duration::from_secs(12)), fetcher.scheduler().deadline());

        fetcher.tick().await;
        assert_eq!(start + Duration::from_secs(12), Instant::now());
        assert_eq!(None, fetcher.scheduler().deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_daemon_times_out() {
        let source = FakeSource { results: Default::default(), latency: Duration::ZERO };
        let mut fetcher =
            NotificationFetcher::new(source, Duration::from_secs(10), Duration::from_secs(3), Backoff::new(Duration::from_secs(1), Duration::from_secs(10)));

        let start = Instant::now();
        let err = fetcher.fetch_once().await.unwrap_err();
        assert!(matches!(err, Error::Timeout(timeout) if timeout == Duration::from_secs(3)));
        assert_eq!(Some(start + Duration::from_secs(13)), fetcher.scheduler().deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_failure_schedules_retry_with_backoff() {
        let connect_error = || Error::Connect {
            path: PathBuf::from(DEFAULT_SOCKET_PATH),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let source = FakeSource {
            results: vec![Err(connect_error()), Err(connect_error()), Ok(Vec::new())].into(),
            latency: Duration::ZERO,
        };
        let mut fetcher =
            NotificationFetcher::new(source, Duration::from_secs(10), Duration::from_secs(5), Backoff::new(Duration::from_secs(1), Duration::from_secs(10)));

        let start = Instant::now();
        assert!(fetcher.fetch_once().await.is_err());
        assert_eq!(Some(start + Duration::from_secs(1)), fetcher.scheduler().deadline());
        assert!(fetcher.fetch_once().await.is_err());
        assert_eq!(Some(start + Duration::from_secs(2)), fetcher.scheduler().deadline());
        assert!(fetcher.fetch_once().await.is_ok());
        assert_eq!(Some(start + Duration::from_secs(10)), fetcher.scheduler().deadline());
    }
}
