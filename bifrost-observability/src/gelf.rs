use crate::access_log::{AccessRecord, ApplicationRecord};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use std::io::Write;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const QUEUE_CAPACITY: usize = 30_000;
const SUPERVISOR_TICK: Duration = Duration::from_secs(1);
const IDLE_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub enum LogRecord {
    Access(AccessRecord),
    Application(ApplicationRecord),
}

impl LogRecord {
    fn to_gelf(&self, host: &str) -> serde_json::Value {
        match self {
            LogRecord::Access(r) => r.to_gelf(host),
            LogRecord::Application(r) => r.to_gelf(host),
        }
    }
}

/// Producer handle for the background GELF sink. Cloning is cheap (it
/// clones the channel sender).
#[derive(Clone)]
pub struct LogSink {
    sender: Option<Sender<LogRecord>>,
}

impl LogSink {
    /// Dial `connection_string` (`tcp://host:port` or `udp://host:port`) and
    /// spawn the background writer thread.
    pub fn spawn(connection_string: String, host: String) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(QUEUE_CAPACITY);
        std::thread::Builder::new()
            .name("bifrost-log-sink".into())
            .spawn(move || sink_loop(connection_string, host, rx))
            .expect("failed to spawn log sink thread");
        Self { sender: Some(tx) }
    }

    /// A sink with no backing connection — records are accepted and dropped.
    /// Used when `logs.access_log`/`logs.application_log` is disabled.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Non-blocking enqueue. Drops and logs locally if the channel is full
    /// or the sink is disabled; never applies backpressure to the caller.
    pub fn emit(&self, record: LogRecord) {
        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("log queue was full, dropping record"),
            Err(TrySendError::Disconnected(_)) => warn!("log sink thread is gone, dropping record"),
        }
    }
}

enum Target {
    Tcp(SocketAddr),
    Udp(SocketAddr),
}

enum Conn {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Conn {
    fn write_framed(&mut self, payload: &[u8]) -> std::io::Result<()> {
        match self {
            // NUL-terminated: required framing for TCP, harmless on UDP.
            Conn::Tcp(stream) => {
                stream.write_all(payload)?;
                stream.write_all(&[0u8])
            }
            Conn::Udp(socket) => {
                let mut framed = Vec::with_capacity(payload.len() + 1);
                framed.extend_from_slice(payload);
                framed.push(0u8);
                socket.send(&framed).map(|_| ())
            }
        }
    }

    /// Best-effort write-based liveness probe.
    /// TODO: replace with a read-with-deadline probe; a zero-byte write can
    /// succeed on a half-closed TCP connection depending on OS/kernel state.
    fn probe(&mut self) -> bool {
        match self {
            Conn::Tcp(stream) => stream.write(&[]).is_ok(),
            Conn::Udp(_) => true,
        }
    }
}

fn parse_target(connection_string: &str) -> Option<Target> {
    if let Some(rest) = connection_string.strip_prefix("tcp://") {
        rest.to_socket_addrs().ok()?.next().map(Target::Tcp)
    } else if let Some(rest) = connection_string.strip_prefix("udp://") {
        rest.to_socket_addrs().ok()?.next().map(Target::Udp)
    } else {
        None
    }
}

fn dial(target: &Target) -> Option<Conn> {
    match target {
        Target::Tcp(addr) => TcpStream::connect(addr).ok().map(Conn::Tcp),
        Target::Udp(addr) => {
            let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
            socket.connect(addr).ok()?;
            Some(Conn::Udp(socket))
        }
    }
}

fn sink_loop(connection_string: String, host: String, rx: Receiver<LogRecord>) {
    let Some(target) = parse_target(&connection_string) else {
        warn!(connection_string, "unrecognized log sink connection string; sink disabled");
        return;
    };

    let mut conn: Option<Conn> = dial(&target);
    let mut last_tick = Instant::now();

    loop {
        if last_tick.elapsed() >= SUPERVISOR_TICK {
            last_tick = Instant::now();
            conn = match conn.take() {
                None => dial(&target),
                Some(mut c) => {
                    if c.probe() {
                        Some(c)
                    } else {
                        None
                    }
                }
            };
        }

        match rx.recv_timeout(IDLE_POLL) {
            Ok(record) => {
                let Some(c) = conn.as_mut() else {
                    continue;
                };
                let body = serde_json::to_vec(&record.to_gelf(&host)).unwrap_or_default();
                if c.write_framed(&body).is_err() {
                    conn = None;
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tcp_connection_string() {
        assert!(matches!(parse_target("tcp://127.0.0.1:12201"), Some(Target::Tcp(_))));
    }

    #[test]
    fn parse_udp_connection_string() {
        assert!(matches!(parse_target("udp://127.0.0.1:12201"), Some(Target::Udp(_))));
    }

    #[test]
    fn unrecognized_scheme_is_none() {
        assert!(parse_target("redis://127.0.0.1:6379").is_none());
    }

    #[test]
    fn disabled_sink_accepts_and_drops_without_panicking() {
        let sink = LogSink::disabled();
        sink.emit(LogRecord::Access(crate::access_log::AccessRecord {
            method: "GET".into(),
            path: "/".into(),
            protocol: "HTTP/1.1".into(),
            status: 200,
            content_length: 0,
            client_ip: "127.0.0.1".into(),
            duration_ms: 1.0,
            request_id: "r1".into(),
            origin: None,
            user_agent: None,
            consumer_id: None,
            error: None,
        }));
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        // A spawned sink dialing an address nothing listens on never drains;
        // emitting past capacity must return immediately rather than block.
        let sink = LogSink::spawn("tcp://127.0.0.1:1".to_string(), "test-host".to_string());
        for i in 0..(QUEUE_CAPACITY + 10) {
            sink.emit(LogRecord::Access(crate::access_log::AccessRecord {
                method: "GET".into(),
                path: "/".into(),
                protocol: "HTTP/1.1".into(),
                status: 200,
                content_length: 0,
                client_ip: "127.0.0.1".into(),
                duration_ms: 1.0,
                request_id: i.to_string(),
                origin: None,
                user_agent: None,
                consumer_id: None,
                error: None,
            }));
        }
    }
}
