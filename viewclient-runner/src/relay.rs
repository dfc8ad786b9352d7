use std::io::{ErrorKind, Read, Write};
use std::sync::mpsc::Sender;
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::JoinHandle;

/// Maximum number of bytes read from the child at once
const CHUNK_SIZE: usize = 8 * 1024;

/// Signal raised once, when the relays must stop copying.
///
/// Writes to a sink happen while holding the signal, so once [`Shutdown::signal`]
/// returns no relay can write anything else.
#[derive(Clone, Default, Debug)]
pub struct Shutdown(Arc<RwLock<bool>>);

impl Shutdown {
    /// Creates a signal that has not been raised yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal, it cannot be reset.
    ///
    /// Waits for the writes in progress to complete.
    pub fn signal(&self) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = true;
    }

    /// Whether the signal has been raised
    pub fn is_signaled(&self) -> bool {
        *self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` unless the signal has been raised, preventing it from being raised meanwhile
    fn unless_signaled<T>(&self, f: impl FnOnce() -> T) -> Option<T> {
        let signaled = self.0.read().unwrap_or_else(PoisonError::into_inner);
        if *signaled {
            return None;
        }

        Some(f())
    }
}

/// What a relay did during its lifetime
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct RelayStats {
    /// Number of bytes written to the sink
    pub bytes: u64,

    /// Number of chunks that could not be written to the sink
    pub write_errors: u64,
}

/// Copies everything a child writes on one of its streams to one of ours
pub struct Relay<R, W> {
    name: &'static str,
    source: R,
    sink: W,
}

impl<R: Read, W: Write> Relay<R, W> {
    /// Creates a relay named after the stream it copies (e.g., `stdout`)
    pub fn new(name: &'static str, source: R, sink: W) -> Self {
        Self { name, source, sink }
    }

    /// Copies the source to the sink until the end of the source, or until `shutdown` is raised.
    ///
    /// Once `shutdown` is raised nothing else is written to the sink.
    /// Failing to write a chunk is reported but does not stop the relay.
    pub fn run(mut self, shutdown: &Shutdown) -> RelayStats {
        let mut stats = RelayStats::default();
        let mut buffer = [0; CHUNK_SIZE];

        loop {
            let read = match self.source.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(stream = self.name, "failed to read from the child: {e}");
                    break;
                }
            };
            let Some(chunk) = buffer.get(..read) else {
                break;
            };

            let sink = &mut self.sink;
            let written =
                shutdown.unless_signaled(|| sink.write_all(chunk).and_then(|()| sink.flush()));
            match written {
                None => {
                    tracing::debug!(
                        stream = self.name,
                        read,
                        "discarding output received after shutdown"
                    );
                    break;
                }
                Some(Ok(())) => stats.bytes += read as u64,
                Some(Err(e)) => {
                    stats.write_errors += 1;
                    tracing::warn!(
                        stream = self.name,
                        "failed to relay the output of the child: {e}"
                    );
                }
            }
        }

        tracing::debug!(
            stream = self.name,
            bytes = stats.bytes,
            write_errors = stats.write_errors,
            "relay stopped"
        );

        stats
    }
}

impl<R, W> Relay<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    /// Runs the relay in its own thread.
    ///
    /// The name of the relay is sent to `done` when it stops.
    pub fn spawn(
        self,
        shutdown: Shutdown,
        done: Sender<&'static str>,
    ) -> std::io::Result<JoinHandle<RelayStats>> {
        std::thread::Builder::new()
            .name(format!("relay-{}", self.name))
            .spawn(move || {
                let name = self.name;
                let stats = self.run(&shutdown);
                let _ = done.send(name);

                stats
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, ErrorKind, Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::{Relay, RelayStats, Shutdown};

    /// A sink that can be inspected while a relay owns it
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Fails to write the first `failures` chunks
    struct FlakySink {
        failures: usize,
        written: Vec<u8>,
    }

    impl Write for FlakySink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(std::io::Error::new(ErrorKind::BrokenPipe, "closed"));
            }
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Takes its time to write, telling when a write has started
    struct SlowSink {
        started: Arc<AtomicBool>,
        written: SharedBuffer,
    }

    impl Write for SlowSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.started.store(true, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
            self.written.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Yields the given results one after the other, then the end of the stream
    struct ScriptedSource(Vec<std::io::Result<&'static [u8]>>);

    impl Read for ScriptedSource {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() {
                return Ok(0);
            }
            let chunk = self.0.remove(0)?;
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    #[test]
    fn copies_until_end_of_stream() {
        let data = vec![42u8; 3 * 8 * 1024 + 17];
        let mut sink: Vec<u8> = Vec::new();

        let stats =
            Relay::new("stdout", Cursor::new(data.clone()), &mut sink).run(&Shutdown::new());

        assert_eq!(sink, data);
        assert_eq!(
            stats,
            RelayStats {
                bytes: data.len() as u64,
                write_errors: 0
            }
        );
    }

    #[test]
    fn nothing_written_after_shutdown() {
        let shutdown = Shutdown::new();
        shutdown.signal();
        let mut sink: Vec<u8> = Vec::new();

        let stats =
            Relay::new("stderr", Cursor::new(b"late output".to_vec()), &mut sink).run(&shutdown);

        assert!(sink.is_empty());
        assert_eq!(stats.bytes, 0);
    }

    #[test]
    fn signal_waits_for_the_write_in_progress() {
        let shutdown = Shutdown::new();
        let started = Arc::new(AtomicBool::new(false));
        let written = SharedBuffer::default();
        let sink = SlowSink {
            started: Arc::clone(&started),
            written: written.clone(),
        };
        let source = ScriptedSource(vec![Ok(&b"first"[..]), Ok(&b"second"[..])]);
        let (done_tx, _done_rx) = mpsc::channel();

        let handle = Relay::new("stdout", source, sink)
            .spawn(shutdown.clone(), done_tx)
            .unwrap();
        while !started.load(Ordering::SeqCst) {
            std::thread::yield_now();
        }
        shutdown.signal();
        let written_at_signal = written.contents();

        let stats = handle.join().unwrap();
        assert!(written_at_signal.starts_with(b"first"));
        assert_eq!(written.contents(), written_at_signal);
        assert_eq!(stats.bytes, written_at_signal.len() as u64);
    }

    #[test]
    fn write_errors_do_not_stop_the_relay() {
        let source = ScriptedSource(vec![Ok(&b"lost"[..]), Ok(&b"kept"[..])]);
        let mut sink = FlakySink {
            failures: 1,
            written: Vec::new(),
        };

        let stats = Relay::new("stdout", source, &mut sink).run(&Shutdown::new());

        assert_eq!(sink.written, b"kept");
        assert_eq!(
            stats,
            RelayStats {
                bytes: 4,
                write_errors: 1
            }
        );
    }

    #[test]
    fn interrupted_reads_are_retried() {
        let source = ScriptedSource(vec![
            Ok(&b"one "[..]),
            Err(std::io::Error::from(ErrorKind::Interrupted)),
            Ok(&b"two"[..]),
        ]);
        let mut sink: Vec<u8> = Vec::new();

        Relay::new("stdout", source, &mut sink).run(&Shutdown::new());

        assert_eq!(sink, b"one two");
    }

    #[test]
    fn read_errors_stop_the_relay() {
        let source = ScriptedSource(vec![
            Ok(&b"before"[..]),
            Err(std::io::Error::from(ErrorKind::Other)),
            Ok(&b"after"[..]),
        ]);
        let mut sink: Vec<u8> = Vec::new();

        Relay::new("stdout", source, &mut sink).run(&Shutdown::new());

        assert_eq!(sink, b"before");
    }

    #[test]
    fn spawn_reports_when_done() {
        let sink = SharedBuffer::default();
        let (done_tx, done_rx) = mpsc::channel();

        let handle = Relay::new("stdout", Cursor::new(b"hello".to_vec()), sink.clone())
            .spawn(Shutdown::new(), done_tx)
            .unwrap();

        assert_eq!(done_rx.recv().unwrap(), "stdout");
        assert_eq!(handle.join().unwrap().bytes, 5);
        assert_eq!(sink.contents(), b"hello");
    }
}
