use crate::utf8::Utf8Accumulator;
use core_events::{
    CHANNEL_SEND_FAILURES, Event, INPUT_BYTES, INPUT_CHUNKS, INPUT_TASK_STARTS,
    INPUT_TASK_STOP_CHANNEL, INPUT_TASK_STOP_EOF, INPUT_TASK_STOP_ERROR, INPUT_TASK_STOP_SIGNAL,
    InputEvent,
};
use std::io;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Notify, mpsc::Sender};
use tokio::task;
use tracing::{info, trace, warn};

const READ_BUF_SIZE: usize = 4_096;

#[derive(Clone, Debug)]
pub struct AsyncInputShutdown {
    notify: Arc<Notify>,
}

impl AsyncInputShutdown {
    pub fn signal(&self) {
        self.notify.notify_one();
    }
}

#[derive(Clone, Debug)]
struct ShutdownListener {
    notify: Arc<Notify>,
}

impl ShutdownListener {
    fn new_pair() -> (AsyncInputShutdown, Self) {
        let notify = Arc::new(Notify::new());
        (
            AsyncInputShutdown {
                notify: notify.clone(),
            },
            ShutdownListener { notify },
        )
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

/// Spawn the reader task over any byte source (stdin in production, in-memory pipes in tests).
pub(crate) fn spawn_reader_task<R>(
    sender: Sender<Event>,
    reader: R,
) -> (task::JoinHandle<()>, AsyncInputShutdown)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (shutdown, listener) = ShutdownListener::new_pair();
    let handle = task::spawn(async move {
        ChunkReaderTask::new(sender, reader, listener).run().await;
    });
    (handle, shutdown)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ExitReason {
    Running,
    ShutdownSignal,
    ChannelClosed,
    EndOfStream,
    StreamError,
}

impl ExitReason {
    fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Running => "running",
            ExitReason::ShutdownSignal => "shutdown_signal",
            ExitReason::ChannelClosed => "channel_closed",
            ExitReason::EndOfStream => "end_of_stream",
            ExitReason::StreamError => "stream_error",
        }
    }
}

struct ChunkReaderTask<R> {
    sender: Sender<Event>,
    reader: R,
    utf8: Utf8Accumulator,
    shutdown: ShutdownListener,
    exit_reason: ExitReason,
    stream_error: Option<io::ErrorKind>,
}

impl<R> ChunkReaderTask<R>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    fn new(sender: Sender<Event>, reader: R, shutdown: ShutdownListener) -> Self {
        Self {
            sender,
            reader,
            utf8: Utf8Accumulator::new(),
            shutdown,
            exit_reason: ExitReason::Running,
            stream_error: None,
        }
    }

    async fn run(mut self) {
        info!(target: "input.thread", "input_task_started");
        INPUT_TASK_STARTS.fetch_add(1, Ordering::Relaxed);
        let mut buf = [0u8; READ_BUF_SIZE];

        loop {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.wait() => {
                    self.exit_reason = ExitReason::ShutdownSignal;
                    break;
                }
                read = self.reader.read(&mut buf) => read,
            };

            match read {
                Ok(0) => {
                    self.exit_reason = ExitReason::EndOfStream;
                    // Best effort: the runtime may already be tearing down the receiver.
                    let _ = self.send_event(Event::Input(InputEvent::Eof)).await;
                    break;
                }
                Ok(n) => {
                    let chunk = self.utf8.accumulate(&buf[..n]).into_owned();
                    if chunk.is_empty() {
                        continue;
                    }
                    INPUT_CHUNKS.fetch_add(1, Ordering::Relaxed);
                    INPUT_BYTES.fetch_add(n as u64, Ordering::Relaxed);
                    // Never log the chunk itself; it may carry pasted secrets.
                    trace!(target: "input.thread", len = chunk.len(), "chunk_read");
                    if !self.send_event(Event::Input(InputEvent::Chunk(chunk))).await {
                        break;
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    self.exit_reason = ExitReason::StreamError;
                    self.stream_error = Some(err.kind());
                    break;
                }
            }
        }

        let reason = match self.exit_reason {
            ExitReason::Running => ExitReason::EndOfStream,
            other => other,
        };
        let counter = match reason {
            ExitReason::ShutdownSignal => &INPUT_TASK_STOP_SIGNAL,
            ExitReason::ChannelClosed => &INPUT_TASK_STOP_CHANNEL,
            ExitReason::EndOfStream | ExitReason::Running => &INPUT_TASK_STOP_EOF,
            ExitReason::StreamError => &INPUT_TASK_STOP_ERROR,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if reason == ExitReason::StreamError {
            warn!(target: "input.thread", error_kind = ?self.stream_error, "input_task_stream_error");
        }
        info!(target: "input.thread", reason = reason.as_str(), "input_task_stopped");
    }

    async fn send_event(&mut self, event: Event) -> bool {
        match self.sender.send(event).await {
            Ok(()) => true,
            Err(_) => {
                CHANNEL_SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
                if !matches!(
                    self.exit_reason,
                    ExitReason::ShutdownSignal | ExitReason::EndOfStream
                ) {
                    self.exit_reason = ExitReason::ChannelClosed;
                }
                false
            }
        }
    }
}
