use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{bounded, select, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::io::{BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{FeedLine, LineFeed, SourceFeed};

const PUMP_BUFFER: usize = 256;

/// How long a line waits for an earlier one on the sibling stream, counted
/// from the moment it was read.
const STREAM_SKEW: Duration = Duration::from_millis(100);

/// Runs a command and feeds its stdout and stderr lines as one source.
///
/// Both streams are expected to carry timestamp-prefixed lines of one
/// chronological log. They are read on separate threads and merged back by
/// timestamp, stdout first on ties. A line is held for at most
/// `STREAM_SKEW` after it was read while the other stream is silent, so a
/// command that never writes to one stream is not stalled by it. The child
/// is killed when the feed is dropped.
pub struct CommandFeed {
    label: String,
    child: Option<Child>,
    streams: [Stream; 2],
}

struct Arrival {
    at: Instant,
    line: FeedLine,
}

/// Read side of one pump with at most one line set aside
struct Stream {
    lines: Receiver<Result<Arrival>>,
    pending: Option<Arrival>,
    closed: bool,
}

impl Stream {
    fn new(lines: Receiver<Result<Arrival>>) -> Self {
        Self {
            lines,
            pending: None,
            closed: false,
        }
    }

    /// `None` means the pump is gone.
    fn accept(&mut self, item: Option<Result<Arrival>>) -> Result<()> {
        match item {
            Some(arrival) => self.pending = Some(arrival?),
            None => self.closed = true,
        }
        Ok(())
    }

    /// Refill an empty slot, waiting no later than `deadline`.
    fn fill_until(&mut self, deadline: Instant) -> Result<()> {
        if self.pending.is_some() || self.closed {
            return Ok(());
        }
        let item = match self.lines.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Disconnected) => None,
            Err(TryRecvError::Empty) => match self.lines.recv_deadline(deadline) {
                Ok(item) => Some(item),
                Err(RecvTimeoutError::Timeout) => return Ok(()),
                Err(RecvTimeoutError::Disconnected) => None,
            },
        };
        self.accept(item)
    }

    /// Refill an empty slot, blocking until the pump delivers or ends.
    fn fill(&mut self) -> Result<()> {
        if self.pending.is_some() || self.closed {
            return Ok(());
        }
        let item = self.lines.recv().ok();
        self.accept(item)
    }
}

impl CommandFeed {
    /// Spawn `argv[0]` with the remaining arguments.
    pub fn spawn(label: impl Into<String>, argv: &[String]) -> Result<Self> {
        let label = label.into();
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("Empty command for source '{}'", label))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start '{}' for source '{}'", program, label))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("No stdout pipe for source '{}'", label))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| anyhow!("No stderr pipe for source '{}'", label))?;
        let streams = [
            Stream::new(spawn_pump(format!("{} stdout", label), stdout)?),
            Stream::new(spawn_pump(format!("{} stderr", label), stderr)?),
        ];

        tracing::debug!(source = %label, command = %argv.join(" "), "command feed started");

        Ok(Self {
            label,
            child: Some(child),
            streams,
        })
    }

    fn wait_for_exit(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .with_context(|| format!("Failed to wait for source '{}'", self.label))?;
        if !status.success() {
            bail!("Command for source '{}' exited with {}", self.label, status);
        }
        Ok(())
    }

    /// Block until either stream delivers a line or closes.
    fn wait_any(&mut self) -> Result<()> {
        let [out, err] = &mut self.streams;
        match (out.closed, err.closed) {
            (false, false) => {
                let (out_rx, err_rx) = (out.lines.clone(), err.lines.clone());
                select! {
                    recv(out_rx) -> item => out.accept(item.ok()),
                    recv(err_rx) -> item => err.accept(item.ok()),
                }
            }
            (false, true) => out.fill(),
            (true, false) => err.fill(),
            (true, true) => Ok(()),
        }
    }

    fn oldest_arrival(&self) -> Option<Instant> {
        self.streams
            .iter()
            .filter_map(|stream| stream.pending.as_ref().map(|arrival| arrival.at))
            .min()
    }

    /// Take the set-aside line with the smallest timestamp; stdout wins ties.
    fn take_earliest(&mut self) -> Option<FeedLine> {
        let (index, _) = self
            .streams
            .iter()
            .enumerate()
            .filter_map(|(index, stream)| {
                stream
                    .pending
                    .as_ref()
                    .map(|arrival| (index, arrival.line.timestamp))
            })
            .min_by_key(|&(index, timestamp)| (timestamp, index))?;
        self.streams[index].pending.take().map(|arrival| arrival.line)
    }
}

impl SourceFeed for CommandFeed {
    fn recv(&mut self) -> Result<Option<FeedLine>> {
        loop {
            let Some(oldest) = self.oldest_arrival() else {
                if self.streams.iter().all(|stream| stream.closed) {
                    self.wait_for_exit()?;
                    return Ok(None);
                }
                self.wait_any()?;
                continue;
            };

            let deadline = oldest + STREAM_SKEW;
            for stream in &mut self.streams {
                stream.fill_until(deadline)?;
            }
            if let Some(line) = self.take_earliest() {
                return Ok(Some(line));
            }
        }
    }
}

impl Drop for CommandFeed {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn spawn_pump<R>(name: String, stream: R) -> Result<Receiver<Result<Arrival>>>
where
    R: Read + Send + 'static,
{
    let (sender, lines): (Sender<Result<Arrival>>, _) = bounded(PUMP_BUFFER);
    thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let mut feed = LineFeed::with_label(BufReader::new(stream), name);
            loop {
                let item = match feed.recv() {
                    Ok(Some(line)) => Ok(Arrival {
                        at: Instant::now(),
                        line,
                    }),
                    Ok(None) => break,
                    Err(err) => Err(err),
                };
                let failed = item.is_err();
                if sender.send(item).is_err() || failed {
                    break;
                }
            }
        })
        .context("Failed to spawn stream reader thread")?;
    Ok(lines)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_reads_stdout_and_stderr() {
        let mut feed = CommandFeed::spawn(
            "demo",
            &sh("echo '2024-01-01T00:00:00Z out'; echo '2024-01-01T00:00:01Z err' >&2"),
        )
        .unwrap();

        let mut texts = Vec::new();
        while let Some(line) = feed.recv().unwrap() {
            texts.push(line.text);
        }
        texts.sort();
        assert_eq!(texts, vec!["err", "out"]);
    }

    #[test]
    fn test_interleaved_streams_stay_chronological() {
        let script = "i=0; while [ $i -lt 400 ]; do \
             line=$(printf '2024-07-27T12:%02d:%02dZ n%d' $((i / 60)) $((i % 60)) $i); \
             if [ $((i % 2)) -eq 0 ]; then echo \"$line\"; else echo \"$line\" >&2; fi; \
             i=$((i + 1)); done";
        let mut feed = CommandFeed::spawn("demo", &sh(script)).unwrap();

        let mut texts = Vec::new();
        while let Some(line) = feed.recv().unwrap() {
            texts.push(line.text);
        }
        let expected: Vec<String> = (0..400).map(|i| format!("n{}", i)).collect();
        assert_eq!(texts, expected);
    }

    #[test]
    fn test_silent_stream_does_not_hold_lines() {
        let mut feed =
            CommandFeed::spawn("demo", &sh("echo '2024-01-01T00:00:00Z early'; sleep 30")).unwrap();
        let started = Instant::now();
        assert_eq!(feed.recv().unwrap().map(|l| l.text), Some("early".to_string()));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_stdout_wins_timestamp_ties() {
        let mut feed = CommandFeed::spawn(
            "demo",
            &sh("echo '2024-01-01T00:00:00Z err' >&2; echo '2024-01-01T00:00:00Z out'"),
        )
        .unwrap();
        let first = feed.recv().unwrap().map(|l| l.text);
        let second = feed.recv().unwrap().map(|l| l.text);
        assert_eq!((first, second), (Some("out".to_string()), Some("err".to_string())));
    }

    #[test]
    fn test_nonzero_exit_is_an_error() {
        let mut feed = CommandFeed::spawn("demo", &sh("echo '2024-01-01T00:00:00Z x'; exit 3"))
            .unwrap();
        assert_eq!(feed.recv().unwrap().map(|l| l.text), Some("x".to_string()));
        assert!(feed.recv().is_err());
    }

    #[test]
    fn test_missing_program() {
        let argv = vec!["/nonexistent/mergetail-test-binary".to_string()];
        assert!(CommandFeed::spawn("demo", &argv).is_err());
    }

    #[test]
    fn test_empty_command() {
        assert!(CommandFeed::spawn("demo", &[]).is_err());
    }

    #[test]
    fn test_drop_kills_child() {
        let feed = CommandFeed::spawn("demo", &sh("sleep 30")).unwrap();
        drop(feed);
    }
}
