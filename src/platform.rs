use anyhow::Result;
use crossbeam_channel::Sender;
use std::io::{self, Write};
use std::process;
use std::thread;

#[cfg(unix)]
use signal_hook::{
    consts::{SIGINT, SIGPIPE, SIGTERM, SIGUSR1},
    iterator::Signals,
};

#[cfg(windows)]
use signal_hook::{consts::SIGINT, flag};

/// Standard Unix exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    InvalidUsage = 2,
    SignalInt = 130,  // 128 + SIGINT (2)
    SignalPipe = 141, // 128 + SIGPIPE (13)
    SignalTerm = 143, // 128 + SIGTERM (15)
}

impl ExitCode {
    pub fn exit(self) -> ! {
        process::exit(self as i32)
    }
}

/// Messages from the signal thread to the main thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ctrl {
    Shutdown { exit_code: ExitCode },
    PrintStats,
}

/// Background thread translating signals into [`Ctrl`] messages. A second
/// SIGINT/SIGTERM exits on the spot.
pub struct SignalHandler {
    _handle: thread::JoinHandle<()>,
}

impl SignalHandler {
    pub fn new(ctrl_sender: Sender<Ctrl>) -> Result<Self> {
        #[cfg(unix)]
        {
            let mut signals = Signals::new([SIGINT, SIGPIPE, SIGTERM, SIGUSR1])?;

            let handle = thread::Builder::new()
                .name("signals".to_string())
                .spawn(move || {
                    let mut shutdown_count = 0;
                    for sig in signals.forever() {
                        let exit_code = match sig {
                            SIGINT => ExitCode::SignalInt,
                            SIGTERM => ExitCode::SignalTerm,
                            SIGPIPE => ExitCode::SignalPipe.exit(),
                            SIGUSR1 => {
                                let _ = ctrl_sender.send(Ctrl::PrintStats);
                                continue;
                            }
                            _ => continue,
                        };
                        shutdown_count += 1;
                        tracing::debug!(signal = sig, "shutdown requested");
                        if shutdown_count > 1 {
                            exit_code.exit();
                        }
                        let _ = ctrl_sender.send(Ctrl::Shutdown { exit_code });
                    }
                })?;

            Ok(SignalHandler { _handle: handle })
        }

        #[cfg(windows)]
        {
            let term_flag = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
            flag::register(SIGINT, std::sync::Arc::clone(&term_flag))?;

            let handle = thread::Builder::new()
                .name("signals".to_string())
                .spawn(move || {
                    let mut shutdown_count = 0;
                    loop {
                        thread::sleep(std::time::Duration::from_millis(100));
                        if term_flag.swap(false, std::sync::atomic::Ordering::Relaxed) {
                            shutdown_count += 1;
                            if shutdown_count > 1 {
                                ExitCode::SignalInt.exit();
                            }
                            let _ = ctrl_sender.send(Ctrl::Shutdown {
                                exit_code: ExitCode::SignalInt,
                            });
                        }
                    }
                })?;

            Ok(SignalHandler { _handle: handle })
        }
    }
}

/// Stdout writer that exits quietly with 141 when the reader goes away
pub struct SafeStdout {
    stdout: io::Stdout,
}

impl SafeStdout {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for SafeStdout {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for SafeStdout {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf).map_err(exit_on_broken_pipe)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush().map_err(exit_on_broken_pipe)
    }
}

fn exit_on_broken_pipe(e: io::Error) -> io::Error {
    if is_broken_pipe(&e) {
        ExitCode::SignalPipe.exit();
    }
    e
}

fn is_broken_pipe(e: &io::Error) -> bool {
    #[cfg(windows)]
    {
        e.kind() == io::ErrorKind::BrokenPipe
            || e.raw_os_error() == Some(232) // ERROR_NO_DATA
            || e.raw_os_error() == Some(109) // ERROR_BROKEN_PIPE
    }
    #[cfg(not(windows))]
    {
        e.kind() == io::ErrorKind::BrokenPipe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::GeneralError as i32, 1);
        assert_eq!(ExitCode::InvalidUsage as i32, 2);
        assert_eq!(ExitCode::SignalInt as i32, 130);
        assert_eq!(ExitCode::SignalPipe as i32, 141);
        assert_eq!(ExitCode::SignalTerm as i32, 143);
    }

    #[test]
    fn test_broken_pipe_detection() {
        assert!(is_broken_pipe(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(!is_broken_pipe(&io::Error::from(io::ErrorKind::NotFound)));
    }
}
