use anyhow::{Context, Result};
use std::thread::{self, JoinHandle};

use super::LineSender;
use crate::feeds::SourceFeed;

/// Pump one feed into its queue on a dedicated thread. The thread ends when
/// the feed closes, fails, or the engine goes away.
pub(super) fn spawn_worker(
    sender: LineSender,
    feed: Box<dyn SourceFeed>,
) -> Result<JoinHandle<()>> {
    let name = format!("feed-{}", sender.source());
    thread::Builder::new()
        .name(name)
        .spawn(move || run_worker(sender, feed))
        .context("Failed to spawn feed worker thread")
}

fn run_worker(sender: LineSender, mut feed: Box<dyn SourceFeed>) {
    tracing::debug!(source = sender.source(), "feed started");
    let mut forwarded: u64 = 0;
    loop {
        match feed.recv() {
            Ok(Some(line)) => {
                if let Err(err) = sender.send(line.timestamp, line.text) {
                    tracing::debug!(source = sender.source(), "{:#}", err);
                    return;
                }
                forwarded += 1;
            }
            Ok(None) => {
                tracing::info!(source = sender.source(), lines = forwarded, "feed closed");
                return;
            }
            Err(err) => {
                tracing::warn!(
                    source = sender.source(),
                    lines = forwarded,
                    "feed failed: {:#}",
                    err
                );
                return;
            }
        }
    }
}
