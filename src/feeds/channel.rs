use anyhow::Result;
use crossbeam_channel::Receiver;

use super::{FeedLine, SourceFeed};

/// Feed backed by a channel; closes once every sender is dropped.
pub struct ChannelFeed {
    receiver: Receiver<FeedLine>,
}

impl ChannelFeed {
    pub fn new(receiver: Receiver<FeedLine>) -> Self {
        Self { receiver }
    }
}

impl SourceFeed for ChannelFeed {
    fn recv(&mut self) -> Result<Option<FeedLine>> {
        Ok(self.receiver.recv().ok())
    }
}
