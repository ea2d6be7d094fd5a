// File replay adapter: one JSON-encoded MarketEvent per line

use std::path::PathBuf;

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{MarketEvent, VenueAdapter};

pub struct ReplayAdapter {
    name: String,
    path: PathBuf,
}

impl ReplayAdapter {
    pub fn new(name: &str, path: impl Into<PathBuf>) -> Self {
        Self { name: name.to_string(), path: path.into() }
    }

    /// Blank lines and `#` comments yield `None`; so do lines that fail to
    /// parse, after a warning.
    pub fn parse_line(line: &str, line_no: usize) -> Option<MarketEvent> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        match serde_json::from_str(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping malformed event");
                None
            }
        }
    }

    /// Forward every event in `reader`. Returns how many were sent; stops
    /// early when the receiver is gone.
    pub async fn replay<R>(reader: R, tx: &mpsc::Sender<MarketEvent>) -> anyhow::Result<usize>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut line_no = 0;
        let mut sent = 0;
        while let Some(line) = lines.next_line().await.context("reading event stream")? {
            line_no += 1;
            let Some(event) = Self::parse_line(&line, line_no) else { continue };
            if tx.send(event).await.is_err() {
                debug!(sent, "Receiver closed, stopping replay");
                break;
            }
            sent += 1;
        }
        Ok(sent)
    }
}

#[async_trait::async_trait]
impl VenueAdapter for ReplayAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn spawn(&self, tx: mpsc::Sender<MarketEvent>) -> anyhow::Result<()> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        info!(adapter = %self.name, path = %self.path.display(), "Replaying events");
        let sent = Self::replay(BufReader::new(file), &tx).await?;
        info!(adapter = %self.name, sent, "Replay finished");
        Ok(())
    }
}
