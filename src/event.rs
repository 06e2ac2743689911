use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Interactive session events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// A line typed at the prompt
  Input(String),
  /// Debounced search text, ready to apply
  Search(String),
  /// Periodic tick for query polling and cache cleanup
  Tick,
  /// Standard input closed
  Eof,
}

/// Event handler that produces events from stdin lines and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let input_tx = tx.clone();
    tokio::spawn(async move {
      let mut lines = BufReader::new(tokio::io::stdin()).lines();
      loop {
        let event = match lines.next_line().await {
          Ok(Some(line)) => Event::Input(line),
          Ok(None) => Event::Eof,
          Err(e) => {
            debug!(error = %e, "stdin read failed");
            Event::Eof
          }
        };
        let done = event == Event::Eof;
        if input_tx.send(event).is_err() || done {
          break;
        }
      }
    });

    let tick_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      loop {
        interval.tick().await;
        if tick_tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for events produced elsewhere, such as the search debouncer
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
