//! CLI channel: stdin/stdout harness for driving the gate locally.
//!
//! Input lines:
//! - `sender: text`: a direct message
//! - `sender > quoted: text`: a reply quoting `quoted`'s message
//! - `!availability <offline|busy|online>` and `!stats`: harness controls
//!
//! Senders ending in `@g.us` are treated as groups. The configured operator
//! key marks operator messages.

use async_trait::async_trait;
use futures::stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::channels::{Channel, ChannelEvent, MessageStream};
use crate::error::ChannelError;
use crate::router::{InboundMessage, OutboundAction};

const GROUP_SUFFIX: &str = "@g.us";

pub struct CliChannel {
    operator: Option<String>,
}

impl CliChannel {
    pub fn new(operator: Option<String>) -> Self {
        Self { operator }
    }

    /// Parse one input line into an event.
    pub fn parse_line(&self, line: &str) -> Result<ChannelEvent, ChannelError> {
        let line = line.trim();

        if let Some(control) = line.strip_prefix('!') {
            let mut parts = control.split_whitespace();
            return match (parts.next(), parts.next()) {
                (Some("availability"), Some(state)) => state
                    .parse()
                    .map(ChannelEvent::SetAvailability)
                    .map_err(|e| ChannelError::InvalidMessage(e.to_string())),
                (Some("stats"), None) => Ok(ChannelEvent::ShowStats),
                _ => Err(ChannelError::InvalidMessage(format!(
                    "unknown control '{control}'"
                ))),
            };
        }

        let (head, text) = line
            .split_once(':')
            .ok_or_else(|| ChannelError::InvalidMessage("expected 'sender: text'".into()))?;
        let (sender, quoted) = match head.split_once('>') {
            Some((sender, quoted)) => (sender.trim(), Some(quoted.trim())),
            None => (head.trim(), None),
        };
        if sender.is_empty() {
            return Err(ChannelError::InvalidMessage("empty sender".into()));
        }

        let mut msg = InboundMessage::new(sender, text.trim());
        if sender.ends_with(GROUP_SUFFIX) {
            msg = msg.in_group();
        }
        if self.operator.as_deref() == Some(sender) {
            msg = msg.from_operator();
        }
        if let Some(quoted) = quoted.filter(|q| !q.is_empty()) {
            msg = msg.quoting(quoted);
        }
        Ok(ChannelEvent::Message(msg))
    }

    fn send_failed(&self, err: std::io::Error) -> ChannelError {
        ChannelError::SendFailed {
            name: self.name().to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<MessageStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let parser = CliChannel::new(self.operator.clone());

        tokio::spawn(async move {
            let stdin = tokio::io::stdin();
            let reader = BufReader::new(stdin);
            let mut lines = reader.lines();

            eprint!("> ");

            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            eprint!("> ");
                            continue;
                        }
                        match parser.parse_line(&line) {
                            Ok(event) => {
                                if tx.send(event).is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                eprintln!("⚠️  {}", e);
                                eprint!("> ");
                            }
                        }
                    }
                    Ok(None) => break, // EOF
                    Err(e) => {
                        tracing::error!("Error reading stdin: {}", e);
                        break;
                    }
                }
            }
        });

        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn respond(
        &self,
        msg: &InboundMessage,
        action: &OutboundAction,
    ) -> Result<(), ChannelError> {
        let Some(text) = action.render_text() else {
            eprintln!("(dropped message from {})", msg.sender);
            eprint!("> ");
            return Ok(());
        };

        let mut stdout = tokio::io::stdout();
        let rendered = format!("\n[to {}]\n{}\n\n", msg.sender, text);
        stdout
            .write_all(rendered.as_bytes())
            .await
            .map_err(|e| self.send_failed(e))?;
        stdout.flush().await.map_err(|e| self.send_failed(e))?;
        eprint!("> ");
        Ok(())
    }
}
