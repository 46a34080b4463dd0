pub mod email;
pub mod telegram;

pub use email::EmailNotifier;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::NotificationError;
use crate::models::{ExecutedTrade, TradeKind};
use crate::report::WeeklyReport;

/// Something worth telling the outside world
#[derive(Debug, Clone)]
pub enum Notification {
    Startup {
        symbol: String,
        source: String,
        equity: f64,
    },
    Trade {
        symbol: String,
        trade: ExecutedTrade,
        cash_after: f64,
        holdings_after: f64,
    },
    CycleError {
        message: String,
    },
    WeeklyReport(WeeklyReport),
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Startup { .. } => "startup",
            Notification::Trade { .. } => "trade",
            Notification::CycleError { .. } => "cycle_error",
            Notification::WeeklyReport(_) => "weekly_report",
        }
    }

    /// Markdown text for chat channels
    pub fn chat_text(&self) -> String {
        match self {
            Notification::Startup {
                symbol,
                source,
                equity,
            } => format!(
                "*Bot started*\nPair: {} | Data: {}\nPortfolio value: ${:.2}",
                escape_markdown(symbol),
                escape_markdown(source),
                equity
            ),
            Notification::Trade {
                symbol,
                trade,
                cash_after,
                holdings_after,
            } => {
                let label = match trade.kind {
                    TradeKind::Accumulate => "DCA BUY",
                    TradeKind::StopLoss => "STOP-LOSS SELL",
                    TradeKind::TakeProfit => "TAKE-PROFIT SELL",
                };
                let mut text = format!(
                    "*{}* {}\nQty: {:.6} @ ${:.2}\nAmount: ${:.2} | Fee: ${:.2}",
                    label,
                    escape_markdown(symbol),
                    trade.fill.quantity,
                    trade.fill.price,
                    trade.quote_amount,
                    trade.fill.fee
                );
                if let Some(pnl) = trade.realized_pnl {
                    text.push_str(&format!("\nRealized P/L: {:+.2} USD", pnl));
                }
                text.push_str(&format!(
                    "\nCash: ${:.2} | Holdings: {:.6}",
                    cash_after, holdings_after
                ));
                text
            }
            Notification::CycleError { message } => {
                format!("*Cycle error*\n{}", escape_markdown(message))
            }
            Notification::WeeklyReport(report) => report.telegram_text(),
        }
    }
}

/// Escape free text for Telegram's legacy Markdown, where a stray `_` or `*`
/// fails the whole message
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// A delivery channel
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this channel wants the notification at all
    fn accepts(&self, notification: &Notification) -> bool;

    async fn send(&self, notification: &Notification) -> Result<(), NotificationError>;
}

/// Fire-and-forget publisher in front of the notifiers
///
/// `publish` never blocks the caller; when the queue is full the message is
/// dropped with a warning. A single dispatcher task delivers to each notifier
/// in turn and logs failures.
#[derive(Clone)]
pub struct NotificationHub {
    tx: Option<mpsc::Sender<Notification>>,
}

impl NotificationHub {
    /// Start the dispatcher task. It exits once every hub clone is dropped
    /// and the queue is drained.
    pub fn spawn(notifiers: Vec<Box<dyn Notifier>>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        tracing::info!(
            channels = ?notifiers.iter().map(|n| n.name().to_string()).collect::<Vec<_>>(),
            capacity,
            "Notification hub started"
        );

        let handle = tokio::spawn(dispatch(rx, notifiers));
        (Self { tx: Some(tx) }, handle)
    }

    /// A hub that drops everything
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue a notification; returns whether it was accepted
    pub fn publish(&self, notification: Notification) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        let kind = notification.kind();
        match tx.try_send(notification) {
            Ok(()) => {
                tracing::debug!(kind, "Queued notification");
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(kind, "Notification queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!(kind, "Notification dispatcher stopped, dropping message");
                false
            }
        }
    }
}

async fn dispatch(mut rx: mpsc::Receiver<Notification>, notifiers: Vec<Box<dyn Notifier>>) {
    while let Some(notification) = rx.recv().await {
        for notifier in notifiers.iter().filter(|n| n.accepts(&notification)) {
            match notifier.send(&notification).await {
                Ok(()) => tracing::debug!(
                    channel = notifier.name(),
                    kind = notification.kind(),
                    "Notification delivered"
                ),
                Err(e) => tracing::warn!(
                    channel = notifier.name(),
                    kind = notification.kind(),
                    error = %e,
                    "Notification failed"
                ),
            }
        }
    }

    tracing::debug!("Notification dispatcher finished");
}
