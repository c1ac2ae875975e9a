use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;

use super::AlertSink;
use crate::errors::SinkError;
use crate::models::{short_address, Alert, Side, SignalType};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram Bot API sink.
#[derive(Debug, Clone)]
pub struct TelegramSink {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramSink {
    pub fn new(bot_token: String, chat_id: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: TELEGRAM_API_BASE.into(),
            bot_token,
            chat_id,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub async fn send_text(&self, message: &str) -> Result<(), SinkError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);

        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(SinkError::Rejected(format!(
                "sendMessage returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        self.send_text(&format_alert(alert)).await?;
        tracing::debug!(trade_id = %alert.trade().id(), "Alert sent to Telegram");
        Ok(())
    }
}

fn confidence_marker(confidence: Decimal) -> &'static str {
    if confidence >= Decimal::new(8, 1) {
        "🔥"
    } else if confidence >= Decimal::new(6, 1) {
        "⚡"
    } else {
        "💡"
    }
}

fn signal_marker(signal_type: SignalType) -> &'static str {
    match signal_type {
        SignalType::FreshWallet => "🆕",
        SignalType::SizeAnomaly => "📊",
        SignalType::Timing => "⏰",
        SignalType::OddsMovement => "📈",
        SignalType::Contrarian => "🔄",
        SignalType::Clustering => "🎯",
    }
}

fn percent(value: Decimal, dp: u32) -> String {
    format!("{}%", (value * Decimal::ONE_HUNDRED).round_dp(dp))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Render an alert as a Telegram HTML message.
pub fn format_alert(alert: &Alert) -> String {
    let trade = alert.trade();
    let wallet = alert.wallet();

    let side = match trade.side() {
        Side::Yes => "🟢 YES",
        Side::No => "🔴 NO",
    };
    let signals = alert
        .signals()
        .iter()
        .map(|s| format!("{}{}", signal_marker(s.signal_type), s.signal_type.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let change = alert.odds_after() - alert.odds_before();
    let change = if change > Decimal::ZERO {
        format!("+{}", percent(change, 1))
    } else {
        percent(change, 1)
    };

    let mut wallet_line = short_address(trade.wallet());
    if wallet.total_trades == 0 {
        wallet_line = format!("🆕 {wallet_line}");
    }

    [
        format!(
            "{} <b>POLYMARKET ALERT</b>",
            confidence_marker(alert.confidence().value())
        ),
        String::new(),
        format!("📊 <b>{}</b>", escape_html(&alert.market().question)),
        format!("📁 {}", alert.market().category.as_str()),
        String::new(),
        format!("👛 <code>{wallet_line}</code>"),
        format!("💰 <b>${}</b>", trade.size_usd().round_dp(0)),
        format!("📈 {} @ {}", side, percent(trade.price(), 1)),
        String::new(),
        format!("⚡ <b>Signals:</b> {signals}"),
        format!(
            "📉 Odds: {} → {} ({})",
            percent(alert.odds_before(), 1),
            percent(alert.odds_after(), 1),
            change
        ),
        format!("🎯 Confidence: <b>{}</b>", alert.confidence()),
        String::new(),
        "👤 Wallet stats:".to_string(),
        format!("   • Trades: {}", wallet.total_trades),
        format!("   • Win rate: {}", percent(wallet.win_rate, 0)),
        format!("   • Avg size: ${}", wallet.avg_trade_size.round_dp(0)),
    ]
    .join("\n")
}
