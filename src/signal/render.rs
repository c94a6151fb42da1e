//! Signal Rendering
//! Mission: Deterministic chat text for every bridge event

use crate::models::SignalEvent;

/// Trade direction as it appears in rendered notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &str {
        match self {
            Direction::Buy => "BUY",
            Direction::Sell => "SELL",
        }
    }
}

/// How an action string renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionClass {
    Entry(Direction),
    Exit,
    Generic,
}

fn classify(action: &str) -> ActionClass {
    match action {
        "BUY" => ActionClass::Entry(Direction::Buy),
        "SELL" => ActionClass::Entry(Direction::Sell),
        "CLOSE" | "CLOSE_BUY" | "CLOSE_SELL" => ActionClass::Exit,
        _ => ActionClass::Generic,
    }
}

/// Direction of a closed position, best effort.
///
/// Resolution order: explicit action suffix, then the `direction` field,
/// then a scan of the free-text comment for the BUY/SELL substrings.
/// Unresolvable directions are omitted from the notice rather than
/// guessed.
pub fn resolve_exit_direction(event: &SignalEvent) -> Option<Direction> {
    match event.action.as_str() {
        "CLOSE_BUY" => return Some(Direction::Buy),
        "CLOSE_SELL" => return Some(Direction::Sell),
        _ => {}
    }

    if let Some(direction) = &event.direction {
        match direction.trim().to_uppercase().as_str() {
            "BUY" => return Some(Direction::Buy),
            "SELL" => return Some(Direction::Sell),
            _ => {}
        }
    }

    if let Some(comment) = &event.comment {
        if comment.contains("BUY") {
            return Some(Direction::Buy);
        }
        if comment.contains("SELL") {
            return Some(Direction::Sell);
        }
    }

    None
}

/// Render a bridge event into the chat text that gets persisted and
/// broadcast. Optional lines appear only when the field is present.
pub fn render_signal(event: &SignalEvent) -> String {
    match classify(&event.action) {
        ActionClass::Entry(direction) => {
            let mut lines = vec![
                "🔔 New Position".to_string(),
                String::new(),
                format!("Symbol: {}", event.symbol),
                format!("Direction: {}", direction.as_str()),
                format!("Entry: {}", event.price),
            ];
            if let Some(sl) = event.sl {
                lines.push(format!("Stop Loss: {}", sl));
            }
            if let Some(tp) = event.tp {
                lines.push(format!("Take Profit: {}", tp));
            }
            if let Some(lots) = event.lots {
                lines.push(format!("Lots: {}", lots));
            }
            lines.join("\n")
        }
        ActionClass::Exit => {
            let mut lines = vec![
                "✅ Position Closed".to_string(),
                String::new(),
                format!("Symbol: {}", event.symbol),
            ];
            if let Some(direction) = resolve_exit_direction(event) {
                lines.push(format!("Direction: {}", direction.as_str()));
            }
            lines.push(format!("Exit: {}", event.price));
            if let Some(ticket) = event.ticket {
                lines.push(format!("Ticket: #{}", ticket));
            }
            lines.join("\n")
        }
        ActionClass::Generic => {
            format!("📌 {} {} @ {}", event.action, event.symbol, event.price)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(action: &str) -> SignalEvent {
        SignalEvent {
            symbol: "EURUSD".to_string(),
            action: action.to_string(),
            price: 1.1,
            sl: None,
            tp: None,
            lots: None,
            ticket: None,
            comment: None,
            direction: None,
        }
    }

    #[test]
    fn test_entry_notice_includes_optional_levels_only_when_present() {
        let bare = render_signal(&event("BUY"));
        assert!(bare.contains("🔔 New Position"));
        assert!(bare.contains("Direction: BUY"));
        assert!(bare.contains("Entry: 1.1"));
        assert!(!bare.contains("Stop Loss"));
        assert!(!bare.contains("Take Profit"));

        let mut full = event("SELL");
        full.sl = Some(1.095);
        full.tp = Some(1.11);
        full.lots = Some(0.5);
        let rendered = render_signal(&full);
        assert!(rendered.contains("Direction: SELL"));
        assert!(rendered.contains("Stop Loss: 1.095"));
        assert!(rendered.contains("Take Profit: 1.11"));
        assert!(rendered.contains("Lots: 0.5"));
    }

    #[test]
    fn test_exit_direction_from_action_suffix() {
        assert_eq!(
            resolve_exit_direction(&event("CLOSE_BUY")),
            Some(Direction::Buy)
        );
        assert_eq!(
            resolve_exit_direction(&event("CLOSE_SELL")),
            Some(Direction::Sell)
        );
    }

    #[test]
    fn test_exit_direction_from_explicit_field() {
        let mut e = event("CLOSE");
        e.direction = Some("sell".to_string());
        assert_eq!(resolve_exit_direction(&e), Some(Direction::Sell));
    }

    #[test]
    fn test_exit_direction_from_comment_scan() {
        let mut e = event("CLOSE");
        e.comment = Some("tp hit on BUY leg".to_string());
        assert_eq!(resolve_exit_direction(&e), Some(Direction::Buy));

        e.comment = Some("SELL stopped out".to_string());
        assert_eq!(resolve_exit_direction(&e), Some(Direction::Sell));

        // Comment scan is case-sensitive.
        e.comment = Some("closed the buy leg".to_string());
        assert_eq!(resolve_exit_direction(&e), None);
    }

    #[test]
    fn test_exit_direction_field_beats_comment() {
        let mut e = event("CLOSE");
        e.direction = Some("BUY".to_string());
        e.comment = Some("SELL".to_string());
        assert_eq!(resolve_exit_direction(&e), Some(Direction::Buy));
    }

    #[test]
    fn test_exit_notice_omits_unresolvable_direction() {
        let mut e = event("CLOSE");
        e.ticket = Some(99123);
        let rendered = render_signal(&e);
        assert!(rendered.contains("✅ Position Closed"));
        assert!(!rendered.contains("Direction:"));
        assert!(rendered.contains("Exit: 1.1"));
        assert!(rendered.contains("Ticket: #99123"));
    }

    #[test]
    fn test_unknown_action_renders_generic_notice() {
        let rendered = render_signal(&event("MODIFY"));
        assert_eq!(rendered, "📌 MODIFY EURUSD @ 1.1");

        let rendered = render_signal(&event("HEDGE"));
        assert!(rendered.contains("HEDGE"));
        assert!(rendered.contains("1.1"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let mut e = event("BUY");
        e.sl = Some(1.095);
        assert_eq!(render_signal(&e), render_signal(&e));
    }
}
