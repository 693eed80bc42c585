use regex::Regex;

/// Extracts the login ticket from a QR payload.
///
/// A payload carries a ticket when it contains `ticket=` followed by one or more hex
/// digits (`https://user.mihoyo.com/qr_code_in_game.html?app_id=4&ticket=60a7...`).
/// Anything else is simply not a ticket payload.
pub struct TicketExtractor {
    /// Regex capturing the hex run after `ticket=`
    pattern: Regex,
}

impl TicketExtractor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(r"ticket=([0-9a-fA-F]+)").expect("Invalid ticket regex"),
        }
    }

    /// The ticket embedded in `payload`, or `None` for non-ticket payloads.
    pub fn extract<'a>(&self, payload: &'a str) -> Option<&'a str> {
        self.pattern
            .captures(payload)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

impl Default for TicketExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_hex_ticket() {
        let extractor = TicketExtractor::new();
        assert_eq!(extractor.extract("https://x?ticket=ab12cd34"), Some("ab12cd34"));
        assert_eq!(
            extractor.extract("https://user.mihoyo.com/qr_code_in_game.html?app_id=4&ticket=60A7fe01&biz_key=hk4e_cn"),
            Some("60A7fe01")
        );
    }

    #[test]
    fn test_stops_at_first_non_hex() {
        let extractor = TicketExtractor::new();
        assert_eq!(extractor.extract("ticket=abcxyz"), Some("abc"));
    }

    #[test]
    fn test_non_ticket_payloads() {
        let extractor = TicketExtractor::new();
        assert_eq!(extractor.extract("https://x?foo=bar"), None);
        assert_eq!(extractor.extract("ticket="), None);
        assert_eq!(extractor.extract("ticket=zz99"), None);
        assert_eq!(extractor.extract(""), None);
    }
}
