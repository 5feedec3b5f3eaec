//! User-Agent classification
//!
//! Coarse device class for audit entries, and the crawler filter applied to
//! the chat API.

use regex::Regex;
use serde::Serialize;

/// Coarse device class derived from a `User-Agent` header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Bot,
    Tablet,
    Mobile,
    Desktop,
    Unknown,
}

/// Pattern table for user agents
pub struct UserAgentFilter {
    bot_patterns: Vec<Regex>,
    tablet_patterns: Vec<Regex>,
    mobile_patterns: Vec<Regex>,
}

impl UserAgentFilter {
    pub fn new() -> Self {
        Self {
            bot_patterns: compile(&[
                r"(?i)bot\b|bot/|crawler|spider|slurp",
                r"(?i)curl/|wget/|python-requests|python-urllib|aiohttp|httpx",
                r"(?i)go-http-client|java/|okhttp|libwww-perl|scrapy",
                r"(?i)headlesschrome|phantomjs|selenium|puppeteer|playwright",
                r"(?i)gptbot|claudebot|ccbot|bytespider|petalbot|ahrefs|semrush",
            ]),
            tablet_patterns: compile(&[r"(?i)ipad|tablet|kindle|silk/|playbook"]),
            mobile_patterns: compile(&[r"(?i)mobi|iphone|ipod|android|blackberry|opera mini"]),
        }
    }

    pub fn is_bot(&self, user_agent: &str) -> bool {
        self.bot_patterns.iter().any(|p| p.is_match(user_agent))
    }

    pub fn classify(&self, user_agent: Option<&str>) -> DeviceClass {
        let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
            return DeviceClass::Unknown;
        };

        if self.is_bot(ua) {
            DeviceClass::Bot
        } else if self.tablet_patterns.iter().any(|p| p.is_match(ua)) {
            DeviceClass::Tablet
        } else if self.mobile_patterns.iter().any(|p| p.is_match(ua)) {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
}

impl Default for UserAgentFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIREFOX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 Mobile/15E148";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15";

    #[test]
    fn test_bots_detected() {
        let filter = UserAgentFilter::new();
        assert!(filter.is_bot("Googlebot/2.1 (+http://www.google.com/bot.html)"));
        assert!(filter.is_bot("curl/8.5.0"));
        assert!(filter.is_bot("python-requests/2.31"));
        assert!(filter.is_bot("Mozilla/5.0 (compatible; GPTBot/1.1)"));
        assert!(!filter.is_bot(FIREFOX));
        assert!(!filter.is_bot(IPHONE));
    }

    #[test]
    fn test_device_classes() {
        let filter = UserAgentFilter::new();
        assert_eq!(filter.classify(Some(FIREFOX)), DeviceClass::Desktop);
        assert_eq!(filter.classify(Some(IPHONE)), DeviceClass::Mobile);
        assert_eq!(filter.classify(Some(IPAD)), DeviceClass::Tablet);
        assert_eq!(filter.classify(Some("curl/8.5.0")), DeviceClass::Bot);
        assert_eq!(filter.classify(None), DeviceClass::Unknown);
        assert_eq!(filter.classify(Some("  ")), DeviceClass::Unknown);
    }
}
