// AccessCrab - GPL-3.0-or-later
// This file is part of AccessCrab.
//
// Copyright (C) 2026 Daniel Freiermuth
//
// AccessCrab is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// AccessCrab is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with AccessCrab.  If not, see <https://www.gnu.org/licenses/>.

//! Keyword-based user-agent classification.
//!
//! Classification policy is plain data: ordered [`KeywordRule`]s per
//! category, first match wins. The built-in tables can be replaced through
//! the config file.

use super::LabelHits;
use crate::parser::entry::LogEntry;
use serde::{Deserialize, Serialize};

/// Label assigned when any keyword of `any_of` occurs and none of `none_of`
/// does. Matching is case-insensitive substring containment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub label: String,
    #[serde(default)]
    pub any_of: Vec<String>,
    #[serde(default)]
    pub none_of: Vec<String>,
}

impl KeywordRule {
    fn new(label: &str, any_of: &[&str], none_of: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            any_of: any_of.iter().map(|k| (*k).to_string()).collect(),
            none_of: none_of.iter().map(|k| (*k).to_string()).collect(),
        }
    }

    /// `ua_lower` must already be lowercased.
    fn matches(&self, ua_lower: &str) -> bool {
        let contains = |keyword: &String| ua_lower.contains(&keyword.to_lowercase());
        self.any_of.iter().any(contains) && !self.none_of.iter().any(contains)
    }
}

/// Ordered rules for one category plus the label used when nothing matches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub rules: Vec<KeywordRule>,
    pub default_label: String,
}

impl RuleSet {
    pub fn classify(&self, ua_lower: &str) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(ua_lower))
            .map_or(self.default_label.as_str(), |rule| rule.label.as_str())
    }
}

/// Browser, device and OS of one user agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UaClass<'a> {
    pub browser: &'a str,
    pub device: &'a str,
    pub operating_system: &'a str,
}

/// The full classification policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UaClassifier {
    pub browsers: RuleSet,
    pub devices: RuleSet,
    pub operating_systems: RuleSet,
    /// Substrings marking automated clients
    pub bot_markers: Vec<String>,
}

impl Default for UaClassifier {
    fn default() -> Self {
        // Chromium Edge and Opera also announce "Chrome" and "Safari", and
        // Chrome announces "Safari", hence the order and the exclusions.
        let browsers = RuleSet {
            rules: vec![
                KeywordRule::new("Edge", &["edg/", "edge/", "edga/", "edgios/"], &[]),
                KeywordRule::new("Chrome", &["chrome", "crios", "chromium"], &["opr/", "opera"]),
                KeywordRule::new("Firefox", &["firefox", "fxios"], &[]),
                KeywordRule::new("Safari", &["safari"], &["chrome", "crios", "chromium"]),
                KeywordRule::new("Opera", &["opr/", "opera"], &[]),
                KeywordRule::new("Internet Explorer", &["msie", "trident"], &[]),
            ],
            default_label: "Other".to_string(),
        };
        let devices = RuleSet {
            rules: vec![
                KeywordRule::new("Tablet", &["ipad", "tablet"], &[]),
                // Android tablets omit the "Mobile" token phones carry
                KeywordRule::new("Tablet", &["android"], &["mobile"]),
                KeywordRule::new("Mobile", &["mobile", "iphone", "android"], &[]),
            ],
            default_label: "Desktop".to_string(),
        };
        let operating_systems = RuleSet {
            rules: vec![
                KeywordRule::new("Windows", &["windows"], &[]),
                KeywordRule::new("iOS", &["iphone", "ipad", "ipod"], &[]),
                KeywordRule::new("macOS", &["mac os x", "macintosh"], &[]),
                KeywordRule::new("Android", &["android"], &[]),
                KeywordRule::new("Linux", &["linux", "x11"], &[]),
            ],
            default_label: "Other".to_string(),
        };
        Self {
            browsers,
            devices,
            operating_systems,
            bot_markers: ["bot", "spider", "crawl", "scrape"]
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
        }
    }
}

impl UaClassifier {
    pub fn classify(&self, user_agent: &str) -> UaClass<'_> {
        let ua_lower = user_agent.to_lowercase();
        UaClass {
            browser: self.browsers.classify(&ua_lower),
            device: self.devices.classify(&ua_lower),
            operating_system: self.operating_systems.classify(&ua_lower),
        }
    }

    pub fn is_bot(&self, user_agent: &str) -> bool {
        let ua_lower = user_agent.to_lowercase();
        self.bot_markers
            .iter()
            .any(|marker| ua_lower.contains(&marker.to_lowercase()))
    }
}

/// Per-category hit counts, each sorted by hits descending
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAgentBreakdown {
    pub browsers: Vec<LabelHits>,
    pub devices: Vec<LabelHits>,
    pub operating_systems: Vec<LabelHits>,
}

/// Classify every entry's user agent; each entry counts once per category.
pub fn classify_user_agents(entries: &[LogEntry], classifier: &UaClassifier) -> UserAgentBreakdown {
    profiling::scope!("classify_user_agents");

    let classes: Vec<UaClass<'_>> = entries
        .iter()
        .map(|entry| classifier.classify(&entry.user_agent))
        .collect();

    UserAgentBreakdown {
        browsers: super::label_hits(classes.iter().map(|c| c.browser)),
        devices: super::label_hits(classes.iter().map(|c| c.device)),
        operating_systems: super::label_hits(classes.iter().map(|c| c.operating_system)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const FIREFOX_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";
    const OPERA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36 OPR/105.0.0.0";
    const IE: &str = "Mozilla/5.0 (Windows NT 10.0; Trident/7.0; rv:11.0) like Gecko";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const EDGE_IOS: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 EdgiOS/120.0.2210.150 Mobile/15E148 Safari/605.1.15";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_browser_precedence() {
        let classifier = UaClassifier::default();
        assert_eq!(classifier.classify(CHROME).browser, "Chrome");
        assert_eq!(classifier.classify(EDGE).browser, "Edge");
        assert_eq!(classifier.classify(SAFARI_IPHONE).browser, "Safari");
        assert_eq!(classifier.classify(FIREFOX_LINUX).browser, "Firefox");
        assert_eq!(classifier.classify(OPERA).browser, "Opera");
        assert_eq!(classifier.classify(IE).browser, "Internet Explorer");
        assert_eq!(classifier.classify("curl/8.4.0").browser, "Other");
    }

    #[test]
    fn test_edge_needs_a_product_token() {
        let classifier = UaClassifier::default();
        assert_eq!(classifier.classify(EDGE_IOS).browser, "Edge");
        assert_eq!(classifier.classify("KnowledgeFetcher/1.0").browser, "Other");
        assert_eq!(classifier.classify("HedgeHog/2.0 Firefox/121.0").browser, "Firefox");
    }

    #[test]
    fn test_devices_and_operating_systems() {
        let classifier = UaClassifier::default();
        let iphone = classifier.classify(SAFARI_IPHONE);
        assert_eq!((iphone.device, iphone.operating_system), ("Mobile", "iOS"));
        let ipad = classifier.classify(IPAD);
        assert_eq!((ipad.device, ipad.operating_system), ("Tablet", "iOS"));
        let android = classifier.classify(ANDROID);
        assert_eq!((android.device, android.operating_system), ("Mobile", "Android"));
        let android_tablet = classifier.classify(ANDROID_TABLET);
        assert_eq!((android_tablet.device, android_tablet.operating_system), ("Tablet", "Android"));
        let linux = classifier.classify(FIREFOX_LINUX);
        assert_eq!((linux.device, linux.operating_system), ("Desktop", "Linux"));
        assert_eq!(classifier.classify(OPERA).operating_system, "macOS");
        assert_eq!(classifier.classify(CHROME).operating_system, "Windows");
    }

    #[test]
    fn test_bot_markers() {
        let classifier = UaClassifier::default();
        assert!(classifier.is_bot(GOOGLEBOT));
        assert!(classifier.is_bot("Baiduspider"));
        assert!(classifier.is_bot("SiteCrawler/1.0"));
        assert!(!classifier.is_bot(CHROME));
    }

    #[test]
    fn test_custom_rules_override_defaults() {
        let classifier = UaClassifier {
            browsers: RuleSet {
                rules: vec![KeywordRule::new("Curl", &["CURL"], &[])],
                default_label: "Unknown".to_string(),
            },
            ..UaClassifier::default()
        };
        assert_eq!(classifier.classify("curl/8.4.0").browser, "Curl");
        assert_eq!(classifier.classify(CHROME).browser, "Unknown");
    }

    #[test]
    fn test_breakdown_counts_each_entry_once() {
        use crate::parser::fixtures::entry;
        let agents = [CHROME, CHROME, EDGE, SAFARI_IPHONE];
        let entries: Vec<LogEntry> = agents
            .iter()
            .map(|ua| LogEntry {
                user_agent: (*ua).to_string(),
                ..entry("a", "2025-04-17 05:00:00", 200)
            })
            .collect();
        let breakdown = classify_user_agents(&entries, &UaClassifier::default());
        assert_eq!(breakdown.browsers[0], LabelHits::new("Chrome", 2));
        let total: usize = breakdown.devices.iter().map(|d| d.hits).sum();
        assert_eq!(total, entries.len());
        assert!(classify_user_agents(&[], &UaClassifier::default()).browsers.is_empty());
    }
}
