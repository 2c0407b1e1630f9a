//! Named infrastructure and market theme tables used by the market-stress
//! components.
//!
//! Matching is case-insensitive and word-bounded over an alert's headline,
//! body and asset tags. Each table entry compiles to a single regex once,
//! on first use.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use risk_index_alert_models::AlertEvent;

/// A named chokepoint: pipeline, LNG terminal, strait or canal.
#[derive(Debug)]
pub struct Chokepoint {
    /// Display name used in drivers and the breakdown.
    pub name: &'static str,
    /// Weight applied to `severity × confidence`.
    pub weight: f64,
    pattern: Regex,
}

/// A thematic market-stress signal.
#[derive(Debug)]
pub struct Theme {
    /// Stable theme id.
    pub id: &'static str,
    /// Weight applied to `severity × confidence`.
    pub weight: f64,
    pattern: Regex,
}

fn word_bounded(alternatives: &str) -> Regex {
    Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).expect("valid regex")
}

const CHOKEPOINT_TABLE: &[(&str, f64, &str)] = &[
    ("Strait of Hormuz", 1.0, r"strait of hormuz|hormuz"),
    ("Bab el-Mandeb", 0.9, r"bab[\s-]el[\s-]mandeb|red sea shipping lane"),
    ("Suez Canal", 0.9, r"suez canal|suez|sumed pipeline"),
    ("Turkish Straits", 0.8, r"bosporus|bosphorus|dardanelles|turkish straits"),
    ("Strait of Malacca", 0.7, r"strait of malacca|malacca strait"),
    ("Panama Canal", 0.5, r"panama canal"),
    ("Abqaiq", 1.0, r"abqaiq"),
    ("Ras Laffan", 0.9, r"ras laffan"),
    ("Kharg Island", 0.8, r"kharg island|kharg"),
    ("Nord Stream", 0.7, r"nord stream"),
    ("TurkStream", 0.7, r"turkstream|turk stream"),
    ("Druzhba pipeline", 0.7, r"druzhba"),
    ("CPC pipeline", 0.7, r"caspian pipeline consortium|cpc pipeline|cpc terminal"),
    ("Novorossiysk", 0.7, r"novorossiysk"),
    ("Balticconnector", 0.5, r"balticconnector"),
    ("Sabine Pass LNG", 0.6, r"sabine pass"),
    ("Freeport LNG", 0.6, r"freeport lng"),
];

const THEME_TABLE: &[(&str, f64, &str)] = &[
    (
        "supply_disruption",
        1.0,
        r"supply disruption|supply outage|outages?|shut[\s-]?in|force majeure|production halt(?:ed)?|halts? (?:production|output|exports)",
    ),
    (
        "sanctions",
        0.8,
        r"sanction(?:s|ed)?|embargo(?:es)?|price cap|export ban",
    ),
    (
        "price_shock",
        0.9,
        r"price (?:spike|surge|shock|jump)|prices? (?:soar|surge|spike|jump)(?:s|ed|ing)?|record high",
    ),
    (
        "storage_drawdown",
        0.7,
        r"storage (?:levels?|drawdown|withdrawals?)|inventor(?:y|ies) (?:draw|drop|fall)\w*|stockpiles?|drawdown",
    ),
    (
        "shipping_disruption",
        0.9,
        r"shipping (?:disruption|halt|attack)s?|tankers?|rerout(?:e|ed|ing)|freight rates?|convoy",
    ),
    (
        "infrastructure_attack",
        1.0,
        r"sabotage(?:d)?|attack(?:s|ed)? on (?:a |the )?(?:pipeline|refinery|terminal|facility|plant|grid)|drone strikes?|explosions?",
    ),
];

/// Every chokepoint, compiled.
pub static CHOKEPOINTS: LazyLock<Vec<Chokepoint>> = LazyLock::new(|| {
    CHOKEPOINT_TABLE
        .iter()
        .map(|&(name, weight, pattern)| Chokepoint {
            name,
            weight,
            pattern: word_bounded(pattern),
        })
        .collect()
});

/// Every theme, compiled.
pub static THEMES: LazyLock<Vec<Theme>> = LazyLock::new(|| {
    THEME_TABLE
        .iter()
        .map(|&(id, weight, pattern)| Theme {
            id,
            weight,
            pattern: word_bounded(pattern),
        })
        .collect()
});

/// Chokepoints and themes one alert matched.
#[derive(Debug, Default, Clone)]
pub struct AlertMatches {
    pub chokepoints: Vec<&'static Chokepoint>,
    pub themes: Vec<&'static Theme>,
}

impl AlertMatches {
    /// Whether nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chokepoints.is_empty() && self.themes.is_empty()
    }

    /// Chokepoint names followed by theme ids, each group sorted.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        let entities: BTreeSet<&str> = self.chokepoints.iter().map(|c| c.name).collect();
        let themes: BTreeSet<&str> = self.themes.iter().map(|t| t.id).collect();
        entities
            .into_iter()
            .chain(themes)
            .map(ToString::to_string)
            .collect()
    }
}

/// Matches one alert against both tables.
#[must_use]
pub fn match_alert(alert: &AlertEvent) -> AlertMatches {
    let text = alert.searchable_text();
    AlertMatches {
        chokepoints: CHOKEPOINTS
            .iter()
            .filter(|c| c.pattern.is_match(&text))
            .collect(),
        themes: THEMES.iter().filter(|t| t.pattern.is_match(&text)).collect(),
    }
}
