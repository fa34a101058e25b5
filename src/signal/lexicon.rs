//! Word weights for the polarity estimate.
//!
//! AFINN-style integer weights in [-5, 5], extended with trading slang.

pub const LEXICON: &[(&str, i32)] = &[
    // -- positive --
    ("moon", 3),
    ("mooning", 3),
    ("moonshot", 3),
    ("pump", 2),
    ("pumping", 2),
    ("bullish", 3),
    ("bull", 2),
    ("breakout", 2),
    ("rally", 2),
    ("surge", 2),
    ("soaring", 3),
    ("rocket", 3),
    ("gem", 2),
    ("gains", 2),
    ("gain", 2),
    ("profit", 2),
    ("win", 3),
    ("winning", 3),
    ("buy", 1),
    ("long", 1),
    ("ape", 1),
    ("hodl", 1),
    ("strong", 2),
    ("good", 3),
    ("great", 3),
    ("amazing", 4),
    ("huge", 1),
    ("massive", 2),
    ("launch", 1),
    ("listing", 2),
    ("partnership", 2),
    ("undervalued", 2),
    ("ath", 2),
    ("lfg", 3),
    ("wagmi", 3),
    ("alpha", 2),
    ("love", 3),
    ("happy", 3),
    ("confident", 2),
    ("safe", 1),
    ("send", 1),
    // -- negative --
    ("bearish", -3),
    ("bear", -2),
    ("crash", -3),
    ("crashing", -3),
    ("drop", -1),
    ("dropping", -2),
    ("sell", -1),
    ("short", -1),
    ("loss", -3),
    ("losses", -3),
    ("lose", -3),
    ("bad", -3),
    ("fail", -2),
    ("failed", -2),
    ("weak", -2),
    ("fear", -2),
    ("fud", -2),
    ("panic", -3),
    ("exit", -1),
    ("dead", -3),
    ("avoid", -2),
    ("warning", -3),
    ("risky", -2),
    ("overvalued", -2),
    ("bleeding", -3),
    ("liquidated", -3),
    ("hack", -4),
    ("hacked", -4),
    ("exploit", -3),
    ("ngmi", -3),
    ("fake", -3),
    ("fraud", -4),
];

/// Keywords that force a zero score regardless of polarity.
/// Matched as token prefixes, so "rugged" and "dumping" also hit.
pub const DEFAULT_DENY_LIST: &[&str] = &["scam", "rug", "dump", "honeypot", "rekt"];
