//! Keyword-rule topic classifier: Bitcoin-only content control.
//!
//! Rejects advertising/gambling spam outright, then requires a topical
//! signal that outweighs the off-topic (altcoin) signal. Bitcoin-only
//! publications bypass classification entirely.

use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use super::{RunContext, Stage};

/// Sources whose output is Bitcoin-only by editorial line; filtering them
/// would only cost false negatives.
pub const EXEMPT_SOURCES: &[&str] = &["bitcoinmagazine", "optech", "theminermag"];

/// Topical keywords — at least one hit required.
const BITCOIN_KEYWORDS: &[&str] = &[
    "bitcoin",
    "btc",
    "비트코인",
    "satoshi",
    "사토시",
    "lightning",
    "lightning network",
    "라이트닝",
    "라이트닝 네트워크",
    "halving",
    "halvening",
    "반감기",
    "mempool",
    "hashrate",
    "hash rate",
    "채굴",
    "mining",
    "miner",
    "utxo",
    "taproot",
    "segwit",
    "ordinals",
    "inscriptions",
    "brc-20",
    "bitcoin core",
    "비트코인 코어",
];

/// Off-topic keywords (altcoin-centric). Rejection when these hit at
/// least as often as the topical set.
const ALTCOIN_KEYWORDS: &[&str] = &[
    "ethereum",
    "eth",
    "solana",
    "sol",
    "cardano",
    "ada",
    "xrp",
    "ripple",
    "dogecoin",
    "doge",
    "shiba",
    "polkadot",
    "dot",
    "avalanche",
    "avax",
    "polygon",
    "matic",
    "chainlink",
    "link",
    "litecoin",
    "ltc",
    "tron",
    "trx",
    "cosmos",
    "atom",
    "near",
    "sui",
    "aptos",
    "apt",
    "arbitrum",
    "arb",
    "optimism",
    "op token",
    "altcoin",
    "altcoins",
    "알트코인",
    "이더리움",
    "솔라나",
    "리플",
    "도지코인",
    "defi",
    "nft",
    "nfts",
    "airdrop",
    "ico",
    "ido",
    "meme coin",
    "memecoin",
    "밈코인",
];

/// Advertising/gambling markers — any hit rejects immediately.
const AD_SPAM_KEYWORDS: &[&str] = &[
    "casino",
    "casinos",
    "betting",
    "gambling",
    "sportsbook",
    "slot",
    "jackpot",
    "poker",
    "promo code",
    "bonus code",
    "가입코드",
    "추천코드",
    "먹튀",
];

/// Keys matching this are matched on ASCII word boundaries; everything
/// else (Korean terms) is matched by substring.
static ASCII_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9][a-z0-9\s\-]*$").expect("valid regex"));

/// Whether `key` occurs in `text` bounded by non-alphanumerics on both
/// sides. Both arguments must already be lowercased.
fn ascii_word_hit(text: &str, key: &str) -> bool {
    let bytes = text.as_bytes();
    let mut from = 0;
    while let Some(pos) = text[from..].find(key) {
        let start = from + pos;
        let end = start + key.len();
        let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
        let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return true;
        }
        from = start + 1;
    }
    false
}

/// Distinct keywords from `keywords` that hit in `text`.
fn keyword_hits<'a>(text: &str, keywords: &[&'a str]) -> HashSet<&'a str> {
    let normalized = format!(" {} ", text.to_lowercase());
    keywords
        .iter()
        .filter(|key| {
            if ASCII_WORD_RE.is_match(key) {
                ascii_word_hit(&normalized, key)
            } else {
                normalized.contains(*key)
            }
        })
        .copied()
        .collect()
}

/// Rule-based on-topic decision over title + summary + origin + URL.
pub fn is_on_topic(title: &str, summary: &str, source: &str, source_ref: &str, url: &str) -> bool {
    if EXEMPT_SOURCES.contains(&source) {
        return true;
    }

    let combined = format!("{title} {summary} {source_ref} {url}");

    let spam_hits = keyword_hits(&combined, AD_SPAM_KEYWORDS);
    if !spam_hits.is_empty() {
        return false;
    }

    let topic_hits = keyword_hits(&combined, BITCOIN_KEYWORDS);
    if topic_hits.is_empty() {
        return false;
    }

    let off_topic_hits = keyword_hits(&combined, ALTCOIN_KEYWORDS);
    if !off_topic_hits.is_empty() && off_topic_hits.len() >= topic_hits.len() {
        return false;
    }

    true
}

/// Drops off-topic and spam items, counting each rejection.
pub struct TopicFilterStage;

#[async_trait]
impl Stage for TopicFilterStage {
    fn name(&self) -> &'static str {
        "topic_filter"
    }

    async fn run(&self, mut ctx: RunContext) -> Result<RunContext> {
        if EXEMPT_SOURCES.contains(&ctx.source.as_str()) {
            return Ok(ctx);
        }

        let mut kept = Vec::with_capacity(ctx.items.len());
        let mut filtered = 0u32;

        for item in ctx.items.drain(..) {
            let on_topic = is_on_topic(
                &item.title,
                item.summary.as_deref().unwrap_or(""),
                &ctx.source,
                item.source_ref.as_deref().unwrap_or(""),
                &item.url,
            );
            if on_topic {
                kept.push(item);
            } else {
                filtered += 1;
                debug!(source = %ctx.source, title = %item.title, "Filtered by topic rules");
            }
        }

        if filtered > 0 {
            info!(source = %ctx.source, kept = kept.len(), filtered, "Topic filter complete");
        }

        ctx.filtered += filtered;
        ctx.items = kept;
        Ok(ctx)
    }
}
