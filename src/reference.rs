//! Recognition of torrent references in user selections and page text.
//!
//! `parse_one` classifies a single trimmed string; `scan` finds every
//! non-overlapping magnet link or bare info-hash inside a larger block.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

const MAGNET_PREFIX: &str = "magnet:";
const BTIH_PREFIX: &str = "magnet:?xt=urn:btih:";
const HEX_HASH_LEN: usize = 40;
const BASE32_HASH_LEN: usize = 32;

static MAGNET_HASH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?i)btih:([0-9a-f]{40}|[a-z2-7]{32})"));
static MAGNET_LINK: LazyLock<Regex> = LazyLock::new(|| compile(r"(?i)magnet:\?[^\s<>]+"));
static HEX_HASH: LazyLock<Regex> = LazyLock::new(|| compile(r"(?-u:\b)[0-9a-fA-F]{40}(?-u:\b)"));
static BASE32_HASH: LazyLock<Regex> =
    LazyLock::new(|| compile(r"(?-u:\b)[a-zA-Z2-7]{32}(?-u:\b)"));
static HEX_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"[0-9a-fA-F]{40}"));
static BASE32_RUN: LazyLock<Regex> = LazyLock::new(|| compile(r"[a-zA-Z2-7]{32}"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static torrent pattern compiles")
}

/// Something that can be handed to the daemon: a magnet link, a bare
/// info-hash, or a link to a `.torrent` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TorrentReference {
    Magnet {
        #[serde(rename = "magnetLink")]
        magnet_link: String,
        #[serde(rename = "infoHash")]
        info_hash: String,
    },
    Hash {
        #[serde(rename = "infoHash")]
        info_hash: String,
        #[serde(rename = "magnetLink")]
        magnet_link: String,
    },
    TorrentFile {
        url: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Magnet,
    Hash,
    TorrentFile,
}

impl ReferenceKind {
    pub fn label(self) -> &'static str {
        match self {
            ReferenceKind::Magnet => "magnet",
            ReferenceKind::Hash => "hash",
            ReferenceKind::TorrentFile => "torrent_file",
        }
    }
}

impl TorrentReference {
    /// The hash is uppercased but otherwise kept in its own alphabet.
    pub fn from_hash(hash: &str) -> Self {
        let info_hash = hash.to_ascii_uppercase();
        TorrentReference::Hash {
            magnet_link: format!("{BTIH_PREFIX}{info_hash}"),
            info_hash,
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            TorrentReference::Magnet { .. } => ReferenceKind::Magnet,
            TorrentReference::Hash { .. } => ReferenceKind::Hash,
            TorrentReference::TorrentFile { .. } => ReferenceKind::TorrentFile,
        }
    }

    pub fn magnet_link(&self) -> Option<&str> {
        match self {
            TorrentReference::Magnet { magnet_link, .. }
            | TorrentReference::Hash { magnet_link, .. } => Some(magnet_link),
            TorrentReference::TorrentFile { .. } => None,
        }
    }

    pub fn info_hash(&self) -> Option<&str> {
        match self {
            TorrentReference::Magnet { info_hash, .. }
            | TorrentReference::Hash { info_hash, .. } => Some(info_hash),
            TorrentReference::TorrentFile { .. } => None,
        }
    }
}

impl fmt::Display for TorrentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TorrentReference::Magnet { magnet_link, .. }
            | TorrentReference::Hash { magnet_link, .. } => f.write_str(magnet_link),
            TorrentReference::TorrentFile { url } => f.write_str(url),
        }
    }
}

type Matcher = fn(&str) -> Option<TorrentReference>;

/// Evaluated in order; the first match wins. A 32-character string made only
/// of hex digits never reaches a hex rule, so it is classified as base32.
const MATCHERS: &[Matcher] = &[
    match_magnet,
    match_hex_hash,
    match_base32_hash,
    match_torrent_url,
];

/// Classifies a single string. Surrounding whitespace is ignored; the rest
/// must match a shape as a whole.
pub fn parse_one(text: &str) -> Option<TorrentReference> {
    let trimmed = text.trim();
    MATCHERS.iter().find_map(|matcher| matcher(trimmed))
}

fn match_magnet(text: &str) -> Option<TorrentReference> {
    if !text.starts_with(MAGNET_PREFIX) {
        return None;
    }
    let hash = MAGNET_HASH.captures(text)?.get(1)?;
    Some(TorrentReference::Magnet {
        magnet_link: text.to_string(),
        info_hash: hash.as_str().to_ascii_uppercase(),
    })
}

fn match_hex_hash(text: &str) -> Option<TorrentReference> {
    is_hex_hash(text).then(|| TorrentReference::from_hash(text))
}

fn match_base32_hash(text: &str) -> Option<TorrentReference> {
    is_base32_hash(text).then(|| TorrentReference::from_hash(text))
}

fn match_torrent_url(text: &str) -> Option<TorrentReference> {
    let http = text.starts_with("http://") || text.starts_with("https://");
    if http && text.to_ascii_lowercase().ends_with(".torrent") {
        Some(TorrentReference::TorrentFile {
            url: text.to_string(),
        })
    } else {
        None
    }
}

fn is_hex_hash(text: &str) -> bool {
    text.len() == HEX_HASH_LEN && text.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_base32_hash(text: &str) -> bool {
    text.len() == BASE32_HASH_LEN
        && text
            .bytes()
            .all(|b| b.is_ascii_alphabetic() || (b'2'..=b'7').contains(&b))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Magnet,
    Hash,
}

/// Offsets are byte offsets into the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
    pub kind: MatchKind,
}

impl ScanMatch<'_> {
    /// Full classification of the matched text. A magnet link without a
    /// usable `btih` hash yields `None`.
    pub fn reference(&self) -> Option<TorrentReference> {
        parse_one(self.text)
    }
}

#[derive(Debug, Clone)]
pub struct Scan<'a> {
    inner: std::vec::IntoIter<ScanMatch<'a>>,
}

impl<'a> Iterator for Scan<'a> {
    type Item = ScanMatch<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Scan<'_> {}

/// Finds magnet links and bare info-hashes in `text`. Overlaps are resolved
/// left to right: a match is kept only if it starts at or after the end of
/// the previously kept one.
pub fn scan(text: &str) -> Scan<'_> {
    let patterns: [(&Regex, MatchKind); 3] = [
        (&*MAGNET_LINK, MatchKind::Magnet),
        (&*HEX_HASH, MatchKind::Hash),
        (&*BASE32_HASH, MatchKind::Hash),
    ];
    let mut candidates: Vec<ScanMatch<'_>> = patterns
        .into_iter()
        .flat_map(|(regex, kind)| {
            regex.find_iter(text).map(move |m| ScanMatch {
                start: m.start(),
                end: m.end(),
                text: m.as_str(),
                kind,
            })
        })
        .collect();
    // stable: equal starts keep pattern order (magnet, hex, base32)
    candidates.sort_by_key(|m| m.start);

    let mut kept: Vec<ScanMatch<'_>> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept.last().is_some_and(|last| candidate.start < last.end);
        if !overlaps {
            kept.push(candidate);
        }
    }
    Scan {
        inner: kept.into_iter(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Match(ScanMatch<'a>),
}

/// Splits `text` into unmatched runs and matches, in order. Concatenating
/// the pieces reproduces the input.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut cursor = 0;
    for m in scan(text) {
        if m.start > cursor {
            out.push(Segment::Text(&text[cursor..m.start]));
        }
        cursor = m.end;
        out.push(Segment::Match(m));
    }
    if cursor < text.len() {
        out.push(Segment::Text(&text[cursor..]));
    }
    out
}

pub fn looks_interesting(text: &str) -> bool {
    if text.len() < BASE32_HASH_LEN {
        return false;
    }
    text.contains("magnet") || HEX_RUN.is_match(text) || BASE32_RUN.is_match(text)
}
