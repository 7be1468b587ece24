//! Evidence extracted during an investigation
//!
//! Three variants:
//! - IOC: a concrete indicator (IP, domain, hash, email, CVE, wallet)
//! - Entity: a named actor, malware family, organization or persona
//! - Technique: a MITRE ATT&CK identifier
//!
//! IOC identity within a run is `(kind, lowercased value)`; duplicates found
//! by different agents are merged before reporting.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Categories of indicators of compromise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IocKind {
    Ip,
    Domain,
    Url,
    HashMd5,
    HashSha1,
    HashSha256,
    Email,
    Cve,
    CryptoAddress,
}

impl IocKind {
    /// Parse a loose type label as found in markdown report tables.
    ///
    /// Accepts common spellings ("ipv4", "md5", "btc", ...) and returns
    /// `None` for labels that do not map to a known kind.
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "ip" | "ipv4" | "ipv6" | "ip address" | "ip-address" => Some(Self::Ip),
            "domain" | "hostname" | "fqdn" => Some(Self::Domain),
            "url" | "link" => Some(Self::Url),
            "md5" | "hash-md5" | "hash_md5" => Some(Self::HashMd5),
            "sha1" | "hash-sha1" | "hash_sha1" => Some(Self::HashSha1),
            "sha256" | "hash-sha256" | "hash_sha256" | "hash" => Some(Self::HashSha256),
            "email" | "e-mail" | "email address" => Some(Self::Email),
            "cve" | "vulnerability" => Some(Self::Cve),
            "crypto-address" | "crypto" | "wallet" | "btc" | "bitcoin" | "eth" | "ethereum" => {
                Some(Self::CryptoAddress)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ip => "ip",
            Self::Domain => "domain",
            Self::Url => "url",
            Self::HashMd5 => "hash-md5",
            Self::HashSha1 => "hash-sha1",
            Self::HashSha256 => "hash-sha256",
            Self::Email => "email",
            Self::Cve => "cve",
            Self::CryptoAddress => "crypto-address",
        }
    }
}

impl fmt::Display for IocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of named entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityKind {
    ThreatActor,
    Malware,
    Organization,
    Persona,
}

impl EntityKind {
    /// Parse a loose entity label from agent output.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "threat-actor" | "threat actor" | "actor" | "apt" | "group" => Some(Self::ThreatActor),
            "malware" | "ransomware" | "trojan" | "tool" => Some(Self::Malware),
            "organization" | "org" | "company" | "vendor" => Some(Self::Organization),
            "persona" | "person" | "username" | "handle" | "alias" => Some(Self::Persona),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreatActor => "threat-actor",
            Self::Malware => "malware",
            Self::Organization => "organization",
            Self::Persona => "persona",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single extracted fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "snake_case")]
pub enum Evidence {
    /// Indicator of compromise with surrounding context
    Ioc {
        kind: IocKind,
        value: String,
        #[serde(default)]
        context: String,
    },
    /// Named entity with surrounding context
    Entity {
        kind: EntityKind,
        name: String,
        #[serde(default)]
        context: String,
    },
    /// MITRE ATT&CK technique identifier (e.g. T1059.001)
    Technique { id: String },
}

impl Evidence {
    pub fn ioc(kind: IocKind, value: impl Into<String>) -> Self {
        Self::Ioc {
            kind,
            value: value.into(),
            context: String::new(),
        }
    }

    pub fn with_context(mut self, ctx: &str) -> Self {
        match &mut self {
            Self::Ioc { context, .. } | Self::Entity { context, .. } => {
                *context = ctx.to_string();
            }
            Self::Technique { .. } => {}
        }
        self
    }

    /// Deduplication key. IOC identity is (kind, lowercased value).
    pub fn unique_key(&self) -> String {
        match self {
            Self::Ioc { kind, value, .. } => format!("ioc:{}:{}", kind, value.to_lowercase()),
            Self::Entity { kind, name, .. } => format!("entity:{}:{}", kind, name.to_lowercase()),
            Self::Technique { id } => format!("technique:{}", id.to_uppercase()),
        }
    }

    /// True for IOC variants (used for per-agent IOC counts)
    pub fn is_ioc(&self) -> bool {
        matches!(self, Self::Ioc { .. })
    }

    /// Whether the item carries non-empty context (feeds confidence scoring)
    pub fn has_context(&self) -> bool {
        match self {
            Self::Ioc { context, .. } | Self::Entity { context, .. } => !context.trim().is_empty(),
            Self::Technique { .. } => false,
        }
    }
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ioc { kind, value, .. } => write!(f, "{}: {}", kind, value),
            Self::Entity { kind, name, .. } => write!(f, "{}: {}", kind, name),
            Self::Technique { id } => write!(f, "technique: {}", id),
        }
    }
}

/// Remove duplicate evidence items, keeping the first occurrence.
///
/// First-wins is a presentation choice only; the resulting set is the same
/// regardless of input order.
pub fn dedup_evidence(items: Vec<Evidence>) -> Vec<Evidence> {
    let mut seen: HashSet<String> = HashSet::new();
    items
        .into_iter()
        .filter(|e| seen.insert(e.unique_key()))
        .collect()
}

/// A narrative finding recovered from free-form report text.
///
/// Produced only by the fallback extractor; structured agent output carries
/// proper [`Evidence`] instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub url: Option<String>,
    pub section: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ioc_kind_parse_loose_labels() {
        assert_eq!(IocKind::parse("IP"), Some(IocKind::Ip));
        assert_eq!(IocKind::parse("ipv4"), Some(IocKind::Ip));
        assert_eq!(IocKind::parse(" sha256 "), Some(IocKind::HashSha256));
        assert_eq!(IocKind::parse("BTC"), Some(IocKind::CryptoAddress));
        assert_eq!(IocKind::parse("widget"), None);
    }

    #[test]
    fn test_dedup_by_kind_and_value() {
        let items = vec![
            Evidence::ioc(IocKind::Ip, "1.2.3.4").with_context("seen in C2 traffic"),
            Evidence::ioc(IocKind::Ip, "1.2.3.4"),
            Evidence::ioc(IocKind::Domain, "1.2.3.4"),
            Evidence::ioc(IocKind::Domain, "EVIL.com"),
            Evidence::ioc(IocKind::Domain, "evil.com"),
        ];
        let deduped = dedup_evidence(items);
        assert_eq!(deduped.len(), 3);
        // First occurrence wins, context preserved
        assert!(deduped[0].has_context());
    }

    #[test]
    fn test_dedup_order_independent() {
        let a = vec![
            Evidence::ioc(IocKind::Ip, "9.9.9.9"),
            Evidence::ioc(IocKind::Cve, "CVE-2024-1234"),
        ];
        let mut b = a.clone();
        b.reverse();
        let keys = |v: Vec<Evidence>| {
            let mut k: Vec<_> = dedup_evidence(v).iter().map(|e| e.unique_key()).collect();
            k.sort();
            k
        };
        assert_eq!(keys(a), keys(b));
    }

    #[test]
    fn test_evidence_serde_roundtrip() {
        let e = Evidence::Ioc {
            kind: IocKind::HashSha256,
            value: "a".repeat(64),
            context: "dropper payload".to_string(),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("hash-sha256"));
        let back: Evidence = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
