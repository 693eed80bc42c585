use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stored account credential.
///
/// `cookie` is the opaque session credential (an `stuid=...;stoken=...;mid=...;` cookie
/// string) exchanged for a game token during a claim. Created and deleted by the
/// account-management side; the engine only ever reads it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    pub cookie: String,
}

impl Account {
    pub fn new(uid: impl Into<String>, cookie: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            cookie: cookie.into(),
        }
    }

    /// First four characters of the uid followed by an ellipsis, for log lines.
    pub fn masked_uid(&self) -> String {
        let prefix: String = self.uid.chars().take(4).collect();
        format!("{}...", prefix)
    }
}

// Keep the credential out of logs and panic messages
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("uid", &self.uid)
            .field("cookie", &"<redacted>")
            .finish()
    }
}

/// Read access to saved accounts, keyed by display name.
pub trait AccountStore: Send + Sync {
    fn get(&self, name: &str) -> Option<Account>;
}

impl AccountStore for IndexMap<String, Account> {
    fn get(&self, name: &str) -> Option<Account> {
        IndexMap::get(self, name).cloned()
    }
}

/// Game whose login endpoints a ticket is claimed against.
///
/// Only the two titles the login service is known to accept are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    Genshin,
    StarRail,
}

impl GameId {
    /// Numeric `app_id` sent in claim and confirm bodies.
    pub fn app_id(self) -> u32 {
        match self {
            GameId::Genshin => 4,
            GameId::StarRail => 8,
        }
    }

    /// Path segment selecting the title's combo API (`/{biz}/combo/panda/qrcode/...`).
    pub fn biz(self) -> &'static str {
        match self {
            GameId::Genshin => "hk4e_cn",
            GameId::StarRail => "hkrpg_cn",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            GameId::Genshin => "Genshin Impact",
            GameId::StarRail => "Honkai: Star Rail",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for GameId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "genshin" | "4" => Ok(GameId::Genshin),
            "starrail" | "star-rail" | "star_rail" | "8" => Ok(GameId::StarRail),
            other => Err(format!(
                "unknown game '{}' (expected genshin or starrail)",
                other
            )),
        }
    }
}
