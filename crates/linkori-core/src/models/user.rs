use serde::{Deserialize, Serialize};

/// The account behind the current credential, as served by
/// `GET /accounts/user/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: i64,
    pub discord_user: Option<DiscordAccount>,
    pub osu_user: Option<OsuAccount>,
    pub avatar_source: Option<String>,
    pub nick_source: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub region_display: String,
    #[serde(default)]
    pub city_display: String,
    pub displayed_avatar_url: Option<String>,
    pub displayed_nick: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscordAccount {
    pub discord_id: String,
    pub nick: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

/// Only the public part of the osu! link is kept; provider tokens the
/// backend may echo are dropped on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsuAccount {
    pub osu: OsuProfile,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OsuProfile {
    pub osu_id: String,
    #[serde(default)]
    pub nick: String,
    pub avatar_url: Option<String>,
    pub region: Option<String>,
    pub cities: Option<String>,
}

impl UserProfile {
    /// Both identity providers are linked to this account.
    pub fn is_linked(&self) -> bool {
        self.discord_user.is_some() && self.osu_user.is_some()
    }

    /// Name to show in headers: the chosen nick, falling back to the
    /// osu! nick, then the Discord nick.
    pub fn display_name(&self) -> String {
        self.displayed_nick
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| {
                self.osu_user
                    .as_ref()
                    .map(|o| o.osu.nick.clone())
                    .filter(|n| !n.is_empty())
            })
            .or_else(|| self.discord_user.as_ref().map(|d| d.nick.clone()))
            .unwrap_or_else(|| format!("user #{}", self.id))
    }

    /// "Region, City" or whichever half is known.
    pub fn location_display(&self) -> Option<String> {
        match (self.region_display.is_empty(), self.city_display.is_empty()) {
            (false, false) => Some(format!("{}, {}", self.region_display, self.city_display)),
            (false, true) => Some(self.region_display.clone()),
            (true, false) => Some(self.city_display.clone()),
            (true, true) => None,
        }
    }
}
