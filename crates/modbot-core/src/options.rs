//! The closed catalogue of per-group options and the `GroupConfig` record.
//!
//! Filter options decide which message types the filtering services remove;
//! function options toggle bot behaviours. A `GroupConfig` always carries one
//! flag per option, never more and never fewer.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionName {
    // Filters
    Con,
    Doc,
    Exe,
    Gam,
    Gif,
    Ins,
    Loc,
    Mus,
    Pho,
    Qrc,
    Sti,
    Tgl,
    Tgp,
    Via,
    Vid,
    Vdi,
    Voi,
    // Functions
    Sde,
    Tcl,
    Ttd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionKind {
    Filter,
    Function,
}

impl OptionName {
    pub const FILTERS: [OptionName; 17] = [
        OptionName::Con,
        OptionName::Doc,
        OptionName::Exe,
        OptionName::Gam,
        OptionName::Gif,
        OptionName::Ins,
        OptionName::Loc,
        OptionName::Mus,
        OptionName::Pho,
        OptionName::Qrc,
        OptionName::Sti,
        OptionName::Tgl,
        OptionName::Tgp,
        OptionName::Via,
        OptionName::Vid,
        OptionName::Vdi,
        OptionName::Voi,
    ];

    pub const FUNCTIONS: [OptionName; 3] = [OptionName::Sde, OptionName::Tcl, OptionName::Ttd];

    pub fn all() -> impl Iterator<Item = OptionName> {
        Self::FILTERS.into_iter().chain(Self::FUNCTIONS)
    }

    pub fn kind(self) -> OptionKind {
        if Self::FUNCTIONS.contains(&self) {
            OptionKind::Function
        } else {
            OptionKind::Filter
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OptionName::Con => "con",
            OptionName::Doc => "doc",
            OptionName::Exe => "exe",
            OptionName::Gam => "gam",
            OptionName::Gif => "gif",
            OptionName::Ins => "ins",
            OptionName::Loc => "loc",
            OptionName::Mus => "mus",
            OptionName::Pho => "pho",
            OptionName::Qrc => "qrc",
            OptionName::Sti => "sti",
            OptionName::Tgl => "tgl",
            OptionName::Tgp => "tgp",
            OptionName::Via => "via",
            OptionName::Vid => "vid",
            OptionName::Vdi => "vdi",
            OptionName::Voi => "voi",
            OptionName::Sde => "sde",
            OptionName::Tcl => "tcl",
            OptionName::Ttd => "ttd",
        }
    }

    /// Human label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            OptionName::Con => "Contact",
            OptionName::Doc => "Document",
            OptionName::Exe => "Executable file",
            OptionName::Gam => "Game",
            OptionName::Gif => "Animation",
            OptionName::Ins => "Instant view",
            OptionName::Loc => "Location",
            OptionName::Mus => "Audio",
            OptionName::Pho => "Photo",
            OptionName::Qrc => "QR code",
            OptionName::Sti => "Sticker",
            OptionName::Tgl => "Telegram link",
            OptionName::Tgp => "Telegram proxy",
            OptionName::Via => "Via bot",
            OptionName::Vid => "Video",
            OptionName::Vdi => "Video note",
            OptionName::Voi => "Voice",
            OptionName::Sde => "Self delete",
            OptionName::Tcl => "Timed command clean",
            OptionName::Ttd => "Timed sticker delete",
        }
    }

    pub fn factory_default(self) -> bool {
        matches!(
            self,
            OptionName::Con
                | OptionName::Exe
                | OptionName::Gam
                | OptionName::Ins
                | OptionName::Loc
                | OptionName::Qrc
                | OptionName::Tgl
                | OptionName::Tgp
                | OptionName::Via
                | OptionName::Vdi
        )
    }
}

impl fmt::Display for OptionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionName {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        OptionName::all().find(|o| o.as_str() == s).ok_or(())
    }
}

/// Per-group configuration record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawGroupConfig")]
pub struct GroupConfig {
    /// Unix seconds of the last config session request.
    pub lock: i64,
    pub default: bool,
    flags: BTreeMap<OptionName, bool>,
}

impl GroupConfig {
    /// The system default config: factory flags, unlocked.
    pub fn factory() -> Self {
        Self {
            lock: 0,
            default: true,
            flags: OptionName::all()
                .map(|o| (o, o.factory_default()))
                .collect(),
        }
    }

    pub fn flag(&self, name: OptionName) -> bool {
        self.flags
            .get(&name)
            .copied()
            .unwrap_or_else(|| name.factory_default())
    }

    /// Set one option. Moves the group off the defaults.
    pub fn set_flag(&mut self, name: OptionName, value: bool) {
        self.flags.insert(name, value);
        self.default = false;
    }

    pub fn flags(&self) -> impl Iterator<Item = (OptionName, bool)> + '_ {
        self.flags.iter().map(|(k, v)| (*k, *v))
    }

    /// Seconds since the lock was taken, relative to `now`.
    pub fn lock_age(&self, now: i64) -> i64 {
        now.saturating_sub(self.lock)
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self::factory()
    }
}

/// On-disk shape. Tolerates unknown and missing option keys.
#[derive(Deserialize)]
struct RawGroupConfig {
    #[serde(default)]
    lock: i64,
    #[serde(default)]
    default: bool,
    #[serde(default)]
    flags: BTreeMap<String, bool>,
}

impl From<RawGroupConfig> for GroupConfig {
    fn from(raw: RawGroupConfig) -> Self {
        let flags = OptionName::all()
            .map(|o| {
                let v = raw
                    .flags
                    .get(o.as_str())
                    .copied()
                    .unwrap_or_else(|| o.factory_default());
                (o, v)
            })
            .collect();
        Self {
            lock: raw.lock,
            default: raw.default,
            flags,
        }
    }
}
