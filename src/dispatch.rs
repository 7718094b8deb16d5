// dispatch.rs - Named one-shot commands and gateway event parsing
use crate::codec::{self, CodecError};
use crate::drive::Key;

/// Fixed OI commands the operator can fire with a single key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCommand {
    Start,
    Reset,
    Stop,
    Safe,
    Full,
    PowerDown,
    SpotClean,
    Clean,
    Dock,
    SongDefineAndPlay,
}

impl NamedCommand {
    pub const ALL: [NamedCommand; 10] = [
        NamedCommand::Start,
        NamedCommand::Reset,
        NamedCommand::Stop,
        NamedCommand::Safe,
        NamedCommand::Full,
        NamedCommand::PowerDown,
        NamedCommand::SpotClean,
        NamedCommand::Clean,
        NamedCommand::Dock,
        NamedCommand::SongDefineAndPlay,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|cmd| cmd.name() == name || cmd.alias() == Some(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            NamedCommand::Start => "START",
            NamedCommand::Reset => "RESET",
            NamedCommand::Stop => "STOP",
            NamedCommand::Safe => "SAFE",
            NamedCommand::Full => "FULL",
            NamedCommand::PowerDown => "POWER_DOWN",
            NamedCommand::SpotClean => "SPOT_CLEAN",
            NamedCommand::Clean => "CLEAN",
            NamedCommand::Dock => "DOCK",
            NamedCommand::SongDefineAndPlay => "SONG_DEFINE_AND_PLAY",
        }
    }

    /// Single-key shortcut sent by the control page.
    pub fn alias(self) -> Option<&'static str> {
        match self {
            NamedCommand::Start => Some("P"),
            NamedCommand::Reset => Some("R"),
            NamedCommand::Safe => Some("S"),
            NamedCommand::Full => Some("F"),
            NamedCommand::Clean => Some("C"),
            NamedCommand::Dock => Some("D"),
            NamedCommand::SongDefineAndPlay => Some("SPACE"),
            NamedCommand::Stop | NamedCommand::PowerDown | NamedCommand::SpotClean => None,
        }
    }

    pub fn literal(self) -> &'static str {
        match self {
            NamedCommand::Start => "128",
            NamedCommand::Reset => "7",
            NamedCommand::Stop => "173",
            NamedCommand::Safe => "131",
            NamedCommand::Full => "132",
            NamedCommand::PowerDown => "133",
            NamedCommand::SpotClean => "134",
            NamedCommand::Clean => "135",
            NamedCommand::Dock => "143",
            // define song 3 as a single 1/4s G4, then play it
            NamedCommand::SongDefineAndPlay => "140 3 1 64 16 141 3",
        }
    }

    pub fn bytes(self) -> Result<Vec<u8>, CodecError> {
        codec::encode_ascii_command(self.literal())
    }
}

/// One operator event as it arrives from the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Key { key: Key, pressed: bool },
    Command(NamedCommand),
    /// Accepted and ignored.
    Unknown(String),
}

impl Event {
    /// `UP` presses, `UP_RELEASE` releases, anything else is looked up as a
    /// named command.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (name, pressed) = match raw.strip_suffix("_RELEASE") {
            Some(base) => (base, false),
            None => (raw, true),
        };
        let key = match name {
            "UP" => Some(Key::Up),
            "DOWN" => Some(Key::Down),
            "LEFT" => Some(Key::Left),
            "RIGHT" => Some(Key::Right),
            _ => None,
        };
        if let Some(key) = key {
            return Event::Key { key, pressed };
        }
        match NamedCommand::from_name(raw) {
            Some(cmd) => Event::Command(cmd),
            None => Event::Unknown(raw.to_string()),
        }
    }
}
