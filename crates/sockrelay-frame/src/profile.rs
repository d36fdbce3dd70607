use std::fmt;
use std::str::FromStr;

/// Connection-scoped client profile, fixed at handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientProfile {
    A,
    B,
    C,
}

impl ClientProfile {
    pub const ALL: [ClientProfile; 3] = [ClientProfile::A, ClientProfile::B, ClientProfile::C];

    /// Handshake wire value.
    pub fn to_wire(self) -> u32 {
        match self {
            ClientProfile::A => 0,
            ClientProfile::B => 1,
            ClientProfile::C => 2,
        }
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(ClientProfile::A),
            1 => Some(ClientProfile::B),
            2 => Some(ClientProfile::C),
            _ => None,
        }
    }

    pub fn letter(self) -> char {
        match self {
            ClientProfile::A => 'A',
            ClientProfile::B => 'B',
            ClientProfile::C => 'C',
        }
    }
}

impl fmt::Display for ClientProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for ClientProfile {
    type Err = String;

    /// Accepts the letter (any case) or the wire number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "0" => Ok(ClientProfile::A),
            "b" | "1" => Ok(ClientProfile::B),
            "c" | "2" => Ok(ClientProfile::C),
            other => Err(format!("unknown client profile '{other}' (expected a, b or c)")),
        }
    }
}

/// Which way a message travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

/// How frame units are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WirePath {
    /// Length header, then envelope bytes.
    Raw,
    /// Compressed length, original length, then gzip bytes.
    Compressed,
}

impl WirePath {
    /// Only profile B replies from the server are compressed.
    ///
    /// A connection whose handshake named no known profile uses the raw path.
    pub fn select(profile: Option<ClientProfile>, direction: Direction) -> Self {
        match (profile, direction) {
            (Some(ClientProfile::B), Direction::ServerToClient) => WirePath::Compressed,
            _ => WirePath::Raw,
        }
    }

    pub fn is_compressed(self) -> bool {
        self == WirePath::Compressed
    }
}
