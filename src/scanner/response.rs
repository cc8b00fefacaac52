use azalea_chat::FormattedText;

/// How a [`PingResponse`] was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingKind {
    /// Modern json status. `reported_protocol` is whatever the server put in
    /// `version.protocol`, if it sent a version at all.
    Standard { reported_protocol: Option<i32> },
    /// Pre-netty status, the description is plain text.
    Legacy,
    /// The server didn't give us a status but did answer a login attempt.
    /// Everything except the kind is a placeholder.
    Unlisted,
}

#[derive(Debug, Clone)]
pub struct PingResponse {
    version: String,
    protocol_version: i32,
    online_players: i32,
    max_players: i32,
    description: Option<FormattedText>,
    kind: PingKind,
}

impl PingResponse {
    /// `protocol_version` is the version we pinged with.
    pub fn standard(
        version: String,
        protocol_version: i32,
        online_players: i32,
        max_players: i32,
        description: Option<FormattedText>,
        reported_protocol: Option<i32>,
    ) -> Self {
        Self {
            version,
            protocol_version,
            online_players,
            max_players,
            description,
            kind: PingKind::Standard { reported_protocol },
        }
    }

    pub fn legacy(
        version: String,
        protocol_version: i32,
        online_players: i32,
        max_players: i32,
        motd: String,
    ) -> Self {
        Self {
            version,
            protocol_version,
            online_players,
            max_players,
            description: Some(FormattedText::from(motd)),
            kind: PingKind::Legacy,
        }
    }

    pub fn unlisted() -> Self {
        Self {
            version: "Unknown".to_string(),
            protocol_version: 0,
            online_players: 0,
            max_players: 0,
            description: None,
            kind: PingKind::Unlisted,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    pub fn online_players(&self) -> i32 {
        self.online_players
    }

    pub fn max_players(&self) -> i32 {
        self.max_players
    }

    pub fn description(&self) -> Option<&FormattedText> {
        self.description.as_ref()
    }

    /// The description with all formatting stripped.
    pub fn description_plaintext(&self) -> Option<String> {
        self.description.as_ref().map(|d| d.to_string())
    }

    pub fn kind(&self) -> &PingKind {
        &self.kind
    }

    pub fn is_legacy(&self) -> bool {
        self.kind == PingKind::Legacy
    }

    pub fn is_unlisted(&self) -> bool {
        self.kind == PingKind::Unlisted
    }
}
