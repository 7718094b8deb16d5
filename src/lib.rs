// Tethered Drive - shared types
// Browser console for a serial-attached Create robot: arrow keys become
// Drive Direct packets, one-shot keys become fixed OI commands.
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod config;
pub mod console;
pub mod dispatch;
pub mod drive;
pub mod gateway;
pub mod link;
pub mod video;

// Browser -> Server, body of POST /command. The page numbers its events so
// the server can drop one that arrives after a later one.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CommandRequest {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub session: Option<String>,
}

// Server -> Browser acknowledgment. Success means the console accepted the
// event, not that the robot executed it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandResponse {
    Success { command: String },
    Failure { message: String },
}

impl CommandResponse {
    pub fn success(command: impl Into<String>) -> Self {
        Self::Success {
            command: command.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("server i/o: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn responses_use_status_tag() {
        assert_eq!(
            serde_json::to_string(&CommandResponse::success("DOCK")).unwrap(),
            r#"{"status":"success","command":"DOCK"}"#
        );
        assert_eq!(
            serde_json::to_string(&CommandResponse::failure("No command received")).unwrap(),
            r#"{"status":"failure","message":"No command received"}"#
        );
    }

    #[test]
    fn request_command_is_optional() {
        let req: CommandRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.command, None);
        let req: CommandRequest = serde_json::from_str(r#"{"command":"UP"}"#).unwrap();
        assert_eq!(req.command.as_deref(), Some("UP"));
        assert_eq!(req.seq, None);
        let req: CommandRequest =
            serde_json::from_str(r#"{"command":"UP","seq":7,"session":"k3"}"#).unwrap();
        assert_eq!(req.seq, Some(7));
        assert_eq!(req.session.as_deref(), Some("k3"));
    }
}
