use crate::game::types::{ActorId, Direction, WorldSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
  Create {
    session_id: String,
    rows: Option<i32>,
    cols: Option<i32>,
  },
  Join {
    session_id: String,
    user_id: ActorId,
  },
  Observe {
    session_id: String,
    user_id: Option<ActorId>,
  },
  Play {
    user_id: ActorId,
    direction: Direction,
  },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage<'a> {
  Tick(&'a WorldSnapshot),
  Created {
    session_id: &'a str,
  },
  Joined {
    session_id: &'a str,
    user_id: ActorId,
    rows: i32,
    cols: i32,
  },
  Observing {
    session_id: &'a str,
    rows: i32,
    cols: i32,
  },
  Error {
    message: &'a str,
  },
}

impl ServerMessage<'_> {
  pub fn encode(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }
}

pub fn decode_client_message(text: &str) -> Option<ClientMessage> {
  match serde_json::from_str::<ClientMessage>(text) {
    Ok(message) => Some(message),
    Err(error) => {
      tracing::debug!(%error, "ignoring malformed client message");
      None
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::game::types::{Cell, SnakeSnapshot};
  use std::collections::BTreeMap;

  #[test]
  fn decodes_play_message() {
    let message = decode_client_message(r#"{"type":"play","user_id":7,"direction":"left"}"#);
    assert_eq!(
      message,
      Some(ClientMessage::Play {
        user_id: 7,
        direction: Direction::Left
      })
    );
  }

  #[test]
  fn decodes_handshake_messages_with_optional_fields() {
    assert_eq!(
      decode_client_message(r#"{"type":"observe","session_id":"test"}"#),
      Some(ClientMessage::Observe {
        session_id: "test".to_string(),
        user_id: None
      })
    );
    assert_eq!(
      decode_client_message(r#"{"type":"join","session_id":"test","user_id":1336}"#),
      Some(ClientMessage::Join {
        session_id: "test".to_string(),
        user_id: 1336
      })
    );
    assert_eq!(
      decode_client_message(r#"{"type":"create","session_id":"big","rows":40}"#),
      Some(ClientMessage::Create {
        session_id: "big".to_string(),
        rows: Some(40),
        cols: None
      })
    );
  }

  #[test]
  fn rejects_unknown_or_malformed_messages() {
    assert_eq!(decode_client_message("not json"), None);
    assert_eq!(decode_client_message(r#"{"type":"dance"}"#), None);
    assert_eq!(
      decode_client_message(r#"{"type":"play","user_id":1,"direction":"north"}"#),
      None
    );
  }

  #[test]
  fn tick_message_flattens_snapshot() {
    let mut snakes = BTreeMap::new();
    snakes.insert(
      1,
      SnakeSnapshot {
        direction: Direction::Down,
        cells: vec![Cell::new(1, 1), Cell::new(2, 1)],
      },
    );
    let snapshot = WorldSnapshot {
      snakes,
      apples: vec![Cell::new(0, 3)],
      deaths: vec![4],
    };
    let text = ServerMessage::Tick(&snapshot).encode().unwrap();
    assert_eq!(
      text,
      r#"{"type":"tick","snakes":{"1":{"direction":"down","cells":[[1,1],[2,1]]}},"apples":[[0,3]],"deaths":[4]}"#
    );
  }

  #[test]
  fn error_message_shape() {
    let text = ServerMessage::Error { message: "nope" }.encode().unwrap();
    assert_eq!(text, r#"{"type":"error","message":"nope"}"#);
  }
}
