use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "response")] Response {
        content: String,
        timestamp: i64,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
    #[serde(rename = "rejected")] Rejected {
        reason: String,
    },
    #[serde(rename = "quota")] Quota {
        remaining: usize,
        limit: usize,
        cooldown_hours: u64,
    },
    #[serde(rename = "processing")]
    Processing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_frame_parses() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"Hello"}"#).unwrap();
        let ClientMessage::Chat { content } = msg;
        assert_eq!(content, "Hello");
    }

    #[test]
    fn server_frames_are_tagged() {
        let processing = serde_json::to_string(&ServerMessage::Processing).unwrap();
        assert_eq!(processing, r#"{"type":"processing"}"#);

        let quota = serde_json::to_value(&ServerMessage::Quota {
            remaining: 4,
            limit: 20,
            cooldown_hours: 2,
        }).unwrap();
        assert_eq!(quota["type"], "quota");
        assert_eq!(quota["remaining"], 4);
    }
}
