use serde_json::{json, Value};

use super::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnStatus {
    Ok,
    /// Success; one raw XML frame follows
    OkXml,
    Fail,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Ok => "ok",
            ReturnStatus::OkXml => "ok+xml",
            ReturnStatus::Fail => "fail",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "ok" => Some(ReturnStatus::Ok),
            "ok+xml" => Some(ReturnStatus::OkXml),
            "fail" => Some(ReturnStatus::Fail),
            _ => None,
        }
    }
}

/// One protocol message, `[kind, ticket, operation-or-status, args]` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A call; calls without a ticket expect no reply
    Invoke {
        ticket: Option<String>,
        operation: String,
        args: Value,
    },
    /// The reply to the call with the same ticket
    Return {
        ticket: String,
        status: ReturnStatus,
        args: Value,
    },
}

impl Message {
    pub fn invoke(ticket: Option<String>, operation: impl Into<String>, args: Value) -> Self {
        Message::Invoke { ticket, operation: operation.into(), args }
    }

    pub fn reply(ticket: impl Into<String>, status: ReturnStatus, args: Value) -> Self {
        Message::Return { ticket: ticket.into(), status, args }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Message::Invoke { ticket, operation, args } => json!(["invoke", ticket, operation, args]),
            Message::Return { ticket, status, args } => json!(["return", ticket, status.as_str(), args]),
        }
    }

    pub fn from_json(value: Value) -> Result<Self, ProtocolError> {
        let unexpected = |value: &Value| ProtocolError::UnexpectedMessage(value.to_string());

        let Value::Array(ref parts) = value else {
            return Err(unexpected(&value));
        };
        let [kind, ticket, name, args] = parts.as_slice() else {
            return Err(unexpected(&value));
        };

        let ticket = match ticket {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => return Err(unexpected(&value)),
        };
        let name = name.as_str().ok_or_else(|| unexpected(&value))?;

        match kind.as_str() {
            Some("invoke") => Ok(Message::invoke(ticket, name, args.clone())),
            Some("return") => {
                let ticket = ticket.ok_or_else(|| unexpected(&value))?;
                let status = ReturnStatus::parse(name).ok_or_else(|| unexpected(&value))?;
                Ok(Message::reply(ticket, status, args.clone()))
            }
            _ => Err(unexpected(&value)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        self.to_json().to_string().into_bytes()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        Self::from_json(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_invoke() {
        let message = Message::invoke(None, "set-api-version", json!(["2.7"]));
        assert_eq!(
            String::from_utf8(message.encode()).unwrap(),
            r#"["invoke",null,"set-api-version",["2.7"]]"#
        );
    }

    #[test]
    fn test_decode_return() {
        let message = Message::decode(br#"["return","3","ok+xml",[false]]"#).unwrap();
        assert_eq!(message, Message::reply("3", ReturnStatus::OkXml, json!([false])));
    }

    #[test]
    fn test_numeric_ticket() {
        let message = Message::decode(br#"["invoke",7,"confirm",["Trust key?"]]"#).unwrap();
        assert_eq!(message, Message::invoke(Some("7".to_string()), "confirm", json!(["Trust key?"])));
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(Message::decode(b"[1,"), Err(ProtocolError::Json(_))));
        assert!(matches!(
            Message::decode(br#"["invoke",null,"op"]"#),
            Err(ProtocolError::UnexpectedMessage(_))
        ));
        assert!(matches!(
            Message::decode(br#"["shout",null,"op",[]]"#),
            Err(ProtocolError::UnexpectedMessage(_))
        ));
        assert!(matches!(
            Message::decode(br#"["return",null,"ok",[]]"#),
            Err(ProtocolError::UnexpectedMessage(_))
        ));
        assert!(matches!(
            Message::decode(br#"["return","1","maybe",[]]"#),
            Err(ProtocolError::UnexpectedMessage(_))
        ));
    }
}
