use std::collections::HashMap;
use std::io::{Read, Write};

use serde_json::{json, Value};
use zinject_version::ImplementationVersion;

use super::frame::{read_frame, write_frame};
use super::message::{Message, ReturnStatus};
use super::xml::parse_selections;
use super::{ProtocolError, API_VERSION};
use crate::error::{Result, SolverError};
use crate::model::{Requirements, Selections};
use crate::solver::CancellationToken;

/// Local operations the external solver may call back into.
pub trait Handler {
    /// Asks the user to confirm an action
    fn confirm(&mut self, message: &str) -> bool;

    /// Returns the fingerprints of `keys` the user trusts for `feed`
    fn confirm_keys(&mut self, feed: &str, keys: &Value) -> Vec<String>;

    fn update_key_info(&mut self, _fingerprint: &str, _info: &Value) {}

    fn report_error(&mut self, message: &str) {
        log::error!("External solver: {}", message);
    }
}

/// Non-interactive handler declining every confirmation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchHandler;

impl Handler for BatchHandler {
    fn confirm(&mut self, message: &str) -> bool {
        log::info!("Declining confirmation in batch mode: {}", message);
        false
    }

    fn confirm_keys(&mut self, feed: &str, _keys: &Value) -> Vec<String> {
        log::info!("Not trusting new keys for {} in batch mode", feed);
        Vec::new()
    }
}

/// Successful result of a `select` call
#[derive(Debug, Clone, PartialEq)]
pub struct SelectReply {
    pub selections: Selections,
    /// The external solver used feeds it considers stale
    pub stale: bool,
}

/// Calls this side made and is still waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingCall {
    Select,
}

/// What the message loop does next
enum Step {
    Continue,
    Done(SelectReply),
}

/// One conversation with an external solver over a reader/writer pair.
///
/// The session starts with [`handshake`](Session::handshake), then sends
/// calls and serves the callbacks the other side makes until the reply to
/// its call arrives.
pub struct Session<R, W> {
    reader: R,
    writer: W,
    next_ticket: u64,
    pending: HashMap<String, PendingCall>,
    cancellation: CancellationToken,
    api_version: Option<String>,
}

impl<R: Read, W: Write> Session<R, W> {
    pub fn new(reader: R, writer: W, cancellation: CancellationToken) -> Self {
        Self {
            reader,
            writer,
            next_ticket: 0,
            pending: HashMap::new(),
            cancellation,
            api_version: None,
        }
    }

    /// The version the other side proposed, once the handshake is done
    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    /// Waits for the `set-api-version` call that must open the conversation
    pub fn handshake(&mut self) -> std::result::Result<(), ProtocolError> {
        let message = self.read_message()?;
        let Message::Invoke { operation, args, .. } = &message else {
            return Err(ProtocolError::Handshake(format!("expected set-api-version, got {:?}", message)));
        };
        if operation != "set-api-version" {
            return Err(ProtocolError::Handshake(format!("expected set-api-version, got {}", operation)));
        }

        let proposed = args
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::Handshake(format!("invalid version arguments {}", args)))?;

        let supported = match (ImplementationVersion::parse(proposed), ImplementationVersion::parse(API_VERSION)) {
            (Ok(theirs), Ok(ours)) => theirs >= ours,
            _ => false,
        };
        if !supported {
            return Err(ProtocolError::UnsupportedApiVersion(proposed.to_string()));
        }

        log::debug!("External solver speaks API version {}", proposed);
        self.api_version = Some(proposed.to_string());
        Ok(())
    }

    /// Asks for selections and serves callbacks until the reply arrives
    pub fn select(&mut self, requirements: &Requirements, refresh: bool, handler: &mut dyn Handler) -> Result<SelectReply> {
        let ticket = self.allocate_ticket();
        let args = json!([serde_json::to_value(requirements)?, refresh]);
        self.send(&Message::invoke(Some(ticket.clone()), "select", args))?;
        self.pending.insert(ticket, PendingCall::Select);

        loop {
            match self.step(handler)? {
                Step::Continue => {}
                Step::Done(reply) => return Ok(reply),
            }
        }
    }

    fn step(&mut self, handler: &mut dyn Handler) -> Result<Step> {
        self.cancellation.check()?;

        match self.read_message()? {
            Message::Invoke { ticket, operation, args } => {
                let (status, result) = dispatch(handler, &operation, &args);
                if let Some(ticket) = ticket {
                    self.send(&Message::reply(ticket, status, result))?;
                }
                Ok(Step::Continue)
            }
            Message::Return { ticket, status, args } => {
                let call = self
                    .pending
                    .remove(&ticket)
                    .ok_or_else(|| ProtocolError::UnknownTicket(ticket.clone()))?;

                match (call, status) {
                    (PendingCall::Select, ReturnStatus::OkXml) => {
                        let xml = self.read_raw()?;
                        let selections = parse_selections(&xml)?;
                        let stale = args.get(0).and_then(Value::as_bool).unwrap_or(false);
                        Ok(Step::Done(SelectReply { selections, stale }))
                    }
                    (_, ReturnStatus::Fail) => Err(SolverError::Remote(remote_message(&args))),
                    (PendingCall::Select, ReturnStatus::Ok) => Err(ProtocolError::UnexpectedMessage(
                        "select returned without a selections document".to_string(),
                    )
                    .into()),
                }
            }
        }
    }

    fn allocate_ticket(&mut self) -> String {
        self.next_ticket += 1;
        self.next_ticket.to_string()
    }

    fn send(&mut self, message: &Message) -> std::result::Result<(), ProtocolError> {
        write_frame(&mut self.writer, &message.encode())
    }

    fn read_message(&mut self) -> std::result::Result<Message, ProtocolError> {
        let payload = self.read_payload()?;
        Message::decode(&payload)
    }

    /// The XML frame following an `ok+xml` reply
    fn read_raw(&mut self) -> std::result::Result<String, ProtocolError> {
        let payload = self.read_payload()?;
        String::from_utf8(payload).map_err(|e| ProtocolError::Xml(e.to_string()))
    }

    fn read_payload(&mut self) -> std::result::Result<Vec<u8>, ProtocolError> {
        read_frame(&mut self.reader)?.ok_or(ProtocolError::PrematureExit)
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

/// Runs a callback and returns the reply status and value
fn dispatch(handler: &mut dyn Handler, operation: &str, args: &Value) -> (ReturnStatus, Value) {
    let arg = |index: usize| args.get(index).and_then(Value::as_str).unwrap_or_default();

    match operation {
        "confirm" => {
            let answer = if handler.confirm(arg(0)) { "ok" } else { "cancel" };
            (ReturnStatus::Ok, json!(answer))
        }
        "confirm-keys" => {
            let keys = args.get(1).cloned().unwrap_or(Value::Null);
            (ReturnStatus::Ok, json!(handler.confirm_keys(arg(0), &keys)))
        }
        "update-key-info" => {
            let info = args.get(1).cloned().unwrap_or(Value::Null);
            handler.update_key_info(arg(0), &info);
            (ReturnStatus::Ok, Value::Null)
        }
        "report-error" => {
            handler.report_error(arg(0));
            (ReturnStatus::Ok, Value::Null)
        }
        _ => {
            log::warn!("External solver called unknown operation {}", operation);
            (ReturnStatus::Fail, json!(format!("Unknown operation {}", operation)))
        }
    }
}

fn remote_message(args: &Value) -> String {
    match args {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .first()
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| args.to_string()),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FeedUri;
    use std::io::Cursor;

    const SELECTIONS_XML: &str = r#"<?xml version="1.0"?>
<selections interface="http://test/app.xml" command="run" xmlns="http://zero-install.sourceforge.net/2004/injector/interface">
  <selection interface="http://test/app.xml" id="app1" version="1.0">
    <command name="run" path="app"/>
  </selection>
</selections>"#;

    fn frames(messages: &[&[u8]]) -> Cursor<Vec<u8>> {
        let mut out = Vec::new();
        for payload in messages {
            write_frame(&mut out, payload).unwrap();
        }
        Cursor::new(out)
    }

    fn requirements() -> Requirements {
        Requirements::new(FeedUri::parse("http://test/app.xml").unwrap()).with_command("run")
    }

    fn sent_messages(written: Vec<u8>) -> Vec<Message> {
        let mut reader = Cursor::new(written);
        let mut messages = Vec::new();
        while let Some(payload) = read_frame(&mut reader).unwrap() {
            messages.push(Message::decode(&payload).unwrap());
        }
        messages
    }

    struct Trusting {
        confirmations: Vec<String>,
    }

    impl Handler for Trusting {
        fn confirm(&mut self, message: &str) -> bool {
            self.confirmations.push(message.to_string());
            true
        }

        fn confirm_keys(&mut self, _feed: &str, keys: &Value) -> Vec<String> {
            keys.as_object()
                .map(|keys| keys.keys().cloned().collect())
                .unwrap_or_default()
        }
    }

    #[test]
    fn test_handshake_accepts_newer_version() {
        let input = frames(&[br#"["invoke",null,"set-api-version",["2.8"]]"#]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());
        session.handshake().unwrap();
        assert_eq!(session.api_version(), Some("2.8"));
    }

    #[test]
    fn test_handshake_rejects_older_version() {
        let input = frames(&[br#"["invoke",null,"set-api-version",["2.6"]]"#]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());
        assert!(matches!(
            session.handshake(),
            Err(ProtocolError::UnsupportedApiVersion(v)) if v == "2.6"
        ));
    }

    #[test]
    fn test_handshake_must_come_first() {
        let input = frames(&[br#"["invoke","1","confirm",["hello"]]"#]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());
        assert!(matches!(session.handshake(), Err(ProtocolError::Handshake(_))));
    }

    #[test]
    fn test_select_with_callbacks() {
        let input = frames(&[
            br#"["invoke",null,"set-api-version",["2.7"]]"#,
            br#"["invoke","r1","confirm",["Download 3 MB?"]]"#,
            br#"["invoke","r2","confirm-keys",["http://test/app.xml",{"DE3B":[]}]]"#,
            br#"["invoke","r3","frobnicate",[]]"#,
            br#"["return","1","ok+xml",[true]]"#,
            SELECTIONS_XML.as_bytes(),
        ]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());
        let mut handler = Trusting { confirmations: Vec::new() };

        session.handshake().unwrap();
        let reply = session.select(&requirements(), false, &mut handler).unwrap();

        assert!(reply.stale);
        assert_eq!(reply.selections.implementations.len(), 1);
        assert_eq!(reply.selections.implementations[0].id, "app1");
        assert_eq!(handler.confirmations, vec!["Download 3 MB?".to_string()]);

        let (_, written) = session.into_inner();
        let sent = sent_messages(written);
        assert_eq!(sent.len(), 4);
        match &sent[0] {
            Message::Invoke { ticket, operation, args } => {
                assert_eq!(ticket.as_deref(), Some("1"));
                assert_eq!(operation, "select");
                assert_eq!(args[0]["interface-uri"], json!("http://test/app.xml"));
                assert_eq!(args[1], json!(false));
            }
            other => panic!("expected select call, got {:?}", other),
        }
        assert_eq!(sent[1], Message::reply("r1", ReturnStatus::Ok, json!("ok")));
        assert_eq!(sent[2], Message::reply("r2", ReturnStatus::Ok, json!(["DE3B"])));
        assert_eq!(
            sent[3],
            Message::reply("r3", ReturnStatus::Fail, json!("Unknown operation frobnicate"))
        );
    }

    #[test]
    fn test_batch_handler_declines() {
        let input = frames(&[
            br#"["invoke","r1","confirm",["Trust?"]]"#,
            br#"["return","1","fail",["No solution found for app"]]"#,
        ]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());

        let err = session.select(&requirements(), true, &mut BatchHandler).unwrap_err();
        assert!(matches!(err, SolverError::Remote(ref m) if m == "No solution found for app"));

        let (_, written) = session.into_inner();
        let sent = sent_messages(written);
        assert_eq!(sent[1], Message::reply("r1", ReturnStatus::Ok, json!("cancel")));
    }

    #[test]
    fn test_unknown_ticket() {
        let input = frames(&[br#"["return","99","ok",[]]"#]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());
        let err = session.select(&requirements(), false, &mut BatchHandler).unwrap_err();
        assert!(matches!(err, SolverError::Protocol(ProtocolError::UnknownTicket(ref t)) if t == "99"));
        assert!(err.is_network_error());
    }

    #[test]
    fn test_premature_exit() {
        let input = frames(&[br#"["invoke","r1","report-error",["feed broken"]]"#]);
        let mut session = Session::new(input, Vec::new(), CancellationToken::new());
        let err = session.select(&requirements(), false, &mut BatchHandler).unwrap_err();
        assert!(matches!(err, SolverError::Protocol(ProtocolError::PrematureExit)));
    }

    #[test]
    fn test_cancelled_between_frames() {
        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let input = frames(&[br#"["return","1","ok+xml",[false]]"#, SELECTIONS_XML.as_bytes()]);
        let mut session = Session::new(input, Vec::new(), cancellation);
        let err = session.select(&requirements(), false, &mut BatchHandler).unwrap_err();
        assert!(matches!(err, SolverError::Cancelled));
    }
}
