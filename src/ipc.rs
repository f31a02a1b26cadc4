//! # IPC Messages Module
//!
//! Messaggi piatti `{signal, payload}` scambiati con il livello di presentazione.
//!
//! ## Comandi in ingresso (`webview.*`):
//! - `compressSelected` / `compressCurrent`
//! - `saveSelected` / `saveCurrent`
//! - `openFile` / `openFileInExplorer`
//!
//! ## Eventi in uscita (`extension.*`):
//! - `init`: albero del workspace appena scansionato
//! - `tinypngUsageUpdate`: contatore d'uso dell'ottimizzatore remoto
//! - `compressed` / `currentCompressed`: un nodo ha concluso il suo job
//! - `allCompressed`: il batch è terminato (anche se tutti i job sono falliti)
//! - `saved` / `currentSaved`: esito per file del salvataggio
//!
//! Ogni payload in uscita è un envelope `{status: fulfilled|rejected, data, error}`.
//!
//! ## Esempio:
//! ```rust
//! use asset_compressor::ipc::Command;
//!
//! let cmd: Command = serde_json::from_str(
//!     r#"{"signal":"webview.compressCurrent","payload":{"key":"/w/a.png"}}"#,
//! ).unwrap();
//! assert_eq!(cmd, Command::CompressCurrent { key: "/w/a.png".into() });
//! ```

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Inbound command from the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", content = "payload")]
pub enum Command {
    #[serde(rename = "webview.compressSelected")]
    CompressSelected { keys: Vec<String> },
    #[serde(rename = "webview.compressCurrent")]
    CompressCurrent { key: String },
    #[serde(rename = "webview.saveSelected")]
    SaveSelected { keys: Vec<String> },
    #[serde(rename = "webview.saveCurrent")]
    SaveCurrent { key: String },
    #[serde(rename = "webview.openFile")]
    OpenFile { path: PathBuf },
    #[serde(rename = "webview.openFileInExplorer")]
    OpenFileInExplorer { path: PathBuf },
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "extension.init")]
    Init,
    #[serde(rename = "extension.tinypngUsageUpdate")]
    UsageUpdate,
    #[serde(rename = "extension.compressed")]
    Compressed,
    #[serde(rename = "extension.allCompressed")]
    AllCompressed,
    #[serde(rename = "extension.currentCompressed")]
    CurrentCompressed,
    #[serde(rename = "extension.saved")]
    Saved,
    #[serde(rename = "extension.currentSaved")]
    CurrentSaved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Fulfilled,
    Rejected,
}

/// `{status, data, error}` wrapper of every outbound payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Envelope {
    pub fn fulfilled<T: Serialize>(data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self {
                status: Status::Fulfilled,
                data,
                error: None,
            },
            Err(e) => Self::rejected(format!("failed to serialize payload: {}", e)),
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            status: Status::Rejected,
            data: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Rejected envelope still carrying `data`
    pub fn rejected_with<T: Serialize>(data: &T, error: impl Into<String>) -> Self {
        Self {
            status: Status::Rejected,
            data: serde_json::to_value(data).unwrap_or_default(),
            error: Some(error.into()),
        }
    }

    pub fn is_fulfilled(&self) -> bool {
        self.status == Status::Fulfilled
    }
}

/// Outbound event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub signal: Signal,
    pub payload: Envelope,
}

impl Event {
    pub fn new(signal: Signal, payload: Envelope) -> Self {
        Self { signal, payload }
    }
}

/// Receiver of outbound events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// One JSON object per line on stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesSink;

impl EventSink for JsonLinesSink {
    fn emit(&self, event: &Event) {
        match serde_json::to_string(event) {
            Ok(json) => {
                let stdout = std::io::stdout();
                let mut lock = stdout.lock();
                if writeln!(lock, "{}", json).and_then(|_| lock.flush()).is_err() {
                    warn!("stdout closed, dropping {:?} event", event.signal);
                }
            }
            Err(e) => warn!("Failed to serialize {:?} event: {}", event.signal, e),
        }
    }
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<Event>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.events().into_iter().map(|e| e.signal).collect()
    }

    pub fn last(&self, signal: Signal) -> Option<Event> {
        self.events().into_iter().rev().find(|e| e.signal == signal)
    }
}

impl EventSink for CollectingSink {
    fn emit(&self, event: &Event) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commands_round_trip_with_signal_names() {
        let cmd = Command::parse(r#"{"signal":"webview.saveSelected","payload":{"keys":["/a.png","/b.gif"]}}"#).unwrap();
        assert_eq!(
            cmd,
            Command::SaveSelected {
                keys: vec!["/a.png".to_string(), "/b.gif".to_string()]
            }
        );
        let open = Command::parse(r#"{"signal":"webview.openFileInExplorer","payload":{"path":"/w/a.png"}}"#).unwrap();
        assert_eq!(open, Command::OpenFileInExplorer { path: PathBuf::from("/w/a.png") });
        assert!(Command::parse(r#"{"signal":"webview.unknown","payload":{}}"#).is_err());
    }

    #[test]
    fn test_event_envelope_shape() {
        let event = Event::new(Signal::UsageUpdate, Envelope::fulfilled(&json!({"usage": 12})));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "signal": "extension.tinypngUsageUpdate",
                "payload": {"status": "fulfilled", "data": {"usage": 12}, "error": null}
            })
        );

        let rejected = serde_json::to_value(Envelope::rejected("[IOError]: disk full")).unwrap();
        assert_eq!(rejected["status"], "rejected");
        assert_eq!(rejected["error"], "[IOError]: disk full");
    }

    #[test]
    fn test_collecting_sink() {
        let sink = CollectingSink::new();
        sink.emit(&Event::new(Signal::Compressed, Envelope::fulfilled(&1)));
        sink.emit(&Event::new(Signal::AllCompressed, Envelope::fulfilled(&2)));
        assert_eq!(sink.signals(), vec![Signal::Compressed, Signal::AllCompressed]);
        assert_eq!(sink.last(Signal::Compressed).unwrap().payload.data, json!(1));
    }
}
