//! Signaling-Nachrichten (JSON ueber WebSocket)
//!
//! ## Wire-Format
//! ```text
//! { "Type": "Request", "Data": "...", "SenderId": "...", "ReceiverId": "...", "RoomId": "..." }
//! ```
//!
//! Ausgehend werden die Feldnamen immer in PascalCase geschrieben, `Data`
//! entfaellt wenn es leer ist. Eingehend wird Gross-/Kleinschreibung der
//! Schluessel ignoriert (Unity-Clients senden `senderId`, `roomId`, ...).
//! Fehlende Felder und `null` werden zu Leerwerten, unbekannte Schluessel
//! werden uebersprungen.

use mistnet_core::types::{NodeId, RoomId};
use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// Inhalt von `Data` in der Pairing-Nachricht an den neu zugeordneten Node
pub const DISCONNECT_DATA: &str = "Disconnect";

// ---------------------------------------------------------------------------
// SignalingType
// ---------------------------------------------------------------------------

/// Offene Aufzaehlung der Nachrichtentypen
///
/// Nur `Request` wird vom Relay gesondert behandelt. Unbekannte Werte
/// bleiben als `Other` erhalten und werden unveraendert weitergeleitet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SignalingType {
    Offer,
    Answer,
    Candidate,
    Candidates,
    Request,
    Other(String),
    /// Typ fehlte in der Nachricht
    #[default]
    Leer,
}

impl SignalingType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Offer => "Offer",
            Self::Answer => "Answer",
            Self::Candidate => "Candidate",
            Self::Candidates => "Candidates",
            Self::Request => "Request",
            Self::Other(s) => s,
            Self::Leer => "",
        }
    }

    /// Prueft ob die Nachricht in die Pairing-Queue gehoert
    pub fn ist_request(&self) -> bool {
        matches!(self, Self::Request)
    }
}

impl From<String> for SignalingType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Offer" => Self::Offer,
            "Answer" => Self::Answer,
            "Candidate" => Self::Candidate,
            "Candidates" => Self::Candidates,
            "Request" => Self::Request,
            "" => Self::Leer,
            _ => Self::Other(s),
        }
    }
}

impl From<SignalingType> for String {
    fn from(t: SignalingType) -> Self {
        match t {
            SignalingType::Other(s) => s,
            andere => andere.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for SignalingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SignalingPayload
// ---------------------------------------------------------------------------

/// Eine Signaling-Nachricht zwischen zwei Nodes
///
/// Der Inhalt von `data` (SDP, ICE-Kandidaten, ...) wird vom Relay nicht
/// interpretiert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SignalingPayload {
    #[serde(rename = "Type")]
    pub typ: SignalingType,
    #[serde(rename = "Data", skip_serializing_if = "String::is_empty")]
    pub data: String,
    #[serde(rename = "SenderId")]
    pub sender_id: NodeId,
    #[serde(rename = "ReceiverId")]
    pub receiver_id: NodeId,
    #[serde(rename = "RoomId")]
    pub room_id: RoomId,
}

impl<'de> Deserialize<'de> for SignalingPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PayloadVisitor)
    }
}

struct PayloadVisitor;

impl<'de> Visitor<'de> for PayloadVisitor {
    type Value = SignalingPayload;

    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ein Signaling-Objekt")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut payload = SignalingPayload::default();
        while let Some(schluessel) = map.next_key::<String>()? {
            // Spaeterer Schluessel gewinnt, auch bei abweichender Schreibweise
            match schluessel.to_ascii_lowercase().as_str() {
                "type" => payload.typ = SignalingType::from(text_oder_leer(&mut map)?),
                "data" => payload.data = text_oder_leer(&mut map)?,
                "senderid" => payload.sender_id = NodeId::from(text_oder_leer(&mut map)?),
                "receiverid" => payload.receiver_id = NodeId::from(text_oder_leer(&mut map)?),
                "roomid" => payload.room_id = RoomId::new(text_oder_leer(&mut map)?),
                _ => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(payload)
    }
}

/// Liest einen String-Wert, `null` wird zum Leerstring
fn text_oder_leer<'de, A: MapAccess<'de>>(map: &mut A) -> Result<String, A::Error> {
    Ok(map.next_value::<Option<String>>()?.unwrap_or_default())
}

impl SignalingPayload {
    /// Pairing-Nachricht an den aeltesten wartenden Node:
    /// `sender` moechte sich mit `receiver` verbinden.
    pub fn verbindungs_anfrage(sender: NodeId, receiver: NodeId, room_id: RoomId) -> Self {
        Self {
            typ: SignalingType::Request,
            data: String::new(),
            sender_id: sender,
            receiver_id: receiver,
            room_id,
        }
    }

    /// Pairing-Nachricht an den Neuankoemmling: bestehende Verbindung abbauen,
    /// neues Gegenueber ist `sender`.
    pub fn trenn_anfrage(sender: NodeId, receiver: NodeId, room_id: RoomId) -> Self {
        Self {
            typ: SignalingType::Request,
            data: DISCONNECT_DATA.to_string(),
            sender_id: sender,
            receiver_id: receiver,
            room_id,
        }
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ohne_data_wird_geparst() {
        let json = r#"{"Type":"Request","SenderId":"n1","ReceiverId":"","RoomId":"MistNet"}"#;
        let msg = SignalingPayload::from_json(json).unwrap();
        assert!(msg.typ.ist_request());
        assert_eq!(msg.sender_id, NodeId::from("n1"));
        assert!(msg.receiver_id.ist_leer());
        assert_eq!(msg.room_id, RoomId::from("MistNet"));
        assert!(msg.data.is_empty());
    }

    #[test]
    fn leeres_data_wird_weggelassen() {
        let msg = SignalingPayload::verbindungs_anfrage("n2".into(), "n1".into(), "MistNet".into());
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"Type":"Request","SenderId":"n2","ReceiverId":"n1","RoomId":"MistNet"}"#
        );
    }

    #[test]
    fn trenn_anfrage_traegt_disconnect() {
        let msg = SignalingPayload::trenn_anfrage("n1".into(), "n2".into(), "MistNet".into());
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"Type":"Request","Data":"Disconnect","SenderId":"n1","ReceiverId":"n2","RoomId":"MistNet"}"#
        );
    }

    #[test]
    fn unbekannter_typ_bleibt_erhalten() {
        let json = r#"{"Type":"Renegotiate","SenderId":"a","ReceiverId":"b","RoomId":"r"}"#;
        let msg = SignalingPayload::from_json(json).unwrap();
        assert_eq!(msg.typ, SignalingType::Other("Renegotiate".into()));
        assert!(!msg.typ.ist_request());
        assert!(msg.to_json().unwrap().contains(r#""Type":"Renegotiate""#));
    }

    #[test]
    fn bekannte_typen_werden_erkannt() {
        for (text, erwartet) in [
            ("Offer", SignalingType::Offer),
            ("Answer", SignalingType::Answer),
            ("Candidate", SignalingType::Candidate),
            ("Candidates", SignalingType::Candidates),
        ] {
            assert_eq!(SignalingType::from(text.to_string()), erwartet);
        }
    }

    #[test]
    fn fehlende_felder_erhalten_leerwerte() {
        let msg = SignalingPayload::from_json("{}").unwrap();
        assert_eq!(msg.typ, SignalingType::Leer);
        assert!(msg.sender_id.ist_leer());
        assert!(msg.room_id.as_str().is_empty());
    }

    #[test]
    fn ungueltiges_json_schlaegt_fehl() {
        assert!(SignalingPayload::from_json("kein json").is_err());
        assert!(SignalingPayload::from_json(r#"{"Type":5}"#).is_err());
        assert!(SignalingPayload::from_json(r#"{"senderId":["n1"]}"#).is_err());
        assert!(SignalingPayload::from_json(r#"["Request"]"#).is_err());
    }

    #[test]
    fn unity_client_format_wird_geparst() {
        let json = r#"{"senderId":"n1","receiverId":null,"roomId":"MistNet","data":null,"type":"Request"}"#;
        let msg = SignalingPayload::from_json(json).unwrap();
        assert!(msg.typ.ist_request());
        assert_eq!(msg.sender_id, NodeId::from("n1"));
        assert!(msg.receiver_id.ist_leer());
        assert_eq!(msg.room_id, RoomId::from("MistNet"));
        assert!(msg.data.is_empty());

        // Ausgabe bleibt PascalCase
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"Type":"Request","SenderId":"n1","ReceiverId":"","RoomId":"MistNet"}"#
        );
    }

    #[test]
    fn schluessel_ohne_beachtung_der_schreibweise() {
        let json = r#"{"TYPE":"Offer","Data":"sdp","SENDERID":"a","receiverid":"b","rOOmId":"r","extra":{"x":1}}"#;
        let msg = SignalingPayload::from_json(json).unwrap();
        assert_eq!(msg.typ, SignalingType::Offer);
        assert_eq!(msg.data, "sdp");
        assert_eq!(msg.sender_id, NodeId::from("a"));
        assert_eq!(msg.receiver_id, NodeId::from("b"));
        assert_eq!(msg.room_id, RoomId::from("r"));
    }

    #[test]
    fn null_typ_ist_leer() {
        let msg = SignalingPayload::from_json(r#"{"Type":null,"RoomId":"MistNet"}"#).unwrap();
        assert_eq!(msg.typ, SignalingType::Leer);
    }
}
