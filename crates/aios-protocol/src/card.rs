//! Agent cards: the capability descriptor a peer publishes.

use serde::{Deserialize, Serialize};

/// Transport name for JSON-RPC over HTTP (with SSE for streaming).
pub const TRANSPORT_JSONRPC: &str = "JSONRPC";

/// Well-known path relative to a peer's base URL.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent-card.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub url: String,
    #[serde(default)]
    pub version: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_transport: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_interfaces: Vec<AgentInterface>,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    #[serde(default)]
    pub default_output_modes: Vec<String>,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

fn default_protocol_version() -> String {
    "0.3.0".to_owned()
}

impl AgentCard {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            url: url.into(),
            version: "0.1.0".to_owned(),
            protocol_version: default_protocol_version(),
            preferred_transport: Some(TRANSPORT_JSONRPC.to_owned()),
            additional_interfaces: Vec::new(),
            capabilities: AgentCapabilities {
                streaming: true,
                ..AgentCapabilities::default()
            },
            default_input_modes: vec!["text/plain".to_owned()],
            default_output_modes: vec!["text/plain".to_owned()],
            skills: Vec::new(),
        }
    }

    /// Every (transport, url) pair the peer accepts, preferred first.
    pub fn interfaces(&self) -> Vec<AgentInterface> {
        let mut interfaces = vec![AgentInterface {
            url: self.url.clone(),
            transport: self
                .preferred_transport
                .clone()
                .unwrap_or_else(|| TRANSPORT_JSONRPC.to_owned()),
        }];
        for interface in &self.additional_interfaces {
            if !interfaces.contains(interface) {
                interfaces.push(interface.clone());
            }
        }
        interfaces
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInterface {
    pub url: String,
    pub transport: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub push_notifications: bool,
    #[serde(default)]
    pub state_transition_history: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interfaces_default_to_jsonrpc_and_dedupe() {
        let mut card = AgentCard::new("peer", "http://localhost:9000/");
        card.preferred_transport = None;
        card.additional_interfaces = vec![
            AgentInterface {
                url: "http://localhost:9000/".into(),
                transport: TRANSPORT_JSONRPC.into(),
            },
            AgentInterface {
                url: "localhost:9001".into(),
                transport: "GRPC".into(),
            },
        ];
        let interfaces = card.interfaces();
        assert_eq!(interfaces.len(), 2);
        assert_eq!(interfaces[0].transport, TRANSPORT_JSONRPC);
        assert_eq!(interfaces[1].transport, "GRPC");
    }

    #[test]
    fn minimal_card_deserializes_with_defaults() {
        let card: AgentCard =
            serde_json::from_value(json!({"name": "peer", "url": "http://peer"})).unwrap();
        assert_eq!(card.protocol_version, "0.3.0");
        assert!(card.skills.is_empty());
        assert!(!card.capabilities.streaming);
    }
}
