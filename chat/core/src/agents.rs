//! Agent Catalog
//!
//! The agents offered by the agent API, with the display names shown to the
//! user. A session binds one [`AgentIdentity`] for its whole lifetime.

use serde::{Deserialize, Serialize};

/// The `(id, name)` pair a session is bound to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Backend identifier (e.g. "general")
    pub id: String,
    /// Human-readable name
    pub name: String,
}

impl AgentIdentity {
    /// Create a new identity
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Whether an endpoint is a single agent or a multi-agent team
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Served under `/agents/{route}`
    Agent,
    /// Served under `/teams/{route}`
    Team,
}

/// Static description of a known agent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AgentProfile {
    /// Identifier used by the client
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
    /// Agent or team
    pub kind: AgentKind,
    /// Path segment on the agent API
    pub route: &'static str,
}

impl AgentProfile {
    /// Identity to start a session with
    #[must_use]
    pub fn identity(&self) -> AgentIdentity {
        AgentIdentity::new(self.id, self.name)
    }
}

/// Agents offered by the agent API
pub const KNOWN_AGENTS: &[AgentProfile] = &[
    AgentProfile {
        id: "general",
        name: "Assistant Général",
        description: "Agent conversationnel polyvalent pour l'assistance générale et les informations",
        kind: AgentKind::Agent,
        route: "general",
    },
    AgentProfile {
        id: "search",
        name: "Agent de Recherche",
        description: "Expert en recherche web pour des informations en temps réel",
        kind: AgentKind::Agent,
        route: "search",
    },
    AgentProfile {
        id: "finance",
        name: "Agent Financier",
        description: "Spécialiste en analyse financière et données boursières",
        kind: AgentKind::Agent,
        route: "finance",
    },
    AgentProfile {
        id: "code",
        name: "Agent de Code",
        description: "Expert en exécution Python, calculs mathématiques et assistance programmation",
        kind: AgentKind::Agent,
        route: "code",
    },
    AgentProfile {
        id: "system",
        name: "Agent Système",
        description: "Administrateur système pour l'exécution de commandes shell et gestion de fichiers",
        kind: AgentKind::Agent,
        route: "system",
    },
    AgentProfile {
        id: "research_team",
        name: "Équipe Recherche",
        description: "Équipe collaborative multi-agents combinant recherche, analyse et synthèse",
        kind: AgentKind::Team,
        route: "collaborative",
    },
];

/// Look up a known agent by ID
#[must_use]
pub fn find_agent(id: &str) -> Option<&'static AgentProfile> {
    KNOWN_AGENTS.iter().find(|a| a.id == id)
}

/// Resolve the API kind and route segment for an agent ID
///
/// Unknown IDs are passed through as plain agents so new backend agents can
/// be reached without a client update.
#[must_use]
pub fn route_for(id: &str) -> (AgentKind, String) {
    match find_agent(id) {
        Some(profile) => (profile.kind, profile.route.to_string()),
        None => (AgentKind::Agent, id.to_string()),
    }
}
