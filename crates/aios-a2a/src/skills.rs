//! Derive agent card skills from a local agent's shape.

use std::sync::LazyLock;

use aios_protocol::AgentSkill;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl ToolProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentKind {
    Llm {
        #[serde(default)]
        instruction: String,
        #[serde(default)]
        global_instruction: String,
        #[serde(default)]
        tools: Vec<ToolProfile>,
    },
    Sequential,
    Parallel,
    /// `max_iterations` of zero or `None` means unlimited.
    Loop {
        #[serde(default)]
        max_iterations: Option<u32>,
    },
    Custom,
}

impl AgentKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Llm { .. } => "llm_agent",
            Self::Sequential => "sequential_workflow",
            Self::Parallel => "parallel_workflow",
            Self::Loop { .. } => "loop_workflow",
            Self::Custom => "custom_agent",
        }
    }

    fn default_description(&self) -> &'static str {
        match self {
            Self::Llm { .. } => "An LLM-based agent",
            Self::Sequential => "A sequential workflow agent",
            Self::Parallel => "A parallel workflow agent",
            Self::Loop { .. } => "A loop workflow agent",
            Self::Custom => "A custom agent",
        }
    }

    fn skill_name(&self) -> &'static str {
        match self {
            Self::Llm { .. } => "model",
            Self::Sequential | Self::Parallel | Self::Loop { .. } => "workflow",
            Self::Custom => "custom",
        }
    }
}

/// Static description of an agent tree, enough to advertise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub sub_agents: Vec<AgentProfile>,
}

impl AgentProfile {
    pub fn new(name: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            kind,
            sub_agents: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sub_agent(mut self, sub_agent: AgentProfile) -> Self {
        self.sub_agents.push(sub_agent);
        self
    }
}

/// The agent's own skills followed by those of its direct sub-agents,
/// prefixed with the sub-agent's name.
pub fn build_agent_skills(agent: &AgentProfile) -> Vec<AgentSkill> {
    let mut skills = primary_skills(agent);
    for sub in &agent.sub_agents {
        skills.extend(primary_skills(sub).into_iter().map(|skill| {
            let mut tags = vec![format!("sub_agent:{}", sub.name)];
            tags.extend(skill.tags);
            AgentSkill {
                id: format!("{}_{}", sub.name, skill.id),
                name: format!("{}: {}", sub.name, skill.name),
                description: skill.description,
                tags,
            }
        }));
    }
    skills
}

fn primary_skills(agent: &AgentProfile) -> Vec<AgentSkill> {
    match &agent.kind {
        AgentKind::Llm {
            instruction,
            global_instruction,
            tools,
        } => llm_skills(agent, instruction, global_instruction, tools),
        _ => workflow_skills(agent),
    }
}

fn llm_skills(
    agent: &AgentProfile,
    instruction: &str,
    global_instruction: &str,
    tools: &[ToolProfile],
) -> Vec<AgentSkill> {
    let described: Vec<String> = [
        agent.description.clone(),
        replace_pronouns(instruction),
        replace_pronouns(global_instruction),
    ]
    .into_iter()
    .filter(|part| !part.is_empty())
    .collect();
    let description = if described.is_empty() {
        agent.kind.default_description().to_owned()
    } else {
        described.join(" ")
    };

    let mut skills = vec![AgentSkill {
        id: agent.name.clone(),
        name: "model".into(),
        description,
        tags: vec!["llm".into()],
    }];
    skills.extend(tools.iter().map(|tool| AgentSkill {
        id: format!("{}-{}", agent.name, tool.name),
        name: tool.name.clone(),
        description: if tool.description.is_empty() {
            format!("Tool: {}", tool.name)
        } else {
            tool.description.clone()
        },
        tags: vec!["llm".into(), "tools".into()],
    }));
    skills
}

fn workflow_skills(agent: &AgentProfile) -> Vec<AgentSkill> {
    let tag = agent.kind.tag();
    let mut skills = vec![AgentSkill {
        id: agent.name.clone(),
        name: agent.kind.skill_name().into(),
        description: describe(agent),
        tags: vec![tag.into()],
    }];

    if !agent.sub_agents.is_empty() {
        let orchestrated: Vec<&str> = agent
            .sub_agents
            .iter()
            .map(|sub| {
                if sub.description.is_empty() {
                    "No description"
                } else {
                    sub.description.as_str()
                }
            })
            .collect();
        skills.push(AgentSkill {
            id: format!("{}-sub-agents", agent.name),
            name: "sub-agents".into(),
            description: format!("Orchestrates: {}", orchestrated.join("; ")),
            tags: vec![tag.into(), "orchestration".into()],
        });
    }
    skills
}

fn describe(agent: &AgentProfile) -> String {
    let mut parts = Vec::new();
    if !agent.description.is_empty() {
        parts.push(agent.description.clone());
    }
    if !agent.sub_agents.is_empty() {
        let steps: Vec<String> = agent
            .sub_agents
            .iter()
            .map(|sub| {
                if sub.description.is_empty() {
                    format!("execute the {} agent", sub.name)
                } else {
                    sub.description.clone()
                }
            })
            .collect();
        match &agent.kind {
            AgentKind::Sequential => parts.push(sequence(&steps)),
            AgentKind::Parallel => parts.push(format!("{} simultaneously.", enumerate(&steps))),
            AgentKind::Loop { max_iterations } => {
                let max = match max_iterations {
                    Some(n) if *n > 0 => n.to_string(),
                    _ => "unlimited".to_owned(),
                };
                parts.push(format!("{} in a loop (max {max} iterations).", enumerate(&steps)));
            }
            AgentKind::Llm { .. } | AgentKind::Custom => {}
        }
    }
    if parts.is_empty() {
        agent.kind.default_description().to_owned()
    } else {
        parts.join(" ")
    }
}

fn sequence(steps: &[String]) -> String {
    let last = steps.len().saturating_sub(1);
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| match i {
            0 => format!("First, this agent will {step}."),
            i if i == last => format!("Finally, this agent will {step}."),
            _ => format!("Then, this agent will {step}."),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// "This agent will a , b and c"
fn enumerate(steps: &[String]) -> String {
    let last = steps.len().saturating_sub(1);
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| match i {
            0 => format!("This agent will {step}"),
            i if i == last => format!("and {step}"),
            _ => format!(", {step}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// Longest phrases first so "you are" wins over "you".
static PRONOUNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("you were", "I was"),
        ("you are", "I am"),
        ("you're", "I am"),
        ("you've", "I have"),
        ("yours", "mine"),
        ("your", "my"),
        ("you", "I"),
    ]
    .into_iter()
    .filter_map(|(from, to)| {
        Regex::new(&format!(r"(?i)\b{}\b", regex::escape(from)))
            .ok()
            .map(|re| (re, to))
    })
    .collect()
});

/// Rewrite second-person instructions into a first-person description.
pub fn replace_pronouns(instruction: &str) -> String {
    PRONOUNS
        .iter()
        .fold(instruction.to_owned(), |text, (pattern, target)| {
            pattern.replace_all(&text, *target).into_owned()
        })
}
