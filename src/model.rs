/// Models the backend can route a chat request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Model {
    #[default]
    LocalLlama,
    Claude3,
    Grok,
}

impl Model {
    pub fn as_str(&self) -> &'static str {
        match self {
            Model::LocalLlama => "local-llama",
            Model::Claude3 => "claude-3",
            Model::Grok => "grok",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local-llama" => Some(Model::LocalLlama),
            "claude-3" => Some(Model::Claude3),
            "grok" => Some(Model::Grok),
            _ => None,
        }
    }

    pub fn all() -> Vec<Model> {
        vec![Model::LocalLlama, Model::Claude3, Model::Grok]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Model::LocalLlama => "Local LLaMA",
            Model::Claude3 => "Claude 3",
            Model::Grok => "Grok",
        }
    }
}
