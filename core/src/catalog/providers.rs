use super::ProviderKind;

pub struct ProviderSeed {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: ProviderKind,
    pub requires_api_key: bool,
    /// `(name, label)` pairs in dropdown order.
    pub models: &'static [(&'static str, &'static str)],
}

pub const DEFAULT_PROVIDER: &str = "Anthropic";
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

pub const PROVIDER_SEEDS: &[ProviderSeed] = &[
    ProviderSeed {
        name: "Anthropic",
        label: "Anthropic",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("claude-3-5-sonnet-latest", "Claude 3.5 Sonnet (new)"),
            ("claude-3-5-sonnet-20240620", "Claude 3.5 Sonnet (old)"),
            ("claude-3-5-haiku-latest", "Claude 3.5 Haiku (new)"),
            ("claude-3-opus-latest", "Claude 3 Opus"),
        ],
    },
    ProviderSeed {
        name: "OpenAI",
        label: "OpenAI",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("gpt-4o", "GPT-4o"),
            ("gpt-4o-mini", "GPT-4o Mini"),
            ("gpt-4-turbo", "GPT-4 Turbo"),
            ("gpt-3.5-turbo", "GPT-3.5 Turbo"),
        ],
    },
    ProviderSeed {
        name: "Google",
        label: "Google Gemini",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("gemini-1.5-flash-latest", "Gemini 1.5 Flash"),
            ("gemini-1.5-pro-latest", "Gemini 1.5 Pro"),
        ],
    },
    ProviderSeed {
        name: "Groq",
        label: "Groq",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("llama-3.1-70b-versatile", "Llama 3.1 70b (Groq)"),
            ("llama-3.1-8b-instant", "Llama 3.1 8b (Groq)"),
        ],
    },
    ProviderSeed {
        name: "OpenRouter",
        label: "OpenRouter",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("anthropic/claude-3.5-sonnet", "Anthropic: Claude 3.5 Sonnet (OpenRouter)"),
            ("google/gemini-flash-1.5", "Google Gemini Flash 1.5 (OpenRouter)"),
            ("mistralai/mistral-nemo", "OpenRouter Mistral Nemo (OpenRouter)"),
        ],
    },
    ProviderSeed {
        name: "Deepseek",
        label: "Deepseek",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("deepseek-coder", "Deepseek-Coder"),
            ("deepseek-chat", "Deepseek-Chat"),
        ],
    },
    ProviderSeed {
        name: "Mistral",
        label: "Mistral",
        kind: ProviderKind::Cloud,
        requires_api_key: true,
        models: &[
            ("open-mistral-nemo", "Mistral Nemo"),
            ("mistral-large-latest", "Mistral Large Latest"),
            ("codestral-latest", "Codestral"),
        ],
    },
    // Ollama models are discovered at runtime from the local server.
    ProviderSeed {
        name: "Ollama",
        label: "Ollama (local)",
        kind: ProviderKind::Local,
        requires_api_key: false,
        models: &[],
    },
];
