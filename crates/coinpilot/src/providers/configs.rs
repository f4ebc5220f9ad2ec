/// Settings for any endpoint speaking the OpenAI chat completions API
#[derive(Debug, Clone)]
pub struct OpenAiProviderConfig {
    pub host: String,
    pub api_key: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
}

impl OpenAiProviderConfig {
    pub fn new<H, K, M>(host: H, api_key: K, model: M) -> Self
    where
        H: Into<String>,
        K: Into<String>,
        M: Into<String>,
    {
        Self {
            host: host.into(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}
