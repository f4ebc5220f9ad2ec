use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::{AgentError, AgentResult};
use crate::models::content::Content;
use crate::models::message::{Message, ToolRequest};
use crate::models::tool::Tool;
use crate::providers::base::Provider;
use crate::systems::{System, ToolCatalog};

const DEFAULT_MAX_TOOL_ROUNDS: usize = 10;
const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_secs(30);

/// Agent integrates a foundational LLM with the tool servers it can call.
///
/// One agent is one chat session: it owns the conversation history, which only ever
/// grows, and `chat` takes `&mut self` so a session runs at most one exchange at a time.
pub struct Agent {
    systems: Vec<Box<dyn System>>,
    catalog: ToolCatalog,
    provider: Box<dyn Provider>,
    messages: Vec<Message>,
    max_tool_rounds: usize,
    chat_timeout: Duration,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            systems: Vec::new(),
            catalog: ToolCatalog::new(),
            provider,
            messages: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            chat_timeout: DEFAULT_CHAT_TIMEOUT,
        }
    }

    /// Maximum number of tool rounds a single `chat` may run before failing
    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Upper bound on one `chat`, including every nested tool call
    pub fn with_chat_timeout(mut self, chat_timeout: Duration) -> Self {
        self.chat_timeout = chat_timeout;
        self
    }

    /// Add a system to the agent, registering every tool it advertised
    pub fn add_system(&mut self, system: Box<dyn System>) -> AgentResult<()> {
        if self.get_system(system.name()).is_some() {
            return Err(AgentError::DuplicateServer(system.name().to_string()));
        }
        self.catalog.register(system.name(), system.tools())?;
        info!(
            system = system.name(),
            tools = system.tools().len(),
            "registered system"
        );
        self.systems.push(system);
        Ok(())
    }

    /// The conversation so far
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Tool declarations offered to the model
    pub fn tools(&self) -> Vec<Tool> {
        self.catalog.tools()
    }

    fn get_system(&self, name: &str) -> Option<&dyn System> {
        self.systems
            .iter()
            .find(|system| system.name() == name)
            .map(|v| &**v)
    }

    fn system_prompt(&self) -> String {
        let mut prompt = String::from(
            "You are a helpful assistant. When a question needs live data, call one of the \
             available tools instead of guessing, then answer using the tool output.",
        );
        if !self.systems.is_empty() {
            prompt.push_str("\n\nConnected tool servers:");
            for system in &self.systems {
                prompt.push_str(&format!("\n- {}: {}", system.name(), system.description()));
            }
        }
        prompt
    }

    /// Dispatch a single tool call to the system that owns the tool
    async fn dispatch_tool_call(&self, request: &ToolRequest) -> AgentResult<Vec<Content>> {
        let call = request.tool_call.clone()?;
        let entry = self
            .catalog
            .get(&call.name)
            .ok_or_else(|| AgentError::ToolNotFound(call.name.clone()))?;
        let system = self
            .get_system(&entry.server)
            .ok_or_else(|| AgentError::ServerNotFound(entry.server.clone()))?;

        info!(tool = %call.name, system = %entry.server, "calling tool");
        system.call(call).await
    }

    /// Send one user message and run the agentic loop until the model answers with text.
    ///
    /// Each tool round appends the model's tool-call turn and a tool-result turn to the
    /// history before the model is asked again. A failing tool call aborts the exchange.
    pub async fn chat(&mut self, text: &str) -> AgentResult<String> {
        self.messages.push(Message::user().with_text(text));

        let limit = self.chat_timeout;
        match tokio::time::timeout(limit, self.run_loop()).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "chat timed out");
                Err(AgentError::Timeout(limit.as_millis() as u64))
            }
        }
    }

    async fn run_loop(&mut self) -> AgentResult<String> {
        let system_prompt = self.system_prompt();
        let tools = self.catalog.tools();
        let mut rounds = 0;

        loop {
            let (response, usage) = self
                .provider
                .complete(&system_prompt, &self.messages, &tools)
                .await
                .map_err(|e| AgentError::Provider(e.to_string()))?;
            debug!(?usage, "model replied");

            let requests = response.tool_requests();
            if requests.is_empty() {
                let answer = response.text();
                self.messages.push(response);
                return Ok(answer);
            }

            if rounds == self.max_tool_rounds {
                warn!(rounds, "tool-call limit reached");
                return Err(AgentError::ToolCallLimitExceeded(self.max_tool_rounds));
            }
            rounds += 1;

            let mut results = Message::tool();
            for request in requests {
                let output = self.dispatch_tool_call(request).await?;
                results = results.with_tool_response(request.id.clone(), Ok(output));
            }

            self.messages.push(response);
            self.messages.push(results);
        }
    }
}
