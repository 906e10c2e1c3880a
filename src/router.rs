//! Two-level command dispatch: session meta-commands, domain commands with
//! subcommand tables of canned prompts, and free-text passthrough.

use std::fmt;

use crate::prompts;

pub const BANNER: &str = "Marketing Platform AI Terminal v2.0\nEnhanced with marketing-specific intelligence...";

pub const HELP_TEXT: &str = "\
Marketing AI Terminal v2.0 Commands:

Marketing Platform Commands:
  audit status              - Check audit tool status and metrics
  audit analyze [id]        - Analyze specific audit or system
  audit conversions         - Analyze conversion funnel
  audit optimize            - Optimize audit tool performance
  ligna health              - Check Ligna integration
  ligna sync                - Verify audit data sync
  ligna contacts            - Contact creation activity
  ligna setup               - Ligna integration setup guide
  email performance         - Email metrics analysis
  email optimize            - Email optimization suggestions
  email generate [industry] - Generate email content
  email templates           - Funnel-stage email templates
  performance               - Full platform performance analysis
  deploy                    - Deployment assistance

Analysis Commands:
  analyze frontend          - React components analysis
  analyze backend           - Express API analysis
  analyze database          - Database optimization
  analyze security          - Security audit

Generation Commands:
  generate webhook          - Create Ligna webhook code
  generate email [target]   - Create email content
  generate landing [target] - Create landing page copy
  generate api              - Create API endpoints

Testing Commands:
  test connections          - Test all system connections
  test api                  - Test API endpoints
  test integration          - Test complete pipeline

General Commands:
  watch                     - Start file monitoring
  unwatch                   - Stop file monitoring
  clear                     - Clear terminal screen
  help                      - Show this help
  exit                      - Exit terminal

Natural Language Examples:
  \"Why are my conversions low this week?\"
  \"How do I optimize my React components?\"
  \"Generate a complete email sequence for restaurants\"
  \"Check if my database queries are optimized\"
  \"Help me set up the Ligna webhook integration\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    Clear,
    Exit,
    Watch,
    Unwatch,
}

impl MetaCommand {
    /// Whole-input, case-insensitive match.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "help" => Some(MetaCommand::Help),
            "clear" => Some(MetaCommand::Clear),
            "exit" | "quit" => Some(MetaCommand::Exit),
            "watch" => Some(MetaCommand::Watch),
            "unwatch" => Some(MetaCommand::Unwatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Audit,
    Ligna,
    Email,
    Performance,
    Deploy,
    Analyze,
    Generate,
    Test,
}

impl Domain {
    pub const ALL: [Domain; 8] = [
        Domain::Audit,
        Domain::Ligna,
        Domain::Email,
        Domain::Performance,
        Domain::Deploy,
        Domain::Analyze,
        Domain::Generate,
        Domain::Test,
    ];

    pub fn from_verb(verb: &str) -> Option<Self> {
        let verb = verb.to_ascii_lowercase();
        Self::ALL.into_iter().find(|d| d.name() == verb)
    }

    pub fn name(self) -> &'static str {
        match self {
            Domain::Audit => "audit",
            Domain::Ligna => "ligna",
            Domain::Email => "email",
            Domain::Performance => "performance",
            Domain::Deploy => "deploy",
            Domain::Analyze => "analyze",
            Domain::Generate => "generate",
            Domain::Test => "test",
        }
    }

    /// Static message for an unrecognised subcommand. Domains without a
    /// subcommand table never produce one.
    pub fn usage(self) -> &'static str {
        match self {
            Domain::Audit => "Available audit commands: status, analyze [id], conversions, optimize",
            Domain::Ligna => "Available ligna commands: health, sync, contacts, setup",
            Domain::Email => "Available email commands: performance, optimize, generate [industry], templates",
            Domain::Analyze => "Available analyze commands: frontend, backend, database, security",
            Domain::Generate => "Available generate commands: webhook, email [target], landing [target], api",
            Domain::Test => "Available test commands: connections, api, integration",
            Domain::Performance | Domain::Deploy => "",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A resolved domain command. Transient; built per input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub domain: Domain,
    pub subcommand: Option<String>,
    pub args: Vec<String>,
}

impl CommandInvocation {
    pub fn new(domain: Domain, words: &[String]) -> Self {
        Self {
            domain,
            subcommand: words.first().map(|s| s.to_ascii_lowercase()),
            args: words.iter().skip(1).cloned().collect(),
        }
    }

    /// Canned prompt for this invocation, or the domain's usage message.
    pub fn resolve(&self) -> Result<String, &'static str> {
        let sub = self.subcommand.as_deref().unwrap_or("");
        let first_arg = self.args.first().map(String::as_str);
        let audience = if self.args.is_empty() {
            prompts::DEFAULT_AUDIENCE.to_string()
        } else {
            self.args.join(" ")
        };

        let prompt = match (self.domain, sub) {
            (Domain::Audit, "status") => prompts::AUDIT_STATUS.to_string(),
            (Domain::Audit, "analyze") => prompts::audit_analyze(first_arg),
            (Domain::Audit, "conversions") => prompts::AUDIT_CONVERSIONS.to_string(),
            (Domain::Audit, "optimize") => prompts::AUDIT_OPTIMIZE.to_string(),

            (Domain::Ligna, "health") => prompts::LIGNA_HEALTH.to_string(),
            (Domain::Ligna, "sync") => prompts::LIGNA_SYNC.to_string(),
            (Domain::Ligna, "contacts") => prompts::LIGNA_CONTACTS.to_string(),
            (Domain::Ligna, "setup") => prompts::LIGNA_SETUP.to_string(),

            (Domain::Email, "performance") => prompts::EMAIL_PERFORMANCE.to_string(),
            (Domain::Email, "optimize") => prompts::EMAIL_OPTIMIZE.to_string(),
            (Domain::Email, "generate") => prompts::email_sequence(first_arg),
            (Domain::Email, "templates") => prompts::EMAIL_TEMPLATES.to_string(),

            (Domain::Analyze, "frontend") => prompts::ANALYZE_FRONTEND.to_string(),
            (Domain::Analyze, "backend") => prompts::ANALYZE_BACKEND.to_string(),
            (Domain::Analyze, "database") => prompts::ANALYZE_DATABASE.to_string(),
            (Domain::Analyze, "security") => prompts::ANALYZE_SECURITY.to_string(),

            (Domain::Generate, "webhook") => prompts::GENERATE_WEBHOOK.to_string(),
            (Domain::Generate, "email") => prompts::generate_email(&audience),
            (Domain::Generate, "landing") => prompts::generate_landing(&audience),
            (Domain::Generate, "api") => prompts::GENERATE_API.to_string(),

            (Domain::Test, "connections") => prompts::TEST_CONNECTIONS.to_string(),
            (Domain::Test, "api") => prompts::TEST_API.to_string(),
            (Domain::Test, "integration") => prompts::TEST_INTEGRATION.to_string(),

            (Domain::Performance, _) => prompts::PERFORMANCE.to_string(),
            (Domain::Deploy, _) => prompts::DEPLOY.to_string(),

            (domain, _) => return Err(domain.usage()),
        };
        Ok(prompt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Empty,
    Meta(MetaCommand),
    Canned { invocation: CommandInvocation, prompt: String },
    Usage { invocation: CommandInvocation, message: &'static str },
    Passthrough(String),
}

impl Route {
    /// Whether handling this route issues a model request.
    pub fn calls_model(&self) -> bool {
        matches!(self, Route::Canned { .. } | Route::Passthrough(_))
    }
}

/// Classify one line of user input. Pure; no side effects.
pub fn route(input: &str) -> Route {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Route::Empty;
    }
    if let Some(meta) = MetaCommand::parse(trimmed) {
        return Route::Meta(meta);
    }

    let mut words = trimmed.split_whitespace();
    let verb = words.next().unwrap_or_default();
    let Some(domain) = Domain::from_verb(verb) else {
        return Route::Passthrough(trimmed.to_string());
    };

    let rest: Vec<String> = words.map(String::from).collect();
    dispatch(domain, &rest)
}

/// Resolve a domain command from already-split words (the one-shot CLI path).
pub fn dispatch(domain: Domain, words: &[String]) -> Route {
    let invocation = CommandInvocation::new(domain, words);
    match invocation.resolve() {
        Ok(prompt) => Route::Canned { invocation, prompt },
        Err(message) => Route::Usage { invocation, message },
    }
}
