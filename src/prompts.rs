//! Prompt text. The canned domain prompts are plain templates; the only
//! parameters are an optional id, industry, or target audience.

pub const PLATFORM_PREAMBLE: &str = "\
You are an AI assistant for a digital marketing agency platform. This platform includes:
- Local business audit tool (React frontend + Express backend)
- Marketing automation with Ligna CRM integration
- Email sequences for lead nurturing
- Client portal for project delivery
- MongoDB database for storing audit results and clients
- Real-time file monitoring and optimization";

pub const CAPABILITIES: &str = "\
You can help with:
1. React component analysis and optimization
2. Express API route debugging and enhancement
3. MongoDB query optimization and schema design
4. Ligna CRM integration planning and implementation
5. Email marketing automation strategies
6. Local business audit improvements
7. Performance monitoring and optimization
8. Deployment and scaling assistance
9. Marketing funnel conversion optimization
10. Content generation for local businesses

Provide specific, actionable responses with exact code when needed. For marketing strategies, include conversion optimization tactics. For technical issues, provide complete solutions.";

/// Full user turn: instructions, serialised snapshot, recent history, request.
pub fn build_prompt(context: &str, history: &str, user_text: &str) -> String {
    format!(
        "{PLATFORM_PREAMBLE}\n\nENHANCED PROJECT CONTEXT:\n{context}\n\nCONVERSATION HISTORY:\n{history}\n\nUSER REQUEST: {user_text}\n\n{CAPABILITIES}"
    )
}

/// Short side-channel request describing one changed file.
pub fn change_analysis_prompt(file: &str, file_type: &str, excerpt: &str) -> String {
    format!(
        "Quick analysis of this file change in the marketing platform:\nFile: {file}\nType: {file_type}\nContent: {excerpt}\n\nBrief impact analysis and any immediate concerns?"
    )
}

pub const AUDIT_STATUS: &str = "Analyze the current status of the audit tool, including recent completions, conversion rates, and performance metrics. Check database connections and API health.";
pub const AUDIT_CONVERSIONS: &str = "Deep dive into audit-to-client conversion rates. Analyze the funnel, identify bottlenecks, and provide specific optimization strategies.";
pub const AUDIT_OPTIMIZE: &str = "Analyze the audit tool codebase and suggest optimizations for performance, user experience, and conversion rates.";

pub fn audit_analyze(audit_id: Option<&str>) -> String {
    format!(
        "Perform detailed analysis of audit {}. Include technical recommendations, conversion optimization, and marketing strategy suggestions.",
        audit_id.unwrap_or("system")
    )
}

pub const LIGNA_HEALTH: &str = "Check Ligna API integration health, webhook status, and connection reliability. Provide troubleshooting steps if needed.";
pub const LIGNA_SYNC: &str = "Verify audit data is syncing properly to Ligna. Check webhook implementation and data mapping.";
pub const LIGNA_CONTACTS: &str = "Analyze recent contact creation activity in Ligna and sync status with audit completions.";
pub const LIGNA_SETUP: &str = "Provide step-by-step guidance for setting up Ligna integration, including webhook creation and API configuration.";

pub const EMAIL_PERFORMANCE: &str = "Analyze email sequence performance, open rates, click-through rates, and conversion metrics. Suggest improvements.";
pub const EMAIL_OPTIMIZE: &str = "Provide specific optimization suggestions for email sequences including subject lines, content, and timing.";
pub const EMAIL_TEMPLATES: &str = "Create email templates for different stages of the marketing funnel: lead magnet, nurture sequence, and conversion emails.";

pub fn email_sequence(industry: Option<&str>) -> String {
    format!(
        "Generate a complete email marketing sequence for {}. Include subject lines, content, and call-to-actions optimized for local businesses.",
        industry.unwrap_or("general local business")
    )
}

pub const ANALYZE_FRONTEND: &str = "Analyze the React frontend code structure, components, performance, and suggest improvements for user experience and conversion optimization.";
pub const ANALYZE_BACKEND: &str = "Analyze the Express backend code, API endpoints, database queries, and suggest optimizations for performance and scalability.";
pub const ANALYZE_DATABASE: &str = "Analyze database structure, query performance, and suggest schema optimizations for the audit and client data.";
pub const ANALYZE_SECURITY: &str = "Perform security analysis of the marketing platform, checking for vulnerabilities, authentication issues, and data protection concerns.";

pub const DEFAULT_AUDIENCE: &str = "local businesses";

pub const GENERATE_WEBHOOK: &str = "Generate complete webhook implementation code for Ligna integration, including error handling and data validation.";
pub const GENERATE_API: &str = "Generate API endpoint code for common marketing platform operations like audit creation, result retrieval, and client management.";

pub fn generate_email(audience: &str) -> String {
    format!("Generate email marketing content for {audience}, including subject lines and body content optimized for conversions.")
}

pub fn generate_landing(audience: &str) -> String {
    format!("Generate landing page copy and structure for {audience} audit tool, optimized for lead generation.")
}

pub const TEST_CONNECTIONS: &str = "Test all system connections including database, APIs, and external services. Provide status report and troubleshooting steps.";
pub const TEST_API: &str = "Generate test cases and test the API endpoints for functionality, performance, and error handling.";
pub const TEST_INTEGRATION: &str = "Test the complete audit-to-client pipeline, including Ligna integration and email automation.";

pub const PERFORMANCE: &str = "Comprehensive performance analysis of the marketing platform including API response times, database query efficiency, frontend load times, and conversion funnel performance. Provide specific optimization recommendations.";
pub const DEPLOY: &str = "Provide deployment assistance including pre-deployment checks, environment configuration, database migrations, and post-deployment verification steps.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_sections_are_in_order() {
        let p = build_prompt("{\"gitBranch\":\"main\"}", "User: hi\nAI: hello...", "why are conversions low?");
        let ctx = p.find("ENHANCED PROJECT CONTEXT:\n{\"gitBranch\"").unwrap();
        let hist = p.find("CONVERSATION HISTORY:\nUser: hi").unwrap();
        let req = p.find("USER REQUEST: why are conversions low?").unwrap();
        assert!(p.starts_with(PLATFORM_PREAMBLE));
        assert!(ctx < hist && hist < req);
        assert!(p.ends_with(CAPABILITIES));
    }

    #[test]
    fn parameterized_templates_fill_defaults() {
        assert!(audit_analyze(None).contains("audit system."));
        assert!(audit_analyze(Some("42")).contains("audit 42."));
        assert!(email_sequence(None).contains("for general local business."));
        assert!(generate_landing("dentists").starts_with("Generate landing page copy and structure for dentists audit tool"));
    }
}
