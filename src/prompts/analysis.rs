//! Agent system prompt, tool-use prompts and the one-shot complete-analysis
//! prompt.

/// System prompt sent with every agent call.
pub const AGENT_SYSTEM_PROMPT: &str = r#"You are a project analysis agent for a cloud innovation center.

Your job is to turn project requirements into complete, production-ready AWS solutions:
requirements analysis, research of existing reference projects, serverless-first
architecture with draw.io diagrams, TypeScript and Python CDK code, cost estimates,
and technical documentation.

Follow AWS Well-Architected principles. Prefer patterns from reference projects
that actually exist; never invent repository names. Produce secure, deployable code
with logging and monitoring enabled. When asked for an architecture diagram,
emit draw.io compatible XML that can be imported directly."#;

const TOOL_USE_TEMPLATE: &str = "You have access to the following tools. To use a tool, respond with a JSON object containing 'tool' and 'arguments' keys, and nothing else. When you have enough information, reply with the final answer instead.\n\nTools:\n{tools}";

/// Assistant turn acknowledging the tool catalogue.
pub const TOOL_USE_ACK: &str =
    "I understand. I will respond with JSON tool calls when I need information, then give the final answer.";

/// Sent once the tool step limit is reached.
pub const FINAL_ANSWER_PROMPT: &str =
    "You have reached the tool call limit. Using the information gathered so far, give your final answer now without calling any more tools.";

/// Introduce the available tools; `tools` is their JSON description.
pub fn build_tool_use_prompt(tools: &str) -> String {
    TOOL_USE_TEMPLATE.replace("{tools}", tools)
}

const COMPLETE_ANALYSIS_TEMPLATE: &str = r#"
COMPLETE PROJECT ANALYSIS

Project Requirements:
{requirements}

Provide a comprehensive analysis with these sections:

1. REQUIREMENTS ANALYSIS
   - Functional and non-functional requirements
   - Stakeholders and success criteria
   - Complexity estimate (Low/Medium/High)

2. SIMILAR PROJECTS
   - Relevant reference projects and reusable patterns

3. SOLUTION ARCHITECTURE
   - Serverless AWS architecture with justified service choices
   - Data flow and security considerations
   - draw.io compatible architecture diagram XML

4. CDK IMPLEMENTATION
   - Complete TypeScript CDK stack
   - Complete Python CDK stack

5. COST ANALYSIS
   - Per-service breakdown, monthly and yearly estimates
   - Optimization recommendations

6. TECHNICAL DOCUMENTATION
   - Deployment guide, API usage, troubleshooting, maintenance

Be thorough and implementable.
"#;

/// Build the complete-analysis prompt for a requirements document.
pub fn build_complete_analysis_prompt(requirements: &str) -> String {
    COMPLETE_ANALYSIS_TEMPLATE.replace("{requirements}", requirements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_analysis_prompt() {
        let prompt = build_complete_analysis_prompt("Build a PDF uploader");
        assert!(prompt.contains("Project Requirements:\nBuild a PDF uploader"));
        assert!(prompt.contains("CDK IMPLEMENTATION"));
    }

    #[test]
    fn test_tool_use_prompt_lists_tools() {
        let prompt = build_tool_use_prompt(r#"[{"name": "get_pricing"}]"#);
        assert!(prompt.contains("'tool' and 'arguments'"));
        assert!(prompt.ends_with(r#"Tools:
[{"name": "get_pricing"}]"#));
    }
}
