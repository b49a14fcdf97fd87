//! `parley agents`: configured agents in execution order.

use parley_config::AppConfig;

use super::runtime::effective_agents;

pub fn run(config: &AppConfig) {
    let agents = effective_agents(config);
    if config.agents.is_empty() {
        println!("  (no agents configured, showing defaults)");
        println!();
    }

    for agent in &agents {
        let status = if agent.enabled { "enabled" } else { "disabled" };
        println!("  {} ({}) [{status}]", agent.agent_id, agent.agent_name);
        if !agent.description.is_empty() {
            println!("    {}", agent.description);
        }
        println!(
            "    model: {} via {}  priority: {}",
            agent.model_name, agent.provider, agent.priority
        );
        println!(
            "    timeout: {}ms  tool timeout: {}ms  retries: {}  max tool calls: {}",
            agent.timeout_ms, agent.tool_timeout_ms, agent.max_retries, agent.max_tool_calls
        );
        if agent.can_execute_tools && !agent.tools.is_empty() {
            println!("    tools: {}", agent.tools.join(", "));
        } else {
            println!("    tools: none");
        }
        println!();
    }
}
