//! `parley chat`: interactive or single-message chat mode.

use parley_config::AppConfig;
use parley_core::agent::LlmResponse;
use parley_core::message::{ConversationId, Role};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use super::runtime::{build_chat, effective_agents};

pub async fn run(
    config: &AppConfig,
    message: Option<String>,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    let chat = build_chat(config)?;
    let conversation_id = conversation.map(ConversationId::from).unwrap_or_default();

    if let Some(msg) = message {
        let response = chat.process_user_message(&conversation_id, &msg).await;
        print_response(&response);
        if !response.success {
            anyhow::bail!(
                "{}",
                response.error_message.as_deref().unwrap_or("turn failed")
            );
        }
        return Ok(());
    }

    let agents: Vec<String> = effective_agents(config)
        .into_iter()
        .filter(|a| a.enabled)
        .map(|a| a.agent_id)
        .collect();

    println!();
    println!("  Parley: interactive mode");
    println!();
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", config.default_model);
    println!("  Agents:        {}", agents.join(", "));
    println!("  Conversation:  {conversation_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  /history shows the conversation, /clear starts over, 'exit' quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        match input {
            "" => {}
            "exit" | "quit" => break,
            "/clear" => {
                chat.clear_conversation(&conversation_id).await;
                println!("  (conversation cleared)");
            }
            "/history" => {
                let context = chat.get_conversation_context(&conversation_id).await;
                for message in context.messages() {
                    let who = match message.role {
                        Role::User => "You",
                        Role::Assistant if !message.tool_calls.is_empty() => "Tool call",
                        Role::Assistant => "Assistant",
                        Role::Tool => "Tool",
                        Role::System => "System",
                    };
                    println!("  {who:>10} > {}", preview(&message.content));
                }
            }
            text => {
                let response = chat.process_user_message(&conversation_id, text).await;
                println!();
                print_response(&response);
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

fn print_response(response: &LlmResponse) {
    for tool in &response.tool_responses {
        let status = if tool.success { "ok" } else { "failed" };
        println!("  [tool] {} ({status})", tool.tool_name);
    }
    for line in response.content.lines() {
        println!("  Assistant > {line}");
    }
    if let Some(error) = &response.error_message {
        eprintln!("  [Error] {error}");
    }
    if let Some(usage) = &response.usage {
        println!(
            "  ({} tokens, ${:.4})",
            usage.total_tokens, usage.cost_usd
        );
    }
    println!();
}

fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or_default();
    if line.chars().count() > 80 {
        format!("{}...", line.chars().take(80).collect::<String>())
    } else {
        line.to_string()
    }
}
