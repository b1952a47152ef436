//! Deploy command implementation

use agent_deploy_core::schema::{AgentType, DeploymentResponse};
use agent_deploy_core::{DeploymentClient, NewAgent};
use anyhow::{Context, Result, bail};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::util::context::{CliContext, GlobalArgs};

/// Parent id used when neither `--parent` nor `AGENT_ID` is set
const CLI_PARENT: &str = "cli";

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Unique agent id (also the agent directory name)
    #[arg(long)]
    agent_id: String,

    /// Human-readable agent name
    #[arg(long)]
    name: String,

    /// Agent tier (L1, L2, L3 or a custom type)
    #[arg(long = "type", default_value = "L3")]
    agent_type: String,

    /// Task prompt
    #[arg(long, conflicts_with = "prompt_file", required_unless_present = "prompt_file")]
    prompt: Option<String>,

    /// Read the task prompt from a file
    #[arg(long, value_name = "PATH")]
    prompt_file: Option<PathBuf>,

    /// Model name; selects the execution profile
    #[arg(long)]
    model: Option<String>,

    /// Share of the parent's workload (0-100)
    #[arg(long, default_value_t = 0.0)]
    load: f64,

    /// Estimated duration in seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Metadata entry KEY=VALUE (repeatable). Values that parse as JSON are
    /// stored as JSON, anything else as a string.
    #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_meta)]
    meta: Vec<(String, serde_json::Value)>,

    /// Parent agent id (default: $AGENT_ID, else "cli")
    #[arg(long)]
    parent: Option<String>,

    /// Seconds to wait for the coordinator's response
    #[arg(long)]
    timeout: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

fn parse_meta(raw: &str) -> std::result::Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty metadata key in '{raw}'"));
    }
    let value = serde_json::from_str(value)
        .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

/// Execute the deploy command
pub fn execute(global: &GlobalArgs, args: DeployArgs) -> Result<()> {
    let ctx = CliContext::resolve(global)?;

    let prompt = match (&args.prompt, &args.prompt_file) {
        (Some(prompt), _) => prompt.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?,
        (None, None) => bail!("Either --prompt or --prompt-file is required"),
    };

    let parent = args
        .parent
        .clone()
        .or_else(|| std::env::var("AGENT_ID").ok().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| CLI_PARENT.to_string());

    let agent_type = AgentType::from(args.agent_type.as_str());
    let mut agent =
        NewAgent::new(&args.agent_id, &args.name, agent_type, prompt).load_percentage(args.load);
    if let Some(model) = &args.model {
        agent = agent.model(model);
    }
    if let Some(duration) = args.duration {
        agent = agent.estimated_duration(duration);
    }
    for (key, value) in args.meta {
        agent = agent.metadata(key, value);
    }

    let timeout = Duration::from_secs(args.timeout.unwrap_or(ctx.config.client.timeout_secs));
    let client = DeploymentClient::new(ctx.layout.clone(), parent)
        .with_poll_interval(Duration::from_millis(ctx.config.client.poll_interval_ms.max(10)));

    tracing::debug!(
        root = %ctx.layout.root().display(),
        parent = client.parent_agent_id(),
        timeout_secs = timeout.as_secs(),
        "submitting deployment request"
    );
    let response = client.deploy_agent(agent, timeout)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if !response.is_success() {
        bail!("Deployment of {} failed: {}", response.agent_id, response.message);
    }
    Ok(())
}

fn print_response(response: &DeploymentResponse) {
    println!("Request:  {}", response.request_id);
    println!("Agent:    {}", response.agent_id);
    println!("Status:   {}", response.status);
    if let Some(pid) = response.pid {
        println!("PID:      {pid}");
    }
    if let Some(started_at) = response.started_at {
        println!("Started:  {}", started_at.to_rfc3339());
    }
    if !response.message.is_empty() {
        println!("Message:  {}", response.message);
    }
    if let Some(error) = &response.error {
        println!("Error:    {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_meta() {
        assert_eq!(
            parse_meta("priority=high").unwrap(),
            ("priority".to_string(), serde_json::json!("high"))
        );
        assert_eq!(parse_meta("retries=3").unwrap().1, serde_json::json!(3));
        assert_eq!(parse_meta("flags=[1,2]").unwrap().1, serde_json::json!([1, 2]));
        assert_eq!(parse_meta("note=a=b").unwrap().1, serde_json::json!("a=b"));
        assert!(parse_meta("novalue").is_err());
        assert!(parse_meta("=x").is_err());
    }
}
