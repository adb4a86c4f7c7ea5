use std::collections::BTreeMap;

use serde_json::Value;

use super::command_registry::{CommandSpec, NO_ARG_COMMANDS, SINGLE_ARG_COMMANDS, TOGGLE_COMMANDS};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub prompt: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            prompt: None,
            command_args: BTreeMap::new(),
        }
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_single_arg(arg: &str) -> String {
    if arg.trim().is_empty() {
        return String::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect::<Vec<String>>()
            .join(" "),
        Err(_) => arg.trim().to_string(),
    }
}

fn parse_toggle(arg: &str) -> Option<bool> {
    match arg.trim().to_ascii_lowercase().as_str() {
        "" | "on" | "true" | "yes" | "1" => Some(true),
        "off" | "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, SINGLE_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("value".to_string(), Value::String(parse_single_arg(arg)));
                return intent;
            }

            if let Some(action) = find_action(&command, TOGGLE_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "enabled".to_string(),
                    parse_toggle(arg).map(Value::Bool).unwrap_or(Value::Null),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("ask", text);
    intent.prompt = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn plain_text_is_a_prompt() {
        let intent = parse_intent("  Show me usage stats by email \n");
        assert_eq!(intent.action, "ask");
        assert_eq!(
            intent.prompt.as_deref(),
            Some("Show me usage stats by email")
        );
    }

    #[test]
    fn blank_input_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_agent_and_email_commands() {
        let agent = parse_intent("/agent sales-agent");
        assert_eq!(agent.action, "set_agent");
        assert_eq!(agent.command_args["value"], json!("sales-agent"));

        let quoted = parse_intent("/agent \"team analytics\"");
        assert_eq!(quoted.command_args["value"], json!("team analytics"));

        let email = parse_intent("/EMAIL  ana@example.com ");
        assert_eq!(email.action, "set_email");
        assert_eq!(email.command_args["value"], json!("ana@example.com"));
    }

    #[test]
    fn parse_raw_toggle() {
        assert_eq!(parse_intent("/raw").command_args["enabled"], json!(true));
        assert_eq!(parse_intent("/raw off").command_args["enabled"], json!(false));
        assert_eq!(parse_intent("/raw maybe").command_args["enabled"], json!(null));
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/help").action, "help");
        assert_eq!(parse_intent("/quit").action, "quit");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }

    #[test]
    fn bare_slash_is_a_prompt() {
        let intent = parse_intent("/ divided by zero?");
        assert_eq!(intent.action, "ask");
    }
}
