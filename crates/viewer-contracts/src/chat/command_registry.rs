#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const SINGLE_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "agent",
        action: "set_agent",
    },
    CommandSpec {
        command: "email",
        action: "set_email",
    },
];

pub(crate) const TOGGLE_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "raw",
    action: "set_raw",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &["/agent", "/email", "/raw", "/help", "/quit"];
