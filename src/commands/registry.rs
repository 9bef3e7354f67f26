use super::handlers::{config, conversation, core};
use super::CommandResult;
use crate::core::service::ChatService;

pub type CommandHandler = fn(&ChatService, CommandInvocation<'_>) -> CommandResult;

pub struct CommandUsage {
    pub syntax: &'static str,
    pub description: &'static str,
}

pub struct Command {
    pub name: &'static str,
    pub usages: &'static [CommandUsage],
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

impl<'a> CommandInvocation<'a> {
    /// Whole argument string, or `None` when blank.
    pub fn rest(&self) -> Option<&'a str> {
        Some(self.args.trim()).filter(|args| !args.is_empty())
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

pub fn matching_commands(prefix: &str) -> Vec<&'static Command> {
    let prefix = prefix.to_ascii_lowercase();
    all_commands()
        .iter()
        .filter(|command| command.name.starts_with(&prefix))
        .collect()
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usages: &[CommandUsage {
            syntax: "/help",
            description: "Show available commands.",
        }],
        handler: core::handle_help,
    },
    Command {
        name: "new",
        usages: &[CommandUsage {
            syntax: "/new [name]",
            description: "Start a new conversation and switch to it.",
        }],
        handler: conversation::handle_new,
    },
    Command {
        name: "list",
        usages: &[CommandUsage {
            syntax: "/list",
            description: "List conversations, most recently updated first.",
        }],
        handler: conversation::handle_list,
    },
    Command {
        name: "switch",
        usages: &[CommandUsage {
            syntax: "/switch <n>",
            description: "Switch to conversation number n from /list.",
        }],
        handler: conversation::handle_switch,
    },
    Command {
        name: "rename",
        usages: &[CommandUsage {
            syntax: "/rename <name>",
            description: "Rename the current conversation.",
        }],
        handler: conversation::handle_rename,
    },
    Command {
        name: "delete",
        usages: &[CommandUsage {
            syntax: "/delete [n]",
            description: "Delete conversation n, or the current one.",
        }],
        handler: conversation::handle_delete,
    },
    Command {
        name: "clear",
        usages: &[CommandUsage {
            syntax: "/clear",
            description: "Remove every message from the current conversation.",
        }],
        handler: conversation::handle_clear,
    },
    Command {
        name: "regen",
        usages: &[CommandUsage {
            syntax: "/regen",
            description: "Regenerate the last assistant reply.",
        }],
        handler: core::handle_regen,
    },
    Command {
        name: "model",
        usages: &[
            CommandUsage {
                syntax: "/model",
                description: "Show the model used by this conversation.",
            },
            CommandUsage {
                syntax: "/model <id>",
                description: "Use a different model for this conversation.",
            },
        ],
        handler: conversation::handle_model,
    },
    Command {
        name: "system",
        usages: &[
            CommandUsage {
                syntax: "/system",
                description: "Show the effective system prompt.",
            },
            CommandUsage {
                syntax: "/system <prompt>",
                description: "Override the system prompt for this conversation.",
            },
            CommandUsage {
                syntax: "/system default",
                description: "Go back to the configured system prompt.",
            },
        ],
        handler: conversation::handle_system,
    },
    Command {
        name: "set",
        usages: &[
            CommandUsage {
                syntax: "/set",
                description: "Show the current settings.",
            },
            CommandUsage {
                syntax: "/set <key> <value>",
                description: "Change a setting and save it.",
            },
        ],
        handler: config::handle_set,
    },
    Command {
        name: "stop",
        usages: &[CommandUsage {
            syntax: "/stop",
            description: "Stop the reply being generated (Ctrl+C also works).",
        }],
        handler: core::handle_stop,
    },
    Command {
        name: "quit",
        usages: &[CommandUsage {
            syntax: "/quit",
            description: "Leave the chat.",
        }],
        handler: core::handle_quit,
    },
];
