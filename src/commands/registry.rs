use super::CommandResult;
use crate::core::session::ChatSession;

pub type CommandHandler = fn(&mut ChatSession, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help",
        help: "Show available commands.",
        handler: super::handle_help,
    },
    Command {
        name: "new",
        usage: "/new",
        help: "Start a new conversation with the current model.",
        handler: super::handle_new,
    },
    Command {
        name: "list",
        usage: "/list",
        help: "List saved conversations, newest first.",
        handler: super::handle_list,
    },
    Command {
        name: "open",
        usage: "/open <id>",
        help: "Resume a saved conversation.",
        handler: super::handle_open,
    },
    Command {
        name: "delete",
        usage: "/delete <id>",
        help: "Delete a saved conversation.",
        handler: super::handle_delete,
    },
    Command {
        name: "rename",
        usage: "/rename <title>",
        help: "Rename the current conversation.",
        handler: super::handle_rename,
    },
    Command {
        name: "model",
        usage: "/model [name]",
        help: "List models, or switch model (clears the current conversation).",
        handler: super::handle_model,
    },
    Command {
        name: "image",
        usage: "/image [path]",
        help: "Attach a PNG or JPEG to the next message; without a path, drop it.",
        handler: super::handle_image,
    },
    Command {
        name: "export",
        usage: "/export [plain|markdown] [file]",
        help: "Export the current conversation to a file.",
        handler: super::handle_export,
    },
    Command {
        name: "stats",
        usage: "/stats",
        help: "Show message and character counts for the current conversation.",
        handler: super::handle_stats,
    },
    Command {
        name: "temperature",
        usage: "/temperature <0-2>",
        help: "Set the sampling temperature.",
        handler: super::handle_temperature,
    },
    Command {
        name: "max-tokens",
        usage: "/max-tokens <1-4000>",
        help: "Set the reply length limit.",
        handler: super::handle_max_tokens,
    },
    Command {
        name: "quit",
        usage: "/quit",
        help: "Leave the chat.",
        handler: super::handle_quit,
    },
];
