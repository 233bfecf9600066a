/// How the text after a slash command is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgShape {
    /// No argument; anything typed after the command is ignored.
    Bare,
    /// Whole remainder kept verbatim as `arg`.
    Text,
    /// Exactly this many non-negative integers, stored as `indices`.
    Indices(usize),
    /// One shell-quoted path, stored as `path`.
    Path,
    /// Any number of shell-quoted paths, stored as `paths`.
    Paths,
    /// `save|load|delete|list [name]`.
    Preset,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
    pub shape: ArgShape,
    pub usage: &'static str,
}

const fn spec(
    command: &'static str,
    action: &'static str,
    shape: ArgShape,
    usage: &'static str,
) -> CommandSpec {
    CommandSpec {
        command,
        action,
        shape,
        usage,
    }
}

pub(crate) const PRESET_SUBCOMMANDS: &[&str] = &["save", "load", "delete", "list"];

/// Every chat command, in the order `/help` lists them.
pub(crate) const COMMANDS: &[CommandSpec] = &[
    spec("add", "add_sources", ArgShape::Paths, "/add <path...>"),
    spec("sku", "add_skus", ArgShape::Text, "/sku <sku, sku, ...>"),
    spec("remove", "remove_source", ArgShape::Indices(1), "/remove <index>"),
    spec("move", "move_source", ArgShape::Indices(2), "/move <from> <to>"),
    spec("clear", "clear_sources", ArgShape::Bare, "/clear"),
    spec(
        "bg",
        "set_background",
        ArgShape::Text,
        "/bg white|gray|auto|themed <description>",
    ),
    spec("light", "set_lighting", ArgShape::Text, "/light hard|soft"),
    spec("ratio", "set_aspect_ratio", ArgShape::Text, "/ratio 1:1|4:5|16:9"),
    spec("size", "set_output_size", ArgShape::Text, "/size 2k|4k"),
    spec("fidelity", "set_fidelity", ArgShape::Text, "/fidelity exact|enhance"),
    spec("reflection", "set_reflection", ArgShape::Text, "/reflection on|off"),
    spec(
        "separate",
        "set_separation",
        ArgShape::Text,
        "/separate on|off [intensity]",
    ),
    spec("blur", "set_blur", ArgShape::Indices(1), "/blur <intensity>"),
    spec("enhance_bg", "enhance_background", ArgShape::Bare, "/enhance_bg"),
    spec("generate", "generate", ArgShape::Bare, "/generate"),
    spec("select", "select_candidate", ArgShape::Indices(1), "/select <index>"),
    spec("back", "return_to_candidates", ArgShape::Bare, "/back"),
    spec("cancel", "cancel_selection", ArgShape::Bare, "/cancel"),
    spec("history", "navigate_history", ArgShape::Indices(1), "/history <index>"),
    spec(
        "quick",
        "quick_refine",
        ArgShape::Text,
        "/quick brighten|contrast|shadow|sharpen",
    ),
    spec("polish", "enhance_command", ArgShape::Text, "/polish <command>"),
    spec("save", "save_current", ArgShape::Path, "/save <path>"),
    spec("compare", "compare", ArgShape::Bare, "/compare"),
    spec(
        "preset",
        "preset",
        ArgShape::Preset,
        "/preset save|load|delete|list [name]",
    ),
    spec("status", "status", ArgShape::Bare, "/status"),
    spec("help", "help", ArgShape::Bare, "/help"),
    spec("quit", "quit", ArgShape::Bare, "/quit"),
];

pub(crate) fn lookup(command: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.command == command)
}

/// Usage line of every command, for `/help`.
pub fn help_lines() -> Vec<&'static str> {
    COMMANDS.iter().map(|spec| spec.usage).collect()
}
