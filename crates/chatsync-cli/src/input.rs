//! Line input parsing.
//!
//! Every line read from stdin is either a slash command or a message for the
//! active room. Messages are validated here, before they reach the
//! coordinator, so oversize or empty content never leaves the client.

use chatsync_app::Command;
use chatsync_proto::{
    CreateRoomRequest, MessageId, MessageType, OutboundMessage, ProtocolError, RoomId,
};
use thiserror::Error;

/// Longest room name the directory accepts.
const MAX_ROOM_NAME_LEN: usize = 100;

/// Why a line could not be turned into a command.
#[derive(Debug, Error)]
pub enum InputError {
    /// Command is missing an argument.
    #[error("usage: {0}")]
    Usage(&'static str),

    /// Argument is not a valid room or message id.
    #[error("invalid id: {0}")]
    InvalidId(String),

    /// Room name is empty or too long.
    #[error("room name must be 1-{MAX_ROOM_NAME_LEN} characters")]
    InvalidRoomName,

    /// Command needs an active room and none is selected.
    #[error("no active room; use /switch <id> first")]
    NoActiveRoom,

    /// Slash command not recognised.
    #[error("unknown command /{0}; try /help")]
    UnknownCommand(String),

    /// Message content rejected before sending.
    #[error(transparent)]
    Content(#[from] ProtocolError),
}

/// What a line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Forward to the coordinator.
    Command(Command),
    /// Print command help.
    Help,
}

/// Help text for `/help`.
pub const HELP: &str = "\
/rooms                 reload the room list
/switch <id>           make a room active and connect to it
/join <id>             join a room
/leave [id]            leave a room (default: the active one)
/create <name> [-p]    create a room (-p: private)
/reply <id> <text>     reply to a message
/quit                  exit
<text>                 send a message to the active room";

/// Parse one line of input. `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns `InputError` if the line is a malformed command or an invalid
/// message.
pub fn parse(line: &str, active: Option<RoomId>) -> Result<Option<Input>, InputError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Ok(None);
    }

    let Some(rest) = line.strip_prefix('/') else {
        return message(line, None).map(Some);
    };

    let (command, args) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let args = args.trim();

    let command = match command {
        "rooms" => Command::RefreshRooms,
        "switch" | "s" => Command::Select(id(args, "/switch <id>")?),
        "join" => Command::Join(id(args, "/join <id>")?),
        "leave" => match args {
            "" => Command::Leave(active.ok_or(InputError::NoActiveRoom)?),
            room => Command::Leave(id(room, "/leave [id]")?),
        },
        "create" => create(args)?,
        "reply" => {
            let (target, text) = args.split_once(char::is_whitespace).unwrap_or((args, ""));
            let target: MessageId = id(target, "/reply <id> <text>")?;
            return message(text.trim(), Some(target)).map(Some);
        },
        "quit" | "q" => Command::Quit,
        "help" | "h" => return Ok(Some(Input::Help)),
        other => return Err(InputError::UnknownCommand(other.to_string())),
    };

    Ok(Some(Input::Command(command)))
}

fn message(content: &str, reply_to_id: Option<MessageId>) -> Result<Input, InputError> {
    let outbound = OutboundMessage::new(content, MessageType::Text, reply_to_id);
    outbound.validate()?;

    Ok(Input::Command(Command::Send {
        content: outbound.content,
        message_type: outbound.message_type,
        reply_to_id,
    }))
}

fn create(args: &str) -> Result<Command, InputError> {
    if args.is_empty() {
        return Err(InputError::Usage("/create <name> [-p]"));
    }

    let (name, is_private) = match args.strip_suffix("-p") {
        Some(name) if name.ends_with(char::is_whitespace) => (name.trim(), true),
        _ => (args, false),
    };

    if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(InputError::InvalidRoomName);
    }

    Ok(Command::Create(CreateRoomRequest {
        name: name.to_string(),
        description: None,
        is_private,
        max_members: None,
    }))
}

fn id(arg: &str, usage: &'static str) -> Result<u64, InputError> {
    if arg.is_empty() {
        return Err(InputError::Usage(usage));
    }
    arg.parse().map_err(|_| InputError::InvalidId(arg.to_string()))
}
