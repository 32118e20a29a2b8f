//! Line-oriented terminal front end used by the `huddle-tab` binary.
//!
//! Two `huddle-tab` processes pointed at the same SQLite file behave like
//! two browser tabs of the same origin.

use std::fmt::Write as _;

use huddle_shared::types::{ChannelId, Identity, MessageId};
use huddle_store::{Member, MemberRole, Message};

use crate::error::{ClientError, Result};
use crate::events::OpenChatPayload;
use crate::mentions::{MentionResolver, Segment};
use crate::state::ChatClient;
use crate::sync::SyncView;

pub const HELP: &str = "\
/dm <user> [text]        open (or create) a DM, optionally sending text
/group <name> <user>...  create a group you lead
/open <n>                select conversation n of /list
/channel <name>          create a channel in the selected group
/switch <channel-id>     switch channel
/drop <channel-id>       delete a channel
/remove <user>           remove a group member
/edit <id> <text>        edit a message
/delete <id>             delete a message
/react <id> <emoji>      react to a message
/who <@partial>          mention candidates
/list                    conversations
/notifications           recent notifications
/quit
anything else            sends a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabCommand {
    Dm { username: String, text: Option<String> },
    Group { name: String, members: Vec<Identity> },
    Open(usize),
    CreateChannel(String),
    Switch(ChannelId),
    DropChannel(ChannelId),
    Remove(Identity),
    Edit { id: MessageId, body: String },
    Delete(MessageId),
    React { id: MessageId, emoji: String },
    Who(String),
    List,
    Notifications,
    Help,
    Quit,
    Send(String),
}

impl TabCommand {
    /// `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> std::result::Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Some(TabCommand::Send(line.to_string())));
        };

        let (verb, args) = match rest.split_once(char::is_whitespace) {
            Some((verb, args)) => (verb, args.trim()),
            None => (rest, ""),
        };

        let command = match verb {
            "dm" => {
                let (username, text) = split_first(args);
                TabCommand::Dm {
                    username: required(username, "/dm needs a username")?,
                    text: (!text.is_empty()).then(|| text.to_string()),
                }
            }
            "group" => {
                let (name, members) = split_first(args);
                TabCommand::Group {
                    name: required(name, "/group needs a name")?,
                    members: members.split_whitespace().map(Identity::new).collect(),
                }
            }
            "open" => TabCommand::Open(
                args.parse::<usize>()
                    .map_err(|_| format!("not a conversation number: {args}"))?,
            ),
            "channel" => TabCommand::CreateChannel(required(args, "/channel needs a name")?),
            "switch" => TabCommand::Switch(ChannelId(required(args, "/switch needs a channel id")?)),
            "drop" => TabCommand::DropChannel(ChannelId(required(args, "/drop needs a channel id")?)),
            "remove" => TabCommand::Remove(Identity::new(required(args, "/remove needs a username")?)),
            "edit" => {
                let (id, body) = split_first(args);
                TabCommand::Edit {
                    id: message_id(id)?,
                    body: required(body, "/edit needs the new text")?,
                }
            }
            "delete" => TabCommand::Delete(message_id(args)?),
            "react" => {
                let (id, emoji) = split_first(args);
                TabCommand::React {
                    id: message_id(id)?,
                    emoji: required(emoji, "/react needs an emoji")?,
                }
            }
            "who" => TabCommand::Who(args.to_string()),
            "list" => TabCommand::List,
            "notifications" => TabCommand::Notifications,
            "help" => TabCommand::Help,
            "quit" | "exit" => TabCommand::Quit,
            other => return Err(format!("unknown command /{other}, try /help")),
        };
        Ok(Some(command))
    }
}

fn split_first(args: &str) -> (&str, &str) {
    match args.split_once(char::is_whitespace) {
        Some((first, rest)) => (first, rest.trim()),
        None => (args, ""),
    }
}

fn required(value: &str, message: &str) -> std::result::Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        Err(message.to_string())
    } else {
        Ok(value.to_string())
    }
}

fn message_id(raw: &str) -> std::result::Result<MessageId, String> {
    raw.parse().map_err(|_| format!("not a message id: {raw}"))
}

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Continue(Option<String>),
    Quit,
}

/// Run one command against the client.
pub fn execute(client: &ChatClient, command: TabCommand) -> Result<Outcome> {
    let output = match command {
        TabCommand::Dm { username, text } => {
            let id = client.open_chat(&OpenChatPayload {
                name: Identity::new(&username).to_string(),
                username,
                message: text,
                avatar: None,
            })?;
            Some(format!("opened {id}"))
        }
        TabCommand::Group { name, members } => {
            let members = members
                .into_iter()
                .map(|username| Member::new(username.clone(), username.to_string(), MemberRole::Member))
                .collect();
            let id = client.create_group(&name, None, members)?;
            Some(format!("created group {id}"))
        }
        TabCommand::Open(index) => {
            let list = client.list_conversations()?;
            let item = index
                .checked_sub(1)
                .and_then(|i| list.get(i))
                .ok_or_else(|| ClientError::InvalidInput(format!("no conversation {index}")))?;
            client.select_conversation(&item.summary.id)?;
            None
        }
        TabCommand::CreateChannel(name) => {
            let channel = client.create_channel(&name)?;
            Some(format!("created #{}", channel.id))
        }
        TabCommand::Switch(channel) => {
            client.switch_channel(&channel)?;
            None
        }
        TabCommand::DropChannel(channel) => {
            client.delete_channel(&channel)?;
            Some(format!("deleted #{channel}"))
        }
        TabCommand::Remove(member) => {
            client.remove_member(&member)?;
            Some(format!("removed {}", member.mention()))
        }
        TabCommand::Edit { id, body } => {
            client.edit_message(id, &body)?;
            None
        }
        TabCommand::Delete(id) => {
            let removed = client.delete_message(id)?;
            (!removed).then(|| format!("no message {id}"))
        }
        TabCommand::React { id, emoji } => {
            let count = client.react(id, &emoji)?;
            Some(format!("{emoji} x{count}"))
        }
        TabCommand::Who(partial) => {
            let text = if partial.starts_with('@') { partial } else { format!("@{partial}") };
            let names: Vec<String> = client
                .mention_candidates(&text, text.len())?
                .iter()
                .map(|m| format!("{} ({})", m.username.mention(), m.name))
                .collect();
            Some(if names.is_empty() { "nobody".to_string() } else { names.join(", ") })
        }
        TabCommand::List => {
            let mut out = String::new();
            for (i, item) in client.list_conversations()?.iter().enumerate() {
                let preview = item.summary.last_message.as_deref().unwrap_or("");
                let _ = writeln!(out, "{:>2}. {} {}", i + 1, item.display_name, preview);
            }
            Some(out.trim_end().to_string())
        }
        TabCommand::Notifications => {
            let mut out = String::new();
            for n in client.repository().notifications()?.iter().take(10) {
                let _ = writeln!(out, "[{}] {}: {}", n.kind, n.title, n.message);
            }
            Some(out.trim_end().to_string())
        }
        TabCommand::Help => Some(HELP.to_string()),
        TabCommand::Quit => return Ok(Outcome::Quit),
        TabCommand::Send(text) => {
            client.send_message(&text, Vec::new())?;
            None
        }
    };
    Ok(Outcome::Continue(output))
}

/// Render the selected thread.
pub fn render_view(view: &SyncView, me: &Identity) -> String {
    let mut out = String::new();
    let Some(item) = view.selected_item() else {
        let _ = writeln!(out, "{} conversation(s), /list to see them", view.conversations.len());
        return out;
    };

    match &view.active_channel {
        Some(channel) => {
            let _ = writeln!(out, "== {} #{} ==", item.display_name, channel);
        }
        None => {
            let _ = writeln!(out, "== {} ==", item.display_name);
        }
    }
    for message in &view.messages {
        let _ = writeln!(out, "{}", render_message(message, &view.members, me));
    }
    out
}

fn render_message(message: &Message, members: &[Member], me: &Identity) -> String {
    let record = message.record();
    let sender = if &record.sender == me { "you".to_string() } else { record.sender.mention() };

    let mut line = format!("[{}] {} {}: ", record.id, record.timestamp.format("%H:%M"), sender);
    for segment in MentionResolver::highlight(&record.body, members) {
        match segment {
            Segment::Text { text } => line.push_str(&text),
            Segment::Mention { text, .. } => {
                let _ = write!(line, "*{text}*");
            }
        }
    }
    if record.edited {
        line.push_str(" (edited)");
    }
    for (emoji, count) in &record.reactions {
        let _ = write!(line, " {emoji}{count}");
    }
    line
}
