//! `@name` mentions: autocomplete while typing and highlighting when
//! rendering.
//!
//! Cursor positions are byte offsets into the text. Offsets that fall
//! inside a multi-byte character are moved back to its start.

use serde::Serialize;

use huddle_shared::types::Identity;
use huddle_store::Member;

/// The `@partial` being typed at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    /// Offset of the `@`.
    pub start: usize,
    /// Text between the `@` and the cursor.
    pub filter: String,
}

/// Text after a completion, with the cursor placed after the insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Segment {
    Text { text: String },
    Mention { username: Identity, text: String },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MentionResolver;

impl MentionResolver {
    /// Find the nearest unescaped `@` before the cursor with no whitespace
    /// in between.
    pub fn active_query(text: &str, cursor: usize) -> Option<MentionQuery> {
        let cursor = floor_char_boundary(text, cursor);
        let before = &text[..cursor];

        for (offset, c) in before.char_indices().rev() {
            if c.is_whitespace() {
                return None;
            }
            if c == '@' && !before[..offset].ends_with('\\') {
                return Some(MentionQuery {
                    start: offset,
                    filter: before[offset + 1..].to_string(),
                });
            }
        }
        None
    }

    /// Members whose name or username contains the live filter,
    /// case-insensitively. Empty when no mention is being typed.
    pub fn candidates<'a>(members: &'a [Member], text: &str, cursor: usize) -> Vec<&'a Member> {
        let Some(query) = Self::active_query(text, cursor) else {
            return Vec::new();
        };
        let filter = query.filter.to_lowercase();
        members
            .iter()
            .filter(|m| {
                m.name.to_lowercase().contains(&filter)
                    || m.username.as_str().to_lowercase().contains(&filter)
            })
            .collect()
    }

    /// Replace the `@partial` at the cursor with `@username `.
    pub fn complete(text: &str, cursor: usize, username: &Identity) -> Option<Completion> {
        let cursor = floor_char_boundary(text, cursor);
        let query = Self::active_query(text, cursor)?;
        let inserted = format!("{} ", username.mention());

        let mut completed = String::with_capacity(text.len() + inserted.len());
        completed.push_str(&text[..query.start]);
        completed.push_str(&inserted);
        let new_cursor = completed.len();
        completed.push_str(&text[cursor..]);

        Some(Completion {
            text: completed,
            cursor: new_cursor,
        })
    }

    /// Split a message body into plain text and mentions of known members.
    /// Mentions of anyone else stay plain text.
    pub fn highlight(body: &str, members: &[Member]) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut rest = body;

        while let Some(at) = rest.find('@') {
            let after = &rest[at + 1..];
            let token_len = after
                .find(|c: char| !is_username_char(c))
                .unwrap_or(after.len());
            let token = after[..token_len].trim_end_matches('.');
            let escaped = rest[..at].ends_with('\\');

            let member = (!escaped && !token.is_empty())
                .then(|| members.iter().find(|m| m.username.as_str().eq_ignore_ascii_case(token)))
                .flatten();

            match member {
                Some(member) => {
                    text.push_str(&rest[..at]);
                    if !text.is_empty() {
                        segments.push(Segment::Text {
                            text: std::mem::take(&mut text),
                        });
                    }
                    segments.push(Segment::Mention {
                        username: member.username.clone(),
                        text: format!("@{token}"),
                    });
                    rest = &after[token.len()..];
                }
                None => {
                    text.push_str(&rest[..=at]);
                    rest = after;
                }
            }
        }

        text.push_str(rest);
        if !text.is_empty() {
            segments.push(Segment::Text { text });
        }
        segments
    }
}

fn is_username_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
