/// Application name
pub const APP_NAME: &str = "Huddle";

/// Storage keys of the persisted collections
pub const KEY_CONVERSATIONS: &str = "conversations";
pub const KEY_NOTIFICATIONS: &str = "notifications";
pub const KEY_TEAMS: &str = "teams";
pub const KEY_USER: &str = "user";

/// Channel every group conversation starts with. Never deletable.
pub const DEFAULT_CHANNEL_ID: &str = "general";
pub const DEFAULT_CHANNEL_NAME: &str = "general";
pub const DEFAULT_CHANNEL_ICON: &str = "#";

/// Icon given to channels created by users
pub const CUSTOM_CHANNEL_ICON: &str = "💬";

/// Reconciliation period of the sync loop in milliseconds
pub const SYNC_INTERVAL_MS: u64 = 2_000;

/// Distance from the bottom of the thread (px) still counted as "at the bottom"
pub const SCROLL_BOTTOM_THRESHOLD_PX: f64 = 50.0;

/// Signaling topics are `webrtc-<conversation id>`
pub const SIGNALING_TOPIC_PREFIX: &str = "webrtc-";

/// Topic used when a call starts without a selected conversation
pub const FALLBACK_SIGNALING_TOPIC: &str = "webrtc-lobby";

/// Capacity of each broadcast topic before slow subscribers start lagging
pub const TOPIC_CAPACITY: usize = 256;

/// Newest notifications kept in the persisted collection
pub const MAX_NOTIFICATIONS: usize = 50;

/// Largest blob accepted for inline attachments (5 MiB)
pub const MAX_ATTACHMENT_SIZE: usize = 5 * 1024 * 1024;

/// Public STUN server used when no ICE servers are configured
pub const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";
