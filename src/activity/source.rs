//! Activity event kinds and the event-source abstraction.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A user interaction that counts as session activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

impl ActivityKind {
    /// Every qualifying interaction kind.
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
        ActivityKind::Click,
    ];

    /// Stable position of this kind in [`ActivityKind::ALL`].
    pub fn index(self) -> usize {
        match self {
            ActivityKind::PointerDown => 0,
            ActivityKind::PointerMove => 1,
            ActivityKind::KeyPress => 2,
            ActivityKind::Scroll => 3,
            ActivityKind::TouchStart => 4,
            ActivityKind::Click => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityKind::PointerDown => "pointer_down",
            ActivityKind::PointerMove => "pointer_move",
            ActivityKind::KeyPress => "key_press",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touch_start",
            ActivityKind::Click => "click",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked for every activity event delivered by a source.
pub type ActivityListener = Arc<dyn Fn(ActivityKind) + Send + Sync>;

/// Handle returned by [`ActivitySource::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A stream of user interaction events that listeners can attach to.
///
/// Implementations must not hold internal locks while invoking listeners,
/// since a listener may call back into `unsubscribe`.
pub trait ActivitySource: Send + Sync {
    /// Registers a listener. It receives every event until unsubscribed.
    fn subscribe(&self, listener: ActivityListener) -> SubscriptionId;

    /// Removes a listener. Returns `false` if the id was not registered.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
