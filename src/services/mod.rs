pub mod code;
pub mod events;
pub mod lifecycle;
pub mod messaging;
pub mod notifier;
pub mod sessions;
