//! Client and update loop for a status-bar module showing unread notifications
//! from a [rofication](https://github.com/regolith-linux/regolith-rofication) daemon.
//!
//! The daemon is polled over its unix socket, notifications are counted per application,
//! and the resulting [`Notifications`] are rendered through a hot-swappable [`RenderRule`]
//! into a [`Sink`] provided by the host.

mod error;
pub use error::*;

mod fetcher;
pub use fetcher::*;

mod module;
pub use module::*;

mod notification;
pub use notification::*;

mod observable;
pub use observable::*;

mod sink;
pub use sink::*;
