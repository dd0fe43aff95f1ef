pub mod error;
pub mod types;
pub mod codec;
pub mod config;
pub mod session;
pub mod backend;
pub mod store;
pub mod cookie;
pub mod util;

pub use backend::{SessionBackend, StoreBackend};
pub use cookie::{CookieBackend, CookieSession, PlainCookieBackend, SignedCookieBackend};
pub use error::{Result, SessionError};
pub use session::{BoundSession, Session, SessionExt, SessionFactory};
pub use types::{SessionCookie, SessionData};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
