pub mod agent;
pub mod browser;
pub mod config;
pub mod element;
pub mod error;
pub mod form;
pub mod logs;
pub mod page;
pub mod screenshot;
pub mod server;
pub mod validate;

pub use browser::Browser;
pub use config::{BrowserConfig, Settings};
pub use error::{Error, Result};
pub use form::WebFormRequest;
pub use page::{FormField, Page};
pub use server::{router, AppState};
