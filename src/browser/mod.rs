pub mod manager;
pub mod stealth;


pub use manager::{BrowserRenderer, PageRenderer};
pub use stealth::{generate_stealth_script, stealth_init_params, UserAgentGenerator};
