pub mod server;

use crate::auth::config::AuthConfig;

#[derive(Debug)]
pub enum Action {
    Server { port: u16, config: AuthConfig },
}
