use std::time::Instant;

use crate::{config::Config, service::UserService};

pub mod health;
pub mod pages;
pub mod users;

#[derive(Clone)]
pub struct AppState {
    pub service: UserService,
    pub config: Config,
    pub started_at: Instant,
}
