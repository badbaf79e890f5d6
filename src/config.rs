//! Settings read from the environment.

use std::{env, net::SocketAddr};

use crate::error::ConfigError;

const DATABASE_VAR: &str = "TRIPSPLIT_DATABASE";
const ADDRESS_VAR: &str = "TRIPSPLIT_ADDRESS";

const DEFAULT_DATABASE: &str = "tripsplit.db";
const DEFAULT_ADDRESS: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: String,
    pub address: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Config, ConfigError> {
        let database_path = read_var(DATABASE_VAR)?;
        let address = read_var(ADDRESS_VAR)?;
        Config::from_values(database_path, address)
    }

    fn from_values(
        database_path: Option<String>,
        address: Option<String>,
    ) -> Result<Config, ConfigError> {
        let address = address.unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
        let address = address
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidAddress(address.clone()))?;

        Ok(Config {
            database_path: database_path.unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            address,
        })
    }
}

fn read_var(name: &'static str) -> Result<Option<String>, ConfigError> {
    match env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(name)),
    }
}
