//! Runtime configuration for the `cart-agg` binary.

use std::path::PathBuf;
use thiserror::Error;

use crate::cart::DEFAULT_NAMESPACE;
use crate::discount::ThresholdDiscount;
use crate::{Amount, Identity};

pub const STORAGE_DIR_VAR: &str = "CART_AGG_STORAGE_DIR";
pub const NAMESPACE_VAR: &str = "CART_AGG_NAMESPACE";
pub const DISCOUNT_VAR: &str = "CART_AGG_DISCOUNT";

const DEFAULT_STORAGE_DIR: &str = ".cart-agg";

pub const USAGE: &str = "usage: cart-agg <stock.csv> <actions.csv> [user-id]";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing argument <{0}>; usage: cart-agg <stock.csv> <actions.csv> [user-id]")]
    MissingArgument(&'static str),

    #[error("{var}: invalid value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub stock_path: PathBuf,
    pub actions_path: PathBuf,
    pub identity: Identity,
    pub storage_dir: PathBuf,
    pub namespace: String,
    pub discount: Option<ThresholdDiscount>,
}

impl Config {
    /// Build from the process arguments and environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_parts(std::env::args().skip(1), |var| std::env::var(var).ok())
    }

    /// Build from positional arguments (program name excluded) and an
    /// environment lookup.
    pub fn from_parts(
        args: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut args = args.into_iter();
        let stock_path = args
            .next()
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingArgument("stock.csv"))?;
        let actions_path = args
            .next()
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingArgument("actions.csv"))?;
        let identity = Identity::from_user_id(args.next().as_deref());

        let storage_dir = env(STORAGE_DIR_VAR)
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_DIR), PathBuf::from);
        let namespace = env(NAMESPACE_VAR)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let discount = env(DISCOUNT_VAR)
            .filter(|v| !v.is_empty())
            .map(|v| parse_discount(&v))
            .transpose()?;

        Ok(Self {
            stock_path,
            actions_path,
            identity,
            storage_dir,
            namespace,
            discount,
        })
    }
}

/// Parse `<percent>@<min_subtotal>`, e.g. `10@5000`.
fn parse_discount(value: &str) -> Result<ThresholdDiscount, ConfigError> {
    let invalid = |reason: &'static str| ConfigError::InvalidValue {
        var: DISCOUNT_VAR,
        value: value.to_string(),
        reason,
    };

    let (percent, min) = value
        .split_once('@')
        .ok_or_else(|| invalid("expected <percent>@<min_subtotal>"))?;
    let percent: u32 = percent
        .trim()
        .parse()
        .map_err(|_| invalid("percent is not a whole number"))?;
    if percent > 100 {
        return Err(invalid("percent above 100"));
    }
    let min: f64 = min
        .trim()
        .parse()
        .map_err(|_| invalid("minimum subtotal is not a number"))?;
    if !min.is_finite() || min < 0.0 {
        return Err(invalid("minimum subtotal must be non-negative"));
    }

    Ok(ThresholdDiscount::new(percent, Amount::from_float(min)))
}
