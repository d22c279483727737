pub mod apply;
pub mod plan;
pub mod status;

use anyhow::Result;

use crate::Context;
use crate::config::ConvergeConfig;
use crate::state::Store;

/// Load the config and the store named by the context
pub(crate) fn load(ctx: &Context) -> Result<(ConvergeConfig, Store)> {
    let config = ConvergeConfig::load(&ctx.config_path)?;
    let store = Store::load(&ctx.state_path)?;
    Ok((config, store))
}
