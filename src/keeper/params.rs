//! Governance param updates

use super::events::{Event, Receipt};
use super::gates::Upgrade;
use super::msg::MsgUpdateParams;
use super::{Context, Keeper};
use crate::error::{Error, Result};
use crate::group::Batch;
use tracing::info;

impl Keeper {
    /// Replace the module params. The deposit denomination cannot change.
    pub fn update_params(&self, ctx: &Context<'_>, msg: MsgUpdateParams) -> Result<Receipt> {
        self.ensure_authority(&msg.authority)?;

        let current = self.store.params()?;
        if msg.params.deposit_denom != current.deposit_denom {
            return Err(Error::InvalidParams(format!(
                "deposit denom cannot be updated, current: {}, got: {}",
                current.deposit_denom, msg.params.deposit_denom
            )));
        }
        msg.params.validate()?;

        let mut batch = Batch::new();
        batch.put_params(&msg.params)?;
        self.store.commit(batch)?;
        info!("Updated params: {:?}", msg.params);

        if ctx.is_active(Upgrade::ParamsEvent) {
            Ok(Receipt::single(Event::ParamsUpdated { params: msg.params }))
        } else {
            Ok(Receipt::new())
        }
    }
}
