use anyhow::Result;

use types::{Address, Output, UtxoPosition};

/// Read access to the durable UTXO set.
pub trait UtxoReader: Send + Sync {
    fn get_utxo(&self, position: &UtxoPosition) -> Result<Option<Output>>;

    /// Every durable output, optionally restricted to one owner, in position order.
    fn utxos(&self, owner: Option<&Address>) -> Result<Vec<(UtxoPosition, Output)>>;
}
