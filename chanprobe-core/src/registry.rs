//! Public channel registry interface.

use async_trait::async_trait;
use bitcoin::OutPoint;

/// Answers whether a funding output belongs to an announced channel.
///
/// Implementations must not fail: a lookup that cannot be completed
/// (transport error, timeout, unexpected response) answers `false`.
/// A registry outage therefore counts every affected close as private and
/// pushes the estimate up. Implementations should log each such failure so
/// the bias is visible in the run output.
#[async_trait]
pub trait RegistryOracle: Send + Sync {
    /// Whether `funding` is known as a public channel.
    ///
    /// The outpoint is queried in its `<txid>:<vout>` form.
    async fn is_known_public(&self, funding: &OutPoint) -> bool;
}
