//! Resource trait connecting a domain to the reconciler
//!
//! A Resource supplies desired and actual item lists and applies the
//! transition implied by a reconciled item's state.

use crate::context::Context;
use crate::error::Result;
use crate::types::Item;

/// Core trait for reconcilable domains
///
/// Implementations must uphold:
/// - `desired()` and `actual()` tag items with all metadata `apply()` needs;
///   the reconciler injects no domain knowledge.
/// - `apply()` on a [`Managed`](crate::ItemState::Managed) item is a no-op.
/// - `actual()` checks the context before blocking I/O and returns
///   [`Error::Cancelled`](crate::Error::Cancelled) or
///   [`Error::DeadlineExceeded`](crate::Error::DeadlineExceeded) instead of
///   an empty list when aborted.
///
/// # Example
///
/// ```ignore
/// use reconcile::{Context, Item, Resource, Result};
///
/// struct Fonts { desired: Vec<Item> }
///
/// impl Resource for Fonts {
///     fn id(&self) -> String { "fonts".into() }
///     fn desired(&self) -> &[Item] { &self.desired }
///     fn set_desired(&mut self, items: Vec<Item>) { self.desired = items; }
///
///     fn actual(&self, ctx: &Context) -> Result<Vec<Item>> {
///         ctx.check()?;
///         Ok(scan_font_dir()?)
///     }
///
///     fn apply(&self, ctx: &Context, item: &Item) -> Result<()> {
///         ctx.check()?;
///         install_font(item)
///     }
/// }
/// ```
pub trait Resource: Send + Sync {
    /// Stable identifier used for lookup and reporting, not for keying items
    fn id(&self) -> String;

    /// The cached desired item set
    fn desired(&self) -> &[Item];

    /// Replace the desired item set
    fn set_desired(&mut self, items: Vec<Item>);

    /// Scan real-world state
    fn actual(&self, ctx: &Context) -> Result<Vec<Item>>;

    /// Perform the transition implied by `item.state` for one item
    fn apply(&self, ctx: &Context, item: &Item) -> Result<()>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
