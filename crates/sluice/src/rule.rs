use crate::Item;

/// Validation and mapping applied by the transform stage to every item.
///
/// Returning `Err` rejects the item with a human-readable cause; the
/// transform stage turns that into its single error event and stops.
///
/// Any `Fn(Item) -> Result<Item, String>` closure is a rule.
pub trait Rule: Send + 'static {
    fn apply(&self, item: Item) -> Result<Item, String>;
}

impl<F> Rule for F
where
    F: Fn(Item) -> Result<Item, String> + Send + 'static,
{
    fn apply(&self, item: Item) -> Result<Item, String> {
        self(item)
    }
}

/// Rejects one sentinel value and multiplies everything else.
///
/// The default rejects `6` and doubles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SentinelRule {
    /// The invalid value, or `None` to accept everything.
    pub sentinel: Option<Item>,
    pub multiplier: Item,
}

impl SentinelRule {
    pub const DEFAULT_SENTINEL: Item = 6;
    pub const DEFAULT_MULTIPLIER: Item = 2;

    pub const fn new(sentinel: Option<Item>, multiplier: Item) -> Self {
        Self {
            sentinel,
            multiplier,
        }
    }
}

impl Default for SentinelRule {
    fn default() -> Self {
        Self::new(Some(Self::DEFAULT_SENTINEL), Self::DEFAULT_MULTIPLIER)
    }
}

impl Rule for SentinelRule {
    fn apply(&self, item: Item) -> Result<Item, String> {
        if self.sentinel == Some(item) {
            return Err(format!("number {item} is invalid"));
        }
        item.checked_mul(self.multiplier).ok_or_else(|| {
            format!(
                "number {item} overflows when multiplied by {}",
                self.multiplier
            )
        })
    }
}
