//! Checkout pipeline step names.

/// The saga type identifier for checkout.
pub const SAGA_TYPE: &str = "Checkout";

/// Step name: Reserve stock for every cart line.
pub const STEP_RESERVE_STOCK: &str = "reserve_stock";

/// Step name: Price the cart from catalog unit prices.
pub const STEP_PRICE_ORDER: &str = "price_order";

/// Step name: Charge the payment instrument.
pub const STEP_CHARGE_PAYMENT: &str = "charge_payment";

/// Step name: Persist the order record.
pub const STEP_STORE_ORDER: &str = "store_order";

/// Step name: Persist the order line items.
pub const STEP_STORE_LINE_ITEMS: &str = "store_line_items";

/// Step name: Send the confirmation email (best-effort).
pub const STEP_NOTIFY_CUSTOMER: &str = "notify_customer";

/// Step name: Spawn the shipping sub-saga.
pub const STEP_DISPATCH_SHIPPING: &str = "dispatch_shipping";
