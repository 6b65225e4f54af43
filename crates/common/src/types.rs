use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier gets the same surface: random construction, conversion
/// from and into [`Uuid`], and `Display` as the hyphenated UUID.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// Verified user identity supplied by the authentication layer.
    UserId
);

entity_id!(
    /// Catalog product identifier.
    ProductId
);

entity_id!(
    /// Seller that owns a product.
    VendorId
);

entity_id!(
    /// Shopping cart identifier (one cart per user).
    CartId
);

entity_id!(
    /// Order identifier.
    OrderId
);

entity_id!(
    /// Line identifier inside an order.
    OrderItemId
);

entity_id!(
    /// Payment record identifier (one payment per order).
    PaymentId
);
