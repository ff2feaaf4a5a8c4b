//! Strongly-typed identifiers.
//!
//! Identifiers owned by external collaborators (warehouses, products, users,
//! customers) live here; the inventory crate declares its own with the same
//! macro.

/// Declare a `Copy` UUID newtype with `Display`, `FromStr` and conversions.
#[macro_export]
macro_rules! uuid_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(::uuid::Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(::uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &::uuid::Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl ::core::fmt::Display for $t {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<::uuid::Uuid> for $t {
            fn from(value: ::uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for ::uuid::Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl ::core::str::FromStr for $t {
            type Err = $crate::InventoryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = ::uuid::Uuid::parse_str(s).map_err(|e| {
                    $crate::InventoryError::invalid_argument(format!("{}: {}", $name, e))
                })?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_id!(
    /// Identifier of a warehouse (owned by warehouse master data).
    WarehouseId,
    "WarehouseId"
);
uuid_id!(
    /// Identifier of a catalogue product.
    ProductId,
    "ProductId"
);
uuid_id!(
    /// Identifier of a product variant.
    VariantId,
    "VariantId"
);
uuid_id!(
    /// Identifier of the user performing an operation.
    UserId,
    "UserId"
);
uuid_id!(
    /// Identifier of a customer a serial unit was sold to.
    CustomerId,
    "CustomerId"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use core::str::FromStr;

    #[test]
    fn parses_and_displays_round_trip() {
        let id = WarehouseId::new();
        let parsed = WarehouseId::from_str(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn rejects_malformed_identifier() {
        let err = ProductId::from_str("not-a-uuid").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("ProductId"));
    }
}
