//! Identifiers of rows owned by the inventory core.

use stockledger_core::uuid_id;

uuid_id!(
    /// Identifier of an inventory item row (one per item and warehouse).
    InventoryItemId,
    "InventoryItemId"
);
uuid_id!(
    /// Identifier of a batch/lot.
    BatchId,
    "BatchId"
);
uuid_id!(
    /// Identifier of a serialised unit.
    SerialId,
    "SerialId"
);
uuid_id!(
    /// Identifier of a stock transaction.
    TransactionId,
    "TransactionId"
);
uuid_id!(
    /// Identifier of a daily ledger row.
    LedgerId,
    "LedgerId"
);
