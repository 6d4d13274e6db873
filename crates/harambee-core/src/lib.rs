// SPDX-FileCopyrightText: 2026 Harambee Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Harambee donation bot.
//!
//! This crate holds the pieces every other crate agrees on: the error
//! taxonomy, the payment domain types, and the adapter traits behind which
//! storage, the payment gateway, and outbound chat delivery live.

pub mod error;
pub mod phone;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HarambeeError;
pub use types::{AdapterType, HealthStatus, PaymentStatus};

// Re-export all adapter traits at crate root.
pub use traits::{NotificationSink, PaymentGateway, PluginAdapter, StorageAdapter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_strings() {
        use std::str::FromStr;

        for variant in [AdapterType::Storage, AdapterType::Gateway, AdapterType::Notifier] {
            let s = variant.to_string();
            let parsed = AdapterType::from_str(&s).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_trait_modules_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_storage_adapter<T: StorageAdapter>() {}
        fn _assert_payment_gateway<T: PaymentGateway>() {}
        fn _assert_notification_sink<T: NotificationSink>() {}
    }
}
