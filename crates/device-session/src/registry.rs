// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Name-based lookup of device APIs.

use crate::{DeviceApi, SnpsEvDeviceApi};

static REGISTRY: &[(&str, &dyn DeviceApi)] = &[
    (SnpsEvDeviceApi::NAME, &SnpsEvDeviceApi),
    (SnpsEvDeviceApi::DEV_NAME, &SnpsEvDeviceApi),
];

/// Returns the device API registered under `name`.
pub fn lookup(name: &str) -> Option<&'static dyn DeviceApi> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, api)| *api)
}

/// Every registered name, in registration order.
pub fn registered_names() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DeviceAttr, DeviceContext};

    #[test]
    fn test_lookup_snps_ev() {
        let api = lookup("device_api.snps_ev").unwrap();
        assert_eq!(api.name(), "device_api.snps_ev");
        assert_eq!(
            api.get_attr(DeviceContext::snps_ev(0), DeviceAttr::Exist),
            Some(1)
        );
    }

    #[test]
    fn test_lookup_dev_name() {
        let api = lookup("device_api.snps_ev_dev").unwrap();
        assert_eq!(api.name(), SnpsEvDeviceApi::NAME);
        assert_eq!(
            api.get_attr(DeviceContext::snps_ev(0), DeviceAttr::Exist),
            Some(1)
        );
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(lookup("device_api.gpu").is_none());
    }

    #[test]
    fn test_registered_names() {
        assert_eq!(
            registered_names(),
            vec!["device_api.snps_ev", "device_api.snps_ev_dev"]
        );
    }
}
