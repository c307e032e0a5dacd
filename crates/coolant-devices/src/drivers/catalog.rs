//! Supported device tables.

use super::{GpuDevice, SmbusFamily, SmbusMatch, SupportedDevice, UsbFamily};
use crate::driver::DriverCapability;

const NZXT: u16 = 0x1e71;
const CORSAIR: u16 = 0x1b1c;
const ASETEK: u16 = 0x2433;
const SEASONIC: u16 = 0x7793;

const NVIDIA: u16 = 0x10de;
const EVGA: u16 = 0x3842;
const ASUS: u16 = 0x1043;

/// NZXT Kraken X42/X52/X62/X72 and M22
pub static KRAKEN2: UsbFamily = UsbFamily {
    name: "kraken2",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PumpControl,
        DriverCapability::Lighting,
    ],
    devices: &[
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x170e,
            description: "NZXT Kraken X (X42, X52, X62 or X72)",
        },
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x1715,
            description: "NZXT Kraken M22",
        },
    ],
    legacy_690lc: None,
};

/// NZXT Kraken X53/X63/X73 and Z53/Z63/Z73
pub static KRAKEN3: UsbFamily = UsbFamily {
    name: "kraken3",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::PumpControl,
        DriverCapability::Lighting,
    ],
    devices: &[
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x2007,
            description: "NZXT Kraken X (X53, X63 or X73)",
        },
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x3008,
            description: "NZXT Kraken Z (Z53, Z63 or Z73)",
        },
    ],
    legacy_690lc: None,
};

/// NZXT Smart Device, Grid+ V3 and HUE 2 controllers
pub static SMART_DEVICE: UsbFamily = UsbFamily {
    name: "smart_device",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::Lighting,
    ],
    devices: &[
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x1714,
            description: "NZXT Smart Device (V1)",
        },
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x1711,
            description: "NZXT Grid+ V3",
        },
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x2006,
            description: "NZXT Smart Device V2",
        },
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x2001,
            description: "NZXT HUE 2",
        },
        SupportedDevice {
            vendor_id: NZXT,
            product_id: 0x2002,
            description: "NZXT HUE 2 Ambient",
        },
    ],
    legacy_690lc: None,
};

/// Corsair HXi and RMi power supplies
pub static CORSAIR_HID_PSU: UsbFamily = UsbFamily {
    name: "corsair_hid_psu",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PowerSupply,
    ],
    devices: &[
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c05,
            description: "Corsair HX750i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c06,
            description: "Corsair HX850i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c07,
            description: "Corsair HX1000i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c08,
            description: "Corsair HX1200i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c0a,
            description: "Corsair RM650i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c0b,
            description: "Corsair RM750i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c0c,
            description: "Corsair RM850i",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x1c0d,
            description: "Corsair RM1000i",
        },
    ],
    legacy_690lc: None,
};

/// Corsair Hydro Platinum and Pro XT coolers
pub static HYDRO_PLATINUM: UsbFamily = UsbFamily {
    name: "hydro_platinum",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PumpControl,
        DriverCapability::Lighting,
    ],
    devices: &[
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c18,
            description: "Corsair H100i Platinum",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c19,
            description: "Corsair H100i Platinum SE",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c17,
            description: "Corsair H115i Platinum",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c20,
            description: "Corsair H100i Pro XT",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c21,
            description: "Corsair H115i Pro XT",
        },
    ],
    legacy_690lc: None,
};

/// NZXT E-series power supplies (Seasonic OEM)
pub static NZXT_EPSU: UsbFamily = UsbFamily {
    name: "nzxt_epsu",
    capabilities: &[DriverCapability::Status, DriverCapability::PowerSupply],
    devices: &[
        SupportedDevice {
            vendor_id: SEASONIC,
            product_id: 0x5911,
            description: "NZXT E500",
        },
        SupportedDevice {
            vendor_id: SEASONIC,
            product_id: 0x5912,
            description: "NZXT E650",
        },
        SupportedDevice {
            vendor_id: SEASONIC,
            product_id: 0x5913,
            description: "NZXT E850",
        },
    ],
    legacy_690lc: None,
};

/// Corsair H110i GT
pub static COOLIT: UsbFamily = UsbFamily {
    name: "coolit",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PumpControl,
    ],
    devices: &[SupportedDevice {
        vendor_id: CORSAIR,
        product_id: 0x0c04,
        description: "Corsair H110i GT",
    }],
    legacy_690lc: None,
};

/// Asetek 690LC coolers, reached through usbfs
pub static ASETEK_690LC: UsbFamily = UsbFamily {
    name: "asetek",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PumpControl,
        DriverCapability::Lighting,
    ],
    devices: &[SupportedDevice {
        vendor_id: ASETEK,
        product_id: 0xb200,
        description: "Asetek 690LC (assuming EVGA CLC)",
    }],
    legacy_690lc: Some(false),
};

/// Older 690LC firmware, sold as NZXT Kraken X31/X41/X61 among others
///
/// Shares its ids with [`ASETEK_690LC`]; selected with the `legacy_690lc` flag.
pub static ASETEK_LEGACY_690LC: UsbFamily = UsbFamily {
    name: "asetek_legacy",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PumpControl,
        DriverCapability::Lighting,
    ],
    devices: &[SupportedDevice {
        vendor_id: ASETEK,
        product_id: 0xb200,
        description: "NZXT Kraken X40, X60, X31, X41, X51 or X61",
    }],
    legacy_690lc: Some(true),
};

/// Corsair Hydro coolers built on the Asetek 690LC
pub static HYDRO_690LC: UsbFamily = UsbFamily {
    name: "asetek_hydro",
    capabilities: &[
        DriverCapability::Status,
        DriverCapability::FanControl,
        DriverCapability::PumpControl,
        DriverCapability::Lighting,
    ],
    devices: &[
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c02,
            description: "Corsair Hydro H80i GT",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c03,
            description: "Corsair Hydro H100i GTX",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c07,
            description: "Corsair Hydro H110i GTX",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c08,
            description: "Corsair Hydro H80i v2",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c09,
            description: "Corsair Hydro H100i v2",
        },
        SupportedDevice {
            vendor_id: CORSAIR,
            product_id: 0x0c0a,
            description: "Corsair Hydro H115i",
        },
    ],
    legacy_690lc: None,
};

/// Corsair Vengeance RGB memory modules
pub static VENGEANCE_RGB: SmbusFamily = SmbusFamily {
    name: "vengeance_rgb",
    capabilities: &[DriverCapability::Status, DriverCapability::Lighting],
    unsafe_features: &["smbus", "vengeance_rgb"],
    matcher: SmbusMatch::MemoryModule {
        host_drivers: &["i801_smbus", "piix4_smbus"],
        spd_base: 0x50,
        controller_base: 0x58,
        slots: 8,
        manufacturer: (0x02, 0x9e),
        description: "Corsair Vengeance RGB",
    },
};

/// Lighting controllers on NVIDIA graphics cards
pub static GPU_LIGHTING: SmbusFamily = SmbusFamily {
    name: "gpu_lighting",
    capabilities: &[DriverCapability::Lighting],
    unsafe_features: &["smbus"],
    matcher: SmbusMatch::Gpu {
        host_driver: "nvidia",
        adapter_prefix: "NVIDIA i2c adapter 1 ",
        devices: &[
            GpuDevice {
                vendor: NVIDIA,
                device: 0x1b80,
                subsystem_vendor: EVGA,
                subsystem_device: 0x6286,
                address: 0x49,
                description: "EVGA GTX 1080 FTW",
            },
            GpuDevice {
                vendor: NVIDIA,
                device: 0x1e87,
                subsystem_vendor: ASUS,
                subsystem_device: 0x866a,
                address: 0x2a,
                description: "ASUS Strix RTX 2080 OC",
            },
            GpuDevice {
                vendor: NVIDIA,
                device: 0x1e84,
                subsystem_vendor: ASUS,
                subsystem_device: 0x8698,
                address: 0x2a,
                description: "ASUS Strix RTX 2070 Super OC",
            },
        ],
    },
};

/// Families probed on the hidraw bus
pub static HID_FAMILIES: &[&UsbFamily] = &[
    &COOLIT,
    &CORSAIR_HID_PSU,
    &HYDRO_PLATINUM,
    &KRAKEN2,
    &KRAKEN3,
    &NZXT_EPSU,
    &SMART_DEVICE,
];

/// Families probed on the raw USB bus
pub static USB_FAMILIES: &[&UsbFamily] = &[&ASETEK_690LC, &ASETEK_LEGACY_690LC, &HYDRO_690LC];

/// Families probed on SMBus
pub static SMBUS_FAMILIES: &[&SmbusFamily] = &[&GPU_LIGHTING, &VENGEANCE_RGB];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_usb_ids_are_unique() {
        let mut seen = HashSet::new();
        let selected = HID_FAMILIES.iter().chain(USB_FAMILIES.iter());
        for family in selected.filter(|f| f.is_selected(false)) {
            for device in family.devices {
                assert!(
                    seen.insert((device.vendor_id, device.product_id)),
                    "{:04x}:{:04x} listed twice",
                    device.vendor_id,
                    device.product_id
                );
            }
        }
    }

    #[test]
    fn test_legacy_flag_swaps_asetek_families() {
        let matching = |legacy: bool| -> Vec<&str> {
            USB_FAMILIES
                .iter()
                .filter(|f| f.is_selected(legacy))
                .filter(|f| f.devices.iter().any(|d| (d.vendor_id, d.product_id) == (ASETEK, 0xb200)))
                .map(|f| f.name)
                .collect()
        };
        assert_eq!(matching(false), vec!["asetek"]);
        assert_eq!(matching(true), vec!["asetek_legacy"]);
    }

    #[test]
    fn test_families_declare_capabilities() {
        for family in HID_FAMILIES.iter().chain(USB_FAMILIES.iter()) {
            assert!(!family.capabilities.is_empty(), "{} has no capabilities", family.name);
            assert!(!family.devices.is_empty());
        }
        for family in SMBUS_FAMILIES {
            assert!(family.unsafe_features.contains(&"smbus"));
        }
    }
}
