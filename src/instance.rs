//! Strongly typed snapshot of a serverless autonomous database.
//!
//! Control-plane enumerations are modelled as closed enums with an `Other`
//! escape hatch so that unexpected values survive into reports verbatim
//! instead of failing the fetch.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};

/// Defined tags keyed by namespace, then by tag key.
pub type DefinedTags = BTreeMap<String, BTreeMap<String, String>>;

/// Opaque, stable identifier (OCID) of a database instance.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wraps a raw identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for InstanceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for InstanceId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl Deref for InstanceId {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $($(#[$variant_meta:meta])* $variant:ident => $wire:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($(#[$variant_meta])* $variant,)+
            /// Value not recognised by this tool, preserved verbatim.
            Other(String),
        }

        impl $name {
            /// Returns the control-plane spelling of the value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(value) => value.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                match value.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(value),
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::from(value.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_owned()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_enum! {
    /// Compute billing model.
    ComputeModel {
        /// Legacy Oracle CPU billing.
        Ocpu => "OCPU",
        /// Elastic CPU billing, the normalised target.
        Ecpu => "ECPU",
    }
}

wire_enum! {
    /// Licensing model.
    LicenseModel {
        /// Licence cost bundled into the service price.
        LicenseIncluded => "LICENSE_INCLUDED",
        /// Customer-supplied licence (BYOL), the normalised target.
        BringYourOwnLicense => "BRING_YOUR_OWN_LICENSE",
    }
}

wire_enum! {
    /// Operational status reported by the control plane.
    LifecycleState {
        /// Powered off.
        Stopped => "STOPPED",
        /// Running and accepting changes.
        Available => "AVAILABLE",
        /// Broken or otherwise unusable.
        Unavailable => "UNAVAILABLE",
        /// Start in progress.
        Starting => "STARTING",
        /// Update in progress.
        Updating => "UPDATING",
        /// Compute or storage scaling in progress.
        Scaling => "SCALING",
    }
}

wire_enum! {
    /// Data Guard role.
    Role {
        /// Primary database.
        Primary => "PRIMARY",
        /// Standby peer.
        Standby => "STANDBY",
    }
}

/// Point-in-time view of one database instance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InstanceRecord {
    /// Stable identifier.
    pub id: InstanceId,
    /// Human-readable name, used for reporting only.
    pub display_name: String,
    /// Current compute billing model.
    pub compute_model: ComputeModel,
    /// Provisioned compute units.
    pub compute_count: f64,
    /// Data storage in terabytes. `None` means the instance already uses the
    /// gigabyte storage model.
    pub data_storage_size_tb: Option<f64>,
    /// Storage actually used, in terabytes, when reported.
    pub used_storage_size_tb: Option<f64>,
    /// Allocated storage in terabytes; source of truth for resizing.
    pub allocated_storage_size_tb: f64,
    /// Current licensing model.
    pub license_model: LicenseModel,
    /// Database edition (for example `ENTERPRISE_EDITION`).
    pub database_edition: String,
    /// Current lifecycle state.
    pub lifecycle_state: LifecycleState,
    /// Whether the instance runs on dedicated infrastructure.
    pub is_dedicated: bool,
    /// Whether the instance is an Always Free instance.
    pub is_free_tier: bool,
    /// Data Guard role; instances without a peer report as primary.
    pub role: Role,
    /// Namespaced defined tags.
    pub defined_tags: DefinedTags,
}
