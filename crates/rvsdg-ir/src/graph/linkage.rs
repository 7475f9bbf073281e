//! Linkage attributes for functions, globals and imports.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IrError;

/// LLVM-derived linkage classes carried by λ and δ definitions and by
/// graph imports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Linkage {
    External,
    Internal,
    Private,
    Weak,
    WeakOdr,
    LinkOnce,
    LinkOnceOdr,
    Common,
    Appending,
    AvailableExternally,
    ExternalWeak,
}

impl Linkage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::External => "external",
            Linkage::Internal => "internal",
            Linkage::Private => "private",
            Linkage::Weak => "weak",
            Linkage::WeakOdr => "weak_odr",
            Linkage::LinkOnce => "link_once",
            Linkage::LinkOnceOdr => "link_once_odr",
            Linkage::Common => "common",
            Linkage::Appending => "appending",
            Linkage::AvailableExternally => "available_externally",
            Linkage::ExternalWeak => "external_weak",
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = IrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "external" => Ok(Linkage::External),
            "internal" => Ok(Linkage::Internal),
            "private" => Ok(Linkage::Private),
            "weak" => Ok(Linkage::Weak),
            "weak_odr" => Ok(Linkage::WeakOdr),
            "link_once" => Ok(Linkage::LinkOnce),
            "link_once_odr" => Ok(Linkage::LinkOnceOdr),
            "common" => Ok(Linkage::Common),
            "appending" => Ok(Linkage::Appending),
            "available_externally" => Ok(Linkage::AvailableExternally),
            "external_weak" => Ok(Linkage::ExternalWeak),
            _ => Err(IrError::InvalidLinkage { name: s.into() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_str() {
        for linkage in [
            Linkage::External,
            Linkage::Internal,
            Linkage::WeakOdr,
            Linkage::AvailableExternally,
        ] {
            assert_eq!(linkage.as_str().parse::<Linkage>().unwrap(), linkage);
        }
    }

    #[test]
    fn test_unknown_linkage_is_rejected() {
        assert!(matches!(
            "dllimport".parse::<Linkage>(),
            Err(IrError::InvalidLinkage { .. })
        ));
    }
}
