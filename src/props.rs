//! Compact property flags attached to a proxy.

use serde::{Serialize, Serializer};

/// A set of independent boolean properties packed into one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProxyProps(u8);

impl ProxyProps {
    pub const DISABLED: ProxyProps = ProxyProps(1 << 0);
    pub const BLACKLISTED: ProxyProps = ProxyProps(1 << 1);
    pub const WORTH: ProxyProps = ProxyProps(1 << 2);
    pub const RATE_LIMIT: ProxyProps = ProxyProps(1 << 3);

    /// No flags set.
    pub const fn empty() -> Self {
        ProxyProps(0)
    }

    /// Raw flag byte.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Turn every flag in `flag` on or off.
    pub fn set(&mut self, flag: ProxyProps, on: bool) {
        if on {
            self.0 |= flag.0;
        } else {
            self.0 &= !flag.0;
        }
    }

    /// True when every flag in `flag` is on.
    pub const fn contains(self, flag: ProxyProps) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Copy with every flag in `flag` turned on.
    pub fn with(mut self, flag: ProxyProps) -> Self {
        self.set(flag, true);
        self
    }
}

#[derive(Serialize)]
struct PropsView {
    disabled: bool,
    blacklisted: bool,
    worth: bool,
    rate_limit: bool,
}

impl Serialize for ProxyProps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        PropsView {
            disabled: self.contains(Self::DISABLED),
            blacklisted: self.contains(Self::BLACKLISTED),
            worth: self.contains(Self::WORTH),
            rate_limit: self.contains(Self::RATE_LIMIT),
        }
        .serialize(serializer)
    }
}
