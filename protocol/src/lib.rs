pub mod credentials;
pub mod util;

pub use crate::credentials::DecryptionKey;

use {
    anyhow::{Error, format_err},
    derive_more::{AsRef, From, Into},
    serde::{Deserialize, Deserializer, Serialize, Serializer, de},
    sha2::{Digest, Sha256},
    std::{
        borrow::Cow,
        convert::Infallible,
        fmt::{self, Debug, Display},
        str::FromStr,
    },
};

/// Length of a raw signature that selects the signature-sharded layout.
pub const SIGNATURE_LENGTH: usize = 64;

/// Base-58 text of the SHA-256 digest of a payload.
///
/// The value is not validated on construction: a caller-supplied identifier is
/// checked when it is turned into a storage location.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into, AsRef,
)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    #[must_use]
    #[inline]
    pub fn compute(data: &[u8]) -> Self {
        Self(bs58::encode(Sha256::digest(data)).into_string())
    }

    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContentId {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentId {
    type Err = Infallible;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_owned()))
    }
}

/// Signature bound to a payload by its producer.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }

    #[must_use]
    #[inline]
    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl From<[u8; SIGNATURE_LENGTH]> for Signature {
    #[inline]
    fn from(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = Error;

    #[inline]
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; SIGNATURE_LENGTH]>::try_from(bytes)
            .map(Self)
            .map_err(|err| {
                format_err!(
                    "{err}: invalid signature length; got {}, expected {SIGNATURE_LENGTH}",
                    bytes.len()
                )
            })
    }
}

impl FromStr for Signature {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s).into_vec()?;
        Self::try_from(bytes.as_slice())
    }
}

impl Display for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl Debug for Signature {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({self})")
    }
}

impl<'de> Deserialize<'de> for Signature {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Serialize for Signature {
    #[inline]
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_base58().serialize(serializer)
    }
}
